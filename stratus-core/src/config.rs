// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! YAML project configuration with strict validation.
//!
//! A `stratus.yaml` declares shared defaults, the layers to build and the
//! functions to deploy. Everything is checked before any remote call; any
//! invalid field results in a HardValidationError.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{HardValidationError, PlatformError, Stage, StratusError, StratusResult};
use crate::model::{ApiSpec, BuildSpec, FunctionSpec};
use crate::platform::FunctionPlatform;
use crate::types::{BucketName, FunctionName, LayerName, Runtime};

/// Default entry point for new functions.
pub const DEFAULT_HANDLER: &str = "lambda_function.lambda_handler";

/// Raw configuration as parsed from YAML (before validation).
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    defaults: RawDefaults,
    #[serde(default)]
    layers: Vec<RawLayerConfig>,
    #[serde(default)]
    functions: Vec<RawFunctionConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDefaults {
    profile: Option<String>,
    region: Option<String>,
    bucket: Option<String>,
    role: Option<String>,
    #[serde(default = "default_build_timeout")]
    build_timeout_secs: u64,
}

fn default_build_timeout() -> u64 {
    900 // 15 minutes
}

impl Default for RawDefaults {
    fn default() -> Self {
        Self {
            profile: None,
            region: None,
            bucket: None,
            role: None,
            build_timeout_secs: default_build_timeout(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawLayerConfig {
    name: String,
    requirements: String,
    runtime: String,
    #[serde(default)]
    description: String,
    license: Option<String>,
    bucket: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFunctionConfig {
    name: String,
    source: String,
    runtime: String,
    #[serde(default = "default_handler")]
    handler: String,
    role: Option<String>,
    bucket: Option<String>,
    #[serde(default)]
    layers: Vec<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    environment: BTreeMap<String, String>,
    api: Option<RawApi>,
}

fn default_handler() -> String {
    DEFAULT_HANDLER.to_string()
}

/// `api: false`, `api: true`, or a table of overrides.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawApi {
    Enabled(bool),
    Custom(RawApiConfig),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawApiConfig {
    name: Option<String>,
    path_part: Option<String>,
    stage: Option<String>,
}

/// Validated project-wide defaults.
#[derive(Debug, Clone)]
pub struct Defaults {
    /// Named credential profile.
    pub profile: Option<String>,
    pub region: Option<String>,
    /// Upper bound on a single layer build.
    pub build_timeout: Duration,
}

/// Validated layer declaration.
#[derive(Debug, Clone)]
pub struct LayerConfig {
    pub name: LayerName,
    pub requirements: PathBuf,
    pub runtime: Runtime,
    pub description: String,
    pub license: Option<String>,
    pub bucket: BucketName,
}

impl LayerConfig {
    pub fn build_spec(&self) -> BuildSpec {
        BuildSpec {
            layer_name: self.name.clone(),
            manifest: self.requirements.clone(),
            runtime: self.runtime,
            description: self.description.clone(),
            license: self.license.clone(),
        }
    }
}

/// A layer attached to a function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerRef {
    /// A literal layer version ARN, used verbatim.
    Arn(String),
    /// A layer declared in the same file; resolves to its latest version.
    Named(LayerName),
}

/// Validated function declaration.
#[derive(Debug, Clone)]
pub struct FunctionConfig {
    pub name: FunctionName,
    pub source: PathBuf,
    pub runtime: Runtime,
    pub handler: String,
    pub role: String,
    pub bucket: BucketName,
    pub layers: Vec<LayerRef>,
    pub description: String,
    pub environment: BTreeMap<String, String>,
    pub api: Option<ApiSpec>,
}

/// Complete validated configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub defaults: Defaults,
    pub layers: Vec<LayerConfig>,
    pub functions: Vec<FunctionConfig>,
}

impl Config {
    pub fn layer(&self, name: &str) -> Option<&LayerConfig> {
        self.layers.iter().find(|l| l.name.as_str() == name)
    }

    pub fn function(&self, name: &str) -> Option<&FunctionConfig> {
        self.functions.iter().find(|f| f.name.as_str() == name)
    }

    /// Build the deploy spec for a function, resolving named layers to their
    /// latest published versions. Layer order is kept.
    pub async fn function_spec(
        &self,
        function: &FunctionConfig,
        platform: &dyn FunctionPlatform,
    ) -> StratusResult<FunctionSpec> {
        let mut layers = Vec::with_capacity(function.layers.len());
        for layer in &function.layers {
            match layer {
                LayerRef::Arn(arn) => layers.push(arn.clone()),
                LayerRef::Named(name) => {
                    let latest = platform
                        .latest_layer_version(name)
                        .await
                        .map_err(|e| StratusError::at(Stage::Function, e))?
                        .ok_or_else(|| {
                            StratusError::at(
                                Stage::Function,
                                PlatformError::NotFound {
                                    kind: "layer version",
                                    name: name.to_string(),
                                },
                            )
                        })?;
                    tracing::debug!(layer = %name, arn = %latest.arn, "Resolved layer");
                    layers.push(latest.arn);
                }
            }
        }

        Ok(FunctionSpec {
            name: function.name.clone(),
            source: function.source.clone(),
            runtime: function.runtime,
            handler: function.handler.clone(),
            layers,
            bucket: function.bucket.clone(),
            profile: self.defaults.profile.clone(),
            description: function.description.clone(),
            role: function.role.clone(),
            environment: function.environment.clone(),
            api: function.api.clone(),
        })
    }
}

/// Configuration loader with strict validation.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate configuration from a YAML file. Relative paths in
    /// the file are resolved against the file's directory.
    pub fn load_file(path: impl AsRef<Path>) -> StratusResult<Config> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(StratusError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| StratusError::Io {
            context: "reading config file",
            source: e,
        })?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::load_string_in(&content, base)
    }

    /// Load and validate configuration from a YAML string. Relative paths are
    /// left relative to the working directory.
    pub fn load_string(content: &str) -> StratusResult<Config> {
        Self::load_string_in(content, Path::new(""))
    }

    fn load_string_in(content: &str, base: &Path) -> StratusResult<Config> {
        let raw: RawConfig =
            serde_yaml::from_str(content).map_err(|e| StratusError::ConfigParse {
                message: format!("YAML parse error: {}", e),
            })?;

        Self::validate(raw, base)
    }

    fn validate(raw: RawConfig, base: &Path) -> StratusResult<Config> {
        if raw.layers.is_empty() && raw.functions.is_empty() {
            return Err(HardValidationError::SchemaValidation {
                message: "At least one layer or function must be defined".to_string(),
            }
            .into());
        }

        if raw.defaults.build_timeout_secs == 0 {
            return Err(HardValidationError::InvalidFieldValue {
                field: "build_timeout_secs",
                value: "0".to_string(),
                reason: "Build timeout must be greater than 0".to_string(),
            }
            .into());
        }

        let default_bucket = raw
            .defaults
            .bucket
            .as_deref()
            .map(BucketName::new)
            .transpose()?;

        let mut layers = Vec::with_capacity(raw.layers.len());
        let mut seen_layers = HashSet::new();
        for (index, raw_layer) in raw.layers.into_iter().enumerate() {
            let layer = Self::validate_layer(raw_layer, index, base, default_bucket.as_ref())?;
            if !seen_layers.insert(layer.name.to_string()) {
                return Err(HardValidationError::DuplicateName {
                    kind: "layer",
                    name: layer.name.to_string(),
                }
                .into());
            }
            layers.push(layer);
        }

        let mut functions = Vec::with_capacity(raw.functions.len());
        let mut seen_functions = HashSet::new();
        for (index, raw_func) in raw.functions.into_iter().enumerate() {
            let func = Self::validate_function(
                raw_func,
                index,
                base,
                default_bucket.as_ref(),
                raw.defaults.role.as_deref(),
                &seen_layers,
            )?;
            if !seen_functions.insert(func.name.to_string()) {
                return Err(HardValidationError::DuplicateName {
                    kind: "function",
                    name: func.name.to_string(),
                }
                .into());
            }
            functions.push(func);
        }

        Ok(Config {
            defaults: Defaults {
                profile: raw.defaults.profile,
                region: raw.defaults.region,
                build_timeout: Duration::from_secs(raw.defaults.build_timeout_secs),
            },
            layers,
            functions,
        })
    }

    fn validate_layer(
        raw: RawLayerConfig,
        index: usize,
        base: &Path,
        default_bucket: Option<&BucketName>,
    ) -> StratusResult<LayerConfig> {
        let context = format!("layer at index {}", index);

        let name = LayerName::new(raw.name)?;
        let runtime: Runtime = raw.runtime.parse()?;
        if runtime.library_root().is_none() {
            return Err(HardValidationError::InvalidFieldValue {
                field: "runtime",
                value: runtime.to_string(),
                reason: "Layer builds need a Python or Node.js runtime".to_string(),
            }
            .into());
        }

        if raw.requirements.is_empty() {
            return Err(HardValidationError::MissingRequiredField {
                field: "requirements",
                context,
            }
            .into());
        }

        let bucket = Self::resolve_bucket(raw.bucket, default_bucket, &context)?;

        Ok(LayerConfig {
            name,
            requirements: base.join(raw.requirements),
            runtime,
            description: raw.description,
            license: raw.license,
            bucket,
        })
    }

    fn validate_function(
        raw: RawFunctionConfig,
        index: usize,
        base: &Path,
        default_bucket: Option<&BucketName>,
        default_role: Option<&str>,
        known_layers: &HashSet<String>,
    ) -> StratusResult<FunctionConfig> {
        let context = format!("function at index {}", index);

        let name = FunctionName::new(raw.name)?;
        let runtime: Runtime = raw.runtime.parse()?;

        if raw.source.is_empty() {
            return Err(HardValidationError::MissingRequiredField {
                field: "source",
                context,
            }
            .into());
        }

        if raw.handler.is_empty() || (runtime.library_root().is_some() && !raw.handler.contains('.'))
        {
            return Err(HardValidationError::InvalidFieldValue {
                field: "handler",
                value: raw.handler,
                reason: "Expected <module>.<function>".to_string(),
            }
            .into());
        }

        let role = raw
            .role
            .or_else(|| default_role.map(str::to_string))
            .ok_or_else(|| HardValidationError::MissingRequiredField {
                field: "role",
                context: format!("function '{}'", name),
            })?;

        let bucket = Self::resolve_bucket(raw.bucket, default_bucket, &format!("function '{}'", name))?;

        let mut layers = Vec::with_capacity(raw.layers.len());
        for layer in raw.layers {
            if layer.starts_with("arn:") {
                layers.push(LayerRef::Arn(layer));
            } else if known_layers.contains(&layer) {
                layers.push(LayerRef::Named(LayerName::new(layer)?));
            } else {
                return Err(HardValidationError::UnknownLayer {
                    function: name.to_string(),
                    layer,
                }
                .into());
            }
        }

        for key in raw.environment.keys() {
            if !is_env_key(key) {
                return Err(HardValidationError::InvalidFieldValue {
                    field: "environment",
                    value: key.clone(),
                    reason: "Variable names must start with a letter and contain only letters, digits and '_'"
                        .to_string(),
                }
                .into());
            }
        }

        let api = match raw.api {
            Some(RawApi::Enabled(false)) => None,
            None | Some(RawApi::Enabled(true)) => {
                Some(ApiSpec::for_function(&name, raw.description.clone()))
            }
            Some(RawApi::Custom(custom)) => {
                let mut api = ApiSpec::for_function(&name, raw.description.clone());
                if let Some(api_name) = custom.name {
                    api.name = api_name;
                }
                if let Some(path_part) = custom.path_part {
                    validate_path_part(&path_part)?;
                    api.path_part = path_part;
                }
                if let Some(stage) = custom.stage {
                    validate_stage(&stage)?;
                    api.stage = stage;
                }
                Some(api)
            }
        };

        Ok(FunctionConfig {
            name,
            source: base.join(raw.source),
            runtime,
            handler: raw.handler,
            role,
            bucket,
            layers,
            description: raw.description,
            environment: raw.environment,
            api,
        })
    }

    fn resolve_bucket(
        own: Option<String>,
        default_bucket: Option<&BucketName>,
        context: &str,
    ) -> StratusResult<BucketName> {
        match own {
            Some(bucket) => Ok(BucketName::new(bucket)?),
            None => default_bucket.cloned().ok_or_else(|| {
                HardValidationError::MissingRequiredField {
                    field: "bucket",
                    context: context.to_string(),
                }
                .into()
            }),
        }
    }
}

fn is_env_key(key: &str) -> bool {
    let mut chars = key.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn validate_path_part(path_part: &str) -> Result<(), HardValidationError> {
    if path_part.is_empty() || path_part.contains('/') {
        return Err(HardValidationError::InvalidFieldValue {
            field: "path_part",
            value: path_part.to_string(),
            reason: "Must be a single non-empty path segment".to_string(),
        });
    }
    Ok(())
}

fn validate_stage(stage: &str) -> Result<(), HardValidationError> {
    if stage.is_empty() || !stage.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(HardValidationError::InvalidFieldValue {
            field: "stage",
            value: stage.to_string(),
            reason: "Stage names contain only letters, digits and '_'".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::MemoryPlatform;
    use std::io::Write;

    const VALID_CONFIG: &str = r#"
defaults:
  profile: ml
  region: eu-west-1
  bucket: stratus-artifacts
  role: arn:aws:iam::123456789012:role/lambda-exec

layers:
  - name: modelling
    requirements: layers/modelling/requirements.txt
    runtime: python3.12
    description: Data science modelling
    license: MIT

functions:
  - name: predict
    source: functions/predict
    runtime: python3.12
    layers:
      - modelling
      - arn:aws:lambda:eu-west-1:017000801446:layer:AWSLambdaPowertoolsPythonV2:68
    environment:
      MODEL_NAME: churn
  - name: ingest
    source: functions/ingest
    runtime: nodejs20.x
    handler: index.handler
    api: false
"#;

    #[test]
    fn test_valid_config() {
        let config = ConfigLoader::load_string(VALID_CONFIG).unwrap();
        assert_eq!(config.layers.len(), 1);
        assert_eq!(config.functions.len(), 2);
        assert_eq!(config.defaults.profile.as_deref(), Some("ml"));
        assert_eq!(config.defaults.build_timeout, Duration::from_secs(900));

        let predict = config.function("predict").unwrap();
        assert_eq!(predict.handler, DEFAULT_HANDLER);
        assert_eq!(predict.bucket.as_str(), "stratus-artifacts");
        assert_eq!(predict.layers.len(), 2);
        assert!(matches!(predict.layers[0], LayerRef::Named(_)));

        let api = predict.api.as_ref().unwrap();
        assert_eq!(api.name, "predict");
        assert_eq!(api.path_part, "api");
        assert_eq!(api.stage, "test");

        assert!(config.function("ingest").unwrap().api.is_none());
    }

    #[test]
    fn test_empty_config_rejected() {
        let result = ConfigLoader::load_string("defaults:\n  bucket: b-123\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_runtime() {
        let yaml = r#"
defaults: { bucket: artifacts, role: r }
functions:
  - name: f
    source: src
    runtime: cobol85
"#;
        let err = ConfigLoader::load_string(yaml).unwrap_err();
        assert!(matches!(
            err,
            StratusError::HardValidation(HardValidationError::UnsupportedRuntime { .. })
        ));
    }

    #[test]
    fn test_layer_requires_buildable_runtime() {
        let yaml = r#"
defaults: { bucket: artifacts }
layers:
  - name: native
    requirements: Cargo.toml
    runtime: provided.al2023
"#;
        assert!(ConfigLoader::load_string(yaml).is_err());
    }

    #[test]
    fn test_missing_role() {
        let yaml = r#"
defaults: { bucket: artifacts }
functions:
  - name: f
    source: src
    runtime: python3.12
"#;
        let err = ConfigLoader::load_string(yaml).unwrap_err();
        assert!(err.to_string().contains("role"));
    }

    #[test]
    fn test_missing_bucket() {
        let yaml = r#"
layers:
  - name: deps
    requirements: requirements.txt
    runtime: python3.12
"#;
        let err = ConfigLoader::load_string(yaml).unwrap_err();
        assert!(err.to_string().contains("bucket"));
    }

    #[test]
    fn test_unknown_layer_reference() {
        let yaml = r#"
defaults: { bucket: artifacts, role: r }
functions:
  - name: f
    source: src
    runtime: python3.12
    layers: [missing]
"#;
        let err = ConfigLoader::load_string(yaml).unwrap_err();
        assert!(matches!(
            err,
            StratusError::HardValidation(HardValidationError::UnknownLayer { .. })
        ));
    }

    #[test]
    fn test_duplicate_function_names() {
        let yaml = r#"
defaults: { bucket: artifacts, role: r }
functions:
  - { name: f, source: a, runtime: python3.12 }
  - { name: f, source: b, runtime: python3.12 }
"#;
        let err = ConfigLoader::load_string(yaml).unwrap_err();
        assert!(matches!(
            err,
            StratusError::HardValidation(HardValidationError::DuplicateName { kind: "function", .. })
        ));
    }

    #[test]
    fn test_invalid_environment_key() {
        let yaml = r#"
defaults: { bucket: artifacts, role: r }
functions:
  - name: f
    source: src
    runtime: python3.12
    environment:
      "1BAD": x
"#;
        assert!(ConfigLoader::load_string(yaml).is_err());
    }

    #[test]
    fn test_custom_api() {
        let yaml = r#"
defaults: { bucket: artifacts, role: r }
functions:
  - name: f
    source: src
    runtime: python3.12
    api:
      name: public
      path_part: predict
      stage: prod
"#;
        let config = ConfigLoader::load_string(yaml).unwrap();
        let api = config.functions[0].api.clone().unwrap();
        assert_eq!(api.name, "public");
        assert_eq!(api.path_part, "predict");
        assert_eq!(api.stage, "prod");
    }

    #[test]
    fn test_invalid_path_part() {
        let yaml = r#"
defaults: { bucket: artifacts, role: r }
functions:
  - name: f
    source: src
    runtime: python3.12
    api: { path_part: "a/b" }
"#;
        assert!(ConfigLoader::load_string(yaml).is_err());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let yaml = r#"
defaults: { bucket: artifacts, role: r }
functions:
  - name: f
    source: src
    runtime: python3.12
    memory: 128
"#;
        let err = ConfigLoader::load_string(yaml).unwrap_err();
        assert!(matches!(err, StratusError::ConfigParse { .. }));
    }

    #[test]
    fn test_load_file_resolves_relative_paths() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("stratus.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(VALID_CONFIG.as_bytes()).unwrap();

        let config = ConfigLoader::load_file(&path).unwrap();
        assert_eq!(
            config.layer("modelling").unwrap().requirements,
            dir.path().join("layers/modelling/requirements.txt")
        );
        assert_eq!(
            config.function("predict").unwrap().source,
            dir.path().join("functions/predict")
        );
    }

    #[test]
    fn test_load_file_not_found() {
        let err = ConfigLoader::load_file("/nonexistent/stratus.yaml").unwrap_err();
        assert!(matches!(err, StratusError::ConfigNotFound { .. }));
    }

    #[tokio::test]
    async fn test_function_spec_resolves_named_layers_in_order() {
        let config = ConfigLoader::load_string(VALID_CONFIG).unwrap();
        let platform = MemoryPlatform::new();
        platform.seed_layer("modelling");
        let latest = platform.seed_layer("modelling");

        let predict = config.function("predict").unwrap();
        let spec = config.function_spec(predict, &platform).await.unwrap();

        assert_eq!(spec.layers[0], latest.arn);
        assert_eq!(
            spec.layers[1],
            "arn:aws:lambda:eu-west-1:017000801446:layer:AWSLambdaPowertoolsPythonV2:68"
        );
        assert_eq!(spec.profile.as_deref(), Some("ml"));
        assert_eq!(spec.environment.get("MODEL_NAME").map(String::as_str), Some("churn"));
    }

    #[tokio::test]
    async fn test_function_spec_unpublished_layer() {
        let config = ConfigLoader::load_string(VALID_CONFIG).unwrap();
        let platform = MemoryPlatform::new();

        let predict = config.function("predict").unwrap();
        let err = config.function_spec(predict, &platform).await.unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Function));
    }
}

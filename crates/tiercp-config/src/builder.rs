//! Layered configuration sources
//!
//! Built-in defaults form the bottom layer. Files are stacked on top in the
//! order they were added, skipping any that do not exist, and
//! `PREFIX__SECTION__KEY` environment variables go last. The merged result is
//! checked before it is handed out.

use crate::{Config, ConfigError, ConfigResult};
use config::{Environment, File, FileFormat};
use std::path::{Path, PathBuf};
use tiercp_types::BufferSize;
use tracing::debug;

/// Separator between the prefix, section and key of an environment variable
pub const ENV_SEPARATOR: &str = "__";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Stacks defaults, files and environment variables into a [`Config`]
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    files: Vec<PathBuf>,
    env_prefix: Option<String>,
}

impl ConfigBuilder {
    /// Start from the built-in defaults only
    pub fn new() -> Self {
        Self::default()
    }

    /// Layer a YAML, TOML or JSON file, chosen by extension
    pub fn add_source_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.files.push(path.as_ref().to_path_buf());
        self
    }

    /// Read `PREFIX__SECTION__KEY` variables on top of the files
    pub fn add_env_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Merge every layer and validate the result
    pub fn build(self) -> ConfigResult<Config> {
        let defaults = serde_yaml::to_value(Config::default())
            .map_err(|e| ConfigError::other(format!("Failed to serialize defaults: {}", e)))?;
        let mut layers = config::Config::builder().add_source(config::Config::try_from(&defaults)?);

        for path in self.files.iter().filter(|path| path.exists()) {
            debug!("Loading configuration from {}", path.display());
            layers = layers.add_source(File::from(path.as_path()).format(file_format(path)));
        }

        if let Some(prefix) = &self.env_prefix {
            layers = layers.add_source(
                Environment::with_prefix(prefix)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            );
        }

        let config: Config = layers.build()?.try_deserialize()?;
        validate(&config)?;
        Ok(config)
    }
}

fn file_format(path: &Path) -> FileFormat {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => FileFormat::Toml,
        Some("json") => FileFormat::Json,
        _ => FileFormat::Yaml,
    }
}

fn validate(config: &Config) -> ConfigResult<()> {
    BufferSize::new(config.engine.buffer_size.get())
        .map_err(|message| ConfigError::invalid_value("engine.buffer_size".to_string(), message))?;

    let detection = &config.detection;
    let checks = [
        (
            detection.refine_timeout_secs == 0,
            "detection.refine_timeout_secs",
            "must be greater than 0",
        ),
        (
            detection.max_concurrent_refinements == 0,
            "detection.max_concurrent_refinements",
            "must be greater than 0",
        ),
        (
            detection.powershell.trim().is_empty(),
            "detection.powershell",
            "must name an executable",
        ),
        (
            !LOG_LEVELS.contains(&config.logging.level.as_str()),
            "logging.level",
            "must be one of trace, debug, info, warn, error",
        ),
    ];

    match checks.iter().find(|(failed, _, _)| *failed) {
        Some((_, key, message)) => Err(ConfigError::invalid_value(*key, *message)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use tiercp_types::FailurePolicy;

    fn yaml_file(content: &str) -> NamedTempFile {
        let mut temp_file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(temp_file, "{}", content).unwrap();
        temp_file
    }

    #[test]
    fn test_builder_defaults() {
        let config = ConfigBuilder::new().build().unwrap();
        assert!(config.engine.use_ram_staging);
        assert_eq!(config.detection.powershell, "pwsh");
    }

    #[test]
    fn test_builder_yaml_file() {
        let temp_file = yaml_file(
            r#"
engine:
  use_ram_staging: false
  failure_policy: skip_and_report
detection:
  refine_timeout_secs: 3
"#,
        );

        let config = ConfigBuilder::new()
            .add_source_file(temp_file.path())
            .build()
            .unwrap();

        assert!(!config.engine.use_ram_staging);
        assert_eq!(config.engine.failure_policy, FailurePolicy::SkipAndReport);
        assert_eq!(config.detection.refine_timeout_secs, 3);
        assert_eq!(config.detection.max_concurrent_refinements, 2);
    }

    #[test]
    fn test_missing_file_is_ignored() {
        let config = ConfigBuilder::new()
            .add_source_file("/definitely/not/here/tiercp.yaml")
            .build()
            .unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_env_overrides_file() {
        let temp_file = yaml_file("detection:\n  refine_timeout_secs: 3\n");
        std::env::set_var("TIERCPBUILDERTEST__DETECTION__REFINE_TIMEOUT_SECS", "9");

        let config = ConfigBuilder::new()
            .add_source_file(temp_file.path())
            .add_env_prefix("TIERCPBUILDERTEST")
            .build();
        std::env::remove_var("TIERCPBUILDERTEST__DETECTION__REFINE_TIMEOUT_SECS");

        assert_eq!(config.unwrap().detection.refine_timeout_secs, 9);
    }

    #[test]
    fn test_builder_rejects_unaligned_buffer() {
        let temp_file = yaml_file("engine:\n  buffer_size: 5000\n");

        let result = ConfigBuilder::new().add_source_file(temp_file.path()).build();

        assert!(result
            .unwrap_err()
            .to_string()
            .contains("engine.buffer_size"));
    }

    #[test]
    fn test_builder_validation() {
        let temp_file = yaml_file("detection:\n  max_concurrent_refinements: 0\n");

        let result = ConfigBuilder::new().add_source_file(temp_file.path()).build();

        assert_eq!(
            result.unwrap_err().to_string(),
            "Invalid value for 'detection.max_concurrent_refinements': must be greater than 0"
        );
    }

    #[test]
    fn test_unknown_log_level_rejected() {
        let temp_file = yaml_file("logging:\n  level: loud\n");
        let result = ConfigBuilder::new().add_source_file(temp_file.path()).build();
        assert!(matches!(result, Err(ConfigError::InvalidValue { key, .. }) if key == "logging.level"));
    }
}

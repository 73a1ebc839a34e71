//! Configuration system for coffee-etl.
//!
//! Uses `figment` for layered configuration: defaults -> user config file ->
//! workspace config file -> environment -> CLI overrides.

use crate::data::features::DateDetection;
use crate::data::sink::OutputFormat;
use crate::error::EtlError;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the workspace-level config file.
pub const WORKSPACE_CONFIG: &str = "coffee-etl.toml";

/// Google Drive id of the published survey export.
pub const DEFAULT_FILE_ID: &str = "1vpSvMbFClBkrYE7MaO7Z2OXYjDnFqEjm";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EtlConfig {
    /// Cached raw dataset. Loaded when present, written after a remote fetch otherwise.
    #[serde(default)]
    pub local_file: Option<PathBuf>,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub features: FeatureConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the raw dataset comes from and how it is read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_file_id")]
    pub file_id: String,
    /// Full URL override; takes precedence over `file_id`.
    #[serde(default)]
    pub url: Option<String>,
    /// Cell values read as missing.
    #[serde(default = "default_null_tokens")]
    pub null_tokens: Vec<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            file_id: default_file_id(),
            url: None,
            null_tokens: default_null_tokens(),
        }
    }
}

impl SourceConfig {
    pub fn url(&self) -> String {
        self.url.clone().unwrap_or_else(|| {
            format!(
                "https://drive.google.com/uc?id={}&export=download",
                self.file_id
            )
        })
    }
}

fn default_file_id() -> String {
    DEFAULT_FILE_ID.to_string()
}

/// The tokens pandas reads as NaN by default.
pub fn default_null_tokens() -> Vec<String> {
    [
        "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
        "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

/// Output destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_path")]
    pub path: PathBuf,
    #[serde(default)]
    pub format: OutputFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
            format: OutputFormat::default(),
        }
    }
}

fn default_output_path() -> PathBuf {
    PathBuf::from("data/processed/cleaned_data.csv")
}

/// Feature derivation settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureConfig {
    #[serde(default)]
    pub date_detection: DateDetection,
}

/// Logging settings, applied by the binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive for console output.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Directory for daily-rolling JSON logs. Disabled when unset.
    #[serde(default)]
    pub json_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_dir: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Command-line values that override every other layer.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CliOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputOverride>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutputOverride {
    pub path: PathBuf,
}

impl CliOverrides {
    pub fn new(output: Option<PathBuf>, local_file: Option<PathBuf>) -> Self {
        Self {
            local_file,
            output: output.map(|path| OutputOverride { path }),
        }
    }
}

/// Path of the user-level config file, if a home directory is known.
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "coffee-etl", "coffee-etl")
        .map(|d| d.config_dir().join("config.toml"))
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. CLI overrides
/// 2. Environment variables (prefixed with `COFFEE_ETL_`, nested with `__`)
/// 3. Workspace config (`coffee-etl.toml` in `workspace`)
/// 4. User config (`~/.config/coffee-etl/config.toml`)
/// 5. Built-in defaults
pub fn load_config(workspace: &Path, overrides: &CliOverrides) -> Result<EtlConfig, EtlError> {
    let mut figment = Figment::from(Serialized::defaults(EtlConfig::default()));

    if let Some(user_config) = user_config_path().filter(|p| p.exists()) {
        figment = figment.merge(Toml::file(user_config));
    }

    let ws_config = workspace.join(WORKSPACE_CONFIG);
    if ws_config.exists() {
        figment = figment.merge(Toml::file(ws_config));
    }

    figment = figment
        .merge(Env::prefixed("COFFEE_ETL_").split("__"))
        .merge(Serialized::defaults(overrides));

    Ok(figment.extract()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults() {
        let config = EtlConfig::default();
        assert_eq!(
            config.output.path,
            PathBuf::from("data/processed/cleaned_data.csv")
        );
        assert_eq!(config.output.format, OutputFormat::Auto);
        assert_eq!(config.features.date_detection, DateDetection::Strict);
        assert!(config.local_file.is_none());
        assert!(config.source.null_tokens.contains(&"NaN".to_string()));
    }

    #[test]
    fn test_default_url_uses_file_id() {
        let source = SourceConfig::default();
        assert_eq!(
            source.url(),
            "https://drive.google.com/uc?id=1vpSvMbFClBkrYE7MaO7Z2OXYjDnFqEjm&export=download"
        );
    }

    #[test]
    fn test_layering() {
        Jail::expect_with(|jail| {
            jail.create_file(
                WORKSPACE_CONFIG,
                r#"
                local_file = "data/raw/dataset.csv"

                [output]
                path = "out/from_file.parquet"

                [features]
                date_detection = "lenient"
                "#,
            )?;
            jail.set_env("COFFEE_ETL_LOGGING__LEVEL", "debug");

            let config = load_config(jail.directory(), &CliOverrides::default())
                .map_err(|e| e.to_string())?;
            assert_eq!(config.local_file, Some(PathBuf::from("data/raw/dataset.csv")));
            assert_eq!(config.output.path, PathBuf::from("out/from_file.parquet"));
            assert_eq!(config.features.date_detection, DateDetection::Lenient);
            assert_eq!(config.logging.level, "debug");

            let overrides = CliOverrides::new(Some(PathBuf::from("cli.csv")), None);
            let config =
                load_config(jail.directory(), &overrides).map_err(|e| e.to_string())?;
            assert_eq!(config.output.path, PathBuf::from("cli.csv"));
            assert_eq!(config.local_file, Some(PathBuf::from("data/raw/dataset.csv")));
            Ok(())
        });
    }
}

//! Configuration management infrastructure.
//!
//! Persists operator preferences (default alias, certificate validity,
//! keystore format priority, output directory) as TOML, with JSON and YAML
//! export/import for portability.

use crate::domain::constants::{DEFAULT_ALIAS, DEFAULT_VALIDITY_DAYS};
use crate::domain::types::KeyAlias;
use crate::infra::error::{DocSignError, DocSignResult};
use crate::services::keystore::{KeystoreFormat, KeystoreLoader};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocSignConfiguration {
    /// Alias used when none is given on the command line
    pub default_alias: String,

    /// Validity of freshly issued certificates, in days
    pub validity_days: u32,

    /// Keystore formats in the order they are tried
    pub keystore_formats: Vec<String>,

    /// Where `issue` and `sign` write their files; current directory if unset
    pub output_directory: Option<PathBuf>,

    /// Whether to show verbose output
    pub verbose: bool,
}

impl Default for DocSignConfiguration {
    fn default() -> Self {
        Self {
            default_alias: DEFAULT_ALIAS.to_string(),
            validity_days: DEFAULT_VALIDITY_DAYS,
            keystore_formats: KeystoreFormat::PRIORITY
                .iter()
                .map(|f| f.as_str().to_string())
                .collect(),
            output_directory: None,
            verbose: false,
        }
    }
}

impl DocSignConfiguration {
    /// Parsed keystore format list.
    pub fn formats(&self) -> DocSignResult<Vec<KeystoreFormat>> {
        self.keystore_formats
            .iter()
            .map(|name| {
                name.parse::<KeystoreFormat>()
                    .map_err(DocSignError::ConfigurationError)
            })
            .collect()
    }

    /// Keystore loader honoring the configured priority.
    pub fn keystore_loader(&self) -> DocSignResult<KeystoreLoader> {
        Ok(KeystoreLoader::with_formats(self.formats()?))
    }

    /// Directory for output files.
    #[must_use]
    pub fn output_dir(&self) -> PathBuf {
        self.output_directory
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Validate configuration values
    pub fn validate(&self) -> DocSignResult<()> {
        KeyAlias::new(&self.default_alias).map_err(|e| {
            DocSignError::ConfigurationError(format!("Invalid default alias: {e}"))
        })?;

        if self.validity_days == 0 {
            return Err(DocSignError::ConfigurationError(
                "Validity days must be greater than 0".to_string(),
            ));
        }

        let formats = self.formats()?;
        if !formats.iter().any(KeystoreFormat::is_available) {
            return Err(DocSignError::ConfigurationError(format!(
                "No available keystore format in [{}]",
                self.keystore_formats.join(", ")
            )));
        }

        Ok(())
    }
}

/// Configuration manager for handling config files
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new configuration manager with default path
    pub fn new() -> DocSignResult<Self> {
        let config_path = Self::default_config_path()?;
        Ok(Self { config_path })
    }

    /// Create a configuration manager with custom path
    pub fn with_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            config_path: path.as_ref().to_path_buf(),
        }
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> DocSignResult<PathBuf> {
        if let Some(config_dir) = dirs::config_dir() {
            Ok(config_dir.join("docsign").join("config.toml"))
        } else {
            // Fallback to current directory
            Ok(PathBuf::from("docsign-config.toml"))
        }
    }

    /// Load configuration from file, creating default if it doesn't exist
    pub fn load_or_create_default(&self) -> DocSignResult<DocSignConfiguration> {
        if self.config_path.exists() {
            self.load()
        } else {
            log::info!(
                "Configuration file not found, creating default: {}",
                self.config_path.display()
            );
            let default_config = DocSignConfiguration::default();
            self.save(&default_config)?;
            Ok(default_config)
        }
    }

    /// Load configuration from file
    pub fn load(&self) -> DocSignResult<DocSignConfiguration> {
        log::debug!("Loading configuration from: {}", self.config_path.display());

        let content = fs::read_to_string(&self.config_path).map_err(|e| {
            DocSignError::ConfigurationError(format!(
                "Failed to read config file {}: {}",
                self.config_path.display(),
                e
            ))
        })?;

        let config: DocSignConfiguration = toml::from_str(&content).map_err(|e| {
            DocSignError::ConfigurationError(format!("Failed to parse config file: {e}"))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, config: &DocSignConfiguration) -> DocSignResult<()> {
        log::info!("Saving configuration to: {}", self.config_path.display());

        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                DocSignError::ConfigurationError(format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let content = toml::to_string_pretty(config).map_err(|e| {
            DocSignError::ConfigurationError(format!("Failed to serialize config: {e}"))
        })?;

        fs::write(&self.config_path, content).map_err(|e| {
            DocSignError::ConfigurationError(format!(
                "Failed to write config file {}: {}",
                self.config_path.display(),
                e
            ))
        })?;

        Ok(())
    }

    /// Update a specific configuration value
    pub fn update_value(&self, key: &str, value: &str) -> DocSignResult<()> {
        let mut config = self.load_or_create_default()?;

        match key {
            "default_alias" => {
                KeyAlias::new(value)?;
                config.default_alias = value.to_string();
            }
            "validity_days" => {
                config.validity_days = value.parse().map_err(|_| {
                    DocSignError::ConfigurationError(format!("Invalid number of days: {value}"))
                })?;
            }
            "keystore_formats" => {
                config.keystore_formats = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            "output_directory" => {
                config.output_directory = if value.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                };
            }
            "verbose" => {
                config.verbose = value.parse().map_err(|_| {
                    DocSignError::ConfigurationError(format!("Invalid boolean value: {value}"))
                })?;
            }
            _ => {
                return Err(DocSignError::ConfigurationError(format!(
                    "Unknown configuration key: {key}"
                )));
            }
        }

        config.validate()?;
        self.save(&config)
    }

    /// Get the configuration file path
    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Export configuration as a portable format
    pub fn export_config(&self, format: ExportFormat) -> DocSignResult<String> {
        let config = self.load_or_create_default()?;

        match format {
            ExportFormat::Toml => toml::to_string_pretty(&config).map_err(|e| {
                DocSignError::ConfigurationError(format!("TOML export failed: {e}"))
            }),
            ExportFormat::Json => serde_json::to_string_pretty(&config).map_err(|e| {
                DocSignError::ConfigurationError(format!("JSON export failed: {e}"))
            }),
            ExportFormat::Yaml => serde_yaml::to_string(&config).map_err(|e| {
                DocSignError::ConfigurationError(format!("YAML export failed: {e}"))
            }),
        }
    }

    /// Import configuration from a string
    pub fn import_config(&self, content: &str, format: ExportFormat) -> DocSignResult<()> {
        let config: DocSignConfiguration = match format {
            ExportFormat::Toml => toml::from_str(content).map_err(|e| {
                DocSignError::ConfigurationError(format!("TOML import failed: {e}"))
            })?,
            ExportFormat::Json => serde_json::from_str(content).map_err(|e| {
                DocSignError::ConfigurationError(format!("JSON import failed: {e}"))
            })?,
            ExportFormat::Yaml => serde_yaml::from_str(content).map_err(|e| {
                DocSignError::ConfigurationError(format!("YAML import failed: {e}"))
            })?,
        };

        config.validate()?;
        self.save(&config)
    }
}

/// Configuration export/import formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Toml,
    Json,
    Yaml,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_configuration() {
        let config = DocSignConfiguration::default();
        assert_eq!(config.default_alias, "mykey");
        assert_eq!(config.validity_days, 365);
        assert_eq!(
            config.keystore_formats,
            vec!["jks", "pkcs12", "bks", "default"]
        );
        assert!(config.validate().is_ok());
        assert_eq!(
            config.keystore_loader().unwrap().select_format().unwrap(),
            KeystoreFormat::Pkcs12
        );
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: DocSignConfiguration = toml::from_str("validity_days = 30\n").unwrap();
        assert_eq!(config.validity_days, 30);
        assert_eq!(config.default_alias, "mykey");
        assert!(config.output_directory.is_none());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = DocSignConfiguration::default();
        config.validity_days = 0;
        assert!(config.validate().is_err());

        let mut config = DocSignConfiguration::default();
        config.keystore_formats = vec!["jks".to_string(), "bks".to_string()];
        assert!(config.validate().is_err());

        let mut config = DocSignConfiguration::default();
        config.keystore_formats = vec!["jceks".to_string()];
        assert!(config.validate().is_err());

        let mut config = DocSignConfiguration::default();
        config.default_alias = "../escape".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_manager_with_temp_path() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");
        let manager = ConfigManager::with_path(&config_path);

        let config = manager.load_or_create_default().unwrap();
        assert!(config_path.exists());

        let loaded_config = manager.load().unwrap();
        assert_eq!(config, loaded_config);
    }

    #[test]
    fn test_update_value() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_path(temp_dir.path().join("config.toml"));

        manager.update_value("validity_days", "30").unwrap();
        manager
            .update_value("keystore_formats", "pkcs12, default")
            .unwrap();
        manager.update_value("output_directory", "/tmp/out").unwrap();

        let config = manager.load().unwrap();
        assert_eq!(config.validity_days, 30);
        assert_eq!(config.keystore_formats, vec!["pkcs12", "default"]);
        assert_eq!(config.output_dir(), PathBuf::from("/tmp/out"));

        assert!(manager.update_value("validity_days", "soon").is_err());
        assert!(manager.update_value("no_such_key", "x").is_err());
        assert!(manager.update_value("keystore_formats", "jks").is_err());
        // rejected updates leave the file untouched
        assert_eq!(manager.load().unwrap(), config);
    }

    #[test]
    fn test_export_import_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let source = ConfigManager::with_path(temp_dir.path().join("source.toml"));
        source.update_value("default_alias", "signer").unwrap();

        for format in [ExportFormat::Toml, ExportFormat::Json, ExportFormat::Yaml] {
            let exported = source.export_config(format).unwrap();
            let target = ConfigManager::with_path(temp_dir.path().join("target.toml"));
            target.import_config(&exported, format).unwrap();
            assert_eq!(target.load().unwrap().default_alias, "signer");
        }
    }
}

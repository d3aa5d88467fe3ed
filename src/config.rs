//! Configuration for the interchange tools
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (vault-yaml.toml)
//! - Environment variables (VAULT_YAML__*)
//!
//! ## Example config file (vault-yaml.toml):
//! ```toml
//! [database]
//! kind = "x86"
//! game_id = "CARBON"
//!
//! [load]
//! files = ["gameplay", "attributes"]
//!
//! [output]
//! format = "compact"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::database::Database;
use crate::schema::DatabaseKind;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InterchangeConfig {
    /// Destination database settings
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Load settings
    #[serde(default)]
    pub load: LoadConfig,

    /// Report output settings
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Word size of the database; selects the field key hash
    #[serde(default)]
    pub kind: DatabaseKind,

    /// Game profile identifier, carried on the database
    #[serde(default)]
    pub game_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadConfig {
    /// File names to load; empty means every file in the manifest
    #[serde(default)]
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
}

/// Output format for JSON reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pretty,
    Compact,
}

impl InterchangeConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, layering an explicit file over the default locations
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = [
            "vault-yaml.toml",
            ".vault-yaml.toml",
            "config/vault-yaml.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(config_dir) = directories::ProjectDirs::from("dev", "vault", "vault-yaml") {
            let xdg_config = config_dir.config_dir().join("vault-yaml.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // VAULT_YAML__DATABASE__KIND=x86
        builder = builder.add_source(
            Environment::with_prefix("VAULT_YAML")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// The configured file filter, `None` when every file should load
    pub fn file_filter(&self) -> Option<&[String]> {
        if self.load.files.is_empty() {
            None
        } else {
            Some(&self.load.files)
        }
    }

    /// Empty destination database with the configured kind and game id
    pub fn new_database(&self) -> Database {
        Database::new(self.database.kind).with_game_id(self.database.game_id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = InterchangeConfig::default();
        assert_eq!(config.database.kind, DatabaseKind::X64);
        assert!(config.file_filter().is_none());
        assert_eq!(config.output.format, OutputFormat::Pretty);
    }

    #[test]
    fn test_serialize_config() {
        let config = InterchangeConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[database]"));
        assert!(toml_str.contains("kind = \"x64\""));
    }

    #[test]
    fn test_explicit_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[database]\nkind = \"x86\"\ngame_id = \"CARBON\"\n\n[load]\nfiles = [\"gameplay\"]\n",
        )
        .unwrap();

        let config = InterchangeConfig::load_from(path.to_str()).unwrap();
        assert_eq!(config.database.kind, DatabaseKind::X86);
        assert_eq!(config.file_filter(), Some(&["gameplay".to_string()][..]));

        let database = config.new_database();
        assert_eq!(database.kind, DatabaseKind::X86);
        assert_eq!(database.game_id, "CARBON");
    }

    #[test]
    fn test_save_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saved.toml");
        let mut config = InterchangeConfig::default();
        config.output.format = OutputFormat::Compact;
        config.save(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let reloaded: InterchangeConfig = toml::from_str(&content).unwrap();
        assert_eq!(reloaded.output.format, OutputFormat::Compact);
    }
}

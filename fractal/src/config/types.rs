use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::compose::DEFAULT_MAX_DEPTH;

/// Prefix of every environment override, e.g. `FRACTAL_BIND_ADDR`.
pub const ENV_PREFIX: &str = "FRACTAL_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value '{value}' for {var}: {reason}")]
    InvalidEnv {
        var: String,
        value: String,
        reason: String,
    },
}

/// Process-wide settings, built once at startup and passed explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub app_name: String,
    pub environment: String,
    pub database_url: Option<String>,
    pub bind_addr: String,
    /// Directory of the root unit.
    pub root_dir: PathBuf,
    pub verbose_discovery: bool,
    pub max_depth: usize,
    /// Serve the structure report at `GET /_structure`.
    pub expose_structure: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_name: "Fractal App".to_string(),
            environment: "development".to_string(),
            database_url: None,
            bind_addr: "0.0.0.0:8000".to_string(),
            root_dir: PathBuf::from("app"),
            verbose_discovery: false,
            max_depth: DEFAULT_MAX_DEPTH,
            expose_structure: false,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file. Missing keys keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Defaults overridden from `FRACTAL_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = Settings::default();
        settings.apply_env()?;
        Ok(settings)
    }

    /// Optional file first, then the environment on top.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Self::from_env();
        };
        let mut settings = Self::from_file(path)?;
        settings.apply_env()?;
        Ok(settings)
    }

    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(format!("{}{}", ENV_PREFIX, key)).ok())
    }

    /// Apply overrides from `lookup`, which receives the key without prefix
    /// (`APP_NAME`, `BIND_ADDR`, ...).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(app_name) = lookup("APP_NAME") {
            self.app_name = app_name;
        }
        if let Some(environment) = lookup("ENVIRONMENT") {
            self.environment = environment;
        }
        if let Some(database_url) = lookup("DATABASE_URL") {
            self.database_url = Some(database_url).filter(|url| !url.is_empty());
        }
        if let Some(bind_addr) = lookup("BIND_ADDR") {
            self.bind_addr = bind_addr;
        }
        if let Some(root_dir) = lookup("ROOT_DIR") {
            self.root_dir = PathBuf::from(root_dir);
        }
        if let Some(value) = lookup("VERBOSE_DISCOVERY") {
            self.verbose_discovery = parse_flag("VERBOSE_DISCOVERY", &value)?;
        }
        if let Some(value) = lookup("MAX_DEPTH") {
            self.max_depth = value.parse().map_err(|e: std::num::ParseIntError| {
                invalid_env("MAX_DEPTH", &value, e.to_string())
            })?;
        }
        if let Some(value) = lookup("EXPOSE_STRUCTURE") {
            self.expose_structure = parse_flag("EXPOSE_STRUCTURE", &value)?;
        }
        Ok(())
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(invalid_env(key, value, "expected a boolean".to_string())),
    }
}

fn invalid_env(key: &str, value: &str, reason: String) -> ConfigError {
    ConfigError::InvalidEnv {
        var: format!("{}{}", ENV_PREFIX, key),
        value: value.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.app_name, "Fractal App");
        assert_eq!(settings.environment, "development");
        assert_eq!(settings.max_depth, 32);
        assert!(settings.database_url.is_none());
        assert!(!settings.expose_structure);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "app_name = \"Octopus App\"\nexpose_structure = true").unwrap();

        let settings = Settings::from_file(file.path()).unwrap();
        assert_eq!(settings.app_name, "Octopus App");
        assert!(settings.expose_structure);
        assert_eq!(settings.bind_addr, "0.0.0.0:8000");
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "app_nmae = \"typo\"").unwrap();
        assert!(matches!(
            Settings::from_file(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        let result = Settings::from_file("/nonexistent/fractal.toml");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_load_without_file_reads_the_environment() {
        let loaded = Settings::load(None).unwrap();
        let from_env = Settings::from_env().unwrap();
        assert_eq!(loaded, from_env);
    }

    #[test]
    fn test_overrides() {
        let mut settings = Settings::default();
        settings
            .apply_overrides(lookup(&[
                ("APP_NAME", "Gateway"),
                ("MAX_DEPTH", "4"),
                ("VERBOSE_DISCOVERY", "yes"),
                ("DATABASE_URL", ""),
            ]))
            .unwrap();
        assert_eq!(settings.app_name, "Gateway");
        assert_eq!(settings.max_depth, 4);
        assert!(settings.verbose_discovery);
        assert!(settings.database_url.is_none());
    }

    #[test]
    fn test_invalid_override_names_the_variable() {
        let mut settings = Settings::default();
        let err = settings
            .apply_overrides(lookup(&[("MAX_DEPTH", "deep")]))
            .unwrap_err();
        assert!(err.to_string().contains("FRACTAL_MAX_DEPTH"));
    }
}

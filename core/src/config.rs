use crate::errors::{AdminError, AdminResult};
use crate::token::ExecutionContext;
use config::{Config, Environment, File, FileFormat, Map};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const APP_NAME: &str = "lms-admin";
pub const ENV_PREFIX: &str = "LMS_ADMIN";
/// Variables consulted for the backend URL when no config layer sets one
pub const BASE_URL_FALLBACK_VARS: [&str; 2] = ["API_BASE_URL", "BACKEND_URL"];

/// Configuration for the admin client
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AdminConfig {
    pub backend_url: Option<String>,
    pub session_file: Option<PathBuf>,
    pub log_level: Option<String>,
    pub context: Option<ExecutionContext>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            backend_url: None,
            session_file: None,
            log_level: Some("info".to_string()),
            context: Some(ExecutionContext::Server),
        }
    }
}

impl AdminConfig {
    /// Load the layered configuration: defaults, then the TOML file (the
    /// given path or `~/.config/lms-admin/config.toml`), then `LMS_ADMIN_*`
    /// environment variables. A `.env` file in the working directory is
    /// read first when present.
    pub fn load(path: Option<&Path>) -> AdminResult<Self> {
        if let Ok(dotenv) = dotenvy::dotenv() {
            tracing::debug!(path = %dotenv.display(), "Loaded .env");
        }
        Self::load_layered(path, None)
    }

    /// `env` replaces the process environment when given
    fn load_layered(path: Option<&Path>, env: Option<Map<String, String>>) -> AdminResult<Self> {
        let file = match path {
            Some(path) => Some(path.to_path_buf()),
            None => get_default_config_file(APP_NAME).ok(),
        };

        let mut builder = Config::builder();
        if let Some(file) = &file {
            builder = builder.add_source(
                File::from(file.as_path())
                    .format(FileFormat::Toml)
                    .required(path.is_some()),
            );
        }
        builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).source(env.clone()));

        let settings = builder
            .build()
            .map_err(|e| AdminError::Config(format!("Failed to load configuration: {}", e)))?;
        let mut layered: Self = settings
            .try_deserialize()
            .map_err(|e| AdminError::Config(format!("Invalid configuration: {}", e)))?;

        if layered.backend_url.as_deref().map_or(true, str::is_empty) {
            layered.backend_url = BASE_URL_FALLBACK_VARS.iter().find_map(|key| {
                let value = match &env {
                    Some(env) => env.get(*key).cloned(),
                    None => std::env::var(key).ok(),
                };
                value.filter(|v| !v.is_empty())
            });
        }

        Ok(Self::default().merge(&layered))
    }

    /// Loads configuration from a file if it exists, otherwise returns the default config
    pub fn load_from_file(path: &Path) -> AdminResult<Self> {
        if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| {
                AdminError::Config(format!("Failed to read config file: {}", e))
            })?;

            let config: Self = toml::from_str(&content).map_err(|e| {
                AdminError::Config(format!("Failed to parse config file: {}", e))
            })?;

            Ok(Self::default().merge(&config))
        } else {
            Ok(Self::default())
        }
    }

    /// Saves configuration to a file
    pub fn save_to_file(&self, path: &Path) -> AdminResult<()> {
        let content = toml::to_string(self)
            .map_err(|e| AdminError::Config(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                AdminError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        fs::write(path, content)
            .map_err(|e| AdminError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Merges this config with another config, preferring values from the other config if present
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            backend_url: other.backend_url.clone().or_else(|| self.backend_url.clone()),
            session_file: other
                .session_file
                .clone()
                .or_else(|| self.session_file.clone()),
            log_level: other.log_level.clone().or_else(|| self.log_level.clone()),
            context: other.context.or(self.context),
        }
    }

    /// Backend base URL; empty when unconfigured
    pub fn base_url(&self) -> &str {
        self.backend_url.as_deref().unwrap_or("")
    }

    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }

    pub fn context(&self) -> ExecutionContext {
        self.context.unwrap_or_default()
    }

    /// Where the CLI persists its session between runs
    pub fn session_file_path(&self) -> AdminResult<PathBuf> {
        match &self.session_file {
            Some(path) => Ok(path.clone()),
            None => get_default_session_file(APP_NAME),
        }
    }
}

/// Helper function to get default config directory
pub fn get_default_config_dir(app_name: &str) -> AdminResult<PathBuf> {
    let home_dir = dirs::home_dir().ok_or_else(|| {
        AdminError::Config("Could not determine home directory".to_string())
    })?;

    Ok(home_dir.join(".config").join(app_name))
}

/// Helper function to get default config file path
pub fn get_default_config_file(app_name: &str) -> AdminResult<PathBuf> {
    Ok(get_default_config_dir(app_name)?.join("config.toml"))
}

pub fn get_default_session_file(app_name: &str) -> AdminResult<PathBuf> {
    Ok(get_default_config_dir(app_name)?.join("session.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> Map<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = AdminConfig::load_from_file(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, AdminConfig::default());
        assert_eq!(config.base_url(), "");
        assert_eq!(config.context(), ExecutionContext::Server);
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = AdminConfig {
            backend_url: Some("https://lms.example.com/api".to_string()),
            session_file: Some(dir.path().join("session.json")),
            log_level: Some("debug".to_string()),
            context: Some(ExecutionContext::Browser),
        };

        config.save_to_file(&path).unwrap();
        assert_eq!(AdminConfig::load_from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_merge_prefers_other() {
        let base = AdminConfig {
            backend_url: Some("http://a".to_string()),
            ..Default::default()
        };
        let other = AdminConfig {
            backend_url: None,
            session_file: None,
            log_level: Some("warn".to_string()),
            context: None,
        };

        let merged = base.merge(&other);
        assert_eq!(merged.base_url(), "http://a");
        assert_eq!(merged.log_level(), "warn");
        assert_eq!(merged.context(), ExecutionContext::Server);
    }

    #[test]
    fn test_environment_overrides_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "backend_url = \"http://from-file\"\nlog_level = \"debug\"\n",
        )
        .unwrap();

        let config = AdminConfig::load_layered(
            Some(&path),
            Some(env(&[("LMS_ADMIN_BACKEND_URL", "http://from-env")])),
        )
        .unwrap();

        assert_eq!(config.base_url(), "http://from-env");
        assert_eq!(config.log_level(), "debug");
    }

    #[test]
    fn test_base_url_fallback_variables() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "log_level = \"info\"\n").unwrap();

        let config = AdminConfig::load_layered(
            Some(&path),
            Some(env(&[
                ("BACKEND_URL", "http://backend"),
                ("API_BASE_URL", "http://api"),
            ])),
        )
        .unwrap();
        assert_eq!(config.base_url(), "http://api");

        let config =
            AdminConfig::load_layered(Some(&path), Some(env(&[("BACKEND_URL", "http://backend")])))
                .unwrap();
        assert_eq!(config.base_url(), "http://backend");
    }

    #[test]
    fn test_explicit_file_must_exist() {
        let dir = TempDir::new().unwrap();
        let result = AdminConfig::load_layered(Some(&dir.path().join("missing.toml")), Some(env(&[])));
        assert!(matches!(result, Err(AdminError::Config(_))));
    }

    #[test]
    fn test_session_file_override() {
        let config = AdminConfig {
            session_file: Some(PathBuf::from("/tmp/lms-session.json")),
            ..Default::default()
        };
        assert_eq!(
            config.session_file_path().unwrap(),
            PathBuf::from("/tmp/lms-session.json")
        );
    }
}

//! Server configuration.
//!
//! Priority: environment variables > config file > defaults. The config
//! file is YAML, by default at `~/.config/docvault/config.yaml`.

use serde::Deserialize;
use std::path::PathBuf;

use crate::server::EmailConfig;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Port to listen on
    pub port: u16,
    /// Path to the SQLite database
    pub database_path: PathBuf,
    /// Directory for stored document content
    pub content_dir: PathBuf,
    /// Base URL used when building file links
    pub public_url: String,
    /// Secret for signing session tokens
    pub jwt_secret: String,
    /// Session token lifetime in hours
    pub token_ttl_hours: i64,
    /// Verification code lifetime in minutes
    pub otp_ttl_minutes: i64,
    /// SMTP settings for verification mail
    pub email: EmailConfig,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("docvault");
        Self {
            port: 8080,
            database_path: data_dir.join("docvault.db"),
            content_dir: data_dir.join("content"),
            public_url: "http://localhost:8080".to_string(),
            jwt_secret: "change-me".to_string(),
            token_ttl_hours: 24,
            otp_ttl_minutes: 10,
            email: EmailConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        // Start with defaults
        let mut config = Self::default();

        // Try to load from config file
        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            config = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;
        }

        // Apply environment variable overrides
        if let Ok(port) = std::env::var("DOCVAULT_PORT") {
            if let Ok(port) = port.parse() {
                config.port = port;
            }
        }
        if let Ok(db_path) = std::env::var("DOCVAULT_DATABASE_PATH") {
            config.database_path = PathBuf::from(db_path);
        }
        if let Ok(content_dir) = std::env::var("DOCVAULT_CONTENT_DIR") {
            config.content_dir = PathBuf::from(content_dir);
        }
        if let Ok(public_url) = std::env::var("DOCVAULT_PUBLIC_URL") {
            config.public_url = public_url;
        }
        if let Ok(secret) = std::env::var("DOCVAULT_JWT_SECRET") {
            config.jwt_secret = secret;
        }

        Ok(config)
    }

    /// Default config file path: ~/.config/docvault/config.yaml
    pub fn default_config_path() -> PathBuf {
        std::env::var("DOCVAULT_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::config_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("docvault")
                    .join("config.yaml")
            })
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::ReadError(_, e) => Some(e),
            ConfigError::ParseError(_, e) => Some(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();

        assert_eq!(config.port, 8080);
        assert_eq!(config.token_ttl_hours, 24);
        assert_eq!(config.otp_ttl_minutes, 10);
        assert!(config.database_path.ends_with("docvault.db"));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::load(Some(temp_dir.path().join("nope.yaml"))).unwrap();

        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        std::fs::write(
            &path,
            r#"
port: 9000
jwt_secret: "file-secret"
otp_ttl_minutes: 5
email:
  smtp_host: "mail.example.com"
  smtp_port: 587
"#,
        )
        .unwrap();

        let config = Config::load(Some(path)).unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.jwt_secret, "file-secret");
        assert_eq!(config.otp_ttl_minutes, 5);
        assert_eq!(config.email.smtp_host, "mail.example.com");
        // Unset fields keep their defaults
        assert_eq!(config.token_ttl_hours, 24);
    }

    #[test]
    fn test_load_malformed_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        std::fs::write(&path, "port: [not a number").unwrap();

        assert!(matches!(
            Config::load(Some(path)),
            Err(ConfigError::ParseError(_, _))
        ));
    }
}

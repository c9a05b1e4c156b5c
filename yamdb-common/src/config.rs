//! Configuration loading
//!
//! Resolution priority, highest first:
//! 1. Command-line argument (applied by the binary)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the TOML config file
pub const CONFIG_ENV_VAR: &str = "YAMDB_CONFIG";

/// Config file looked up in the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "yamdb.toml";

/// Complete service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub auth: AuthSettings,
    pub email: EmailSettings,
    pub api: ApiSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// SQLite database file, created on first start
    pub path: PathBuf,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("yamdb.db"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// HMAC secret for access tokens. When unset, a generated secret is
    /// persisted in the database settings table.
    pub secret_key: Option<String>,
    /// Access token lifetime in seconds
    pub token_lifetime_secs: u64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            secret_key: None,
            token_lifetime_secs: 24 * 60 * 60,
        }
    }
}

/// Where confirmation emails go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailBackend {
    /// Plain SMTP relay
    Smtp,
    /// One message file per email in `outbox_dir`
    File,
    /// Message written to the log
    Log,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailSettings {
    pub backend: MailBackend,
    pub from_address: String,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub outbox_dir: PathBuf,
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            backend: MailBackend::File,
            from_address: "noreply@yamdb.local".to_string(),
            smtp_host: "localhost".to_string(),
            smtp_port: 25,
            outbox_dir: PathBuf::from("sent_emails"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    /// Items per page on list endpoints
    pub page_size: i64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self { page_size: 10 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive when RUST_LOG is not set
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from an explicit file, `$YAMDB_CONFIG`, or `./yamdb.toml`,
    /// then apply environment overrides.
    ///
    /// A missing default file is not an error; a missing explicit file is.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let explicit = explicit_path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from));

        let mut settings = match explicit {
            Some(path) => Self::from_file(&path)?,
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    info!("No config file found, using compiled defaults");
                    Self::default()
                }
            }
        };

        settings.apply_env();
        settings.validate()?;
        Ok(settings)
    }

    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let settings = Self::from_toml_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        info!("Loaded configuration from {}", path.display());
        Ok(settings)
    }

    /// Parse TOML text; absent keys keep their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Apply `YAMDB_*` environment overrides
    pub fn apply_env(&mut self) {
        if let Ok(host) = std::env::var("YAMDB_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("YAMDB_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => warn!("Ignoring invalid YAMDB_PORT value: {}", port),
            }
        }
        if let Ok(path) = std::env::var("YAMDB_DATABASE") {
            self.database.path = PathBuf::from(path);
        }
        if let Ok(secret) = std::env::var("YAMDB_SECRET_KEY") {
            self.auth.secret_key = Some(secret);
        }
        if let Ok(backend) = std::env::var("YAMDB_MAIL_BACKEND") {
            match backend.to_ascii_lowercase().as_str() {
                "smtp" => self.email.backend = MailBackend::Smtp,
                "file" => self.email.backend = MailBackend::File,
                "log" => self.email.backend = MailBackend::Log,
                other => warn!("Ignoring unknown YAMDB_MAIL_BACKEND value: {}", other),
            }
        }
    }

    /// Reject settings the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.api.page_size < 1 {
            return Err(Error::Config("api.page_size must be at least 1".to_string()));
        }
        if self.auth.token_lifetime_secs == 0 {
            return Err(Error::Config(
                "auth.token_lifetime_secs must be positive".to_string(),
            ));
        }
        if matches!(&self.auth.secret_key, Some(key) if key.trim().is_empty()) {
            return Err(Error::Config("auth.secret_key must not be empty".to_string()));
        }
        Ok(())
    }
}

//! Portal configuration file.
//!
//! ```toml
//! [server]
//! listen = "127.0.0.1:8080"
//! rate_limit_per_minute = 120
//!
//! [logging]
//! level = "info"
//! json = false
//!
//! [[seed.institutions]]
//! name = "MUP"
//! city = "Beograd"
//! address = "Kneza Miloša 103"
//!
//! [[seed.types]]
//! name = "Documents"
//!
//! [[seed.services]]
//! name = "Passport"
//! institution = "MUP"
//! type = "Documents"
//! fee = "500.00"
//!
//! [[seed.users]]
//! name = "Petar Petrović"
//! email = "officer@euprava.rs"
//! password = "officer123"
//! date_of_birth = "1980-02-02"
//! jmbg = "0202980710005"
//! role = "OFFICER"
//! ```
//!
//! Services name their institution and type; users may carry a fixed
//! `token` so that scripted clients can skip the login step.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use euprava_storage::{Role, ServiceStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("could not parse '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortalConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub seed: SeedConfig,
}

/// `[server]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    /// Requests per minute per client IP.
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: u64,

    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,

    #[serde(default = "default_true")]
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            rate_limit_per_minute: default_rate_limit(),
            max_body_size: default_max_body_size(),
            enable_cors: true,
        }
    }
}

/// `[logging]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// `[seed]` -- reference data and accounts created at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedConfig {
    #[serde(default)]
    pub institutions: Vec<SeedInstitution>,
    #[serde(default)]
    pub types: Vec<SeedType>,
    #[serde(default)]
    pub services: Vec<SeedService>,
    #[serde(default)]
    pub users: Vec<SeedUser>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedInstitution {
    pub name: String,
    pub city: String,
    pub address: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedType {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedService {
    pub name: String,
    /// Name of a seeded institution.
    pub institution: String,
    /// Name of a seeded type.
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Decimal string, e.g. `"500.00"`.
    pub fee: Decimal,
    #[serde(default)]
    pub requires_attachment: bool,
    #[serde(default = "default_service_status")]
    pub status: ServiceStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub date_of_birth: String,
    pub jmbg: String,
    #[serde(default = "default_role")]
    pub role: Role,
    /// Fixed bearer token installed for this user.
    #[serde(default)]
    pub token: Option<String>,
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_rate_limit() -> u64 {
    120
}

fn default_max_body_size() -> usize {
    1024 * 1024
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_status() -> ServiceStatus {
    ServiceStatus::Active
}

fn default_role() -> Role {
    Role::Citizen
}

impl PortalConfig {
    /// Load from `path`, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            None => Self::default(),
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                toml::from_str(&content).map_err(|source| ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Cross-field checks serde cannot express. All problems are reported at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        if self.server.rate_limit_per_minute == 0 {
            errors.push("server.rate_limit_per_minute must be at least 1".to_string());
        }
        if self.server.max_body_size == 0 {
            errors.push("server.max_body_size must be at least 1".to_string());
        }

        let seed = &self.seed;
        for service in &seed.services {
            if !seed.institutions.iter().any(|i| i.name == service.institution) {
                errors.push(format!(
                    "service '{}' references unknown institution '{}'",
                    service.name, service.institution
                ));
            }
            if !seed.types.iter().any(|t| t.name == service.type_name) {
                errors.push(format!(
                    "service '{}' references unknown type '{}'",
                    service.name, service.type_name
                ));
            }
            if service.fee < Decimal::ZERO {
                errors.push(format!("service '{}' has a negative fee", service.name));
            }
        }

        let mut tokens: Vec<&str> = Vec::new();
        for user in &seed.users {
            if user.password.chars().count() < 6 {
                errors.push(format!(
                    "user '{}' password must be at least 6 characters",
                    user.email
                ));
            }
            if let Some(token) = user.token.as_deref() {
                if token.is_empty() {
                    errors.push(format!("user '{}' has an empty token", user.email));
                } else if tokens.contains(&token) {
                    errors.push(format!("user '{}' reuses another user's token", user.email));
                }
                tokens.push(token);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
[server]
listen = "0.0.0.0:9000"

[logging]
level = "debug"

[[seed.institutions]]
name = "MUP"
city = "Beograd"
address = "Kneza Miloša 103"

[[seed.types]]
name = "Documents"

[[seed.services]]
name = "Passport"
institution = "MUP"
type = "Documents"
fee = "500.00"
requires_attachment = true

[[seed.users]]
name = "Admin"
email = "admin@euprava.rs"
password = "admin123"
date_of_birth = "1975-01-01"
jmbg = "0101975710001"
role = "ADMIN"
token = "admin-token"
"#;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn missing_path_gives_defaults() {
        let config = PortalConfig::load(None).unwrap();
        assert_eq!(config.server.listen.port(), 8080);
        assert_eq!(config.server.rate_limit_per_minute, 120);
        assert!(config.server.enable_cors);
        assert_eq!(config.logging.level, "info");
        assert!(config.seed.services.is_empty());
    }

    #[test]
    fn parses_full_file() {
        let file = write_config(SAMPLE);
        let config = PortalConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.server.listen.port(), 9000);
        assert_eq!(config.server.max_body_size, 1024 * 1024);
        assert_eq!(config.logging.level, "debug");
        let service = &config.seed.services[0];
        assert_eq!(service.fee, Decimal::new(50000, 2));
        assert!(service.requires_attachment);
        assert_eq!(service.status, ServiceStatus::Active);
        assert_eq!(config.seed.users[0].role, Role::Admin);
        assert_eq!(config.seed.users[0].token.as_deref(), Some("admin-token"));
    }

    #[test]
    fn dangling_service_reference_is_invalid() {
        let file = write_config(
            r#"
[[seed.services]]
name = "Passport"
institution = "Nowhere"
type = "Documents"
fee = "0"
"#,
        );
        let err = PortalConfig::load(Some(file.path())).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("unknown institution 'Nowhere'"), "{message}");
        assert!(message.contains("unknown type 'Documents'"), "{message}");
    }

    #[test]
    fn unreadable_and_malformed_files() {
        let missing = PortalConfig::load(Some(Path::new("/nonexistent/portal.toml")));
        assert!(matches!(missing, Err(ConfigError::Read { .. })));

        let file = write_config("[server\nlisten = 1");
        assert!(matches!(
            PortalConfig::load(Some(file.path())),
            Err(ConfigError::Parse { .. })
        ));
    }
}

//! Configuration management.
//!
//! Configuration is read once at startup from a TOML file, then adjusted by
//! environment variables. The resulting [`ClassbookConfig`] is immutable; the
//! role table it describes is built from it exactly once.
//!
//! ```toml
//! database = "escola.db"
//!
//! [logging]
//! format = "json"
//! level = "classbook=debug,info"
//!
//! [http]
//! host = "127.0.0.1"
//! port = 5000
//!
//! [reports]
//! default_rank_limit = 10
//!
//! [roles]
//! professor = ["view_dashboard", "view_notas", "create_notas"]
//! ```

use crate::observability::LogFormat;
use crate::security::{Capability, Role, RoleCapabilityTable};
use crate::{Error, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// Main configuration for classbook.
#[derive(Debug, Clone)]
pub struct ClassbookConfig {
    /// Path to the `SQLite` database.
    pub database: PathBuf,
    /// Logging settings.
    pub logging: LoggingSettings,
    /// HTTP adapter settings.
    pub http: HttpSettings,
    /// Report defaults.
    pub reports: ReportSettings,
    /// Per-role capability overrides, keyed by role wire name.
    pub roles: BTreeMap<String, Vec<String>>,
}

/// Logging settings.
#[derive(Debug, Clone)]
pub struct LoggingSettings {
    /// Output format.
    pub format: LogFormat,
    /// Filter directive.
    pub level: String,
    /// Optional log file.
    pub file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            level: "info".to_string(),
            file: None,
        }
    }
}

/// HTTP adapter settings.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

/// Report defaults.
#[derive(Debug, Clone)]
pub struct ReportSettings {
    /// Ranking size when the caller gives none.
    pub default_rank_limit: usize,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            default_rank_limit: 10,
        }
    }
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Database path.
    pub database: Option<String>,
    /// Logging section.
    pub logging: Option<ConfigFileLogging>,
    /// HTTP section.
    pub http: Option<ConfigFileHttp>,
    /// Reports section.
    pub reports: Option<ConfigFileReports>,
    /// Role overrides.
    pub roles: Option<BTreeMap<String, Vec<String>>>,
}

/// Logging section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileLogging {
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// Filter directive.
    pub level: Option<String>,
    /// Log file path.
    pub file: Option<String>,
}

/// HTTP section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileHttp {
    /// Bind host.
    pub host: Option<String>,
    /// Bind port.
    pub port: Option<u16>,
}

/// Reports section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileReports {
    /// Default ranking size.
    pub default_rank_limit: Option<usize>,
}

impl Default for ClassbookConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("escola.db"),
            logging: LoggingSettings::default(),
            http: HttpSettings::default(),
            reports: ReportSettings::default(),
            roles: BTreeMap::new(),
        }
    }
}

impl ClassbookConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        Self::from_toml(&contents)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the text is not a valid config file.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(contents)
            .map_err(|e| Error::InvalidInput(format!("config file: {e}")))?;
        Ok(Self::from_config_file(file))
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the platform config dir (`~/.config/classbook/config.toml` on
    /// Linux). Returns defaults if no file is found or it fails to parse.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(dirs) = directories::ProjectDirs::from("", "", "classbook") else {
            return Self::default();
        };

        let path = dirs.config_dir().join("config.toml");
        if path.exists() {
            match Self::load_from_file(&path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable config file");
                },
            }
        }

        Self::default()
    }

    /// Applies `CLASSBOOK_*` environment variable overrides.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(database) = lookup("CLASSBOOK_DATABASE") {
            self.database = PathBuf::from(database);
        }
        if let Some(format) = lookup("CLASSBOOK_LOG_FORMAT") {
            self.logging.format = LogFormat::parse(&format);
        }
        if let Some(level) = lookup("CLASSBOOK_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(port) = lookup("CLASSBOOK_HTTP_PORT") {
            match port.trim().parse() {
                Ok(port) => self.http.port = port,
                Err(_) => tracing::warn!(value = %port, "Ignoring invalid CLASSBOOK_HTTP_PORT"),
            }
        }
        self
    }

    /// Converts a `ConfigFile` to `ClassbookConfig`.
    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(database) = file.database {
            config.database = PathBuf::from(database);
        }
        if let Some(logging) = file.logging {
            if let Some(format) = logging.format {
                config.logging.format = LogFormat::parse(&format);
            }
            if let Some(level) = logging.level {
                config.logging.level = level;
            }
            config.logging.file = logging.file.map(PathBuf::from);
        }
        if let Some(http) = file.http {
            if let Some(host) = http.host {
                config.http.host = host;
            }
            if let Some(port) = http.port {
                config.http.port = port;
            }
        }
        if let Some(limit) = file.reports.and_then(|r| r.default_rank_limit) {
            config.reports.default_rank_limit = limit;
        }
        if let Some(roles) = file.roles {
            config.roles = roles;
        }

        config
    }

    /// Sets the database path.
    #[must_use]
    pub fn with_database(mut self, path: impl Into<PathBuf>) -> Self {
        self.database = path.into();
        self
    }

    /// Builds the immutable role table described by this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for unknown roles or capability names.
    pub fn role_table(&self) -> Result<RoleCapabilityTable> {
        let overrides = self
            .roles
            .iter()
            .map(|(role, capabilities)| {
                let capabilities = capabilities
                    .iter()
                    .map(|name| {
                        Capability::parse(name).ok_or_else(|| {
                            Error::InvalidInput(format!(
                                "unknown capability '{name}' for role '{role}'"
                            ))
                        })
                    })
                    .collect::<Result<HashSet<_>>>()?;
                Ok((Role::parse(role), capabilities))
            })
            .collect::<Result<Vec<_>>>()?;

        RoleCapabilityTable::with_overrides(overrides)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ClassbookConfig::new();
        assert_eq!(config.database, PathBuf::from("escola.db"));
        assert_eq!(config.http.port, 5000);
        assert_eq!(config.reports.default_rank_limit, 10);
        assert_eq!(config.role_table().unwrap(), RoleCapabilityTable::standard());
    }

    #[test]
    fn test_from_toml() {
        let config = ClassbookConfig::from_toml(
            r#"
            database = "/var/lib/escola.db"

            [logging]
            format = "json"
            level = "debug"

            [http]
            port = 8080

            [reports]
            default_rank_limit = 5

            [roles]
            professor = ["view_relatorios"]
            "#,
        )
        .unwrap();

        assert_eq!(config.database, PathBuf::from("/var/lib/escola.db"));
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.http.port, 8080);
        assert_eq!(config.http.host, "127.0.0.1");
        assert_eq!(config.reports.default_rank_limit, 5);

        let table = config.role_table().unwrap();
        assert!(table.holds(&Role::Teacher, Capability::ViewReports));
        assert!(!table.holds(&Role::Teacher, Capability::CreateGrades));
    }

    #[test]
    fn test_unknown_capability_in_roles_is_rejected() {
        let config = ClassbookConfig::from_toml("[roles]\nprofessor = [\"teleport\"]\n").unwrap();
        assert!(matches!(config.role_table(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_unknown_role_in_roles_is_rejected() {
        let config = ClassbookConfig::from_toml("[roles]\nzelador = [\"view_notas\"]\n").unwrap();
        assert!(matches!(config.role_table(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_unknown_top_level_key_is_rejected() {
        assert!(ClassbookConfig::from_toml("colour = \"blue\"\n").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env = HashMap::from([
            ("CLASSBOOK_DATABASE", "other.db"),
            ("CLASSBOOK_LOG_FORMAT", "json"),
            ("CLASSBOOK_HTTP_PORT", "not-a-port"),
        ]);
        let config = ClassbookConfig::new()
            .with_overrides_from(|key| env.get(key).map(|v| (*v).to_string()));
        assert_eq!(config.database, PathBuf::from("other.db"));
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.http.port, 5000);
    }

    #[test]
    fn test_load_from_missing_file() {
        let result = ClassbookConfig::load_from_file(Path::new("/nonexistent/classbook.toml"));
        assert!(matches!(result, Err(Error::OperationFailed { .. })));
    }
}

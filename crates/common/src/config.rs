use crate::error::ValidationError;
use crate::types::{Granularity, Page, QueryParameters};
use chrono::NaiveDate;
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("missing warehouse credential {0:?}")]
    MissingCredential(&'static str),
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub general: General,
    pub warehouse: Warehouse,
    #[serde(default)]
    pub cache: Cache,
    pub dashboard: Dashboard,
    pub web: Option<Web>,
}

#[derive(Debug, Deserialize)]
pub struct General {
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Warehouse {
    /// Overrides `https://<account>.snowflakecomputing.com`.
    pub base_url: Option<String>,
    pub account: String,
    pub database: String,
    pub schema: String,
    /// Compute warehouse the session runs on.
    pub compute: String,
    pub role: Option<String>,
    pub timeout_secs: u64,
    pub secrets_path: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct Cache {
    /// Bound on cached results; unbounded when absent.
    pub max_entries: Option<u64>,
    #[serde(default)]
    pub ttl_secs: CacheTtl,
}

/// Per-page lifetime of cached results. Absent means never expires.
#[derive(Debug, Deserialize, Default, Clone, Copy)]
pub struct CacheTtl {
    pub overall: Option<u64>,
    pub routes: Option<u64>,
    pub assets: Option<u64>,
    pub chain: Option<u64>,
}

impl CacheTtl {
    pub fn for_page(&self, page: Page) -> Option<Duration> {
        let secs = match page {
            Page::Overall => self.overall,
            Page::Routes => self.routes,
            Page::Assets => self.assets,
            Page::Chain => self.chain,
        };
        secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Dashboard {
    pub default_start: NaiveDate,
    pub default_end: NaiveDate,
    pub default_granularity: Granularity,
    pub default_chain: String,
    pub default_asset: String,
    pub top_n: usize,
}

impl Dashboard {
    /// Parameters used when a page is opened without a query string.
    pub fn default_parameters(&self) -> Result<QueryParameters, ValidationError> {
        QueryParameters::new(
            self.default_start,
            self.default_end,
            self.default_granularity,
        )
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Web {
    pub port: u16,
    pub host: String,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config/default.toml")
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_toml_str(s)
    }
}

/// Warehouse login. Never logged.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub user: String,
    pub password: String,
    pub account: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"***")
            .field("account", &self.account)
            .finish()
    }
}

#[derive(Debug, Deserialize, Default)]
struct SecretsFile {
    #[serde(default)]
    warehouse: PartialCredentials,
}

#[derive(Debug, Deserialize, Default)]
struct PartialCredentials {
    user: Option<String>,
    password: Option<String>,
    account: Option<String>,
}

impl Credentials {
    /// Resolve from `WAREHOUSE_*` environment variables, falling back to the
    /// `[warehouse]` table of the secrets file.
    pub fn load(secrets_path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::resolve(|key| std::env::var(key).ok(), secrets_path)
    }

    /// Like [`Credentials::load`] with an explicit variable lookup.
    pub fn resolve(
        env: impl Fn(&str) -> Option<String>,
        secrets_path: impl AsRef<Path>,
    ) -> Result<Self, ConfigError> {
        let path = secrets_path.as_ref();
        let file = match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str::<SecretsFile>(&content)?.warehouse,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => PartialCredentials::default(),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        let pick = |key: &str, fallback: Option<String>| {
            env(key).filter(|v| !v.is_empty()).or(fallback)
        };
        Ok(Self {
            user: pick("WAREHOUSE_USER", file.user)
                .ok_or(ConfigError::MissingCredential("user"))?,
            password: pick("WAREHOUSE_PASSWORD", file.password)
                .ok_or(ConfigError::MissingCredential("password"))?,
            account: pick("WAREHOUSE_ACCOUNT", file.account),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn default_config() -> Config {
        Config::from_toml_str(include_str!("../../../config/default.toml")).unwrap()
    }

    #[test]
    fn test_load_default_config() {
        let config = default_config();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.warehouse.database, "AXELAR");
        assert!(config.warehouse.timeout_secs > 0);
        assert_eq!(config.dashboard.default_chain, "Ethereum");
        assert_eq!(config.dashboard.default_asset, "USDC");
        assert_eq!(config.dashboard.top_n, 10);
        assert_eq!(config.dashboard.default_granularity, Granularity::Month);
    }

    #[test]
    fn test_cache_ttls_per_page() {
        let ttl = default_config().cache.ttl_secs;
        assert_eq!(ttl.for_page(Page::Overall), None);
        assert_eq!(ttl.for_page(Page::Routes), Some(Duration::from_secs(86_400)));
        assert_eq!(ttl.for_page(Page::Assets), Some(Duration::from_secs(86_400)));
        assert_eq!(ttl.for_page(Page::Chain), Some(Duration::from_secs(3_600)));
    }

    #[test]
    fn test_default_parameters_are_valid() {
        let params = default_config().dashboard.default_parameters().unwrap();
        assert_eq!(params.start().to_string(), "2023-01-01");
        assert_eq!(params.end().to_string(), "2025-07-31");
    }

    #[test]
    fn test_web_config_section() {
        let web = default_config().web.expect("web section should be present");
        assert_eq!(web.port, 8080);
        assert_eq!(web.host, "0.0.0.0");
    }

    #[test]
    fn test_optional_sections() {
        let toml = r#"
[general]
log_level = "debug"

[warehouse]
account = "acme"
database = "AXELAR"
schema = "AXELSCAN"
compute = "COMPUTE_WH"
timeout_secs = 60
secrets_path = "config/secrets.toml"

[dashboard]
default_start = "2024-01-01"
default_end = "2024-02-01"
default_granularity = "week"
default_chain = "Ethereum"
default_asset = "USDC"
top_n = 5
"#;
        let config: Config = toml.parse().unwrap();
        assert!(config.web.is_none());
        assert_eq!(config.general.log_format, LogFormat::Json);
        assert!(config.cache.max_entries.is_none());
        assert_eq!(config.cache.ttl_secs.for_page(Page::Chain), None);
    }

    #[test]
    fn test_credentials_from_secrets_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[warehouse]\nuser = \"reader\"\npassword = \"s3cret\"\naccount = \"xy123\""
        )
        .unwrap();
        let creds = Credentials::resolve(|_| None, file.path()).unwrap();
        assert_eq!(creds.user, "reader");
        assert_eq!(creds.account.as_deref(), Some("xy123"));
        assert!(!format!("{creds:?}").contains("s3cret"));
    }

    #[test]
    fn test_environment_overrides_secrets_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[warehouse]\nuser = \"reader\"\npassword = \"s3cret\"").unwrap();
        let env = |key: &str| (key == "WAREHOUSE_PASSWORD").then(|| "from-env".to_string());
        let creds = Credentials::resolve(env, file.path()).unwrap();
        assert_eq!(creds.user, "reader");
        assert_eq!(creds.password, "from-env");
    }

    #[test]
    fn test_missing_password_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let env = |key: &str| (key == "WAREHOUSE_USER").then(|| "reader".to_string());
        let err = Credentials::resolve(env, dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredential("password")));
    }
}

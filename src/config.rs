use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::auth::{AccessToken, Credentials};

/// Default config file path.
pub const CONFIG_PATH: &str = "config.toml";

/// Reddit's OAuth2 token endpoint.
pub const DEFAULT_AUTH_URL: &str = "https://www.reddit.com/api/v1/access_token";

/// Top-level application config deserialized from `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub default: DefaultConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub access_token: AccessTokenConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Application identity and timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultConfig {
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default = "default_app_version")]
    pub app_version: String,
    /// HTTP timeout in seconds; also the download bots' cycle interval.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Mention bot cycle interval in seconds.
    #[serde(default = "default_sleep_time")]
    pub sleep_time: u64,
}

fn default_app_name() -> String {
    env!("CARGO_PKG_NAME").to_string()
}

fn default_app_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_timeout() -> u64 {
    60
}

fn default_sleep_time() -> u64 {
    10
}

impl Default for DefaultConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            app_version: default_app_version(),
            timeout: default_timeout(),
            sleep_time: default_sleep_time(),
        }
    }
}

/// Script-app credentials for the password grant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    #[serde(default)]
    pub password: String,
}

fn default_auth_url() -> String {
    DEFAULT_AUTH_URL.to_string()
}

/// Last-known bearer token, written back on every refresh.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessTokenConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Epoch seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token_expiry_time: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    #[serde(default = "default_log_name")]
    pub log_name: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_name() -> String {
    "client".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            log_name: default_log_name(),
            log_level: default_log_level(),
        }
    }
}

impl AppConfig {
    /// Load config from the given TOML file path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Write config to the given TOML file path.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("failed to serialize config")?;
        std::fs::write(path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    /// Reject configs the bot cannot authenticate with.
    pub fn validate(&self) -> Result<()> {
        if self.auth.client_id.trim().is_empty() {
            bail!("auth.client_id is empty");
        }
        if self.auth.username.trim().is_empty() {
            bail!("auth.username is empty");
        }
        let url = Url::parse(&self.auth.auth_url)
            .with_context(|| format!("auth.auth_url is not a valid URL: {}", self.auth.auth_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("auth.auth_url must be http(s), got {}", url.scheme());
        }
        Ok(())
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            client_id: self.auth.client_id.clone(),
            client_secret: self.auth.client_secret.clone(),
            username: self.auth.username.clone(),
            password: self.auth.password.clone(),
            auth_url: self.auth.auth_url.clone(),
        }
    }

    /// `"{app_name}/{app_version} by {username}"`, as Reddit's API rules ask.
    pub fn user_agent(&self) -> String {
        format!(
            "{}/{} by {}",
            self.default.app_name, self.default.app_version, self.auth.username
        )
    }

    /// The cached token, if both fields are present.
    pub fn cached_token(&self) -> Option<AccessToken> {
        let token = self.access_token.access_token.clone()?;
        let expiry = self.access_token.access_token_expiry_time?;
        if token.is_empty() {
            return None;
        }
        Some(AccessToken { token, expiry })
    }
}

/// Durable backing for the access token.
pub trait ConfigStore {
    /// Last token written to durable storage.
    fn cached_token(&self) -> Option<AccessToken>;

    /// Record a freshly acquired token and flush it to durable storage.
    fn persist_token(&mut self, token: &AccessToken) -> crate::error::Result<()>;
}

/// `ConfigStore` backed by the TOML config file.
///
/// The whole file is rewritten on every persist; no handle is held open.
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
    config: AppConfig,
}

impl FileConfigStore {
    pub fn new(path: impl Into<PathBuf>, config: AppConfig) -> Self {
        Self {
            path: path.into(),
            config,
        }
    }

    /// Load and validate the config at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let config = AppConfig::load(&path)?;
        config
            .validate()
            .with_context(|| format!("invalid config {}", path.display()))?;
        Ok(Self { path, config })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut AppConfig {
        &mut self.config
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self) -> Result<()> {
        self.config.save(&self.path)
    }
}

impl ConfigStore for FileConfigStore {
    fn cached_token(&self) -> Option<AccessToken> {
        self.config.cached_token()
    }

    fn persist_token(&mut self, token: &AccessToken) -> crate::error::Result<()> {
        self.config.access_token.access_token = Some(token.token.clone());
        self.config.access_token.access_token_expiry_time = Some(token.expiry);
        self.save()
            .map_err(|e| crate::error::BotError::Config(format!("{e:#}")))
    }
}

/// In-memory `ConfigStore`, for tests and one-off tools that must not write
/// to disk.
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigStore {
    pub token: Option<AccessToken>,
    pub persist_count: usize,
}

impl ConfigStore for MemoryConfigStore {
    fn cached_token(&self) -> Option<AccessToken> {
        self.token.clone()
    }

    fn persist_token(&mut self, token: &AccessToken) -> crate::error::Result<()> {
        self.token = Some(token.clone());
        self.persist_count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[auth]
client_id = "cid"
client_secret = "secret"
username = "tickerbot"
password = "hunter2"
"#;

    #[test]
    fn minimal_config_uses_defaults() {
        let config: AppConfig = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.default.sleep_time, 10);
        assert_eq!(config.default.timeout, 60);
        assert_eq!(config.auth.auth_url, DEFAULT_AUTH_URL);
        assert_eq!(config.logging.log_dir, PathBuf::from("logs"));
        assert_eq!(config.logging.log_name, "client");
        assert_eq!(config.logging.log_level, "info");
        assert!(config.cached_token().is_none());
    }

    #[test]
    fn user_agent_format() {
        let mut config: AppConfig = toml::from_str(MINIMAL).unwrap();
        config.default.app_name = "ticker-bot".into();
        config.default.app_version = "1.2".into();
        assert_eq!(config.user_agent(), "ticker-bot/1.2 by tickerbot");
    }

    #[test]
    fn cached_token_requires_both_fields() {
        let mut config: AppConfig = toml::from_str(MINIMAL).unwrap();
        config.access_token.access_token = Some("abc".into());
        assert!(config.cached_token().is_none());

        config.access_token.access_token_expiry_time = Some(1_700_000_000);
        let token = config.cached_token().unwrap();
        assert_eq!(token.token, "abc");
        assert_eq!(token.expiry, 1_700_000_000);

        config.access_token.access_token = Some(String::new());
        assert!(config.cached_token().is_none());
    }

    #[test]
    fn file_store_persists_token_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, MINIMAL).unwrap();

        let mut store = FileConfigStore::open(&path).unwrap();
        assert!(store.cached_token().is_none());
        store
            .persist_token(&AccessToken {
                token: "fresh".into(),
                expiry: 1_800_000_000,
            })
            .unwrap();

        let reloaded = AppConfig::load(&path).unwrap();
        let token = reloaded.cached_token().unwrap();
        assert_eq!(token.token, "fresh");
        assert_eq!(token.expiry, 1_800_000_000);
        // Unrelated sections survive the rewrite.
        assert_eq!(reloaded.auth.password, "hunter2");
    }

    #[test]
    fn validate_rejects_bad_auth_section() {
        let config: AppConfig = toml::from_str(MINIMAL).unwrap();
        assert!(config.validate().is_ok());

        let mut bad = config.clone();
        bad.auth.auth_url = "not a url".into();
        assert!(bad.validate().is_err());

        let mut bad = config.clone();
        bad.auth.auth_url = "ftp://www.reddit.com/api/v1/access_token".into();
        assert!(bad.validate().is_err());

        let mut bad = config;
        bad.auth.username = "  ".into();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn load_missing_file_fails_with_path() {
        let err = AppConfig::load(Path::new("/nonexistent/config.toml")).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/config.toml"));
    }
}

//! Process configuration.
//!
//! Values come from an optional JSON file named by `MAILFEED_CONFIG`, then
//! from individual environment variables, which win.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use mailfeed_core::{Credentials, RecipientFilter, ServerAddr};
use serde::Deserialize;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_RATE_LIMIT: u32 = 2;
const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 10;

/// Everything the file may set. All fields are optional.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    email_server: Option<String>,
    email_username: Option<String>,
    email_password: Option<String>,
    db_path: Option<PathBuf>,
    port: Option<u16>,
    domain: Option<String>,
    rate_limit_per_minute: Option<u32>,
    shutdown_grace_secs: Option<u64>,
}

/// Resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerAddr,
    pub credentials: Credentials,
    pub db_path: PathBuf,
    pub port: u16,
    /// Recipient domain; when set only mail to this domain is ingested.
    pub domain: Option<String>,
    pub rate_limit_per_minute: u32,
    pub shutdown_grace: Duration,
}

impl Config {
    /// Loads from the process environment.
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads using `lookup` in place of the environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut file = match lookup("MAILFEED_CONFIG") {
            Some(path) => {
                let contents = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading config file {path}"))?;
                serde_json::from_str::<FileConfig>(&contents)
                    .with_context(|| format!("parsing config file {path}"))?
            }
            None => FileConfig::default(),
        };
        file.apply_env(&lookup)?;
        file.resolve()
    }

    /// Base for channel links, derived from the domain.
    pub fn link_base(&self) -> Option<String> {
        self.domain.as_ref().map(|domain| format!("https://{domain}"))
    }

    pub fn recipient_filter(&self) -> RecipientFilter {
        self.domain
            .as_deref()
            .map_or_else(RecipientFilter::any, RecipientFilter::domain)
    }
}

impl FileConfig {
    fn apply_env(&mut self, lookup: &impl Fn(&str) -> Option<String>) -> Result<()> {
        let text = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(value) = text("EMAIL_SERVER") {
            self.email_server = Some(value);
        }
        if let Some(value) = text("EMAIL_USERNAME") {
            self.email_username = Some(value);
        }
        if let Some(value) = lookup("EMAIL_PASSWORD").filter(|value| !value.is_empty()) {
            self.email_password = Some(value);
        }
        if let Some(value) = text("DB_PATH") {
            self.db_path = Some(PathBuf::from(value));
        }
        if let Some(value) = text("DOMAIN") {
            self.domain = Some(value);
        }
        if let Some(value) = text("PORT") {
            self.port = Some(parse_number("PORT", &value)?);
        }
        if let Some(value) = text("RATE_LIMIT_PER_MINUTE") {
            self.rate_limit_per_minute = Some(parse_number("RATE_LIMIT_PER_MINUTE", &value)?);
        }
        if let Some(value) = text("SHUTDOWN_GRACE_SECS") {
            self.shutdown_grace_secs = Some(parse_number("SHUTDOWN_GRACE_SECS", &value)?);
        }
        Ok(())
    }

    fn resolve(self) -> Result<Config> {
        let server = self
            .email_server
            .ok_or_else(|| anyhow!("EMAIL_SERVER is not set"))?;
        let server = ServerAddr::parse(&server)
            .ok_or_else(|| anyhow!("EMAIL_SERVER {server:?} is not host or host:port"))?;
        let username = self
            .email_username
            .ok_or_else(|| anyhow!("EMAIL_USERNAME is not set"))?;
        let password = self
            .email_password
            .ok_or_else(|| anyhow!("EMAIL_PASSWORD is not set"))?;

        let db_path = self.db_path.unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("mailfeed")
                .join("mailfeed.db")
        });

        Ok(Config {
            server,
            credentials: Credentials::new(username, password),
            db_path,
            port: self.port.unwrap_or(DEFAULT_PORT),
            domain: self.domain.map(|d| d.trim().to_string()),
            rate_limit_per_minute: self.rate_limit_per_minute.unwrap_or(DEFAULT_RATE_LIMIT),
            shutdown_grace: Duration::from_secs(
                self.shutdown_grace_secs
                    .unwrap_or(DEFAULT_SHUTDOWN_GRACE_SECS),
            ),
        })
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("{key} {value:?} is not a valid number"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("EMAIL_SERVER", "imap.example.com"),
        ("EMAIL_USERNAME", "reader"),
        ("EMAIL_PASSWORD", "secret"),
    ];

    #[test]
    fn defaults_fill_everything_optional() {
        let config = Config::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(config.server, ServerAddr::new("imap.example.com", 993));
        assert_eq!(config.credentials, Credentials::new("reader", "secret"));
        assert_eq!(config.port, 8080);
        assert_eq!(config.rate_limit_per_minute, 2);
        assert_eq!(config.shutdown_grace, Duration::from_secs(10));
        assert!(config.db_path.ends_with("mailfeed/mailfeed.db"));
        assert_eq!(config.link_base(), None);
        assert_eq!(config.recipient_filter(), RecipientFilter::any());
    }

    #[test]
    fn missing_credentials_are_errors() {
        let err = Config::from_lookup(lookup(&REQUIRED[..2])).unwrap_err();
        assert!(err.to_string().contains("EMAIL_PASSWORD"));
        assert!(Config::from_lookup(lookup(&[])).is_err());
    }

    #[test]
    fn env_overrides_file() {
        let dir = std::env::temp_dir().join(format!("mailfeed-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        std::fs::write(
            &path,
            r#"{"email_server": "file.example.com:143", "email_username": "file",
                "email_password": "pw", "port": 9000, "domain": "file.example.com"}"#,
        )
        .unwrap();

        let path = path.to_string_lossy().into_owned();
        let config = Config::from_lookup(lookup(&[
            ("MAILFEED_CONFIG", path.as_str()),
            ("EMAIL_USERNAME", "env"),
            ("DOMAIN", "mail.example.com"),
            ("RATE_LIMIT_PER_MINUTE", "5"),
        ]))
        .unwrap();

        assert_eq!(config.server, ServerAddr::new("file.example.com", 143));
        assert_eq!(config.credentials.username, "env");
        assert_eq!(config.port, 9000);
        assert_eq!(config.rate_limit_per_minute, 5);
        assert_eq!(config.link_base().as_deref(), Some("https://mail.example.com"));
        assert_eq!(
            config.recipient_filter(),
            RecipientFilter::domain("mail.example.com")
        );
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn bad_numbers_are_rejected() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("PORT", "eighty"));
        let err = Config::from_lookup(lookup(&vars)).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn unknown_file_keys_are_rejected() {
        assert!(serde_json::from_str::<FileConfig>(r#"{"prot": 1}"#).is_err());
    }
}

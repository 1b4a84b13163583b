use crate::logger::LogFormat;
use anyhow::{Result, anyhow, ensure};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub auth: Auth,
    pub rate_limit: RateLimit,
    pub store: Store,
    pub http: Http,
    pub log: Log,
}

#[derive(Debug, Deserialize)]
pub struct Auth {
    pub issuer: String,
    pub audience: String,
    pub access_ttl_secs: u64,
    pub refresh_ttl_secs: u64,
    #[serde(default)]
    pub leeway_secs: u64,
    /// Name of the environment variable holding the HMAC secret.
    pub signing_key_env: String,
}

impl Auth {
    pub fn access_ttl(&self) -> Duration {
        Duration::from_secs(self.access_ttl_secs)
    }

    pub fn refresh_ttl(&self) -> Duration {
        Duration::from_secs(self.refresh_ttl_secs)
    }

    pub fn leeway(&self) -> Duration {
        Duration::from_secs(self.leeway_secs)
    }

    pub fn signing_key(&self) -> Result<Vec<u8>> {
        let key = std::env::var(&self.signing_key_env)
            .map_err(|_| anyhow!("{} is required", self.signing_key_env))?;
        ensure!(!key.is_empty(), "{} must not be empty", self.signing_key_env);
        Ok(key.into_bytes())
    }
}

#[derive(Debug, Deserialize)]
pub struct RateLimit {
    pub action: String,
    pub limit: u32,
    pub window_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct Store {
    pub backend: String, // "redis" or "memory"
    #[serde(default)]
    pub redis_url: String,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    pub timeout_ms: u64,
}

fn default_key_prefix() -> String {
    "auth".to_string()
}

#[derive(Debug, Deserialize)]
pub struct Http {
    pub address: String,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
    #[serde(default)]
    pub format: LogFormat,
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

/// Loads the TOML file, then applies `TOKENGATE__SECTION__KEY` overrides.
pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .add_source(
            Environment::with_prefix("TOKENGATE")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    settings.check()?;
    Ok(settings)
}

impl Settings {
    fn check(&self) -> Result<()> {
        ensure!(self.auth.access_ttl_secs > 0, "auth.access_ttl_secs must be positive");
        ensure!(self.auth.refresh_ttl_secs > 0, "auth.refresh_ttl_secs must be positive");
        ensure!(self.rate_limit.window_secs > 0, "rate_limit.window_secs must be positive");
        ensure!(self.store.timeout_ms > 0, "store.timeout_ms must be positive");
        ensure!(
            self.http.cert_path.is_some() == self.http.key_path.is_some(),
            "http.cert_path and http.key_path must be set together"
        );
        Ok(())
    }
}

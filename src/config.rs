use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::time::Duration;

use crate::locale::Locale;
use crate::util::is_local_endpoint_url;

pub const API_BASE_URL_ENV: &str = "ALWAYSCHAT_API_BASE_URL";
pub const TOKEN_PATH_ENV: &str = "ALWAYSCHAT_TOKEN_PATH";
pub const LOCALE_ENV: &str = "ALWAYSCHAT_LOCALE";
pub const CONNECT_TIMEOUT_ENV: &str = "ALWAYSCHAT_CONNECT_TIMEOUT_SECS";

const DEFAULT_API_BASE_URL: &str = "http://localhost:5001";
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    pub token_path: PathBuf,
    pub locale: Locale,
    pub connect_timeout: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        let api_base_url = std::env::var(API_BASE_URL_ENV)
            .ok()
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());

        let token_path = match std::env::var(TOKEN_PATH_ENV)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
        {
            Some(path) => PathBuf::from(path),
            None => default_token_path()?,
        };

        let locale = match std::env::var(LOCALE_ENV) {
            Ok(value) => Locale::parse(&value)
                .with_context(|| format!("Invalid {LOCALE_ENV} '{value}': expected 'ja' or 'en'"))?,
            Err(_) => Locale::default(),
        };

        let connect_timeout_secs = match std::env::var(CONNECT_TIMEOUT_ENV) {
            Ok(value) => value.trim().parse::<u64>().with_context(|| {
                format!("Invalid {CONNECT_TIMEOUT_ENV} '{value}': expected whole seconds")
            })?,
            Err(_) => DEFAULT_CONNECT_TIMEOUT_SECS,
        };

        Ok(Self {
            api_base_url,
            token_path,
            locale,
            connect_timeout: Duration::from_secs(connect_timeout_secs.max(1)),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if !self.api_base_url.starts_with("http://") && !self.api_base_url.starts_with("https://")
        {
            bail!(
                "Invalid {API_BASE_URL_ENV} '{}': expected http:// or https:// URL",
                self.api_base_url
            );
        }

        if self.api_base_url.starts_with("http://") && !self.is_local_endpoint() {
            tracing::warn!(
                url = %self.api_base_url,
                "API base URL uses plain http for a non-local host; bearer tokens travel unencrypted"
            );
        }

        if self.token_path.as_os_str().is_empty() {
            bail!("{TOKEN_PATH_ENV} must not be empty");
        }

        Ok(())
    }

    fn is_local_endpoint(&self) -> bool {
        is_local_endpoint_url(&self.api_base_url)
    }
}

fn default_token_path() -> Result<PathBuf> {
    let base = dirs::config_dir()
        .or_else(dirs::home_dir)
        .context("cannot determine a config directory; set ALWAYSCHAT_TOKEN_PATH")?;
    Ok(base.join("alwayschat").join("credentials.json"))
}

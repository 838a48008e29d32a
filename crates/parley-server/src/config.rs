use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Server settings, read from the environment (after `.env`).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub busy_timeout: Duration,
    pub secure_cookies: bool,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let port: u16 = var("PARLEY_PORT", "3000")
            .parse()
            .context("PARLEY_PORT must be a port number")?;
        let busy_timeout_ms: u64 = var("PARLEY_BUSY_TIMEOUT_MS", "5000")
            .parse()
            .context("PARLEY_BUSY_TIMEOUT_MS must be a number of milliseconds")?;
        let cookie_flag = var("PARLEY_SECURE_COOKIES", "false").to_ascii_lowercase();
        let secure_cookies = match cookie_flag.as_str() {
            "1" | "true" | "yes" => true,
            "0" | "false" | "no" => false,
            other => anyhow::bail!("PARLEY_SECURE_COOKIES must be true or false, got '{}'", other),
        };

        Ok(Self {
            db_path: var("PARLEY_DB_PATH", "parley.db").into(),
            host: var("PARLEY_HOST", "0.0.0.0"),
            port,
            busy_timeout: Duration::from_millis(busy_timeout_ms),
            secure_cookies,
        })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}

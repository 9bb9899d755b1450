use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

fn default_max_file_size() -> usize {
    // 10 MB in bytes
    10 * 1024 * 1024
}

#[derive(Debug, Clone)]
pub struct Config {
    pub max_file_size: usize,
    pub openai_key: Option<String>,
    pub openai_model: String,
    pub bind_addr: SocketAddr,
    pub public_url: String,
    pub output_dir: PathBuf,
    pub cors_origin: String,
    /// Generated dashboards kept on disk; the least useful are deleted first.
    pub max_dashboards: u64,
    pub dashboard_ttl: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
            openai_key: None,
            openai_model: "gpt-4o-mini".to_string(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
            public_url: "http://localhost:8000".to_string(),
            output_dir: PathBuf::from("dashboards"),
            cors_origin: "http://localhost:5173".to_string(),
            max_dashboards: 1_000,
            dashboard_ttl: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Load .env file first
        dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        // An empty key means "no text generation", same as an unset one.
        let openai_key = lookup("OPENAI_API_KEY").filter(|key| !key.trim().is_empty());

        let max_file_size = match lookup("MAX_FILE_SIZE") {
            Some(raw) => raw
                .parse::<usize>()
                .with_context(|| format!("Invalid MAX_FILE_SIZE: {}", raw))?,
            None => defaults.max_file_size,
        };

        let bind_addr = match lookup("BIND_ADDR") {
            Some(raw) => raw
                .parse::<SocketAddr>()
                .with_context(|| format!("Invalid BIND_ADDR: {}", raw))?,
            None => defaults.bind_addr,
        };

        let max_dashboards = match lookup("MAX_DASHBOARDS") {
            Some(raw) => raw
                .parse::<u64>()
                .with_context(|| format!("Invalid MAX_DASHBOARDS: {}", raw))?,
            None => defaults.max_dashboards,
        };

        let dashboard_ttl = match lookup("DASHBOARD_TTL_SECS") {
            Some(raw) => Some(Duration::from_secs(
                raw.parse::<u64>()
                    .with_context(|| format!("Invalid DASHBOARD_TTL_SECS: {}", raw))?,
            )),
            None => defaults.dashboard_ttl,
        };

        Ok(Config {
            max_file_size,
            openai_key,
            openai_model: lookup("OPENAI_MODEL").unwrap_or(defaults.openai_model),
            bind_addr,
            public_url: lookup("PUBLIC_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.public_url),
            output_dir: lookup("OUTPUT_DIR").map(PathBuf::from).unwrap_or(defaults.output_dir),
            cors_origin: lookup("CORS_ORIGIN").unwrap_or(defaults.cors_origin),
            max_dashboards,
            dashboard_ttl,
        })
    }
}

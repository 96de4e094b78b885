//! Process configuration from environment variables (and `.env`).

use std::net::SocketAddr;

use anyhow::Context;

use invoicer_observability::LogFormat;

pub const DEV_API_TOKEN: &str = "dev-token";

/// `DATABASE_URL` value selecting the in-memory store.
pub const MEMORY_DATABASE: &str = "memory";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// SQLite URL, or [`MEMORY_DATABASE`].
    pub database_url: String,
    pub database_max_connections: u32,
    pub api_token: String,
    /// `builtin` or an external command line.
    pub pdf_converter: String,
    pub log_format: LogFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            database_url: "sqlite://invoices.db?mode=rwc".to_string(),
            database_max_connections: 5,
            api_token: DEV_API_TOKEN.to_string(),
            pdf_converter: "builtin".to_string(),
            log_format: LogFormat::Json,
        }
    }
}

impl AppConfig {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Unset or blank variables
    /// keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(addr) = var("BIND_ADDR") {
            config.bind_addr = addr
                .trim()
                .parse()
                .with_context(|| format!("BIND_ADDR is not a socket address: {addr}"))?;
        }
        if let Some(url) = var("DATABASE_URL") {
            config.database_url = url.trim().to_string();
        }
        if let Some(max) = var("DATABASE_MAX_CONNECTIONS") {
            config.database_max_connections = max
                .trim()
                .parse()
                .with_context(|| format!("DATABASE_MAX_CONNECTIONS is not a number: {max}"))?;
        }
        if let Some(token) = var("API_TOKEN") {
            config.api_token = token.trim().to_string();
        }
        if let Some(converter) = var("PDF_CONVERTER") {
            config.pdf_converter = converter.trim().to_string();
        }
        if let Some(format) = var("LOG_FORMAT") {
            config.log_format = format.parse::<LogFormat>().context("invalid LOG_FORMAT")?;
        }

        Ok(config)
    }

    pub fn uses_dev_token(&self) -> bool {
        self.api_token == DEV_API_TOKEN
    }

    pub fn uses_memory_store(&self) -> bool {
        self.database_url.eq_ignore_ascii_case(MEMORY_DATABASE)
    }
}

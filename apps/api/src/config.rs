use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Startup fails with context if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub mail_api_url: String,
    pub analysis_api_url: String,
    pub analysis_api_key: Option<String>,
    /// External settings-persistence endpoint. Optional: without it,
    /// keyword/tag changes stay local.
    pub settings_sync_url: Option<String>,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            mail_api_url: require_env("MAIL_API_URL")?,
            analysis_api_url: require_env("ANALYSIS_API_URL")?,
            analysis_api_key: std::env::var("ANALYSIS_API_KEY").ok(),
            settings_sync_url: std::env::var("SETTINGS_SYNC_URL").ok(),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

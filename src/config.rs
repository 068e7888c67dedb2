use serde::Deserialize;
use tokio::fs;

use crate::errors::AppResult;

pub async fn load_config(path: &str) -> AppResult<Config> {
    let contents = fs::read_to_string(path).await?;
    let parsed = toml::from_str(&contents)?;
    Ok(parsed)
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    pub bind_address: String,
    pub cors_origin: String,
    /// Public base used to build share URLs, e.g. "https://files.example.com".
    pub base_url: String,
    pub storage_dir: String,
    pub max_file_bytes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReaperConfig {
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstrumentationConfig {
    pub directives: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub general: GeneralConfig,
    /// Absent means the in-memory store; fine for a single node, lost on
    /// restart.
    pub database: Option<DatabaseConfig>,
    pub reaper: ReaperConfig,
    pub instrumentation: InstrumentationConfig,
}

pub mod demo;
pub mod resolve;
pub mod status;

use anyhow::{Context, Result};
use docshift::RedisDatabase;

use crate::config::Settings;
use crate::output::OutputManager;

/// Connect to the configured Redis namespace.
pub async fn connect(settings: &Settings, output: &OutputManager) -> Result<RedisDatabase> {
    if let Some(source) = &settings.source {
        output.verbose(&format!("Config: {}", source.display()));
    }
    output.verbose(&format!("Redis: {}", settings.redis_url));

    output.progress("Connecting to Redis");
    let db = RedisDatabase::connect(&settings.redis_url, settings.prefix.clone())
        .await
        .context("Failed to connect to Redis")?;
    output.clear_line();
    output.success(&format!("Connected to Redis (prefix '{}')", settings.prefix));
    Ok(db)
}

use std::path::Path;

use crate::settings::error::Result;
use crate::settings::types::AppConfig;

/// Load and validate the startup configuration.
///
/// A missing file is not an error: defaults are used and a warning logged.
/// A file that exists but does not parse is.
pub fn load(path: &Path) -> Result<AppConfig> {
    let config = if path.exists() {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&contents)?;
        tracing::info!("loaded configuration from {}", path.display());
        config
    } else {
        tracing::warn!("config file {} not found, using defaults", path.display());
        AppConfig::default()
    };
    config.validate()?;
    Ok(config)
}

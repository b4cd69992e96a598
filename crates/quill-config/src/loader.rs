use std::path::Path;

use quill_common::{Error, Result};
use tracing::debug;

use crate::model::Settings;

/// Load settings from a TOML file, then fill empty API keys from the
/// environment (`.env` files are honored via dotenvy). A missing file yields
/// defaults so a bare environment-only setup still works.
pub fn load_settings(path: &Path) -> Result<Settings> {
    let mut settings = if path.exists() {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
        toml::from_str(&raw)
            .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))?
    } else {
        debug!("no config file at {}, using defaults", path.display());
        Settings::default()
    };

    apply_env_overrides(&mut settings);
    Ok(settings)
}

fn apply_env_overrides(settings: &mut Settings) {
    if settings.google_api_key.is_empty()
        && let Ok(key) = dotenvy::var("GOOGLE_API_KEY")
    {
        settings.google_api_key = key;
    }
    if settings.open_router_api_key.is_empty()
        && let Ok(key) = dotenvy::var("OPENROUTER_API_KEY")
    {
        settings.open_router_api_key = key;
    }
}

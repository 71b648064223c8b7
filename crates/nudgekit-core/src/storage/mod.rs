pub mod store;

pub use store::{KeyValueStore, MemoryStore, SqliteStore};

use std::path::PathBuf;

use crate::error::CoreError;

/// Returns `~/.config/nudgekit[-dev]/` based on NUDGEKIT_ENV.
///
/// Set NUDGEKIT_ENV=dev to use the development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, CoreError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("NUDGEKIT_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("nudgekit-dev")
    } else {
        base_dir.join("nudgekit")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

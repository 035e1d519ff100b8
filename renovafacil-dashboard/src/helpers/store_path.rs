use std::path::PathBuf;

use crate::config::StorageConfig;

/// Returns the path to the local dashboard state database
///
/// # Platform-specific paths
///
/// - **macOS**: `~/Library/Application Support/renovafacil/dashboard.sqlite3`
/// - **Linux**: `~/.local/share/renovafacil/dashboard.sqlite3`
/// - **Windows**: `%LOCALAPPDATA%\renovafacil\dashboard.sqlite3`
pub fn get_store_path(storage: &StorageConfig) -> anyhow::Result<PathBuf> {
    if let Some(path) = &storage.path {
        return Ok(path.clone());
    }

    let data_dir = dirs::data_local_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine local data directory"))?;

    Ok(data_dir.join("renovafacil").join("dashboard.sqlite3"))
}

/// Open the local store, creating its directory on first use
pub fn initialize_store(storage: &StorageConfig) -> anyhow::Result<crate::database::LocalStore> {
    let path = get_store_path(storage)?;
    let store = crate::database::LocalStore::open(&path)?;
    tracing::debug!("Local store opened at {:?}", path);
    Ok(store)
}

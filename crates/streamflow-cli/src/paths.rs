use anyhow::Result;
use std::path::PathBuf;

const STREAMFLOW_DIR: &str = ".streamflow";
const HISTORY_FILE: &str = "history.json";
const LOGS_DIR: &str = "logs";

/// Environment variable to override the StreamFlow directory.
const STREAMFLOW_DIR_ENV: &str = "STREAMFLOW_DIR";

/// Resolve the StreamFlow data directory.
/// Priority: STREAMFLOW_DIR env var > ~/.streamflow/
pub fn resolve_streamflow_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(STREAMFLOW_DIR_ENV)
        && !dir.trim().is_empty()
    {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|h| h.join(STREAMFLOW_DIR))
        .ok_or_else(|| anyhow::anyhow!("Failed to determine home directory"))
}

/// Get the default chat history path: ~/.streamflow/history.json
pub fn history_path() -> Result<PathBuf> {
    Ok(resolve_streamflow_dir()?.join(HISTORY_FILE))
}

/// Get the logs directory: ~/.streamflow/logs/
pub fn logs_dir() -> Result<PathBuf> {
    let dir = resolve_streamflow_dir()?.join(LOGS_DIR);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

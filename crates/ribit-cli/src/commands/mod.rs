//! CLI command implementations for `ribit`.
//!
//! - [`gateway`] -- Matrix sync loop + dispatcher.
//! - [`status`] -- Configuration diagnostics.

pub mod gateway;
pub mod status;

use std::path::PathBuf;

use anyhow::Context;

use ribit_types::config::BotConfig;

/// Discover the config file path (for display and loading).
///
/// Checks, in order: the `RIBIT_CONFIG` env var, then
/// `~/.ribit/config.json`. Only existing files are returned.
pub fn discover_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("RIBIT_CONFIG") {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }
    dirs::home_dir()
        .map(|home| home.join(".ribit").join("config.json"))
        .filter(|path| path.exists())
}

/// Load configuration from the given path override or via discovery.
///
/// Returns a default `BotConfig` when no config file is found; the
/// gateway's `validate()` call turns that into a helpful error.
pub fn load_config(config_override: Option<&str>) -> anyhow::Result<BotConfig> {
    let path = match config_override {
        Some(path_str) => {
            let path = PathBuf::from(path_str);
            if !path.exists() {
                anyhow::bail!("config file not found: {path_str}");
            }
            Some(path)
        }
        None => discover_config_path(),
    };

    match path {
        Some(path) => {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            let config: BotConfig = serde_json::from_str(&contents)
                .with_context(|| format!("failed to parse config: {}", path.display()))?;
            Ok(config)
        }
        None => Ok(BotConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_config(contents: &str) -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let pid = std::process::id();
        let path = std::env::temp_dir().join(format!("ribit_cfg_test_{pid}_{id}.json"));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn load_config_reads_file() {
        let path = temp_config(
            r#"{"matrix": {"homeserverUrl": "https://envs.net", "userId": "@r:envs.net"}}"#,
        );
        let config = load_config(path.to_str()).unwrap();
        assert_eq!(config.matrix.homeserver_url, "https://envs.net");
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn load_config_rejects_missing_override() {
        let err = load_config(Some("/does/not/exist.json")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn load_config_rejects_malformed_json() {
        let path = temp_config("{not json");
        let err = load_config(path.to_str()).unwrap_err();
        assert!(err.to_string().contains("parse"));
        let _ = std::fs::remove_file(path);
    }
}

//! Default filesystem locations for configuration and sync state
//!
//! Follows platform conventions: LOCALAPPDATA on Windows, ~/Library/Caches
//! on macOS, XDG directories elsewhere.

use std::path::PathBuf;

const APP_DIR: &str = "book-rag";

fn platform_cache_dir() -> PathBuf {
    if cfg!(target_os = "windows") {
        PathBuf::from(std::env::var("LOCALAPPDATA").unwrap_or_else(|_| ".".to_string()))
    } else if cfg!(target_os = "macos") {
        PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".to_string()))
            .join("Library/Caches")
    } else {
        PathBuf::from(std::env::var("XDG_CACHE_HOME").unwrap_or_else(|_| {
            format!(
                "{}/.cache",
                std::env::var("HOME").unwrap_or_else(|_| ".".to_string())
            )
        }))
    }
}

fn platform_config_dir() -> PathBuf {
    if cfg!(target_os = "windows") {
        PathBuf::from(std::env::var("APPDATA").unwrap_or_else(|_| ".".to_string()))
    } else if cfg!(target_os = "macos") {
        PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".to_string()))
            .join("Library/Application Support")
    } else {
        PathBuf::from(std::env::var("XDG_CONFIG_HOME").unwrap_or_else(|_| {
            format!(
                "{}/.config",
                std::env::var("HOME").unwrap_or_else(|_| ".".to_string())
            )
        }))
    }
}

/// Default location of the TOML configuration file
pub fn default_config_path() -> PathBuf {
    platform_config_dir().join(APP_DIR).join("config.toml")
}

/// Default location of the persisted sync registry
pub fn default_registry_path() -> PathBuf {
    platform_cache_dir().join(APP_DIR).join("sync_registry.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_end_with_expected_names() {
        assert!(default_config_path().ends_with("book-rag/config.toml"));
        assert!(default_registry_path().ends_with("book-rag/sync_registry.json"));
    }
}

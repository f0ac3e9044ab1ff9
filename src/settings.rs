use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Records per bulk write handed to the persistence sink.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Concurrency ceiling for file parsing, independent of batch size.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    /// Per-file size limit; oversize files fail individually.
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,
}

fn default_chunk_size() -> usize {
    1000
}

fn default_max_workers() -> usize {
    4
}

fn default_max_file_size_mb() -> u64 {
    500
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            max_workers: default_max_workers(),
            max_file_size_mb: default_max_file_size_mb(),
        }
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("auxledger")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

pub fn load_settings() -> Settings {
    load_settings_from(&settings_path())
}

/// Missing or unreadable files fall back to defaults; a settings file is
/// never required.
pub fn load_settings_from(path: &Path) -> Settings {
    if path.exists() {
        let content = std::fs::read_to_string(path).unwrap_or_default();
        serde_json::from_str(&content).unwrap_or_default()
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    save_settings_to(&settings_path(), settings)
}

pub fn save_settings_to(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| LedgerError::Settings(e.to_string()))?;
    std::fs::write(path, format!("{json}\n"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.chunk_size, 1000);
        assert_eq!(s.max_workers, 4);
        assert_eq!(s.max_file_size_mb, 500);
    }

    #[test]
    fn test_partial_json_merges_with_defaults() {
        let s: Settings = serde_json::from_str(r#"{"chunk_size": 250}"#).unwrap();
        assert_eq!(s.chunk_size, 250);
        assert_eq!(s.max_workers, 4);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        // Parent directory does not exist yet; save creates it.
        let path = dir.path().join("conf").join("settings.json");
        let settings = Settings {
            chunk_size: 500,
            max_workers: 2,
            max_file_size_mb: 100,
        };
        save_settings_to(&path, &settings).unwrap();
        let loaded = load_settings_from(&path);
        assert_eq!(loaded.chunk_size, 500);
        assert_eq!(loaded.max_workers, 2);
        assert_eq!(loaded.max_file_size_mb, 100);
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_settings_from(&dir.path().join("absent.json"));
        assert_eq!(loaded.chunk_size, 1000);
        assert_eq!(loaded.max_workers, 4);
    }
}

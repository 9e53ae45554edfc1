//! # Configuration Module
//!
//! Handles configuration management, data directory setup, and persisted
//! identity for Encore.
//!
//! ## Data Storage
//!
//! Encore keeps its database and identity file in the platform-standard
//! data directory:
//! - Linux: `~/.local/share/encore/`
//! - macOS: `~/Library/Application Support/encore/`
//! - Windows: `%APPDATA%\encore\`
//!
//! ## Identity
//!
//! The active user is remembered between runs as a small JSON file. A
//! malformed file is treated as "nobody logged in" and removed, so a bad
//! write can never wedge the CLI.

use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Returns the platform-appropriate data directory for Encore, creating
/// it if necessary.
///
/// # Errors
///
/// Fails if the system data directory cannot be determined or the
/// `encore` subdirectory cannot be created.
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().ok_or_else(|| {
        anyhow::anyhow!(
            "Could not determine system data directory. Please ensure your platform supports standard data directories."
        )
    })?;

    let encore_dir = data_dir.join("encore");
    fs::create_dir_all(&encore_dir).with_context(|| {
        format!(
            "Failed to create Encore data directory at {}. Please check file permissions.",
            encore_dir.display()
        )
    })?;

    Ok(encore_dir)
}

/// Returns the platform-appropriate database file path.
///
/// - **Linux**: `~/.local/share/encore/catalog.db`
/// - **macOS**: `~/Library/Application Support/encore/catalog.db`
/// - **Windows**: `%APPDATA%\encore\catalog.db`
///
/// The parent directory is created on first call.
pub fn get_db_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join("catalog.db"))
}

fn identity_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join("identity.json"))
}

/// Configuration for runtime behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Path to the database file
    pub db_path: PathBuf,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            db_path: get_db_path().unwrap_or_else(|_| PathBuf::from("catalog.db")),
        }
    }
}

impl RuntimeConfig {
    /// Create a new runtime configuration
    pub fn new() -> Result<Self> {
        Ok(Self {
            db_path: get_db_path()?,
        })
    }

    /// Create configuration with explicit database path
    pub fn with_db_path(db_path: PathBuf) -> Self {
        Self { db_path }
    }
}

/// The persisted identity of the active user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredIdentity {
    pub user_id: String,
}

/// Load the remembered identity, if any. A file that exists but does not
/// parse is removed and reported as absence.
pub fn load_identity() -> Result<Option<StoredIdentity>> {
    let path = identity_path()?;
    load_identity_from(&path)
}

fn load_identity_from(path: &Path) -> Result<Option<StoredIdentity>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("Failed to read identity file {}", path.display()))
        }
    };
    match serde_json::from_str(&raw) {
        Ok(identity) => Ok(Some(identity)),
        Err(err) => {
            warn!("Discarding malformed identity file: {err}");
            fs::remove_file(path).with_context(|| {
                format!("Failed to remove malformed identity file {}", path.display())
            })?;
            Ok(None)
        }
    }
}

/// Persist `identity` as the remembered user.
pub fn save_identity(identity: &StoredIdentity) -> Result<()> {
    let path = identity_path()?;
    save_identity_to(&path, identity)
}

fn save_identity_to(path: &Path, identity: &StoredIdentity) -> Result<()> {
    let raw = serde_json::to_string_pretty(identity).context("Failed to encode identity")?;
    fs::write(path, raw)
        .with_context(|| format!("Failed to write identity file {}", path.display()))
}

/// Forget the remembered user. Missing file is fine.
pub fn clear_identity() -> Result<()> {
    let path = identity_path()?;
    match fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err)
            .with_context(|| format!("Failed to remove identity file {}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_get_db_path_returns_valid_path() {
        let path = get_db_path().expect("Should get valid path");
        assert_eq!(path.file_name().unwrap(), "catalog.db");
        assert!(path.parent().is_some());
        assert!(path.is_absolute(), "Database path should be absolute");
    }

    #[test]
    fn test_get_db_path_creates_directory() {
        let path = get_db_path().expect("Should get valid path");
        let parent_dir = path.parent().expect("Database path should have parent");
        assert!(parent_dir.exists());
        assert!(parent_dir.is_dir());
        assert_eq!(parent_dir.file_name().unwrap(), "encore");
    }

    #[test]
    fn test_get_db_path_consistent_results() {
        let path1 = get_db_path().expect("First call should succeed");
        let path2 = get_db_path().expect("Second call should succeed");
        assert_eq!(path1, path2);
    }

    #[test]
    fn identity_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("identity.json");
        let identity = StoredIdentity {
            user_id: "alice".to_string(),
        };
        save_identity_to(&path, &identity).unwrap();
        assert_eq!(load_identity_from(&path).unwrap(), Some(identity));
    }

    #[test]
    fn missing_identity_is_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("identity.json");
        assert_eq!(load_identity_from(&path).unwrap(), None);
    }

    #[test]
    fn malformed_identity_is_discarded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("identity.json");
        fs::write(&path, "{not json").unwrap();
        assert_eq!(load_identity_from(&path).unwrap(), None);
        // The bad file must be gone so the next run starts clean.
        assert!(!path.exists());
    }
}

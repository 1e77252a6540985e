//! Loading [`PeerConfig`] from a TOML file.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::domain::PeerConfig;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads the configuration at `path`.
///
/// `None`, or a path that does not exist, yields [`PeerConfig::default()`].
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: Option<&Path>) -> Result<PeerConfig, ConfigError> {
    let Some(path) = path else {
        return Ok(PeerConfig::default());
    };

    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(PeerConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_file(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("ipc-peer-{}-{name}", std::process::id()));
        std::fs::write(&path, content).expect("write scratch config");
        path
    }

    #[test]
    fn test_no_path_returns_defaults() {
        assert_eq!(load_config(None).unwrap(), PeerConfig::default());
    }

    #[test]
    fn test_missing_file_returns_defaults() {
        let path = std::env::temp_dir().join("ipc-peer-definitely-missing.toml");
        assert_eq!(load_config(Some(&path)).unwrap(), PeerConfig::default());
    }

    #[test]
    fn test_file_values_are_loaded() {
        // Arrange
        let path = scratch_file("valid.toml", "log_level = \"warn\"\n[connection]\nmax_frame_size = 512\n");

        // Act
        let cfg = load_config(Some(&path));
        let _ = std::fs::remove_file(&path);

        // Assert
        let cfg = cfg.expect("load");
        assert_eq!(cfg.log_level, "warn");
        assert_eq!(cfg.connection.max_frame_size, 512);
    }

    #[test]
    fn test_malformed_toml_is_a_parse_error() {
        let path = scratch_file("broken.toml", "log_level = [unterminated");

        let result = load_config(Some(&path));
        let _ = std::fs::remove_file(&path);

        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_directory_path_is_an_io_error() {
        let dir = std::env::temp_dir();
        assert!(matches!(load_config(Some(&dir)), Err(ConfigError::Io { .. })));
    }
}

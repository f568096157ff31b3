//! Layer configuration.
//!
//! Loaded from `config.toml` in the mufs config directory
//! (`$XDG_CONFIG_HOME/mufs/config.toml` on Linux). Every key is optional:
//!
//! ```toml
//! buffer_size = 65536
//! max_pooled_buffers = 16
//! rename_fallback = "atomic_only"
//! extra_filesystems = ["zfs"]
//! log_filter = "mufs_kernel=debug"
//! interrupt_poll_ms = 25
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// What a rename does when the native primitive refuses an existing destination.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenameFallback {
    /// Fail with the native error.
    #[default]
    AtomicOnly,
    /// Delete the destination, then retry. Not atomic: a crash in between loses
    /// the destination.
    DeleteThenRename,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VfsConfig {
    /// Bytes per pooled stream buffer.
    pub buffer_size: usize,
    /// Released buffers kept for reuse.
    pub max_pooled_buffers: usize,
    pub rename_fallback: RenameFallback,
    /// Mount-table filesystem types to treat as volumes in addition to the
    /// built-in list.
    pub extra_filesystems: Vec<String>,
    /// Default tracing filter for binaries, overridden by `RUST_LOG`.
    pub log_filter: String,
    /// Slice length of interruptible waits, in milliseconds.
    pub interrupt_poll_ms: u32,
}

impl Default for VfsConfig {
    fn default() -> Self {
        Self {
            buffer_size: 65536,
            max_pooled_buffers: 16,
            rename_fallback: RenameFallback::AtomicOnly,
            extra_filesystems: Vec::new(),
            log_filter: "info".to_string(),
            interrupt_poll_ms: 25,
        }
    }
}

impl VfsConfig {
    /// Default location of the config file, if a config directory exists.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("mufs").join("config.toml"))
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let config = Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Load from [`VfsConfig::default_path`].
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

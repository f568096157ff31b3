//! File factory: URL → file object.

use std::path::Path;
use std::sync::{Arc, OnceLock};

use mufs_types::FileUrl;
use uuid::Uuid;

use crate::config::VfsConfig;
use crate::vfs::error::{VfsError, VfsResult};
use crate::vfs::file::{FileHints, FileRef};
use crate::vfs::registry::{ProtocolRegistry, RegistryBuilder};
use crate::vfs::stream::BufferPool;
use crate::vfs::volume;

static GLOBAL: OnceLock<FileFactory> = OnceLock::new();

/// Unique temp names tried before giving up.
const MAX_TEMP_ATTEMPTS: usize = 16;

/// Resolves URLs to file objects through a frozen [`ProtocolRegistry`].
///
/// Cheap to clone; every clone shares the registry, the stream buffer pool, and
/// the configuration. Backends keep a clone to resolve parents and children.
#[derive(Clone)]
pub struct FileFactory {
    inner: Arc<FactoryInner>,
}

struct FactoryInner {
    registry: ProtocolRegistry,
    buffers: Arc<BufferPool>,
    config: VfsConfig,
}

impl FileFactory {
    pub fn new(registry: ProtocolRegistry, config: VfsConfig) -> Self {
        let buffers = BufferPool::new(config.buffer_size, config.max_pooled_buffers);
        Self {
            inner: Arc::new(FactoryInner {
                registry,
                buffers,
                config,
            }),
        }
    }

    /// Factory over the built-in backends.
    pub fn with_config(config: VfsConfig) -> Self {
        Self::new(RegistryBuilder::with_defaults().build(), config)
    }

    /// Install the process-wide factory. Only the first call succeeds.
    pub fn install_global(factory: FileFactory) -> VfsResult<()> {
        GLOBAL
            .set(factory)
            .map_err(|_| VfsError::other("global file factory already installed"))
    }

    /// The process-wide factory, defaulting to the built-in backends.
    pub fn global() -> &'static FileFactory {
        GLOBAL.get_or_init(|| FileFactory::with_config(VfsConfig::default()))
    }

    pub fn registry(&self) -> &ProtocolRegistry {
        &self.inner.registry
    }

    pub fn config(&self) -> &VfsConfig {
        &self.inner.config
    }

    pub fn buffer_pool(&self) -> &Arc<BufferPool> {
        &self.inner.buffers
    }

    pub fn get_file(&self, url: &FileUrl) -> VfsResult<FileRef> {
        self.get_file_with_hints(url, FileHints::default())
    }

    /// Resolve `url`, passing the hints to the provider.
    ///
    /// Non-directory files whose name matches a registered archive format come
    /// back wrapped by that format.
    pub fn get_file_with_hints(&self, url: &FileUrl, hints: FileHints<'_>) -> VfsResult<FileRef> {
        let provider = self
            .inner
            .registry
            .provider(url.scheme())
            .ok_or_else(|| VfsError::UnknownProtocol(url.scheme().to_string()))?;

        let file = provider.get_file(self, url.clone(), hints)?;
        self.wrap_archive(file)
    }

    /// Resolve a path or URL typed by a user. A leading `~` is the home directory.
    pub fn get_file_for_path(&self, text: &str) -> VfsResult<FileRef> {
        let expanded = shellexpand::tilde(text.trim());
        let url = FileUrl::parse(&expanded)?;
        self.get_file(&url)
    }

    /// Resolve a native path.
    pub fn get_file_at(&self, path: &Path) -> VfsResult<FileRef> {
        let text = path
            .to_str()
            .ok_or_else(|| VfsError::other(format!("path is not valid UTF-8: {}", path.display())))?;
        self.get_file(&FileUrl::from_local_path(text)?)
    }

    fn wrap_archive(&self, file: FileRef) -> VfsResult<FileRef> {
        let registry = &self.inner.registry;
        if !registry.has_archive_formats() {
            return Ok(file);
        }
        match registry.archive_format_for(&file.name()) {
            Some(format) if !file.is_directory() => {
                tracing::debug!(path = %file.url(), format = %format.format_name(), "wrapping archive");
                format.wrap(self, file)
            }
            _ => Ok(file),
        }
    }

    /// The system temporary directory.
    pub fn temporary_folder(&self) -> VfsResult<FileRef> {
        self.get_file_at(&std::env::temp_dir())
    }

    /// A file in the temporary directory that does not exist yet.
    ///
    /// `desired_name` is used as is when free; otherwise a random suffix is
    /// inserted before its extension. Nothing is created on disk.
    pub fn temporary_file(&self, desired_name: Option<&str>) -> VfsResult<FileRef> {
        let folder = self.temporary_folder()?;
        let desired = desired_name
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("mufs_{}", Uuid::new_v4().simple()));

        let (stem, extension) = match desired.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => (stem, Some(ext)),
            _ => (desired.as_str(), None),
        };

        let mut candidate = desired.clone();
        for _ in 0..MAX_TEMP_ATTEMPTS {
            let file = self.get_file(&folder.url().join(&candidate))?;
            if !file.exists() {
                file.set_parent(Some(Arc::clone(&folder)));
                return Ok(file);
            }

            let suffix = Uuid::new_v4().simple().to_string();
            let suffix = &suffix[..8];
            candidate = match extension {
                Some(ext) => format!("{stem}_{suffix}.{ext}"),
                None => format!("{stem}_{suffix}"),
            };
        }
        Err(VfsError::already_exists(folder.url().join(&desired).to_string()))
    }

    /// The current user's home directory, if it can be determined.
    pub fn user_home(&self) -> Option<FileRef> {
        let home = dirs::home_dir()?;
        match self.get_file_at(&home) {
            Ok(file) => Some(file),
            Err(e) => {
                tracing::warn!(path = %home.display(), error = %e, "unusable home directory");
                None
            }
        }
    }

    /// Volumes currently mounted. Recomputed on every call.
    pub fn volumes(&self) -> Vec<FileRef> {
        volume::discover_volumes(self)
    }
}

impl std::fmt::Debug for FileFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileFactory")
            .field("registry", &self.inner.registry)
            .field("config", &self.inner.config)
            .finish()
    }
}

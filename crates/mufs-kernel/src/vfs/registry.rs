//! Protocol registry.
//!
//! Maps URL schemes to providers. Built once at startup through
//! [`RegistryBuilder`], then frozen into a [`ProtocolRegistry`] that is only
//! read. There is no removal and no locking after `build()`.

use std::collections::HashMap;
use std::sync::Arc;

use mufs_types::FileUrl;

use crate::vfs::error::{VfsError, VfsResult};
use crate::vfs::factory::FileFactory;
use crate::vfs::file::{FileHints, FileRef};

/// Constructs file objects for one scheme.
pub trait ProtocolProvider: Send + Sync {
    fn get_file(&self, factory: &FileFactory, url: FileUrl, hints: FileHints<'_>) -> VfsResult<FileRef>;
}

impl<F> ProtocolProvider for F
where
    F: Fn(&FileFactory, FileUrl, FileHints<'_>) -> VfsResult<FileRef> + Send + Sync,
{
    fn get_file(&self, factory: &FileFactory, url: FileUrl, hints: FileHints<'_>) -> VfsResult<FileRef> {
        self(factory, url, hints)
    }
}

/// Presents a regular file of a recognised archive format as a browsable
/// directory.
pub trait ArchiveFormatProvider: Send + Sync {
    /// Short label for logs.
    fn format_name(&self) -> &str;

    /// True if a file with this name is an archive of this format.
    fn matches(&self, name: &str) -> bool;

    /// Wrap `file` in the archive backend.
    fn wrap(&self, factory: &FileFactory, file: FileRef) -> VfsResult<FileRef>;
}

/// Registration group, for logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ProtocolGroup {
    Builtin,
    Network,
    Other,
}

/// Mutable registry under construction.
#[derive(Default)]
pub struct RegistryBuilder {
    protocols: HashMap<String, Arc<dyn ProtocolProvider>>,
    archives: Vec<Arc<dyn ArchiveFormatProvider>>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder with the built-in backends: `file`, plus `mem` when the
    /// `memory` feature is on.
    pub fn with_defaults() -> Self {
        let mut builder = Self::new();
        builder.insert(ProtocolGroup::Builtin, mufs_types::FILE_SCHEME, Arc::new(crate::vfs::backends::LocalFile::provide));
        #[cfg(feature = "memory")]
        builder.insert(
            ProtocolGroup::Builtin,
            crate::vfs::backends::MEMORY_SCHEME,
            Arc::new(crate::vfs::backends::MemoryProvider::new()),
        );
        builder
    }

    /// Bind `scheme` to `provider`. Fails if the scheme is already bound.
    pub fn register(&mut self, scheme: &str, provider: impl ProtocolProvider + 'static) -> VfsResult<&mut Self> {
        self.register_in(ProtocolGroup::Other, scheme, Arc::new(provider))?;
        Ok(self)
    }

    /// Bind `scheme` to `provider`, replacing any existing binding, which is
    /// returned.
    pub fn register_override(
        &mut self,
        scheme: &str,
        provider: impl ProtocolProvider + 'static,
    ) -> Option<Arc<dyn ProtocolProvider>> {
        let previous = self.insert(ProtocolGroup::Other, scheme, Arc::new(provider));
        if previous.is_some() {
            tracing::debug!(scheme = %scheme.to_ascii_lowercase(), "overrode protocol provider");
        }
        previous
    }

    /// Register a batch of network protocol backends.
    pub fn register_network_protocols<I>(&mut self, providers: I) -> VfsResult<&mut Self>
    where
        I: IntoIterator<Item = (String, Arc<dyn ProtocolProvider>)>,
    {
        for (scheme, provider) in providers {
            self.register_in(ProtocolGroup::Network, &scheme, provider)?;
        }
        Ok(self)
    }

    /// Register a batch of non-network backends.
    pub fn register_other_protocols<I>(&mut self, providers: I) -> VfsResult<&mut Self>
    where
        I: IntoIterator<Item = (String, Arc<dyn ProtocolProvider>)>,
    {
        for (scheme, provider) in providers {
            self.register_in(ProtocolGroup::Other, &scheme, provider)?;
        }
        Ok(self)
    }

    /// Register archive formats. Earlier registrations win when several match.
    pub fn register_archive_formats<I>(&mut self, formats: I) -> &mut Self
    where
        I: IntoIterator<Item = Arc<dyn ArchiveFormatProvider>>,
    {
        for format in formats {
            tracing::debug!(format = %format.format_name(), "registered archive format");
            self.archives.push(format);
        }
        self
    }

    fn register_in(
        &mut self,
        group: ProtocolGroup,
        scheme: &str,
        provider: Arc<dyn ProtocolProvider>,
    ) -> VfsResult<()> {
        let scheme = scheme.to_ascii_lowercase();
        if self.protocols.contains_key(&scheme) {
            return Err(VfsError::ProtocolAlreadyRegistered(scheme));
        }
        self.insert(group, &scheme, provider);
        Ok(())
    }

    fn insert(
        &mut self,
        group: ProtocolGroup,
        scheme: &str,
        provider: Arc<dyn ProtocolProvider>,
    ) -> Option<Arc<dyn ProtocolProvider>> {
        let scheme = scheme.to_ascii_lowercase();
        tracing::debug!(scheme = %scheme, group = %group, "registered protocol");
        self.protocols.insert(scheme, provider)
    }

    /// Freeze the registry.
    pub fn build(self) -> ProtocolRegistry {
        let mut schemes: Vec<&str> = self.protocols.keys().map(String::as_str).collect();
        schemes.sort_unstable();
        tracing::info!(schemes = ?schemes, archives = self.archives.len(), "protocol registry ready");
        ProtocolRegistry {
            protocols: self.protocols,
            archives: self.archives,
        }
    }
}

/// Frozen scheme → provider map.
pub struct ProtocolRegistry {
    protocols: HashMap<String, Arc<dyn ProtocolProvider>>,
    archives: Vec<Arc<dyn ArchiveFormatProvider>>,
}

impl ProtocolRegistry {
    /// Provider for a (lower-case) scheme.
    pub fn provider(&self, scheme: &str) -> Option<&Arc<dyn ProtocolProvider>> {
        self.protocols.get(scheme)
    }

    pub fn is_registered(&self, scheme: &str) -> bool {
        self.protocols.contains_key(&scheme.to_ascii_lowercase())
    }

    /// Registered schemes, sorted.
    pub fn schemes(&self) -> Vec<&str> {
        let mut schemes: Vec<&str> = self.protocols.keys().map(String::as_str).collect();
        schemes.sort_unstable();
        schemes
    }

    /// First archive format matching `name`.
    pub fn archive_format_for(&self, name: &str) -> Option<&Arc<dyn ArchiveFormatProvider>> {
        self.archives.iter().find(|format| format.matches(name))
    }

    pub fn has_archive_formats(&self) -> bool {
        !self.archives.is_empty()
    }
}

impl std::fmt::Debug for RegistryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut schemes: Vec<&str> = self.protocols.keys().map(String::as_str).collect();
        schemes.sort_unstable();
        f.debug_struct("RegistryBuilder")
            .field("schemes", &schemes)
            .field("archives", &self.archives.len())
            .finish()
    }
}

impl std::fmt::Debug for ProtocolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolRegistry")
            .field("schemes", &self.schemes())
            .field("archives", &self.archives.iter().map(|a| a.format_name()).collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::backends::LocalFile;

    #[test]
    fn test_duplicate_scheme_rejected() {
        let mut builder = RegistryBuilder::with_defaults();
        let err = builder.register("FILE", LocalFile::provide).err().unwrap();
        assert!(matches!(err, VfsError::ProtocolAlreadyRegistered(s) if s == "file"));
    }

    #[test]
    fn test_override_returns_previous() {
        let mut builder = RegistryBuilder::new();
        assert!(builder.register_override("file", LocalFile::provide).is_none());
        assert!(builder.register_override("file", LocalFile::provide).is_some());
        let registry = builder.build();
        assert_eq!(registry.schemes(), vec!["file"]);
    }

    #[test]
    fn test_grouped_registration() {
        let mut builder = RegistryBuilder::new();
        let provider: Arc<dyn ProtocolProvider> = Arc::new(LocalFile::provide);
        let providers = vec![
            ("ftp".to_string(), Arc::clone(&provider)),
            ("sftp".to_string(), provider),
        ];
        builder.register_network_protocols(providers).unwrap();
        let registry = builder.build();
        assert!(registry.is_registered("FTP"));
        assert!(registry.is_registered("sftp"));
        assert!(!registry.is_registered("smb"));
    }

    #[test]
    fn test_group_display_is_lowercase() {
        assert_eq!(ProtocolGroup::Builtin.to_string(), "builtin");
        assert_eq!(ProtocolGroup::Network.to_string(), "network");
    }

    #[test]
    fn test_builder_debug_lists_schemes() {
        let mut builder = RegistryBuilder::with_defaults();
        let err = builder.register("file", LocalFile::provide).unwrap_err();
        assert!(matches!(err, VfsError::ProtocolAlreadyRegistered(_)));
        let shown = format!("{builder:?}");
        assert!(shown.contains("\"file\""), "{shown}");
    }
}

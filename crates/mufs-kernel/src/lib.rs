//! # mufs-kernel
//!
//! Virtual filesystem layer for mufs.
//!
//! Every resource, whether a local file or a remote endpoint, is reached the
//! same way:
//! - Parse a [`FileUrl`]
//! - Ask the [`FileFactory`] for the matching [`FileObject`]
//! - Query metadata, list, rename, or open streams through that one trait
//!
//! Backends advertise which optional operations they implement through
//! [`Capabilities`]; calling anything else fails with
//! [`VfsError::Unsupported`] instead of a generic I/O error.
//!
//! All calls are blocking. Cancel an in-flight transfer by interrupting the
//! thread that issued it (see [`vfs::stream::interrupt`]).

pub mod config;
pub mod vfs;

pub use config::{ConfigError, RenameFallback, VfsConfig};
pub use mufs_types::{
    AccessClass, Capabilities, Credentials, FileOperation, FilePermissions, FileUrl,
    PermissionBits, Right, UrlError,
};
pub use vfs::{
    FileFactory, FileHints, FileObject, FilenameFilter, ProtocolProvider, RegistryBuilder,
    VfsError, VfsResult,
    backends::LocalFile,
};
#[cfg(feature = "memory")]
pub use vfs::backends::{MEMORY_SCHEME, MemoryFile, MemoryProvider};

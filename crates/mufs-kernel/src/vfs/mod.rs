//! Virtual filesystem layer.
//!
//! Resources are addressed by [`FileUrl`](mufs_types::FileUrl) and resolved by a
//! [`FileFactory`] to [`FileObject`]s. The registry maps URL schemes to the
//! backends that serve them:
//!
//! ```text
//! FileFactory::get_file(url)
//!   └─ ProtocolRegistry["file"] → LocalFile
//!   └─ ProtocolRegistry["mem"]  → MemoryFile
//!   └─ archive format matching the name (if any) wraps the result
//! ```

pub mod backends;
pub mod error;
pub mod factory;
pub mod file;
pub mod filter;
pub mod registry;
pub mod stream;
pub mod volume;

pub use error::{VfsError, VfsResult};
pub use factory::FileFactory;
pub use file::{FileHints, FileObject, FileRef, ParentCell, ParentLink};
pub use filter::{AndFilter, ExtensionFilter, FilenameFilter, OrFilter, RegexFilter, WildcardFilter};
pub use registry::{ArchiveFormatProvider, ProtocolGroup, ProtocolProvider, ProtocolRegistry, RegistryBuilder};
pub use stream::{InputStream, OutputStream, RandomAccessRead, RandomAccessWrite};

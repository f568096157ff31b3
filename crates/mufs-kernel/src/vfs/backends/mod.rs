//! Backend implementations.

pub mod local;
#[cfg(feature = "memory")]
mod memory;

pub use local::LocalFile;
#[cfg(feature = "memory")]
pub use memory::{MEMORY_SCHEME, MemoryFile, MemoryProvider};

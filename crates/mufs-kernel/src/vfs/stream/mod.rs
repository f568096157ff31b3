//! Stream adapters.
//!
//! Sequential streams are plain `Read`/`Write` trait objects; random-access
//! streams add seeking and length control. Native adapters read and write
//! through one pooled buffer each and can be interrupted from another thread
//! (see [`interrupt`]).

pub mod interrupt;
mod native;
mod pool;

use std::io::{Read, Seek, Write};

pub use native::NativeChannel;
pub use pool::{BufferPool, PooledBuffer};

use crate::vfs::error::VfsResult;

/// Sequential read stream.
pub type InputStream = Box<dyn Read + Send>;

/// Sequential write stream.
pub type OutputStream = Box<dyn Write + Send>;

/// Readable stream with a movable offset.
pub trait RandomAccessRead: Read + Seek + Send {
    /// Total length in bytes.
    fn length(&mut self) -> VfsResult<u64>;

    /// Current offset from the start.
    fn offset(&mut self) -> VfsResult<u64> {
        Ok(self.stream_position()?)
    }

    /// Release the underlying handle and buffer. Later calls fail.
    fn close(&mut self) -> VfsResult<()> {
        Ok(())
    }
}

/// Writable stream with a movable offset and adjustable length.
pub trait RandomAccessWrite: Write + Seek + Send {
    fn length(&mut self) -> VfsResult<u64>;

    fn offset(&mut self) -> VfsResult<u64> {
        Ok(self.stream_position()?)
    }

    /// Grow or truncate to `len` bytes.
    ///
    /// Growing leaves the offset alone and zero-fills; truncating moves the
    /// offset back to `len` if it was beyond it.
    fn set_length(&mut self, len: u64) -> VfsResult<()>;

    fn close(&mut self) -> VfsResult<()> {
        self.flush()?;
        Ok(())
    }
}

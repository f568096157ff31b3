//! Interruptible adapter over a native file handle.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use parking_lot::Mutex;

use super::interrupt;
use super::pool::{BufferPool, PooledBuffer};
use super::{RandomAccessRead, RandomAccessWrite};
use crate::vfs::error::{VfsError, VfsResult};

#[derive(Clone, Copy, Debug)]
enum Readiness {
    Read,
    Write,
}

/// Buffered, interruptible channel over a [`File`].
///
/// Every chunk goes through the pooled buffer, at most one buffer length per
/// call. Before each chunk the calling thread's interrupt status is checked
/// and, on unix, readiness is awaited in short `poll(2)` slices, so a call
/// blocked on a pipe or fifo returns [`VfsError::Interrupted`] soon after the
/// thread is interrupted. An interrupted channel closes itself: the buffer
/// goes back to the pool and later calls fail with [`VfsError::StreamClosed`].
pub struct NativeChannel {
    file: Option<File>,
    buffer: Mutex<Option<PooledBuffer>>,
    poll_slice_ms: i32,
    path: String,
}

impl NativeChannel {
    pub fn new(file: File, pool: &Arc<BufferPool>, poll_slice_ms: u32, path: impl Into<String>) -> Self {
        Self {
            file: Some(file),
            buffer: Mutex::new(Some(pool.acquire())),
            poll_slice_ms: i32::try_from(poll_slice_ms.max(1)).unwrap_or(i32::MAX),
            path: path.into(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }

    /// Drop the handle and return the buffer. Idempotent.
    pub fn shutdown(&mut self) {
        self.buffer.lock().take();
        if self.file.take().is_some() {
            tracing::trace!(path = %self.path, "closed native channel");
        }
    }

    fn file(&mut self) -> VfsResult<&mut File> {
        self.file.as_mut().ok_or(VfsError::StreamClosed)
    }

    fn read_chunk(&mut self, out: &mut [u8]) -> VfsResult<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        let file = self.file.as_mut().ok_or(VfsError::StreamClosed)?;
        let mut slot = self.buffer.lock();
        let buffer = slot.as_mut().ok_or(VfsError::StreamClosed)?;

        wait_ready(file, Readiness::Read, self.poll_slice_ms)?;
        let len = out.len().min(buffer.len());
        let n = file
            .read(&mut buffer[..len])
            .map_err(|e| VfsError::from_io(e, &self.path))?;
        out[..n].copy_from_slice(&buffer[..n]);
        Ok(n)
    }

    fn write_chunk(&mut self, data: &[u8]) -> VfsResult<usize> {
        if data.is_empty() {
            return Ok(0);
        }
        let file = self.file.as_mut().ok_or(VfsError::StreamClosed)?;
        let mut slot = self.buffer.lock();
        let buffer = slot.as_mut().ok_or(VfsError::StreamClosed)?;

        wait_ready(file, Readiness::Write, self.poll_slice_ms)?;
        let len = data.len().min(buffer.len());
        buffer[..len].copy_from_slice(&data[..len]);
        file.write(&buffer[..len])
            .map_err(|e| VfsError::from_io(e, &self.path))
    }

    /// Map a result to `io::Result`, closing the channel on interruption.
    fn settle<T>(&mut self, result: VfsResult<T>) -> io::Result<T> {
        match result {
            Ok(value) => Ok(value),
            Err(VfsError::Interrupted) => {
                tracing::debug!(path = %self.path, "stream interrupted, closing");
                self.shutdown();
                Err(VfsError::Interrupted.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn truncate_or_extend(&mut self, len: u64) -> VfsResult<()> {
        let path = self.path.clone();
        let io_err = |e| VfsError::from_io(e, &path);
        let file = self.file()?;

        let current = file.metadata().map_err(io_err)?.len();
        if len < current {
            file.set_len(len).map_err(io_err)?;
            if file.stream_position().map_err(io_err)? > len {
                file.seek(SeekFrom::Start(len)).map_err(io_err)?;
            }
        } else if len > current {
            let offset = file.stream_position().map_err(io_err)?;
            file.seek(SeekFrom::Start(len - 1)).map_err(io_err)?;
            file.write_all(&[0]).map_err(io_err)?;
            file.seek(SeekFrom::Start(offset)).map_err(io_err)?;
        }
        Ok(())
    }
}

impl Read for NativeChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let result = self.read_chunk(buf);
        self.settle(result)
    }
}

impl Write for NativeChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let result = self.write_chunk(buf);
        self.settle(result)
    }

    fn flush(&mut self) -> io::Result<()> {
        let result = self.file().and_then(|f| f.flush().map_err(VfsError::from));
        self.settle(result)
    }
}

impl Seek for NativeChannel {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let result = self.file().and_then(|f| f.seek(pos).map_err(VfsError::from));
        self.settle(result)
    }
}

impl RandomAccessRead for NativeChannel {
    fn length(&mut self) -> VfsResult<u64> {
        let path = self.path.clone();
        Ok(self.file()?.metadata().map_err(|e| VfsError::from_io(e, path))?.len())
    }

    fn close(&mut self) -> VfsResult<()> {
        self.shutdown();
        Ok(())
    }
}

impl RandomAccessWrite for NativeChannel {
    fn length(&mut self) -> VfsResult<u64> {
        RandomAccessRead::length(self)
    }

    fn set_length(&mut self, len: u64) -> VfsResult<()> {
        self.truncate_or_extend(len)
    }

    fn close(&mut self) -> VfsResult<()> {
        if let Some(file) = self.file.as_mut() {
            file.flush().map_err(|e| VfsError::from_io(e, &self.path))?;
        }
        self.shutdown();
        Ok(())
    }
}

impl std::fmt::Debug for NativeChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeChannel")
            .field("path", &self.path)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(unix)]
fn wait_ready(file: &File, readiness: Readiness, slice_ms: i32) -> VfsResult<()> {
    use rustix::event::{PollFd, PollFlags, poll};

    let flags = match readiness {
        Readiness::Read => PollFlags::IN,
        Readiness::Write => PollFlags::OUT,
    };
    loop {
        if interrupt::is_interrupted() {
            return Err(VfsError::Interrupted);
        }
        let mut fds = [PollFd::new(file, flags)];
        match poll(&mut fds, slice_ms) {
            Ok(0) => continue,
            Ok(_) => return Ok(()),
            Err(rustix::io::Errno::INTR) => continue,
            Err(e) => return Err(VfsError::Io(e.into())),
        }
    }
}

#[cfg(not(unix))]
fn wait_ready(_file: &File, _readiness: Readiness, _slice_ms: i32) -> VfsResult<()> {
    if interrupt::is_interrupted() {
        return Err(VfsError::Interrupted);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn channel(dir: &TempDir, name: &str, pool: &Arc<BufferPool>) -> NativeChannel {
        let path = dir.path().join(name);
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .unwrap();
        NativeChannel::new(file, pool, 10, path.display().to_string())
    }

    #[test]
    fn test_chunks_larger_than_buffer() {
        let dir = TempDir::new().unwrap();
        let pool = BufferPool::new(4, 2);
        let mut ch = channel(&dir, "a.bin", &pool);

        let data: Vec<u8> = (0..37).collect();
        ch.write_all(&data).unwrap();
        ch.seek(SeekFrom::Start(0)).unwrap();
        let mut back = Vec::new();
        ch.read_to_end(&mut back).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn test_set_length_grows_and_truncates() {
        let dir = TempDir::new().unwrap();
        let pool = BufferPool::new(64, 2);
        let mut ch = channel(&dir, "b.bin", &pool);

        ch.write_all(b"hello world").unwrap();
        assert_eq!(RandomAccessWrite::offset(&mut ch).unwrap(), 11);

        ch.set_length(20).unwrap();
        assert_eq!(RandomAccessWrite::length(&mut ch).unwrap(), 20);
        assert_eq!(RandomAccessWrite::offset(&mut ch).unwrap(), 11);

        ch.set_length(5).unwrap();
        assert_eq!(RandomAccessWrite::length(&mut ch).unwrap(), 5);
        assert_eq!(RandomAccessWrite::offset(&mut ch).unwrap(), 5);
    }

    #[test]
    fn test_interrupted_thread_closes_channel() {
        let dir = TempDir::new().unwrap();
        let pool = BufferPool::new(8, 2);
        let mut ch = channel(&dir, "c.bin", &pool);
        ch.write_all(b"data").unwrap();
        assert_eq!(pool.outstanding(), 1);

        interrupt::InterruptHandle::current().interrupt();
        let err = ch.read(&mut [0u8; 4]).unwrap_err();
        assert!(VfsError::from(err).is_interrupted());
        assert!(ch.is_closed());
        assert_eq!(pool.outstanding(), 0);

        interrupt::clear();
        let err = ch.read(&mut [0u8; 4]).unwrap_err();
        assert!(matches!(VfsError::from(err), VfsError::StreamClosed));
    }
}

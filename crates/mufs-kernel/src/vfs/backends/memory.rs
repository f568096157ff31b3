//! In-memory filesystem backend.
//!
//! Scheme `mem`. Every host name gets its own tree, shared by all file objects
//! addressing it for the lifetime of the provider: `mem://scratch/a.txt` and
//! `mem://scratch/` see the same data. All data is ephemeral.

use std::any::Any;
use std::collections::HashMap;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::sync::{Arc, Weak};
use std::time::SystemTime;

use mufs_types::{
    AccessClass, Capabilities, FileOperation, FilePermissions, FileUrl, PermissionBits, Right,
};
use parking_lot::{Mutex, RwLock};

use crate::vfs::error::{VfsError, VfsResult};
use crate::vfs::factory::FileFactory;
use crate::vfs::file::{FileHints, FileObject, FileRef, ParentCell};
use crate::vfs::filter::FilenameFilter;
use crate::vfs::registry::ProtocolProvider;
use crate::vfs::stream::{InputStream, OutputStream, RandomAccessRead, RandomAccessWrite};

pub const MEMORY_SCHEME: &str = "mem";

const ROOT: &str = "/";

/// Entry in a memory tree.
#[derive(Debug, Clone)]
struct Entry {
    kind: EntryKind,
    permissions: PermissionBits,
    created: SystemTime,
    modified: SystemTime,
    accessed: SystemTime,
}

#[derive(Debug, Clone)]
enum EntryKind {
    File(Vec<u8>),
    Directory,
}

impl Entry {
    fn file(data: Vec<u8>) -> Self {
        Self::new(EntryKind::File(data), FilePermissions::DEFAULT_FILE.bits())
    }

    fn directory() -> Self {
        Self::new(EntryKind::Directory, FilePermissions::DEFAULT_DIRECTORY.bits())
    }

    fn new(kind: EntryKind, permissions: PermissionBits) -> Self {
        let now = SystemTime::now();
        Self {
            kind,
            permissions,
            created: now,
            modified: now,
            accessed: now,
        }
    }

    fn is_directory(&self) -> bool {
        matches!(self.kind, EntryKind::Directory)
    }
}

/// One tree, keyed by normalized URL path.
#[derive(Debug)]
struct MemoryStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryStore {
    fn new() -> Self {
        let mut entries = HashMap::new();
        // Root directory always exists
        entries.insert(ROOT.to_string(), Entry::directory());
        Self {
            entries: RwLock::new(entries),
        }
    }

    fn with_entry<T>(&self, path: &str, f: impl FnOnce(&Entry) -> T) -> VfsResult<T> {
        let entries = self.entries.read();
        entries.get(path).map(f).ok_or_else(|| VfsError::not_found(path))
    }

    fn with_entry_mut<T>(&self, path: &str, f: impl FnOnce(&mut Entry) -> T) -> VfsResult<T> {
        let mut entries = self.entries.write();
        entries.get_mut(path).map(f).ok_or_else(|| VfsError::not_found(path))
    }

    /// Insert a new entry under an existing directory.
    fn create(&self, path: &str, entry: Entry) -> VfsResult<()> {
        let mut entries = self.entries.write();
        if entries.contains_key(path) {
            return Err(VfsError::already_exists(path));
        }
        let parent = parent_path(path).ok_or_else(|| VfsError::already_exists(path))?;
        match entries.get(parent) {
            Some(e) if e.is_directory() => {}
            Some(_) => return Err(VfsError::not_a_directory(parent)),
            None => return Err(VfsError::not_found(parent)),
        }
        entries.insert(path.to_string(), entry);
        Ok(())
    }

    /// Replace the content of a file, creating it if missing.
    fn store(&self, path: &str, data: Vec<u8>) -> VfsResult<()> {
        {
            let mut entries = self.entries.write();
            if let Some(entry) = entries.get_mut(path) {
                if entry.is_directory() {
                    return Err(VfsError::is_a_directory(path));
                }
                entry.kind = EntryKind::File(data);
                entry.modified = SystemTime::now();
                return Ok(());
            }
        }
        self.create(path, Entry::file(data))
    }

    fn read(&self, path: &str) -> VfsResult<Vec<u8>> {
        let mut entries = self.entries.write();
        let entry = entries.get_mut(path).ok_or_else(|| VfsError::not_found(path))?;
        match &entry.kind {
            EntryKind::File(data) => {
                let data = data.clone();
                entry.accessed = SystemTime::now();
                Ok(data)
            }
            EntryKind::Directory => Err(VfsError::is_a_directory(path)),
        }
    }

    /// Names of the direct children of a directory, sorted.
    fn children(&self, path: &str) -> VfsResult<Vec<String>> {
        let entries = self.entries.read();
        match entries.get(path) {
            Some(e) if e.is_directory() => {}
            Some(_) => return Err(VfsError::not_a_directory(path)),
            None => return Err(VfsError::not_found(path)),
        }

        let mut names: Vec<String> = entries
            .keys()
            .filter(|key| parent_path(key) == Some(path))
            .filter_map(|key| key.rsplit('/').next().map(str::to_string))
            .collect();
        names.sort();
        Ok(names)
    }

    fn delete(&self, path: &str) -> VfsResult<()> {
        if path == ROOT {
            return Err(VfsError::access_denied(path));
        }
        let mut entries = self.entries.write();
        let entry = entries.get(path).ok_or_else(|| VfsError::not_found(path))?;
        if entry.is_directory() && entries.keys().any(|key| parent_path(key) == Some(path)) {
            return Err(VfsError::directory_not_empty(path));
        }
        entries.remove(path);
        Ok(())
    }

    /// Move `from` (and its subtree) to `to`, replacing a file or an empty
    /// directory at `to`.
    fn rename(&self, from: &str, to: &str) -> VfsResult<()> {
        let mut entries = self.entries.write();
        let source_is_dir = entries
            .get(from)
            .map(Entry::is_directory)
            .ok_or_else(|| VfsError::not_found(from))?;
        if from == ROOT || is_within(to, from) {
            return Err(VfsError::other(format!("cannot move {from} into itself")));
        }

        let to_parent = parent_path(to).ok_or_else(|| VfsError::already_exists(to))?;
        if !entries.get(to_parent).is_some_and(Entry::is_directory) {
            return Err(VfsError::not_found(to_parent));
        }

        if let Some(existing) = entries.get(to) {
            match (source_is_dir, existing.is_directory()) {
                (false, true) => return Err(VfsError::is_a_directory(to)),
                (true, false) => return Err(VfsError::not_a_directory(to)),
                (true, true) if entries.keys().any(|key| parent_path(key) == Some(to)) => {
                    return Err(VfsError::directory_not_empty(to));
                }
                _ => {}
            }
        }

        let moved: Vec<String> = entries.keys().filter(|key| is_within(key, from)).cloned().collect();
        for old in moved {
            if let Some(entry) = entries.remove(&old) {
                let new = format!("{to}{}", &old[from.len()..]);
                entries.insert(new, entry);
            }
        }
        Ok(())
    }
}

/// Parent of a normalized path; `None` for the root.
fn parent_path(path: &str) -> Option<&str> {
    if path == ROOT {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some(ROOT),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

/// `path` equals `dir` or lies below it.
fn is_within(path: &str, dir: &str) -> bool {
    if dir == ROOT {
        return true;
    }
    path == dir || path.strip_prefix(dir).is_some_and(|rest| rest.starts_with('/'))
}

/// Provider for the `mem` scheme. Keeps one tree per host name.
#[derive(Debug, Default)]
pub struct MemoryProvider {
    stores: Mutex<HashMap<String, Arc<MemoryStore>>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn store(&self, host: &str) -> Arc<MemoryStore> {
        let mut stores = self.stores.lock();
        Arc::clone(
            stores
                .entry(host.to_ascii_lowercase())
                .or_insert_with(|| Arc::new(MemoryStore::new())),
        )
    }
}

impl ProtocolProvider for MemoryProvider {
    fn get_file(&self, factory: &FileFactory, url: FileUrl, hints: FileHints<'_>) -> VfsResult<FileRef> {
        let store = self.store(url.host().unwrap_or_default());
        Ok(MemoryFile::open(factory, store, url, hints))
    }
}

/// A file or directory in a memory tree.
pub struct MemoryFile {
    url: FileUrl,
    store: Arc<MemoryStore>,
    factory: FileFactory,
    parent: ParentCell,
    this: Weak<MemoryFile>,
}

impl MemoryFile {
    fn open(factory: &FileFactory, store: Arc<MemoryStore>, url: FileUrl, hints: FileHints<'_>) -> Arc<Self> {
        let parent = match hints.parent {
            Some(parent) => ParentCell::linked(parent),
            None => ParentCell::new(),
        };
        Arc::new_cyclic(|this| MemoryFile {
            url,
            store,
            factory: factory.clone(),
            parent,
            this: this.clone(),
        })
    }

    fn path(&self) -> &str {
        self.url.path()
    }

    fn self_ref(&self) -> Option<FileRef> {
        self.this.upgrade().map(|this| this as FileRef)
    }

    fn writer(&self, data: Vec<u8>, position: u64) -> MemoryWriter {
        let mut cursor = Cursor::new(data);
        cursor.set_position(position);
        MemoryWriter {
            store: Arc::clone(&self.store),
            path: self.path().to_string(),
            cursor: Some(cursor),
            dirty: false,
        }
    }

    fn existing_data(&self) -> VfsResult<Vec<u8>> {
        match self.store.read(self.path()) {
            Ok(data) => Ok(data),
            Err(VfsError::NotFound(_)) => {
                self.store.store(self.path(), Vec::new())?;
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }
}

impl FileObject for MemoryFile {
    fn url(&self) -> &FileUrl {
        &self.url
    }

    fn absolute_path(&self) -> String {
        self.path().to_string()
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::all()
            - Capabilities::GET_FREE_SPACE
            - Capabilities::GET_TOTAL_SPACE
            - Capabilities::COPY_REMOTELY
            - Capabilities::GET_REPLICATION
            - Capabilities::CHANGE_REPLICATION
            - Capabilities::GET_BLOCKSIZE
    }

    fn exists(&self) -> bool {
        self.store.with_entry(self.path(), |_| ()).is_ok()
    }

    fn is_directory(&self) -> bool {
        self.store.with_entry(self.path(), Entry::is_directory).unwrap_or(false)
    }

    fn is_symlink(&self) -> bool {
        false
    }

    fn size(&self) -> VfsResult<u64> {
        self.store.with_entry(self.path(), |entry| match &entry.kind {
            EntryKind::File(data) => data.len() as u64,
            EntryKind::Directory => 0,
        })
    }

    fn last_modified(&self) -> VfsResult<SystemTime> {
        self.store.with_entry(self.path(), |entry| entry.modified)
    }

    fn set_last_modified(&self, time: SystemTime) -> VfsResult<()> {
        self.store.with_entry_mut(self.path(), |entry| entry.modified = time)
    }

    fn creation_date(&self) -> VfsResult<Option<SystemTime>> {
        self.store.with_entry(self.path(), |entry| Some(entry.created))
    }

    fn last_access_date(&self) -> VfsResult<Option<SystemTime>> {
        self.store.with_entry(self.path(), |entry| Some(entry.accessed))
    }

    fn permissions(&self) -> FilePermissions {
        self.store
            .with_entry(self.path(), |entry| FilePermissions::full(entry.permissions))
            .unwrap_or(FilePermissions::UNKNOWN)
    }

    fn changeable_permissions(&self) -> PermissionBits {
        PermissionBits::FULL
    }

    fn change_permission(&self, class: AccessClass, right: Right, enabled: bool) -> VfsResult<()> {
        self.store.with_entry_mut(self.path(), |entry| {
            entry.permissions = entry.permissions.with_bit(class, right, enabled);
        })
    }

    fn parent(&self) -> Option<FileRef> {
        self.parent.get_or_resolve(|| {
            let parent_url = self.url.parent()?;
            self.factory.get_file(&parent_url).ok()
        })
    }

    fn set_parent(&self, parent: Option<FileRef>) {
        self.parent.set(parent);
    }

    fn is_root(&self) -> bool {
        self.path() == ROOT
    }

    fn root(&self) -> VfsResult<FileRef> {
        if self.is_root() {
            return self.self_ref().ok_or_else(|| VfsError::other("file object dropped"));
        }
        self.factory.get_file(&self.url.with_path(ROOT))
    }

    /// A memory tree is a single volume.
    fn volume(&self) -> VfsResult<FileRef> {
        self.root()
    }

    fn ls_filtered(&self, filter: Option<&dyn FilenameFilter>) -> VfsResult<Vec<FileRef>> {
        let this = self.self_ref();
        let mut children = Vec::new();
        for name in self.store.children(self.path())? {
            if filter.is_some_and(|f| !f.accept(&name)) {
                continue;
            }
            let hints = FileHints {
                parent: this.as_ref(),
                native: None,
            };
            children.push(self.factory.get_file_with_hints(&self.url.join(&name), hints)?);
        }
        tracing::debug!(url = %self.url, count = children.len(), "listed memory directory");
        Ok(children)
    }

    fn mkdir(&self) -> VfsResult<()> {
        self.store.create(self.path(), Entry::directory())
    }

    fn mkfile(&self) -> VfsResult<()> {
        self.store.create(self.path(), Entry::file(Vec::new()))
    }

    fn delete(&self) -> VfsResult<()> {
        self.store.delete(self.path())
    }

    fn rename_to(&self, dest: &dyn FileObject) -> VfsResult<()> {
        let Some(dest) = dest.as_any().downcast_ref::<MemoryFile>() else {
            return Err(VfsError::Unsupported(FileOperation::Rename));
        };
        if !Arc::ptr_eq(&self.store, &dest.store) {
            return Err(VfsError::cross_volume(format!("{} -> {}", self.url, dest.url)));
        }
        if self.path() == dest.path() {
            return Err(VfsError::SameFile(self.path().to_string()));
        }
        self.store.rename(self.path(), dest.path())
    }

    fn input_stream(&self) -> VfsResult<InputStream> {
        Ok(Box::new(MemoryReader {
            cursor: Cursor::new(self.store.read(self.path())?),
        }))
    }

    fn output_stream(&self) -> VfsResult<OutputStream> {
        self.store.store(self.path(), Vec::new())?;
        Ok(Box::new(self.writer(Vec::new(), 0)))
    }

    fn append_output_stream(&self) -> VfsResult<OutputStream> {
        let data = self.existing_data()?;
        let end = data.len() as u64;
        Ok(Box::new(self.writer(data, end)))
    }

    fn random_access_input(&self) -> VfsResult<Box<dyn RandomAccessRead>> {
        Ok(Box::new(MemoryReader {
            cursor: Cursor::new(self.store.read(self.path())?),
        }))
    }

    fn random_access_output(&self) -> VfsResult<Box<dyn RandomAccessWrite>> {
        let data = self.existing_data()?;
        Ok(Box::new(self.writer(data, 0)))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl std::fmt::Debug for MemoryFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryFile").field("url", &self.url.to_string()).finish()
    }
}

/// Reads a snapshot taken when the stream was opened.
struct MemoryReader {
    cursor: Cursor<Vec<u8>>,
}

impl Read for MemoryReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.cursor.read(buf)
    }
}

impl Seek for MemoryReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.cursor.seek(pos)
    }
}

impl RandomAccessRead for MemoryReader {
    fn length(&mut self) -> VfsResult<u64> {
        Ok(self.cursor.get_ref().len() as u64)
    }
}

/// Buffers writes and publishes the whole content on flush, close, or drop.
struct MemoryWriter {
    store: Arc<MemoryStore>,
    path: String,
    cursor: Option<Cursor<Vec<u8>>>,
    dirty: bool,
}

impl MemoryWriter {
    fn cursor(&mut self) -> io::Result<&mut Cursor<Vec<u8>>> {
        self.cursor.as_mut().ok_or_else(|| VfsError::StreamClosed.into())
    }

    fn commit(&mut self) -> VfsResult<()> {
        if !self.dirty {
            return Ok(());
        }
        if let Some(cursor) = &self.cursor {
            self.store.store(&self.path, cursor.get_ref().clone())?;
            self.dirty = false;
        }
        Ok(())
    }
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.cursor()?.write(buf)?;
        self.dirty = true;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.cursor()?;
        Ok(self.commit()?)
    }
}

impl Seek for MemoryWriter {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.cursor()?.seek(pos)
    }
}

impl RandomAccessWrite for MemoryWriter {
    fn length(&mut self) -> VfsResult<u64> {
        Ok(self.cursor()?.get_ref().len() as u64)
    }

    fn set_length(&mut self, len: u64) -> VfsResult<()> {
        let len_usize = usize::try_from(len).map_err(|_| VfsError::other(format!("length too large: {len}")))?;
        let cursor = self.cursor()?;
        cursor.get_mut().resize(len_usize, 0);
        if cursor.position() > len {
            cursor.set_position(len);
        }
        self.dirty = true;
        Ok(())
    }

    fn close(&mut self) -> VfsResult<()> {
        self.commit()?;
        self.cursor = None;
        Ok(())
    }
}

impl Drop for MemoryWriter {
    fn drop(&mut self) {
        if let Err(e) = self.commit() {
            tracing::warn!(path = %self.path, error = %e, "memory stream lost data on drop");
        }
    }
}

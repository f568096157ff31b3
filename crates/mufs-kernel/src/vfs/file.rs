//! The File Object contract.
//!
//! [`FileObject`] is the one trait every backend implements. Core queries are
//! required methods; optional operations have default bodies that fail with
//! [`VfsError::Unsupported`], and a backend overrides exactly the ones it lists
//! in [`FileObject::capabilities`].

use std::any::Any;
use std::io::Write;
use std::sync::{Arc, Weak};
use std::time::SystemTime;

use mufs_types::{
    AccessClass, Capabilities, FileOperation, FilePermissions, FileUrl, PermissionBits, Right,
};
use parking_lot::Mutex;

use crate::vfs::error::{VfsError, VfsResult};
use crate::vfs::filter::FilenameFilter;
use crate::vfs::stream::{InputStream, OutputStream, RandomAccessRead, RandomAccessWrite};

/// Shared handle to a file object of any backend.
pub type FileRef = Arc<dyn FileObject>;

/// Uniform handle to one addressable resource.
///
/// Instances are cheap to create and carry no identity beyond their URL. A
/// single call on a single instance is safe from any thread; ordering across
/// concurrent calls on the same path is the caller's concern.
pub trait FileObject: Send + Sync + Any {
    // ========================================================================
    // Identity
    // ========================================================================

    fn url(&self) -> &FileUrl;

    /// Absolute path in the backend's native syntax, without a trailing
    /// separator except at a root.
    fn absolute_path(&self) -> String;

    /// Absolute path with symbolic links resolved, falling back to
    /// [`FileObject::absolute_path`] when that fails.
    fn canonical_path(&self) -> String {
        self.absolute_path()
    }

    /// Native path separator.
    fn separator(&self) -> &'static str {
        "/"
    }

    /// Last path segment, or a backend-specific label for a root.
    fn name(&self) -> String {
        self.url().filename().unwrap_or("/").to_string()
    }

    /// Extension after the last `.` of the name, if any. Leading-dot names
    /// (`.profile`) and trailing dots have none.
    fn extension(&self) -> Option<String> {
        let name = self.name();
        let idx = name.rfind('.')?;
        (idx > 0 && idx + 1 < name.len()).then(|| name[idx + 1..].to_string())
    }

    /// Operations this instance implements.
    fn capabilities(&self) -> Capabilities;

    fn is_supported(&self, op: FileOperation) -> bool {
        self.capabilities().supports(op)
    }

    // ========================================================================
    // Attributes
    // ========================================================================

    fn exists(&self) -> bool;

    fn is_directory(&self) -> bool;

    fn is_symlink(&self) -> bool;

    fn is_hidden(&self) -> bool {
        self.name().starts_with('.')
    }

    /// True for files the OS treats as its own (Windows system attribute, macOS
    /// system folders).
    fn is_system(&self) -> bool {
        false
    }

    fn is_executable(&self) -> bool {
        !self.is_directory() && self.permissions().bit(AccessClass::Owner, Right::Execute)
    }

    fn can_read(&self) -> bool {
        self.permissions().bit(AccessClass::Owner, Right::Read)
    }

    fn size(&self) -> VfsResult<u64>;

    fn last_modified(&self) -> VfsResult<SystemTime>;

    fn set_last_modified(&self, _time: SystemTime) -> VfsResult<()> {
        Err(VfsError::Unsupported(FileOperation::ChangeDate))
    }

    /// `Ok(None)` when the backend or filesystem does not record it.
    fn creation_date(&self) -> VfsResult<Option<SystemTime>> {
        Ok(None)
    }

    /// `Ok(None)` when the backend or filesystem does not record it.
    fn last_access_date(&self) -> VfsResult<Option<SystemTime>> {
        Ok(None)
    }

    fn can_get_owner(&self) -> bool {
        false
    }

    /// Best effort: `None` when unknown.
    fn owner(&self) -> Option<String> {
        None
    }

    fn can_get_group(&self) -> bool {
        false
    }

    /// Best effort: `None` when unknown.
    fn group(&self) -> Option<String> {
        None
    }

    /// Always queryable. Bits the backend cannot express read as `false`.
    fn permissions(&self) -> FilePermissions;

    /// Bits [`FileObject::change_permission`] accepts. Fixed per backend.
    fn changeable_permissions(&self) -> PermissionBits {
        PermissionBits::EMPTY
    }

    fn change_permission(&self, _class: AccessClass, _right: Right, _enabled: bool) -> VfsResult<()> {
        Err(VfsError::Unsupported(FileOperation::ChangePermission))
    }

    // ========================================================================
    // Hierarchy
    // ========================================================================

    /// Parent file object, resolved on first use and cached. `None` at a root.
    fn parent(&self) -> Option<FileRef>;

    /// Replace the cached parent. `None` marks this file as having no parent.
    fn set_parent(&self, parent: Option<FileRef>);

    fn is_root(&self) -> bool;

    fn root(&self) -> VfsResult<FileRef>;

    /// The volume this file lives on.
    fn volume(&self) -> VfsResult<FileRef>;

    fn ls(&self) -> VfsResult<Vec<FileRef>> {
        self.ls_filtered(None)
    }

    /// Children whose name the filter accepts. Each child's parent is preset to
    /// this object.
    fn ls_filtered(&self, filter: Option<&dyn FilenameFilter>) -> VfsResult<Vec<FileRef>>;

    // ========================================================================
    // Mutation
    // ========================================================================

    fn mkdir(&self) -> VfsResult<()>;

    /// Create an empty regular file. Fails if anything exists at the path.
    fn mkfile(&self) -> VfsResult<()> {
        if self.exists() {
            return Err(VfsError::already_exists(self.absolute_path()));
        }
        let mut out = self.output_stream()?;
        out.flush()?;
        Ok(())
    }

    /// Delete a file or an empty directory.
    fn delete(&self) -> VfsResult<()>;

    /// Move this file to `dest`, replacing an existing destination file.
    fn rename_to(&self, _dest: &dyn FileObject) -> VfsResult<()> {
        Err(VfsError::Unsupported(FileOperation::Rename))
    }

    // ========================================================================
    // Streams
    // ========================================================================

    fn input_stream(&self) -> VfsResult<InputStream> {
        Err(VfsError::Unsupported(FileOperation::ReadFile))
    }

    /// Truncating write.
    fn output_stream(&self) -> VfsResult<OutputStream> {
        Err(VfsError::Unsupported(FileOperation::WriteFile))
    }

    fn append_output_stream(&self) -> VfsResult<OutputStream> {
        Err(VfsError::Unsupported(FileOperation::AppendFile))
    }

    fn random_access_input(&self) -> VfsResult<Box<dyn RandomAccessRead>> {
        Err(VfsError::Unsupported(FileOperation::RandomReadFile))
    }

    fn random_access_output(&self) -> VfsResult<Box<dyn RandomAccessWrite>> {
        Err(VfsError::Unsupported(FileOperation::RandomWriteFile))
    }

    // ========================================================================
    // Space
    // ========================================================================

    /// Bytes available to unprivileged users on this file's volume.
    fn free_space(&self) -> VfsResult<u64> {
        Err(VfsError::Unsupported(FileOperation::GetFreeSpace))
    }

    fn total_space(&self) -> VfsResult<u64> {
        Err(VfsError::Unsupported(FileOperation::GetTotalSpace))
    }

    // ========================================================================
    // Capability-gated extras (distributed and remote backends)
    // ========================================================================

    /// Server-side copy without streaming the bytes through this process.
    fn copy_remotely_to(&self, _dest: &dyn FileObject) -> VfsResult<()> {
        Err(VfsError::Unsupported(FileOperation::CopyRemotely))
    }

    fn replication(&self) -> VfsResult<u16> {
        Err(VfsError::Unsupported(FileOperation::GetReplication))
    }

    fn change_replication(&self, _replication: u16) -> VfsResult<()> {
        Err(VfsError::Unsupported(FileOperation::ChangeReplication))
    }

    fn blocksize(&self) -> VfsResult<u64> {
        Err(VfsError::Unsupported(FileOperation::GetBlocksize))
    }

    /// Heuristic: true for roots that look like removable media.
    fn guess_removable_drive(&self) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any;
}

impl std::fmt::Debug for dyn FileObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("FileObject").field(&self.url().to_string()).finish()
    }
}

/// Resolution state of a parent reference.
#[derive(Default)]
pub enum ParentLink {
    /// Not computed yet.
    #[default]
    Unresolved,
    /// Computed: there is no parent.
    Root,
    /// Preset by a directory listing. The child does not keep the directory alive.
    Linked(Weak<dyn FileObject>),
    /// Resolved lazily or set explicitly.
    Owned(FileRef),
}

/// Interior-mutable [`ParentLink`] for backends to embed.
#[derive(Default)]
pub struct ParentCell(Mutex<ParentLink>);

impl ParentCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start linked to the directory that listed this file.
    pub fn linked(parent: &FileRef) -> Self {
        Self(Mutex::new(ParentLink::Linked(Arc::downgrade(parent))))
    }

    /// Cached parent, or the result of `resolve` stored for next time.
    ///
    /// A `Linked` parent that has been dropped is resolved again.
    pub fn get_or_resolve(&self, resolve: impl FnOnce() -> Option<FileRef>) -> Option<FileRef> {
        {
            let link = self.0.lock();
            match &*link {
                ParentLink::Root => return None,
                ParentLink::Owned(parent) => return Some(parent.clone()),
                ParentLink::Linked(weak) => {
                    if let Some(parent) = weak.upgrade() {
                        return Some(parent);
                    }
                }
                ParentLink::Unresolved => {}
            }
        }

        // Resolution may hit the disk; don't hold the lock across it
        let resolved = resolve();
        *self.0.lock() = match &resolved {
            Some(parent) => ParentLink::Owned(parent.clone()),
            None => ParentLink::Root,
        };
        resolved
    }

    pub fn set(&self, parent: Option<FileRef>) {
        *self.0.lock() = match parent {
            Some(parent) => ParentLink::Owned(parent),
            None => ParentLink::Root,
        };
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(*self.0.lock(), ParentLink::Unresolved)
    }
}

/// Optional shortcuts passed to a provider.
///
/// Both are borrowed for the duration of one `get_file` call and never retained.
#[derive(Clone, Copy, Default)]
pub struct FileHints<'a> {
    /// Directory that is listing this file; becomes its parent.
    pub parent: Option<&'a FileRef>,
    /// Backend-specific native handle already obtained for this file (the local
    /// backend accepts a `std::fs::DirEntry`).
    pub native: Option<&'a dyn Any>,
}

impl<'a> FileHints<'a> {
    pub fn with_parent(parent: &'a FileRef) -> Self {
        Self {
            parent: Some(parent),
            native: None,
        }
    }
}

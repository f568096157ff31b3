//! Local filesystem backend.
//!
//! [`LocalFile`] implements the File Object contract over the host's native
//! file APIs. Paths are rendered in the host's syntax ([`PathStyle`]): a single
//! `/` tree on unix, one tree per drive letter plus UNC shares on Windows.

mod path;
mod permissions;
mod rename;

use std::any::Any;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::{SystemTime, UNIX_EPOCH};

use mufs_types::{
    AccessClass, Capabilities, FileOperation, FilePermissions, FileUrl, PermissionBits, Right,
};

use crate::vfs::error::{VfsError, VfsResult};
use crate::vfs::factory::FileFactory;
use crate::vfs::file::{FileHints, FileObject, FileRef, ParentCell};
use crate::vfs::filter::FilenameFilter;
use crate::vfs::stream::{InputStream, NativeChannel, OutputStream, RandomAccessRead, RandomAccessWrite};
use crate::vfs::volume;

pub use path::PathStyle;

/// Root folders macOS manages itself.
#[cfg(not(windows))]
const MACOS_SYSTEM_FOLDERS: &[&str] = &[
    "/.Trashes",
    "/.vol",
    "/dev",
    "/automount",
    "/bin",
    "/cores",
    "/etc",
    "/lost+found",
    "/Network",
    "/private",
    "/sbin",
    "/tmp",
    "/usr",
    "/var",
    "/mach.sym",
    "/mach_kernel",
    "/mach",
    "/Desktop DB",
    "/Desktop DF",
    "/File Transfer Folder",
    "/.hotfiles.btree",
    "/.Spotlight-V100",
    "/.hidden",
    "/AppleShare PDS",
    "/Cleanup At Startup",
    "/Desktop Folder",
    "/Network Trash Folder",
    "/Shutdown Check",
    "/Temporary Items",
    "/TheFindByContentFolder",
    "/TheVolumeSettingsFolder",
    "/Trash",
    "/VM Storage",
];

/// A file or directory on a locally mounted filesystem.
pub struct LocalFile {
    url: FileUrl,
    path: PathBuf,
    absolute_path: String,
    style: PathStyle,
    factory: FileFactory,
    parent: ParentCell,
    this: Weak<LocalFile>,
}

impl LocalFile {
    /// Build the file object for a `file` URL.
    ///
    /// A `std::fs::DirEntry` passed as the native hint supplies the path
    /// directly, skipping URL-to-path conversion.
    pub fn open(factory: &FileFactory, url: FileUrl, hints: FileHints<'_>) -> VfsResult<Arc<Self>> {
        let style = PathStyle::native();
        let path = match hints.native.and_then(|native| native.downcast_ref::<fs::DirEntry>()) {
            Some(entry) => entry.path(),
            None => PathBuf::from(style.url_to_native(&url)?),
        };
        let absolute_path = style.trim_trailing_separator(&path.to_string_lossy());

        let parent = match hints.parent {
            Some(parent) => ParentCell::linked(parent),
            None => ParentCell::new(),
        };

        Ok(Arc::new_cyclic(|this| LocalFile {
            url,
            path,
            absolute_path,
            style,
            factory: factory.clone(),
            parent,
            this: this.clone(),
        }))
    }

    /// [`ProtocolProvider`](crate::vfs::ProtocolProvider) for the `file` scheme.
    pub fn provide(factory: &FileFactory, url: FileUrl, hints: FileHints<'_>) -> VfsResult<FileRef> {
        Ok(Self::open(factory, url, hints)?)
    }

    /// Native path.
    pub fn native_path(&self) -> &Path {
        &self.path
    }

    fn self_ref(&self) -> Option<FileRef> {
        self.this.upgrade().map(|this| this as FileRef)
    }

    fn io_err(&self) -> impl Fn(std::io::Error) -> VfsError + '_ {
        move |e| VfsError::from_io(e, &self.absolute_path)
    }

    fn metadata(&self) -> VfsResult<fs::Metadata> {
        fs::metadata(&self.path).map_err(self.io_err())
    }

    fn capabilities_for_platform() -> Capabilities {
        let mut caps = Capabilities::READ_FILE
            | Capabilities::RANDOM_READ_FILE
            | Capabilities::WRITE_FILE
            | Capabilities::APPEND_FILE
            | Capabilities::RANDOM_WRITE_FILE
            | Capabilities::CREATE_DIRECTORY
            | Capabilities::LIST_CHILDREN
            | Capabilities::DELETE
            | Capabilities::RENAME
            | Capabilities::CHANGE_DATE
            | Capabilities::CHANGE_PERMISSION;
        if cfg!(unix) {
            caps |= Capabilities::GET_FREE_SPACE | Capabilities::GET_TOTAL_SPACE;
        }
        caps
    }

    fn channel(&self, file: File) -> NativeChannel {
        NativeChannel::new(
            file,
            self.factory.buffer_pool(),
            self.factory.config().interrupt_poll_ms,
            self.absolute_path.clone(),
        )
    }

    fn open_for_read(&self) -> VfsResult<File> {
        if self.path.is_dir() {
            return Err(VfsError::is_a_directory(&self.absolute_path));
        }
        File::open(&self.path).map_err(self.io_err())
    }

    fn open_with(&self, options: &OpenOptions) -> VfsResult<File> {
        options.open(&self.path).map_err(self.io_err())
    }

    fn same_root(&self, other: &LocalFile) -> bool {
        self.style.same_root(&self.absolute_path, &other.absolute_path)
    }

    #[cfg(unix)]
    fn statvfs(&self) -> VfsResult<rustix::fs::StatVfs> {
        rustix::fs::statvfs(&self.path).map_err(|e| VfsError::from_io(e.into(), &self.absolute_path))
    }
}

impl FileObject for LocalFile {
    fn url(&self) -> &FileUrl {
        &self.url
    }

    fn absolute_path(&self) -> String {
        self.absolute_path.clone()
    }

    fn canonical_path(&self) -> String {
        match dunce::canonicalize(&self.path) {
            Ok(path) => self.style.trim_trailing_separator(&path.to_string_lossy()),
            Err(_) => self.absolute_path.clone(),
        }
    }

    fn separator(&self) -> &'static str {
        self.style.separator()
    }

    fn name(&self) -> String {
        self.style.name_of(&self.absolute_path)
    }

    fn capabilities(&self) -> Capabilities {
        Self::capabilities_for_platform()
    }

    fn exists(&self) -> bool {
        self.path.exists()
    }

    fn is_directory(&self) -> bool {
        self.path.is_dir()
    }

    fn is_symlink(&self) -> bool {
        fs::symlink_metadata(&self.path).is_ok_and(|m| m.file_type().is_symlink())
    }

    #[cfg(windows)]
    fn is_hidden(&self) -> bool {
        use std::os::windows::fs::MetadataExt;

        const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;
        fs::metadata(&self.path).is_ok_and(|m| m.file_attributes() & FILE_ATTRIBUTE_HIDDEN != 0)
    }

    #[cfg(not(windows))]
    fn is_hidden(&self) -> bool {
        self.name().starts_with('.')
    }

    #[cfg(windows)]
    fn is_system(&self) -> bool {
        use std::os::windows::fs::MetadataExt;

        const FILE_ATTRIBUTE_SYSTEM: u32 = 0x4;
        fs::metadata(&self.path).is_ok_and(|m| m.file_attributes() & FILE_ATTRIBUTE_SYSTEM != 0)
    }

    #[cfg(not(windows))]
    fn is_system(&self) -> bool {
        if !cfg!(target_os = "macos") {
            return false;
        }
        if MACOS_SYSTEM_FOLDERS.contains(&self.absolute_path.as_str()) {
            return true;
        }
        // Per-user system folders
        dirs::home_dir().is_some_and(|home| {
            self.path == home.join(".Trash") || self.path == home.join("Temporary Items")
        })
    }

    fn size(&self) -> VfsResult<u64> {
        Ok(self.metadata()?.len())
    }

    fn last_modified(&self) -> VfsResult<SystemTime> {
        self.metadata()?.modified().map_err(self.io_err())
    }

    fn set_last_modified(&self, time: SystemTime) -> VfsResult<()> {
        // Dates before the epoch are not representable everywhere
        let time = time.max(UNIX_EPOCH);
        filetime::set_file_mtime(&self.path, filetime::FileTime::from_system_time(time))
            .map_err(self.io_err())
    }

    fn creation_date(&self) -> VfsResult<Option<SystemTime>> {
        Ok(self.metadata()?.created().ok())
    }

    fn last_access_date(&self) -> VfsResult<Option<SystemTime>> {
        Ok(self.metadata()?.accessed().ok())
    }

    fn can_get_owner(&self) -> bool {
        cfg!(unix)
    }

    #[cfg(unix)]
    fn owner(&self) -> Option<String> {
        use nix::unistd::{Uid, User};
        use std::os::unix::fs::MetadataExt;

        let uid = fs::symlink_metadata(&self.path).ok()?.uid();
        match User::from_uid(Uid::from_raw(uid)) {
            Ok(Some(user)) => Some(user.name),
            _ => Some(uid.to_string()),
        }
    }

    fn can_get_group(&self) -> bool {
        cfg!(unix)
    }

    #[cfg(unix)]
    fn group(&self) -> Option<String> {
        use nix::unistd::{Gid, Group};
        use std::os::unix::fs::MetadataExt;

        let gid = fs::symlink_metadata(&self.path).ok()?.gid();
        match Group::from_gid(Gid::from_raw(gid)) {
            Ok(Some(group)) => Some(group.name),
            _ => Some(gid.to_string()),
        }
    }

    fn permissions(&self) -> FilePermissions {
        match fs::metadata(&self.path) {
            Ok(meta) => permissions::from_metadata(&meta),
            Err(_) => FilePermissions::UNKNOWN,
        }
    }

    fn changeable_permissions(&self) -> PermissionBits {
        permissions::CHANGEABLE
    }

    fn change_permission(&self, class: AccessClass, right: Right, enabled: bool) -> VfsResult<()> {
        permissions::change(&self.path, class, right, enabled)
    }

    fn parent(&self) -> Option<FileRef> {
        self.parent.get_or_resolve(|| {
            if self.is_root() {
                return None;
            }
            let parent_url = self.url.parent()?;
            match self.factory.get_file(&parent_url) {
                Ok(parent) => Some(parent),
                Err(e) => {
                    tracing::debug!(path = %self.absolute_path, error = %e, "parent resolution failed");
                    None
                }
            }
        })
    }

    fn set_parent(&self, parent: Option<FileRef>) {
        self.parent.set(parent);
    }

    fn is_root(&self) -> bool {
        self.style.is_root(&self.absolute_path)
    }

    fn root(&self) -> VfsResult<FileRef> {
        if self.is_root() {
            return self.self_ref().ok_or_else(|| VfsError::other("file object dropped"));
        }
        let root_url = self.url.with_path(&self.style.root_url_path(&self.url));
        self.factory.get_file(&root_url)
    }

    fn volume(&self) -> VfsResult<FileRef> {
        let volumes = self.factory.volumes();
        match volume::resolve_volume(self, &volumes) {
            Some(volume) => Ok(volume),
            None => self.root(),
        }
    }

    fn ls_filtered(&self, filter: Option<&dyn FilenameFilter>) -> VfsResult<Vec<FileRef>> {
        let mut entries: Vec<(String, fs::DirEntry)> = Vec::new();
        for entry in fs::read_dir(&self.path).map_err(self.io_err())? {
            let entry = entry.map_err(self.io_err())?;
            // A lossy name would give the child a URL that no longer maps back to its path
            let Ok(name) = entry.file_name().into_string() else {
                tracing::warn!(path = %entry.path().display(), "skipping entry with a non-UTF-8 name");
                continue;
            };
            if filter.is_none_or(|f| f.accept(&name)) {
                entries.push((name, entry));
            }
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let this = self.self_ref();
        let mut children = Vec::with_capacity(entries.len());
        for (name, entry) in &entries {
            let hints = FileHints {
                parent: this.as_ref(),
                native: Some(entry as &dyn Any),
            };
            children.push(self.factory.get_file_with_hints(&self.url.join(name), hints)?);
        }

        tracing::debug!(path = %self.absolute_path, count = children.len(), "listed directory");
        Ok(children)
    }

    fn mkdir(&self) -> VfsResult<()> {
        fs::create_dir(&self.path).map_err(self.io_err())
    }

    fn mkfile(&self) -> VfsResult<()> {
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
            .map(drop)
            .map_err(self.io_err())
    }

    fn delete(&self) -> VfsResult<()> {
        let meta = fs::symlink_metadata(&self.path).map_err(self.io_err())?;
        let result = if meta.is_dir() {
            fs::remove_dir(&self.path)
        } else {
            fs::remove_file(&self.path)
        };
        result.map_err(self.io_err())
    }

    fn rename_to(&self, dest: &dyn FileObject) -> VfsResult<()> {
        let Some(dest) = dest.as_any().downcast_ref::<LocalFile>() else {
            return Err(VfsError::Unsupported(FileOperation::Rename));
        };
        if self.url == dest.url {
            return Err(VfsError::SameFile(self.absolute_path.clone()));
        }
        if fs::symlink_metadata(&self.path).is_err() {
            return Err(VfsError::not_found(&self.absolute_path));
        }
        if !self.same_root(dest) {
            return Err(VfsError::cross_volume(format!("{} -> {}", self.absolute_path, dest.absolute_path)));
        }

        let policy = self.factory.config().rename_fallback;
        rename::rename_with(&self.path, &dest.path, policy, |from, to| fs::rename(from, to))?;
        tracing::debug!(from = %self.absolute_path, to = %dest.absolute_path, "renamed");
        Ok(())
    }

    fn input_stream(&self) -> VfsResult<InputStream> {
        let file = self.open_for_read()?;
        Ok(Box::new(self.channel(file)))
    }

    fn output_stream(&self) -> VfsResult<OutputStream> {
        let file = self.open_with(OpenOptions::new().write(true).create(true).truncate(true))?;
        Ok(Box::new(self.channel(file)))
    }

    fn append_output_stream(&self) -> VfsResult<OutputStream> {
        let file = self.open_with(OpenOptions::new().append(true).create(true))?;
        Ok(Box::new(self.channel(file)))
    }

    fn random_access_input(&self) -> VfsResult<Box<dyn RandomAccessRead>> {
        let file = self.open_for_read()?;
        Ok(Box::new(self.channel(file)))
    }

    fn random_access_output(&self) -> VfsResult<Box<dyn RandomAccessWrite>> {
        let file = self.open_with(OpenOptions::new().read(true).write(true).create(true).truncate(false))?;
        Ok(Box::new(self.channel(file)))
    }

    #[cfg(unix)]
    fn free_space(&self) -> VfsResult<u64> {
        let stat = self.statvfs()?;
        Ok(stat.f_bavail.saturating_mul(stat.f_frsize))
    }

    #[cfg(unix)]
    fn total_space(&self) -> VfsResult<u64> {
        let stat = self.statvfs()?;
        Ok(stat.f_blocks.saturating_mul(stat.f_frsize))
    }

    /// Drive roots other than the system drive that are read-only are assumed to
    /// be removable (optical or write-protected media).
    fn guess_removable_drive(&self) -> bool {
        if self.style != PathStyle::DriveLetter || !self.is_root() {
            return false;
        }
        let system_drive = std::env::var("SystemDrive").unwrap_or_else(|_| "C:".to_string());
        if self.absolute_path.to_ascii_uppercase().starts_with(&system_drive.to_ascii_uppercase()) {
            return false;
        }
        fs::metadata(&self.path).is_ok_and(|m| m.permissions().readonly())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl std::fmt::Debug for LocalFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalFile").field("path", &self.absolute_path).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VfsConfig;
    use tempfile::TempDir;

    fn setup() -> (FileFactory, TempDir) {
        let dir = TempDir::new().unwrap();
        (FileFactory::with_config(VfsConfig::default()), dir)
    }

    fn file(factory: &FileFactory, path: &Path) -> FileRef {
        factory.get_file_at(path).unwrap()
    }

    #[test]
    fn test_name_and_extension() {
        let (factory, dir) = setup();
        let f = file(&factory, &dir.path().join("archive.tar.gz"));
        assert_eq!(f.name(), "archive.tar.gz");
        assert_eq!(f.extension().as_deref(), Some("gz"));

        let dot = file(&factory, &dir.path().join(".profile"));
        assert_eq!(dot.extension(), None);
        assert!(dot.is_hidden() || cfg!(windows));
    }

    #[test]
    fn test_ls_presets_parent_and_sorts() {
        let (factory, dir) = setup();
        fs::write(dir.path().join("b.txt"), b"bb").unwrap();
        fs::write(dir.path().join("a.txt"), b"a").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();

        let parent = file(&factory, dir.path());
        let children = parent.ls().unwrap();
        let names: Vec<_> = children.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt", "sub"]);

        for child in &children {
            assert!(Arc::ptr_eq(&child.parent().unwrap(), &parent));
        }
        assert_eq!(children[1].size().unwrap(), 2);
        assert!(children[2].is_directory());
    }

    #[test]
    fn test_ls_with_filter() {
        let (factory, dir) = setup();
        fs::write(dir.path().join("a.txt"), b"").unwrap();
        fs::write(dir.path().join("b.rs"), b"").unwrap();

        let parent = file(&factory, dir.path());
        let filter = |name: &str| name.ends_with(".rs");
        let children = parent.ls_filtered(Some(&filter)).unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].name(), "b.rs");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_ls_skips_non_utf8_names() {
        use std::os::unix::ffi::OsStrExt;

        let (factory, dir) = setup();
        fs::write(dir.path().join("ok.txt"), b"").unwrap();
        fs::write(dir.path().join(std::ffi::OsStr::from_bytes(b"bad\xff")), b"").unwrap();

        let children = file(&factory, dir.path()).ls().unwrap();
        let names: Vec<_> = children.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["ok.txt"]);
    }

    #[test]
    fn test_ls_on_file_fails_typed() {
        let (factory, dir) = setup();
        let path = dir.path().join("plain");
        fs::write(&path, b"x").unwrap();
        let err = file(&factory, &path).ls().unwrap_err();
        assert!(matches!(err, VfsError::NotADirectory(_) | VfsError::Io(_)));
    }

    #[test]
    fn test_mkdir_conflict() {
        let (factory, dir) = setup();
        let sub = file(&factory, &dir.path().join("sub"));
        sub.mkdir().unwrap();
        assert!(matches!(sub.mkdir(), Err(VfsError::AlreadyExists(_))));
        assert!(matches!(sub.mkfile(), Err(VfsError::AlreadyExists(_))));
    }

    #[test]
    fn test_delete_non_empty_directory() {
        let (factory, dir) = setup();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/f"), b"").unwrap();
        let err = file(&factory, &dir.path().join("sub")).delete().unwrap_err();
        assert!(matches!(err, VfsError::DirectoryNotEmpty(_)));
    }

    #[test]
    fn test_parent_resolved_lazily() {
        let (factory, dir) = setup();
        let f = file(&factory, &dir.path().join("x"));
        let parent = f.parent().unwrap();
        assert_eq!(parent.url(), file(&factory, dir.path()).url());
        // Cached
        assert!(Arc::ptr_eq(&parent, &f.parent().unwrap()));

        f.set_parent(None);
        assert!(f.parent().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_root_semantics() {
        let (factory, _dir) = setup();
        let root = factory.get_file_for_path("/").unwrap();
        assert!(root.is_root());
        assert_eq!(root.name(), "/");
        assert_eq!(root.absolute_path(), "/");
        assert!(root.parent().is_none());

        let etc = factory.get_file_for_path("/etc").unwrap();
        assert!(!etc.is_root());
        assert_eq!(etc.root().unwrap().absolute_path(), "/");
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_uses_native_predicate() {
        let (factory, dir) = setup();
        let target = dir.path().join("target");
        fs::write(&target, b"x").unwrap();
        std::os::unix::fs::symlink(&target, dir.path().join("link")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("missing"), dir.path().join("dangling")).unwrap();

        assert!(file(&factory, &dir.path().join("link")).is_symlink());
        assert!(!file(&factory, &target).is_symlink());

        let dangling = file(&factory, &dir.path().join("dangling"));
        assert!(dangling.is_symlink());
        assert!(!dangling.exists());
        dangling.delete().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_owner_and_group_are_best_effort() {
        let (factory, dir) = setup();
        let f = file(&factory, dir.path());
        assert!(f.can_get_owner());
        assert!(f.owner().is_some());
        assert!(f.group().is_some());
        assert!(file(&factory, &dir.path().join("missing")).owner().is_none());
    }

    #[test]
    fn test_unsupported_extras() {
        let (factory, dir) = setup();
        let f = file(&factory, dir.path());
        assert!(f.replication().unwrap_err().is_unsupported());
        assert!(f.blocksize().unwrap_err().is_unsupported());
        assert!(f.copy_remotely_to(f.as_ref()).unwrap_err().is_unsupported());
        assert!(!f.is_supported(FileOperation::GetReplication));
    }

    #[cfg(unix)]
    #[test]
    fn test_space_queries() {
        let (factory, dir) = setup();
        let f = file(&factory, dir.path());
        let total = f.total_space().unwrap();
        assert!(total > 0);
        assert!(f.free_space().unwrap() <= total);
    }
}

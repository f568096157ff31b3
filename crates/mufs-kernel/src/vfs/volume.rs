//! Volume discovery and path → volume resolution.
//!
//! The volume list is the union of
//! - native roots (`/`, or every existing drive letter on Windows)
//! - mount-table entries with a physical filesystem type (unix)
//! - the `/Volumes` folders (macOS, instead of the two above)
//! - the user's home directory
//!
//! It is never cached: removable media come and go between calls.

use std::path::Path;
use std::sync::Arc;

use crate::vfs::factory::FileFactory;
use crate::vfs::file::{FileObject, FileRef};

/// Filesystem types worth presenting as volumes. Pseudo filesystems (`proc`,
/// `tmpfs`, `cgroup`, ...) are left out.
pub const KNOWN_FILESYSTEMS: &[&str] = &[
    "adfs", "affs", "apfs", "autofs", "btrfs", "cifs", "coda", "cramfs", "debugfs", "efs", "exfat",
    "ext2", "ext3", "ext4", "f2fs", "fuseblk", "hfs", "hfsplus", "hpfs", "iso9660", "jfs", "minix",
    "msdos", "ncpfs", "nfs", "nfs4", "ntfs", "qnx4", "reiserfs", "smbfs", "udf", "ufs", "usbfs",
    "vfat", "xfs", "zfs",
];

/// One line of a mount table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MountEntry {
    pub device: String,
    pub mount_point: String,
    pub fs_type: String,
}

/// Parse `/proc/mounts` (or `mount -p`) text: whitespace-separated
/// `device mount_point fs_type ...` per line. Blank, comment and short lines
/// are skipped; octal escapes such as `\040` are decoded.
pub fn parse_mount_table(text: &str) -> Vec<MountEntry> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let device = fields.next()?;
            let mount_point = fields.next()?;
            let fs_type = fields.next()?;
            Some(MountEntry {
                device: decode_octal_escapes(device),
                mount_point: decode_octal_escapes(mount_point),
                fs_type: fs_type.to_string(),
            })
        })
        .collect()
}

/// Decode `\NNN` octal escapes (space, tab, newline, backslash in mount tables).
pub fn decode_octal_escapes(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\'
            && i + 3 < bytes.len()
            && bytes[i + 1..i + 4].iter().all(|b| (b'0'..=b'7').contains(b))
        {
            let value = (bytes[i + 1] - b'0') as u32 * 64 + (bytes[i + 2] - b'0') as u32 * 8 + (bytes[i + 3] - b'0') as u32;
            if let Ok(byte) = u8::try_from(value) {
                out.push(byte);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// True if `fs_type` is in [`KNOWN_FILESYSTEMS`] or `extra`.
pub fn is_physical_filesystem(fs_type: &str, extra: &[String]) -> bool {
    KNOWN_FILESYSTEMS.contains(&fs_type) || extra.iter().any(|e| e == fs_type)
}

/// Outcome of [`best_volume_match`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VolumeMatch {
    /// The target is the volume itself.
    Exact(usize),
    /// The target lies inside the volume.
    Within(usize),
    None,
}

/// Pick the candidate owning `target`.
///
/// Paths are compared as directory prefixes (a separator is appended to both),
/// so `/mnt/data` owns `/mnt/data/x` but not `/mnt/database`. The longest
/// prefix wins, then the deepest.
pub fn best_volume_match<S: AsRef<str>>(target: &str, candidates: &[S], fold_case: bool) -> VolumeMatch {
    let target = as_dir_prefix(target, fold_case);
    let mut best: Option<(usize, usize, usize)> = None;

    for (idx, candidate) in candidates.iter().enumerate() {
        let candidate = as_dir_prefix(candidate.as_ref(), fold_case);
        if candidate == target {
            return VolumeMatch::Exact(idx);
        }
        if target.starts_with(&candidate) {
            let len = candidate.len();
            let depth = path_depth(&candidate);
            if best.is_none_or(|(_, l, d)| (len, depth) > (l, d)) {
                best = Some((idx, len, depth));
            }
        }
    }

    best.map_or(VolumeMatch::None, |(idx, ..)| VolumeMatch::Within(idx))
}

fn as_dir_prefix(path: &str, fold_case: bool) -> String {
    let mut path = if fold_case { path.to_lowercase() } else { path.to_string() };
    if !path.ends_with(['/', '\\']) {
        path.push(if path.contains('\\') { '\\' } else { '/' });
    }
    path
}

fn path_depth(path: &str) -> usize {
    path.split(['/', '\\']).filter(|s| !s.is_empty()).count()
}

/// The volume among `volumes` owning `file`, if any.
pub fn resolve_volume(file: &dyn FileObject, volumes: &[FileRef]) -> Option<FileRef> {
    let target = file.canonical_path();
    let paths: Vec<String> = volumes.iter().map(|v| v.canonical_path()).collect();
    let fold_case = file.url().drive().is_some() || file.url().is_unc();

    match best_volume_match(&target, &paths, fold_case) {
        VolumeMatch::Exact(idx) | VolumeMatch::Within(idx) => Some(Arc::clone(&volumes[idx])),
        VolumeMatch::None => None,
    }
}

/// Enumerate the volumes currently mounted.
pub fn discover_volumes(factory: &FileFactory) -> Vec<FileRef> {
    let mut volumes = Vec::new();

    if cfg!(target_os = "macos") {
        add_macos_volumes(factory, &mut volumes);
    } else {
        add_native_roots(factory, &mut volumes);
        if cfg!(unix) {
            add_mount_entries(factory, &mut volumes);
        }
    }

    if let Some(home) = factory.user_home() {
        push_unique(&mut volumes, home);
    }

    tracing::debug!(count = volumes.len(), "discovered volumes");
    volumes
}

fn push_unique(volumes: &mut Vec<FileRef>, volume: FileRef) {
    if !volumes.iter().any(|v| v.url() == volume.url()) {
        volumes.push(volume);
    }
}

fn add_path(factory: &FileFactory, volumes: &mut Vec<FileRef>, path: &Path) {
    match factory.get_file_at(path) {
        Ok(file) => push_unique(volumes, file),
        Err(e) => tracing::debug!(path = %path.display(), error = %e, "skipping volume"),
    }
}

#[cfg(windows)]
fn add_native_roots(factory: &FileFactory, volumes: &mut Vec<FileRef>) {
    for letter in b'A'..=b'Z' {
        let root = format!("{}:\\", letter as char);
        if Path::new(&root).exists() {
            add_path(factory, volumes, Path::new(&root));
        }
    }
}

#[cfg(not(windows))]
fn add_native_roots(factory: &FileFactory, volumes: &mut Vec<FileRef>) {
    add_path(factory, volumes, Path::new("/"));
}

fn add_mount_entries(factory: &FileFactory, volumes: &mut Vec<FileRef>) {
    let text = match read_mount_table() {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(error = %e, "could not read mount table");
            return;
        }
    };

    let extra = &factory.config().extra_filesystems;
    for entry in parse_mount_table(&text) {
        if !is_physical_filesystem(&entry.fs_type, extra) {
            continue;
        }
        let path = Path::new(&entry.mount_point);
        if path.is_dir() {
            add_path(factory, volumes, path);
        }
    }
}

#[cfg(target_os = "freebsd")]
fn read_mount_table() -> std::io::Result<String> {
    let output = std::process::Command::new("/sbin/mount").arg("-p").output()?;
    if !output.status.success() {
        return Err(std::io::Error::other(format!("mount -p exited with {}", output.status)));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(not(target_os = "freebsd"))]
fn read_mount_table() -> std::io::Result<String> {
    std::fs::read_to_string("/proc/mounts")
}

/// `/Volumes/*`, the boot volume (the alias of `/`) first.
fn add_macos_volumes(factory: &FileFactory, volumes: &mut Vec<FileRef>) {
    let entries = match std::fs::read_dir("/Volumes") {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(error = %e, "could not list /Volumes");
            add_path(factory, volumes, Path::new("/"));
            return;
        }
    };

    let mut found: Vec<(bool, std::path::PathBuf)> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .map(|path| {
            let is_boot = dunce::canonicalize(&path).is_ok_and(|c| c == Path::new("/"));
            (is_boot, path)
        })
        .collect();
    found.sort_by_key(|(is_boot, _)| !*is_boot);

    for (_, path) in found {
        add_path(factory, volumes, &path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROC_MOUNTS: &str = "\
sysfs /sys sysfs rw,nosuid,nodev,noexec,relatime 0 0
proc /proc proc rw,nosuid,nodev,noexec,relatime 0 0
/dev/nvme0n1p2 / ext4 rw,relatime 0 0
tmpfs /run tmpfs rw,nosuid,nodev 0 0
/dev/sdb1 /media/amy/USB\\040STICK vfat rw,nosuid,nodev 0 0
# comment line

short line
";

    #[test]
    fn test_parse_mount_table() {
        let entries = parse_mount_table(PROC_MOUNTS);
        assert_eq!(entries.len(), 5);
        assert_eq!(entries[2].mount_point, "/");
        assert_eq!(entries[2].fs_type, "ext4");
        assert_eq!(entries[4].device, "/dev/sdb1");
        assert_eq!(entries[4].mount_point, "/media/amy/USB STICK");
    }

    #[test]
    fn test_physical_filter() {
        let entries = parse_mount_table(PROC_MOUNTS);
        let physical: Vec<_> = entries
            .iter()
            .filter(|e| is_physical_filesystem(&e.fs_type, &[]))
            .map(|e| e.mount_point.as_str())
            .collect();
        assert_eq!(physical, vec!["/", "/media/amy/USB STICK"]);
        assert!(is_physical_filesystem("9p", &["9p".to_string()]));
    }

    #[test]
    fn test_decode_octal_escapes() {
        assert_eq!(decode_octal_escapes(r"a\040b\011c"), "a b\tc");
        assert_eq!(decode_octal_escapes(r"back\134slash"), "back\\slash");
        assert_eq!(decode_octal_escapes(r"trailing\04"), r"trailing\04");
        assert_eq!(decode_octal_escapes(r"not\999"), r"not\999");
    }

    #[test]
    fn test_longest_prefix_wins() {
        let volumes = ["/", "/mnt/data"];
        assert_eq!(best_volume_match("/mnt/data/x.txt", &volumes, false), VolumeMatch::Within(1));
        assert_eq!(best_volume_match("/home/u", &volumes, false), VolumeMatch::Within(0));
        assert_eq!(best_volume_match("/mnt/data", &volumes, false), VolumeMatch::Exact(1));
        assert_eq!(best_volume_match("/mnt/data/", &volumes, false), VolumeMatch::Exact(1));
    }

    #[test]
    fn test_prefix_respects_segment_boundaries() {
        let volumes = ["/", "/mnt/data"];
        assert_eq!(best_volume_match("/mnt/database/x", &volumes, false), VolumeMatch::Within(0));
    }

    #[test]
    fn test_no_match() {
        let volumes = [r"C:\", r"D:\"];
        assert_eq!(best_volume_match(r"E:\x", &volumes, true), VolumeMatch::None);
        assert_eq!(best_volume_match(r"d:\Games\x", &volumes, true), VolumeMatch::Within(1));
        assert_eq!(best_volume_match(r"d:\Games\x", &volumes, false), VolumeMatch::None);
    }
}

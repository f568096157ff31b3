//! Native permission flags.
//!
//! Unix exposes the full nine-bit mode; only the owner class can be changed.
//! Windows has a single read-only flag, which maps to the owner write bit;
//! read is always granted and execute is always reported as unset.

use std::fs::{self, Metadata};
use std::path::Path;

use mufs_types::{AccessClass, FileOperation, FilePermissions, PermissionBits, Right};

use crate::vfs::error::{VfsError, VfsResult};

/// Bits [`change`] accepts on this platform.
#[cfg(unix)]
pub const CHANGEABLE: PermissionBits = PermissionBits::new(0o700);
#[cfg(not(unix))]
pub const CHANGEABLE: PermissionBits = PermissionBits::new(0o200);

#[cfg(unix)]
pub fn from_metadata(meta: &Metadata) -> FilePermissions {
    use std::os::unix::fs::PermissionsExt;

    FilePermissions::full(PermissionBits::from_mode(meta.permissions().mode()))
}

#[cfg(not(unix))]
pub fn from_metadata(meta: &Metadata) -> FilePermissions {
    let bits = PermissionBits::EMPTY
        .with_bit(AccessClass::Owner, Right::Read, true)
        .with_bit(AccessClass::Owner, Right::Write, !meta.permissions().readonly());
    FilePermissions::new(bits, PermissionBits::new(0o600))
}

/// Set or clear one permission bit of `path`.
pub fn change(path: &Path, class: AccessClass, right: Right, enabled: bool) -> VfsResult<()> {
    if !CHANGEABLE.bit(class, right) {
        return Err(VfsError::Unsupported(FileOperation::ChangePermission));
    }

    let path_str = path.display().to_string();
    let mut perms = fs::metadata(path)
        .map_err(|e| VfsError::from_io(e, &path_str))?
        .permissions();

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let bits = PermissionBits::from_mode(perms.mode()).with_bit(class, right, enabled);
        perms.set_mode((perms.mode() & 0o7000) | u32::from(bits.value()));
    }
    #[cfg(not(unix))]
    {
        perms.set_readonly(!enabled);
    }

    fs::set_permissions(path, perms).map_err(|e| VfsError::from_io(e, &path_str))?;
    tracing::debug!(path = %path_str, %class, %right, enabled, "changed permission");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_group_bits_are_not_changeable() {
        let dir = TempDir::new().unwrap();
        let err = change(dir.path(), AccessClass::Group, Right::Read, false).unwrap_err();
        assert!(err.is_unsupported());
    }

    #[test]
    fn test_owner_write_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("f");
        std::fs::write(&path, b"x").unwrap();

        change(&path, AccessClass::Owner, Right::Write, false).unwrap();
        let perms = from_metadata(&std::fs::metadata(&path).unwrap());
        assert!(!perms.bit(AccessClass::Owner, Right::Write));
        assert!(perms.bit(AccessClass::Owner, Right::Read));

        change(&path, AccessClass::Owner, Right::Write, true).unwrap();
        let perms = from_metadata(&std::fs::metadata(&path).unwrap());
        assert!(perms.bit(AccessClass::Owner, Right::Write));
    }

    #[cfg(unix)]
    #[test]
    fn test_unix_mode_is_fully_reported() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("f");
        std::fs::write(&path, b"x").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o751)).unwrap();

        let perms = from_metadata(&std::fs::metadata(&path).unwrap());
        assert_eq!(perms.bits().value(), 0o751);
        assert_eq!(perms.mask(), PermissionBits::FULL);
    }
}

//! Local backend behaviour through the public factory API.

use std::io::{Read, Write};
use std::sync::Arc;

use mufs_kernel::{AccessClass, FileFactory, FileObject, FileUrl, Right, VfsConfig, VfsError};
use tempfile::TempDir;

// ============================================================================
// Shared test setup
// ============================================================================

fn setup() -> (FileFactory, TempDir) {
    (FileFactory::with_config(VfsConfig::default()), TempDir::new().unwrap())
}

fn path_str(dir: &TempDir, rel: &str) -> String {
    dir.path().join(rel).to_str().unwrap().to_string()
}

fn write(factory: &FileFactory, path: &str, content: &[u8]) {
    let file = factory.get_file_for_path(path).unwrap();
    let mut out = file.output_stream().unwrap();
    out.write_all(content).unwrap();
    out.flush().unwrap();
}

fn read(file: &dyn FileObject) -> Vec<u8> {
    let mut buf = Vec::new();
    file.input_stream().unwrap().read_to_end(&mut buf).unwrap();
    buf
}

// ============================================================================
// Addressing
// ============================================================================

#[cfg(unix)]
#[test]
fn test_normalization_is_idempotent() {
    let (factory, dir) = setup();
    let base = path_str(&dir, "a/b");
    let expected = factory.get_file_for_path(&base).unwrap().absolute_path();

    for variant in [
        format!("{base}/"),
        format!("{base}//"),
        base.replace("/a/", "//a///"),
        format!("{base}/./"),
        format!("{base}/../b"),
    ] {
        let file = factory.get_file_for_path(&variant).unwrap();
        assert_eq!(file.absolute_path(), expected, "variant {variant}");
    }
}

#[cfg(unix)]
#[test]
fn test_notes_scenario() {
    let (factory, dir) = setup();
    let home = path_str(&dir, "u");
    std::fs::create_dir(&home).unwrap();
    std::fs::write(format!("{home}/notes.txt"), b"remember").unwrap();

    let url = FileUrl::parse(&format!("file://localhost{home}/notes.txt")).unwrap();
    let notes = factory.get_file(&url).unwrap();
    assert_eq!(notes.name(), "notes.txt");
    assert_eq!(notes.parent().unwrap().absolute_path(), home);

    let folder = factory.get_file_for_path(&home).unwrap();
    let listing = folder.ls().unwrap();
    let entry = listing
        .iter()
        .find(|f| f.absolute_path() == notes.absolute_path())
        .expect("notes.txt listed");
    assert!(Arc::ptr_eq(&entry.parent().unwrap(), &folder));
    assert_eq!(entry.url(), notes.url());
}

// ============================================================================
// Listing
// ============================================================================

#[test]
fn test_listing_is_read_stable() {
    let (factory, dir) = setup();
    for (name, size) in [("one", 1), ("two", 2), ("three", 3)] {
        std::fs::write(dir.path().join(name), vec![b'x'; size]).unwrap();
    }
    std::fs::create_dir(dir.path().join("nested")).unwrap();

    let folder = factory.get_file_at(dir.path()).unwrap();
    let snapshot = |files: Vec<mufs_kernel::vfs::FileRef>| {
        files
            .iter()
            .map(|f| (f.absolute_path(), f.size().unwrap()))
            .collect::<Vec<_>>()
    };

    let first = snapshot(folder.ls().unwrap());
    let second = snapshot(folder.ls().unwrap());
    assert_eq!(first.len(), 4);
    assert_eq!(first, second);
}

#[test]
fn test_mkdir_existing_is_a_conflict() {
    let (factory, dir) = setup();
    let folder = factory.get_file_for_path(&path_str(&dir, "made")).unwrap();
    assert!(!folder.exists());
    folder.mkdir().unwrap();
    assert!(folder.is_directory());

    let err = folder.mkdir().unwrap_err();
    assert!(matches!(err, VfsError::AlreadyExists(ref p) if p.ends_with("made")));
}

// ============================================================================
// Mutation
// ============================================================================

#[test]
fn test_rename_round_trip() {
    let (factory, dir) = setup();
    let a_path = path_str(&dir, "a.txt");
    write(&factory, &a_path, b"payload");

    let a = factory.get_file_for_path(&a_path).unwrap();
    let b = factory.get_file_for_path(&path_str(&dir, "b.txt")).unwrap();
    let size = a.size().unwrap();

    a.rename_to(b.as_ref()).unwrap();
    assert!(!a.exists());
    assert_eq!(read(b.as_ref()), b"payload");

    b.rename_to(a.as_ref()).unwrap();
    assert!(!b.exists());
    assert_eq!(a.size().unwrap(), size);
    assert_eq!(read(a.as_ref()), b"payload");
}

#[test]
fn test_rename_onto_itself_and_missing_source() {
    let (factory, dir) = setup();
    let a_path = path_str(&dir, "a");
    write(&factory, &a_path, b"x");
    let a = factory.get_file_for_path(&a_path).unwrap();
    assert!(matches!(a.rename_to(a.as_ref()), Err(VfsError::SameFile(_))));

    let ghost = factory.get_file_for_path(&path_str(&dir, "ghost")).unwrap();
    assert!(ghost.rename_to(a.as_ref()).unwrap_err().is_not_found());
}

#[test]
fn test_rename_to_another_backend_is_unsupported() {
    let (factory, dir) = setup();
    let a_path = path_str(&dir, "a");
    write(&factory, &a_path, b"x");
    let a = factory.get_file_for_path(&a_path).unwrap();
    let mem = factory.get_file(&FileUrl::parse("mem://x/a").unwrap()).unwrap();
    assert!(a.rename_to(mem.as_ref()).unwrap_err().is_unsupported());
}

/// Renaming from the temp dir onto a tmpfs mounted elsewhere must refuse and
/// leave both sides untouched. Skipped where no second device is available.
#[cfg(unix)]
#[test]
fn test_rename_across_devices_is_cross_volume() {
    use std::os::unix::fs::MetadataExt;

    let (factory, dir) = setup();
    let Ok(other) = tempfile::TempDir::new_in("/dev/shm") else {
        return;
    };
    if std::fs::metadata(dir.path()).unwrap().dev() == std::fs::metadata(other.path()).unwrap().dev() {
        return;
    }

    let src_path = path_str(&dir, "x");
    write(&factory, &src_path, b"stay");
    let src = factory.get_file_for_path(&src_path).unwrap();
    let dst = factory.get_file_at(&other.path().join("y")).unwrap();

    let err = src.rename_to(dst.as_ref()).unwrap_err();
    assert!(matches!(err, VfsError::CrossVolume(_)), "{err:?}");
    assert_eq!(read(src.as_ref()), b"stay");
    assert!(!dst.exists());
}

#[test]
fn test_permission_round_trip() {
    let (factory, dir) = setup();
    let path = path_str(&dir, "perm");
    write(&factory, &path, b"x");
    let file = factory.get_file_for_path(&path).unwrap();

    let mask = file.changeable_permissions();
    assert!(mask.bit(AccessClass::Owner, Right::Write));

    file.change_permission(AccessClass::Owner, Right::Write, false).unwrap();
    assert!(!file.permissions().bit(AccessClass::Owner, Right::Write));
    assert_eq!(file.changeable_permissions(), mask);

    file.change_permission(AccessClass::Owner, Right::Write, true).unwrap();
    assert!(file.permissions().bit(AccessClass::Owner, Right::Write));
    assert_eq!(file.changeable_permissions(), mask);
}

#[test]
fn test_last_modified_round_trip() {
    let (factory, dir) = setup();
    let path = path_str(&dir, "dated");
    write(&factory, &path, b"x");
    let file = factory.get_file_for_path(&path).unwrap();

    let when = std::time::UNIX_EPOCH + std::time::Duration::from_secs(1_000_000_000);
    file.set_last_modified(when).unwrap();
    assert_eq!(file.last_modified().unwrap(), when);
}

// ============================================================================
// Streams
// ============================================================================

#[test]
fn test_append_and_random_access() {
    let (factory, dir) = setup();
    let path = path_str(&dir, "log");
    write(&factory, &path, b"one");
    let file = factory.get_file_for_path(&path).unwrap();

    {
        let mut out = file.append_output_stream().unwrap();
        out.write_all(b"two").unwrap();
    }
    assert_eq!(read(file.as_ref()), b"onetwo");

    let mut out = file.random_access_output().unwrap();
    out.set_length(3).unwrap();
    assert_eq!(out.length().unwrap(), 3);
    out.close().unwrap();

    let mut input = file.random_access_input().unwrap();
    assert_eq!(input.length().unwrap(), 3);
    let mut buf = String::new();
    input.read_to_string(&mut buf).unwrap();
    assert_eq!(buf, "one");
}

#[test]
fn test_reading_a_directory_is_typed() {
    let (factory, dir) = setup();
    let folder = factory.get_file_at(dir.path()).unwrap();
    assert!(matches!(folder.input_stream().map(|_| ()), Err(VfsError::IsADirectory(_))));
}

#[test]
fn test_volume_of_temp_file() {
    let (factory, dir) = setup();
    let path = path_str(&dir, "f");
    write(&factory, &path, b"");
    let file = factory.get_file_for_path(&path).unwrap();
    let volume = file.volume().unwrap();
    let volume_path = volume.canonical_path();
    assert!(
        file.canonical_path().starts_with(volume_path.trim_end_matches(['/', '\\'])),
        "{} not on {}",
        file.canonical_path(),
        volume_path
    );
}

use docsync_fs::{NormalizedPath, RobustnessConfig, io};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

#[test]
fn test_write_atomic_creates_parent_directories() {
    let dir = tempdir().unwrap();
    let path = NormalizedPath::new(dir.path().join("deep/nested/note.md"));

    io::write_atomic(&path, b"# Title\n", RobustnessConfig::default()).unwrap();

    assert_eq!(io::read_text(&path).unwrap(), "# Title\n");
}

#[test]
fn test_write_atomic_replaces_existing_content() {
    let dir = tempdir().unwrap();
    let path = NormalizedPath::new(dir.path().join("note.md"));

    io::write_text(&path, "first version with a longer body").unwrap();
    io::write_text(&path, "second").unwrap();

    assert_eq!(io::read_text(&path).unwrap(), "second");
}

#[test]
fn test_read_missing_file_reports_not_found() {
    let dir = tempdir().unwrap();
    let path = NormalizedPath::new(dir.path().join("missing.md"));

    let err = io::read_text(&path).unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(io::read_text_opt(&path).unwrap(), None);
}

#[test]
fn test_remove_file_is_idempotent() {
    let dir = tempdir().unwrap();
    let path = NormalizedPath::new(dir.path().join("note.md"));
    io::write_text(&path, "x").unwrap();

    io::remove_file(&path).unwrap();
    io::remove_file(&path).unwrap();

    assert!(!path.exists());
}

#[test]
fn test_canonical_dir_creates_and_normalizes() {
    let dir = tempdir().unwrap();
    let vault = dir.path().join("vault");

    let canonical = io::canonical_dir(&vault).unwrap();

    assert!(canonical.is_dir());
    assert!(!canonical.as_str().contains('\\'));
}

#[test]
fn test_unicode_content_survives() {
    let dir = tempdir().unwrap();
    let path = NormalizedPath::new(dir.path().join("ünïcødé.md"));
    let content = "Grüße 世界 🎉\n";

    io::write_text(&path, content).unwrap();

    assert_eq!(io::read_text(&path).unwrap(), content);
}

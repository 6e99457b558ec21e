//! Concurrent access tests for locked atomic writes and appends

use docsync_fs::{NormalizedPath, RobustnessConfig, io};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use tempfile::tempdir;

#[test]
fn test_concurrent_writes_no_corruption() {
    let dir = tempdir().unwrap();
    let file_path = dir.path().join("pair.json");
    let path = Arc::new(NormalizedPath::new(&file_path));

    let num_threads = 8;
    let writes_per_thread = 20;
    let barrier = Arc::new(Barrier::new(num_threads));

    let handles: Vec<_> = (0..num_threads)
        .map(|thread_id| {
            let path = Arc::clone(&path);
            let barrier = Arc::clone(&barrier);

            thread::spawn(move || {
                barrier.wait();
                for i in 0..writes_per_thread {
                    let content = format!("thread{}:write{}\n", thread_id, i);
                    let _ = io::write_text(&path, &content);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread should not panic");
    }

    let content = std::fs::read_to_string(&file_path).unwrap();
    assert!(content.starts_with("thread"));
    assert_eq!(content.matches("thread").count(), 1, "writes interleaved: {content}");
}

#[test]
fn test_concurrent_vault_writes_leave_no_temp_files() {
    let dir = tempdir().unwrap();
    let path = Arc::new(NormalizedPath::new(dir.path().join("note.md")));
    let barrier = Arc::new(Barrier::new(4));

    let handles: Vec<_> = (0..4)
        .map(|thread_id| {
            let path = Arc::clone(&path);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..10 {
                    io::write_atomic(
                        &path,
                        format!("body {thread_id}-{i}").as_bytes(),
                        RobustnessConfig::vault(),
                    )
                    .unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(names, vec!["note.md".to_string()]);
}

#[test]
fn test_concurrent_appends_keep_whole_lines() {
    let dir = tempdir().unwrap();
    let path = Arc::new(NormalizedPath::new(dir.path().join("decisions.jsonl")));
    let barrier = Arc::new(Barrier::new(6));

    let handles: Vec<_> = (0..6)
        .map(|thread_id| {
            let path = Arc::clone(&path);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..15 {
                    let config = RobustnessConfig {
                        enable_fsync: false,
                        ..RobustnessConfig::default()
                    };
                    io::append_line(&path, &format!("{{\"t\":{thread_id},\"i\":{i}}}"), config)
                        .unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let content = io::read_text(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 90);
    for line in lines {
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        assert!(value.get("t").is_some());
    }
}

#[test]
fn test_lock_timeout_is_respected() {
    use fs2::FileExt;

    let dir = tempdir().unwrap();
    let file_path = dir.path().join("locked.json");
    let lock_path = format!("{}.lock", file_path.display());

    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .unwrap();
    lock_file.lock_exclusive().unwrap();

    let path = NormalizedPath::new(&file_path);
    let config = RobustnessConfig {
        lock_timeout: Duration::from_millis(200),
        enable_fsync: false,
        sidecar_lock: true,
    };

    let result = io::write_atomic(&path, b"content", config);
    FileExt::unlock(&lock_file).unwrap();

    assert!(matches!(result, Err(docsync_fs::Error::LockFailed { .. })));
    assert!(!file_path.exists());
}

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static TEST_PATH_COUNTER: AtomicU64 = AtomicU64::new(0);

pub fn unique_test_db_path(tag: &str) -> PathBuf {
    let safe_tag: String = tag
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '-'
            }
        })
        .collect();
    let now_nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let counter = TEST_PATH_COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!(
        "beaconhub-{safe_tag}-{}-{now_nanos}-{counter}.db",
        std::process::id(),
    ))
}

/// Unique temporary database path, removed again on drop.
pub struct TestDbPath {
    path: PathBuf,
}

impl TestDbPath {
    pub fn new(tag: &str) -> Self {
        Self {
            path: unique_test_db_path(tag),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TestDbPath {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                eprintln!(
                    "warning: failed to remove temporary test database {}: {err}",
                    self.path.display()
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_test_db_path_is_stable_and_unique() {
        let first = unique_test_db_path("helper");
        let second = unique_test_db_path("helper");

        assert_ne!(first, second);
        assert!(first.to_string_lossy().contains("beaconhub-helper-"));
        assert!(first.to_string_lossy().ends_with(".db"));
    }

    #[test]
    fn test_db_path_cleans_up_created_file() {
        let lingering_path = {
            let temp_db = TestDbPath::new("cleanup-check");
            let path = temp_db.path().to_path_buf();
            std::fs::write(&path, "placeholder").expect("create test file");
            path
        };

        assert!(
            !lingering_path.exists(),
            "expected temporary test file to be cleaned on drop"
        );
    }
}

// ABOUTME: Workspace snapshot capture and best-effort restore
// ABOUTME: Text files under the size limit are stored; everything else is only listed

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use unison_core::SNAPSHOT_FILE_SIZE_LIMIT;
use walkdir::WalkDir;

use crate::error::SnapshotError;
use crate::vcs::{vcs_status, VcsStatus};

/// One filesystem entry seen during capture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureEntry {
    pub path: String,
    pub is_dir: bool,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceSnapshot {
    /// Relative path (forward slashes) to file content
    pub files: BTreeMap<String, String>,
    pub structure: Vec<StructureEntry>,
    #[serde(default)]
    pub vcs_status: Option<VcsStatus>,
    pub timestamp: DateTime<Utc>,
}

impl WorkspaceSnapshot {
    pub fn empty() -> Self {
        Self {
            files: BTreeMap::new(),
            structure: Vec::new(),
            vcs_status: None,
            timestamp: Utc::now(),
        }
    }
}

impl Default for WorkspaceSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Oversized,
    NotText,
    Unreadable,
    UnsafePath,
    WriteFailed,
    NonUtf8Path,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    pub path: String,
    pub reason: SkipReason,
    pub detail: Option<String>,
}

impl SkippedEntry {
    fn new(path: impl Into<String>, reason: SkipReason, detail: Option<String>) -> Self {
        Self {
            path: path.into(),
            reason,
            detail,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CaptureReport {
    pub snapshot: WorkspaceSnapshot,
    pub skipped: Vec<SkippedEntry>,
}

#[derive(Debug, Clone, Default)]
pub struct RestoreReport {
    pub restored: Vec<String>,
    pub failed: Vec<SkippedEntry>,
}

impl RestoreReport {
    /// True when every file in the snapshot was written
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Capture `root` on the blocking pool
pub async fn capture(root: &Path) -> Result<CaptureReport, SnapshotError> {
    let root = root.to_path_buf();
    tokio::task::spawn_blocking(move || capture_workspace(&root))
        .await
        .map_err(|e| SnapshotError::TaskFailed(e.to_string()))
}

/// Restore `snapshot` into `target` on the blocking pool
pub async fn restore(
    snapshot: &WorkspaceSnapshot,
    target: &Path,
) -> Result<RestoreReport, SnapshotError> {
    let files = snapshot.files.clone();
    let target = target.to_path_buf();
    tokio::task::spawn_blocking(move || restore_files(&files, &target))
        .await
        .map_err(|e| SnapshotError::TaskFailed(e.to_string()))
}

/// Walk every entry under `root`. Never fails: entries that cannot be read
/// are listed where possible and reported in `skipped`.
pub fn capture_workspace(root: &Path) -> CaptureReport {
    let mut snapshot = WorkspaceSnapshot::empty();
    let mut skipped = Vec::new();

    if !root.is_dir() {
        warn!(
            "Workspace {} does not exist, capturing an empty snapshot",
            root.display()
        );
        return CaptureReport { snapshot, skipped };
    }

    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !(entry.file_type().is_dir() && entry.file_name() == ".git"));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e
                    .path()
                    .and_then(|p| p.strip_prefix(root).ok())
                    .map(lossy_key)
                    .unwrap_or_default();
                debug!("Skipping unreadable entry {:?}: {}", path, e);
                skipped.push(SkippedEntry::new(
                    path,
                    SkipReason::Unreadable,
                    Some(e.to_string()),
                ));
                continue;
            }
        };

        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let Some(key) = relative_key(relative) else {
            // Restoring under a lossy name would write a different file
            let path = lossy_key(relative);
            debug!("Skipping {:?} (path is not valid UTF-8)", path);
            skipped.push(SkippedEntry::new(path, SkipReason::NonUtf8Path, None));
            continue;
        };
        let is_dir = entry.file_type().is_dir();
        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);

        snapshot.structure.push(StructureEntry {
            path: key.clone(),
            is_dir,
            size: if is_dir { 0 } else { size },
        });

        if !entry.file_type().is_file() {
            continue;
        }

        if size >= SNAPSHOT_FILE_SIZE_LIMIT {
            debug!("Skipping {} ({} bytes, over the capture limit)", key, size);
            skipped.push(SkippedEntry::new(key, SkipReason::Oversized, None));
            continue;
        }

        match fs::read(entry.path()) {
            Ok(bytes) => match String::from_utf8(bytes) {
                Ok(content) => {
                    snapshot.files.insert(key, content);
                }
                Err(_) => {
                    debug!("Skipping {} (not UTF-8 text)", key);
                    skipped.push(SkippedEntry::new(key, SkipReason::NotText, None));
                }
            },
            Err(e) => {
                debug!("Skipping {} (unreadable: {})", key, e);
                skipped.push(SkippedEntry::new(
                    key,
                    SkipReason::Unreadable,
                    Some(e.to_string()),
                ));
            }
        }
    }

    snapshot.vcs_status = vcs_status(root);
    snapshot.timestamp = Utc::now();

    debug!(
        "Captured {} files ({} entries, {} skipped) from {}",
        snapshot.files.len(),
        snapshot.structure.len(),
        skipped.len(),
        root.display()
    );

    CaptureReport { snapshot, skipped }
}

/// Write every captured file under `target`, overwriting what is there.
/// A failure on one file is logged and the rest still get written.
pub fn restore_workspace(snapshot: &WorkspaceSnapshot, target: &Path) -> RestoreReport {
    restore_files(&snapshot.files, target)
}

fn restore_files(files: &BTreeMap<String, String>, target: &Path) -> RestoreReport {
    let mut report = RestoreReport::default();

    for (key, content) in files {
        let Some(relative) = safe_relative_path(key) else {
            warn!("Refusing to restore {:?}: path escapes the workspace", key);
            report
                .failed
                .push(SkippedEntry::new(key.clone(), SkipReason::UnsafePath, None));
            continue;
        };

        let destination = target.join(relative);
        let written = destination
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|_| fs::write(&destination, content));

        match written {
            Ok(()) => report.restored.push(key.clone()),
            Err(e) => {
                warn!("Failed to restore {}: {}", destination.display(), e);
                report.failed.push(SkippedEntry::new(
                    key.clone(),
                    SkipReason::WriteFailed,
                    Some(e.to_string()),
                ));
            }
        }
    }

    report
}

/// Slash-joined key, or `None` when a component is not valid UTF-8
fn relative_key(relative: &Path) -> Option<String> {
    relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()
        .map(|parts| parts.join("/"))
}

fn lossy_key(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Only plain relative paths may be restored
fn safe_relative_path(key: &str) -> Option<PathBuf> {
    let path = Path::new(key);
    if key.is_empty() {
        return None;
    }
    path.components()
        .all(|c| matches!(c, Component::Normal(_)))
        .then(|| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &[u8]) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_capture_records_text_files_and_structure() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.txt", b"hello");
        write(dir.path(), "src/main.py", b"print('hi')\n");

        let report = capture_workspace(dir.path());
        let snapshot = report.snapshot;

        assert_eq!(snapshot.files.len(), 2);
        assert_eq!(snapshot.files["a.txt"], "hello");
        assert_eq!(snapshot.files["src/main.py"], "print('hi')\n");

        let structure: Vec<(&str, bool)> = snapshot
            .structure
            .iter()
            .map(|e| (e.path.as_str(), e.is_dir))
            .collect();
        assert_eq!(
            structure,
            vec![("a.txt", false), ("src", true), ("src/main.py", false)]
        );
        assert_eq!(snapshot.structure[0].size, 5);
        assert!(report.skipped.is_empty());
        assert_eq!(snapshot.vcs_status, None);
    }

    #[test]
    fn test_binary_and_oversized_files_are_listed_not_stored() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "image.bin", &[0xff, 0xfe, 0x00, 0x81]);
        write(
            dir.path(),
            "big.log",
            &vec![b'x'; SNAPSHOT_FILE_SIZE_LIMIT as usize],
        );
        write(dir.path(), "ok.txt", b"fine");

        let report = capture_workspace(dir.path());

        assert_eq!(report.snapshot.files.keys().collect::<Vec<_>>(), vec!["ok.txt"]);
        assert_eq!(report.snapshot.structure.len(), 3);

        let reasons: Vec<(&str, SkipReason)> = report
            .skipped
            .iter()
            .map(|s| (s.path.as_str(), s.reason))
            .collect();
        assert_eq!(
            reasons,
            vec![
                ("big.log", SkipReason::Oversized),
                ("image.bin", SkipReason::NotText)
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_file_name_is_skipped_not_renamed() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = TempDir::new().unwrap();
        write(dir.path(), "ok.txt", b"fine");
        let bad = dir.path().join(OsStr::from_bytes(b"bad\xff.txt"));
        if fs::write(&bad, b"content").is_err() {
            // Some filesystems refuse such names outright
            return;
        }

        let report = capture_workspace(dir.path());

        assert_eq!(report.snapshot.files.keys().collect::<Vec<_>>(), vec!["ok.txt"]);
        assert_eq!(report.snapshot.structure.len(), 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].reason, SkipReason::NonUtf8Path);
        assert_eq!(report.skipped[0].path, "bad\u{fffd}.txt");

        let target = TempDir::new().unwrap();
        let restored = restore_workspace(&report.snapshot, target.path());
        assert_eq!(restored.restored, vec!["ok.txt".to_string()]);
        assert!(!target.path().join("bad\u{fffd}.txt").exists());
    }

    #[test]
    fn test_missing_root_gives_empty_snapshot() {
        let dir = TempDir::new().unwrap();
        let report = capture_workspace(&dir.path().join("nope"));
        assert!(report.snapshot.files.is_empty());
        assert!(report.snapshot.structure.is_empty());
    }

    #[test]
    fn test_git_directory_is_not_captured() {
        let dir = TempDir::new().unwrap();
        git2::Repository::init(dir.path()).unwrap();
        write(dir.path(), "a.txt", b"hello");

        let report = capture_workspace(dir.path());

        assert!(report
            .snapshot
            .structure
            .iter()
            .all(|e| !e.path.starts_with(".git")));
        let vcs = report.snapshot.vcs_status.unwrap();
        assert!(vcs.is_git_repo);
        assert!(vcs.has_changes);
    }

    #[test]
    fn test_round_trip_into_empty_directory() {
        let source = TempDir::new().unwrap();
        write(source.path(), "a.txt", b"hello");
        write(source.path(), "nested/deep/b.md", b"# title\n\nbody\n");
        write(source.path(), "skip.bin", &[0xc3, 0x28]);

        let snapshot = capture_workspace(source.path()).snapshot;
        let target = TempDir::new().unwrap();
        let report = restore_workspace(&snapshot, target.path());

        assert!(report.is_complete());
        assert_eq!(fs::read(target.path().join("a.txt")).unwrap(), b"hello");
        assert_eq!(
            fs::read(target.path().join("nested/deep/b.md")).unwrap(),
            b"# title\n\nbody\n"
        );

        // Nothing beyond the captured files appears
        let mut restored_files: Vec<String> = WalkDir::new(target.path())
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| relative_key(e.path().strip_prefix(target.path()).unwrap()).unwrap())
            .collect();
        restored_files.sort();
        assert_eq!(restored_files, vec!["a.txt", "nested/deep/b.md"]);
    }

    #[test]
    fn test_restore_overwrites_and_continues_past_failures() {
        let target = TempDir::new().unwrap();
        write(target.path(), "a.txt", b"old");
        // A file where a directory is needed makes one write fail
        write(target.path(), "blocked", b"file");

        let mut snapshot = WorkspaceSnapshot::empty();
        snapshot.files.insert("a.txt".into(), "new".into());
        snapshot.files.insert("blocked/inner.txt".into(), "x".into());
        snapshot.files.insert("../escape.txt".into(), "x".into());
        snapshot.files.insert("z.txt".into(), "last".into());

        let report = restore_workspace(&snapshot, target.path());

        assert_eq!(report.restored, vec!["a.txt", "z.txt"]);
        let failed: Vec<(&str, SkipReason)> = report
            .failed
            .iter()
            .map(|f| (f.path.as_str(), f.reason))
            .collect();
        assert_eq!(
            failed,
            vec![
                ("../escape.txt", SkipReason::UnsafePath),
                ("blocked/inner.txt", SkipReason::WriteFailed)
            ]
        );
        assert!(!report.is_complete());
        assert_eq!(fs::read_to_string(target.path().join("a.txt")).unwrap(), "new");
        assert!(!target.path().parent().unwrap().join("escape.txt").exists());
    }

    #[test]
    fn test_safe_relative_path() {
        assert!(safe_relative_path("a/b.txt").is_some());
        assert!(safe_relative_path("/etc/passwd").is_none());
        assert!(safe_relative_path("a/../../b").is_none());
        assert!(safe_relative_path("").is_none());
    }

    #[tokio::test]
    async fn test_async_capture_and_restore() {
        let source = TempDir::new().unwrap();
        write(source.path(), "a.txt", b"hello");

        let captured = capture(source.path()).await.unwrap();
        let target = TempDir::new().unwrap();
        let report = restore(&captured.snapshot, target.path()).await.unwrap();

        assert_eq!(report.restored, vec!["a.txt"]);
    }
}

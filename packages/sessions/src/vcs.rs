// ABOUTME: Lightweight version-control status for workspace snapshots
// ABOUTME: Reads git status through libgit2 and renders it porcelain-style

use git2::{Repository, Status, StatusOptions};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VcsStatus {
    /// One `XY path` line per changed entry
    pub status: String,
    pub is_git_repo: bool,
    pub has_changes: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

/// Status of the repository rooted exactly at `root`, or `None` when there is none
pub fn vcs_status(root: &Path) -> Option<VcsStatus> {
    let repo = match Repository::open(root) {
        Ok(repo) => repo,
        Err(e) => {
            debug!("No git repository at {}: {}", root.display(), e.message());
            return None;
        }
    };

    let mut options = StatusOptions::new();
    options
        .include_untracked(true)
        .recurse_untracked_dirs(true)
        .include_ignored(false);

    let statuses = match repo.statuses(Some(&mut options)) {
        Ok(statuses) => statuses,
        Err(e) => {
            debug!("Failed to read git status at {}: {}", root.display(), e);
            return None;
        }
    };

    let lines: Vec<String> = statuses
        .iter()
        .map(|entry| {
            let path = entry.path().unwrap_or("<non-utf8 path>");
            format!("{} {}", porcelain_code(entry.status()), path)
        })
        .collect();

    // Unborn HEAD (no commits yet) has no branch to report
    let branch = repo
        .head()
        .ok()
        .and_then(|head| head.shorthand().map(String::from));

    Some(VcsStatus {
        status: lines.join("\n"),
        is_git_repo: true,
        has_changes: !lines.is_empty(),
        branch,
    })
}

fn porcelain_code(status: Status) -> String {
    if status.contains(Status::CONFLICTED) {
        return "UU".to_string();
    }
    if status.contains(Status::WT_NEW) && !status.intersects(index_flags()) {
        return "??".to_string();
    }

    let index = if status.contains(Status::INDEX_NEW) {
        'A'
    } else if status.contains(Status::INDEX_MODIFIED) {
        'M'
    } else if status.contains(Status::INDEX_DELETED) {
        'D'
    } else if status.contains(Status::INDEX_RENAMED) {
        'R'
    } else if status.contains(Status::INDEX_TYPECHANGE) {
        'T'
    } else {
        ' '
    };

    let worktree = if status.contains(Status::WT_MODIFIED) {
        'M'
    } else if status.contains(Status::WT_DELETED) {
        'D'
    } else if status.contains(Status::WT_RENAMED) {
        'R'
    } else if status.contains(Status::WT_TYPECHANGE) {
        'T'
    } else {
        ' '
    };

    format!("{}{}", index, worktree)
}

fn index_flags() -> Status {
    Status::INDEX_NEW
        | Status::INDEX_MODIFIED
        | Status::INDEX_DELETED
        | Status::INDEX_RENAMED
        | Status::INDEX_TYPECHANGE
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::Signature;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn commit_all(repo: &Repository, message: &str) {
        let mut index = repo.index().unwrap();
        index
            .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
            .unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = Signature::now("Test", "test@example.com").unwrap();
        let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .unwrap();
    }

    #[test]
    fn test_plain_directory_has_no_status() {
        let dir = TempDir::new().unwrap();
        assert_eq!(vcs_status(dir.path()), None);
    }

    #[test]
    fn test_untracked_file_is_reported() {
        let dir = TempDir::new().unwrap();
        Repository::init(dir.path()).unwrap();
        fs::write(dir.path().join("a.txt"), "hello").unwrap();

        let status = vcs_status(dir.path()).unwrap();
        assert!(status.is_git_repo);
        assert!(status.has_changes);
        assert_eq!(status.status, "?? a.txt");
        assert_eq!(status.branch, None);
    }

    #[test]
    fn test_clean_and_modified_after_commit() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        fs::write(dir.path().join("a.txt"), "hello").unwrap();
        commit_all(&repo, "initial");

        let clean = vcs_status(dir.path()).unwrap();
        assert!(!clean.has_changes);
        assert_eq!(clean.status, "");
        assert!(clean.branch.is_some());

        fs::write(dir.path().join("a.txt"), "changed").unwrap();
        let dirty = vcs_status(dir.path()).unwrap();
        assert!(dirty.has_changes);
        assert_eq!(dirty.status, " M a.txt");
    }

    #[test]
    fn test_porcelain_codes() {
        assert_eq!(porcelain_code(Status::WT_NEW), "??");
        assert_eq!(porcelain_code(Status::INDEX_NEW), "A ");
        assert_eq!(porcelain_code(Status::INDEX_MODIFIED | Status::WT_MODIFIED), "MM");
        assert_eq!(porcelain_code(Status::WT_DELETED), " D");
        assert_eq!(porcelain_code(Status::CONFLICTED), "UU");
    }
}

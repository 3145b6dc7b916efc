//! Optional VCS status signal.
//!
//! Branch and touched-file information feeds extractor keywords. Any
//! failure degrades to "no signal"; review context never depends on git
//! being present or the directory being a repository.

use std::path::Path;
use std::time::Duration;

/// Per-command deadline for git calls.
const GIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Working-tree status relevant to review context.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VcsStatus {
    pub branch: String,
    pub modified: Vec<String>,
    pub staged: Vec<String>,
    pub untracked: Vec<String>,
}

impl VcsStatus {
    /// Paths worth feeding into keyword derivation.
    #[must_use]
    pub fn touched_paths(&self) -> Vec<&str> {
        self.modified
            .iter()
            .chain(self.staged.iter())
            .map(String::as_str)
            .collect()
    }
}

/// Read the current branch and porcelain status from `dir`.
///
/// Returns `None` when git is missing, the command fails or times out.
pub async fn vcs_status(dir: &Path) -> Option<VcsStatus> {
    let branch = run_git(dir, &["rev-parse", "--abbrev-ref", "HEAD"]).await?;
    let porcelain = run_git(dir, &["status", "--porcelain"]).await?;

    let mut status = VcsStatus {
        branch: branch.trim().to_string(),
        ..VcsStatus::default()
    };
    for line in porcelain.lines() {
        if line.len() < 4 {
            continue;
        }
        let (flags, path) = line.split_at(2);
        let path = path.trim().to_string();
        let mut chars = flags.chars();
        let index_flag = chars.next().unwrap_or(' ');
        let tree_flag = chars.next().unwrap_or(' ');

        if index_flag == '?' {
            status.untracked.push(path);
            continue;
        }
        if index_flag != ' ' {
            status.staged.push(path.clone());
        }
        if tree_flag != ' ' {
            status.modified.push(path);
        }
    }
    Some(status)
}

async fn run_git(dir: &Path, args: &[&str]) -> Option<String> {
    let command = tokio::process::Command::new("git")
        .args(args)
        .current_dir(dir)
        .output();

    match tokio::time::timeout(GIT_TIMEOUT, command).await {
        Ok(Ok(output)) if output.status.success() => {
            Some(String::from_utf8_lossy(&output.stdout).to_string())
        }
        Ok(Ok(output)) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::debug!(args = ?args, stderr = %stderr.trim(), "git command failed");
            None
        }
        Ok(Err(e)) => {
            tracing::debug!(args = ?args, error = %e, "git not runnable");
            None
        }
        Err(_) => {
            tracing::debug!(args = ?args, "git command timed out");
            None
        }
    }
}

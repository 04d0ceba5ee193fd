//! Change tracking: the startup marker and the delta enumeration that walks
//! the filesystem for files newer than it.

use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

use crate::manifest::ChangedFiles;

/// Paths excluded from the delta regardless of mtime: virtual filesystems,
/// caches, and regenerable per-language dependency directories.
fn is_excluded(path: &Path, root: &Path) -> bool {
    const EXCLUDED_ABSOLUTE_PREFIXES: &[&str] = &[
        "/proc", "/sys", "/dev", "/run", "/tmp", "/var/cache/apt", "/var/lib/apt/lists",
        "/var/lib/dpkg",
    ];
    if EXCLUDED_ABSOLUTE_PREFIXES
        .iter()
        .any(|prefix| path.starts_with(prefix))
    {
        return true;
    }

    let node_modules = sandbox_common::paths::node_modules_dir(root);
    let venv = sandbox_common::paths::venv_dir(root);
    path.starts_with(&node_modules) || path.starts_with(&venv)
}

pub struct ChangeTracker {
    marker_path: PathBuf,
}

impl ChangeTracker {
    pub fn new(marker_path: impl Into<PathBuf>) -> Self {
        Self {
            marker_path: marker_path.into(),
        }
    }

    pub fn default_marker_path() -> PathBuf {
        std::env::temp_dir().join("sandbox-agent-startup-marker")
    }

    /// Write a zero-byte marker so a later checkpoint can find files newer
    /// than this moment. Only called on a non-local, non-restored start.
    pub async fn write_marker(&self) -> anyhow::Result<()> {
        tokio::fs::write(&self.marker_path, b"").await?;
        Ok(())
    }

    pub fn marker_exists(&self) -> bool {
        self.marker_path.exists()
    }

    async fn marker_mtime(&self) -> anyhow::Result<SystemTime> {
        let meta = tokio::fs::metadata(&self.marker_path).await?;
        Ok(meta.modified()?)
    }

    /// Enumerate regular files on the same device as `root`, newer than the
    /// marker, excluding virtual filesystems, caches, and regenerable
    /// dependency directories. A user command can write anywhere on the
    /// container's filesystem, not just under the sandbox root, so the walk
    /// starts at `/` and is pruned to `root`'s device as it descends.
    pub async fn find_changed_files(&self, root: &Path) -> anyhow::Result<ChangedFiles> {
        self.find_changed_files_from(root, Path::new("/")).await
    }

    /// Same as [`Self::find_changed_files`] but with an explicit walk
    /// starting point, so tests can scope the walk to a fixture directory
    /// instead of scanning the whole device.
    async fn find_changed_files_from(&self, root: &Path, scan_root: &Path) -> anyhow::Result<ChangedFiles> {
        let marker_mtime = self.marker_mtime().await?;
        let root = root.to_path_buf();
        let scan_root = scan_root.to_path_buf();
        let root_dev = tokio::fs::metadata(&root).await?.dev();

        let (count, total_size, paths) = tokio::task::spawn_blocking(move || {
            let mut count = 0usize;
            let mut total_size = 0u64;
            let mut paths = Vec::new();

            let walker = WalkDir::new(&scan_root).into_iter().filter_entry(|entry| {
                // Always descend past the starting entry itself: if `root`
                // sits on a separate mount from `scan_root`, its device only
                // becomes visible once we reach the mount point below it.
                if entry.depth() == 0 {
                    return true;
                }
                if is_excluded(entry.path(), &root) {
                    return false;
                }
                entry.metadata().map(|m| m.dev() == root_dev).unwrap_or(false)
            });

            for entry in walker.filter_map(Result::ok) {
                let path = entry.path();
                if !entry.file_type().is_file() {
                    continue;
                }
                let Ok(meta) = entry.metadata() else {
                    continue;
                };
                let Ok(modified) = meta.modified() else {
                    continue;
                };
                if modified <= marker_mtime {
                    continue;
                }

                count += 1;
                total_size += meta.len();
                paths.push(path.display().to_string());
            }

            paths.sort();
            (count, total_size, paths)
        })
        .await?;

        Ok(ChangedFiles {
            count,
            total_size,
            paths,
        })
    }
}

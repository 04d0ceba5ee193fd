//! Sandbox-root-confined path resolution.
//!
//! Every other component obtains filesystem paths only through this type.
//! Two resolution modes are exposed: a lexical one for targets that may not
//! exist yet (write destinations, not-yet-created directories), and a
//! symlink-aware one for targets that must already exist.

use sandbox_common::SandboxError;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
}

impl PathResolver {
    /// Construct a resolver rooted at `root`, creating it if necessary and
    /// canonicalizing it once so every later prefix check is cheap.
    pub fn new(root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        let root = root.canonicalize()?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn join_input(&self, raw: &str) -> PathBuf {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return self.root.clone();
        }
        let candidate = Path::new(trimmed);
        if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.root.join(candidate)
        }
    }

    /// Collapse `.`/`..` components without touching the filesystem. A `..`
    /// that would climb above an empty accumulator is simply dropped — it
    /// can never escape past the root because every input is first joined
    /// onto the root (or is itself absolute, checked against the root below).
    fn normalize_lexical(path: &Path) -> PathBuf {
        let mut out = PathBuf::new();
        for component in path.components() {
            match component {
                Component::ParentDir => {
                    out.pop();
                }
                Component::CurDir => {}
                other => out.push(other.as_os_str()),
            }
        }
        out
    }

    /// Resolve `raw` for an operation whose target need not exist yet.
    /// Validates the *normalized* (not symlink-resolved) path against the
    /// sandbox root, since a not-yet-existing target has no real path to
    /// expand symlinks against.
    pub fn resolve(&self, raw: &str) -> Result<PathBuf, SandboxError> {
        let joined = self.join_input(raw);
        let normalized = Self::normalize_lexical(&joined);
        if normalized == self.root || normalized.starts_with(&self.root) {
            Ok(normalized)
        } else {
            Err(SandboxError::path_escape(raw.to_string()))
        }
    }

    /// Resolve `raw` for an operation whose target must already exist.
    /// Expands symlinks and re-checks the *real* path against the root
    /// (Invariant P1) so a symlink inside R pointing outside R is rejected.
    pub fn resolve_existing(&self, raw: &str) -> Result<PathBuf, SandboxError> {
        let normalized = self.resolve(raw)?;
        match normalized.canonicalize() {
            Ok(real) => {
                if real == self.root || real.starts_with(&self.root) {
                    Ok(real)
                } else {
                    Err(SandboxError::path_escape(raw.to_string()))
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(SandboxError::not_found(raw.to_string()))
            }
            Err(e) => Err(SandboxError::internal(e.to_string())),
        }
    }

    /// Resolve `raw`, accepting a missing target as `None` instead of an
    /// error — used by handlers that branch on existence (stat, GET).
    pub fn resolve_optional(&self, raw: &str) -> Result<PathBuf, SandboxError> {
        match self.resolve_existing(raw) {
            Ok(p) => Ok(p),
            Err(SandboxError::NotFound(_)) => self.resolve(raw),
            Err(e) => Err(e),
        }
    }

    /// True if `raw` resolves to exactly the sandbox root (used to reject
    /// destructive operations targeting R itself, per the HTTP surface's
    /// "400 on root path" rules).
    pub fn is_root(&self, raw: &str) -> bool {
        self.resolve(raw).map(|p| p == self.root).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn resolver() -> (tempfile::TempDir, PathResolver) {
        let dir = tempdir().unwrap();
        let resolver = PathResolver::new(dir.path()).unwrap();
        (dir, resolver)
    }

    #[test]
    fn empty_string_resolves_to_root() {
        let (_dir, r) = resolver();
        assert_eq!(r.resolve("").unwrap(), r.root());
    }

    #[test]
    fn relative_path_joins_root() {
        let (_dir, r) = resolver();
        let resolved = r.resolve("a/b/c.txt").unwrap();
        assert_eq!(resolved, r.root().join("a/b/c.txt"));
    }

    #[test]
    fn dotdot_escape_is_rejected() {
        let (_dir, r) = resolver();
        let err = r.resolve("../../etc/passwd").unwrap_err();
        assert!(matches!(err, SandboxError::PathEscape(_)));
    }

    #[test]
    fn dotdot_within_root_is_allowed() {
        let (_dir, r) = resolver();
        let resolved = r.resolve("a/../b.txt").unwrap();
        assert_eq!(resolved, r.root().join("b.txt"));
    }

    #[test]
    fn symlink_escaping_root_is_rejected() {
        let (dir, r) = resolver();
        let outside = tempdir().unwrap();
        let target = outside.path().join("secret.txt");
        std::fs::write(&target, b"nope").unwrap();
        let link = dir.path().join("escape");
        #[cfg(unix)]
        std::os::unix::fs::symlink(&target, &link).unwrap();

        #[cfg(unix)]
        {
            let err = r.resolve_existing("escape").unwrap_err();
            assert!(matches!(err, SandboxError::PathEscape(_)));
        }
    }

    #[test]
    fn missing_existing_target_is_not_found() {
        let (_dir, r) = resolver();
        let err = r.resolve_existing("nope.txt").unwrap_err();
        assert!(matches!(err, SandboxError::NotFound(_)));
    }
}

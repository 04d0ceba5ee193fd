//! Canonical per-language workspace layout under the sandbox root.
//!
//! Mirrors the shape of `substrate_common::paths` (a handful of small
//! functions over a fixed directory layout) rather than a single struct with
//! getters.

use std::path::{Path, PathBuf};

pub const JS_TS_DIR: &str = "js-ts";
pub const PY_DIR: &str = "py";
pub const NODE_MODULES_DIR: &str = "node_modules";
pub const VENV_DIR: &str = "venv";

pub fn js_ts_dir(root: &Path) -> PathBuf {
    root.join(JS_TS_DIR)
}

pub fn py_dir(root: &Path) -> PathBuf {
    root.join(PY_DIR)
}

pub fn node_modules_dir(root: &Path) -> PathBuf {
    js_ts_dir(root).join(NODE_MODULES_DIR)
}

pub fn node_modules_bin_dir(root: &Path) -> PathBuf {
    node_modules_dir(root).join(".bin")
}

pub fn venv_dir(root: &Path) -> PathBuf {
    py_dir(root).join(VENV_DIR)
}

#[cfg(unix)]
pub fn venv_bin_dir(root: &Path) -> PathBuf {
    venv_dir(root).join("bin")
}

#[cfg(not(unix))]
pub fn venv_bin_dir(root: &Path) -> PathBuf {
    venv_dir(root).join("Scripts")
}

pub fn package_json(root: &Path) -> PathBuf {
    js_ts_dir(root).join("package.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_paths_nest_under_root() {
        let root = PathBuf::from("/sandbox");
        assert_eq!(js_ts_dir(&root), PathBuf::from("/sandbox/js-ts"));
        assert_eq!(py_dir(&root), PathBuf::from("/sandbox/py"));
        assert_eq!(
            node_modules_dir(&root),
            PathBuf::from("/sandbox/js-ts/node_modules")
        );
        assert_eq!(venv_dir(&root), PathBuf::from("/sandbox/py/venv"));
    }
}

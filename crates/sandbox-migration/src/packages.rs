//! Package snapshot: OS packages from apt's install history, Python
//! packages from a `pip freeze` diff against a build-time baseline.

use sandbox_exec::ProcessRunner;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

pub const DEFAULT_APT_HISTORY_LOG: &str = "/var/log/apt/history.log";
pub const DEFAULT_PIP_BASELINE: &str = "/opt/sandbox/pip-baseline.txt";

/// Collect package names from `Install:` lines in apt's history log.
///
/// `history.log` lines look like:
/// `Install: ripgrep:amd64 (14.0.3-1, automatic), jq:amd64 (1.6-2.1ubuntu0.20.04.4)`
pub fn parse_apt_history(history: &str) -> Vec<String> {
    let mut names = BTreeSet::new();
    for line in history.lines() {
        let Some(rest) = line.strip_prefix("Install:") else {
            continue;
        };
        for entry in rest.split(',') {
            let entry = entry.trim();
            let Some(name_field) = entry.split_whitespace().next() else {
                continue;
            };
            let name = name_field.split(':').next().unwrap_or(name_field);
            if !name.is_empty() {
                names.insert(name.to_string());
            }
        }
    }
    names.into_iter().collect()
}

pub async fn read_apt_history(history_log: &Path) -> Vec<String> {
    match tokio::fs::read_to_string(history_log).await {
        Ok(content) => parse_apt_history(&content),
        Err(e) => {
            tracing::warn!(error = %e, path = %history_log.display(), "apt history log unreadable, skipping OS package snapshot");
            Vec::new()
        }
    }
}

/// Packages present in `current` freeze output but absent from `baseline`.
pub fn diff_pip_freeze(baseline: &str, current: &str) -> Vec<String> {
    let baseline_set: BTreeSet<&str> = baseline.lines().map(str::trim).collect();
    current
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !baseline_set.contains(line))
        .map(str::to_string)
        .collect()
}

pub async fn snapshot_python_packages(
    runner: &ProcessRunner,
    venv_dir: &Path,
    baseline_path: &Path,
) -> anyhow::Result<Vec<String>> {
    let pip = venv_dir.join("bin").join("pip");
    let outcome = runner
        .run(&format!("{} freeze", pip.display()), None, None)
        .await?;
    if outcome.exit_code != 0 {
        tracing::warn!(stderr = %outcome.stderr, "pip freeze failed, skipping Python package snapshot");
        return Ok(Vec::new());
    }

    let baseline = tokio::fs::read_to_string(baseline_path)
        .await
        .unwrap_or_default();
    Ok(diff_pip_freeze(&baseline, &outcome.stdout))
}

pub fn apt_history_path() -> PathBuf {
    PathBuf::from(DEFAULT_APT_HISTORY_LOG)
}

pub fn pip_baseline_path() -> PathBuf {
    PathBuf::from(DEFAULT_PIP_BASELINE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_install_lines() {
        let history = "Start-Date: 2024-01-01\nCommandline: apt-get install -y ripgrep jq\nInstall: ripgrep:amd64 (14.0.3-1, automatic), jq:amd64 (1.6-2.1)\nEnd-Date: 2024-01-01\n";
        let names = parse_apt_history(history);
        assert_eq!(names, vec!["jq".to_string(), "ripgrep".to_string()]);
    }

    #[test]
    fn ignores_non_install_lines() {
        let history = "Start-Date: 2024-01-01\nRemove: old-package:amd64 (1.0)\n";
        assert!(parse_apt_history(history).is_empty());
    }

    #[test]
    fn diffs_pip_freeze_against_baseline() {
        let baseline = "flask==2.0.0\nrequests==2.28.0\n";
        let current = "flask==2.0.0\nrequests==2.28.0\nnumpy==1.26.0\n";
        let diff = diff_pip_freeze(baseline, current);
        assert_eq!(diff, vec!["numpy==1.26.0".to_string()]);
    }
}

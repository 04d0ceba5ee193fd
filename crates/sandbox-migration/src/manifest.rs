//! Migration manifest schema.
//!
//! Mirrors `manager_manifest::schema`'s pattern of a versioned top-level
//! struct with a dedicated load-time check: unknown versions are rejected
//! outright rather than guessed at.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const CURRENT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageDelta {
    pub apt: Vec<String>,
    pub pip: Vec<String>,
}

impl Default for PackageDelta {
    fn default() -> Self {
        Self {
            apt: Vec::new(),
            pip: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChangedFiles {
    pub count: usize,
    pub total_size: u64,
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationManifest {
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub run_id: Option<String>,
    pub startup_timestamp: DateTime<Utc>,
    pub packages: PackageDelta,
    pub changed_files: ChangedFiles,
}

impl MigrationManifest {
    pub fn new(
        startup_timestamp: DateTime<Utc>,
        run_id: Option<String>,
        packages: PackageDelta,
        changed_files: ChangedFiles,
    ) -> Self {
        Self {
            version: CURRENT_VERSION,
            created_at: Utc::now(),
            run_id,
            startup_timestamp,
            packages,
            changed_files,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.changed_files.paths.is_empty()
            && self.packages.apt.is_empty()
            && self.packages.pip.is_empty()
    }
}

/// Reject a manifest whose `version` this build does not understand, rather
/// than guessing forward compatibility.
pub fn validate(raw: &serde_json::Value) -> anyhow::Result<()> {
    let version = raw
        .get("version")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| anyhow::anyhow!("migration manifest missing `version` field"))?;
    if version != CURRENT_VERSION as u64 {
        anyhow::bail!(
            "unsupported migration manifest version {version}, expected {CURRENT_VERSION}"
        );
    }
    Ok(())
}

pub fn parse(bytes: &[u8]) -> anyhow::Result<MigrationManifest> {
    let raw: serde_json::Value = serde_json::from_slice(bytes)?;
    validate(&raw)?;
    Ok(serde_json::from_value(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_manifest_reports_empty() {
        let manifest = MigrationManifest::new(
            Utc::now(),
            None,
            PackageDelta::default(),
            ChangedFiles::default(),
        );
        assert!(manifest.is_empty());
    }

    #[test]
    fn unknown_version_is_rejected() {
        let raw = serde_json::json!({"version": 99});
        let err = validate(&raw).unwrap_err();
        assert!(err.to_string().contains("unsupported"));
    }

    #[test]
    fn missing_version_is_rejected() {
        let raw = serde_json::json!({"createdAt": "2024-01-01T00:00:00Z"});
        assert!(validate(&raw).is_err());
    }

    #[test]
    fn round_trips_through_json() {
        let manifest = MigrationManifest::new(
            Utc::now(),
            Some("run-1".to_string()),
            PackageDelta {
                apt: vec!["ripgrep".to_string()],
                pip: vec!["requests==2.31.0".to_string()],
            },
            ChangedFiles {
                count: 1,
                total_size: 42,
                paths: vec!["/sandbox/js-ts/index.js".to_string()],
            },
        );
        let bytes = serde_json::to_vec(&manifest).unwrap();
        let parsed = parse(&bytes).unwrap();
        assert_eq!(parsed.packages.apt, vec!["ripgrep".to_string()]);
        assert!(!parsed.is_empty());
    }
}

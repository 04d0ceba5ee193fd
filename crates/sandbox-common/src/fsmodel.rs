//! Shared filesystem wire types.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    File,
    Directory,
}

#[derive(Debug, Clone, Serialize)]
pub struct DirEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DirListing {
    pub path: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub entries: Vec<DirEntry>,
}

impl DirListing {
    /// Sort entries case-insensitively by name, per §3's listing invariant.
    pub fn sorted(path: String, mut entries: Vec<DirEntry>) -> Self {
        entries.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        Self {
            path,
            entry_type: EntryType::Directory,
            entries,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Stat {
    #[serde(rename = "type")]
    pub entry_type: Option<EntryType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    pub mtime: Option<chrono::DateTime<chrono::Utc>>,
    pub exists: bool,
}

impl Stat {
    pub fn missing() -> Self {
        Self {
            entry_type: None,
            size: None,
            mtime: None,
            exists: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_sorts_case_insensitively() {
        let entries = vec![
            DirEntry {
                name: "Banana".into(),
                entry_type: EntryType::File,
                size: Some(1),
            },
            DirEntry {
                name: "apple".into(),
                entry_type: EntryType::File,
                size: Some(2),
            },
            DirEntry {
                name: "Cherry".into(),
                entry_type: EntryType::Directory,
                size: None,
            },
        ];
        let listing = DirListing::sorted("/sandbox".into(), entries);
        let names: Vec<&str> = listing.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["apple", "Banana", "Cherry"]);
    }
}

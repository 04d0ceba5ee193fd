//! Filesystem operations. Every function here operates on an already-resolved
//! absolute path (obtained from `PathResolver`) and never throws to the
//! facade for expected failure modes — callers get a `SandboxError` mapped
//! to the right HTTP status, not a panic or an opaque `anyhow::Error`.

use sandbox_common::fsmodel::{DirEntry, DirListing, EntryType, Stat};
use sandbox_common::SandboxError;
use std::path::{Path, PathBuf};

fn io_err(e: std::io::Error) -> SandboxError {
    SandboxError::internal(e.to_string())
}

pub async fn stat(path: &Path) -> Stat {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Stat {
            entry_type: Some(if meta.is_dir() {
                EntryType::Directory
            } else {
                EntryType::File
            }),
            size: if meta.is_file() { Some(meta.len()) } else { None },
            mtime: meta.modified().ok().map(chrono::DateTime::<chrono::Utc>::from),
            exists: true,
        },
        Err(_) => Stat::missing(),
    }
}

pub async fn read_text(path: &Path) -> Result<String, SandboxError> {
    tokio::fs::read_to_string(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            SandboxError::not_found(path.display().to_string())
        } else {
            io_err(e)
        }
    })
}

pub struct BinaryFile {
    pub bytes: Vec<u8>,
    pub size: u64,
    pub mime_type: String,
}

pub async fn read_binary(path: &Path) -> Result<BinaryFile, SandboxError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            SandboxError::not_found(path.display().to_string())
        } else {
            io_err(e)
        }
    })?;
    let mime_type = mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string();
    Ok(BinaryFile {
        size: bytes.len() as u64,
        bytes,
        mime_type,
    })
}

async fn ensure_parent(path: &Path) -> Result<(), SandboxError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    Ok(())
}

/// Truncate-replace write. Returns the final byte length.
pub async fn write_binary(path: &Path, bytes: &[u8], mode: Option<u32>) -> Result<u64, SandboxError> {
    ensure_parent(path).await?;
    tokio::fs::write(path, bytes).await.map_err(io_err)?;
    if let Some(mode) = mode {
        apply_mode(path, mode).await?;
    }
    Ok(bytes.len() as u64)
}

pub async fn write_text(path: &Path, text: &str, mode: Option<u32>) -> Result<u64, SandboxError> {
    write_binary(path, text.as_bytes(), mode).await
}

/// Append, creating the file (and its parents) if missing. Returns the new
/// file length.
pub async fn append_binary(path: &Path, bytes: &[u8]) -> Result<u64, SandboxError> {
    use tokio::io::AsyncWriteExt;
    ensure_parent(path).await?;
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(io_err)?;
    file.write_all(bytes).await.map_err(io_err)?;
    file.flush().await.map_err(io_err)?;
    let meta = file.metadata().await.map_err(io_err)?;
    Ok(meta.len())
}

#[cfg(unix)]
async fn apply_mode(path: &Path, mode: u32) -> Result<(), SandboxError> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .await
        .map_err(io_err)
}

#[cfg(not(unix))]
async fn apply_mode(_path: &Path, _mode: u32) -> Result<(), SandboxError> {
    Ok(())
}

/// Recursive, idempotent: an existing directory is a success too.
pub async fn mkdir(path: &Path) -> Result<(), SandboxError> {
    match tokio::fs::create_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(io_err(e)),
    }
}

pub async fn delete(path: &Path, recursive: bool) -> Result<(), SandboxError> {
    let meta = tokio::fs::metadata(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            SandboxError::not_found(path.display().to_string())
        } else {
            io_err(e)
        }
    })?;

    if meta.is_file() {
        return tokio::fs::remove_file(path).await.map_err(io_err);
    }

    if recursive {
        return tokio::fs::remove_dir_all(path).await.map_err(io_err);
    }

    match tokio::fs::remove_dir(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::DirectoryNotEmpty || is_not_empty(&e) => {
            Err(SandboxError::conflict("DIR_NOT_EMPTY"))
        }
        Err(e) => Err(io_err(e)),
    }
}

fn is_not_empty(e: &std::io::Error) -> bool {
    matches!(e.raw_os_error(), Some(code) if code == 39) // ENOTEMPTY on Linux
}

/// Enumerate `path`'s immediate children. Per-entry stat failures are
/// swallowed (the entry is emitted without a `size`) rather than aborting
/// the whole listing.
pub async fn list_detailed(path: &Path) -> Result<DirListing, SandboxError> {
    let mut read_dir = tokio::fs::read_dir(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            SandboxError::not_found(path.display().to_string())
        } else {
            io_err(e)
        }
    })?;

    let mut entries = Vec::new();
    while let Some(entry) = read_dir.next_entry().await.map_err(io_err)? {
        let name = entry.file_name().to_string_lossy().to_string();
        let entry_path = entry.path();
        let st = stat(&entry_path).await;
        let entry_type = st.entry_type.unwrap_or(EntryType::File);
        entries.push(DirEntry {
            name,
            entry_type,
            size: st.size,
        });
    }

    Ok(DirListing::sorted(path.display().to_string(), entries))
}

/// Stream `path`'s contents as a zip archive, entries relative to `path`,
/// deflate level 6. Runs on a blocking thread since the `zip` crate is
/// synchronous; the result is a complete buffer handed back to the facade,
/// which streams it to the client via `Body::from`.
pub async fn zip_directory(path: &Path) -> Result<Vec<u8>, SandboxError> {
    let root = path.to_path_buf();
    tokio::task::spawn_blocking(move || zip_directory_blocking(&root))
        .await
        .map_err(|e| SandboxError::internal(e.to_string()))?
}

fn zip_directory_blocking(root: &Path) -> Result<Vec<u8>, SandboxError> {
    use std::io::Write;
    use zip::write::FileOptions;
    use zip::CompressionMethod;

    let buffer = std::io::Cursor::new(Vec::new());
    let mut writer = zip::ZipWriter::new(buffer);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(6));

    for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        let entry_path = entry.path();
        let rel = entry_path.strip_prefix(root).unwrap_or(entry_path);
        if rel.as_os_str().is_empty() {
            continue;
        }
        let rel_str = rel.to_string_lossy().replace('\\', "/");

        if entry.file_type().is_dir() {
            writer
                .add_directory(format!("{rel_str}/"), options)
                .map_err(|e| SandboxError::internal(e.to_string()))?;
        } else if entry.file_type().is_file() {
            writer
                .start_file(rel_str, options)
                .map_err(|e| SandboxError::internal(e.to_string()))?;
            let data = std::fs::read(entry_path).map_err(io_err)?;
            writer.write_all(&data).map_err(io_err)?;
        }
    }

    let cursor = writer
        .finish()
        .map_err(|e| SandboxError::internal(e.to_string()))?;
    Ok(cursor.into_inner())
}

/// Infer a download filename for `?download=1` / directory zip responses.
pub fn leaf_name(path: &Path, root: &Path) -> String {
    if path == root {
        "sandbox".to_string()
    } else {
        path.file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "sandbox".to_string())
    }
}

pub fn parent_buf(path: &Path) -> Option<PathBuf> {
    path.parent().map(|p| p.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a/b/c.txt");
        let written = write_binary(&path, b"hello", None).await.unwrap();
        assert_eq!(written, 5);

        let read = read_binary(&path).await.unwrap();
        assert_eq!(read.bytes, b"hello");
        assert_eq!(read.mime_type, "text/plain");
    }

    #[tokio::test]
    async fn append_creates_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.txt");
        let len = append_binary(&path, b"one").await.unwrap();
        assert_eq!(len, 3);
        let len = append_binary(&path, b"two").await.unwrap();
        assert_eq!(len, 6);
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"onetwo");
    }

    #[tokio::test]
    async fn mkdir_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/dir");
        mkdir(&path).await.unwrap();
        mkdir(&path).await.unwrap();
        assert!(tokio::fs::metadata(&path).await.unwrap().is_dir());
    }

    #[tokio::test]
    async fn delete_file_then_stat_reports_missing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f.txt");
        write_binary(&path, b"x", None).await.unwrap();
        delete(&path, false).await.unwrap();
        assert!(!stat(&path).await.exists);
    }

    #[tokio::test]
    async fn delete_nonempty_dir_without_recursive_conflicts() {
        let dir = tempdir().unwrap();
        let sub = dir.path().join("proj");
        write_binary(&sub.join("a.txt"), b"1", None).await.unwrap();
        let err = delete(&sub, false).await.unwrap_err();
        assert!(matches!(err, SandboxError::Conflict(_)));
        delete(&sub, true).await.unwrap();
        assert!(!stat(&sub).await.exists);
    }

    #[tokio::test]
    async fn listing_is_sorted_and_tolerates_missing_size() {
        let dir = tempdir().unwrap();
        write_binary(&dir.path().join("b.txt"), b"x", None).await.unwrap();
        mkdir(&dir.path().join("A")).await.unwrap();
        let listing = list_detailed(dir.path()).await.unwrap();
        let names: Vec<&str> = listing.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["A", "b.txt"]);
    }

    #[tokio::test]
    async fn zip_directory_contains_all_files() {
        let dir = tempdir().unwrap();
        write_binary(&dir.path().join("x.txt"), b"x", None).await.unwrap();
        write_binary(&dir.path().join("sub/y.txt"), b"y", None).await.unwrap();
        let bytes = zip_directory(dir.path()).await.unwrap();
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
        let mut names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        names.sort();
        assert!(names.contains(&"x.txt".to_string()));
        assert!(names.iter().any(|n| n.contains("y.txt")));
    }
}

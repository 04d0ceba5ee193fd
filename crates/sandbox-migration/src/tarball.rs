//! Tar+gzip packaging of the changed-files delta, and its inverse
//! extraction. Runs on a blocking thread since `tar`/`flate2` are
//! synchronous.

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Cursor;
use std::path::PathBuf;

/// Build a gzipped tar of `paths`, stored with their absolute path as the
/// entry name so restore can extract directly at `/`. An empty `paths`
/// yields a (non-empty, structurally valid) empty tarball.
pub async fn build(paths: Vec<String>) -> anyhow::Result<Vec<u8>> {
    tokio::task::spawn_blocking(move || {
        let buf = Vec::new();
        let encoder = GzEncoder::new(buf, Compression::default());
        let mut builder = tar::Builder::new(encoder);

        for path in &paths {
            let path = PathBuf::from(path);
            if !path.is_file() {
                continue;
            }
            let entry_name = path.strip_prefix("/").unwrap_or(&path);
            builder.append_path_with_name(&path, entry_name)?;
        }

        let encoder = builder.into_inner()?;
        Ok(encoder.finish()?)
    })
    .await?
}

/// Extract a gzipped tar at `/`, restoring absolute paths. Per Invariant M1,
/// restore is additive only: entries overwrite in place ("last writer
/// wins") and nothing pre-existing is deleted.
pub async fn extract(bytes: Vec<u8>) -> anyhow::Result<usize> {
    tokio::task::spawn_blocking(move || {
        let decoder = GzDecoder::new(Cursor::new(bytes));
        let mut archive = tar::Archive::new(decoder);
        archive.set_preserve_permissions(true);
        archive.set_overwrite(true);

        let mut count = 0;
        for entry in archive.entries()? {
            let mut entry = entry?;
            let relative = entry.path()?.into_owned();
            let destination = PathBuf::from("/").join(relative);
            if let Some(parent) = destination.parent() {
                std::fs::create_dir_all(parent)?;
            }
            entry.unpack(&destination)?;
            count += 1;
        }
        Ok(count)
    })
    .await?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[tokio::test]
    async fn empty_path_list_yields_a_valid_empty_tarball() {
        let bytes = build(Vec::new()).await.unwrap();
        assert!(!bytes.is_empty());
        let count = extract(bytes).await.unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn builds_tarball_containing_real_files() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("note.txt");
        let mut file = std::fs::File::create(&file_path).unwrap();
        file.write_all(b"hello").unwrap();

        let bytes = build(vec![file_path.display().to_string()]).await.unwrap();
        assert!(bytes.len() > 20);
    }
}

//! Archive packaging of finished jobs

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A finished archive on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveRef {
    /// Location of the archive file
    pub path: PathBuf,
    /// Size in bytes
    pub size_bytes: u64,
    /// Number of entries written
    pub entries: usize,
}

/// Trait for archive packagers
///
/// Packages a flat list of files into one downloadable archive. Entries are
/// named after each file's own name, in the order given.
#[async_trait]
pub trait ArchivePackager: Send + Sync {
    /// Write `files` into a new archive at `dest`
    ///
    /// An empty list produces a valid, empty archive.
    async fn package(&self, files: &[PathBuf], dest: &Path) -> Result<ArchiveRef>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Packager producing deflate-compressed ZIP files
pub struct ZipPackager;

impl ZipPackager {
    fn write_zip(files: &[PathBuf], dest: &Path) -> Result<ArchiveRef> {
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::File::create(dest)?;
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::FileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);

        let mut seen = HashSet::new();
        let mut entries = 0;

        for path in files {
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| Error::Other(format!("unusable file name: {}", path.display())))?;

            // names are unique within a plan, guard anyway since a duplicate corrupts the zip
            if !seen.insert(name.to_string()) {
                debug!(name, "skipping duplicate archive entry");
                continue;
            }

            let data = std::fs::read(path)?;
            writer.start_file(name, options)?;
            writer.write_all(&data)?;
            entries += 1;
        }

        let file = writer.finish()?;
        let size_bytes = file.metadata()?.len();

        Ok(ArchiveRef {
            path: dest.to_path_buf(),
            size_bytes,
            entries,
        })
    }
}

#[async_trait]
impl ArchivePackager for ZipPackager {
    async fn package(&self, files: &[PathBuf], dest: &Path) -> Result<ArchiveRef> {
        let files = files.to_vec();
        let dest_path = dest.to_path_buf();

        let archive = tokio::task::spawn_blocking(move || Self::write_zip(&files, &dest_path))
            .await
            .map_err(|e| Error::Other(format!("archive task panicked: {e}")))??;

        info!(
            path = %archive.path.display(),
            entries = archive.entries,
            size_bytes = archive.size_bytes,
            "archive written"
        );
        Ok(archive)
    }

    fn name(&self) -> &'static str {
        "zip"
    }
}

//! Archive extraction
//!
//! Entries are written in archive order. Any entry whose path would land
//! outside the destination fails the extraction.

use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};

/// Archive formats that can be unpacked after download
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Tar,
}

impl ArchiveFormat {
    /// Format declared by a download link's content type (`ZIP`, `application/zip`, ...)
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        match content_type.trim().to_ascii_lowercase().as_str() {
            "zip" | "application/zip" | "application/x-zip-compressed" => Some(ArchiveFormat::Zip),
            "tar" | "application/x-tar" => Some(ArchiveFormat::Tar),
            _ => None,
        }
    }

    /// Extract `archive` into `dest`, returning the paths written
    pub fn extract(self, archive: &Path, dest: &Path) -> Result<Vec<PathBuf>> {
        let file = File::open(archive).map_err(|e| Error::io(archive, e))?;
        let written = match self {
            ArchiveFormat::Zip => extract_zip(file, archive, dest)?,
            ArchiveFormat::Tar => extract_tar(file, archive, dest)?,
        };
        debug!(entries = written.len(), dest = %dest.display(), "archive extracted");
        Ok(written)
    }
}

fn extract_zip(file: File, archive_path: &Path, dest: &Path) -> Result<Vec<PathBuf>> {
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| Error::Integrity(format!("{}: {}", archive_path.display(), e)))?;

    let mut written = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| Error::Integrity(format!("{}: {}", archive_path.display(), e)))?;

        let relative = entry
            .enclosed_name()
            .ok_or_else(|| escaping_entry(entry.name()))?;
        let target = dest.join(&relative);

        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(|e| Error::io(&target, e))?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
            }
            let mut out = File::create(&target).map_err(|e| Error::io(&target, e))?;
            io::copy(&mut entry, &mut out).map_err(|e| Error::io(&target, e))?;
        }

        if let Some(mode) = entry.unix_mode() {
            set_mode(&target, mode)?;
        }
        written.push(target);
    }
    Ok(written)
}

fn extract_tar(file: File, archive_path: &Path, dest: &Path) -> Result<Vec<PathBuf>> {
    let mut archive = tar::Archive::new(file);
    archive.set_preserve_permissions(true);

    let mut written = Vec::new();
    for entry in archive.entries().map_err(|e| Error::io(archive_path, e))? {
        let mut entry = entry.map_err(|e| Error::io(archive_path, e))?;
        let relative = entry.path().map_err(|e| Error::io(archive_path, e))?.into_owned();

        if !is_enclosed(&relative) {
            return Err(escaping_entry(&relative.to_string_lossy()));
        }
        let unpacked = entry.unpack_in(dest).map_err(|e| Error::io(dest, e))?;
        if !unpacked {
            return Err(escaping_entry(&relative.to_string_lossy()));
        }
        written.push(dest.join(relative));
    }
    Ok(written)
}

fn is_enclosed(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

fn escaping_entry(name: &str) -> Error {
    Error::Integrity(format!("archive entry escapes destination: {}", name))
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777)).map_err(|e| Error::io(path, e))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

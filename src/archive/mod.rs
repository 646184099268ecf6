//! Uniform read access to class files on disk and entries inside archives.
//!
//! A [`FileObject`] is either a loose file or an entry within a zip/jar
//! archive. Both carry URI-style identities: `file:/path/to/Foo.class` for
//! loose files and `jar:file:/path/to/dep.jar!/com/acme/Foo.class` for
//! archive entries. The archive itself (the *container*) keeps a plain
//! `file:` URI so fingerprints always key on an on-disk file.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use walkdir::WalkDir;
use zip::ZipArchive;

use crate::error::{IndexError, IndexResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileObject {
    Loose { path: PathBuf },
    Entry { archive: PathBuf, entry: String },
}

impl FileObject {
    pub fn loose(path: impl Into<PathBuf>) -> Self {
        FileObject::Loose { path: path.into() }
    }

    pub fn entry(archive: impl Into<PathBuf>, entry: impl Into<String>) -> Self {
        FileObject::Entry {
            archive: archive.into(),
            entry: entry.into(),
        }
    }

    /// URI of this object, unique across loose files and archive entries.
    pub fn uri(&self) -> String {
        match self {
            FileObject::Loose { path } => file_uri(path),
            FileObject::Entry { archive, entry } => {
                format!("jar:{}!/{}", file_uri(archive), entry)
            }
        }
    }

    /// URI of the enclosing on-disk file; equals `uri()` for loose files.
    pub fn container_uri(&self) -> String {
        file_uri(self.container_path())
    }

    pub fn container_path(&self) -> &Path {
        match self {
            FileObject::Loose { path } => path,
            FileObject::Entry { archive, .. } => archive,
        }
    }

    /// Last-modified time of the enclosing file, in milliseconds.
    pub fn last_modified(&self) -> IndexResult<u64> {
        last_modified_millis(self.container_path())
    }

    pub fn extension(&self) -> Option<&str> {
        let name = match self {
            FileObject::Loose { path } => path.to_str()?,
            FileObject::Entry { entry, .. } => entry.as_str(),
        };
        name.rsplit_once('.').map(|(_, ext)| ext)
    }

    /// Path of the entry within its archive; `None` for loose files.
    pub fn path_within_archive(&self) -> Option<&str> {
        match self {
            FileObject::Loose { .. } => None,
            FileObject::Entry { entry, .. } => Some(entry),
        }
    }

    pub fn read_bytes(&self) -> IndexResult<Vec<u8>> {
        match self {
            FileObject::Loose { path } => std::fs::read(path).map_err(|e| IndexError::FileRead {
                path: path.clone(),
                source: e,
            }),
            FileObject::Entry { archive, entry } => {
                let file = File::open(archive).map_err(|e| IndexError::FileRead {
                    path: archive.clone(),
                    source: e,
                })?;
                let mut zip = ZipArchive::new(file).map_err(|e| IndexError::ArchiveRead {
                    path: archive.clone(),
                    cause: e.to_string(),
                })?;
                let mut entry_file =
                    zip.by_name(entry).map_err(|e| IndexError::ArchiveRead {
                        path: archive.clone(),
                        cause: format!("{entry}: {e}"),
                    })?;
                let mut buf = Vec::with_capacity(entry_file.size() as usize);
                entry_file
                    .read_to_end(&mut buf)
                    .map_err(|e| IndexError::ArchiveRead {
                        path: archive.clone(),
                        cause: format!("{entry}: {e}"),
                    })?;
                Ok(buf)
            }
        }
    }
}

/// `file:` URI for an on-disk path.
pub fn file_uri(path: &Path) -> String {
    format!("file:{}", path.display())
}

/// Inverse of [`file_uri`]. Returns `None` for URIs of other schemes.
pub fn uri_to_path(uri: &str) -> Option<PathBuf> {
    uri.strip_prefix("file:").map(PathBuf::from)
}

pub fn last_modified_millis(path: &Path) -> IndexResult<u64> {
    let modified = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|e| IndexError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
    Ok(modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0))
}

/// Recursively list `.class` files under a directory.
///
/// Unreadable entries are skipped; the result is sorted so refresh plans are
/// deterministic.
pub fn walk_class_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("class"))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

/// Visit every `.class` entry in an archive, in archive order.
///
/// The callback receives the entry as a [`FileObject`] plus its raw bytes.
pub fn walk_class_entries(
    archive: &Path,
    mut visit: impl FnMut(FileObject, Vec<u8>),
) -> IndexResult<()> {
    let file = File::open(archive).map_err(|e| IndexError::FileRead {
        path: archive.to_path_buf(),
        source: e,
    })?;
    let mut zip = ZipArchive::new(file).map_err(|e| IndexError::ArchiveRead {
        path: archive.to_path_buf(),
        cause: e.to_string(),
    })?;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(|e| IndexError::ArchiveRead {
            path: archive.to_path_buf(),
            cause: e.to_string(),
        })?;
        if entry.is_dir() || !entry.name().ends_with(".class") {
            continue;
        }
        let name = entry.name().to_string();
        let mut buf = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut buf)
            .map_err(|e| IndexError::ArchiveRead {
                path: archive.to_path_buf(),
                cause: format!("{name}: {e}"),
            })?;
        visit(FileObject::entry(archive, name), buf);
    }
    Ok(())
}

//! Ordered search path of directories and archives.
//!
//! Every entry is either a directory (resources are plain files below it) or
//! a zip archive (jar, jmod, ...). Entries that do not exist are skipped;
//! entries that exist but cannot be read fail the whole lookup.

use enclave_api::{ContainerError, Result};
use std::ffi::OsStr;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;
use zip::ZipArchive;
use zip::result::ZipError;

/// One resource found on a search path entry.
#[derive(Debug, Clone)]
pub struct ResourceHit {
    /// The search path entry (directory or archive) holding the resource.
    pub entry: PathBuf,
    /// Resource name relative to the entry root.
    pub name: String,
    pub bytes: Vec<u8>,
}

impl ResourceHit {
    /// Human readable origin, `entry!/name` for archives.
    pub fn origin(&self) -> String {
        entry_location(&self.entry, &self.name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchPath {
    entries: Vec<PathBuf>,
}

impl SearchPath {
    pub fn new(entries: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self {
            entries: entries.into_iter().map(Into::into).collect(),
        }
    }

    /// Parses a platform path list (`a.jar:b/classes` on unix).
    pub fn parse(list: impl AsRef<OsStr>) -> Self {
        Self {
            entries: std::env::split_paths(list.as_ref())
                .filter(|p| !p.as_os_str().is_empty())
                .collect(),
        }
    }

    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every instance of `name` on the path, in entry order.
    pub fn find_resources(&self, name: &str) -> Result<Vec<ResourceHit>> {
        let mut hits = Vec::new();
        for entry in &self.entries {
            if let Some(bytes) = read_resource(entry, name)? {
                hits.push(ResourceHit {
                    entry: entry.clone(),
                    name: name.to_string(),
                    bytes,
                });
            }
        }
        Ok(hits)
    }
}

/// Reads `name` from a single search path entry.
///
/// Returns `Ok(None)` when the entry does not exist or does not contain the
/// resource.
pub fn read_resource(entry: &Path, name: &str) -> Result<Option<Vec<u8>>> {
    if entry.is_dir() {
        let file = entry.join(name);
        if !file.is_file() {
            return Ok(None);
        }
        return std::fs::read(&file)
            .map(Some)
            .map_err(|e| ContainerError::discovery(file, e));
    }

    if !entry.is_file() {
        debug!("Skipping missing search path entry {:?}", entry);
        return Ok(None);
    }

    let file = File::open(entry).map_err(|e| ContainerError::discovery(entry, e))?;
    let mut archive = ZipArchive::new(file).map_err(|e| ContainerError::archive(entry, e))?;
    let result = match archive.by_name(name) {
        Ok(mut zip_entry) => {
            let mut bytes = Vec::new();
            zip_entry
                .read_to_end(&mut bytes)
                .map_err(|e| ContainerError::discovery(entry, e))?;
            Ok(Some(bytes))
        }
        Err(ZipError::FileNotFound) => Ok(None),
        Err(e) => Err(ContainerError::archive(entry, e)),
    };
    result
}

/// Names of every file inside an archive entry.
pub fn archive_entry_names(entry: &Path) -> Result<Vec<String>> {
    let file = File::open(entry).map_err(|e| ContainerError::discovery(entry, e))?;
    let archive = ZipArchive::new(file).map_err(|e| ContainerError::archive(entry, e))?;
    Ok(archive
        .file_names()
        .filter(|n| !n.ends_with('/'))
        .map(str::to_string)
        .collect())
}

/// `dir/name` for directories, `archive!/name` for archives.
pub fn entry_location(entry: &Path, name: &str) -> String {
    if entry.is_dir() {
        entry.join(name).display().to_string()
    } else {
        format!("{}!/{}", entry.display(), name)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::io::Write;
    use std::path::Path;
    use zip::write::SimpleFileOptions;

    /// Writes a zip archive with the given `(name, content)` entries.
    pub fn write_jar(path: &Path, entries: &[(&str, &str)]) {
        let file = std::fs::File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        for (name, content) in entries {
            writer
                .start_file(name.to_string(), SimpleFileOptions::default())
                .unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    pub fn write_file(root: &Path, name: &str, content: &str) {
        let path = root.join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }
}

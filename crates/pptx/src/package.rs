//! ZIP package access: read parts, replace parts, write a new package.
//!
//! Parts that were never replaced are raw-copied into the output, compressed
//! bytes included, so they come out byte-identical.

use ppt_core::{Error, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use zip::result::ZipError;
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

const CONTENT_TYPES: &str = "[Content_Types].xml";

/// An open-packaging-conventions package backed by a ZIP archive.
pub struct Package<R = BufReader<File>> {
    label: String,
    archive: ZipArchive<R>,
    names: Vec<String>,
    modified: HashMap<String, Vec<u8>>,
}

impl Package {
    /// Open a package file read-only.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::from_io(e, path))?;
        Self::from_reader(BufReader::new(file), &path.display().to_string())
    }
}

impl<R: Read + Seek> Package<R> {
    /// Open a package from any seekable reader. `label` names it in errors.
    pub fn from_reader(reader: R, label: &str) -> Result<Self> {
        let mut archive = ZipArchive::new(reader).map_err(|e| match e {
            ZipError::Io(io) => Error::from_io(io, Path::new(label)),
            other => Error::FormatError(format!("{} is not a ZIP package: {}", label, other)),
        })?;

        let mut names = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let entry = archive
                .by_index_raw(i)
                .map_err(|e| Error::ZipError(format!("Failed to read entry {} of {}: {}", i, label, e)))?;
            names.push(entry.name().to_string());
        }

        if !names.iter().any(|n| n == CONTENT_TYPES) {
            return Err(Error::FormatError(format!(
                "{} has no {}",
                label, CONTENT_TYPES
            )));
        }

        log::debug!("Opened {} with {} parts", label, names.len());

        Ok(Self {
            label: label.to_string(),
            archive,
            names,
            modified: HashMap::new(),
        })
    }

    /// Name used for this package in messages.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Part names in archive order.
    pub fn part_names(&self) -> &[String] {
        &self.names
    }

    /// Whether a part exists.
    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Names of the parts replaced so far, in archive order.
    pub fn modified_parts(&self) -> Vec<&str> {
        self.names
            .iter()
            .filter(|n| self.modified.contains_key(n.as_str()))
            .map(String::as_str)
            .collect()
    }

    /// Read a part's bytes, including pending replacements.
    pub fn read_part(&mut self, name: &str) -> Result<Vec<u8>> {
        if let Some(bytes) = self.modified.get(name) {
            return Ok(bytes.clone());
        }

        let mut file = self.archive.by_name(name).map_err(|e| match e {
            ZipError::FileNotFound => {
                Error::NotFound(format!("part '{}' in {}", name, self.label))
            }
            other => Error::ZipError(format!("Failed to read '{}': {}", name, other)),
        })?;

        let mut content = Vec::new();
        file.read_to_end(&mut content)
            .map_err(|e| Error::ZipError(format!("Failed to read '{}': {}", name, e)))?;

        Ok(content)
    }

    /// Read a part as UTF-8 text.
    pub fn read_part_string(&mut self, name: &str) -> Result<String> {
        let bytes = self.read_part(name)?;
        String::from_utf8(bytes)
            .map_err(|_| Error::FormatError(format!("part '{}' is not valid UTF-8", name)))
    }

    /// Replace the content of an existing part.
    pub fn set_part(&mut self, name: &str, bytes: impl Into<Vec<u8>>) -> Result<()> {
        if !self.contains(name) {
            return Err(Error::NotFound(format!("part '{}' in {}", name, self.label)));
        }
        log::debug!("Replacing part {}", name);
        self.modified.insert(name.to_string(), bytes.into());
        Ok(())
    }

    /// Write the package, in original entry order, to `writer`.
    pub fn write_to<W: Write + Seek>(&mut self, writer: W) -> Result<W> {
        let mut zip = ZipWriter::new(writer);

        for i in 0..self.names.len() {
            let name = &self.names[i];
            let entry = self
                .archive
                .by_index_raw(i)
                .map_err(|e| Error::ZipError(format!("Failed to read '{}': {}", name, e)))?;

            match self.modified.get(name) {
                Some(bytes) => {
                    let options = FileOptions::default()
                        .compression_method(entry.compression())
                        .last_modified_time(entry.last_modified());
                    drop(entry);
                    zip.start_file(name.as_str(), options)
                        .map_err(|e| Error::ZipError(format!("Failed to write '{}': {}", name, e)))?;
                    zip.write_all(bytes)?;
                }
                None => {
                    zip.raw_copy_file(entry)
                        .map_err(|e| Error::ZipError(format!("Failed to copy '{}': {}", name, e)))?;
                }
            }
        }

        zip.finish()
            .map_err(|e| Error::ZipError(format!("Failed to finish archive: {}", e)))
    }

    /// Atomically write the package to `destination`.
    pub fn save(&mut self, destination: &Path) -> Result<()> {
        let dir = destination
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

        let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| Error::from_io(e, &dir))?;
        self.write_to(tmp.as_file_mut())?;
        tmp.as_file().sync_all()?;
        tmp.persist(destination)
            .map_err(|e| Error::from_io(e.error, destination))?;

        log::debug!("Saved {} to {}", self.label, destination.display());
        Ok(())
    }
}

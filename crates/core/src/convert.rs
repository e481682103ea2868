//! Conversion of legacy binary documents into package-based files.
//!
//! The conversion itself is delegated to an external office suite; this module
//! only defines the seam and the command-line contract.

use crate::error::{Error, Result};
use crate::types::DocumentFormat;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Produces an equivalent package-based file for a legacy document.
pub trait LegacyConverter {
    /// Convert `input` into `out_dir`, returning the converted file's path.
    fn convert(&self, input: &Path, out_dir: &Path) -> Result<PathBuf>;
}

/// Converter driving a LibreOffice-compatible executable in headless mode.
#[derive(Debug, Clone)]
pub struct OfficeConverter {
    program: PathBuf,
}

impl OfficeConverter {
    /// Create a converter that runs `program`.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self, input: &Path, out_dir: &Path, target: DocumentFormat) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--headless")
            .arg("--convert-to")
            .arg(target.extension())
            .arg("--outdir")
            .arg(out_dir)
            .arg(input);
        cmd
    }
}

impl Default for OfficeConverter {
    fn default() -> Self {
        Self::new("soffice")
    }
}

impl LegacyConverter for OfficeConverter {
    fn convert(&self, input: &Path, out_dir: &Path) -> Result<PathBuf> {
        let format = DocumentFormat::from_path(input)
            .filter(|f| f.is_legacy())
            .ok_or_else(|| {
                Error::FormatError(format!("{} is not a legacy document", input.display()))
            })?;
        let target = format.modern_equivalent();

        log::debug!(
            "Converting {} to {} with {}",
            input.display(),
            target,
            self.program.display()
        );

        let output = self
            .command(input, out_dir, target)
            .output()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => Error::ProcessError(format!(
                    "converter not found: {}",
                    self.program.display()
                )),
                _ => Error::ProcessError(format!(
                    "failed to run {}: {}",
                    self.program.display(),
                    e
                )),
            })?;

        if !output.status.success() {
            return Err(Error::FormatError(format!(
                "conversion of {} failed ({}): {}",
                input.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let stem = input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("converted");
        let converted = out_dir.join(format!("{}.{}", stem, target.extension()));

        if !converted.is_file() {
            return Err(Error::FormatError(format!(
                "conversion of {} produced no {} file",
                input.display(),
                target
            )));
        }

        Ok(converted)
    }
}

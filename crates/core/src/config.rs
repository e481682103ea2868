//! Persistent tool settings, loaded from a JSON file.

use crate::error::{Error, Result};
use crate::types::{DocumentFormat, MarkupMode, TypographySettings};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Settings shared by every command. Command-line flags override these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Typography adjustments for the document-tree normalizer.
    pub typography: TypographySettings,

    /// Substitution mode for the markup normalizer.
    pub markup_mode: MarkupMode,

    /// Subfolder name for document-tree normalizer output.
    pub normalize_folder: String,

    /// Subfolder name for markup normalizer output.
    pub markup_folder: String,

    /// Root folder for extracted images (current directory when unset).
    pub image_output_root: Option<PathBuf>,

    /// Document types picked up by image extraction.
    pub image_formats: Vec<DocumentFormat>,

    /// Office converter used for legacy binary documents.
    pub converter: PathBuf,

    /// Script freezer used by the packaging command.
    pub freezer: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            typography: TypographySettings::default(),
            markup_mode: MarkupMode::default(),
            normalize_folder: "output".to_string(),
            markup_folder: "_target_".to_string(),
            image_output_root: None,
            image_formats: DocumentFormat::ALL.to_vec(),
            converter: PathBuf::from("soffice"),
            freezer: PathBuf::from("pyinstaller"),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::from_io(e, path))?;
        let settings: Settings = serde_json::from_str(&content).map_err(|e| {
            Error::FormatError(format!("invalid settings file {}: {}", path.display(), e))
        })?;
        settings.typography.validate()?;
        log::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Load settings from `path` if given, otherwise use defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Write settings as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| Error::FormatError(format!("cannot serialize settings: {}", e)))?;
        fs::write(path, content).map_err(|e| Error::from_io(e, path))
    }
}

//! Domain types shared by the normalization and extraction backends.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Office document formats handled by the tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    /// Presentation package (Office Open XML).
    Pptx,
    /// Word-processing package (Office Open XML).
    Docx,
    /// Spreadsheet package (Office Open XML).
    Xlsx,
    /// Portable Document Format.
    Pdf,
    /// Legacy binary presentation.
    Ppt,
    /// Legacy binary word-processing document.
    Doc,
    /// Legacy binary spreadsheet.
    Xls,
}

impl DocumentFormat {
    /// Every supported format.
    pub const ALL: [DocumentFormat; 7] = [
        Self::Pptx,
        Self::Docx,
        Self::Xlsx,
        Self::Pdf,
        Self::Ppt,
        Self::Doc,
        Self::Xls,
    ];

    /// Detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pptx" => Some(Self::Pptx),
            "docx" => Some(Self::Docx),
            "xlsx" => Some(Self::Xlsx),
            "pdf" => Some(Self::Pdf),
            "ppt" => Some(Self::Ppt),
            "doc" => Some(Self::Doc),
            "xls" => Some(Self::Xls),
            _ => None,
        }
    }

    /// Detect format from a path's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Canonical lowercase extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Pptx => "pptx",
            Self::Docx => "docx",
            Self::Xlsx => "xlsx",
            Self::Pdf => "pdf",
            Self::Ppt => "ppt",
            Self::Doc => "doc",
            Self::Xls => "xls",
        }
    }

    /// Whether this is a legacy binary format that needs conversion first.
    pub fn is_legacy(self) -> bool {
        matches!(self, Self::Ppt | Self::Doc | Self::Xls)
    }

    /// The package-based format a legacy format converts to.
    pub fn modern_equivalent(self) -> Self {
        match self {
            Self::Ppt => Self::Pptx,
            Self::Doc => Self::Docx,
            Self::Xls => Self::Xlsx,
            other => other,
        }
    }

    /// The container a well-formed file of this format uses.
    pub fn container(self) -> ContainerKind {
        match self {
            Self::Pptx | Self::Docx | Self::Xlsx => ContainerKind::Zip,
            Self::Ppt | Self::Doc | Self::Xls => ContainerKind::Cfb,
            Self::Pdf => ContainerKind::Pdf,
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for DocumentFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_extension(s.trim().trim_start_matches('.'))
            .ok_or_else(|| Error::InvalidArgument(format!("unknown document type '{}'", s)))
    }
}

/// Physical container of a document file, detected from magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    /// ZIP archive (PK\x03\x04).
    Zip,
    /// OLE/CFB compound file (D0 CF 11 E0 A1 B1 1A E1).
    Cfb,
    /// PDF file (%PDF).
    Pdf,
}

impl ContainerKind {
    /// Detect container from file magic bytes.
    pub fn from_magic(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 4 {
            return None;
        }

        if bytes.starts_with(&[0x50, 0x4B, 0x03, 0x04]) {
            return Some(Self::Zip);
        }

        if bytes.starts_with(b"%PDF") {
            return Some(Self::Pdf);
        }

        if bytes.len() >= 8
            && bytes.starts_with(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1])
        {
            return Some(Self::Cfb);
        }

        None
    }
}

/// Typography adjustments applied by the document-tree normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypographySettings {
    /// Multiplier applied to every explicit run font size.
    pub font_scale: f64,

    /// Line spacing multiple applied to paragraphs (1.0 = single).
    pub line_spacing: f64,

    /// Character spacing in hundredths of a point; zero removes explicit spacing.
    pub character_spacing: i32,

    /// Whether spacing (character, line, before/after) is rewritten at all.
    pub apply_spacing: bool,
}

impl Default for TypographySettings {
    fn default() -> Self {
        Self {
            font_scale: 0.6,
            line_spacing: 1.0,
            character_spacing: 0,
            apply_spacing: false,
        }
    }
}

impl TypographySettings {
    /// Reject scales and spacings that would produce nonsense markup.
    pub fn validate(&self) -> Result<()> {
        if !self.font_scale.is_finite() || self.font_scale <= 0.0 {
            return Err(Error::InvalidArgument(format!(
                "font scale must be a positive number, got {}",
                self.font_scale
            )));
        }
        if !self.line_spacing.is_finite() || self.line_spacing <= 0.0 {
            return Err(Error::InvalidArgument(format!(
                "line spacing must be a positive number, got {}",
                self.line_spacing
            )));
        }
        Ok(())
    }
}

/// Substitution mode of the raw markup normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MarkupMode {
    /// Line breaks become paragraph boundaries and character spacing is removed.
    #[default]
    HardBreakUnify,
    /// Line breaks become paragraph boundaries.
    HardBreak,
    /// Line breaks become a single space.
    Space,
}

impl MarkupMode {
    /// Whether explicit character spacing attributes are stripped.
    pub fn unifies_spacing(self) -> bool {
        matches!(self, Self::HardBreakUnify)
    }

    /// Whether line breaks are turned into paragraph boundaries.
    pub fn splits_paragraphs(self) -> bool {
        matches!(self, Self::HardBreakUnify | Self::HardBreak)
    }
}

impl FromStr for MarkupMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "hard-break-unify" | "1" => Ok(Self::HardBreakUnify),
            "hard-break" | "2" => Ok(Self::HardBreak),
            "space" | "3" => Ok(Self::Space),
            other => Err(Error::InvalidArgument(format!(
                "unknown markup mode '{}' (expected hard-break-unify, hard-break or space)",
                other
            ))),
        }
    }
}

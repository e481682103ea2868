//! Office Open XML packages: typography normalization of presentations and
//! image extraction.
//!
//! Packages are ZIP archives of XML parts. Two normalizers share the
//! [`PartNormalizer`] interface: [`TreeNormalizer`] edits a parsed element
//! tree, [`MarkupNormalizer`] substitutes over raw markup.

pub mod images;
pub mod markup;
pub mod normalizer;
pub mod package;
pub mod presentation;
pub mod shapes;
pub mod tree;
pub mod xml;

#[cfg(test)]
mod testing;

pub use images::{extract_images, ExtractedImage};
pub use markup::{normalize_markup, MarkupNormalizer};
pub use normalizer::{normalize_package, Coverage, NormalizeJob, PartNormalizer};
pub use package::Package;
pub use presentation::PresentationStructure;
pub use tree::{NormalizeStats, TreeNormalizer};

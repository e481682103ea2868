//! PDF backend: image XObject extraction.

pub mod images;

pub use images::{extension_for_filter, PdfImage, PdfImageExtractor};

//! Core domain types, batch driver, settings and legacy conversion for
//! office document normalization and image extraction.

pub mod batch;
pub mod config;
pub mod convert;
pub mod error;
pub mod types;

pub use batch::{
    collect_inputs, run_batch, BatchEntry, BatchJob, BatchReport, InputSelection, JobOutput,
    Outcome, OutputLocation,
};
pub use config::Settings;
pub use convert::{LegacyConverter, OfficeConverter};
pub use error::{Error, Result};
pub use types::{ContainerKind, DocumentFormat, MarkupMode, TypographySettings};

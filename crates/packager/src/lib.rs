//! Packaging of a script into a standalone executable through an external
//! freezer: descriptor generation and streamed, cancellable runs.

pub mod descriptor;
pub mod run;

pub use descriptor::{collect_data_files, read_hidden_imports, BuildDescriptor, DataFile};
pub use run::{Canceller, FreezeRequest, FreezeRun};

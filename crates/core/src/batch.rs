//! Batch driver: input selection, per-file isolation and outcome reporting.
//!
//! A batch processes its inputs strictly in order. A failing file is recorded
//! and the batch moves on; only failures that make every file unsafe to
//! process (the output root cannot be created) abort the run.

use crate::error::{Error, Result};
use crate::types::DocumentFormat;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Which files a directory scan keeps.
#[derive(Debug, Clone)]
pub struct InputSelection {
    formats: Vec<DocumentFormat>,
    recursive: bool,
}

impl InputSelection {
    /// Select files of the given formats from the immediate directory children.
    pub fn new(formats: impl IntoIterator<Item = DocumentFormat>) -> Self {
        Self {
            formats: formats.into_iter().collect(),
            recursive: false,
        }
    }

    /// Set whether subdirectories are scanned too.
    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Whether a path's extension is one of the selected formats.
    pub fn accepts(&self, path: &Path) -> bool {
        DocumentFormat::from_path(path).is_some_and(|f| self.formats.contains(&f))
    }
}

/// Collect the files a batch should process, in deterministic path order.
pub fn collect_inputs(path: &Path, selection: &InputSelection) -> Result<Vec<PathBuf>> {
    let metadata = fs::metadata(path).map_err(|e| Error::from_io(e, path))?;

    if metadata.is_file() {
        if selection.accepts(path) {
            return Ok(vec![path.to_path_buf()]);
        }
        return Err(Error::FormatError(format!(
            "{} is not one of the selected document types",
            path.display()
        )));
    }

    let mut files = Vec::new();
    scan_directory(path, selection, &mut files)?;
    files.sort();
    log::debug!("Selected {} file(s) under {}", files.len(), path.display());
    Ok(files)
}

fn scan_directory(dir: &Path, selection: &InputSelection, files: &mut Vec<PathBuf>) -> Result<()> {
    let entries = fs::read_dir(dir).map_err(|e| Error::from_io(e, dir))?;

    for entry in entries {
        let entry = entry.map_err(|e| Error::from_io(e, dir))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| Error::from_io(e, &path))?;

        if file_type.is_dir() {
            if selection.recursive {
                scan_directory(&path, selection, files)?;
            }
        } else if selection.accepts(&path) {
            files.push(path);
        }
    }

    Ok(())
}

/// Where a batch writes its results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputLocation {
    /// A fixed-name folder next to the input (inside it for a directory input).
    Subfolder(String),
    /// A caller-chosen root directory.
    Root(PathBuf),
}

impl OutputLocation {
    /// Resolve the output root for a batch started from `input`.
    pub fn resolve(&self, input: &Path) -> PathBuf {
        match self {
            Self::Root(root) => root.clone(),
            Self::Subfolder(name) => {
                if input.is_dir() {
                    input.join(name)
                } else {
                    match input.parent() {
                        Some(parent) => parent.join(name),
                        None => PathBuf::from(name),
                    }
                }
            }
        }
    }
}

/// What a job produced for one input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutput {
    /// File or folder the result was written to.
    pub destination: PathBuf,
    /// Number of converted parts or extracted images.
    pub count: usize,
}

/// One unit of batch work, applied to each selected input.
pub trait BatchJob {
    /// Process a single input, writing results under `output_root`.
    fn process(&self, input: &Path, output_root: &Path) -> Result<JobOutput>;
}

/// Outcome recorded for one input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    Succeeded { destination: PathBuf, count: usize },
    Failed { message: String },
}

/// An input with its recorded outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchEntry {
    pub input: PathBuf,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl BatchEntry {
    /// Whether the input was processed successfully.
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Succeeded { .. })
    }

    /// Human-readable status line for this entry.
    pub fn status_line(&self) -> String {
        match &self.outcome {
            Outcome::Succeeded { destination, count } => format!(
                "ok: {} -> {} ({})",
                self.input.display(),
                destination.display(),
                count
            ),
            Outcome::Failed { message } => {
                let name = self
                    .input
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| self.input.display().to_string());
                format!("failed: {}: {}", name, message)
            }
        }
    }
}

/// Ordered record of one batch invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Root directory the batch wrote into.
    pub output_root: PathBuf,
    /// Entries in processing order.
    pub entries: Vec<BatchEntry>,
}

impl BatchReport {
    /// Entries that succeeded.
    pub fn succeeded(&self) -> impl Iterator<Item = &BatchEntry> {
        self.entries.iter().filter(|e| e.is_success())
    }

    /// Entries that failed.
    pub fn failed(&self) -> impl Iterator<Item = &BatchEntry> {
        self.entries.iter().filter(|e| !e.is_success())
    }

    /// Sum of the success counts.
    pub fn total_count(&self) -> usize {
        self.entries
            .iter()
            .map(|e| match e.outcome {
                Outcome::Succeeded { count, .. } => count,
                Outcome::Failed { .. } => 0,
            })
            .sum()
    }

    /// One status line per entry.
    pub fn status_lines(&self) -> Vec<String> {
        self.entries.iter().map(BatchEntry::status_line).collect()
    }

    /// Turn a report with failures into `Error::PartialBatchFailure`.
    pub fn into_result(self) -> Result<Self> {
        let failed = self.failed().count();
        if failed > 0 {
            return Err(Error::PartialBatchFailure {
                failed,
                total: self.entries.len(),
            });
        }
        Ok(self)
    }
}

/// Run `job` over `inputs`, isolating failures per file.
///
/// `on_entry` sees each entry as soon as it is recorded.
pub fn run_batch<J, F>(
    inputs: &[PathBuf],
    output_root: &Path,
    job: &J,
    mut on_entry: F,
) -> Result<BatchReport>
where
    J: BatchJob + ?Sized,
    F: FnMut(&BatchEntry),
{
    fs::create_dir_all(output_root).map_err(|e| Error::from_io(e, output_root))?;

    let mut entries = Vec::with_capacity(inputs.len());

    for input in inputs {
        log::info!("Processing {}", input.display());

        let outcome = match job.process(input, output_root) {
            Ok(output) => {
                log::info!("Written to {}", output.destination.display());
                Outcome::Succeeded {
                    destination: output.destination,
                    count: output.count,
                }
            }
            Err(e) => {
                log::warn!("Failed to process {}: {}", input.display(), e);
                Outcome::Failed {
                    message: e.to_string(),
                }
            }
        };

        let entry = BatchEntry {
            input: input.clone(),
            outcome,
        };
        on_entry(&entry);
        entries.push(entry);
    }

    Ok(BatchReport {
        output_root: output_root.to_path_buf(),
        entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct CopyJob {
        seen: RefCell<Vec<PathBuf>>,
    }

    impl BatchJob for CopyJob {
        fn process(&self, input: &Path, output_root: &Path) -> Result<JobOutput> {
            self.seen.borrow_mut().push(input.to_path_buf());
            let content = fs::read_to_string(input).map_err(|e| Error::from_io(e, input))?;
            if content.contains("corrupt") {
                return Err(Error::FormatError("bad container".to_string()));
            }
            let destination = output_root.join(input.file_name().unwrap());
            fs::write(&destination, content)?;
            Ok(JobOutput {
                destination,
                count: 1,
            })
        }
    }

    fn touch(path: &Path, content: &str) {
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_collect_inputs_shallow_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("b.pptx"), "");
        touch(&dir.path().join("a.PPTX"), "");
        touch(&dir.path().join("notes.txt"), "");
        fs::create_dir(dir.path().join("nested")).unwrap();
        touch(&dir.path().join("nested/c.pptx"), "");

        let selection = InputSelection::new([DocumentFormat::Pptx]);
        let files = collect_inputs(dir.path(), &selection).unwrap();

        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.PPTX", "b.pptx"]);
    }

    #[test]
    fn test_collect_inputs_recursive() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.pdf"), "");
        fs::create_dir_all(dir.path().join("x/y")).unwrap();
        touch(&dir.path().join("x/y/b.docx"), "");
        touch(&dir.path().join("x/skip.pptx"), "");

        let selection =
            InputSelection::new([DocumentFormat::Pdf, DocumentFormat::Docx]).with_recursive(true);
        let files = collect_inputs(dir.path(), &selection).unwrap();

        assert_eq!(files.len(), 2);
        assert!(files.iter().any(|p| p.ends_with("x/y/b.docx")));
    }

    #[test]
    fn test_collect_inputs_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let deck = dir.path().join("deck.pptx");
        let notes = dir.path().join("notes.txt");
        touch(&deck, "");
        touch(&notes, "");

        let selection = InputSelection::new([DocumentFormat::Pptx]);
        assert_eq!(collect_inputs(&deck, &selection).unwrap(), vec![deck]);
        assert!(matches!(
            collect_inputs(&notes, &selection),
            Err(Error::FormatError(_))
        ));
        assert!(matches!(
            collect_inputs(&dir.path().join("missing"), &selection),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_output_location_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let deck = dir.path().join("deck.pptx");
        touch(&deck, "");

        let sub = OutputLocation::Subfolder("output".to_string());
        assert_eq!(sub.resolve(dir.path()), dir.path().join("output"));
        assert_eq!(sub.resolve(&deck), dir.path().join("output"));

        let root = OutputLocation::Root(PathBuf::from("/srv/out"));
        assert_eq!(root.resolve(&deck), PathBuf::from("/srv/out"));
    }

    #[test]
    fn test_run_batch_isolates_failures() {
        let dir = tempfile::tempdir().unwrap();
        let inputs: Vec<PathBuf> = ["one.pptx", "two.pptx", "three.pptx"]
            .iter()
            .map(|n| dir.path().join(n))
            .collect();
        touch(&inputs[0], "first");
        touch(&inputs[1], "corrupt");
        touch(&inputs[2], "third");

        let job = CopyJob {
            seen: RefCell::new(Vec::new()),
        };
        let out = dir.path().join("out");
        let mut lines = Vec::new();
        let report = run_batch(&inputs, &out, &job, |e| lines.push(e.status_line())).unwrap();

        assert_eq!(*job.seen.borrow(), inputs);
        assert_eq!(report.succeeded().count(), 2);
        assert_eq!(report.failed().count(), 1);
        assert_eq!(report.total_count(), 2);
        assert_eq!(lines, report.status_lines());
        assert!(lines[1].starts_with("failed: two.pptx:"));
        assert_eq!(fs::read_to_string(out.join("three.pptx")).unwrap(), "third");
        assert!(!out.join("two.pptx").exists());

        match report.into_result() {
            Err(Error::PartialBatchFailure { failed, total }) => {
                assert_eq!((failed, total), (1, 3));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_run_batch_aborts_when_output_root_unusable() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        touch(&blocker, "");

        let job = CopyJob {
            seen: RefCell::new(Vec::new()),
        };
        let result = run_batch(&[dir.path().join("a.pptx")], &blocker.join("out"), &job, |_| {});

        assert!(result.is_err());
        assert!(job.seen.borrow().is_empty());
    }

    #[test]
    fn test_report_serializes_outcome_inline() {
        let entry = BatchEntry {
            input: PathBuf::from("a.pptx"),
            outcome: Outcome::Failed {
                message: "boom".to_string(),
            },
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["message"], "boom");
        assert_eq!(json["input"], "a.pptx");
    }
}

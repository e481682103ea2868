//! Image extraction job: one `images-{stem}` folder per input document.

use ppt_core::{
    BatchJob, ContainerKind, DocumentFormat, Error, JobOutput, LegacyConverter, Result,
};
use ppt_pdf::PdfImageExtractor;
use ppt_pptx::Package;
use std::cell::RefCell;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

/// Extracts every embedded image of a document into its own folder.
pub struct ImageExtractionJob<C> {
    converter: C,
    // Folders written so far in this batch.
    written: RefCell<HashSet<PathBuf>>,
}

impl<C: LegacyConverter> ImageExtractionJob<C> {
    pub fn new(converter: C) -> Self {
        Self {
            converter,
            written: RefCell::new(HashSet::new()),
        }
    }

    /// Record `folder` as written; false when an earlier input already used it.
    fn claim(&self, folder: &Path) -> bool {
        self.written.borrow_mut().insert(folder.to_path_buf())
    }

    /// Images of a package or PDF file, named for writing.
    fn images(&self, path: &Path, format: DocumentFormat) -> Result<Vec<(String, Vec<u8>)>> {
        match format.container() {
            ContainerKind::Zip => {
                let mut package = Package::open(path)?;
                Ok(ppt_pptx::extract_images(&mut package, format)?
                    .into_iter()
                    .map(|image| (image.file_name, image.data))
                    .collect())
            }
            ContainerKind::Pdf => Ok(PdfImageExtractor::open(path)?
                .extract()?
                .into_iter()
                .map(|image| (image.file_name(), image.data))
                .collect()),
            ContainerKind::Cfb => Err(Error::FormatError(format!(
                "{} must be converted before extraction",
                path.display()
            ))),
        }
    }
}

impl<C: LegacyConverter> BatchJob for ImageExtractionJob<C> {
    fn process(&self, input: &Path, output_root: &Path) -> Result<JobOutput> {
        let format = DocumentFormat::from_path(input).ok_or_else(|| {
            Error::FormatError(format!("{} has no supported extension", input.display()))
        })?;
        check_container(input, format)?;

        let images = if format.is_legacy() {
            let scratch = tempfile::tempdir()?;
            let converted = self.converter.convert(input, scratch.path())?;
            self.images(&converted, format.modern_equivalent())?
        } else {
            self.images(input, format)?
        };

        let destination = output_folder(input, output_root);
        if !self.claim(&destination) {
            log::warn!(
                "{}: {} is shared with an earlier input, same-named images are overwritten",
                input.display(),
                destination.display()
            );
        }
        fs::create_dir_all(&destination).map_err(|e| Error::from_io(e, &destination))?;
        for (file_name, data) in &images {
            let path = destination.join(file_name);
            fs::write(&path, data).map_err(|e| Error::from_io(e, &path))?;
        }

        log::info!("{}: {} image(s)", input.display(), images.len());
        Ok(JobOutput {
            destination,
            count: images.len(),
        })
    }
}

/// `images-{stem}` under the output root.
pub fn output_folder(input: &Path, output_root: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    output_root.join(format!("images-{}", stem))
}

/// Reject files whose magic bytes contradict their extension.
fn check_container(path: &Path, format: DocumentFormat) -> Result<()> {
    let mut file = File::open(path).map_err(|e| Error::from_io(e, path))?;
    let mut magic = Vec::with_capacity(8);
    file.by_ref()
        .take(8)
        .read_to_end(&mut magic)
        .map_err(|e| Error::from_io(e, path))?;

    match ContainerKind::from_magic(&magic) {
        Some(kind) if kind == format.container() => Ok(()),
        Some(ContainerKind::Cfb) if format.container() == ContainerKind::Zip => {
            Err(Error::FormatError(format!(
                "{} is an OLE compound file (encrypted or mislabelled {})",
                path.display(),
                format
            )))
        }
        _ => Err(Error::FormatError(format!(
            "{} is not a valid {} file",
            path.display(),
            format
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ppt_core::{run_batch, OfficeConverter};
    use std::io::{Cursor, Write};
    use zip::write::FileOptions;
    use zip::ZipWriter;

    const CFB_MAGIC: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

    fn docx_with_media() -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in [
            ("[Content_Types].xml", &b"<Types/>"[..]),
            ("word/document.xml", b"<w:document/>"),
            ("word/media/image1.png", b"png bytes"),
            ("word/media/image2.jpeg", b"jpeg bytes"),
        ] {
            zip.start_file(name, FileOptions::default()).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn test_output_folder_name() {
        assert_eq!(
            output_folder(Path::new("in/report.final.docx"), Path::new("out")),
            PathBuf::from("out/images-report.final")
        );
    }

    #[test]
    fn test_extracts_media_into_own_folder() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("letter.docx");
        fs::write(&input, docx_with_media()).unwrap();

        let job = ImageExtractionJob::new(OfficeConverter::default());
        let output = job.process(&input, &dir.path().join("out")).unwrap();

        assert_eq!(output.count, 2);
        assert_eq!(output.destination, dir.path().join("out/images-letter"));
        assert_eq!(
            fs::read(output.destination.join("image2.jpeg")).unwrap(),
            b"jpeg bytes"
        );
    }

    #[test]
    fn test_same_stem_inputs_share_a_folder() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a")).unwrap();
        fs::create_dir_all(dir.path().join("b")).unwrap();
        let first = dir.path().join("a/report.docx");
        let second = dir.path().join("b/report.docx");
        fs::write(&first, docx_with_media()).unwrap();
        fs::write(&second, docx_with_media()).unwrap();

        let job = ImageExtractionJob::new(OfficeConverter::default());
        let out = dir.path().join("out");
        let a = job.process(&first, &out).unwrap();
        let b = job.process(&second, &out).unwrap();

        assert_eq!(a.destination, b.destination);
        assert_eq!(job.written.borrow().len(), 1);
        assert!(!job.claim(&a.destination));
        assert!(job.claim(&out.join("images-other")));
    }

    #[test]
    fn test_container_mismatch_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let encrypted = dir.path().join("secret.pptx");
        fs::write(&encrypted, CFB_MAGIC).unwrap();
        let fake_pdf = dir.path().join("scan.pdf");
        fs::write(&fake_pdf, docx_with_media()).unwrap();

        let job = ImageExtractionJob::new(OfficeConverter::default());
        for input in [&encrypted, &fake_pdf] {
            assert!(matches!(
                job.process(input, dir.path()),
                Err(Error::FormatError(_))
            ));
        }
    }

    #[test]
    fn test_batch_records_failed_conversion() {
        let dir = tempfile::tempdir().unwrap();
        let legacy = dir.path().join("old.ppt");
        fs::write(&legacy, CFB_MAGIC).unwrap();
        let docx = dir.path().join("new.docx");
        fs::write(&docx, docx_with_media()).unwrap();

        let job = ImageExtractionJob::new(OfficeConverter::new("definitely-not-an-office-suite-binary"));
        let report = run_batch(
            &[legacy.clone(), docx.clone()],
            &dir.path().join("out"),
            &job,
            |_| {},
        )
        .unwrap();

        assert!(!report.entries[0].is_success());
        assert!(report.entries[1].is_success());
        assert_eq!(report.total_count(), 2);
        assert!(!dir.path().join("out/images-old").exists());
    }
}

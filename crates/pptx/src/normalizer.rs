//! The interface shared by both normalizers, applied to whole packages.

use crate::markup::MarkupNormalizer;
use crate::package::Package;
use crate::presentation::{PresentationStructure, PRESENTATION_PART};
use crate::tree::TreeNormalizer;
use crate::xml::XmlDocument;
use ppt_core::{BatchJob, Error, JobOutput, Result};
use std::io::{Read, Seek};
use std::path::Path;

/// Which parts of a presentation a normalizer rewrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coverage {
    /// Every slide, slide layout and slide master.
    SlidesLayoutsMasters,
    /// Every `ppt/slides/*.xml` and `ppt/slideMasters/*.xml` part.
    SlidesAndMasters,
}

/// Rewrites the markup of one presentation part.
pub trait PartNormalizer {
    fn coverage(&self) -> Coverage;

    /// Normalize one part; `Ok(None)` leaves the part untouched.
    fn normalize_part(&self, part: &str, xml: &str) -> Result<Option<String>>;
}

impl PartNormalizer for TreeNormalizer {
    fn coverage(&self) -> Coverage {
        Coverage::SlidesLayoutsMasters
    }

    fn normalize_part(&self, part: &str, xml: &str) -> Result<Option<String>> {
        let mut document = XmlDocument::parse(xml)
            .map_err(|e| Error::FormatError(format!("{} is not well-formed: {}", part, e)))?;

        let stats = self.normalize_tree(&mut document.root);
        if stats.paragraphs == 0 {
            return Ok(None);
        }

        log::debug!(
            "{}: {} paragraphs ({} blank), {} runs scaled",
            part,
            stats.paragraphs,
            stats.blank_paragraphs,
            stats.scaled_runs
        );
        document.to_xml().map(Some)
    }
}

impl PartNormalizer for MarkupNormalizer {
    fn coverage(&self) -> Coverage {
        Coverage::SlidesAndMasters
    }

    fn normalize_part(&self, part: &str, xml: &str) -> Result<Option<String>> {
        self.normalize(part, xml)
    }
}

/// Part names a coverage selects, in processing order.
pub fn covered_parts<R: Read + Seek>(
    package: &mut Package<R>,
    coverage: Coverage,
) -> Result<Vec<String>> {
    match coverage {
        Coverage::SlidesLayoutsMasters => {
            let structure = PresentationStructure::read(package)?;
            Ok(structure.all_parts().map(str::to_string).collect())
        }
        Coverage::SlidesAndMasters => {
            if !package.contains(PRESENTATION_PART) {
                return Err(Error::FormatError(format!(
                    "{} is not a presentation (no {})",
                    package.label(),
                    PRESENTATION_PART
                )));
            }
            Ok(package
                .part_names()
                .iter()
                .filter(|name| {
                    is_markup_part(name, "ppt/slides/") || is_markup_part(name, "ppt/slideMasters/")
                })
                .cloned()
                .collect())
        }
    }
}

fn is_markup_part(name: &str, dir: &str) -> bool {
    name.strip_prefix(dir)
        .is_some_and(|file| !file.contains('/') && file.ends_with(".xml"))
}

/// Apply a normalizer to every covered part. Returns the number of parts changed.
pub fn normalize_package<R, N>(package: &mut Package<R>, normalizer: &N) -> Result<usize>
where
    R: Read + Seek,
    N: PartNormalizer + ?Sized,
{
    let mut changed = 0;

    for part in covered_parts(package, normalizer.coverage())? {
        let xml = package.read_part_string(&part)?;
        if let Some(normalized) = normalizer.normalize_part(&part, &xml)? {
            package.set_part(&part, normalized)?;
            changed += 1;
        }
    }

    log::debug!("{}: {} part(s) normalized", package.label(), changed);
    Ok(changed)
}

/// Batch job writing a normalized copy of each presentation under the output root.
#[derive(Debug, Clone)]
pub struct NormalizeJob<N> {
    normalizer: N,
}

impl<N: PartNormalizer> NormalizeJob<N> {
    pub fn new(normalizer: N) -> Self {
        Self { normalizer }
    }
}

impl<N: PartNormalizer> BatchJob for NormalizeJob<N> {
    fn process(&self, input: &Path, output_root: &Path) -> Result<JobOutput> {
        let file_name = input.file_name().ok_or_else(|| {
            Error::InvalidArgument(format!("{} has no file name", input.display()))
        })?;

        let mut package = Package::open(input)?;
        let count = normalize_package(&mut package, &self.normalizer)?;

        let destination = output_root.join(file_name);
        package.save(&destination)?;

        Ok(JobOutput { destination, count })
    }
}

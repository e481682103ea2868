//! Embedded image extraction from OOXML packages.

use crate::package::Package;
use crate::presentation::{PresentationStructure, Relationships};
use crate::xml::{Element, XmlDocument};
use ppt_core::{DocumentFormat, Error, Result};
use std::io::{Read, Seek};

/// An image pulled out of a document, with the file name it should be written under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedImage {
    pub file_name: String,
    pub data: Vec<u8>,
}

/// Extract the images of a package-based document.
pub fn extract_images<R: Read + Seek>(
    package: &mut Package<R>,
    format: DocumentFormat,
) -> Result<Vec<ExtractedImage>> {
    match format {
        DocumentFormat::Pptx => presentation_images(package),
        DocumentFormat::Docx => media_images(package, "word/media/"),
        DocumentFormat::Xlsx => media_images(package, "xl/media/"),
        other => Err(Error::InvalidArgument(format!(
            "{} documents are not ZIP packages",
            other
        ))),
    }
}

/// Pictures of every slide in presentation order, named `slide_{n}_image_{k}`.
///
/// `k` counts across the whole presentation, so names stay unique when several
/// slides reuse the same media part.
pub fn presentation_images<R: Read + Seek>(package: &mut Package<R>) -> Result<Vec<ExtractedImage>> {
    let structure = PresentationStructure::read(package)?;
    let mut images = Vec::new();

    for (index, slide) in structure.slides.iter().enumerate() {
        let slide_number = index + 1;
        let xml = package.read_part_string(slide)?;
        let document = XmlDocument::parse(&xml)
            .map_err(|e| Error::FormatError(format!("{} is not well-formed: {}", slide, e)))?;
        let rels = Relationships::read(package, slide)?;

        for embed in picture_embeds(&document.root) {
            let target = match rels.get(&embed) {
                Some(rel) if rel.external => {
                    log::warn!("{}: skipping linked picture {}", slide, rel.target);
                    continue;
                }
                Some(rel) if package.contains(&rel.target) => rel.target.clone(),
                _ => {
                    log::warn!("{}: picture relationship {} does not resolve", slide, embed);
                    continue;
                }
            };

            let data = package.read_part(&target)?;
            let file_name = format!(
                "slide_{}_image_{}.{}",
                slide_number,
                images.len() + 1,
                image_extension(&target)
            );
            log::debug!("{} -> {}", target, file_name);
            images.push(ExtractedImage { file_name, data });
        }
    }

    Ok(images)
}

/// Relationship ids of every picture's blip, in document order, groups included.
fn picture_embeds(root: &Element) -> Vec<String> {
    let mut embeds = Vec::new();
    root.walk(&mut |element| {
        if element.local_name() == "pic" {
            if let Some(embed) = element
                .descend(&["blipFill", "blip"])
                .and_then(|blip| blip.attr("embed"))
            {
                embeds.push(embed.to_string());
            }
        }
    });
    embeds
}

/// Every part under a media folder, keeping its own file name.
fn media_images<R: Read + Seek>(package: &mut Package<R>, folder: &str) -> Result<Vec<ExtractedImage>> {
    let names: Vec<String> = package
        .part_names()
        .iter()
        .filter(|name| name.starts_with(folder) && !name.ends_with('/'))
        .cloned()
        .collect();

    let mut images = Vec::with_capacity(names.len());
    for name in names {
        let data = package.read_part(&name)?;
        let file_name = name.rsplit('/').next().unwrap_or(&name).to_string();
        images.push(ExtractedImage { file_name, data });
    }

    Ok(images)
}

/// File extension for a media part name.
pub fn image_extension(part_name: &str) -> String {
    let file = part_name.rsplit('/').next().unwrap_or(part_name);
    match file.rsplit_once('.') {
        Some((_, ext)) if ext.eq_ignore_ascii_case("jpeg") => "jpg".to_string(),
        Some((_, ext)) if !ext.is_empty() => ext.to_ascii_lowercase(),
        _ => "bin".to_string(),
    }
}

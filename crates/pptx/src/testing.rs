//! In-memory package fixtures shared by the unit tests.

use std::io::{Cursor, Write};
use zip::write::FileOptions;
use zip::ZipWriter;

const NS: &str = r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#;
const REL_TYPE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

pub(crate) const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/></Types>"#;

/// Build an in-memory ZIP from `(name, content)` pairs.
pub(crate) fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        zip.start_file(*name, FileOptions::default()).unwrap();
        zip.write_all(content).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// Relationship part markup from `(id, type suffix, target)` triples.
pub(crate) fn rels_xml(entries: &[(&str, &str, &str)]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );
    for (id, kind, target) in entries {
        xml.push_str(&format!(
            r#"<Relationship Id="{}" Type="{}/{}" Target="{}"/>"#,
            id, REL_TYPE, kind, target
        ));
    }
    xml.push_str("</Relationships>");
    xml
}

/// A text shape holding the given paragraph markup.
pub(crate) fn text_shape(paragraphs: &str) -> String {
    format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="2" name="Text"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr><p:spPr/><p:txBody><a:bodyPr/><a:lstStyle/>{}</p:txBody></p:sp>"#,
        paragraphs
    )
}

/// A picture shape embedding relationship `rid`.
pub(crate) fn picture(rid: &str) -> String {
    format!(
        r#"<p:pic><p:nvPicPr><p:cNvPr id="3" name="Picture"/><p:cNvPicPr/><p:nvPr/></p:nvPicPr><p:blipFill><a:blip r:embed="{}"/><a:stretch><a:fillRect/></a:stretch></p:blipFill><p:spPr/></p:pic>"#,
        rid
    )
}

/// A group shape around `shapes`.
pub(crate) fn group(shapes: &str) -> String {
    format!(r#"<p:grpSp><p:nvGrpSpPr/><p:grpSpPr/>{}</p:grpSp>"#, shapes)
}

fn part(root: &str, shapes: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:{root} {NS}><p:cSld><p:spTree><p:nvGrpSpPr/><p:grpSpPr/>{shapes}</p:spTree></p:cSld></p:{root}>"#
    )
}

/// Builder for a small presentation with one master and one layout.
#[derive(Default)]
pub(crate) struct Deck {
    slides: Vec<(String, Vec<(String, String, String)>)>,
    layout: String,
    master: String,
    media: Vec<(String, Vec<u8>)>,
}

impl Deck {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn slide(self, shapes: &str) -> Self {
        self.slide_with_rels(shapes, &[])
    }

    /// Add a slide whose extra relationships are `(id, type suffix, target)`.
    pub(crate) fn slide_with_rels(mut self, shapes: &str, rels: &[(&str, &str, &str)]) -> Self {
        let rels = rels
            .iter()
            .map(|(id, kind, target)| (id.to_string(), kind.to_string(), target.to_string()))
            .collect();
        self.slides.push((shapes.to_string(), rels));
        self
    }

    pub(crate) fn layout(mut self, shapes: &str) -> Self {
        self.layout = shapes.to_string();
        self
    }

    pub(crate) fn master(mut self, shapes: &str) -> Self {
        self.master = shapes.to_string();
        self
    }

    pub(crate) fn media(mut self, name: &str, bytes: &[u8]) -> Self {
        self.media.push((format!("ppt/media/{}", name), bytes.to_vec()));
        self
    }

    pub(crate) fn build(&self) -> Vec<u8> {
        let mut entries: Vec<(String, Vec<u8>)> = Vec::new();
        entries.push(("[Content_Types].xml".to_string(), CONTENT_TYPES.as_bytes().to_vec()));

        let mut slide_ids = String::new();
        let mut pres_rels = vec![(
            "rId1".to_string(),
            "slideMaster".to_string(),
            "slideMasters/slideMaster1.xml".to_string(),
        )];
        for n in 1..=self.slides.len() {
            slide_ids.push_str(&format!(r#"<p:sldId id="{}" r:id="rId{}"/>"#, 255 + n, n + 1));
            pres_rels.push((format!("rId{}", n + 1), "slide".to_string(), format!("slides/slide{}.xml", n)));
        }
        let presentation = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:presentation {NS}><p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst><p:sldIdLst>{slide_ids}</p:sldIdLst></p:presentation>"#
        );
        entries.push(("ppt/presentation.xml".to_string(), presentation.into_bytes()));
        entries.push(("ppt/_rels/presentation.xml.rels".to_string(), owned_rels(&pres_rels).into_bytes()));

        for (i, (shapes, rels)) in self.slides.iter().enumerate() {
            let n = i + 1;
            let mut all = vec![(
                "rIdLayout".to_string(),
                "slideLayout".to_string(),
                "../slideLayouts/slideLayout1.xml".to_string(),
            )];
            all.extend(rels.iter().cloned());
            entries.push((format!("ppt/slides/slide{}.xml", n), part("sld", shapes).into_bytes()));
            entries.push((format!("ppt/slides/_rels/slide{}.xml.rels", n), owned_rels(&all).into_bytes()));
        }

        entries.push((
            "ppt/slideLayouts/slideLayout1.xml".to_string(),
            part("sldLayout", &self.layout).into_bytes(),
        ));
        entries.push((
            "ppt/slideLayouts/_rels/slideLayout1.xml.rels".to_string(),
            rels_xml(&[("rId1", "slideMaster", "../slideMasters/slideMaster1.xml")]).into_bytes(),
        ));
        entries.push((
            "ppt/slideMasters/slideMaster1.xml".to_string(),
            part("sldMaster", &self.master).into_bytes(),
        ));
        entries.push((
            "ppt/slideMasters/_rels/slideMaster1.xml.rels".to_string(),
            rels_xml(&[("rId1", "slideLayout", "../slideLayouts/slideLayout1.xml")]).into_bytes(),
        ));
        entries.extend(self.media.iter().cloned());

        let borrowed: Vec<(&str, &[u8])> = entries
            .iter()
            .map(|(name, bytes)| (name.as_str(), bytes.as_slice()))
            .collect();
        zip_bytes(&borrowed)
    }
}

fn owned_rels(entries: &[(String, String, String)]) -> String {
    let borrowed: Vec<(&str, &str, &str)> = entries
        .iter()
        .map(|(a, b, c)| (a.as_str(), b.as_str(), c.as_str()))
        .collect();
    rels_xml(&borrowed)
}

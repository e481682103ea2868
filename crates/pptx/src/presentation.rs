//! Presentation structure: ordered slide, master and layout parts.

use crate::package::Package;
use crate::xml::local_name;
use ppt_core::{Error, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;
use std::io::{Read, Seek};

pub(crate) const PRESENTATION_PART: &str = "ppt/presentation.xml";

const SLIDES_DIR: &str = "ppt/slides/";
const MASTERS_DIR: &str = "ppt/slideMasters/";
const LAYOUTS_DIR: &str = "ppt/slideLayouts/";

#[derive(Debug, Deserialize)]
struct RelationshipsXml {
    #[serde(rename = "Relationship", default)]
    relationships: Vec<RelationshipXml>,
}

#[derive(Debug, Deserialize)]
struct RelationshipXml {
    #[serde(rename = "@Id")]
    id: String,
    #[serde(rename = "@Type")]
    rel_type: String,
    #[serde(rename = "@Target")]
    target: String,
    #[serde(rename = "@TargetMode", default)]
    target_mode: Option<String>,
}

/// A relationship resolved against its source part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    /// Last segment of the relationship type URI, e.g. `slide` or `image`.
    pub kind: String,
    /// Absolute part name for internal targets, the raw target otherwise.
    pub target: String,
    pub external: bool,
}

/// The relationships of one part.
#[derive(Debug, Clone, Default)]
pub struct Relationships {
    items: Vec<Relationship>,
}

impl Relationships {
    /// Parse relationship markup belonging to `source_part`.
    pub fn parse(xml: &str, source_part: &str) -> Result<Self> {
        let parsed: RelationshipsXml = quick_xml::de::from_str(xml).map_err(|e| {
            Error::XmlError(format!("Error parsing relationships of {}: {}", source_part, e))
        })?;

        let items = parsed
            .relationships
            .into_iter()
            .map(|rel| {
                let external = rel
                    .target_mode
                    .as_deref()
                    .is_some_and(|m| m.eq_ignore_ascii_case("External"));
                let target = if external {
                    rel.target
                } else {
                    resolve_target(source_part, &rel.target)
                };
                Relationship {
                    id: rel.id,
                    kind: rel.rel_type.rsplit('/').next().unwrap_or_default().to_string(),
                    target,
                    external,
                }
            })
            .collect();

        Ok(Self { items })
    }

    /// Read the relationships of `source_part`; a part without any is empty.
    pub fn read<R: Read + Seek>(package: &mut Package<R>, source_part: &str) -> Result<Self> {
        let rels_part = rels_path_for(source_part);
        if !package.contains(&rels_part) {
            return Ok(Self::default());
        }
        let xml = package.read_part_string(&rels_part)?;
        Self::parse(&xml, source_part)
    }

    /// Look up a relationship by id.
    pub fn get(&self, id: &str) -> Option<&Relationship> {
        self.items.iter().find(|r| r.id == id)
    }

    /// Relationships of one kind, in declaration order.
    pub fn of_kind<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a Relationship> + 'a {
        self.items.iter().filter(move |r| r.kind == kind)
    }
}

/// Ordered part names of a presentation's slides, masters and layouts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresentationStructure {
    pub slides: Vec<String>,
    pub masters: Vec<String>,
    pub layouts: Vec<String>,
}

impl PresentationStructure {
    /// Resolve the structure of a presentation package.
    pub fn read<R: Read + Seek>(package: &mut Package<R>) -> Result<Self> {
        if !package.contains(PRESENTATION_PART) {
            return Err(Error::FormatError(format!(
                "{} is not a presentation (no {})",
                package.label(),
                PRESENTATION_PART
            )));
        }

        let xml = package.read_part_string(PRESENTATION_PART)?;
        let ids = read_id_lists(&xml)?;
        let rels = Relationships::read(package, PRESENTATION_PART)?;

        let mut slides = resolve_ids(&ids.slides, &rels, "slide");
        if slides.is_empty() {
            // No sldIdLst: fall back to the relationship order.
            slides = ordered_targets(rels.of_kind("slide"));
        }
        let mut masters = resolve_ids(&ids.masters, &rels, "slideMaster");
        if masters.is_empty() {
            masters = ordered_targets(rels.of_kind("slideMaster"));
        }

        let mut layouts = Vec::new();
        for master in &masters {
            let master_rels = Relationships::read(package, master)?;
            for layout in ordered_targets(master_rels.of_kind("slideLayout")) {
                if !layouts.contains(&layout) {
                    layouts.push(layout);
                }
            }
        }

        let mut structure = Self {
            slides,
            masters,
            layouts,
        };
        structure.retain_existing(package);
        structure.append_unreferenced(package.part_names());

        log::debug!(
            "{}: {} slides, {} masters, {} layouts",
            package.label(),
            structure.slides.len(),
            structure.masters.len(),
            structure.layouts.len()
        );

        Ok(structure)
    }

    /// Slides, then layouts, then masters.
    pub fn all_parts(&self) -> impl Iterator<Item = &str> {
        self.slides
            .iter()
            .chain(&self.layouts)
            .chain(&self.masters)
            .map(String::as_str)
    }

    fn retain_existing<R: Read + Seek>(&mut self, package: &Package<R>) {
        for list in [&mut self.slides, &mut self.masters, &mut self.layouts] {
            list.retain(|part| {
                let exists = package.contains(part);
                if !exists {
                    log::warn!("Skipping dangling reference to {}", part);
                }
                exists
            });
        }
    }

    fn append_unreferenced(&mut self, part_names: &[String]) {
        for (dir, list) in [
            (SLIDES_DIR, &mut self.slides),
            (MASTERS_DIR, &mut self.masters),
            (LAYOUTS_DIR, &mut self.layouts),
        ] {
            let mut extra: Vec<String> = part_names
                .iter()
                .filter(|name| is_direct_xml_child(name, dir) && !list.contains(name))
                .cloned()
                .collect();
            extra.sort_by_key(|name| (extract_slide_number(name), name.clone()));
            list.extend(extra);
        }
    }
}

#[derive(Debug, Default)]
struct IdLists {
    slides: Vec<String>,
    masters: Vec<String>,
}

/// Collect the relationship ids of `sldIdLst` and `sldMasterIdLst`, in order.
fn read_id_lists(xml: &str) -> Result<IdLists> {
    let mut lists = IdLists::default();
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) => {
                let name = e.name();
                let target = match local_name(&String::from_utf8_lossy(name.as_ref())) {
                    "sldId" => &mut lists.slides,
                    "sldMasterId" => &mut lists.masters,
                    _ => continue,
                };

                for attr in e.attributes().flatten() {
                    let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
                    // The unprefixed `id` is the numeric slide id.
                    if key.contains(':') && local_name(&key) == "id" {
                        target.push(String::from_utf8_lossy(&attr.value).to_string());
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::XmlError(format!(
                    "Error parsing {}: {}",
                    PRESENTATION_PART, e
                )));
            }
            _ => {}
        }
    }

    Ok(lists)
}

fn resolve_ids(ids: &[String], rels: &Relationships, kind: &str) -> Vec<String> {
    ids.iter()
        .filter_map(|id| match rels.get(id) {
            Some(rel) if rel.kind == kind && !rel.external => Some(rel.target.clone()),
            _ => {
                log::warn!("Relationship {} does not resolve to a {} part", id, kind);
                None
            }
        })
        .collect()
}

/// Targets sorted by the number in their part name, as slide rels carry no order.
fn ordered_targets<'a>(rels: impl Iterator<Item = &'a Relationship>) -> Vec<String> {
    let mut targets: Vec<(String, Option<usize>)> = rels
        .filter(|r| !r.external)
        .map(|r| (r.target.clone(), extract_slide_number(&r.target)))
        .collect();

    targets.sort_by(|a, b| match (a.1, b.1) {
        (Some(na), Some(nb)) => na.cmp(&nb),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.0.cmp(&b.0),
    });

    targets.into_iter().map(|(path, _)| path).collect()
}

fn is_direct_xml_child(name: &str, dir: &str) -> bool {
    name.strip_prefix(dir)
        .is_some_and(|rest| !rest.contains('/') && rest.ends_with(".xml"))
}

/// Relationship part name for a part: `a/b/c.xml` → `a/b/_rels/c.xml.rels`.
pub fn rels_path_for(part: &str) -> String {
    match part.rfind('/') {
        Some(pos) => format!("{}/_rels/{}.rels", &part[..pos], &part[pos + 1..]),
        None => format!("_rels/{}.rels", part),
    }
}

/// Resolve a relationship target against the directory of its source part.
pub fn resolve_target(source_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut segments: Vec<&str> = match source_part.rfind('/') {
        Some(pos) => source_part[..pos].split('/').collect(),
        None => Vec::new(),
    };

    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    segments.join("/")
}

/// Extract a trailing number from a string like "rId2" or "slide3.xml".
pub(crate) fn extract_slide_number(s: &str) -> Option<usize> {
    let s = s.trim_end_matches(".rels").trim_end_matches(".xml");

    let digits: String = s.chars().rev().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let digits: String = digits.chars().rev().collect();
    digits.parse().ok()
}

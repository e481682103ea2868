//! Document-tree normalization of slides, layouts and masters.
//!
//! Changes are made through the parsed element tree and the typed shape
//! views, so the result is always re-serialized from a well-formed tree.

use crate::shapes::{self, Paragraph, Shape, TextBody};
use crate::xml::Element;
use ppt_core::{Result, TypographySettings};
use std::ops::AddAssign;

/// Font size given to a blank paragraph of a free text frame, in points.
pub const TEXT_FRAME_DEFAULT_SIZE: f64 = 10.0;

/// Font size given to a blank paragraph of a table cell, in points.
pub const TABLE_CELL_DEFAULT_SIZE: f64 = 18.0;

/// Counts of what a normalization pass touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeStats {
    pub text_shapes: usize,
    pub tables: usize,
    pub groups: usize,
    pub paragraphs: usize,
    pub blank_paragraphs: usize,
    pub scaled_runs: usize,
}

impl AddAssign for NormalizeStats {
    fn add_assign(&mut self, other: Self) {
        self.text_shapes += other.text_shapes;
        self.tables += other.tables;
        self.groups += other.groups;
        self.paragraphs += other.paragraphs;
        self.blank_paragraphs += other.blank_paragraphs;
        self.scaled_runs += other.scaled_runs;
    }
}

/// Applies typography settings to every text body of a shape tree.
#[derive(Debug, Clone)]
pub struct TreeNormalizer {
    settings: TypographySettings,
}

impl TreeNormalizer {
    /// Create a normalizer; rejects non-finite or non-positive factors.
    pub fn new(settings: TypographySettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self { settings })
    }

    pub fn settings(&self) -> &TypographySettings {
        &self.settings
    }

    /// Normalize the shape tree under a slide, layout or master root element.
    pub fn normalize_tree(&self, root: &mut Element) -> NormalizeStats {
        let mut stats = NormalizeStats::default();
        if let Some(tree) = shapes::shape_tree_mut(root) {
            self.visit_shapes(tree, &mut stats);
        }
        stats
    }

    fn visit_shapes(&self, container: &mut Element, stats: &mut NormalizeStats) {
        for child in container.elements_mut() {
            match Shape::classify(child) {
                Shape::Text(shape) => {
                    stats.text_shapes += 1;
                    if let Some(body) = shapes::text_body(shape) {
                        self.normalize_body(body, TEXT_FRAME_DEFAULT_SIZE, stats);
                    }
                }
                Shape::Table(frame) => {
                    stats.tables += 1;
                    for body in shapes::table_cells(frame) {
                        self.normalize_body(body, TABLE_CELL_DEFAULT_SIZE, stats);
                    }
                }
                Shape::Group(group) => {
                    stats.groups += 1;
                    self.visit_shapes(group, stats);
                }
                Shape::Other(_) => {}
            }
        }
    }

    fn normalize_body(&self, mut body: TextBody<'_>, default_size: f64, stats: &mut NormalizeStats) {
        for mut paragraph in body.paragraphs() {
            stats.paragraphs += 1;
            self.normalize_paragraph(&mut paragraph, default_size, stats);
        }
    }

    fn normalize_paragraph(
        &self,
        paragraph: &mut Paragraph<'_>,
        default_size: f64,
        stats: &mut NormalizeStats,
    ) {
        let scale = self.settings.font_scale;

        if paragraph.is_blank() {
            // The synthesized run already carries the scaled size.
            let size = scale_size(default_size * 100.0, scale);
            paragraph.replace_with_space_run(Some(size));
            stats.blank_paragraphs += 1;
        } else {
            for mut run in paragraph.runs() {
                if let Some(size) = run.font_size() {
                    run.set_font_size(scale_size(f64::from(size), scale));
                    stats.scaled_runs += 1;
                }
            }
        }

        if self.settings.apply_spacing {
            for mut run in paragraph.runs() {
                run.set_character_spacing(self.settings.character_spacing);
            }
            paragraph.set_line_spacing(self.settings.line_spacing);
            paragraph.set_space_before(0.0);
            paragraph.set_space_after(0.0);
        }
    }
}

/// Scale a size in hundredths of a point, rounding and clamping to the valid range.
fn scale_size(size: f64, scale: f64) -> u32 {
    (size * scale)
        .round()
        .clamp(f64::from(shapes::MIN_FONT_SIZE), f64::from(shapes::MAX_FONT_SIZE)) as u32
}

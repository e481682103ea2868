//! Typed views over the DrawingML shape tree.
//!
//! [`Shape`] is a closed set of shape kinds; code that walks a shape tree
//! matches it exhaustively. Text bodies, paragraphs and runs are thin mutable
//! wrappers over the underlying [`Element`]s.

use crate::xml::Element;

/// Smallest and largest run font size DrawingML accepts, in hundredths of a point.
pub const MIN_FONT_SIZE: u32 = 100;
pub const MAX_FONT_SIZE: u32 = 400_000;

/// Children of `a:pPr` that must precede every other property, in order.
const SPACING_ORDER: [&str; 3] = ["lnSpc", "spcBef", "spcAft"];

/// Shape kinds found in a shape tree.
#[derive(Debug)]
pub enum Shape<'a> {
    /// A shape with a text body (`p:sp` holding `p:txBody`).
    Text(&'a mut Element),
    /// A graphic frame holding a table.
    Table(&'a mut Element),
    /// A group shape with nested shapes.
    Group(&'a mut Element),
    /// Pictures, connectors, charts and everything else.
    Other(&'a mut Element),
}

/// Kind of a shape element, determined without borrowing it mutably.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Text,
    Table,
    Group,
    Other,
}

impl ShapeKind {
    pub fn of(element: &Element) -> Self {
        match element.local_name() {
            "sp" if element.has_child("txBody") => Self::Text,
            "graphicFrame" if element.descend(&["graphic", "graphicData", "tbl"]).is_some() => {
                Self::Table
            }
            "grpSp" => Self::Group,
            _ => Self::Other,
        }
    }
}

impl<'a> Shape<'a> {
    /// Classify a child of a shape tree or group.
    pub fn classify(element: &'a mut Element) -> Self {
        match ShapeKind::of(element) {
            ShapeKind::Text => Self::Text(element),
            ShapeKind::Table => Self::Table(element),
            ShapeKind::Group => Self::Group(element),
            ShapeKind::Other => Self::Other(element),
        }
    }

    pub fn kind(&self) -> ShapeKind {
        match self {
            Self::Text(_) => ShapeKind::Text,
            Self::Table(_) => ShapeKind::Table,
            Self::Group(_) => ShapeKind::Group,
            Self::Other(_) => ShapeKind::Other,
        }
    }
}

/// The shape tree (`p:cSld/p:spTree`) of a slide, layout or master root.
pub fn shape_tree_mut(root: &mut Element) -> Option<&mut Element> {
    root.descend_mut(&["cSld", "spTree"])
}

/// The text body of a text shape.
pub fn text_body(shape: &mut Element) -> Option<TextBody<'_>> {
    shape.child_mut("txBody").map(TextBody)
}

/// Text bodies of every cell of a table graphic frame, row by row.
pub fn table_cells(frame: &mut Element) -> Vec<TextBody<'_>> {
    let Some(table) = frame.descend_mut(&["graphic", "graphicData", "tbl"]) else {
        return Vec::new();
    };
    table
        .elements_named_mut("tr")
        .flat_map(|row| row.elements_named_mut("tc"))
        .filter_map(|cell| cell.child_mut("txBody"))
        .map(TextBody)
        .collect()
}

/// A text body (`p:txBody` or `a:txBody`).
#[derive(Debug)]
pub struct TextBody<'a>(&'a mut Element);

impl<'a> TextBody<'a> {
    pub fn paragraphs(&mut self) -> impl Iterator<Item = Paragraph<'_>> {
        self.0.elements_named_mut("p").map(Paragraph)
    }
}

/// A paragraph (`a:p`).
#[derive(Debug)]
pub struct Paragraph<'a>(&'a mut Element);

impl<'a> Paragraph<'a> {
    pub fn new(element: &'a mut Element) -> Self {
        Self(element)
    }

    /// Whether the paragraph holds no visible text. Line breaks count as whitespace.
    pub fn is_blank(&self) -> bool {
        self.0
            .elements()
            .filter(|e| matches!(e.local_name(), "r" | "fld"))
            .all(|e| e.text().trim().is_empty())
    }

    pub fn runs(&mut self) -> impl Iterator<Item = Run<'_>> {
        self.0.elements_named_mut("r").map(Run)
    }

    /// Drop runs, breaks and fields and put a single space run in their place.
    pub fn replace_with_space_run(&mut self, font_size: Option<u32>) {
        self.0.remove_children(&["r", "br", "fld"]);

        let mut properties = Element::new(self.0.qualified("rPr"));
        if let Some(size) = font_size {
            properties.set_attr("sz", clamp_font_size(size).to_string());
        }
        let run = Element::new(self.0.qualified("r"))
            .with_child(properties)
            .with_child(Element::new(self.0.qualified("t")).with_text(" "));

        self.0.insert_before(run, "endParaRPr");
    }

    /// Line spacing as a multiple of single spacing, if set as a percentage.
    pub fn line_spacing(&self) -> Option<f64> {
        self.0
            .descend(&["pPr", "lnSpc", "spcPct"])
            .and_then(|e| e.attr("val"))
            .and_then(|v| v.parse::<f64>().ok())
            .map(|v| v / 100_000.0)
    }

    pub fn set_line_spacing(&mut self, multiple: f64) {
        let ppr = self.0.first_child_or_insert("pPr");
        let value = (multiple * 100_000.0).round() as i64;
        let spacing = Element::new(ppr.qualified("lnSpc"))
            .with_child(Element::new(ppr.qualified("spcPct")).with_attr("val", value.to_string()));
        ppr.upsert_child(spacing, &[]);
    }

    /// Space before the paragraph in points, if set in points.
    pub fn space_before(&self) -> Option<f64> {
        self.spacing_points("spcBef")
    }

    pub fn set_space_before(&mut self, points: f64) {
        self.set_spacing_points("spcBef", points);
    }

    /// Space after the paragraph in points, if set in points.
    pub fn space_after(&self) -> Option<f64> {
        self.spacing_points("spcAft")
    }

    pub fn set_space_after(&mut self, points: f64) {
        self.set_spacing_points("spcAft", points);
    }

    fn spacing_points(&self, local: &str) -> Option<f64> {
        self.0
            .descend(&["pPr", local, "spcPts"])
            .and_then(|e| e.attr("val"))
            .and_then(|v| v.parse::<f64>().ok())
            .map(|v| v / 100.0)
    }

    fn set_spacing_points(&mut self, local: &str, points: f64) {
        let ppr = self.0.first_child_or_insert("pPr");
        let value = (points * 100.0).round() as i64;
        let spacing = Element::new(ppr.qualified(local))
            .with_child(Element::new(ppr.qualified("spcPts")).with_attr("val", value.to_string()));
        let position = SPACING_ORDER.iter().position(|n| *n == local).unwrap_or(0);
        ppr.upsert_child(spacing, &SPACING_ORDER[..position]);
    }
}

/// A text run (`a:r`).
#[derive(Debug)]
pub struct Run<'a>(&'a mut Element);

impl<'a> Run<'a> {
    pub fn text(&self) -> String {
        self.0.child("t").map(Element::text).unwrap_or_default()
    }

    /// Explicit font size in hundredths of a point.
    pub fn font_size(&self) -> Option<u32> {
        self.0.child("rPr")?.attr("sz")?.parse().ok()
    }

    /// Set the font size, clamped to the range DrawingML accepts.
    pub fn set_font_size(&mut self, size: u32) {
        self.0
            .first_child_or_insert("rPr")
            .set_attr("sz", clamp_font_size(size).to_string());
    }

    /// Explicit character spacing in hundredths of a point.
    pub fn character_spacing(&self) -> Option<i32> {
        self.0.child("rPr")?.attr("spc")?.parse().ok()
    }

    /// Set character spacing; zero removes the explicit value.
    pub fn set_character_spacing(&mut self, spacing: i32) {
        if spacing == 0 {
            if let Some(properties) = self.0.child_mut("rPr") {
                properties.remove_attr("spc");
            }
            return;
        }
        self.0
            .first_child_or_insert("rPr")
            .set_attr("spc", spacing.to_string());
    }
}

/// Clamp a font size to the DrawingML range.
pub fn clamp_font_size(size: u32) -> u32 {
    size.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE)
}

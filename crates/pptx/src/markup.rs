//! Raw-markup normalization of slide and slide-master parts.
//!
//! This works on the markup text with regular expressions instead of a parsed
//! tree, so it reaches every line break and spacing attribute regardless of
//! where it sits. Every result is checked for well-formedness before use.

use crate::xml::ensure_well_formed;
use ppt_core::{Error, MarkupMode, Result};
use regex::{Captures, NoExpand, Regex};
use std::borrow::Cow;
use std::sync::LazyLock;

/// A line break, either self-closing or wrapping its run properties.
static BREAK_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<a:br(?:\s[^>]*)?/>|<a:br(?:\s[^>]*)?>(.*?)</a:br>").unwrap()
});

/// A paragraph and its content.
static PARAGRAPH_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<a:p>(.*?)</a:p>").unwrap());

/// Paragraph properties at the start of a paragraph's content.
static PARAGRAPH_PROPERTIES_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*(<a:pPr(?:\s[^>]*)?/>|<a:pPr(?:\s[^>]*)?>.*?</a:pPr>)").unwrap()
});

/// An explicit character spacing attribute.
static SPACING_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\sspc="-?\d+""#).unwrap());

/// Substitutes line breaks and spacing in raw part markup.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkupNormalizer {
    mode: MarkupMode,
}

impl MarkupNormalizer {
    pub fn new(mode: MarkupMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> MarkupMode {
        self.mode
    }

    /// Normalize one part's markup, verifying the result is well-formed.
    pub fn normalize(&self, part: &str, xml: &str) -> Result<Option<String>> {
        let Some(result) = normalize_markup(xml, self.mode) else {
            return Ok(None);
        };
        ensure_well_formed(&result).map_err(|e| {
            Error::FormatError(format!("{} is malformed after substitution: {}", part, e))
        })?;
        Ok(Some(result))
    }
}

/// Apply a substitution mode to markup. `None` when nothing changed.
pub fn normalize_markup(xml: &str, mode: MarkupMode) -> Option<String> {
    let mut text = xml.to_string();

    if mode.splits_paragraphs() {
        rewrite_in_place(&mut text, split_paragraphs_at_breaks);
    } else {
        rewrite_in_place(&mut text, breaks_to_spaces);
    }
    if mode.unifies_spacing() {
        rewrite_in_place(&mut text, strip_character_spacing);
    }

    (text != xml).then_some(text)
}

fn rewrite_in_place(text: &mut String, rewrite: fn(&str) -> Cow<'_, str>) {
    let replaced = match rewrite(text) {
        Cow::Owned(replaced) => replaced,
        Cow::Borrowed(_) => return,
    };
    *text = replaced;
}

/// Rewrite each paragraph that contains a line break with `rewrite_breaks`.
fn rewrite_paragraphs<'a>(xml: &'a str, rewrite_breaks: fn(&str) -> String) -> Cow<'a, str> {
    if !BREAK_REGEX.is_match(xml) {
        return Cow::Borrowed(xml);
    }
    PARAGRAPH_REGEX.replace_all(xml, |caps: &Captures<'_>| {
        let content = &caps[1];
        if BREAK_REGEX.is_match(content) {
            format!("<a:p>{}</a:p>", rewrite_breaks(content))
        } else {
            caps[0].to_string()
        }
    })
}

fn split_paragraphs_at_breaks(xml: &str) -> Cow<'_, str> {
    rewrite_paragraphs(xml, |content| {
        let properties = PARAGRAPH_PROPERTIES_REGEX
            .captures(content)
            .and_then(|c| c.get(1))
            .map_or("", |m| m.as_str());
        let boundary = format!("</a:p><a:p>{}", properties);
        BREAK_REGEX
            .replace_all(content, NoExpand(&boundary))
            .into_owned()
    })
}

fn breaks_to_spaces(xml: &str) -> Cow<'_, str> {
    rewrite_paragraphs(xml, |content| {
        BREAK_REGEX
            .replace_all(content, |caps: &Captures<'_>| {
                let properties = caps.get(1).map_or("", |m| m.as_str());
                format!("<a:r>{}<a:t> </a:t></a:r>", properties)
            })
            .into_owned()
    })
}

fn strip_character_spacing(xml: &str) -> Cow<'_, str> {
    SPACING_REGEX.replace_all(xml, "")
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_MODES: [MarkupMode; 3] = [MarkupMode::HardBreakUnify, MarkupMode::HardBreak, MarkupMode::Space];

    fn body(paragraphs: &str) -> String {
        format!(
            r#"<p:sld xmlns:a="a" xmlns:p="p"><p:cSld><p:spTree><p:sp><p:txBody><a:bodyPr/>{}</p:txBody></p:sp></p:spTree></p:cSld></p:sld>"#,
            paragraphs
        )
    }

    #[test]
    fn test_hard_break_unify_splits_and_strips_spacing() {
        let xml = body(
            r#"<a:p><a:pPr algn="ctr"><a:lnSpc><a:spcPct val="90000"/></a:lnSpc></a:pPr><a:r><a:rPr spc="-150"/><a:t>one</a:t></a:r><a:br><a:rPr lang="en-US" spc="20"/></a:br><a:r><a:rPr lang="en-US" spc="300"/><a:t>two</a:t></a:r></a:p>"#,
        );
        let out = normalize_markup(&xml, MarkupMode::HardBreakUnify).unwrap();

        assert_eq!(
            out,
            body(
                r#"<a:p><a:pPr algn="ctr"><a:lnSpc><a:spcPct val="90000"/></a:lnSpc></a:pPr><a:r><a:rPr/><a:t>one</a:t></a:r></a:p><a:p><a:pPr algn="ctr"><a:lnSpc><a:spcPct val="90000"/></a:lnSpc></a:pPr><a:r><a:rPr lang="en-US"/><a:t>two</a:t></a:r></a:p>"#
            )
        );
        assert!(ensure_well_formed(&out).is_ok());
    }

    #[test]
    fn test_hard_break_keeps_spacing() {
        let xml = body(r#"<a:p><a:r><a:rPr spc="100"/><a:t>a</a:t></a:r><a:br/><a:r><a:t>b</a:t></a:r><a:br lang="x"/><a:r><a:t>c</a:t></a:r></a:p>"#);
        let out = normalize_markup(&xml, MarkupMode::HardBreak).unwrap();

        assert_eq!(
            out,
            body(r#"<a:p><a:r><a:rPr spc="100"/><a:t>a</a:t></a:r></a:p><a:p><a:r><a:t>b</a:t></a:r></a:p><a:p><a:r><a:t>c</a:t></a:r></a:p>"#)
        );
    }

    #[test]
    fn test_space_mode_keeps_break_properties() {
        let xml = body(r#"<a:p><a:r><a:t>a</a:t></a:r><a:br><a:rPr sz="1800"/></a:br><a:r><a:t>b</a:t></a:r><a:br/></a:p>"#);
        let out = normalize_markup(&xml, MarkupMode::Space).unwrap();

        assert_eq!(
            out,
            body(r#"<a:p><a:r><a:t>a</a:t></a:r><a:r><a:rPr sz="1800"/><a:t> </a:t></a:r><a:r><a:t>b</a:t></a:r><a:r><a:t> </a:t></a:r></a:p>"#)
        );
        assert!(ensure_well_formed(&out).is_ok());
    }

    #[test]
    fn test_second_pass_is_noop() {
        let xml = body(r#"<a:p><a:pPr/><a:r><a:rPr spc="-5"/><a:t>a</a:t></a:r><a:br/><a:r><a:t>b</a:t></a:r></a:p><a:p><a:r><a:t>c</a:t></a:r></a:p>"#);
        for mode in ALL_MODES {
            let once = normalize_markup(&xml, mode).unwrap();
            assert_eq!(normalize_markup(&once, mode), None, "{mode:?}");
        }
    }

    #[test]
    fn test_untouched_markup_returns_none() {
        let xml = body(r#"<a:p><a:pPr marL="0"/><a:r><a:rPr lang="en-US"/><a:t>plain</a:t></a:r></a:p>"#);
        for mode in ALL_MODES {
            assert_eq!(normalize_markup(&xml, mode), None);
        }
    }

    #[test]
    fn test_breaks_outside_paragraphs_are_left_alone() {
        let xml = r#"<x:root xmlns:a="a" xmlns:x="x"><a:br/></x:root>"#;
        assert_eq!(normalize_markup(xml, MarkupMode::HardBreak), None);
        assert_eq!(normalize_markup(xml, MarkupMode::Space), None);
    }

    #[test]
    fn test_spacing_regex_only_matches_spc() {
        let xml = r#"<a:rPr spc="-20" kern="1200" spcFirstLastPara="1"/>"#;
        assert_eq!(
            normalize_markup(xml, MarkupMode::HardBreakUnify).as_deref(),
            Some(r#"<a:rPr kern="1200" spcFirstLastPara="1"/>"#)
        );
    }

    #[test]
    fn test_normalizer_rejects_malformed_result() {
        let normalizer = MarkupNormalizer::new(MarkupMode::HardBreakUnify);
        let broken = r#"<a:p><a:r><a:rPr spc="1"/><a:t>x</a:t></a:r>"#;
        let err = normalizer.normalize("ppt/slides/slide1.xml", broken);
        assert!(matches!(err, Err(Error::FormatError(_))));

        let fine = body(r#"<a:p><a:r><a:t>x</a:t></a:r><a:br/></a:p>"#);
        assert!(normalizer.normalize("ppt/slides/slide1.xml", &fine).unwrap().is_some());
    }
}

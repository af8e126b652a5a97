//! Strict to Transitional namespace translation.
//!
//! Strict documents use `purl.oclc.org` namespace URIs. The parsers only
//! know the Transitional URIs, so every XML part is passed through this
//! byte-level rewrite before it is decoded.

use crate::ooxml::opc::constants::strict::TRANSLATIONS;
use aho_corasick::{AhoCorasick, MatchKind};
use once_cell::sync::Lazy;
use std::borrow::Cow;

static STRICT_NAMESPACES: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .match_kind(MatchKind::LeftmostLongest)
        .build(TRANSLATIONS.iter().map(|(strict, _)| strict))
        .expect("Failed to build strict namespace matcher")
});

static TRANSITIONAL_NAMESPACES: Lazy<Vec<&'static str>> =
    Lazy::new(|| TRANSLATIONS.iter().map(|(_, transitional)| *transitional).collect());

/// Rewrite Strict namespace URIs to Transitional ones.
///
/// Borrows the input unchanged when it contains no Strict URI.
pub fn strict_to_transitional(content: &[u8]) -> Cow<'_, [u8]> {
    if !STRICT_NAMESPACES.is_match(content) {
        return Cow::Borrowed(content);
    }
    Cow::Owned(STRICT_NAMESPACES.replace_all_bytes(content, TRANSITIONAL_NAMESPACES.as_slice()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitional_content_is_borrowed() {
        let xml = br#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"/>"#;
        assert!(matches!(strict_to_transitional(xml), Cow::Borrowed(_)));
    }

    #[test]
    fn strict_relationship_types_are_rewritten() {
        let xml = br#"<Relationship Type="http://purl.oclc.org/ooxml/officeDocument/relationships/worksheet"/>"#;
        let out = strict_to_transitional(xml);
        assert_eq!(
            &*out,
            br#"<Relationship Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet"/>"#
                .as_slice()
        );
    }
}

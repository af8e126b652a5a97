use crate::common::error::{Error, Result};
use crate::common::xml::{attr_string, escape_xml};
use crate::ooxml::opc::constants::{namespace, target_mode};
use crate::ooxml::opc::packuri;
/// Relationship-related objects for OPC packages.
///
/// This module provides types for managing relationships between parts in a
/// package, including internal and external relationships.
use quick_xml::Reader;
use quick_xml::events::Event;
use std::fmt::Write as FmtWrite;

/// A single relationship from a source part to a target.
///
/// Represents a connection between parts in a package, identified by an rId
/// (relationship ID). Can be either internal (pointing to another part) or
/// external (pointing to an external URL).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    /// Relationship ID (e.g., "rId1", "rId2")
    r_id: String,

    /// Relationship type URI
    reltype: String,

    /// Target reference - either a relative part reference or external URL
    target_ref: String,

    /// Whether this is an external relationship
    is_external: bool,
}

impl Relationship {
    /// Create a new relationship.
    pub fn new(r_id: String, reltype: String, target_ref: String, is_external: bool) -> Self {
        Self {
            r_id,
            reltype,
            target_ref,
            is_external,
        }
    }

    /// Get the relationship ID.
    #[inline]
    pub fn r_id(&self) -> &str {
        &self.r_id
    }

    /// Get the relationship type.
    #[inline]
    pub fn reltype(&self) -> &str {
        &self.reltype
    }

    /// Get the target reference.
    ///
    /// For internal relationships, this is a relative part reference.
    /// For external relationships, this is an absolute URL.
    #[inline]
    pub fn target_ref(&self) -> &str {
        &self.target_ref
    }

    /// Check if this is an external relationship.
    #[inline]
    pub fn is_external(&self) -> bool {
        self.is_external
    }
}

/// Collection of relationships from a single source part.
///
/// Relationships keep the order they were read or added in, so a
/// relationships part that is read and written back is unchanged apart
/// from whitespace.
#[derive(Debug, Clone)]
pub struct Relationships {
    /// Directory of the source part, used to resolve relative targets
    base_dir: String,

    rels: Vec<Relationship>,
}

impl Relationships {
    /// Create a new empty relationships collection for the given source part.
    pub fn new(source_part: &str) -> Self {
        Self {
            base_dir: packuri::base_dir(source_part).to_string(),
            rels: Vec::new(),
        }
    }

    /// Parse a relationships part.
    ///
    /// Uses quick-xml for efficient streaming XML parsing with minimal allocation.
    pub fn from_xml(source_part: &str, xml: &[u8]) -> Result<Self> {
        let mut rels = Self::new(source_part);
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(true);

        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) => {
                    if e.local_name().as_ref() == b"Relationship" {
                        let r_id = attr_string(e, b"Id")?;
                        let reltype = attr_string(e, b"Type")?;
                        let target_ref = attr_string(e, b"Target")?;
                        let mode = attr_string(e, b"TargetMode")?;

                        if let (Some(id), Some(rt), Some(tr)) = (r_id, reltype, target_ref) {
                            let is_external = mode.as_deref() == Some(target_mode::EXTERNAL);
                            rels.rels.push(Relationship::new(id, rt, tr, is_external));
                        }
                    }
                },
                Ok(Event::Eof) => break,
                Err(e) => return Err(Error::XmlError(format!("Rels parse error: {}", e))),
                _ => {},
            }
            buf.clear();
        }

        Ok(rels)
    }

    /// Add a relationship to the collection.
    pub fn add_relationship(
        &mut self,
        reltype: &str,
        target_ref: &str,
        is_external: bool,
    ) -> &Relationship {
        let r_id = self.next_r_id();
        self.rels.push(Relationship::new(
            r_id,
            reltype.to_string(),
            target_ref.to_string(),
            is_external,
        ));
        &self.rels[self.rels.len() - 1]
    }

    /// Get a relationship by its ID.
    #[inline]
    pub fn get(&self, r_id: &str) -> Option<&Relationship> {
        self.rels.iter().find(|rel| rel.r_id == r_id)
    }

    /// Get or add an internal relationship to a target part.
    ///
    /// If a relationship of the given type to the target already exists,
    /// returns its rId. Otherwise, creates a new one with the next
    /// available rId.
    pub fn get_or_add(&mut self, reltype: &str, target_ref: &str) -> String {
        if let Some(rel) = self
            .rels
            .iter()
            .find(|rel| rel.reltype == reltype && rel.target_ref == target_ref && !rel.is_external)
        {
            return rel.r_id.clone();
        }
        self.add_relationship(reltype, target_ref, false)
            .r_id()
            .to_string()
    }

    /// Get the next available relationship ID.
    ///
    /// Generates IDs in the format "rId1", "rId2", etc., one past the
    /// highest number in use.
    fn next_r_id(&self) -> String {
        let highest = self
            .rels
            .iter()
            .filter_map(|rel| {
                rel.r_id
                    .strip_prefix("rId")
                    .and_then(|n| atoi_simd::parse_pos::<u32, false>(n.as_bytes()).ok())
            })
            .max()
            .unwrap_or(0);

        format!("rId{}", highest + 1)
    }

    /// Resolve the part an internal relationship points at.
    pub fn target_part(&self, rel: &Relationship) -> Option<String> {
        if rel.is_external {
            return None;
        }
        Some(packuri::resolve_target(&self.base_dir, &rel.target_ref))
    }

    /// Find the first internal target part of a relationship type.
    pub fn part_with_reltype(&self, reltype: &str) -> Option<String> {
        self.rels
            .iter()
            .find(|rel| rel.reltype == reltype)
            .and_then(|rel| self.target_part(rel))
    }

    /// Reference from this source to `part`, relative to the source directory.
    pub fn relative_ref(&self, part: &str) -> String {
        packuri::relative_target(&self.base_dir, part)
    }

    /// Get an iterator over all relationships.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.rels.iter()
    }

    /// Get the number of relationships in the collection.
    #[inline]
    pub fn len(&self) -> usize {
        self.rels.len()
    }

    /// Check if the collection is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rels.is_empty()
    }

    /// Remove every relationship matching the predicate.
    pub fn retain(&mut self, mut keep: impl FnMut(&Relationship) -> bool) {
        self.rels.retain(|rel| keep(rel));
    }

    /// Serialize relationships to XML format.
    pub fn to_xml(&self) -> Result<String> {
        let mut xml = String::with_capacity(256 + self.rels.len() * 160);

        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        write!(xml, r#"<Relationships xmlns="{}">"#, namespace::OPC_RELATIONSHIPS)?;

        for rel in &self.rels {
            let target_mode = if rel.is_external {
                r#" TargetMode="External""#
            } else {
                ""
            };

            write!(
                xml,
                r#"<Relationship Id="{}" Type="{}" Target="{}"{}/>"#,
                escape_xml(&rel.r_id),
                escape_xml(&rel.reltype),
                escape_xml(&rel.target_ref),
                target_mode
            )?;
        }

        xml.push_str("</Relationships>");

        Ok(xml)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::opc::constants::relationship_type as rt;

    #[test]
    fn test_next_r_id() {
        let mut rels = Relationships::new("xl/workbook.xml");
        assert_eq!(rels.next_r_id(), "rId1");

        rels.add_relationship("type1", "target1", false);
        assert_eq!(rels.next_r_id(), "rId2");
    }

    #[test]
    fn test_get_or_add() {
        let mut rels = Relationships::new("xl/workbook.xml");

        assert_eq!(rels.get_or_add("type1", "target1"), "rId1");
        // Getting the same relationship should return the same rId
        assert_eq!(rels.get_or_add("type1", "target1"), "rId1");
        // Different target should create new relationship
        assert_eq!(rels.get_or_add("type1", "target2"), "rId2");
    }

    #[test]
    fn test_parse_and_resolve() {
        let xml = br#"<?xml version="1.0"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
  <Relationship Id="rId7" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com/?a=1&amp;b=2" TargetMode="External"/>
</Relationships>"#;
        let mut rels = Relationships::from_xml("xl/workbook.xml", xml).unwrap();
        assert_eq!(rels.len(), 2);
        assert_eq!(
            rels.part_with_reltype(rt::WORKSHEET).as_deref(),
            Some("xl/worksheets/sheet1.xml")
        );

        let link = rels.get("rId7").unwrap();
        assert!(link.is_external());
        assert_eq!(link.target_ref(), "https://example.com/?a=1&b=2");
        assert_eq!(rels.target_part(link), None);

        assert_eq!(rels.add_relationship(rt::TABLE, "x", false).r_id(), "rId8");
        let out = rels.to_xml().unwrap();
        assert!(out.contains(r#"Target="https://example.com/?a=1&amp;b=2" TargetMode="External""#));
    }
}

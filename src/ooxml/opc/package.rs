/// Objects that implement reading and writing OPC packages.
///
/// This module provides the main OpcPackage type, which represents an Open Packaging
/// Convention package in memory. Parts are kept as raw bytes (or temporary
/// files for very large worksheets) in archive order; relationships parts
/// are parsed on demand and written back when the package is saved.
use crate::common::error::{Error, Result};
use crate::common::xml::transcode_to_utf8;
use crate::ooxml::opc::constants::relationship_type;
use crate::ooxml::opc::content_types::ContentTypeMap;
use crate::ooxml::opc::namespace::strict_to_transitional;
use crate::ooxml::opc::packuri::{self, CONTENT_TYPES_PART, PACKAGE_PART};
use crate::ooxml::opc::phys_pkg::{ExtractLimits, PartData, PhysPkgReader, PhysPkgWriter};
use crate::ooxml::opc::rel::Relationships;
use std::collections::HashMap;
use std::io::{Read, Seek, Write};
use std::path::Path;

/// Main API class for working with OPC packages.
#[derive(Debug, Default)]
pub struct OpcPackage {
    /// Member names in archive order; new parts are appended
    order: Vec<String>,

    /// All parts in the package, indexed by member name
    parts: HashMap<String, PartData>,

    content_types: ContentTypeMap,

    /// Parsed relationships, keyed by source part
    rels: HashMap<String, Relationships>,
}

impl OpcPackage {
    /// Create a new empty OPC package.
    pub fn new() -> Self {
        Self {
            content_types: ContentTypeMap::new(),
            ..Default::default()
        }
    }

    /// Open an OPC package from a file.
    pub fn open<P: AsRef<Path>>(path: P, limits: ExtractLimits) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file), limits)
    }

    /// Load an OPC package from a reader.
    ///
    /// # Errors
    /// `MissingPart` when the archive has no `[Content_Types].xml`.
    pub fn from_reader<R: Read + Seek>(reader: R, limits: ExtractLimits) -> Result<Self> {
        let mut package = Self::default();
        let mut content_types = None;

        for (name, data) in PhysPkgReader::extract(reader, limits)? {
            if name == CONTENT_TYPES_PART {
                let raw = data.read()?;
                content_types = Some(ContentTypeMap::from_xml(&normalize_xml(&raw))?);
                continue;
            }
            if package.parts.insert(name.clone(), data).is_none() {
                package.order.push(name);
            }
        }

        package.content_types =
            content_types.ok_or_else(|| Error::MissingPart(CONTENT_TYPES_PART.to_string()))?;
        log::debug!("opened package with {} parts", package.order.len());
        Ok(package)
    }

    /// Check if a part exists in the package.
    #[inline]
    pub fn contains(&self, part: &str) -> bool {
        self.parts.contains_key(part)
    }

    /// Member names of all parts, in archive order.
    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Raw bytes of a part.
    pub fn read(&self, part: &str) -> Result<Vec<u8>> {
        self.parts
            .get(part)
            .ok_or_else(|| Error::MissingPart(part.to_string()))?
            .read()
    }

    /// XML content of a part, transcoded to UTF-8 with Strict namespaces
    /// rewritten to Transitional ones.
    pub fn read_xml(&self, part: &str) -> Result<Vec<u8>> {
        let raw = self.read(part)?;
        Ok(normalize_xml(&raw).into_owned())
    }

    /// Store a part, replacing any previous content.
    ///
    /// With a content type, an override entry is recorded for the part.
    pub fn set(&mut self, part: &str, blob: Vec<u8>, content_type: Option<&str>) {
        self.set_data(part, PartData::Memory(blob));
        if let Some(content_type) = content_type {
            self.content_types.set_override(part, content_type);
        }
    }

    /// Store a part from already materialized part data.
    pub fn set_data(&mut self, part: &str, data: PartData) {
        if self.parts.insert(part.to_string(), data).is_none() {
            self.order.push(part.to_string());
        }
    }

    /// Remove a part together with its content-type override and its own
    /// relationships part.
    pub fn remove(&mut self, part: &str) {
        let rels_part = packuri::rels_part(part);
        for name in [part, rels_part.as_str()] {
            if self.parts.remove(name).is_some() {
                self.order.retain(|n| n != name);
            }
        }
        self.rels.remove(part);
        self.content_types.remove_override(part);
    }

    #[inline]
    pub fn content_types(&self) -> &ContentTypeMap {
        &self.content_types
    }

    #[inline]
    pub fn content_types_mut(&mut self) -> &mut ContentTypeMap {
        &mut self.content_types
    }

    /// Relationships of a source part, loaded on first access.
    ///
    /// A part without a relationships part gets an empty collection.
    pub fn rels_mut(&mut self, source: &str) -> Result<&mut Relationships> {
        if !self.rels.contains_key(source) {
            let rels_part = packuri::rels_part(source);
            let rels = if self.contains(&rels_part) {
                Relationships::from_xml(source, &self.read_xml(&rels_part)?)?
            } else {
                Relationships::new(source)
            };
            self.rels.insert(source.to_string(), rels);
        }
        self.rels
            .get_mut(source)
            .ok_or_else(|| Error::MissingPart(packuri::rels_part(source)))
    }

    /// Relationships of a source part.
    pub fn rels(&mut self, source: &str) -> Result<&Relationships> {
        Ok(&*self.rels_mut(source)?)
    }

    /// The main document part (the workbook for a spreadsheet package).
    pub fn main_part(&mut self) -> Result<String> {
        self.rels(PACKAGE_PART)?
            .part_with_reltype(relationship_type::OFFICE_DOCUMENT)
            .ok_or_else(|| Error::MissingPart("officeDocument relationship".to_string()))
    }

    /// Next free number for a tuple part family such as
    /// `xl/tables/table{n}.xml`, one past the highest in use.
    pub fn next_index(&self, prefix: &str) -> u32 {
        self.order
            .iter()
            .filter(|name| name.starts_with(prefix))
            .filter_map(|name| packuri::index(name))
            .max()
            .unwrap_or(0)
            + 1
    }

    /// Serialize relationships that were loaded or created back into their
    /// parts. Empty collections drop their part.
    fn sync_relationships(&mut self) -> Result<()> {
        let mut sources: Vec<String> = self.rels.keys().cloned().collect();
        sources.sort();
        for source in sources {
            let rels_part = packuri::rels_part(&source);
            let Some(rels) = self.rels.get(&source) else {
                continue;
            };
            if rels.is_empty() {
                if self.parts.remove(&rels_part).is_some() {
                    self.order.retain(|n| *n != rels_part);
                }
                continue;
            }
            let xml = rels.to_xml()?.into_bytes();
            self.set_data(&rels_part, PartData::Memory(xml));
        }
        Ok(())
    }

    /// Write the package into a seekable sink.
    ///
    /// `[Content_Types].xml` comes first, then every part in order.
    pub fn write_to<W: Write + Seek>(&mut self, sink: W) -> Result<W> {
        self.sync_relationships()?;

        let mut writer = PhysPkgWriter::new(sink);
        writer.write(CONTENT_TYPES_PART, self.content_types.to_xml()?.as_bytes())?;
        for name in &self.order {
            if let Some(data) = self.parts.get(name) {
                writer.write_data(name, data)?;
            }
        }
        log::debug!("wrote package with {} parts", self.order.len() + 1);
        writer.finish()
    }
}

fn normalize_xml(raw: &[u8]) -> std::borrow::Cow<'_, [u8]> {
    match transcode_to_utf8(raw) {
        std::borrow::Cow::Borrowed(bytes) => strict_to_transitional(bytes),
        std::borrow::Cow::Owned(bytes) => {
            std::borrow::Cow::Owned(strict_to_transitional(&bytes).into_owned())
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::opc::constants::content_type as ct;
    use std::io::Cursor;
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    fn limits() -> ExtractLimits {
        ExtractLimits {
            total: 1 << 30,
            spill: 1 << 24,
        }
    }

    fn create_minimal_xlsx() -> Vec<u8> {
        let mut zip_data = Vec::new();
        {
            let cursor = Cursor::new(&mut zip_data);
            let mut writer = ZipWriter::new(cursor);
            let options = SimpleFileOptions::default();

            writer.start_file("[Content_Types].xml", options).unwrap();
            writer.write_all(br#"<?xml version="1.0"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
    <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
    <Default Extension="xml" ContentType="application/xml"/>
    <Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
</Types>"#).unwrap();

            writer.start_file("_rels/.rels", options).unwrap();
            writer.write_all(br#"<?xml version="1.0"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
    <Relationship Id="rId1" Type="http://purl.oclc.org/ooxml/officeDocument/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#).unwrap();

            writer.start_file("xl/workbook.xml", options).unwrap();
            writer.write_all(b"<workbook/>").unwrap();

            writer.finish().unwrap();
        }
        zip_data
    }

    #[test]
    fn test_open_package() {
        let mut pkg = OpcPackage::from_reader(Cursor::new(create_minimal_xlsx()), limits()).unwrap();

        assert_eq!(pkg.part_names().count(), 2);
        // Strict relationship types resolve like Transitional ones.
        assert_eq!(pkg.main_part().unwrap(), "xl/workbook.xml");
        assert_eq!(pkg.content_types().get("xl/workbook.xml"), Some(ct::SML_SHEET_MAIN));
    }

    #[test]
    fn test_write_round_trip() {
        let mut pkg = OpcPackage::from_reader(Cursor::new(create_minimal_xlsx()), limits()).unwrap();
        assert_eq!(pkg.next_index("xl/tables/table"), 1);

        pkg.set("xl/tables/table1.xml", b"<table/>".to_vec(), Some(ct::SML_TABLE));
        pkg.rels_mut("xl/workbook.xml")
            .unwrap()
            .add_relationship(relationship_type::TABLE, "tables/table1.xml", false);
        assert_eq!(pkg.next_index("xl/tables/table"), 2);

        let bytes = pkg.write_to(Cursor::new(Vec::new())).unwrap().into_inner();
        let mut reopened = OpcPackage::from_reader(Cursor::new(bytes), limits()).unwrap();
        assert!(reopened.contains("xl/_rels/workbook.xml.rels"));
        assert_eq!(reopened.read("xl/tables/table1.xml").unwrap(), b"<table/>");
        assert_eq!(
            reopened
                .rels("xl/workbook.xml")
                .unwrap()
                .part_with_reltype(relationship_type::TABLE)
                .as_deref(),
            Some("xl/tables/table1.xml")
        );

        reopened.remove("xl/tables/table1.xml");
        assert!(!reopened.contains("xl/tables/table1.xml"));
        assert_eq!(reopened.content_types().get("xl/tables/table1.xml"), Some(ct::XML));
    }

    #[test]
    fn missing_content_types_is_an_error() {
        let mut data = Vec::new();
        {
            let mut writer = ZipWriter::new(Cursor::new(&mut data));
            writer.start_file("xl/workbook.xml", SimpleFileOptions::default()).unwrap();
            writer.write_all(b"<workbook/>").unwrap();
            writer.finish().unwrap();
        }
        let err = OpcPackage::from_reader(Cursor::new(data), limits()).unwrap_err();
        assert!(matches!(err, Error::MissingPart(_)));
    }
}

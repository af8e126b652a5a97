//! Provides a general interface to a physical OPC package (ZIP file).
//!
//! This module handles the low-level reading of packages from ZIP archives
//! and the writing of parts back into a new archive. Extraction is bounded:
//! the cumulative uncompressed size is checked entry by entry and while
//! copying, and large worksheet parts are extracted to temporary files
//! instead of memory.

use crate::common::error::{Error, Result};
use crate::ooxml::opc::packuri::CONTENT_TYPES_PART;
use std::io::{Read, Seek, Write};
use tempfile::NamedTempFile;
use zip::ZipArchive;
use zip::write::SimpleFileOptions;

/// Limits applied while extracting a package.
#[derive(Debug, Clone, Copy)]
pub struct ExtractLimits {
    /// Ceiling on the total uncompressed size of all entries
    pub total: u64,
    /// Worksheet and shared-string parts above this size go to temp files
    pub spill: u64,
}

/// Content of one extracted part.
#[derive(Debug)]
pub enum PartData {
    Memory(Vec<u8>),
    /// Part content lives in a temporary file removed on drop
    Spilled(NamedTempFile),
}

impl PartData {
    /// Read the full part content.
    pub fn read(&self) -> Result<Vec<u8>> {
        match self {
            PartData::Memory(bytes) => Ok(bytes.clone()),
            PartData::Spilled(file) => Ok(std::fs::read(file.path())?),
        }
    }

    /// Copy the part content into a writer without buffering it whole.
    pub fn copy_to<W: Write>(&self, out: &mut W) -> Result<u64> {
        match self {
            PartData::Memory(bytes) => {
                out.write_all(bytes)?;
                Ok(bytes.len() as u64)
            },
            PartData::Spilled(file) => {
                let mut input = std::fs::File::open(file.path())?;
                Ok(std::io::copy(&mut input, out)?)
            },
        }
    }
}

/// Physical package reader over a ZIP archive.
pub struct PhysPkgReader;

impl PhysPkgReader {
    /// Extract every file entry of the archive, in archive order.
    ///
    /// Member names are normalized: backslashes become forward slashes and
    /// the case-insensitively matched `[Content_Types].xml` gets its
    /// canonical name.
    ///
    /// # Errors
    /// `UnzipSizeLimitExceeded` as soon as the running uncompressed total
    /// crosses `limits.total`; nothing extracted so far is returned.
    pub fn extract<R: Read + Seek>(
        reader: R,
        limits: ExtractLimits,
    ) -> Result<Vec<(String, PartData)>> {
        let mut archive = ZipArchive::new(reader)?;
        let mut parts = Vec::with_capacity(archive.len());
        let mut unzipped: u64 = 0;

        for index in 0..archive.len() {
            let mut entry = archive.by_index(index)?;
            if entry.is_dir() {
                continue;
            }

            let declared = entry.size();
            unzipped = unzipped.saturating_add(declared);
            if unzipped > limits.total {
                return Err(Error::UnzipSizeLimitExceeded(limits.total));
            }

            let name = normalize_member_name(entry.name());
            // Guard against entries whose header understates their size.
            let budget = limits.total - (unzipped - declared);
            let spill = declared > limits.spill && is_spillable(&name);

            let data = if spill {
                let mut file = NamedTempFile::new()?;
                let written = std::io::copy(&mut (&mut entry).take(budget.saturating_add(1)), &mut file)?;
                check_budget(written, budget, limits.total)?;
                file.flush()?;
                log::debug!("extracted {} ({} bytes) to a temporary file", name, written);
                PartData::Spilled(file)
            } else {
                let mut bytes = Vec::with_capacity(declared.min(budget) as usize);
                let written = (&mut entry).take(budget.saturating_add(1)).read_to_end(&mut bytes)? as u64;
                check_budget(written, budget, limits.total)?;
                PartData::Memory(bytes)
            };

            parts.push((name, data));
        }

        log::debug!("extracted {} package parts ({} bytes)", parts.len(), unzipped);
        Ok(parts)
    }
}

fn check_budget(written: u64, budget: u64, total: u64) -> Result<()> {
    if written > budget {
        return Err(Error::UnzipSizeLimitExceeded(total));
    }
    Ok(())
}

fn normalize_member_name(name: &str) -> String {
    let name = name.replace('\\', "/");
    if name.eq_ignore_ascii_case(CONTENT_TYPES_PART) {
        return CONTENT_TYPES_PART.to_string();
    }
    if name.eq_ignore_ascii_case("xl/sharedStrings.xml") {
        return "xl/sharedStrings.xml".to_string();
    }
    name
}

fn is_spillable(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.starts_with("xl/worksheets/sheet") || lower == "xl/sharedstrings.xml"
}

/// Physical package writer for creating packages.
///
/// Handles the low-level writing of parts to a ZIP archive with Deflate
/// compression.
pub struct PhysPkgWriter<W: Write + Seek> {
    archive: zip::ZipWriter<W>,
}

impl<W: Write + Seek> PhysPkgWriter<W> {
    /// Create a new package writer over a seekable sink.
    pub fn new(sink: W) -> Self {
        Self {
            archive: zip::ZipWriter::new(sink),
        }
    }

    fn options() -> SimpleFileOptions {
        SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .large_file(false)
    }

    /// Write a part to the package with Deflate compression.
    pub fn write(&mut self, part: &str, blob: &[u8]) -> Result<()> {
        self.archive.start_file(part, Self::options())?;
        self.archive.write_all(blob)?;
        Ok(())
    }

    /// Write a part from stored part data.
    pub fn write_data(&mut self, part: &str, data: &PartData) -> Result<()> {
        self.archive
            .start_file(part, Self::options().large_file(matches!(data, PartData::Spilled(_))))?;
        data.copy_to(&mut self.archive)?;
        Ok(())
    }

    /// Finish writing and return the sink.
    pub fn finish(self) -> Result<W> {
        Ok(self.archive.finish()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn build(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = PhysPkgWriter::new(Cursor::new(Vec::new()));
        for (name, blob) in entries {
            writer.write(name, blob).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn limits(total: u64, spill: u64) -> ExtractLimits {
        ExtractLimits { total, spill }
    }

    #[test]
    fn test_round_trip() {
        let zip = build(&[
            ("[content_types].xml", &b"<Types/>"[..]),
            ("xl/workbook.xml", &b"<workbook/>"[..]),
        ]);
        let parts = PhysPkgReader::extract(Cursor::new(zip), limits(1 << 20, 1 << 20)).unwrap();

        assert_eq!(parts[0].0, "[Content_Types].xml");
        assert_eq!(parts[1].0, "xl/workbook.xml");
        assert_eq!(parts[1].1.read().unwrap(), b"<workbook/>");
    }

    #[test]
    fn size_limit_aborts_extraction() {
        let zip = build(&[("a.xml", &[b'a'; 64][..]), ("b.xml", &[b'b'; 64][..])]);
        let err = PhysPkgReader::extract(Cursor::new(zip), limits(100, 1 << 20)).unwrap_err();
        assert!(matches!(err, Error::UnzipSizeLimitExceeded(100)));
    }

    #[test]
    fn large_worksheets_are_spilled() {
        let sheet = vec![b'x'; 256];
        let zip = build(&[("xl/worksheets/sheet1.xml", &sheet[..]), ("xl/styles.xml", &sheet[..])]);
        let parts = PhysPkgReader::extract(Cursor::new(zip), limits(1 << 20, 128)).unwrap();

        assert!(matches!(parts[0].1, PartData::Spilled(_)));
        assert!(matches!(parts[1].1, PartData::Memory(_)));
        assert_eq!(parts[0].1.read().unwrap(), sheet);
    }
}

//! Options applied when opening a workbook.

use crate::common::error::{Error, Result};
use crate::ooxml::opc::ExtractLimits;
use serde::{Deserialize, Serialize};

/// Default ceiling on the total uncompressed size of a package (16 GiB).
pub const DEFAULT_UNZIP_SIZE_LIMIT: u64 = 16 << 30;

/// Default size above which a worksheet part is kept in a temporary file
/// (16 MiB).
pub const DEFAULT_UNZIP_XML_SIZE_LIMIT: u64 = 16 << 20;

/// Limits used while reading a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Extraction fails once the cumulative uncompressed size of all
    /// entries crosses this many bytes.
    pub unzip_size_limit: u64,
    /// Worksheet and shared-string parts larger than this are extracted to
    /// temporary files.
    pub unzip_xml_size_limit: u64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            unzip_size_limit: DEFAULT_UNZIP_SIZE_LIMIT,
            unzip_xml_size_limit: DEFAULT_UNZIP_XML_SIZE_LIMIT,
        }
    }
}

impl Options {
    /// Reject zero limits and an XML limit above the total one.
    pub fn validate(&self) -> Result<()> {
        if self.unzip_size_limit == 0 || self.unzip_xml_size_limit == 0 {
            return Err(Error::InvalidOptions("unzip size limits must be positive".to_string()));
        }
        if self.unzip_xml_size_limit > self.unzip_size_limit {
            return Err(Error::InvalidOptions(format!(
                "unzip XML size limit {} exceeds the unzip size limit {}",
                self.unzip_xml_size_limit, self.unzip_size_limit
            )));
        }
        Ok(())
    }

    pub(crate) fn extract_limits(&self) -> ExtractLimits {
        ExtractLimits {
            total: self.unzip_size_limit,
            spill: self.unzip_xml_size_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let options = Options::default();
        assert_eq!(options.unzip_size_limit, 17_179_869_184);
        assert_eq!(options.unzip_xml_size_limit, 16_777_216);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_inverted_limits() {
        let options = Options {
            unzip_size_limit: 1024,
            unzip_xml_size_limit: 2048,
        };
        assert!(matches!(options.validate(), Err(Error::InvalidOptions(_))));

        let zero = Options {
            unzip_size_limit: 0,
            ..Default::default()
        };
        assert!(zero.validate().is_err());
    }
}

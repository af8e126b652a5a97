/// Open Packaging Conventions (OPC) implementation.
///
/// This module provides the container layer of a spreadsheet package:
///
/// - Package structure (parts, relationships)
/// - Content type management
/// - ZIP-based physical packaging with bounded extraction
/// - Strict to Transitional namespace translation
///
/// # Performance Features
///
/// - Uses `atoi_simd` for fast integer parsing
/// - Uses `quick-xml` for efficient streaming XML parsing
/// - Uses `aho-corasick` for single-pass namespace rewriting
/// - Keeps very large worksheet parts in temporary files

pub mod constants;
pub mod content_types;
pub mod namespace;
pub mod package;
pub mod packuri;
pub mod phys_pkg;
pub mod rel;

// Re-export commonly used types
pub use content_types::ContentTypeMap;
pub use package::OpcPackage;
pub use phys_pkg::{ExtractLimits, PartData};
pub use rel::{Relationship, Relationships};

//! Workbook part model (`xl/workbook.xml`).
//!
//! Only the sheet list, the defined names and the workbook properties
//! (`<workbookPr>`) are modelled. Every other child of `<workbook>` is kept
//! as raw markup in document order, so a round trip rewrites just those.

use crate::common::error::{Error, Result};
use crate::common::xml::RawAttributes;
use crate::ooxml::xlsx::worksheet::PreservedElement;
use serde::{Deserialize, Serialize};

/// Defined name of the range an auto-filter covers.
pub const FILTER_DATABASE: &str = "_xlnm._FilterDatabase";

/// Schema order of the `<workbook>` children, used to place a
/// `<definedNames>` block that did not exist before.
pub const WORKBOOK_ELEMENT_ORDER: &[&str] = &[
    "fileVersion",
    "fileSharing",
    "workbookPr",
    "workbookProtection",
    "bookViews",
    "sheets",
    "functionGroups",
    "externalReferences",
    "definedNames",
    "calcPr",
    "oleSize",
    "customWorkbookViews",
    "pivotCaches",
    "smartTagPr",
    "smartTagTypes",
    "webPublishing",
    "fileRecoveryPr",
    "webPublishObjects",
    "extLst",
];

/// Characters Excel refuses in sheet names.
const INVALID_SHEET_NAME_CHARS: &[char] = &[':', '\\', '/', '?', '*', '[', ']'];

/// Longest sheet name Excel accepts.
pub const MAX_SHEET_NAME_LENGTH: usize = 31;

/// A `<sheet>` entry of the workbook.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SheetEntry {
    pub name: String,
    pub sheet_id: u32,
    /// Relationship id of the worksheet part.
    pub r_id: String,
    /// Other attributes (`state`), still escaped.
    pub extra: RawAttributes,
}

/// A workbook or sheet scoped defined name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DefinedName {
    pub name: String,
    /// Formula text the name refers to, e.g. `Sheet1!$A$1:$B$4`.
    pub value: String,
    /// Zero-based position of the scoping sheet; `None` for workbook scope.
    pub local_sheet_id: Option<u32>,
    pub comment: Option<String>,
    pub hidden: bool,
    pub extra: RawAttributes,
}

/// Workbook properties (`<workbookPr>`).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WorkbookPr {
    /// Dates count from 1904-01-01 instead of 1900-01-01
    pub date1904: bool,
    pub filter_privacy: bool,
    /// VBA code name of the workbook, unescaped
    pub code_name: Option<String>,
    /// Other attributes, still escaped
    pub extra: RawAttributes,
}

/// Workbook properties a caller can read and change.
///
/// `None` fields are left as they are by
/// [`Workbook::set_workbook_pr_options`](crate::Workbook::set_workbook_pr_options).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkbookPrOptions {
    pub date1904: Option<bool>,
    pub filter_privacy: Option<bool>,
    pub code_name: Option<String>,
}

impl WorkbookPr {
    pub fn options(&self) -> WorkbookPrOptions {
        WorkbookPrOptions {
            date1904: Some(self.date1904),
            filter_privacy: Some(self.filter_privacy),
            code_name: Some(self.code_name.clone().unwrap_or_default()),
        }
    }

    /// Apply the fields set in `options`. An empty code name removes it.
    pub fn apply(&mut self, options: &WorkbookPrOptions) {
        if let Some(date1904) = options.date1904 {
            self.date1904 = date1904;
        }
        if let Some(filter_privacy) = options.filter_privacy {
            self.filter_privacy = filter_privacy;
        }
        if let Some(code_name) = &options.code_name {
            self.code_name = Some(code_name.clone()).filter(|name| !name.is_empty());
        }
    }
}

/// One child of `<workbook>` in document order.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkbookChild {
    WorkbookPr,
    Sheets,
    DefinedNames,
    Raw(PreservedElement),
}

impl WorkbookChild {
    fn name(&self) -> &str {
        match self {
            WorkbookChild::WorkbookPr => "workbookPr",
            WorkbookChild::Sheets => "sheets",
            WorkbookChild::DefinedNames => "definedNames",
            WorkbookChild::Raw(element) => &element.name,
        }
    }
}

/// Parsed `xl/workbook.xml`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WorkbookPart {
    pub root_attributes: RawAttributes,
    pub properties: WorkbookPr,
    pub sheets: Vec<SheetEntry>,
    pub defined_names: Vec<DefinedName>,
    pub children: Vec<WorkbookChild>,
}

impl WorkbookPart {
    /// Find a sheet by name, case-insensitively as Excel does.
    pub fn sheet(&self, name: &str) -> Option<&SheetEntry> {
        self.sheets
            .iter()
            .find(|sheet| sheet.name.to_lowercase() == name.to_lowercase())
    }

    /// Zero-based position of a sheet, used by `localSheetId`.
    pub fn sheet_index(&self, name: &str) -> Option<usize> {
        self.sheets
            .iter()
            .position(|sheet| sheet.name.to_lowercase() == name.to_lowercase())
    }

    pub fn next_sheet_id(&self) -> u32 {
        self.sheets.iter().map(|s| s.sheet_id).max().unwrap_or(0) + 1
    }

    /// Insert or replace a defined name with the same name and scope.
    pub fn set_defined_name(&mut self, name: DefinedName) {
        match self.defined_names.iter_mut().find(|existing| {
            existing.name.eq_ignore_ascii_case(&name.name)
                && existing.local_sheet_id == name.local_sheet_id
        }) {
            Some(existing) => *existing = name,
            None => self.defined_names.push(name),
        }
        self.ensure_child(WorkbookChild::DefinedNames);
    }

    /// Make sure a modelled child has a slot, placed by schema order.
    pub(crate) fn ensure_child(&mut self, child: WorkbookChild) {
        if self.children.contains(&child) {
            return;
        }
        let rank = element_rank(child.name());
        let at = self
            .children
            .iter()
            .position(|existing| element_rank(existing.name()) > rank)
            .unwrap_or(self.children.len());
        self.children.insert(at, child);
    }
}

/// Position of a child in [`WORKBOOK_ELEMENT_ORDER`]; unknown names rank
/// with `extLst`.
pub fn element_rank(name: &str) -> usize {
    WORKBOOK_ELEMENT_ORDER
        .iter()
        .position(|known| *known == name)
        .unwrap_or(WORKBOOK_ELEMENT_ORDER.len() - 1)
}

/// Check a new sheet name against Excel's rules.
pub fn validate_sheet_name(name: &str) -> Result<()> {
    let invalid = || Error::InvalidSheetName(name.to_string());
    if name.trim().is_empty() || name.chars().count() > MAX_SHEET_NAME_LENGTH {
        return Err(invalid());
    }
    if name.contains(INVALID_SHEET_NAME_CHARS) || name.starts_with('\'') || name.ends_with('\'') {
        return Err(invalid());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_sheet_name() {
        assert!(validate_sheet_name("Sheet 2").is_ok());
        assert!(validate_sheet_name("Données").is_ok());
        for bad in ["", "  ", "a/b", "x[1]", "'quoted'", "a:b", &"x".repeat(32)] {
            assert!(matches!(validate_sheet_name(bad), Err(Error::InvalidSheetName(_))), "{bad}");
        }
    }

    #[test]
    fn defined_names_slot_follows_schema_order() {
        let raw = |name: &str| {
            WorkbookChild::Raw(PreservedElement {
                name: name.to_string(),
                xml: format!("<{name}/>"),
            })
        };
        let mut part = WorkbookPart {
            children: vec![raw("fileVersion"), WorkbookChild::Sheets, raw("calcPr")],
            ..Default::default()
        };
        part.set_defined_name(DefinedName {
            name: "Data".into(),
            value: "Sheet1!$A$1".into(),
            ..Default::default()
        });
        part.set_defined_name(DefinedName {
            name: "data".into(),
            value: "Sheet1!$B$1".into(),
            ..Default::default()
        });

        assert_eq!(part.children[2], WorkbookChild::DefinedNames);
        assert_eq!(part.defined_names.len(), 1);
        assert_eq!(part.defined_names[0].value, "Sheet1!$B$1");

        part.ensure_child(WorkbookChild::WorkbookPr);
        assert_eq!(part.children[1], WorkbookChild::WorkbookPr);
    }

    #[test]
    fn test_workbook_pr_options() {
        let mut pr = WorkbookPr {
            code_name: Some("ThisWorkbook".into()),
            ..Default::default()
        };
        pr.apply(&WorkbookPrOptions {
            date1904: Some(true),
            ..Default::default()
        });
        assert!(pr.date1904);
        assert!(!pr.filter_privacy);
        assert_eq!(pr.code_name.as_deref(), Some("ThisWorkbook"));

        pr.apply(&WorkbookPrOptions {
            filter_privacy: Some(true),
            code_name: Some(String::new()),
            ..Default::default()
        });
        assert_eq!(
            pr.options(),
            WorkbookPrOptions {
                date1904: Some(true),
                filter_privacy: Some(true),
                code_name: Some(String::new()),
            }
        );
        assert_eq!(pr.code_name, None);
    }
}

//! XLSX table structures.
//!
//! Tables in Excel provide structured references and enhanced formatting for
//! data ranges. Tables are created by the stream writer from the header row
//! it has already written.

use crate::common::error::{Error, Result};
use crate::ooxml::xlsx::cell::cell_name_to_coordinates;
use serde::{Deserialize, Serialize};

/// Caller options of a new table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableOptions {
    /// Table name; `Table{id}` when empty.
    pub name: String,
    /// Style name, e.g. `TableStyleMedium2`. No style element when empty.
    pub style: String,
    pub show_first_column: bool,
    pub show_last_column: bool,
    pub show_row_stripes: bool,
    pub show_column_stripes: bool,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            name: String::new(),
            style: String::new(),
            show_first_column: false,
            show_last_column: false,
            show_row_stripes: true,
            show_column_stripes: false,
        }
    }
}

impl TableOptions {
    /// Check the table name, if any.
    ///
    /// A name starts with a letter, `_` or `\`, continues with letters,
    /// digits, `_` and `.`, and must not read as a cell reference.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Ok(());
        }
        let invalid = || Error::InvalidOptions(format!("invalid table name {:?}", self.name));
        let mut chars = self.name.chars();
        let first_ok = chars
            .next()
            .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '\\');
        if !first_ok || !chars.all(|c| c.is_alphanumeric() || c == '_' || c == '.') {
            return Err(invalid());
        }
        if self.name.chars().count() > 255 || cell_name_to_coordinates(&self.name).is_ok() {
            return Err(invalid());
        }
        Ok(())
    }
}

/// A table column.
#[derive(Debug, Clone, PartialEq)]
pub struct TableColumn {
    pub id: u32,
    pub name: String,
}

/// Table style information for visual formatting.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableStyleInfo {
    pub name: String,
    pub show_first_column: bool,
    pub show_last_column: bool,
    pub show_row_stripes: bool,
    pub show_column_stripes: bool,
}

/// A table part (`xl/tables/table{id}.xml`).
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub id: u32,
    pub name: String,
    pub display_name: String,
    /// Range covered by the table, header row included.
    pub reference: String,
    pub columns: Vec<TableColumn>,
    pub style_info: Option<TableStyleInfo>,
}

impl Table {
    /// Build a table over `reference` whose columns are named by `headers`.
    ///
    /// Blank headers become `Column{n}`, and repeated ones get a numeric
    /// suffix, since Excel requires unique column names.
    pub fn new(id: u32, reference: String, headers: &[String], options: &TableOptions) -> Self {
        let name = if options.name.is_empty() {
            format!("Table{id}")
        } else {
            options.name.clone()
        };

        let mut columns: Vec<TableColumn> = Vec::with_capacity(headers.len());
        for (idx, header) in headers.iter().enumerate() {
            let base = if header.trim().is_empty() {
                format!("Column{}", idx + 1)
            } else {
                header.clone()
            };
            let mut unique = base.clone();
            let mut suffix = 2;
            while columns.iter().any(|c| c.name.eq_ignore_ascii_case(&unique)) {
                unique = format!("{base}{suffix}");
                suffix += 1;
            }
            columns.push(TableColumn {
                id: idx as u32 + 1,
                name: unique,
            });
        }

        let style_info = (!options.style.is_empty()).then(|| TableStyleInfo {
            name: options.style.clone(),
            show_first_column: options.show_first_column,
            show_last_column: options.show_last_column,
            show_row_stripes: options.show_row_stripes,
            show_column_stripes: options.show_column_stripes,
        });

        Self {
            id,
            display_name: name.clone(),
            name,
            reference,
            columns,
            style_info,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_table_names_columns() {
        let headers = vec!["Name".to_string(), String::new(), "name".to_string()];
        let table = Table::new(3, "A1:C4".into(), &headers, &TableOptions::default());

        assert_eq!(table.name, "Table3");
        assert_eq!(table.display_name, "Table3");
        let names: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Name", "Column2", "name2"]);
        assert!(table.style_info.is_none());
    }

    #[test]
    fn test_validate_table_name() {
        let named = |name: &str| TableOptions {
            name: name.to_string(),
            ..Default::default()
        };
        assert!(named("Sales_2024").validate().is_ok());
        assert!(named("").validate().is_ok());
        for bad in ["1Table", "My Table", "A1", "Sales-2024"] {
            assert!(matches!(named(bad).validate(), Err(Error::InvalidOptions(_))), "{bad}");
        }
    }

    #[test]
    fn test_style_info_follows_options() {
        let options = TableOptions {
            name: "Sales".into(),
            style: "TableStyleMedium9".into(),
            show_first_column: true,
            ..Default::default()
        };
        let table = Table::new(1, "B2:C3".into(), &["A".into(), "B".into()], &options);
        assert_eq!(table.name, "Sales");
        let style = table.style_info.unwrap();
        assert_eq!(style.name, "TableStyleMedium9");
        assert!(style.show_first_column && style.show_row_stripes);
        assert!(!style.show_column_stripes);
    }
}

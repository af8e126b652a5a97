//! Excel workbook document.
//!
//! [`Workbook`] owns an OPC package and the parts parsed out of it: the
//! workbook part, the calculation chain, shared strings, styles, and a
//! cache of worksheets parsed on first access. Every method takes `&self`;
//! the parts sit behind their own locks, acquired in the order worksheet,
//! workbook part, calculation chain, package.
//!
//! ```rust,no_run
//! use longan::Workbook;
//!
//! let workbook = Workbook::open("report.xlsx")?;
//! workbook.insert_row("Sheet1", 2)?;
//! workbook.set_cell_value("Sheet1", "A2", "inserted")?;
//! workbook.save("report.xlsx")?;
//! # Ok::<(), longan::Error>(())
//! ```

use crate::common::error::{Error, Result};
use crate::ooxml::opc::constants::{content_type as ct, relationship_type as rt};
use crate::ooxml::opc::{OpcPackage, PartData};
use crate::ooxml::xlsx::adjust::{Axis, Edit, WorkbookPlan, WorksheetPlan};
use crate::ooxml::xlsx::book::{
    DefinedName, FILTER_DATABASE, SheetEntry, WorkbookChild, WorkbookPart, WorkbookPrOptions,
    validate_sheet_name,
};
use crate::ooxml::xlsx::cache::{SharedWorksheet, WorksheetCache};
use crate::ooxml::xlsx::calc_chain::CalcChain;
use crate::ooxml::xlsx::cell::{
    cell_name_to_coordinates, column_name_to_number, coordinates_to_cell_name,
    coordinates_to_range_ref, range_ref_to_coordinates, sort_coordinates,
};
use crate::ooxml::xlsx::grid::normalize_worksheet;
use crate::ooxml::xlsx::options::Options;
use crate::ooxml::xlsx::parsers::workbook_parser::parse_workbook;
use crate::ooxml::xlsx::parsers::worksheet_parser::parse_worksheet;
use crate::ooxml::xlsx::shared_strings::{SharedStrings, item_text};
use crate::ooxml::xlsx::styles::StyleSheet;
use crate::ooxml::xlsx::table::Table;
use crate::ooxml::xlsx::template;
use crate::ooxml::xlsx::value::{CellValue, RichTextRun, encode_text, encode_value};
use crate::ooxml::xlsx::worksheet::{AutoFilter, Cell, CellFormula, Worksheet};
use crate::ooxml::xlsx::writer::sheet::serialize_worksheet;
use crate::ooxml::xlsx::writer::stream::StreamWriter;
use crate::ooxml::xlsx::writer::table::serialize_table;
use crate::ooxml::xlsx::writer::workbook::serialize_workbook;
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::io::{Cursor, Seek, Write};
use std::path::Path;

const WORKBOOK_PART: &str = "xl/workbook.xml";
const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";
const STYLES_PART: &str = "xl/styles.xml";

/// A sheet resolved to its part.
#[derive(Debug, Clone)]
struct SheetTarget {
    /// Name as stored in the workbook
    name: String,
    sheet_id: u32,
    /// Zero-based position in the sheet list
    index: usize,
    part: String,
}

/// A lazily loaded workbook-level part.
#[derive(Debug)]
struct LazyPart<T> {
    /// Member name, once the part exists in the package
    part: Option<String>,
    value: Option<T>,
}

/// An XLSX workbook.
#[derive(Debug)]
pub struct Workbook {
    package: Mutex<OpcPackage>,
    book_part: String,
    book: RwLock<WorkbookPart>,
    calc_chain: Mutex<LazyPart<CalcChain>>,
    shared_strings: Mutex<LazyPart<SharedStrings>>,
    styles: Mutex<LazyPart<StyleSheet>>,
    worksheets: WorksheetCache,
    /// Worksheet parts with an active stream writer
    streaming: Mutex<HashSet<String>>,
}

impl Workbook {
    /// Create a workbook with one empty sheet named `Sheet1`.
    pub fn new() -> Result<Self> {
        let mut package = OpcPackage::new();
        package.set("_rels/.rels", template::ROOT_RELS_XML.as_bytes().to_vec(), None);
        package.set(
            WORKBOOK_PART,
            template::WORKBOOK_XML.as_bytes().to_vec(),
            Some(ct::SML_SHEET_MAIN),
        );
        package.set(
            "xl/_rels/workbook.xml.rels",
            template::WORKBOOK_RELS_XML.as_bytes().to_vec(),
            None,
        );
        package.set(
            "xl/worksheets/sheet1.xml",
            template::WORKSHEET_XML.as_bytes().to_vec(),
            Some(ct::SML_WORKSHEET),
        );
        package.set(STYLES_PART, template::STYLES_XML.as_bytes().to_vec(), Some(ct::SML_STYLES));
        Self::from_package(package)
    }

    /// Open a workbook file with default [`Options`].
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_options(path, Options::default())
    }

    /// Open a workbook file with explicit extraction limits.
    pub fn open_with_options<P: AsRef<Path>>(path: P, options: Options) -> Result<Self> {
        options.validate()?;
        Self::from_package(OpcPackage::open(path, options.extract_limits())?)
    }

    /// Load a workbook from in-memory package bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_bytes_with_options(bytes, Options::default())
    }

    pub fn from_bytes_with_options(bytes: &[u8], options: Options) -> Result<Self> {
        options.validate()?;
        Self::from_package(OpcPackage::from_reader(Cursor::new(bytes), options.extract_limits())?)
    }

    fn from_package(mut package: OpcPackage) -> Result<Self> {
        let book_part = package.main_part()?;
        let book = parse_workbook(&package.read_xml(&book_part)?)?;

        let rels = package.rels(&book_part)?;
        let existing = |reltype: &str| rels.part_with_reltype(reltype);
        let (calc_chain_part, strings_part, styles_part) =
            (existing(rt::CALC_CHAIN), existing(rt::SHARED_STRINGS), existing(rt::STYLES));

        let calc_chain = match &calc_chain_part {
            Some(part) if package.contains(part) => Some(CalcChain::parse(&package.read_xml(part)?)?),
            Some(part) => {
                log::warn!("calculation chain {part} is referenced but missing");
                None
            },
            None => None,
        };

        log::debug!("loaded workbook {book_part} with {} sheets", book.sheets.len());
        Ok(Self {
            package: Mutex::new(package),
            book_part,
            book: RwLock::new(book),
            calc_chain: Mutex::new(LazyPart {
                part: calc_chain_part,
                value: calc_chain,
            }),
            shared_strings: Mutex::new(LazyPart {
                part: strings_part,
                value: None,
            }),
            styles: Mutex::new(LazyPart {
                part: styles_part,
                value: None,
            }),
            worksheets: WorksheetCache::new(),
            streaming: Mutex::new(HashSet::new()),
        })
    }

    /// Save the workbook to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let mut sink = self.write_to(std::io::BufWriter::new(file))?;
        sink.flush()?;
        Ok(())
    }

    /// Serialize the workbook into package bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.write_to(Cursor::new(Vec::new()))?.into_inner())
    }

    /// Write the workbook as a package into a seekable sink.
    pub fn write_to<W: Write + Seek>(&self, sink: W) -> Result<W> {
        self.sync_parts()?;
        self.package.lock().write_to(sink)
    }

    /// Serialize every parsed part back into the package.
    fn sync_parts(&self) -> Result<()> {
        for (part, sheet) in self.worksheets.loaded() {
            let xml = serialize_worksheet(&sheet.lock())?;
            self.package.lock().set(&part, xml.into_bytes(), None);
        }

        let book_xml = serialize_workbook(&self.book.read())?;
        self.package.lock().set(&self.book_part, book_xml.into_bytes(), None);

        {
            let calc_chain = self.calc_chain.lock();
            if let (Some(part), Some(chain)) = (&calc_chain.part, &calc_chain.value) {
                self.package.lock().set(part, chain.to_xml()?.into_bytes(), None);
            }
        }

        let mut strings = self.shared_strings.lock();
        if let Some(table) = strings.value.as_ref().filter(|table| table.is_dirty()) {
            let xml = table.to_xml()?.into_bytes();
            let part = self.ensure_book_part(
                &mut strings.part,
                SHARED_STRINGS_PART,
                rt::SHARED_STRINGS,
                ct::SML_SHARED_STRINGS,
            )?;
            self.package.lock().set(&part, xml, None);
        }
        drop(strings);

        let mut styles = self.styles.lock();
        if let Some(sheet) = styles.value.as_ref().filter(|sheet| sheet.is_dirty()) {
            let xml = sheet.to_xml().into_bytes();
            let part = self.ensure_book_part(&mut styles.part, STYLES_PART, rt::STYLES, ct::SML_STYLES)?;
            self.package.lock().set(&part, xml, None);
        }
        Ok(())
    }

    /// Member name of a workbook-level part, relating a new one to the
    /// workbook the first time.
    fn ensure_book_part(
        &self,
        part: &mut Option<String>,
        default: &str,
        reltype: &str,
        content_type: &str,
    ) -> Result<String> {
        if let Some(part) = part {
            return Ok(part.clone());
        }
        let mut package = self.package.lock();
        let rels = package.rels_mut(&self.book_part)?;
        let target = rels.relative_ref(default);
        rels.get_or_add(reltype, &target);
        package.content_types_mut().set_override(default, content_type);
        *part = Some(default.to_string());
        Ok(default.to_string())
    }

    /// Names of all sheets in workbook order.
    pub fn sheet_names(&self) -> Vec<String> {
        self.book.read().sheets.iter().map(|s| s.name.clone()).collect()
    }

    /// Whether dates are stored in the 1904 date system.
    pub fn date1904(&self) -> bool {
        self.book.read().properties.date1904
    }

    /// Workbook properties: the 1904 date system flag, filter privacy and
    /// the code name. Every field is `Some`.
    pub fn workbook_pr_options(&self) -> WorkbookPrOptions {
        self.book.read().properties.options()
    }

    /// Change the workbook properties set in `options`.
    ///
    /// Switching the date system affects values written afterwards; stored
    /// serial numbers are not converted.
    pub fn set_workbook_pr_options(&self, options: &WorkbookPrOptions) {
        let mut book = self.book.write();
        book.properties.apply(options);
        book.ensure_child(WorkbookChild::WorkbookPr);
    }

    /// Drop the cached result of every formula cell on every sheet, so the
    /// application recalculates them on open.
    pub fn update_linked_value(&self) -> Result<()> {
        for name in self.sheet_names() {
            let target = self.sheet_target(&name)?;
            let ws = self.worksheet(&target)?;
            let mut ws = ws.lock();
            let mut cleared = 0usize;
            for cell in ws.rows.iter_mut().flat_map(|row| row.cells.iter_mut()) {
                if cell.formula.is_some() && cell.value.is_some() {
                    cell.value = None;
                    cell.cell_type = None;
                    cleared += 1;
                }
            }
            log::debug!("cleared {cleared} cached formula values on sheet {name}");
        }
        Ok(())
    }

    /// Append an empty sheet.
    pub fn new_sheet(&self, name: &str) -> Result<()> {
        validate_sheet_name(name)?;
        let mut book = self.book.write();
        if book.sheet(name).is_some() {
            return Err(Error::SheetExists(name.to_string()));
        }

        let mut package = self.package.lock();
        let index = package.next_index("xl/worksheets/sheet");
        let part = format!("xl/worksheets/sheet{index}.xml");
        package.set(&part, template::WORKSHEET_XML.as_bytes().to_vec(), Some(ct::SML_WORKSHEET));
        let rels = package.rels_mut(&self.book_part)?;
        let target = rels.relative_ref(&part);
        let r_id = rels.add_relationship(rt::WORKSHEET, &target, false).r_id().to_string();

        let sheet_id = book.next_sheet_id();
        book.sheets.push(SheetEntry {
            name: name.to_string(),
            sheet_id,
            r_id,
            extra: Default::default(),
        });
        log::debug!("added sheet {name} as {part}");
        Ok(())
    }

    fn sheet_target(&self, sheet: &str) -> Result<SheetTarget> {
        let book = self.book.read();
        let index = book
            .sheet_index(sheet)
            .ok_or_else(|| Error::SheetNotFound(sheet.to_string()))?;
        let entry = &book.sheets[index];

        let mut package = self.package.lock();
        let rels = package.rels(&self.book_part)?;
        let part = rels
            .get(&entry.r_id)
            .and_then(|rel| rels.target_part(rel))
            .ok_or_else(|| Error::MissingPart(format!("worksheet of sheet {}", entry.name)))?;

        Ok(SheetTarget {
            name: entry.name.clone(),
            sheet_id: entry.sheet_id,
            index,
            part,
        })
    }

    /// The parsed worksheet of a sheet, loading it on first access.
    fn worksheet(&self, target: &SheetTarget) -> Result<SharedWorksheet> {
        if self.streaming.lock().contains(&target.part) {
            return Err(Error::SheetStreaming(target.name.clone()));
        }
        self.worksheets.get_or_load(&target.part, || {
            let xml = self.package.lock().read_xml(&target.part)?;
            let mut ws = parse_worksheet(&xml)?;
            normalize_worksheet(&mut ws)?;
            Ok(ws)
        })
    }

    /// Run `f` on the normalized grid of a sheet.
    pub fn with_worksheet<R>(&self, sheet: &str, f: impl FnOnce(&mut Worksheet) -> R) -> Result<R> {
        let target = self.sheet_target(sheet)?;
        let ws = self.worksheet(&target)?;
        let mut ws = ws.lock();
        Ok(f(&mut ws))
    }

    /// Set the value of a cell.
    ///
    /// Text goes to the shared-string table. A [`CellValue::Styled`] value
    /// also sets the cell style and formula; [`CellValue::Nil`] clears the
    /// value and keeps the style.
    pub fn set_cell_value(&self, sheet: &str, cell: &str, value: impl Into<CellValue>) -> Result<()> {
        let (col, row) = cell_name_to_coordinates(cell)?;
        let value = value.into();
        let target = self.sheet_target(sheet)?;
        let date1904 = self.date1904();
        let ws = self.worksheet(&target)?;
        let mut ws = ws.lock();
        let slot = ws.cell_mut(col, row)?;
        self.store_value(slot, &value, date1904)
    }

    fn store_value(&self, cell: &mut Cell, value: &CellValue, date1904: bool) -> Result<()> {
        let mut formula = None;
        let mut value = value;
        while let CellValue::Styled(styled) = value {
            cell.style = styled.style;
            formula = styled.formula.as_deref().filter(|f| !f.is_empty());
            value = &styled.value;
        }

        cell.clear_value();
        cell.formula = formula.map(|text| CellFormula {
            text: text.to_string(),
            ..Default::default()
        });
        match value {
            CellValue::Nil | CellValue::Styled(_) => {},
            CellValue::RichText(runs) => {
                cell.cell_type = Some("s".to_string());
                cell.value = Some(self.append_rich_text(runs)?.to_string());
            },
            CellValue::String(text) => self.store_shared(cell, text)?,
            CellValue::Bytes(bytes) => self.store_shared(cell, &String::from_utf8_lossy(bytes))?,
            other => {
                let encoded = encode_value(other, date1904).unwrap_or_default();
                if encoded.is_date && cell.style == 0 {
                    cell.style = self.register_date_style()?;
                }
                cell.cell_type = encoded.cell_type.map(str::to_string);
                cell.value = Some(encoded.value);
            },
        }
        Ok(())
    }

    fn store_shared(&self, cell: &mut Cell, text: &str) -> Result<()> {
        let index = self.with_shared_strings(|table| Ok(table.add_string(&encode_text(text).value)))?;
        cell.cell_type = Some("s".to_string());
        cell.value = Some(index.to_string());
        Ok(())
    }

    /// Unformatted text of a cell: shared and inline strings resolved,
    /// booleans as `TRUE`/`FALSE`, numbers as stored. Empty for a missing
    /// cell.
    pub fn get_cell_value(&self, sheet: &str, cell: &str) -> Result<String> {
        let (col, row) = cell_name_to_coordinates(cell)?;
        let target = self.sheet_target(sheet)?;
        let ws = self.worksheet(&target)?;
        let ws = ws.lock();
        match ws.cell(col, row) {
            Some(cell) => self.cell_text(cell),
            None => Ok(String::new()),
        }
    }

    /// Text of every row, with trailing empty cells and rows dropped.
    pub fn get_rows(&self, sheet: &str) -> Result<Vec<Vec<String>>> {
        let target = self.sheet_target(sheet)?;
        let ws = self.worksheet(&target)?;
        let ws = ws.lock();

        let mut rows = Vec::with_capacity(ws.rows.len());
        for row in &ws.rows {
            let mut values = row
                .cells
                .iter()
                .map(|cell| self.cell_text(cell))
                .collect::<Result<Vec<_>>>()?;
            while values.last().is_some_and(String::is_empty) {
                values.pop();
            }
            rows.push(values);
        }
        while rows.last().is_some_and(Vec::is_empty) {
            rows.pop();
        }
        Ok(rows)
    }

    fn cell_text(&self, cell: &Cell) -> Result<String> {
        match cell.cell_type.as_deref() {
            Some("s") => {
                let index = cell
                    .value
                    .as_deref()
                    .and_then(|v| atoi_simd::parse_pos::<usize, false>(v.trim().as_bytes()).ok());
                match index {
                    Some(index) => Ok(self.shared_string(index).unwrap_or_default()),
                    None => Ok(String::new()),
                }
            },
            Some("inlineStr") => match &cell.inline_string {
                Some(xml) => Ok(item_text(xml.as_bytes())?.0),
                None => Ok(cell.value.clone().unwrap_or_default()),
            },
            Some("b") => Ok(match cell.value.as_deref().map(str::trim) {
                Some("1") | Some("true") => "TRUE".to_string(),
                Some(_) => "FALSE".to_string(),
                None => String::new(),
            }),
            _ => Ok(cell.value.clone().unwrap_or_default()),
        }
    }

    /// Merge the range between two corner cells.
    ///
    /// Existing merged ranges that overlap the new one are folded into it.
    pub fn merge_cell(&self, sheet: &str, top_left: &str, bottom_right: &str) -> Result<()> {
        let (c1, r1) = cell_name_to_coordinates(top_left)?;
        let (c2, r2) = cell_name_to_coordinates(bottom_right)?;
        let mut area = [c1, r1, c2, r2];
        sort_coordinates(&mut area);

        let target = self.sheet_target(sheet)?;
        let ws = self.worksheet(&target)?;
        let mut ws = ws.lock();

        let mut existing = Vec::with_capacity(ws.merge_cells.len());
        for reference in &ws.merge_cells {
            let mut coordinates = range_ref_to_coordinates(reference)?;
            sort_coordinates(&mut coordinates);
            existing.push(coordinates);
        }
        loop {
            let overlapping = existing.iter().position(|other| overlaps(&area, other));
            let Some(position) = overlapping else {
                break;
            };
            let other = existing.remove(position);
            area = [
                area[0].min(other[0]),
                area[1].min(other[1]),
                area[2].max(other[2]),
                area[3].max(other[3]),
            ];
        }
        existing.push(area);

        ws.merge_cells = existing
            .iter()
            .map(coordinates_to_range_ref)
            .collect::<Result<_>>()?;
        Ok(())
    }

    /// Merged ranges of a sheet.
    pub fn merge_cells(&self, sheet: &str) -> Result<Vec<String>> {
        self.with_worksheet(sheet, |ws| ws.merge_cells.clone())
    }

    /// Put an auto-filter on a range and record its hidden
    /// `_xlnm._FilterDatabase` name.
    pub fn set_auto_filter(&self, sheet: &str, range: &str) -> Result<()> {
        let mut coordinates = range_ref_to_coordinates(range)?;
        sort_coordinates(&mut coordinates);
        let reference = coordinates_to_range_ref(&coordinates)?;
        let target = self.sheet_target(sheet)?;

        let ws = self.worksheet(&target)?;
        let mut ws = ws.lock();
        ws.auto_filter = Some(AutoFilter {
            reference: reference.clone(),
            ..Default::default()
        });

        let absolute = reference
            .split(':')
            .map(|cell| {
                let (col, row) = cell_name_to_coordinates(cell)?;
                coordinates_to_cell_name(col, row, true)
            })
            .collect::<Result<Vec<_>>>()?
            .join(":");
        let mut book = self.book.write();
        book.set_defined_name(DefinedName {
            name: FILTER_DATABASE.to_string(),
            value: format!("'{}'!{absolute}", target.name.replace('\'', "''")),
            local_sheet_id: Some(target.index as u32),
            hidden: true,
            ..Default::default()
        });
        Ok(())
    }

    /// Insert or replace a defined name with the same name and scope.
    pub fn set_defined_name(&self, name: DefinedName) -> Result<()> {
        if name.name.trim().is_empty() {
            return Err(Error::InvalidOptions("defined name must not be empty".to_string()));
        }
        let mut book = self.book.write();
        if let Some(scope) = name.local_sheet_id.filter(|&scope| scope as usize >= book.sheets.len()) {
            return Err(Error::InvalidOptions(format!("no sheet at scope index {scope}")));
        }
        book.set_defined_name(name);
        Ok(())
    }

    pub fn defined_names(&self) -> Vec<DefinedName> {
        self.book.read().defined_names.clone()
    }

    /// Insert an empty row before `row`.
    pub fn insert_row(&self, sheet: &str, row: u32) -> Result<()> {
        self.adjust(sheet, Edit::insert(Axis::Rows, check_row(row)?))
    }

    /// Delete `row`, moving the rows below it up.
    pub fn remove_row(&self, sheet: &str, row: u32) -> Result<()> {
        self.adjust(sheet, Edit::delete(Axis::Rows, check_row(row)?))
    }

    /// Insert an empty column before the column named `col`.
    pub fn insert_col(&self, sheet: &str, col: &str) -> Result<()> {
        self.adjust(sheet, Edit::insert(Axis::Columns, column_name_to_number(col)?))
    }

    /// Delete the column named `col`, moving the columns right of it left.
    pub fn remove_col(&self, sheet: &str, col: &str) -> Result<()> {
        self.adjust(sheet, Edit::delete(Axis::Columns, column_name_to_number(col)?))
    }

    /// Run one structural edit. Every rewrite is staged first; nothing
    /// changes unless all of them succeed.
    fn adjust(&self, sheet: &str, edit: Edit) -> Result<()> {
        let target = self.sheet_target(sheet)?;
        let ws = self.worksheet(&target)?;
        let mut ws = ws.lock();
        let plan = WorksheetPlan::new(&ws, &target.name, edit)?;

        let mut book = self.book.write();
        let mut calc_chain = self.calc_chain.lock();
        let mut book_plan = WorkbookPlan::new(
            calc_chain.value.as_ref(),
            &book.defined_names,
            &target.name,
            target.sheet_id,
            &edit,
        )?;
        if plan.removes_auto_filter() {
            book_plan.drop_filter_database(target.index as u32);
        }

        plan.commit(&mut ws);
        book.defined_names = book_plan.defined_names;
        match book_plan.calc_chain {
            Some(chain) if chain.is_empty() => {
                calc_chain.value = None;
                if let Some(part) = calc_chain.part.take() {
                    let mut package = self.package.lock();
                    package.remove(&part);
                    package
                        .rels_mut(&self.book_part)?
                        .retain(|rel| rel.reltype() != rt::CALC_CHAIN);
                }
            },
            chain => calc_chain.value = chain,
        }
        log::debug!("applied {edit:?} to sheet {}", target.name);
        Ok(())
    }

    /// Open a stream writer that replaces the sheet data of `sheet`.
    ///
    /// Elements around the sheet data are kept; merged ranges and column
    /// widths come from the writer. Pending grid changes to the sheet are
    /// written into the package first, so dropping the writer unflushed
    /// leaves the sheet as it was.
    pub fn new_stream_writer(&self, sheet: &str) -> Result<StreamWriter<'_>> {
        let target = self.sheet_target(sheet)?;
        let date1904 = self.date1904();
        let shared = self.worksheet(&target)?;
        let layout = {
            let ws = shared.lock();
            if !self.streaming.lock().insert(target.part.clone()) {
                return Err(Error::SheetStreaming(target.name));
            }
            let xml = serialize_worksheet(&ws)?;
            self.package.lock().set(&target.part, xml.into_bytes(), None);
            ws.layout()
        };
        self.worksheets.invalidate(&target.part);
        StreamWriter::new(self, target.name, target.part, layout, date1904)
    }

    /// Install streamed sheet content and reopen the sheet to grid access.
    pub(crate) fn finish_stream(&self, part: &str, data: PartData) {
        self.package.lock().set_data(part, data);
        self.worksheets.invalidate(part);
        self.streaming.lock().remove(part);
    }

    pub(crate) fn abandon_stream(&self, part: &str) {
        self.streaming.lock().remove(part);
    }

    /// Write a new table part related to `sheet_part`. `build` receives the
    /// table id. Returns the relationship id of the table.
    pub(crate) fn add_table_part(
        &self,
        sheet_part: &str,
        build: impl FnOnce(u32) -> Table,
    ) -> Result<String> {
        let mut package = self.package.lock();
        let id = package.next_index("xl/tables/table");
        let table = build(id);
        let part = format!("xl/tables/table{id}.xml");
        package.set(&part, serialize_table(&table)?.into_bytes(), Some(ct::SML_TABLE));

        let rels = package.rels_mut(sheet_part)?;
        let target = rels.relative_ref(&part);
        let r_id = rels.add_relationship(rt::TABLE, &target, false).r_id().to_string();
        log::debug!("added table {} over {} as {part}", table.name, table.reference);
        Ok(r_id)
    }

    fn with_shared_strings<R>(&self, f: impl FnOnce(&mut SharedStrings) -> Result<R>) -> Result<R> {
        let mut strings = self.shared_strings.lock();
        if strings.value.is_none() {
            let table = match &strings.part {
                Some(part) => {
                    let package = self.package.lock();
                    if package.contains(part) {
                        SharedStrings::parse(&package.read_xml(part)?)?
                    } else {
                        log::warn!("shared strings {part} are referenced but missing");
                        SharedStrings::new()
                    }
                },
                None => SharedStrings::new(),
            };
            strings.value = Some(table);
        }
        match strings.value.as_mut() {
            Some(table) => f(table),
            None => Err(Error::MissingPart(SHARED_STRINGS_PART.to_string())),
        }
    }

    /// Text of a shared-string item.
    pub(crate) fn shared_string(&self, index: usize) -> Option<String> {
        self.with_shared_strings(|table| Ok(table.get(index).map(str::to_string)))
            .ok()
            .flatten()
    }

    /// Append a rich text item to the shared-string table.
    pub(crate) fn append_rich_text(&self, runs: &[RichTextRun]) -> Result<usize> {
        self.with_shared_strings(|table| table.append_rich_text(runs))
    }

    /// Style index of the default date-time format, registering it on first
    /// use.
    pub(crate) fn register_date_style(&self) -> Result<u32> {
        let mut styles = self.styles.lock();
        if styles.value.is_none() {
            let xml = match &styles.part {
                Some(part) => self.package.lock().read_xml(part)?,
                None => template::STYLES_XML.as_bytes().to_vec(),
            };
            styles.value = Some(StyleSheet::parse(&xml)?);
        }
        match styles.value.as_mut() {
            Some(sheet) => Ok(sheet.register_date_style()),
            None => Err(Error::MissingPart(STYLES_PART.to_string())),
        }
    }
}

fn check_row(row: u32) -> Result<u32> {
    if row == 0 {
        return Err(Error::InvalidRowNumber(0));
    }
    Ok(row)
}

fn overlaps(a: &[u32; 4], b: &[u32; 4]) -> bool {
    a[0] <= b[2] && b[0] <= a[2] && a[1] <= b[3] && b[1] <= a[3]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn reopen(workbook: &Workbook) -> Workbook {
        Workbook::from_bytes(&workbook.to_bytes().unwrap()).unwrap()
    }

    #[test]
    fn test_new_workbook_round_trip() {
        let workbook = Workbook::new().unwrap();
        assert_eq!(workbook.sheet_names(), ["Sheet1"]);
        workbook.set_cell_value("Sheet1", "B2", "hello").unwrap();
        workbook.set_cell_value("Sheet1", "C2", 42).unwrap();
        workbook.set_cell_value("Sheet1", "D2", true).unwrap();

        let reopened = reopen(&workbook);
        assert_eq!(reopened.get_cell_value("Sheet1", "B2").unwrap(), "hello");
        assert_eq!(reopened.get_cell_value("Sheet1", "C2").unwrap(), "42");
        assert_eq!(reopened.get_cell_value("Sheet1", "D2").unwrap(), "TRUE");
        assert_eq!(reopened.get_cell_value("Sheet1", "Z9").unwrap(), "");
        assert_eq!(
            reopened.get_rows("Sheet1").unwrap(),
            vec![vec![], vec![String::new(), "hello".into(), "42".into(), "TRUE".into()]]
        );
    }

    #[test]
    fn test_save_and_open_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.xlsx");
        let workbook = Workbook::new().unwrap();
        workbook.new_sheet("Data").unwrap();
        workbook.set_cell_value("Data", "A1", "x").unwrap();
        workbook.save(&path).unwrap();

        let reopened = Workbook::open(&path).unwrap();
        assert_eq!(reopened.sheet_names(), ["Sheet1", "Data"]);
        assert_eq!(reopened.get_cell_value("data", "A1").unwrap(), "x");
    }

    #[test]
    fn test_sheet_lookup_errors() {
        let workbook = Workbook::new().unwrap();
        assert!(matches!(workbook.get_rows("Missing"), Err(Error::SheetNotFound(_))));
        assert!(matches!(workbook.new_sheet("sheet1"), Err(Error::SheetExists(_))));
        assert!(matches!(workbook.new_sheet("a/b"), Err(Error::InvalidSheetName(_))));
        assert!(matches!(workbook.insert_row("Sheet1", 0), Err(Error::InvalidRowNumber(0))));
        assert!(matches!(workbook.insert_col("Sheet1", "1"), Err(Error::InvalidColumnName(_))));
    }

    #[test]
    fn test_insert_and_remove_rows_and_columns() {
        let workbook = Workbook::new().unwrap();
        workbook.set_cell_value("Sheet1", "A1", "a1").unwrap();
        workbook.set_cell_value("Sheet1", "B2", "b2").unwrap();
        workbook
            .set_cell_value("Sheet1", "C3", CellValue::styled(0, Some("A1&B2"), CellValue::Nil))
            .unwrap();
        workbook.merge_cell("Sheet1", "A2", "B3").unwrap();

        workbook.insert_row("Sheet1", 2).unwrap();
        assert_eq!(workbook.get_cell_value("Sheet1", "B3").unwrap(), "b2");
        assert_eq!(workbook.merge_cells("Sheet1").unwrap(), ["A3:B4"]);
        let formula = workbook
            .with_worksheet("Sheet1", |ws| ws.cell(3, 4).and_then(|c| c.formula.clone()))
            .unwrap();
        assert_eq!(formula.unwrap().text, "A1&B3");

        workbook.insert_col("Sheet1", "A").unwrap();
        assert_eq!(workbook.get_cell_value("Sheet1", "C3").unwrap(), "b2");
        assert_eq!(workbook.merge_cells("Sheet1").unwrap(), ["B3:C4"]);

        workbook.remove_col("Sheet1", "A").unwrap();
        workbook.remove_row("Sheet1", 2).unwrap();
        assert_eq!(workbook.get_cell_value("Sheet1", "A1").unwrap(), "a1");
        assert_eq!(workbook.get_cell_value("Sheet1", "B2").unwrap(), "b2");
        assert_eq!(workbook.merge_cells("Sheet1").unwrap(), ["A2:B3"]);
    }

    #[test]
    fn malformed_merge_fails_without_changes() {
        let workbook = Workbook::new().unwrap();
        workbook.set_cell_value("Sheet1", "A1", "keep").unwrap();
        workbook
            .with_worksheet("Sheet1", |ws| ws.merge_cells.push("A:B1".to_string()))
            .unwrap();
        workbook
            .set_defined_name(DefinedName {
                name: "Area".into(),
                value: "Sheet1!$A$1:$A$3".into(),
                ..Default::default()
            })
            .unwrap();

        assert!(workbook.insert_row("Sheet1", 1).is_err());
        assert_eq!(workbook.get_cell_value("Sheet1", "A1").unwrap(), "keep");
        assert_eq!(workbook.defined_names()[0].value, "Sheet1!$A$1:$A$3");
    }

    #[test]
    fn test_defined_names_and_auto_filter_follow_edits() {
        let workbook = Workbook::new().unwrap();
        workbook.new_sheet("It's").unwrap();
        workbook
            .set_defined_name(DefinedName {
                name: "Total".into(),
                value: "Sheet1!$B$2".into(),
                ..Default::default()
            })
            .unwrap();
        workbook.set_auto_filter("Sheet1", "B4:A1").unwrap();
        workbook.set_auto_filter("It's", "A1:A2").unwrap();

        workbook.insert_row("Sheet1", 1).unwrap();
        let names = workbook.defined_names();
        assert_eq!(names[0].value, "Sheet1!$B$3");
        assert_eq!(names[1].name, FILTER_DATABASE);
        assert_eq!(names[1].value, "'Sheet1'!$A$2:$B$5");
        assert_eq!(names[2].value, "'It''s'!$A$1:$A$2");
        let filter = workbook.with_worksheet("Sheet1", |ws| ws.auto_filter.clone()).unwrap();
        assert_eq!(filter.unwrap().reference, "A2:B5");

        assert!(matches!(
            workbook.set_defined_name(DefinedName {
                name: "Scoped".into(),
                value: "1".into(),
                local_sheet_id: Some(5),
                ..Default::default()
            }),
            Err(Error::InvalidOptions(_))
        ));
    }

    #[test]
    fn deleting_the_filter_header_drops_its_name() {
        let workbook = Workbook::new().unwrap();
        workbook.new_sheet("Other").unwrap();
        workbook.set_auto_filter("Sheet1", "A1:B4").unwrap();
        workbook.set_auto_filter("Other", "A1:A2").unwrap();

        workbook.remove_row("Sheet1", 1).unwrap();
        let filter = workbook.with_worksheet("Sheet1", |ws| ws.auto_filter.clone()).unwrap();
        assert!(filter.is_none());
        let names = workbook.defined_names();
        assert_eq!(names.len(), 1);
        assert_eq!(names[0].local_sheet_id, Some(1));
        assert_eq!(names[0].value, "'Other'!$A$1:$A$2");

        let reopened = reopen(&workbook);
        assert_eq!(reopened.defined_names()[0].value, names[0].value);
        assert_eq!(reopened.defined_names().len(), 1);
    }

    #[test]
    fn bad_calc_chain_entry_leaves_sheet_untouched() {
        let workbook = Workbook::new().unwrap();
        workbook.set_cell_value("Sheet1", "A2", "x").unwrap();
        workbook.merge_cell("Sheet1", "A2", "B3").unwrap();
        {
            let mut package = workbook.package.lock();
            package.set(
                "xl/calcChain.xml",
                br#"<calcChain xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><c r="Q" i="1"/></calcChain>"#.to_vec(),
                Some(ct::SML_CALC_CHAIN),
            );
            package
                .rels_mut(WORKBOOK_PART)
                .unwrap()
                .add_relationship(rt::CALC_CHAIN, "calcChain.xml", false);
        }
        let workbook = reopen(&workbook);

        match workbook.insert_row("Sheet1", 1) {
            Err(Error::CellNameToCoordinates { cell, .. }) => assert_eq!(cell, "Q"),
            other => panic!("unexpected result {other:?}"),
        }
        assert_eq!(workbook.merge_cells("Sheet1").unwrap(), ["A2:B3"]);
        assert_eq!(workbook.get_cell_value("Sheet1", "A2").unwrap(), "x");
    }

    #[test]
    fn test_workbook_pr_options() {
        let workbook = Workbook::new().unwrap();
        assert_eq!(workbook.workbook_pr_options().date1904, Some(false));

        workbook.set_workbook_pr_options(&WorkbookPrOptions {
            date1904: Some(true),
            code_name: Some("Ledger".into()),
            ..Default::default()
        });
        let date = NaiveDate::from_ymd_opt(2011, 1, 1).unwrap();
        workbook.set_cell_value("Sheet1", "A1", date).unwrap();
        assert_eq!(workbook.get_cell_value("Sheet1", "A1").unwrap(), "39082");

        let reopened = reopen(&workbook);
        assert!(reopened.date1904());
        assert_eq!(
            reopened.workbook_pr_options(),
            WorkbookPrOptions {
                date1904: Some(true),
                filter_privacy: Some(false),
                code_name: Some("Ledger".into()),
            }
        );

        reopened.set_workbook_pr_options(&WorkbookPrOptions {
            filter_privacy: Some(true),
            code_name: Some(String::new()),
            ..Default::default()
        });
        let options = reopen(&reopened).workbook_pr_options();
        assert_eq!(options.date1904, Some(true));
        assert_eq!(options.filter_privacy, Some(true));
        assert_eq!(options.code_name.as_deref(), Some(""));
    }

    #[test]
    fn update_linked_value_clears_formula_results() {
        let workbook = Workbook::new().unwrap();
        workbook.new_sheet("Other").unwrap();
        workbook.set_cell_value("Sheet1", "A1", 1).unwrap();
        workbook
            .set_cell_value("Sheet1", "B1", CellValue::styled(0, Some("A1+1"), 2))
            .unwrap();
        workbook
            .set_cell_value("Other", "C2", CellValue::styled(0, Some("\"a\"&\"b\""), "ab"))
            .unwrap();
        assert_eq!(workbook.get_cell_value("Sheet1", "B1").unwrap(), "2");

        workbook.update_linked_value().unwrap();
        assert_eq!(workbook.get_cell_value("Sheet1", "A1").unwrap(), "1");
        assert_eq!(workbook.get_cell_value("Sheet1", "B1").unwrap(), "");
        assert_eq!(workbook.get_cell_value("Other", "C2").unwrap(), "");

        let reopened = reopen(&workbook);
        let cell = reopened.with_worksheet("Other", |ws| ws.cell(2, 3).cloned()).unwrap().unwrap();
        assert_eq!(cell.formula.unwrap().text, "\"a\"&\"b\"");
        assert!(cell.value.is_none());
        assert!(cell.cell_type.is_none());
    }

    #[test]
    fn test_merge_cell_folds_overlaps() {
        let workbook = Workbook::new().unwrap();
        workbook.merge_cell("Sheet1", "A1", "B2").unwrap();
        workbook.merge_cell("Sheet1", "D1", "E1").unwrap();
        workbook.merge_cell("Sheet1", "C3", "B2").unwrap();
        assert_eq!(workbook.merge_cells("Sheet1").unwrap(), ["D1:E1", "A1:C3"]);
    }

    #[test]
    fn test_dates_get_a_date_style() {
        let workbook = Workbook::new().unwrap();
        let date = NaiveDate::from_ymd_opt(2011, 1, 1).unwrap();
        workbook.set_cell_value("Sheet1", "A1", date).unwrap();
        let style = workbook.with_worksheet("Sheet1", |ws| ws.cell(1, 1).map(|c| c.style)).unwrap();
        assert_eq!(style, Some(1));
        assert_eq!(workbook.get_cell_value("Sheet1", "A1").unwrap(), "40544");
    }

    #[test]
    fn emptied_calc_chain_is_removed() {
        let workbook = Workbook::new().unwrap();
        {
            let mut package = workbook.package.lock();
            package.set(
                "xl/calcChain.xml",
                br#"<calcChain xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><c r="A2" i="1"/></calcChain>"#.to_vec(),
                Some(ct::SML_CALC_CHAIN),
            );
            package
                .rels_mut(WORKBOOK_PART)
                .unwrap()
                .add_relationship(rt::CALC_CHAIN, "calcChain.xml", false);
        }
        let workbook = reopen(&workbook);
        assert!(workbook.calc_chain.lock().value.is_some());

        workbook.remove_row("Sheet1", 2).unwrap();
        assert!(workbook.calc_chain.lock().value.is_none());

        let bytes = workbook.to_bytes().unwrap();
        let reopened = Workbook::from_bytes(&bytes).unwrap();
        assert!(!reopened.package.lock().contains("xl/calcChain.xml"));
        assert!(reopened.calc_chain.lock().part.is_none());
    }

    #[test]
    fn test_unzip_limit_is_enforced() {
        let bytes = Workbook::new().unwrap().to_bytes().unwrap();
        let options = Options {
            unzip_size_limit: 64,
            unzip_xml_size_limit: 32,
        };
        assert!(matches!(
            Workbook::from_bytes_with_options(&bytes, options),
            Err(Error::UnzipSizeLimitExceeded(64))
        ));
    }
}

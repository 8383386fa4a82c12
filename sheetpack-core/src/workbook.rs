//! Workbook representation and xlsx export.

#[cfg(feature = "fast-hash")]
use hashbrown::HashMap;
#[cfg(not(feature = "fast-hash"))]
use std::collections::HashMap;
use std::path::Path;

use chrono::{Local, NaiveDateTime};
use log::debug;

use crate::archive::{Blob, CompressionLevel, ZipWriter};
use crate::error::{Result, SheetpackError};
use crate::style::styles_xml;
use crate::utils::escape_xml;
use crate::writer;

/// MIME type of an Office Open XML spreadsheet.
pub const XLSX_MIME_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Longest sheet name Excel accepts.
pub const MAX_SHEET_NAME_LEN: usize = 31;
const FORBIDDEN_SHEET_NAME_CHARS: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];

/// One worksheet's data: optional header and footer rows around the body.
///
/// Values arrive as text; typing happens when the workbook is built. Empty
/// strings are blank cells.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Sheet {
    name: String,
    header: Option<Vec<String>>,
    rows: Vec<Vec<String>>,
    footer: Option<Vec<String>>,
}

fn to_row<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    values.into_iter().map(Into::into).collect()
}

impl Sheet {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Sheet {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the header row.
    pub fn with_header<I, S>(mut self, header: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.header = Some(to_row(header));
        self
    }

    /// Set the footer row.
    pub fn with_footer<I, S>(mut self, footer: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.footer = Some(to_row(footer));
        self
    }

    /// Append data rows.
    pub fn with_rows<R, I, S>(mut self, rows: R) -> Self
    where
        R: IntoIterator<Item = I>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.extend(rows.into_iter().map(to_row));
        self
    }

    /// Append one data row.
    pub fn push_row<I, S>(&mut self, row: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(to_row(row));
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn header(&self) -> Option<&[String]> {
        self.header.as_deref()
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn footer(&self) -> Option<&[String]> {
        self.footer.as_deref()
    }
}

/// The workbook-wide shared-string table.
///
/// Strings are keyed by their escaped XML form and keep the index they were
/// first given; indices are never reused.
#[derive(Clone, Debug, Default)]
pub struct SharedStrings {
    index: HashMap<String, u32>,
    strings: Vec<String>,
    references: usize,
}

impl SharedStrings {
    /// Index of `text`, adding it on first sight. Every call counts as one reference.
    pub fn intern(&mut self, text: &str) -> u32 {
        self.references += 1;
        let key = escape_xml(text);
        if let Some(&index) = self.index.get(&*key) {
            return index;
        }
        let index = self.strings.len() as u32;
        self.index.insert(key.into_owned(), index);
        self.strings.push(text.to_string());
        index
    }

    pub fn index_of(&self, text: &str) -> Option<u32> {
        self.index.get(&*escape_xml(text)).copied()
    }

    pub fn get(&self, index: u32) -> Option<&str> {
        self.strings.get(index as usize).map(String::as_str)
    }

    /// Number of distinct strings (`uniqueCount`).
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Number of cells referring to the table (`count`).
    pub fn references(&self) -> usize {
        self.references
    }

    /// Strings in index order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.strings.iter().map(String::as_str)
    }

    fn clear(&mut self) {
        self.index.clear();
        self.strings.clear();
        self.references = 0;
    }
}

/// A workbook under construction.
pub struct Workbook {
    sheets: Vec<Sheet>,
    shared_strings: SharedStrings,
    /// Sheets ever added, for `Sheet{n}` default names.
    sheet_counter: usize,
    compression: CompressionLevel,
    modified: Option<NaiveDateTime>,
}

impl Workbook {
    /// Create a new empty workbook.
    pub fn new() -> Self {
        Workbook {
            sheets: Vec::new(),
            shared_strings: SharedStrings::default(),
            sheet_counter: 0,
            compression: CompressionLevel::default(),
            modified: None,
        }
    }

    /// Set compression level for building.
    pub fn set_compression(&mut self, level: CompressionLevel) {
        self.compression = level;
    }

    /// Fix the timestamp written to the archive and the document properties.
    /// Without it the local time at build is used.
    pub fn set_modified(&mut self, modified: NaiveDateTime) {
        self.modified = Some(modified);
    }

    /// Create a new, empty worksheet. Without a title it is named `Sheet{n}`.
    pub fn create_sheet(&mut self, title: Option<String>) -> Result<&mut Sheet> {
        let title = title.unwrap_or_else(|| format!("Sheet{}", self.sheet_counter + 1));
        self.add_sheet(Sheet::new(title))
    }

    /// Add a populated worksheet.
    pub fn add_sheet(&mut self, sheet: Sheet) -> Result<&mut Sheet> {
        validate_sheet_name(&sheet.name)?;
        if self
            .sheets
            .iter()
            .any(|s| s.name.to_lowercase() == sheet.name.to_lowercase())
        {
            return Err(SheetpackError::WorksheetAlreadyExists(sheet.name));
        }

        self.sheet_counter += 1;
        self.sheets.push(sheet);
        let last = self.sheets.len() - 1;
        Ok(&mut self.sheets[last])
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn get_sheet_by_name(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn get_sheet_by_name_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        self.sheets.iter_mut().find(|s| s.name == name)
    }

    /// Shared strings collected by the last `build`.
    pub fn shared_strings(&self) -> &SharedStrings {
        &self.shared_strings
    }

    /// Serialize every sheet and package the parts into an xlsx archive.
    ///
    /// The shared-string table is rebuilt from scratch on each call, so
    /// building the same data twice gives identical parts.
    pub fn build(&mut self) -> Result<Blob> {
        if self.sheets.is_empty() {
            return Err(SheetpackError::NoWorksheets);
        }

        self.shared_strings.clear();
        let worksheets = self
            .sheets
            .iter()
            .map(|sheet| writer::worksheet_xml(sheet, &mut self.shared_strings))
            .collect::<Result<Vec<String>>>()?;

        let modified = self.modified.unwrap_or_else(|| Local::now().naive_local());
        let names = self.sheet_names();

        let mut zip = ZipWriter::with_compression(self.compression);
        zip.set_modified(&modified);
        zip.add_file("[Content_Types].xml", writer::content_types_xml(names.len())?)?;
        zip.add_file("_rels/.rels", writer::root_rels_xml())?;
        zip.add_file("docProps/app.xml", writer::app_xml(&names)?)?;
        zip.add_file("docProps/core.xml", writer::core_xml(&modified)?)?;
        zip.add_file("xl/workbook.xml", writer::workbook_xml(&names)?)?;
        zip.add_file("xl/_rels/workbook.xml.rels", writer::workbook_rels_xml(names.len())?)?;
        zip.add_file("xl/styles.xml", styles_xml())?;
        zip.add_file("xl/sharedStrings.xml", writer::shared_strings_xml(&self.shared_strings)?)?;
        for (i, xml) in worksheets.iter().enumerate() {
            zip.add_file(&writer::worksheet_path(i + 1), xml)?;
        }

        let blob = zip.finish(XLSX_MIME_TYPE)?;
        debug!(
            "workbook: {} sheets, {} shared strings, {} bytes",
            names.len(),
            self.shared_strings.len(),
            blob.len()
        );
        Ok(blob)
    }

    /// Build the workbook and write it to a file.
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.build()?.save(path)
    }
}

impl Default for Workbook {
    fn default() -> Self {
        Self::new()
    }
}

/// Check a sheet name against Excel's rules.
pub fn validate_sheet_name(name: &str) -> Result<()> {
    let len = name.chars().count();
    if len == 0 || len > MAX_SHEET_NAME_LEN {
        return Err(SheetpackError::InvalidSheetName(format!(
            "'{}' must be 1 to {} characters",
            name, MAX_SHEET_NAME_LEN
        )));
    }
    if let Some(c) = name.chars().find(|c| FORBIDDEN_SHEET_NAME_CHARS.contains(c)) {
        return Err(SheetpackError::InvalidSheetName(format!(
            "'{}' contains '{}'",
            name, c
        )));
    }
    Ok(())
}

/// Export one table as a single-sheet workbook named `Sheet1`.
///
/// Blank (empty) values produce no cell. The result is tagged with
/// [`XLSX_MIME_TYPE`].
pub fn export_xlsx<S: AsRef<str>>(
    header: Option<&[S]>,
    rows: &[Vec<S>],
    footer: Option<&[S]>,
) -> Result<Blob> {
    let text = |values: &[S]| values.iter().map(|v| v.as_ref().to_string()).collect::<Vec<_>>();

    let mut sheet = Sheet::new("Sheet1").with_rows(rows.iter().map(|r| text(r)));
    if let Some(header) = header {
        sheet = sheet.with_header(text(header));
    }
    if let Some(footer) = footer {
        sheet = sheet.with_footer(text(footer));
    }

    let mut workbook = Workbook::new();
    workbook.add_sheet(sheet)?;
    workbook.build()
}

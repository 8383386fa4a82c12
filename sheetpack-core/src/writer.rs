//! SpreadsheetML part templates and their renderers.
//!
//! Each fixed part is a template with `{{name}}` placeholders that
//! [`fill_template`] substitutes in a single pass. Worksheets are rendered
//! row by row and intern their text into the workbook's shared strings.

use chrono::NaiveDateTime;

use crate::cell::{classify, CellValue};
use crate::error::{Result, SheetpackError};
use crate::style::StyleId;
use crate::utils::{column_to_letter, coordinate_from_row_col, escape_xml, needs_space_preserve, MAX_COLUMN, MAX_ROW};
use crate::workbook::{SharedStrings, Sheet};

/// Column width is the longest value plus this padding.
const COLUMN_PADDING: usize = 5;
const MAX_COLUMN_WIDTH: usize = 60;

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>{{sheet_overrides}}<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/><Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/><Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/><Override PartName="/docProps/app.xml" ContentType="application/vnd.openxmlformats-officedocument.extended-properties+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/><Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/extended-properties" Target="docProps/app.xml"/></Relationships>"#;

const APP: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties" xmlns:vt="http://schemas.openxmlformats.org/officeDocument/2006/docPropsVTypes"><Application>Microsoft Excel</Application><DocSecurity>0</DocSecurity><ScaleCrop>false</ScaleCrop><HeadingPairs><vt:vector size="2" baseType="variant"><vt:variant><vt:lpstr>Worksheets</vt:lpstr></vt:variant><vt:variant><vt:i4>{{sheet_count}}</vt:i4></vt:variant></vt:vector></HeadingPairs><TitlesOfParts><vt:vector size="{{sheet_count}}" baseType="lpstr">{{sheet_titles}}</vt:vector></TitlesOfParts><LinksUpToDate>false</LinksUpToDate><SharedDoc>false</SharedDoc><HyperlinksChanged>false</HyperlinksChanged><AppVersion>16.0300</AppVersion></Properties>"#;

const CORE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:dcmitype="http://purl.org/dc/dcmitype/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"><dc:creator>sheetpack</dc:creator><cp:lastModifiedBy>sheetpack</cp:lastModifiedBy><dcterms:created xsi:type="dcterms:W3CDTF">{{timestamp}}</dcterms:created><dcterms:modified xsi:type="dcterms:W3CDTF">{{timestamp}}</dcterms:modified></cp:coreProperties>"#;

const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><bookViews><workbookView xWindow="0" yWindow="0" windowWidth="28800" windowHeight="12600"/></bookViews><sheets>{{sheets}}</sheets><calcPr calcId="191029"/></workbook>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{{sheet_rels}}<Relationship Id="rId{{styles_id}}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/><Relationship Id="rId{{shared_strings_id}}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/></Relationships>"#;

const SHARED_STRINGS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="{{count}}" uniqueCount="{{unique_count}}">{{items}}</sst>"#;

const WORKSHEET: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><dimension ref="{{dimension}}"/><sheetViews><sheetView workbookViewId="0"/></sheetViews><sheetFormatPr defaultRowHeight="15"/>{{cols}}<sheetData>{{rows}}</sheetData><pageMargins left="0.7" right="0.7" top="0.75" bottom="0.75" header="0.3" footer="0.3"/></worksheet>"#;

/// Substitute every `{{name}}` in `template` with its value.
///
/// Values are inserted verbatim and never rescanned. A placeholder without a
/// value, or an unterminated one, is an error.
pub fn fill_template(template: &str, values: &[(&str, &str)]) -> Result<String> {
    let extra: usize = values.iter().map(|(_, v)| v.len()).sum();
    let mut out = String::with_capacity(template.len() + extra);
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find("}}")
            .ok_or_else(|| SheetpackError::custom("unterminated template placeholder"))?;
        let key = &after[..end];
        let value = values
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
            .ok_or_else(|| SheetpackError::custom(format!("no value for template placeholder '{}'", key)))?;
        out.push_str(value);
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Path of the n-th (1-based) worksheet part.
pub fn worksheet_path(sheet_id: usize) -> String {
    format!("xl/worksheets/sheet{}.xml", sheet_id)
}

pub fn content_types_xml(sheet_count: usize) -> Result<String> {
    let mut overrides = String::with_capacity(sheet_count * 140);
    for id in 1..=sheet_count {
        overrides.push_str("<Override PartName=\"/");
        overrides.push_str(&worksheet_path(id));
        overrides.push_str("\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml\"/>");
    }
    fill_template(CONTENT_TYPES, &[("sheet_overrides", &overrides)])
}

pub fn root_rels_xml() -> &'static str {
    ROOT_RELS
}

pub fn app_xml(sheet_names: &[&str]) -> Result<String> {
    let mut titles = String::new();
    for name in sheet_names {
        titles.push_str("<vt:lpstr>");
        titles.push_str(&escape_xml(name));
        titles.push_str("</vt:lpstr>");
    }
    let count = sheet_names.len().to_string();
    fill_template(APP, &[("sheet_count", &count), ("sheet_titles", &titles)])
}

pub fn core_xml(modified: &NaiveDateTime) -> Result<String> {
    let timestamp = modified.format("%Y-%m-%dT%H:%M:%SZ").to_string();
    fill_template(CORE, &[("timestamp", &timestamp)])
}

pub fn workbook_xml(sheet_names: &[&str]) -> Result<String> {
    let mut sheets = String::with_capacity(sheet_names.len() * 48);
    let mut num = itoa::Buffer::new();
    for (i, name) in sheet_names.iter().enumerate() {
        let id = num.format(i + 1);
        sheets.push_str("<sheet name=\"");
        sheets.push_str(&escape_xml(name));
        sheets.push_str("\" sheetId=\"");
        sheets.push_str(id);
        sheets.push_str("\" r:id=\"rId");
        sheets.push_str(id);
        sheets.push_str("\"/>");
    }
    fill_template(WORKBOOK, &[("sheets", &sheets)])
}

pub fn workbook_rels_xml(sheet_count: usize) -> Result<String> {
    let mut rels = String::with_capacity(sheet_count * 150);
    let mut num = itoa::Buffer::new();
    for id in 1..=sheet_count {
        let id = num.format(id);
        rels.push_str("<Relationship Id=\"rId");
        rels.push_str(id);
        rels.push_str("\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet\" Target=\"worksheets/sheet");
        rels.push_str(id);
        rels.push_str(".xml\"/>");
    }
    let styles_id = (sheet_count + 1).to_string();
    let shared_strings_id = (sheet_count + 2).to_string();
    fill_template(
        WORKBOOK_RELS,
        &[
            ("sheet_rels", &rels),
            ("styles_id", &styles_id),
            ("shared_strings_id", &shared_strings_id),
        ],
    )
}

pub fn shared_strings_xml(shared: &SharedStrings) -> Result<String> {
    let mut items = String::with_capacity(shared.len() * 24);
    for text in shared.iter() {
        items.push_str("<si>");
        push_text_element(&mut items, text);
        items.push_str("</si>");
    }
    let count = shared.references().to_string();
    let unique_count = shared.len().to_string();
    fill_template(
        SHARED_STRINGS,
        &[("count", &count), ("unique_count", &unique_count), ("items", &items)],
    )
}

/// `<t>` element, preserving outer whitespace when present.
fn push_text_element(out: &mut String, text: &str) {
    if needs_space_preserve(text) {
        out.push_str("<t xml:space=\"preserve\">");
    } else {
        out.push_str("<t>");
    }
    out.push_str(&escape_xml(text));
    out.push_str("</t>");
}

/// Write a number the way `<v>` expects: integers without a fraction,
/// everything else in shortest round-trip form.
pub fn push_number(out: &mut String, value: f64) {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        out.push_str(itoa::Buffer::new().format(value as i64));
    } else {
        out.push_str(ryu::Buffer::new().format(value));
    }
}

/// Accumulates the `<sheetData>` rows of one worksheet.
struct SheetRenderer<'a> {
    sheet_name: &'a str,
    shared: &'a mut SharedStrings,
    rows: String,
    widths: Vec<usize>,
    row: u32,
}

impl<'a> SheetRenderer<'a> {
    fn push_row(&mut self, values: &[String], forced: Option<StyleId>) -> Result<()> {
        if self.row >= MAX_ROW {
            return Err(SheetpackError::custom(format!(
                "sheet '{}' has more than {} rows",
                self.sheet_name, MAX_ROW
            )));
        }
        if values.len() > MAX_COLUMN as usize {
            return Err(SheetpackError::custom(format!(
                "sheet '{}' has a row with {} columns, the limit is {}",
                self.sheet_name,
                values.len(),
                MAX_COLUMN
            )));
        }
        self.row += 1;

        let mut row_num = itoa::Buffer::new();
        self.rows.push_str("<row r=\"");
        self.rows.push_str(row_num.format(self.row));
        self.rows.push_str("\">");

        for (i, text) in values.iter().enumerate() {
            let cell = match classify(text) {
                Some(cell) => cell,
                None => continue,
            };
            let cell = match forced {
                Some(style) => cell.with_style(style),
                None => cell,
            };
            if self.widths.len() <= i {
                self.widths.resize(i + 1, 0);
            }
            let width = &mut self.widths[i];
            *width = (*width).max(text.chars().count());

            self.rows.push_str("<c r=\"");
            self.rows.push_str(&coordinate_from_row_col(self.row, i as u32 + 1));
            self.rows.push('"');
            if cell.style != StyleId::Default {
                self.rows.push_str(" s=\"");
                self.rows.push_str(itoa::Buffer::new().format(cell.style.index()));
                self.rows.push('"');
            }
            match &cell.value {
                CellValue::Number(n) => {
                    self.rows.push_str("><v>");
                    push_number(&mut self.rows, *n);
                    self.rows.push_str("</v></c>");
                }
                CellValue::SharedString(s) => {
                    let index = self.shared.intern(s);
                    self.rows.push_str(" t=\"s\"><v>");
                    self.rows.push_str(itoa::Buffer::new().format(index));
                    self.rows.push_str("</v></c>");
                }
                CellValue::InlineString(s) => {
                    self.rows.push_str(" t=\"inlineStr\"><is>");
                    push_text_element(&mut self.rows, s);
                    self.rows.push_str("</is></c>");
                }
            }
        }
        self.rows.push_str("</row>");
        Ok(())
    }

    fn cols(&self) -> String {
        if self.widths.is_empty() {
            return String::new();
        }
        let mut cols = String::with_capacity(16 + self.widths.len() * 56);
        cols.push_str("<cols>");
        let mut num = itoa::Buffer::new();
        for (i, width) in self.widths.iter().enumerate() {
            // Columns that only ever held blanks keep the default width.
            if *width == 0 {
                continue;
            }
            let col = num.format(i + 1).to_owned();
            cols.push_str("<col min=\"");
            cols.push_str(&col);
            cols.push_str("\" max=\"");
            cols.push_str(&col);
            cols.push_str("\" width=\"");
            cols.push_str(num.format((width + COLUMN_PADDING).min(MAX_COLUMN_WIDTH)));
            cols.push_str("\" customWidth=\"1\"/>");
        }
        cols.push_str("</cols>");
        cols
    }

    fn dimension(&self) -> String {
        if self.row == 0 || self.widths.is_empty() {
            return "A1".to_string();
        }
        format!("A1:{}{}", column_to_letter(self.widths.len() as u32), self.row)
    }
}

/// Render one worksheet, interning its text into `shared`.
///
/// Header and footer rows are written with the header style whatever their
/// content; blank values produce no cell element.
pub fn worksheet_xml(sheet: &Sheet, shared: &mut SharedStrings) -> Result<String> {
    let mut renderer = SheetRenderer {
        sheet_name: sheet.name(),
        shared,
        rows: String::with_capacity(sheet.rows().len() * 64 + 256),
        widths: Vec::new(),
        row: 0,
    };

    if let Some(header) = sheet.header() {
        renderer.push_row(header, Some(StyleId::Header))?;
    }
    for row in sheet.rows() {
        renderer.push_row(row, None)?;
    }
    if let Some(footer) = sheet.footer() {
        renderer.push_row(footer, Some(StyleId::Header))?;
    }

    let dimension = renderer.dimension();
    let cols = renderer.cols();
    fill_template(
        WORKSHEET,
        &[("dimension", &dimension), ("cols", &cols), ("rows", &renderer.rows)],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use quick_xml::events::Event;
    use quick_xml::Reader;

    fn assert_well_formed(xml: &str) {
        let mut reader = Reader::from_str(xml);
        loop {
            match reader.read_event() {
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => panic!("malformed XML: {}\n{}", e, xml),
            }
        }
    }

    fn row(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_fill_template() {
        let out = fill_template("a{{x}}b{{y}}c{{x}}", &[("x", "1"), ("y", "{{z}}")]).unwrap();
        assert_eq!(out, "a1b{{z}}c1");
        assert_eq!(fill_template("plain", &[]).unwrap(), "plain");
    }

    #[test]
    fn test_fill_template_errors() {
        assert!(matches!(fill_template("{{missing}}", &[]), Err(SheetpackError::Custom(_))));
        assert!(fill_template("oops {{open", &[("open", "x")]).is_err());
    }

    #[test]
    fn test_fixed_parts_are_well_formed() {
        let when = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap().and_hms_opt(8, 0, 0).unwrap();
        let names = ["Data", "Q&A"];
        for xml in [
            content_types_xml(2).unwrap(),
            root_rels_xml().to_string(),
            app_xml(&names).unwrap(),
            core_xml(&when).unwrap(),
            workbook_xml(&names).unwrap(),
            workbook_rels_xml(2).unwrap(),
            crate::style::styles_xml(),
        ] {
            assert_well_formed(&xml);
        }
        assert!(core_xml(&when).unwrap().contains("2024-03-15T08:00:00Z"));
        assert!(workbook_xml(&names).unwrap().contains("name=\"Q&amp;A\" sheetId=\"2\" r:id=\"rId2\""));
        assert!(workbook_rels_xml(2).unwrap().contains("Id=\"rId3\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles\""));
        assert!(content_types_xml(2).unwrap().contains("/xl/worksheets/sheet2.xml"));
    }

    #[test]
    fn test_push_number() {
        let mut s = String::new();
        push_number(&mut s, 30.0);
        s.push(' ');
        push_number(&mut s, 0.45);
        s.push(' ');
        push_number(&mut s, -12345678901.0);
        s.push(' ');
        push_number(&mut s, 36526.5);
        assert_eq!(s, "30 0.45 -12345678901 36526.5");
    }

    #[test]
    fn test_worksheet_cells() {
        let sheet = Sheet::new("S")
            .with_header(row(&["Name", "Age"]))
            .with_rows(vec![row(&["Alice", "30"]), row(&["Bob", "45%"]), row(&["", ""])])
            .with_footer(row(&["Total", "2"]));
        let mut shared = SharedStrings::default();
        let xml = worksheet_xml(&sheet, &mut shared).unwrap();
        assert_well_formed(&xml);

        assert!(xml.contains("<dimension ref=\"A1:B5\"/>"));
        assert!(xml.contains("<c r=\"A1\" s=\"1\" t=\"s\"><v>0</v></c>"));
        assert!(xml.contains("<c r=\"B2\"><v>30</v></c>"));
        assert!(xml.contains("<c r=\"B3\" s=\"4\"><v>0.45</v></c>"));
        assert!(xml.contains("<row r=\"4\"></row>"));
        assert!(xml.contains("<c r=\"B5\" s=\"1\"><v>2</v></c>"));
        assert!(xml.contains("<col min=\"1\" max=\"1\" width=\"10\" customWidth=\"1\"/>"));
        assert_eq!(shared.iter().collect::<Vec<_>>(), vec!["Name", "Age", "Alice", "Bob", "Total"]);
    }

    #[test]
    fn test_blank_columns_do_not_widen_sheet() {
        let sheet = Sheet::new("S").with_rows(vec![row(&["x", "", ""]), row(&["", "", ""]), row(&["yy", "", "z"])]);
        let mut shared = SharedStrings::default();
        let xml = worksheet_xml(&sheet, &mut shared).unwrap();
        assert_well_formed(&xml);

        assert!(xml.contains("<dimension ref=\"A1:C3\"/>"));
        assert!(xml.contains("<cols><col min=\"1\" max=\"1\" width=\"7\" customWidth=\"1\"/><col min=\"3\" max=\"3\" width=\"6\" customWidth=\"1\"/></cols>"));
        assert!(!xml.contains("min=\"2\""));

        let trailing = Sheet::new("T").with_rows(vec![row(&["a", "", ""]), row(&["b", ""])]);
        let xml = worksheet_xml(&trailing, &mut SharedStrings::default()).unwrap();
        assert!(xml.contains("<dimension ref=\"A1:A2\"/>"));
        assert!(xml.contains("<cols><col min=\"1\" max=\"1\" width=\"6\" customWidth=\"1\"/></cols>"));
    }

    #[test]
    fn test_worksheet_inline_and_escaping() {
        let long = format!("<{}>", "w".repeat(200));
        let sheet = Sheet::new("S").with_rows(vec![row(&[" padded ", &long, "a & b"])]);
        let mut shared = SharedStrings::default();
        let xml = worksheet_xml(&sheet, &mut shared).unwrap();
        assert_well_formed(&xml);

        assert!(xml.contains("t=\"inlineStr\"><is><t>&lt;www"));
        assert!(xml.contains("<col min=\"2\" max=\"2\" width=\"60\" customWidth=\"1\"/>"));
        assert_eq!(shared.len(), 2);

        let sst = shared_strings_xml(&shared).unwrap();
        assert_well_formed(&sst);
        assert!(sst.contains("<si><t xml:space=\"preserve\"> padded </t></si>"));
        assert!(sst.contains("<si><t>a &amp; b</t></si>"));
        assert!(sst.contains("count=\"2\" uniqueCount=\"2\""));
    }

    #[test]
    fn test_empty_sheet() {
        let mut shared = SharedStrings::default();
        let xml = worksheet_xml(&Sheet::new("Empty"), &mut shared).unwrap();
        assert_well_formed(&xml);
        assert!(xml.contains("<dimension ref=\"A1\"/>"));
        assert!(!xml.contains("<cols>"));
        assert!(xml.contains("<sheetData></sheetData>"));
    }
}

use std::io::{Cursor, Read};

use chrono::NaiveDate;
use quick_xml::events::Event;
use quick_xml::Reader;
use sheetpack_core::{export_xlsx, CompressionMethod, Sheet, Workbook, ZipWriter, XLSX_MIME_TYPE, ZIP_MIME_TYPE};
use tempfile::NamedTempFile;
use zip::ZipArchive;

/// One `<c>` element as written.
#[derive(Debug, Default, Clone, PartialEq)]
struct CellXml {
    reference: String,
    cell_type: Option<String>,
    style: Option<String>,
    value: String,
}

fn read_entry(bytes: &[u8], name: &str) -> String {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut file = archive.by_name(name).unwrap();
    let mut out = String::new();
    file.read_to_string(&mut out).unwrap();
    out
}

fn attr(e: &quick_xml::events::BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name)
        .map(|a| String::from_utf8(a.value.into_owned()).unwrap())
}

/// Cells and the number of `<row>` elements of a worksheet.
fn parse_worksheet(xml: &str) -> (Vec<CellXml>, usize) {
    let mut reader = Reader::from_str(xml);
    let mut cells = Vec::new();
    let mut rows = 0;
    let mut current: Option<CellXml> = None;
    let mut in_value = false;
    loop {
        match reader.read_event().unwrap() {
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"row" => rows += 1,
            Event::Start(e) if e.name().as_ref() == b"c" => {
                current = Some(CellXml {
                    reference: attr(&e, b"r").unwrap(),
                    cell_type: attr(&e, b"t"),
                    style: attr(&e, b"s"),
                    value: String::new(),
                });
            }
            Event::Start(e) if matches!(e.name().as_ref(), b"v" | b"t") => in_value = true,
            Event::End(e) if matches!(e.name().as_ref(), b"v" | b"t") => in_value = false,
            Event::Text(t) if in_value => {
                if let Some(cell) = current.as_mut() {
                    cell.value.push_str(&t.unescape().unwrap());
                }
            }
            Event::End(e) if e.name().as_ref() == b"c" => cells.extend(current.take()),
            Event::Eof => break,
            _ => {}
        }
    }
    (cells, rows)
}

fn parse_shared_strings(xml: &str) -> Vec<String> {
    let mut reader = Reader::from_str(xml);
    let mut strings = Vec::new();
    let mut in_text = false;
    loop {
        match reader.read_event().unwrap() {
            Event::Start(e) if e.name().as_ref() == b"si" => strings.push(String::new()),
            Event::Start(e) if e.name().as_ref() == b"t" => in_text = true,
            Event::End(e) if e.name().as_ref() == b"t" => in_text = false,
            Event::Text(t) if in_text => {
                if let Some(s) = strings.last_mut() {
                    s.push_str(&t.unescape().unwrap());
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    strings
}

fn cell<'a>(cells: &'a [CellXml], reference: &str) -> &'a CellXml {
    cells
        .iter()
        .find(|c| c.reference == reference)
        .unwrap_or_else(|| panic!("no cell {}", reference))
}

#[test]
fn test_name_age_scenario() {
    let rows = vec![vec!["Alice", "30"], vec!["Bob", "45%"]];
    let blob = export_xlsx(Some(&["Name", "Age"][..]), &rows, None).unwrap();
    assert_eq!(blob.mime_type(), XLSX_MIME_TYPE);

    let (cells, row_count) = parse_worksheet(&read_entry(blob.as_bytes(), "xl/worksheets/sheet1.xml"));
    assert_eq!(row_count, 3);

    let age = cell(&cells, "B2");
    assert_eq!(age.cell_type, None);
    assert_eq!(age.value, "30");

    let pct = cell(&cells, "B3");
    assert_eq!(pct.cell_type, None);
    assert_eq!(pct.style.as_deref(), Some("4"));
    assert_eq!(pct.value.parse::<f64>().unwrap(), 0.45);

    let header = cell(&cells, "A1");
    assert_eq!(header.cell_type.as_deref(), Some("s"));
    assert_eq!(header.style.as_deref(), Some("1"));

    let strings = parse_shared_strings(&read_entry(blob.as_bytes(), "xl/sharedStrings.xml"));
    assert_eq!(strings, vec!["Name", "Age", "Alice", "Bob"]);
}

#[test]
fn test_archive_opens_with_expected_parts() {
    let blob = export_xlsx(None, &[vec!["x"]], None).unwrap();
    let archive = ZipArchive::new(Cursor::new(blob.as_bytes())).unwrap();
    let mut names: Vec<&str> = archive.file_names().collect();
    names.sort_unstable();
    assert_eq!(
        names,
        vec![
            "[Content_Types].xml",
            "_rels/.rels",
            "docProps/app.xml",
            "docProps/core.xml",
            "xl/_rels/workbook.xml.rels",
            "xl/sharedStrings.xml",
            "xl/styles.xml",
            "xl/workbook.xml",
            "xl/worksheets/sheet1.xml",
        ]
    );
}

#[test]
fn test_shared_string_dedup_across_cells() {
    let rows = vec![vec!["same", "other"], vec!["same", "third"]];
    let blob = export_xlsx::<&str>(None, &rows, None).unwrap();
    let (cells, _) = parse_worksheet(&read_entry(blob.as_bytes(), "xl/worksheets/sheet1.xml"));

    assert_eq!(cell(&cells, "A1").value, cell(&cells, "A2").value);
    assert_ne!(cell(&cells, "A1").value, cell(&cells, "B1").value);

    let sst = read_entry(blob.as_bytes(), "xl/sharedStrings.xml");
    assert!(sst.contains("count=\"4\" uniqueCount=\"3\""));
    assert_eq!(parse_shared_strings(&sst), vec!["same", "other", "third"]);
}

#[test]
fn test_reserialization_is_byte_identical() {
    let when = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(9, 30, 0).unwrap();
    let build = || {
        let mut wb = Workbook::new();
        wb.set_modified(when);
        wb.add_sheet(
            Sheet::new("Data")
                .with_header(["id", "when", "note"])
                .with_rows([["1", "2024-01-01", "a"], ["2", "1/2/2024 10:00", "b"]]),
        )
        .unwrap();
        wb.add_sheet(Sheet::new("More").with_rows([["b", "a"]])).unwrap();
        wb.build().unwrap()
    };
    let first = build();
    let second = build();
    assert_eq!(first.as_bytes(), second.as_bytes());
    assert_eq!(
        read_entry(first.as_bytes(), "xl/worksheets/sheet2.xml"),
        read_entry(second.as_bytes(), "xl/worksheets/sheet2.xml")
    );
}

#[test]
fn test_store_and_deflate_boundary() {
    let mut zip = ZipWriter::new();
    zip.add_file("255.txt", "a".repeat(255)).unwrap();
    zip.add_file("256.txt", "a".repeat(256)).unwrap();
    assert_eq!(zip.entries()[0].method, CompressionMethod::Stored);
    assert_eq!(zip.entries()[1].method, CompressionMethod::Deflated);
    let blob = zip.finish(ZIP_MIME_TYPE).unwrap();

    let mut archive = ZipArchive::new(Cursor::new(blob.as_bytes())).unwrap();
    assert_eq!(archive.len(), 2);
    assert_eq!(archive.by_name("255.txt").unwrap().compression(), zip::CompressionMethod::Stored);
    assert_eq!(archive.by_name("256.txt").unwrap().compression(), zip::CompressionMethod::Deflated);
    assert_eq!(read_entry(blob.as_bytes(), "256.txt"), "a".repeat(256));
}

#[test]
fn test_every_entry_round_trips() {
    let mut zip = ZipWriter::new();
    let payloads: Vec<(String, Vec<u8>)> = (0..20)
        .map(|i| {
            let data: Vec<u8> = (0..i * 97).map(|j| ((j * j + i) % 251) as u8).collect();
            (format!("dir/{}.bin", i), data)
        })
        .collect();
    for (name, data) in &payloads {
        zip.add_file(name, data).unwrap();
    }
    let blob = zip.finish(ZIP_MIME_TYPE).unwrap();

    let mut archive = ZipArchive::new(Cursor::new(blob.as_bytes())).unwrap();
    assert_eq!(archive.len(), payloads.len());
    for (name, data) in &payloads {
        let mut file = archive.by_name(name).unwrap();
        let mut out = Vec::new();
        file.read_to_end(&mut out).unwrap();
        assert_eq!(&out, data, "{}", name);
        assert_eq!(file.crc32(), crc32fast::hash(data));
    }
}

#[test]
fn test_blank_values_and_footer() {
    let rows = vec![vec!["", "x"], vec!["", ""]];
    let blob = export_xlsx(Some(&["h1", "h2"][..]), &rows, Some(&["total", "9"][..])).unwrap();
    let (cells, row_count) = parse_worksheet(&read_entry(blob.as_bytes(), "xl/worksheets/sheet1.xml"));
    assert_eq!(row_count, 4);
    assert!(cells.iter().all(|c| c.reference != "A2" && c.reference != "A3"));
    let total = cell(&cells, "B4");
    assert_eq!(total.style.as_deref(), Some("1"));
    assert_eq!(total.value, "9");
}

#[test]
fn test_typed_cells_in_worksheet() {
    let rows = vec![vec![
        "2000-01-01",
        "12:00",
        "12.5%",
        "12345678901",
        "007",
        "3.25",
    ]];
    let blob = export_xlsx::<&str>(None, &rows, None).unwrap();
    let (cells, _) = parse_worksheet(&read_entry(blob.as_bytes(), "xl/worksheets/sheet1.xml"));

    let expect = [
        ("A1", None, Some("6"), "36526"),
        ("B1", None, Some("7"), "0.5"),
        ("C1", None, Some("5"), "0.125"),
        ("D1", None, Some("3"), "12345678901"),
        ("E1", Some("s"), Some("2"), "0"),
        ("F1", None, None, "3.25"),
    ];
    for (reference, cell_type, style, value) in expect {
        let c = cell(&cells, reference);
        assert_eq!(c.cell_type.as_deref(), cell_type, "{}", reference);
        assert_eq!(c.style.as_deref(), style, "{}", reference);
        assert_eq!(c.value, value, "{}", reference);
    }
}

#[test]
fn test_special_characters_survive() {
    let text = "Tom & \"Jerry\" <3";
    let long = format!(" {} ", "ü".repeat(170));
    let rows = vec![vec![text.to_string(), long.clone()]];
    let blob = export_xlsx(None, &rows, None).unwrap();
    let (cells, _) = parse_worksheet(&read_entry(blob.as_bytes(), "xl/worksheets/sheet1.xml"));

    assert_eq!(cell(&cells, "B1").cell_type.as_deref(), Some("inlineStr"));
    assert_eq!(cell(&cells, "B1").value, long);
    let strings = parse_shared_strings(&read_entry(blob.as_bytes(), "xl/sharedStrings.xml"));
    assert_eq!(strings, vec![text]);
}

#[test]
fn test_workbook_save() {
    let mut wb = Workbook::new();
    wb.create_sheet(None).unwrap().push_row(["saved"]);
    let temp_file = NamedTempFile::new().unwrap();
    wb.save(temp_file.path()).unwrap();

    let bytes = std::fs::read(temp_file.path()).unwrap();
    assert!(read_entry(&bytes, "xl/sharedStrings.xml").contains("<t>saved</t>"));
    let workbook = read_entry(&bytes, "xl/workbook.xml");
    assert!(workbook.contains("<sheet name=\"Sheet1\" sheetId=\"1\" r:id=\"rId1\"/>"));
}

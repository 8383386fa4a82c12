#![no_main]

//! Build workbooks from arbitrary text tables and check that every part of
//! the archive is readable and every XML part is well formed.

use std::io::{Cursor, Read};

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use quick_xml::events::Event;
use quick_xml::Reader;
use sheetpack_core::{Sheet, Workbook};

/// Maximum dimensions to prevent OOM
const MAX_ROWS: usize = 50;
const MAX_COLS: usize = 20;
const MAX_SHEETS: usize = 3;

#[derive(Arbitrary, Debug)]
struct FuzzSheet {
    name: String,
    header: Option<Vec<String>>,
    rows: Vec<Vec<String>>,
    footer: Option<Vec<String>>,
}

fn truncate(row: Vec<String>) -> Vec<String> {
    row.into_iter().take(MAX_COLS).collect()
}

fn check_xml(name: &str, xml: &str) {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => panic!("{} is not well formed: {}", name, e),
        }
    }
}

fuzz_target!(|sheets: Vec<FuzzSheet>| {
    let mut wb = Workbook::new();
    for fuzz in sheets.into_iter().take(MAX_SHEETS) {
        let mut sheet = Sheet::new(fuzz.name)
            .with_rows(fuzz.rows.into_iter().take(MAX_ROWS).map(truncate));
        if let Some(header) = fuzz.header {
            sheet = sheet.with_header(truncate(header));
        }
        if let Some(footer) = fuzz.footer {
            sheet = sheet.with_footer(truncate(footer));
        }
        // Invalid or duplicate names are rejected up front.
        let _ = wb.add_sheet(sheet);
    }

    let blob = match wb.build() {
        Ok(blob) => blob,
        Err(_) => {
            assert!(wb.sheets().is_empty());
            return;
        }
    };

    let mut archive = zip::ZipArchive::new(Cursor::new(blob.as_bytes())).expect("archive must open");
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).expect("entry must be readable");
        let name = file.name().to_string();
        let mut xml = String::new();
        file.read_to_string(&mut xml).expect("entry must inflate to UTF-8");
        if name.ends_with(".xml") || name.ends_with(".rels") {
            check_xml(&name, &xml);
        }
    }
});

//! Cell references and XML text helpers.

use std::borrow::Cow;

use quick_xml::escape::escape;

/// Maximum column number in Excel (XFD = 16384).
pub const MAX_COLUMN: u32 = 16384;
/// Maximum row number in Excel.
pub const MAX_ROW: u32 = 1_048_576;

/// Convert column number (1-indexed) to letters (e.g., 1 -> "A", 28 -> "AB").
pub fn column_to_letter(column: u32) -> String {
    let mut buf = [0u8; 8];
    let mut start = buf.len();
    let mut col = column;

    while col > 0 {
        col -= 1;
        start -= 1;
        buf[start] = b'A' + (col % 26) as u8;
        col /= 26;
    }

    buf[start..].iter().map(|&b| b as char).collect()
}

/// Create a cell coordinate string from row and column (1-indexed).
pub fn coordinate_from_row_col(row: u32, column: u32) -> String {
    let mut coord = column_to_letter(column);
    coord.push_str(itoa::Buffer::new().format(row));
    coord
}

/// Whether `c` may appear in an XML 1.0 document.
#[inline]
fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..)
}

/// Escape text for element content or attribute values.
///
/// Characters XML 1.0 forbids (most C0 controls, U+FFFE, U+FFFF) are dropped.
pub fn escape_xml(text: &str) -> Cow<'_, str> {
    if text.chars().all(is_xml_char) {
        escape(text)
    } else {
        let filtered: String = text.chars().filter(|&c| is_xml_char(c)).collect();
        Cow::Owned(escape(filtered.as_str()).into_owned())
    }
}

/// Whether text needs `xml:space="preserve"` to keep its outer whitespace.
#[inline]
pub fn needs_space_preserve(text: &str) -> bool {
    text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace)
}

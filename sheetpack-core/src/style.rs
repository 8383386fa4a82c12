//! The fixed cell style table written to `xl/styles.xml`.
//!
//! Every workbook carries the same nine cell formats; cells refer to them by
//! [`StyleId`]. There is no per-workbook style registry.

/// Index into `cellXfs`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StyleId {
    #[default]
    Default = 0,
    /// Bold on a gray fill with a bottom border, for header and footer rows.
    Header = 1,
    /// Text that looks numeric, aligned right.
    TextRight = 2,
    /// Long integers shown with format `0` instead of scientific notation.
    IntegerRight = 3,
    /// `0%`
    Percent = 4,
    /// `0.00%`
    PercentFine = 5,
    Date = 6,
    Time = 7,
    DateTime = 8,
}

impl StyleId {
    pub const ALL: [StyleId; 9] = [
        StyleId::Default,
        StyleId::Header,
        StyleId::TextRight,
        StyleId::IntegerRight,
        StyleId::Percent,
        StyleId::PercentFine,
        StyleId::Date,
        StyleId::Time,
        StyleId::DateTime,
    ];

    /// Value of the `s` attribute.
    pub fn index(self) -> u32 {
        self as u32
    }

    pub fn xf(self) -> &'static CellXf {
        &CELL_XFS[self as usize]
    }
}

/// A cell format entry (cellXf) that combines references to fonts, fills,
/// borders, and number formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellXf {
    pub font_id: u32,
    pub fill_id: u32,
    pub border_id: u32,
    /// Built-in format ID or one of the custom ones below.
    pub num_fmt_id: u32,
    pub align_right: bool,
}

impl CellXf {
    const fn new(font_id: u32, fill_id: u32, border_id: u32, num_fmt_id: u32, align_right: bool) -> Self {
        CellXf { font_id, fill_id, border_id, num_fmt_id, align_right }
    }
}

/// Custom number format IDs start at 164.
pub const DATE_FORMAT_ID: u32 = 164;
pub const DATE_TIME_FORMAT_ID: u32 = 165;

const NUM_FMTS: [(u32, &str); 2] = [
    (DATE_FORMAT_ID, "yyyy-mm-dd"),
    (DATE_TIME_FORMAT_ID, "yyyy-mm-dd hh:mm:ss"),
];

const CELL_XFS: [CellXf; 9] = [
    CellXf::new(0, 0, 0, 0, false),
    CellXf::new(1, 2, 1, 0, false),
    CellXf::new(0, 0, 0, 0, true),
    CellXf::new(0, 0, 0, 1, true),
    CellXf::new(0, 0, 0, 9, false),
    CellXf::new(0, 0, 0, 10, false),
    CellXf::new(0, 0, 0, DATE_FORMAT_ID, false),
    CellXf::new(0, 0, 0, 21, false),
    CellXf::new(0, 0, 0, DATE_TIME_FORMAT_ID, false),
];

const FONTS: &str = "<fonts count=\"2\">\
<font><sz val=\"11\"/><color theme=\"1\"/><name val=\"Calibri\"/><family val=\"2\"/><scheme val=\"minor\"/></font>\
<font><b/><sz val=\"11\"/><color theme=\"1\"/><name val=\"Calibri\"/><family val=\"2\"/><scheme val=\"minor\"/></font>\
</fonts>";

const FILLS: &str = "<fills count=\"3\">\
<fill><patternFill patternType=\"none\"/></fill>\
<fill><patternFill patternType=\"gray125\"/></fill>\
<fill><patternFill patternType=\"solid\"><fgColor rgb=\"FFD9D9D9\"/><bgColor indexed=\"64\"/></patternFill></fill>\
</fills>";

const BORDERS: &str = "<borders count=\"2\">\
<border><left/><right/><top/><bottom/><diagonal/></border>\
<border><left/><right/><top/><bottom style=\"thin\"><color indexed=\"64\"/></bottom><diagonal/></border>\
</borders>";

/// Render `xl/styles.xml`.
pub fn styles_xml() -> String {
    let mut xml = String::with_capacity(2048);
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n");
    xml.push_str("<styleSheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\">");

    xml.push_str("<numFmts count=\"");
    xml.push_str(itoa::Buffer::new().format(NUM_FMTS.len()));
    xml.push_str("\">");
    for (id, code) in NUM_FMTS {
        xml.push_str("<numFmt numFmtId=\"");
        xml.push_str(itoa::Buffer::new().format(id));
        xml.push_str("\" formatCode=\"");
        xml.push_str(code);
        xml.push_str("\"/>");
    }
    xml.push_str("</numFmts>");

    xml.push_str(FONTS);
    xml.push_str(FILLS);
    xml.push_str(BORDERS);
    xml.push_str("<cellStyleXfs count=\"1\"><xf numFmtId=\"0\" fontId=\"0\" fillId=\"0\" borderId=\"0\"/></cellStyleXfs>");

    xml.push_str("<cellXfs count=\"");
    xml.push_str(itoa::Buffer::new().format(CELL_XFS.len()));
    xml.push_str("\">");
    for xf in &CELL_XFS {
        let mut ids = itoa::Buffer::new();
        xml.push_str("<xf numFmtId=\"");
        xml.push_str(ids.format(xf.num_fmt_id));
        xml.push_str("\" fontId=\"");
        xml.push_str(ids.format(xf.font_id));
        xml.push_str("\" fillId=\"");
        xml.push_str(ids.format(xf.fill_id));
        xml.push_str("\" borderId=\"");
        xml.push_str(ids.format(xf.border_id));
        xml.push_str("\" xfId=\"0\"");
        if xf.num_fmt_id != 0 {
            xml.push_str(" applyNumberFormat=\"1\"");
        }
        if xf.font_id != 0 {
            xml.push_str(" applyFont=\"1\"");
        }
        if xf.fill_id != 0 {
            xml.push_str(" applyFill=\"1\"");
        }
        if xf.border_id != 0 {
            xml.push_str(" applyBorder=\"1\"");
        }
        if xf.align_right {
            xml.push_str(" applyAlignment=\"1\"><alignment horizontal=\"right\"/></xf>");
        } else {
            xml.push_str("/>");
        }
    }
    xml.push_str("</cellXfs>");

    xml.push_str("<cellStyles count=\"1\"><cellStyle name=\"Normal\" xfId=\"0\" builtinId=\"0\"/></cellStyles>");
    xml.push_str("<dxfs count=\"0\"/><tableStyles count=\"0\" defaultTableStyle=\"TableStyleMedium2\" defaultPivotStyle=\"PivotStyleLight16\"/>");
    xml.push_str("</styleSheet>");
    xml
}

//! # sheetpack-core
//!
//! In-memory xlsx export. Tabular text goes in, a finished `.xlsx` archive
//! comes out, built by the crate's own DEFLATE compressor and ZIP writer.
//!
//! ```no_run
//! use sheetpack_core::{Sheet, Workbook};
//!
//! let mut wb = Workbook::new();
//! wb.add_sheet(
//!     Sheet::new("People")
//!         .with_header(["Name", "Age"])
//!         .with_rows([["Alice", "30"], ["Bob", "45%"]]),
//! )?;
//! wb.save("people.xlsx")?;
//! # Ok::<(), sheetpack_core::SheetpackError>(())
//! ```

pub mod archive;
pub mod cell;
pub mod crc32;
pub mod deflate;
pub mod error;
pub mod style;
pub mod utils;
pub mod workbook;
pub mod writer;

pub use archive::{
    ArchiveEntry, Blob, CompressionLevel, CompressionMethod, DosDateTime, ZipWriter, ZIP_MIME_TYPE,
};
pub use cell::{classify, excel_serial, CellValue, TypedCell};
pub use deflate::{deflate, DeflateOptions, Deflater};
pub use error::{Result, SheetpackError};
pub use style::StyleId;
pub use utils::{column_to_letter, coordinate_from_row_col};
pub use workbook::{export_xlsx, SharedStrings, Sheet, Workbook, XLSX_MIME_TYPE};

//! Error types for the export pipeline.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SheetpackError>;

/// Errors raised while configuring the codecs or assembling a workbook.
///
/// The codecs themselves never fail on input data: only configuration,
/// naming and container-size limits produce errors.
#[derive(Debug, Error)]
pub enum SheetpackError {
    /// A compressor parameter lies outside the DEFLATE protocol limits.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A Huffman length limit cannot accommodate the alphabet.
    #[error("code length limit {limit} cannot encode {symbols} symbols")]
    CodeLengthLimit { limit: u8, symbols: usize },

    #[error("invalid sheet name: {0}")]
    InvalidSheetName(String),

    #[error("worksheet already exists: {0}")]
    WorksheetAlreadyExists(String),

    #[error("workbook has no worksheets")]
    NoWorksheets,

    /// The archive would need ZIP64 extensions.
    #[error("archive limit exceeded: {0}")]
    ArchiveLimit(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Custom(String),
}

impl SheetpackError {
    /// Create an error from an arbitrary message.
    pub fn custom<S: Into<String>>(msg: S) -> Self {
        SheetpackError::Custom(msg.into())
    }
}

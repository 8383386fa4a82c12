//! In-memory ZIP container writer.
//!
//! Entries are appended in insertion order: a local file header followed by
//! the (stored or deflated) body. `finish` appends the central directory and
//! the end-of-central-directory record and hands back the whole archive as a
//! [`Blob`]. ZIP64 is not supported; archives that would need it are rejected.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use chrono::{Datelike, Local, NaiveDateTime, Timelike};
use log::debug;

use crate::crc32;
use crate::deflate::{DeflateOptions, Deflater};
use crate::error::{Result, SheetpackError};

/// MIME type of a plain ZIP archive.
pub const ZIP_MIME_TYPE: &str = "application/zip";

/// Entries smaller than this many bytes are always stored.
pub const STORE_THRESHOLD: usize = 256;

const LOCAL_HEADER_SIGNATURE: u32 = 0x0403_4b50;
const CENTRAL_HEADER_SIGNATURE: u32 = 0x0201_4b50;
const END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x0605_4b50;

/// APPNOTE version 2.0, MS-DOS host.
const VERSION_MADE_BY: u16 = 0x0014;
const FLAG_UTF8_NAME: u16 = 1 << 11;
const MAX_ENTRIES: usize = u16::MAX as usize;

/// Compression method recorded for an entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum CompressionMethod {
    Stored = 0,
    Deflated = 8,
}

impl CompressionMethod {
    /// Minimum ZIP version needed to extract this method (1.0 / 2.0).
    pub fn version_needed(self) -> u16 {
        match self {
            CompressionMethod::Stored => 10,
            CompressionMethod::Deflated => 20,
        }
    }
}

/// Compression level for writing archives.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CompressionLevel {
    /// Store every entry.
    None,
    /// Deflate entries of 256 bytes or more with greedy matching.
    #[default]
    Fast,
    /// Like `Fast`, but every match gets one position of lazy look-ahead.
    Best,
}

impl CompressionLevel {
    /// LZ77 parameters for this level, `None` when nothing is compressed.
    pub fn deflate_options(self) -> Option<DeflateOptions> {
        match self {
            CompressionLevel::None => None,
            CompressionLevel::Fast => Some(DeflateOptions::default()),
            CompressionLevel::Best => Some(DeflateOptions {
                lazy: 258,
                ..DeflateOptions::default()
            }),
        }
    }
}

/// Packed MS-DOS time and date as stored in ZIP headers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DosDateTime {
    /// `hour << 11 | minute << 5 | second / 2`
    pub time: u16,
    /// `(year - 1980) << 9 | month << 5 | day`
    pub date: u16,
}

impl DosDateTime {
    /// Pack a timestamp. Seconds lose their lowest bit; years outside
    /// 1980..=2107 are clamped to the representable range.
    pub fn from_naive(dt: &NaiveDateTime) -> Self {
        let year = dt.year().clamp(1980, 2107) as u16;
        let time = (dt.hour() as u16) << 11 | (dt.minute() as u16) << 5 | (dt.second() as u16) / 2;
        let date = (year - 1980) << 9 | (dt.month() as u16) << 5 | dt.day() as u16;
        DosDateTime { time, date }
    }

    /// The local wall-clock time.
    pub fn now() -> Self {
        Self::from_naive(&Local::now().naive_local())
    }
}

/// Metadata of one written entry. Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub crc32: u32,
    pub method: CompressionMethod,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub modified: DosDateTime,
    /// Byte offset of the entry's local header from the start of the archive.
    pub offset: u32,
}

impl ArchiveEntry {
    fn flags(&self) -> u16 {
        if self.name.is_ascii() {
            0
        } else {
            FLAG_UTF8_NAME
        }
    }
}

/// A finished binary object tagged with its MIME type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Blob {
    data: Vec<u8>,
    mime_type: String,
}

impl Blob {
    pub fn new(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Blob {
            data,
            mime_type: mime_type.into(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Write the bytes to any writer.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(&self.data)?;
        writer.flush()?;
        Ok(())
    }

    /// Write the bytes to a file, replacing it if it exists.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref()).map_err(|e| {
            SheetpackError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to create file '{}': {}", path.as_ref().display(), e),
            ))
        })?;
        self.write_to(file)
    }
}

impl AsRef<[u8]> for Blob {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

/// Builds a ZIP archive in memory.
pub struct ZipWriter {
    /// Local headers and bodies written so far.
    output: Vec<u8>,
    /// Central directory records, in entry order.
    central: Vec<u8>,
    entries: Vec<ArchiveEntry>,
    deflater: Option<Deflater>,
    modified: DosDateTime,
}

impl ZipWriter {
    /// Writer with the default compression level, stamped with the current time.
    pub fn new() -> Self {
        Self::with_compression(CompressionLevel::default())
    }

    pub fn with_compression(level: CompressionLevel) -> Self {
        ZipWriter {
            output: Vec::new(),
            central: Vec::new(),
            entries: Vec::new(),
            deflater: level.deflate_options().map(Deflater::from_valid),
            modified: DosDateTime::now(),
        }
    }

    /// Timestamp recorded for entries added from now on.
    pub fn set_modified(&mut self, modified: &NaiveDateTime) {
        self.modified = DosDateTime::from_naive(modified);
    }

    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    /// Append one file. Text is written as its UTF-8 bytes.
    pub fn add_file(&mut self, name: &str, data: impl AsRef<[u8]>) -> Result<&ArchiveEntry> {
        let data = data.as_ref();
        if self.entries.len() >= MAX_ENTRIES {
            return Err(SheetpackError::ArchiveLimit(format!(
                "more than {} entries",
                MAX_ENTRIES
            )));
        }
        let name_len = u16::try_from(name.len()).map_err(|_| {
            SheetpackError::ArchiveLimit(format!("entry name of {} bytes", name.len()))
        })?;
        let offset = to_u32(self.output.len(), "archive offset")?;
        let uncompressed_size = to_u32(data.len(), "entry size")?;
        let crc32 = crc32::calc(data);

        let compressed;
        let (method, body): (CompressionMethod, &[u8]) = match &self.deflater {
            Some(deflater) if data.len() >= STORE_THRESHOLD => {
                compressed = deflater.compress(data);
                (CompressionMethod::Deflated, &compressed)
            }
            _ => (CompressionMethod::Stored, data),
        };

        let entry = ArchiveEntry {
            name: name.to_string(),
            crc32,
            method,
            compressed_size: to_u32(body.len(), "compressed entry size")?,
            uncompressed_size,
            modified: self.modified,
            offset,
        };
        // The local header must not push the next offset past u32.
        to_u32(self.output.len() + 30 + name.len() + body.len(), "archive offset")?;

        let out = &mut self.output;
        put_u32(out, LOCAL_HEADER_SIGNATURE);
        put_u16(out, method.version_needed());
        put_u16(out, entry.flags());
        put_u16(out, method as u16);
        put_u16(out, entry.modified.time);
        put_u16(out, entry.modified.date);
        put_u32(out, entry.crc32);
        put_u32(out, entry.compressed_size);
        put_u32(out, entry.uncompressed_size);
        put_u16(out, name_len);
        put_u16(out, 0);
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(body);

        let cd = &mut self.central;
        put_u32(cd, CENTRAL_HEADER_SIGNATURE);
        put_u16(cd, VERSION_MADE_BY);
        put_u16(cd, method.version_needed());
        put_u16(cd, entry.flags());
        put_u16(cd, method as u16);
        put_u16(cd, entry.modified.time);
        put_u16(cd, entry.modified.date);
        put_u32(cd, entry.crc32);
        put_u32(cd, entry.compressed_size);
        put_u32(cd, entry.uncompressed_size);
        put_u16(cd, name_len);
        put_u16(cd, 0); // extra field length
        put_u16(cd, 0); // comment length
        put_u16(cd, 0); // disk number start
        put_u16(cd, 0); // internal attributes
        put_u32(cd, 0); // external attributes
        put_u32(cd, entry.offset);
        cd.extend_from_slice(name.as_bytes());

        debug!(
            "zip: {} {:?} {} -> {} bytes at offset {}",
            entry.name, entry.method, entry.uncompressed_size, entry.compressed_size, entry.offset
        );

        self.entries.push(entry);
        Ok(&self.entries[self.entries.len() - 1])
    }

    /// Append the central directory and end record and return the archive.
    pub fn finish(mut self, mime_type: &str) -> Result<Blob> {
        let cd_offset = to_u32(self.output.len(), "central directory offset")?;
        let cd_size = to_u32(self.central.len(), "central directory size")?;
        to_u32(self.output.len() + self.central.len() + 22, "archive size")?;
        let count = self.entries.len() as u16;

        self.output.append(&mut self.central);
        let out = &mut self.output;
        put_u32(out, END_OF_CENTRAL_DIRECTORY_SIGNATURE);
        put_u16(out, 0); // this disk
        put_u16(out, 0); // disk with the central directory
        put_u16(out, count);
        put_u16(out, count);
        put_u32(out, cd_size);
        put_u32(out, cd_offset);
        put_u16(out, 0); // comment length

        Ok(Blob::new(self.output, mime_type))
    }
}

impl Default for ZipWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn to_u32(value: usize, what: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| SheetpackError::ArchiveLimit(format!("{} {} exceeds 4 GiB", what, value)))
}

#[inline]
fn put_u16(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_le_bytes());
}

#[inline]
fn put_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

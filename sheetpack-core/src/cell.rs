//! Typed-cell inference for pre-stringified values.
//!
//! Values are tested against an ordered list of matchers; the first pattern
//! whose extractor accepts the text decides the cell type and style. Text that
//! no matcher accepts becomes a string cell.

use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate};
use regex::{Captures, Regex};

use crate::style::StyleId;

/// Strings longer than this many characters are written inline instead of
/// going through the shared-string table.
pub const INLINE_STRING_THRESHOLD: usize = 160;

/// Integers with more digits than this get the right-aligned `0` format.
const LONG_INTEGER_DIGITS: usize = 10;

/// Julian day number of 1899-12-30, day zero of the Excel serial calendar.
const EXCEL_EPOCH_JDN: i64 = 2_415_019;

/// Offset between `NaiveDate::num_days_from_ce` (0001-01-01 = 1) and the
/// Julian day number.
const CE_TO_JDN: i64 = 1_721_425;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// The typed value of a cell.
#[derive(Clone, Debug, PartialEq)]
pub enum CellValue {
    Number(f64),
    /// Text routed through the shared-string table.
    SharedString(String),
    /// Text written inline with `t="inlineStr"`.
    InlineString(String),
}

/// A classified cell: its value plus the style it is written with.
#[derive(Clone, Debug, PartialEq)]
pub struct TypedCell {
    pub value: CellValue,
    pub style: StyleId,
}

impl TypedCell {
    fn number(value: f64, style: StyleId) -> Self {
        TypedCell {
            value: CellValue::Number(value),
            style,
        }
    }

    /// The same cell with another style, used for header and footer rows.
    pub fn with_style(mut self, style: StyleId) -> Self {
        self.style = style;
        self
    }
}

type Extractor = fn(&Captures<'_>) -> Option<(f64, StyleId)>;

struct TypedMatcher {
    pattern: Regex,
    extract: Extractor,
}

fn matchers() -> &'static [TypedMatcher] {
    static MATCHERS: OnceLock<Vec<TypedMatcher>> = OnceLock::new();
    MATCHERS.get_or_init(|| {
        let table: [(&str, Extractor); 9] = [
            (r"^-?(0|[1-9]\d*)$", extract_integer),
            (r"^-?(0|[1-9]\d*)\.\d+$", extract_decimal),
            (r"^(-?\d+)%$", extract_percent),
            (r"^(-?\d+\.\d+)%$", extract_percent_fine),
            (r"^(\d{4})-(\d{2})-(\d{2})$", extract_iso_date),
            (r"^(\d{1,2})/(\d{1,2})/(\d{4})$", extract_us_date),
            (r"^(\d{1,2}):(\d{2})(?::(\d{2}))?$", extract_time),
            (
                r"^(\d{4})-(\d{2})-(\d{2})[T ](\d{1,2}):(\d{2})(?::(\d{2}))?$",
                extract_iso_date_time,
            ),
            (
                r"^(\d{1,2})/(\d{1,2})/(\d{4}) (\d{1,2}):(\d{2})(?::(\d{2}))?$",
                extract_us_date_time,
            ),
        ];
        table
            .into_iter()
            .map(|(pattern, extract)| TypedMatcher {
                pattern: Regex::new(pattern).expect("cell pattern is a valid regex"),
                extract,
            })
            .collect()
    })
}

/// Classify one cell value. Empty text is a blank cell and yields `None`.
pub fn classify(value: &str) -> Option<TypedCell> {
    if value.is_empty() {
        return None;
    }

    for matcher in matchers() {
        if let Some(caps) = matcher.pattern.captures(value) {
            if let Some((number, style)) = (matcher.extract)(&caps) {
                return Some(TypedCell::number(number, style));
            }
        }
    }

    if value.chars().count() > INLINE_STRING_THRESHOLD {
        return Some(TypedCell {
            value: CellValue::InlineString(value.to_string()),
            style: StyleId::Default,
        });
    }

    let style = if looks_numeric(value) {
        StyleId::TextRight
    } else {
        StyleId::Default
    };
    Some(TypedCell {
        value: CellValue::SharedString(value.to_string()),
        style,
    })
}

/// Digits mixed only with whitespace and punctuation, e.g. `007`, `1,234`, `(555) 010-2030`.
fn looks_numeric(text: &str) -> bool {
    text.chars().any(|c| c.is_ascii_digit())
        && text
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_whitespace() || c.is_ascii_punctuation())
}

fn group<T: FromStr>(caps: &Captures<'_>, i: usize) -> Option<T> {
    caps.get(i)?.as_str().parse().ok()
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

fn extract_integer(caps: &Captures<'_>) -> Option<(f64, StyleId)> {
    let value = finite(group(caps, 0)?)?;
    let style = if caps[1].len() > LONG_INTEGER_DIGITS {
        StyleId::IntegerRight
    } else {
        StyleId::Default
    };
    Some((value, style))
}

fn extract_decimal(caps: &Captures<'_>) -> Option<(f64, StyleId)> {
    Some((finite(group(caps, 0)?)?, StyleId::Default))
}

fn extract_percent(caps: &Captures<'_>) -> Option<(f64, StyleId)> {
    let value: f64 = finite(group(caps, 1)?)?;
    Some((value / 100.0, StyleId::Percent))
}

fn extract_percent_fine(caps: &Captures<'_>) -> Option<(f64, StyleId)> {
    let value: f64 = finite(group(caps, 1)?)?;
    Some(((value * 100.0).round() / 10_000.0, StyleId::PercentFine))
}

fn extract_iso_date(caps: &Captures<'_>) -> Option<(f64, StyleId)> {
    let date = NaiveDate::from_ymd_opt(group(caps, 1)?, group(caps, 2)?, group(caps, 3)?)?;
    Some((excel_serial(date)? as f64, StyleId::Date))
}

fn extract_us_date(caps: &Captures<'_>) -> Option<(f64, StyleId)> {
    let date = NaiveDate::from_ymd_opt(group(caps, 3)?, group(caps, 1)?, group(caps, 2)?)?;
    Some((excel_serial(date)? as f64, StyleId::Date))
}

fn extract_time(caps: &Captures<'_>) -> Option<(f64, StyleId)> {
    Some((time_of_day(caps, 1)?, StyleId::Time))
}

fn extract_iso_date_time(caps: &Captures<'_>) -> Option<(f64, StyleId)> {
    let date = NaiveDate::from_ymd_opt(group(caps, 1)?, group(caps, 2)?, group(caps, 3)?)?;
    let serial = excel_serial(date)? as f64 + time_of_day(caps, 4)?;
    Some((serial, StyleId::DateTime))
}

fn extract_us_date_time(caps: &Captures<'_>) -> Option<(f64, StyleId)> {
    let date = NaiveDate::from_ymd_opt(group(caps, 3)?, group(caps, 1)?, group(caps, 2)?)?;
    let serial = excel_serial(date)? as f64 + time_of_day(caps, 4)?;
    Some((serial, StyleId::DateTime))
}

/// Hours, minutes and optional seconds starting at capture group `first`.
fn time_of_day(caps: &Captures<'_>, first: usize) -> Option<f64> {
    let hours: u32 = group(caps, first)?;
    let minutes: u32 = group(caps, first + 1)?;
    let seconds: u32 = match caps.get(first + 2) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    day_fraction(hours, minutes, seconds)
}

/// Fraction of a day, `None` for an impossible clock time.
pub fn day_fraction(hours: u32, minutes: u32, seconds: u32) -> Option<f64> {
    if hours > 23 || minutes > 59 || seconds > 59 {
        return None;
    }
    Some((hours * 3600 + minutes * 60 + seconds) as f64 / SECONDS_PER_DAY)
}

/// Julian day number of a proleptic Gregorian date.
pub fn julian_day(date: NaiveDate) -> i64 {
    date.num_days_from_ce() as i64 + CE_TO_JDN
}

/// Excel's 1900-system serial number for `date`.
///
/// Excel counts a fictitious 1900-02-29, so dates before 1900-03-01 are one
/// lower than the plain day count from 1899-12-30. Dates before 1900-01-01
/// have no serial and yield `None`.
pub fn excel_serial(date: NaiveDate) -> Option<i64> {
    if date.year() < 1900 {
        return None;
    }
    let serial = julian_day(date) - EXCEL_EPOCH_JDN;
    Some(if serial < 61 { serial - 1 } else { serial })
}

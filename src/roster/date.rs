//! Free-text date normalization.
//!
//! Turns chat text such as `9月2日`, `2025年9月2日`, `2025-09-02`,
//! `2025/9/2` or `9/2` into a canonical [`AttendanceDate`]. The first
//! recognizable date anywhere in the text wins, so `9月2日に参加します`
//! normalizes the same way as a bare `9月2日`. A missing year resolves to
//! the year of the reference date.

use chrono::{Datelike, NaiveDate};
use regex::{Captures, Regex};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// A canonical calendar day used as a roster bucket.
///
/// Ordering is calendar order, independent of how the user typed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttendanceDate(NaiveDate);

impl AttendanceDate {
    /// Build a date from numeric components, rejecting impossible days.
    #[must_use]
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    /// The underlying calendar date.
    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.0
    }
}

impl From<NaiveDate> for AttendanceDate {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl fmt::Display for AttendanceDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

/// Reason a text could not be normalized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseFailure {
    /// No recognized date shape appears in the text.
    #[error("no recognizable date in {0:?}")]
    NoMatch(String),
    /// A date shape matched but the components are not a calendar day.
    #[error("{year}-{month}-{day} is not a calendar date")]
    InvalidDate {
        /// Year component (resolved from the reference when absent).
        year: i32,
        /// Month component as typed.
        month: u32,
        /// Day component as typed.
        day: u32,
    },
}

impl From<ParseFailure> for crate::RollcallError {
    fn from(err: ParseFailure) -> Self {
        Self::Date(err.to_string())
    }
}

/// Supported date shapes, most specific first.
///
/// Components are bounded by non-digits so `123/4` or `2025-09-021` never
/// match a shorter shape inside a longer digit run.
static DATE_SHAPES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?:^|[^0-9])(?P<y>[0-9]{4})\s*-\s*(?P<m>[0-9]{1,2})\s*-\s*(?P<d>[0-9]{1,2})(?:[^0-9]|$)",
        r"(?:^|[^0-9])(?P<y>[0-9]{4})\s*/\s*(?P<m>[0-9]{1,2})\s*/\s*(?P<d>[0-9]{1,2})(?:[^0-9]|$)",
        r"(?:^|[^0-9])(?P<y>[0-9]{4})\s*年\s*(?P<m>[0-9]{1,2})\s*月\s*(?P<d>[0-9]{1,2})\s*日",
        r"(?:^|[^0-9])(?P<m>[0-9]{1,2})\s*月\s*(?P<d>[0-9]{1,2})\s*日",
        r"(?:^|[^0-9])(?P<m>[0-9]{1,2})\s*/\s*(?P<d>[0-9]{1,2})(?:[^0-9]|$)",
    ]
    .into_iter()
    .map(|pattern| Regex::new(pattern).expect("valid date pattern"))
    .collect()
});

/// Normalize `raw` into an [`AttendanceDate`].
///
/// `reference` supplies the year when the text omits it; pass today's date
/// in the service timezone.
pub fn normalize(raw: &str, reference: NaiveDate) -> Result<AttendanceDate, ParseFailure> {
    let folded = fold_width(raw);
    let no_match = || ParseFailure::NoMatch(raw.trim().to_owned());

    // Earliest position in the text wins; ties go to the more specific shape.
    let caps = DATE_SHAPES
        .iter()
        .filter_map(|shape| shape.captures(&folded))
        .min_by_key(component_start)
        .ok_or_else(no_match)?;

    let year = component(&caps, "y").unwrap_or(reference.year());
    let (Some(month), Some(day)) = (component(&caps, "m"), component(&caps, "d")) else {
        return Err(no_match());
    };

    AttendanceDate::from_ymd(year, month, day).ok_or(ParseFailure::InvalidDate { year, month, day })
}

fn component_start(caps: &Captures<'_>) -> usize {
    caps.name("y")
        .or_else(|| caps.name("m"))
        .map_or(usize::MAX, |m| m.start())
}

fn component<T: FromStr>(caps: &Captures<'_>, name: &str) -> Option<T> {
    caps.name(name).and_then(|m| m.as_str().parse().ok())
}

/// Fold full-width digits and separators to their ASCII forms.
fn fold_width(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '０'..='９' => char::from_u32(u32::from(c) - u32::from('０') + u32::from('0')).unwrap_or(c),
            '／' => '/',
            '－' | '‐' | '−' => '-',
            _ => c,
        })
        .collect()
}

//! Attendance roster: date normalization and the date-keyed store.

pub mod date;
pub mod store;

pub use date::{AttendanceDate, ParseFailure, normalize};
pub use store::{EvictOutcome, ParticipantId, RosterEntry, RosterStore};

use chrono::NaiveDate;
use sha2::{Digest, Sha256};
use std::fmt;

/// Longest readable prefix kept from opaque text in a file stem.
const OPAQUE_STEM_CHARS: usize = 32;
/// Hex digits of the SHA-256 digest appended to opaque stems.
const OPAQUE_DIGEST_CHARS: usize = 16;

/// Bucket key for registrations.
///
/// Normalized dates sort before opaque keys; opaque keys only exist when
/// unparseable text is configured to be kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RosterKey {
    /// A normalized calendar day.
    Date(AttendanceDate),
    /// Raw user text that did not normalize.
    Opaque(String),
}

impl RosterKey {
    /// Whether the bucket is stale relative to `today`.
    ///
    /// Dates strictly before `today` are stale. Opaque keys cannot be
    /// compared and are always treated as stale once exported.
    #[must_use]
    pub fn is_stale(&self, today: NaiveDate) -> bool {
        match self {
            Self::Date(date) => date.date() < today,
            Self::Opaque(_) => true,
        }
    }

    /// Path-safe stem used in artifact names.
    ///
    /// Distinct keys always get distinct stems. Opaque text keeps a short
    /// readable ASCII part followed by a digest of the raw text.
    #[must_use]
    pub fn file_stem(&self) -> String {
        match self {
            Self::Date(date) => date.to_string(),
            Self::Opaque(raw) => {
                let readable: String = raw
                    .chars()
                    .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace() || *c == '-')
                    .collect::<String>()
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join("_")
                    .chars()
                    .take(OPAQUE_STEM_CHARS)
                    .collect();

                let mut hasher = Sha256::new();
                hasher.update(raw.as_bytes());
                let digest = format!("{:x}", hasher.finalize());
                let digest = &digest[..OPAQUE_DIGEST_CHARS];

                if readable.is_empty() {
                    format!("opaque_{digest}")
                } else {
                    format!("opaque_{readable}_{digest}")
                }
            }
        }
    }
}

impl From<AttendanceDate> for RosterKey {
    fn from(date: AttendanceDate) -> Self {
        Self::Date(date)
    }
}

impl fmt::Display for RosterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Date(date) => date.fmt(f),
            Self::Opaque(raw) => f.write_str(raw),
        }
    }
}

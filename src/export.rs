//! Roster export.
//!
//! Produces one CSV [`Artifact`] per roster entry. Display names are looked
//! up per participant with a timeout; a failed lookup leaves that name empty
//! and the export continues.

use crate::channels::traits::Messenger;
use crate::config::ExportConfig;
use crate::roster::{ParticipantId, RosterEntry, RosterKey};
use bytes::Bytes;
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

const UTF8_BOM: &str = "\u{feff}";

/// An exported roster, held in memory.
///
/// It can be persisted through [`crate::artifacts::ArtifactStore`] for
/// delivery by link, or sent as text for inline delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Deterministic file name: `<prefix>_<key>.csv`.
    pub file_name: String,
    /// Encoded CSV bytes.
    pub content: Bytes,
    /// Number of data rows (participants).
    pub rows: usize,
}

impl Artifact {
    /// CSV content as text, without a byte order mark.
    #[must_use]
    pub fn text(&self) -> Cow<'_, str> {
        let text = String::from_utf8_lossy(&self.content);
        match text {
            Cow::Borrowed(s) => Cow::Borrowed(s.strip_prefix(UTF8_BOM).unwrap_or(s)),
            Cow::Owned(s) => Cow::Owned(s.strip_prefix(UTF8_BOM).unwrap_or(&s).to_owned()),
        }
    }
}

/// Deterministic artifact name for a roster key.
#[must_use]
pub fn artifact_name(prefix: &str, key: &RosterKey) -> String {
    format!("{}_{}.csv", prefix.trim(), key.file_stem())
}

/// Serializes roster entries, optionally enriched with display names.
pub struct Exporter {
    messenger: Option<Arc<dyn Messenger>>,
    file_prefix: String,
    lookup_timeout: Duration,
    utf8_bom: bool,
}

impl Exporter {
    /// Build an exporter. Names are resolved through `messenger` only when
    /// `config.enrich_display_names` is set.
    pub fn new(config: &ExportConfig, messenger: Arc<dyn Messenger>) -> Self {
        Self {
            messenger: config.enrich_display_names.then_some(messenger),
            file_prefix: config.file_prefix.clone(),
            lookup_timeout: Duration::from_secs(config.lookup_timeout_secs.max(1)),
            utf8_bom: config.utf8_bom,
        }
    }

    /// Export one entry. Never fails: lookup errors degrade to empty names.
    pub async fn export(&self, entry: &RosterEntry) -> Artifact {
        let mut out = String::new();
        if self.utf8_bom {
            out.push_str(UTF8_BOM);
        }

        match &self.messenger {
            Some(messenger) => {
                push_row(&mut out, &["user_id", "display_name"]);
                for participant in &entry.participants {
                    let name = self
                        .lookup_name(messenger.as_ref(), participant)
                        .await
                        .unwrap_or_default();
                    push_row(&mut out, &[participant.as_str(), &name]);
                }
            }
            None => {
                push_row(&mut out, &["user_id"]);
                for participant in &entry.participants {
                    push_row(&mut out, &[participant.as_str()]);
                }
            }
        }

        Artifact {
            file_name: artifact_name(&self.file_prefix, &entry.key),
            content: Bytes::from(out),
            rows: entry.participants.len(),
        }
    }

    async fn lookup_name(
        &self,
        messenger: &dyn Messenger,
        participant: &ParticipantId,
    ) -> Option<String> {
        match tokio::time::timeout(
            self.lookup_timeout,
            messenger.display_name(participant.as_str()),
        )
        .await
        {
            Ok(Ok(name)) => Some(name),
            Ok(Err(err)) => {
                warn!(participant = %participant, "display name lookup failed: {err}");
                None
            }
            Err(_) => {
                warn!(
                    participant = %participant,
                    "display name lookup timed out after {}s",
                    self.lookup_timeout.as_secs()
                );
                None
            }
        }
    }
}

/// Leading characters a spreadsheet evaluates as a formula.
const FORMULA_TRIGGERS: [char; 6] = ['=', '+', '-', '@', '\t', '\r'];

/// Append one CSV record with RFC 4180 quoting and CRLF line ending.
///
/// Fields that would open as a spreadsheet formula get a leading `'`.
fn push_row(out: &mut String, fields: &[&str]) {
    for (index, &field) in fields.iter().enumerate() {
        if index > 0 {
            out.push(',');
        }
        let neutralized;
        let field = if field.starts_with(FORMULA_TRIGGERS) {
            neutralized = format!("'{field}");
            neutralized.as_str()
        } else {
            field
        };
        if field.contains([',', '"', '\r', '\n']) {
            out.push('"');
            out.push_str(&field.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(field);
        }
    }
    out.push_str("\r\n");
}

//! Administrator notification.
//!
//! Delivers one exported roster with exactly one push attempt, either as a
//! download link to a persisted artifact or inline as message text.

use crate::artifacts::ArtifactStore;
use crate::channels::line::{MAX_MESSAGES_PER_REQUEST, MAX_TEXT_CHARS};
use crate::channels::traits::Messenger;
use crate::config::{DeliveryMode, RollcallConfig};
use crate::export::Artifact;
use crate::roster::RosterKey;
use std::sync::Arc;
use std::time::Duration;

/// How an artifact reached the administrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivered {
    /// A download link was pushed.
    Link { url: String },
    /// The content was pushed inline.
    Inline { truncated: bool },
}

/// Pushes exported rosters to the administrator.
pub struct Notifier {
    messenger: Arc<dyn Messenger>,
    admin_id: String,
    mode: DeliveryMode,
    public_base_url: String,
    artifacts: ArtifactStore,
    timeout: Duration,
}

impl Notifier {
    pub fn new(
        config: &RollcallConfig,
        messenger: Arc<dyn Messenger>,
        artifacts: ArtifactStore,
    ) -> Self {
        Self {
            messenger,
            admin_id: config.admin.user_id.trim().to_owned(),
            mode: config.export.delivery,
            public_base_url: config
                .server
                .public_base_url
                .trim()
                .trim_end_matches('/')
                .to_owned(),
            artifacts,
            timeout: Duration::from_secs(config.export.delivery_timeout_secs.max(1)),
        }
    }

    /// Public download URL for an artifact name.
    #[must_use]
    pub fn download_url(&self, name: &str) -> String {
        format!(
            "{}/download/{}",
            self.public_base_url,
            urlencoding::encode(name)
        )
    }

    /// Deliver `artifact` for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RollcallError::Delivery`] when the artifact cannot be
    /// persisted (link mode) or the push fails or times out. There is no retry.
    pub async fn notify(&self, key: &RosterKey, artifact: &Artifact) -> crate::Result<Delivered> {
        let header = format!("Roster {key} ({} participants)", artifact.rows);

        let (texts, delivered) = match self.mode {
            DeliveryMode::Link => {
                self.artifacts.save(artifact).await.map_err(|e| {
                    crate::RollcallError::Delivery(format!(
                        "cannot persist {}: {e}",
                        artifact.file_name
                    ))
                })?;
                let url = self.download_url(&artifact.file_name);
                (vec![format!("{header}: {url}")], Delivered::Link { url })
            }
            DeliveryMode::Inline => {
                let body = artifact.text().replace("\r\n", "\n");
                let (chunks, truncated) = chunk_lines(
                    &body,
                    MAX_TEXT_CHARS,
                    MAX_MESSAGES_PER_REQUEST.saturating_sub(1),
                );
                let header = if truncated {
                    format!("{header} (truncated; use link delivery for the full roster)")
                } else {
                    header
                };
                let mut texts = vec![header];
                texts.extend(chunks);
                (texts, Delivered::Inline { truncated })
            }
        };

        match tokio::time::timeout(self.timeout, self.messenger.push(&self.admin_id, &texts)).await
        {
            Ok(Ok(())) => Ok(delivered),
            Ok(Err(err)) => Err(crate::RollcallError::Delivery(format!(
                "{} push for {key} failed: {err}",
                self.messenger.id()
            ))),
            Err(_) => Err(crate::RollcallError::Delivery(format!(
                "{} push for {key} timed out after {}s",
                self.messenger.id(),
                self.timeout.as_secs()
            ))),
        }
    }
}

/// Split text on line boundaries into at most `max_chunks` chunks of at most
/// `max_chars` characters. Returns whether lines were left out.
fn chunk_lines(text: &str, max_chars: usize, max_chunks: usize) -> (Vec<String>, bool) {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split_inclusive('\n') {
        let len = line.chars().count();
        if current_len + len > max_chars && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if chunks.len() >= max_chunks {
            return (chunks, true);
        }
        current.push_str(line);
        current_len += len;
    }

    if !current.is_empty() {
        if chunks.len() >= max_chunks {
            return (chunks, true);
        }
        chunks.push(current);
    }
    (chunks, false)
}

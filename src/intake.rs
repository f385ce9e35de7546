//! Webhook batch intake.
//!
//! Decodes each event, reduces it, commits the registration to the roster
//! and then makes one best-effort reply. Failures stay local to their event.

use crate::channels::events::ChatEvent;
use crate::channels::traits::Messenger;
use crate::reducer::{EventReducer, Reply};
use crate::roster::RosterStore;
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Per-batch counters returned to the webhook caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Events in the batch.
    pub received: usize,
    /// Registrations committed (including idempotent repeats).
    pub registered: usize,
    /// Events that could not be decoded.
    pub malformed: usize,
    /// Replies that failed or timed out.
    pub replies_failed: usize,
}

/// Applies webhook batches to the roster.
pub struct Intake {
    store: Arc<RosterStore>,
    messenger: Arc<dyn Messenger>,
    reducer: EventReducer,
    timezone: Tz,
    reply_timeout: Duration,
}

impl Intake {
    pub fn new(
        store: Arc<RosterStore>,
        messenger: Arc<dyn Messenger>,
        reducer: EventReducer,
        timezone: Tz,
    ) -> Self {
        Self {
            store,
            messenger,
            reducer,
            timezone,
            reply_timeout: Duration::from_secs(10),
        }
    }

    /// Override the bound on each reply call.
    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    /// Process a batch using today's date in the service timezone.
    pub async fn handle_batch(&self, events: &[serde_json::Value]) -> BatchReport {
        let today = Utc::now().with_timezone(&self.timezone).date_naive();
        self.handle_batch_on(events, today).await
    }

    /// Process a batch against an explicit `today`.
    pub async fn handle_batch_on(
        &self,
        events: &[serde_json::Value],
        today: NaiveDate,
    ) -> BatchReport {
        let mut report = BatchReport {
            received: events.len(),
            ..BatchReport::default()
        };

        for (index, value) in events.iter().enumerate() {
            let event = match ChatEvent::from_value(value) {
                Ok(event) => event,
                Err(err) => {
                    warn!(index, "skipping malformed webhook event: {err}");
                    report.malformed += 1;
                    continue;
                }
            };

            let reduction = self.reducer.reduce(&event, today);

            // The registration is committed before any reply is attempted.
            if let Some(registration) = reduction.registration {
                let added = self
                    .store
                    .register(registration.key.clone(), registration.participant.clone());
                report.registered += 1;
                if added {
                    info!(
                        date = %registration.key,
                        participant = %registration.participant,
                        "registered"
                    );
                } else {
                    debug!(
                        date = %registration.key,
                        participant = %registration.participant,
                        "already registered"
                    );
                }
            }

            if let Some(reply) = reduction.reply
                && !self.send_reply(reply).await
            {
                report.replies_failed += 1;
            }
        }

        report
    }

    async fn send_reply(&self, reply: Reply) -> bool {
        let texts = [reply.text];
        let result = tokio::time::timeout(
            self.reply_timeout,
            self.messenger.reply(&reply.reply_token, &texts),
        )
        .await;

        match result {
            Ok(Ok(())) => true,
            Ok(Err(err)) => {
                warn!("failed to send {} reply: {err}", self.messenger.id());
                false
            }
            Err(_) => {
                warn!(
                    "{} reply timed out after {}s",
                    self.messenger.id(),
                    self.reply_timeout.as_secs()
                );
                false
            }
        }
    }
}

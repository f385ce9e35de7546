//! Event-to-roster reducer.
//!
//! [`EventReducer::reduce`] is pure: it decides what a single [`ChatEvent`]
//! means for the roster and what to answer, and leaves applying the
//! mutation and sending the reply to the caller.

use crate::channels::events::ChatEvent;
use crate::config::{RegistrationConfig, UnparsedPolicy};
use crate::roster::{ParticipantId, RosterKey, normalize};
use chrono::NaiveDate;

/// Reply sent when text has no recognizable date under the `hint` policy.
pub const USAGE_HINT: &str = "Send a date like 9月2日 or 2025-09-02 to register.";

/// A roster mutation produced by an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub participant: ParticipantId,
    pub key: RosterKey,
}

/// A reply addressed through the event's reply token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub reply_token: String,
    pub text: String,
}

/// Outcome of reducing one event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reduction {
    pub registration: Option<Registration>,
    pub reply: Option<Reply>,
}

/// Turns chat events into registrations according to the configured grammar.
#[derive(Debug, Clone)]
pub struct EventReducer {
    policy: UnparsedPolicy,
    command_prefix: Option<String>,
}

impl EventReducer {
    pub fn new(config: &RegistrationConfig) -> Self {
        Self {
            policy: config.unparsed_policy,
            command_prefix: config
                .command_prefix
                .as_deref()
                .map(str::trim)
                .filter(|prefix| !prefix.is_empty())
                .map(str::to_owned),
        }
    }

    /// Reduce one event. `today` supplies the year for dates typed without one.
    #[must_use]
    pub fn reduce(&self, event: &ChatEvent, today: NaiveDate) -> Reduction {
        match event {
            ChatEvent::TextMessage {
                sender,
                text,
                reply_token,
            } => match self.command_body(text) {
                Some(body) => self.reduce_text(sender, body, reply_token.as_deref(), today),
                None => Reduction::default(),
            },
            ChatEvent::Postback {
                sender,
                data,
                date_param,
                reply_token,
            } => {
                let raw = date_param
                    .as_deref()
                    .unwrap_or_else(|| postback_date_text(data));
                self.reduce_text(sender, raw, reply_token.as_deref(), today)
            }
            ChatEvent::Other => Reduction::default(),
        }
    }

    /// Text after the command prefix, or the whole text when no prefix is set.
    fn command_body<'a>(&self, text: &'a str) -> Option<&'a str> {
        let text = text.trim();
        match &self.command_prefix {
            Some(prefix) => text.strip_prefix(prefix.as_str()).map(str::trim),
            None => Some(text),
        }
    }

    fn reduce_text(
        &self,
        sender: &ParticipantId,
        raw: &str,
        reply_token: Option<&str>,
        today: NaiveDate,
    ) -> Reduction {
        match normalize(raw, today) {
            Ok(date) => registered(sender, RosterKey::Date(date), reply_token),
            Err(failure) => {
                tracing::debug!(participant = %sender, "unparsed registration text: {failure}");
                match self.policy {
                    UnparsedPolicy::Opaque if !raw.trim().is_empty() => {
                        registered(sender, RosterKey::Opaque(raw.trim().to_owned()), reply_token)
                    }
                    UnparsedPolicy::Opaque | UnparsedPolicy::Drop => Reduction::default(),
                    UnparsedPolicy::Hint => Reduction {
                        registration: None,
                        reply: reply_token.map(|token| Reply {
                            reply_token: token.to_owned(),
                            text: USAGE_HINT.to_owned(),
                        }),
                    },
                }
            }
        }
    }
}

fn registered(sender: &ParticipantId, key: RosterKey, reply_token: Option<&str>) -> Reduction {
    let reply = reply_token.map(|token| Reply {
        reply_token: token.to_owned(),
        text: format!("Registered for {key}."),
    });
    Reduction {
        registration: Some(Registration {
            participant: sender.clone(),
            key,
        }),
        reply,
    }
}

/// Date text carried in postback data: `date=...` / `register=...` pairs, or
/// the whole string.
fn postback_date_text(data: &str) -> &str {
    data.split('&')
        .find_map(|pair| {
            pair.strip_prefix("date=")
                .or_else(|| pair.strip_prefix("register="))
        })
        .unwrap_or(data)
}

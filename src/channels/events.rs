//! Webhook payload decoding.
//!
//! A webhook request carries a batch of events. Events are kept as raw JSON
//! in [`WebhookBatch`] and decoded one at a time, so a malformed event only
//! affects itself.

use crate::roster::ParticipantId;
use serde::Deserialize;

/// Body of a webhook request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookBatch {
    /// Bot user id the batch is addressed to.
    #[serde(default)]
    pub destination: Option<String>,
    /// Undecoded events.
    #[serde(default)]
    pub events: Vec<serde_json::Value>,
}

/// Closed set of chat events the roster core distinguishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// Text message from an identified user.
    TextMessage {
        sender: ParticipantId,
        text: String,
        reply_token: Option<String>,
    },
    /// Postback from a button or date picker.
    Postback {
        sender: ParticipantId,
        data: String,
        /// `params.date` set by a date-picker action.
        date_param: Option<String>,
        reply_token: Option<String>,
    },
    /// Anything else (follow, join, stickers, group events without a user).
    Other,
}

#[derive(Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(rename = "replyToken", default)]
    reply_token: Option<String>,
    #[serde(default)]
    source: Option<RawSource>,
    #[serde(default)]
    message: Option<RawMessage>,
    #[serde(default)]
    postback: Option<RawPostback>,
}

#[derive(Deserialize)]
struct RawSource {
    #[serde(rename = "userId", default)]
    user_id: Option<String>,
}

#[derive(Deserialize)]
struct RawMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct RawPostback {
    #[serde(default)]
    data: String,
    #[serde(default)]
    params: Option<RawPostbackParams>,
}

#[derive(Deserialize)]
struct RawPostbackParams {
    #[serde(default)]
    date: Option<String>,
}

impl ChatEvent {
    /// Decode one webhook event.
    ///
    /// # Errors
    ///
    /// Returns an error when the event is not an object with a string `type`.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        let raw = RawEvent::deserialize(value)?;

        let Some(sender) = raw
            .source
            .and_then(|source| source.user_id)
            .map(|id| id.trim().to_owned())
            .filter(|id| !id.is_empty())
        else {
            return Ok(Self::Other);
        };
        let reply_token = raw.reply_token.filter(|token| !token.trim().is_empty());

        let event = match raw.kind.as_str() {
            "message" => match raw.message {
                Some(RawMessage {
                    kind,
                    text: Some(text),
                }) if kind == "text" => Self::TextMessage {
                    sender: ParticipantId::new(sender),
                    text,
                    reply_token,
                },
                _ => Self::Other,
            },
            "postback" => match raw.postback {
                Some(postback) => Self::Postback {
                    sender: ParticipantId::new(sender),
                    data: postback.data,
                    date_param: postback.params.and_then(|params| params.date),
                    reply_token,
                },
                None => Self::Other,
            },
            _ => Self::Other,
        };
        Ok(event)
    }
}

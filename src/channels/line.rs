use crate::channels::traits::Messenger;
use crate::config::LineConfig;
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

/// Maximum number of message objects per reply/push request.
pub const MAX_MESSAGES_PER_REQUEST: usize = 5;

/// Maximum characters in a single text message.
pub const MAX_TEXT_CHARS: usize = 5000;

/// LINE Messaging API adapter.
///
/// Inbound events are webhook-driven; the gateway owns the webhook route and
/// this adapter only covers outbound calls and profile lookups.
#[derive(Clone)]
pub struct LineMessenger {
    api_base_url: String,
    access_token: String,
    client: reqwest::Client,
}

impl LineMessenger {
    /// Build an adapter from config.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &LineConfig) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .build()
            .map_err(|e| crate::RollcallError::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            api_base_url: config.api_base_url.trim_end_matches('/').to_owned(),
            access_token: config.channel_access_token.trim().to_owned(),
            client,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.api_base_url)
    }

    async fn post_messages(
        &self,
        path: &str,
        mut body: serde_json::Value,
        texts: &[String],
    ) -> anyhow::Result<()> {
        if self.access_token.is_empty() {
            anyhow::bail!("line access token is empty");
        }
        let messages = text_messages(texts);
        if messages.is_empty() {
            anyhow::bail!("refusing to send an empty message batch");
        }
        body["messages"] = serde_json::Value::Array(messages);

        let response = self
            .client
            .post(self.endpoint(path))
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("line {path} failed ({status}): {body}");
        }
        Ok(())
    }
}

/// Build LINE text message objects, applying platform limits.
fn text_messages(texts: &[String]) -> Vec<serde_json::Value> {
    texts
        .iter()
        .filter(|text| !text.trim().is_empty())
        .take(MAX_MESSAGES_PER_REQUEST)
        .map(|text| {
            json!({
                "type": "text",
                "text": truncate_chars(text, MAX_TEXT_CHARS),
            })
        })
        .collect()
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[async_trait]
impl Messenger for LineMessenger {
    fn id(&self) -> &'static str {
        "line"
    }

    async fn reply(&self, reply_token: &str, texts: &[String]) -> anyhow::Result<()> {
        if reply_token.trim().is_empty() {
            anyhow::bail!("reply token is empty");
        }
        self.post_messages(
            "/v2/bot/message/reply",
            json!({ "replyToken": reply_token }),
            texts,
        )
        .await
    }

    async fn push(&self, to: &str, texts: &[String]) -> anyhow::Result<()> {
        if to.trim().is_empty() {
            anyhow::bail!("push recipient is empty");
        }
        self.post_messages("/v2/bot/message/push", json!({ "to": to }), texts)
            .await
    }

    async fn display_name(&self, user_id: &str) -> anyhow::Result<String> {
        if self.access_token.is_empty() {
            anyhow::bail!("line access token is empty");
        }
        let url = self.endpoint(&format!("/v2/bot/profile/{}", urlencoding::encode(user_id)));
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("line profile lookup failed ({status}): {body}");
        }

        let profile: serde_json::Value = response.json().await?;
        profile
            .get("displayName")
            .and_then(serde_json::Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| anyhow::anyhow!("line profile for {user_id} has no displayName"))
    }
}

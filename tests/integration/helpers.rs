//! Shared helpers for integration tests.

use async_trait::async_trait;
use rollcall::RollcallConfig;
use rollcall::channels::Messenger;
use rollcall::config::DeliveryMode;
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

/// In-process messenger that records every outbound call.
#[derive(Default)]
pub(crate) struct RecordingMessenger {
    pub(crate) names: HashMap<String, String>,
    /// Pushes whose text contains any of these substrings fail.
    pub(crate) fail_pushes_containing: Vec<String>,
    pub(crate) replies: Mutex<Vec<(String, Vec<String>)>>,
    pub(crate) pushes: Mutex<Vec<(String, Vec<String>)>>,
}

impl RecordingMessenger {
    pub(crate) fn with_names(names: &[(&str, &str)]) -> Self {
        Self {
            names: names
                .iter()
                .map(|(id, name)| ((*id).to_owned(), (*name).to_owned()))
                .collect(),
            ..Self::default()
        }
    }

    pub(crate) fn pushes(&self) -> Vec<(String, Vec<String>)> {
        self.pushes.lock().unwrap().clone()
    }

    pub(crate) fn reply_texts(&self) -> Vec<String> {
        self.replies
            .lock()
            .unwrap()
            .iter()
            .map(|(_, texts)| texts.join("\n"))
            .collect()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    fn id(&self) -> &'static str {
        "recording"
    }

    async fn reply(&self, reply_token: &str, texts: &[String]) -> anyhow::Result<()> {
        self.replies
            .lock()
            .unwrap()
            .push((reply_token.to_owned(), texts.to_vec()));
        Ok(())
    }

    async fn push(&self, to: &str, texts: &[String]) -> anyhow::Result<()> {
        self.pushes
            .lock()
            .unwrap()
            .push((to.to_owned(), texts.to_vec()));
        let joined = texts.join("\n");
        if self
            .fail_pushes_containing
            .iter()
            .any(|needle| joined.contains(needle.as_str()))
        {
            anyhow::bail!("push rejected by test messenger");
        }
        Ok(())
    }

    async fn display_name(&self, user_id: &str) -> anyhow::Result<String> {
        self.names
            .get(user_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no profile for {user_id}"))
    }
}

/// A complete config writing artifacts under `dir`.
pub(crate) fn service_config(dir: &Path, delivery: DeliveryMode) -> RollcallConfig {
    let mut config = RollcallConfig::default();
    config.line.channel_access_token = "test-token".to_owned();
    config.admin.user_id = "Uadmin".to_owned();
    config.server.public_base_url = "https://bot.example.com".to_owned();
    config.export.directory = dir.to_path_buf();
    config.export.delivery = delivery;
    config.export.utf8_bom = false;
    config
}

/// A LINE text message event from `user`.
pub(crate) fn text_event(user: &str, text: &str) -> serde_json::Value {
    json!({
        "type": "message",
        "replyToken": format!("reply-{user}"),
        "source": { "type": "user", "userId": user },
        "message": { "id": "1", "type": "text", "text": text }
    })
}

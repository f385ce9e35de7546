use async_trait::async_trait;

/// Outbound messaging contract of the chat platform.
///
/// The roster core only needs three operations: answer a webhook event,
/// push to a known account, and resolve a display name. Implementations
/// report failures; callers decide whether a failure matters.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Stable platform identifier (e.g. `line`).
    fn id(&self) -> &'static str;

    /// Answer an inbound event through its reply token.
    async fn reply(&self, reply_token: &str, texts: &[String]) -> anyhow::Result<()>;

    /// Push text messages to an account.
    async fn push(&self, to: &str, texts: &[String]) -> anyhow::Result<()>;

    /// Resolve the display name of an account.
    async fn display_name(&self, user_id: &str) -> anyhow::Result<String>;
}

//! Chat platform plumbing: webhook decoding, the messaging client and the
//! HTTP gateway.
//!
//! The roster core only sees [`traits::Messenger`] and
//! [`events::ChatEvent`]; everything LINE-specific stays in this module.

pub mod events;
pub mod gateway;
pub mod line;
pub mod traits;

pub use events::{ChatEvent, WebhookBatch};
pub use gateway::{GatewayState, router, run_gateway};
pub use line::LineMessenger;
pub use traits::Messenger;

use crate::config::RollcallConfig;
use std::sync::Arc;

/// Build the configured messenger.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be constructed.
pub fn messenger_from_config(config: &RollcallConfig) -> crate::Result<Arc<dyn Messenger>> {
    let line = LineMessenger::new(&config.line)?;
    tracing::debug!(api = %config.line.api_base_url, "line messenger ready");
    Ok(Arc::new(line))
}

//! Rollcall: chat attendance roster with a weekly export to an administrator.
//!
//! Participants message a LINE bot with the date they will attend. The
//! service keeps an in-memory roster keyed by date and, once a week,
//! exports every date as CSV, pushes it to the administrator and evicts the
//! dates that have passed.
//!
//! # Architecture
//!
//! - **Intake**: webhook batch → [`channels::ChatEvent`] → [`reducer`] →
//!   [`roster::RosterStore`] mutation → optional reply
//! - **Cycle**: [`scheduler::Scheduler`] → [`export::Exporter`] →
//!   [`notify::Notifier`] → eviction
//! - **Gateway**: `axum` routes for the webhook, artifact downloads and health

pub mod artifacts;
pub mod channels;
pub mod config;
pub mod error;
pub mod export;
pub mod intake;
pub mod logging;
pub mod notify;
pub mod reducer;
pub mod roster;
pub mod scheduler;
pub mod service;

pub use config::RollcallConfig;
pub use error::{Result, RollcallError};
pub use service::Service;

//! Generation backend adapters.
//!
//! - [`api::GenerationApi`]: REST client for job submission, job status,
//!   the model catalog and the credit balance.
//! - [`manager::PushFeedManager`]: realtime job feed over WebSocket with
//!   reconnect and resubscribe.

pub mod api;
pub mod client;
pub mod manager;
pub mod messages;
pub mod processor;
pub mod reconnect;

pub use api::{GenerationApi, ProviderApiError};
pub use manager::PushFeedManager;

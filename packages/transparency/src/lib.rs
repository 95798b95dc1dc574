// ABOUTME: Transparency logging for Unison sessions
// ABOUTME: Append-only ordered action records with non-blocking live subscriber fan-out

pub mod log;
pub mod subscriber;

pub use log::{TransparencyExport, TransparencyLog};
pub use subscriber::{subscriber_fn, FnSubscriber, SubscriberError, TransparencySubscriber};

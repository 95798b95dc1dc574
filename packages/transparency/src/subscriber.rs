// ABOUTME: Subscriber trait for live transparency notifications
// ABOUTME: Adapts async closures so callers can subscribe without defining a type

use async_trait::async_trait;
use std::future::Future;
use thiserror::Error;
use unison_core::AgentAction;

#[derive(Error, Debug)]
pub enum SubscriberError {
    #[error("Subscriber failed: {0}")]
    Failed(String),

    #[error("Subscriber disconnected")]
    Disconnected,
}

/// Receives every action appended to a log after registration.
///
/// Each subscriber is driven by its own task, so a slow or failing
/// implementation only delays itself. Errors are logged by the log and
/// never reach the appending caller.
#[async_trait]
pub trait TransparencySubscriber: Send + Sync {
    async fn notify(&self, action: AgentAction) -> Result<(), SubscriberError>;
}

/// Subscriber backed by an async closure
pub struct FnSubscriber<F> {
    callback: F,
}

#[async_trait]
impl<F, Fut> TransparencySubscriber for FnSubscriber<F>
where
    F: Fn(AgentAction) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), SubscriberError>> + Send + 'static,
{
    async fn notify(&self, action: AgentAction) -> Result<(), SubscriberError> {
        (self.callback)(action).await
    }
}

/// Wrap an async closure as a subscriber
pub fn subscriber_fn<F, Fut>(callback: F) -> FnSubscriber<F>
where
    F: Fn(AgentAction) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), SubscriberError>> + Send + 'static,
{
    FnSubscriber { callback }
}

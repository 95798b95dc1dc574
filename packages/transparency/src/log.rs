// ABOUTME: Per-session transparency log with ordered append and live fan-out
// ABOUTME: Every subscriber owns an unbounded channel drained by its own task

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};
use unison_core::{AgentAction, AgentRole};

use crate::subscriber::{SubscriberError, TransparencySubscriber};

/// Full ordered log of a session, for replay or audit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransparencyExport {
    pub session_id: String,
    pub total_actions: usize,
    pub actions: Vec<AgentAction>,
    pub exported_at: DateTime<Utc>,
}

struct LogInner {
    actions: Vec<AgentAction>,
    subscribers: Vec<mpsc::UnboundedSender<AgentAction>>,
}

/// Append-only record of the actions taken in one session.
///
/// `append` pushes under the log's write lock and hands a clone of the action
/// to every subscriber channel before releasing it, so each subscriber sees
/// actions in append order. Delivery itself happens on the subscriber's task.
pub struct TransparencyLog {
    session_id: String,
    inner: RwLock<LogInner>,
}

impl TransparencyLog {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self::with_history(session_id, Vec::new())
    }

    /// Create a log pre-seeded with earlier actions. Seeding notifies nobody.
    pub fn with_history(session_id: impl Into<String>, actions: Vec<AgentAction>) -> Self {
        Self {
            session_id: session_id.into(),
            inner: RwLock::new(LogInner {
                actions,
                subscribers: Vec::new(),
            }),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Append an action and fan it out. Never waits on subscribers.
    pub async fn append(&self, action: AgentAction) {
        let mut inner = self.inner.write().await;
        inner.actions.push(action.clone());

        let session_id = &self.session_id;
        inner.subscribers.retain(|tx| match tx.send(action.clone()) {
            Ok(()) => true,
            Err(_) => {
                debug!(
                    "Dropping closed transparency subscriber for session {}",
                    session_id
                );
                false
            }
        });
    }

    /// Register a subscriber for every action appended from now on
    pub async fn subscribe<S>(&self, subscriber: S)
    where
        S: TransparencySubscriber + 'static,
    {
        let mut rx = self.subscribe_channel().await;
        let session_id = self.session_id.clone();

        tokio::spawn(async move {
            while let Some(action) = rx.recv().await {
                let action_id = action.id.clone();
                let outcome = AssertUnwindSafe(subscriber.notify(action))
                    .catch_unwind()
                    .await;

                match outcome {
                    Ok(Ok(())) => {}
                    Ok(Err(SubscriberError::Disconnected)) => {
                        debug!(
                            "Transparency subscriber for session {} disconnected",
                            session_id
                        );
                        break;
                    }
                    Ok(Err(e)) => {
                        warn!(
                            "Transparency subscriber failed on action {} in session {}: {}",
                            action_id, session_id, e
                        );
                    }
                    Err(_) => {
                        warn!(
                            "Transparency subscriber panicked on action {} in session {}",
                            action_id, session_id
                        );
                    }
                }
            }
        });
    }

    /// Register a raw channel receiving every action appended from now on
    pub async fn subscribe_channel(&self) -> mpsc::UnboundedReceiver<AgentAction> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.write().await.subscribers.push(tx);
        rx
    }

    /// Actions in append order, optionally filtered by role and tail-limited
    pub async fn query(&self, role: Option<AgentRole>, limit: Option<usize>) -> Vec<AgentAction> {
        let inner = self.inner.read().await;
        let mut actions: Vec<AgentAction> = inner
            .actions
            .iter()
            .filter(|action| role.map_or(true, |r| action.agent_role == r))
            .cloned()
            .collect();

        if let Some(limit) = limit {
            let skip = actions.len().saturating_sub(limit);
            actions.drain(..skip);
        }

        actions
    }

    pub async fn export(&self) -> TransparencyExport {
        let inner = self.inner.read().await;
        TransparencyExport {
            session_id: self.session_id.clone(),
            total_actions: inner.actions.len(),
            actions: inner.actions.clone(),
            exported_at: Utc::now(),
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.actions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.actions.is_empty()
    }

    /// Number of subscribers whose channel is still open
    pub async fn subscriber_count(&self) -> usize {
        self.inner
            .read()
            .await
            .subscribers
            .iter()
            .filter(|tx| !tx.is_closed())
            .count()
    }
}

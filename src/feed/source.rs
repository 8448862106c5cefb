use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::schema::{TopicId, TopicMessage};

/// Events a feed source pushes into a subscription sink.
///
/// These map one-to-one to the classic callback triple
/// (on message / on error / on complete).
#[derive(Debug)]
pub enum FeedEvent {
    /// One fully reassembled topic message
    Message(TopicMessage),

    /// The subscription failed; no further events follow
    Error(FeedError),

    /// Historical replay reached the topic head; no further events follow
    Complete,
}

/// Errors raised by a feed source, either synchronously from
/// `subscribe` or asynchronously through `FeedEvent::Error`.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("invalid feed endpoint: {0}")]
    Endpoint(String),

    #[error("no async runtime available: {0}")]
    Runtime(String),

    #[error("feed request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("feed returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed feed response: {0}")]
    Malformed(String),

    #[error("subscription rejected: {0}")]
    Rejected(String),
}

/// FeedSource is the seam between the collector and the ledger network.
///
/// CONTRACT:
/// - `subscribe` either fails synchronously (no handle, nothing to release)
///   or returns a handle and starts pushing events into `sink`
/// - Events for one subscription are produced by a single task, in feed
///   order (ascending sequence number for historical replay)
/// - After `Error` or `Complete` no further events are sent
/// - `unsubscribe` stops event production; once it returns, nothing new is
///   pushed into the sink (already queued events may remain)
///
/// THREAD SAFETY:
/// - Must be Send + Sync
/// - One instance is shared by all in-flight requests
#[async_trait::async_trait]
pub trait FeedSource: Send + Sync {
    /// Short name used in logs (e.g. "mirror").
    fn name(&self) -> &'static str;

    /// Opens a subscription on `topic` replaying from `start_time`.
    fn subscribe(
        &self,
        topic: &TopicId,
        start_time: DateTime<Utc>,
        sink: mpsc::Sender<FeedEvent>,
    ) -> Result<SubscriptionHandle, FeedError>;

    /// Releases a subscription. Taking the handle by value makes a second
    /// release of the same subscription impossible.
    async fn unsubscribe(&self, handle: SubscriptionHandle);
}

/// Owned token for one open subscription.
///
/// Wraps the background task that produces the subscription's events.
/// Dropping a handle that was never passed to `unsubscribe` aborts that
/// task, so a subscription cannot outlive its owner.
#[derive(Debug)]
pub struct SubscriptionHandle {
    id: u64,
    task: Option<JoinHandle<()>>,
}

impl SubscriptionHandle {
    pub fn new(id: u64, task: JoinHandle<()>) -> Self {
        Self { id, task: Some(task) }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Aborts the producing task and waits until it has stopped.
    pub async fn cancel(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            // Cancelled or finished, both are fine here.
            let _ = task.await;
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

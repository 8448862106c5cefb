use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::{
    feed::{FeedError, FeedEvent, FeedSource},
    metrics::{incr, METRICS},
    schema::{CharacterRecord, TopicId, TopicMessage},
    util, validator,
};

/// Capacity of the per-subscription event channel.
///
/// Bounds how many events can still be queued when the
/// collection window closes.
const FEED_BUFFER: usize = 256;

/// Why the waiting phase of a collection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The feed signalled that the replay reached the topic head
    Completed,

    /// The collection window elapsed first
    TimedOut,
}

/// Result of one successful collection run.
#[derive(Debug)]
pub struct Collection {
    pub topic_id: TopicId,

    /// Complete character records in arrival order
    pub characters: Vec<CharacterRecord>,

    pub stop_reason: StopReason,
}

impl Collection {
    pub fn count(&self) -> usize {
        self.characters.len()
    }
}

/// Subscription-level failures. Per-message problems never end up here.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("failed to subscribe to topic {topic}: {source}")]
    Subscribe { topic: TopicId, source: FeedError },

    #[error("subscription to topic {topic} failed: {source}")]
    Stream { topic: TopicId, source: FeedError },
}

impl CollectError {
    /// The underlying feed fault.
    pub fn feed_error(&self) -> &FeedError {
        match self {
            CollectError::Subscribe { source, .. } | CollectError::Stream { source, .. } => source,
        }
    }
}

/// Runs one bounded subscribe → collect → unsubscribe cycle.
///
/// Flow:
/// - Subscribe to `topic_id` from the beginning of its history
/// - Validate + enrich every inbound message, in arrival order
/// - Stop on whichever comes first: feed completion or `timeout`
/// - Release the subscription, then drain events that were already queued
///
/// GUARANTEES:
/// - Never waits longer than `timeout` for the feed
/// - A subscription that was opened is released exactly once, on every path
/// - Malformed or incomplete messages are skipped, never fatal
///
/// All accumulation happens on the calling task; the feed only talks to
/// it through the channel, so appends are serialized.
pub async fn collect_complete_characters(
    topic_id: &TopicId,
    feed: &dyn FeedSource,
    timeout: Duration,
) -> Result<Collection, CollectError> {
    info!(
        "Collecting complete character data from topic {} via {} (window {} ms)",
        topic_id,
        feed.name(),
        timeout.as_millis()
    );

    let (tx, mut rx) = mpsc::channel::<FeedEvent>(FEED_BUFFER);

    let handle = feed
        .subscribe(topic_id, DateTime::<Utc>::UNIX_EPOCH, tx)
        .map_err(|source| {
            error!("Subscribe to topic {} failed: {}", topic_id, source);
            incr(&METRICS.feed_errors);
            CollectError::Subscribe {
                topic: *topic_id,
                source,
            }
        })?;

    incr(&METRICS.subscriptions_opened);

    let mut characters = Vec::new();

    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    // --------------------------------------------------------
    // Completion vs. deadline
    // --------------------------------------------------------
    let outcome: Result<StopReason, FeedError> = loop {
        tokio::select! {
            _ = &mut deadline => {
                info!("Collection timeout reached for topic {}", topic_id);
                break Ok(StopReason::TimedOut);
            }

            event = rx.recv() => match event {
                Some(FeedEvent::Message(msg)) => accept(msg, &mut characters),

                Some(FeedEvent::Complete) => {
                    debug!("Feed reached the head of topic {}", topic_id);
                    break Ok(StopReason::Completed);
                }

                Some(FeedEvent::Error(e)) => break Err(e),

                // Producer gone without a terminal event
                None => {
                    warn!("Feed for topic {} closed without completion", topic_id);
                    break Ok(StopReason::Completed);
                }
            },
        }
    };

    // --------------------------------------------------------
    // Release (exactly once, every path past subscribe)
    // --------------------------------------------------------
    feed.unsubscribe(handle).await;
    incr(&METRICS.subscriptions_released);

    let stop_reason = match outcome {
        Ok(reason) => reason,
        Err(source) => {
            error!("Subscription to topic {} failed: {}", topic_id, source);
            incr(&METRICS.feed_errors);
            return Err(CollectError::Stream {
                topic: *topic_id,
                source,
            });
        }
    };

    // Messages delivered before the release took effect still count.
    while let Ok(event) = rx.try_recv() {
        if let FeedEvent::Message(msg) = event {
            accept(msg, &mut characters);
        }
    }

    if stop_reason == StopReason::TimedOut {
        incr(&METRICS.collection_timeouts);
    }

    info!(
        "Collected {} complete character(s) from topic {} ({:?})",
        characters.len(),
        topic_id,
        stop_reason
    );

    Ok(Collection {
        topic_id: *topic_id,
        characters,
        stop_reason,
    })
}

/// Validates one message and appends it when it is a complete record.
fn accept(msg: TopicMessage, characters: &mut Vec<CharacterRecord>) {
    incr(&METRICS.messages_received);

    match enrich_message(&msg) {
        Some(record) => {
            info!(
                "Valid character #{}: {}",
                msg.sequence_number,
                display_name(&record)
            );
            incr(&METRICS.records_accepted);
            characters.push(record);
        }
        None => {
            debug!("Skipping incomplete record #{}", msg.sequence_number);
            incr(&METRICS.records_rejected);
        }
    }
}

/// Turns a message into an enriched character record.
///
/// The payload is decoded as UTF-8 with invalid sequences replaced by
/// U+FFFD, so a stray byte inside a string value does not disqualify an
/// otherwise complete card. Returns `None` when the text is not a complete
/// character card (not JSON, wrong shape, missing fields).
///
/// `sequenceNumber` and `timestamp` are always taken from the feed and
/// overwrite same-named payload keys.
pub fn enrich_message(msg: &TopicMessage) -> Option<CharacterRecord> {
    let text = String::from_utf8_lossy(&msg.contents);

    let mut record = validator::parse_complete_record(&text)?;

    record.insert(
        "sequenceNumber".to_string(),
        Value::String(msg.sequence_number.to_string()),
    );
    record.insert(
        "timestamp".to_string(),
        Value::String(util::iso_timestamp(&msg.consensus_timestamp)),
    );

    Some(record)
}

fn display_name(record: &CharacterRecord) -> String {
    match record.get("name") {
        Some(Value::String(name)) => name.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use log::{debug, error, warn};
use reqwest::Url;
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::{
    config::MirrorConfig,
    feed::chunks::{Chunk, ChunkAssembler, ChunkGroup},
    feed::source::{FeedError, FeedEvent, FeedSource, SubscriptionHandle},
    metrics::{incr, METRICS},
    schema::TopicId,
    util,
};

/// Longest error body kept in `FeedError::Status`.
const MAX_ERROR_BODY: usize = 512;

/// Hedera mirror node feed source.
///
/// Mirror REST API:
/// https://docs.hedera.com/hedera/sdks-and-apis/rest-api/topics
///
/// Replays a topic's history page by page (`order=asc`), following
/// `links.next` until the mirror reports no further page. That point is
/// the current topic head and is signalled as `FeedEvent::Complete`.
///
/// One instance (and its `reqwest::Client` connection pool) is shared by
/// every request; each subscription runs in its own task.
pub struct MirrorFeed {
    client: reqwest::Client,
    base_url: Url,
    page_limit: u32,
    next_id: AtomicU64,
}

impl MirrorFeed {
    pub fn new(cfg: &MirrorConfig) -> anyhow::Result<Self> {
        let mut base_url = Url::parse(&cfg.base_url)
            .map_err(|e| anyhow::anyhow!("invalid mirror node url '{}': {}", cfg.base_url, e))?;

        // Url::join drops the last path segment unless it ends with '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .user_agent(concat!("hcs-character-collector/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url,
            page_limit: cfg.page_limit,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Builds the URL of the first history page for `topic`.
    fn first_page_url(&self, topic: &TopicId, start_time: DateTime<Utc>) -> Result<Url, FeedError> {
        let mut url = self
            .base_url
            .join(&format!("api/v1/topics/{}/messages", topic))
            .map_err(|e| FeedError::Endpoint(e.to_string()))?;

        url.query_pairs_mut()
            .append_pair("order", "asc")
            .append_pair("limit", &self.page_limit.to_string())
            .append_pair(
                "timestamp",
                &format!("gte:{}", util::format_consensus_timestamp(&start_time)),
            );

        Ok(url)
    }
}

#[async_trait::async_trait]
impl FeedSource for MirrorFeed {
    fn name(&self) -> &'static str {
        "mirror"
    }

    fn subscribe(
        &self,
        topic: &TopicId,
        start_time: DateTime<Utc>,
        sink: mpsc::Sender<FeedEvent>,
    ) -> Result<SubscriptionHandle, FeedError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| FeedError::Runtime(e.to_string()))?;

        if sink.is_closed() {
            return Err(FeedError::Rejected("subscription sink is already closed".into()));
        }

        let first_page = self.first_page_url(topic, start_time)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        debug!("[mirror] sub#{} replaying topic {} from {}", id, topic, first_page);

        let replay = Replay {
            id,
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            sink,
        };

        let task = runtime.spawn(replay.run(first_page));

        Ok(SubscriptionHandle::new(id, task))
    }

    async fn unsubscribe(&self, handle: SubscriptionHandle) {
        let id = handle.id();
        handle.cancel().await;
        debug!("[mirror] sub#{} released", id);
    }
}

// ------------------------------------------------------------
// Replay task
// ------------------------------------------------------------
//
// Owns the sink for one subscription. It is the only producer
// of events for that subscription, so events are strictly
// ordered.
//
struct Replay {
    id: u64,
    client: reqwest::Client,
    base_url: Url,
    sink: mpsc::Sender<FeedEvent>,
}

impl Replay {
    async fn run(self, first_page: Url) {
        let mut assembler = ChunkAssembler::new();
        let mut next = Some(first_page);

        while let Some(url) = next.take() {
            let page = match self.fetch_page(url).await {
                Ok(page) => page,
                Err(e) => {
                    error!("[mirror] sub#{} page fetch failed: {}", self.id, e);
                    let _ = self.sink.send(FeedEvent::Error(e)).await;
                    return;
                }
            };

            for raw in page.messages {
                let Some(chunk) = raw.into_chunk(self.id) else {
                    continue;
                };

                if let Some(msg) = assembler.push(chunk) {
                    if self.sink.send(FeedEvent::Message(msg)).await.is_err() {
                        debug!("[mirror] sub#{} sink closed, stopping replay", self.id);
                        return;
                    }
                }
            }

            next = match page.links.next {
                Some(link) => match next_page_url(&self.base_url, &link) {
                    Ok(url) => Some(url),
                    Err(e) => {
                        let err = FeedError::Malformed(format!("bad next link '{}': {}", link, e));
                        error!("[mirror] sub#{} {}", self.id, err);
                        let _ = self.sink.send(FeedEvent::Error(err)).await;
                        return;
                    }
                },
                None => None,
            };
        }

        if assembler.pending_groups() > 0 {
            warn!(
                "[mirror] sub#{} reached topic head with {} incomplete chunk group(s)",
                self.id,
                assembler.pending_groups()
            );
        }

        debug!("[mirror] sub#{} reached topic head", self.id);
        let _ = self.sink.send(FeedEvent::Complete).await;
    }

    async fn fetch_page(&self, url: Url) -> Result<MessagesPage, FeedError> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();

        if !status.is_success() {
            let mut body = resp.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let cut = (0..=MAX_ERROR_BODY).rev().find(|i| body.is_char_boundary(*i)).unwrap_or(0);
                body.truncate(cut);
            }
            return Err(FeedError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| FeedError::Malformed(e.to_string()))
    }
}

/// Resolves a `links.next` value against the configured base URL.
///
/// The mirror returns root-absolute paths (`/api/v1/...`); those are made
/// relative first so a path prefix on the base URL (reverse proxy) survives.
fn next_page_url(base_url: &Url, link: &str) -> Result<Url, String> {
    base_url
        .join(link.strip_prefix('/').unwrap_or(link))
        .map_err(|e| e.to_string())
}

// ------------------------------------------------------------
// Mirror REST payloads
// ------------------------------------------------------------
//
// Only the fields the collector needs are modelled; everything
// else (running hash, payer, …) is ignored.
//

#[derive(Debug, Deserialize)]
struct MessagesPage {
    #[serde(default)]
    messages: Vec<MirrorMessage>,

    #[serde(default)]
    links: Links,
}

#[derive(Debug, Default, Deserialize)]
struct Links {
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MirrorMessage {
    /// `seconds.nanos`
    consensus_timestamp: String,

    /// Base64-encoded payload
    message: String,

    sequence_number: u64,

    chunk_info: Option<ChunkInfo>,
}

#[derive(Debug, Deserialize)]
struct ChunkInfo {
    initial_transaction_id: Option<InitialTransactionId>,
    number: u32,
    total: u32,
}

#[derive(Debug, Deserialize)]
struct InitialTransactionId {
    account_id: String,
    transaction_valid_start: String,
    #[serde(default)]
    nonce: i64,
}

impl MirrorMessage {
    /// Decodes one mirror message. Undecodable messages are logged and
    /// skipped so a single bad entry never ends the replay.
    fn into_chunk(self, sub_id: u64) -> Option<Chunk> {
        let contents = match BASE64.decode(self.message.as_bytes()) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(
                    "[mirror] sub#{} seq {} has an undecodable payload: {}",
                    sub_id, self.sequence_number, e
                );
                incr(&METRICS.message_faults);
                return None;
            }
        };

        let Some(consensus_timestamp) = util::parse_consensus_timestamp(&self.consensus_timestamp) else {
            warn!(
                "[mirror] sub#{} seq {} has an invalid consensus timestamp '{}'",
                sub_id, self.sequence_number, self.consensus_timestamp
            );
            incr(&METRICS.message_faults);
            return None;
        };

        let group = match self.chunk_info {
            Some(info) if info.total > 1 => {
                let Some(tx) = info.initial_transaction_id else {
                    warn!(
                        "[mirror] sub#{} seq {} is chunk {}/{} without an initial transaction id, skipping",
                        sub_id, self.sequence_number, info.number, info.total
                    );
                    incr(&METRICS.message_faults);
                    return None;
                };
                Some(ChunkGroup {
                    key: format!("{}@{}/{}", tx.account_id, tx.transaction_valid_start, tx.nonce),
                    number: info.number,
                    total: info.total,
                })
            }
            _ => None,
        };

        Some(Chunk {
            contents,
            sequence_number: self.sequence_number,
            consensus_timestamp,
            group,
        })
    }
}

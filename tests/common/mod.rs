//! Shared helpers for the integration tests: a scripted in-process feed
//! source, payload builders and a server spawner.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use chrono::{DateTime, Utc};
use hcs_character_collector::{
    feed::{FeedError, FeedEvent, FeedSource, SubscriptionHandle},
    schema::{TopicId, TopicMessage},
    server::{self, AppState},
};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

static INIT: Once = Once::new();

/// Initializes logging and the rustls provider once per test binary.
pub fn setup() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// One scripted step of a fake subscription.
#[derive(Debug, Clone)]
pub enum Step {
    Message(TopicMessage),
    Delay(Duration),
    Error(String),
    Complete,
}

/// Feed source that replays a fixed script and counts lifecycle calls.
///
/// If the script does not end in `Complete` or `Error`, the subscription
/// stays open (sink held) until it is released.
pub struct ScriptedFeed {
    script: Vec<Step>,
    preload: Vec<TopicMessage>,
    fail_subscribe: Option<String>,
    next_id: AtomicU64,
    pub subscribes: AtomicUsize,
    pub unsubscribes: AtomicUsize,
}

impl ScriptedFeed {
    pub fn new(script: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            script,
            preload: Vec::new(),
            fail_subscribe: None,
            next_id: AtomicU64::new(1),
            subscribes: AtomicUsize::new(0),
            unsubscribes: AtomicUsize::new(0),
        })
    }

    /// A feed whose `subscribe` call fails synchronously.
    pub fn failing(reason: &str) -> Arc<Self> {
        Arc::new(Self {
            script: Vec::new(),
            preload: Vec::new(),
            fail_subscribe: Some(reason.to_string()),
            next_id: AtomicU64::new(1),
            subscribes: AtomicUsize::new(0),
            unsubscribes: AtomicUsize::new(0),
        })
    }

    /// A feed that queues `messages` into the sink inside `subscribe`,
    /// before the caller starts waiting, and then never completes.
    pub fn preloaded(messages: Vec<TopicMessage>) -> Arc<Self> {
        Arc::new(Self {
            script: Vec::new(),
            preload: messages,
            fail_subscribe: None,
            next_id: AtomicU64::new(1),
            subscribes: AtomicUsize::new(0),
            unsubscribes: AtomicUsize::new(0),
        })
    }

    pub fn subscribe_calls(&self) -> usize {
        self.subscribes.load(Ordering::SeqCst)
    }

    pub fn unsubscribe_calls(&self) -> usize {
        self.unsubscribes.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl FeedSource for ScriptedFeed {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn subscribe(
        &self,
        _topic: &TopicId,
        _start_time: DateTime<Utc>,
        sink: mpsc::Sender<FeedEvent>,
    ) -> Result<SubscriptionHandle, FeedError> {
        self.subscribes.fetch_add(1, Ordering::SeqCst);

        if let Some(reason) = &self.fail_subscribe {
            return Err(FeedError::Rejected(reason.clone()));
        }

        for msg in &self.preload {
            sink.try_send(FeedEvent::Message(msg.clone()))
                .map_err(|e| FeedError::Rejected(format!("preload failed: {e}")))?;
        }

        let script = self.script.clone();
        let task = tokio::spawn(async move {
            for step in script {
                let event = match step {
                    Step::Delay(d) => {
                        tokio::time::sleep(d).await;
                        continue;
                    }
                    Step::Message(msg) => FeedEvent::Message(msg),
                    Step::Error(reason) => FeedEvent::Error(FeedError::Rejected(reason)),
                    Step::Complete => FeedEvent::Complete,
                };
                let terminal = !matches!(event, FeedEvent::Message(_));
                if sink.send(event).await.is_err() || terminal {
                    return;
                }
            }
            std::future::pending::<()>().await;
        });

        Ok(SubscriptionHandle::new(
            self.next_id.fetch_add(1, Ordering::SeqCst),
            task,
        ))
    }

    async fn unsubscribe(&self, handle: SubscriptionHandle) {
        self.unsubscribes.fetch_add(1, Ordering::SeqCst);
        handle.cancel().await;
    }
}

pub fn topic() -> TopicId {
    "0.0.5882994".parse().unwrap()
}

/// Consensus timestamp used for sequence number `seq`.
pub fn ts(seq: u64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000 + seq as i64, 0).unwrap()
}

pub fn msg(payload: &str, seq: u64) -> Step {
    raw_msg(payload.as_bytes(), seq)
}

pub fn raw_msg(payload: &[u8], seq: u64) -> Step {
    Step::Message(topic_message(payload, seq))
}

pub fn topic_message(payload: &[u8], seq: u64) -> TopicMessage {
    TopicMessage {
        contents: payload.to_vec(),
        sequence_number: seq,
        consensus_timestamp: ts(seq),
    }
}

/// A complete character card payload.
pub fn character(uuid: &str, name: &str) -> String {
    json!({
        "uuid": uuid,
        "name": name,
        "description": "d",
        "personality": "p",
        "scenario": "s",
        "first_mes": "f",
        "mes_example": "m",
        "creator_notes": "c",
        "system_prompt": "sp"
    })
    .to_string()
}

/// A running server bound to an ephemeral port.
pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
}

impl TestApp {
    pub async fn spawn(feed: Arc<dyn FeedSource>, collect_timeout: Duration) -> TestApp {
        setup();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = format!("http://{}", listener.local_addr().unwrap());

        let state = AppState {
            feed,
            topic_id: topic(),
            collect_timeout,
        };
        tokio::spawn(server::serve(listener, state));

        TestApp {
            address,
            client: reqwest::Client::new(),
        }
    }
}

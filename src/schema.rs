use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A ledger entity id in `shard.realm.num` form (e.g. `0.0.5882994`).
///
/// Used for topic ids and for the operator account id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityId {
    pub shard: u64,
    pub realm: u64,
    pub num: u64,
}

/// Topics and accounts share the same id format.
pub type TopicId = EntityId;

impl FromStr for EntityId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split('.');

        let mut next = |label: &str| -> anyhow::Result<u64> {
            parts
                .next()
                .filter(|p| !p.is_empty())
                .ok_or_else(|| anyhow::anyhow!("entity id '{}' is missing its {}", s, label))?
                .parse::<u64>()
                .map_err(|e| anyhow::anyhow!("entity id '{}' has an invalid {}: {}", s, label, e))
        };

        let shard = next("shard")?;
        let realm = next("realm")?;
        let num = next("num")?;

        if parts.next().is_some() {
            anyhow::bail!("entity id '{}' must have exactly three parts", s);
        }

        Ok(Self { shard, realm, num })
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.shard, self.realm, self.num)
    }
}

// ------------------------------------------------------------
// Topic message
// ------------------------------------------------------------
//
// One (fully reassembled) message delivered by a feed source.
//
// The sequence number and consensus timestamp are assigned by
// the ledger, never by this service.
//
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicMessage {
    /// Raw payload bytes (already base64-decoded)
    pub contents: Vec<u8>,

    /// Per-topic, monotonically increasing message index
    pub sequence_number: u64,

    /// Instant at which the message order was finalized
    pub consensus_timestamp: DateTime<Utc>,
}

/// A validated character card: the payload's top-level JSON object
/// plus the `sequenceNumber` / `timestamp` enrichment fields.
///
/// `serde_json` is built with `preserve_order`, so the payload's own
/// key order survives into the response.
pub type CharacterRecord = Map<String, Value>;

// ------------------------------------------------------------
// HTTP response bodies
// ------------------------------------------------------------

/// 200 body of `GET /get-complete-characters`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharactersResponse {
    pub topic_id: String,
    pub complete_character_count: usize,
    pub characters: Vec<CharacterRecord>,
}

/// 500 body returned when a collection attempt fails.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub details: String,
}

//! Reassembly of chunked topic messages.
//!
//! Payloads larger than a single consensus transaction are split by the
//! submitter into `total` chunks that share one initial transaction id.
//! The mirror node returns each chunk as its own message; the assembler
//! buffers them until every chunk has arrived and then emits one
//! `TopicMessage` with the concatenated contents.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use log::warn;

use crate::metrics::{incr, METRICS};
use crate::schema::TopicMessage;

/// One message (or one chunk of a message) as delivered by the feed.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub contents: Vec<u8>,
    pub sequence_number: u64,
    pub consensus_timestamp: DateTime<Utc>,

    /// `None` for unchunked messages
    pub group: Option<ChunkGroup>,
}

/// Position of a chunk inside its group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkGroup {
    /// Stable key derived from the initial transaction id
    pub key: String,

    /// 1-based chunk number
    pub number: u32,

    pub total: u32,
}

#[derive(Debug, Default)]
struct PendingGroup {
    total: u32,
    parts: BTreeMap<u32, Vec<u8>>,
}

/// Buffers partial chunk groups for one subscription.
///
/// Groups that never complete simply stay buffered until the
/// subscription ends.
#[derive(Debug, Default)]
pub struct ChunkAssembler {
    pending: HashMap<String, PendingGroup>,
}

impl ChunkAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one chunk; returns a message once its group is complete.
    ///
    /// The emitted message carries the sequence number and consensus
    /// timestamp of the chunk that completed the group. A repeated chunk
    /// number replaces the earlier copy. Chunks numbered outside
    /// `1..=total`, or whose `total` disagrees with the first chunk seen
    /// for the group, are dropped.
    pub fn push(&mut self, chunk: Chunk) -> Option<TopicMessage> {
        let group = match chunk.group {
            Some(g) if g.total > 1 => g,
            _ => {
                return Some(TopicMessage {
                    contents: chunk.contents,
                    sequence_number: chunk.sequence_number,
                    consensus_timestamp: chunk.consensus_timestamp,
                });
            }
        };

        if group.number == 0 || group.number > group.total {
            warn!(
                "[chunks] seq {} has chunk number {} outside 1..={} for group {}, dropping",
                chunk.sequence_number, group.number, group.total, group.key
            );
            incr(&METRICS.message_faults);
            return None;
        }

        let entry = self
            .pending
            .entry(group.key.clone())
            .or_insert_with(|| PendingGroup {
                total: group.total,
                parts: BTreeMap::new(),
            });

        if entry.total != group.total {
            warn!(
                "[chunks] seq {} claims {} chunks but group {} expects {}, dropping",
                chunk.sequence_number, group.total, group.key, entry.total
            );
            incr(&METRICS.message_faults);
            return None;
        }

        entry.parts.insert(group.number, chunk.contents);

        if entry.parts.len() < entry.total as usize {
            return None;
        }

        let done = self.pending.remove(&group.key)?;
        let contents = done.parts.into_values().flatten().collect();

        Some(TopicMessage {
            contents,
            sequence_number: chunk.sequence_number,
            consensus_timestamp: chunk.consensus_timestamp,
        })
    }

    /// Number of groups still waiting for chunks.
    pub fn pending_groups(&self) -> usize {
        self.pending.len()
    }
}

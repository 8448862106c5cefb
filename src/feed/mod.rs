//! Feed source layer
//!
//! This module provides:
//! - The `FeedSource` trait the collector subscribes through
//! - The Hedera mirror-node implementation (`MirrorFeed`)
//! - Reassembly of chunked topic messages
//! - A factory resolving the configured feed source
//!
//! The rest of the application interacts exclusively through the
//! `FeedSource` trait.

pub mod chunks;
pub mod mirror;
pub mod source;

use std::sync::Arc;

pub use source::{FeedError, FeedEvent, FeedSource, SubscriptionHandle};

use crate::config::MirrorConfig;

/// Returns the public mirror node REST endpoint for a Hedera network.
///
/// CONTRACT:
/// - `network` is matched case-insensitively
/// - Unknown networks return `None`; callers must then supply an
///   explicit `MIRROR_NODE_URL`
pub fn mirror_url_for_network(network: &str) -> Option<&'static str> {
    match network.to_ascii_lowercase().as_str() {
        "mainnet" => Some("https://mainnet-public.mirrornode.hedera.com"),
        "testnet" => Some("https://testnet.mirrornode.hedera.com"),
        "previewnet" => Some("https://previewnet.mirrornode.hedera.com"),
        _ => None,
    }
}

/// Builds the single, process-wide feed source.
///
/// Called once at startup; the returned `Arc` is cloned into every
/// request's state.
pub fn build_feed(cfg: &MirrorConfig) -> anyhow::Result<Arc<dyn FeedSource>> {
    Ok(Arc::new(mirror::MirrorFeed::new(cfg)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_networks_resolve() {
        assert_eq!(
            mirror_url_for_network("testnet"),
            Some("https://testnet.mirrornode.hedera.com")
        );
        assert!(mirror_url_for_network("MAINNET").is_some());
        assert!(mirror_url_for_network("previewnet").is_some());
        assert!(mirror_url_for_network("localnet").is_none());
    }
}

use std::fmt;
use std::time::Duration;

use anyhow::Context;

use crate::feed::mirror_url_for_network;
use crate::schema::{EntityId, TopicId};

/// Topic holding the published character cards.
pub const DEFAULT_TOPIC_ID: &str = "0.0.5882994";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_COLLECT_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_NETWORK: &str = "testnet";

/// Mirror node REST caps `limit` at 100.
pub const MAX_PAGE_LIMIT: u32 = 100;

// ------------------------------------------------------------
// Root configuration
// ------------------------------------------------------------
//
// Loaded from environment variables (optionally seeded from a
// `.env` file by `main`).
//
// It defines:
// - HTTP listen port
// - Operator credentials for the ledger network
// - Mirror node connection settings
// - The topic to collect from and the collection window
//
#[derive(Debug, Clone)]
pub struct Config {
    /// `PORT`
    pub port: u16,

    /// `HEDERA_ACCOUNT_ID` / `HEDERA_PRIVATE_KEY`
    pub operator: OperatorConfig,

    pub mirror: MirrorConfig,

    pub collector: CollectorConfig,

    /// `METRICS_INTERVAL_SECS`, 0 disables the periodic reporter
    pub metrics_interval_secs: u64,
}

// ------------------------------------------------------------
// Operator credentials
// ------------------------------------------------------------
//
// Identity the service runs as on the ledger network.
//
// Notes:
// - Both values are required; startup fails without them.
// - The private key is security-sensitive and never logged
//   (see the manual Debug impl).
//
#[derive(Clone)]
pub struct OperatorConfig {
    pub account_id: EntityId,
    pub private_key: String,
}

impl fmt::Debug for OperatorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorConfig")
            .field("account_id", &self.account_id)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Mirror node connection settings.
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    /// `HEDERA_NETWORK` (testnet / mainnet / previewnet)
    pub network: String,

    /// `MIRROR_NODE_URL`, or the public endpoint of `network`
    pub base_url: String,

    /// `MIRROR_PAGE_LIMIT`, messages per history page
    pub page_limit: u32,

    /// Per-request HTTP timeout towards the mirror node
    pub request_timeout_ms: u64,
}

/// Settings for one collection run.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// `CHARACTER_TOPIC_ID`
    pub topic_id: TopicId,

    /// `COLLECT_TIMEOUT_MS`
    pub timeout: Duration,
}

impl Config {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = match get("PORT") {
            Some(v) => v.parse().with_context(|| format!("PORT '{}' is not a valid port", v))?,
            None => DEFAULT_PORT,
        };

        let account_id = get("HEDERA_ACCOUNT_ID")
            .context("HEDERA_ACCOUNT_ID must be set")?
            .parse::<EntityId>()
            .context("HEDERA_ACCOUNT_ID is invalid")?;

        let private_key = get("HEDERA_PRIVATE_KEY").context("HEDERA_PRIVATE_KEY must be set")?;
        validate_private_key(&private_key)?;

        let network = get("HEDERA_NETWORK").unwrap_or_else(|| DEFAULT_NETWORK.to_string());
        let base_url = match get("MIRROR_NODE_URL") {
            Some(url) => url,
            None => mirror_url_for_network(&network)
                .with_context(|| {
                    format!("unknown HEDERA_NETWORK '{}' (set MIRROR_NODE_URL explicitly)", network)
                })?
                .to_string(),
        };

        let page_limit = match get("MIRROR_PAGE_LIMIT") {
            Some(v) => v
                .parse::<u32>()
                .with_context(|| format!("MIRROR_PAGE_LIMIT '{}' is not a number", v))?,
            None => MAX_PAGE_LIMIT,
        };
        if page_limit == 0 || page_limit > MAX_PAGE_LIMIT {
            anyhow::bail!("MIRROR_PAGE_LIMIT must be between 1 and {}", MAX_PAGE_LIMIT);
        }

        let topic_id = get("CHARACTER_TOPIC_ID")
            .unwrap_or_else(|| DEFAULT_TOPIC_ID.to_string())
            .parse::<TopicId>()
            .context("CHARACTER_TOPIC_ID is invalid")?;

        let timeout_ms = match get("COLLECT_TIMEOUT_MS") {
            Some(v) => v
                .parse::<u64>()
                .with_context(|| format!("COLLECT_TIMEOUT_MS '{}' is not a number", v))?,
            None => DEFAULT_COLLECT_TIMEOUT_MS,
        };

        let metrics_interval_secs = match get("METRICS_INTERVAL_SECS") {
            Some(v) => v
                .parse::<u64>()
                .with_context(|| format!("METRICS_INTERVAL_SECS '{}' is not a number", v))?,
            None => 60,
        };

        Ok(Self {
            port,
            operator: OperatorConfig {
                account_id,
                private_key,
            },
            mirror: MirrorConfig {
                network,
                base_url,
                page_limit,
                request_timeout_ms: timeout_ms.max(1_000).saturating_mul(2),
            },
            collector: CollectorConfig {
                topic_id,
                timeout: Duration::from_millis(timeout_ms),
            },
            metrics_interval_secs,
        })
    }
}

/// Operator keys are hex encoded (raw or DER), optionally `0x`-prefixed.
fn validate_private_key(key: &str) -> anyhow::Result<()> {
    let hex = key.strip_prefix("0x").unwrap_or(key);
    if hex.is_empty() || hex.len() % 2 != 0 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        anyhow::bail!("HEDERA_PRIVATE_KEY must be a hex encoded key");
    }
    Ok(())
}

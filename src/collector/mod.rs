/// Collector module
///
/// This module groups the logic responsible for:
/// - Opening a bounded subscription on a topic
/// - Validating and enriching inbound messages
/// - Terminating the subscription on completion or timeout
///
/// The collector is the orchestration layer between:
/// - A feed source (mirror node, test doubles, …)
/// - The HTTP handler consuming the collected records
///
/// Design notes:
/// - Feed-specific logic MUST NOT live here
/// - Record validation lives in `crate::validator`
pub mod runner;

pub use runner::{collect_complete_characters, CollectError, Collection, StopReason};

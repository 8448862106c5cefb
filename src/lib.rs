// ------------------------------------------------------------
// Module declarations
// ------------------------------------------------------------
//
// Each module represents a well-defined responsibility:
//
// - config:    Configuration structs loaded from the environment
// - schema:    Topic ids, topic messages and HTTP bodies
// - util:      Consensus timestamp helpers
// - validator: Complete character card detection
// - feed:      Feed source trait + mirror node implementation
// - collector: Bounded subscribe / collect / unsubscribe runtime
// - server:    HTTP router and handlers
// - metrics:   Process-wide runtime counters
//
pub mod collector;
pub mod config;
pub mod feed;
pub mod metrics;
pub mod schema;
pub mod server;
pub mod util;
pub mod validator;

/// OpenAPI documentation generation.
pub mod documentation;
/// Host-side loop driving phase transitions.
pub mod host_driver;
/// Anonymous identity issuance.
pub mod identity;
/// Match lifecycle operations.
pub mod match_service;
/// Exactly-once round scoring.
pub mod scoring;
/// SSE bridging for the change feed.
pub mod sse_service;
/// Client-side snapshot synchronisation.
pub mod sync;

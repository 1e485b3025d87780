//! Health-check payloads.

use serde::Serialize;
use utoipa::ToSchema;

/// Response returned by the health endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Always "ok" while the process serves requests.
    pub status: &'static str,
}

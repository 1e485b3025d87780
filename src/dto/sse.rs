//! Payload wrapper for the per-match SSE change feed.

use serde::Serialize;
use utoipa::ToSchema;

use crate::dao::match_store::events::{ChangeEvent, ChangedRow};

/// Dispatched payload carried on the SSE stream.
#[derive(Clone, Debug)]
pub struct ServerEvent {
    /// SSE event name, when any.
    pub event: Option<String>,
    /// Serialised JSON data field.
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }

    /// Wrap a store change event, naming the SSE event after the table.
    pub fn change(event: &ChangeEvent) -> serde_json::Result<Self> {
        let name = match event.row {
            ChangedRow::Match(_) => "match",
            ChangedRow::Player(_) => "player",
            ChangedRow::Answer(_) => "answer",
        };
        Self::json(name.to_string(), event)
    }
}

/// Initial metadata sent to an SSE client when it connects. Receiving it
/// means the subscription is live; the client should now perform its bulk
/// fetch so no event landing in between is lost.
#[derive(Debug, Serialize, ToSchema)]
pub struct Handshake {
    /// Match id the stream is scoped to.
    pub match_id: String,
    /// Human-readable message confirming the subscription.
    pub message: String,
}

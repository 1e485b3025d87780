//! Boundary payloads exchanged over the RPC and SSE surfaces.

pub mod health;
pub mod match_dto;
pub mod quiz;
pub mod sse;
pub mod validation;

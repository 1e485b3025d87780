//! Head-to-head realtime quiz duels.
//!
//! Two players race through the same quiz: a lobby, a question reveal, a
//! timed answering window, an exactly-once scoring pass, and a round-end
//! review, repeated per question until the match finishes. All coordination
//! runs through a shared record store: conditional status updates arbitrate
//! racing writers, and a per-match change feed keeps every client's local
//! snapshot live.
//!
//! The library half holds the engine (store abstraction, lifecycle rules,
//! scoring, sync client, host driver); the binary wires it behind an axum
//! RPC and SSE surface.

pub mod config;
pub mod dao;
pub mod dto;
pub mod error;
pub mod extractors;
pub mod routes;
pub mod services;
pub mod state;

//! Persistence layer: row models, store abstraction, and backends.

pub mod match_store;
pub mod models;
pub mod storage;

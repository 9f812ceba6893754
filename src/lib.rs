//! # Raceday Ingest
//!
//! A race-data ingestion service for tote betting data. Polls an upstream
//! tote API for active races, normalizes each payload into domain entities
//! plus two append-only time-series streams (money flow, odds), and writes
//! the result to partitioned PostgreSQL.
//!
//! ## Architecture
//!
//! - **Upstream client**: fetches one race's raw payload per poll, with a
//!   status-aware query matrix and retry/backoff.
//! - **Transform**: decodes the raw payload into normalized entities and
//!   time-series records on a bounded CPU worker pool.
//! - **Caches**: process-local odds-change and money-flow-delta detectors
//!   that suppress duplicate/unchanged observations before they're written.
//! - **Bulk writer**: one transaction per poll, upserting mutable entities
//!   and appending time-series rows grouped by destination partition.
//! - **Scheduler**: owns the active-race set and drives one polling task per
//!   race at an interval that tightens as race start approaches.
//! - **HTTP**: a small read-side API for meetings/races, with hand-written
//!   response compression.

/// Unified error taxonomy for the ingestion pipeline.
pub mod errors;
/// Normalized domain entities and time-series records.
pub mod types;

/// Upstream tote API client.
pub mod upstream_client;
/// Transform worker pool: raw payload -> normalized entities.
pub mod transform;
/// Pure money-flow calculator functions.
pub mod money_flow;
/// Process-local odds-change and money-flow-delta caches.
pub mod cache;
/// PostgreSQL schema, upserts and read queries.
pub mod database;
/// Daily partition management for the two time-series tables.
pub mod partitions;
/// Transactional multi-row batch writer.
pub mod bulk_writer;
/// Per-race fetch-transform-filter-write pipeline.
pub mod race_processor;
/// Active-race set management and per-race polling cadence.
pub mod scheduler;

/// Read-side HTTP surface.
pub mod http;

/// Metrics and observability.
pub mod metrics;
/// Configuration management.
pub mod settings;

pub use errors::{IngestError, IngestResult};
pub use scheduler::Scheduler;
pub use settings::Settings;

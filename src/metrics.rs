// src/metrics.rs

#[cfg(feature = "observability")]
pub use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram,
    increment_counter, Unit,
};

// When observability is disabled, provide no-op stand-ins so call sites never
// need a `#[cfg]` of their own.
#[cfg(not(feature = "observability"))]
pub enum Unit {}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! counter {
    ($name:expr, $value:expr $(, $label:expr => $label_value:expr)* $(,)?) => {};
    ($name:expr $(, $label:expr => $label_value:expr)* $(,)?) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! gauge {
    ($name:expr, $value:expr $(, $label:expr => $label_value:expr)* $(,)?) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! histogram {
    ($name:expr, $value:expr $(, $label:expr => $label_value:expr)* $(,)?) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! increment_counter {
    ($name:expr $(, $label:expr => $label_value:expr)* $(,)?) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! describe_counter {
    ($name:expr, $unit:expr, $desc:expr) => {};
    ($name:expr, $desc:expr) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! describe_gauge {
    ($name:expr, $desc:expr) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! describe_histogram {
    ($name:expr, $unit:expr, $desc:expr) => {};
    ($name:expr, $desc:expr) => {};
}

#[cfg(not(feature = "observability"))]
use crate::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram,
    increment_counter,
};

/// Registers descriptions for every metric the service emits. Called once at
/// startup, after the `tracing` subscriber is installed.
pub fn describe_metrics() {
    describe_gauge!("ingest_up", "Process liveness (1=up).");

    describe_gauge!(
        "scheduler_active_races",
        "Number of races currently tracked by the scheduler."
    );
    describe_counter!(
        "scheduler_race_scheduled_total",
        Unit::Count,
        "Races newly enrolled into the active set."
    );
    describe_counter!(
        "scheduler_race_retired_total",
        Unit::Count,
        "Races retired after reaching a terminal status."
    );
    describe_counter!(
        "scheduler_race_skip_total",
        Unit::Count,
        "Poll ticks skipped because the previous poll for that race was still in flight."
    );

    describe_histogram!(
        "race_poll_fetch_ms",
        "Upstream fetch duration per race poll, in milliseconds."
    );
    describe_histogram!(
        "race_poll_transform_ms",
        "Transform duration per race poll, in milliseconds."
    );
    describe_histogram!(
        "race_poll_total_ms",
        "Total processRace duration, in milliseconds."
    );
    describe_counter!(
        "race_poll_errors_total",
        Unit::Count,
        "processRace failures, labeled by error classification."
    );

    describe_histogram!(
        "bulk_writer_insert_ms",
        "Duration of a single bulk-writer INSERT, in milliseconds."
    );
    describe_counter!(
        "bulk_writer_rows_total",
        Unit::Count,
        "Rows written by the bulk writer, labeled by table."
    );
    describe_counter!(
        "bulk_writer_over_budget_total",
        Unit::Count,
        "INSERTs that exceeded the 300ms budget."
    );

    describe_counter!(
        "cache_hits_total",
        Unit::Count,
        "Cache hits, labeled by cache."
    );
    describe_counter!(
        "cache_miss_total",
        Unit::Count,
        "Cache misses, labeled by cache."
    );
    describe_gauge!("cache_size_gauge", "Current cache size, labeled by cache.");

    describe_counter!(
        "partitions_created_total",
        Unit::Count,
        "Daily partitions created, labeled by base table."
    );

    describe_counter!(
        "http_responses_compressed_total",
        Unit::Count,
        "Read-side responses compressed, labeled by encoding."
    );
}

pub fn increment_cache_hit(cache_name: &str) {
    counter!("cache_hits_total", 1, "cache" => cache_name.to_string());
}

pub fn increment_cache_miss(cache_name: &str) {
    counter!("cache_miss_total", 1, "cache" => cache_name.to_string());
}

pub fn set_cache_size(cache_name: &str, size: f64) {
    gauge!("cache_size_gauge", size, "cache" => cache_name.to_string());
}

pub fn set_active_races(count: f64) {
    gauge!("scheduler_active_races", count);
}

pub fn increment_race_scheduled() {
    counter!("scheduler_race_scheduled_total", 1);
}

pub fn increment_race_retired() {
    counter!("scheduler_race_retired_total", 1);
}

pub fn increment_race_skip() {
    counter!("scheduler_race_skip_total", 1);
}

pub fn record_fetch_ms(ms: f64) {
    histogram!("race_poll_fetch_ms", ms);
}

pub fn record_transform_ms(ms: f64) {
    histogram!("race_poll_transform_ms", ms);
}

pub fn record_poll_total_ms(ms: f64) {
    histogram!("race_poll_total_ms", ms);
}

pub fn increment_poll_error(classification: &str) {
    counter!("race_poll_errors_total", 1, "classification" => classification.to_string());
}

pub fn record_insert_ms(ms: f64) {
    histogram!("bulk_writer_insert_ms", ms);
}

pub fn increment_rows_written(table: &str, rows: u64) {
    counter!("bulk_writer_rows_total", rows, "table" => table.to_string());
}

pub fn increment_over_budget() {
    counter!("bulk_writer_over_budget_total", 1);
}

pub fn increment_partition_created(base: &str) {
    counter!("partitions_created_total", 1, "base" => base.to_string());
}

pub fn increment_compressed_response(encoding: &str) {
    counter!("http_responses_compressed_total", 1, "encoding" => encoding.to_string());
}

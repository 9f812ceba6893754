//! Race processor (§4.G): the unit of work the scheduler drives per race per
//! poll. Composes the upstream client, the transform pool, the odds-change
//! detector and the bulk writer, and classifies the outcome for the
//! scheduler's retry/backoff decision.

use std::time::Instant;

use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::bulk_writer;
use crate::cache::{MoneyFlowCache, OddsCache};
use crate::database::DbPool;
use crate::errors::{IngestError, IngestResult};
use crate::metrics;
use crate::money_flow;
use crate::transform::TransformWorkerPool;
use crate::types::RaceStatus;
use crate::upstream_client::{RaceStatusHint, UpstreamClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Written,
    Skipped,
}

#[derive(Debug, Clone)]
pub struct ProcessResult {
    pub outcome: ProcessOutcome,
    pub row_count: u64,
    pub fetch_ms: u128,
    pub transform_ms: u128,
    pub write_ms: u128,
    pub status: RaceStatus,
}

fn status_hint(status: RaceStatus) -> RaceStatusHint {
    match status {
        RaceStatus::Open => RaceStatusHint::Open,
        RaceStatus::Interim => RaceStatusHint::Interim,
        RaceStatus::Closed => RaceStatusHint::Closed,
        RaceStatus::Final => RaceStatusHint::Final,
        RaceStatus::Abandoned => RaceStatusHint::Abandoned,
        RaceStatus::Postponed => RaceStatusHint::Unknown,
    }
}

/// `processRace(raceId)`: one fetch-transform-filter-write cycle. Never
/// swallows an error — a failure propagates to the scheduler with enough
/// classification (`IngestError::is_retriable`) to decide the next action.
#[instrument(skip(upstream, transform_pool, odds_cache, money_flow_cache, db_pool), fields(race_id = %race_id))]
pub async fn process_race(
    race_id: &str,
    last_known_status: RaceStatus,
    upstream: &UpstreamClient,
    transform_pool: &TransformWorkerPool,
    odds_cache: &OddsCache,
    money_flow_cache: &MoneyFlowCache,
    db_pool: &DbPool,
) -> IngestResult<ProcessResult> {
    let poll_started = Instant::now();
    let fetch_started = Instant::now();
    let raw = match upstream.fetch_race_data(race_id, status_hint(last_known_status)).await {
        Ok(raw) => raw,
        Err(e) => {
            metrics::increment_poll_error(classification(&e));
            return Err(e);
        }
    };
    let fetch_ms = fetch_started.elapsed().as_millis();
    metrics::record_fetch_ms(fetch_ms as f64);

    let transform_started = Instant::now();
    let now = Utc::now();
    let mut transformed = match transform_pool.transform(raw, now).await {
        Ok(t) => t,
        Err(e) => {
            metrics::increment_poll_error(classification(&e));
            return Err(e);
        }
    };
    apply_incremental_baseline(&mut transformed.money_flow_records, money_flow_cache);
    let transform_ms = transform_started.elapsed().as_millis();
    metrics::record_transform_ms(transform_ms as f64);

    let filtered_odds: Vec<_> = transformed
        .odds_candidates
        .iter()
        .filter(|candidate| odds_cache.accept(&candidate.entrant_id, candidate.odds_type, candidate.odds))
        .cloned()
        .collect();

    if filtered_odds.is_empty() && transformed.money_flow_records.is_empty() {
        info!(race_id, "no new observations, skipping write");
        metrics::record_poll_total_ms(poll_started.elapsed().as_millis() as f64);
        return Ok(ProcessResult {
            outcome: ProcessOutcome::Skipped,
            row_count: 0,
            fetch_ms,
            transform_ms,
            write_ms: 0,
            status: transformed.race.status,
        });
    }

    let write_started = Instant::now();
    let report = match bulk_writer::write_race_update(db_pool, &transformed, &filtered_odds).await {
        Ok(r) => r,
        Err(e) => {
            metrics::increment_poll_error(classification(&e));
            return Err(e);
        }
    };
    let write_ms = write_started.elapsed().as_millis();

    info!(
        race_id,
        fetch_ms,
        transform_ms,
        write_ms,
        row_count = report.row_count,
        status = transformed.race.status.as_str(),
        "race poll complete"
    );
    metrics::record_poll_total_ms(poll_started.elapsed().as_millis() as f64);

    Ok(ProcessResult {
        outcome: ProcessOutcome::Written,
        row_count: report.row_count,
        fetch_ms,
        transform_ms,
        write_ms,
        status: transformed.race.status,
    })
}

fn classification(err: &IngestError) -> &'static str {
    match err {
        IngestError::TransientUpstream(_) => "transient_upstream",
        IngestError::PermanentUpstream { .. } => "permanent_upstream",
        IngestError::PartitionMissing(_) => "partition_missing",
        IngestError::DbTransient(_) => "db_transient",
        IngestError::Logic(_) => "logic",
        IngestError::Cancelled => "cancelled",
    }
}

/// `transform` always computes `incremental_delta` against a `None`
/// baseline, since it has no access to process state. The real baseline —
/// the previous poll's pool amounts for the same entrant — lives in the
/// per-process `MoneyFlowCache`; this recomputes the incremental fields
/// against it before the record is written.
fn apply_incremental_baseline(
    records: &mut [crate::types::MoneyFlowObservation],
    money_flow_cache: &MoneyFlowCache,
) {
    for record in records.iter_mut() {
        let previous = money_flow_cache.take_previous_and_store(
            &record.entrant_id,
            record.win_pool_amount,
            record.place_pool_amount,
        );
        let delta = money_flow::incremental_delta(record.win_pool_amount, record.place_pool_amount, previous);
        record.incremental_win_amount = delta.inc_win;
        record.incremental_place_amount = delta.inc_place;
    }
}

/// Logs a poll failure with its retriability, matching §7's classification
/// table (upstream callers decide whether to schedule a retry).
pub fn log_failure(race_id: &str, err: &IngestError) {
    if err.is_retriable() {
        warn!(race_id, error = %err, "race poll failed, retriable");
    } else {
        warn!(race_id, error = %err, "race poll failed, non-retriable");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_hint_maps_postponed_to_unknown() {
        assert_eq!(status_hint(RaceStatus::Postponed), RaceStatusHint::Unknown);
    }

    #[test]
    fn status_hint_maps_open_to_open() {
        assert_eq!(status_hint(RaceStatus::Open), RaceStatusHint::Open);
    }
}

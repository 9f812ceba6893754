//! Bulk writer (§4.F): one transaction per race poll. Time-series rows are
//! appended with no ON-CONFLICT clause; mutable entities are upserted.
//!
//! Records are grouped by destination partition before a single multi-row
//! INSERT is issued per group; the partition is validated/created inside the
//! same transaction (§4.E), with one retry on `PartitionMissing` per group
//! (§7).

use std::collections::BTreeMap;
use std::time::Instant;

use sqlx::{Acquire, Postgres, QueryBuilder, Transaction};
use tracing::warn;

use crate::database::{self, DbPool};
use crate::errors::{IngestError, IngestResult};
use crate::metrics;
use crate::partitions;
use crate::types::{MoneyFlowObservation, OddsObservation, TransformedRace};

const INSERT_BUDGET_MS: u128 = 300;

pub struct WriteReport {
    pub row_count: u64,
    pub duration_ms: u128,
}

/// Writes everything produced by one `processRace` invocation inside a single
/// transaction: upserts for mutable entities, appends for the two time-series
/// streams. No partial writes — either the whole transaction commits or it
/// rolls back (§7).
pub async fn write_race_update(
    pool: &DbPool,
    transformed: &TransformedRace,
    filtered_odds: &[OddsObservation],
) -> IngestResult<WriteReport> {
    let started = Instant::now();
    let mut conn = pool.acquire().await?;
    let mut tx = conn.begin().await?;

    let mut row_count = 0u64;
    row_count += database::upsert_meeting(&mut tx, &transformed.meeting).await?;
    row_count += database::upsert_race(&mut tx, &transformed.race).await?;
    row_count += database::upsert_entrants(&mut tx, &transformed.entrants).await?;
    row_count += database::upsert_race_pools(&mut tx, &transformed.race_pools).await?;
    let (money_flow_rows, mut partitions_written) =
        append_money_flow(&mut tx, &transformed.money_flow_records).await?;
    let (odds_rows, odds_partitions) = append_odds(&mut tx, filtered_odds).await?;
    partitions_written.extend(odds_partitions);
    row_count += money_flow_rows + odds_rows;

    tx.commit().await?;

    let duration_ms = started.elapsed().as_millis();
    log_insert("race_update", &join_partitions(&partitions_written), row_count, duration_ms);
    Ok(WriteReport { row_count, duration_ms })
}

fn join_partitions(partitions: &[String]) -> String {
    if partitions.is_empty() {
        "none".to_string()
    } else {
        partitions.join(",")
    }
}

/// `money_flow_history` append, grouped by venue-local partition (§4.F).
/// Returns the row count plus the list of partitions written to.
pub async fn append_money_flow(
    tx: &mut Transaction<'_, Postgres>,
    records: &[MoneyFlowObservation],
) -> IngestResult<(u64, Vec<String>)> {
    if records.is_empty() {
        return Ok((0, Vec::new()));
    }
    let mut groups: BTreeMap<String, Vec<&MoneyFlowObservation>> = BTreeMap::new();
    for record in records {
        let event_ts = record.event_timestamp.to_rfc3339();
        let partition = partitions::partition_name_from_event_timestamp("money_flow_history", &event_ts)?;
        groups.entry(partition).or_default().push(record);
    }

    let mut total = 0u64;
    let mut written = Vec::with_capacity(groups.len());
    for (partition, group) in groups {
        total += insert_money_flow_group(tx, &partition, &group).await?;
        written.push(partition);
    }
    Ok((total, written))
}

async fn insert_money_flow_group(
    tx: &mut Transaction<'_, Postgres>,
    partition: &str,
    group: &[&MoneyFlowObservation],
) -> IngestResult<u64> {
    match try_insert_money_flow_group(tx, partition, group).await {
        Ok(n) => Ok(n),
        Err(IngestError::PartitionMissing(_)) => {
            let event_ts = group[0].event_timestamp.to_rfc3339();
            partitions::validate_partition_before_write(tx, "money_flow_history", &event_ts).await?;
            try_insert_money_flow_group(tx, partition, group).await
        }
        Err(e) => {
            warn!(partition, error = %e, "money_flow insert failed");
            Err(e)
        }
    }
}

async fn try_insert_money_flow_group(
    tx: &mut Transaction<'_, Postgres>,
    partition: &str,
    group: &[&MoneyFlowObservation],
) -> IngestResult<u64> {
    let started = Instant::now();
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
        "INSERT INTO raceday.money_flow_history (entrant_id, race_id, polling_timestamp, \
         event_timestamp, time_to_start, time_interval, interval_type, hold_percentage, \
         bet_percentage, win_pool_percentage, place_pool_percentage, win_pool_amount, \
         place_pool_amount, incremental_win_amount, incremental_place_amount, fixed_win_odds, \
         fixed_place_odds, pool_win_odds, pool_place_odds) ",
    );
    builder.push_values(group, |mut b, record| {
        b.push_bind(&record.entrant_id)
            .push_bind(&record.race_id)
            .push_bind(record.polling_timestamp)
            .push_bind(record.event_timestamp)
            .push_bind(record.time_to_start)
            .push_bind(record.time_interval)
            .push_bind(record.interval_type.as_str())
            .push_bind(record.hold_percentage)
            .push_bind(record.bet_percentage)
            .push_bind(record.win_pool_percentage)
            .push_bind(record.place_pool_percentage)
            .push_bind(record.win_pool_amount)
            .push_bind(record.place_pool_amount)
            .push_bind(record.incremental_win_amount)
            .push_bind(record.incremental_place_amount)
            .push_bind(record.fixed_win_odds)
            .push_bind(record.fixed_place_odds)
            .push_bind(record.pool_win_odds)
            .push_bind(record.pool_place_odds);
    });

    let result = builder
        .build()
        .execute(tx.as_mut())
        .await
        .map_err(classify_insert_error)?;

    log_insert("money_flow_history", partition, result.rows_affected(), started.elapsed().as_millis());
    Ok(result.rows_affected())
}

/// `odds_history` append. Never carries an ON-CONFLICT clause (property 9).
/// Returns the row count plus the list of partitions written to.
pub async fn append_odds(
    tx: &mut Transaction<'_, Postgres>,
    records: &[OddsObservation],
) -> IngestResult<(u64, Vec<String>)> {
    if records.is_empty() {
        return Ok((0, Vec::new()));
    }
    let mut groups: BTreeMap<String, Vec<&OddsObservation>> = BTreeMap::new();
    for record in records {
        let event_ts = record.event_timestamp.to_rfc3339();
        let partition = partitions::partition_name_from_event_timestamp("odds_history", &event_ts)?;
        groups.entry(partition).or_default().push(record);
    }

    let mut total = 0u64;
    let mut written = Vec::with_capacity(groups.len());
    for (partition, group) in groups {
        total += insert_odds_group(tx, &partition, &group).await?;
        written.push(partition);
    }
    Ok((total, written))
}

async fn insert_odds_group(
    tx: &mut Transaction<'_, Postgres>,
    partition: &str,
    group: &[&OddsObservation],
) -> IngestResult<u64> {
    match try_insert_odds_group(tx, partition, group).await {
        Ok(n) => Ok(n),
        Err(IngestError::PartitionMissing(_)) => {
            let event_ts = group[0].event_timestamp.to_rfc3339();
            partitions::validate_partition_before_write(tx, "odds_history", &event_ts).await?;
            try_insert_odds_group(tx, partition, group).await
        }
        Err(e) => Err(e),
    }
}

async fn try_insert_odds_group(
    tx: &mut Transaction<'_, Postgres>,
    partition: &str,
    group: &[&OddsObservation],
) -> IngestResult<u64> {
    let started = Instant::now();
    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO raceday.odds_history (entrant_id, event_timestamp, odds_type, odds) ");
    builder.push_values(group, |mut b, record| {
        b.push_bind(&record.entrant_id)
            .push_bind(record.event_timestamp)
            .push_bind(odds_type_str(record.odds_type))
            .push_bind(record.odds);
    });

    let result = builder
        .build()
        .execute(tx.as_mut())
        .await
        .map_err(classify_insert_error)?;

    log_insert("odds_history", partition, result.rows_affected(), started.elapsed().as_millis());
    Ok(result.rows_affected())
}

fn odds_type_str(t: crate::types::OddsType) -> &'static str {
    use crate::types::OddsType;
    match t {
        OddsType::FixedWin => "fixed_win",
        OddsType::FixedPlace => "fixed_place",
        OddsType::PoolWin => "pool_win",
        OddsType::PoolPlace => "pool_place",
    }
}

fn classify_insert_error(err: sqlx::Error) -> IngestError {
    if let sqlx::Error::Database(ref db_err) = err {
        // Postgres 23514 check_violation / 42P01 undefined_table signal a
        // missing partition for a parent without a matching range.
        if matches!(db_err.code().as_deref(), Some("23514") | Some("42P01")) {
            return IngestError::PartitionMissing(db_err.message().to_string());
        }
    }
    IngestError::from(err)
}

fn log_insert(table: &str, partitions: &str, row_count: u64, duration_ms: u128) {
    let over_budget = duration_ms >= INSERT_BUDGET_MS;
    tracing::info!(table, partitions, row_count, insert_ms = duration_ms as u64, over_budget, "bulk insert");
    metrics::record_insert_ms(duration_ms as f64);
    metrics::increment_rows_written(table, row_count);
    if over_budget {
        tracing::warn!(table, partitions, insert_ms = duration_ms as u64, "insert exceeded budget");
        metrics::increment_over_budget();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn odds_type_str_round_trips_known_variants() {
        use crate::types::OddsType;
        assert_eq!(odds_type_str(OddsType::FixedWin), "fixed_win");
        assert_eq!(odds_type_str(OddsType::PoolPlace), "pool_place");
    }

    #[test]
    fn join_partitions_reports_none_when_nothing_written() {
        assert_eq!(join_partitions(&[]), "none");
    }

    #[test]
    fn join_partitions_comma_separates_multiple_partitions() {
        let partitions = vec!["money_flow_history_2025_10_14".to_string(), "odds_history_2025_10_15".to_string()];
        assert_eq!(join_partitions(&partitions), "money_flow_history_2025_10_14,odds_history_2025_10_15");
    }
}

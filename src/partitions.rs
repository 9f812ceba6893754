//! Partition manager (§4.E): creates and tracks the daily child partitions
//! that back `money_flow_history` and `odds_history`.

use chrono::{Duration, NaiveDate, Utc};
use sqlx::{Postgres, Transaction};

use crate::database::SCHEMA;
use crate::errors::{IngestError, IngestResult};
use crate::metrics;

/// Partition name for `base` on `date`: `{base}_{YYYY}_{MM}_{DD}`.
pub fn partition_name(base: &str, date: NaiveDate) -> String {
    format!("{base}_{}", date.format("%Y_%m_%d"))
}

/// `{base}_{T[0:10].replace('-','_')}` from the raw event-timestamp string,
/// without any timezone conversion (property 6, invariant 5).
pub fn partition_name_from_event_timestamp(base: &str, event_timestamp: &str) -> IngestResult<String> {
    let date_part = event_timestamp
        .get(0..10)
        .ok_or_else(|| IngestError::Logic(format!("malformed event timestamp: {event_timestamp}")))?;
    Ok(format!("{base}_{}", date_part.replace('-', "_")))
}

async fn partition_exists(tx: &mut Transaction<'_, Postgres>, name: &str) -> IngestResult<bool> {
    let row: (bool,) = sqlx::query_as(&format!(
        "SELECT EXISTS (SELECT 1 FROM pg_tables WHERE schemaname = '{SCHEMA}' AND tablename = $1)"
    ))
    .bind(name)
    .fetch_one(tx.as_mut())
    .await?;
    Ok(row.0)
}

/// `ensurePartition(base, date)`: creates the child partition if a
/// catalog lookup shows it absent. Errors are surfaced, not retried here —
/// retry-once-on-partition-miss is the bulk writer's responsibility (§7).
pub async fn ensure_partition(
    tx: &mut Transaction<'_, Postgres>,
    base: &str,
    date: NaiveDate,
) -> IngestResult<String> {
    let name = partition_name(base, date);
    if partition_exists(tx, &name).await? {
        return Ok(name);
    }

    let next_day = date + Duration::days(1);
    let ddl = format!(
        "CREATE TABLE IF NOT EXISTS {SCHEMA}.{name} PARTITION OF {SCHEMA}.{base} \
         FOR VALUES FROM ('{date}') TO ('{next_day}')"
    );
    sqlx::query(&ddl).execute(tx.as_mut()).await?;
    metrics::increment_partition_created(base);
    Ok(name)
}

/// `ensureUpcomingPartitions(base)`: today and tomorrow, called at startup and
/// on day-rollover detection.
pub async fn ensure_upcoming_partitions(
    tx: &mut Transaction<'_, Postgres>,
    base: &str,
) -> IngestResult<()> {
    let today = Utc::now().date_naive();
    let tomorrow = today + Duration::days(1);
    ensure_partition(tx, base, today).await?;
    ensure_partition(tx, base, tomorrow).await?;
    Ok(())
}

/// `validatePartitionBeforeWrite(base, eventTimestamp)`: quick lookup,
/// create on miss. Used inline by the bulk writer before each grouped
/// INSERT (§4.F).
pub async fn validate_partition_before_write(
    tx: &mut Transaction<'_, Postgres>,
    base: &str,
    event_timestamp: &str,
) -> IngestResult<String> {
    let date_part = event_timestamp
        .get(0..10)
        .ok_or_else(|| IngestError::Logic(format!("malformed event timestamp: {event_timestamp}")))?;
    let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map_err(|e| IngestError::Logic(format!("invalid event timestamp date: {e}")))?;
    ensure_partition(tx, base, date).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_name_matches_format() {
        let date = NaiveDate::from_ymd_opt(2025, 10, 14).unwrap();
        assert_eq!(partition_name("money_flow_history", date), "money_flow_history_2025_10_14");
    }

    #[test]
    fn partition_name_from_event_timestamp_ignores_timezone() {
        let name =
            partition_name_from_event_timestamp("money_flow_history", "2025-10-14T23:59:00Z").unwrap();
        assert_eq!(name, "money_flow_history_2025_10_14");
    }

    #[test]
    fn malformed_timestamp_is_rejected() {
        assert!(partition_name_from_event_timestamp("odds_history", "bad").is_err());
    }
}

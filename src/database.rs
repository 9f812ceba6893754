use anyhow::Result;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{postgres::PgPoolOptions, Connection, Pool, Postgres, Row};
use std::env;
use std::time::Duration;

use crate::errors::{IngestError, IngestResult};
use crate::partitions;
use crate::types::{Entrant, Meeting, OddsType, Race, RacePools};

pub type DbPool = Pool<Postgres>;

/// Database schema name.
pub const SCHEMA: &str = "raceday";

pub async fn connect(database_url: &str, max_connections: u32, connect_retries: u32) -> Result<DbPool> {
    env::set_var("PGCLIENTENCODING", "UTF8");

    let mut last_err: Option<anyhow::Error> = None;
    for attempt in 1..=connect_retries {
        match PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
        {
            Ok(pool) => {
                tracing::info!(attempt, connect_retries, "connected to database");
                if let Err(e) = initialize_database(&pool).await {
                    last_err = Some(e);
                } else {
                    return Ok(pool);
                }
            }
            Err(e) => last_err = Some(e.into()),
        }
        let delay_ms = (1u64 << attempt.min(6)) * 200;
        tracing::warn!(attempt, connect_retries, delay_ms, "DB connect/init attempt failed, retrying");
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }
    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("unknown DB connection error")))
}

pub async fn initialize_database(pool: &DbPool) -> Result<()> {
    const MIGRATION_LOCK_ID: i64 = 0x5241434544415900; // "RACEDAY\0" in hex

    let mut conn = pool.acquire().await?;
    let mut tx = conn.begin().await?;

    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(MIGRATION_LOCK_ID)
        .execute(tx.as_mut())
        .await?;

    sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {SCHEMA}"))
        .execute(tx.as_mut())
        .await?;

    create_tables(&mut tx).await?;

    let today = Utc::now().date_naive();
    let tomorrow = today + chrono::Duration::days(1);
    for base in ["money_flow_history", "odds_history"] {
        for date in [today, tomorrow] {
            partitions::ensure_partition(&mut tx, base, date)
                .await
                .map_err(|e| anyhow::anyhow!(e.to_string()))?;
        }
    }

    tx.commit().await?;
    tracing::info!("database schema ready");
    Ok(())
}

async fn create_tables(tx: &mut sqlx::Transaction<'_, sqlx::Postgres>) -> Result<()> {
    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS {SCHEMA}.meetings (
            meeting_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            country TEXT NOT NULL,
            category TEXT NOT NULL,
            date DATE NOT NULL,
            status TEXT NOT NULL
        )"
    ))
    .execute(tx.as_mut())
    .await?;

    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS {SCHEMA}.races (
            race_id TEXT PRIMARY KEY,
            meeting_id TEXT NOT NULL REFERENCES {SCHEMA}.meetings(meeting_id),
            name TEXT NOT NULL,
            race_number INTEGER NOT NULL,
            local_date DATE NOT NULL,
            local_start_time TEXT NOT NULL,
            actual_start TIMESTAMPTZ,
            status TEXT NOT NULL,
            distance INTEGER,
            track_condition TEXT,
            weather TEXT,
            race_type TEXT,
            prize_pool BIGINT,
            field_size INTEGER,
            positions_paid INTEGER,
            video_url TEXT
        )"
    ))
    .execute(tx.as_mut())
    .await?;

    sqlx::query(&format!(
        "CREATE INDEX IF NOT EXISTS races_start_time_idx ON {SCHEMA}.races (actual_start) \
         WHERE status IN ('open', 'closed', 'interim')"
    ))
    .execute(tx.as_mut())
    .await?;

    sqlx::query(&format!(
        "CREATE INDEX IF NOT EXISTS meetings_date_category_idx ON {SCHEMA}.meetings (date, category) \
         WHERE status NOT IN ('final', 'abandoned')"
    ))
    .execute(tx.as_mut())
    .await?;

    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS {SCHEMA}.entrants (
            entrant_id TEXT PRIMARY KEY,
            race_id TEXT NOT NULL REFERENCES {SCHEMA}.races(race_id),
            runner_number INTEGER NOT NULL,
            barrier INTEGER,
            name TEXT NOT NULL,
            is_scratched BOOLEAN NOT NULL DEFAULT FALSE,
            is_late_scratched BOOLEAN NOT NULL DEFAULT FALSE,
            fixed_win_odds NUMERIC,
            fixed_place_odds NUMERIC,
            pool_win_odds NUMERIC,
            pool_place_odds NUMERIC,
            hold_percentage NUMERIC,
            bet_percentage NUMERIC,
            win_pool_amount BIGINT NOT NULL DEFAULT 0,
            place_pool_amount BIGINT NOT NULL DEFAULT 0,
            jockey TEXT,
            trainer TEXT,
            silk_colours TEXT,
            silk_url TEXT,
            is_favourite BOOLEAN NOT NULL DEFAULT FALSE,
            is_mover BOOLEAN NOT NULL DEFAULT FALSE
        )"
    ))
    .execute(tx.as_mut())
    .await?;

    sqlx::query(&format!(
        "CREATE INDEX IF NOT EXISTS entrants_race_id_idx ON {SCHEMA}.entrants (race_id)"
    ))
    .execute(tx.as_mut())
    .await?;

    sqlx::query(&format!(
        "CREATE INDEX IF NOT EXISTS entrants_race_id_active_idx ON {SCHEMA}.entrants (race_id) \
         WHERE NOT is_scratched"
    ))
    .execute(tx.as_mut())
    .await?;

    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS {SCHEMA}.race_pools (
            race_id TEXT PRIMARY KEY REFERENCES {SCHEMA}.races(race_id),
            win_total BIGINT NOT NULL,
            place_total BIGINT NOT NULL,
            quinella_total BIGINT NOT NULL,
            trifecta_total BIGINT NOT NULL,
            exacta_total BIGINT NOT NULL,
            first4_total BIGINT NOT NULL,
            total BIGINT NOT NULL,
            currency TEXT NOT NULL,
            data_quality_score INTEGER NOT NULL,
            extracted_pool_count INTEGER NOT NULL
        )"
    ))
    .execute(tx.as_mut())
    .await?;

    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS {SCHEMA}.money_flow_history (
            entrant_id TEXT NOT NULL,
            race_id TEXT NOT NULL,
            polling_timestamp TIMESTAMPTZ NOT NULL,
            event_timestamp TIMESTAMPTZ NOT NULL,
            time_to_start NUMERIC NOT NULL,
            time_interval NUMERIC NOT NULL,
            interval_type TEXT NOT NULL,
            hold_percentage NUMERIC,
            bet_percentage NUMERIC,
            win_pool_percentage NUMERIC,
            place_pool_percentage NUMERIC,
            win_pool_amount BIGINT NOT NULL,
            place_pool_amount BIGINT NOT NULL,
            incremental_win_amount BIGINT NOT NULL,
            incremental_place_amount BIGINT NOT NULL,
            fixed_win_odds NUMERIC,
            fixed_place_odds NUMERIC,
            pool_win_odds NUMERIC,
            pool_place_odds NUMERIC,
            PRIMARY KEY (entrant_id, polling_timestamp)
        ) PARTITION BY RANGE (event_timestamp)"
    ))
    .execute(tx.as_mut())
    .await?;

    sqlx::query(&format!(
        "CREATE INDEX IF NOT EXISTS money_flow_history_entrant_idx ON {SCHEMA}.money_flow_history (entrant_id, event_timestamp DESC)"
    ))
    .execute(tx.as_mut())
    .await?;

    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS {SCHEMA}.odds_history (
            entrant_id TEXT NOT NULL,
            event_timestamp TIMESTAMPTZ NOT NULL,
            odds_type TEXT NOT NULL,
            odds NUMERIC NOT NULL,
            PRIMARY KEY (entrant_id, event_timestamp, odds_type)
        ) PARTITION BY RANGE (event_timestamp)"
    ))
    .execute(tx.as_mut())
    .await?;

    sqlx::query(&format!(
        "CREATE INDEX IF NOT EXISTS odds_history_entrant_idx ON {SCHEMA}.odds_history (entrant_id, event_timestamp DESC)"
    ))
    .execute(tx.as_mut())
    .await?;

    Ok(())
}

/// Upserts a meeting; mutable entities use ON-CONFLICT DO UPDATE (§4.F).
pub async fn upsert_meeting(tx: &mut sqlx::Transaction<'_, Postgres>, meeting: &Meeting) -> IngestResult<u64> {
    let result = sqlx::query(&format!(
        "INSERT INTO {SCHEMA}.meetings (meeting_id, name, country, category, date, status) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (meeting_id) DO UPDATE SET \
         name = EXCLUDED.name, country = EXCLUDED.country, category = EXCLUDED.category, \
         date = EXCLUDED.date, status = EXCLUDED.status"
    ))
    .bind(&meeting.meeting_id)
    .bind(&meeting.name)
    .bind(&meeting.country)
    .bind(&meeting.category)
    .bind(meeting.date)
    .bind(&meeting.status)
    .execute(tx.as_mut())
    .await?;
    Ok(result.rows_affected())
}

pub async fn upsert_race(tx: &mut sqlx::Transaction<'_, Postgres>, race: &Race) -> IngestResult<u64> {
    let result = sqlx::query(&format!(
        "INSERT INTO {SCHEMA}.races (race_id, meeting_id, name, race_number, local_date, local_start_time, \
         actual_start, status, distance, track_condition, weather, race_type, prize_pool, field_size, \
         positions_paid, video_url) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) \
         ON CONFLICT (race_id) DO UPDATE SET \
         name = EXCLUDED.name, race_number = EXCLUDED.race_number, local_date = EXCLUDED.local_date, \
         local_start_time = EXCLUDED.local_start_time, actual_start = EXCLUDED.actual_start, \
         status = EXCLUDED.status, distance = EXCLUDED.distance, track_condition = EXCLUDED.track_condition, \
         weather = EXCLUDED.weather, race_type = EXCLUDED.race_type, prize_pool = EXCLUDED.prize_pool, \
         field_size = EXCLUDED.field_size, positions_paid = EXCLUDED.positions_paid, video_url = EXCLUDED.video_url"
    ))
    .bind(&race.race_id)
    .bind(&race.meeting_id)
    .bind(&race.name)
    .bind(race.race_number)
    .bind(race.local_date)
    .bind(&race.local_start_time)
    .bind(race.actual_start)
    .bind(race.status.as_str())
    .bind(race.distance)
    .bind(&race.track_condition)
    .bind(&race.weather)
    .bind(&race.race_type)
    .bind(race.prize_pool)
    .bind(race.field_size)
    .bind(race.positions_paid)
    .bind(&race.video_url)
    .execute(tx.as_mut())
    .await?;
    Ok(result.rows_affected())
}

pub async fn upsert_entrants(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    entrants: &[Entrant],
) -> IngestResult<u64> {
    let mut rows_affected = 0;
    for entrant in entrants {
        let result = sqlx::query(&format!(
            "INSERT INTO {SCHEMA}.entrants (entrant_id, race_id, runner_number, barrier, name, \
             is_scratched, is_late_scratched, fixed_win_odds, fixed_place_odds, pool_win_odds, \
             pool_place_odds, hold_percentage, bet_percentage, win_pool_amount, place_pool_amount, \
             jockey, trainer, silk_colours, silk_url, is_favourite, is_mover) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21) \
             ON CONFLICT (entrant_id) DO UPDATE SET \
             runner_number = EXCLUDED.runner_number, barrier = EXCLUDED.barrier, name = EXCLUDED.name, \
             is_scratched = EXCLUDED.is_scratched, is_late_scratched = EXCLUDED.is_late_scratched, \
             fixed_win_odds = EXCLUDED.fixed_win_odds, fixed_place_odds = EXCLUDED.fixed_place_odds, \
             pool_win_odds = EXCLUDED.pool_win_odds, pool_place_odds = EXCLUDED.pool_place_odds, \
             hold_percentage = EXCLUDED.hold_percentage, bet_percentage = EXCLUDED.bet_percentage, \
             win_pool_amount = EXCLUDED.win_pool_amount, place_pool_amount = EXCLUDED.place_pool_amount, \
             jockey = EXCLUDED.jockey, trainer = EXCLUDED.trainer, silk_colours = EXCLUDED.silk_colours, \
             silk_url = EXCLUDED.silk_url, is_favourite = EXCLUDED.is_favourite, is_mover = EXCLUDED.is_mover"
        ))
        .bind(&entrant.entrant_id)
        .bind(&entrant.race_id)
        .bind(entrant.runner_number)
        .bind(entrant.barrier)
        .bind(&entrant.name)
        .bind(entrant.is_scratched)
        .bind(entrant.is_late_scratched)
        .bind(entrant.fixed_win_odds)
        .bind(entrant.fixed_place_odds)
        .bind(entrant.pool_win_odds)
        .bind(entrant.pool_place_odds)
        .bind(entrant.hold_percentage)
        .bind(entrant.bet_percentage)
        .bind(entrant.win_pool_amount)
        .bind(entrant.place_pool_amount)
        .bind(&entrant.jockey)
        .bind(&entrant.trainer)
        .bind(&entrant.silk_colours)
        .bind(&entrant.silk_url)
        .bind(entrant.is_favourite)
        .bind(entrant.is_mover)
        .execute(tx.as_mut())
        .await?;
        rows_affected += result.rows_affected();
    }
    Ok(rows_affected)
}

pub async fn upsert_race_pools(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    pools: &RacePools,
) -> IngestResult<u64> {
    let result = sqlx::query(&format!(
        "INSERT INTO {SCHEMA}.race_pools (race_id, win_total, place_total, quinella_total, \
         trifecta_total, exacta_total, first4_total, total, currency, data_quality_score, extracted_pool_count) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
         ON CONFLICT (race_id) DO UPDATE SET \
         win_total = EXCLUDED.win_total, place_total = EXCLUDED.place_total, \
         quinella_total = EXCLUDED.quinella_total, trifecta_total = EXCLUDED.trifecta_total, \
         exacta_total = EXCLUDED.exacta_total, first4_total = EXCLUDED.first4_total, \
         total = EXCLUDED.total, currency = EXCLUDED.currency, \
         data_quality_score = EXCLUDED.data_quality_score, extracted_pool_count = EXCLUDED.extracted_pool_count"
    ))
    .bind(&pools.race_id)
    .bind(pools.win_total)
    .bind(pools.place_total)
    .bind(pools.quinella_total)
    .bind(pools.trifecta_total)
    .bind(pools.exacta_total)
    .bind(pools.first4_total)
    .bind(pools.total)
    .bind(&pools.currency)
    .bind(pools.data_quality_score)
    .bind(pools.extracted_pool_count)
    .execute(tx.as_mut())
    .await?;
    Ok(result.rows_affected())
}

/// Loads the most recently observed odds value per (entrant, type) from
/// today's partition, for the odds-change detector's warm-start hook (§4.D).
pub async fn load_last_odds_per_entrant(
    pool: &DbPool,
    race_id: &str,
) -> IngestResult<Vec<(String, OddsType, Decimal)>> {
    let rows = sqlx::query(&format!(
        "SELECT DISTINCT ON (oh.entrant_id, oh.odds_type) oh.entrant_id, oh.odds_type, oh.odds \
         FROM {SCHEMA}.odds_history oh \
         JOIN {SCHEMA}.entrants e ON e.entrant_id = oh.entrant_id \
         WHERE e.race_id = $1 \
         ORDER BY oh.entrant_id, oh.odds_type, oh.event_timestamp DESC"
    ))
    .bind(race_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| {
            let entrant_id: String = row.try_get("entrant_id")?;
            let odds_type_raw: String = row.try_get("odds_type")?;
            let odds: Decimal = row.try_get("odds")?;
            let odds_type = match odds_type_raw.as_str() {
                "fixed_win" => OddsType::FixedWin,
                "fixed_place" => OddsType::FixedPlace,
                "pool_win" => OddsType::PoolWin,
                _ => OddsType::PoolPlace,
            };
            Ok((entrant_id, odds_type, odds))
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()
        .map_err(IngestError::from)
}

/// Races whose start falls in `[now - lookback, now + window]`, for the
/// scheduler's "upcoming races" source and the `/races/upcoming` endpoint.
pub async fn load_upcoming_races(
    pool: &DbPool,
    now: DateTime<Utc>,
    window_minutes: i64,
    lookback_minutes: i64,
) -> IngestResult<Vec<Race>> {
    let from = now - chrono::Duration::minutes(lookback_minutes);
    let to = now + chrono::Duration::minutes(window_minutes);
    let rows = sqlx::query(&format!(
        "SELECT race_id, meeting_id, name, race_number, local_date, local_start_time, actual_start, \
         status, distance, track_condition, weather, race_type, prize_pool, field_size, positions_paid, video_url \
         FROM {SCHEMA}.races \
         WHERE status IN ('open', 'closed', 'interim') AND actual_start BETWEEN $1 AND $2"
    ))
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(row_to_race).collect::<Result<Vec<_>, sqlx::Error>>().map_err(IngestError::from)
}

/// Meetings for a venue-local date, for `GET /meetings?date=`.
pub async fn load_meetings_by_date(pool: &DbPool, date: chrono::NaiveDate) -> IngestResult<Vec<Meeting>> {
    let rows = sqlx::query(&format!(
        "SELECT meeting_id, name, country, category, date, status FROM {SCHEMA}.meetings WHERE date = $1"
    ))
    .bind(date)
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(row_to_meeting).collect::<Result<Vec<_>, sqlx::Error>>().map_err(IngestError::from)
}

pub async fn load_meeting(pool: &DbPool, meeting_id: &str) -> IngestResult<Option<Meeting>> {
    let row = sqlx::query(&format!(
        "SELECT meeting_id, name, country, category, date, status FROM {SCHEMA}.meetings WHERE meeting_id = $1"
    ))
    .bind(meeting_id)
    .fetch_optional(pool)
    .await?;
    row.map(row_to_meeting).transpose().map_err(IngestError::from)
}

fn row_to_meeting(row: sqlx::postgres::PgRow) -> Result<Meeting, sqlx::Error> {
    Ok(Meeting {
        meeting_id: row.try_get("meeting_id")?,
        name: row.try_get("name")?,
        country: row.try_get("country")?,
        category: row.try_get("category")?,
        date: row.try_get("date")?,
        status: row.try_get("status")?,
    })
}

/// Races belonging to a meeting, for `GET /races?meeting_id=`.
pub async fn load_races_by_meeting(pool: &DbPool, meeting_id: &str) -> IngestResult<Vec<Race>> {
    let rows = sqlx::query(&format!(
        "SELECT race_id, meeting_id, name, race_number, local_date, local_start_time, actual_start, \
         status, distance, track_condition, weather, race_type, prize_pool, field_size, positions_paid, video_url \
         FROM {SCHEMA}.races WHERE meeting_id = $1 ORDER BY race_number"
    ))
    .bind(meeting_id)
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(row_to_race).collect::<Result<Vec<_>, sqlx::Error>>().map_err(IngestError::from)
}

/// Entrants for a race, for the `GET /races/{race_id}` detail bundle.
pub async fn load_entrants_by_race(pool: &DbPool, race_id: &str) -> IngestResult<Vec<Entrant>> {
    let rows = sqlx::query(&format!(
        "SELECT entrant_id, race_id, runner_number, barrier, name, is_scratched, is_late_scratched, \
         fixed_win_odds, fixed_place_odds, pool_win_odds, pool_place_odds, hold_percentage, bet_percentage, \
         win_pool_amount, place_pool_amount, jockey, trainer, silk_colours, silk_url, is_favourite, is_mover \
         FROM {SCHEMA}.entrants WHERE race_id = $1 ORDER BY runner_number"
    ))
    .bind(race_id)
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(row_to_entrant).collect::<Result<Vec<_>, sqlx::Error>>().map_err(IngestError::from)
}

fn row_to_entrant(row: sqlx::postgres::PgRow) -> Result<Entrant, sqlx::Error> {
    Ok(Entrant {
        entrant_id: row.try_get("entrant_id")?,
        race_id: row.try_get("race_id")?,
        runner_number: row.try_get("runner_number")?,
        barrier: row.try_get("barrier")?,
        name: row.try_get("name")?,
        is_scratched: row.try_get("is_scratched")?,
        is_late_scratched: row.try_get("is_late_scratched")?,
        fixed_win_odds: row.try_get("fixed_win_odds")?,
        fixed_place_odds: row.try_get("fixed_place_odds")?,
        pool_win_odds: row.try_get("pool_win_odds")?,
        pool_place_odds: row.try_get("pool_place_odds")?,
        hold_percentage: row.try_get("hold_percentage")?,
        bet_percentage: row.try_get("bet_percentage")?,
        win_pool_amount: row.try_get("win_pool_amount")?,
        place_pool_amount: row.try_get("place_pool_amount")?,
        jockey: row.try_get("jockey")?,
        trainer: row.try_get("trainer")?,
        silk_colours: row.try_get("silk_colours")?,
        silk_url: row.try_get("silk_url")?,
        is_favourite: row.try_get("is_favourite")?,
        is_mover: row.try_get("is_mover")?,
    })
}

pub async fn load_race(pool: &DbPool, race_id: &str) -> IngestResult<Option<Race>> {
    let row = sqlx::query(&format!(
        "SELECT race_id, meeting_id, name, race_number, local_date, local_start_time, actual_start, \
         status, distance, track_condition, weather, race_type, prize_pool, field_size, positions_paid, video_url \
         FROM {SCHEMA}.races WHERE race_id = $1"
    ))
    .bind(race_id)
    .fetch_optional(pool)
    .await?;

    row.map(row_to_race).transpose().map_err(IngestError::from)
}

fn row_to_race(row: sqlx::postgres::PgRow) -> Result<Race, sqlx::Error> {
    let status_raw: String = row.try_get("status")?;
    let status = match status_raw.as_str() {
        "open" => crate::types::RaceStatus::Open,
        "closed" => crate::types::RaceStatus::Closed,
        "interim" => crate::types::RaceStatus::Interim,
        "final" => crate::types::RaceStatus::Final,
        "abandoned" => crate::types::RaceStatus::Abandoned,
        _ => crate::types::RaceStatus::Postponed,
    };
    Ok(Race {
        race_id: row.try_get("race_id")?,
        meeting_id: row.try_get("meeting_id")?,
        name: row.try_get("name")?,
        race_number: row.try_get("race_number")?,
        local_date: row.try_get("local_date")?,
        local_start_time: row.try_get("local_start_time")?,
        actual_start: row.try_get("actual_start")?,
        status,
        distance: row.try_get("distance")?,
        track_condition: row.try_get("track_condition")?,
        weather: row.try_get("weather")?,
        race_type: row.try_get("race_type")?,
        prize_pool: row.try_get("prize_pool")?,
        field_size: row.try_get("field_size")?,
        positions_paid: row.try_get("positions_paid")?,
        video_url: row.try_get("video_url")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_constant_is_stable() {
        assert_eq!(SCHEMA, "raceday");
    }
}

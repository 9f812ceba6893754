//! Integration tests against a live PostgreSQL instance.
//!
//! These exercise the schema, partition manager and bulk writer end to end.
//! They require `DATABASE_URL` to point at a disposable database and are
//! excluded from the default test run.
//!
//! To run: `DATABASE_URL=postgres://... cargo test --test db_integration -- --ignored`

use chrono::Utc;
use raceday_ingest::bulk_writer;
use raceday_ingest::database::{self, DbPool};
use raceday_ingest::partitions;
use raceday_ingest::types::{
    Entrant, Meeting, OddsObservation, OddsType, Race, RacePools, RaceStatus, TransformedRace,
};
use rust_decimal_macros::dec;

async fn test_pool() -> DbPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for db_integration tests");
    let pool = database::connect(&url, 5, 1).await.expect("connect");
    database::initialize_database(&pool).await.expect("initialize_database");
    pool
}

fn sample_transformed_race(race_id: &str, meeting_id: &str) -> TransformedRace {
    let meeting = Meeting {
        meeting_id: meeting_id.to_string(),
        name: "Test Meeting".to_string(),
        country: "NZ".to_string(),
        category: "T".to_string(),
        date: Utc::now().date_naive(),
        status: "open".to_string(),
    };
    let race = Race {
        race_id: race_id.to_string(),
        meeting_id: meeting_id.to_string(),
        name: "Race 1".to_string(),
        race_number: 1,
        local_date: Utc::now().date_naive(),
        local_start_time: "13:00".to_string(),
        actual_start: Some(Utc::now()),
        status: RaceStatus::Open,
        distance: Some(1200),
        track_condition: None,
        weather: None,
        race_type: None,
        prize_pool: None,
        field_size: Some(1),
        positions_paid: None,
        video_url: None,
    };
    let entrant = Entrant {
        entrant_id: format!("{race_id}-e1"),
        race_id: race_id.to_string(),
        runner_number: 1,
        barrier: Some(1),
        name: "Runner One".to_string(),
        is_scratched: false,
        is_late_scratched: false,
        fixed_win_odds: Some(dec!(3.5)),
        fixed_place_odds: None,
        pool_win_odds: None,
        pool_place_odds: None,
        hold_percentage: Some(dec!(15.5)),
        bet_percentage: None,
        win_pool_amount: 775_000,
        place_pool_amount: 0,
        jockey: None,
        trainer: None,
        silk_colours: None,
        silk_url: None,
        is_favourite: false,
        is_mover: false,
    };
    let race_pools = RacePools {
        race_id: race_id.to_string(),
        win_total: 5_000_000,
        place_total: 3_000_000,
        quinella_total: 0,
        trifecta_total: 0,
        exacta_total: 0,
        first4_total: 0,
        total: 8_000_000,
        currency: "NZD".to_string(),
        data_quality_score: 100,
        extracted_pool_count: 2,
    };
    TransformedRace {
        meeting,
        race,
        entrants: vec![entrant],
        race_pools,
        money_flow_records: Vec::new(),
        odds_candidates: Vec::new(),
    }
}

/// Property 9: appends to `odds_history` never collide on re-insertion —
/// there is no unique constraint to upsert against, so writing the same
/// observation twice produces two rows, not one.
#[tokio::test]
#[ignore]
async fn odds_history_append_is_never_deduplicated() {
    let pool = test_pool().await;
    let race_id = format!("itest-append-only-{}", uuid::Uuid::new_v4());
    let transformed = sample_transformed_race(&race_id, &format!("{race_id}-m"));

    let observation = OddsObservation {
        entrant_id: transformed.entrants[0].entrant_id.clone(),
        event_timestamp: Utc::now(),
        odds_type: OddsType::FixedWin,
        odds: dec!(3.5),
    };

    bulk_writer::write_race_update(&pool, &transformed, std::slice::from_ref(&observation))
        .await
        .expect("first write");
    bulk_writer::write_race_update(&pool, &transformed, std::slice::from_ref(&observation))
        .await
        .expect("second write with identical payload");

    let row: (i64,) = sqlx::query_as(&format!(
        "SELECT COUNT(*) FROM {}.odds_history WHERE entrant_id = $1",
        database::SCHEMA
    ))
    .bind(&transformed.entrants[0].entrant_id)
    .fetch_one(&pool)
    .await
    .expect("count query");

    assert_eq!(row.0, 2, "identical odds observations must both be appended");
}

/// S5: a write targeting a partition that does not exist yet succeeds after
/// one retry, via `bulk_writer`'s partition-miss classification.
#[tokio::test]
#[ignore]
async fn write_retries_once_on_missing_partition() {
    let pool = test_pool().await;
    let race_id = format!("itest-partition-miss-{}", uuid::Uuid::new_v4());
    let transformed = sample_transformed_race(&race_id, &format!("{race_id}-m"));

    // A date far enough out that ensure_upcoming_partitions (today/tomorrow)
    // never created it, forcing the retry-with-create path in bulk_writer.
    let future_timestamp = Utc::now() + chrono::Duration::days(10);
    let observation = OddsObservation {
        entrant_id: transformed.entrants[0].entrant_id.clone(),
        event_timestamp: future_timestamp,
        odds_type: OddsType::FixedWin,
        odds: dec!(4.2),
    };

    bulk_writer::write_race_update(&pool, &transformed, std::slice::from_ref(&observation))
        .await
        .expect("write should succeed after creating the missing partition");

    let expected_partition =
        partitions::partition_name("odds_history", future_timestamp.date_naive());
    let exists: (bool,) = sqlx::query_as(&format!(
        "SELECT EXISTS (SELECT 1 FROM pg_tables WHERE schemaname = '{}' AND tablename = $1)",
        database::SCHEMA
    ))
    .bind(&expected_partition)
    .fetch_one(&pool)
    .await
    .expect("partition lookup");

    assert!(exists.0, "missing partition should have been created on demand");
}

/// Smoke test for ensure_upcoming_partitions: both today's and tomorrow's
/// child partitions exist after startup initialization runs.
#[tokio::test]
#[ignore]
async fn startup_creates_todays_and_tomorrows_partitions() {
    let pool = test_pool().await;
    let mut tx = pool.begin().await.expect("begin");
    partitions::ensure_upcoming_partitions(&mut tx, "money_flow_history")
        .await
        .expect("ensure_upcoming_partitions");
    tx.commit().await.expect("commit");

    for date in [Utc::now().date_naive(), Utc::now().date_naive() + chrono::Duration::days(1)] {
        let name = partitions::partition_name("money_flow_history", date);
        let exists: (bool,) = sqlx::query_as(&format!(
            "SELECT EXISTS (SELECT 1 FROM pg_tables WHERE schemaname = '{}' AND tablename = $1)",
            database::SCHEMA
        ))
        .bind(&name)
        .fetch_one(&pool)
        .await
        .expect("partition lookup");
        assert!(exists.0, "{name} should exist after startup initialization");
    }
}

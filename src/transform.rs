//! Transform worker pool (§4.B): decodes a raw race payload into the
//! normalized entities plus the two time-series streams. Transform is pure
//! CPU work — same input always yields the same output — so it runs on
//! `spawn_blocking` under a semaphore rather than the async reactor.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{debug, instrument};

use crate::errors::{IngestError, IngestResult};
use crate::money_flow;
use crate::types::conversions::{dollars_to_cents, parse_odds};
use crate::types::{
    Entrant, Meeting, MoneyFlowObservation, OddsObservation, OddsType, Race, RacePools,
    RaceStatus, TransformedRace,
};

/// Bounded parallelism across races; sized to the number of logical CPUs
/// (§4.B / §5). One permit is held for the duration of a single race's
/// transform task.
#[derive(Clone)]
pub struct TransformWorkerPool {
    semaphore: Arc<Semaphore>,
}

impl TransformWorkerPool {
    pub fn new(size: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(size.max(1))),
        }
    }

    /// `transform(RaceData) -> TransformedRace | fails{permanent}`.
    pub async fn transform(&self, raw: Value, now: chrono::DateTime<Utc>) -> IngestResult<TransformedRace> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| IngestError::Cancelled)?;
        let result = tokio::task::spawn_blocking(move || transform_blocking(raw, now))
            .await
            .map_err(|e| IngestError::Logic(format!("transform task panicked: {e}")))?;
        drop(permit);
        result
    }

    /// Waits for every in-flight transform task to release its permit.
    pub async fn drain(&self, total_permits: usize) {
        let _ = self.semaphore.acquire_many(total_permits as u32).await;
    }
}

#[instrument(skip(raw), fields(race_id))]
fn transform_blocking(raw: Value, now: chrono::DateTime<Utc>) -> IngestResult<TransformedRace> {
    let race_obj = raw
        .get("race")
        .ok_or_else(|| IngestError::Logic("missing race object".into()))?;

    let race_id = field_str(race_obj, "id")?;
    let meeting_obj = raw.get("meeting").unwrap_or(&Value::Null);

    let meeting = build_meeting(meeting_obj, &race_id)?;
    let race = build_race(race_obj, &meeting.meeting_id)?;
    let entrants = build_entrants(race_obj, &race.race_id)?;
    let race_pools = build_race_pools(race_obj, &race.race_id)?;

    let race_start = race.actual_start.unwrap_or(now);
    let (money_flow_records, odds_candidates) =
        build_time_series(&entrants, &race_pools, race_start, now);

    debug!(
        race_id = %race.race_id,
        entrants = entrants.len(),
        money_flow = money_flow_records.len(),
        odds = odds_candidates.len(),
        "transform complete"
    );

    Ok(TransformedRace {
        meeting,
        race,
        entrants,
        race_pools,
        money_flow_records,
        odds_candidates,
    })
}

fn field_str(obj: &Value, key: &str) -> IngestResult<String> {
    obj.get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| IngestError::Logic(format!("missing or non-string field '{key}'")))
}

fn build_meeting(meeting_obj: &Value, fallback_race_id: &str) -> IngestResult<Meeting> {
    let meeting_id = meeting_obj
        .get("id")
        .and_then(|v| v.as_str())
        .unwrap_or(fallback_race_id)
        .to_string();
    let name = meeting_obj
        .get("name")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string();
    let country = meeting_obj
        .get("country")
        .and_then(|v| v.as_str())
        .unwrap_or("NZ")
        .to_string();
    let category = meeting_obj
        .get("category")
        .and_then(|v| v.as_str())
        .unwrap_or("thoroughbred")
        .to_string();
    let date_str = meeting_obj
        .get("date")
        .and_then(|v| v.as_str())
        .unwrap_or("1970-01-01");
    let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .map_err(|e| IngestError::Logic(format!("invalid meeting date: {e}")))?;
    let status = meeting_obj
        .get("status")
        .and_then(|v| v.as_str())
        .unwrap_or("open")
        .to_string();

    Ok(Meeting {
        meeting_id,
        name,
        country,
        category,
        date,
        status,
    })
}

fn parse_race_status(raw: &str) -> RaceStatus {
    match raw {
        "open" => RaceStatus::Open,
        "closed" => RaceStatus::Closed,
        "interim" => RaceStatus::Interim,
        "final" => RaceStatus::Final,
        "abandoned" => RaceStatus::Abandoned,
        "postponed" => RaceStatus::Postponed,
        _ => RaceStatus::Open,
    }
}

fn build_race(race_obj: &Value, meeting_id: &str) -> IngestResult<Race> {
    let race_id = field_str(race_obj, "id")?;
    let name = race_obj
        .get("name")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string();
    let race_number = race_obj.get("number").and_then(|v| v.as_i64()).unwrap_or(0) as i32;
    let local_date_str = race_obj
        .get("local_date")
        .and_then(|v| v.as_str())
        .unwrap_or("1970-01-01");
    let local_date = NaiveDate::parse_from_str(local_date_str, "%Y-%m-%d")
        .map_err(|e| IngestError::Logic(format!("invalid race local_date: {e}")))?;
    let local_start_time = race_obj
        .get("local_start_time")
        .and_then(|v| v.as_str())
        .unwrap_or("00:00")
        .to_string();
    let actual_start = race_obj
        .get("actual_start")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse().ok());
    let status = parse_race_status(
        race_obj
            .get("status")
            .and_then(|v| v.as_str())
            .unwrap_or("open"),
    );

    Ok(Race {
        race_id,
        meeting_id: meeting_id.to_string(),
        name,
        race_number,
        local_date,
        local_start_time,
        actual_start,
        status,
        distance: race_obj.get("distance").and_then(|v| v.as_i64()).map(|v| v as i32),
        track_condition: race_obj
            .get("track_condition")
            .and_then(|v| v.as_str())
            .map(String::from),
        weather: race_obj.get("weather").and_then(|v| v.as_str()).map(String::from),
        race_type: race_obj.get("type").and_then(|v| v.as_str()).map(String::from),
        prize_pool: race_obj.get("prize_pool").and_then(|v| v.as_i64()),
        field_size: race_obj.get("field_size").and_then(|v| v.as_i64()).map(|v| v as i32),
        positions_paid: race_obj
            .get("positions_paid")
            .and_then(|v| v.as_i64())
            .map(|v| v as i32),
        video_url: race_obj.get("video_url").and_then(|v| v.as_str()).map(String::from),
    })
}

fn build_entrants(race_obj: &Value, race_id: &str) -> IngestResult<Vec<Entrant>> {
    let entrants = race_obj
        .get("entrants")
        .and_then(|v| v.as_array())
        .ok_or_else(|| IngestError::Logic("missing entrants array".into()))?;

    entrants
        .iter()
        .map(|e| build_entrant(e, race_id))
        .collect()
}

fn build_entrant(entrant_obj: &Value, race_id: &str) -> IngestResult<Entrant> {
    let entrant_id = field_str(entrant_obj, "id")?;
    let runner_number = entrant_obj
        .get("runner_number")
        .and_then(|v| v.as_i64())
        .unwrap_or(0) as i32;

    let win_pool_amount = entrant_obj
        .get("win_pool_amount")
        .and_then(|v| v.as_str())
        .map(dollars_to_cents)
        .transpose()
        .map_err(|e| IngestError::Logic(e.to_string()))?
        .unwrap_or(0);
    let place_pool_amount = entrant_obj
        .get("place_pool_amount")
        .and_then(|v| v.as_str())
        .map(dollars_to_cents)
        .transpose()
        .map_err(|e| IngestError::Logic(e.to_string()))?
        .unwrap_or(0);

    Ok(Entrant {
        entrant_id,
        race_id: race_id.to_string(),
        runner_number,
        barrier: entrant_obj.get("barrier").and_then(|v| v.as_i64()).map(|v| v as i32),
        name: entrant_obj
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string(),
        is_scratched: entrant_obj
            .get("is_scratched")
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
        is_late_scratched: entrant_obj
            .get("is_late_scratched")
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
        fixed_win_odds: parse_optional_odds(entrant_obj, "fixed_win_odds")?,
        fixed_place_odds: parse_optional_odds(entrant_obj, "fixed_place_odds")?,
        pool_win_odds: parse_optional_odds(entrant_obj, "pool_win_odds")?,
        pool_place_odds: parse_optional_odds(entrant_obj, "pool_place_odds")?,
        hold_percentage: parse_optional_odds(entrant_obj, "hold_percentage")?,
        bet_percentage: parse_optional_odds(entrant_obj, "bet_percentage")?,
        win_pool_amount,
        place_pool_amount,
        jockey: entrant_obj.get("jockey").and_then(|v| v.as_str()).map(String::from),
        trainer: entrant_obj.get("trainer").and_then(|v| v.as_str()).map(String::from),
        silk_colours: entrant_obj
            .get("silk_colours")
            .and_then(|v| v.as_str())
            .map(String::from),
        silk_url: entrant_obj.get("silk_url").and_then(|v| v.as_str()).map(String::from),
        is_favourite: entrant_obj
            .get("is_favourite")
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
        is_mover: entrant_obj.get("is_mover").and_then(|v| v.as_bool()).unwrap_or(false),
    })
}

fn parse_optional_odds(obj: &Value, key: &str) -> IngestResult<Option<Decimal>> {
    obj.get(key)
        .and_then(|v| v.as_str())
        .map(parse_odds)
        .transpose()
        .map_err(|e| IngestError::Logic(e.to_string()))
}

fn build_race_pools(race_obj: &Value, race_id: &str) -> IngestResult<RacePools> {
    let pools = race_obj.get("pools").unwrap_or(&Value::Null);
    let pool_cents = |key: &str| -> IngestResult<i64> {
        pools
            .get(key)
            .and_then(|v| v.as_str())
            .map(dollars_to_cents)
            .transpose()
            .map_err(|e| IngestError::Logic(e.to_string()))
            .map(|v| v.unwrap_or(0))
    };

    let win_total = pool_cents("win")?;
    let place_total = pool_cents("place")?;
    let quinella_total = pool_cents("quinella")?;
    let trifecta_total = pool_cents("trifecta")?;
    let exacta_total = pool_cents("exacta")?;
    let first4_total = pool_cents("first4")?;
    let total = win_total + place_total + quinella_total + trifecta_total + exacta_total + first4_total;

    let extracted_pool_count = [win_total, place_total, quinella_total, trifecta_total, exacta_total, first4_total]
        .iter()
        .filter(|v| **v > 0)
        .count() as i32;
    let data_quality_score = 100 - (6 - extracted_pool_count) * 10;

    Ok(RacePools {
        race_id: race_id.to_string(),
        win_total,
        place_total,
        quinella_total,
        trifecta_total,
        exacta_total,
        first4_total,
        total,
        currency: "NZD".to_string(),
        data_quality_score: data_quality_score.max(0),
        extracted_pool_count,
    })
}

fn build_time_series(
    entrants: &[Entrant],
    race_pools: &RacePools,
    race_start: chrono::DateTime<Utc>,
    now: chrono::DateTime<Utc>,
) -> (Vec<MoneyFlowObservation>, Vec<OddsObservation>) {
    let meta = money_flow::time_metadata(race_start, now);
    let win_total_dollars = Decimal::from(race_pools.win_total) / Decimal::from(100);
    let place_total_dollars = Decimal::from(race_pools.place_total) / Decimal::from(100);

    let mut money_flow_records = Vec::with_capacity(entrants.len());
    let mut odds_candidates = Vec::new();

    for entrant in entrants {
        let hold_pct = entrant.hold_percentage.unwrap_or(Decimal::ZERO);
        let amounts = money_flow::pool_amounts(hold_pct, win_total_dollars, place_total_dollars);
        let pcts = money_flow::pool_percentages(amounts, race_pools.win_total, race_pools.place_total);
        let delta = money_flow::incremental_delta(amounts.win_cents, amounts.place_cents, None);

        money_flow_records.push(MoneyFlowObservation {
            entrant_id: entrant.entrant_id.clone(),
            race_id: entrant.race_id.clone(),
            polling_timestamp: now,
            event_timestamp: now,
            time_to_start: Decimal::from_f64_retain(meta.time_to_start).unwrap_or(Decimal::ZERO),
            time_interval: Decimal::from_f64_retain(meta.time_interval).unwrap_or(Decimal::ZERO),
            interval_type: meta.interval_type,
            hold_percentage: entrant.hold_percentage,
            bet_percentage: entrant.bet_percentage,
            win_pool_percentage: pcts.win_pct,
            place_pool_percentage: pcts.place_pct,
            win_pool_amount: amounts.win_cents,
            place_pool_amount: amounts.place_cents,
            incremental_win_amount: delta.inc_win,
            incremental_place_amount: delta.inc_place,
            fixed_win_odds: entrant.fixed_win_odds,
            fixed_place_odds: entrant.fixed_place_odds,
            pool_win_odds: entrant.pool_win_odds,
            pool_place_odds: entrant.pool_place_odds,
        });

        for (odds_type, odds) in [
            (OddsType::FixedWin, entrant.fixed_win_odds),
            (OddsType::FixedPlace, entrant.fixed_place_odds),
            (OddsType::PoolWin, entrant.pool_win_odds),
            (OddsType::PoolPlace, entrant.pool_place_odds),
        ] {
            if let Some(odds) = odds {
                odds_candidates.push(OddsObservation {
                    entrant_id: entrant.entrant_id.clone(),
                    event_timestamp: now,
                    odds_type,
                    odds,
                });
            }
        }
    }

    (money_flow_records, odds_candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_payload() -> Value {
        json!({
            "meeting": { "id": "M1", "name": "Ellerslie", "country": "NZ", "category": "thoroughbred", "date": "2025-10-14", "status": "open" },
            "race": {
                "id": "R1",
                "name": "Race One",
                "number": 1,
                "local_date": "2025-10-14",
                "local_start_time": "14:00",
                "status": "open",
                "pools": { "win": "50000", "place": "30000" },
                "entrants": [
                    { "id": "e1", "runner_number": 1, "name": "Horse One", "hold_percentage": "15.5", "fixed_win_odds": "3.5" },
                    { "id": "e2", "runner_number": 2, "name": "Horse Two", "hold_percentage": "10.0", "fixed_win_odds": "8.0" }
                ]
            }
        })
    }

    #[tokio::test]
    async fn s1_happy_poll_produces_expected_row_counts() {
        let pool = TransformWorkerPool::new(2);
        let now = "2025-10-14T12:00:00Z".parse().unwrap();
        let result = pool.transform(sample_payload(), now).await.unwrap();

        assert_eq!(result.entrants.len(), 2);
        assert_eq!(result.money_flow_records.len(), 2);
        assert_eq!(result.odds_candidates.len(), 2);

        let e1_flow = result
            .money_flow_records
            .iter()
            .find(|r| r.entrant_id == "e1")
            .unwrap();
        assert_eq!(e1_flow.incremental_win_amount, 775_000);
    }

    #[tokio::test]
    async fn missing_race_object_is_a_logic_error() {
        let pool = TransformWorkerPool::new(1);
        let now: chrono::DateTime<Utc> = "2025-10-14T12:00:00Z".parse().unwrap();
        let err = pool.transform(json!({}), now).await.unwrap_err();
        assert!(matches!(err, IngestError::Logic(_)));
    }
}

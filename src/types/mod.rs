//! Normalized domain entities and time-series records (§3).

pub mod conversions;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RaceStatus {
    Open,
    Closed,
    Interim,
    Final,
    Abandoned,
    Postponed,
}

impl RaceStatus {
    /// Terminal states beyond which the scheduler retires a race (§4.H).
    pub fn is_terminal(&self) -> bool {
        matches!(self, RaceStatus::Final | RaceStatus::Abandoned)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RaceStatus::Open => "open",
            RaceStatus::Closed => "closed",
            RaceStatus::Interim => "interim",
            RaceStatus::Final => "final",
            RaceStatus::Abandoned => "abandoned",
            RaceStatus::Postponed => "postponed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OddsType {
    FixedWin,
    FixedPlace,
    PoolWin,
    PoolPlace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalType {
    FiveMin,
    TwoMin,
    ThirtySec,
    Live,
    Unknown,
}

impl IntervalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntervalType::FiveMin => "5m",
            IntervalType::TwoMin => "2m",
            IntervalType::ThirtySec => "30s",
            IntervalType::Live => "live",
            IntervalType::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meeting {
    pub meeting_id: String,
    pub name: String,
    pub country: String,
    pub category: String,
    pub date: NaiveDate,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Race {
    pub race_id: String,
    pub meeting_id: String,
    pub name: String,
    pub race_number: i32,
    pub local_date: NaiveDate,
    pub local_start_time: String,
    pub actual_start: Option<DateTime<Utc>>,
    pub status: RaceStatus,
    pub distance: Option<i32>,
    pub track_condition: Option<String>,
    pub weather: Option<String>,
    pub race_type: Option<String>,
    pub prize_pool: Option<i64>,
    pub field_size: Option<i32>,
    pub positions_paid: Option<i32>,
    pub video_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entrant {
    pub entrant_id: String,
    pub race_id: String,
    pub runner_number: i32,
    pub barrier: Option<i32>,
    pub name: String,
    pub is_scratched: bool,
    pub is_late_scratched: bool,
    pub fixed_win_odds: Option<Decimal>,
    pub fixed_place_odds: Option<Decimal>,
    pub pool_win_odds: Option<Decimal>,
    pub pool_place_odds: Option<Decimal>,
    pub hold_percentage: Option<Decimal>,
    pub bet_percentage: Option<Decimal>,
    pub win_pool_amount: i64,
    pub place_pool_amount: i64,
    pub jockey: Option<String>,
    pub trainer: Option<String>,
    pub silk_colours: Option<String>,
    pub silk_url: Option<String>,
    pub is_favourite: bool,
    pub is_mover: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RacePools {
    pub race_id: String,
    pub win_total: i64,
    pub place_total: i64,
    pub quinella_total: i64,
    pub trifecta_total: i64,
    pub exacta_total: i64,
    pub first4_total: i64,
    pub total: i64,
    pub currency: String,
    pub data_quality_score: i32,
    pub extracted_pool_count: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoneyFlowObservation {
    pub entrant_id: String,
    pub race_id: String,
    pub polling_timestamp: DateTime<Utc>,
    pub event_timestamp: DateTime<Utc>,
    pub time_to_start: Decimal,
    pub time_interval: Decimal,
    pub interval_type: IntervalType,
    pub hold_percentage: Option<Decimal>,
    pub bet_percentage: Option<Decimal>,
    pub win_pool_percentage: Option<Decimal>,
    pub place_pool_percentage: Option<Decimal>,
    pub win_pool_amount: i64,
    pub place_pool_amount: i64,
    pub incremental_win_amount: i64,
    pub incremental_place_amount: i64,
    pub fixed_win_odds: Option<Decimal>,
    pub fixed_place_odds: Option<Decimal>,
    pub pool_win_odds: Option<Decimal>,
    pub pool_place_odds: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OddsObservation {
    pub entrant_id: String,
    pub event_timestamp: DateTime<Utc>,
    pub odds_type: OddsType,
    pub odds: Decimal,
}

/// Output of the transform step (§4.B): normalized entities plus the two
/// time-series streams, before odds-change filtering (§4.D).
#[derive(Debug, Clone)]
pub struct TransformedRace {
    pub meeting: Meeting,
    pub race: Race,
    pub entrants: Vec<Entrant>,
    pub race_pools: RacePools,
    pub money_flow_records: Vec<MoneyFlowObservation>,
    pub odds_candidates: Vec<OddsObservation>,
}

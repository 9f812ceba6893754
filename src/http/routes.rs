//! Read-side routes (§4.I / §6): meetings, races and the upcoming-races feed
//! the UI polls. All handlers are thin — query the store, serialize, let the
//! compression middleware in `mod.rs` handle the rest.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::database::{self, DbPool};
use crate::types::{Entrant, Race};

#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
}

#[derive(Debug, Deserialize)]
pub struct MeetingsQuery {
    date: Option<String>,
}

pub async fn list_meetings(
    State(state): State<AppState>,
    Query(query): Query<MeetingsQuery>,
) -> impl IntoResponse {
    let date = match query.date.as_deref().map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d")) {
        Some(Ok(d)) => d,
        Some(Err(_)) => return (StatusCode::BAD_REQUEST, "invalid date").into_response(),
        None => Utc::now().date_naive(),
    };
    match database::load_meetings_by_date(&state.db_pool, date).await {
        Ok(meetings) => Json(meetings).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

pub async fn get_meeting(State(state): State<AppState>, Path(meeting_id): Path<String>) -> impl IntoResponse {
    match database::load_meeting(&state.db_pool, &meeting_id).await {
        Ok(Some(meeting)) => Json(meeting).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct RacesQuery {
    meeting_id: String,
}

pub async fn list_races(State(state): State<AppState>, Query(query): Query<RacesQuery>) -> impl IntoResponse {
    match database::load_races_by_meeting(&state.db_pool, &query.meeting_id).await {
        Ok(races) => Json(races).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

#[derive(Debug, Serialize)]
pub struct RaceDetail {
    pub race: Race,
    pub entrants: Vec<Entrant>,
    pub freshness_seconds: i64,
}

pub async fn get_race(State(state): State<AppState>, Path(race_id): Path<String>) -> impl IntoResponse {
    let race = match database::load_race(&state.db_pool, &race_id).await {
        Ok(Some(race)) => race,
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    };
    let entrants = match database::load_entrants_by_race(&state.db_pool, &race_id).await {
        Ok(entrants) => entrants,
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    };
    let freshness_seconds = race
        .actual_start
        .map(|start| (Utc::now() - start).num_seconds())
        .unwrap_or(0);

    Json(RaceDetail { race, entrants, freshness_seconds }).into_response()
}

#[derive(Debug, Deserialize)]
pub struct UpcomingQuery {
    window_minutes: Option<i64>,
    lookback_minutes: Option<i64>,
    limit: Option<usize>,
}

pub async fn list_upcoming_races(
    State(state): State<AppState>,
    Query(query): Query<UpcomingQuery>,
) -> impl IntoResponse {
    let window = query.window_minutes.unwrap_or(120);
    let lookback = query.lookback_minutes.unwrap_or(30);
    let limit = query.limit.unwrap_or(100);

    match database::load_upcoming_races(&state.db_pool, Utc::now(), window, lookback).await {
        Ok(mut races) => {
            races.truncate(limit);
            Json(races).into_response()
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

pub async fn health() -> impl IntoResponse {
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upcoming_query_defaults_match_spec_window() {
        let query = UpcomingQuery { window_minutes: None, lookback_minutes: None, limit: None };
        assert_eq!(query.window_minutes.unwrap_or(120), 120);
        assert_eq!(query.lookback_minutes.unwrap_or(30), 30);
    }
}

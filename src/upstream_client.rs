//! Upstream client (§4.A): fetches one race's raw payload from the tote API.

use crate::errors::{IngestError, IngestResult};
use crate::settings::Upstream;
use rand::Rng;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaceStatusHint {
    Open,
    Interim,
    Closed,
    Final,
    Abandoned,
    Unknown,
}

/// Selects the query-parameter subtree requested from upstream, keyed by the
/// race's last-known status. Keeping response sizes proportional to the
/// value the payload adds is the whole point of this matrix (§4.A).
fn query_params_for(status: RaceStatusHint) -> &'static [(&'static str, &'static str)] {
    match status {
        RaceStatusHint::Open | RaceStatusHint::Interim | RaceStatusHint::Unknown => &[
            ("with_tote_trends", "true"),
            ("with_money_tracker", "true"),
            ("with_big_bets", "true"),
            ("with_live_bets", "true"),
            ("with_will_pays", "true"),
        ],
        RaceStatusHint::Closed => &[("with_results", "true"), ("with_dividends", "true")],
        RaceStatusHint::Final | RaceStatusHint::Abandoned => &[("with_results", "true")],
    }
}

#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: Client,
    settings: Upstream,
}

impl UpstreamClient {
    pub fn new(settings: Upstream) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_seconds))
            .build()?;
        Ok(Self { http, settings })
    }

    /// `fetchRaceData(raceId, raceStatus?) -> RaceData | fails{transient, permanent}`.
    #[instrument(skip(self), fields(race_id = %race_id))]
    pub async fn fetch_race_data(
        &self,
        race_id: &str,
        status_hint: RaceStatusHint,
    ) -> IngestResult<Value> {
        let params = query_params_for(status_hint);
        let url = format!("{}/racing/events/{}", self.settings.base_url, race_id);

        let mut last_err: Option<IngestError> = None;
        for attempt in 1..=self.settings.max_attempts {
            match self.try_fetch(&url, params).await {
                Ok(body) => return validate_shape(body),
                Err(err) if !err.is_retriable() => return Err(err),
                Err(err) => {
                    last_err = Some(err);
                    if attempt < self.settings.max_attempts {
                        let base_backoff_ms = self.settings.backoff_base_ms * 2u64.pow(attempt - 1);
                        let jitter_ms = rand::thread_rng().gen_range(0..50);
                        let backoff_ms = base_backoff_ms + jitter_ms;
                        warn!(attempt, backoff_ms, race_id, "retrying upstream fetch");
                        tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    }
                }
            }
        }
        Err(last_err.unwrap_or_else(|| IngestError::TransientUpstream("exhausted retries".into())))
    }

    async fn try_fetch(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> IngestResult<Value> {
        let response = self
            .http
            .get(url)
            .query(params)
            .header("X-Partner-Id", &self.settings.partner_id)
            .header("X-Partner-Contact", &self.settings.partner_contact)
            .send()
            .await?;

        let status = response.status();
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(IngestError::PermanentUpstream {
                status: status.as_u16(),
                excerpt: IngestError::sanitize_excerpt(&body),
            });
        }
        if status.is_server_error() {
            return Err(IngestError::TransientUpstream(format!(
                "upstream returned {}",
                status
            )));
        }
        if status != StatusCode::OK {
            return Err(IngestError::TransientUpstream(format!(
                "unexpected status {}",
                status
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| IngestError::PermanentUpstream {
                status: status.as_u16(),
                excerpt: IngestError::sanitize_excerpt(&e.to_string()),
            })
    }
}

/// Validates the response against the declared shape (§3): a race payload
/// must contain at minimum a meeting, a race and an entrants array. A
/// malformed payload is a permanent failure for this poll.
fn validate_shape(body: Value) -> IngestResult<Value> {
    let obj = body
        .as_object()
        .ok_or_else(|| IngestError::PermanentUpstream {
            status: 200,
            excerpt: "response root is not an object".to_string(),
        })?;

    if !obj.contains_key("race") {
        return Err(IngestError::PermanentUpstream {
            status: 200,
            excerpt: "response missing 'race'".to_string(),
        });
    }
    if !obj
        .get("race")
        .and_then(|r| r.get("entrants"))
        .map(|e| e.is_array())
        .unwrap_or(false)
    {
        return Err(IngestError::PermanentUpstream {
            status: 200,
            excerpt: "response missing 'race.entrants' array".to_string(),
        });
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn query_matrix_picks_results_only_for_final() {
        let params = query_params_for(RaceStatusHint::Final);
        assert_eq!(params, &[("with_results", "true")]);
    }

    #[test]
    fn query_matrix_picks_full_set_for_open() {
        let params = query_params_for(RaceStatusHint::Open);
        assert!(params.iter().any(|(k, _)| *k == "with_tote_trends"));
        assert!(params.iter().any(|(k, _)| *k == "with_will_pays"));
    }

    #[test]
    fn validate_shape_rejects_missing_entrants() {
        let body = json!({ "race": { "id": "R1" } });
        assert!(validate_shape(body).is_err());
    }

    #[test]
    fn validate_shape_accepts_minimal_valid_payload() {
        let body = json!({ "race": { "id": "R1", "entrants": [] } });
        assert!(validate_shape(body).is_ok());
    }
}

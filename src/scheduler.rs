//! Scheduler (§4.H): keeps one polling task alive per active race, retiring
//! it once the race reaches a terminal status, and re-evaluates the active
//! set on a fixed cadence to pick up newly-discovered races.
//!
//! Differs from a background-task `.abort()` shutdown: `stop()` asks every
//! race task to exit at its next wake-up and waits up to `shutdown_grace_ms`
//! for them to do so before giving up.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use crate::cache::{MoneyFlowCache, OddsCache};
use crate::database::{self, DbPool};
use crate::race_processor::{self, ProcessOutcome};
use crate::settings::{Scheduler as SchedulerSettings, Settings};
use crate::transform::TransformWorkerPool;
use crate::types::{Race, RaceStatus};
use crate::upstream_client::UpstreamClient;

/// `interval(ttsSeconds)`: the polling cadence table from §4.H, driven by
/// the configured critical/warning/routine thresholds rather than literals.
pub fn interval(tts_seconds: i64, cfg: &SchedulerSettings) -> Duration {
    let ms = if tts_seconds <= 300 {
        cfg.critical_interval_ms
    } else if tts_seconds <= 900 {
        cfg.warning_interval_ms
    } else {
        cfg.routine_interval_ms
    };
    Duration::from_millis(ms)
}

#[derive(Debug, Clone)]
struct RaceState {
    in_flight: Arc<AtomicBool>,
}

pub struct Scheduler {
    settings: Arc<Settings>,
    upstream: Arc<UpstreamClient>,
    transform_pool: Arc<TransformWorkerPool>,
    db_pool: DbPool,
    races: DashMap<String, RaceState>,
    handles: Mutex<HashMap<String, JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
}

impl Scheduler {
    pub fn new(
        settings: Arc<Settings>,
        upstream: Arc<UpstreamClient>,
        transform_pool: Arc<TransformWorkerPool>,
        db_pool: DbPool,
    ) -> Arc<Self> {
        let (shutdown_tx, _) = watch::channel(false);
        Arc::new(Self {
            settings,
            upstream,
            transform_pool,
            db_pool,
            races: DashMap::new(),
            handles: Mutex::new(HashMap::new()),
            shutdown_tx,
        })
    }

    pub fn active_race_count(&self) -> usize {
        self.races.len()
    }

    /// Periodically pulls the upcoming-races window from the database and
    /// spawns a task for anything not already tracked. Runs until `stop()`.
    #[instrument(skip(self))]
    pub async fn run_loop(self: Arc<Self>) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        loop {
            if let Err(e) = self.reevaluate().await {
                warn!(error = %e, "race re-evaluation failed");
            }
            crate::metrics::set_active_races(self.active_race_count() as f64);

            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(self.settings.scheduler.reevaluation_interval_ms)) => {}
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
        info!("scheduler re-evaluation loop stopped");
    }

    async fn reevaluate(self: &Arc<Self>) -> anyhow::Result<()> {
        let now = Utc::now();
        let upcoming = database::load_upcoming_races(&self.db_pool, now, 120, 30).await?;
        for race in upcoming {
            if self.races.contains_key(&race.race_id) {
                continue;
            }
            self.spawn_race_task(race);
        }
        Ok(())
    }

    fn spawn_race_task(self: &Arc<Self>, race: Race) {
        let state = RaceState {
            in_flight: Arc::new(AtomicBool::new(false)),
        };
        self.races.insert(race.race_id.clone(), state.clone());

        let scheduler = Arc::clone(self);
        let race_id = race.race_id.clone();
        let start_time = race.actual_start;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let handle = tokio::spawn(async move {
            let odds_cache = OddsCache::new(scheduler.odds_min_delta());
            if let Err(e) = odds_cache.warm_start(&scheduler.db_pool, &race_id).await {
                warn!(race_id, error = %e, "odds cache warm start failed");
            }
            let money_flow_cache = MoneyFlowCache::new();
            let mut last_status = race.status;
            info!(race_id, "scheduler: race task started");
            crate::metrics::increment_race_scheduled();

            // The first poll fires immediately on task entry (nextPollAt = now,
            // §4.H step 2); subsequent polls wait out the cadence interval.
            let mut first_tick = true;
            loop {
                if !first_tick {
                    let tts_seconds = start_time
                        .map(|start| (start - Utc::now()).num_seconds())
                        .unwrap_or(900);
                    let wait = interval(tts_seconds, &scheduler.settings.scheduler);

                    tokio::select! {
                        _ = tokio::time::sleep(wait) => {}
                        _ = shutdown_rx.changed() => {
                            if *shutdown_rx.borrow() {
                                break;
                            }
                        }
                    }
                }
                first_tick = false;

                if state.in_flight.swap(true, Ordering::SeqCst) {
                    warn!(race_id, "previous poll still in flight, skipping tick");
                    crate::metrics::increment_race_skip();
                    continue;
                }

                let result = race_processor::process_race(
                    &race_id,
                    last_status,
                    &scheduler.upstream,
                    &scheduler.transform_pool,
                    &odds_cache,
                    &money_flow_cache,
                    &scheduler.db_pool,
                )
                .await;
                state.in_flight.store(false, Ordering::SeqCst);

                match result {
                    Ok(outcome) => {
                        last_status = outcome.status;
                        if outcome.outcome == ProcessOutcome::Written {
                            info!(race_id, row_count = outcome.row_count, "poll written");
                        }
                    }
                    Err(e) => race_processor::log_failure(&race_id, &e),
                }

                if last_status.is_terminal() {
                    crate::metrics::increment_race_retired();
                    break;
                }
            }

            scheduler.races.remove(&race_id);
            info!(race_id, "scheduler: race task retired");
        });

        self.handles.lock().unwrap().insert(race.race_id, handle);
    }

    fn odds_min_delta(&self) -> rust_decimal::Decimal {
        self.settings
            .odds_detector
            .min_delta
            .parse()
            .unwrap_or(rust_decimal::Decimal::new(1, 2))
    }

    /// Signals every race task to exit at its next wake-up, then waits up to
    /// `shutdown_grace_ms` for all of them to finish.
    pub async fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
        let deadline = Duration::from_millis(self.settings.scheduler.shutdown_grace_ms);
        let handles: Vec<_> = self.handles.lock().unwrap().drain().map(|(_, h)| h).collect();
        let join_all = futures_util::future::join_all(handles);
        if tokio::time::timeout(deadline, join_all).await.is_err() {
            warn!("scheduler shutdown grace period elapsed with tasks still running");
        } else {
            info!("scheduler shutdown complete");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_matches_table_boundaries() {
        let cfg = SchedulerSettings::default();
        assert_eq!(interval(-60, &cfg), Duration::from_millis(15_000));
        assert_eq!(interval(0, &cfg), Duration::from_millis(15_000));
        assert_eq!(interval(300, &cfg), Duration::from_millis(15_000));
        assert_eq!(interval(301, &cfg), Duration::from_millis(30_000));
        assert_eq!(interval(900, &cfg), Duration::from_millis(30_000));
        assert_eq!(interval(901, &cfg), Duration::from_millis(60_000));
    }

    #[test]
    fn interval_reads_configured_thresholds_not_literals() {
        let cfg = SchedulerSettings {
            reevaluation_interval_ms: 0,
            shutdown_grace_ms: 0,
            critical_interval_ms: 1_000,
            warning_interval_ms: 2_000,
            routine_interval_ms: 3_000,
        };
        assert_eq!(interval(0, &cfg), Duration::from_millis(1_000));
        assert_eq!(interval(301, &cfg), Duration::from_millis(2_000));
        assert_eq!(interval(901, &cfg), Duration::from_millis(3_000));
    }

    #[test]
    fn race_status_is_terminal_for_final_and_abandoned() {
        assert!(RaceStatus::Final.is_terminal());
        assert!(RaceStatus::Abandoned.is_terminal());
        assert!(!RaceStatus::Open.is_terminal());
    }
}

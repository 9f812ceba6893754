use crate::database::DbPool;
use crate::errors::IngestResult;
use crate::metrics;
use crate::types::OddsType;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::Arc;

/// In-memory last-value cache for the odds-change detector (§4.D).
///
/// Keyed by `(entrant_id, odds_type)`. The cache is process-local — correctness
/// depends on a single process owning each race, which the scheduler enforces
/// structurally by never handing the same race to two timers.
#[derive(Debug, Clone)]
pub struct OddsCache {
    last_values: Arc<DashMap<(String, OddsType), Decimal>>,
    min_delta: Decimal,
}

impl OddsCache {
    pub fn new(min_delta: Decimal) -> Self {
        Self {
            last_values: Arc::new(DashMap::new()),
            min_delta,
        }
    }

    /// Warm-starts the cache for one race from the current day's odds
    /// partition, so a restarted process does not re-emit a duplicate of the
    /// most recently persisted row.
    pub async fn warm_start(&self, db_pool: &DbPool, race_id: &str) -> IngestResult<()> {
        let rows = crate::database::load_last_odds_per_entrant(db_pool, race_id).await?;
        for (entrant_id, odds_type, odds) in rows {
            self.last_values.insert((entrant_id, odds_type), odds);
        }
        Ok(())
    }

    /// Accepts the candidate iff there is no prior value, or the absolute
    /// difference from the prior accepted value is at least `min_delta`.
    pub fn accept(&self, entrant_id: &str, odds_type: OddsType, candidate: Decimal) -> bool {
        let key = (entrant_id.to_string(), odds_type);
        let previous = self.last_values.get(&key).map(|v| *v);
        let accepted = match previous {
            None => true,
            Some(prev) => (candidate - prev).abs() >= self.min_delta,
        };
        if accepted {
            self.last_values.insert(key, candidate);
            metrics::increment_cache_miss("odds");
        } else {
            metrics::increment_cache_hit("odds");
        }
        accepted
    }

    pub fn len(&self) -> usize {
        self.last_values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_values.is_empty()
    }
}

/// In-memory last-poll pool-amount cache, supplying the baseline for
/// `money_flow::incremental_delta` (§4.C). Keyed by `entrant_id`; like
/// `OddsCache`, correctness depends on one process owning a race.
#[derive(Debug, Clone)]
pub struct MoneyFlowCache {
    last_amounts: Arc<DashMap<String, (i64, i64)>>,
}

impl MoneyFlowCache {
    pub fn new() -> Self {
        Self {
            last_amounts: Arc::new(DashMap::new()),
        }
    }

    /// Returns the previous `(win_cents, place_cents)` for `entrant_id`, then
    /// records `current` as the new baseline for the next poll.
    pub fn take_previous_and_store(
        &self,
        entrant_id: &str,
        current_win_cents: i64,
        current_place_cents: i64,
    ) -> Option<(i64, i64)> {
        let previous = self.last_amounts.get(entrant_id).map(|v| *v);
        self.last_amounts
            .insert(entrant_id.to_string(), (current_win_cents, current_place_cents));
        previous
    }
}

impl Default for MoneyFlowCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn money_flow_cache_first_poll_has_no_previous() {
        let cache = MoneyFlowCache::new();
        assert_eq!(cache.take_previous_and_store("e1", 775_000, 450_000), None);
    }

    #[test]
    fn money_flow_cache_returns_prior_amounts_on_next_poll() {
        let cache = MoneyFlowCache::new();
        cache.take_previous_and_store("e1", 775_000, 450_000);
        assert_eq!(
            cache.take_previous_and_store("e1", 800_000, 450_000),
            Some((775_000, 450_000))
        );
    }

    #[test]
    fn first_observation_is_always_accepted() {
        let cache = OddsCache::new(dec!(0.01));
        assert!(cache.accept("e1", OddsType::FixedWin, dec!(3.5)));
    }

    #[test]
    fn sub_delta_change_is_rejected() {
        let cache = OddsCache::new(dec!(0.01));
        assert!(cache.accept("e1", OddsType::FixedWin, dec!(3.5)));
        assert!(!cache.accept("e1", OddsType::FixedWin, dec!(3.505)));
    }

    #[test]
    fn delta_at_or_above_threshold_is_accepted() {
        let cache = OddsCache::new(dec!(0.01));
        assert!(cache.accept("e1", OddsType::FixedWin, dec!(3.5)));
        assert!(cache.accept("e1", OddsType::FixedWin, dec!(3.6)));
    }

    #[test]
    fn odds_change_suppression_count_matches_property_5() {
        let cache = OddsCache::new(dec!(0.01));
        let series = [dec!(3.5), dec!(3.5), dec!(3.6), dec!(3.6), dec!(4.0)];
        let accepted = series
            .iter()
            .filter(|v| cache.accept("e1", OddsType::FixedWin, **v))
            .count();
        assert_eq!(accepted, 3);
    }

    #[test]
    fn distinct_odds_types_are_independent() {
        let cache = OddsCache::new(dec!(0.01));
        assert!(cache.accept("e1", OddsType::FixedWin, dec!(3.5)));
        assert!(cache.accept("e1", OddsType::PoolWin, dec!(3.5)));
    }
}

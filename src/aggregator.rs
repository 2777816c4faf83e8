// =============================================================================
// Sentiment Aggregator — one complete read / compute / write tick
// =============================================================================
//
// Pipeline per run:
//
//   1. Load the previous StateSnapshot (empty on first run).
//   2. Map observable signals (fear & greed, price action, liquidity) and
//      advance the simulated drivers (news, social, on-chain).
//   3. Delta per driver vs. the snapshot; 0 when there is no prior value.
//   4. Weighted average of the six drivers; 50 if the weights sum to zero.
//   5. Append to the bounded history log.
//   6. Persist snapshot + history.
//   7. Return the payload.
//
// No step can fail the run.  Source failures arrive as fallback readings and
// store write failures are logged; a complete payload is always produced.

use std::collections::BTreeMap;

use chrono::Utc;
use tracing::{debug, error, info};

use crate::config::{DriverWeights, ScoringConfig};
use crate::mappers::{liquidity_from_readings, price_action_sentiment};
use crate::payload::{DriverBreakdown, SentimentPayload, TotalRecord};
use crate::simulator::{DriverSimulator, NoiseSource};
use crate::sources::MarketSignals;
use crate::store::{HistoryEntry, HistoryLog, StateSnapshot, StateStore};
use crate::types::{clamp_score, DriverKind, NEUTRAL_SCORE};

/// Per-driver change vs. the previous snapshot.  Drivers without a valid
/// previous value get a delta of 0.
pub fn compute_deltas(
    current: &BTreeMap<DriverKind, u8>,
    previous: &StateSnapshot,
) -> BTreeMap<DriverKind, i32> {
    current
        .iter()
        .map(|(kind, value)| {
            let delta = previous
                .previous_value(kind.name())
                .map(|prev| (f64::from(*value) - prev).round() as i32)
                .unwrap_or(0);
            (*kind, delta)
        })
        .collect()
}

/// Weighted average of the driver values, rounded and clamped to 0–100.
/// Drivers absent from `values` contribute neither value nor weight.
pub fn weighted_total(values: &BTreeMap<DriverKind, u8>, weights: &DriverWeights) -> u8 {
    let (numerator, denominator) = DriverKind::ALL
        .iter()
        .filter_map(|kind| values.get(kind).map(|v| (f64::from(*v), weights.weight(*kind))))
        .fold((0.0, 0.0), |(num, den), (value, w)| (num + value * w, den + w));

    if denominator.is_nan() || denominator <= 0.0 {
        return NEUTRAL_SCORE;
    }
    clamp_score(numerator / denominator)
}

/// Orchestrates a run against an injected store and noise source.
pub struct SentimentAggregator<S, N> {
    store: S,
    simulator: DriverSimulator<N>,
    scoring: ScoringConfig,
}

impl<S: StateStore, N: NoiseSource> SentimentAggregator<S, N> {
    pub fn new(store: S, noise: N, scoring: ScoringConfig) -> Self {
        Self {
            store,
            simulator: DriverSimulator::new(noise),
            scoring,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Current value of every driver.
    fn driver_values(&mut self, signals: &MarketSignals, previous: &StateSnapshot) -> BTreeMap<DriverKind, u8> {
        let scoring = &self.scoring;
        let mut values = BTreeMap::new();

        values.insert(DriverKind::FearGreed, clamp_score(*signals.fear_greed.value()));
        values.insert(
            DriverKind::PriceAction,
            price_action_sentiment(*signals.price_change_24h.value(), &scoring.price_action),
        );
        values.insert(
            DriverKind::Liquidity,
            liquidity_from_readings(&signals.volume_now, &signals.volume_history, &scoring.liquidity),
        );

        for (kind, profile) in [
            (DriverKind::News, &scoring.news),
            (DriverKind::Social, &scoring.social),
            (DriverKind::OnChain, &scoring.on_chain),
        ] {
            let value = self.simulator.step(profile, previous.previous_value(kind.name()));
            values.insert(kind, value);
        }

        values
    }

    /// Execute one tick and return the assembled payload.
    pub fn run(&mut self, signals: &MarketSignals) -> SentimentPayload {
        let previous = self.store.load();
        if previous.is_empty() {
            info!("no previous driver values, deltas will be zero");
        }

        let values = self.driver_values(signals, &previous);
        let deltas = compute_deltas(&values, &previous);
        let total = weighted_total(&values, &self.scoring.weights);
        let timestamp = Utc::now().to_rfc3339();

        // History
        let mut history = HistoryLog::from_entries(self.store.load_history(), self.scoring.max_history_points);
        let before = history.len();
        let evicted = history.push(HistoryEntry::new(timestamp.clone(), total, &values));
        debug!(
            before,
            after = history.len(),
            capacity = history.capacity(),
            evicted,
            "history updated"
        );

        // Persist
        if let Err(e) = self.store.save(&StateSnapshot::new(&values, timestamp.clone())) {
            error!(error = %format!("{e:#}"), "failed to persist state snapshot");
        }
        if let Err(e) = self.store.save_history(&history.to_vec()) {
            error!(error = %format!("{e:#}"), "failed to persist history");
        }

        let value_of = |kind: DriverKind| values.get(&kind).copied().unwrap_or(NEUTRAL_SCORE);
        let drivers = DriverBreakdown::from_fn(|kind| (value_of(kind), deltas.get(&kind).copied().unwrap_or(0)));
        let fallbacks = signals.fallbacks();

        for kind in DriverKind::ALL {
            let record = drivers.get(kind);
            debug!(driver = %kind, value = record.value, delta = record.delta, "driver scored");
        }
        info!(
            total,
            fear_greed = value_of(DriverKind::FearGreed),
            news = value_of(DriverKind::News),
            social = value_of(DriverKind::Social),
            price_action = value_of(DriverKind::PriceAction),
            on_chain = value_of(DriverKind::OnChain),
            liquidity = value_of(DriverKind::Liquidity),
            fallbacks = fallbacks.len(),
            "sentiment computed"
        );

        SentimentPayload {
            timestamp,
            total: TotalRecord { value: total },
            value: total,
            fear_greed: value_of(DriverKind::FearGreed),
            news_sentiment: value_of(DriverKind::News),
            price_sentiment: value_of(DriverKind::PriceAction),
            price_change_24h: *signals.price_change_24h.value(),
            liquidity_sentiment: value_of(DriverKind::Liquidity),
            drivers,
            fallbacks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SentimentConfig;
    use crate::simulator::{RandNoise, ScriptedNoise};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use crate::sources::SourceReading;
    use crate::store::{entry, MemoryStore};
    use serde_json::{json, Value};

    fn all_at(v: u8) -> BTreeMap<DriverKind, u8> {
        DriverKind::ALL.iter().map(|k| (*k, v)).collect()
    }

    fn live_signals(fear_greed: f64, change: f64, now: f64, hist: Vec<f64>) -> MarketSignals {
        MarketSignals {
            fear_greed: SourceReading::Live(fear_greed),
            price_change_24h: SourceReading::Live(change),
            volume_now: SourceReading::Live(now),
            volume_history: SourceReading::Live(hist),
        }
    }

    fn snapshot(drivers: Value) -> StateSnapshot {
        serde_json::from_value(json!({ "drivers": drivers })).unwrap()
    }

    // -------------------------------------------------------------------------
    // Deltas and totals
    // -------------------------------------------------------------------------

    #[test]
    fn delta_against_previous_value() {
        let current = BTreeMap::from([(DriverKind::FearGreed, 55u8)]);
        let deltas = compute_deltas(&current, &snapshot(json!({ "fear_greed": 40 })));
        assert_eq!(deltas[&DriverKind::FearGreed], 15);
    }

    #[test]
    fn delta_is_zero_without_previous_value() {
        let deltas = compute_deltas(&all_at(70), &StateSnapshot::default());
        assert_eq!(deltas.len(), 6);
        assert!(deltas.values().all(|d| *d == 0));

        let corrupted = snapshot(json!({ "news": "??", "social": [1, 2] }));
        let deltas = compute_deltas(&all_at(70), &corrupted);
        assert!(deltas.values().all(|d| *d == 0));
    }

    #[test]
    fn delta_can_be_negative() {
        let current = BTreeMap::from([(DriverKind::Liquidity, 20u8)]);
        let deltas = compute_deltas(&current, &snapshot(json!({ "liquidity": 85 })));
        assert_eq!(deltas[&DriverKind::Liquidity], -65);
    }

    #[test]
    fn homogeneous_input_reproduces_itself() {
        let weights = DriverWeights::default();
        assert_eq!(weighted_total(&all_at(50), &weights), 50);
        assert_eq!(weighted_total(&all_at(0), &weights), 0);
        assert_eq!(weighted_total(&all_at(100), &weights), 100);
    }

    #[test]
    fn weighted_total_uses_weights() {
        let mut values = all_at(50);
        values.insert(DriverKind::FearGreed, 100);
        // 0.20 * 100 + 0.80 * 50 = 60
        assert_eq!(weighted_total(&values, &DriverWeights::default()), 60);
    }

    #[test]
    fn weighted_total_skips_missing_drivers() {
        let values = BTreeMap::from([(DriverKind::FearGreed, 80u8), (DriverKind::PriceAction, 40u8)]);
        // equal weights of 0.20 -> plain mean
        assert_eq!(weighted_total(&values, &DriverWeights::default()), 60);
    }

    #[test]
    fn zero_total_weight_defaults_to_neutral() {
        let weights = DriverWeights {
            fear_greed: 0.0,
            news: 0.0,
            social: 0.0,
            price_action: 0.0,
            on_chain: 0.0,
            liquidity: 0.0,
        };
        assert_eq!(weighted_total(&all_at(90), &weights), 50);
    }

    // -------------------------------------------------------------------------
    // End-to-end runs
    // -------------------------------------------------------------------------

    #[test]
    fn first_run_produces_complete_payload() {
        let mut agg = SentimentAggregator::new(MemoryStore::default(), ScriptedNoise::silent(), ScoringConfig::default());
        let payload = agg.run(&live_signals(72.0, 10.0, 250.0, vec![100.0; 7]));

        for kind in DriverKind::ALL {
            let rec = payload.drivers.get(kind);
            assert_eq!(rec.delta, 0, "{kind} delta");
            assert!(rec.value <= 100);
        }
        assert_eq!(payload.fear_greed, 72);
        assert_eq!(payload.price_sentiment, 80);
        assert_eq!(payload.liquidity_sentiment, 95);
        assert_eq!(payload.news_sentiment, 50);
        assert_eq!(payload.price_change_24h, 10.0);
        assert_eq!(payload.total.value, payload.value);
        assert!(payload.fallbacks.is_empty());

        let history = agg.store().history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].total, payload.value);
        assert_eq!(history[0].drivers["price_action"], 80);
    }

    #[test]
    fn second_run_reports_deltas_and_seeds_simulation() {
        let mut agg = SentimentAggregator::new(
            MemoryStore::default(),
            ScriptedNoise::new([6.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
            ScoringConfig::default(),
        );
        let first = agg.run(&live_signals(40.0, 0.0, 100.0, vec![100.0]));
        assert_eq!(first.drivers.news.value, 56);

        let second = agg.run(&live_signals(55.0, 0.0, 100.0, vec![100.0]));
        assert_eq!(second.drivers.fear_greed.delta, 15);
        // 56 + 0 + 0.4 * (50 - 56) = 53.6 -> 54
        assert_eq!(second.drivers.news.value, 54);
        assert_eq!(second.drivers.news.delta, -2);
        assert_eq!(agg.store().history().len(), 2);

        let snap = agg.store().snapshot();
        assert_eq!(snap.previous_value("fear_greed"), Some(55.0));
        assert!(snap.timestamp.is_some());
    }

    #[test]
    fn snapshot_holds_values_only() {
        let mut agg = SentimentAggregator::new(MemoryStore::default(), ScriptedNoise::silent(), ScoringConfig::default());
        agg.run(&live_signals(50.0, 0.0, 1.0, vec![1.0]));
        let snap = agg.store().snapshot();
        let mut keys: Vec<&str> = snap.drivers.keys().map(String::as_str).collect();
        keys.sort();
        assert_eq!(keys, vec!["fear_greed", "liquidity", "news", "on_chain", "price_action", "social"]);
    }

    #[test]
    fn history_is_bounded_to_capacity() {
        let seeded: Vec<HistoryEntry> = (0..200).map(entry).collect();
        let store = MemoryStore::seeded(StateSnapshot::default(), seeded.clone());
        let mut agg = SentimentAggregator::new(store, ScriptedNoise::silent(), ScoringConfig::default());
        agg.run(&MarketSignals::neutral("offline"));

        let history = agg.store().history();
        assert_eq!(history.len(), 200);
        assert_eq!(history[0], seeded[1]);
    }

    #[test]
    fn unbounded_history_setting_keeps_every_point() {
        let cfg: SentimentConfig =
            serde_json::from_str(r#"{ "scoring": { "max_history_points": 18446744073709551615 } }"#).unwrap();
        assert_eq!(cfg.scoring.max_history_points, usize::MAX);

        let seeded: Vec<HistoryEntry> = (0..250).map(entry).collect();
        let store = MemoryStore::seeded(StateSnapshot::default(), seeded);
        let mut agg = SentimentAggregator::new(store, ScriptedNoise::silent(), cfg.scoring);
        agg.run(&MarketSignals::neutral("offline"));
        assert_eq!(agg.store().history().len(), 251);
    }

    #[test]
    fn extreme_volatility_setting_stays_in_range() {
        let cfg: SentimentConfig =
            serde_json::from_str(r#"{ "scoring": { "news": { "volatility": 1e308 } } }"#).unwrap();
        let noise = RandNoise::new(StdRng::seed_from_u64(3));
        let mut agg = SentimentAggregator::new(MemoryStore::default(), noise, cfg.scoring);
        for _ in 0..20 {
            let payload = agg.run(&live_signals(50.0, 0.0, 1.0, vec![1.0]));
            assert!(payload.news_sentiment <= 100);
            assert!(payload.value <= 100);
        }
    }

    #[test]
    fn all_sources_down_still_yields_neutral_payload() {
        let mut agg = SentimentAggregator::new(MemoryStore::default(), ScriptedNoise::silent(), ScoringConfig::default());
        let payload = agg.run(&MarketSignals::neutral("network unreachable"));
        assert_eq!(payload.value, 50);
        assert_eq!(payload.fear_greed, 50);
        assert_eq!(payload.price_sentiment, 50);
        assert_eq!(payload.liquidity_sentiment, 50);
        assert_eq!(payload.fallbacks.len(), 4);
    }

    #[test]
    fn write_failures_do_not_abort_run() {
        let store = MemoryStore::with_failing_writes(StateSnapshot::default(), Vec::new());
        let mut agg = SentimentAggregator::new(store, ScriptedNoise::silent(), ScoringConfig::default());
        let payload = agg.run(&live_signals(60.0, 2.0, 1.0, vec![1.0]));
        assert_eq!(payload.fear_greed, 60);
        assert!(agg.store().history().is_empty());
    }

    #[test]
    fn values_stay_in_range_for_extreme_inputs() {
        let mut agg = SentimentAggregator::new(
            MemoryStore::seeded(snapshot(json!({ "news": 1000, "social": -400, "on_chain": 100 })), Vec::new()),
            ScriptedNoise::new([8.0, -8.0, 5.0]),
            ScoringConfig::default(),
        );
        let payload = agg.run(&live_signals(250.0, -99.0, 1e15, vec![1.0, 2.0]));
        for kind in DriverKind::ALL {
            assert!(payload.drivers.get(kind).value <= 100);
        }
        assert!(payload.value <= 100);
        assert_eq!(payload.fear_greed, 100);
        assert_eq!(payload.price_sentiment, 20);
    }
}

// =============================================================================
// Sentiment Engine — Main Entry Point
// =============================================================================
//
// One invocation produces one snapshot: fetch market signals, advance the
// simulated drivers, aggregate, persist state + history, and emit the
// payload for the dashboard.  Set SENTIMENT_DRY_RUN to compute against the
// current state without writing anything.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod aggregator;
mod config;
mod mappers;
mod payload;
mod simulator;
mod sources;
mod store;
mod types;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::aggregator::SentimentAggregator;
use crate::config::SentimentConfig;
use crate::payload::SentimentPayload;
use crate::simulator::RandNoise;
use crate::sources::{MarketSignals, MarketSources};
use crate::store::{write_json_atomic, JsonFileStore, MemoryStore, StateStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    // Logs go to stderr so stdout carries only the payload.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path =
        std::env::var("SENTIMENT_CONFIG").unwrap_or_else(|_| "sentiment_config.json".into());
    let mut config = SentimentConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        SentimentConfig::default()
    });

    let dry_run = std::env::var("SENTIMENT_DRY_RUN").is_ok_and(|v| !v.is_empty() && v != "0");

    // First run: leave a fully populated config behind for tuning.
    if !dry_run && !std::path::Path::new(&config_path).exists() {
        if let Err(e) = config.save(&config_path) {
            warn!(error = %e, "Failed to write default config");
        }
    }
    config.apply_env_overrides();

    let weight_sum = config.scoring.weights.sum();
    if (weight_sum - 1.0).abs() > 1e-6 {
        warn!(weight_sum, "Driver weights do not sum to 1, total is normalised by their sum");
    }

    info!(
        coin = %config.coin_id,
        state_file = %config.state_file,
        history_file = %config.history_file,
        weight_sum,
        dry_run,
        "Sentiment run starting"
    );

    // ── 2. Collect market signals ────────────────────────────────────────
    let signals = match MarketSources::from_config(&config) {
        Ok(sources) => MarketSignals::collect(&sources).await,
        Err(e) => {
            warn!(error = %e, "Signal sources unavailable, using neutral fallbacks");
            MarketSignals::neutral(&format!("{e:#}"))
        }
    };
    let fallback_count = [
        signals.fear_greed.is_fallback(),
        signals.price_change_24h.is_fallback(),
        signals.volume_now.is_fallback(),
        signals.volume_history.is_fallback(),
    ]
    .iter()
    .filter(|f| **f)
    .count();
    if fallback_count > 0 {
        warn!(fallback_count, "Some signals fell back to neutral values");
    }

    // ── 3. Aggregate ─────────────────────────────────────────────────────
    let file_store = JsonFileStore::new(&config.state_file, &config.history_file);
    let noise = RandNoise::new(rand::thread_rng());

    let payload = if dry_run {
        let store = MemoryStore::seeded(file_store.load(), file_store.load_history());
        let mut engine = SentimentAggregator::new(store, noise, config.scoring.clone());
        let payload = engine.run(&signals);
        info!(history_points = engine.store().history().len(), "Dry run, nothing persisted");
        payload
    } else {
        let mut engine = SentimentAggregator::new(file_store, noise, config.scoring.clone());
        engine.run(&signals)
    };

    // ── 4. Emit ──────────────────────────────────────────────────────────
    if !dry_run {
        write_payload(&config.output_file, &payload)?;
    }

    let rendered =
        serde_json::to_string_pretty(&payload).context("failed to serialise sentiment payload")?;
    println!("{rendered}");

    info!(total = payload.value, "Sentiment updated");
    Ok(())
}

fn write_payload(path: &str, payload: &SentimentPayload) -> anyhow::Result<()> {
    write_json_atomic(std::path::Path::new(path), payload)
        .with_context(|| format!("failed to write sentiment payload to {path}"))?;
    info!(path, "Payload written");
    Ok(())
}

// =============================================================================
// Sentiment Configuration — file locations, data sources, scoring calibration
// =============================================================================
//
// Every tunable lives here.  All fields carry `#[serde(default)]` so that a
// partial (or empty) JSON file only overrides what it mentions, and adding
// new fields never breaks loading an older config file.
//
// The weights and mapping constants are calibration choices, not invariants;
// they are exposed so a deployment can retune them without a rebuild.
//
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::info;

use crate::mappers::{LiquidityParams, PriceActionParams};
use crate::simulator::{ProfileOverrides, SimulationProfile};
use crate::store::MAX_HISTORY_POINTS;
use crate::types::DriverKind;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_state_file() -> String {
    "sentiment_state.json".to_string()
}

fn default_output_file() -> String {
    "sentiment.json".to_string()
}

fn default_history_file() -> String {
    "history.json".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_coin_id() -> String {
    "bitcoin".to_string()
}

fn default_vs_currency() -> String {
    "usd".to_string()
}

fn default_volume_history_days() -> u32 {
    7
}

fn default_fear_greed_url() -> String {
    "https://api.alternative.me/fng/?limit=1".to_string()
}

fn default_coingecko_base_url() -> String {
    "https://api.coingecko.com/api/v3".to_string()
}

fn default_max_history_points() -> usize {
    MAX_HISTORY_POINTS
}

fn default_news_profile() -> SimulationProfile {
    SimulationProfile::news()
}

fn default_social_profile() -> SimulationProfile {
    SimulationProfile::social()
}

fn default_on_chain_profile() -> SimulationProfile {
    SimulationProfile::on_chain()
}

// A partial profile block only overrides the fields it names; the rest keep
// that driver's preset.

fn news_profile<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SimulationProfile, D::Error> {
    ProfileOverrides::deserialize(deserializer).map(|o| o.apply_to(SimulationProfile::news()))
}

fn social_profile<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SimulationProfile, D::Error> {
    ProfileOverrides::deserialize(deserializer).map(|o| o.apply_to(SimulationProfile::social()))
}

fn on_chain_profile<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SimulationProfile, D::Error> {
    ProfileOverrides::deserialize(deserializer).map(|o| o.apply_to(SimulationProfile::on_chain()))
}

fn weight_20() -> f64 {
    0.20
}

fn weight_15() -> f64 {
    0.15
}

// =============================================================================
// DriverWeights
// =============================================================================

/// Contribution of each driver to the total.  Defaults sum to 1.0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverWeights {
    #[serde(default = "weight_20")]
    pub fear_greed: f64,
    #[serde(default = "weight_15")]
    pub news: f64,
    #[serde(default = "weight_15")]
    pub social: f64,
    #[serde(default = "weight_20")]
    pub price_action: f64,
    #[serde(default = "weight_15")]
    pub on_chain: f64,
    #[serde(default = "weight_15")]
    pub liquidity: f64,
}

impl DriverWeights {
    pub fn weight(&self, kind: DriverKind) -> f64 {
        match kind {
            DriverKind::FearGreed => self.fear_greed,
            DriverKind::News => self.news,
            DriverKind::Social => self.social,
            DriverKind::PriceAction => self.price_action,
            DriverKind::OnChain => self.on_chain,
            DriverKind::Liquidity => self.liquidity,
        }
    }

    pub fn sum(&self) -> f64 {
        DriverKind::ALL.iter().map(|k| self.weight(*k)).sum()
    }
}

impl Default for DriverWeights {
    fn default() -> Self {
        Self {
            fear_greed: weight_20(),
            news: weight_15(),
            social: weight_15(),
            price_action: weight_20(),
            on_chain: weight_15(),
            liquidity: weight_15(),
        }
    }
}

// =============================================================================
// ScoringConfig
// =============================================================================

/// Everything the aggregator needs to turn signals into a payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default)]
    pub weights: DriverWeights,

    #[serde(default = "default_news_profile", deserialize_with = "news_profile")]
    pub news: SimulationProfile,

    #[serde(default = "default_social_profile", deserialize_with = "social_profile")]
    pub social: SimulationProfile,

    #[serde(default = "default_on_chain_profile", deserialize_with = "on_chain_profile")]
    pub on_chain: SimulationProfile,

    #[serde(default)]
    pub price_action: PriceActionParams,

    #[serde(default)]
    pub liquidity: LiquidityParams,

    /// Number of history points retained (oldest evicted first).
    #[serde(default = "default_max_history_points")]
    pub max_history_points: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: DriverWeights::default(),
            news: default_news_profile(),
            social: default_social_profile(),
            on_chain: default_on_chain_profile(),
            price_action: PriceActionParams::default(),
            liquidity: LiquidityParams::default(),
            max_history_points: default_max_history_points(),
        }
    }
}

// =============================================================================
// SentimentConfig
// =============================================================================

/// Top-level configuration for one sentiment run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentConfig {
    // --- Persistence --------------------------------------------------------

    /// Previous driver values, used for deltas and to seed the simulation.
    #[serde(default = "default_state_file")]
    pub state_file: String,

    /// Payload consumed by the dashboard.
    #[serde(default = "default_output_file")]
    pub output_file: String,

    /// Bounded time series for sparklines.
    #[serde(default = "default_history_file")]
    pub history_file: String,

    // --- Data sources -------------------------------------------------------

    /// Per-request timeout for every external call.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// CoinGecko coin id the price/volume signals track.
    #[serde(default = "default_coin_id")]
    pub coin_id: String,

    #[serde(default = "default_vs_currency")]
    pub vs_currency: String,

    /// Look-back window for the average volume.
    #[serde(default = "default_volume_history_days")]
    pub volume_history_days: u32,

    #[serde(default = "default_fear_greed_url")]
    pub fear_greed_url: String,

    #[serde(default = "default_coingecko_base_url")]
    pub coingecko_base_url: String,

    // --- Scoring ------------------------------------------------------------

    #[serde(default)]
    pub scoring: ScoringConfig,
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
            output_file: default_output_file(),
            history_file: default_history_file(),
            request_timeout_secs: default_request_timeout_secs(),
            coin_id: default_coin_id(),
            vs_currency: default_vs_currency(),
            volume_history_days: default_volume_history_days(),
            fear_greed_url: default_fear_greed_url(),
            coingecko_base_url: default_coingecko_base_url(),
            scoring: ScoringConfig::default(),
        }
    }
}

impl SentimentConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// A missing file is an error so the caller can fall back to defaults
    /// with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read sentiment config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse sentiment config from {}", path.display()))?;

        info!(
            path = %path.display(),
            coin = %config.coin_id,
            max_history_points = config.scoring.max_history_points,
            "sentiment config loaded"
        );

        Ok(config)
    }

    /// Persist the configuration to `path` using an atomic write.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        crate::store::write_json_atomic(path, self)
            .with_context(|| format!("failed to save sentiment config to {}", path.display()))?;
        info!(path = %path.display(), "sentiment config saved (atomic)");
        Ok(())
    }

    /// Apply `SENTIMENT_*` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(coin) = std::env::var("SENTIMENT_COIN") {
            let coin = coin.trim().to_lowercase();
            if !coin.is_empty() {
                self.coin_id = coin;
            }
        }
        if let Ok(dir) = std::env::var("SENTIMENT_DATA_DIR") {
            let dir = Path::new(dir.trim());
            for file in [&mut self.state_file, &mut self.output_file, &mut self.history_file] {
                *file = dir.join(file.as_str()).display().to_string();
            }
        }
    }
}

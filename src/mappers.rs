// =============================================================================
// Driver Mappers — raw market scalars to 0–100 sentiment scores
// =============================================================================
//
// Pure, total functions.  Every mapper clamps its input into a calibrated
// range, applies an affine transform centred on 50, and clamps the result:
//
//   price action:  50 + clamp(change_24h, ±10) * 3        (±10% -> 80 / 20)
//   liquidity:     50 + (clamp(now / avg, 0.25..2.5) - 1) * 30

use serde::{Deserialize, Serialize};

use crate::sources::SourceReading;
use crate::types::{clamp_score, NEUTRAL_SCORE};

fn default_saturation_pct() -> f64 {
    10.0
}

fn default_price_slope() -> f64 {
    3.0
}

fn default_min_ratio() -> f64 {
    0.25
}

fn default_max_ratio() -> f64 {
    2.5
}

fn default_liquidity_slope() -> f64 {
    30.0
}

/// Calibration for the price-action mapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceActionParams {
    /// Absolute 24h change (percent) beyond which the score saturates.
    #[serde(default = "default_saturation_pct")]
    pub saturation_pct: f64,

    /// Score points per percent of price change.
    #[serde(default = "default_price_slope")]
    pub slope: f64,
}

impl Default for PriceActionParams {
    fn default() -> Self {
        Self {
            saturation_pct: default_saturation_pct(),
            slope: default_price_slope(),
        }
    }
}

/// Calibration for the liquidity mapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityParams {
    #[serde(default = "default_min_ratio")]
    pub min_ratio: f64,

    #[serde(default = "default_max_ratio")]
    pub max_ratio: f64,

    /// Score points per unit of volume ratio above/below 1.0.
    #[serde(default = "default_liquidity_slope")]
    pub slope: f64,
}

impl Default for LiquidityParams {
    fn default() -> Self {
        Self {
            min_ratio: default_min_ratio(),
            max_ratio: default_max_ratio(),
            slope: default_liquidity_slope(),
        }
    }
}

/// Map a 24h percentage price change to a 0–100 score.
pub fn price_action_sentiment(change_24h: f64, params: &PriceActionParams) -> u8 {
    let change = if change_24h.is_finite() { change_24h } else { 0.0 };
    let limit = params.saturation_pct.abs();
    let clamped = change.clamp(-limit, limit);
    clamp_score(f64::from(NEUTRAL_SCORE) + clamped * params.slope)
}

/// Map current volume against the historical mean to a 0–100 score.
pub fn liquidity_sentiment(volume_now: f64, historical: &[f64], params: &LiquidityParams) -> u8 {
    if historical.is_empty() || !volume_now.is_finite() {
        return NEUTRAL_SCORE;
    }

    let mean = historical.iter().sum::<f64>() / historical.len() as f64;
    if !mean.is_finite() || mean <= 0.0 {
        return NEUTRAL_SCORE;
    }

    // A misconfigured range (min > max) must not panic in `clamp`.
    let lo = params.min_ratio.min(params.max_ratio);
    let hi = params.min_ratio.max(params.max_ratio);
    let ratio = (volume_now / mean).clamp(lo, hi);

    clamp_score(f64::from(NEUTRAL_SCORE) + (ratio - 1.0) * params.slope)
}

/// Liquidity score from the two volume readings.  Neutral as soon as either
/// reading had to fall back.
pub fn liquidity_from_readings(
    volume_now: &SourceReading<f64>,
    history: &SourceReading<Vec<f64>>,
    params: &LiquidityParams,
) -> u8 {
    match (volume_now, history) {
        (SourceReading::Live(now), SourceReading::Live(hist)) => {
            liquidity_sentiment(*now, hist, params)
        }
        _ => NEUTRAL_SCORE,
    }
}

// =============================================================================
// Shared types used across the sentiment engine
// =============================================================================

use serde::{Deserialize, Serialize};

/// Neutral score used whenever a driver has nothing better to report.
pub const NEUTRAL_SCORE: u8 = 50;

/// The six drivers that make up the composite sentiment score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverKind {
    FearGreed,
    News,
    Social,
    PriceAction,
    OnChain,
    Liquidity,
}

impl DriverKind {
    /// All drivers in payload order.
    pub const ALL: [DriverKind; 6] = [
        Self::FearGreed,
        Self::News,
        Self::Social,
        Self::PriceAction,
        Self::OnChain,
        Self::Liquidity,
    ];

    /// Stable key used in persisted state and history.
    pub fn name(self) -> &'static str {
        match self {
            Self::FearGreed => "fear_greed",
            Self::News => "news",
            Self::Social => "social",
            Self::PriceAction => "price_action",
            Self::OnChain => "on_chain",
            Self::Liquidity => "liquidity",
        }
    }

    /// Human-readable label shown on the dashboard.
    pub fn label(self) -> &'static str {
        match self {
            Self::FearGreed => "Fear & Greed",
            Self::News => "News Sentiment",
            Self::Social => "Social Buzz",
            Self::PriceAction => "Price Action",
            Self::OnChain => "On-chain Activity",
            Self::Liquidity => "Liquidity",
        }
    }
}

impl std::fmt::Display for DriverKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-driver record as it appears in the output payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverRecord {
    pub label: String,
    pub value: u8,
    pub delta: i32,
}

impl DriverRecord {
    pub fn new(kind: DriverKind, value: u8, delta: i32) -> Self {
        Self {
            label: kind.label().to_string(),
            value,
            delta,
        }
    }
}

/// Round to the nearest integer and clamp into the 0–100 score range.
///
/// Non-finite input maps to [`NEUTRAL_SCORE`].
pub fn clamp_score(value: f64) -> u8 {
    if !value.is_finite() {
        return NEUTRAL_SCORE;
    }
    value.round().clamp(0.0, 100.0) as u8
}

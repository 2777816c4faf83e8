// =============================================================================
// Sentiment Payload — the structured record handed to the dashboard
// =============================================================================
//
// Field order is part of the output contract: structured `total` / `drivers`
// first, then the flat convenience fields older dashboard builds read.

use serde::{Deserialize, Serialize};

use crate::types::{DriverKind, DriverRecord};

/// A signal source that fell back to its neutral value during the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackNotice {
    pub source: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalRecord {
    pub value: u8,
}

/// Per-driver records in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverBreakdown {
    pub fear_greed: DriverRecord,
    pub news: DriverRecord,
    pub social: DriverRecord,
    pub price_action: DriverRecord,
    pub on_chain: DriverRecord,
    pub liquidity: DriverRecord,
}

impl DriverBreakdown {
    /// Build the breakdown from a lookup returning `(value, delta)`.
    pub fn from_fn(mut record: impl FnMut(DriverKind) -> (u8, i32)) -> Self {
        let mut make = |kind| {
            let (value, delta) = record(kind);
            DriverRecord::new(kind, value, delta)
        };
        Self {
            fear_greed: make(DriverKind::FearGreed),
            news: make(DriverKind::News),
            social: make(DriverKind::Social),
            price_action: make(DriverKind::PriceAction),
            on_chain: make(DriverKind::OnChain),
            liquidity: make(DriverKind::Liquidity),
        }
    }

    pub fn get(&self, kind: DriverKind) -> &DriverRecord {
        match kind {
            DriverKind::FearGreed => &self.fear_greed,
            DriverKind::News => &self.news,
            DriverKind::Social => &self.social,
            DriverKind::PriceAction => &self.price_action,
            DriverKind::OnChain => &self.on_chain,
            DriverKind::Liquidity => &self.liquidity,
        }
    }
}

/// Complete output of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentPayload {
    /// RFC 3339 time the payload was assembled.
    pub timestamp: String,
    pub total: TotalRecord,
    pub drivers: DriverBreakdown,

    // --- Convenience fields -------------------------------------------------
    pub value: u8,
    pub fear_greed: u8,
    pub news_sentiment: u8,
    pub price_sentiment: u8,
    /// Raw 24h price change in percent, before mapping.
    pub price_change_24h: f64,
    pub liquidity_sentiment: u8,

    /// Sources that had to fall back this run.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallbacks: Vec<FallbackNotice>,
}

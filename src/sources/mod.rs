// =============================================================================
// Signal Sources Module
// =============================================================================
//
// Pluggable providers for the observable sentiment drivers:
//
//   1. Fear & Greed index  — externally published 0–100 index  (fallback 50)
//   2. 24h price change    — percent, may be negative          (fallback 0.0)
//   3. Current volume      — 24h traded volume                 (fallback 0.0)
//   4. Volume history      — daily volumes for the last week   (fallback [])
//
// A source never hands an error to its caller.  Failures are folded into a
// `SourceReading::Fallback` that carries the neutral value together with the
// reason, so the aggregator always has a number and the payload can still
// report what went wrong.  There are no retries.

pub mod coingecko;
pub mod fear_greed;

pub use coingecko::{CoinGeckoClient, PriceChange24h, VolumeHistory, VolumeNow};
pub use fear_greed::FearGreedIndex;

use std::fmt::Debug;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::SentimentConfig;
use crate::payload::FallbackNotice;

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Outcome of a single source call.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceReading<T> {
    /// The provider answered with a usable value.
    Live(T),
    /// The provider failed; `value` is the documented neutral fallback.
    Fallback { value: T, reason: String },
}

impl<T> SourceReading<T> {
    pub fn value(&self) -> &T {
        match self {
            Self::Live(v) => v,
            Self::Fallback { value, .. } => value,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Live(_) => None,
            Self::Fallback { reason, .. } => Some(reason),
        }
    }
}

// ---------------------------------------------------------------------------
// Source trait
// ---------------------------------------------------------------------------

/// A single external market signal.
#[async_trait]
pub trait SignalSource: Send + Sync {
    type Output: Debug + Send + 'static;

    /// Short identifier used in logs and fallback notices.
    fn name(&self) -> &'static str;

    /// Neutral value substituted when the provider cannot be reached.
    fn fallback(&self) -> Self::Output;

    /// Perform the underlying call.  Errors are expected here.
    async fn fetch_raw(&self) -> Result<Self::Output>;

    /// Perform the call and fold any failure into a fallback reading.
    async fn fetch(&self) -> SourceReading<Self::Output> {
        match self.fetch_raw().await {
            Ok(value) => {
                debug!(source = self.name(), ?value, "signal source fetched");
                SourceReading::Live(value)
            }
            Err(e) => {
                warn!(source = self.name(), error = %e, "signal source unavailable, using fallback");
                SourceReading::Fallback {
                    value: self.fallback(),
                    reason: format!("{e:#}"),
                }
            }
        }
    }
}

pub type ScalarSource = Box<dyn SignalSource<Output = f64>>;
pub type SeriesSource = Box<dyn SignalSource<Output = Vec<f64>>>;

/// Build the shared HTTP client with the per-call timeout.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("sentiment-engine/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build reqwest client for signal sources")
}

/// Fetch a URL and decode the body as JSON, failing on non-2xx statuses.
pub(crate) async fn get_json(client: &reqwest::Client, url: &str) -> Result<serde_json::Value> {
    let resp = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("GET {url}"))?;

    let status = resp.status();
    if !status.is_success() {
        anyhow::bail!("GET {url} returned {status}");
    }

    resp.json()
        .await
        .with_context(|| format!("failed to parse response body from {url}"))
}

// ---------------------------------------------------------------------------
// Source set and collected readings
// ---------------------------------------------------------------------------

/// The four providers the aggregator consumes.
pub struct MarketSources {
    pub fear_greed: ScalarSource,
    pub price_change: ScalarSource,
    pub volume_now: ScalarSource,
    pub volume_history: SeriesSource,
}

impl MarketSources {
    /// Wire up the HTTP-backed providers described by `config`.
    pub fn from_config(config: &SentimentConfig) -> Result<Self> {
        let client = build_http_client(Duration::from_secs(config.request_timeout_secs))?;
        let gecko = CoinGeckoClient::new(client.clone(), config);

        Ok(Self {
            fear_greed: Box::new(FearGreedIndex::new(client, &config.fear_greed_url)),
            price_change: Box::new(PriceChange24h::new(gecko.clone())),
            volume_now: Box::new(VolumeNow::new(gecko.clone())),
            volume_history: Box::new(VolumeHistory::new(gecko)),
        })
    }
}

/// One reading per provider, gathered at the start of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSignals {
    pub fear_greed: SourceReading<f64>,
    pub price_change_24h: SourceReading<f64>,
    pub volume_now: SourceReading<f64>,
    pub volume_history: SourceReading<Vec<f64>>,
}

impl MarketSignals {
    /// Query every provider concurrently.  Never fails.
    pub async fn collect(sources: &MarketSources) -> Self {
        let (fear_greed, price_change_24h, volume_now, volume_history) = tokio::join!(
            sources.fear_greed.fetch(),
            sources.price_change.fetch(),
            sources.volume_now.fetch(),
            sources.volume_history.fetch(),
        );

        Self {
            fear_greed,
            price_change_24h,
            volume_now,
            volume_history,
        }
    }

    /// Every provider failed or was never configured.
    pub fn neutral(reason: &str) -> Self {
        let fallback = |value| SourceReading::Fallback {
            value,
            reason: reason.to_string(),
        };
        Self {
            fear_greed: fallback(50.0),
            price_change_24h: fallback(0.0),
            volume_now: fallback(0.0),
            volume_history: SourceReading::Fallback {
                value: Vec::new(),
                reason: reason.to_string(),
            },
        }
    }

    /// Notices for every reading that fell back.
    pub fn fallbacks(&self) -> Vec<FallbackNotice> {
        [
            ("fear_greed", self.fear_greed.reason()),
            ("price_change_24h", self.price_change_24h.reason()),
            ("volume_now", self.volume_now.reason()),
            ("volume_history", self.volume_history.reason()),
        ]
        .into_iter()
        .filter_map(|(source, reason)| {
            reason.map(|r| FallbackNotice {
                source: source.to_string(),
                reason: r.to_string(),
            })
        })
        .collect()
    }
}

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

/// Source that always answers with the same value, or always fails.
#[cfg(test)]
pub struct FixedSource<T> {
    pub value: Option<T>,
    pub fallback: T,
}

#[cfg(test)]
#[async_trait]
impl<T> SignalSource for FixedSource<T>
where
    T: Clone + Debug + Send + Sync + 'static,
{
    type Output = T;

    fn name(&self) -> &'static str {
        "fixed"
    }

    fn fallback(&self) -> T {
        self.fallback.clone()
    }

    async fn fetch_raw(&self) -> Result<T> {
        self.value.clone().context("fixed source configured to fail")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live<T: Clone + Debug + Send + Sync + 'static>(value: T, fallback: T) -> Box<FixedSource<T>> {
        Box::new(FixedSource {
            value: Some(value),
            fallback,
        })
    }

    fn failing<T: Clone + Debug + Send + Sync + 'static>(fallback: T) -> Box<FixedSource<T>> {
        Box::new(FixedSource {
            value: None,
            fallback,
        })
    }

    #[tokio::test]
    async fn failing_source_yields_fallback_with_reason() {
        let src = FixedSource::<f64> {
            value: None,
            fallback: 50.0,
        };
        let reading = src.fetch().await;
        assert!(reading.is_fallback());
        assert_eq!(*reading.value(), 50.0);
        assert!(reading.reason().unwrap().contains("configured to fail"));
    }

    #[tokio::test]
    async fn live_source_yields_value() {
        let src = FixedSource::<f64> {
            value: Some(-3.2),
            fallback: 0.0,
        };
        let reading = src.fetch().await;
        assert_eq!(reading, SourceReading::Live(-3.2));
        assert!(reading.reason().is_none());
    }

    #[tokio::test]
    async fn collect_reports_only_failed_sources() {
        let sources = MarketSources {
            fear_greed: live(61.0_f64, 50.0),
            price_change: failing(0.0_f64),
            volume_now: live(1_000.0_f64, 0.0),
            volume_history: failing(Vec::<f64>::new()),
        };
        let signals = MarketSignals::collect(&sources).await;

        assert_eq!(*signals.fear_greed.value(), 61.0);
        assert_eq!(*signals.price_change_24h.value(), 0.0);
        assert!(signals.volume_history.value().is_empty());

        let notices = signals.fallbacks();
        let names: Vec<&str> = notices.iter().map(|n| n.source.as_str()).collect();
        assert_eq!(names, vec!["price_change_24h", "volume_history"]);
    }

    #[test]
    fn neutral_signals_fall_back_everywhere() {
        let signals = MarketSignals::neutral("offline");
        assert_eq!(signals.fallbacks().len(), 4);
        assert_eq!(*signals.fear_greed.value(), 50.0);
    }
}

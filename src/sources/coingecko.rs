// =============================================================================
// CoinGecko Market Data — price change, current volume, volume history
// =============================================================================
//
// Three independent sources share one API handle.  Each performs its own
// request so that a failure in one never affects the others:
//
//   PriceChange24h  /coins/{id}               market_data.price_change_percentage_24h
//   VolumeNow       /coins/{id}               market_data.total_volume.{vs}
//   VolumeHistory   /coins/{id}/market_chart  total_volumes[*][1]

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::{get_json, SignalSource};
use crate::config::SentimentConfig;

/// Thin wrapper holding the HTTP client and the coin being tracked.
#[derive(Clone)]
pub struct CoinGeckoClient {
    client: reqwest::Client,
    base_url: String,
    coin_id: String,
    vs_currency: String,
    history_days: u32,
}

impl CoinGeckoClient {
    pub fn new(client: reqwest::Client, config: &SentimentConfig) -> Self {
        Self {
            client,
            base_url: config.coingecko_base_url.trim_end_matches('/').to_string(),
            coin_id: config.coin_id.clone(),
            vs_currency: config.vs_currency.clone(),
            history_days: config.volume_history_days,
        }
    }

    fn coin_url(&self) -> String {
        format!(
            "{}/coins/{}?localization=false&tickers=false&market_data=true\
             &community_data=false&developer_data=false&sparkline=false",
            self.base_url, self.coin_id
        )
    }

    fn market_chart_url(&self) -> String {
        format!(
            "{}/coins/{}/market_chart?vs_currency={}&days={}&interval=daily",
            self.base_url, self.coin_id, self.vs_currency, self.history_days
        )
    }

    async fn market_data(&self) -> Result<Value> {
        get_json(&self.client, &self.coin_url()).await
    }

    async fn market_chart(&self) -> Result<Value> {
        get_json(&self.client, &self.market_chart_url()).await
    }
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

pub fn parse_price_change(body: &Value) -> Result<f64> {
    let change = body
        .pointer("/market_data/price_change_percentage_24h")
        .and_then(Value::as_f64)
        .context("response missing market_data.price_change_percentage_24h")?;
    if !change.is_finite() {
        anyhow::bail!("price change is not finite");
    }
    Ok(change)
}

pub fn parse_total_volume(body: &Value, vs_currency: &str) -> Result<f64> {
    body.get("market_data")
        .and_then(|m| m.get("total_volume"))
        .and_then(|v| v.get(vs_currency))
        .and_then(Value::as_f64)
        .with_context(|| format!("response missing market_data.total_volume.{vs_currency}"))
}

/// Collect the volume column of `total_volumes`.  Points with a missing or
/// non-numeric volume are skipped.
pub fn parse_volume_history(body: &Value) -> Result<Vec<f64>> {
    let points = body
        .get("total_volumes")
        .and_then(Value::as_array)
        .context("response missing total_volumes array")?;

    Ok(points
        .iter()
        .filter_map(|p| p.as_array().and_then(|pair| pair.get(1)).and_then(Value::as_f64))
        .filter(|v| v.is_finite())
        .collect())
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// 24-hour percentage price change.
pub struct PriceChange24h {
    api: CoinGeckoClient,
}

impl PriceChange24h {
    pub fn new(api: CoinGeckoClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl SignalSource for PriceChange24h {
    type Output = f64;

    fn name(&self) -> &'static str {
        "price_change_24h"
    }

    fn fallback(&self) -> f64 {
        0.0
    }

    async fn fetch_raw(&self) -> Result<f64> {
        let body = self.api.market_data().await?;
        parse_price_change(&body)
    }
}

/// Current 24-hour traded volume in the configured quote currency.
pub struct VolumeNow {
    api: CoinGeckoClient,
}

impl VolumeNow {
    pub fn new(api: CoinGeckoClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl SignalSource for VolumeNow {
    type Output = f64;

    fn name(&self) -> &'static str {
        "volume_now"
    }

    fn fallback(&self) -> f64 {
        0.0
    }

    async fn fetch_raw(&self) -> Result<f64> {
        let body = self.api.market_data().await?;
        parse_total_volume(&body, &self.api.vs_currency)
    }
}

/// Daily traded volumes over the look-back window.
pub struct VolumeHistory {
    api: CoinGeckoClient,
}

impl VolumeHistory {
    pub fn new(api: CoinGeckoClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl SignalSource for VolumeHistory {
    type Output = Vec<f64>;

    fn name(&self) -> &'static str {
        "volume_history"
    }

    fn fallback(&self) -> Vec<f64> {
        Vec::new()
    }

    async fn fetch_raw(&self) -> Result<Vec<f64>> {
        let body = self.api.market_chart().await?;
        let volumes = parse_volume_history(&body)?;
        debug!(samples = volumes.len(), days = self.api.history_days, "volume history fetched");
        Ok(volumes)
    }
}

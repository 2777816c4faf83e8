// =============================================================================
// Fear & Greed Index — externally published crypto sentiment (0–100)
// =============================================================================

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;

use super::{get_json, SignalSource};

/// Fetches the latest Crypto Fear & Greed index value.
pub struct FearGreedIndex {
    client: reqwest::Client,
    url: String,
}

impl FearGreedIndex {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl SignalSource for FearGreedIndex {
    type Output = f64;

    fn name(&self) -> &'static str {
        "fear_greed"
    }

    fn fallback(&self) -> f64 {
        50.0
    }

    async fn fetch_raw(&self) -> Result<f64> {
        let body = get_json(&self.client, &self.url).await?;
        parse_index(&body)
    }
}

/// Extract `data[0].value` from an index response.  The provider sends the
/// value as a string, but a bare number is accepted as well.
pub fn parse_index(body: &Value) -> Result<f64> {
    let raw = body
        .get("data")
        .and_then(Value::as_array)
        .and_then(|arr| arr.first())
        .and_then(|entry| entry.get("value"))
        .context("fear & greed response missing data[0].value")?;

    let value = match raw {
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .with_context(|| format!("fear & greed value {s:?} is not numeric"))?,
        Value::Number(n) => n.as_f64().context("fear & greed value out of range")?,
        other => anyhow::bail!("fear & greed value has unexpected type: {other}"),
    };

    if !value.is_finite() {
        anyhow::bail!("fear & greed value is not finite");
    }

    // Index is integral and already scaled 0–100.
    Ok(value.trunc().clamp(0.0, 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_string_value() {
        let body = json!({ "name": "Fear and Greed Index", "data": [{ "value": "72", "value_classification": "Greed" }] });
        assert_eq!(parse_index(&body).unwrap(), 72.0);
    }

    #[test]
    fn parses_numeric_value_and_clamps() {
        assert_eq!(parse_index(&json!({ "data": [{ "value": 34 }] })).unwrap(), 34.0);
        assert_eq!(parse_index(&json!({ "data": [{ "value": 140 }] })).unwrap(), 100.0);
    }

    #[test]
    fn rejects_malformed_bodies() {
        assert!(parse_index(&json!({})).is_err());
        assert!(parse_index(&json!({ "data": [] })).is_err());
        assert!(parse_index(&json!({ "data": [{ "value": "n/a" }] })).is_err());
        assert!(parse_index(&json!({ "data": [{ "value": null }] })).is_err());
    }
}

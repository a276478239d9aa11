use crate::{AnalysisError, Bar, Time};
use log::{debug, info};
use reqwest::blocking::Client;
use serde::Deserialize;

pub const YAHOO_CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

#[derive(Debug, Deserialize)]
pub struct ChartResponse {
  pub chart: Chart,
}

#[derive(Debug, Deserialize)]
pub struct Chart {
  pub result: Option<Vec<ChartResult>>,
  pub error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
pub struct ChartError {
  pub code: String,
  pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct ChartResult {
  #[serde(default)]
  pub timestamp: Vec<i64>,
  pub indicators: Indicators,
}

#[derive(Debug, Deserialize)]
pub struct Indicators {
  #[serde(default)]
  pub quote: Vec<Quote>,
  #[serde(default)]
  pub adjclose: Vec<AdjClose>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Quote {
  #[serde(default)]
  pub open: Vec<Option<f64>>,
  #[serde(default)]
  pub high: Vec<Option<f64>>,
  #[serde(default)]
  pub low: Vec<Option<f64>>,
  #[serde(default)]
  pub close: Vec<Option<f64>>,
  #[serde(default)]
  pub volume: Vec<Option<f64>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AdjClose {
  #[serde(default)]
  pub adjclose: Vec<Option<f64>>,
}

impl ChartResponse {
  /// Flatten the columnar payload into daily bars. Missing cells become `NaN`.
  pub fn into_bars(self) -> anyhow::Result<Vec<Bar>> {
    if let Some(err) = self.chart.error {
      return Err(AnalysisError::Provider(format!("{}: {}", err.code, err.description)).into());
    }
    let result = self
      .chart
      .result
      .and_then(|r| r.into_iter().next())
      .ok_or_else(|| AnalysisError::Provider("empty chart result".to_string()))?;

    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let adj = result
      .indicators
      .adjclose
      .into_iter()
      .next()
      .unwrap_or_default();
    let cell = |col: &[Option<f64>], i: usize| col.get(i).copied().flatten().unwrap_or(f64::NAN);

    let mut bars = Vec::with_capacity(result.timestamp.len());
    for (i, ts) in result.timestamp.iter().enumerate() {
      let close = cell(&quote.close, i);
      let adj_close = match adj.adjclose.is_empty() {
        true => close,
        false => cell(&adj.adjclose, i),
      };
      bars.push(Bar {
        date: Time::from_unix(*ts)?,
        open: cell(&quote.open, i),
        high: cell(&quote.high, i),
        low: cell(&quote.low, i),
        close,
        adj_close,
        volume: quote.volume.get(i).copied().flatten(),
      });
    }
    bars.sort_by_key(|bar| bar.date);
    bars.dedup_by_key(|bar| bar.date);
    Ok(bars)
  }
}

pub struct YahooClient {
  client: Client,
  url: String,
}

impl YahooClient {
  pub fn new() -> anyhow::Result<Self> {
    Self::with_url(YAHOO_CHART_URL.to_string())
  }

  pub fn with_url(url: String) -> anyhow::Result<Self> {
    let client = Client::builder()
      .user_agent("Mozilla/5.0 (X11; Linux x86_64) empirical/0.1")
      .build()?;
    Ok(Self { client, url })
  }

  /// Daily bars for `ticker` from `start` (inclusive) to `end` (exclusive, defaults to now).
  pub fn history(&self, ticker: &str, start: Time, end: Option<Time>) -> anyhow::Result<Vec<Bar>> {
    let end = end.unwrap_or_else(Time::now);
    // include the final session
    let stop = end.delta_date(1)?;
    let period1 = start.to_unix()?;
    let period2 = stop.to_unix()?;
    let url = format!("{}/{}", self.url, ticker);
    info!("Fetching {} daily bars from {} to {}", ticker, start, end);

    let res = self
      .client
      .get(&url)
      .query(&[
        ("period1", period1.to_string()),
        ("period2", period2.to_string()),
        ("interval", "1d".to_string()),
        ("events", "history".to_string()),
        ("includeAdjustedClose", "true".to_string()),
      ])
      .send()?;

    let status = res.status();
    if !status.is_success() {
      let body = res.text().unwrap_or_default();
      return Err(AnalysisError::Provider(format!("HTTP {} for {}: {}", status, ticker, body)).into());
    }
    let payload: ChartResponse = res.json()?;
    let bars = payload.into_bars()?;
    let bars: Vec<Bar> = bars.into_iter().filter(|b| b.date < stop).collect();
    debug!("Received {} bars for {}", bars.len(), ticker);
    Ok(bars)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn chart_payload_to_bars() -> anyhow::Result<()> {
    let body = r#"{
      "chart": {
        "result": [{
          "meta": { "symbol": "^GSPC" },
          "timestamp": [631377000, 631290600, 631463400],
          "indicators": {
            "quote": [{
              "open": [359.69, 353.40, null],
              "high": [360.59, 359.69, 358.76],
              "low": [357.89, 351.98, 352.89],
              "close": [358.76, 359.69, null],
              "volume": [192330000, 162070000, null]
            }],
            "adjclose": [{ "adjclose": [358.76, 359.69, null] }]
          }
        }],
        "error": null
      }
    }"#;
    let payload: ChartResponse = serde_json::from_str(body)?;
    let bars = payload.into_bars()?;
    assert_eq!(bars.len(), 3);
    // sorted by date regardless of payload order
    assert_eq!(bars[0].date, Time::new(1990, 1, 2));
    assert_eq!(bars[0].adj_close, 359.69);
    assert!(bars[2].adj_close.is_nan());
    assert_eq!(bars[2].volume, None);
    Ok(())
  }

  #[test]
  fn chart_error_surfaces() -> anyhow::Result<()> {
    let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
    let payload: ChartResponse = serde_json::from_str(body)?;
    let err = payload.into_bars().unwrap_err();
    assert!(err.to_string().contains("No data found"));
    Ok(())
  }
}

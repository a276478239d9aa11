use crate::{AnalysisError, Bar, PriceField, Time};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use std::str::FromStr;

pub trait Y: Clone {
  fn y(&self) -> f64;
}

pub trait X: Clone {
  fn x(&self) -> i64;
}

impl Y for f64 {
  fn y(&self) -> f64 {
    *self
  }
}

impl X for i64 {
  fn x(&self) -> i64 {
    *self
  }
}

/// A single observation: `x` is a UNIX timestamp in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Data {
  pub x: i64,
  pub y: f64,
}

impl Y for Data {
  fn y(&self) -> f64 {
    self.y
  }
}

impl X for Data {
  fn x(&self) -> i64 {
    self.x
  }
}

/// Time-indexed series, earliest observation at index 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset(pub Vec<Data>);

impl Dataset {
  pub fn new(data: Vec<Data>) -> Self {
    Self(data)
  }

  /// Build a series from daily bars, dropping rows whose chosen price is missing.
  pub fn from_bars(bars: &[Bar], field: PriceField) -> anyhow::Result<Self> {
    let mut data = Vec::with_capacity(bars.len());
    let mut dropped = 0;
    for bar in bars {
      let y = bar.price(field);
      if !y.is_finite() {
        dropped += 1;
        continue;
      }
      data.push(Data {
        x: bar.date.to_unix_ms()?,
        y,
      });
    }
    if dropped > 0 {
      warn!("Dropped {} bars with a missing {:?} price", dropped, field);
    }
    let mut dataset = Self(data);
    dataset.0.sort_by_key(|d| d.x);
    Ok(dataset)
  }

  pub fn asc_order(&self) -> Vec<Data> {
    let mut data = self.0.clone();
    data.sort_by_key(|a| a.x());
    data
  }

  pub fn x(&self) -> Vec<i64> {
    self.0.iter().map(|d| d.x()).collect()
  }

  pub fn y(&self) -> Vec<f64> {
    self.0.iter().map(|d| d.y()).collect()
  }

  pub fn data(&self) -> &Vec<Data> {
    &self.0
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn first(&self) -> Option<&Data> {
    self.0.first()
  }

  pub fn last(&self) -> Option<&Data> {
    self.0.last()
  }

  /// Logarithmic change between consecutive observations, `ln(p_t) - ln(p_t-1)`.
  /// The first observation has no predecessor and is dropped, as is any pair
  /// touching a non-positive price.
  pub fn log_returns(&self) -> Dataset {
    let series = self.asc_order();
    let returns = series
      .windows(2)
      .filter(|w| w[0].y > 0.0 && w[1].y > 0.0)
      .map(|w| Data {
        x: w[1].x,
        y: w[1].y.ln() - w[0].y.ln(),
      })
      .collect();
    Dataset::new(returns)
  }

  /// First difference applied `order` times; each pass drops the leading row.
  pub fn diff(&self, order: usize) -> Dataset {
    let mut series = self.asc_order();
    for _ in 0..order {
      series = series
        .windows(2)
        .map(|w| Data {
          x: w[1].x,
          y: w[1].y - w[0].y,
        })
        .collect();
    }
    Dataset::new(series)
  }

  /// Positional split into `[0, cut)` and `[cut, len)`.
  pub fn split_at(&self, cut: usize) -> Result<(Dataset, Dataset), AnalysisError> {
    if cut == 0 || cut >= self.len() {
      return Err(AnalysisError::InvalidSplit {
        cut,
        len: self.len(),
      });
    }
    let (train, test) = self.0.split_at(cut);
    Ok((Dataset::new(train.to_vec()), Dataset::new(test.to_vec())))
  }

  /// Read daily bars from a CSV file in the provider's download format:
  /// `Date,Open,High,Low,Close,Adj Close,Volume`.
  /// `Date` and `Close` are required, other columns read as `NaN` when absent.
  /// Dates may be `YYYY-MM-DD` or UNIX seconds. Duplicate dates keep the last row.
  /// Missing values (`null`, empty) become `NaN`.
  pub fn csv_bars(
    csv_path: &Path,
    start_time: Option<Time>,
    end_time: Option<Time>,
  ) -> anyhow::Result<Vec<Bar>> {
    let file_buffer = File::open(csv_path)?;
    let mut csv = csv::Reader::from_reader(file_buffer);

    let headers: Vec<String> = csv.headers()?.iter().map(|h| h.trim().to_lowercase()).collect();
    let column = |name: &str| headers.iter().position(|h| h == name);
    let required = |name: &str| {
      column(name).ok_or_else(|| anyhow::anyhow!("No {} column in {:?}", name, csv_path))
    };
    let date_col = required("date")?;
    let close_col = required("close")?;
    let open_col = column("open");
    let high_col = column("high");
    let low_col = column("low");
    let adj_col = column("adj close");
    let volume_col = column("volume");

    let parse = |s: &str| -> f64 { f64::from_str(s.trim()).unwrap_or(f64::NAN) };

    let mut bars = vec![];
    for record in csv.records() {
      let record = record?;
      let cell = |col: Option<usize>| col.and_then(|c| record.get(c)).map(parse).unwrap_or(f64::NAN);
      let raw_date = record
        .get(date_col)
        .ok_or_else(|| anyhow::anyhow!("Row without a date in {:?}", csv_path))?;
      let date = match raw_date.parse::<i64>() {
        Ok(unix) => Time::from_unix(unix)?,
        Err(_) => Time::from_api_format(raw_date)?,
      };
      let close = cell(Some(close_col));
      bars.push(Bar {
        date,
        open: cell(open_col),
        high: cell(high_col),
        low: cell(low_col),
        close,
        adj_close: adj_col.map(|c| cell(Some(c))).unwrap_or(close),
        volume: volume_col.map(|c| cell(Some(c))).filter(|v| v.is_finite()),
      });
    }

    bars.retain(|bar| match (start_time, end_time) {
      (Some(start), Some(end)) => bar.date >= start && bar.date < end,
      (Some(start), None) => bar.date >= start,
      (None, Some(end)) => bar.date < end,
      (None, None) => true,
    });
    bars.sort_by_key(|bar| bar.date);
    // keep the last occurrence of each date
    bars.reverse();
    bars.dedup_by_key(|bar| bar.date);
    bars.reverse();
    Ok(bars)
  }

  /// Read the adjusted close column of a provider CSV as a series.
  pub fn csv_series(
    csv_path: &Path,
    start_time: Option<Time>,
    end_time: Option<Time>,
  ) -> anyhow::Result<Dataset> {
    let bars = Self::csv_bars(csv_path, start_time, end_time)?;
    Self::from_bars(&bars, PriceField::AdjClose)
  }

  /// Write bars in the same format `csv_bars` reads.
  pub fn write_csv(bars: &[Bar], csv_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = csv_path.parent() {
      if !parent.as_os_str().is_empty() {
        std::fs::create_dir_all(parent)?;
      }
    }
    let mut writer = csv::Writer::from_path(csv_path)?;
    writer.write_record(["Date", "Open", "High", "Low", "Close", "Adj Close", "Volume"])?;
    let fmt = |v: f64| match v.is_finite() {
      true => v.to_string(),
      false => "null".to_string(),
    };
    for bar in bars {
      writer.write_record([
        bar.date.to_string_daily(),
        fmt(bar.open),
        fmt(bar.high),
        fmt(bar.low),
        fmt(bar.close),
        fmt(bar.adj_close),
        bar.volume.map(fmt).unwrap_or_else(|| "null".to_string()),
      ])?;
    }
    writer.flush()?;
    Ok(())
  }
}

use crate::{Time, X, Y};
use serde::{Deserialize, Serialize};

/// One daily session for a given ticker.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Bar {
  pub date: Time,
  pub open: f64,
  pub high: f64,
  pub low: f64,
  pub close: f64,
  /// Close adjusted for splits and dividends. `NaN` when the provider omits it.
  pub adj_close: f64,
  pub volume: Option<f64>,
}

impl Y for Bar {
  fn y(&self) -> f64 {
    self.adj_close
  }
}

impl X for Bar {
  fn x(&self) -> i64 {
    // dates come out of the provider already validated
    self.date.to_unix_ms().unwrap_or_default()
  }
}

impl Bar {
  pub fn price(&self, field: PriceField) -> f64 {
    match field {
      PriceField::Close => self.close,
      PriceField::AdjClose => self.adj_close,
    }
  }
}

impl PartialEq for Bar {
  fn eq(&self, other: &Self) -> bool {
    self.date == other.date && self.close == other.close
  }
}

/// Which price column to turn into a series.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceField {
  Close,
  #[default]
  AdjClose,
}

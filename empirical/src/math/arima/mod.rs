pub use auto::*;
pub use kalman::*;
pub use model::*;
pub use transform::*;

pub mod auto;
pub mod kalman;
pub mod model;
pub mod transform;

use crate::AnalysisError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// `(p, d, q)`: autoregressive lags, differencing passes, moving average lags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArimaOrder {
  pub p: usize,
  pub d: usize,
  pub q: usize,
}

impl ArimaOrder {
  pub fn new(p: usize, d: usize, q: usize) -> Self {
    Self { p, d, q }
  }
}

impl fmt::Display for ArimaOrder {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "({},{},{})", self.p, self.d, self.q)
  }
}

/// Accepts `0,1,5` or `(0,1,5)`.
impl FromStr for ArimaOrder {
  type Err = AnalysisError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let trimmed = s.trim().trim_start_matches('(').trim_end_matches(')');
    let parts: Vec<&str> = trimmed.split(',').map(|p| p.trim()).collect();
    if parts.len() != 3 {
      return Err(AnalysisError::InvalidOrder(s.to_string()));
    }
    let num = |p: &str| {
      p.parse::<usize>()
        .map_err(|_| AnalysisError::InvalidOrder(s.to_string()))
    };
    Ok(Self::new(num(parts[0])?, num(parts[1])?, num(parts[2])?))
  }
}

/// First difference applied `d` times.
pub fn difference(x: &[f64], d: usize) -> Vec<f64> {
  let mut out = x.to_vec();
  for _ in 0..d {
    out = out.windows(2).map(|w| w[1] - w[0]).collect();
  }
  out
}

/// Undo `d` differencing passes for values that continue `history`.
pub fn integrate(differenced: &[f64], history: &[f64], d: usize) -> Vec<f64> {
  // last value of each difference order 0..d
  let mut levels: Vec<f64> = (0..d)
    .map(|k| difference(history, k).last().copied().unwrap_or(0.0))
    .collect();
  differenced
    .iter()
    .map(|w| {
      let mut value = *w;
      for k in (0..d).rev() {
        levels[k] += value;
        value = levels[k];
      }
      value
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parse_order() -> anyhow::Result<()> {
    assert_eq!("0,1,5".parse::<ArimaOrder>()?, ArimaOrder::new(0, 1, 5));
    assert_eq!("(2, 0, 1)".parse::<ArimaOrder>()?, ArimaOrder::new(2, 0, 1));
    assert_eq!(ArimaOrder::new(0, 1, 5).to_string(), "(0,1,5)");
    assert!("1,1".parse::<ArimaOrder>().is_err());
    assert!("a,1,1".parse::<ArimaOrder>().is_err());
    Ok(())
  }

  #[test]
  fn integrate_continues_history() {
    let history = [1.0, 4.0, 9.0, 16.0];
    // next squares 25, 36 have constant second difference 2
    assert_eq!(integrate(&[2.0, 2.0], &history, 2), vec![25.0, 36.0]);
    assert_eq!(integrate(&[9.0, 11.0], &history, 1), vec![25.0, 36.0]);
    assert_eq!(integrate(&[5.0], &history, 0), vec![5.0]);
  }
}

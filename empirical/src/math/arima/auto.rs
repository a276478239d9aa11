use super::{difference, Arima, ArimaFit, ArimaOrder};
use crate::{adfuller, AnalysisError, AutoLag};
use log::{debug, info, warn};
use rayon::prelude::*;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Criterion {
  #[default]
  Aic,
  Bic,
  Hqic,
}

#[derive(Debug, Clone)]
pub struct AutoArimaConfig {
  pub max_p: usize,
  pub max_q: usize,
  /// Fixed differencing order. Chosen by repeated ADF tests when `None`.
  pub d: Option<usize>,
  pub max_d: usize,
  pub criterion: Criterion,
}

impl Default for AutoArimaConfig {
  fn default() -> Self {
    Self {
      max_p: 5,
      max_q: 5,
      d: None,
      max_d: 5,
      criterion: Criterion::Aic,
    }
  }
}

#[derive(Debug, Clone)]
pub struct AutoArimaResult {
  pub best: ArimaFit,
  /// Every candidate that could be fit, best first
  pub scores: Vec<(ArimaOrder, f64)>,
}

fn score(fit: &ArimaFit, criterion: Criterion) -> f64 {
  match criterion {
    Criterion::Aic => fit.aic(),
    Criterion::Bic => fit.bic(),
    Criterion::Hqic => fit.hqic(),
  }
}

/// Number of differences until the ADF test rejects a unit root at 5%.
pub fn ndiffs(y: &[f64], max_d: usize) -> usize {
  for d in 0..=max_d {
    match adfuller(&difference(y, d), None, AutoLag::Aic) {
      Ok(adf) if adf.is_stationary("5%") => return d,
      Ok(adf) => debug!("d = {} keeps a unit root (ADF {})", d, adf.statistic),
      Err(e) => {
        warn!("ADF failed after {} differences: {}", d, e);
        return d;
      }
    }
  }
  max_d
}

/// Fit every `(p, d, q)` with `p <= max_p`, `q <= max_q` in parallel and keep the best by `criterion`.
pub fn auto_arima(y: &[f64], config: &AutoArimaConfig) -> Result<AutoArimaResult, AnalysisError> {
  let d = config.d.unwrap_or_else(|| ndiffs(y, config.max_d));
  info!("Searching ARIMA orders up to ({},{},{})", config.max_p, d, config.max_q);

  let orders: Vec<ArimaOrder> = (0..=config.max_p)
    .flat_map(|p| (0..=config.max_q).map(move |q| ArimaOrder::new(p, d, q)))
    .collect();
  let fits: Vec<(ArimaOrder, ArimaFit, f64)> = orders
    .into_par_iter()
    .filter_map(|order| match Arima::new(order).fit(y) {
      Ok(fit) => {
        let value = score(&fit, config.criterion);
        debug!("ARIMA{} {:?} = {}", order, config.criterion, value);
        value.is_finite().then_some((order, fit, value))
      }
      Err(e) => {
        warn!("ARIMA{} could not be fit: {}", order, e);
        None
      }
    })
    .collect();

  let mut scores: Vec<(ArimaOrder, f64)> = fits.iter().map(|(order, _, value)| (*order, *value)).collect();
  scores.sort_by(|a, b| a.1.total_cmp(&b.1));
  let best = fits
    .into_iter()
    .min_by(|a, b| a.2.total_cmp(&b.2))
    .map(|(_, fit, _)| fit)
    .ok_or_else(|| AnalysisError::InvalidOrder("no candidate order could be fit".to_string()))?;
  info!("Best order ARIMA{}", best.order);
  Ok(AutoArimaResult { best, scores })
}

#[cfg(test)]
mod tests {
  use super::*;

  fn ar1_walk(n: usize) -> Vec<f64> {
    let mut state: u64 = 17;
    let mut level = 0.0;
    let mut prev = 0.0;
    (0..n)
      .map(|_| {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let e = ((state >> 11) as f64 / (1u64 << 53) as f64) - 0.5;
        prev = 0.7 * prev + e;
        level += prev;
        level
      })
      .collect()
  }

  #[test]
  fn integrated_series_needs_one_difference() {
    assert_eq!(ndiffs(&ar1_walk(800), 3), 1);
  }

  #[test]
  fn search_prefers_ar_term() -> anyhow::Result<()> {
    let y = ar1_walk(600);
    let config = AutoArimaConfig {
      max_p: 2,
      max_q: 1,
      ..Default::default()
    };
    let res = auto_arima(&y, &config)?;
    assert_eq!(res.best.order.d, 1);
    assert!(res.best.order.p >= 1);
    assert_eq!(res.scores.len(), 6);
    assert!(res.scores.windows(2).all(|w| w[0].1 <= w[1].1));
    assert_eq!(res.scores[0].0, res.best.order);
    Ok(())
  }
}

use crate::{linear_fit, AnalysisError};
use log::debug;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecomposeModel {
  #[default]
  Additive,
  Multiplicative,
}

/// Classical decomposition of a series into trend, seasonal and residual parts.
#[derive(Debug, Clone)]
pub struct Decomposition {
  pub observed: Vec<f64>,
  /// `NaN` at the ends unless the trend was extrapolated
  pub trend: Vec<f64>,
  pub seasonal: Vec<f64>,
  pub resid: Vec<f64>,
  pub period: usize,
  pub model: DecomposeModel,
}

/// Centred moving average over one full period, `2 x period` for an even period.
fn centred_moving_average(x: &[f64], period: usize) -> Vec<f64> {
  let weights: Vec<f64> = match period % 2 {
    0 => {
      let mut w = vec![1.0 / period as f64; period + 1];
      w[0] /= 2.0;
      w[period] /= 2.0;
      w
    }
    _ => vec![1.0 / period as f64; period],
  };
  let half = weights.len() / 2;
  let mut trend = vec![f64::NAN; x.len()];
  for (i, window) in x.windows(weights.len()).enumerate() {
    trend[i + half] = window.iter().zip(weights.iter()).map(|(v, w)| v * w).sum();
  }
  trend
}

/// Fill the undefined ends of `trend` with least-squares lines through the nearest `npoints` values.
fn extrapolate(trend: &mut [f64], npoints: usize) -> Result<(), AnalysisError> {
  let front = trend.iter().position(|v| !v.is_nan());
  let back = trend.iter().rposition(|v| !v.is_nan());
  let (front, back) = match (front, back) {
    (Some(f), Some(b)) => (f, b),
    _ => return Ok(()),
  };

  // fewer than two points (period 2) continue the nearest value flat
  let line = |from: usize, to: usize, edge: usize, trend: &[f64]| -> Result<(f64, f64), AnalysisError> {
    if to <= from + 1 {
      return Ok((0.0, trend[edge]));
    }
    let xs: Vec<f64> = (from..to).map(|i| i as f64).collect();
    linear_fit(&xs, &trend[from..to])
  };

  let front_last = (front + npoints).min(back);
  let (slope, intercept) = line(front, front_last, front, trend)?;
  for (i, v) in trend.iter_mut().enumerate().take(front) {
    *v = slope * i as f64 + intercept;
  }

  let back_first = back.saturating_sub(npoints).max(front);
  let (slope, intercept) = line(back_first, back, back, trend)?;
  for (i, v) in trend.iter_mut().enumerate().skip(back + 1) {
    *v = slope * i as f64 + intercept;
  }
  Ok(())
}

/// Decompose `x` with a seasonal cycle of `period` observations.
/// Needs at least two full cycles.
pub fn seasonal_decompose(
  x: &[f64],
  period: usize,
  model: DecomposeModel,
  extrapolate_trend: bool,
) -> Result<Decomposition, AnalysisError> {
  let n = x.len();
  if period < 2 || n < 2 * period {
    return Err(AnalysisError::InsufficientData {
      needed: 2 * period.max(2),
      got: n,
    });
  }
  if model == DecomposeModel::Multiplicative && x.iter().any(|v| *v <= 0.0) {
    return Err(AnalysisError::NonPositive);
  }

  let mut trend = centred_moving_average(x, period);
  if extrapolate_trend {
    extrapolate(&mut trend, period - 1)?;
  }

  let detrended: Vec<f64> = x
    .iter()
    .zip(trend.iter())
    .map(|(v, t)| match model {
      DecomposeModel::Additive => v - t,
      DecomposeModel::Multiplicative => v / t,
    })
    .collect();

  // average per phase, ignoring undefined trend values
  let mut averages: Vec<f64> = (0..period)
    .map(|phase| {
      let values: Vec<f64> = detrended
        .iter()
        .skip(phase)
        .step_by(period)
        .filter(|v| !v.is_nan())
        .copied()
        .collect();
      values.iter().sum::<f64>() / values.len() as f64
    })
    .collect();
  let centre = averages.iter().sum::<f64>() / period as f64;
  for a in averages.iter_mut() {
    match model {
      DecomposeModel::Additive => *a -= centre,
      DecomposeModel::Multiplicative => *a /= centre,
    }
  }
  debug!("Seasonal component spans {} phases", period);

  let seasonal: Vec<f64> = (0..n).map(|i| averages[i % period]).collect();
  let resid: Vec<f64> = detrended
    .iter()
    .zip(seasonal.iter())
    .map(|(d, s)| match model {
      DecomposeModel::Additive => d - s,
      DecomposeModel::Multiplicative => d / s,
    })
    .collect();

  Ok(Decomposition {
    observed: x.to_vec(),
    trend,
    seasonal,
    resid,
    period,
    model,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  fn seasonal_series(n: usize, period: usize) -> Vec<f64> {
    let pattern: Vec<f64> = (0..period).map(|i| (i as f64 - (period - 1) as f64 / 2.0) * 0.5).collect();
    (0..n).map(|i| 10.0 + 0.1 * i as f64 + pattern[i % period]).collect()
  }

  #[test]
  fn recovers_trend_and_season() -> anyhow::Result<()> {
    let period = 4;
    let x = seasonal_series(40, period);
    let dec = seasonal_decompose(&x, period, DecomposeModel::Additive, false)?;
    assert!(dec.trend[0].is_nan() && dec.trend[1].is_nan());
    assert!(dec.trend[38].is_nan() && dec.trend[39].is_nan());
    for i in 2..38 {
      assert!((dec.trend[i] - (10.0 + 0.1 * i as f64)).abs() < 1e-9);
      assert!(dec.resid[i].abs() < 1e-9);
    }
    assert!((dec.seasonal[0] - (-0.75)).abs() < 1e-9);
    let cycle: f64 = dec.seasonal[..period].iter().sum();
    assert!(cycle.abs() < 1e-12);
    Ok(())
  }

  #[test]
  fn extrapolated_trend_has_no_gaps() -> anyhow::Result<()> {
    let x = seasonal_series(35, 5);
    let dec = seasonal_decompose(&x, 5, DecomposeModel::Additive, true)?;
    assert!(dec.trend.iter().all(|v| v.is_finite()));
    // a linear trend is continued exactly
    assert!((dec.trend[0] - 10.0).abs() < 1e-9);
    assert!((dec.trend[34] - 13.4).abs() < 1e-9);
    Ok(())
  }

  #[test]
  fn period_two_trend_is_filled_flat() -> anyhow::Result<()> {
    let x: Vec<f64> = (0..40).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 } + 0.1 * i as f64).collect();
    let dec = seasonal_decompose(&x, 2, DecomposeModel::Additive, true)?;
    assert_eq!(dec.trend.len(), 40);
    assert!(dec.trend.iter().all(|v| v.is_finite()));
    assert_eq!(dec.trend[0], dec.trend[1]);
    assert_eq!(dec.trend[39], dec.trend[38]);
    Ok(())
  }

  #[test]
  fn needs_two_cycles() {
    assert!(matches!(
      seasonal_decompose(&[1.0; 10], 6, DecomposeModel::Additive, true),
      Err(AnalysisError::InsufficientData { .. })
    ));
    assert!(matches!(
      seasonal_decompose(&[-1.0; 10], 2, DecomposeModel::Multiplicative, true),
      Err(AnalysisError::NonPositive)
    ));
  }
}

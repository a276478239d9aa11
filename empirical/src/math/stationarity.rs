use crate::{normal_cdf, ols, AnalysisError, OlsFit};
use log::debug;
use std::collections::BTreeMap;
use std::fmt;

/// How the number of augmenting lags is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AutoLag {
  #[default]
  Aic,
  Bic,
  /// Use `max_lag` as given
  Fixed,
}

/// Augmented Dickey-Fuller test result (constant, no trend).
#[derive(Debug, Clone)]
pub struct AdfResult {
  pub statistic: f64,
  pub p_value: f64,
  pub used_lag: usize,
  /// Observations used for the regression and the critical values
  pub nobs: usize,
  /// Keyed by significance level: "1%", "5%", "10%"
  pub critical_values: BTreeMap<String, f64>,
  /// Best information criterion when the lag was chosen automatically
  pub ic_best: Option<f64>,
}

impl AdfResult {
  /// Unit root rejected at `level` ("1%", "5%" or "10%").
  pub fn is_stationary(&self, level: &str) -> bool {
    self
      .critical_values
      .get(level)
      .map(|cv| self.statistic < *cv)
      .unwrap_or(false)
  }
}

impl fmt::Display for AdfResult {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "1. ADF : {}", self.statistic)?;
    writeln!(f, "2. P-Value : {}", self.p_value)?;
    writeln!(f, "3. Num Of Lags : {}", self.used_lag)?;
    writeln!(
      f,
      "4. Num Of Observations Used For ADF Regression and Critical Values Calculation : {}",
      self.nobs
    )?;
    writeln!(f, "5. Critical Values :")?;
    for key in ["1%", "5%", "10%"] {
      if let Some(val) = self.critical_values.get(key) {
        writeln!(f, "\t{} : {}", key, val)?;
      }
    }
    Ok(())
  }
}

// MacKinnon (1994) response surface for the p-value, constant-only case
const TAU_MAX_C: f64 = 2.74;
const TAU_MIN_C: f64 = -18.83;
const TAU_STAR_C: f64 = -1.61;
const TAU_C_SMALLP: [f64; 3] = [2.1659, 1.4412, 3.8269e-2];
const TAU_C_LARGEP: [f64; 4] = [1.7339, 9.3202e-1, -1.2745e-1, -1.0368e-2];

// MacKinnon (2010) finite sample critical values, constant-only case
const TAU_C_2010: [(&str, [f64; 4]); 3] = [
  ("1%", [-3.43035, -6.5393, -16.786, -79.433]),
  ("5%", [-2.86154, -2.8903, -4.234, -40.040]),
  ("10%", [-2.56677, -1.5384, -2.809, 0.0]),
];

fn polyval(coefs: &[f64], x: f64) -> f64 {
  coefs.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

/// Approximate p-value of a Dickey-Fuller statistic.
pub fn mackinnon_p(statistic: f64) -> f64 {
  if statistic.is_nan() {
    return f64::NAN;
  }
  if statistic > TAU_MAX_C {
    return 1.0;
  }
  if statistic < TAU_MIN_C {
    return 0.0;
  }
  match statistic <= TAU_STAR_C {
    true => normal_cdf(polyval(&TAU_C_SMALLP, statistic)),
    false => normal_cdf(polyval(&TAU_C_LARGEP, statistic)),
  }
}

/// Critical values for a sample of `nobs` observations.
pub fn mackinnon_crit(nobs: usize) -> BTreeMap<String, f64> {
  let inv = 1.0 / nobs as f64;
  TAU_C_2010
    .iter()
    .map(|(level, coefs)| (level.to_string(), polyval(coefs, inv)))
    .collect()
}

/// Regression rows for `lags` augmenting differences:
/// returns `(dy_t, [1, y_t-1, dy_t-1, .., dy_t-lags])` aligned to the last `nobs` differences.
fn adf_design(x: &[f64], lags: usize, nobs: usize) -> (Vec<f64>, Vec<Vec<f64>>) {
  let dx: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
  let start = dx.len() - nobs;
  let mut y = Vec::with_capacity(nobs);
  let mut design = Vec::with_capacity(nobs);
  for t in start..dx.len() {
    let mut row = Vec::with_capacity(lags + 2);
    row.push(1.0);
    // level preceding dx[t] = x[t+1] - x[t]
    row.push(x[t]);
    for i in 1..=lags {
      row.push(dx[t - i]);
    }
    y.push(dx[t]);
    design.push(row);
  }
  (y, design)
}

/// Augmented Dickey-Fuller unit root test with a constant:
/// `dy_t = a + b y_t-1 + sum_i g_i dy_t-i + e_t`, statistic is the t-value of `b`.
///
/// With `AutoLag::Aic`/`Bic` every lag count up to `max_lag` is fit on the same
/// sample and the best one is refit on all the observations it allows.
/// `max_lag` defaults to `ceil(12 * (n / 100)^(1/4))`.
pub fn adfuller(x: &[f64], max_lag: Option<usize>, autolag: AutoLag) -> Result<AdfResult, AnalysisError> {
  let n = x.len();
  if n < 8 {
    return Err(AnalysisError::InsufficientData { needed: 8, got: n });
  }
  // two deterministic-plus-level columns
  let cap = n / 2 - 2;
  let max_lag = max_lag
    .unwrap_or_else(|| (12.0 * (n as f64 / 100.0).powf(0.25)).ceil() as usize)
    .min(cap);
  let ndiff = n - 1;

  let (used_lag, ic_best) = match autolag {
    AutoLag::Fixed => (max_lag, None),
    AutoLag::Aic | AutoLag::Bic => {
      let nobs = ndiff - max_lag;
      let mut best: Option<(usize, f64)> = None;
      for lag in 0..=max_lag {
        let (y, design) = adf_design(x, lag, nobs);
        let fit: OlsFit = ols(&y, &design)?;
        let ic = match autolag {
          AutoLag::Bic => fit.bic(),
          _ => fit.aic(),
        };
        debug!("ADF lag {} information criterion {}", lag, ic);
        if best.map(|(_, b)| ic < b).unwrap_or(true) {
          best = Some((lag, ic));
        }
      }
      match best {
        Some((lag, ic)) => (lag, Some(ic)),
        None => (max_lag, None),
      }
    }
  };

  let nobs = ndiff - used_lag;
  let (y, design) = adf_design(x, used_lag, nobs);
  let fit = ols(&y, &design)?;
  let statistic = fit.tvalues[1];

  Ok(AdfResult {
    statistic,
    p_value: mackinnon_p(statistic),
    used_lag,
    nobs,
    critical_values: mackinnon_crit(nobs),
    ic_best,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  fn lcg_noise(n: usize, seed: u64) -> Vec<f64> {
    let mut state = seed;
    (0..n)
      .map(|_| {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((state >> 11) as f64 / (1u64 << 53) as f64) - 0.5
      })
      .collect()
  }

  #[test]
  fn critical_values_for_large_sample() {
    let cv = mackinnon_crit(1_000);
    assert!((cv["1%"] - (-3.43035 - 6.5393e-3 - 16.786e-6 - 79.433e-9)).abs() < 1e-9);
    assert!(cv["1%"] < cv["5%"] && cv["5%"] < cv["10%"]);
  }

  #[test]
  fn p_value_is_monotone_in_statistic() {
    assert_eq!(mackinnon_p(-20.0), 0.0);
    assert_eq!(mackinnon_p(3.0), 1.0);
    // the 5% asymptotic critical value maps to roughly 5%
    assert!((mackinnon_p(-2.86) - 0.05).abs() < 0.01);
    let grid = [-6.0, -4.0, -3.0, -2.0, -1.61, -1.0, 0.0, 1.0];
    assert!(grid.windows(2).all(|w| mackinnon_p(w[0]) <= mackinnon_p(w[1])));
  }

  #[test]
  fn white_noise_is_stationary() -> anyhow::Result<()> {
    let x = lcg_noise(1_000, 7);
    let res = adfuller(&x, None, AutoLag::Aic)?;
    assert!(res.statistic < -5.0);
    assert!(res.p_value < 0.001);
    assert!(res.is_stationary("1%"));
    assert_eq!(res.nobs, x.len() - 1 - res.used_lag);
    assert_eq!(res.critical_values.len(), 3);
    assert!(res.ic_best.is_some());
    Ok(())
  }

  #[test]
  fn random_walk_keeps_unit_root() -> anyhow::Result<()> {
    let steps = lcg_noise(1_000, 11);
    let walk: Vec<f64> = steps
      .iter()
      .scan(0.0, |acc, e| {
        *acc += e;
        Some(*acc)
      })
      .collect();
    let res = adfuller(&walk, None, AutoLag::Aic)?;
    assert!(res.p_value > 0.01);
    assert!(!res.is_stationary("1%"));
    Ok(())
  }

  #[test]
  fn fixed_lag_and_report() -> anyhow::Result<()> {
    let x = lcg_noise(200, 3);
    let res = adfuller(&x, Some(4), AutoLag::Fixed)?;
    assert_eq!(res.used_lag, 4);
    assert_eq!(res.nobs, 195);
    assert!(res.ic_best.is_none());
    let report = res.to_string();
    for field in ["1. ADF", "2. P-Value", "3. Num Of Lags", "4. Num Of Observations", "5. Critical Values"] {
      assert!(report.contains(field), "missing {}", field);
    }
    assert!(report.contains("\t5% : "));
    Ok(())
  }

  #[test]
  fn short_series_is_rejected() {
    assert!(matches!(
      adfuller(&[1.0, 2.0, 3.0], None, AutoLag::Aic),
      Err(AnalysisError::InsufficientData { .. })
    ));
  }
}

use log::warn;
use statrs::distribution::{ChiSquared, ContinuousCDF, Normal};

pub fn mean(x: &[f64]) -> f64 {
  let sum: f64 = x.iter().sum();
  let n: f64 = x.len() as f64;
  sum / n
}

/// Population variance (divides by `n`).
pub fn variance(x: &[f64]) -> f64 {
  let mean_x: f64 = mean(x);
  x.iter().map(|a| (a - mean_x).powi(2)).sum::<f64>() / x.len() as f64
}

pub fn std_dev(x: &[f64]) -> f64 {
  variance(x).sqrt()
}

/// Quantile of the standard normal distribution.
pub fn normal_quantile(p: f64) -> f64 {
  match Normal::new(0.0, 1.0) {
    Ok(n) => n.inverse_cdf(p),
    Err(_) => f64::NAN,
  }
}

pub fn normal_cdf(x: f64) -> f64 {
  match Normal::new(0.0, 1.0) {
    Ok(n) => n.cdf(x),
    Err(_) => f64::NAN,
  }
}

/// Sample autocorrelation for lags `0..=nlags`, using the biased (`1/n`) autocovariance.
pub fn acf(x: &[f64], nlags: usize) -> Vec<f64> {
  let n = x.len();
  if n == 0 {
    return vec![];
  }
  let m = mean(x);
  let centered: Vec<f64> = x.iter().map(|v| v - m).collect();
  let c0: f64 = centered.iter().map(|v| v * v).sum::<f64>();
  if c0 == 0.0 {
    warn!("Autocorrelation of a constant series is undefined");
    return vec![f64::NAN; nlags.min(n - 1) + 1];
  }
  (0..=nlags.min(n - 1))
    .map(|k| {
      centered
        .iter()
        .skip(k)
        .zip(centered.iter())
        .map(|(a, b)| a * b)
        .sum::<f64>()
        / c0
    })
    .collect()
}

/// Bartlett's approximation for the confidence band of each autocorrelation:
/// `se_k = sqrt((1 + 2 * sum_{j<k} r_j^2) / n)`. Lag 0 has no band.
pub fn acf_confint(acf: &[f64], n: usize, alpha: f64) -> Vec<f64> {
  let z = normal_quantile(1.0 - alpha / 2.0);
  let mut bands = Vec::with_capacity(acf.len());
  let mut cum = 0.0;
  for k in 0..acf.len() {
    if k == 0 {
      bands.push(0.0);
      continue;
    }
    if k > 1 {
      cum += acf[k - 1].powi(2);
    }
    bands.push(z * ((1.0 + 2.0 * cum) / n as f64).sqrt());
  }
  bands
}

/// Partial autocorrelation for lags `0..=nlags` by the Durbin-Levinson recursion
/// over the sample autocorrelations.
pub fn pacf(x: &[f64], nlags: usize) -> Vec<f64> {
  let r = acf(x, nlags);
  let mut out = vec![1.0];
  if r.len() < 2 || r.iter().any(|v| v.is_nan()) {
    return r;
  }
  let mut phi: Vec<f64> = vec![];
  for k in 1..r.len() {
    let num = r[k] - (0..k - 1).map(|j| phi[j] * r[k - 1 - j]).sum::<f64>();
    let den = 1.0 - (0..k - 1).map(|j| phi[j] * r[j + 1]).sum::<f64>();
    if den.abs() < 1e-12 {
      warn!("Durbin-Levinson recursion degenerated at lag {}", k);
      out.extend(std::iter::repeat(f64::NAN).take(r.len() - k));
      break;
    }
    let kk = num / den;
    let mut next: Vec<f64> = (0..k - 1).map(|j| phi[j] - kk * phi[k - 2 - j]).collect();
    next.push(kk);
    phi = next;
    out.push(kk);
  }
  out
}

/// Band `± z / sqrt(n)` for every partial autocorrelation except lag 0.
pub fn pacf_confint(nlags: usize, n: usize, alpha: f64) -> Vec<f64> {
  let z = normal_quantile(1.0 - alpha / 2.0);
  (0..=nlags)
    .map(|k| match k {
      0 => 0.0,
      _ => z / (n as f64).sqrt(),
    })
    .collect()
}

/// One row of the Ljung-Box table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LjungBox {
  pub lag: usize,
  pub lb_stat: f64,
  pub lb_pvalue: f64,
}

/// Ljung-Box Q statistic for each lag in `1..=lags`.
/// `model_df` (number of fitted ARMA terms) is subtracted from the
/// chi-squared degrees of freedom, floored at one.
pub fn ljung_box(resid: &[f64], lags: usize, model_df: usize) -> Vec<LjungBox> {
  let n = resid.len();
  let r = acf(resid, lags);
  let mut table = Vec::with_capacity(lags);
  let mut q = 0.0;
  for lag in 1..r.len() {
    q += r[lag].powi(2) / (n - lag) as f64;
    let lb_stat = n as f64 * (n as f64 + 2.0) * q;
    let df = lag.saturating_sub(model_df).max(1);
    let lb_pvalue = match ChiSquared::new(df as f64) {
      Ok(chi) => 1.0 - chi.cdf(lb_stat),
      Err(_) => f64::NAN,
    };
    table.push(LjungBox {
      lag,
      lb_stat,
      lb_pvalue,
    });
  }
  table
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn moments() {
    let x = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
    assert_eq!(mean(&x), 5.0);
    assert_eq!(variance(&x), 4.0);
    assert_eq!(std_dev(&x), 2.0);
  }

  #[test]
  fn normal_quantile_at_95pct() {
    assert!((normal_quantile(0.975) - 1.959964).abs() < 1e-5);
    assert!((normal_cdf(0.0) - 0.5).abs() < 1e-12);
  }

  #[test]
  fn acf_of_alternating_series() {
    let x: Vec<f64> = (0..100).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
    let r = acf(&x, 3);
    assert_eq!(r.len(), 4);
    assert_eq!(r[0], 1.0);
    assert!((r[1] + 0.99).abs() < 1e-12);
    assert!((r[2] - 0.98).abs() < 1e-12);
  }

  #[test]
  fn acf_bands_widen_with_lag() {
    let r = vec![1.0, 0.5, 0.25, 0.1];
    let bands = acf_confint(&r, 100, 0.05);
    assert_eq!(bands[0], 0.0);
    assert!((bands[1] - 0.195996).abs() < 1e-5);
    assert!(bands[2] > bands[1]);
    assert!(bands[3] > bands[2]);
  }

  #[test]
  fn pacf_of_ar1_cuts_off() {
    // y_t = 0.6 y_{t-1} + e_t, deterministic pseudo-noise
    let mut y = vec![0.0];
    let mut state: u64 = 42;
    for _ in 1..5_000 {
      state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
      let e = ((state >> 11) as f64 / (1u64 << 53) as f64) - 0.5;
      let prev = *y.last().unwrap_or(&0.0);
      y.push(0.6 * prev + e);
    }
    let p = pacf(&y, 5);
    assert_eq!(p.len(), 6);
    // the first partial autocorrelation equals the first autocorrelation
    assert!((p[1] - acf(&y, 1)[1]).abs() < 1e-12);
    assert!((p[1] - 0.6).abs() < 0.05);
    for k in 2..=5 {
      assert!(p[k].abs() < 0.06, "lag {} pacf {}", k, p[k]);
    }
  }

  #[test]
  fn ljung_box_rejects_autocorrelated_residuals() {
    let x: Vec<f64> = (0..200).map(|i| (i as f64 * 0.3).sin()).collect();
    let table = ljung_box(&x, 20, 0);
    assert_eq!(table.len(), 20);
    assert_eq!(table[0].lag, 1);
    assert!(table.windows(2).all(|w| w[1].lb_stat >= w[0].lb_stat));
    assert!(table[19].lb_pvalue < 1e-6);
  }
}

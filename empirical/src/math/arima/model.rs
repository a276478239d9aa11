use super::{
  constrain_invertible, constrain_stationary, difference, integrate, partial_to_unconstrained, ArimaOrder,
  ArmaStateSpace,
};
use crate::{mean, nelder_mead, normal_cdf, normal_quantile, pacf, std_dev, AnalysisError, NelderMeadConfig};
use log::{debug, warn};
use nalgebra::{DMatrix, DVector};
use std::f64::consts::PI;
use std::fmt;

/// Unfitted ARIMA(p, d, q). A constant is estimated only when `d == 0`.
#[derive(Debug, Clone)]
pub struct Arima {
  pub order: ArimaOrder,
  pub include_mean: bool,
  pub optimizer: NelderMeadConfig,
}

/// Point forecasts with a symmetric normal interval at level `1 - alpha`.
#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
  pub mean: Vec<f64>,
  pub lower: Vec<f64>,
  pub upper: Vec<f64>,
  pub alpha: f64,
}

impl Forecast {
  pub fn len(&self) -> usize {
    self.mean.len()
  }

  pub fn is_empty(&self) -> bool {
    self.mean.is_empty()
  }
}

/// Estimated ARIMA model with everything needed to forecast from the end of its sample.
#[derive(Debug, Clone)]
pub struct ArimaFit {
  pub order: ArimaOrder,
  /// Constant of the differenced series, when estimated
  pub mean: Option<f64>,
  pub ar: Vec<f64>,
  pub ma: Vec<f64>,
  pub sigma2: f64,
  pub llf: f64,
  /// Observations after differencing
  pub nobs: usize,
  /// Standard errors in `params()` order
  pub bse: Vec<f64>,
  pub converged: bool,
  pub iterations: usize,
  history: Vec<f64>,
  innovations: Vec<f64>,
  variances: Vec<f64>,
  state: DVector<f64>,
}

struct ArmaParams {
  mean: f64,
  ar: Vec<f64>,
  ma: Vec<f64>,
}

impl Arima {
  pub fn new(order: ArimaOrder) -> Self {
    Self {
      order,
      include_mean: order.d == 0,
      optimizer: NelderMeadConfig::default(),
    }
  }

  pub fn with_mean(mut self, include_mean: bool) -> Self {
    self.include_mean = include_mean;
    self
  }

  pub fn with_optimizer(mut self, optimizer: NelderMeadConfig) -> Self {
    self.optimizer = optimizer;
    self
  }

  /// Optimizer coordinates: `[mean / scale]`, unconstrained AR, unconstrained MA.
  fn unpack(&self, x: &[f64], scale: f64) -> ArmaParams {
    let ArimaOrder { p, q, .. } = self.order;
    let offset = self.include_mean as usize;
    ArmaParams {
      mean: match self.include_mean {
        true => x[0] * scale,
        false => 0.0,
      },
      ar: constrain_stationary(&x[offset..offset + p]),
      ma: constrain_invertible(&x[offset + p..offset + p + q]),
    }
  }

  /// Exact maximum likelihood fit on the levels `y`.
  pub fn fit(&self, y: &[f64]) -> Result<ArimaFit, AnalysisError> {
    let ArimaOrder { p, d, q } = self.order;
    let needed = p + d + q + 3;
    if y.len() < needed {
      return Err(AnalysisError::InsufficientData { needed, got: y.len() });
    }
    let w = difference(y, d);
    let scale = std_dev(&w);
    if !scale.is_finite() {
      return Err(AnalysisError::InsufficientData { needed, got: 0 });
    }
    if scale == 0.0 {
      return Err(AnalysisError::ConstantSeries);
    }
    let n = w.len() as f64;

    let mut initial = vec![];
    if self.include_mean {
      initial.push(mean(&w) / scale);
    }
    let partial = pacf(&w, p);
    initial.extend(partial_to_unconstrained(partial.get(1..).unwrap_or(&[])));
    initial.resize(self.include_mean as usize + p, 0.0);
    initial.extend(std::iter::repeat(0.0).take(q));

    let objective = |x: &[f64]| {
      let params = self.unpack(x, scale);
      let demeaned: Vec<f64> = w.iter().map(|v| v - params.mean).collect();
      match ArmaStateSpace::new(&params.ar, &params.ma).filter(&demeaned) {
        Ok(out) => -out.loglik() / n,
        Err(_) => f64::INFINITY,
      }
    };
    let best = nelder_mead(objective, &initial, &self.optimizer);
    if !best.converged {
      warn!(
        "ARIMA{} optimizer stopped after {} iterations without converging",
        self.order, best.iterations
      );
    }

    let params = self.unpack(&best.point, scale);
    let demeaned: Vec<f64> = w.iter().map(|v| v - params.mean).collect();
    let out = ArmaStateSpace::new(&params.ar, &params.ma).filter(&demeaned)?;
    let sigma2 = out.sigma2();
    let llf = out.loglik();
    debug!("ARIMA{} llf {} sigma2 {}", self.order, llf, sigma2);

    let mut estimates = vec![];
    if self.include_mean {
      estimates.push(params.mean);
    }
    estimates.extend(params.ar.iter().chain(params.ma.iter()));
    estimates.push(sigma2);
    let bse = standard_errors(&w, &estimates, self.include_mean, p, scale);

    Ok(ArimaFit {
      order: self.order,
      mean: self.include_mean.then_some(params.mean),
      ar: params.ar,
      ma: params.ma,
      sigma2,
      llf,
      nobs: w.len(),
      bse,
      converged: best.converged,
      iterations: best.iterations,
      history: y.to_vec(),
      innovations: out.innovations,
      variances: out.variances,
      state: out.state,
    })
  }
}

/// Log-likelihood with sigma2 as a free parameter.
/// `theta` is `[mean?, ar.., ma.., sigma2]`.
fn full_loglik(w: &[f64], theta: &[f64], include_mean: bool, p: usize) -> f64 {
  let offset = include_mean as usize;
  let k = theta.len();
  let sigma2 = theta[k - 1];
  if sigma2 <= 0.0 {
    return f64::NAN;
  }
  let mu = match include_mean {
    true => theta[0],
    false => 0.0,
  };
  let ar = &theta[offset..offset + p];
  let ma = &theta[offset + p..k - 1];
  let demeaned: Vec<f64> = w.iter().map(|v| v - mu).collect();
  match ArmaStateSpace::new(ar, ma).filter(&demeaned) {
    Ok(out) => {
      let n = out.nobs() as f64;
      let ssq: f64 = out
        .innovations
        .iter()
        .zip(out.variances.iter())
        .map(|(v, f)| v * v / f)
        .sum();
      let sum_log_f: f64 = out.variances.iter().map(|f| f.ln()).sum();
      -0.5 * n * (2.0 * PI * sigma2).ln() - 0.5 * sum_log_f - 0.5 * ssq / sigma2
    }
    Err(_) => f64::NAN,
  }
}

/// Square roots of the diagonal of the inverse negative Hessian, by central differences.
fn standard_errors(w: &[f64], theta: &[f64], include_mean: bool, p: usize, scale: f64) -> Vec<f64> {
  let k = theta.len();
  let steps: Vec<f64> = theta
    .iter()
    .enumerate()
    .map(|(i, x)| {
      let floor = match i {
        0 if include_mean => scale,
        i if i == k - 1 => x.abs(),
        _ => 1.0,
      };
      1e-4 * x.abs().max(floor)
    })
    .collect();
  let eval = |shift: &[(usize, f64)]| {
    let mut point = theta.to_vec();
    for (i, delta) in shift {
      point[*i] += delta;
    }
    full_loglik(w, &point, include_mean, p)
  };

  let mut hessian = DMatrix::<f64>::zeros(k, k);
  for i in 0..k {
    for j in i..k {
      let (hi, hj) = (steps[i], steps[j]);
      let value = (eval(&[(i, hi), (j, hj)]) - eval(&[(i, hi), (j, -hj)]) - eval(&[(i, -hi), (j, hj)])
        + eval(&[(i, -hi), (j, -hj)]))
        / (4.0 * hi * hj);
      hessian[(i, j)] = value;
      hessian[(j, i)] = value;
    }
  }
  if hessian.iter().any(|v| !v.is_finite()) {
    warn!("Hessian is not finite at the estimate, standard errors unavailable");
    return vec![f64::NAN; k];
  }
  match (-hessian).try_inverse() {
    Some(cov) => (0..k)
      .map(|i| match cov[(i, i)] > 0.0 {
        true => cov[(i, i)].sqrt(),
        false => f64::NAN,
      })
      .collect(),
    None => {
      warn!("Hessian is singular at the estimate, standard errors unavailable");
      vec![f64::NAN; k]
    }
  }
}

impl ArimaFit {
  /// Estimates in the order `const, ar.L1.., ma.L1.., sigma2`.
  pub fn params(&self) -> Vec<f64> {
    let mut out: Vec<f64> = self.mean.into_iter().collect();
    out.extend(self.ar.iter().chain(self.ma.iter()));
    out.push(self.sigma2);
    out
  }

  pub fn param_names(&self) -> Vec<String> {
    let mut names: Vec<String> = self.mean.map(|_| "const".to_string()).into_iter().collect();
    names.extend((1..=self.ar.len()).map(|i| format!("ar.L{}", i)));
    names.extend((1..=self.ma.len()).map(|i| format!("ma.L{}", i)));
    names.push("sigma2".to_string());
    names
  }

  fn k(&self) -> f64 {
    self.params().len() as f64
  }

  pub fn aic(&self) -> f64 {
    -2.0 * self.llf + 2.0 * self.k()
  }

  pub fn bic(&self) -> f64 {
    -2.0 * self.llf + (self.nobs as f64).ln() * self.k()
  }

  pub fn hqic(&self) -> f64 {
    -2.0 * self.llf + 2.0 * (self.nobs as f64).ln().ln() * self.k()
  }

  /// One-step-ahead prediction errors of the differenced series.
  pub fn resid(&self) -> &[f64] {
    &self.innovations
  }

  pub fn standardized_resid(&self) -> Vec<f64> {
    self
      .innovations
      .iter()
      .zip(self.variances.iter())
      .map(|(v, f)| v / (self.sigma2 * f).sqrt())
      .collect()
  }

  /// MA(inf) weights of `theta(B) / (phi(B) (1 - B)^d)`.
  pub fn psi_weights(&self, n: usize) -> Vec<f64> {
    // 1 - a_1 B - .. as polynomial coefficients, then times (1 - B) d times
    let mut poly: Vec<f64> = std::iter::once(1.0).chain(self.ar.iter().map(|a| -a)).collect();
    for _ in 0..self.order.d {
      let mut next = vec![0.0; poly.len() + 1];
      for (i, c) in poly.iter().enumerate() {
        next[i] += c;
        next[i + 1] -= c;
      }
      poly = next;
    }
    let phi: Vec<f64> = poly.iter().skip(1).map(|c| -c).collect();

    let mut psi = Vec::with_capacity(n);
    for j in 0..n {
      if j == 0 {
        psi.push(1.0);
        continue;
      }
      let theta = self.ma.get(j - 1).copied().unwrap_or(0.0);
      let ar_part: f64 = (1..=j.min(phi.len())).map(|i| phi[i - 1] * psi[j - i]).sum();
      psi.push(theta + ar_part);
    }
    psi
  }

  /// Forecast `steps` periods past the end of the sample, on the scale of the fitted levels.
  pub fn forecast(&self, steps: usize, alpha: f64) -> Forecast {
    let ss = ArmaStateSpace::new(&self.ar, &self.ma);
    let mu = self.mean.unwrap_or(0.0);
    let differenced: Vec<f64> = ss.forecast(&self.state, steps).iter().map(|v| v + mu).collect();
    let mean = integrate(&differenced, &self.history, self.order.d);

    let z = normal_quantile(1.0 - alpha / 2.0);
    let mut cumulative = 0.0;
    let mut lower = Vec::with_capacity(steps);
    let mut upper = Vec::with_capacity(steps);
    for (psi, m) in self.psi_weights(steps).iter().zip(mean.iter()) {
      cumulative += psi * psi;
      let half = z * (self.sigma2 * cumulative).sqrt();
      lower.push(m - half);
      upper.push(m + half);
    }
    Forecast {
      mean,
      lower,
      upper,
      alpha,
    }
  }

  /// Predictions for positions `start..end` of the fitted levels: one step ahead inside
  /// the sample, forecasts past its end. The first `d` positions have no prediction.
  pub fn predict(&self, start: usize, end: usize) -> Vec<f64> {
    let n = self.history.len();
    let d = self.order.d;
    let ahead = match end > n {
      true => self.forecast(end - n, 0.05).mean,
      false => vec![],
    };
    (start..end)
      .map(|t| match t {
        t if t < d => f64::NAN,
        t if t < n => self.history[t] - self.innovations[t - d],
        t => ahead[t - n],
      })
      .collect()
  }
}

impl fmt::Display for ArimaFit {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let rule = "=".repeat(72);
    writeln!(f, "{:^72}", "ARIMA Results")?;
    writeln!(f, "{}", rule)?;
    writeln!(f, "{:<22}{:>14}   {:<18}{:>14.3}", "Model:", format!("ARIMA{}", self.order), "Log Likelihood", self.llf)?;
    writeln!(f, "{:<22}{:>14}   {:<18}{:>14.3}", "No. Observations:", self.nobs, "AIC", self.aic())?;
    writeln!(f, "{:<22}{:>14}   {:<18}{:>14.3}", "Converged:", self.converged, "BIC", self.bic())?;
    writeln!(f, "{:<22}{:>14}   {:<18}{:>14.3}", "Iterations:", self.iterations, "HQIC", self.hqic())?;
    writeln!(f, "{}", rule)?;
    writeln!(f, "{:<12}{:>15}{:>15}{:>15}{:>15}", "", "coef", "std err", "z", "P>|z|")?;
    writeln!(f, "{}", "-".repeat(72))?;
    for ((name, coef), se) in self.param_names().iter().zip(self.params()).zip(self.bse.iter()) {
      let z = coef / se;
      let p_value = 2.0 * (1.0 - normal_cdf(z.abs()));
      writeln!(f, "{:<12}{:>15.6e}{:>15.6e}{:>15.3}{:>15.3}", name, coef, se, z, p_value)?;
    }
    write!(f, "{}", rule)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  /// Deterministic uniform noise with unit variance.
  fn noise(n: usize, seed: u64) -> Vec<f64> {
    let mut state = seed;
    (0..n)
      .map(|_| {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (((state >> 11) as f64 / (1u64 << 53) as f64) - 0.5) * 12f64.sqrt()
      })
      .collect()
  }

  fn ar1(phi: f64, n: usize, seed: u64) -> Vec<f64> {
    let e = noise(n, seed);
    let mut y = vec![e[0]];
    for t in 1..n {
      y.push(phi * y[t - 1] + e[t]);
    }
    y
  }

  #[test]
  fn recovers_ar1_coefficient() -> anyhow::Result<()> {
    let y: Vec<f64> = ar1(0.6, 2_000, 5).iter().map(|v| v + 3.0).collect();
    let fit = Arima::new(ArimaOrder::new(1, 0, 0)).fit(&y)?;
    assert!((fit.ar[0] - 0.6).abs() < 0.05, "ar {:?}", fit.ar);
    assert!((fit.mean.unwrap_or_default() - 3.0).abs() < 0.2);
    assert!((fit.sigma2 - 1.0).abs() < 0.1);
    assert_eq!(fit.param_names(), vec!["const", "ar.L1", "sigma2"]);
    assert!(fit.bse.iter().all(|se| se.is_finite() && *se > 0.0));
    Ok(())
  }

  #[test]
  fn recovers_ma1_on_integrated_series() -> anyhow::Result<()> {
    let e = noise(3_001, 9);
    let w: Vec<f64> = (1..e.len()).map(|t| e[t] + 0.4 * e[t - 1]).collect();
    let y: Vec<f64> = w
      .iter()
      .scan(100.0, |acc, v| {
        *acc += v;
        Some(*acc)
      })
      .collect();
    let fit = Arima::new(ArimaOrder::new(0, 1, 1)).fit(&y)?;
    assert!(fit.mean.is_none());
    assert!((fit.ma[0] - 0.4).abs() < 0.06, "ma {:?}", fit.ma);
    assert_eq!(fit.nobs, y.len() - 1);
    assert_eq!(fit.resid().len(), y.len() - 1);
    Ok(())
  }

  #[test]
  fn forecast_interval_widens() -> anyhow::Result<()> {
    let y = ar1(0.5, 500, 1);
    let fit = Arima::new(ArimaOrder::new(1, 0, 0)).fit(&y)?;
    let fc = fit.forecast(30, 0.05);
    assert_eq!(fc.len(), 30);
    for h in 0..30 {
      assert!(fc.lower[h] < fc.mean[h] && fc.mean[h] < fc.upper[h]);
    }
    let width = |h: usize| fc.upper[h] - fc.lower[h];
    assert!(width(29) > width(0));
    // first step width is 2 z sigma
    assert!((width(0) - 2.0 * 1.959964 * fit.sigma2.sqrt()).abs() < 1e-4);
    // stationary forecasts revert to the mean
    assert!((fc.mean[29] - fit.mean.unwrap_or_default()).abs() < 1e-6);
    Ok(())
  }

  #[test]
  fn random_walk_forecast_is_flat() -> anyhow::Result<()> {
    let y: Vec<f64> = noise(400, 3)
      .iter()
      .scan(0.0, |acc, v| {
        *acc += v;
        Some(*acc)
      })
      .collect();
    let fit = Arima::new(ArimaOrder::new(0, 1, 0)).fit(&y)?;
    let fc = fit.forecast(5, 0.05);
    let last = y[y.len() - 1];
    assert!(fc.mean.iter().all(|m| (m - last).abs() < 1e-12));
    // psi weights of a random walk are all one
    assert_eq!(fit.psi_weights(4), vec![1.0; 4]);
    Ok(())
  }

  #[test]
  fn predict_spans_sample_and_future() -> anyhow::Result<()> {
    let y = ar1(0.3, 300, 2);
    let fit = Arima::new(ArimaOrder::new(0, 1, 1)).fit(&y)?;
    let pred = fit.predict(0, 310);
    assert_eq!(pred.len(), 310);
    assert!(pred[0].is_nan());
    assert!(pred[1..].iter().all(|v| v.is_finite()));
    let fc = fit.forecast(10, 0.05);
    assert_eq!(&pred[300..], fc.mean.as_slice());
    let window = fit.predict(300, 310);
    assert_eq!(window, fc.mean);
    Ok(())
  }

  #[test]
  fn summary_lists_parameters() -> anyhow::Result<()> {
    let y = ar1(0.2, 300, 4);
    let fit = Arima::new(ArimaOrder::new(1, 0, 1)).fit(&y)?;
    let summary = fit.to_string();
    for label in ["ARIMA(1,0,1)", "const", "ar.L1", "ma.L1", "sigma2", "AIC", "BIC", "HQIC"] {
      assert!(summary.contains(label), "missing {}", label);
    }
    assert!(fit.aic() < fit.bic());
    Ok(())
  }

  #[test]
  fn rejects_short_and_constant_series() {
    let arima = Arima::new(ArimaOrder::new(2, 1, 2));
    assert!(matches!(
      arima.fit(&[1.0, 2.0, 3.0]),
      Err(AnalysisError::InsufficientData { .. })
    ));
    assert!(matches!(
      Arima::new(ArimaOrder::new(0, 0, 1)).fit(&[2.0; 20]),
      Err(AnalysisError::ConstantSeries)
    ));
  }
}

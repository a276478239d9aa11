use crate::AnalysisError;
use nalgebra::{DMatrix, DVector};

const STEADY_STATE_TOL: f64 = 1e-12;

/// ARMA(p, q) in Harvey's state space form, observed without noise:
/// `y_t = z' a_t`, `a_t+1 = T a_t + R e_t` with `z = e_1`, state dimension `max(p, q + 1)`.
#[derive(Debug, Clone)]
pub struct ArmaStateSpace {
  pub transition: DMatrix<f64>,
  pub selection: DVector<f64>,
}

/// One pass of the Kalman filter over a (demeaned) series.
#[derive(Debug, Clone)]
pub struct KalmanOutput {
  /// One-step-ahead prediction errors
  pub innovations: Vec<f64>,
  /// Their variances relative to sigma2
  pub variances: Vec<f64>,
  /// State prediction for the first period after the sample
  pub state: DVector<f64>,
  pub covariance: DMatrix<f64>,
}

impl ArmaStateSpace {
  pub fn new(ar: &[f64], ma: &[f64]) -> Self {
    let r = ar.len().max(ma.len() + 1);
    let mut transition = DMatrix::zeros(r, r);
    for (i, phi) in ar.iter().enumerate() {
      transition[(i, 0)] = *phi;
    }
    for i in 0..r - 1 {
      transition[(i, i + 1)] = 1.0;
    }
    let mut selection = DVector::zeros(r);
    selection[0] = 1.0;
    for (j, theta) in ma.iter().enumerate() {
      selection[j + 1] = *theta;
    }
    Self {
      transition,
      selection,
    }
  }

  pub fn dim(&self) -> usize {
    self.selection.len()
  }

  /// Unconditional state covariance for unit innovation variance,
  /// the solution of `P = T P T' + R R'`.
  pub fn initial_covariance(&self) -> Result<DMatrix<f64>, AnalysisError> {
    let r = self.dim();
    let rr = &self.selection * self.selection.transpose();
    let lhs = DMatrix::<f64>::identity(r * r, r * r) - self.transition.kronecker(&self.transition);
    let rhs = DVector::from_column_slice(rr.as_slice());
    let vec_p = lhs.lu().solve(&rhs).ok_or(AnalysisError::SingularMatrix)?;
    Ok(DMatrix::from_column_slice(r, r, vec_p.as_slice()))
  }

  pub fn filter(&self, y: &[f64]) -> Result<KalmanOutput, AnalysisError> {
    let t = &self.transition;
    let t_transpose = t.transpose();
    let rr = &self.selection * self.selection.transpose();
    let mut a: DVector<f64> = DVector::zeros(self.dim());
    let mut p = self.initial_covariance()?;
    // gain and prediction variance stop changing once P converges
    let mut steady = false;
    let mut f = 0.0;
    let mut k: DVector<f64> = DVector::zeros(self.dim());

    let mut innovations = Vec::with_capacity(y.len());
    let mut variances = Vec::with_capacity(y.len());
    for obs in y {
      if !steady {
        f = p[(0, 0)];
        if !f.is_finite() || f <= 0.0 {
          return Err(AnalysisError::SingularMatrix);
        }
        k = (t * p.column(0)) / f;
      }
      let v = obs - a[0];
      a = t * &a + &k * v;
      if !steady {
        let next = t * &p * &t_transpose + &rr - &k * k.transpose() * f;
        steady = (&next - &p).amax() < STEADY_STATE_TOL;
        p = next;
      }
      innovations.push(v);
      variances.push(f);
    }

    Ok(KalmanOutput {
      innovations,
      variances,
      state: a,
      covariance: p,
    })
  }

  /// Point forecasts of the observed series for `steps` periods after the sample.
  pub fn forecast(&self, state: &DVector<f64>, steps: usize) -> Vec<f64> {
    let mut a = state.clone();
    let mut out = Vec::with_capacity(steps);
    for _ in 0..steps {
      out.push(a[0]);
      a = &self.transition * &a;
    }
    out
  }
}

impl KalmanOutput {
  pub fn nobs(&self) -> usize {
    self.innovations.len()
  }

  /// Maximum likelihood innovation variance.
  pub fn sigma2(&self) -> f64 {
    let ssq: f64 = self
      .innovations
      .iter()
      .zip(self.variances.iter())
      .map(|(v, f)| v * v / f)
      .sum();
    ssq / self.nobs() as f64
  }

  /// Gaussian log-likelihood with sigma2 concentrated out.
  pub fn loglik(&self) -> f64 {
    let n = self.nobs() as f64;
    let sum_log_f: f64 = self.variances.iter().map(|f| f.ln()).sum();
    -0.5 * n * ((2.0 * std::f64::consts::PI).ln() + 1.0 + self.sigma2().ln()) - 0.5 * sum_log_f
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn ar1_initial_variance() -> anyhow::Result<()> {
    let ss = ArmaStateSpace::new(&[0.5], &[]);
    let p0 = ss.initial_covariance()?;
    assert!((p0[(0, 0)] - 1.0 / 0.75).abs() < 1e-12);
    Ok(())
  }

  #[test]
  fn ma1_initial_variance() -> anyhow::Result<()> {
    let ss = ArmaStateSpace::new(&[], &[0.4]);
    assert_eq!(ss.dim(), 2);
    let p0 = ss.initial_covariance()?;
    // var(y) = 1 + theta^2
    assert!((p0[(0, 0)] - 1.16).abs() < 1e-12);
    Ok(())
  }

  #[test]
  fn white_noise_filter_passes_through() -> anyhow::Result<()> {
    let ss = ArmaStateSpace::new(&[], &[]);
    let y = [0.5, -1.0, 2.0, 0.0];
    let out = ss.filter(&y)?;
    assert_eq!(out.innovations, y.to_vec());
    assert!(out.variances.iter().all(|f| (*f - 1.0).abs() < 1e-15));
    assert!((out.sigma2() - 5.25 / 4.0).abs() < 1e-12);
    Ok(())
  }

  #[test]
  fn ar1_innovations_after_first_step() -> anyhow::Result<()> {
    let ss = ArmaStateSpace::new(&[0.8], &[]);
    let y = [1.0, 2.0, 0.5, -1.0];
    let out = ss.filter(&y)?;
    assert_eq!(out.innovations[0], 1.0);
    assert!((out.variances[0] - 1.0 / 0.36).abs() < 1e-12);
    for t in 1..y.len() {
      assert!((out.innovations[t] - (y[t] - 0.8 * y[t - 1])).abs() < 1e-12);
      assert!((out.variances[t] - 1.0).abs() < 1e-12);
    }
    let path = ss.forecast(&out.state, 3);
    assert!((path[0] - 0.8 * -1.0).abs() < 1e-12);
    assert!((path[2] - 0.8_f64.powi(3) * -1.0).abs() < 1e-12);
    Ok(())
  }
}

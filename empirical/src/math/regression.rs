use crate::AnalysisError;
use nalgebra::{DMatrix, DVector};

/// Result of an ordinary least squares regression `y = X b + e`.
#[derive(Debug, Clone)]
pub struct OlsFit {
  pub params: Vec<f64>,
  /// Standard errors of `params`
  pub bse: Vec<f64>,
  pub tvalues: Vec<f64>,
  /// Residual sum of squares
  pub ssr: f64,
  pub nobs: usize,
  /// Gaussian log-likelihood at the estimate
  pub llf: f64,
}

impl OlsFit {
  pub fn k(&self) -> usize {
    self.params.len()
  }

  pub fn aic(&self) -> f64 {
    -2.0 * self.llf + 2.0 * self.k() as f64
  }

  pub fn bic(&self) -> f64 {
    -2.0 * self.llf + (self.nobs as f64).ln() * self.k() as f64
  }
}

/// Fit `y` on the columns of the row-major `design` (one inner vec per observation).
pub fn ols(y: &[f64], design: &[Vec<f64>]) -> Result<OlsFit, AnalysisError> {
  let n = y.len();
  let k = design.first().map(|row| row.len()).unwrap_or(0);
  if n != design.len() {
    return Err(AnalysisError::LengthMismatch {
      actual: n,
      predicted: design.len(),
    });
  }
  if k == 0 || n <= k {
    return Err(AnalysisError::InsufficientData {
      needed: k + 1,
      got: n,
    });
  }

  let x = DMatrix::from_fn(n, k, |i, j| design[i][j]);
  let y_vector = DVector::from_column_slice(y);

  let xtx_inv = (x.transpose() * &x)
    .try_inverse()
    .ok_or(AnalysisError::SingularMatrix)?;
  let beta = &xtx_inv * x.transpose() * &y_vector;

  let resid = &y_vector - &x * &beta;
  let ssr = resid.dot(&resid);
  let sigma2 = ssr / (n - k) as f64;
  let bse: Vec<f64> = (0..k).map(|j| (sigma2 * xtx_inv[(j, j)]).sqrt()).collect();
  let params: Vec<f64> = beta.iter().copied().collect();
  let tvalues = params.iter().zip(bse.iter()).map(|(b, se)| b / se).collect();

  let nobs = n as f64;
  let llf = -nobs / 2.0 * ((2.0 * std::f64::consts::PI).ln() + (ssr / nobs).ln() + 1.0);

  Ok(OlsFit {
    params,
    bse,
    tvalues,
    ssr,
    nobs: n,
    llf,
  })
}

/// Least squares line through `(x, y)`, returned as `(slope, intercept)`.
pub fn linear_fit(x: &[f64], y: &[f64]) -> Result<(f64, f64), AnalysisError> {
  if x.len() != y.len() {
    return Err(AnalysisError::LengthMismatch {
      actual: x.len(),
      predicted: y.len(),
    });
  }
  linreg::linear_regression(x, y).map_err(|_| AnalysisError::InsufficientData {
    needed: 2,
    got: x.len(),
  })
}

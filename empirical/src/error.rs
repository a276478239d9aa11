use thiserror::Error;

/// Failures with a numerical or data meaning. Everything else travels as `anyhow::Error`.
#[derive(Debug, Error)]
pub enum AnalysisError {
  #[error("insufficient data: need at least {needed} observations, got {got}")]
  InsufficientData { needed: usize, got: usize },
  #[error("split index {cut} is out of range for a series of length {len}")]
  InvalidSplit { cut: usize, len: usize },
  #[error("length mismatch: {actual} actual values vs {predicted} predicted values")]
  LengthMismatch { actual: usize, predicted: usize },
  #[error("matrix is singular and cannot be inverted")]
  SingularMatrix,
  #[error("multiplicative model requires strictly positive values")]
  NonPositive,
  #[error("series has zero variance")]
  ConstantSeries,
  #[error("invalid ARIMA order: {0}")]
  InvalidOrder(String),
  #[error("market data provider: {0}")]
  Provider(String),
}

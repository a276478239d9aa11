use crate::AnalysisError;

fn check(actual: &[f64], predicted: &[f64]) -> Result<(), AnalysisError> {
  if actual.len() != predicted.len() {
    return Err(AnalysisError::LengthMismatch {
      actual: actual.len(),
      predicted: predicted.len(),
    });
  }
  if actual.is_empty() {
    return Err(AnalysisError::InsufficientData { needed: 1, got: 0 });
  }
  Ok(())
}

/// Mean absolute error.
pub fn mae(actual: &[f64], predicted: &[f64]) -> Result<f64, AnalysisError> {
  check(actual, predicted)?;
  let sum: f64 = actual
    .iter()
    .zip(predicted.iter())
    .map(|(a, p)| (a - p).abs())
    .sum();
  Ok(sum / actual.len() as f64)
}

/// Mean squared error.
pub fn mse(actual: &[f64], predicted: &[f64]) -> Result<f64, AnalysisError> {
  check(actual, predicted)?;
  let sum: f64 = actual
    .iter()
    .zip(predicted.iter())
    .map(|(a, p)| (a - p).powi(2))
    .sum();
  Ok(sum / actual.len() as f64)
}

/// Root mean squared error.
pub fn rmse(actual: &[f64], predicted: &[f64]) -> Result<f64, AnalysisError> {
  Ok(mse(actual, predicted)?.sqrt())
}

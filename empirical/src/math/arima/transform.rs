//! Maps between unconstrained optimizer coordinates and stationary AR /
//! invertible MA coefficients, through partial autocorrelations in (-1, 1).

const MAX_PARTIAL: f64 = 0.995;

/// Durbin-Levinson: partial autocorrelations to AR coefficients of `1 - phi_1 B - .. - phi_p B^p`.
fn partial_to_coefficients(partial: &[f64]) -> Vec<f64> {
  let mut phi: Vec<f64> = vec![];
  for (k, rk) in partial.iter().enumerate() {
    let mut next: Vec<f64> = (0..k).map(|j| phi[j] - rk * phi[k - 1 - j]).collect();
    next.push(*rk);
    phi = next;
  }
  phi
}

/// Inverse of `partial_to_coefficients`.
fn coefficients_to_partial(coefs: &[f64]) -> Vec<f64> {
  let p = coefs.len();
  let mut phi = coefs.to_vec();
  let mut partial = vec![0.0; p];
  for k in (0..p).rev() {
    let rk = phi[k].clamp(-MAX_PARTIAL, MAX_PARTIAL);
    partial[k] = rk;
    let denom = 1.0 - rk * rk;
    phi = (0..k).map(|j| (phi[j] + rk * phi[k - 1 - j]) / denom).collect();
  }
  partial
}

/// Unconstrained reals to coefficients of a stationary AR polynomial.
pub fn constrain_stationary(unconstrained: &[f64]) -> Vec<f64> {
  let partial: Vec<f64> = unconstrained
    .iter()
    .map(|x| x / (1.0 + x * x).sqrt())
    .collect();
  partial_to_coefficients(&partial)
}

pub fn unconstrain_stationary(coefs: &[f64]) -> Vec<f64> {
  coefficients_to_partial(coefs)
    .iter()
    .map(|r| r / (1.0 - r * r).sqrt())
    .collect()
}

/// Unconstrained reals to coefficients of an invertible MA polynomial `1 + theta_1 B + ..`.
pub fn constrain_invertible(unconstrained: &[f64]) -> Vec<f64> {
  constrain_stationary(unconstrained)
    .into_iter()
    .map(|c| -c)
    .collect()
}

pub fn unconstrain_invertible(coefs: &[f64]) -> Vec<f64> {
  let negated: Vec<f64> = coefs.iter().map(|c| -c).collect();
  unconstrain_stationary(&negated)
}

/// Seeds for the AR part from partial autocorrelations (Yule-Walker).
pub fn partial_to_unconstrained(partial: &[f64]) -> Vec<f64> {
  partial
    .iter()
    .map(|r| {
      let r = if r.is_finite() { r.clamp(-0.95, 0.95) } else { 0.0 };
      r / (1.0 - r * r).sqrt()
    })
    .collect()
}

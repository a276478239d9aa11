use log::debug;

#[derive(Debug, Clone)]
pub struct NelderMeadConfig {
  pub max_iter: usize,
  /// Stop once the spread of objective values across the simplex falls below this
  pub tolerance: f64,
  /// Edge length of the initial simplex
  pub initial_step: f64,
}

impl Default for NelderMeadConfig {
  fn default() -> Self {
    Self {
      max_iter: 2_000,
      tolerance: 1e-10,
      initial_step: 0.1,
    }
  }
}

#[derive(Debug, Clone)]
pub struct NelderMeadResult {
  pub point: Vec<f64>,
  pub value: f64,
  pub iterations: usize,
  pub converged: bool,
}

const ALPHA: f64 = 1.0;
const GAMMA: f64 = 2.0;
const RHO: f64 = 0.5;
const SIGMA: f64 = 0.5;

/// Minimize `objective` with the Nelder-Mead simplex method.
/// Non-finite objective values are treated as `+inf`, so infeasible points are simply avoided.
pub fn nelder_mead<F>(objective: F, initial: &[f64], config: &NelderMeadConfig) -> NelderMeadResult
where
  F: Fn(&[f64]) -> f64,
{
  let f = |p: &[f64]| {
    let v = objective(p);
    match v.is_finite() {
      true => v,
      false => f64::INFINITY,
    }
  };
  let n = initial.len();
  if n == 0 {
    return NelderMeadResult {
      point: vec![],
      value: f(initial),
      iterations: 0,
      converged: true,
    };
  }

  let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
  simplex.push(initial.to_vec());
  for i in 0..n {
    let mut vertex = initial.to_vec();
    vertex[i] += config.initial_step;
    simplex.push(vertex);
  }
  let mut values: Vec<f64> = simplex.iter().map(|v| f(v)).collect();

  let mut iterations = 0;
  let mut converged = false;
  while iterations < config.max_iter {
    iterations += 1;

    let mut order: Vec<usize> = (0..=n).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    simplex = order.iter().map(|&i| simplex[i].clone()).collect();
    values = order.iter().map(|&i| values[i]).collect();

    if (values[n] - values[0]).abs() <= config.tolerance * (1.0 + values[0].abs()) {
      converged = true;
      break;
    }

    let centroid: Vec<f64> = (0..n)
      .map(|j| simplex[..n].iter().map(|v| v[j]).sum::<f64>() / n as f64)
      .collect();
    let toward = |from: &[f64], coef: f64| -> Vec<f64> {
      centroid
        .iter()
        .zip(from.iter())
        .map(|(c, x)| c + coef * (x - c))
        .collect()
    };

    let reflected = toward(&simplex[n], -ALPHA);
    let reflected_value = f(&reflected);

    if reflected_value < values[0] {
      let expanded = toward(&simplex[n], -ALPHA * GAMMA);
      let expanded_value = f(&expanded);
      match expanded_value < reflected_value {
        true => {
          simplex[n] = expanded;
          values[n] = expanded_value;
        }
        false => {
          simplex[n] = reflected;
          values[n] = reflected_value;
        }
      }
      continue;
    }
    if reflected_value < values[n - 1] {
      simplex[n] = reflected;
      values[n] = reflected_value;
      continue;
    }

    let (contracted, contracted_value) = match reflected_value < values[n] {
      // outside contraction
      true => {
        let c = toward(&simplex[n], -ALPHA * RHO);
        let v = f(&c);
        (c, v)
      }
      // inside contraction
      false => {
        let c = toward(&simplex[n], RHO);
        let v = f(&c);
        (c, v)
      }
    };
    if contracted_value < values[n].min(reflected_value) {
      simplex[n] = contracted;
      values[n] = contracted_value;
      continue;
    }

    // shrink toward the best vertex
    let best = simplex[0].clone();
    for i in 1..=n {
      simplex[i] = best
        .iter()
        .zip(simplex[i].iter())
        .map(|(b, x)| b + SIGMA * (x - b))
        .collect();
      values[i] = f(&simplex[i]);
    }
  }

  let best = (0..=n)
    .min_by(|&a, &b| values[a].total_cmp(&values[b]))
    .unwrap_or(0);
  debug!(
    "Nelder-Mead finished after {} iterations (converged: {}) at {}",
    iterations, converged, values[best]
  );
  NelderMeadResult {
    point: simplex[best].clone(),
    value: values[best],
    iterations,
    converged,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn minimizes_rosenbrock() {
    let rosenbrock = |p: &[f64]| (1.0 - p[0]).powi(2) + 100.0 * (p[1] - p[0].powi(2)).powi(2);
    let config = NelderMeadConfig {
      max_iter: 10_000,
      tolerance: 1e-14,
      initial_step: 0.5,
    };
    let res = nelder_mead(rosenbrock, &[-1.2, 1.0], &config);
    assert!(res.converged);
    assert!((res.point[0] - 1.0).abs() < 1e-3);
    assert!((res.point[1] - 1.0).abs() < 1e-3);
  }

  #[test]
  fn avoids_infeasible_region() {
    // log barrier: undefined for x <= 0
    let objective = |p: &[f64]| p[0] - 2.0 * p[0].ln();
    let res = nelder_mead(objective, &[0.5], &NelderMeadConfig::default());
    assert!((res.point[0] - 2.0).abs() < 1e-3);
  }
}

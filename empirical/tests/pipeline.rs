use empirical::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use statrs::distribution::Normal;

/// Daily bars of a geometric random walk with normal log returns.
fn synthetic_bars(n: usize, seed: u64) -> anyhow::Result<Vec<Bar>> {
  let mut rng = StdRng::seed_from_u64(seed);
  let normal = Normal::new(0.0004, 0.011)?;
  let start = Time::new(1990, 1, 2);
  let mut price = 359.69;
  let mut bars = Vec::with_capacity(n);
  for i in 0..n {
    if i > 0 {
      price *= rand::distributions::Distribution::sample(&normal, &mut rng).exp();
    }
    bars.push(Bar {
      date: start.delta_date(i as i64)?,
      open: price,
      high: price,
      low: price,
      close: price,
      adj_close: price,
      volume: Some(1_000.0),
    });
  }
  Ok(bars)
}

#[test]
fn log_returns_drop_exactly_one_row() -> anyhow::Result<()> {
  let bars = synthetic_bars(250, 1)?;
  let prices = Dataset::from_bars(&bars, PriceField::AdjClose)?;
  let returns = prices.log_returns();
  assert_eq!(returns.len(), prices.len() - 1);
  let p = prices.y();
  assert!((returns.y()[0] - (p[1].ln() - p[0].ln())).abs() < 1e-15);
  assert_eq!(returns.first().map(|d| d.x), Some(prices.0[1].x));
  Ok(())
}

#[test]
fn missing_prices_are_dropped_before_returns() -> anyhow::Result<()> {
  let mut bars = synthetic_bars(20, 2)?;
  bars[5].adj_close = f64::NAN;
  let prices = Dataset::from_bars(&bars, PriceField::AdjClose)?;
  assert_eq!(prices.len(), 19);
  assert_eq!(prices.log_returns().len(), 18);
  Ok(())
}

#[test]
fn split_is_contiguous_and_complete() -> anyhow::Result<()> {
  let returns = Dataset::from_bars(&synthetic_bars(120, 3)?, PriceField::AdjClose)?.log_returns();
  let (train, test) = returns.split_at(returns.len() - 30)?;
  assert_eq!(test.len(), 30);
  let mut joined = train.0.clone();
  joined.extend(test.0.iter().copied());
  assert_eq!(joined, returns.0);
  assert!(train.last().map(|d| d.x) < test.first().map(|d| d.x));
  assert!(returns.split_at(returns.len()).is_err());
  Ok(())
}

#[test]
fn perfect_forecast_has_zero_error() -> anyhow::Result<()> {
  let actual = Dataset::from_bars(&synthetic_bars(40, 4)?, PriceField::AdjClose)?
    .log_returns()
    .y();
  assert_eq!(mae(&actual, &actual)?, 0.0);
  assert_eq!(rmse(&actual, &actual)?, 0.0);
  Ok(())
}

#[test]
fn adf_report_names_five_fields() -> anyhow::Result<()> {
  let returns = Dataset::from_bars(&synthetic_bars(600, 5)?, PriceField::AdjClose)?.log_returns();
  let adf = adfuller(&returns.diff(2).y(), None, AutoLag::Aic)?;
  for key in ["1%", "5%", "10%"] {
    assert!(adf.critical_values.contains_key(key));
  }
  let report = adf.to_string();
  assert_eq!(report.lines().filter(|l| !l.starts_with('\t')).count(), 5);
  assert_eq!(report.lines().filter(|l| l.starts_with('\t')).count(), 3);
  assert!(adf.p_value < 0.01);
  Ok(())
}

#[test]
fn forecast_pipeline_end_to_end() -> anyhow::Result<()> {
  let horizon = 30;
  let returns = Dataset::from_bars(&synthetic_bars(1_500, 6)?, PriceField::AdjClose)?.log_returns();
  let (train, test) = returns.split_at(returns.len() - horizon)?;

  let fit = Arima::new(ArimaOrder::new(0, 1, 5)).fit(&train.y())?;
  assert_eq!(fit.ma.len(), 5);
  assert!(fit.mean.is_none());

  let forecast = fit.forecast(horizon, 0.05);
  assert_eq!(forecast.len(), horizon);
  assert!(forecast
    .lower
    .iter()
    .zip(forecast.upper.iter())
    .all(|(lo, hi)| lo < hi));

  // the prediction window after the training slice is the forecast
  let window = fit.predict(train.len(), train.len() + horizon);
  assert_eq!(window, forecast.mean);

  let actual = test.y();
  let mae = mae(&actual, &forecast.mean)?;
  let rmse = rmse(&actual, &forecast.mean)?;
  assert!(mae > 0.0 && mae < 0.05);
  assert!(rmse >= mae);

  // most realised returns fall inside the 95% band
  let inside = actual
    .iter()
    .zip(forecast.lower.iter().zip(forecast.upper.iter()))
    .filter(|(a, (lo, hi))| *a >= *lo && *a <= *hi)
    .count();
  assert!(inside >= 24, "{} of {} inside", inside, horizon);
  Ok(())
}

#[test]
fn residual_checks_on_white_noise_fit() -> anyhow::Result<()> {
  let returns = Dataset::from_bars(&synthetic_bars(800, 7)?, PriceField::AdjClose)?.log_returns();
  let fit = Arima::new(ArimaOrder::new(1, 0, 0)).fit(&returns.y())?;
  assert!(fit.ar[0].abs() < 0.15);
  let standardized = fit.standardized_resid();
  assert_eq!(standardized.len(), returns.len());
  let sd = std_dev(&standardized);
  assert!((sd - 1.0).abs() < 0.05);
  let table = ljung_box(fit.resid(), 20, 0);
  assert_eq!(table.len(), 20);
  assert!(table[19].lb_pvalue > 0.001);
  Ok(())
}

#[test]
fn csv_cache_roundtrip() -> anyhow::Result<()> {
  let bars = synthetic_bars(30, 8)?;
  let path = std::env::temp_dir().join("empirical_pipeline_roundtrip.csv");
  Dataset::write_csv(&bars, &path)?;
  let series = Dataset::csv_series(&path, None, None)?;
  let direct = Dataset::from_bars(&bars, PriceField::AdjClose)?;
  assert_eq!(series.len(), direct.len());
  assert_eq!(series.x(), direct.x());
  for (a, b) in series.y().iter().zip(direct.y().iter()) {
    assert!((a - b).abs() < 1e-9);
  }
  std::fs::remove_file(path)?;
  Ok(())
}

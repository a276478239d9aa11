use crate::config::AnalysisConfig;
use empirical::*;
use log::*;

const DAY_MS: i64 = 86_400_000;
/// Correlogram lags in the residual diagnostics chart
const DIAGNOSTIC_LAGS: usize = 10;

/// Prices, log returns and the train/test split every step works from.
pub struct Context {
  pub config: AnalysisConfig,
  pub prices: Dataset,
  pub returns: Dataset,
  pub train: Dataset,
  pub test: Dataset,
}

/// Download bars, or read them from the CSV cache when one exists.
pub fn load_bars(config: &AnalysisConfig) -> anyhow::Result<Vec<Bar>> {
  if let Some(csv) = config.csv.as_deref().filter(|p| p.exists()) {
    info!("Reading {} bars from {:?}", config.ticker, csv);
    let stop = config.end.map(|end| end.delta_date(1)).transpose()?;
    return Dataset::csv_bars(csv, Some(config.start), stop);
  }
  fetch(config)
}

/// Download bars from the provider and refresh the CSV cache.
pub fn fetch(config: &AnalysisConfig) -> anyhow::Result<Vec<Bar>> {
  let bars = YahooClient::new()?.history(&config.ticker, config.start, config.end)?;
  info!("Downloaded {} bars for {}", bars.len(), config.ticker);
  if let Some(csv) = config.csv.as_deref() {
    Dataset::write_csv(&bars, csv)?;
    info!("Cached bars to {:?}", csv);
  }
  Ok(bars)
}

impl Context {
  pub fn load(config: AnalysisConfig) -> anyhow::Result<Self> {
    let bars = load_bars(&config)?;
    Self::from_bars(config, &bars)
  }

  pub fn from_bars(config: AnalysisConfig, bars: &[Bar]) -> anyhow::Result<Self> {
    let prices = Dataset::from_bars(bars, config.price_field)?;
    let returns = prices.log_returns();
    let cut = config
      .train_len
      .unwrap_or_else(|| returns.len().saturating_sub(config.horizon));
    let (train, test) = returns.split_at(cut)?;
    info!(
      "{} prices, {} log returns, {} train, {} test",
      prices.len(),
      returns.len(),
      train.len(),
      test.len()
    );
    Ok(Self {
      config,
      prices,
      returns,
      train,
      test,
    })
  }

  pub fn fit(&self) -> anyhow::Result<ArimaFit> {
    let order = self.config.order;
    info!("Fitting ARIMA{} on {} observations", order, self.train.len());
    let fit = Arima::new(order).fit(&self.train.y())?;
    debug!("{}", fit);
    Ok(fit)
  }

  /// Timestamps for `steps` periods after the training slice: test dates, then daily past them.
  pub fn horizon_x(&self, steps: usize) -> Vec<i64> {
    let test_x = self.test.x();
    let last = self
      .test
      .last()
      .or(self.train.last())
      .map(|d| d.x)
      .unwrap_or_default();
    (0..steps)
      .map(|i| match test_x.get(i) {
        Some(x) => *x,
        None => last + (i + 1 - test_x.len()) as i64 * DAY_MS,
      })
      .collect()
  }

  fn confidence_label(&self) -> String {
    format!("{}% Confidence Interval", trunc!((1.0 - self.config.alpha) * 100.0, 1))
  }
}

fn zip_x(x: &[i64], y: &[f64]) -> Vec<Data> {
  x.iter().zip(y.iter()).map(|(x, y)| Data { x: *x, y: *y }).collect()
}

fn forecast_band(ctx: &Context, forecast: &Forecast) -> Band {
  let x = ctx.horizon_x(forecast.len());
  Band {
    lower: zip_x(&x, &forecast.lower),
    upper: zip_x(&x, &forecast.upper),
    label: ctx.confidence_label(),
  }
}

pub fn plot_price(ctx: &Context) -> anyhow::Result<()> {
  let out_file = ctx.config.chart("price")?;
  Plot::plot(
    vec![Series::new(ctx.prices.data().clone(), "Price")],
    &out_file,
    &format!("{} Price Chart", ctx.config.ticker),
    "Price",
    "Date",
    Some(false),
  )?;
  info!("Price chart written to {}", out_file);
  Ok(())
}

pub fn plot_logs(ctx: &Context) -> anyhow::Result<()> {
  let out_file = ctx.config.chart("log_returns")?;
  Plot::plot(
    vec![Series::new(ctx.returns.data().clone(), "Log Returns")],
    &out_file,
    &format!("{} Log Returns", ctx.config.ticker),
    "Log Returns",
    "Date",
    Some(false),
  )?;
  info!("Log return chart written to {}", out_file);
  Ok(())
}

pub fn decompose_data(ctx: &Context) -> anyhow::Result<Decomposition> {
  let x = ctx.returns.x();
  let dec = seasonal_decompose(&ctx.returns.y(), ctx.config.period, DecomposeModel::Additive, true)?;
  let out_file = ctx.config.chart("decomposition")?;
  Plot::panels(
    vec![
      Series::new(zip_x(&x, &dec.observed), "Log Returns"),
      Series::new(zip_x(&x, &dec.trend), "Trend"),
      Series::new(zip_x(&x, &dec.seasonal), "Seasonal"),
      Series::new(zip_x(&x, &dec.resid), "Resid"),
    ],
    &out_file,
    &format!("Additive decomposition, period {}", ctx.config.period),
    "Date",
  )?;
  info!("Decomposition chart written to {}", out_file);
  Ok(dec)
}

/// ADF test on the twice differenced log returns.
pub fn stationarity_test(ctx: &Context) -> anyhow::Result<AdfResult> {
  let series = ctx.returns.diff(2).y();
  let adf = adfuller(&series, None, AutoLag::Aic)?;
  print!("{}", adf);
  Ok(adf)
}

pub fn acf_plot(ctx: &Context) -> anyhow::Result<Vec<f64>> {
  let series = ctx.returns.diff(1).y();
  let values = acf(&series, ctx.config.lags);
  let bands = acf_confint(&values, series.len(), ctx.config.alpha);
  let out_file = ctx.config.chart("acf")?;
  Plot::correlogram(
    &values,
    &bands,
    &out_file,
    &format!("Autocorrelation Function with {}", ctx.confidence_label()),
    "Autocorrelation",
    "Lag",
  )?;
  info!("ACF chart written to {}", out_file);
  Ok(values)
}

pub fn pacf_plot(ctx: &Context) -> anyhow::Result<Vec<f64>> {
  let series = ctx.returns.diff(1).y();
  let values = pacf(&series, ctx.config.lags);
  let bands = pacf_confint(values.len().saturating_sub(1), series.len(), ctx.config.alpha);
  let out_file = ctx.config.chart("pacf")?;
  Plot::correlogram(
    &values,
    &bands,
    &out_file,
    &format!("Partial Autocorrelation Function with {}", ctx.confidence_label()),
    "Partial Autocorrelation",
    "Lag",
  )?;
  info!("PACF chart written to {}", out_file);
  Ok(values)
}

/// Full history with the out-of-sample prediction window and its interval.
pub fn arima_model(ctx: &Context) -> anyhow::Result<Forecast> {
  let fit = ctx.fit()?;
  let horizon = ctx.config.horizon;
  let start = ctx.train.len();
  let predicted = fit.predict(start, start + horizon);
  let forecast = fit.forecast(horizon, ctx.config.alpha);
  let x = ctx.horizon_x(horizon);

  let out_file = ctx.config.chart("arima_model")?;
  Plot::plot_with_band(
    vec![
      Series::new(ctx.returns.data().clone(), "Log Returns"),
      Series::new(ctx.test.data().clone(), "Actual Log Returns"),
      Series::new(zip_x(&x, &predicted), "Forecasted Log Returns"),
    ],
    Some(forecast_band(ctx, &forecast)),
    &out_file,
    &format!(
      "ARIMA Forecasted Log Returns vs Actual Log Returns with {}",
      ctx.confidence_label()
    ),
    "Log Returns",
    "Date",
    Some(false),
  )?;
  info!("Forecast chart written to {}", out_file);
  Ok(forecast)
}

/// Training data, actual test data and the forecast.
pub fn model_arima(ctx: &Context) -> anyhow::Result<Forecast> {
  let fit = ctx.fit()?;
  let forecast = fit.forecast(ctx.config.horizon, ctx.config.alpha);
  let x = ctx.horizon_x(forecast.len());

  let out_file = ctx.config.chart("model_arima")?;
  Plot::plot_with_band(
    vec![
      Series::new(ctx.train.data().clone(), "Training Data (Log Returns)"),
      Series::new(ctx.test.data().clone(), "Actual Log Returns"),
      Series::new(zip_x(&x, &forecast.mean), "forecast"),
    ],
    Some(forecast_band(ctx, &forecast)),
    &out_file,
    &format!(
      "Forecasted Log Returns vs Actual Log Returns {} with {}",
      ctx.config.ticker,
      ctx.confidence_label()
    ),
    "Log Returns",
    "Date",
    Some(false),
  )?;
  info!("Forecast chart written to {}", out_file);
  Ok(forecast)
}

/// Test window only, zoomed on the forecast.
pub fn model_close_arima(ctx: &Context) -> anyhow::Result<Forecast> {
  let fit = ctx.fit()?;
  let forecast = fit.forecast(ctx.config.horizon, ctx.config.alpha);
  let x = ctx.horizon_x(forecast.len());

  let out_file = ctx.config.chart("model_close_arima")?;
  Plot::plot_with_band(
    vec![
      Series::new(ctx.test.data().clone(), "Actual Log Returns"),
      Series::new(zip_x(&x, &forecast.mean), "forecast"),
    ],
    Some(forecast_band(ctx, &forecast)),
    &out_file,
    &format!(
      "Forecasted Log Returns vs Actual Log Returns {} with {}",
      ctx.config.ticker,
      ctx.confidence_label()
    ),
    "Log Returns",
    "Date",
    Some(false),
  )?;
  info!("Forecast chart written to {}", out_file);
  Ok(forecast)
}

pub fn ljung_box_table(fit: &ArimaFit, lags: usize) -> (Vec<LjungBox>, String) {
  let table = ljung_box(fit.resid(), lags, 0);
  let mut out = format!("{:>5}{:>14}{:>14}\n", "", "lb_stat", "lb_pvalue");
  for row in table.iter() {
    out.push_str(&format!("{:>5}{:>14.6}{:>14.6e}\n", row.lag, row.lb_stat, row.lb_pvalue));
  }
  (table, out)
}

/// Residual diagnostics chart and the Ljung-Box table.
pub fn arima_diagnostics(ctx: &Context) -> anyhow::Result<Vec<LjungBox>> {
  let fit = ctx.fit()?;
  let d = fit.order.d;
  let x: Vec<i64> = ctx.train.x().into_iter().skip(d).collect();
  let standardized = zip_x(&x, &fit.standardized_resid());

  let out_file = ctx.config.chart("arima_diagnostics")?;
  Plot::diagnostics(
    &standardized,
    DIAGNOSTIC_LAGS,
    &out_file,
    &format!("ARIMA{} residual diagnostics", fit.order),
  )?;
  info!("Diagnostics chart written to {}", out_file);

  let (table, report) = ljung_box_table(&fit, ctx.config.ljung_box_lags);
  print!("{}", report);
  Ok(table)
}

/// Forecast accuracy over the test slice, up to `horizon` steps.
pub fn forecast_errors(ctx: &Context, fit: &ArimaFit) -> anyhow::Result<(f64, f64)> {
  let steps = ctx.config.horizon.min(ctx.test.len());
  let forecast = fit.forecast(steps, ctx.config.alpha);
  let actual: Vec<f64> = ctx.test.y().into_iter().take(steps).collect();
  Ok((mae(&actual, &forecast.mean)?, rmse(&actual, &forecast.mean)?))
}

pub fn mae_rmse(ctx: &Context) -> anyhow::Result<(f64, f64)> {
  let fit = ctx.fit()?;
  let (mae, rmse) = forecast_errors(ctx, &fit)?;
  println!("MAE: {}\nRMSE: {}", mae, rmse);
  Ok((mae, rmse))
}

/// Order search over the whole log return series.
pub fn auto_arima(ctx: &Context, search: &AutoArimaConfig) -> anyhow::Result<AutoArimaResult> {
  let res = empirical::auto_arima(&ctx.returns.y(), search)?;
  for (order, score) in res.scores.iter().take(5) {
    info!("ARIMA{} {:?} {}", order, search.criterion, score);
  }
  println!("{}", res.best);
  Ok(res)
}

/// Every step in the order of the analysis.
pub fn run_all(ctx: &Context) -> anyhow::Result<()> {
  plot_price(ctx)?;
  plot_logs(ctx)?;
  match decompose_data(ctx) {
    Ok(_) => {}
    Err(e) => warn!("Skipping decomposition: {}", e),
  }
  stationarity_test(ctx)?;
  acf_plot(ctx)?;
  pacf_plot(ctx)?;
  arima_model(ctx)?;
  model_arima(ctx)?;
  model_close_arima(ctx)?;
  arima_diagnostics(ctx)?;
  mae_rmse(ctx)?;
  Ok(())
}

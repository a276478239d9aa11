use analysis::*;
use clap::{Parser, Subcommand};
use config::AnalysisConfig;
use empirical::{init_logger, ArimaOrder, AutoArimaConfig};
use log::info;
use std::path::PathBuf;

mod analysis;
mod config;

#[derive(Parser)]
#[command(name = "sp500")]
#[command(about = "ARIMA analysis of S&P 500 log returns", long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: Option<Commands>,

  /// Path to the YAML config (defaults to the bundled config.yaml)
  #[arg(long, global = true, env = "ANALYSIS_CONFIG")]
  config: Option<PathBuf>,

  /// Price cache, read instead of downloading when it exists
  #[arg(long, global = true)]
  csv: Option<PathBuf>,

  /// ARIMA order as p,d,q
  #[arg(long, global = true)]
  order: Option<ArimaOrder>,

  #[arg(long, global = true)]
  ticker: Option<String>,

  /// Forecast steps
  #[arg(long, global = true)]
  horizon: Option<usize>,

  /// Training prefix length, series length minus the horizon by default
  #[arg(long, global = true)]
  train_len: Option<usize>,

  /// Directory for the PNG charts
  #[arg(long, global = true)]
  out_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
  /// Download prices and refresh the CSV cache
  Fetch,
  /// Price chart
  Price,
  /// Log return chart
  Logs,
  /// Seasonal decomposition of log returns
  Decompose,
  /// ADF test on twice differenced log returns
  Stationarity,
  /// Autocorrelation of differenced log returns
  Acf,
  /// Partial autocorrelation of differenced log returns
  Pacf,
  /// Full history with the prediction window and confidence interval
  Forecast,
  /// Train, test and forecast with confidence interval
  Model,
  /// Test window and forecast with confidence interval
  Close,
  /// Residual diagnostics and Ljung-Box table
  Diagnostics,
  /// MAE and RMSE of the forecast against the test slice
  Metrics,
  /// Search ARIMA orders by information criterion
  Auto {
    #[arg(long, default_value = "5")]
    max_p: usize,
    #[arg(long, default_value = "5")]
    max_q: usize,
    /// Fixed differencing order, chosen by ADF tests when omitted
    #[arg(long)]
    d: Option<usize>,
    #[arg(long, default_value = "5")]
    max_d: usize,
  },
  /// Every step in order
  All,
}

impl Cli {
  fn config(&self) -> anyhow::Result<AnalysisConfig> {
    let mut config = AnalysisConfig::read(self.config.as_deref())?;
    if let Some(csv) = &self.csv {
      config.csv = Some(csv.clone());
    }
    if let Some(order) = self.order {
      config.order = order;
    }
    if let Some(ticker) = &self.ticker {
      config.ticker = ticker.clone();
    }
    if let Some(horizon) = self.horizon {
      config.horizon = horizon;
    }
    if let Some(train_len) = self.train_len {
      config.train_len = Some(train_len);
    }
    if let Some(out_dir) = &self.out_dir {
      config.out_dir = out_dir.clone();
    }
    config.validate()?;
    Ok(config)
  }
}

fn main() -> anyhow::Result<()> {
  dotenv::dotenv().ok();
  init_logger();

  let cli = Cli::parse();
  let config = cli.config()?;
  info!("Analyzing {} from {}", config.ticker, config.start);

  let command = cli.command.unwrap_or(Commands::Metrics);
  if let Commands::Fetch = command {
    fetch(&config)?;
    return Ok(());
  }

  let ctx = Context::load(config)?;
  match command {
    Commands::Fetch => {}
    Commands::Price => plot_price(&ctx)?,
    Commands::Logs => plot_logs(&ctx)?,
    Commands::Decompose => {
      decompose_data(&ctx)?;
    }
    Commands::Stationarity => {
      stationarity_test(&ctx)?;
    }
    Commands::Acf => {
      acf_plot(&ctx)?;
    }
    Commands::Pacf => {
      pacf_plot(&ctx)?;
    }
    Commands::Forecast => {
      arima_model(&ctx)?;
    }
    Commands::Model => {
      model_arima(&ctx)?;
    }
    Commands::Close => {
      model_close_arima(&ctx)?;
    }
    Commands::Diagnostics => {
      arima_diagnostics(&ctx)?;
    }
    Commands::Metrics => {
      mae_rmse(&ctx)?;
    }
    Commands::Auto { max_p, max_q, d, max_d } => {
      let search = AutoArimaConfig {
        max_p,
        max_q,
        d,
        max_d,
        ..Default::default()
      };
      auto_arima(&ctx, &search)?;
    }
    Commands::All => run_all(&ctx)?,
  }
  Ok(())
}

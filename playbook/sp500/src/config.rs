use empirical::{ArimaOrder, PriceField, Time};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct AnalysisConfig {
  pub ticker: String,
  pub start: Time,
  /// Last day to download, inclusive. Today when absent.
  pub end: Option<Time>,
  pub price_field: PriceField,
  /// Forecast steps, also the length of the test slice by default
  pub horizon: usize,
  pub alpha: f64,
  pub order: ArimaOrder,
  /// Training prefix length. `len - horizon` when absent.
  pub train_len: Option<usize>,
  pub out_dir: PathBuf,
  /// Price cache read instead of the provider when it exists, written after a download otherwise
  pub csv: Option<PathBuf>,
  pub period: usize,
  pub lags: usize,
  pub ljung_box_lags: usize,
}

#[derive(Debug, Deserialize)]
struct YamlConfig {
  pub ticker: String,
  pub start: String,
  pub end: Option<String>,
  #[serde(default)]
  pub price_field: PriceField,
  pub horizon: usize,
  pub alpha: f64,
  pub order: String,
  pub train_len: Option<usize>,
  pub out_dir: String,
  pub csv: Option<String>,
  pub period: usize,
  pub lags: usize,
  pub ljung_box_lags: usize,
}

impl AnalysisConfig {
  pub fn default_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config.yaml")
  }

  /// Read `config.yaml`, then let `TICKER` and `ANALYSIS_OUT_DIR` override it.
  pub fn read(path: Option<&Path>) -> anyhow::Result<Self> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(Self::default_path);
    let contents = String::from_utf8(std::fs::read(&path)?)?;
    let mut config = Self::from_yaml(&contents)?;
    if let Ok(ticker) = std::env::var("TICKER") {
      config.ticker = ticker;
    }
    if let Ok(out_dir) = std::env::var("ANALYSIS_OUT_DIR") {
      config.out_dir = PathBuf::from(out_dir);
    }
    Ok(config)
  }

  pub fn from_yaml(contents: &str) -> anyhow::Result<Self> {
    let yaml: YamlConfig = serde_yaml::from_str(contents)?;
    let config = Self {
      ticker: yaml.ticker,
      start: Time::from_str(&yaml.start)?,
      end: yaml.end.as_deref().map(Time::from_str).transpose()?,
      price_field: yaml.price_field,
      horizon: yaml.horizon,
      alpha: yaml.alpha,
      order: ArimaOrder::from_str(&yaml.order)?,
      train_len: yaml.train_len,
      out_dir: PathBuf::from(yaml.out_dir),
      csv: yaml.csv.map(PathBuf::from),
      period: yaml.period,
      lags: yaml.lags,
      ljung_box_lags: yaml.ljung_box_lags,
    };
    config.validate()?;
    Ok(config)
  }

  /// Reject settings no analysis step can run with.
  pub fn validate(&self) -> anyhow::Result<()> {
    if !(self.alpha > 0.0 && self.alpha < 1.0) {
      return Err(anyhow::anyhow!("alpha must lie in (0, 1), got {}", self.alpha));
    }
    if self.horizon == 0 {
      return Err(anyhow::anyhow!("horizon must be positive"));
    }
    if self.train_len == Some(0) {
      return Err(anyhow::anyhow!("train_len must be positive"));
    }
    Ok(())
  }

  /// Output path for a chart.
  pub fn chart(&self, name: &str) -> anyhow::Result<String> {
    std::fs::create_dir_all(&self.out_dir)?;
    let path = self.out_dir.join(format!("{}.png", name));
    path
      .to_str()
      .map(|s| s.to_string())
      .ok_or_else(|| anyhow::anyhow!("Chart path is not valid UTF-8: {:?}", path))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const YAML: &str = r#"
ticker: "^GSPC"
start: "1990-01-01"
end: null
horizon: 30
alpha: 0.05
order: "0,1,5"
train_len: null
out_dir: "out"
csv: "data/gspc.csv"
period: 365
lags: 40
ljung_box_lags: 20
"#;

  #[test]
  fn parse_yaml() -> anyhow::Result<()> {
    let config = AnalysisConfig::from_yaml(YAML)?;
    assert_eq!(config.ticker, "^GSPC");
    assert_eq!(config.start, Time::new(1990, 1, 1));
    assert!(config.end.is_none());
    assert_eq!(config.price_field, PriceField::AdjClose);
    assert_eq!(config.order, ArimaOrder::new(0, 1, 5));
    assert_eq!(config.csv, Some(PathBuf::from("data/gspc.csv")));
    assert_eq!(config.ljung_box_lags, 20);
    Ok(())
  }

  #[test]
  fn reject_bad_alpha_and_order() {
    assert!(AnalysisConfig::from_yaml(&YAML.replace("alpha: 0.05", "alpha: 1.5")).is_err());
    assert!(AnalysisConfig::from_yaml(&YAML.replace("\"0,1,5\"", "\"0,1\"")).is_err());
  }

  #[test]
  fn overrides_are_validated() -> anyhow::Result<()> {
    let mut config = AnalysisConfig::from_yaml(YAML)?;
    config.horizon = 0;
    assert!(config.validate().is_err());
    config.horizon = 10;
    config.train_len = Some(0);
    assert!(config.validate().is_err());
    config.train_len = Some(100);
    config.validate()?;
    Ok(())
  }

  #[test]
  fn bundled_config_is_valid() -> anyhow::Result<()> {
    let contents = std::fs::read_to_string(AnalysisConfig::default_path())?;
    let config = AnalysisConfig::from_yaml(&contents)?;
    assert_eq!(config.horizon, 30);
    assert_eq!(config.order, ArimaOrder::new(0, 1, 5));
    Ok(())
  }
}

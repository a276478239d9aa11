use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Calendar day of a daily bar. Intraday fields are not tracked since every
/// series here is sampled once per session.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Time {
  pub year: i32,
  pub month: u32,
  pub day: u32,
}

impl From<NaiveDate> for Time {
  fn from(date: NaiveDate) -> Self {
    Self {
      year: date.year(),
      month: date.month(),
      day: date.day(),
    }
  }
}

impl From<DateTime<Utc>> for Time {
  fn from(dt: DateTime<Utc>) -> Self {
    Self::from(dt.date_naive())
  }
}

impl Time {
  pub fn new(year: i32, month: u32, day: u32) -> Self {
    Self { year, month, day }
  }

  pub fn now() -> Self {
    Self::from(Utc::now())
  }

  /// Parse the provider's `YYYY-MM-DD` date format.
  pub fn from_api_format(date: &str) -> anyhow::Result<Self> {
    let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")?;
    Ok(Self::from(date))
  }

  pub fn to_naive_date(&self) -> anyhow::Result<NaiveDate> {
    NaiveDate::from_ymd_opt(self.year, self.month, self.day)
      .ok_or_else(|| anyhow::anyhow!("Invalid date: {}-{}-{}", self.year, self.month, self.day))
  }

  pub fn to_datetime(&self) -> anyhow::Result<DateTime<Utc>> {
    let date = self.to_naive_date()?;
    let dt = date
      .and_hms_opt(0, 0, 0)
      .ok_or_else(|| anyhow::anyhow!("Invalid midnight for {}", self))?;
    Ok(Utc.from_utc_datetime(&dt))
  }

  /// Create Time from UNIX timestamp in seconds
  pub fn from_unix(unix: i64) -> anyhow::Result<Self> {
    let date = Utc
      .timestamp_opt(unix, 0)
      .single()
      .ok_or_else(|| anyhow::anyhow!("Invalid unix timestamp: {}", unix))?;
    Ok(Self::from(date))
  }

  pub fn from_unix_ms(unix_ms: i64) -> anyhow::Result<Self> {
    let date = Utc
      .timestamp_millis_opt(unix_ms)
      .single()
      .ok_or_else(|| anyhow::anyhow!("Invalid unix ms timestamp: {}", unix_ms))?;
    Ok(Self::from(date))
  }

  pub fn to_unix(&self) -> anyhow::Result<i64> {
    Ok(self.to_datetime()?.timestamp())
  }

  pub fn to_unix_ms(&self) -> anyhow::Result<i64> {
    Ok(self.to_datetime()?.timestamp_millis())
  }

  /// Increment Time by a number of days
  pub fn delta_date(&self, days: i64) -> anyhow::Result<Self> {
    let date = self.to_naive_date()? + chrono::Duration::days(days);
    Ok(Self::from(date))
  }

  /// Difference in days between two dates
  pub fn diff_days(&self, other: &Self) -> anyhow::Result<i64> {
    let date1 = self.to_naive_date()?;
    let date2 = other.to_naive_date()?;
    Ok(date2.signed_duration_since(date1).num_days())
  }

  pub fn to_string_daily(&self) -> String {
    format!("{:04}-{:02}-{:02}", self.year, self.month, self.day)
  }
}

impl fmt::Display for Time {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.to_string_daily())
  }
}

impl FromStr for Time {
  type Err = anyhow::Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::from_api_format(s)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn unix_roundtrip_keeps_calendar_day() -> anyhow::Result<()> {
    let t = Time::new(1990, 1, 2);
    let unix = t.to_unix()?;
    assert_eq!(unix, 631_238_400);
    assert_eq!(Time::from_unix(unix)?, t);
    assert_eq!(Time::from_unix_ms(t.to_unix_ms()?)?, t);
    Ok(())
  }

  #[test]
  fn parse_and_display() -> anyhow::Result<()> {
    let t: Time = "2024-02-29".parse()?;
    assert_eq!(t, Time::new(2024, 2, 29));
    assert_eq!(t.to_string(), "2024-02-29");
    assert!("2023-02-29".parse::<Time>().is_err());
    Ok(())
  }

  #[test]
  fn day_arithmetic() -> anyhow::Result<()> {
    let start = Time::new(2023, 12, 30);
    let end = start.delta_date(3)?;
    assert_eq!(end, Time::new(2024, 1, 2));
    assert_eq!(start.diff_days(&end)?, 3);
    assert!(start < end);
    Ok(())
  }
}

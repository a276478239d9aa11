use crate::{acf, acf_confint, normal_quantile, Data, Time};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::full_palette::*;
use plotters::style::{BLACK, WHITE};
use statrs::distribution::{Continuous, Normal};

const FIRST: RGBColor = BLACK;
const SECOND: RGBColor = RED_A400;
const THIRD: RGBColor = GREEN_500;
const FOURTH: RGBColor = AMBER_800;
const FIFTH: RGBColor = BLUE_A700;
const SIXTH: RGBColor = PURPLE_A400;
const OTHER: RGBColor = GREY_400;

pub struct Series {
  pub data: Vec<Data>,
  pub label: String,
}

impl Series {
  pub fn new(data: Vec<Data>, label: &str) -> Self {
    Self {
      data,
      label: label.to_string(),
    }
  }
}

/// Shaded region between two curves sharing the same x values.
pub struct Band {
  pub lower: Vec<Data>,
  pub upper: Vec<Data>,
  pub label: String,
}

pub struct Plot;

fn color(i: usize) -> RGBColor {
  match i {
    0 => FIRST,
    1 => SECOND,
    2 => THIRD,
    3 => FOURTH,
    4 => FIFTH,
    5 => SIXTH,
    _ => OTHER,
  }
}

fn line_style(color: RGBColor) -> ShapeStyle {
  ShapeStyle {
    color: RGBAColor::from(color),
    filled: true,
    stroke_width: 1,
  }
}

fn legend_style(color: RGBColor) -> ShapeStyle {
  ShapeStyle {
    color: RGBAColor::from(color),
    filled: true,
    stroke_width: 10,
  }
}

/// `(min_x, max_x, min_y, max_y)` over finite points, widened when degenerate.
fn bounds<'a>(data: impl Iterator<Item = &'a Data>) -> (i64, i64, f64, f64) {
  let mut min_x = i64::MAX;
  let mut max_x = i64::MIN;
  let mut min_y = f64::MAX;
  let mut max_y = f64::MIN;
  for datum in data.filter(|d| d.y.is_finite()) {
    min_x = min_x.min(datum.x);
    max_x = max_x.max(datum.x);
    min_y = min_y.min(datum.y);
    max_y = max_y.max(datum.y);
  }
  if min_x > max_x {
    return (0, 1, 0.0, 1.0);
  }
  if min_x == max_x {
    max_x += 1;
  }
  if min_y == max_y {
    min_y -= 0.5;
    max_y += 0.5;
  }
  (min_x, max_x, min_y, max_y)
}

/// Builder with label areas on the left and bottom only.
fn frame<'a, 'b, DB: DrawingBackend>(
  area: &'a DrawingArea<DB, Shift>,
  left: u32,
  bottom: u32,
  margin: u32,
) -> ChartBuilder<'a, 'b, DB> {
  let mut builder = ChartBuilder::on(area);
  builder
    .set_label_area_size(LabelAreaPosition::Left, left)
    .set_label_area_size(LabelAreaPosition::Bottom, bottom)
    .margin(margin);
  builder
}

fn date_label(x: i64) -> String {
  Time::from_unix_ms(x)
    .map(|t| t.to_string_daily())
    .unwrap_or_default()
}

fn value_range(min: f64, max: f64) -> (f64, f64) {
  let pad = (max - min) * 0.05;
  (min - pad, max + pad)
}

impl Plot {
  /// Line chart of one or more time series, x values in UNIX milliseconds.
  pub fn plot(
    series: Vec<Series>,
    out_file: &str,
    title: &str,
    y_label: &str,
    x_label: &str,
    log_scale: Option<bool>,
  ) -> anyhow::Result<()> {
    Self::plot_with_band(series, None, out_file, title, y_label, x_label, log_scale)
  }

  /// Line chart with an optional shaded band, drawn beneath the lines.
  pub fn plot_with_band(
    series: Vec<Series>,
    band: Option<Band>,
    out_file: &str,
    title: &str,
    y_label: &str,
    x_label: &str,
    log_scale: Option<bool>,
  ) -> anyhow::Result<()> {
    let log_scale = log_scale.unwrap_or(false);
    let band_points = band.iter().flat_map(|b| b.lower.iter().chain(b.upper.iter()));
    let (min_x, max_x, min_y, max_y) = bounds(series.iter().flat_map(|s| &s.data).chain(band_points));

    let offset = 100.0;
    let to_log = |y: f64| (y + offset).log10();
    let from_log = |y: f64| 10f64.powf(y) - offset;

    let y_range = match log_scale {
      true => to_log(min_y)..to_log(max_y),
      false => {
        let (lo, hi) = value_range(min_y, max_y);
        lo..hi
      }
    };

    let y_label_formatter = |y: f64| match log_scale {
      true => format!("{:.2}", from_log(y)),
      false => format!("{:.4}", y),
    };

    let transform_y = |y: f64| match log_scale {
      true => to_log(y),
      false => y,
    };

    let root = BitMapBackend::new(out_file, (2048, 1024)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = frame(&root, 150, 100, 20)
      .caption(title, ("sans-serif", 40.0).into_font())
      .build_cartesian_2d(min_x..max_x, y_range)?;

    chart
      .configure_mesh()
      .light_line_style(WHITE)
      .label_style(("sans-serif", 30, &BLACK).into_text_style(&root))
      .x_desc(x_label)
      .y_desc(y_label)
      .x_labels(8)
      .y_labels(10)
      .x_label_formatter(&|x| date_label(*x))
      .y_label_formatter(&|y| y_label_formatter(*y))
      .draw()?;

    if let Some(band) = band {
      let mut outline: Vec<(i64, f64)> = band.upper.iter().map(|d| (d.x, transform_y(d.y))).collect();
      outline.extend(band.lower.iter().rev().map(|d| (d.x, transform_y(d.y))));
      chart
        .draw_series(std::iter::once(Polygon::new(outline, OTHER.mix(0.25).filled())))
        .map_err(|e| anyhow::anyhow!("Failed to draw band: {}", e))?
        .label(band.label.as_str())
        .legend(|(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], OTHER.mix(0.5).filled()));
      for edge in [&band.lower, &band.upper] {
        chart
          .draw_series(LineSeries::new(
            edge.iter().map(|d| (d.x, transform_y(d.y))),
            line_style(OTHER),
          ))
          .map_err(|e| anyhow::anyhow!("Failed to draw band edge: {}", e))?;
      }
    }

    for (i, s) in series.iter().enumerate() {
      let color = color(i);
      chart
        .draw_series(
          LineSeries::new(
            s.data
              .iter()
              .filter(|d| d.y.is_finite())
              .map(|data| (data.x, transform_y(data.y))),
            line_style(color),
          )
          .point_size(1),
        )
        .map_err(|e| anyhow::anyhow!("Failed to draw series: {}", e))?
        .label(s.label.as_str())
        .legend(move |(x, y)| PathElement::new([(x + 10, y + 1), (x, y)], legend_style(color)));
    }

    chart
      .configure_series_labels()
      .position(SeriesLabelPosition::UpperLeft)
      .margin(20)
      .legend_area_size(30)
      .border_style(BLACK)
      .background_style(BLACK.mix(0.1))
      .label_font(("sans-serif", 24))
      .draw()
      .map_err(|e| anyhow::anyhow!("Failed to configure series labels: {}", e))?;

    root
      .present()
      .map_err(|e| anyhow::anyhow!("Failed to present root: {}", e))?;

    Ok(())
  }

  /// Stem chart of correlations by lag with a shaded band `±bands[k]` around zero.
  pub fn correlogram(
    values: &[f64],
    bands: &[f64],
    out_file: &str,
    title: &str,
    y_label: &str,
    x_label: &str,
  ) -> anyhow::Result<()> {
    let root = BitMapBackend::new(out_file, (2048, 1024)).into_drawing_area();
    root.fill(&WHITE)?;
    Self::draw_correlogram(&root, values, bands, title, y_label, x_label)?;
    root
      .present()
      .map_err(|e| anyhow::anyhow!("Failed to present root: {}", e))?;
    Ok(())
  }

  fn draw_correlogram<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    values: &[f64],
    bands: &[f64],
    title: &str,
    y_label: &str,
    x_label: &str,
  ) -> anyhow::Result<()>
  where
    DB::ErrorType: 'static,
  {
    let max_lag = values.len().max(2) as f64 - 1.0;
    let extent = values
      .iter()
      .chain(bands.iter())
      .filter(|v| v.is_finite())
      .fold(1.0_f64, |acc, v| acc.max(v.abs()))
      * 1.05;
    let mut chart = frame(area, 120, 100, 20)
      .caption(title, ("sans-serif", 36.0).into_font())
      .build_cartesian_2d(-0.5..max_lag + 0.5, -extent..extent)
      .map_err(|e| anyhow::anyhow!("Failed to build correlogram: {}", e))?;
    chart
      .configure_mesh()
      .light_line_style(WHITE)
      .label_style(("sans-serif", 26, &BLACK).into_text_style(area))
      .x_desc(x_label)
      .y_desc(y_label)
      .draw()
      .map_err(|e| anyhow::anyhow!("Failed to draw mesh: {}", e))?;

    // band is not drawn at lag 0
    let lags: Vec<f64> = (1..bands.len()).map(|k| k as f64).collect();
    if !lags.is_empty() {
      let mut outline: Vec<(f64, f64)> = lags.iter().map(|k| (*k, bands[*k as usize])).collect();
      outline.extend(lags.iter().rev().map(|k| (*k, -bands[*k as usize])));
      chart
        .draw_series(std::iter::once(Polygon::new(outline, FIFTH.mix(0.15).filled())))
        .map_err(|e| anyhow::anyhow!("Failed to draw band: {}", e))?;
    }
    chart
      .draw_series(LineSeries::new(
        vec![(-0.5, 0.0), (max_lag + 0.5, 0.0)],
        line_style(FIRST),
      ))
      .map_err(|e| anyhow::anyhow!("Failed to draw axis: {}", e))?;
    chart
      .draw_series(
        values
          .iter()
          .enumerate()
          .filter(|(_, v)| v.is_finite())
          .map(|(k, v)| PathElement::new(vec![(k as f64, 0.0), (k as f64, *v)], ShapeStyle::from(&FIFTH).stroke_width(2))),
      )
      .map_err(|e| anyhow::anyhow!("Failed to draw stems: {}", e))?;
    chart
      .draw_series(
        values
          .iter()
          .enumerate()
          .filter(|(_, v)| v.is_finite())
          .map(|(k, v)| Circle::new((k as f64, *v), 5, FIFTH.filled())),
      )
      .map_err(|e| anyhow::anyhow!("Failed to draw markers: {}", e))?;
    Ok(())
  }

  /// Vertically stacked panels, one series each, with a shared date axis.
  pub fn panels(series: Vec<Series>, out_file: &str, title: &str, x_label: &str) -> anyhow::Result<()> {
    if series.is_empty() {
      return Err(anyhow::anyhow!("No panels to draw"));
    }
    let height = 400 * series.len() as u32;
    let root = BitMapBackend::new(out_file, (2048, height)).into_drawing_area();
    root.fill(&WHITE)?;
    let root = root.titled(title, ("sans-serif", 40.0).into_font())?;
    let areas = root.split_evenly((series.len(), 1));

    for (i, (area, s)) in areas.iter().zip(series.iter()).enumerate() {
      let (min_x, max_x, min_y, max_y) = bounds(s.data.iter());
      let (lo, hi) = value_range(min_y, max_y);
      let mut chart = frame(area, 150, 60, 10)
        .build_cartesian_2d(min_x..max_x, lo..hi)?;
      let is_last = i + 1 == series.len();
      chart
        .configure_mesh()
        .light_line_style(WHITE)
        .label_style(("sans-serif", 22, &BLACK).into_text_style(area))
        .x_desc(match is_last {
          true => x_label,
          false => "",
        })
        .y_desc(s.label.as_str())
        .x_labels(8)
        .y_labels(5)
        .x_label_formatter(&|x| date_label(*x))
        .y_label_formatter(&|y| format!("{:.4}", y))
        .draw()?;
      chart
        .draw_series(LineSeries::new(
          s.data.iter().filter(|d| d.y.is_finite()).map(|d| (d.x, d.y)),
          line_style(color(i)),
        ))
        .map_err(|e| anyhow::anyhow!("Failed to draw panel {}: {}", s.label, e))?;
    }

    root
      .present()
      .map_err(|e| anyhow::anyhow!("Failed to present root: {}", e))?;
    Ok(())
  }

  /// Four residual checks on a 2x2 grid: standardized residuals over time, their histogram
  /// against the standard normal density, a normal Q-Q plot and the correlogram up to `lags`.
  pub fn diagnostics(standardized: &[Data], lags: usize, out_file: &str, title: &str) -> anyhow::Result<()> {
    let resid: Vec<f64> = standardized.iter().map(|d| d.y).filter(|y| y.is_finite()).collect();
    if resid.len() < 2 {
      return Err(anyhow::anyhow!("Not enough residuals to diagnose"));
    }
    let root = BitMapBackend::new(out_file, (2048, 1536)).into_drawing_area();
    root.fill(&WHITE)?;
    let root = root.titled(title, ("sans-serif", 40.0).into_font())?;
    let areas = root.split_evenly((2, 2));

    // standardized residuals
    let (min_x, max_x, min_y, max_y) = bounds(standardized.iter());
    let mut chart = frame(&areas[0], 100, 60, 20)
      .caption("Standardized residual", ("sans-serif", 30.0).into_font())
      .build_cartesian_2d(min_x..max_x, min_y..max_y)?;
    chart
      .configure_mesh()
      .light_line_style(WHITE)
      .x_labels(5)
      .x_label_formatter(&|x| date_label(*x))
      .draw()?;
    chart
      .draw_series(LineSeries::new(
        standardized.iter().filter(|d| d.y.is_finite()).map(|d| (d.x, d.y)),
        line_style(FIFTH),
      ))
      .map_err(|e| anyhow::anyhow!("Failed to draw residuals: {}", e))?;

    // histogram against N(0, 1)
    let normal = Normal::new(0.0, 1.0)?;
    let lo = resid.iter().fold(-3.0_f64, |a, b| a.min(*b));
    let hi = resid.iter().fold(3.0_f64, |a, b| a.max(*b));
    let bins = 40;
    let width = (hi - lo) / bins as f64;
    let mut counts = vec![0usize; bins];
    for r in resid.iter() {
      let idx = (((r - lo) / width) as usize).min(bins - 1);
      counts[idx] += 1;
    }
    let densities: Vec<f64> = counts
      .iter()
      .map(|c| *c as f64 / (resid.len() as f64 * width))
      .collect();
    let top = densities.iter().fold(normal.pdf(0.0), |a, b| a.max(*b)) * 1.1;
    let mut chart = frame(&areas[1], 100, 60, 20)
      .caption("Histogram plus estimated density", ("sans-serif", 30.0).into_font())
      .build_cartesian_2d(lo..hi, 0.0..top)?;
    chart.configure_mesh().light_line_style(WHITE).draw()?;
    chart
      .draw_series(densities.iter().enumerate().map(|(i, d)| {
        let left = lo + i as f64 * width;
        Rectangle::new([(left, 0.0), (left + width, *d)], FIFTH.mix(0.4).filled())
      }))
      .map_err(|e| anyhow::anyhow!("Failed to draw histogram: {}", e))?;
    chart
      .draw_series(LineSeries::new(
        (0..=200).map(|i| {
          let x = lo + (hi - lo) * i as f64 / 200.0;
          (x, normal.pdf(x))
        }),
        ShapeStyle::from(&SECOND).stroke_width(2),
      ))
      .map_err(|e| anyhow::anyhow!("Failed to draw density: {}", e))?
      .label("N(0,1)")
      .legend(|(x, y)| PathElement::new([(x + 10, y + 1), (x, y)], legend_style(SECOND)));
    chart
      .configure_series_labels()
      .border_style(BLACK)
      .background_style(WHITE.mix(0.8))
      .draw()
      .map_err(|e| anyhow::anyhow!("Failed to configure series labels: {}", e))?;

    // normal Q-Q
    let mut sorted = resid.clone();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len() as f64;
    let points: Vec<(f64, f64)> = sorted
      .iter()
      .enumerate()
      .map(|(i, r)| (normal_quantile((i as f64 + 1.0) / (n + 1.0)), *r))
      .collect();
    let extent = points
      .iter()
      .fold(3.0_f64, |a, (x, y)| a.max(x.abs()).max(y.abs()));
    let mut chart = frame(&areas[2], 100, 60, 20)
      .caption("Normal Q-Q", ("sans-serif", 30.0).into_font())
      .build_cartesian_2d(-extent..extent, -extent..extent)?;
    chart
      .configure_mesh()
      .light_line_style(WHITE)
      .x_desc("Theoretical Quantiles")
      .y_desc("Sample Quantiles")
      .draw()?;
    chart
      .draw_series(points.iter().map(|p| Circle::new(*p, 2, FIFTH.filled())))
      .map_err(|e| anyhow::anyhow!("Failed to draw quantiles: {}", e))?;
    chart
      .draw_series(LineSeries::new(
        vec![(-extent, -extent), (extent, extent)],
        ShapeStyle::from(&SECOND).stroke_width(2),
      ))
      .map_err(|e| anyhow::anyhow!("Failed to draw reference line: {}", e))?;

    // correlogram
    let correlations = acf(&resid, lags);
    let bands = acf_confint(&correlations, resid.len(), 0.05);
    Self::draw_correlogram(&areas[3], &correlations, &bands, "Correlogram", "", "Lag")?;

    root
      .present()
      .map_err(|e| anyhow::anyhow!("Failed to present root: {}", e))?;
    Ok(())
  }
}

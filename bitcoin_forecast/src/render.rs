use std::fmt::Write;

use crate::{ForecastResult, PriceSeries, SentimentSeries};

const SPARK_LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

pub fn render_history_table(series: &PriceSeries) -> String {
    let mut out = String::from("Date        Price\n");
    for point in series.points() {
        let _ = writeln!(out, "{}  {:.2}", point.date, point.price);
    }
    out
}

/// Forecast rows annotated in dollars, as shown next to the chart.
pub fn render_forecast_table(forecast: &ForecastResult) -> String {
    let mut out = String::from("Date        Forecasted Price\n");
    for point in &forecast.points {
        let _ = writeln!(out, "{}  ${:.2}", point.date, point.price);
    }
    out
}

pub fn render_sentiment_table(series: &SentimentSeries) -> String {
    let mut out = String::from("Date        Sentiment\n");
    for obs in &series.observations {
        let _ = writeln!(out, "{}  {:>2}", obs.date, obs.sentiment);
    }
    out
}

/// One-line chart of history, a separator, then the forecast, on a shared
/// scale.
pub fn render_sparkline(series: &PriceSeries, forecast: &ForecastResult) -> String {
    let history = series.prices();
    let projected: Vec<f64> = forecast.points.iter().map(|point| point.price).collect();

    let (low, high) = bounds(history.iter().chain(&projected).copied());

    let mut line: String = history.iter().map(|value| glyph(*value, low, high)).collect();
    if !projected.is_empty() {
        line.push('┊');
        line.extend(projected.iter().map(|value| glyph(*value, low, high)));
    }
    line
}

/// Sentiment over time. The scale always covers -1..=1 so a neutral day sits
/// mid-height; values outside that range widen it.
pub fn render_sentiment_sparkline(series: &SentimentSeries) -> String {
    let values: Vec<f64> = series
        .observations
        .iter()
        .map(|obs| obs.sentiment as f64)
        .collect();
    let (low, high) = bounds(values.iter().copied().chain([-1.0, 1.0]));

    values.iter().map(|value| glyph(*value, low, high)).collect()
}

fn bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), value| {
        (lo.min(value), hi.max(value))
    })
}

fn glyph(value: f64, low: f64, high: f64) -> char {
    let span = high - low;
    if !span.is_finite() || span <= 0.0 {
        return SPARK_LEVELS[0];
    }
    let scaled = (value - low) / span * (SPARK_LEVELS.len() - 1) as f64;
    SPARK_LEVELS[scaled.round() as usize]
}

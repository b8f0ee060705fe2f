use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Serialize;

use crate::{ForecastError, ForecastResult, PriceSeries};

#[derive(Serialize)]
struct PriceRow {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Price")]
    price: f64,
}

#[derive(Serialize)]
struct ForecastRow {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Forecasted Price")]
    price: f64,
}

/// `bitcoin_prices_<start>_to_<end>.csv`, dates formatted `YYYY-MM-DD`.
pub fn history_file_name(start: NaiveDate, end: NaiveDate) -> String {
    format!("bitcoin_prices_{start}_to_{end}.csv")
}

pub fn forecast_file_name(forecast: &ForecastResult, start: NaiveDate, end: NaiveDate) -> String {
    format!(
        "bitcoin_forecast_{}_{start}_to_{end}.csv",
        forecast.model.label().to_ascii_lowercase()
    )
}

/// Write the normalized history as `Date,Price` CSV.
pub fn write_history_csv<W: Write>(writer: W, series: &PriceSeries) -> Result<(), ForecastError> {
    let rows = series.points().iter().map(|point| PriceRow {
        date: point.date.to_string(),
        price: point.price,
    });
    write_rows(writer, rows)
}

/// Write a forecast as `Date,Forecasted Price` CSV.
pub fn write_forecast_csv<W: Write>(
    writer: W,
    forecast: &ForecastResult,
) -> Result<(), ForecastError> {
    let rows = forecast.points.iter().map(|point| ForecastRow {
        date: point.date.to_string(),
        price: point.price,
    });
    write_rows(writer, rows)
}

pub fn history_csv_bytes(series: &PriceSeries) -> Result<Vec<u8>, ForecastError> {
    let mut buffer = Vec::new();
    write_history_csv(&mut buffer, series)?;
    Ok(buffer)
}

/// Save history and forecast CSVs into `dir`, returning the written paths.
pub fn export_to_dir(
    dir: &Path,
    series: &PriceSeries,
    forecast: &ForecastResult,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<PathBuf>, ForecastError> {
    std::fs::create_dir_all(dir).map_err(|err| ForecastError::Export(err.to_string()))?;

    let history_path = dir.join(history_file_name(start, end));
    let file = File::create(&history_path).map_err(|err| ForecastError::Export(err.to_string()))?;
    write_history_csv(file, series)?;

    let forecast_path = dir.join(forecast_file_name(forecast, start, end));
    let file = File::create(&forecast_path).map_err(|err| ForecastError::Export(err.to_string()))?;
    write_forecast_csv(file, forecast)?;

    Ok(vec![history_path, forecast_path])
}

fn write_rows<W, R, I>(writer: W, rows: I) -> Result<(), ForecastError>
where
    W: Write,
    R: Serialize,
    I: IntoIterator<Item = R>,
{
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in rows {
        csv_writer
            .serialize(row)
            .map_err(|err| ForecastError::Export(err.to_string()))?;
    }
    csv_writer
        .flush()
        .map_err(|err| ForecastError::Export(err.to_string()))
}

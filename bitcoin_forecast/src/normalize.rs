//! Column resolution and daily resampling of loosely shaped price tables.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use tracing::debug;

use crate::{ForecastError, PriceObservation, PriceSeries};

/// Values of one named column.
#[derive(Clone, Debug, PartialEq)]
pub enum ColumnData {
    Numeric(Vec<Option<f64>>),
    Dates(Vec<NaiveDate>),
    Text(Vec<String>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Numeric(values) => values.len(),
            ColumnData::Dates(values) => values.len(),
            ColumnData::Text(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Ordered collection of named, equally long columns.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawTable {
    columns: Vec<(String, ColumnData)>,
}

impl RawTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column, keeping declaration order.
    pub fn with_column(mut self, name: impl Into<String>, data: ColumnData) -> Self {
        self.columns.push((name.into(), data));
        self
    }

    pub fn column(&self, name: &str) -> Option<&ColumnData> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, data)| data)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map(|(_, data)| data.len()).unwrap_or(0)
    }
}

impl From<&[PriceObservation]> for RawTable {
    fn from(points: &[PriceObservation]) -> Self {
        RawTable::new()
            .with_column(
                "Date",
                ColumnData::Dates(points.iter().map(|point| point.date).collect()),
            )
            .with_column(
                "Price",
                ColumnData::Numeric(points.iter().map(|point| Some(point.price)).collect()),
            )
    }
}

impl From<&PriceSeries> for RawTable {
    fn from(series: &PriceSeries) -> Self {
        RawTable::from(series.points())
    }
}

/// Turn a raw table into a gap-free daily [`PriceSeries`].
///
/// Dates come from a `timestamp` column (epoch seconds) or else a `Date`
/// column. Prices come from `price`, then `Price`, then the first column in
/// declared order whose name contains "price" in any case. Same-day rows are
/// averaged and interior missing days are linearly interpolated; nothing is
/// extrapolated past the first or last observed day.
pub fn normalize(raw: &RawTable) -> Result<PriceSeries, ForecastError> {
    let lengths_match = raw
        .columns
        .iter()
        .all(|(_, data)| data.len() == raw.row_count());
    if !lengths_match {
        return Err(ForecastError::SchemaResolution(
            "columns have different lengths".to_string(),
        ));
    }

    let dates = resolve_dates(raw)?;
    let (price_column, prices) = resolve_prices(raw)?;
    debug!(price_column, rows = dates.len(), "resolved price table columns");

    let mut buckets: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    for (date, price) in dates.into_iter().zip(prices) {
        if let Some(price) = price.filter(|value| value.is_finite()) {
            let bucket = buckets.entry(date).or_insert((0.0, 0));
            bucket.0 += price;
            bucket.1 += 1;
        }
    }

    let daily: Vec<(NaiveDate, f64)> = buckets
        .into_iter()
        .map(|(date, (sum, count))| (date, sum / count as f64))
        .collect();

    PriceSeries::new(interpolate_daily(&daily)?)
}

fn resolve_dates(raw: &RawTable) -> Result<Vec<NaiveDate>, ForecastError> {
    if let Some(column) = raw.column("timestamp") {
        return match column {
            ColumnData::Numeric(values) => values
                .iter()
                .copied()
                .map(|value| {
                    let seconds = value.ok_or_else(|| {
                        ForecastError::SchemaResolution("missing timestamp value".to_string())
                    })?;
                    epoch_seconds_to_date(seconds)
                })
                .collect(),
            ColumnData::Dates(values) => Ok(values.clone()),
            ColumnData::Text(values) => values.iter().map(|value| parse_date(value)).collect(),
        };
    }

    match raw.column("Date") {
        Some(ColumnData::Dates(values)) => Ok(values.clone()),
        Some(ColumnData::Text(values)) => values.iter().map(|value| parse_date(value)).collect(),
        Some(ColumnData::Numeric(_)) => Err(ForecastError::SchemaResolution(
            "`Date` column is numeric; use `timestamp` for epoch seconds".to_string(),
        )),
        None => Err(ForecastError::SchemaResolution(
            "no `timestamp` or `Date` column found".to_string(),
        )),
    }
}

fn resolve_prices(raw: &RawTable) -> Result<(&str, Vec<Option<f64>>), ForecastError> {
    let name = if raw.column("price").is_some() {
        "price"
    } else if raw.column("Price").is_some() {
        "Price"
    } else {
        raw.column_names()
            .find(|name| name.to_lowercase().contains("price"))
            .ok_or_else(|| {
                ForecastError::SchemaResolution("no valid 'Price' column found".to_string())
            })?
    };

    let values = match raw.column(name) {
        Some(ColumnData::Numeric(values)) => values.clone(),
        Some(ColumnData::Text(values)) => values
            .iter()
            .map(|value| {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    return Ok(None);
                }
                trimmed.parse::<f64>().map(Some).map_err(|_| {
                    ForecastError::SchemaResolution(format!(
                        "column `{name}` holds non-numeric value {value:?}"
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(ColumnData::Dates(_)) | None => {
            return Err(ForecastError::SchemaResolution(format!(
                "column `{name}` does not hold prices"
            )))
        }
    };

    Ok((name, values))
}

fn epoch_seconds_to_date(seconds: f64) -> Result<NaiveDate, ForecastError> {
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9) as u32;
    let timestamp: DateTime<Utc> = Utc
        .timestamp_opt(whole as i64, nanos)
        .single()
        .ok_or(ForecastError::TimeConversion)?;
    Ok(timestamp.date_naive())
}

fn parse_date(value: &str) -> Result<NaiveDate, ForecastError> {
    let trimmed = value.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| {
            DateTime::parse_from_rfc3339(trimmed).map(|dt| dt.with_timezone(&Utc).date_naive())
        })
        .map_err(|_| ForecastError::SchemaResolution(format!("unparseable date {value:?}")))
}

/// Fill interior calendar gaps of a sorted, de-duplicated daily series.
fn interpolate_daily(daily: &[(NaiveDate, f64)]) -> Result<Vec<PriceObservation>, ForecastError> {
    let (first, rest) = daily.split_first().ok_or(ForecastError::EmptyData)?;

    let mut points = vec![PriceObservation {
        date: first.0,
        price: first.1,
    }];
    let mut previous = *first;
    for &(date, price) in rest {
        let gap = (date - previous.0).num_days();
        for step in 1..gap {
            let fraction = step as f64 / gap as f64;
            points.push(PriceObservation {
                date: previous.0 + Duration::days(step),
                price: previous.1 + (price - previous.1) * fraction,
            });
        }
        points.push(PriceObservation { date, price });
        previous = (date, price);
    }

    Ok(points)
}

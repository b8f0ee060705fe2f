use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One daily price observation.
///
/// * `date` is the UTC calendar day the sample belongs to.
/// * `price` is quoted in USD. When the upstream series is sub-daily, this is
///   the last sample reported that day.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PriceObservation {
    pub date: NaiveDate,
    pub price: f64,
}

/// Gap-free daily price series.
///
/// Dates are strictly increasing with a step of exactly one day and every
/// price is finite. The only way to build one is [`PriceSeries::new`], which
/// checks both.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct PriceSeries {
    points: Vec<PriceObservation>,
}

impl PriceSeries {
    pub fn new(points: Vec<PriceObservation>) -> Result<Self, ForecastError> {
        if points.is_empty() {
            return Err(ForecastError::EmptyData);
        }

        for pair in points.windows(2) {
            if pair[1].date - pair[0].date != Duration::days(1) {
                return Err(ForecastError::SchemaResolution(format!(
                    "series is not contiguous between {} and {}",
                    pair[0].date, pair[1].date
                )));
            }
        }

        if let Some(bad) = points.iter().find(|point| !point.price.is_finite()) {
            return Err(ForecastError::SchemaResolution(format!(
                "non-finite price on {}",
                bad.date
            )));
        }

        Ok(Self { points })
    }

    pub fn points(&self) -> &[PriceObservation] {
        &self.points
    }

    pub fn prices(&self) -> Vec<f64> {
        self.points.iter().map(|point| point.price).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_date(&self) -> NaiveDate {
        self.points[0].date
    }

    pub fn last_date(&self) -> NaiveDate {
        self.points[self.points.len() - 1].date
    }
}

/// Result of a single market-chart-range request.
#[derive(Clone, Debug, PartialEq)]
pub enum FetchOutcome {
    /// One row per UTC day, ordered by date.
    Prices(Vec<PriceObservation>),
    /// The upstream answered 200 but carried no `prices` field.
    NoData,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SentimentObservation {
    pub date: NaiveDate,
    pub sentiment: i64,
}

/// User supplied sentiment paired with the days of its range, in date order.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SentimentSeries {
    pub observations: Vec<SentimentObservation>,
}

impl SentimentSeries {
    /// Observations whose value falls outside the documented {-1, 0, 1} scale.
    ///
    /// Such values are accepted; callers decide whether to surface them.
    pub fn out_of_range(&self) -> Vec<&SentimentObservation> {
        self.observations
            .iter()
            .filter(|obs| !(-1..=1).contains(&obs.sentiment))
            .collect()
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
/// Forecasting model family.
///
/// Serialized as the labels offered to users (`"ARIMA"`, `"SARIMA"`).
pub enum ModelChoice {
    Arima,
    Sarima,
}

impl ModelChoice {
    pub fn label(self) -> &'static str {
        match self {
            ModelChoice::Arima => "ARIMA",
            ModelChoice::Sarima => "SARIMA",
        }
    }
}

impl fmt::Display for ModelChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ModelChoice {
    type Err = ForecastError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ARIMA" => Ok(ModelChoice::Arima),
            "SARIMA" => Ok(ModelChoice::Sarima),
            _ => Err(ForecastError::UnknownModel(value.to_string())),
        }
    }
}

/// Number of days to forecast, always within `1..=30`.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
pub struct ForecastHorizon(u32);

impl ForecastHorizon {
    pub const MIN_DAYS: u32 = 1;
    pub const MAX_DAYS: u32 = 30;

    pub fn new(days: u32) -> Result<Self, ForecastError> {
        if (Self::MIN_DAYS..=Self::MAX_DAYS).contains(&days) {
            Ok(Self(days))
        } else {
            Err(ForecastError::HorizonOutOfRange(days))
        }
    }

    pub fn days(self) -> u32 {
        self.0
    }
}

impl Default for ForecastHorizon {
    fn default() -> Self {
        Self(7)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub price: f64,
}

/// Forecast for the days immediately following the last historical day.
///
/// `points` holds exactly one entry per horizon day, in date order.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ForecastResult {
    pub model: ModelChoice,
    pub points: Vec<ForecastPoint>,
}

/// Raw sentiment input as entered by the user.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SentimentInput {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub values: String,
}

/// Everything a single pipeline run needs.
///
/// * `start` and `end` bound the price history, both inclusive.
/// * `model` selects the forecasting family.
/// * `horizon` is the number of days to forecast.
/// * `sentiment` is validated independently of the price section.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ForecastRequest {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub model: ModelChoice,
    pub horizon: ForecastHorizon,
    pub sentiment: Option<SentimentInput>,
}

#[derive(Debug, Error, Clone, PartialEq)]
/// Errors that can be returned while fetching, normalizing, validating or
/// forecasting.
pub enum ForecastError {
    #[error("failed to fetch data, HTTP status code: {status}")]
    UpstreamFetch { status: u16 },
    #[error("no data available")]
    EmptyData,
    #[error("schema resolution failed: {0}")]
    SchemaResolution(String),
    #[error("invalid sentiment value: {0:?}")]
    SentimentParse(String),
    #[error("number of sentiment values ({actual}) must match number of dates ({expected})")]
    SentimentLengthMismatch { expected: usize, actual: usize },
    #[error("end date {end} must not be before start date {start}")]
    DateRange { start: NaiveDate, end: NaiveDate },
    #[error("forecast horizon must be between 1 and 30 days, got {0}")]
    HorizonOutOfRange(u32),
    #[error("unknown model {0:?}, expected ARIMA or SARIMA")]
    UnknownModel(String),
    #[error("network call failed: {0}")]
    Network(String),
    #[error("failed to deserialize response: {0}")]
    Serialization(String),
    #[error("time conversion failed")]
    TimeConversion,
    #[error("insufficient data for calculation")]
    InsufficientData,
    #[error("model fit failed: {0}")]
    ModelFit(String),
    #[error("export failed: {0}")]
    Export(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::export::history_file_name;
use crate::forecast::{ArimaForecaster, Forecaster};
use crate::normalize::{RawTable, normalize};
use crate::sentiment::build_sentiment_series;
use crate::{
    FetchOutcome, ForecastError, ForecastRequest, ForecastResult, ForecastSdk, PriceSeries,
    SentimentSeries,
};

/// Normalized history, its forecast and the name to export it under.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct PriceSection {
    pub history: PriceSeries,
    pub forecast: ForecastResult,
    pub export_file_name: String,
}

/// Outcome of one pipeline run. Each section succeeds or fails on its own.
#[derive(Clone, Debug, PartialEq)]
pub struct ForecastReport {
    pub sentiment: Option<Result<SentimentSeries, ForecastError>>,
    pub prices: Result<PriceSection, ForecastError>,
}

impl ForecastReport {
    /// Serialize both sections as `{"status": "ok", "value": ..}` or
    /// `{"status": "error", "message": ..}`.
    pub fn to_json(&self) -> Result<String, ForecastError> {
        let report = json!({
            "sentiment": match &self.sentiment {
                Some(section) => section_json(section)?,
                None => Value::Null,
            },
            "prices": section_json(&self.prices)?,
        });

        serde_json::to_string(&report).map_err(|err| ForecastError::Serialization(err.to_string()))
    }
}

fn section_json<T: Serialize>(section: &Result<T, ForecastError>) -> Result<Value, ForecastError> {
    Ok(match section {
        Ok(value) => json!({
            "status": "ok",
            "value": serde_json::to_value(value)
                .map_err(|err| ForecastError::Serialization(err.to_string()))?,
        }),
        Err(err) => json!({ "status": "error", "message": err.to_string() }),
    })
}

/// Execute one request: validate sentiment, then fetch, normalize and
/// forecast prices.
///
/// The sentiment section is evaluated first and independently; its failure
/// never stops the price section. Nothing is retried.
///
/// ```no_run
/// use bitcoin_forecast::{
///     ForecastHorizon, ForecastRequest, ForecastSdk, ModelChoice, SdkConfig,
/// };
/// use chrono::NaiveDate;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), bitcoin_forecast::ForecastError> {
/// let sdk = ForecastSdk::from_config(&SdkConfig::from_env()?)?;
/// let request = ForecastRequest {
///     start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
///     end: NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
///     model: ModelChoice::Sarima,
///     horizon: ForecastHorizon::new(14)?,
///     sentiment: None,
/// };
///
/// let report = bitcoin_forecast::run_forecast_handler(&sdk, &request).await;
/// println!("{}", report.to_json()?);
/// # Ok(())
/// # }
/// ```
pub async fn run_forecast_handler(sdk: &ForecastSdk, request: &ForecastRequest) -> ForecastReport {
    let sentiment = request.sentiment.as_ref().map(|input| {
        let series = build_sentiment_series(&input.values, input.start, input.end);
        match &series {
            Ok(series) => {
                let flagged = series.out_of_range();
                if !flagged.is_empty() {
                    warn!(
                        count = flagged.len(),
                        "sentiment values outside -1..=1 accepted as-is"
                    );
                }
            }
            Err(err) => warn!(error = %err, "sentiment input rejected"),
        }
        series
    });

    let prices = run_price_section(sdk, request).await;
    if let Err(err) = &prices {
        warn!(error = %err, "price section failed");
    }

    ForecastReport { sentiment, prices }
}

async fn run_price_section(
    sdk: &ForecastSdk,
    request: &ForecastRequest,
) -> Result<PriceSection, ForecastError> {
    if request.end < request.start {
        return Err(ForecastError::DateRange {
            start: request.start,
            end: request.end,
        });
    }

    let (from, to) = day_bounds(request.start, request.end)?;
    let observations = match sdk.fetch_prices(from, to).await? {
        FetchOutcome::Prices(observations) if !observations.is_empty() => observations,
        FetchOutcome::Prices(_) | FetchOutcome::NoData => return Err(ForecastError::EmptyData),
    };
    info!(days = observations.len(), "fetched daily closes");

    let history = normalize(&RawTable::from(observations.as_slice()))?;
    let forecast = ArimaForecaster::for_model(request.model).forecast(&history, request.horizon)?;

    Ok(PriceSection {
        history,
        forecast,
        export_file_name: history_file_name(request.start, request.end),
    })
}

/// Start of the first day through the last second of the last day, in UTC.
fn day_bounds(
    start: NaiveDate,
    end: NaiveDate,
) -> Result<(DateTime<Utc>, DateTime<Utc>), ForecastError> {
    let from = start.and_hms_opt(0, 0, 0).ok_or(ForecastError::TimeConversion)?;
    let to = end.and_hms_opt(23, 59, 59).ok_or(ForecastError::TimeConversion)?;
    Ok((Utc.from_utc_datetime(&from), Utc.from_utc_datetime(&to)))
}

use chrono::NaiveDate;

use crate::{ForecastError, SentimentObservation, SentimentSeries};

/// Inclusive list of calendar days from `start` to `end`.
///
/// Empty when `end` precedes `start`.
pub fn days_in_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start.iter_days().take_while(|day| *day <= end).collect()
}

/// Parse comma separated integers. Surrounding whitespace is ignored; any
/// other token rejects the whole input.
pub fn parse_sentiment(raw: &str) -> Result<Vec<i64>, ForecastError> {
    raw.split(',')
        .map(|token| {
            token
                .trim()
                .parse::<i64>()
                .map_err(|_| ForecastError::SentimentParse(token.to_string()))
        })
        .collect()
}

/// Check that exactly `expected_count` values were supplied.
pub fn validate_sentiment(values: &[i64], expected_count: usize) -> Result<(), ForecastError> {
    if values.len() != expected_count {
        return Err(ForecastError::SentimentLengthMismatch {
            expected: expected_count,
            actual: values.len(),
        });
    }
    Ok(())
}

/// Parse `raw` and pair each value with a day of `[start, end]`.
pub fn build_sentiment_series(
    raw: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<SentimentSeries, ForecastError> {
    if end < start {
        return Err(ForecastError::DateRange { start, end });
    }

    let dates = days_in_range(start, end);
    let values = parse_sentiment(raw)?;
    validate_sentiment(&values, dates.len())?;

    Ok(SentimentSeries {
        observations: dates
            .into_iter()
            .zip(values)
            .map(|(date, sentiment)| SentimentObservation { date, sentiment })
            .collect(),
    })
}

/// Neutral input for a range: one `0` per day.
pub fn default_sentiment_text(start: NaiveDate, end: NaiveDate) -> String {
    vec!["0"; days_in_range(start, end).len()].join(",")
}

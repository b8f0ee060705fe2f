use bitcoin_forecast::export::history_csv_bytes;
use bitcoin_forecast::{
    ForecastError, ForecastHorizon, ForecastRequest, ForecastSdk, ModelChoice, SdkConfig,
    SentimentInput, run_forecast_handler,
};
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use httpmock::prelude::*;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
}

fn build_sdk(server: &MockServer) -> ForecastSdk {
    ForecastSdk::from_config(&SdkConfig {
        base_url: server.base_url(),
        timeout: None,
    })
    .unwrap()
}

/// Two intraday samples per day; the later one is the daily close.
fn daily_payload(first: NaiveDate, closes: &[f64]) -> serde_json::Value {
    let mut prices = Vec::new();
    for (idx, close) in closes.iter().enumerate() {
        let midnight = Utc.from_utc_datetime(
            &(first + Duration::days(idx as i64)).and_hms_opt(0, 0, 0).unwrap(),
        );
        prices.push([(midnight + Duration::hours(1)).timestamp_millis() as f64, close - 50.0]);
        prices.push([(midnight + Duration::hours(22)).timestamp_millis() as f64, *close]);
    }
    serde_json::json!({ "prices": prices, "market_caps": [], "total_volumes": [] })
}

fn request(model: ModelChoice, days: u32, sentiment: &str) -> ForecastRequest {
    ForecastRequest {
        start: day(1),
        end: day(5),
        model,
        horizon: ForecastHorizon::new(days).unwrap(),
        sentiment: Some(SentimentInput {
            start: day(1),
            end: day(5),
            values: sentiment.to_string(),
        }),
    }
}

#[tokio::test]
async fn five_day_history_yields_three_day_forecast() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/coins/bitcoin/market_chart/range")
                .query_param("vs_currency", "usd")
                .query_param("from", "1704067200")
                .query_param("to", "1704499199");
            then.status(200)
                .json_body(daily_payload(day(1), &[100.0, 102.0, 101.0, 105.0, 107.0]));
        })
        .await;

    let report = run_forecast_handler(
        &build_sdk(&server),
        &request(ModelChoice::Arima, 3, "0,1,-1,0,1"),
    )
    .await;

    mock.assert_async().await;
    let section = report.prices.expect("price section should succeed");

    let history: Vec<(NaiveDate, f64)> = section
        .history
        .points()
        .iter()
        .map(|obs| (obs.date, obs.price))
        .collect();
    assert_eq!(
        history,
        vec![
            (day(1), 100.0),
            (day(2), 102.0),
            (day(3), 101.0),
            (day(4), 105.0),
            (day(5), 107.0),
        ]
    );

    let forecast_dates: Vec<NaiveDate> = section.forecast.points.iter().map(|p| p.date).collect();
    assert_eq!(forecast_dates, vec![day(6), day(7), day(8)]);
    assert!(section.forecast.points.iter().all(|p| p.price.is_finite()));
    assert_eq!(
        section.export_file_name,
        "bitcoin_prices_2024-01-01_to_2024-01-05.csv"
    );

    let csv = String::from_utf8(history_csv_bytes(&section.history).unwrap()).unwrap();
    assert!(csv.starts_with("Date,Price\n2024-01-01,100.0\n"));

    let sentiment = report.sentiment.unwrap().expect("sentiment should validate");
    assert_eq!(sentiment.observations.len(), 5);
}

#[tokio::test]
async fn sentiment_failure_does_not_block_prices() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/coins/bitcoin/market_chart/range");
            then.status(200)
                .json_body(daily_payload(day(1), &[100.0, 102.0, 101.0, 105.0, 107.0]));
        })
        .await;

    let report = run_forecast_handler(
        &build_sdk(&server),
        &request(ModelChoice::Sarima, 2, "0,1"),
    )
    .await;

    mock.assert_async().await;
    assert_eq!(
        report.sentiment,
        Some(Err(ForecastError::SentimentLengthMismatch {
            expected: 5,
            actual: 2
        }))
    );
    let section = report.prices.expect("prices should still be produced");
    assert_eq!(section.forecast.points.len(), 2);
    assert_eq!(section.forecast.model, ModelChoice::Sarima);
}

#[tokio::test]
async fn upstream_failure_keeps_valid_sentiment() {
    let server = MockServer::start_async().await;
    let _mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/coins/bitcoin/market_chart/range");
            then.status(503);
        })
        .await;

    let report = run_forecast_handler(
        &build_sdk(&server),
        &request(ModelChoice::Arima, 3, "0,0,0,0,0"),
    )
    .await;

    assert_eq!(report.prices, Err(ForecastError::UpstreamFetch { status: 503 }));
    assert!(matches!(report.sentiment, Some(Ok(_))));

    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(json["prices"]["status"], "error");
    assert_eq!(json["sentiment"]["status"], "ok");
    assert_eq!(json["sentiment"]["value"]["observations"][0]["date"], "2024-01-01");
}

#[tokio::test]
async fn missing_upstream_days_are_interpolated() {
    let server = MockServer::start_async().await;
    let first = day(1);
    let prices: Vec<[f64; 2]> = [(0, 100.0), (2, 110.0), (4, 130.0)]
        .iter()
        .map(|(offset, price)| {
            let ts = Utc.from_utc_datetime(
                &(first + Duration::days(*offset)).and_hms_opt(12, 0, 0).unwrap(),
            );
            [ts.timestamp_millis() as f64, *price]
        })
        .collect();
    let _mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/coins/bitcoin/market_chart/range");
            then.status(200).json_body(serde_json::json!({ "prices": prices }));
        })
        .await;

    let report = run_forecast_handler(
        &build_sdk(&server),
        &request(ModelChoice::Arima, 1, "0,0,0,0,0"),
    )
    .await;

    let section = report.prices.unwrap();
    assert_eq!(section.history.prices(), vec![100.0, 105.0, 110.0, 120.0, 130.0]);
    assert_eq!(section.forecast.points[0].date, day(6));
}

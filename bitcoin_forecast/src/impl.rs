use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::SdkConfig;
use crate::{FetchOutcome, ForecastError, PriceObservation};

const ASSET_ID: &str = "bitcoin";
const VS_CURRENCY: &str = "usd";

/// Market data client for the Bitcoin price history pipeline.
pub struct ForecastSdk {
    client: Client,
    market_base_url: String,
}

impl ForecastSdk {
    /// Construct a client that talks to the public CoinGecko API.
    ///
    /// ```no_run
    /// use bitcoin_forecast::ForecastSdk;
    ///
    /// let sdk = ForecastSdk::new()?;
    /// # Ok::<(), bitcoin_forecast::ForecastError>(())
    /// ```
    pub fn new() -> Result<Self, ForecastError> {
        Self::from_config(&SdkConfig::default())
    }

    /// Build a client from explicit settings, e.g. [`SdkConfig::from_env`] or
    /// a mock server URL during tests.
    pub fn from_config(config: &SdkConfig) -> Result<Self, ForecastError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|err| ForecastError::Network(err.to_string()))?;

        Ok(Self::with_client(client, Some(config.base_url.clone())))
    }

    /// Build a client with a pre-configured HTTP client and optional base URL.
    pub fn with_client(client: Client, market_base_url: Option<String>) -> Self {
        let url = market_base_url.unwrap_or_else(|| crate::config::DEFAULT_BASE_URL.to_string());
        Self {
            client,
            market_base_url: url,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.market_base_url
    }

    /// Fetch USD prices between `start` and `end`, one row per UTC day.
    ///
    /// Issues exactly one `/market_chart/range` request. Within a day the last
    /// sample wins, and days outside `[start, end]` are dropped. A 200 response
    /// without a `prices` field yields [`FetchOutcome::NoData`]; any other
    /// status fails with [`ForecastError::UpstreamFetch`] and is not retried.
    pub async fn fetch_prices(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<FetchOutcome, ForecastError> {
        let url = format!(
            "{}/coins/{}/market_chart/range",
            self.market_base_url, ASSET_ID
        );
        let query = vec![
            ("vs_currency", VS_CURRENCY.to_string()),
            ("from", start.timestamp().to_string()),
            ("to", end.timestamp().to_string()),
        ];

        info!(%start, %end, "fetching bitcoin market chart range");
        let payload = self.request_market_chart(url, query).await?;

        match payload.prices {
            Some(prices) => {
                let daily = collapse_to_daily_close(&prices, start.date_naive(), end.date_naive())?;
                debug!(samples = prices.len(), days = daily.len(), "collapsed to daily closes");
                Ok(FetchOutcome::Prices(daily))
            }
            None => {
                info!("upstream response carried no prices");
                Ok(FetchOutcome::NoData)
            }
        }
    }

    async fn request_market_chart(
        &self,
        url: String,
        query: Vec<(&str, String)>,
    ) -> Result<MarketChartResponse, ForecastError> {
        let response = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|err| ForecastError::Network(err.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ForecastError::UpstreamFetch {
                status: status.as_u16(),
            });
        }

        response
            .json()
            .await
            .map_err(|err| ForecastError::Serialization(err.to_string()))
    }
}

#[derive(Deserialize)]
struct MarketChartResponse {
    #[serde(default)]
    prices: Option<Vec<[f64; 2]>>,
}

fn collapse_to_daily_close(
    prices: &[[f64; 2]],
    first_day: NaiveDate,
    last_day: NaiveDate,
) -> Result<Vec<PriceObservation>, ForecastError> {
    let mut by_day: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for entry in prices {
        let timestamp = Utc
            .timestamp_millis_opt(entry[0] as i64)
            .single()
            .ok_or(ForecastError::TimeConversion)?;
        let date = timestamp.date_naive();
        if date < first_day || date > last_day {
            debug!(%date, "dropping sample outside requested range");
            continue;
        }
        by_day.insert(date, entry[1]);
    }

    Ok(by_day
        .into_iter()
        .map(|(date, price)| PriceObservation { date, price })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn build_sdk(server: &MockServer) -> ForecastSdk {
        let client = Client::builder().build().unwrap();
        ForecastSdk::with_client(client, Some(server.base_url()))
    }

    fn ms(y: i32, m: u32, d: u32, h: u32) -> f64 {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0)
            .single()
            .unwrap()
            .timestamp_millis() as f64
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn collapse_keeps_last_sample_per_day() {
        let prices = vec![
            [ms(2024, 1, 1, 0), 100.0],
            [ms(2024, 1, 1, 12), 101.0],
            [ms(2024, 1, 1, 23), 102.0],
            [ms(2024, 1, 2, 6), 110.0],
        ];

        let daily = collapse_to_daily_close(&prices, day(1), day(2)).unwrap();

        assert_eq!(
            daily,
            vec![
                PriceObservation { date: day(1), price: 102.0 },
                PriceObservation { date: day(2), price: 110.0 },
            ]
        );
    }

    #[test]
    fn collapse_drops_days_outside_range() {
        let prices = vec![
            [ms(2023, 12, 31, 23), 90.0],
            [ms(2024, 1, 1, 1), 100.0],
            [ms(2024, 1, 3, 1), 120.0],
        ];

        let daily = collapse_to_daily_close(&prices, day(1), day(2)).unwrap();

        assert_eq!(daily, vec![PriceObservation { date: day(1), price: 100.0 }]);
    }

    proptest! {
        #[test]
        fn collapsed_days_are_unique_and_within_range(
            samples in proptest::collection::vec(
                (1_600_000_000_000i64..1_700_000_000_000i64, 1.0f64..1_000_000.0),
                0..200,
            ),
            first_offset in 0i64..1_150,
            span in 0i64..60,
        ) {
            let first_day = NaiveDate::from_ymd_opt(2020, 9, 13).unwrap()
                + chrono::Duration::days(first_offset);
            let last_day = first_day + chrono::Duration::days(span);
            let prices: Vec<[f64; 2]> = samples
                .iter()
                .map(|(millis, price)| [*millis as f64, *price])
                .collect();

            let daily = collapse_to_daily_close(&prices, first_day, last_day).unwrap();

            prop_assert!(daily.windows(2).all(|pair| pair[0].date < pair[1].date));
            prop_assert!(daily
                .iter()
                .all(|obs| obs.date >= first_day && obs.date <= last_day));
            prop_assert!(daily.len() as i64 <= span + 1);
        }
    }

    #[tokio::test]
    async fn fetch_prices_sends_epoch_seconds() {
        let server = MockServer::start_async().await;
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 2, 23, 59, 59).single().unwrap();
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/coins/bitcoin/market_chart/range")
                    .query_param("vs_currency", "usd")
                    .query_param("from", "1704067200")
                    .query_param("to", "1704239999");
                then.status(200)
                    .json_body(json!({ "prices": [[ms(2024, 1, 1, 5), 42000.5]] }));
            })
            .await;

        let outcome = build_sdk(&server).fetch_prices(start, end).await.unwrap();

        mock.assert_async().await;
        assert_eq!(
            outcome,
            FetchOutcome::Prices(vec![PriceObservation { date: day(1), price: 42000.5 }])
        );
    }

    #[tokio::test]
    async fn fetch_prices_without_prices_field_is_no_data() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/coins/bitcoin/market_chart/range");
                then.status(200).json_body(json!({ "market_caps": [] }));
            })
            .await;

        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap();
        let outcome = build_sdk(&server).fetch_prices(start, start).await.unwrap();

        mock.assert_async().await;
        assert_eq!(outcome, FetchOutcome::NoData);
    }

    #[tokio::test]
    async fn fetch_prices_does_not_retry_rate_limits() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/coins/bitcoin/market_chart/range");
                then.status(429);
            })
            .await;

        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap();
        let result = build_sdk(&server).fetch_prices(start, start).await.unwrap_err();

        mock.assert_hits_async(1).await;
        assert_eq!(result, ForecastError::UpstreamFetch { status: 429 });
    }

    #[tokio::test]
    async fn fetch_prices_reports_undecodable_body() {
        let server = MockServer::start_async().await;
        let _mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/coins/bitcoin/market_chart/range");
                then.status(200).body("not json");
            })
            .await;

        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap();
        let result = build_sdk(&server).fetch_prices(start, start).await.unwrap_err();

        assert!(matches!(result, ForecastError::Serialization(_)));
    }
}

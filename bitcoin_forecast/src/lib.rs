//! Entry point for the Bitcoin forecast crate.
//! Consumers should import exported types via the crate root.
//!
//! # Example
//!
//! ```no_run
//! use bitcoin_forecast::{
//!     ArimaForecaster, FetchOutcome, ForecastHorizon, ForecastSdk, Forecaster, ModelChoice,
//!     RawTable, normalize,
//! };
//! use chrono::{Duration, Utc};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), bitcoin_forecast::ForecastError> {
//!     let sdk = ForecastSdk::new()?;
//!     let end = Utc::now();
//!     let start = end - Duration::days(60);
//!
//!     if let FetchOutcome::Prices(daily) = sdk.fetch_prices(start, end).await? {
//!         let series = normalize(&RawTable::from(daily.as_slice()))?;
//!         let forecast = ArimaForecaster::for_model(ModelChoice::Sarima)
//!             .forecast(&series, ForecastHorizon::new(7)?)?;
//!         println!("{forecast:?}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dto;
pub mod export;
pub mod forecast;
pub mod handler;
pub(crate) mod helpers;
pub mod normalize;
pub mod render;
pub mod sentiment;
pub mod implementation {
    include!("impl.rs");
}

pub use config::SdkConfig;
pub use dto::*;
pub use forecast::{ArimaForecaster, Forecaster, ARIMA_ORDER, SARIMA_SEASONAL_ORDER};
pub use handler::{ForecastReport, PriceSection, run_forecast_handler};
pub use implementation::ForecastSdk;
pub use normalize::{ColumnData, RawTable, normalize};
pub use sentiment::{build_sentiment_series, parse_sentiment, validate_sentiment};

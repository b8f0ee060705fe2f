use bitcoin_forecast::{
    ArimaForecaster, FetchOutcome, ForecastHorizon, ForecastSdk, Forecaster, ModelChoice,
    RawTable, SdkConfig, normalize,
};
use chrono::{Duration, Utc};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🚀 Fetching 90 days of Bitcoin closes...");
    let sdk = ForecastSdk::from_config(&SdkConfig::from_env()?)?;

    let end = Utc::now();
    let start = end - Duration::days(90);

    let daily = match sdk.fetch_prices(start, end).await? {
        FetchOutcome::Prices(daily) => daily,
        FetchOutcome::NoData => {
            println!("⚠️ No data available.");
            return Ok(());
        }
    };

    let series = normalize(&RawTable::from(daily.as_slice()))?;
    println!("📊 {} days from {} to {}", series.len(), series.first_date(), series.last_date());

    for model in [ModelChoice::Arima, ModelChoice::Sarima] {
        let forecast =
            ArimaForecaster::for_model(model).forecast(&series, ForecastHorizon::new(7)?)?;
        println!("\n--- 🔮 {model} 7 day forecast ---");
        for point in forecast.points {
            println!("      {}  ${:.2}", point.date, point.price);
        }
    }

    Ok(())
}

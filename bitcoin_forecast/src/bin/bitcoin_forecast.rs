//! Command-line front end: fetch, normalize, forecast and display Bitcoin
//! prices alongside a daily sentiment series.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use bitcoin_forecast::export::export_to_dir;
use bitcoin_forecast::render::{
    render_forecast_table, render_history_table, render_sentiment_sparkline,
    render_sentiment_table, render_sparkline,
};
use bitcoin_forecast::sentiment::default_sentiment_text;
use bitcoin_forecast::{
    ForecastHorizon, ForecastReport, ForecastRequest, ForecastSdk, ModelChoice, SdkConfig,
    SentimentInput, run_forecast_handler,
};
use chrono::{NaiveDate, Utc};
use clap::Parser;

/// Bitcoin price forecast (ARIMA / SARIMA) with a sentiment viewer.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// First day of price history (YYYY-MM-DD, UTC). Defaults to today.
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Last day of price history (YYYY-MM-DD, UTC). Defaults to today.
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Forecasting model: ARIMA or SARIMA
    #[arg(short = 'm', long, env = "FORECAST_MODEL", default_value = "ARIMA")]
    model: ModelChoice,

    /// Number of days to forecast (1-30)
    #[arg(
        short = 'd',
        long = "days",
        env = "FORECAST_DAYS",
        default_value_t = 7,
        value_parser = clap::value_parser!(u32).range(1..=30)
    )]
    days: u32,

    /// First day of the sentiment series. Defaults to --start.
    #[arg(long)]
    sentiment_start: Option<NaiveDate>,

    /// Last day of the sentiment series. Defaults to --end.
    #[arg(long)]
    sentiment_end: Option<NaiveDate>,

    /// Comma separated sentiment values (-1, 0 or 1), one per day.
    /// Defaults to a neutral 0 for every day.
    #[arg(short = 's', long)]
    sentiment: Option<String>,

    /// Directory to save the history and forecast CSV files into.
    #[arg(long)]
    export_dir: Option<PathBuf>,

    /// Print the report as JSON instead of tables.
    #[arg(long)]
    json: bool,
}

impl Args {
    fn into_request(self) -> Result<(ForecastRequest, Option<PathBuf>, bool)> {
        let today = Utc::now().date_naive();
        let start = self.start.unwrap_or(today);
        let end = self.end.unwrap_or(today);

        let sentiment_start = self.sentiment_start.unwrap_or(start);
        let sentiment_end = self.sentiment_end.unwrap_or(end);
        let values = self
            .sentiment
            .unwrap_or_else(|| default_sentiment_text(sentiment_start, sentiment_end));

        let request = ForecastRequest {
            start,
            end,
            model: self.model,
            horizon: ForecastHorizon::new(self.days).context("invalid --days")?,
            sentiment: Some(SentimentInput {
                start: sentiment_start,
                end: sentiment_end,
                values,
            }),
        };
        Ok((request, self.export_dir, self.json))
    }
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    init_logging();

    match run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("❌ Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<ExitCode> {
    let (request, export_dir, as_json) = Args::parse().into_request()?;
    let config = SdkConfig::from_env().context("failed to read configuration")?;
    let sdk = ForecastSdk::from_config(&config).context("failed to build HTTP client")?;

    let report = run_forecast_handler(&sdk, &request).await;

    if as_json {
        println!("{}", report.to_json()?);
    } else {
        print_report(&report, &request);
    }

    let Ok(section) = &report.prices else {
        return Ok(ExitCode::FAILURE);
    };

    if let Some(dir) = export_dir {
        let paths = export_to_dir(
            &dir,
            &section.history,
            &section.forecast,
            request.start,
            request.end,
        )
        .context("failed to export CSV files")?;
        for path in paths {
            eprintln!("📥 Saved {}", path.display());
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn print_report(report: &ForecastReport, request: &ForecastRequest) {
    println!("📈 Bitcoin Price Forecast (ARIMA / SARIMA) + Sentiment Viewer\n");

    println!("💬 Sentiment Data");
    match &report.sentiment {
        Some(Ok(series)) => {
            println!("{}", render_sentiment_table(series));
            println!("{}\n", render_sentiment_sparkline(series));
        }
        Some(Err(err)) => println!("⚠️ Error in sentiment input: {err}\n"),
        None => println!("(none)\n"),
    }

    match &report.prices {
        Ok(section) => {
            println!("✅ Data fetched successfully!\n");
            println!("{}", render_history_table(&section.history));
            println!(
                "📊 Forecasting with {} for {} days",
                request.model,
                request.horizon.days()
            );
            println!("{}\n", render_sparkline(&section.history, &section.forecast));
            println!("🔮 Forecasted Prices:");
            println!("{}", render_forecast_table(&section.forecast));
        }
        Err(bitcoin_forecast::ForecastError::EmptyData) => println!("⚠️ No data available."),
        Err(err) => println!("❌ Error: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_is_a_plain_switch() {
        assert!(Args::try_parse_from(["bitcoin-forecast", "--json"]).unwrap().json);
        assert!(!Args::try_parse_from(["bitcoin-forecast"]).unwrap().json);
        assert!(Args::try_parse_from(["bitcoin-forecast", "--json", "false"]).is_err());
    }
}

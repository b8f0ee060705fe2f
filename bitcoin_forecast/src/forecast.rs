//! ARIMA-family forecasting on gap-free daily series.
//!
//! Both supported model families use fixed structural orders. Parameters are
//! estimated with the Hannan–Rissanen procedure: a long autoregression
//! supplies innovation estimates, then ordinary least squares regresses the
//! (differenced) series on its AR lags and the lagged innovations. Seasonal
//! AR/MA terms enter as additional subset lags at multiples of the period.
//!
//! Estimates are then constrained the way a likelihood fit with enforced
//! stationarity and invertibility would be: the AR polynomial must have all
//! roots outside the unit circle, and so must the MA polynomial. A violating
//! polynomial is shrunk towards zero until it qualifies, and the constant is
//! re-estimated around the adjusted terms.

use chrono::Duration;
use tracing::{debug, info, warn};

use crate::helpers;
use crate::{
    ForecastError, ForecastHorizon, ForecastPoint, ForecastResult, ModelChoice, PriceSeries,
};

/// Per-lag shrink applied while pulling lag polynomials inside the admissible
/// region: a coefficient at lag `k` is scaled by `SHRINK_FACTOR^k`.
const SHRINK_FACTOR: f64 = 0.98;
const MAX_SHRINK_STEPS: usize = 400;

/// Non-seasonal (p, d, q) order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArimaOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
}

/// Seasonal (P, D, Q, s) order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SeasonalOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
    pub period: usize,
}

pub const ARIMA_ORDER: ArimaOrder = ArimaOrder { p: 5, d: 0, q: 1 };
pub const SARIMA_SEASONAL_ORDER: SeasonalOrder = SeasonalOrder {
    p: 1,
    d: 1,
    q: 1,
    period: 7,
};

/// Anything that turns a daily series into a dated forecast.
pub trait Forecaster {
    fn model(&self) -> ModelChoice;

    fn forecast(
        &self,
        series: &PriceSeries,
        horizon: ForecastHorizon,
    ) -> Result<ForecastResult, ForecastError>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct ArimaForecaster {
    model: ModelChoice,
    order: ArimaOrder,
    seasonal: Option<SeasonalOrder>,
    include_constant: bool,
}

impl ArimaForecaster {
    /// Fixed configuration for each model family.
    ///
    /// ARIMA carries a constant term; SARIMA is seasonally differenced and
    /// fitted without one.
    pub fn for_model(model: ModelChoice) -> Self {
        match model {
            ModelChoice::Arima => Self {
                model,
                order: ARIMA_ORDER,
                seasonal: None,
                include_constant: true,
            },
            ModelChoice::Sarima => Self {
                model,
                order: ARIMA_ORDER,
                seasonal: Some(SARIMA_SEASONAL_ORDER),
                include_constant: false,
            },
        }
    }

    pub fn order(&self) -> ArimaOrder {
        self.order
    }

    pub fn seasonal_order(&self) -> Option<SeasonalOrder> {
        self.seasonal
    }

    /// Estimate the model on `values`, shrinking the lag structure when the
    /// series is too short to identify the configured orders.
    pub fn fit(&self, values: &[f64]) -> Result<FittedModel, ForecastError> {
        if values.is_empty() {
            return Err(ForecastError::InsufficientData);
        }

        let differencing = self.differencing_lags();
        let required = differencing.iter().sum::<usize>();
        if values.len() <= required {
            warn!(
                model = %self.model,
                observations = values.len(),
                "series too short for seasonal differencing, falling back to ARIMA"
            );
            return ArimaForecaster::for_model(ModelChoice::Arima).fit(values);
        }

        let mut levels = vec![values.to_vec()];
        for &lag in &differencing {
            let next = helpers::difference(&levels[levels.len() - 1], lag);
            levels.push(next);
        }
        let stationary = levels.pop().ok_or(ForecastError::InsufficientData)?;

        let ladder = self.candidate_terms();
        for (rank, (ar_lags, ma_lags)) in ladder.iter().enumerate() {
            match fit_arma(&stationary, ar_lags, ma_lags, self.include_constant) {
                Ok(arma) => {
                    if rank > 0 {
                        warn!(
                            model = %self.model,
                            observations = values.len(),
                            ?ar_lags,
                            ?ma_lags,
                            "reduced model orders to fit a short series"
                        );
                    }
                    return Ok(FittedModel {
                        differencing,
                        levels,
                        stationary,
                        arma,
                    });
                }
                Err(ForecastError::InsufficientData) => {
                    debug!(?ar_lags, ?ma_lags, "lag structure not identifiable");
                }
                Err(err) => return Err(err),
            }
        }

        Err(ForecastError::InsufficientData)
    }

    fn differencing_lags(&self) -> Vec<usize> {
        let mut lags = Vec::new();
        if let Some(seasonal) = self.seasonal {
            lags.extend(std::iter::repeat(seasonal.period).take(seasonal.d));
        }
        lags.extend(std::iter::repeat(1).take(self.order.d));
        lags
    }

    /// Lag sets from the configured orders down to a mean model: drop the
    /// seasonal MA term, the MA terms, the seasonal AR term, then decrement p.
    fn candidate_terms(&self) -> Vec<(Vec<usize>, Vec<usize>)> {
        let (period, mut sp, mut sq) = match self.seasonal {
            Some(seasonal) => (seasonal.period, seasonal.p, seasonal.q),
            None => (0, 0, 0),
        };
        let mut p = self.order.p;
        let mut q = self.order.q;

        let lag_set = |plain: usize, seasonal: usize| {
            let mut lags: Vec<usize> = (1..=plain)
                .chain((1..=seasonal).map(|k| k * period))
                .collect();
            lags.sort_unstable();
            lags.dedup();
            lags
        };

        let mut ladder = vec![(lag_set(p, sp), lag_set(q, sq))];
        let mut push = |p: usize, q: usize, sp: usize, sq: usize| {
            let candidate = (lag_set(p, sp), lag_set(q, sq));
            if ladder.last() != Some(&candidate) {
                ladder.push(candidate);
            }
        };

        sq = 0;
        push(p, q, sp, sq);
        q = 0;
        push(p, q, sp, sq);
        sp = 0;
        push(p, q, sp, sq);
        while p > 0 {
            p -= 1;
            push(p, q, sp, sq);
        }

        ladder
    }
}

impl Forecaster for ArimaForecaster {
    fn model(&self) -> ModelChoice {
        self.model
    }

    fn forecast(
        &self,
        series: &PriceSeries,
        horizon: ForecastHorizon,
    ) -> Result<ForecastResult, ForecastError> {
        let fitted = self.fit(&series.prices())?;
        info!(
            model = %self.model,
            observations = series.len(),
            ar_lags = ?fitted.ar_lags(),
            ma_lags = ?fitted.ma_lags(),
            residual_std = fitted.residual_std(),
            "fitted forecasting model"
        );

        let steps = horizon.days() as usize;
        let values = fitted.predict(steps);
        if values.len() != steps || values.iter().any(|value| !value.is_finite()) {
            return Err(ForecastError::ModelFit(format!(
                "{} produced a non-finite forecast",
                self.model
            )));
        }

        let last = series.last_date();
        let points = values
            .into_iter()
            .enumerate()
            .map(|(idx, price)| ForecastPoint {
                date: last + Duration::days(idx as i64 + 1),
                price,
            })
            .collect();

        Ok(ForecastResult {
            model: self.model,
            points,
        })
    }
}

/// Estimated model, ready to extrapolate.
#[derive(Clone, Debug)]
pub struct FittedModel {
    differencing: Vec<usize>,
    levels: Vec<Vec<f64>>,
    stationary: Vec<f64>,
    arma: ArmaFit,
}

impl FittedModel {
    pub fn ar_lags(&self) -> Vec<usize> {
        self.arma.ar.iter().map(|(lag, _)| *lag).collect()
    }

    pub fn ma_lags(&self) -> Vec<usize> {
        self.arma.ma.iter().map(|(lag, _)| *lag).collect()
    }

    pub fn residual_std(&self) -> f64 {
        helpers::std_dev_or_zero(&self.arma.residuals[self.arma.start..])
    }

    /// Forecast `steps` values on the original scale. Future innovations are
    /// taken as zero.
    pub fn predict(&self, steps: usize) -> Vec<f64> {
        let mut series = self.stationary.clone();
        let mut residuals = self.arma.residuals.clone();
        for _ in 0..steps {
            let t = series.len();
            let next = self.arma.one_step(t, &series, &residuals);
            series.push(next);
            residuals.push(0.0);
        }

        let mut forecast = series.split_off(self.stationary.len());
        for (level, lag) in self.levels.iter().zip(&self.differencing).rev() {
            forecast = helpers::integrate(level, &forecast, *lag);
        }
        forecast
    }
}

#[derive(Clone, Debug)]
struct ArmaFit {
    constant: f64,
    ar: Vec<(usize, f64)>,
    ma: Vec<(usize, f64)>,
    residuals: Vec<f64>,
    start: usize,
}

impl ArmaFit {
    fn one_step(&self, t: usize, series: &[f64], residuals: &[f64]) -> f64 {
        let ar: f64 = self.ar.iter().map(|(lag, coef)| coef * series[t - lag]).sum();
        let ma: f64 = self.ma.iter().map(|(lag, coef)| coef * residuals[t - lag]).sum();
        self.constant + ar + ma
    }
}

fn fit_arma(
    series: &[f64],
    ar_lags: &[usize],
    ma_lags: &[usize],
    include_constant: bool,
) -> Result<ArmaFit, ForecastError> {
    let n = series.len();
    if n == 0 {
        return Err(ForecastError::InsufficientData);
    }

    if ar_lags.is_empty() && ma_lags.is_empty() {
        let constant = if include_constant {
            helpers::mean_or_zero(series)
        } else {
            0.0
        };
        return Ok(ArmaFit {
            constant,
            ar: Vec::new(),
            ma: Vec::new(),
            residuals: series.iter().map(|value| value - constant).collect(),
            start: 0,
        });
    }

    let max_ar = ar_lags.iter().copied().max().unwrap_or(0);
    let max_ma = ma_lags.iter().copied().max().unwrap_or(0);

    let (innovations, start) = if ma_lags.is_empty() {
        (vec![0.0; n], max_ar)
    } else {
        let long_order = max_ar + max_ma;
        if long_order >= n {
            return Err(ForecastError::InsufficientData);
        }
        let long_lags: Vec<usize> = (1..=long_order).collect();
        let long_rows: Vec<Vec<f64>> = (long_order..n)
            .map(|t| design_row(t, series, &long_lags, &[], &[], include_constant))
            .collect();
        let coefficients = helpers::least_squares(&long_rows, &series[long_order..])?;

        let mut innovations = vec![0.0; n];
        for (offset, row) in long_rows.iter().enumerate() {
            let fitted: f64 = row.iter().zip(&coefficients).map(|(x, c)| x * c).sum();
            innovations[long_order + offset] = series[long_order + offset] - fitted;
        }
        (innovations, max_ar.max(long_order + max_ma))
    };

    if start >= n {
        return Err(ForecastError::InsufficientData);
    }

    let rows: Vec<Vec<f64>> = (start..n)
        .map(|t| design_row(t, series, ar_lags, &innovations, ma_lags, include_constant))
        .collect();
    let coefficients = helpers::least_squares(&rows, &series[start..])?;

    let mut coefficients = coefficients.into_iter();
    let mut constant = if include_constant {
        coefficients.next().unwrap_or(0.0)
    } else {
        0.0
    };
    let mut ar: Vec<(usize, f64)> = ar_lags.iter().copied().zip(coefficients.by_ref()).collect();
    let mut ma: Vec<(usize, f64)> = ma_lags.iter().copied().zip(coefficients).collect();

    let ar_adjusted = constrain_terms(&mut ar, 1.0);
    let ma_adjusted = constrain_terms(&mut ma, -1.0);
    if ar_adjusted || ma_adjusted {
        debug!(ar_adjusted, ma_adjusted, "constrained lag polynomials");
        if include_constant {
            let offsets: Vec<f64> = (start..n)
                .map(|t| {
                    let ar_part: f64 = ar.iter().map(|(lag, coef)| coef * series[t - lag]).sum();
                    let ma_part: f64 =
                        ma.iter().map(|(lag, coef)| coef * innovations[t - lag]).sum();
                    series[t] - ar_part - ma_part
                })
                .collect();
            constant = helpers::mean_or_zero(&offsets);
        }
    }

    let mut fit = ArmaFit {
        constant,
        ar,
        ma,
        residuals: innovations,
        start,
    };
    for t in start..n {
        let fitted = fit.one_step(t, series, &fit.residuals);
        fit.residuals[t] = series[t] - fitted;
    }

    Ok(fit)
}

/// Scale lag terms towards zero until `1 - sum(sign * coef * z^lag)` has all
/// roots outside the unit circle. `sign` is `1.0` for AR terms and `-1.0` for
/// MA terms. Returns whether any coefficient changed.
fn constrain_terms(terms: &mut [(usize, f64)], sign: f64) -> bool {
    let mut adjusted = false;
    for _ in 0..MAX_SHRINK_STEPS {
        if roots_outside_unit_circle(dense_lag_polynomial(terms, sign)) {
            return adjusted;
        }
        for (lag, coef) in terms.iter_mut() {
            *coef *= SHRINK_FACTOR.powi(*lag as i32);
        }
        adjusted = true;
    }

    warn!(?terms, "lag polynomial could not be constrained, dropping its terms");
    for (_, coef) in terms.iter_mut() {
        *coef = 0.0;
    }
    true
}

/// `[a_1, .., a_m]` of `1 - sum(a_k z^k)`, with zeros at lags not in `terms`.
fn dense_lag_polynomial(terms: &[(usize, f64)], sign: f64) -> Vec<f64> {
    let width = terms.iter().map(|(lag, _)| *lag).max().unwrap_or(0);
    let mut dense = vec![0.0; width];
    for (lag, coef) in terms {
        dense[lag - 1] = sign * coef;
    }
    dense
}

/// Schur–Cohn test by Levinson step-down: the roots of `1 - sum(a_k z^k)` lie
/// outside the unit circle iff every partial autocorrelation is inside (-1, 1).
fn roots_outside_unit_circle(mut coefficients: Vec<f64>) -> bool {
    while let Some(&last) = coefficients.last() {
        if !last.is_finite() || last.abs() >= 1.0 {
            return false;
        }
        let m = coefficients.len();
        let denominator = 1.0 - last * last;
        coefficients = (0..m - 1)
            .map(|j| (coefficients[j] + last * coefficients[m - 2 - j]) / denominator)
            .collect();
    }
    true
}

fn design_row(
    t: usize,
    series: &[f64],
    ar_lags: &[usize],
    innovations: &[f64],
    ma_lags: &[usize],
    include_constant: bool,
) -> Vec<f64> {
    let mut row = Vec::with_capacity(ar_lags.len() + ma_lags.len() + 1);
    if include_constant {
        row.push(1.0);
    }
    row.extend(ar_lags.iter().map(|lag| series[t - lag]));
    row.extend(ma_lags.iter().map(|lag| innovations[t - lag]));
    row
}

use smartcore::linalg::basic::arrays::Array;
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::linalg::traits::svd::SVDDecomposable;
use statrs::statistics::Statistics;

use crate::dto::ForecastError;

/// Columns whose RMS falls below this fraction of the largest column are
/// treated as identically zero.
const ZERO_COLUMN_TOLERANCE: f64 = 1e-12;

/// Ordinary least squares solved by SVD on a column-scaled design.
///
/// Every column is divided by its RMS before the solve, so a constant column
/// and price lags near 4e4 enter on the same scale. Rank-deficient designs
/// get the minimum-norm solution; zero columns get a zero coefficient. Fails
/// with [`ForecastError::InsufficientData`] when there are not more rows than
/// coefficients.
pub(crate) fn least_squares(rows: &[Vec<f64>], targets: &[f64]) -> Result<Vec<f64>, ForecastError> {
    let width = rows.first().map(Vec::len).unwrap_or(0);
    if width == 0 || rows.len() != targets.len() || rows.len() <= width {
        return Err(ForecastError::InsufficientData);
    }

    let scales: Vec<f64> = (0..width)
        .map(|col| {
            let sum_sq: f64 = rows.iter().map(|row| row[col] * row[col]).sum();
            (sum_sq / rows.len() as f64).sqrt()
        })
        .collect();
    let largest = scales.iter().copied().fold(0.0, f64::max);
    if !largest.is_finite() || targets.iter().any(|value| !value.is_finite()) {
        return Err(ForecastError::InsufficientData);
    }

    let active: Vec<usize> = (0..width)
        .filter(|&col| scales[col] > ZERO_COLUMN_TOLERANCE * largest)
        .collect();
    let mut coefficients = vec![0.0; width];
    if active.is_empty() {
        return Ok(coefficients);
    }

    let design: Vec<Vec<f64>> = rows
        .iter()
        .map(|row| active.iter().map(|&col| row[col] / scales[col]).collect())
        .collect();
    let column: Vec<Vec<f64>> = targets.iter().map(|target| vec![*target]).collect();

    let solution = DenseMatrix::from_2d_vec(&design)
        .svd_solve_mut(DenseMatrix::from_2d_vec(&column))
        .map_err(|e| ForecastError::ModelFit(format!("least squares failed: {}", e)))?;

    for (idx, &col) in active.iter().enumerate() {
        coefficients[col] = *solution.get((idx, 0)) / scales[col];
    }

    if coefficients.iter().any(|value| !value.is_finite()) {
        return Err(ForecastError::InsufficientData);
    }
    Ok(coefficients)
}

/// `values[t] - values[t - lag]` for every `t >= lag`.
pub(crate) fn difference(values: &[f64], lag: usize) -> Vec<f64> {
    if lag == 0 || values.len() <= lag {
        return Vec::new();
    }
    values
        .windows(lag + 1)
        .map(|window| window[lag] - window[0])
        .collect()
}

/// Undo one [`difference`] pass for values appended after `history`.
pub(crate) fn integrate(history: &[f64], increments: &[f64], lag: usize) -> Vec<f64> {
    let mut extended = history.to_vec();
    for increment in increments {
        let base = extended[extended.len() - lag];
        extended.push(base + increment);
    }
    extended.split_off(history.len())
}

/// Sample standard deviation, or zero when fewer than two values exist.
pub(crate) fn std_dev_or_zero(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let deviation = values.iter().std_dev();
    if deviation.is_finite() {
        deviation
    } else {
        0.0
    }
}

pub(crate) fn mean_or_zero(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().mean()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_recovers_exact_line() {
        let rows: Vec<Vec<f64>> = (0..10).map(|x| vec![1.0, x as f64]).collect();
        let targets: Vec<f64> = (0..10).map(|x| 3.0 + 2.0 * x as f64).collect();

        let coefficients = least_squares(&rows, &targets).unwrap();

        assert!((coefficients[0] - 3.0).abs() < 1e-6);
        assert!((coefficients[1] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn least_squares_needs_more_rows_than_columns() {
        let rows = vec![vec![1.0, 2.0], vec![1.0, 3.0]];

        assert_eq!(
            least_squares(&rows, &[1.0, 2.0]),
            Err(ForecastError::InsufficientData)
        );
    }

    #[test]
    fn least_squares_handles_price_scale_collinearity() {
        // Constant column alongside lags that are all equal at ~4e4.
        let rows: Vec<Vec<f64>> = (0..20).map(|_| vec![1.0, 42_000.0, 42_000.0]).collect();
        let targets = vec![42_000.0; 20];

        let coefficients = least_squares(&rows, &targets).unwrap();

        let fitted = coefficients[0] + 42_000.0 * (coefficients[1] + coefficients[2]);
        assert!((fitted - 42_000.0).abs() < 1e-6, "fitted {fitted}");
        assert!((coefficients[1] - coefficients[2]).abs() < 1e-9);
    }

    #[test]
    fn zero_columns_get_zero_coefficients() {
        let rows: Vec<Vec<f64>> = (0..6).map(|x| vec![x as f64, 0.0]).collect();
        let targets: Vec<f64> = (0..6).map(|x| 4.0 * x as f64).collect();

        let coefficients = least_squares(&rows, &targets).unwrap();

        assert!((coefficients[0] - 4.0).abs() < 1e-9);
        assert_eq!(coefficients[1], 0.0);
        assert_eq!(least_squares(&[vec![0.0], vec![0.0]], &[1.0, 2.0]), Ok(vec![0.0]));
    }

    #[test]
    fn difference_and_integrate_round_trip() {
        let values = vec![1.0, 4.0, 9.0, 16.0, 25.0];

        let diffs = difference(&values, 2);
        assert_eq!(diffs, vec![8.0, 12.0, 16.0]);

        let rebuilt = integrate(&values[..2], &diffs, 2);
        assert_eq!(rebuilt, vec![9.0, 16.0, 25.0]);
    }

    #[test]
    fn difference_of_short_series_is_empty() {
        assert!(difference(&[1.0, 2.0], 7).is_empty());
    }

    #[test]
    fn summary_statistics_handle_small_inputs() {
        assert_eq!(std_dev_or_zero(&[5.0]), 0.0);
        assert_eq!(mean_or_zero(&[]), 0.0);
        assert_eq!(mean_or_zero(&[1.0, 3.0]), 2.0);
        assert!((std_dev_or_zero(&[1.0, 3.0]) - 2f64.sqrt()).abs() < 1e-12);
    }
}

use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::IntrinsicError;
use crate::IntrinsicResult;

// ---------------------------------------------------------------------------
// Descriptive statistics
// ---------------------------------------------------------------------------

/// Arithmetic mean. `None` for an empty slice.
pub fn mean(values: &[Decimal]) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }
    let sum: Decimal = values.iter().copied().sum();
    Some(sum / Decimal::from(values.len() as i64))
}

/// Median; the average of the two middle values for even lengths.
pub fn median(values: &[Decimal]) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort();
    let count = sorted.len();
    let mid = count / 2;
    let median = if count % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / dec!(2)
    } else {
        sorted[mid]
    };
    Some(median)
}

/// Natural log of `current / previous`.
pub fn log_return(previous: Decimal, current: Decimal) -> IntrinsicResult<Decimal> {
    if previous <= Decimal::ZERO || current <= Decimal::ZERO {
        return Err(IntrinsicError::InvalidInput {
            field: "price".into(),
            reason: format!("Log return needs positive prices, got {previous} -> {current}"),
        });
    }
    (current / previous)
        .checked_ln()
        .ok_or_else(|| IntrinsicError::InvalidInput {
            field: "price".into(),
            reason: format!("Log return undefined for {previous} -> {current}"),
        })
}

// ---------------------------------------------------------------------------
// Ordinary least squares
// ---------------------------------------------------------------------------

/// Result of a single-regressor OLS fit `y = alpha + beta * x`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionFit {
    pub alpha: Decimal,
    pub beta: Decimal,
    pub r_squared: Decimal,
    pub observations: usize,
}

/// Fit `y = alpha + beta * x` by least squares.
///
/// beta = cov(x, y) / var(x), alpha = mean(y) - beta * mean(x).
pub fn ols(x: &[Decimal], y: &[Decimal]) -> IntrinsicResult<RegressionFit> {
    if x.len() != y.len() {
        return Err(IntrinsicError::InvalidInput {
            field: "regression".into(),
            reason: format!("Regressor has {} points, response has {}", x.len(), y.len()),
        });
    }
    let n = x.len();
    if n < 2 {
        return Err(IntrinsicError::InsufficientData(format!(
            "Regression needs at least 2 observations, got {n}"
        )));
    }

    let n_dec = Decimal::from(n as i64);
    let mean_x: Decimal = x.iter().copied().sum::<Decimal>() / n_dec;
    let mean_y: Decimal = y.iter().copied().sum::<Decimal>() / n_dec;

    let mut cov_xy = Decimal::ZERO;
    let mut var_x = Decimal::ZERO;
    let mut var_y = Decimal::ZERO;
    for i in 0..n {
        let dx = x[i] - mean_x;
        let dy = y[i] - mean_y;
        cov_xy += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x.is_zero() {
        return Err(IntrinsicError::DivisionByZero {
            context: "OLS slope: regressor has zero variance".into(),
        });
    }

    let beta = cov_xy / var_x;
    let alpha = mean_y - beta * mean_x;
    let r_squared = if var_y.is_zero() {
        Decimal::ONE
    } else {
        (cov_xy * cov_xy) / (var_x * var_y)
    };

    Ok(RegressionFit {
        alpha,
        beta,
        r_squared,
        observations: n,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(median(&[dec!(3), dec!(1), dec!(2)]), Some(dec!(2)));
        assert_eq!(
            median(&[dec!(4), dec!(1), dec!(3), dec!(2)]),
            Some(dec!(2.5))
        );
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[dec!(1), dec!(2), dec!(6)]), Some(dec!(3)));
        assert_eq!(mean(&[]), None);
    }

    #[test]
    fn test_log_return_of_equal_prices_is_zero() {
        assert_eq!(log_return(dec!(100), dec!(100)).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_log_return_rejects_non_positive_price() {
        assert!(log_return(dec!(0), dec!(100)).is_err());
        assert!(log_return(dec!(100), dec!(-1)).is_err());
    }

    #[test]
    fn test_ols_recovers_exact_line() {
        let x = vec![dec!(-0.02), dec!(0.01), dec!(0.03), dec!(-0.01), dec!(0.02)];
        let y: Vec<Decimal> = x.iter().map(|v| dec!(0.001) + dec!(1.3) * v).collect();

        let fit = ols(&x, &y).unwrap();
        assert!((fit.beta - dec!(1.3)).abs() < dec!(0.0000001));
        assert!((fit.alpha - dec!(0.001)).abs() < dec!(0.0000001));
        assert!((fit.r_squared - Decimal::ONE).abs() < dec!(0.0000001));
        assert_eq!(fit.observations, 5);
    }

    #[test]
    fn test_ols_needs_two_points() {
        let err = ols(&[dec!(0.01)], &[dec!(0.02)]).unwrap_err();
        assert!(matches!(err, IntrinsicError::InsufficientData(_)));
    }

    #[test]
    fn test_ols_zero_variance_regressor() {
        let err = ols(&[dec!(0.01), dec!(0.01)], &[dec!(0.02), dec!(0.03)]).unwrap_err();
        assert!(matches!(err, IntrinsicError::DivisionByZero { .. }));
    }
}

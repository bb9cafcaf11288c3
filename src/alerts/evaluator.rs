//! Percent-difference threshold evaluation

use serde::{Deserialize, Serialize};

/// Result of comparing a current sample against a baseline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    /// `((baseline - current) / baseline) * 100`, sign preserved
    pub percent_difference: f64,
    /// `|percent_difference| >= threshold`
    pub is_breach: bool,
}

/// Compare `current` against `baseline`.
///
/// Not commutative: the difference is relative to `baseline`. A zero or
/// non-finite input is reported as an error rather than letting an infinite
/// or NaN difference reach the breach decision.
pub fn evaluate(
    baseline: f64,
    current: f64,
    threshold_percent: u32,
) -> Result<ComparisonResult, EvalError> {
    if !baseline.is_finite() || !current.is_finite() {
        return Err(EvalError::NonFiniteSample { baseline, current });
    }
    if baseline == 0.0 {
        return Err(EvalError::DivideByZeroBaseline);
    }

    let percent_difference = ((baseline - current) / baseline) * 100.0;
    let is_breach = percent_difference.abs() >= f64::from(threshold_percent);

    Ok(ComparisonResult {
        percent_difference,
        is_breach,
    })
}

/// Comparison errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("Baseline sample is zero, percent difference is undefined")]
    DivideByZeroBaseline,

    #[error("Non-finite sample (baseline {baseline}, current {current})")]
    NonFiniteSample { baseline: f64, current: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_breach_at_threshold() {
        let result = evaluate(100.0, 90.0, 10).unwrap();
        assert!(approx(result.percent_difference, 10.0));
        assert!(result.is_breach);
    }

    #[test]
    fn test_below_threshold() {
        let result = evaluate(100.0, 95.0, 10).unwrap();
        assert!(approx(result.percent_difference, 5.0));
        assert!(!result.is_breach);
    }

    #[test]
    fn test_sign_preserved() {
        let result = evaluate(100.0, 110.0, 5).unwrap();
        assert!(approx(result.percent_difference, -10.0));
        assert!(result.is_breach);
    }

    #[test]
    fn test_argument_order_matters() {
        let a = evaluate(70.0, 80.0, 10).unwrap();
        let b = evaluate(80.0, 70.0, 10).unwrap();
        assert!(approx(a.percent_difference, -100.0 / 7.0));
        assert!(approx(b.percent_difference, 12.5));
    }

    #[test]
    fn test_formula_over_range() {
        for &(b, c, t) in &[
            (1.0, 2.0, 50u32),
            (-50.0, -25.0, 50),
            (3.3, 3.3, 0),
            (1e6, 1.0, 99),
            (0.001, 0.002, 200),
        ] {
            let result = evaluate(b, c, t).unwrap();
            let expected = ((b - c) / b) * 100.0;
            assert!(approx(result.percent_difference, expected));
            assert_eq!(result.is_breach, expected.abs() >= f64::from(t));
        }
    }

    #[test]
    fn test_zero_threshold_always_breaches() {
        assert!(evaluate(10.0, 10.0, 0).unwrap().is_breach);
    }

    #[test]
    fn test_zero_baseline() {
        assert_eq!(evaluate(0.0, 5.0, 10), Err(EvalError::DivideByZeroBaseline));
        assert_eq!(evaluate(-0.0, 0.0, 10), Err(EvalError::DivideByZeroBaseline));
    }

    #[test]
    fn test_non_finite_inputs() {
        assert!(matches!(
            evaluate(f64::NAN, 1.0, 10),
            Err(EvalError::NonFiniteSample { .. })
        ));
        assert!(matches!(
            evaluate(1.0, f64::INFINITY, 10),
            Err(EvalError::NonFiniteSample { .. })
        ));
    }
}

//! Gradient to walking-speed curves.

use serde::{Deserialize, Serialize};

/// Empirical uphill hiking-speed curve.
pub const DEFAULT_UPHILL: [f64; 5] = [1.0, -2.7, -34.83, 200.63, -292.06];

/// Empirical downhill hiking-speed curve.
pub const DEFAULT_DOWNHILL: [f64; 6] = [1.0, -0.01, 79.31, 1164.83, 4622.34, 5737.68];

/// Pair of polynomial curves mapping a signed gradient to a speed factor.
///
/// `gradient > 0` uses `uphill`; anything else (including `0`) uses `downhill`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientCurves {
    pub uphill: Vec<f64>,
    pub downhill: Vec<f64>,
}

impl Default for GradientCurves {
    fn default() -> Self {
        Self {
            uphill: DEFAULT_UPHILL.to_vec(),
            downhill: DEFAULT_DOWNHILL.to_vec(),
        }
    }
}

impl GradientCurves {
    pub fn new(uphill: Vec<f64>, downhill: Vec<f64>) -> Self {
        Self { uphill, downhill }
    }

    /// Dimensionless speed multiplier for `gradient`, never negative.
    pub fn speed_factor(&self, gradient: f64) -> f64 {
        let curve = if gradient > 0.0 {
            &self.uphill
        } else {
            &self.downhill
        };
        // f64::max discards NaN, so a NaN sum clamps to zero as well.
        solve_polynomial(gradient, curve).max(0.0)
    }
}

/// Sum `x^degree` for every coefficient slot, `degree` being the slot index.
///
/// Only the number of slots affects the result; the stored magnitudes are not
/// applied.
pub fn solve_polynomial(x: f64, coefficients: &[f64]) -> f64 {
    (0..coefficients.len())
        .map(|degree| x.powi(degree as i32))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_gradient_takes_downhill_branch() {
        let curves = GradientCurves::new(Vec::new(), vec![1.0]);
        assert_eq!(curves.speed_factor(0.0), 1.0);
        assert_eq!(curves.speed_factor(-0.0), 1.0);
        assert_eq!(curves.speed_factor(0.1), 0.0);
    }

    // Characterization: pins the slot-count behaviour of the default curves.
    #[test]
    fn characterization_default_curves_ignore_coefficient_values() {
        let curves = GradientCurves::default();
        assert!((curves.speed_factor(0.5) - 1.9375).abs() < 1e-12);
        assert!((curves.speed_factor(-0.5) - 0.65625).abs() < 1e-12);

        let scaled = GradientCurves::new(vec![9.0; 5], vec![-3.0; 6]);
        assert_eq!(scaled.speed_factor(0.5), curves.speed_factor(0.5));
        assert_eq!(scaled.speed_factor(-0.5), curves.speed_factor(-0.5));
    }

    #[test]
    fn result_is_never_negative() {
        let curves = GradientCurves::default();
        for gradient in [
            -10.0,
            -2.0,
            -1.0,
            -0.3,
            0.0,
            0.3,
            1.0,
            5.0,
            f64::NEG_INFINITY,
            f64::INFINITY,
            f64::NAN,
        ] {
            let factor = curves.speed_factor(gradient);
            assert!(factor >= 0.0, "gradient {gradient} gave {factor}");
        }
    }
}

//! Fitting-method selection from the uncertainty structure of a dataset.
//!
//! The rule is mandatory, not a convenience: silently using least squares
//! when x-uncertainty exists understates parameter uncertainty and biases
//! the fit wherever the curve has steep local curvature.

use crate::domain::{Dataset, FitMethod};

/// Choose the fitting method for a dataset.
///
/// - no per-point uncertainty anywhere: ordinary least squares
/// - y-uncertainty only: weighted least squares (weights `1/sy²`)
/// - any x-uncertainty, regardless of y: orthogonal distance regression
///
/// This is a pure function of the dataset so the choice is inspectable and
/// testable independent of the solver.
pub fn select_method(data: &Dataset) -> FitMethod {
    if data.has_x_uncertainty() {
        FitMethod::OrthogonalDistance
    } else if data.has_y_uncertainty() {
        FitMethod::WeightedLeastSquares
    } else {
        FitMethod::OrdinaryLeastSquares
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Observation;
    use proptest::prelude::*;

    #[test]
    fn bare_points_select_ols() {
        let data = Dataset::from_xy(&[0.0, 1.0, 2.0], &[1.0, 3.0, 5.0]).unwrap();
        assert_eq!(select_method(&data), FitMethod::OrdinaryLeastSquares);
    }

    #[test]
    fn y_uncertainty_selects_wls() {
        let data = Dataset::new(vec![
            Observation::with_sy(0.0, 1.0, 0.5),
            Observation::new(1.0, 3.0),
        ])
        .unwrap();
        assert_eq!(select_method(&data), FitMethod::WeightedLeastSquares);
    }

    #[test]
    fn any_x_uncertainty_selects_odr() {
        // A single sx anywhere in the dataset flips the method, even with
        // sy present everywhere.
        let data = Dataset::new(vec![
            Observation::with_sy(0.0, 1.0, 0.5),
            Observation::with_sx_sy(1.0, 3.0, 0.2, 0.5),
            Observation::with_sy(2.0, 5.0, 0.5),
        ])
        .unwrap();
        assert_eq!(select_method(&data), FitMethod::OrthogonalDistance);
    }

    proptest! {
        /// The selection rule depends only on which uncertainty columns are
        /// populated, never on the values.
        #[test]
        fn selection_follows_uncertainty_structure(
            points in prop::collection::vec(
                (
                    -100.0_f64..100.0,
                    -100.0_f64..100.0,
                    prop::option::of(0.0_f64..10.0),
                    prop::option::of(0.0_f64..10.0),
                ),
                2..30,
            )
        ) {
            let observations: Vec<Observation> = points
                .iter()
                .map(|&(x, y, sx, sy)| Observation { x, y, sx, sy })
                .collect();
            let data = Dataset::new(observations).unwrap();

            let any_sx = points.iter().any(|p| p.2.is_some());
            let any_sy = points.iter().any(|p| p.3.is_some());
            let expected = if any_sx {
                FitMethod::OrthogonalDistance
            } else if any_sy {
                FitMethod::WeightedLeastSquares
            } else {
                FitMethod::OrdinaryLeastSquares
            };
            prop_assert_eq!(select_method(&data), expected);
        }
    }
}

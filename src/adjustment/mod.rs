//! # Adjustment solvers
//!
//! This module groups the two workflows that turn observation groups into an
//! adjusted ellipsoid:
//!
//! - [`batch`] – the Gauss–Newton iteration over **all** groups together:
//!   rebuild every group's normal equations at the current parameter vector,
//!   aggregate, invert, correct, and repeat until the a-posteriori standard
//!   deviation settles.
//! - [`sequential`] – the recursive (information-filter) update: an existing
//!   [`Solution`](sequential::Solution) absorbs one new group at a time with a
//!   single linearization, never revisiting earlier groups.
//! - [`precision`] – scales the inverted normal matrix by the variance factor
//!   into the parameter covariance matrix and standard deviations.
//!
//! [`AdjustmentParams`] carries the convergence controls shared by both
//! workflows, with a validated builder in the crate's usual fluent style.

use serde::{Deserialize, Serialize};

use crate::constants::{CONVERGENCE_TOL, MAX_ITERATIONS, PARAM_COUNT};
use crate::triaxial_errors::TriaxialError;

pub mod batch;
pub mod precision;
pub mod sequential;

/// Convergence controls for the iterative adjustment.
///
/// Fields
/// -----------------
/// * `convergence_tol`: Absolute tolerance on successive a-posteriori
///   standard deviations; the loop stops once `|σ₀ − σ₀'| ≤ tol`.
/// * `max_iterations`: Hard cap on Gauss–Newton iterations. Hitting the cap
///   is reported through [`ConvergenceStatus::MaxIterationsReached`], not an
///   error; the last estimate is still returned.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentParams {
    pub convergence_tol: f64,
    pub max_iterations: u32,
}

impl AdjustmentParams {
    /// Construct with the standard tolerance (`1e-5`) and cap (`10`).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new [`AdjustmentParamsBuilder`] to override the defaults.
    pub fn builder() -> AdjustmentParamsBuilder {
        AdjustmentParamsBuilder::new()
    }
}

impl Default for AdjustmentParams {
    fn default() -> Self {
        AdjustmentParams {
            convergence_tol: CONVERGENCE_TOL,
            max_iterations: MAX_ITERATIONS,
        }
    }
}

/// Builder for [`AdjustmentParams`], with validation.
#[derive(Debug, Clone, Default)]
pub struct AdjustmentParamsBuilder {
    params: AdjustmentParams,
}

impl AdjustmentParamsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn convergence_tol(mut self, v: f64) -> Self {
        self.params.convergence_tol = v;
        self
    }

    pub fn max_iterations(mut self, v: u32) -> Self {
        self.params.max_iterations = v;
        self
    }

    /// Validate and produce the final [`AdjustmentParams`].
    pub fn build(self) -> Result<AdjustmentParams, TriaxialError> {
        if !(self.params.convergence_tol > 0.0) {
            return Err(TriaxialError::InvalidAdjustmentParams(format!(
                "convergence_tol must be > 0, got {}",
                self.params.convergence_tol
            )));
        }
        if self.params.max_iterations == 0 {
            return Err(TriaxialError::InvalidAdjustmentParams(
                "max_iterations must be at least 1".into(),
            ));
        }
        Ok(self.params)
    }
}

/// How an iterative adjustment terminated.
///
/// Variants
/// ---------
/// * `Converged` – successive a-posteriori standard deviations agreed within
///   the tolerance after `iterations` passes.
/// * `MaxIterationsReached` – the iteration cap cut the loop off first; the
///   returned estimate is the last one computed and callers can (and should)
///   treat it differently from a converged result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConvergenceStatus {
    Converged { iterations: u32 },
    MaxIterationsReached,
}

impl ConvergenceStatus {
    pub fn is_converged(&self) -> bool {
        matches!(self, ConvergenceStatus::Converged { .. })
    }
}

/// The adjustment's counting identity for `c` observed points: `3c` scalar
/// measurement equations, `9 + 2c` unknowns (nine ellipsoid parameters plus
/// two latent surface parameters per point), and their difference as the
/// redundancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DegreesOfFreedom {
    pub points: usize,
    pub measurements: usize,
    pub unknowns: usize,
    pub redundancy: i64,
}

impl DegreesOfFreedom {
    pub fn from_points(points: usize) -> Self {
        let measurements = 3 * points;
        let unknowns = PARAM_COUNT + 2 * points;
        DegreesOfFreedom {
            points,
            measurements,
            unknowns,
            redundancy: measurements as i64 - unknowns as i64,
        }
    }
}

#[cfg(test)]
mod adjustment_params_tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let p = AdjustmentParams::default();
        assert_eq!(p.convergence_tol, 1e-5);
        assert_eq!(p.max_iterations, 10);
    }

    #[test]
    fn test_builder_rejects_bad_values() {
        assert!(AdjustmentParams::builder()
            .convergence_tol(0.0)
            .build()
            .is_err());
        assert!(AdjustmentParams::builder()
            .convergence_tol(-1.0)
            .build()
            .is_err());
        assert!(AdjustmentParams::builder().max_iterations(0).build().is_err());
        assert!(AdjustmentParams::builder()
            .convergence_tol(1e-8)
            .max_iterations(25)
            .build()
            .is_ok());
    }

    #[test]
    fn test_degrees_of_freedom_arithmetic() {
        let dof = DegreesOfFreedom::from_points(50);
        assert_eq!(dof.measurements, 150);
        assert_eq!(dof.unknowns, 109);
        assert_eq!(dof.redundancy, 41);
        // r = c - 9 for every c.
        for c in [10usize, 33, 512] {
            assert_eq!(DegreesOfFreedom::from_points(c).redundancy, c as i64 - 9);
        }
    }
}

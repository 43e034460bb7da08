//! # Batch Gauss–Newton adjustment
//!
//! The classic iterative workflow over all measurement groups at once:
//!
//! 1. Bootstrap the parameter vector with the closed-form estimate pooled
//!    across every group.
//! 2. Each iteration rebuilds every group's normal equations at the *current*
//!    vector, aggregates them, inverts the combined information matrix by the
//!    Cholesky square-root method and applies the correction `Δ = N⁻¹u`.
//! 3. Stop once successive a-posteriori standard deviations agree within the
//!    tolerance, or after the iteration cap; the two outcomes stay
//!    distinguishable through [`ConvergenceStatus`].

use log::debug;

use crate::adjustment::precision::{covariance_matrix, ParameterPrecision};
use crate::adjustment::{AdjustmentParams, ConvergenceStatus, DegreesOfFreedom};
use crate::constants::{GroupRecords, Matrix9};
use crate::ellipsoid::EllipsoidParams;
use crate::initial_values::estimate_initial_values;
use crate::matrix::cholesky_inverse;
use crate::normal_equations::{build_normal_equations, sum_normal_equations};
use crate::observations::ObservationSource;
use crate::triaxial_errors::TriaxialError;

/// Result of a batch adjustment.
///
/// Fields
/// -----------------
/// * `params`: The adjusted ellipsoid parameters (angles in radians).
/// * `status`: Converged vs. iteration-capped; callers needing a guaranteed
///   converged fit must check this.
/// * `iterations`: Gauss–Newton passes actually run.
/// * `dof`: Point/measurement/unknown counts and the redundancy.
/// * `sigma0`: A-posteriori standard deviation of unit weight.
/// * `normal_matrix` / `normal_inverse`: The combined information matrix of
///   the final iteration and its inverse.
/// * `covariance`: `σ₀²·N⁻¹`.
/// * `precision`: Per-parameter standard deviations.
#[derive(Debug, Clone)]
pub struct BatchFit {
    pub params: EllipsoidParams,
    pub status: ConvergenceStatus,
    pub iterations: u32,
    pub dof: DegreesOfFreedom,
    pub sigma0: f64,
    pub normal_matrix: Matrix9,
    pub normal_inverse: Matrix9,
    pub covariance: Matrix9,
    pub precision: ParameterPrecision,
}

/// Adjust a triaxial ellipsoid to every group at once.
///
/// Arguments
/// -----------------
/// * `sources`: One rewindable observation source per measurement group; each
///   is re-read in full on every iteration (and once more by the initial
///   estimator) and left rewound.
/// * `options`: Convergence tolerance and iteration cap.
///
/// Return
/// ----------
/// * A [`BatchFit`]; hitting the iteration cap is **not** an error (see
///   [`ConvergenceStatus`]).
///
/// Errors
/// ----------
/// * [`TriaxialError::InsufficientObservations`] if fewer than ten points are
///   available (no redundancy).
/// * [`TriaxialError::DegenerateQuadric`] /
///   [`TriaxialError::NotPositiveDefinite`] for degenerate point geometry, at
///   whichever stage first detects it.
pub fn fit_ellipsoid<S: ObservationSource>(
    sources: &mut [S],
    options: &AdjustmentParams,
) -> Result<BatchFit, TriaxialError> {
    let (mut estimate, point_count) = estimate_initial_values(sources)?;
    let dof = DegreesOfFreedom::from_points(point_count);
    if dof.redundancy <= 0 {
        return Err(TriaxialError::InsufficientObservations {
            points: point_count,
        });
    }
    let redundancy = dof.redundancy as f64;

    let mut sigma_next = 2.0;
    let mut iterations = 0u32;

    let (status, normal_matrix, normal_inverse) = loop {
        let sigma_prev = sigma_next;

        let groups: GroupRecords = sources
            .iter_mut()
            .map(|source| build_normal_equations(source, &estimate))
            .collect::<Result<_, _>>()?;
        let total = sum_normal_equations(&groups);

        let inverse = cholesky_inverse(&total.n)?;
        let correction = inverse * total.u;
        let explained = total.u.dot(&correction);
        sigma_next = ((total.weighted_residual_ss - explained) / redundancy)
            .max(0.0)
            .sqrt();

        estimate = estimate.apply_correction(&correction);
        iterations += 1;
        debug!(
            "batch iteration {iterations}: sigma0 {sigma_prev:.6} -> {sigma_next:.6}, |du| = {:.3e}",
            correction.norm()
        );

        if (sigma_prev - sigma_next).abs() <= options.convergence_tol {
            break (
                ConvergenceStatus::Converged { iterations },
                total.n,
                inverse,
            );
        }
        if iterations >= options.max_iterations {
            break (ConvergenceStatus::MaxIterationsReached, total.n, inverse);
        }
    };

    let variance_factor = sigma_next * sigma_next;
    let covariance = covariance_matrix(&normal_inverse, variance_factor);
    Ok(BatchFit {
        params: estimate,
        status,
        iterations,
        dof,
        sigma0: sigma_next,
        normal_matrix,
        normal_inverse,
        covariance,
        precision: ParameterPrecision::from_covariance(&covariance),
    })
}

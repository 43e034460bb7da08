//! # Sequential (recursive) adjustment
//!
//! Extends an existing least-squares [`Solution`] with one additional
//! measurement group **without reprocessing prior data**, an
//! information-filter update. The prior groups' right-hand sides are already
//! folded into the prior parameter vector, so only the new group's `u₂`
//! drives the correction:
//!
//! ```text
//! N  = N₁ + N₂              Δ  = N⁻¹·u₂            x = x₁ + Δ
//! r  = r₁ + c₂              σ₀² = (r₁σ₀₁² − Δᵀu₂ + wrss₂) / r
//! ```
//!
//! The workflow starts from the first group alone: the closed-form initial
//! values and the iterated Gauss–Newton adjustment of that group produce the
//! first [`Solution`]; each later group is folded in with a single
//! linearization. Applied to the same data, the sequential path and the batch
//! solver converge to numerically close (not bit-identical) estimates.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::adjustment::precision::{covariance_matrix, ParameterPrecision};
use crate::adjustment::{AdjustmentParams, ConvergenceStatus, DegreesOfFreedom};
use crate::constants::{Matrix9, PARAM_COUNT};
use crate::ellipsoid::EllipsoidParams;
use crate::initial_values::estimate_initial_values;
use crate::matrix::cholesky_inverse;
use crate::normal_equations::build_normal_equations;
use crate::observations::ObservationSource;
use crate::triaxial_errors::TriaxialError;

/// The state carried between steps of the sequential adjustment.
///
/// Fields
/// -----------------
/// * `redundancy`: Accumulated degrees of freedom `r`.
/// * `params`: The current adjusted parameter vector.
/// * `normal_matrix`: The accumulated information matrix (not yet inverted).
/// * `variance_factor`: The a-posteriori variance factor `σ₀²`.
///
/// A solution is replaced, not mutated, by each update.
#[derive(Debug, Clone)]
pub struct Solution {
    pub redundancy: i64,
    pub params: EllipsoidParams,
    pub normal_matrix: Matrix9,
    pub variance_factor: f64,
}

/// Per-group bookkeeping of one sequential update, for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SequentialStep {
    /// Points contributed by the group folded in at this step.
    pub group_points: usize,
    /// Points accumulated over all groups so far.
    pub cumulative_points: usize,
    /// Degrees of freedom after this step.
    pub redundancy: i64,
    /// A-posteriori standard deviation of unit weight after this step.
    pub sigma0: f64,
}

/// The first group's iterated adjustment, seeding the sequential chain.
#[derive(Debug, Clone)]
pub struct InitialAdjustment {
    pub solution: Solution,
    pub status: ConvergenceStatus,
    pub iterations: u32,
}

/// Build the first [`Solution`] from one group alone.
///
/// Runs the closed-form initial estimate and the full Gauss–Newton iteration
/// on the first group. The returned solution carries the information matrix
/// of the final linearization, the corrected parameter vector, and the
/// variance factor `wrss/r₁` of the final build.
///
/// Errors
/// ----------
/// * [`TriaxialError::InsufficientObservations`] if the group has nine points
///   or fewer.
/// * The usual degenerate-geometry errors from the estimator and the
///   factorization.
pub fn initial_solution<S: ObservationSource>(
    source: &mut S,
    options: &AdjustmentParams,
) -> Result<InitialAdjustment, TriaxialError> {
    let (mut estimate, points) =
        estimate_initial_values(std::slice::from_mut(source))?;
    let redundancy = points as i64 - PARAM_COUNT as i64;
    if redundancy <= 0 {
        return Err(TriaxialError::InsufficientObservations { points });
    }

    let mut sigma_next = 2.0;
    let mut iterations = 0u32;

    let (status, record) = loop {
        let sigma_prev = sigma_next;

        let record = build_normal_equations(source, &estimate)?;
        let inverse = cholesky_inverse(&record.n)?;
        let correction = inverse * record.u;
        let explained = record.u.dot(&correction);
        sigma_next = ((record.weighted_residual_ss - explained) / redundancy as f64)
            .max(0.0)
            .sqrt();

        estimate = estimate.apply_correction(&correction);
        iterations += 1;
        debug!(
            "first-group iteration {iterations}: sigma0 {sigma_prev:.6} -> {sigma_next:.6}"
        );

        if (sigma_prev - sigma_next).abs() <= options.convergence_tol {
            break (ConvergenceStatus::Converged { iterations }, record);
        }
        if iterations >= options.max_iterations {
            break (ConvergenceStatus::MaxIterationsReached, record);
        }
    };

    Ok(InitialAdjustment {
        solution: Solution {
            redundancy,
            params: estimate,
            normal_matrix: record.n,
            variance_factor: record.weighted_residual_ss / redundancy as f64,
        },
        status,
        iterations,
    })
}

/// Fold one new group into an existing solution.
///
/// Builds the new group's normal equations at the prior parameter vector
/// (one linearization, no iteration), combines the information matrices, and
/// applies the information-filter update for the parameters, the redundancy
/// and the variance factor. Prior groups are not revisited.
pub fn extend_solution<S: ObservationSource>(
    prior: &Solution,
    source: &mut S,
) -> Result<(Solution, SequentialStep), TriaxialError> {
    let added = build_normal_equations(source, &prior.params)?;

    let normal_matrix = prior.normal_matrix + added.n;
    let correction = cholesky_inverse(&normal_matrix)? * added.u;
    let explained = correction.dot(&added.u);

    let redundancy = prior.redundancy + added.points as i64;
    let variance_factor = (prior.redundancy as f64 * prior.variance_factor - explained
        + added.weighted_residual_ss)
        / redundancy as f64;

    let updated = Solution {
        redundancy,
        params: prior.params.apply_correction(&correction),
        normal_matrix,
        variance_factor,
    };
    let step = SequentialStep {
        group_points: added.points,
        cumulative_points: (redundancy + PARAM_COUNT as i64) as usize,
        redundancy,
        sigma0: variance_factor.max(0.0).sqrt(),
    };
    Ok((updated, step))
}

/// Result of the whole sequential workflow.
#[derive(Debug, Clone)]
pub struct SequentialFit {
    /// The final accumulated solution.
    pub solution: Solution,
    /// Convergence outcome of the first group's iterated adjustment.
    pub first_status: ConvergenceStatus,
    /// Iterations spent on the first group.
    pub first_iterations: u32,
    /// Points contributed by the first (seeding) group.
    pub first_points: usize,
    /// One record per later group, in the order they were folded in.
    pub steps: Vec<SequentialStep>,
    /// Counting identity for the accumulated point total.
    pub dof: DegreesOfFreedom,
    /// `sqrt` of the final variance factor.
    pub sigma0: f64,
    pub normal_inverse: Matrix9,
    pub covariance: Matrix9,
    pub precision: ParameterPrecision,
}

/// Run the sequential workflow over an ordered set of groups.
///
/// The first source seeds the chain via [`initial_solution`]; every later
/// source is folded in with [`extend_solution`]. Group order matters for the
/// intermediate solutions (and determines which group's points bootstrap the
/// initial values), which is why the driver sorts filenames before calling
/// this.
pub fn sequential_fit<S: ObservationSource>(
    sources: &mut [S],
    options: &AdjustmentParams,
) -> Result<SequentialFit, TriaxialError> {
    let (first, rest) = sources
        .split_first_mut()
        .ok_or_else(|| TriaxialError::InsufficientObservations { points: 0 })?;

    let initial = initial_solution(first, options)?;
    let first_points = (initial.solution.redundancy + PARAM_COUNT as i64) as usize;
    let mut solution = initial.solution;
    let mut steps = Vec::with_capacity(rest.len());
    for source in rest {
        let (updated, step) = extend_solution(&solution, source)?;
        debug!(
            "sequential step: +{} points, r = {}, sigma0 = {:.6}",
            step.group_points, step.redundancy, step.sigma0
        );
        solution = updated;
        steps.push(step);
    }

    let normal_inverse = cholesky_inverse(&solution.normal_matrix)?;
    let covariance = covariance_matrix(&normal_inverse, solution.variance_factor);
    let dof = DegreesOfFreedom::from_points((solution.redundancy + PARAM_COUNT as i64) as usize);
    Ok(SequentialFit {
        sigma0: solution.variance_factor.max(0.0).sqrt(),
        first_status: initial.status,
        first_iterations: initial.iterations,
        first_points,
        steps,
        dof,
        normal_inverse,
        covariance,
        precision: ParameterPrecision::from_covariance(&covariance),
        solution,
    })
}

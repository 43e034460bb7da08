//! # Closed-form initial values
//!
//! Bootstraps the nonlinear adjustment with an **algebraic** (non-iterative)
//! ellipsoid fit. The general quadratic surface
//!
//! ```text
//! a·x² + b·y² + c·z² + d·xy + e·xz + f·yz + g·x + h·y + i·z = 1
//! ```
//!
//! is fitted to the pooled observations by ordinary least squares on the
//! power sums of the coordinates; the ellipsoid center, semi-axes and
//! rotation angles are then recovered from the nine quadric coefficients in
//! closed form: a 3×3 cofactor solve for the center, the trigonometric
//! (cosine) method for the three real roots of the characteristic cubic, and
//! arctangent combinations for the angles.
//!
//! Degenerate point geometry (coplanar points, a quadric with no real
//! ellipsoid solution) surfaces as
//! [`TriaxialError::DegenerateQuadric`] or
//! [`TriaxialError::NotPositiveDefinite`] from the power-sum normal matrix,
//! never as a silent NaN.

use std::f64::consts::PI;

use log::debug;

use crate::constants::{Matrix9, Vector9, PARAM_COUNT};
use crate::ellipsoid::EllipsoidParams;
use crate::matrix::{cholesky_inverse, symmetrize};
use crate::observations::ObservationSource;
use crate::triaxial_errors::TriaxialError;

/// Monomial basis row of the quadric design matrix for one point:
/// `[x², y², z², xy, xz, yz, x, y, z]`.
#[inline]
fn quadric_basis(x: f64, y: f64, z: f64) -> Vector9 {
    Vector9::from_column_slice(&[x * x, y * y, z * z, x * y, x * z, y * z, x, y, z])
}

/// Estimate initial ellipsoid parameters from the pooled observations of one
/// or more groups.
///
/// Builds the 9×9 power-sum normal matrix of the quadric fit as an indexed
/// rank-1 accumulation (`N += φφᵀ`, `U += φ` for each basis row `φ`), solves
/// it by the Cholesky square-root method, and derives the nine ellipsoid
/// parameters from the quadric coefficients in closed form. All rotation
/// angles are canonicalized to their absolute value (the quadric
/// parametrization leaves their signs ambiguous).
///
/// Arguments
/// -----------------
/// * `sources`: The groups to pool: the first group only in the sequential
///   workflow, all groups in the batch workflow. Each source is read to
///   exhaustion and **rewound** before returning, so the scan does not consume
///   data needed by later passes.
///
/// Return
/// ----------
/// * The initial [`EllipsoidParams`] and the total number of points read.
///
/// Errors
/// ----------
/// * [`TriaxialError::DegenerateQuadric`] if the center-solve denominator is
///   zero or the characteristic cubic has no three positive real roots
///   (the fitted quadric is not an ellipsoid).
/// * [`TriaxialError::NotPositiveDefinite`] if the power-sum normal matrix
///   cannot be factorized (e.g. coplanar points).
pub fn estimate_initial_values<S: ObservationSource>(
    sources: &mut [S],
) -> Result<(EllipsoidParams, usize), TriaxialError> {
    let mut n = Matrix9::zeros();
    let mut u = Vector9::zeros();
    let mut count = 0usize;

    for source in sources.iter_mut() {
        while let Some(obs) = source.next_observation()? {
            let basis = quadric_basis(obs.x, obs.y, obs.z);
            for i in 0..9 {
                for j in i..9 {
                    n[(i, j)] += basis[i] * basis[j];
                }
                u[i] += basis[i];
            }
            count += 1;
        }
    }
    // Fewer than ten points can never yield a redundant adjustment; refuse
    // before attempting any factorization.
    if count <= PARAM_COUNT {
        return Err(TriaxialError::InsufficientObservations { points: count });
    }
    symmetrize(&mut n);

    let coefficients = cholesky_inverse(&n)? * u;
    let params = params_from_quadric(&coefficients)?;
    debug!("closed-form initial values from {count} pooled points");

    for source in sources.iter_mut() {
        source.rewind()?;
    }
    Ok((params, count))
}

/// Recover the nine ellipsoid parameters from the fitted quadric
/// coefficients `(cxx, cyy, czz, cxy, cxz, cyz, cx, cy, cz)`.
fn params_from_quadric(c: &Vector9) -> Result<EllipsoidParams, TriaxialError> {
    let (cxx, cyy, czz) = (c[0], c[1], c[2]);
    let (cxy, cxz, cyz) = (c[3], c[4], c[5]);
    let (cx, cy, cz) = (c[6], c[7], c[8]);

    // Cofactor-like combinations of the quadratic-form coefficients.
    let f1 = 4.0 * cyy * czz - cyz * cyz;
    let f2 = cxz * cyz - 2.0 * cxy * czz;
    let f3 = cxy * cyz - 2.0 * cxz * cyy;
    let g2 = 4.0 * cxx * czz - cxz * cxz;
    let g3 = cxy * cxz - 2.0 * cxx * cyz;
    let h3 = 4.0 * cxx * cyy - cxy * cxy;
    let e = 2.0 * cxx * f1 + cxy * f2 + cxz * f3;
    if e == 0.0 {
        return Err(TriaxialError::DegenerateQuadric);
    }

    // Center of the ellipsoid.
    let tx = -(f1 * cx + f2 * cy + f3 * cz) / e;
    let ty = -(f2 * cx + g2 * cy + g3 * cz) / e;
    let tz = -(f3 * cx + g3 * cy + h3 * cz) / e;

    // Normalization constant of the centered quadratic form.
    let d = 1.0
        + cxx * tx * tx
        + cyy * ty * ty
        + czz * tz * tz
        + cxy * tx * ty
        + cxz * tx * tz
        + cyz * ty * tz;
    let qxx = 2.0 * d * f1 / e;
    let qxy = 2.0 * d * f2 / e;
    let qxz = 2.0 * d * f3 / e;
    let qyy = 2.0 * d * g2 / e;
    let qyz = 2.0 * d * g3 / e;
    let qzz = 2.0 * d * h3 / e;

    // Three real roots of the depressed characteristic cubic, by the
    // trigonometric (cosine) method.
    let q1 = (qxx + qyy + qzz) / 3.0;
    let q2 =
        (qyy * qzz + qxx * qzz + qxx * qyy - qyz * qyz - qxz * qxz - qxy * qxy) / 3.0;
    let det = qxx * (qyy * qzz - qyz * qyz)
        + qxy * (qxz * qyz - qxy * qzz)
        + qxz * (qxy * qyz - qxz * qyy);
    let disc = q1 * q1 - q2;
    if !(disc > 0.0) {
        return Err(TriaxialError::DegenerateQuadric);
    }
    // The clamp keeps borderline-spherical inputs from pushing the cosine
    // argument past ±1 through floating-point overshoot.
    let cos_arg =
        ((det + 2.0 * q1 * q1 * q1 - 3.0 * q1 * q2) / (2.0 * disc.powf(1.5))).clamp(-1.0, 1.0);
    let w = cos_arg.acos();

    let root_sqrt = |angle: f64| -> Result<f64, TriaxialError> {
        let root = q1 + 2.0 * disc.sqrt() * angle.cos();
        if !(root > 0.0) {
            return Err(TriaxialError::DegenerateQuadric);
        }
        Ok(root.sqrt())
    };
    let ax = root_sqrt(w / 3.0)?;
    let ay = root_sqrt((w - 2.0 * PI) / 3.0)?;
    let az = root_sqrt((w + 2.0 * PI) / 3.0)?;

    // Principal-axis direction combinations feeding the rotation angles.
    let direction = |a_sq: f64| {
        let big_a = qxy * qxz - qyz * qxx + a_sq * qyz;
        let big_b = qxy * qyz - qxz * qyy + a_sq * qxz;
        let big_c = qxz * qyz - qxy * qzz + a_sq * qxy;
        let norm = (1.0 / (big_a * big_a) + 1.0 / (big_b * big_b) + 1.0 / (big_c * big_c)).sqrt();
        (big_a, big_b, big_c, norm)
    };
    let (a1, _b1, _c1, e1) = direction(ax * ax);
    let (a2, _b2, _c2, e2) = direction(ay * ay);
    let (a3, b3, c3, e3) = direction(az * az);

    let theta_x = (-c3 / b3).atan();
    let theta_y =
        ((a1 * e1 * a2 * e2) / (a3 * e3 * (a1 * a1 * e1 * e1 + a2 * a2 * e2 * e2).sqrt())).atan();
    let theta_z = (-a1 * e1 / a2 / e2).atan();

    let params = EllipsoidParams::new(
        tx,
        ty,
        tz,
        ax,
        ay,
        az,
        theta_x.abs(),
        theta_y.abs(),
        theta_z.abs(),
    );
    if params.as_vector().iter().any(|v| !v.is_finite()) {
        return Err(TriaxialError::DegenerateQuadric);
    }
    Ok(params)
}

#[cfg(test)]
mod initial_value_tests {
    use super::*;
    use crate::observations::{MemorySource, Observation};
    use crate::synthetic::ellipsoid_surface_points;
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_recovers_parameters_of_exact_surface_points() {
        let truth = EllipsoidParams::new(1.0, 2.0, 3.0, 10.0, 7.0, 4.0, 0.1, 0.2, 0.3);
        let mut rng = StdRng::seed_from_u64(7);
        let points = ellipsoid_surface_points(&truth, 200, 0.0, &mut rng);
        let mut sources = [MemorySource::new(points)];

        let (estimate, count) = estimate_initial_values(&mut sources).unwrap();
        assert_eq!(count, 200);
        assert_abs_diff_eq!(estimate.tx, truth.tx, epsilon = 1e-6);
        assert_abs_diff_eq!(estimate.ty, truth.ty, epsilon = 1e-6);
        assert_abs_diff_eq!(estimate.tz, truth.tz, epsilon = 1e-6);
        assert_abs_diff_eq!(estimate.ax, truth.ax, epsilon = 1e-6);
        assert_abs_diff_eq!(estimate.ay, truth.ay, epsilon = 1e-6);
        assert_abs_diff_eq!(estimate.az, truth.az, epsilon = 1e-6);
        assert_abs_diff_eq!(estimate.theta_x, truth.theta_x, epsilon = 1e-6);
        assert_abs_diff_eq!(estimate.theta_y, truth.theta_y, epsilon = 1e-6);
        assert_abs_diff_eq!(estimate.theta_z, truth.theta_z, epsilon = 1e-6);
    }

    #[test]
    fn test_pools_across_sources_and_rewinds_them() {
        let truth = EllipsoidParams::new(0.5, -1.0, 2.0, 8.0, 6.0, 5.0, 0.2, 0.15, 0.4);
        let mut rng = StdRng::seed_from_u64(11);
        let points = ellipsoid_surface_points(&truth, 120, 0.0, &mut rng);
        let mut sources = [
            MemorySource::new(points[..60].to_vec()),
            MemorySource::new(points[60..].to_vec()),
        ];

        let (_, count) = estimate_initial_values(&mut sources).unwrap();
        assert_eq!(count, 120);
        // Both sources must be rewound afterwards.
        for source in sources.iter_mut() {
            assert!(source.next_observation().unwrap().is_some());
        }
    }

    #[test]
    fn test_coplanar_points_fail_loudly() {
        // All points in the z = 0 plane: nothing constrains an ellipsoid.
        let mut points = Vec::new();
        for i in 0..40 {
            let t = i as f64 * 0.37;
            points.push(Observation::new(3.0 * t.cos(), 2.0 * t.sin(), 0.0, 1.0));
        }
        let mut sources = [MemorySource::new(points)];
        match estimate_initial_values(&mut sources) {
            Err(TriaxialError::NotPositiveDefinite { .. })
            | Err(TriaxialError::DegenerateQuadric) => {}
            other => panic!("expected a degenerate-geometry error, got {other:?}"),
        }
    }
}

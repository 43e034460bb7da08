//! # Group normal equations
//!
//! Linearization of the implicit ellipsoid equation around a fixed parameter
//! vector, and accumulation of one group's weighted contributions into the
//! 9×9 information matrix `N` and right-hand side `u`.
//!
//! ## Model
//!
//! A point on the ellipsoid satisfies the implicit equation
//!
//! ```text
//! F = p_xx·ΔX² + p_yy·ΔY² + p_zz·ΔZ² + 2(p_xy·ΔXΔY + p_xz·ΔXΔZ + p_yz·ΔYΔZ) − 1 = 0
//! ```
//!
//! where `ΔX = x − tx` (etc.) are center-relative coordinates and the six `p`
//! coefficients combine the rotation matrix with the inverse-squared
//! semi-axes. [`QuadricGeometry`] evaluates the coefficients and their
//! analytic partial derivatives once per parameter vector;
//! [`build_normal_equations`] then folds a whole group of observations into a
//! [`NormalEquations`] record:
//!
//! ```text
//! N += p̄ · ∇F ∇Fᵀ        u += p̄ · (−F) · ∇F        wrss += p̄ · F²
//! ```
//!
//! with the effective weight `p̄ = w / ‖∇t F‖²` propagating each point's given
//! weight through the implicit-function linearization (`∇t F` is the
//! translation-only sub-gradient).
//!
//! Records from several groups evaluated at the **same** parameter vector are
//! combined with [`sum_normal_equations`].

use log::warn;

use crate::constants::{Matrix9, Vector9};
use crate::ellipsoid::EllipsoidParams;
use crate::matrix::symmetrize;
use crate::observations::{Observation, ObservationSource};
use crate::triaxial_errors::TriaxialError;

/// The six coefficients of a symmetric 3×3 quadratic form.
///
/// Doubles as a derivative record: the partial derivatives of the `p`
/// coefficients with respect to one shape/orientation parameter have the same
/// shape and contract with the same squared/cross point terms.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct QuadricCoefficients {
    pub xx: f64,
    pub yy: f64,
    pub zz: f64,
    pub xy: f64,
    pub xz: f64,
    pub yz: f64,
}

impl QuadricCoefficients {
    /// Contract with the squared and cross products of a centered point:
    /// `xx·ΔX² + yy·ΔY² + zz·ΔZ² + 2(xy·ΔXΔY + xz·ΔXΔZ + yz·ΔYΔZ)`.
    #[inline]
    fn contract(&self, c: &CenteredPoint) -> f64 {
        self.xx * c.dx2
            + self.yy * c.dy2
            + self.zz * c.dz2
            + 2.0 * (self.xy * c.dxdy + self.xz * c.dxdz + self.yz * c.dydz)
    }
}

/// Centered coordinates of one observation and their pairwise products.
struct CenteredPoint {
    dx: f64,
    dy: f64,
    dz: f64,
    dx2: f64,
    dy2: f64,
    dz2: f64,
    dxdy: f64,
    dxdz: f64,
    dydz: f64,
}

impl CenteredPoint {
    fn new(obs: &Observation, params: &EllipsoidParams) -> Self {
        let dx = obs.x - params.tx;
        let dy = obs.y - params.ty;
        let dz = obs.z - params.tz;
        CenteredPoint {
            dx,
            dy,
            dz,
            dx2: dx * dx,
            dy2: dy * dy,
            dz2: dz * dz,
            dxdy: dx * dy,
            dxdz: dx * dz,
            dydz: dy * dz,
        }
    }
}

/// Per-parameter-vector geometry of the implicit ellipsoid equation.
///
/// Computed once per call to [`build_normal_equations`], not per point: the
/// rotation matrix, the quadratic-form coefficients `p`, and the analytic
/// partials of `p` with respect to the five shape/orientation parameters
/// `(ax, ay, az, θy, θz)`. The θx partial of `F` has a closed form directly in
/// the `p` coefficients and is evaluated per point instead.
#[derive(Debug, Clone)]
pub struct QuadricGeometry {
    params: EllipsoidParams,
    p: QuadricCoefficients,
    d_ax: QuadricCoefficients,
    d_ay: QuadricCoefficients,
    d_az: QuadricCoefficients,
    d_theta_y: QuadricCoefficients,
    d_theta_z: QuadricCoefficients,
}

impl QuadricGeometry {
    /// Evaluate the quadratic form and every precomputable derivative table
    /// at `params`.
    pub fn new(params: &EllipsoidParams) -> Self {
        let r = params.rotation_matrix();
        let (r11, r12, r13) = (r[(0, 0)], r[(0, 1)], r[(0, 2)]);
        let (r21, r22, r23) = (r[(1, 0)], r[(1, 1)], r[(1, 2)]);
        let (r31, r32, r33) = (r[(2, 0)], r[(2, 1)], r[(2, 2)]);

        let ax2 = params.ax * params.ax;
        let ay2 = params.ay * params.ay;
        let az2 = params.az * params.az;

        let p = QuadricCoefficients {
            xx: r11 * r11 / ax2 + r21 * r21 / ay2 + r31 * r31 / az2,
            yy: r12 * r12 / ax2 + r22 * r22 / ay2 + r32 * r32 / az2,
            zz: r13 * r13 / ax2 + r23 * r23 / ay2 + r33 * r33 / az2,
            xy: r11 * r12 / ax2 + r21 * r22 / ay2 + r31 * r32 / az2,
            xz: r11 * r13 / ax2 + r21 * r23 / ay2 + r31 * r33 / az2,
            yz: r12 * r13 / ax2 + r22 * r23 / ay2 + r32 * r33 / az2,
        };

        // Differences of inverse-squared semi-axes entering the θy/θz partials.
        let axis_a = 1.0 / az2 - 1.0 / ax2;
        let axis_b = 1.0 / ay2 - 1.0 / az2;
        let axis_c = 1.0 / ax2 - 1.0 / ay2;

        let ax3 = ax2 * params.ax;
        let ay3 = ay2 * params.ay;
        let az3 = az2 * params.az;

        let d_ax = QuadricCoefficients {
            xx: -2.0 * r11 * r11 / ax3,
            yy: -2.0 * r12 * r12 / ax3,
            zz: -2.0 * r13 * r13 / ax3,
            xy: -2.0 * r11 * r12 / ax3,
            xz: -2.0 * r11 * r13 / ax3,
            yz: -2.0 * r12 * r13 / ax3,
        };
        let d_ay = QuadricCoefficients {
            xx: -2.0 * r21 * r21 / ay3,
            yy: -2.0 * r22 * r22 / ay3,
            zz: -2.0 * r23 * r23 / ay3,
            xy: -2.0 * r21 * r22 / ay3,
            xz: -2.0 * r21 * r23 / ay3,
            yz: -2.0 * r22 * r23 / ay3,
        };
        let d_az = QuadricCoefficients {
            xx: -2.0 * r31 * r31 / az3,
            yy: -2.0 * r32 * r32 / az3,
            zz: -2.0 * r33 * r33 / az3,
            xy: -2.0 * r31 * r32 / az3,
            xz: -2.0 * r31 * r33 / az3,
            yz: -2.0 * r32 * r33 / az3,
        };

        let (sin_z, cos_z) = params.theta_z.sin_cos();
        let d_theta_y = QuadricCoefficients {
            xx: 2.0 * (r11 * r31 * cos_z * axis_a + r21 * r31 * sin_z * axis_b),
            yy: 2.0 * (r12 * r32 * cos_z * axis_a + r22 * r32 * sin_z * axis_b),
            zz: 2.0 * (r13 * r33 * cos_z * axis_a + r23 * r33 * sin_z * axis_b),
            xy: (r11 * r32 + r12 * r31) * cos_z * axis_a
                + (r21 * r32 + r22 * r31) * sin_z * axis_b,
            xz: (r11 * r33 + r13 * r31) * cos_z * axis_a
                + (r21 * r33 + r23 * r31) * sin_z * axis_b,
            yz: (r12 * r33 + r13 * r32) * cos_z * axis_a
                + (r22 * r33 + r23 * r32) * sin_z * axis_b,
        };
        let d_theta_z = QuadricCoefficients {
            xx: 2.0 * r11 * r21 * axis_c,
            yy: 2.0 * r12 * r22 * axis_c,
            zz: 2.0 * r13 * r23 * axis_c,
            xy: (r11 * r22 + r12 * r21) * axis_c,
            xz: (r11 * r23 + r13 * r21) * axis_c,
            yz: (r12 * r23 + r13 * r22) * axis_c,
        };

        QuadricGeometry {
            params: *params,
            p,
            d_ax,
            d_ay,
            d_az,
            d_theta_y,
            d_theta_z,
        }
    }

    /// The implicit function value `F` at a point (zero on the surface).
    pub fn implicit_value(&self, obs: &Observation) -> f64 {
        self.p.contract(&CenteredPoint::new(obs, &self.params)) - 1.0
    }

    /// The gradient of `F` with respect to all nine parameters, in canonical
    /// order.
    pub fn gradient(&self, obs: &Observation) -> Vector9 {
        let c = CenteredPoint::new(obs, &self.params);
        let p = &self.p;

        let mut grad = Vector9::zeros();
        grad[0] = -2.0 * (p.xx * c.dx + p.xy * c.dy + p.xz * c.dz);
        grad[1] = -2.0 * (p.xy * c.dx + p.yy * c.dy + p.yz * c.dz);
        grad[2] = -2.0 * (p.xz * c.dx + p.yz * c.dy + p.zz * c.dz);
        grad[3] = self.d_ax.contract(&c);
        grad[4] = self.d_ay.contract(&c);
        grad[5] = self.d_az.contract(&c);
        // ∂F/∂θx has a closed form directly in the p coefficients.
        grad[6] = -2.0 * p.yz * c.dy2 + 2.0 * p.yz * c.dz2 - 2.0 * p.xz * c.dxdy
            + 2.0 * p.xy * c.dxdz
            + 2.0 * p.yy * c.dydz
            - 2.0 * p.zz * c.dydz;
        grad[7] = self.d_theta_y.contract(&c);
        grad[8] = self.d_theta_z.contract(&c);
        grad
    }
}

/// One group's linearized contribution to the least-squares system at a fixed
/// parameter vector.
///
/// Fields
/// -----------------
/// * `points`: Observations folded into this record.
/// * `n`: The symmetric 9×9 information matrix contribution.
/// * `u`: The weighted gradient-residual 9-vector.
/// * `weighted_residual_ss`: The weighted sum of squared residuals `Σ p̄·F²`.
///
/// Created fresh per group per iteration and never mutated afterwards;
/// [`sum_normal_equations`] produces a new combined record.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalEquations {
    pub points: usize,
    pub n: Matrix9,
    pub u: Vector9,
    pub weighted_residual_ss: f64,
}

impl NormalEquations {
    /// An empty record (all accumulators zero).
    pub fn empty() -> Self {
        NormalEquations {
            points: 0,
            n: Matrix9::zeros(),
            u: Vector9::zeros(),
            weighted_residual_ss: 0.0,
        }
    }
}

/// Build one group's [`NormalEquations`] at the given parameter vector.
///
/// Reads `source` to exhaustion, accumulating the upper triangle of
/// `N += p̄·∇F∇Fᵀ`, the right-hand side `u += p̄·(−F)·∇F`, and the weighted
/// residual energy. The source is rewound before returning so a later
/// iteration can re-scan the same group at a new parameter vector.
///
/// Arguments
/// -----------------
/// * `source`: One group's observations (read fully, then rewound).
/// * `params`: The parameter vector to linearize around; every point of the
///   group observes this same frozen vector.
///
/// Return
/// ----------
/// * The group's [`NormalEquations`] record.
///
/// Notes
/// ----------
/// * A point whose translation sub-gradient vanishes (for example a point at
///   the current center estimate) has no usable implicit weight; it is
///   skipped with a warning and excluded from the record's point count.
pub fn build_normal_equations(
    source: &mut impl ObservationSource,
    params: &EllipsoidParams,
) -> Result<NormalEquations, TriaxialError> {
    let geometry = QuadricGeometry::new(params);

    let mut record = NormalEquations::empty();
    while let Some(obs) = source.next_observation()? {
        let grad = geometry.gradient(&obs);

        // Squared norm of the translation-only sub-gradient: the denominator
        // of the implicit reweighting.
        let grad_t_sq = grad[0] * grad[0] + grad[1] * grad[1] + grad[2] * grad[2];
        if !grad_t_sq.is_normal() {
            warn!(
                "skipping observation ({}, {}, {}): translation gradient vanished at the current parameter estimate",
                obs.x, obs.y, obs.z
            );
            continue;
        }
        let p_bar = obs.weight / grad_t_sq;

        let minus_f = -geometry.implicit_value(&obs);
        let weighted_residual = minus_f * p_bar;
        record.weighted_residual_ss += minus_f * weighted_residual;

        for i in 0..9 {
            let scaled = grad[i] * p_bar;
            for j in i..9 {
                record.n[(i, j)] += scaled * grad[j];
            }
            record.u[i] += grad[i] * weighted_residual;
        }
        record.points += 1;
    }

    symmetrize(&mut record.n);
    source.rewind()?;
    Ok(record)
}

/// Element-wise sum of several groups' [`NormalEquations`] evaluated at the
/// same parameter vector.
///
/// The combined record sums `n`, `u` and `weighted_residual_ss`; its own
/// `points` field stays zero: the aggregate's role is purely the
/// linear-algebra sum, and consumers track total point counts separately.
pub fn sum_normal_equations(groups: &[NormalEquations]) -> NormalEquations {
    let mut total = NormalEquations::empty();
    for g in groups {
        total.n += g.n;
        total.u += g.u;
        total.weighted_residual_ss += g.weighted_residual_ss;
    }
    total
}

#[cfg(test)]
mod normal_equation_tests {
    use super::*;
    use crate::observations::MemorySource;
    use approx::assert_relative_eq;

    fn test_params() -> EllipsoidParams {
        EllipsoidParams::new(1.0, 2.0, 3.0, 10.0, 7.0, 4.0, 0.1, 0.2, 0.3)
    }

    fn test_points() -> Vec<Observation> {
        // Deterministic spread of off-surface points around the test ellipsoid.
        let mut pts = Vec::new();
        for i in 0..24 {
            let t = i as f64;
            let azimuth = 0.7 + 0.45 * t;
            let polar = 0.25 + 0.11 * t;
            pts.push(Observation::new(
                1.0 + 11.0 * polar.sin() * azimuth.cos(),
                2.0 + 8.0 * polar.sin() * azimuth.sin(),
                3.0 + 5.0 * polar.cos(),
                1.0 + 0.1 * (i % 3) as f64,
            ));
        }
        pts
    }

    /// Central finite difference of F with respect to parameter `k`.
    fn numeric_partial(params: &EllipsoidParams, obs: &Observation, k: usize, h: f64) -> f64 {
        let mut plus = params.as_vector();
        let mut minus = params.as_vector();
        plus[k] += h;
        minus[k] -= h;
        let f_plus = QuadricGeometry::new(&EllipsoidParams::from_vector(&plus)).implicit_value(obs);
        let f_minus =
            QuadricGeometry::new(&EllipsoidParams::from_vector(&minus)).implicit_value(obs);
        (f_plus - f_minus) / (2.0 * h)
    }

    #[test]
    fn test_gradient_matches_finite_differences() {
        let params = test_params();
        let geometry = QuadricGeometry::new(&params);
        let obs = Observation::new(9.0, 6.5, 5.5, 1.0);
        let grad = geometry.gradient(&obs);
        for k in 0..9 {
            let numeric = numeric_partial(&params, &obs, k, 1e-6);
            assert_relative_eq!(grad[k], numeric, epsilon = 1e-6, max_relative = 1e-5);
        }
    }

    #[test]
    fn test_theta_x_partial_against_finite_difference_on_many_points() {
        // The θx derivative is the one evaluated per point from the p
        // coefficients; check it on a whole spread of geometry.
        let params = test_params();
        let geometry = QuadricGeometry::new(&params);
        for obs in test_points() {
            let numeric = numeric_partial(&params, &obs, 6, 1e-6);
            assert_relative_eq!(
                geometry.gradient(&obs)[6],
                numeric,
                epsilon = 1e-5,
                max_relative = 1e-4
            );
        }
    }

    #[test]
    fn test_normal_matrix_is_symmetric_and_counts_points() {
        let points = test_points();
        let mut source = MemorySource::new(points.clone());
        let record = build_normal_equations(&mut source, &test_params()).unwrap();

        assert_eq!(record.points, points.len());
        for i in 0..9 {
            for j in 0..9 {
                assert_eq!(record.n[(i, j)], record.n[(j, i)]);
            }
        }
        assert!(record.weighted_residual_ss > 0.0);
        // The builder must leave the source rewound.
        assert!(source.next_observation().unwrap().is_some());
    }

    #[test]
    fn test_point_at_center_is_skipped_not_divided_by_zero() {
        let params = test_params();
        let mut points = test_points();
        points.push(Observation::new(params.tx, params.ty, params.tz, 1.0));
        let expected = points.len() - 1;

        let mut source = MemorySource::new(points);
        let record = build_normal_equations(&mut source, &params).unwrap();
        assert_eq!(record.points, expected);
        assert!(record.n.iter().all(|v| v.is_finite()));
        assert!(record.u.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_aggregation_is_associative() {
        let params = test_params();
        let points = test_points();
        let (a, b, c) = (
            points[0..8].to_vec(),
            points[8..16].to_vec(),
            points[16..].to_vec(),
        );
        let g1 = build_normal_equations(&mut MemorySource::new(a), &params).unwrap();
        let g2 = build_normal_equations(&mut MemorySource::new(b), &params).unwrap();
        let g3 = build_normal_equations(&mut MemorySource::new(c), &params).unwrap();

        let all_at_once = sum_normal_equations(&[g1.clone(), g2.clone(), g3.clone()]);
        let two_then_one =
            sum_normal_equations(&[sum_normal_equations(&[g1, g2]), g3]);

        assert_relative_eq!(
            all_at_once.weighted_residual_ss,
            two_then_one.weighted_residual_ss,
            max_relative = 1e-14
        );
        for i in 0..9 {
            assert_relative_eq!(all_at_once.u[i], two_then_one.u[i], max_relative = 1e-12);
            for j in 0..9 {
                assert_relative_eq!(
                    all_at_once.n[(i, j)],
                    two_then_one.n[(i, j)],
                    max_relative = 1e-12
                );
            }
        }
        // The aggregate never claims a point count of its own.
        assert_eq!(all_at_once.points, 0);
    }
}

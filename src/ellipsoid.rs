//! # Triaxial ellipsoid parameters
//!
//! The nine parameters of the rigid-body ellipsoid model: the center offsets
//! `(tx, ty, tz)`, the semi-axis lengths `(ax, ay, az)` and the rotation
//! angles `(θx, θy, θz)`. The same ordering is used everywhere a parameter
//! vector, correction vector, or 9×9 matrix appears.
//!
//! Angles are radians throughout the adjustment; conversion to degrees happens
//! only at the reporting boundary.

use std::fmt;

use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

use crate::constants::{Degree, Meter, Radian, Vector9, DEGREES_PER_RADIAN};

/// The nine parameters of a triaxial ellipsoid.
///
/// Fields
/// -----------------
/// * `tx`, `ty`, `tz`: Center offsets `[m]`.
/// * `ax`, `ay`, `az`: Semi-axis lengths `[m]`; must stay strictly positive
///   for the model to be valid.
/// * `theta_x`, `theta_y`, `theta_z`: Rotation angles `[rad]`.
///
/// This is the sole shared state threading through one adjustment run: each
/// Gauss–Newton iteration adds a correction vector to it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EllipsoidParams {
    pub tx: Meter,
    pub ty: Meter,
    pub tz: Meter,
    pub ax: Meter,
    pub ay: Meter,
    pub az: Meter,
    pub theta_x: Radian,
    pub theta_y: Radian,
    pub theta_z: Radian,
}

impl EllipsoidParams {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tx: Meter,
        ty: Meter,
        tz: Meter,
        ax: Meter,
        ay: Meter,
        az: Meter,
        theta_x: Radian,
        theta_y: Radian,
        theta_z: Radian,
    ) -> Self {
        EllipsoidParams {
            tx,
            ty,
            tz,
            ax,
            ay,
            az,
            theta_x,
            theta_y,
            theta_z,
        }
    }

    /// Build from a parameter vector in the canonical ordering.
    pub fn from_vector(v: &Vector9) -> Self {
        EllipsoidParams::new(v[0], v[1], v[2], v[3], v[4], v[5], v[6], v[7], v[8])
    }

    /// The parameter vector in the canonical ordering.
    pub fn as_vector(&self) -> Vector9 {
        Vector9::from_column_slice(&[
            self.tx,
            self.ty,
            self.tz,
            self.ax,
            self.ay,
            self.az,
            self.theta_x,
            self.theta_y,
            self.theta_z,
        ])
    }

    /// Add a correction vector, returning the updated parameters.
    ///
    /// One Gauss–Newton (or sequential) step: `x ← x + Δ`.
    pub fn apply_correction(&self, correction: &Vector9) -> Self {
        EllipsoidParams::from_vector(&(self.as_vector() + correction))
    }

    /// The body rotation matrix `R = Rz·Ry·Rx` (XYZ Euler convention,
    /// rotation order x-then-y-then-z applied to body axes).
    ///
    /// Return
    /// ----------
    /// * The 3×3 rotation matrix, rows expressed in the original's explicit
    ///   element form.
    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        let (sin_x, cos_x) = self.theta_x.sin_cos();
        let (sin_y, cos_y) = self.theta_y.sin_cos();
        let (sin_z, cos_z) = self.theta_z.sin_cos();

        Matrix3::new(
            cos_y * cos_z,
            cos_x * sin_z + sin_x * sin_y * cos_z,
            sin_x * sin_z - cos_x * sin_y * cos_z,
            -cos_y * sin_z,
            cos_x * cos_z - sin_x * sin_y * sin_z,
            sin_x * cos_z + cos_x * sin_y * sin_z,
            sin_y,
            -sin_x * cos_y,
            cos_x * cos_y,
        )
    }

    /// Rotation angles converted to degrees, for reporting.
    pub fn angles_in_degrees(&self) -> (Degree, Degree, Degree) {
        (
            self.theta_x * DEGREES_PER_RADIAN,
            self.theta_y * DEGREES_PER_RADIAN,
            self.theta_z * DEGREES_PER_RADIAN,
        )
    }
}

impl fmt::Display for EllipsoidParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (dx, dy, dz) = self.angles_in_degrees();
        writeln!(f, "tx = {:.4} [m]", self.tx)?;
        writeln!(f, "ty = {:.4} [m]", self.ty)?;
        writeln!(f, "tz = {:.4} [m]", self.tz)?;
        writeln!(f, "ax = {:.4} [m]", self.ax)?;
        writeln!(f, "ay = {:.4} [m]", self.ay)?;
        writeln!(f, "az = {:.4} [m]", self.az)?;
        writeln!(f, "theta_x = {dx:.4} [deg]")?;
        writeln!(f, "theta_y = {dy:.4} [deg]")?;
        write!(f, "theta_z = {dz:.4} [deg]")
    }
}

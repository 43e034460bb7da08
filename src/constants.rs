//! # Constants and type definitions for Triaxial
//!
//! This module centralizes the **numerical constants**, **conversion factors**, and **common type
//! definitions** used throughout the `triaxial` library.
//!
//! ## Overview
//!
//! - Adjustment constants (convergence tolerance, iteration cap)
//! - Unit conversions (radians ↔ degrees)
//! - Core type aliases used across the crate (9-parameter vectors and matrices)
//! - The on-disk observation record size
//!
//! These definitions are used by all main modules, including the initial value estimator,
//! the normal-equation builder, and the adjustment solvers.

use nalgebra::{SMatrix, SVector};
use smallvec::SmallVec;

use crate::normal_equations::NormalEquations;

// -------------------------------------------------------------------------------------------------
// Adjustment constants
// -------------------------------------------------------------------------------------------------

/// Number of parameters describing a triaxial ellipsoid
/// (three center offsets, three semi-axes, three rotation angles).
pub const PARAM_COUNT: usize = 9;

/// Absolute tolerance on successive a-posteriori standard deviations
/// used as the Gauss–Newton convergence criterion.
pub const CONVERGENCE_TOL: f64 = 1e-5;

/// Hard cap on Gauss–Newton iterations; the loop always terminates.
pub const MAX_ITERATIONS: u32 = 10;

/// Size in bytes of one binary observation record (four IEEE-754 doubles: x, y, z, w).
pub const RECORD_SIZE: usize = 32;

// -------------------------------------------------------------------------------------------------
// Unit conversions
// -------------------------------------------------------------------------------------------------

/// Radians → degrees
pub const DEGREES_PER_RADIAN: f64 = 180.0 / std::f64::consts::PI;

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Length in meters
pub type Meter = f64;

/// Angle in radians
pub type Radian = f64;

/// Angle in degrees
pub type Degree = f64;

/// A 9×9 matrix over the ellipsoid parameter space (information/covariance matrices).
pub type Matrix9 = SMatrix<f64, PARAM_COUNT, PARAM_COUNT>;

/// A 9-vector over the ellipsoid parameter space (right-hand sides, corrections).
pub type Vector9 = SVector<f64, PARAM_COUNT>;

/// The per-group normal-equation records of one adjustment run.
///
/// Measurement campaigns rarely exceed a handful of groups, so the inline
/// capacity keeps the common case allocation-free.
pub type GroupRecords = SmallVec<[NormalEquations; 4]>;

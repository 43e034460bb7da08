//! # Triaxial
//!
//! Least-squares adjustment of a **triaxial ellipsoid** (three center offsets,
//! three semi-axis lengths, three rotation angles) from batches of weighted
//! 3-D point observations stored in binary files.
//!
//! ## Workflow
//!
//! 1. Open each measurement group as a [`PointFile`](observations::PointFile)
//!    (or feed points from memory through
//!    [`MemorySource`](observations::MemorySource)).
//! 2. Bootstrap the nonlinear fit with the algebraic closed-form estimate of
//!    [`initial_values::estimate_initial_values`].
//! 3. Run either the batch Gauss–Newton adjustment
//!    ([`adjustment::batch::fit_ellipsoid`]) over all groups together, or the
//!    sequential workflow ([`adjustment::sequential::sequential_fit`]) that
//!    folds one group at a time into an existing solution without revisiting
//!    earlier data.
//! 4. Scale the inverted normal matrix into a covariance matrix and
//!    per-parameter standard deviations
//!    ([`adjustment::precision`]).

pub mod adjustment;
pub mod constants;
pub mod display;
pub mod ellipsoid;
pub mod initial_values;
pub mod matrix;
pub mod normal_equations;
pub mod observations;
pub mod sorting;
pub mod synthetic;
pub mod triaxial_errors;

pub use adjustment::batch::{fit_ellipsoid, BatchFit};
pub use adjustment::sequential::{sequential_fit, SequentialFit, Solution};
pub use adjustment::{AdjustmentParams, ConvergenceStatus};
pub use ellipsoid::EllipsoidParams;
pub use observations::{MemorySource, Observation, ObservationSource, PointFile};
pub use triaxial_errors::TriaxialError;

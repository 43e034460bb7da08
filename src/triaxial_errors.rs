use camino::Utf8PathBuf;
use thiserror::Error;

/// All error conditions surfaced by the `triaxial` crate.
///
/// Numerical preconditions (matrix factorizability, quadric degeneracy) are
/// checked at the point of failure and abort the enclosing adjustment run;
/// they are never propagated as silent NaN values. Hitting the iteration cap
/// is **not** an error: it is reported through
/// [`ConvergenceStatus`](crate::adjustment::ConvergenceStatus) on a
/// successful return so callers can always tell a converged fit from a capped
/// one.
#[derive(Error, Debug)]
pub enum TriaxialError {
    #[error("Unable to open observation file {path}: {source}")]
    FileUnavailable {
        path: Utf8PathBuf,
        source: std::io::Error,
    },

    #[error("Truncated observation record (file does not hold a whole number of 32-byte records)")]
    TruncatedRecord,

    #[error("Unable to perform file operation: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Degenerate quadric: the closed-form initial estimator has no real ellipsoid solution")]
    DegenerateQuadric,

    #[error("Normal matrix is not positive definite (non-positive Cholesky pivot at row {pivot}); point geometry is insufficient or degenerate")]
    NotPositiveDefinite { pivot: usize },

    #[error("Adjustment needs more than 9 points to be redundant, got {points}")]
    InsufficientObservations { points: usize },

    #[error("Invalid adjustment parameter: {0}")]
    InvalidAdjustmentParams(String),
}

impl PartialEq for TriaxialError {
    fn eq(&self, other: &Self) -> bool {
        use TriaxialError::*;
        match (self, other) {
            (FileUnavailable { path: a, .. }, FileUnavailable { path: b, .. }) => a == b,
            (IoError(_), IoError(_)) => true,
            (TruncatedRecord, TruncatedRecord) => true,
            (DegenerateQuadric, DegenerateQuadric) => true,
            (NotPositiveDefinite { pivot: a }, NotPositiveDefinite { pivot: b }) => a == b,
            (
                InsufficientObservations { points: a },
                InsufficientObservations { points: b },
            ) => a == b,
            (InvalidAdjustmentParams(a), InvalidAdjustmentParams(b)) => a == b,
            _ => false,
        }
    }
}

//! # Symmetric matrix primitives
//!
//! The two specialized operations the adjustment engine needs on top of
//! `nalgebra`'s dense algebra:
//!
//! - [`symmetrize`] – complete a matrix whose upper triangle has been
//!   populated into a full symmetric matrix, in place.
//! - [`cholesky_inverse`] – invert a symmetric positive-definite matrix by
//!   the square-root (Cholesky) method, surfacing a non-positive pivot as a
//!   typed error instead of a NaN.
//!
//! Zero initialization and dense products are `nalgebra`'s own
//! (`SMatrix::zeros()`, the `*` operator); only the operations it does not
//! provide in the required form live here.

use nalgebra::SMatrix;

use crate::triaxial_errors::TriaxialError;

/// Mirror the upper triangle of `m` onto its lower triangle, in place.
///
/// Arguments
/// -----------------
/// * `m`: A square matrix whose entries on or above the diagonal are populated.
///
/// Notes
/// ----------
/// * The caller guarantees the upper triangle is fully set; no validation is
///   performed.
pub fn symmetrize<const N: usize>(m: &mut SMatrix<f64, N, N>) {
    for i in 1..N {
        for j in 0..i {
            m[(i, j)] = m[(j, i)];
        }
    }
}

/// Invert a symmetric positive-definite matrix by the square-root (Cholesky) method.
///
/// The matrix is decomposed as `N = CᵀC` with an upper-triangular factor `C`
/// computed column by column, the triangular factor is inverted into `D` by
/// back-substitution, and the symmetric inverse is reconstructed as `D·Dᵀ` on
/// the upper triangle and completed with [`symmetrize`].
///
/// Arguments
/// -----------------
/// * `n`: The symmetric positive-definite matrix to invert.
///
/// Return
/// ----------
/// * The inverse matrix, or [`TriaxialError::NotPositiveDefinite`] if a
///   diagonal term `N[i][i] − Σ_{k<i} C[k][i]²` is not strictly positive
///   (rank-deficient or degenerate point configuration). The failing pivot row
///   is reported; no NaN ever leaves this function.
///
/// See also
/// ------------
/// * [`symmetrize`] – Completes the reconstructed upper triangle.
pub fn cholesky_inverse<const N: usize>(
    n: &SMatrix<f64, N, N>,
) -> Result<SMatrix<f64, N, N>, TriaxialError> {
    let mut c = SMatrix::<f64, N, N>::zeros();
    let mut d = SMatrix::<f64, N, N>::zeros();

    // Upper-triangular factor C, column by column.
    for i in 0..N {
        let mut sum_sq = 0.0;
        for k in 0..i {
            sum_sq += c[(k, i)] * c[(k, i)];
        }
        let pivot = n[(i, i)] - sum_sq;
        // `!(pivot > 0)` also rejects a NaN pivot.
        if !(pivot > 0.0) {
            return Err(TriaxialError::NotPositiveDefinite { pivot: i });
        }
        c[(i, i)] = pivot.sqrt();
        d[(i, i)] = 1.0 / c[(i, i)];
        for j in (i + 1)..N {
            let mut sum = 0.0;
            for k in 0..i {
                sum += c[(k, i)] * c[(k, j)];
            }
            c[(i, j)] = (n[(i, j)] - sum) / c[(i, i)];
        }
    }

    // Inverse D of the triangular factor, by back-substitution.
    for i in 0..N {
        for j in (i + 1)..N {
            let mut sum = 0.0;
            for k in i..j {
                sum += d[(i, k)] * c[(k, j)];
            }
            d[(i, j)] = -sum / c[(j, j)];
        }
    }

    // Reconstruction of the symmetric inverse as D·Dᵀ, upper triangle first.
    let mut inv = SMatrix::<f64, N, N>::zeros();
    for i in 0..N {
        for j in i..N {
            let mut sum = 0.0;
            for k in j..N {
                sum += d[(i, k)] * d[(j, k)];
            }
            inv[(i, j)] = sum;
        }
    }
    symmetrize(&mut inv);
    Ok(inv)
}

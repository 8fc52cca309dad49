use bevy::math::{DVec2, IVec2};
use nalgebra::{SMatrix, SVector};

pub type Real = f64;
pub const DIM: usize = 2;

/// Number of terms in the quadratic basis without a constant term.
pub const BASIS_SIZE: usize = 5;
/// Number of terms in the quadratic basis with a constant term.
pub const BASIS_SIZE_WITH_CONSTANT: usize = 6;

pub type Vector = DVec2;
pub type Cell = IVec2;

pub type Vector5 = SVector<Real, BASIS_SIZE>;
pub type Matrix5 = SMatrix<Real, BASIS_SIZE, BASIS_SIZE>;
pub type Vector6 = SVector<Real, BASIS_SIZE_WITH_CONSTANT>;
pub type Matrix6 = SMatrix<Real, BASIS_SIZE_WITH_CONSTANT, BASIS_SIZE_WITH_CONSTANT>;

/// Squared distance below which two points are treated as coincident.
pub const COINCIDENT_EPS: Real = 1.0e-20;

#[inline(always)]
pub fn zero_vector() -> Vector {
    DVec2::ZERO
}

#[inline(always)]
pub fn is_coincident(offset: Vector) -> bool {
    offset.length_squared() < COINCIDENT_EPS
}

/// Weighted outer product `w · a aᵀ` accumulated into `target`.
#[inline(always)]
pub fn accumulate_outer5(target: &mut Matrix5, a: &Vector5, weight: Real) {
    for col in 0..BASIS_SIZE {
        let scaled = a[col] * weight;
        for row in 0..BASIS_SIZE {
            target[(row, col)] += a[row] * scaled;
        }
    }
}

#[inline(always)]
pub fn accumulate_outer6(target: &mut Matrix6, a: &Vector6, weight: Real) {
    for col in 0..BASIS_SIZE_WITH_CONSTANT {
        let scaled = a[col] * weight;
        for row in 0..BASIS_SIZE_WITH_CONSTANT {
            target[(row, col)] += a[row] * scaled;
        }
    }
}

/// Largest absolute asymmetry `|m_ij - m_ji|`.
pub fn asymmetry5(m: &Matrix5) -> Real {
    let mut worst: Real = 0.0;
    for row in 0..BASIS_SIZE {
        for col in (row + 1)..BASIS_SIZE {
            worst = worst.max((m[(row, col)] - m[(col, row)]).abs());
        }
    }
    worst
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outer_product_is_symmetric() {
        let a = Vector5::new(1.0, -2.0, 0.5, 3.0, 0.25);
        let mut m = Matrix5::zeros();
        accumulate_outer5(&mut m, &a, 2.0);
        assert_eq!(asymmetry5(&m), 0.0);
        assert!((m[(1, 3)] - 2.0 * -2.0 * 3.0).abs() < 1e-12);
    }

    #[test]
    fn coincident_threshold() {
        assert!(is_coincident(DVec2::new(1e-12, 0.0)));
        assert!(!is_coincident(DVec2::new(1e-6, 0.0)));
    }
}

//! Weight functions and polynomial bases shared by every particle operator.
//!
//! Offsets are always `r = x_j - x_i` and basis vectors are evaluated on the
//! normalized offset `s = r / rs`, so the moment matrices stay well scaled
//! regardless of the particle spacing. `scaling` undoes that normalization.

use crate::config::UPWIND_FLOOR;
use crate::math::{Matrix5, Real, Vector, Vector5, Vector6};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KernelShape {
    /// `(1 - r/re)²`
    Quadratic,
    /// `re/r - 1`
    InverseLinear,
}

/// Compact-support radial weight with cutoff `re`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Kernel {
    pub shape: KernelShape,
    pub re: Real,
}

impl Kernel {
    pub fn new(shape: KernelShape, re: Real) -> Self {
        Self { shape, re }
    }

    /// `W(r)`, zero at and beyond `re`.
    ///
    /// The inverse-linear shape is singular at the origin; callers skip
    /// coincident pairs before weighting.
    #[inline]
    pub fn weight(&self, r: Real) -> Real {
        if r >= self.re {
            return 0.0;
        }
        match self.shape {
            KernelShape::Quadratic => {
                let q = 1.0 - r / self.re;
                q * q
            }
            KernelShape::InverseLinear => {
                if r <= 0.0 {
                    Real::INFINITY
                } else {
                    self.re / r - 1.0
                }
            }
        }
    }

    /// `W(r) · max(2cos²θ - 1, ε)`.
    ///
    /// `cos_theta` is the cosine between the offset and the local relative
    /// motion; neighbors lying across the flow direction get the floor weight.
    #[inline]
    pub fn weight_upwind(&self, r: Real, cos_theta: Real) -> Real {
        let gate = (2.0 * cos_theta * cos_theta - 1.0).max(UPWIND_FLOOR);
        self.weight(r) * gate
    }
}

/// Quadratic basis without constant term: `[x, y, x², xy, y²]` of `r / rs`.
#[inline]
pub fn basis(r: Vector, rs: Real) -> Vector5 {
    let s = r / rs;
    Vector5::new(s.x, s.y, s.x * s.x, s.x * s.y, s.y * s.y)
}

/// Quadratic basis with constant term: `[1, x, y, x², xy, y²]` of `r / rs`.
#[inline]
pub fn basis_with_constant(r: Vector, rs: Real) -> Vector6 {
    let s = r / rs;
    Vector6::new(1.0, s.x, s.y, s.x * s.x, s.x * s.y, s.y * s.y)
}

/// Normal derivative of the quadratic model at the wall point `x_i + r`,
/// expressed in the same scaled coefficients as `basis` (times `rs`).
#[inline]
pub fn boundary_basis(r: Vector, normal: Vector, rs: Real) -> Vector5 {
    let s = r / rs;
    Vector5::new(
        normal.x,
        normal.y,
        2.0 * normal.x * s.x,
        normal.x * s.y + normal.y * s.x,
        2.0 * normal.y * s.y,
    )
}

/// `H`: maps scaled least-squares coefficients to `[∂x, ∂y, ∂xx, ∂xy, ∂yy]`.
pub fn scaling(rs: Real) -> Matrix5 {
    let inv = 1.0 / rs;
    let inv2 = inv * inv;
    Matrix5::from_diagonal(&Vector5::new(inv, inv, 2.0 * inv2, inv2, 2.0 * inv2))
}

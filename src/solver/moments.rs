//! Weighted moment matrices and the local least-squares operators built from them.
//!
//! For particle `i` the fluid moment is `M = Σ W P Pᵀ` and, near a wall, the
//! wall moment is `M_n = Σ W Q Qᵀ`. The operator `H (M + M_n)⁻¹` turns a
//! weighted sum of basis vectors into `[∂x, ∂y, ∂xx, ∂xy, ∂yy]` estimates.

use crate::config::{MIN_NEIGHBORS, MIN_PIVOT_RATIO, MOMENT_REGULARIZATION, SimConfig};
use crate::core::{Kernel, WallParticle, basis, basis_with_constant, boundary_basis, scaling};
use crate::math::{
    BASIS_SIZE, BASIS_SIZE_WITH_CONSTANT, Matrix5, Matrix6, Real, Vector, Vector5, Vector6, accumulate_outer5,
    accumulate_outer6, is_coincident,
};
use crate::solver::neighbors::Neighbor;

/// `H (M + M_n)⁻¹` for one particle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LocalOperator {
    pub matrix: Matrix5,
    pub under_resolved: bool,
}

impl Default for LocalOperator {
    fn default() -> Self {
        Self::zero()
    }
}

impl LocalOperator {
    /// Operator of an under-resolved particle: every estimate is zero.
    pub fn zero() -> Self {
        Self {
            matrix: Matrix5::zeros(),
            under_resolved: true,
        }
    }

    /// `[∂x, ∂y, ∂xx, ∂xy, ∂yy]` from a moment right-hand side.
    #[inline]
    pub fn derivatives(&self, rhs: &Vector5) -> Vector5 {
        self.matrix * rhs
    }

    #[inline]
    pub fn gradient(&self, rhs: &Vector5) -> Vector {
        let d = self.derivatives(rhs);
        Vector::new(d[0], d[1])
    }

    #[inline]
    pub fn laplacian(&self, rhs: &Vector5) -> Real {
        let d = self.derivatives(rhs);
        d[2] + d[4]
    }
}

#[derive(Clone, Copy, Debug)]
pub struct MomentAssembler {
    rs: Real,
    regularization: Real,
    min_pivot_ratio: Real,
    min_neighbors: usize,
    scaling: Matrix5,
}

impl MomentAssembler {
    pub fn new(rs: Real) -> Self {
        Self {
            rs,
            regularization: MOMENT_REGULARIZATION,
            min_pivot_ratio: MIN_PIVOT_RATIO,
            min_neighbors: MIN_NEIGHBORS,
            scaling: scaling(rs),
        }
    }

    pub fn from_config(config: &SimConfig) -> Self {
        Self::new(config.rs())
    }

    #[inline]
    pub fn rs(&self) -> Real {
        self.rs
    }

    /// `Σ W P Pᵀ` over fluid neighbors using their stored weights.
    pub fn fluid_moment(&self, neighbors: &[Neighbor]) -> Matrix5 {
        let mut moment = Matrix5::zeros();
        for neighbor in neighbors {
            let p = basis(neighbor.offset, self.rs);
            accumulate_outer5(&mut moment, &p, neighbor.weight);
        }
        moment
    }

    /// `Σ w_j P Pᵀ` with one replacement weight per neighbor.
    pub fn weighted_moment(&self, neighbors: &[Neighbor], weights: &[Real]) -> Matrix5 {
        let mut moment = Matrix5::zeros();
        for (neighbor, &weight) in neighbors.iter().zip(weights) {
            let p = basis(neighbor.offset, self.rs);
            accumulate_outer5(&mut moment, &p, weight);
        }
        moment
    }

    /// `Σ W Q Qᵀ` over wall neighbors.
    pub fn wall_moment(&self, walls: &[Neighbor], wall_particles: &[WallParticle]) -> Matrix5 {
        let mut moment = Matrix5::zeros();
        for wall in walls {
            let normal = wall_particles[wall.index].normal;
            let q = boundary_basis(wall.offset, normal, self.rs);
            accumulate_outer5(&mut moment, &q, wall.weight);
        }
        moment
    }

    /// `H (M + M_n)⁻¹` for one particle, or the zero operator when the
    /// neighborhood cannot support a quadratic fit.
    pub fn operator(
        &self,
        neighbors: &[Neighbor],
        walls: &[Neighbor],
        wall_particles: &[WallParticle],
    ) -> LocalOperator {
        let mut moment = self.fluid_moment(neighbors);
        if !walls.is_empty() {
            moment += self.wall_moment(walls, wall_particles);
        }
        self.invert(&moment, neighbors.len() + walls.len())
    }

    /// Regularized Cholesky inverse of `moment`, scaled by `H`.
    pub fn invert(&self, moment: &Matrix5, support: usize) -> LocalOperator {
        if support < self.min_neighbors {
            return LocalOperator::zero();
        }

        let mean_diagonal = (moment.trace() / BASIS_SIZE as Real).max(Real::MIN_POSITIVE);
        let regularized = moment + Matrix5::identity() * (self.regularization * mean_diagonal);
        let Some(cholesky) = regularized.cholesky() else {
            return LocalOperator::zero();
        };

        // Near-singular stencils (collinear or clustered neighbors) factor
        // fine after regularization but give meaningless derivatives.
        let smallest_pivot = cholesky
            .l_dirty()
            .diagonal()
            .iter()
            .map(|l| l * l)
            .fold(Real::INFINITY, Real::min);
        if smallest_pivot < self.min_pivot_ratio * mean_diagonal {
            return LocalOperator::zero();
        }

        let matrix = self.scaling * cholesky.inverse();
        if matrix.iter().any(|value| !value.is_finite()) {
            return LocalOperator::zero();
        }
        LocalOperator {
            matrix,
            under_resolved: false,
        }
    }

    /// `Σ W P Δf`: moment right-hand side for a scalar sampled at neighbors,
    /// with `Δf = f_j - f_i`.
    pub fn scalar_rhs<F>(&self, neighbors: &[Neighbor], delta: F) -> Vector5
    where
        F: Fn(&Neighbor) -> Real,
    {
        let mut rhs = Vector5::zeros();
        for neighbor in neighbors {
            rhs += basis(neighbor.offset, self.rs) * (neighbor.weight * delta(neighbor));
        }
        rhs
    }

    /// `Σ w_j P Δf`, the counterpart of `weighted_moment`.
    pub fn weighted_rhs<F>(&self, neighbors: &[Neighbor], weights: &[Real], delta: F) -> Vector5
    where
        F: Fn(&Neighbor) -> Real,
    {
        let mut rhs = Vector5::zeros();
        for (neighbor, &weight) in neighbors.iter().zip(weights) {
            rhs += basis(neighbor.offset, self.rs) * (weight * delta(neighbor));
        }
        rhs
    }

    /// `Σ W Q rs g_k`: wall contribution for prescribed normal derivatives `g_k`.
    pub fn wall_rhs<F>(&self, walls: &[Neighbor], wall_particles: &[WallParticle], normal_derivative: F) -> Vector5
    where
        F: Fn(&WallParticle) -> Real,
    {
        let mut rhs = Vector5::zeros();
        for wall in walls {
            let particle = &wall_particles[wall.index];
            let q = boundary_basis(wall.offset, particle.normal, self.rs);
            rhs += q * (wall.weight * self.rs * normal_derivative(particle));
        }
        rhs
    }

    /// Moving-least-squares estimate of a field at `point` from scattered
    /// `(position, value)` samples, using the constant-term basis.
    ///
    /// Returns `None` when fewer than six samples fall inside the kernel
    /// support or the fit is singular.
    pub fn interpolate(&self, kernel: &Kernel, point: Vector, samples: &[(Vector, Real)]) -> Option<Real> {
        let mut moment = Matrix6::zeros();
        let mut rhs = Vector6::zeros();
        let mut support = 0;

        for &(position, value) in samples {
            let offset = position - point;
            let distance = offset.length();
            if distance >= kernel.re {
                continue;
            }
            // The inverse-linear kernel is singular at the origin; clamp it
            // to the value at the coincidence threshold.
            let weight = if is_coincident(offset) {
                kernel.weight(kernel.re * 1.0e-6)
            } else {
                kernel.weight(distance)
            };
            let p = basis_with_constant(offset, self.rs);
            accumulate_outer6(&mut moment, &p, weight);
            rhs += p * (weight * value);
            support += 1;
        }

        if support < self.min_neighbors.max(BASIS_SIZE_WITH_CONSTANT) {
            return None;
        }

        let shift = self.regularization * (moment.trace() / BASIS_SIZE_WITH_CONSTANT as Real).max(Real::MIN_POSITIVE);
        let regularized = moment + Matrix6::identity() * shift;
        let coefficients = regularized.cholesky()?.solve(&rhs);
        let value = coefficients[0];
        value.is_finite().then_some(value)
    }
}

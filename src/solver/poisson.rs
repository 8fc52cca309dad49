//! Pressure Poisson system for both method families.
//!
//! The unknown is the pressure impulse `ψ = p·dt`. Rows are assembled from
//! the per-frame neighbor table into triplets, compressed to CSR and solved
//! with restarted GMRES.

use nalgebra::DVector;

use crate::config::{Method, SimConfig};
use crate::core::{Kernel, Label, Particle, WallParticle, basis};
use crate::math::{DIM, Real, Vector, zero_vector};
use crate::solver::moments::{LocalOperator, MomentAssembler};
use crate::solver::neighbors::NeighborTable;
use crate::solver::sparse::{CsrMatrix, Gmres, SolveReport, TripletBuilder};
use crate::solver::surface::ReferenceDensity;

/// Assembled `A ψ = b` for one frame.
#[derive(Clone, Debug)]
pub struct PressureSystem {
    pub matrix: CsrMatrix,
    pub rhs: DVector<Real>,
}

#[derive(Clone, Debug)]
pub struct PoissonSolver {
    method: Method,
    density: Real,
    dt: Real,
    relaxation: Real,
    upwind: bool,
    kernel: Kernel,
    reference: ReferenceDensity,
    assembler: MomentAssembler,
    gmres: Gmres,
}

impl PoissonSolver {
    pub fn new(config: &SimConfig, kernel: Kernel, reference: ReferenceDensity) -> Self {
        Self {
            method: config.method,
            density: config.density,
            dt: config.dt,
            relaxation: config.relaxation,
            upwind: config.upwind_divergence,
            kernel,
            reference,
            assembler: MomentAssembler::from_config(config),
            gmres: Gmres::new(config.gmres),
        }
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn reference(&self) -> ReferenceDensity {
        self.reference
    }

    pub fn assembler(&self) -> &MomentAssembler {
        &self.assembler
    }

    /// MPS Laplacian scale `2d / (λ0 n0)`.
    #[inline]
    fn mps_scale(&self) -> Real {
        2.0 * DIM as Real / (self.reference.lambda0 * self.reference.n0)
    }

    /// `div v*` at every particle using the local operators, or the upwind
    /// gated operator when enabled.
    pub fn divergence(
        &self,
        particles: &[Particle],
        table: &NeighborTable,
        operators: &[LocalOperator],
        walls: &[WallParticle],
    ) -> Vec<Real> {
        let mut divergence = vec![0.0; particles.len()];
        for (i, particle) in particles.iter().enumerate() {
            if operators[i].under_resolved {
                continue;
            }
            let neighbors = table.fluid(i);
            let vi = particle.predicted_velocity;

            let (operator, weights): (LocalOperator, Vec<Real>) = if self.upwind {
                let weights: Vec<Real> = neighbors
                    .iter()
                    .map(|neighbor| {
                        let relative = particles[neighbor.index].predicted_velocity - vi;
                        let speed = relative.length();
                        let cos_theta = if speed > 0.0 {
                            neighbor.offset.dot(relative) / (neighbor.distance * speed)
                        } else {
                            1.0
                        };
                        self.kernel.weight_upwind(neighbor.distance, cos_theta)
                    })
                    .collect();
                let mut moment = self.assembler.weighted_moment(neighbors, &weights);
                let wall_neighbors = table.walls(i);
                if !wall_neighbors.is_empty() {
                    moment += self.assembler.wall_moment(wall_neighbors, walls);
                }
                let operator = self.assembler.invert(&moment, neighbors.len() + wall_neighbors.len());
                (operator, weights)
            } else {
                (operators[i], neighbors.iter().map(|neighbor| neighbor.weight).collect())
            };

            let rhs_x = self.assembler.weighted_rhs(neighbors, &weights, |neighbor| {
                particles[neighbor.index].predicted_velocity.x - vi.x
            });
            let rhs_y = self.assembler.weighted_rhs(neighbors, &weights, |neighbor| {
                particles[neighbor.index].predicted_velocity.y - vi.y
            });
            divergence[i] = operator.derivatives(&rhs_x)[0] + operator.derivatives(&rhs_y)[1];
        }
        divergence
    }

    /// LSMPS rows: identity on free-surface particles, least-squares
    /// Laplacian elsewhere with the wall Neumann source on the right.
    pub fn assemble_lsmps(
        &self,
        particles: &[Particle],
        table: &NeighborTable,
        operators: &[LocalOperator],
        walls: &[WallParticle],
    ) -> PressureSystem {
        let n = particles.len();
        let divergence = self.divergence(particles, table, operators, walls);
        let mut triplets = TripletBuilder::with_capacity(n, table.pair_count() + n);
        let mut rhs = DVector::zeros(n);

        for (i, particle) in particles.iter().enumerate() {
            if particle.label == Label::FreeSurface || operators[i].under_resolved {
                triplets.push(i, i, 1.0);
                continue;
            }
            let operator = &operators[i];

            let mut diagonal = 0.0;
            for neighbor in table.fluid(i) {
                let p = basis(neighbor.offset, self.assembler.rs());
                let coefficient = operator.laplacian(&(p * neighbor.weight));
                triplets.push(i, neighbor.index, -coefficient);
                diagonal += coefficient;
            }
            triplets.push(i, i, diagonal);

            let mut source = -self.density * divergence[i];
            let wall_neighbors = table.walls(i);
            if !wall_neighbors.is_empty() {
                let wall_rhs = self.assembler.wall_rhs(wall_neighbors, walls, |wall| {
                    self.density * particle.predicted_velocity.dot(wall.normal)
                });
                source += operator.laplacian(&wall_rhs);
            }
            rhs[i] = source;
        }

        PressureSystem {
            matrix: triplets.build(),
            rhs,
        }
    }

    /// MPS rows from number-density deviation. Only compression above `n0`
    /// is a source, so expanding particles never pull their neighbors in.
    pub fn assemble_mps(&self, particles: &[Particle], table: &NeighborTable) -> PressureSystem {
        let n = particles.len();
        let scale = self.mps_scale();
        let n0 = self.reference.n0;
        let mut triplets = TripletBuilder::with_capacity(n, table.pair_count() + n);
        let mut rhs = DVector::zeros(n);

        for (i, particle) in particles.iter().enumerate() {
            let mut diagonal = 0.0;
            let mut n_star = 0.0;
            for neighbor in table.fluid(i) {
                let coefficient = scale * neighbor.weight;
                n_star += neighbor.weight;
                triplets.push(i, neighbor.index, -coefficient);
                diagonal += coefficient;
            }
            if particle.label.is_surface() {
                diagonal += scale * (n0 - n_star).max(0.0);
            }
            triplets.push(i, i, diagonal);
            rhs[i] = self.relaxation * self.density / self.dt * (n_star - n0).max(0.0) / n0;
        }

        PressureSystem {
            matrix: triplets.build(),
            rhs,
        }
    }

    pub fn solve(&self, system: &PressureSystem) -> (DVector<Real>, SolveReport) {
        self.gmres.solve(&system.matrix, &system.rhs)
    }

    /// LSMPS `∇ψ_i`, including the wall Neumann term.
    pub fn lsmps_gradient(
        &self,
        i: usize,
        particles: &[Particle],
        table: &NeighborTable,
        operator: &LocalOperator,
        walls: &[WallParticle],
    ) -> Vector {
        if operator.under_resolved {
            return zero_vector();
        }
        let psi_i = particles[i].pressure_impulse;
        let mut rhs = self
            .assembler
            .scalar_rhs(table.fluid(i), |neighbor| particles[neighbor.index].pressure_impulse - psi_i);
        let wall_neighbors = table.walls(i);
        if !wall_neighbors.is_empty() {
            let velocity = particles[i].predicted_velocity;
            rhs += self
                .assembler
                .wall_rhs(wall_neighbors, walls, |wall| self.density * velocity.dot(wall.normal));
        }
        operator.gradient(&rhs)
    }

    /// MPS `∇ψ_i = d/n0 Σ (ψ_j - ψ_min) r / |r|² W`.
    pub fn mps_gradient(&self, i: usize, particles: &[Particle], table: &NeighborTable) -> Vector {
        let neighbors = table.fluid(i);
        let psi_min = neighbors
            .iter()
            .map(|neighbor| particles[neighbor.index].pressure_impulse)
            .fold(particles[i].pressure_impulse.min(0.0), Real::min);

        let mut gradient = zero_vector();
        for neighbor in neighbors {
            let psi_j = particles[neighbor.index].pressure_impulse;
            gradient += neighbor.offset
                * ((psi_j - psi_min) * neighbor.weight / (neighbor.distance * neighbor.distance));
        }
        gradient * (DIM as Real / self.reference.n0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BoundaryModel, ParticleSet, SpatialHash};
    use crate::solver::surface::{SurfaceClassifier, number_density};
    use bevy::math::DVec2;

    struct Frame {
        set: ParticleSet,
        table: NeighborTable,
        boundary: BoundaryModel,
        operators: Vec<LocalOperator>,
        solver: PoissonSolver,
    }

    fn frame(config: &SimConfig) -> Frame {
        scaled_frame(config, 1.0)
    }

    /// 20×20 block whose spacing is `scale · l0`.
    fn scaled_frame(config: &SimConfig, scale: Real) -> Frame {
        let kernel = Kernel::new(config.method.kernel_shape(), config.re());
        let mut set = ParticleSet::block(DVec2::splat(0.5), 0.5 * scale, 20);
        let mut hash = SpatialHash::for_domain(
            config.domain_min,
            config.domain_max,
            config.grid_resolution,
            config.bucket_capacity,
        );
        let boundary = BoundaryModel::rectangle(
            config.bound_min,
            config.bound_max,
            config.walls_per_side,
            hash.clone(),
        )
        .unwrap();
        let positions = set.positions();
        hash.rebuild(&positions).unwrap();
        let mut table = NeighborTable::new();
        table.rebuild(&positions, &hash, &boundary, &kernel);

        let reference = ReferenceDensity::lattice(&kernel, config.particle_spacing);
        let solver = PoissonSolver::new(config, kernel, reference);
        let operators: Vec<LocalOperator> = (0..set.len())
            .map(|i| solver.assembler().operator(table.fluid(i), table.walls(i), boundary.walls()))
            .collect();
        for (i, particle) in set.particles_mut().iter_mut().enumerate() {
            particle.number_density = number_density(table.fluid(i));
            particle.under_resolved = operators[i].under_resolved;
        }
        SurfaceClassifier::from_config(config).classify(set.particles_mut(), &table, reference.n0);

        Frame {
            set,
            table,
            boundary,
            operators,
            solver,
        }
    }

    #[test]
    fn lsmps_rows_sum_to_zero() {
        let config = SimConfig::lsmps();
        let f = frame(&config);
        let system = f.solver.assemble_lsmps(
            f.set.particles(),
            &f.table,
            &f.operators,
            f.boundary.walls(),
        );
        for (i, particle) in f.set.iter().enumerate() {
            if particle.label == Label::FreeSurface {
                assert_eq!(system.matrix.get(i, i), 1.0);
                continue;
            }
            let largest = system
                .matrix
                .row(i)
                .map(|(_, value)| value.abs())
                .fold(0.0, Real::max);
            assert!(largest > 0.0);
            assert!(system.matrix.row_sum(i).abs() < 1e-9 * largest);
        }
        // A fluid at rest has no divergence to remove.
        assert!(system.rhs.iter().all(|&value| value == 0.0));
    }

    #[test]
    fn mps_interior_rows_sum_to_zero() {
        let config = SimConfig::mps();
        let f = frame(&config);
        let system = f.solver.assemble_mps(f.set.particles(), &f.table);
        let interior = f
            .set
            .iter()
            .enumerate()
            .filter(|(_, particle)| particle.label == Label::Interior);
        for (i, _) in interior {
            let diagonal = system.matrix.get(i, i);
            assert!(system.matrix.row_sum(i).abs() < 1e-9 * diagonal);
            assert!(system.rhs[i].abs() < 1e-6);
        }
    }

    #[test]
    fn mps_source_ignores_expansion() {
        let config = SimConfig::mps();
        let f = frame(&config);
        let n0 = f.solver.reference().n0;
        let system = f.solver.assemble_mps(f.set.particles(), &f.table);
        // Bottom-left corner and bottom edge sit well below n0.
        for i in [0, 10 * 20] {
            assert!(f.set.particles()[i].number_density < n0);
            assert_eq!(system.rhs[i], 0.0);
        }

        let stretched = scaled_frame(&config, 1.1);
        let system = stretched
            .solver
            .assemble_mps(stretched.set.particles(), &stretched.table);
        assert!(system.rhs.iter().all(|&value| value == 0.0));
    }

    #[test]
    fn mps_source_pushes_compressed_particles_apart() {
        let config = SimConfig::mps();
        let f = scaled_frame(&config, 0.95);
        let system = f.solver.assemble_mps(f.set.particles(), &f.table);
        assert!(system.rhs.iter().all(|&value| value >= 0.0));
        assert!(system.rhs[10 * 20 + 10] > 0.0);
    }

    #[test]
    fn mps_gradient_of_linear_field_is_exact() {
        let config = SimConfig::mps();
        let mut f = frame(&config);
        for particle in f.set.iter_mut() {
            particle.pressure_impulse = particle.position.x - 0.25 * particle.position.y;
        }
        let center = 10 * 20 + 10;
        let gradient = f.solver.mps_gradient(center, f.set.particles(), &f.table);
        assert!((gradient - DVec2::new(1.0, -0.25)).length() < 1e-9, "{gradient:?}");
    }

    #[test]
    fn lsmps_gradient_reproduces_quadratic_field() {
        let config = SimConfig::lsmps();
        let mut f = frame(&config);
        let field = |p: DVec2| 2.0 * p.x - 3.0 * p.y + p.x * p.x - 0.5 * p.x * p.y + 4.0 * p.y * p.y;
        for particle in f.set.iter_mut() {
            particle.pressure_impulse = field(particle.position);
        }

        let center = 10 * 20 + 10;
        let p = f.set.particles()[center].position;
        let gradient = f.solver.lsmps_gradient(
            center,
            f.set.particles(),
            &f.table,
            &f.operators[center],
            f.boundary.walls(),
        );
        let expected = DVec2::new(2.0 + 2.0 * p.x - 0.5 * p.y, -3.0 - 0.5 * p.x + 8.0 * p.y);
        assert!((gradient - expected).length() < 1e-5, "{gradient:?} vs {expected:?}");
    }

    #[test]
    fn divergence_of_linear_field() {
        let config = SimConfig::lsmps();
        let mut f = frame(&config);
        for particle in f.set.iter_mut() {
            particle.predicted_velocity = DVec2::new(1.5 * particle.position.x, -0.5 * particle.position.y);
        }
        let divergence = f.solver.divergence(
            f.set.particles(),
            &f.table,
            &f.operators,
            f.boundary.walls(),
        );
        assert!((divergence[10 * 20 + 10] - 1.0).abs() < 1e-6);
    }
}

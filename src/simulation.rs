use bevy::prelude::{Resource, debug, info, warn};

use crate::config::{BLOCK_CENTER, BLOCK_EXTENT, CONFINE_MARGIN, Method, SimConfig};
use crate::core::{BoundaryModel, Kernel, Label, ParticleSet, SpatialHash};
use crate::error::SimError;
use crate::math::{Real, Vector};
use crate::solver::{
    LocalOperator, MomentAssembler, NeighborTable, PoissonSolver, PressureSystem, ReferenceDensity,
    Shifting, SolveReport, SurfaceClassifier, number_density,
};

/// Summary of one integrator step.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StepReport {
    pub frame: u64,
    pub solve: SolveReport,
    pub free_surface: usize,
    pub under_resolved: usize,
    /// Particles pushed back inside the wall box this step.
    pub clamped: usize,
}

/// Owns every piece of simulation state and advances it one frame at a time.
#[derive(Resource)]
pub struct Simulation {
    config: SimConfig,
    kernel: Kernel,
    particles: ParticleSet,
    boundary: BoundaryModel,
    hash: SpatialHash,
    table: NeighborTable,
    operators: Vec<LocalOperator>,
    assembler: MomentAssembler,
    classifier: SurfaceClassifier,
    shifting: Shifting,
    poisson: PoissonSolver,
    positions: Vec<Vector>,
    frame: u64,
    last_report: SolveReport,
}

impl Simulation {
    /// Default scenario: a resting square block of fluid inside the wall box,
    /// laid out at the configured particle spacing.
    pub fn new(config: SimConfig) -> Result<Self, SimError> {
        config.validate()?;
        let spacing = config.particle_spacing;
        let side = ((BLOCK_EXTENT / spacing).round() as usize).max(1);
        let particles = ParticleSet::block(BLOCK_CENTER, side as Real * spacing, side);
        Self::with_particles(config, particles)
    }

    pub fn with_particles(config: SimConfig, particles: ParticleSet) -> Result<Self, SimError> {
        config.validate()?;

        let kernel = Kernel::new(config.method.kernel_shape(), config.re());
        let hash = SpatialHash::for_domain(
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
        )?;
        let reference = ReferenceDensity::lattice(&kernel, config.particle_spacing);

        let mut simulation = Self {
            kernel,
            particles,
            boundary,
            hash,
            table: NeighborTable::new(),
            operators: Vec::new(),
            assembler: MomentAssembler::from_config(&config),
            classifier: SurfaceClassifier::from_config(&config),
            shifting: Shifting::from_config(&config),
            poisson: PoissonSolver::new(&config, kernel, reference),
            positions: Vec::new(),
            frame: 0,
            last_report: SolveReport::default(),
            config,
        };
        simulation.refresh()?;

        info!(
            "{} simulation: {} particles, {} walls, n0 = {:.4}",
            simulation.config.method.name(),
            simulation.particles.len(),
            simulation.boundary.len(),
            reference.n0
        );
        Ok(simulation)
    }

    /// Advance one frame.
    pub fn step(&mut self) -> Result<StepReport, SimError> {
        let dt = self.config.dt;
        let mut clamped = self.advect(dt);
        self.refresh()?;
        self.shifting
            .apply(self.particles.particles_mut(), &self.table, dt);
        let solve = self.solve_pressure();
        clamped += self.project(dt);

        self.frame += 1;
        self.last_report = solve;

        let report = StepReport {
            frame: self.frame,
            solve,
            free_surface: self.particles.count_label(Label::FreeSurface),
            under_resolved: self.particles.iter().filter(|p| p.under_resolved).count(),
            clamped,
        };
        debug!("{:?}", report);
        Ok(report)
    }

    /// Explicit forces and advection, then confinement.
    fn advect(&mut self, dt: Real) -> usize {
        let gravity = self.config.gravity;
        let centering = self.config.centering_strength;
        let center = self.config.centering_point;
        let margin = CONFINE_MARGIN * self.config.particle_spacing;
        let mut clamped = 0;

        for particle in self.particles.iter_mut() {
            let acceleration = gravity + (center - particle.position) * centering;
            let velocity = particle.velocity + acceleration * dt;
            let confined = self
                .boundary
                .confine(particle.position + velocity * dt, velocity, margin);
            particle.position = confined.position;
            particle.predicted_velocity = confined.velocity;
            particle.velocity = confined.velocity;
            clamped += confined.clamped as usize;
        }
        clamped
    }

    /// Rebuild the hash, neighbor lists, local operators and labels.
    fn refresh(&mut self) -> Result<(), SimError> {
        self.particles.positions_into(&mut self.positions);
        self.hash.rebuild(&self.positions)?;
        self.table
            .rebuild(&self.positions, &self.hash, &self.boundary, &self.kernel);

        let lsmps = self.config.method == Method::Lsmps;
        self.operators.clear();
        for (i, particle) in self.particles.iter_mut().enumerate() {
            let fluid = self.table.fluid(i);
            let walls = self.table.walls(i);
            let operator = if lsmps {
                self.assembler.operator(fluid, walls, self.boundary.walls())
            } else {
                LocalOperator::default()
            };
            particle.number_density = number_density(fluid);
            particle.near_wall = !walls.is_empty();
            particle.under_resolved = lsmps && operator.under_resolved;
            self.operators.push(operator);
        }

        let n0 = self.poisson.reference().n0;
        self.classifier
            .classify(self.particles.particles_mut(), &self.table, n0);
        Ok(())
    }

    /// Assemble the pressure system for the current state without solving it.
    pub fn assemble_pressure_system(&self) -> PressureSystem {
        match self.config.method {
            Method::Lsmps => self.poisson.assemble_lsmps(
                self.particles.particles(),
                &self.table,
                &self.operators,
                self.boundary.walls(),
            ),
            Method::Mps => self
                .poisson
                .assemble_mps(self.particles.particles(), &self.table),
        }
    }

    fn solve_pressure(&mut self) -> SolveReport {
        let system = self.assemble_pressure_system();
        let (solution, report) = self.poisson.solve(&system);
        for (particle, &psi) in self.particles.iter_mut().zip(solution.iter()) {
            particle.pressure_impulse = psi;
        }
        if !report.converged {
            warn!(
                "pressure solve stopped after {} iterations (residual {:.3e})",
                report.iterations, report.residual
            );
        }
        report
    }

    /// Subtract the pressure gradient from velocity and position, add the
    /// shifting displacement and confine again.
    fn project(&mut self, dt: Real) -> usize {
        let particles = self.particles.particles();
        let gradients: Vec<Vector> = (0..particles.len())
            .map(|i| match self.config.method {
                Method::Lsmps => self.poisson.lsmps_gradient(
                    i,
                    particles,
                    &self.table,
                    &self.operators[i],
                    self.boundary.walls(),
                ),
                Method::Mps => self.poisson.mps_gradient(i, particles, &self.table),
            })
            .collect();

        let inv_density = 1.0 / self.config.density;
        let margin = CONFINE_MARGIN * self.config.particle_spacing;
        let mut clamped = 0;
        for (particle, gradient) in self.particles.iter_mut().zip(gradients) {
            let correction = gradient * inv_density;
            let velocity = particle.predicted_velocity - correction;
            let position = particle.position + (particle.shift_velocity - correction) * dt;
            let confined = self.boundary.confine(position, velocity, margin);
            particle.position = confined.position;
            particle.velocity = confined.velocity;
            clamped += confined.clamped as usize;
        }
        clamped
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    pub fn particles(&self) -> &ParticleSet {
        &self.particles
    }

    pub fn particles_mut(&mut self) -> &mut ParticleSet {
        &mut self.particles
    }

    pub fn boundary(&self) -> &BoundaryModel {
        &self.boundary
    }

    pub fn hash(&self) -> &SpatialHash {
        &self.hash
    }

    pub fn neighbor_table(&self) -> &NeighborTable {
        &self.table
    }

    pub fn operators(&self) -> &[LocalOperator] {
        &self.operators
    }

    pub fn reference_density(&self) -> ReferenceDensity {
        self.poisson.reference()
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn last_report(&self) -> SolveReport {
        self.last_report
    }

    pub fn positions(&self) -> Vec<Vector> {
        self.particles.positions()
    }

    pub fn labels(&self) -> Vec<Label> {
        self.particles.labels()
    }

    pub fn label_colors(&self) -> Vec<u32> {
        self.particles.iter().map(|particle| particle.label.color()).collect()
    }

    pub fn wall_positions(&self) -> Vec<Vector> {
        self.boundary.positions()
    }

    /// Pressure `p = ψ / dt` per particle.
    pub fn pressures(&self) -> Vec<Real> {
        let dt = self.config.dt;
        self.particles.iter().map(|particle| particle.pressure(dt)).collect()
    }

    /// Pressure at each wall particle, interpolated from nearby fluid
    /// particles; walls without enough fluid around them read zero.
    pub fn wall_pressures(&self) -> Vec<Real> {
        let dt = self.config.dt;
        let re2 = self.kernel.re * self.kernel.re;
        let mut samples = Vec::new();
        self.boundary
            .walls()
            .iter()
            .map(|wall| {
                samples.clear();
                for j in self.hash.neighbors_of(wall.position) {
                    let particle = &self.particles.particles()[j];
                    if (particle.position - wall.position).length_squared() < re2 {
                        samples.push((particle.position, particle.pressure(dt)));
                    }
                }
                self.assembler
                    .interpolate(&self.kernel, wall.position, &samples)
                    .unwrap_or(0.0)
            })
            .collect()
    }

    pub fn kinetic_energy(&self) -> Real {
        let volume = self.config.particle_spacing * self.config.particle_spacing;
        self.particles
            .iter()
            .map(|particle| particle.kinetic_energy(self.config.density, volume))
            .sum()
    }
}

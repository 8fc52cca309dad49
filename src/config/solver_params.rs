use bevy::prelude::*;

use super::constants::*;
use crate::core::kernel::KernelShape;
use crate::error::SimError;
use crate::math::{Real, Vector};

/// Which particle method drives the pressure projection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    /// Density-based MPS: number-density deviation source, `re/r - 1` kernel.
    Mps,
    /// Least-squares MPS: velocity-divergence source, `(1 - r/re)²` kernel.
    Lsmps,
}

impl Method {
    pub fn kernel_shape(self) -> KernelShape {
        match self {
            Method::Mps => KernelShape::InverseLinear,
            Method::Lsmps => KernelShape::Quadratic,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Method::Mps => "MPS",
            Method::Lsmps => "LSMPS",
        }
    }
}

/// Settings for the restarted GMRES pressure solve.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GmresSettings {
    pub restart: usize,
    pub max_iterations: usize,
    /// Relative residual `|b - Ax| / |b|` at which the solve stops.
    pub tolerance: Real,
}

impl Default for GmresSettings {
    fn default() -> Self {
        Self {
            restart: GMRES_RESTART,
            max_iterations: GMRES_MAX_ITERATIONS,
            tolerance: GMRES_TOLERANCE,
        }
    }
}

/// Simulation parameters. Defaults come from `config::constants`.
#[derive(Resource, Clone, Debug)]
pub struct SimConfig {
    pub method: Method,

    /// Initial particle spacing `l0`.
    pub particle_spacing: Real,
    /// Cutoff radius as a multiple of `l0`.
    pub cutoff_factor: Real,

    pub dt: Real,
    pub gravity: Vector,
    pub density: Real,
    /// MPS relaxation factor (gamma) applied to the density-deviation source.
    pub relaxation: Real,

    /// Weak spring pulling particles toward `centering_point` (0 disables it).
    pub centering_strength: Real,
    pub centering_point: Vector,

    /// Anti-clustering shifting coefficient (0 disables shifting).
    pub shifting_coefficient: Real,

    /// Estimate the velocity divergence with the upwind-gated kernel.
    pub upwind_divergence: bool,

    pub domain_min: Vector,
    pub domain_max: Vector,
    /// Hash cells along x; the cell size is `(domain_max.x - domain_min.x) / grid_resolution`.
    pub grid_resolution: usize,
    pub bucket_capacity: usize,

    pub bound_min: Vector,
    pub bound_max: Vector,
    pub walls_per_side: usize,

    pub gmres: GmresSettings,
}

impl Default for SimConfig {
    fn default() -> Self {
        let particle_spacing = BLOCK_EXTENT / BLOCK_SIDE as Real;
        let mut config = Self {
            method: Method::Lsmps,
            particle_spacing,
            cutoff_factor: CUTOFF_FACTOR,
            dt: TIME_STEP,
            gravity: GRAVITY,
            density: DENSITY,
            relaxation: RELAXATION,
            centering_strength: CENTERING_STRENGTH,
            centering_point: BLOCK_CENTER,
            shifting_coefficient: SHIFTING_COEFFICIENT,
            upwind_divergence: false,
            domain_min: DOMAIN_MIN,
            domain_max: DOMAIN_MAX,
            grid_resolution: 1,
            bucket_capacity: BUCKET_SIZE,
            bound_min: BOUND_MIN,
            bound_max: BOUND_MAX,
            walls_per_side: WALLS_PER_SIDE,
            gmres: GmresSettings::default(),
        };
        config.grid_resolution = config.fitted_grid_resolution();
        config
    }
}

impl SimConfig {
    /// Default configuration for the density-based MPS variant.
    pub fn mps() -> Self {
        Self::default().with_method(Method::Mps)
    }

    /// Default configuration for the least-squares MPS variant.
    pub fn lsmps() -> Self {
        Self::default().with_method(Method::Lsmps)
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_gravity(mut self, gravity: Vector) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn with_dt(mut self, dt: Real) -> Self {
        self.dt = dt;
        self
    }

    pub fn with_shifting(mut self, coefficient: Real) -> Self {
        self.shifting_coefficient = coefficient.max(0.0);
        self
    }

    pub fn with_centering(mut self, strength: Real, point: Vector) -> Self {
        self.centering_strength = strength;
        self.centering_point = point;
        self
    }

    pub fn with_upwind_divergence(mut self, enabled: bool) -> Self {
        self.upwind_divergence = enabled;
        self
    }

    /// Change `l0`, refitting the hash grid to the new cutoff radius.
    pub fn with_particle_spacing(mut self, spacing: Real) -> Self {
        self.particle_spacing = spacing;
        self.grid_resolution = self.fitted_grid_resolution();
        self
    }

    pub fn with_grid_resolution(mut self, resolution: usize) -> Self {
        self.grid_resolution = resolution;
        self
    }

    pub fn with_bucket_capacity(mut self, capacity: usize) -> Self {
        self.bucket_capacity = capacity;
        self
    }

    /// Cutoff radius `re`.
    #[inline]
    pub fn re(&self) -> Real {
        self.cutoff_factor * self.particle_spacing
    }

    /// Reference length `rs` used to normalize basis offsets.
    #[inline]
    pub fn rs(&self) -> Real {
        self.re() * 0.5
    }

    #[inline]
    pub fn cell_size(&self) -> Real {
        (self.domain_max.x - self.domain_min.x) / self.grid_resolution.max(1) as Real
    }

    pub fn grid_dims(&self) -> IVec2 {
        let cell = self.cell_size();
        IVec2::new(
            self.grid_resolution.max(1) as i32,
            ((self.domain_max.y - self.domain_min.y) / cell - 1.0e-9).ceil().max(1.0) as i32,
        )
    }

    /// Largest grid resolution whose cells are still at least `re` wide.
    pub fn fitted_grid_resolution(&self) -> usize {
        let extent = self.domain_max.x - self.domain_min.x;
        ((extent / self.re()).floor() as usize).max(1)
    }

    pub fn validate(&self) -> Result<(), SimError> {
        let invalid = |reason: &str| Err(SimError::InvalidConfig(reason.to_string()));

        if !(self.particle_spacing > 0.0) || !(self.cutoff_factor > 1.0) {
            return invalid("particle spacing must be positive and cutoff factor above 1");
        }
        if !(self.dt > 0.0) || !self.dt.is_finite() {
            return invalid("time step must be positive");
        }
        if !(self.density > 0.0) {
            return invalid("density must be positive");
        }
        if self.domain_max.x <= self.domain_min.x || self.domain_max.y <= self.domain_min.y {
            return invalid("domain is empty");
        }
        if self.bound_min.x < self.domain_min.x
            || self.bound_min.y < self.domain_min.y
            || self.bound_max.x > self.domain_max.x
            || self.bound_max.y > self.domain_max.y
            || self.bound_max.x <= self.bound_min.x
            || self.bound_max.y <= self.bound_min.y
        {
            return invalid("wall box must be non-empty and inside the hashed domain");
        }
        if self.cell_size() < self.re() {
            return invalid("hash cell size is smaller than the cutoff radius");
        }
        if self.bucket_capacity == 0 {
            return invalid("bucket capacity must be positive");
        }
        if self.walls_per_side == 0 {
            return invalid("at least one wall particle per side is required");
        }
        if self.gmres.restart == 0 || self.gmres.max_iterations == 0 {
            return invalid("GMRES restart and iteration limits must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_grid_covers_cutoff() {
        let config = SimConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.cell_size() >= config.re());
        assert_eq!(config.grid_dims(), IVec2::new(12, 12));
        assert!((config.rs() * 2.0 - config.re()).abs() < 1e-15);
    }

    #[test]
    fn too_fine_grid_is_rejected() {
        let config = SimConfig::default().with_grid_resolution(20);
        assert!(matches!(
            config.validate(),
            Err(SimError::InvalidConfig(_))
        ));
    }

    #[test]
    fn method_selects_kernel() {
        assert_eq!(SimConfig::mps().method.kernel_shape(), KernelShape::InverseLinear);
        assert_eq!(SimConfig::lsmps().method.kernel_shape(), KernelShape::Quadratic);
    }

    #[test]
    fn spacing_refits_grid() {
        let config = SimConfig::default().with_particle_spacing(0.0125);
        assert!(config.validate().is_ok());
        assert_eq!(config.grid_resolution, 25);
    }
}

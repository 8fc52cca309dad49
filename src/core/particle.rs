//! Fluid particles
//!
//! Particles carry position, velocity and the per-frame state produced by the
//! classification, shifting and pressure stages.

use crate::math::{Real, Vector, zero_vector};

/// Per-frame classification of a fluid particle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Label {
    #[default]
    Interior,
    /// Has at least one wall particle within the cutoff radius.
    NearWall,
    /// Angular neighbor coverage below the surface threshold.
    FreeSurface,
    /// Next to a free-surface particle with number density at or below `n0`.
    NearSurface,
}

impl Label {
    pub const ALL: [Label; 4] = [
        Label::Interior,
        Label::NearWall,
        Label::FreeSurface,
        Label::NearSurface,
    ];

    /// Display color as `0xRRGGBB`.
    pub fn color(self) -> u32 {
        match self {
            Label::Interior => 0xED553B,
            Label::NearWall => 0xF2B134,
            Label::FreeSurface => 0x068587,
            Label::NearSurface => 0x858706,
        }
    }

    /// Rows that receive the MPS surface diagonal term.
    pub fn is_surface(self) -> bool {
        matches!(self, Label::FreeSurface | Label::NearSurface)
    }
}

#[derive(Clone, Debug)]
pub struct Particle {
    pub position: Vector,
    pub velocity: Vector,
    /// Velocity after explicit forces, before projection (`v*`).
    pub predicted_velocity: Vector,
    /// Anti-clustering displacement per unit time for the current frame.
    pub shift_velocity: Vector,
    /// Pressure times time step (`p·dt`), the Poisson unknown.
    pub pressure_impulse: Real,
    pub number_density: Real,
    pub label: Label,
    pub near_wall: bool,
    /// Too few neighbors (or a singular moment matrix) for a local operator.
    pub under_resolved: bool,
}

impl Particle {
    pub fn zeroed() -> Self {
        Self {
            position: zero_vector(),
            velocity: zero_vector(),
            predicted_velocity: zero_vector(),
            shift_velocity: zero_vector(),
            pressure_impulse: 0.0,
            number_density: 0.0,
            label: Label::Interior,
            near_wall: false,
            under_resolved: false,
        }
    }

    pub fn new(position: Vector) -> Self {
        Self {
            position,
            ..Self::zeroed()
        }
    }

    pub fn with_velocity(mut self, velocity: Vector) -> Self {
        self.velocity = velocity;
        self
    }

    #[inline]
    pub fn pressure(&self, dt: Real) -> Real {
        self.pressure_impulse / dt
    }

    #[inline]
    pub fn kinetic_energy(&self, density: Real, volume: Real) -> Real {
        0.5 * density * volume * self.velocity.length_squared()
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.velocity.is_finite() && self.pressure_impulse.is_finite()
    }
}

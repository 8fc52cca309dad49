use crate::config::{MAX_SHIFT_FRACTION, SimConfig};
use crate::core::{Label, Particle};
use crate::math::{Real, Vector, zero_vector};
use crate::solver::neighbors::{Neighbor, NeighborTable};

/// Anti-clustering displacement `Δx = -C l0² Σ W r / |r|²`, clamped to a
/// fraction of `l0`.
#[derive(Clone, Copy, Debug)]
pub struct Shifting {
    pub coefficient: Real,
    pub spacing: Real,
    pub max_shift: Real,
}

impl Shifting {
    pub fn new(coefficient: Real, spacing: Real) -> Self {
        Self {
            coefficient,
            spacing,
            max_shift: MAX_SHIFT_FRACTION * spacing,
        }
    }

    pub fn from_config(config: &SimConfig) -> Self {
        Self::new(config.shifting_coefficient, config.particle_spacing)
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.coefficient > 0.0
    }

    pub fn displacement(&self, neighbors: &[Neighbor]) -> Vector {
        let mut sum = zero_vector();
        for neighbor in neighbors {
            sum += neighbor.offset * (neighbor.weight / (neighbor.distance * neighbor.distance));
        }
        let shift = sum * (-self.coefficient * self.spacing * self.spacing);
        shift.clamp_length_max(self.max_shift)
    }

    /// Store `Δx / dt` as each particle's shifting velocity. Free-surface
    /// particles are not shifted.
    pub fn apply(&self, particles: &mut [Particle], table: &NeighborTable, dt: Real) {
        for (i, particle) in particles.iter_mut().enumerate() {
            particle.shift_velocity = if self.is_enabled() && particle.label != Label::FreeSurface {
                self.displacement(table.fluid(i)) / dt
            } else {
                zero_vector()
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::math::DVec2;

    fn neighbor(offset: DVec2, weight: Real) -> Neighbor {
        Neighbor {
            index: 0,
            offset,
            distance: offset.length(),
            weight,
        }
    }

    #[test]
    fn symmetric_neighborhood_does_not_shift() {
        let shifting = Shifting::new(0.01, 0.025);
        let neighbors = [
            neighbor(DVec2::new(0.025, 0.0), 0.5),
            neighbor(DVec2::new(-0.025, 0.0), 0.5),
            neighbor(DVec2::new(0.0, 0.025), 0.5),
            neighbor(DVec2::new(0.0, -0.025), 0.5),
        ];
        assert!(shifting.displacement(&neighbors).length() < 1e-15);
    }

    #[test]
    fn pushes_away_from_close_neighbor_and_clamps() {
        let shifting = Shifting::new(0.01, 0.025);
        let d = shifting.displacement(&[neighbor(DVec2::new(0.01, 0.0), 0.6)]);
        assert!(d.x < 0.0 && d.y == 0.0);

        let strong = Shifting::new(100.0, 0.025);
        let d = strong.displacement(&[neighbor(DVec2::new(0.01, 0.0), 0.6)]);
        assert!((d.length() - strong.max_shift).abs() < 1e-12);
    }
}

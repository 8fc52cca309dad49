//! Number density, free-surface detection and per-frame labels.

use std::f64::consts::PI;

use crate::config::{ANGULAR_BUCKETS, SURFACE_COVERAGE_THRESHOLD, SimConfig};
use crate::core::{Kernel, Label, Particle};
use crate::math::{Real, Vector};
use crate::solver::neighbors::{Neighbor, NeighborTable};

/// Number density `n0` and the Laplacian normalization `λ0` of a perfect
/// lattice at the initial spacing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReferenceDensity {
    pub n0: Real,
    pub lambda0: Real,
}

impl ReferenceDensity {
    pub fn lattice(kernel: &Kernel, spacing: Real) -> Self {
        let reach = (kernel.re / spacing).ceil() as i32;
        let mut n0 = 0.0;
        let mut moment = 0.0;
        for i in -reach..=reach {
            for j in -reach..=reach {
                if i == 0 && j == 0 {
                    continue;
                }
                let offset = Vector::new(i as Real, j as Real) * spacing;
                let distance = offset.length();
                let weight = kernel.weight(distance);
                n0 += weight;
                moment += offset.length_squared() * weight;
            }
        }
        let lambda0 = if n0 > 0.0 { moment / n0 } else { 0.0 };
        Self { n0, lambda0 }
    }
}

/// `Σ W` over fluid neighbors.
#[inline]
pub fn number_density(neighbors: &[Neighbor]) -> Real {
    neighbors.iter().map(|neighbor| neighbor.weight).sum()
}

#[derive(Clone, Copy, Debug)]
pub struct SurfaceClassifier {
    spacing: Real,
    buckets: usize,
    threshold: Real,
}

impl SurfaceClassifier {
    pub fn new(spacing: Real) -> Self {
        Self {
            spacing,
            buckets: ANGULAR_BUCKETS,
            threshold: SURFACE_COVERAGE_THRESHOLD,
        }
    }

    pub fn from_config(config: &SimConfig) -> Self {
        Self::new(config.particle_spacing)
    }

    /// Fraction of the angular histogram shadowed by fluid and wall neighbors.
    pub fn coverage(&self, fluid: &[Neighbor], walls: &[Neighbor]) -> Real {
        let mut screen = vec![false; self.buckets];
        for neighbor in fluid.iter().chain(walls) {
            self.shadow(&mut screen, neighbor.offset);
        }
        let covered = screen.iter().filter(|&&hit| hit).count();
        covered as Real / self.buckets as Real
    }

    pub fn is_free_surface(&self, fluid: &[Neighbor], walls: &[Neighbor]) -> bool {
        self.coverage(fluid, walls) < self.threshold
    }

    /// Mark the arc hidden behind a particle of diameter `l0` at `offset`.
    fn shadow(&self, screen: &mut [bool], offset: Vector) {
        let half = 0.5 * self.spacing;
        let distance2 = offset.length_squared();
        let theta = (offset.y.atan2(offset.x) + PI).to_degrees();
        let half_width = if distance2 <= half * half {
            90.0
        } else {
            half.atan2((distance2 - half * half).sqrt()).to_degrees()
        };

        let per_degree = self.buckets as Real / 360.0;
        let low = ((theta - half_width) * per_degree).floor() as i64;
        let width = (2.0 * half_width * per_degree) as i64;
        let buckets = self.buckets as i64;
        for k in 0..width {
            screen[(low + k).rem_euclid(buckets) as usize] = true;
        }
    }

    /// Assign a label to every particle.
    ///
    /// Expects `number_density`, `near_wall` and `under_resolved` to be up to
    /// date for the current frame.
    pub fn classify(&self, particles: &mut [Particle], table: &NeighborTable, n0: Real) {
        for (i, particle) in particles.iter_mut().enumerate() {
            particle.label = if particle.under_resolved
                || self.is_free_surface(table.fluid(i), table.walls(i))
            {
                Label::FreeSurface
            } else {
                Label::Interior
            };
        }

        for i in 0..particles.len() {
            if particles[i].label == Label::FreeSurface {
                continue;
            }
            let touches_surface = table
                .fluid(i)
                .iter()
                .any(|neighbor| particles[neighbor.index].label == Label::FreeSurface);
            let particle = &mut particles[i];
            particle.label = if touches_surface && particle.number_density <= n0 {
                Label::NearSurface
            } else if particle.near_wall {
                Label::NearWall
            } else {
                Label::Interior
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BoundaryModel, KernelShape, ParticleSet, SpatialHash};
    use bevy::math::DVec2;

    const L0: Real = 0.025;

    fn neighbor(offset: DVec2) -> Neighbor {
        Neighbor {
            index: 0,
            offset,
            distance: offset.length(),
            weight: 1.0,
        }
    }

    fn ring(directions: impl Iterator<Item = (i32, i32)>) -> Vec<Neighbor> {
        directions
            .map(|(i, j)| neighbor(DVec2::new(i as Real, j as Real) * L0))
            .collect()
    }

    #[test]
    fn surrounded_particle_is_covered() {
        let classifier = SurfaceClassifier::new(L0);
        let all = (-1..=1).flat_map(|i| (-1..=1).map(move |j| (i, j))).filter(|&d| d != (0, 0));
        let neighbors = ring(all);
        assert_eq!(classifier.coverage(&neighbors, &[]), 1.0);
        assert!(!classifier.is_free_surface(&neighbors, &[]));
    }

    #[test]
    fn one_sided_particle_is_free_surface() {
        let classifier = SurfaceClassifier::new(L0);
        let half = (-1..=1).flat_map(|i| (-1..=0).map(move |j| (i, j))).filter(|&d| d != (0, 0));
        let neighbors = ring(half);
        assert!(classifier.coverage(&neighbors, &[]) < 5.0 / 6.0);
        assert!(classifier.is_free_surface(&neighbors, &[]));
    }

    #[test]
    fn arcs_wrap_around_zero_degrees() {
        let classifier = SurfaceClassifier::new(L0);
        // atan2 + π puts a neighbor on -x at 0°, so its arc straddles the seam.
        let coverage = classifier.coverage(&[neighbor(DVec2::new(-L0, 1e-9))], &[]);
        assert!((coverage - 60.0 / 360.0).abs() < 2.0 / 360.0);
    }

    #[test]
    fn very_close_neighbor_hides_half_the_circle() {
        let classifier = SurfaceClassifier::new(L0);
        let coverage = classifier.coverage(&[neighbor(DVec2::new(0.2 * L0, 0.0))], &[]);
        assert!((coverage - 0.5).abs() < 1e-12);
    }

    #[test]
    fn lattice_reference_density() {
        let kernel = Kernel::new(KernelShape::Quadratic, 3.1 * L0);
        let reference = ReferenceDensity::lattice(&kernel, L0);
        assert!(reference.n0 > 0.0);
        assert!(reference.lambda0 > 0.0 && reference.lambda0 < kernel.re * kernel.re);
    }

    #[test]
    fn block_labels() {
        let kernel = Kernel::new(KernelShape::Quadratic, 3.1 * L0);
        let mut set = ParticleSet::block(DVec2::splat(0.5), 0.5, 20);
        let mut hash = SpatialHash::for_domain(DVec2::ZERO, DVec2::ONE, 12, 64);
        let boundary = BoundaryModel::rectangle(
            DVec2::splat(0.05),
            DVec2::splat(0.95),
            36,
            hash.clone(),
        )
        .unwrap();
        let positions = set.positions();
        hash.rebuild(&positions).unwrap();
        let mut table = NeighborTable::new();
        table.rebuild(&positions, &hash, &boundary, &kernel);

        let reference = ReferenceDensity::lattice(&kernel, L0);
        for (i, particle) in set.particles_mut().iter_mut().enumerate() {
            particle.number_density = number_density(table.fluid(i));
        }
        SurfaceClassifier::new(L0).classify(set.particles_mut(), &table, reference.n0);

        // Corner and edge particles face open space; the center is enclosed.
        assert_eq!(set.particles()[0].label, Label::FreeSurface);
        assert_eq!(set.particles()[10].label, Label::FreeSurface);
        assert_eq!(set.particles()[10 * 20 + 10].label, Label::Interior);
        assert_eq!(set.particles()[20 + 10].label, Label::NearSurface);
        assert_eq!(set.count_label(Label::NearWall), 0);
    }
}

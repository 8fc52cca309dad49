use rand::Rng;

use crate::core::Particle;
use crate::core::particle::Label;
use crate::math::{Real, Vector};

/// Owner of every fluid particle. The particle count is fixed once the
/// simulation starts; indices stay valid for the whole run.
#[derive(Clone, Default)]
pub struct ParticleSet {
    particles: Vec<Particle>,
}

impl ParticleSet {
    pub fn new() -> Self {
        Self {
            particles: Vec::new(),
        }
    }

    /// `side × side` particles on a square lattice of spacing `extent / side`,
    /// centered on `center`.
    pub fn block(center: Vector, extent: Real, side: usize) -> Self {
        let spacing = extent / side as Real;
        let origin = center - Vector::splat(extent * 0.5);
        let mut particles = Vec::with_capacity(side * side);
        for i in 0..side {
            for j in 0..side {
                let offset = Vector::new(i as Real, j as Real) * spacing;
                particles.push(Particle::new(origin + offset));
            }
        }
        Self { particles }
    }

    /// Displace every particle by a uniform random offset in `[-amplitude, amplitude]²`.
    pub fn jitter<R: Rng>(&mut self, rng: &mut R, amplitude: Real) {
        if amplitude <= 0.0 {
            return;
        }
        for particle in self.particles.iter_mut() {
            particle.position += Vector::new(
                rng.random_range(-amplitude..=amplitude),
                rng.random_range(-amplitude..=amplitude),
            );
        }
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Particle> {
        self.particles.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Particle> {
        self.particles.iter_mut()
    }

    pub fn push(&mut self, particle: Particle) -> usize {
        let index = self.particles.len();
        self.particles.push(particle);
        index
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn particles_mut(&mut self) -> &mut [Particle] {
        &mut self.particles
    }

    pub fn get(&self, index: usize) -> Option<&Particle> {
        self.particles.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Particle> {
        self.particles.get_mut(index)
    }

    /// Copy every position into `out`, replacing its contents.
    pub fn positions_into(&self, out: &mut Vec<Vector>) {
        out.clear();
        out.extend(self.particles.iter().map(|particle| particle.position));
    }

    pub fn positions(&self) -> Vec<Vector> {
        self.particles.iter().map(|particle| particle.position).collect()
    }

    pub fn labels(&self) -> Vec<Label> {
        self.particles.iter().map(|particle| particle.label).collect()
    }

    pub fn count_label(&self, label: Label) -> usize {
        self.particles
            .iter()
            .filter(|particle| particle.label == label)
            .count()
    }

    pub fn all_finite(&self) -> bool {
        self.particles.iter().all(Particle::is_finite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::math::DVec2;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn block_layout_matches_lattice() {
        let set = ParticleSet::block(DVec2::splat(0.5), 0.5, 20);
        assert_eq!(set.len(), 400);
        let first = set.particles()[0].position;
        let last = set.particles()[399].position;
        assert!((first - DVec2::splat(0.25)).length() < 1e-12);
        assert!((last - DVec2::splat(0.725)).length() < 1e-12);
        // Row-major in x: index i * side + j has x from i and y from j.
        let p = set.particles()[21].position;
        assert!((p - DVec2::new(0.275, 0.275)).length() < 1e-12);
    }

    #[test]
    fn jitter_is_bounded() {
        let mut set = ParticleSet::block(DVec2::splat(0.5), 0.5, 10);
        let before = set.positions();
        let mut rng = StdRng::seed_from_u64(7);
        set.jitter(&mut rng, 0.01);
        for (a, b) in before.iter().zip(set.positions()) {
            let d = b - *a;
            assert!(d.x.abs() <= 0.01 && d.y.abs() <= 0.01);
        }
    }

    #[test]
    fn positions_into_reuses_buffer() {
        let set = ParticleSet::block(DVec2::splat(0.5), 0.2, 2);
        let mut buffer = vec![DVec2::ZERO; 10];
        set.positions_into(&mut buffer);
        assert_eq!(buffer.len(), 4);
        assert_eq!(set.count_label(Label::Interior), 4);
    }
}

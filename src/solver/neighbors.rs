//! Per-frame neighbor lists.
//!
//! Every stage after the hash rebuild walks the same pairs, so they are
//! gathered once into flat arrays with a start offset per particle.

use crate::core::{BoundaryModel, Kernel, SpatialHash};
use crate::math::{Real, Vector, is_coincident};

/// One pair `(i, j)` seen from particle `i`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    /// `x_j - x_i`
    pub offset: Vector,
    pub distance: Real,
    pub weight: Real,
}

#[derive(Clone, Debug, Default)]
pub struct NeighborTable {
    fluid: Vec<Neighbor>,
    fluid_starts: Vec<usize>,
    walls: Vec<Neighbor>,
    wall_starts: Vec<usize>,
}

impl NeighborTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect every fluid and wall neighbor strictly inside `kernel.re`.
    ///
    /// Self pairs and coincident pairs are dropped. The fluid hash must
    /// already hold `positions`.
    pub fn rebuild(
        &mut self,
        positions: &[Vector],
        hash: &SpatialHash,
        boundary: &BoundaryModel,
        kernel: &Kernel,
    ) {
        let re = kernel.re;
        let re2 = re * re;

        self.fluid.clear();
        self.walls.clear();
        self.fluid_starts.clear();
        self.wall_starts.clear();

        for (i, &position) in positions.iter().enumerate() {
            self.fluid_starts.push(self.fluid.len());
            for j in hash.neighbors_of(position) {
                if j == i {
                    continue;
                }
                let offset = positions[j] - position;
                let distance2 = offset.length_squared();
                if distance2 >= re2 || is_coincident(offset) {
                    continue;
                }
                let distance = distance2.sqrt();
                self.fluid.push(Neighbor {
                    index: j,
                    offset,
                    distance,
                    weight: kernel.weight(distance),
                });
            }

            self.wall_starts.push(self.walls.len());
            for (k, offset) in boundary.within(position, re) {
                if is_coincident(offset) {
                    continue;
                }
                let distance = offset.length();
                self.walls.push(Neighbor {
                    index: k,
                    offset,
                    distance,
                    weight: kernel.weight(distance),
                });
            }
        }
        self.fluid_starts.push(self.fluid.len());
        self.wall_starts.push(self.walls.len());
    }

    pub fn len(&self) -> usize {
        self.fluid_starts.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn fluid(&self, i: usize) -> &[Neighbor] {
        &self.fluid[self.fluid_starts[i]..self.fluid_starts[i + 1]]
    }

    #[inline]
    pub fn walls(&self, i: usize) -> &[Neighbor] {
        &self.walls[self.wall_starts[i]..self.wall_starts[i + 1]]
    }

    pub fn pair_count(&self) -> usize {
        self.fluid.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{KernelShape, WallParticle};
    use bevy::math::DVec2;

    fn setup() -> (SpatialHash, BoundaryModel, Kernel) {
        let hash = SpatialHash::for_domain(DVec2::ZERO, DVec2::ONE, 10, 16);
        let walls = vec![WallParticle {
            position: DVec2::new(0.5, 0.05),
            normal: DVec2::Y,
        }];
        let boundary = BoundaryModel::from_walls(
            walls,
            DVec2::splat(0.05),
            DVec2::splat(0.95),
            hash.clone(),
        )
        .unwrap();
        (hash, boundary, Kernel::new(KernelShape::Quadratic, 0.1))
    }

    #[test]
    fn pairs_are_symmetric_and_cut_off() {
        let (mut hash, boundary, kernel) = setup();
        let positions = vec![
            DVec2::new(0.5, 0.5),
            DVec2::new(0.55, 0.5),
            DVec2::new(0.5, 0.65),
            DVec2::new(0.5, 0.5),
        ];
        hash.rebuild(&positions).unwrap();
        let mut table = NeighborTable::new();
        table.rebuild(&positions, &hash, &boundary, &kernel);

        assert_eq!(table.len(), 4);
        // The coincident copy at index 3 is skipped.
        let first: Vec<usize> = table.fluid(0).iter().map(|n| n.index).collect();
        assert_eq!(first, vec![1]);
        assert_eq!(table.fluid(1)[0].index, 0);
        assert!((table.fluid(1)[0].offset + table.fluid(0)[0].offset).length() < 1e-15);
        assert!(table.fluid(2).is_empty());
        assert!((table.fluid(0)[0].weight - 0.25).abs() < 1e-12);
    }

    #[test]
    fn walls_are_collected_separately() {
        let (mut hash, boundary, kernel) = setup();
        let positions = vec![DVec2::new(0.5, 0.1), DVec2::new(0.5, 0.5)];
        hash.rebuild(&positions).unwrap();
        let mut table = NeighborTable::new();
        table.rebuild(&positions, &hash, &boundary, &kernel);
        assert_eq!(table.walls(0).len(), 1);
        assert!((table.walls(0)[0].offset - DVec2::new(0.0, -0.05)).length() < 1e-12);
        assert!(table.walls(1).is_empty());
    }
}

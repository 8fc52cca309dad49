//! Static wall particles
//!
//! Walls are discrete points with a unit normal pointing out of the wall and
//! into the fluid. They never move; their hash is built once at setup.

use crate::core::spatial_hash::SpatialHash;
use crate::error::SimError;
use crate::math::{Real, Vector};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WallParticle {
    pub position: Vector,
    pub normal: Vector,
}

/// Result of pushing a particle back inside the wall box.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Confinement {
    pub position: Vector,
    pub velocity: Vector,
    pub clamped: bool,
}

#[derive(Clone, Debug)]
pub struct BoundaryModel {
    walls: Vec<WallParticle>,
    bound_min: Vector,
    bound_max: Vector,
    hash: SpatialHash,
}

impl BoundaryModel {
    /// Four walls of `per_side` particles each around `[min, max]`.
    ///
    /// Walls are laid counter-clockwise starting on the bottom edge, each
    /// particle at the center of its segment.
    pub fn rectangle(min: Vector, max: Vector, per_side: usize, hash: SpatialHash) -> Result<Self, SimError> {
        let step_x = (max.x - min.x) / per_side as Real;
        let step_y = (max.y - min.y) / per_side as Real;

        let sides = [
            // bottom, right, top, left
            (Vector::new(min.x + step_x * 0.5, min.y), Vector::X * step_x, Vector::Y),
            (Vector::new(max.x, min.y + step_y * 0.5), Vector::Y * step_y, Vector::NEG_X),
            (Vector::new(max.x - step_x * 0.5, max.y), Vector::NEG_X * step_x, Vector::NEG_Y),
            (Vector::new(min.x, max.y - step_y * 0.5), Vector::NEG_Y * step_y, Vector::X),
        ];

        let mut walls = Vec::with_capacity(per_side * 4);
        for (start, step, normal) in sides {
            for i in 0..per_side {
                walls.push(WallParticle {
                    position: start + step * i as Real,
                    normal,
                });
            }
        }

        Self::from_walls(walls, min, max, hash)
    }

    pub fn from_walls(
        walls: Vec<WallParticle>,
        bound_min: Vector,
        bound_max: Vector,
        mut hash: SpatialHash,
    ) -> Result<Self, SimError> {
        let positions: Vec<Vector> = walls.iter().map(|wall| wall.position).collect();
        hash.rebuild(&positions)?;
        Ok(Self {
            walls,
            bound_min,
            bound_max,
            hash,
        })
    }

    pub fn walls(&self) -> &[WallParticle] {
        &self.walls
    }

    pub fn len(&self) -> usize {
        self.walls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.walls.is_empty()
    }

    pub fn positions(&self) -> Vec<Vector> {
        self.walls.iter().map(|wall| wall.position).collect()
    }

    pub fn bounds(&self) -> (Vector, Vector) {
        (self.bound_min, self.bound_max)
    }

    /// Wall particles within `radius` of `position`, as `(index, offset)` with
    /// `offset = wall - position`.
    pub fn within<'a>(
        &'a self,
        position: Vector,
        radius: Real,
    ) -> impl Iterator<Item = (usize, Vector)> + 'a {
        let radius2 = radius * radius;
        self.hash
            .neighbors_of(position)
            .map(move |k| (k, self.walls[k].position - position))
            .filter(move |(_, offset)| offset.length_squared() < radius2)
    }

    /// Clamp `position` into the box shrunk by `margin`, dropping the velocity
    /// component that pushed it through a wall.
    pub fn confine(&self, position: Vector, velocity: Vector, margin: Real) -> Confinement {
        let lo = self.bound_min + Vector::splat(margin);
        let hi = self.bound_max - Vector::splat(margin);
        let mut result = Confinement {
            position,
            velocity,
            clamped: false,
        };

        if position.x < lo.x {
            result.position.x = lo.x;
            result.velocity.x = result.velocity.x.max(0.0);
            result.clamped = true;
        } else if position.x > hi.x {
            result.position.x = hi.x;
            result.velocity.x = result.velocity.x.min(0.0);
            result.clamped = true;
        }

        if position.y < lo.y {
            result.position.y = lo.y;
            result.velocity.y = result.velocity.y.max(0.0);
            result.clamped = true;
        } else if position.y > hi.y {
            result.position.y = hi.y;
            result.velocity.y = result.velocity.y.min(0.0);
            result.clamped = true;
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::math::DVec2;

    fn unit_box(per_side: usize) -> BoundaryModel {
        let hash = SpatialHash::for_domain(DVec2::ZERO, DVec2::ONE, 10, 32);
        BoundaryModel::rectangle(DVec2::splat(0.05), DVec2::splat(0.95), per_side, hash).unwrap()
    }

    #[test]
    fn rectangle_places_walls_on_edges() {
        let model = unit_box(30);
        assert_eq!(model.len(), 120);
        for wall in model.walls() {
            let p = wall.position;
            let on_edge = (p.x - 0.05).abs() < 1e-12
                || (p.x - 0.95).abs() < 1e-12
                || (p.y - 0.05).abs() < 1e-12
                || (p.y - 0.95).abs() < 1e-12;
            assert!(on_edge, "{p:?} not on an edge");
            assert!((wall.normal.length() - 1.0).abs() < 1e-12);
            // Normals point into the box.
            let inward = (DVec2::splat(0.5) - p).dot(wall.normal);
            assert!(inward > 0.0);
        }
        let first = model.walls()[0].position;
        assert!((first - DVec2::new(0.065, 0.05)).length() < 1e-12);
    }

    #[test]
    fn within_finds_nearby_walls_only() {
        let model = unit_box(30);
        let near: Vec<_> = model.within(DVec2::new(0.5, 0.06), 0.05).collect();
        assert!(!near.is_empty());
        for (k, offset) in &near {
            assert!(offset.length() < 0.05);
            assert_eq!(model.walls()[*k].normal, DVec2::Y);
        }
        assert_eq!(model.within(DVec2::new(0.5, 0.5), 0.05).count(), 0);
    }

    #[test]
    fn confine_clamps_and_removes_inward_velocity() {
        let model = unit_box(10);
        let result = model.confine(DVec2::new(0.02, 0.5), DVec2::new(-1.0, 0.3), 0.01);
        assert!(result.clamped);
        assert_eq!(result.position, DVec2::new(0.06, 0.5));
        assert_eq!(result.velocity, DVec2::new(0.0, 0.3));

        let inside = model.confine(DVec2::new(0.5, 0.5), DVec2::new(-1.0, 0.3), 0.01);
        assert!(!inside.clamped);
        assert_eq!(inside.velocity, DVec2::new(-1.0, 0.3));
    }
}

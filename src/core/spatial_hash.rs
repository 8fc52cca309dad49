//! Fixed-capacity uniform grid for fixed-radius neighbor queries.
//!
//! Buckets live in one flat arena of `cells × capacity` index slots. Rebuilds
//! insert particles in index order, so bucket contents are stable between two
//! rebuilds of the same positions.

use bevy::prelude::IVec2;

use crate::error::SimError;
use crate::math::{Cell, Real, Vector};

pub const NEIGHBOR_COUNT: usize = 9;

pub const COORD_OFFSETS: [IVec2; NEIGHBOR_COUNT] = [
    IVec2::new(-1, -1),
    IVec2::new(0, -1),
    IVec2::new(1, -1),
    IVec2::new(-1, 0),
    IVec2::new(0, 0),
    IVec2::new(1, 0),
    IVec2::new(-1, 1),
    IVec2::new(0, 1),
    IVec2::new(1, 1),
];

#[derive(Clone, Debug)]
pub struct SpatialHash {
    origin: Vector,
    cell_size: Real,
    dims: IVec2,
    capacity: usize,
    counts: Vec<u32>,
    slots: Vec<u32>,
}

impl SpatialHash {
    pub fn new(origin: Vector, cell_size: Real, dims: IVec2, capacity: usize) -> Self {
        let cell_count = (dims.x.max(1) * dims.y.max(1)) as usize;
        Self {
            origin,
            cell_size,
            dims: dims.max(IVec2::ONE),
            capacity,
            counts: vec![0; cell_count],
            slots: vec![u32::MAX; cell_count * capacity],
        }
    }

    /// Square grid of `resolution × resolution` cells over `[min, max]`.
    pub fn for_domain(min: Vector, max: Vector, resolution: usize, capacity: usize) -> Self {
        let cell_size = (max.x - min.x) / resolution.max(1) as Real;
        let rows = ((max.y - min.y) / cell_size - 1.0e-9).ceil().max(1.0) as i32;
        Self::new(
            min,
            cell_size,
            IVec2::new(resolution.max(1) as i32, rows),
            capacity,
        )
    }

    #[inline]
    pub fn cell_size(&self) -> Real {
        self.cell_size
    }

    #[inline]
    pub fn dims(&self) -> IVec2 {
        self.dims
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn cell_count(&self) -> usize {
        self.counts.len()
    }

    /// Unchecked cell coordinate (floor semantics); may lie outside the grid.
    #[inline]
    pub fn raw_cell(&self, position: Vector) -> Cell {
        let scaled = (position - self.origin) / self.cell_size;
        IVec2::new(scaled.x.floor() as i32, scaled.y.floor() as i32)
    }

    #[inline]
    pub fn contains(&self, cell: Cell) -> bool {
        cell.x >= 0 && cell.x < self.dims.x && cell.y >= 0 && cell.y < self.dims.y
    }

    /// Cell holding `position`, or a `DomainViolation` attributed to `particle`.
    pub fn checked_cell(&self, particle: usize, position: Vector) -> Result<Cell, SimError> {
        let cell = self.raw_cell(position);
        if !position.is_finite() || !self.contains(cell) {
            return Err(SimError::DomainViolation { particle, cell });
        }
        Ok(cell)
    }

    #[inline]
    fn linear(&self, cell: Cell) -> usize {
        (cell.y * self.dims.x + cell.x) as usize
    }

    pub fn clear(&mut self) {
        self.counts.iter_mut().for_each(|count| *count = 0);
    }

    /// Clear every bucket and insert all positions, in index order.
    pub fn rebuild(&mut self, positions: &[Vector]) -> Result<(), SimError> {
        self.clear();
        for (index, &position) in positions.iter().enumerate() {
            let cell = self.checked_cell(index, position)?;
            self.insert(index, cell)?;
        }
        Ok(())
    }

    fn insert(&mut self, index: usize, cell: Cell) -> Result<(), SimError> {
        let linear = self.linear(cell);
        let count = self.counts[linear] as usize;
        if count >= self.capacity {
            return Err(SimError::BucketOverflow {
                cell,
                capacity: self.capacity,
            });
        }
        self.slots[linear * self.capacity + count] = index as u32;
        self.counts[linear] += 1;
        Ok(())
    }

    /// Particle indices stored in `cell`; empty outside the grid.
    pub fn bucket(&self, cell: Cell) -> &[u32] {
        if !self.contains(cell) {
            return &[];
        }
        let linear = self.linear(cell);
        let start = linear * self.capacity;
        &self.slots[start..start + self.counts[linear] as usize]
    }

    /// Union of the 3×3 block of buckets around `cell`, clipped to the grid.
    pub fn neighbors(&self, cell: Cell) -> impl Iterator<Item = usize> + '_ {
        COORD_OFFSETS
            .iter()
            .flat_map(move |&offset| self.bucket(cell + offset).iter())
            .map(|&index| index as usize)
    }

    /// Neighborhood of the cell containing `position`; empty if it lies outside.
    pub fn neighbors_of(&self, position: Vector) -> impl Iterator<Item = usize> + '_ {
        let cell = self.raw_cell(position);
        let valid = position.is_finite();
        COORD_OFFSETS
            .iter()
            .filter(move |_| valid)
            .flat_map(move |&offset| self.bucket(cell + offset).iter())
            .map(|&index| index as usize)
    }

    pub fn occupied_cells(&self) -> usize {
        self.counts.iter().filter(|&&count| count > 0).count()
    }

    pub fn max_occupancy(&self) -> usize {
        self.counts.iter().copied().max().unwrap_or(0) as usize
    }
}

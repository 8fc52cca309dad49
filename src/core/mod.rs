pub mod boundary;
pub mod kernel;
pub mod particle;
pub mod particle_set;
pub mod spatial_hash;

pub use boundary::{BoundaryModel, Confinement, WallParticle};
pub use kernel::{Kernel, KernelShape, basis, basis_with_constant, boundary_basis, scaling};
pub use particle::{Label, Particle};
pub use particle_set::ParticleSet;
pub use spatial_hash::{COORD_OFFSETS, NEIGHBOR_COUNT, SpatialHash};

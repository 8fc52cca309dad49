// src/solver/mod.rs
pub mod moments;
pub mod neighbors;
pub mod poisson;
pub mod shifting;
pub mod sparse;
pub mod surface;

pub use moments::{LocalOperator, MomentAssembler};
pub use neighbors::{Neighbor, NeighborTable};
pub use poisson::{PoissonSolver, PressureSystem};
pub use shifting::Shifting;
pub use sparse::{CsrMatrix, Gmres, SolveReport, TripletBuilder};
pub use surface::{ReferenceDensity, SurfaceClassifier, number_density};

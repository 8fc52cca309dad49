//! Configuration and parameters
//!
//! Compile-time constants and the simulation settings built from them.

pub mod constants;
pub mod solver_params;

pub use constants::*;
pub use solver_params::*;

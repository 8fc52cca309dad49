// Compile-time configuration for the default falling-block scenario
use bevy::math::DVec2;

// Initial fluid block: BLOCK_SIDE x BLOCK_SIDE particles filling a square of BLOCK_EXTENT
pub const BLOCK_SIDE: usize = 20;
pub const BLOCK_EXTENT: f64 = 0.5;
pub const BLOCK_CENTER: DVec2 = DVec2::new(0.5, 0.5);

// Cutoff radius re = CUTOFF_FACTOR * l0, reference length rs = re / 2
pub const CUTOFF_FACTOR: f64 = 3.1;

// Hashed domain and the wall box inside it
pub const DOMAIN_MIN: DVec2 = DVec2::new(0.0, 0.0);
pub const DOMAIN_MAX: DVec2 = DVec2::new(1.0, 1.0);
pub const BOUND_MIN: DVec2 = DVec2::new(0.05, 0.05);
pub const BOUND_MAX: DVec2 = DVec2::new(0.95, 0.95);
pub const WALLS_PER_SIDE: usize = 36;

// Neighbor search
pub const BUCKET_SIZE: usize = 64;

// Time integration and physics
pub const TIME_STEP: f64 = 2.0e-3;
pub const GRAVITY: DVec2 = DVec2::new(0.0, -9.8);
pub const DENSITY: f64 = 1.0;
pub const RELAXATION: f64 = 0.2;
pub const CENTERING_STRENGTH: f64 = 0.0;
pub const SHIFTING_COEFFICIENT: f64 = 0.01;
pub const MAX_SHIFT_FRACTION: f64 = 0.2;
pub const CONFINE_MARGIN: f64 = 0.5;

// Kernel and moment matrices
pub const UPWIND_FLOOR: f64 = 1.0e-3;
pub const MOMENT_REGULARIZATION: f64 = 1.0e-10;
// Smallest Cholesky pivot, relative to the mean diagonal, of a resolved moment
pub const MIN_PIVOT_RATIO: f64 = 1.0e-6;
pub const MIN_NEIGHBORS: usize = 6;

// Free-surface detection
pub const ANGULAR_BUCKETS: usize = 360;
pub const SURFACE_COVERAGE_THRESHOLD: f64 = 5.0 / 6.0;

// Pressure solve
pub const GMRES_RESTART: usize = 30;
pub const GMRES_MAX_ITERATIONS: usize = 600;
pub const GMRES_TOLERANCE: f64 = 1.0e-8;

// Diagnostics
pub const LOG_INTERVAL: u64 = 60;

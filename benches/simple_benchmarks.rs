/// Simple custom benchmarking without criterion
use std::time::Instant;

use bevy::math::DVec2;
use lsmps2d::config::{BLOCK_CENTER, BLOCK_EXTENT};
use lsmps2d::solver::{MomentAssembler, NeighborTable};
use lsmps2d::{Kernel, Method, ParticleSet, SimConfig, Simulation, SpatialHash};

fn time_it<F: FnMut()>(name: &str, iterations: usize, mut f: F) {
    // Warmup
    for _ in 0..5 {
        f();
    }

    let start = Instant::now();
    for _ in 0..iterations {
        f();
    }
    let elapsed = start.elapsed();

    let avg_ms = elapsed.as_secs_f64() * 1000.0 / iterations as f64;
    println!("{}: {:.3}ms avg ({} iterations)", name, avg_ms, iterations);
}

fn block_config(method: Method, side: usize) -> SimConfig {
    let spacing = BLOCK_EXTENT / side as f64;
    let mut config = SimConfig::default()
        .with_method(method)
        .with_particle_spacing(spacing)
        .with_gravity(DVec2::new(0.0, -9.8));
    config.walls_per_side = ((config.bound_max.x - config.bound_min.x) / spacing).round() as usize;
    config
}

fn block(side: usize) -> ParticleSet {
    ParticleSet::block(BLOCK_CENTER, BLOCK_EXTENT, side)
}

fn main() {
    println!("\n=== LSMPS2D Benchmarks ===\n");

    println!("--- Spatial Hash ---");
    for &side in &[20, 40, 80] {
        let config = block_config(Method::Lsmps, side);
        let positions = block(side).positions();
        let mut hash = SpatialHash::for_domain(
            config.domain_min,
            config.domain_max,
            config.grid_resolution,
            config.bucket_capacity,
        );

        time_it(&format!("rebuild (n={})", positions.len()), 50, || {
            hash.rebuild(&positions).unwrap();
        });
    }

    println!("\n--- Neighbor Lists and Operators ---");
    for &side in &[20, 40] {
        let simulation = Simulation::new(block_config(Method::Lsmps, side)).unwrap();
        let positions = simulation.positions();
        let kernel = Kernel::new(Method::Lsmps.kernel_shape(), simulation.config().re());
        let assembler = MomentAssembler::from_config(simulation.config());
        let mut table = NeighborTable::new();

        time_it(&format!("neighbor table (n={})", positions.len()), 20, || {
            table.rebuild(&positions, simulation.hash(), simulation.boundary(), &kernel);
        });

        time_it(&format!("local operators (n={})", positions.len()), 20, || {
            for i in 0..table.len() {
                std::hint::black_box(assembler.operator(
                    table.fluid(i),
                    table.walls(i),
                    simulation.boundary().walls(),
                ));
            }
        });
    }

    println!("\n--- Full Step ---");
    for method in [Method::Lsmps, Method::Mps] {
        for &side in &[20, 30] {
            let mut simulation = Simulation::new(block_config(method, side)).unwrap();
            time_it(
                &format!("{} step (n={})", method.name(), side * side),
                10,
                || {
                    simulation.step().unwrap();
                },
            );
        }
    }

    println!("\n=== Benchmark Complete ===\n");
}

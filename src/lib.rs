use bevy::prelude::*;

pub mod config;
pub mod core;
pub mod error;
pub mod math;
pub mod simulation;
pub mod solver;

// Public re-exports for clean API
pub use crate::config::{GmresSettings, LOG_INTERVAL, Method, SimConfig};
pub use crate::core::{
    BoundaryModel, Kernel, KernelShape, Label, Particle, ParticleSet, SpatialHash, WallParticle,
};
pub use error::SimError;
pub use math::{Real, Vector};
pub use simulation::{Simulation, StepReport};
pub use solver::SolveReport;

/// What a renderer needs to draw one frame.
#[derive(Resource, Clone, Debug, Default)]
pub struct FrameSnapshot {
    pub frame: u64,
    pub positions: Vec<Vector>,
    /// `0xRRGGBB` per particle, from its label.
    pub colors: Vec<u32>,
    pub walls: Vec<Vector>,
}

/// Steps the simulation once per `Update` and publishes a `FrameSnapshot`.
#[derive(Default)]
pub struct SimulationPlugin {
    pub config: SimConfig,
}

impl SimulationPlugin {
    pub fn new(config: SimConfig) -> Self {
        Self { config }
    }
}

impl Plugin for SimulationPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<FrameSnapshot>();
        match Simulation::new(self.config.clone()) {
            Ok(simulation) => {
                app.insert_resource(simulation)
                    .add_systems(Startup, publish_snapshot)
                    .add_systems(
                        Update,
                        (step_simulation, publish_snapshot, log_progress)
                            .chain()
                            .run_if(resource_exists::<Simulation>),
                    );
            }
            Err(err) => {
                error!("simulation setup failed: {}", err);
                app.add_systems(Startup, request_error_exit);
            }
        }
    }
}

fn step_simulation(
    mut commands: Commands,
    mut simulation: ResMut<Simulation>,
    mut exit: MessageWriter<AppExit>,
) {
    if let Err(err) = simulation.step() {
        error!("frame {}: {}", simulation.frame() + 1, err);
        commands.remove_resource::<Simulation>();
        exit.write(AppExit::error());
    }
}

fn publish_snapshot(simulation: Option<Res<Simulation>>, mut snapshot: ResMut<FrameSnapshot>) {
    let Some(simulation) = simulation else {
        return;
    };
    snapshot.frame = simulation.frame();
    simulation.particles().positions_into(&mut snapshot.positions);
    snapshot.colors.clear();
    snapshot
        .colors
        .extend(simulation.particles().iter().map(|particle| particle.label.color()));
    if snapshot.walls.len() != simulation.boundary().len() {
        snapshot.walls = simulation.wall_positions();
    }
}

/// Log every `LOG_INTERVAL` frames
fn log_progress(simulation: Option<Res<Simulation>>) {
    let Some(simulation) = simulation else {
        return;
    };
    let frame = simulation.frame();
    if frame % LOG_INTERVAL == 0 {
        let report = simulation.last_report();
        info!(
            "Frame {}: {} iterations, residual {:.3e}, kinetic energy {:.4e}",
            frame,
            report.iterations,
            report.residual,
            simulation.kinetic_energy()
        );
    }
}

fn request_error_exit(mut exit: MessageWriter<AppExit>) {
    exit.write(AppExit::error());
}

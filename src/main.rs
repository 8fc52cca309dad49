use bevy::log::LogPlugin;
use bevy::prelude::*;

use lsmps2d::{SimConfig, SimulationPlugin};

fn main() -> AppExit {
    App::new()
        .add_plugins(MinimalPlugins)
        .add_plugins(LogPlugin::default())
        .add_plugins(SimulationPlugin::new(SimConfig::default()))
        .run()
}

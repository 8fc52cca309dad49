use bevy::prelude::*;

use lsmps2d::{FrameSnapshot, Label, SimConfig, Simulation, SimulationPlugin};

#[test]
fn plugin_steps_and_publishes_snapshot() {
    let mut app = App::new();
    app.add_plugins(SimulationPlugin::default());

    app.update();
    app.update();

    let snapshot = app.world().resource::<FrameSnapshot>();
    assert_eq!(snapshot.frame, 2);
    assert_eq!(snapshot.positions.len(), 400);
    assert_eq!(snapshot.colors.len(), 400);
    assert!(snapshot.colors.contains(&Label::FreeSurface.color()));
    assert_eq!(snapshot.walls.len(), 4 * SimConfig::default().walls_per_side);
    assert_eq!(app.world().resource::<Simulation>().frame(), 2);
    assert!(app.should_exit().is_none());
}

#[test]
fn invalid_setup_requests_error_exit() {
    let mut app = App::new();
    app.add_plugins(SimulationPlugin::new(
        SimConfig::default().with_grid_resolution(50),
    ));

    app.update();

    assert!(app.world().get_resource::<Simulation>().is_none());
    assert!(matches!(app.should_exit(), Some(AppExit::Error(_))));
}

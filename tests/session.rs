use indoor_nav::navigation::RerouteReason;
use indoor_nav::{EstimatorKind, RouteUpdate, Scenario};

const OFFICE: &str = include_str!("../demos/office_scenario.json");

fn office() -> Scenario {
    let mut scenario = Scenario::from_json(OFFICE).unwrap();
    // raw readings keep the floor switch on the frame it happens
    scenario.config.positioning.rssi_smoothing = false;
    scenario
}

#[test]
fn test_office_walk_routes_over_preferred_stairs() {
    let scenario = office();
    let outputs = scenario.replay().unwrap();
    assert_eq!(outputs.len(), scenario.frames.len());

    let (_, first) = &outputs[0];
    let estimate = first.estimate.unwrap();
    assert_eq!(estimate.floor, 0);
    assert_eq!(estimate.algorithm, EstimatorKind::Fusion);

    match &first.route {
        Some(RouteUpdate::Rerouted { reason, path }) => {
            assert_eq!(*reason, RerouteReason::Initial);
            assert_eq!(path.ids(), vec!["lobby", "corridor", "stairs-0", "stairs-1", "office"]);
            assert_eq!(path.metrics().floor_changes, 1);
        }
        other => panic!("unexpected first route {:?}", other),
    }

    for (timestamp, output) in &outputs {
        assert!(
            !matches!(output.route, Some(RouteUpdate::Unreachable)),
            "unreachable at {} ms",
            timestamp
        );
    }

    let (_, last) = outputs.last().unwrap();
    assert_eq!(last.estimate.unwrap().floor, 1);
}

#[test]
fn test_empty_frame_yields_no_position() {
    let scenario = office();
    let outputs = scenario.replay().unwrap();

    let (_, gap) = outputs.iter().find(|(t, _)| *t == 5500).unwrap();
    assert!(gap.estimate.is_none());
    assert!(gap.route.is_none());
}

#[test]
fn test_smoothed_replay_keeps_tracking() {
    let scenario = Scenario::from_json(OFFICE).unwrap();
    assert!(scenario.config.positioning.rssi_smoothing);

    let outputs = scenario.replay().unwrap();
    let positions = outputs.iter().filter(|(_, o)| o.estimate.is_some()).count();
    assert_eq!(positions, scenario.frames.len() - 1);
}

#[test]
fn test_route_preferences_reprice_transitions() {
    let scenario = office();
    let mut session = scenario.build_session().unwrap();

    // stairs preferred: 6 m at 0.8
    let preferred = session.find_path("lobby", "office");
    assert_eq!(preferred.ids()[2], "stairs-0");

    // accessible base factor 1.5, no discount: 6 m at 1.5
    session.set_route_preferences(true, None);
    let accessible = session.find_path("lobby", "office");
    assert_eq!(accessible.ids(), preferred.ids());
    assert!((accessible.cost - preferred.cost - 4.2).abs() < 1e-9);
    assert!(session.tracker().active_path().is_none());
}

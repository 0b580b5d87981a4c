//! Replays the bundled office walk and prints each cycle

use indoor_nav::navigation::RouteUpdate;
use indoor_nav::Scenario;

const OFFICE: &str = include_str!("office_scenario.json");

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Indoor Navigation - Office Walk Replay ===\n");

    let scenario = Scenario::from_json(OFFICE)?;
    println!(
        "{} anchors, {} graph nodes, destination {}\n",
        scenario.anchors.len(),
        scenario.graph.nodes.len(),
        scenario.destination.as_deref().unwrap_or("none")
    );

    for (timestamp, output) in scenario.replay()? {
        let Some(estimate) = output.estimate else {
            println!("{:>6} ms  no position", timestamp);
            continue;
        };
        let route = match output.route {
            Some(RouteUpdate::OnRoute { progress, remaining_m }) => {
                format!("leg {}, {:.1} m left", progress, remaining_m)
            }
            Some(RouteUpdate::Rerouted { reason, path }) => {
                format!("{:?} reroute: {}", reason, path.ids().join(" -> "))
            }
            Some(RouteUpdate::Unreachable) => "unreachable".to_string(),
            Some(RouteUpdate::NoDestination) | None => String::new(),
        };
        println!(
            "{:>6} ms  ({:5.2}, {:5.2}) floor {}  {}",
            timestamp, estimate.x, estimate.y, estimate.floor, route
        );
    }
    Ok(())
}

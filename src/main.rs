use indoor_nav::navigation::RouteUpdate;
use indoor_nav::utils::ConfigurationManager;
use indoor_nav::{NavigationSession, Scenario};
use log::info;

fn usage(program: &str) -> String {
    format!(
        "Usage: {0} <scenario.json> [--json] [--config <config.json>]\n   or: {0} --route <scenario.json> <from_node> <to_node>",
        program
    )
}

fn print_route(update: &RouteUpdate) {
    match update {
        RouteUpdate::NoDestination => {}
        RouteUpdate::OnRoute { progress, remaining_m } => {
            println!("    on route: leg {}, {:.1} m to go", progress, remaining_m);
        }
        RouteUpdate::Rerouted { reason, path } => {
            let metrics = path.metrics();
            println!(
                "    rerouted ({:?}): {} ({:.1} m, {} floor changes, ~{:.0} s)",
                reason,
                path.ids().join(" -> "),
                metrics.distance_m,
                metrics.floor_changes,
                metrics.estimated_time_s
            );
        }
        RouteUpdate::Unreachable => println!("    destination unreachable"),
    }
}

fn replay(scenario: &Scenario, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut session: NavigationSession = scenario.build_session()?;

    for frame in &scenario.frames {
        let output = session.cycle(&frame.readings, frame.timestamp_ms);
        if json {
            println!("{}", serde_json::to_string(&output)?);
            continue;
        }

        match &output.estimate {
            Some(estimate) => println!(
                "[{:>8} ms] ({:.2}, {:.2}) floor {} ±{:.2} m via {}",
                frame.timestamp_ms,
                estimate.x,
                estimate.y,
                estimate.floor,
                estimate.accuracy_m,
                estimate.algorithm
            ),
            None => println!("[{:>8} ms] no position", frame.timestamp_ms),
        }
        if let Some(update) = &output.route {
            print_route(update);
        }
    }

    let state = session.state();
    info!(
        "replayed {} frames: {} positions, {} empty, {} routes planned",
        state.cycles, state.positions_emitted, state.empty_cycles, state.reroutes
    );
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map_or("indoor-nav", |s| s.as_str());

    if args.len() == 5 && args[1] == "--route" {
        let scenario = Scenario::from_file(&args[2])?;
        let session = scenario.build_session()?;
        let path = session.find_path(&args[3], &args[4]);
        if path.is_empty() {
            eprintln!("No route from {} to {}", args[3], args[4]);
            return Err("Unreachable destination".into());
        }
        let metrics = path.metrics();
        println!("{}", path.ids().join(" -> "));
        println!(
            "cost {:.2}, {:.1} m, {} floor changes, ~{:.0} s",
            path.cost, metrics.distance_m, metrics.floor_changes, metrics.estimated_time_s
        );
        return Ok(());
    }

    let mut json = false;
    let mut config_path = None;
    let mut paths = Vec::new();
    let mut rest = args.iter().skip(1);
    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "--json" => json = true,
            "--config" => match rest.next() {
                Some(path) => config_path = Some(path),
                None => {
                    eprintln!("{}", usage(program));
                    return Err("--config needs a file".into());
                }
            },
            _ if arg.starts_with("--") => {
                eprintln!("Unknown option {}", arg);
                return Err("Invalid arguments".into());
            }
            _ => paths.push(arg),
        }
    }
    if paths.len() != 1 {
        eprintln!("{}", usage(program));
        return Err("Invalid arguments".into());
    }

    let mut scenario = Scenario::from_file(paths[0])?;
    if let Some(path) = config_path {
        // an explicit config file overrides the one embedded in the scenario
        scenario.config = ConfigurationManager::from_file(path)?.into_config();
        info!("using configuration from {}", path);
    }
    replay(&scenario, json)
}

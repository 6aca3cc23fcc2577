/// Command-line driver: load a map, play a move string, report.
///
/// Usage:
///   lifter <MAP> [MOVES] [--routes] [--config PATH]
///
/// Exit status follows the outcome: 0 win/aborted, 1 still running,
/// 2 robot lost.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use lambda_lifter::config::LifterConfig;
use lambda_lifter::domain::search::RouteSearch;
use lambda_lifter::sim::world::WorldState;

/// Lambda Lifter mine simulator
#[derive(Parser, Debug)]
#[command(name = "lifter", version)]
struct Args {
    /// Map file, or a name under the configured maps directory
    map: PathBuf,

    /// Moves to play (U D L R W A S)
    moves: Option<String>,

    /// Print safe routes from the robot after playing
    #[arg(long)]
    routes: bool,

    /// Config file (default: lifter.toml next to the binary or in CWD)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let config = LifterConfig::load(args.config.as_deref());

    // RUST_LOG wins over the configured filter
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let path = resolve_map(&args.map, &config);
    debug!(path = %path.display(), "resolved map");

    let mut world: WorldState = match WorldState::load(&path) {
        Ok(w) => w,
        Err(e) => {
            error!(path = %path.display(), "{e}");
            eprintln!("lifter: {}: {e}", path.display());
            return ExitCode::from(2);
        }
    };

    if let Some(moves) = &args.moves {
        if let Err(e) = world.apply_all(moves) {
            eprintln!("lifter: {e}");
            return ExitCode::from(2);
        }
    }

    print!("{world}");
    println!();
    println!("Outcome: {}", world.outcome);
    println!(
        "Moves: {}  Lambdas: {}/{}  Razors: {}  Water: {}",
        world.moves, world.lambdas_gathered, world.total_lambdas, world.razors, world.flood.water
    );

    if args.routes && !world.outcome.is_terminal() {
        let result = RouteSearch::with_options(&world, world.robot, config.search.options()).run();
        println!();
        if result.routes.is_empty() {
            println!("No safe lambda routes.");
        }
        for route in &result.routes {
            println!("lambda {route}");
        }
        if let Some(lift) = &result.lift {
            println!("lift {lift}");
        }
    }

    ExitCode::from(world.outcome.exit_code())
}

/// Use `map` as given if it exists, else look under `maps_dir`
/// (with and without a `.map` extension).
fn resolve_map(map: &Path, config: &LifterConfig) -> PathBuf {
    if map.exists() {
        return map.to_path_buf();
    }
    let under = config.maps_dir.join(map);
    if under.exists() {
        return under;
    }
    let with_ext = under.with_extension("map");
    if with_ext.exists() {
        return with_ext;
    }
    map.to_path_buf()
}

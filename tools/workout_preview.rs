/// Workout Preview: generate workouts from a content library.
///
/// Usage: workout_preview --library <path> --sport <sport> [--goal <goal>]
///                        [--minutes <n>] [--seed <n>] [--count <n>]
///                        [--config <path>] [--branded] [--json]

use clap::Parser;
use std::path::Path;
use std::process;
use tracing::info;
use workout_engine::core::compiler::ScriptFormat;
use workout_engine::core::config::EngineConfig;
use workout_engine::core::pipeline::WorkoutEngine;
use workout_engine::schema::session::{GenerationRequest, GenerationResult};
use workout_engine::schema::sport::{Goal, Sport};

#[derive(Parser)]
#[command(
    name = "workout_preview",
    about = "Generate workout scripts from a RON content library"
)]
struct PreviewArgs {
    /// Content library (RON)
    #[arg(long)]
    library: String,

    /// kickboxing, power_yoga or calisthenics
    #[arg(long, value_parser = parse_sport)]
    sport: Sport,

    /// allround, endurance, strength, flexibility or technique
    #[arg(long, value_parser = parse_goal, default_value = "allround")]
    goal: Goal,

    /// Target length in minutes (15-120) instead of the configured one
    #[arg(long)]
    minutes: Option<f64>,

    /// Engine config (RON)
    #[arg(long)]
    config: Option<String>,

    /// Add the class opening and closing lines and number the rounds
    #[arg(long)]
    branded: bool,

    /// Seed for the first workout; later ones use the generation counter
    #[arg(long)]
    seed: Option<u64>,

    /// Number of workouts to generate in sequence
    #[arg(long, default_value_t = 1)]
    count: usize,

    /// Print the full result as JSON instead of the script
    #[arg(long)]
    json: bool,

    /// Enable verbose logging
    #[arg(long, short = 'v')]
    verbose: bool,
}

fn parse_sport(value: &str) -> Result<Sport, String> {
    Sport::from_key(value).ok_or_else(|| format!("unknown sport '{value}'"))
}

fn parse_goal(value: &str) -> Result<Goal, String> {
    Goal::from_key(value).ok_or_else(|| format!("unknown goal '{value}'"))
}

fn main() {
    let args = PreviewArgs::parse();

    let log_level = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut builder = WorkoutEngine::builder().library(&args.library);
    if args.branded {
        let config = match args.config.as_deref() {
            Some(path) => EngineConfig::load_from_ron(Path::new(path)),
            None => Ok(EngineConfig::default()),
        };
        match config {
            Ok(config) => {
                builder = builder.config(EngineConfig {
                    script: ScriptFormat::branded(),
                    ..config
                });
            }
            Err(e) => {
                eprintln!("ERROR: {}", e);
                process::exit(1);
            }
        }
    } else if let Some(ref path) = args.config {
        builder = builder.config_file(path);
    }
    if let Some(seed) = args.seed {
        builder = builder.seed(seed);
    }
    let engine = match builder.build() {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            process::exit(1);
        }
    };

    let mut request = GenerationRequest::new(args.sport, args.goal);
    if let Some(minutes) = args.minutes {
        request = request.with_target(minutes);
    }
    for n in 0..args.count {
        match engine.generate(&request) {
            Ok(result) => {
                info!(n, title = %result.title, "generated");
                if args.json {
                    print_json(&result);
                } else {
                    print_script(&result);
                }
            }
            Err(e) => {
                eprintln!("ERROR ({:?}): {}", e.kind(), e);
                process::exit(1);
            }
        }
    }
}

fn print_json(result: &GenerationResult) {
    match serde_json::to_string_pretty(result) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("ERROR: failed to serialize result: {}", e);
            process::exit(1);
        }
    }
}

fn print_script(result: &GenerationResult) {
    println!("# {}", result.title);
    println!(
        "{} min | {} | {}",
        result.total_duration,
        result.time_status,
        result.sport_specific_additions.summary()
    );
    for notice in &result.notices {
        println!("! {:?}: {}", notice.kind, notice.detail);
    }
    println!();
    println!("{}", result.compiled_script);
    println!("---");
}

//! Grouper - pub/sub key overlay simulation
//!
//! Runs canned walkthroughs or a random contact simulation and prints the
//! resulting key statistics.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use grouper_logging::{GrouperSubscriberBuilder, LogConfig};

use grouper_simulation::{SimConfig, scenarios};

#[derive(Parser)]
#[command(
    name = "grouper-sim",
    about = "Group-key pub/sub overlay simulation",
    version
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Write JSONL logs to this directory instead of the console
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Two overlapping subscribers behind one broker
    Overlap,

    /// Group-key reuse across two brokers
    Federation,

    /// Pairwise key renegotiation after expiry
    Renegotiate,

    /// Random contacts between randomly interested hosts
    Random {
        /// TOML file with simulation settings
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of ticks to run
        #[arg(short, long)]
        ticks: Option<u64>,

        /// RNG seed
        #[arg(short, long)]
        seed: Option<u64>,

        /// Number of brokers
        #[arg(long)]
        brokers: Option<usize>,

        /// Number of publishers
        #[arg(long)]
        publishers: Option<usize>,

        /// Number of subscribers
        #[arg(long)]
        subscribers: Option<usize>,

        /// Per-tick meeting probability for each host pair
        #[arg(short = 'p', long)]
        contact_probability: Option<f64>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the default configuration as TOML
    DefaultConfig,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut log_config = if cli.verbose {
        LogConfig::development()
    } else {
        LogConfig {
            default_level: "warn".to_string(),
            ..LogConfig::development()
        }
    };
    if let Some(dir) = cli.log_dir {
        log_config = LogConfig {
            default_level: log_config.default_level,
            ..LogConfig::simulation(dir)
        };
    }
    let _guard = GrouperSubscriberBuilder::with_config(log_config)
        .init()
        .context("failed to initialize logging")?;

    match cli.command {
        Commands::Overlap => {
            scenarios::run_overlap_scenario()?;
        }
        Commands::Federation => {
            scenarios::run_federation_scenario()?;
        }
        Commands::Renegotiate => {
            scenarios::run_renegotiation_scenario()?;
        }
        Commands::Random {
            config,
            ticks,
            seed,
            brokers,
            publishers,
            subscribers,
            contact_probability,
            json,
        } => {
            let mut sim_config = match config {
                Some(path) => {
                    let text = std::fs::read_to_string(&path)
                        .with_context(|| format!("reading {}", path.display()))?;
                    SimConfig::from_toml_str(&text)?
                }
                None => SimConfig::default(),
            };
            if let Some(ticks) = ticks {
                sim_config.ticks = ticks;
            }
            if let Some(seed) = seed {
                sim_config.seed = seed;
            }
            if let Some(brokers) = brokers {
                sim_config.brokers = brokers;
            }
            if let Some(publishers) = publishers {
                sim_config.publishers = publishers;
            }
            if let Some(subscribers) = subscribers {
                sim_config.subscribers = subscribers;
            }
            if let Some(p) = contact_probability {
                sim_config.contact_probability = p;
            }

            let world = scenarios::run_random_scenario(sim_config)?;
            if json {
                let output = serde_json::json!({
                    "report": world.report(),
                    "driver": world.stats(),
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
        }
        Commands::DefaultConfig => {
            print!("{}", SimConfig::default().to_toml_string()?);
        }
    }

    Ok(())
}

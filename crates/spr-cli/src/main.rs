//! SPR sensor command-line interface.
//!
//! Run sweeps from TOML configuration files:
//! ```sh
//! spr-cli run job.toml
//! spr-cli validate job.toml
//! spr-cli materials
//! ```

mod config;
mod runner;

use clap::{Parser, Subcommand};
use spr_materials::MaterialTable;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "spr-cli")]
#[command(about = "Surface plasmon resonance sensor simulator")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a sweep from a TOML configuration file.
    Run {
        /// Path to the job configuration file.
        config: PathBuf,
        /// Output directory (overrides config file setting).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a configuration file without running it.
    Validate {
        /// Path to the job configuration file.
        config: PathBuf,
    },
    /// List the built-in reference materials.
    Materials,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, output } => {
            println!("SPR Sensor Simulator");
            println!("====================");
            let job = config::load_config(&config)?;
            println!("Configuration: {}", config.display());

            let (result, extras) = runner::run_job(&job)?;

            let out_dir = output.unwrap_or_else(|| PathBuf::from(&job.output.directory));
            runner::write_outputs(&job, &result, &extras, &out_dir)?;

            println!("Run complete.");
            Ok(())
        }
        Commands::Validate { config } => {
            let _job = config::load_config(&config)?;
            println!("Configuration is valid: {}", config.display());
            Ok(())
        }
        Commands::Materials => {
            let table = MaterialTable::reference_850nm();
            println!("Built-in materials (n + ik at 850 nm):");
            println!();
            for material in table.iter() {
                let n = material.refractive_index(850.0)?;
                println!("  {:<8} {:>8.5} + {:.5e}i", material.name(), n.re, n.im);
            }
            Ok(())
        }
    }
}

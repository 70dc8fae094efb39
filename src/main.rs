//! CLI Entry Point for emu_sequencer
//!
//! Provides command-line access to the sequencer:
//! - `validate` a parameter set and print every violated rule
//! - `estimate` the total events (and run time, when an event rate is configured)
//! - `run` the parameter set against the recording mock instrument and print the calls
//! - `help` for the operator help text
//! - `config` to print the effective configuration
//!
//! # Usage
//!
//! ```bash
//! emu_sequencer validate -p start_field=0 -p stop_field=100 -p step_field=10 -p magnet_device=LF
//! emu_sequencer run --params config/scan_example.toml
//! emu_sequencer run --params config/scan_example.toml --json
//! EMU_SEQ_ENGINE__AUTO_ZERO_FIELD=true emu_sequencer run --params scan.toml
//! ```

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use emu_sequencer::config::{SequencerConfig, DEFAULT_CONFIG_PATH};
use emu_sequencer::hardware::{Instruments, MockInstrument};
use emu_sequencer::logging::{self, OutputFormat, TracingConfig};
use emu_sequencer::scan::estimate::format_sexagesimal;
use emu_sequencer::{RawParameters, Sequencer};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "emu_sequencer")]
#[command(about = "Temperature and field scan sequencing for the EMU spectrometer", long_about = None)]
#[command(disable_help_subcommand = true)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Pretty)]
    log_format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a parameter set and print every violated rule
    Validate(ParameterArgs),

    /// Print the total number of events a run would collect
    Estimate(ParameterArgs),

    /// Run against the recording mock instrument and print every call
    Run {
        #[command(flatten)]
        params: ParameterArgs,

        /// Print the run summary as JSON instead of the call journal
        #[arg(long)]
        json: bool,
    },

    /// Print the operator help text
    Help,

    /// Print the effective configuration as TOML
    Config,
}

#[derive(Args)]
struct ParameterArgs {
    /// TOML file with any of the nine parameters
    #[arg(long)]
    params: Option<PathBuf>,

    /// Override one parameter, e.g. `-p start_temperature=1.5`
    #[arg(short = 'p', long = "param", value_parser = parse_key_val)]
    overrides: Vec<(String, String)>,
}

impl ParameterArgs {
    fn load(&self) -> Result<RawParameters> {
        let mut raw = match &self.params {
            Some(path) => RawParameters::from_toml_file(path)
                .with_context(|| format!("reading parameters from {}", path.display()))?,
            None => RawParameters::default(),
        };
        for (key, value) in &self.overrides {
            raw.set(key, value.clone())?;
        }
        Ok(raw)
    }
}

fn parse_key_val(s: &str) -> Result<(String, String)> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| anyhow!("expected key=value, got '{s}'"))?;
    Ok((key.trim().to_string(), value.to_string()))
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = SequencerConfig::load_from(&cli.config)?;
    logging::init(TracingConfig::from_config(&config)?.with_format(cli.log_format))?;

    let instrument = Arc::new(MockInstrument::new());
    let sequencer = Sequencer::new(Instruments::from_single(instrument.clone()))
        .with_engine_config(config.engine.clone());

    match cli.command {
        Commands::Validate(args) => {
            let raw = args.load()?;
            match sequencer.validate(&raw)? {
                None => {
                    println!("Parameters valid");
                    Ok(ExitCode::SUCCESS)
                }
                Some(message) => {
                    print!("{message}");
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Commands::Estimate(args) => {
            let raw = args.load()?;
            let total = sequencer.estimate(&raw)?;
            println!("Total mevents: {total}");
            match sequencer.estimate_seconds(&raw)? {
                Some(seconds) => println!("Estimated run time: {}", format_sexagesimal(seconds)),
                None => println!("Total estimated run time: {}", format_sexagesimal(total)),
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Run { params, json } => {
            let raw = params.load()?;
            if let Some(message) = sequencer.validate(&raw)? {
                eprint!("{message}");
                return Ok(ExitCode::FAILURE);
            }
            let summary = sequencer.run(&raw).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
                return Ok(ExitCode::SUCCESS);
            }
            for call in instrument.journal().await {
                println!("{call}");
            }
            println!(
                "Run {} ({}) finished: {} point(s), {} measurement(s)",
                summary.run_id,
                summary.state,
                summary.points,
                summary.measurements
            );
            Ok(ExitCode::SUCCESS)
        }
        Commands::Help => {
            print!("{}", sequencer.help());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config => {
            print!("{}", config.to_toml()?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

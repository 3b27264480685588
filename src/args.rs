// Commandline argument parser using clap for motelocate

use crate::estimator::EstimationModel;
use crate::reading_source::DEFAULT_BAUD_RATE;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Command line of the `motelocate` binary.
#[derive(Debug, Parser, Clone)]
#[clap(version, about)]
pub struct LocatorArgs {
    #[command(subcommand)]
    /// Where readings come from, the sink mote or a recorded dataset
    pub command: CommandTask,

    /// RON file with sensor placements and estimator settings
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Overrides the estimation model named in the config file
    #[arg(short = 'm', long = "model", global = true, value_enum)]
    pub model: Option<EstimationModel>,

    /// Overrides the loop rate, in ticks per second
    #[arg(short = 'r', long = "rate", global = true)]
    pub tick_rate: Option<f64>,

    /// Run this many ticks without the terminal UI, logging each estimate
    #[arg(short = 't', long = "ticks", global = true)]
    pub ticks: Option<u64>,
}

/// Where readings come from.
#[derive(Debug, Subcommand, Clone)]
pub enum CommandTask {
    /// Read light frames from the sink mote over a serial port
    #[command(about)]
    Live(LiveCommand),

    /// Replay a recorded CSV dataset instead of live hardware
    #[command(about)]
    Replay(ReplayCommand),
}

/// Options for reading from the sink mote.
#[derive(Debug, Args, Clone)]
#[command(version, about)]
pub struct LiveCommand {
    /// Serial device of the sink mote, e.g. /dev/ttyUSB0. Asked for
    /// interactively when left out
    #[arg(short = 'p', long = "port")]
    pub port: Option<PathBuf>,

    /// Baud rate of the serial device
    #[arg(short = 'b', long = "baud", default_value_t = DEFAULT_BAUD_RATE)]
    pub baud_rate: u32,
}

/// Options for replaying a dataset.
#[derive(Debug, Args, Clone)]
#[command(version, about)]
pub struct ReplayCommand {
    /// CSV file with `sensor_id` and `light` columns
    pub dataset: PathBuf,

    /// Seed for the values synthesized once the recording runs out
    #[arg(short = 's', long = "seed")]
    pub seed: Option<u64>,
}

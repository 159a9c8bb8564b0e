use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use serde::{Deserialize, Serialize};

use crate::sync::{Action, OperationKind, Priority};

#[derive(Parser)]
#[command(name = "shopsync")]
#[command(about = "Offline sync queue for the repair-shop console")]
#[command(long_about = "shopsync - offline sync queue for the repair-shop console

Records diagnostics, device records, backups, and reports while the shop
is offline and replays them against the shop API once it is reachable.

QUICK START:
  shopsync status                       Show queue counts
  shopsync enqueue device create --data '{\"serial_number\":\"SN1\",\"model\":\"X1\"}'
  shopsync run                          Sync now if the API is reachable
  shopsync daemon                       Keep syncing in the background

OUTPUT FORMATS:
  --output pretty    Human-readable colored output (default)
  --output json      Machine-readable JSON for scripting

For more information on a specific command, run:
  shopsync <command> --help")]
#[command(version, propagate_version = true)]
pub struct Cli {
    /// Output format for command results
    ///
    /// Defaults to `general.default_output` from the config file.
    #[arg(short, long, value_enum, global = true)]
    pub output: Option<OutputFormat>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file to use instead of ~/.shopsync/config.yaml
    #[arg(long, global = true, env = "SHOPSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for command results.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable colored output.
    #[default]
    Pretty,
    /// Machine-readable JSON output.
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show sync queue status
    ///
    /// Displays pending and failed counts and, with --check, whether the
    /// API is reachable.
    ///
    /// # Examples
    ///
    ///   shopsync status
    ///   shopsync status --check -o json
    #[command(alias = "s")]
    Status {
        /// Probe the API before reporting
        #[arg(long)]
        check: bool,
    },

    /// List queued operations in processing order
    ///
    /// # Examples
    ///
    ///   shopsync list
    ///   shopsync list --failed
    ///   shopsync list -n 5 -o json
    #[command(alias = "ls")]
    List {
        /// Only operations that exhausted their attempts
        #[arg(long)]
        failed: bool,

        /// Maximum operations to show
        #[arg(long, short = 'n', default_value = "50")]
        limit: usize,
    },

    /// Queue an operation
    ///
    /// The data is the JSON record for the kind. Update and delete need the
    /// remote id in the data's "id" field.
    ///
    /// # Examples
    ///
    ///   shopsync enqueue diagnostic create --data '{"device_id":"d1","summary":"OK","results":{}}'
    ///   shopsync enqueue device update --data '{"id":"d1","serial_number":"SN1","model":"X1"}' -p high
    ///   shopsync enqueue report create --data @report.json
    Enqueue {
        /// Operation kind (diagnostic, device, backup, report)
        #[arg(value_parser = parse_kind)]
        kind: OperationKind,

        /// Action (create, update, delete)
        #[arg(value_parser = parse_action)]
        action: Action,

        /// JSON record, or @path to read it from a file
        #[arg(long, short = 'd')]
        data: String,

        /// Priority (high, medium, low); defaults by kind
        #[arg(long, short = 'p', value_parser = parse_priority)]
        priority: Option<Priority>,
    },

    /// Remove one operation from the queue
    #[command(alias = "rm")]
    Remove {
        /// Operation ID
        id: uuid::Uuid,
    },

    /// Run one sync pass now
    ///
    /// Probes the API first; does nothing when it is unreachable.
    Run,

    /// Give failed operations a fresh set of attempts
    Retry,

    /// Drop operations that exhausted their attempts
    ClearFailed,

    /// Keep syncing in the foreground until interrupted
    ///
    /// Probes connectivity, runs a pass on reconnect, on a timer, and on
    /// SIGUSR1.
    Daemon {
        /// Seconds between timer passes (0 disables the timer)
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Generate shell completions
    ///
    /// Example: shopsync completions bash > ~/.bash_completion.d/shopsync
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn parse_kind(s: &str) -> Result<OperationKind, String> {
    OperationKind::from_str(s)
        .ok_or_else(|| format!("unknown kind '{s}' (expected diagnostic, device, backup, report)"))
}

fn parse_action(s: &str) -> Result<Action, String> {
    Action::from_str(s).ok_or_else(|| format!("unknown action '{s}' (expected create, update, delete)"))
}

fn parse_priority(s: &str) -> Result<Priority, String> {
    Priority::from_str(s).ok_or_else(|| format!("unknown priority '{s}' (expected high, medium, low)"))
}

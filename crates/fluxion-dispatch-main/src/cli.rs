// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of FluxION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};

use fluxion_dispatch_types::{ActionId, ActionType, DeviceId};

#[derive(Parser, Debug)]
#[command(name = "fluxion-dispatch")]
#[command(about = "Time-window dispatch of battery set-points", version)]
#[command(
    long_about = "Keeps every configured battery device on the set-point its one-off actions,\n\
    weekly actions and bound schedules ask for at the current moment.\n\
    \nExamples:\n  \
    fluxion-dispatch run                                   # Start the poll loop\n  \
    fluxion-dispatch check --device 1                      # Show what would be sent now\n  \
    fluxion-dispatch action add --device 1 --value 1500 \\\n      \
    --from 2025-03-03T00:00:00Z --until 2025-03-03T06:00:00Z --weekly"
)]
pub struct Cli {
    /// Configuration file (TOML, or JSON by extension)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the poll loop until interrupted (default)
    Run,

    /// Reconcile one device without touching it and print the plan
    Check(CheckArgs),

    /// Print where each action of a device falls inside a time range
    Timeline(TimelineArgs),

    /// Manage actions
    Action {
        #[command(subcommand)]
        command: ActionCommand,
    },
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    #[arg(long)]
    pub device: DeviceId,

    /// Instant to evaluate (RFC 3339), defaults to now
    #[arg(long)]
    pub at: Option<DateTime<Utc>>,
}

#[derive(Args, Debug)]
pub struct TimelineArgs {
    #[arg(long)]
    pub device: DeviceId,

    #[arg(long)]
    pub start: DateTime<Utc>,

    #[arg(long)]
    pub end: DateTime<Utc>,
}

#[derive(Subcommand, Debug)]
pub enum ActionCommand {
    /// Create a one-off or weekly action
    Add(AddActionArgs),

    /// End an action at a given instant, now by default
    Stop {
        #[arg(long)]
        id: ActionId,

        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },

    /// Pause a weekly action for whole weeks
    Skip {
        #[arg(long)]
        id: ActionId,

        /// Start of the pause, now by default
        #[arg(long)]
        from: Option<DateTime<Utc>>,

        #[arg(long, default_value_t = 1)]
        weeks: u32,
    },

    /// Remove an action record
    Delete {
        #[arg(long)]
        id: ActionId,
    },

    /// List the actions of a device
    List {
        #[arg(long)]
        device: DeviceId,
    },
}

#[derive(Args, Debug)]
pub struct AddActionArgs {
    #[arg(long)]
    pub device: DeviceId,

    #[arg(long = "type", default_value = "charge")]
    pub action_type: ActionType,

    /// Set-point in watts, negative to discharge
    #[arg(long, allow_negative_numbers = true)]
    pub value: i64,

    #[arg(long)]
    pub from: DateTime<Utc>,

    #[arg(long)]
    pub until: DateTime<Utc>,

    /// Repeat every week at the same weekday and time
    #[arg(long)]
    pub weekly: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_means_run() {
        let cli = Cli::try_parse_from(["fluxion-dispatch"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_parse_action_add() {
        let cli = Cli::try_parse_from([
            "fluxion-dispatch",
            "--config",
            "dispatch.toml",
            "action",
            "add",
            "--device",
            "2",
            "--value",
            "-800",
            "--from",
            "2025-03-03T00:00:00Z",
            "--until",
            "2025-03-03T06:00:00Z",
            "--weekly",
        ])
        .unwrap();

        let Some(Commands::Action {
            command: ActionCommand::Add(args),
        }) = cli.command
        else {
            panic!("expected action add");
        };
        assert_eq!(args.device, 2);
        assert_eq!(args.value, -800);
        assert_eq!(args.action_type, ActionType::Charge);
        assert!(args.weekly);
        assert_eq!(cli.config, Some(PathBuf::from("dispatch.toml")));
    }

    #[test]
    fn test_parse_skip_defaults_to_one_week() {
        let cli = Cli::try_parse_from(["fluxion-dispatch", "action", "skip", "--id", "4"]).unwrap();

        let Some(Commands::Action {
            command: ActionCommand::Skip { id, from, weeks },
        }) = cli.command
        else {
            panic!("expected action skip");
        };
        assert_eq!((id, from, weeks), (4, None, 1));
    }

    #[test]
    fn test_rejects_bad_timestamp() {
        let result = Cli::try_parse_from([
            "fluxion-dispatch",
            "timeline",
            "--device",
            "1",
            "--start",
            "yesterday",
            "--end",
            "2025-03-03T06:00:00Z",
        ]);
        assert!(result.is_err());
    }
}

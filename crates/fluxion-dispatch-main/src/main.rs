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

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use fluxion_dispatch_core::{DispatchRepository, DispatchStore, PollLoop};
use fluxion_dispatch_main::{app, logging};
use fluxion_dispatch_main::cli::{ActionCommand, Cli, Commands};
use fluxion_dispatch_main::config::{AppConfig, StoreKind};
use fluxion_dispatch_main::seed;
use fluxion_dispatch_types::NewAction;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = logging::init();
    let config = AppConfig::load(cli.config.as_deref())?;
    log_level.apply(&config.system.log_level)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        debug_mode = config.system.debug_mode,
        devices = config.devices.len(),
        "🚀 Starting FluxION dispatch"
    );

    let store = app::open_store(&config)?;
    seed::apply(store.as_ref(), &config)
        .await
        .context("Failed to apply configuration to the store")?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(&config, store).await,
        Commands::Check(args) => {
            let plan = app::check(
                store.as_ref(),
                &config,
                args.device,
                args.at.unwrap_or_else(Utc::now),
            )
            .await?;
            print_json(&plan)
        }
        Commands::Timeline(args) => {
            let entries = app::timeline(store.as_ref(), args.device, args.start, args.end).await?;
            print_json(&entries)
        }
        Commands::Action { command } => {
            if config.store.kind == StoreKind::Memory {
                warn!("In-memory store: action changes are lost when this command exits");
            }
            manage_action(store.as_ref(), command).await
        }
    }
}

async fn run(config: &AppConfig, store: Arc<dyn DispatchStore>) -> Result<()> {
    if !config.dispatch.enabled {
        warn!("Dispatch disabled in configuration, poll loop not started");
        return Ok(());
    }

    let drivers = Arc::new(app::build_drivers(config)?);
    let repository: Arc<dyn DispatchRepository> = store;
    let poll_loop = PollLoop::new(repository, drivers, config.dispatch.loop_settings());

    let (stop_tx, stop_rx) = watch::channel(false);
    let handle = poll_loop.spawn(stop_rx);
    info!(
        min_interval_secs = config.dispatch.min_interval_secs,
        max_interval_secs = config.dispatch.max_interval_secs,
        "Poll loop started"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown requested, waiting for the current pass");

    if stop_tx.send(true).is_err() {
        debug!("Poll loop already stopped");
    }
    handle.await.context("Poll loop task failed")?;

    info!("👋 Dispatch stopped");
    Ok(())
}

async fn manage_action(store: &dyn DispatchStore, command: ActionCommand) -> Result<()> {
    let now = Utc::now();
    match command {
        ActionCommand::Add(args) => {
            let action = store
                .create_action(
                    NewAction {
                        device_id: args.device,
                        action_type: args.action_type,
                        value: args.value,
                        active_from: args.from,
                        active_until: args.until,
                        repeat_weekly: args.weekly,
                    },
                    now,
                )
                .await?;
            info!(action_id = action.id, "Action created");
            print_json(&action)
        }
        ActionCommand::Stop { id, at } => {
            let action = store.end_action_at(id, at.unwrap_or(now)).await?;
            print_json(&action)
        }
        ActionCommand::Skip { id, from, weeks } => {
            let copy = store.skip_weeks(id, from.unwrap_or(now), weeks).await?;
            if copy.is_none() {
                info!(action_id = id, "Action ends during the skipped weeks, nothing resumes");
            }
            print_json(&copy)
        }
        ActionCommand::Delete { id } => {
            store.delete_action(id).await?;
            info!(action_id = id, "Action deleted");
            Ok(())
        }
        ActionCommand::List { device } => {
            let actions = store.list_actions_for_device(device).await?;
            print_json(&actions)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

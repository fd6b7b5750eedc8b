// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ne-supervisord: the edge supervisor daemon.
//!
//! Owns the fleet of worker processes on this machine: reconciles the
//! declarative connection table against running service units, restarts
//! what dies, and enforces addon entitlements.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use clap::Parser;
use ne_adapters::{MemoryTagBus, SystemdManager, TagBus};
use ne_core::{DataDirs, SystemClock};
use ne_engine::{logging, App, AppArgs, BusFactory};
use ne_supervisor::{supervisor_app_config, SupervisorApp, SupervisorConfig, SUPERVISOR_APP_ID};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let args = AppArgs::parse();
    let dirs = DataDirs::resolve();
    if let Err(err) = dirs.ensure() {
        eprintln!("failed to create data directories: {err}");
        return ExitCode::FAILURE;
    }

    let log_file = dirs.log_file(SUPERVISOR_APP_ID);
    let _log_guard = match logging::setup_logging(&log_file, args.debug) {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("file logging unavailable ({err}), continuing on console");
            None
        }
    };

    info!(
        data_dir = %dirs.root().display(),
        serial = %ne_core::identity::serial_number(),
        "starting supervisor"
    );

    let cfg = SupervisorConfig::from_dirs(&dirs);
    let hooks = SupervisorApp::new(cfg, SystemdManager::new(), SystemClock);

    let debug = args.debug;
    let factory: BusFactory = Arc::new(move |_app_id, _args| {
        Arc::new(MemoryTagBus::with_debug(debug)) as Arc<dyn TagBus>
    });

    let app = App::new(
        SUPERVISOR_APP_ID,
        args,
        supervisor_app_config(),
        hooks,
        factory,
    );

    let code = app.run().await;
    if code == 0 {
        info!("supervisor stopped");
        ExitCode::SUCCESS
    } else {
        error!(code, "supervisor exited with failure");
        ExitCode::FAILURE
    }
}

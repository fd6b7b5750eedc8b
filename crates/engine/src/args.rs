// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command-line flags shared by every engine binary.

use clap::Parser;

/// Flags accepted by the supervisor and all workers.
#[derive(Debug, Clone, Default, Parser)]
#[command(disable_version_flag = true)]
pub struct AppArgs {
    /// Reset bus state on connect
    #[arg(long)]
    pub clean: bool,

    /// Enable verbose bus tracing
    #[arg(long)]
    pub debug: bool,

    /// Connection id binding a worker to its configuration row
    #[arg(long = "conn-id")]
    pub conn_id: Option<String>,
}

#[cfg(test)]
#[path = "args_tests.rs"]
mod tests;

// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "conduit", version, about = "Personal AI assistant gateway core runtime")]
pub struct Cli {
    /// Path to an explicit config file, merged on top of the usual search
    /// path (/etc, XDG, workspace-local).
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace). Respects RUST_LOG if set.
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the gateway, channel bus, and delivery queue worker (default).
    Serve,

    /// Bearer token management for the gateway.
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },

    /// Print the fully merged configuration (including env overrides) and exit.
    ShowConfig,

    /// Delivery-queue inspection. Read-only; does not run the worker.
    Queue {
        #[command(subcommand)]
        command: QueueCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum TokenCommands {
    /// Print a freshly generated bearer token. Does not modify any config
    /// file - the operator is responsible for placing it in
    /// `gateway.auth_token` or `GATEWAY_AUTH_TOKEN`.
    Regenerate,
}

#[derive(Subcommand, Debug)]
pub enum QueueCommands {
    /// List pending and dead-lettered deliveries currently on disk.
    Inspect,
}

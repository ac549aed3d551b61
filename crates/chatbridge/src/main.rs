// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chatbridge - a Telegram/Discord to Chatwoot helpdesk bridge.
//!
//! Binary entry point: parses the CLI, loads configuration, and runs the
//! webhook server.

mod serve;

use clap::{Parser, Subcommand};

/// Chatbridge - relay chat platform messages into a Chatwoot helpdesk.
#[derive(Parser, Debug)]
#[command(name = "chatbridge", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the bridge webhook server.
    Serve,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match chatbridge_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            chatbridge_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Serve) => {
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("chatbridge: {e}");
                std::process::exit(1);
            }
        }
        None => {
            println!("chatbridge: use --help for available commands");
        }
    }
}

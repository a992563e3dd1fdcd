// Copyright (c) 2024-2025 Jesse Morgan
// Licensed under the MIT License. See LICENSE file for details.

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use pagegate::audit::{init_audit_logger, set_audit_enabled, AuditLogger};
use pagegate::config::GateConfig;
use pagegate::registry::KeyRegistry;
use pagegate::server::Server;

/// Exit codes following sysexits.h conventions
mod exit_codes {
    /// Success - operation completed successfully
    pub const SUCCESS: i32 = 0;
    /// General error - unspecified error
    pub const ERROR: i32 = 1;
    /// Data error - key did not classify
    pub const DATA_ERR: i32 = 65;
    /// Configuration error - invalid or missing config
    pub const CONFIG: i32 = 78;
}

#[derive(Parser)]
#[command(
    name = "pagegate",
    version,
    about = "Tiered session gate for protected content pages",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the page host for one browsing session
    Serve {
        /// Port to listen on (overrides config)
        #[arg(long)]
        port: Option<u16>,
        /// Bind address (overrides config; 127.0.0.1 by default)
        #[arg(long)]
        bind: Option<String>,
    },
    /// Classify a candidate key into an access tier
    Check {
        /// The candidate key
        key: String,
    },
    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "[✗]".red(), e);
            exit_codes::ERROR
        }
    };
    std::process::exit(exit_code);
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();

    let config = match GateConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {:#}", "[✗]".red(), e);
            return Ok(exit_codes::CONFIG);
        }
    };

    match cli.command.unwrap_or(Command::Serve {
        port: None,
        bind: None,
    }) {
        Command::Serve { port, bind } => {
            if config.audit_log_enabled {
                init_audit_logger(AuditLogger::new(AuditLogger::default_path()));
                set_audit_enabled(true);
            }

            let mut server = Server::new(config);
            if let Some(port) = port {
                server = server.with_port(port);
            }
            if let Some(bind) = bind {
                server = server.with_bind_address(bind);
            }

            println!(
                "{} page host on port {}",
                "pagegate".bright_cyan().bold(),
                server.port()
            );
            server.start().await?;
            Ok(exit_codes::SUCCESS)
        }
        Command::Check { key } => {
            let registry = KeyRegistry::from_config(&config);
            match registry.tier_of(&key) {
                Some(tier) => {
                    println!("{} {} access", "[OK]".green(), tier.to_string().bold());
                    Ok(exit_codes::SUCCESS)
                }
                None => {
                    println!("{} invalid key", "[✗]".red());
                    Ok(exit_codes::DATA_ERR)
                }
            }
        }
        Command::Config => {
            let raw = serde_json::to_string_pretty(&config)?;
            println!("{raw}");
            println!();
            println!(
                "{} {}",
                "Config file:".dimmed(),
                GateConfig::config_path().display()
            );
            Ok(exit_codes::SUCCESS)
        }
    }
}

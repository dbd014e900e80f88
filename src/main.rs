//! nordswitch - NordVPN client automation
//!
//! A command-line tool that drives the installed NordVPN client: the
//! terminal CLI on Linux, the desktop application on Windows. Every
//! connect/disconnect is verified against the client's observable state
//! rather than trusting command exit codes.

use clap::{Parser, Subcommand};
use nordswitch_core::{error::SwitchError, init_logging};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "nordswitch")]
#[command(about = "Automate the NordVPN desktop and terminal clients")]
struct Cli {
    /// Path to a TOML configuration file (defaults to the user config dir)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// JSON server list used to infer connectivity on Windows
    #[arg(long, global = true, value_name = "FILE")]
    servers: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to a server and wait for confirmation
    Connect {
        /// Server name, number, or group to connect to
        target: String,
        /// Treat the target as a server group
        #[arg(long)]
        group: bool,
    },
    /// Disconnect and wait for confirmation
    Disconnect,
    /// Show the current VPN status
    Status {
        /// Print every reported status field
        #[arg(long)]
        full: bool,
    },
    /// Show the current VPN/public IP
    Ip,
    /// Show the currently connected server
    Server,
    /// Flush the system DNS resolver cache
    FlushDns,
    /// Close the NordVPN client processes
    Close {
        /// Kill immediately instead of closing gracefully
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Initialize logging
    if let Err(e) = init_logging() {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(2);
    }

    let cli = Cli::parse();
    let config = cli.config.as_deref();
    let servers = cli.servers.as_deref();

    let result = match cli.command {
        Commands::Connect { target, group } => {
            cli::vpn::run_connect(config, servers, &target, group).await
        }
        Commands::Disconnect => cli::vpn::run_disconnect(config, servers).await,
        Commands::Status { full } => cli::vpn::run_status(config, servers, full).await,
        Commands::Ip => cli::vpn::run_ip(config, servers).await,
        Commands::Server => cli::vpn::run_server(config, servers).await,
        Commands::FlushDns => cli::vpn::run_flush_dns(config, servers).await,
        Commands::Close { force } => cli::vpn::run_close(config, servers, force).await,
    };

    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            let exit_code = match e {
                // Configuration errors (exit code 2)
                SwitchError::Config(_) | SwitchError::Toml(_) | SwitchError::TomlSerialize(_) => 2,
                // Runtime errors (exit code 1)
                SwitchError::Cli(_) | SwitchError::Io(_) => 1,
            };

            eprintln!("{}", e);
            std::process::exit(exit_code);
        }
    }
}

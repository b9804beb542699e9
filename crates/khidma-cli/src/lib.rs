//! Command-line front end for the khidma dashboard backend.

pub mod cli_args;
mod commands;
mod session;

use cli_args::{Cli, Command, ConfigCommand};
use khidma_core::{
    FileConfig, LoggingDestination, config_path, init_logging, load_config, save_config,
};
use tracing::{info, warn};

use crate::session::Workspace;

/// Run one parsed command line to completion.
pub async fn dispatch(cli: Cli) -> Result<(), String> {
    let destination = if cli.verbose {
        LoggingDestination::FileAndStderr
    } else {
        LoggingDestination::File
    };
    if let Err(err) = init_logging(destination) {
        eprintln!("Warning: logging disabled: {err}");
    }

    let load = load_config();
    for warning in &load.warnings {
        warn!(%warning, "configuration warning");
        eprintln!("Warning: {warning}");
    }

    let workspace = Workspace::open(load.config, cli.api_url.as_deref())?;
    info!(base_url = workspace.client.base_url(), "dispatching command");
    let result = run_command(&workspace, cli.command).await;
    workspace.persist();
    result
}

async fn run_command(ws: &Workspace, command: Command) -> Result<(), String> {
    match command {
        Command::Login(args) => commands::login(ws, args).await,
        Command::Logout => commands::logout(ws).await,
        Command::Whoami => commands::whoami(ws),
        Command::Servantees(cmd) => commands::servantee_command(ws, cmd).await,
        Command::Retreats(cmd) => commands::retreat_command(ws, cmd).await,
        Command::Servants(cmd) => commands::servant_command(ws, cmd).await,
        Command::Notes(cmd) => commands::note_command(ws, cmd).await,
        Command::Search(args) => commands::search(ws, args).await,
        Command::Dashboard => commands::dashboard(ws).await,
        Command::Report(cmd) => commands::report(ws, cmd).await,
        Command::Config(cmd) => handle_config_command(cmd, &ws.config),
    }
}

fn handle_config_command(command: ConfigCommand, config: &FileConfig) -> Result<(), String> {
    match command {
        ConfigCommand::Show => {
            let rendered = toml::to_string_pretty(config).map_err(|err| err.to_string())?;
            if !config_path().exists() {
                println!("# defaults (no config file at {})", config_path().display());
            }
            print!("{rendered}");
            Ok(())
        }
        ConfigCommand::Path => {
            println!("{}", config_path().display());
            Ok(())
        }
        ConfigCommand::Init => {
            let path = config_path();
            if path.exists() {
                return Err(format!("{} already exists.", path.display()));
            }
            save_config(&FileConfig::default()).map_err(|err| err.to_string())?;
            println!("Wrote {}", path.display());
            Ok(())
        }
    }
}

//! Entry point for the **i3grp** CLI.
//!
//! Every subcommand talks directly to the window manager, except `server`,
//! which keeps a warm connection behind a unix socket for the
//! `i3grp-client` binary to reach.

use clap::Parser;
use log::{error, info};

use i3grp::command::{Cli, Command};
use i3grp::config::Config;
use i3grp::controller::Controller;
use i3grp::i3::wm::I3Wm;
use i3grp::server::{self, CommandServer};

/// Resolve the config directory (`$XDG_CONFIG_HOME/i3grp`).
fn config_dir() -> std::path::PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME").unwrap_or_else(|_| {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        format!("{}/.config", home)
    });
    std::path::PathBuf::from(base).join("i3grp")
}

/// Try to load the config from `$XDG_CONFIG_HOME/i3grp/config.json`,
/// falling back to compiled-in defaults.
fn load_config() -> Config {
    let path = config_dir().join("config.json");
    match Config::load(&path) {
        Ok(config) => {
            info!("loaded config from {}", path.display());
            config
        }
        Err(e) => {
            info!("no config file ({}), using defaults", e);
            Config::default()
        }
    }
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let config = load_config();

    match &cli.command {
        Command::Server { socket } => {
            let path = socket
                .clone()
                .unwrap_or_else(server::default_socket_path);
            let controller = Controller::new(I3Wm::new(), config, cli.dry_run);
            let server = CommandServer::new(path, controller);
            if let Err(e) = server.run() {
                error!("server error: {}", e);
                std::process::exit(1);
            }
        }
        command => {
            let controller = Controller::new(I3Wm::new(), config, cli.dry_run);
            match controller.run(command) {
                Ok(output) => {
                    if !output.is_empty() {
                        println!("{}", output);
                    }
                }
                Err(e) => {
                    eprintln!("{}", e);
                    std::process::exit(1);
                }
            }
        }
    }
}

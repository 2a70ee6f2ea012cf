//! tether: a shell in an in-memory editor surface.
//!
//! Each line read from stdin is typed into the surface followed by a
//! newline; every redraw prints the surface. Exits when the shell does.

use std::error::Error;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tether_host::{Host, HostEvent, MemoryHost, TerminalCommands, TerminalState, Viewport};
use tether_pty::SessionConfig;

#[derive(Parser, Debug, Clone)]
#[command(name = "tether")]
#[command(version)]
#[command(about = "Run a shell inside an in-memory editor surface", long_about = None)]
struct CliArgs {
    /// Path to a TOML config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Shell command to run
    #[arg(short, long, value_name = "SHELL")]
    shell: Option<String>,

    /// Surface columns
    #[arg(long, value_name = "COLS", default_value_t = 80)]
    cols: u16,

    /// Surface rows
    #[arg(long, value_name = "ROWS", default_value_t = 24)]
    rows: u16,
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("tether").join("config.toml"))
}

fn load_config(args: &CliArgs) -> Result<SessionConfig, Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => SessionConfig::load(path)?,
        None => match default_config_path().filter(|p| p.exists()) {
            Some(path) => {
                log::debug!("loading config from {}", path.display());
                SessionConfig::load(&path)?
            }
            None => SessionConfig::default(),
        },
    };
    if let Some(shell) = &args.shell {
        config.shell = Some(shell.clone());
    }
    Ok(config)
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = CliArgs::parse();
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            log::error!("Configuration error: {e}");
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    let (host, events) = MemoryHost::new(Viewport::from_cells(args.cols, args.rows));
    let host = Arc::new(host);
    let state = Arc::new(TerminalState::new(config));
    let commands = TerminalCommands::new(host.clone(), Arc::clone(&state));
    let router = commands.input_router();

    let surface = commands.new_terminal()?;
    log::debug!("shell running in surface {surface}");

    let typist = Arc::clone(&host);
    std::thread::Builder::new()
        .name("stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if !typist.type_text(surface, &format!("{line}\n")) {
                    return;
                }
            }
            // Hang up like a closed terminal window would.
            typist.close_surface(surface);
        })?;

    let mut printed = String::new();
    while state.registry.contains(surface) && host.surface_exists(surface) {
        let event = match events.recv_timeout(Duration::from_millis(100)) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        let redraw = matches!(event, HostEvent::Redraw(_));
        event.dispatch(&commands, &router);

        if redraw {
            if let Some(text) = host.text(surface).filter(|t| *t != printed) {
                println!("{text}\n--------");
                printed = text;
            }
        }
    }

    commands.close_terminal(surface);
    log::debug!("tether exited");
    Ok(())
}

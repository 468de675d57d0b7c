// src/main.rs

// Declare modules
pub mod cli;
pub mod config;
pub mod display;
pub mod frame;
pub mod os;
pub mod session;

use crate::{
    cli::{Cli, Options},
    config::Config,
    frame::{FrameError, InterruptibleSource},
    os::signals::Interrupts,
    session::Session,
};

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};
use std::io::{self, IsTerminal, Write};
use std::process::ExitCode;

/// Main entry point for `dispmanx`.
fn main() -> ExitCode {
    // Default filter is "warn" so stderr only carries diagnostics unless RUST_LOG asks for more.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp_micros()
        .init();

    // Usage errors print to stderr and exit non-zero before anything is opened.
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            debug!("Root cause: {:?}", e.root_cause());
            eprintln!("dispmanx: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    let options = Options::resolve(cli, &config);
    info!("Options: {:?}", options);

    // Registered before the display is opened so every later exit path,
    // signals included, unwinds through the session.
    let mut interrupts = Interrupts::install()?;

    let driver = display::drivers::platform_driver(&config.headless);
    let mut session = Session::new(driver, options.update_priority);

    session.open(options.display_id)?;
    let geometry = session.query_geometry()?;

    if options.report_only {
        writeln!(io::stdout(), "{}", geometry).context("Failed to write display size")?;
        return session.teardown();
    }

    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Err(FrameError::Terminal.into());
    }
    session.ingest(&mut InterruptibleSource::new(stdin.lock(), &mut interrupts))?;
    session.present(options.layer)?;

    let outcome = session.hold(&mut interrupts, options.hold)?;
    info!("Hold finished: {:?}", outcome);

    session.teardown()?;
    info!("dispmanx exited successfully.");
    Ok(())
}

// src/cli.rs

//! Command-line surface. Values given here override the configuration file.

use crate::config::{Config, CONFIG_ENV_VAR};
use crate::session::HoldPolicy;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "dispmanx")]
#[command(version)]
#[command(
    about = "Write raw RGB data from stdin to a Raspberry Pi display via the dispmanx stack.",
    long_about = "Write raw RGB data from stdin to a Raspberry Pi display via the dispmanx stack.\n\
                  Input is exactly WIDTH*HEIGHT*3 bytes of packed RGB, no header.\n\
                  The dispmanx layer is removed when the program exits."
)]
pub struct Cli {
    /// dispmanx display number (try 'tvservice -l' for a list) [default: 0]
    #[arg(short = 'd', long = "display", value_name = "DISPLAY")]
    pub display: Option<u32>,

    /// Stacking layer of the element [default: 0]
    #[arg(
        short = 'l',
        long = "layer",
        value_name = "LAYER",
        allow_negative_numbers = true
    )]
    pub layer: Option<i32>,

    /// Just report display size in format 'WIDTHxHEIGHT' and exit
    #[arg(short = 'r', long = "report")]
    pub report: bool,

    /// Seconds to keep the frame up; 0 waits for a signal [default: 0]
    #[arg(short = 't', long = "timeout", value_name = "SECONDS")]
    pub timeout: Option<u32>,

    /// JSON configuration file
    #[arg(short = 'c', long = "config", value_name = "PATH", env = CONFIG_ENV_VAR)]
    pub config: Option<PathBuf>,
}

/// Settings for one run, after merging the CLI over the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub display_id: u32,
    pub layer: i32,
    pub update_priority: i32,
    pub report_only: bool,
    pub hold: HoldPolicy,
}

impl Options {
    pub fn resolve(cli: &Cli, config: &Config) -> Self {
        Options {
            display_id: cli.display.unwrap_or(config.display.id),
            layer: cli.layer.unwrap_or(config.display.layer),
            update_priority: config.display.update_priority,
            report_only: cli.report,
            hold: HoldPolicy::from_secs(cli.timeout.unwrap_or(config.hold.timeout_secs)),
        }
    }
}

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::device::{PortArgs, ReadOptions};
use commands::pattern::PatternArgs;
use peeker_core::{DeviceModel, DisplayMode};
use tracing_subscriber::EnvFilter;

mod commands;
mod stdio;

#[derive(Parser)]
#[command(name = "peeker")]
#[command(about = "Live memory inspector for RP2040/RP2350 boards", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the inspection service over stdin/stdout against memory images
    Serve {
        /// TOML configuration file
        #[arg(short, long, env = "PEEKER_CONFIG")]
        config: Option<PathBuf>,

        /// Device model (pico1 or pico2)
        #[arg(short, long)]
        model: Option<DeviceModel>,

        /// Image loaded at the start of Flash (erased bytes elsewhere)
        #[arg(long)]
        flash: Option<PathBuf>,

        /// Image loaded at the start of SRAM (zeros elsewhere)
        #[arg(long)]
        sram: Option<PathBuf>,

        /// Address of the program entry, reported first as `main`
        #[arg(short, long, value_name = "0xADDRESS")]
        entry: Option<String>,

        /// Extra landmark as NAME=0xADDRESS (repeatable)
        #[arg(short, long = "landmark")]
        landmarks: Vec<String>,

        /// Search hit cap
        #[arg(long)]
        max_hits: Option<usize>,
    },

    /// Encode a value as a ready-to-send search command
    Pattern(PatternArgs),

    /// Decode a captured service response
    Decode {
        /// Transcript file (stdin if omitted)
        input: Option<PathBuf>,

        /// How to show a hex dump: bytes, u16, u32 or f32
        #[arg(short, long, default_value = "bytes")]
        view: DisplayMode,

        /// Print the decoded data as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the landmarks reported by a connected board
    Landmarks {
        #[command(flatten)]
        port: PortArgs,

        /// Print the table as JSON
        #[arg(long)]
        json: bool,
    },

    /// Read memory from a connected board
    Read {
        #[command(flatten)]
        port: PortArgs,

        /// Hex address, or one of rom, flash, sram, gpio
        address: String,

        /// Bytes to read (1-4096)
        #[arg(short = 'n', long, default_value_t = 256)]
        length: u32,

        /// Move the start by this many 256-byte pages (negative moves back)
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        step: i64,

        /// How to show the dump: bytes, u16, u32 or f32
        #[arg(short, long, default_value = "bytes")]
        view: DisplayMode,

        /// Print the dump as JSON
        #[arg(long)]
        json: bool,
    },

    /// Search a connected board's SRAM (or Flash with --flash)
    Search {
        #[command(flatten)]
        port: PortArgs,

        #[command(flatten)]
        pattern: PatternArgs,

        /// Print the hits as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the protocol
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive("peeker=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            model,
            flash,
            sram,
            entry,
            landmarks,
            max_hits,
        } => commands::serve::run(commands::serve::ServeOptions {
            config,
            model,
            flash,
            sram,
            entry,
            landmarks,
            max_hits,
        }),
        Commands::Pattern(args) => commands::pattern::run(&args),
        Commands::Decode { input, view, json } => {
            commands::decode::run(input.as_deref(), view, json)
        }
        Commands::Landmarks { port, json } => commands::device::landmarks(&port, json),
        Commands::Read {
            port,
            address,
            length,
            step,
            view,
            json,
        } => commands::device::read(
            &port,
            &ReadOptions {
                target: address,
                length,
                step,
                view,
                json,
            },
        ),
        Commands::Search {
            port,
            pattern,
            json,
        } => commands::device::search(&port, &pattern, json),
    }
}

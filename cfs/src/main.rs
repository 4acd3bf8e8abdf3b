//! `cfs`: a command-line shell over a ContainerFS container file (spec §6
//! "CLI surface"). This binary only parses arguments, pipes stdin/stdout,
//! and prints; all on-disk format and filesystem logic lives in
//! `cfs-core`.

mod commands;

use std::path::PathBuf;
use std::process::exit;

use clap::{Parser, Subcommand};

/// `cfs <container> <command> [--file=…] [--path=…] [--params=bs,bc] [--debug]`
#[derive(Parser)]
#[command(name = "cfs", about = "Inspect and manipulate a ContainerFS container file")]
struct Cli {
    /// Path to the container file.
    container: PathBuf,

    #[command(subcommand)]
    command: Command,

    /// Enable debug logging of core operations.
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Create a new container file.
    Create {
        /// `blockSize,blockCount`, e.g. `4096,4096`.
        #[arg(long)]
        params: String,
        /// Container name recorded in the header; defaults to the file stem.
        #[arg(long)]
        name: Option<String>,
    },
    /// Print container-wide statistics.
    Stats,
    /// Read a file's bytes to stdout.
    Read {
        #[arg(long, default_value = "/")]
        path: String,
        #[arg(long)]
        file: String,
        /// `start,count` for a ranged read; reads the whole file if omitted.
        #[arg(long)]
        range: Option<String>,
    },
    /// Write a file's bytes from stdin.
    Write {
        #[arg(long, default_value = "/")]
        path: String,
        #[arg(long)]
        file: String,
    },
    /// Delete a file.
    Delete {
        #[arg(long, default_value = "/")]
        path: String,
        #[arg(long)]
        file: String,
    },
    /// List a directory's entries.
    Dir {
        #[arg(long, default_value = "/")]
        path: String,
    },
    /// Create a new, empty directory.
    Mkdir {
        #[arg(long)]
        path: String,
    },
    /// Delete an empty directory.
    Rmdir {
        #[arg(long)]
        path: String,
    },
}

fn error(msg: impl std::fmt::Display) -> ! {
    eprintln!("cfs: error: {msg}");
    exit(1);
}

fn main() {
    let cli = Cli::parse();
    if cli.debug {
        env_logger::Builder::new().filter_level(log::LevelFilter::Debug).init();
    }

    let result = match &cli.command {
        Command::Create { params, name } => commands::create(&cli.container, params, name.as_deref(), cli.debug),
        Command::Stats => commands::stats(&cli.container, cli.debug),
        Command::Read { path, file, range } => {
            commands::read(&cli.container, path, file, range.as_deref(), cli.debug)
        }
        Command::Write { path, file } => commands::write(&cli.container, path, file, cli.debug),
        Command::Delete { path, file } => commands::delete(&cli.container, path, file, cli.debug),
        Command::Dir { path } => commands::dir(&cli.container, path, cli.debug),
        Command::Mkdir { path } => commands::mkdir(&cli.container, path, cli.debug),
        Command::Rmdir { path } => commands::rmdir(&cli.container, path, cli.debug),
    };

    if let Err(e) = result {
        error(e);
    }
}

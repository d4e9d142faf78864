// SPDX-License-Identifier: MIT OR Apache-2.0
//! `ordoplay-graph` - inspect and run process graph snapshots.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Inspect and run `OrdoPlay` process graph snapshots
#[derive(Parser)]
#[command(name = "ordoplay-graph")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the compute order, or the nodes forming a cycle
    Order {
        /// Path to the snapshot RON file
        snapshot: PathBuf,

        /// Graph settings file (defaults to `graph_settings.ron` next to the snapshot)
        #[arg(short, long)]
        settings: Option<PathBuf>,
    },

    /// Load a snapshot and report the edges and nodes that had to be dropped
    Validate {
        /// Path to the snapshot RON file
        snapshot: PathBuf,

        /// Graph settings file (defaults to `graph_settings.ron` next to the snapshot)
        #[arg(short, long)]
        settings: Option<PathBuf>,
    },

    /// Execute the graph once and print every node's outputs
    Run {
        /// Path to the snapshot RON file
        snapshot: PathBuf,

        /// Graph settings file (defaults to `graph_settings.ron` next to the snapshot)
        #[arg(short, long)]
        settings: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive("ordoplay_process_graph=info".parse()?)
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut stdout = std::io::stdout().lock();

    match cli.command {
        Commands::Order { snapshot, settings } => {
            let mut loaded = commands::load(&snapshot, settings.as_deref())?;
            commands::order(&mut loaded.graph, &mut stdout)
        }
        Commands::Validate { snapshot, settings } => {
            let loaded = commands::load(&snapshot, settings.as_deref())?;
            commands::validate(&loaded, &mut stdout)
        }
        Commands::Run { snapshot, settings } => {
            let mut loaded = commands::load(&snapshot, settings.as_deref())?;
            commands::run(&mut loaded.graph, &mut stdout)
        }
    }
}

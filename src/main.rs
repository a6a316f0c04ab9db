//! Treasure Tiles CLI
//!
//! Plays rounds against the in-memory ledger and manages config files.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use treasure_tiles::{
    errors::TilesResult, ConfigLoader, GameSnapshot, LedgerServices, RevealState, SessionController,
    SimulatedLedger, TxStatus,
};

/// Treasure Tiles CLI
#[derive(Parser)]
#[command(name = "treasure-tiles")]
#[command(about = "Pick tiles, place a wager, reveal gems and mines")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Play one round against the simulated ledger
    Play {
        /// Tile indices to select, comma separated
        #[arg(short, long, value_delimiter = ',', required = true)]
        tiles: Vec<usize>,

        /// Wager in ether
        #[arg(short, long, default_value = "0.01")]
        wager: f64,

        /// Have the signer decline the transaction
        #[arg(long)]
        reject: bool,

        /// Give up on the outcome after this many milliseconds
        #[arg(long)]
        outcome_timeout_ms: Option<u64>,

        /// Print the final board as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write a sample configuration file
    Config {
        /// Output path
        #[arg(short, long, default_value = "treasure-tiles.toml")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> TilesResult<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "treasure_tiles=debug" } else { "treasure_tiles=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_path(path);
    }

    match cli.command {
        Commands::Play { tiles, wager, reject, outcome_timeout_ms, json } => {
            let mut config = loader.load()?;
            if outcome_timeout_ms.is_some() {
                config.session.outcome_timeout_ms = outcome_timeout_ms;
                loader.validate(&config)?;
            }
            play(config, &tiles, wager, reject, json).await
        }
        Commands::Config { output } => {
            let path = output.to_string_lossy();
            treasure_tiles::generate_sample_config(&path)?;
            println!("Wrote sample configuration to {}", path);
            Ok(())
        }
    }
}

async fn play(
    config: treasure_tiles::GameConfig,
    tiles: &[usize],
    wager: f64,
    reject: bool,
    json: bool,
) -> TilesResult<()> {
    let ledger = std::sync::Arc::new(SimulatedLedger::new(config.simulation.clone()));
    if reject {
        ledger.reject_submissions("user declined the transaction").await;
    }

    info!(
        "🎲 Contract {} on {} (chain {})",
        config.contract.address, config.contract.chain, config.contract.chain_id
    );

    let controller = SessionController::new(config, LedgerServices::from_client(ledger));
    let mut updates = controller.subscribe();

    for &index in tiles {
        controller.toggle_selection(index).await?;
    }
    let nonce = controller.start_session(wager).await?;

    let status = loop {
        match updates.recv().await {
            Ok(update) if update.nonce == nonce => {
                if !json {
                    println!("  {}", update.status);
                }
                if update.status.is_terminal() {
                    break update.status;
                }
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => warn!("Missed {} status updates", skipped),
            Err(RecvError::Closed) => break controller.status().await,
        }
    };

    let snapshot = controller.snapshot().await;
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    println!();
    println!("{}", render_board(&snapshot));
    match status {
        TxStatus::Finalized => println!(
            "💎 {} gems, 💣 {} mines",
            snapshot.grid.count(RevealState::Gem),
            snapshot.grid.count(RevealState::Mine)
        ),
        other => println!("Round ended: {}", other),
    }

    Ok(())
}

fn render_board(snapshot: &GameSnapshot) -> String {
    let cells = &snapshot.grid.cells;
    let width = (cells.len() as f64).sqrt().ceil().max(1.0) as usize;

    cells
        .chunks(width)
        .map(|row| {
            row.iter()
                .map(|cell| match cell.reveal {
                    RevealState::Gem => "💎",
                    RevealState::Mine => "💣",
                    RevealState::Hidden if cell.is_selected() => "🟨",
                    RevealState::Hidden => "⬜",
                })
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

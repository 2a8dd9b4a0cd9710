//! Headless skirmish runner.
//!
//! Runs recorded matches without graphics for CI determinism checks.
//!
//! # Usage
//!
//! ```bash
//! # Record the built-in demo skirmish
//! cargo run -p skirmish_headless -- record --output demo.json --ticks 1200
//!
//! # Play a replay, one JSON line per tick on stdout
//! cargo run -p skirmish_headless -- run --replay demo.json
//!
//! # Play the same replay on 8 threads and compare hash sequences
//! cargo run -p skirmish_headless -- verify --replay demo.json --runs 8
//! ```
//!
//! Logs go to stderr; stdout carries only tick lines.

use std::io::BufWriter;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use skirmish_core::replay::Replay;
use skirmish_headless::runner::{record_demo, run_replay, verify_replay};

#[derive(Parser)]
#[command(name = "skirmish_headless")]
#[command(about = "Headless lockstep skirmish runner for CI")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a replay and print per-tick hashes as JSON lines
    Run {
        /// Replay file path
        #[arg(short, long)]
        replay: PathBuf,
    },

    /// Play a replay several times in parallel and compare hash sequences
    Verify {
        /// Replay file path
        #[arg(short, long)]
        replay: PathBuf,

        /// Number of verification runs
        #[arg(short = 'n', long, default_value = "4")]
        runs: usize,
    },

    /// Record the built-in demo skirmish to a replay file
    Record {
        /// Output replay path
        #[arg(short, long, default_value = "demo_replay.json")]
        output: PathBuf,

        /// Number of ticks to record
        #[arg(short, long, default_value = "1200")]
        ticks: u64,
    },
}

fn main() {
    let cli = Cli::parse();

    // Logs to stderr; stdout is for tick lines
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(filter)
        .init();

    match cli.command {
        Commands::Run { replay } => cmd_run(replay),
        Commands::Verify { replay, runs } => cmd_verify(replay, runs),
        Commands::Record { output, ticks } => cmd_record(output, ticks),
    }
}

fn load_replay(path: &Path) -> Replay {
    match Replay::load(path) {
        Ok(replay) => {
            eprintln!("Loaded replay:");
            eprintln!("  Players: {}", replay.config.players.len());
            eprintln!("  Commands: {}", replay.command_count());
            eprintln!("  Duration: {} ticks", replay.duration());
            replay
        }
        Err(e) => {
            eprintln!("Failed to load replay: {e}");
            std::process::exit(1);
        }
    }
}

/// Play a replay, streaming tick lines
fn cmd_run(path: PathBuf) {
    tracing::info!("Playing replay: {}", path.display());
    let replay = load_replay(&path);

    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    match run_replay(replay, &mut out) {
        Ok(summary) => {
            eprintln!("Replay complete at tick {}", summary.final_tick);
            eprintln!("Final state hash: {:016x}", summary.final_hash);
            if !summary.matches_recording {
                eprintln!("FAIL: Replay produced a different final state than recorded");
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("FAIL: Error during replay: {e}");
            std::process::exit(1);
        }
    }
}

/// Verify determinism
fn cmd_verify(path: PathBuf, runs: usize) {
    tracing::info!("Verifying replay: {} ({} runs)", path.display(), runs);
    let replay = load_replay(&path);

    match verify_replay(&replay, runs) {
        Ok(report) if report.passed() => {
            eprintln!("PASS: All {runs} runs produced identical results");
            eprintln!("  Final hash: {:016x}", replay.final_hash);
        }
        Ok(report) => {
            if let Some(tick) = report.first_divergence {
                eprintln!("FAIL: Non-determinism detected at tick {tick}!");
            } else {
                eprintln!("FAIL: Runs agree but differ from the recorded final hash");
                eprintln!("  Expected: {:016x}", replay.final_hash);
            }
            for (run, hash) in report.final_hashes.iter().enumerate() {
                eprintln!("  Run {run}: {hash:016x}");
            }
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("FAIL: Error during verification: {e}");
            std::process::exit(1);
        }
    }
}

/// Record the demo skirmish
fn cmd_record(output: PathBuf, ticks: u64) {
    tracing::info!("Recording {} tick demo skirmish", ticks);

    let replay = match record_demo(ticks) {
        Ok(replay) => replay,
        Err(e) => {
            eprintln!("Failed to record demo: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = replay.save(&output) {
        eprintln!("Failed to save replay: {e}");
        std::process::exit(1);
    }

    eprintln!("Saved replay to {}", output.display());
    eprintln!("  Commands: {}", replay.command_count());
    eprintln!("  Final hash: {:016x}", replay.final_hash);
}

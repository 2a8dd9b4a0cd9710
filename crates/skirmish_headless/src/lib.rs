//! Headless match runner for CI determinism verification.
//!
//! Replays recorded matches without any presentation layer:
//!
//! - **Run**: play a replay, streaming per-tick state hashes as JSON lines
//! - **Verify**: play the same replay on several threads and compare hashes
//! - **Record**: produce a replay from the built-in demo skirmish
//!
//! # Example
//!
//! ```bash
//! cargo run -p skirmish_headless -- record --output demo.json
//! cargo run -p skirmish_headless -- verify --replay demo.json --runs 8
//! cargo run -p skirmish_headless -- run --replay demo.json > hashes.jsonl
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod runner;

pub use runner::{
    demo_batch, record_demo, run_replay, verify_replay, RunSummary, RunnerError, TickLine,
    VerifyReport,
};

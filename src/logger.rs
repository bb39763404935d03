//! Global `tracing` setup.
//!
//! The CLI/API front end that embeds this crate is expected to call
//! [`init`] once at startup; library code elsewhere only ever calls
//! `tracing::{debug,info,warn,error}!`.

use anyhow::Result;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

pub fn init() {
    let level = if cfg!(debug_assertions) {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_logger(level, false).expect("failed to initialize logger");
}

pub fn init_test() {
    let _ = init_logger(Level::DEBUG, true);
}

fn init_logger(level: Level, with_target: bool) -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .compact()
        .with_target(with_target)
        .without_time()
        .with_max_level(level)
        .finish();
    // Fuzzer test binaries may call this repeatedly; ignore "already set".
    let _ = tracing::subscriber::set_global_default(subscriber);
    Ok(())
}

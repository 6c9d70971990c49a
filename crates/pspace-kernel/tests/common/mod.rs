//! Shared helpers for the integration tests.

#![allow(dead_code)]

use pspace_kernel::{ConfigParser, Configuration};
use tracing_subscriber::{fmt, EnvFilter};

/// Origin every in-memory configuration claims to come from.
pub const ORIGIN: &str = "/work/pspace.conf";

/// Home directory used for `~` expansion.
pub const HOME: &str = "/home/alice";

/// Route library events to the test output. `RUST_LOG` overrides the level.
pub fn init_tracing() {
    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .with_test_writer()
        .try_init();
}

pub fn parser() -> ConfigParser {
    ConfigParser::new(ORIGIN).with_home(HOME)
}

pub fn parse(text: &str) -> Configuration {
    parser()
        .parse(text)
        .unwrap_or_else(|e| panic!("configuration should parse: {e}"))
}

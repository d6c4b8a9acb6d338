//! Logging setup for fm_browse
//
// Console output only. `RUST_LOG` wins over the defaults; otherwise the
// level is info, or debug with `--verbose`.

use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

pub fn init(verbose: bool) {
    let env_filter = match std::env::var("RUST_LOG").ok() {
        Some(val) => EnvFilter::new(val),
        None if verbose => EnvFilter::new("debug"),
        None => EnvFilter::new("info"),
    };

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .with_thread_names(verbose);

    tracing_subscriber::registry().with(env_filter).with(console_layer).init();
}

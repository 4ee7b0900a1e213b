// src/logging.rs

use std::sync::Once;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const LOG_ENV: &str = "RISKMC_LOG";

static INIT: Once = Once::new();

/// Install the fmt subscriber for the binary. Filter directives come from
/// `RISKMC_LOG` (e.g. `RISKMC_LOG=riskmc::analysis=debug`), default `info`.
///
/// Logs go to stderr so stdout stays free for the run summary.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV)
            .unwrap_or_else(|_| EnvFilter::new("info"));

        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true),
            )
            .with(filter)
            .init();
    });
}

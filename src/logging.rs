//! Diagnostics go to stderr so stdout stays machine-readable.

use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. `RUST_LOG` wins over `verbosity`.
pub fn init(verbosity: u8) {
    // 0 = errors only, 1 (-v) = lifecycle, 2+ (-vv) = every poll
    let filter = match verbosity {
        0 => "error",
        1 => "info,console_relay=info",
        _ => "debug,notify=info",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact()
        .init();
}

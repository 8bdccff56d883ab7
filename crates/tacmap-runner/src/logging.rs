//! Logging setup for the CLI.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "info,hyper=warn,reqwest=warn";

/// Install a stderr subscriber.
///
/// `verbose` forces debug output for the pipeline crates and overrides
/// `RUST_LOG`. Calling this twice is harmless; the second call is ignored.
pub fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug,hyper=info,reqwest=info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub const DEFAULT_LOG_FILTER: &str = "info,hub=debug,renderer=debug,wgpu=warn,naga=warn";

/// Installs the global subscriber. `RUST_LOG` replaces the default filter.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .init();
}

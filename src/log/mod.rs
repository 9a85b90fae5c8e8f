use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVES: &str = "warn,radiola=info";

/// Logs to the console, filtered by `RUST_LOG` when it is set.
pub fn initialize_logger() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

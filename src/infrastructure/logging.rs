use env_logger::{Builder, Env};

const DEFAULT_FILTER: &str = "info";

/// Install the process-wide logger. `RUST_LOG` overrides the default `info`
/// filter. Safe to call more than once; later calls are ignored.
pub fn init_logging() -> bool {
    Builder::from_env(Env::default().default_filter_or(DEFAULT_FILTER))
        .format_timestamp_millis()
        .try_init()
        .is_ok()
}

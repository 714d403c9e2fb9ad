use tracing_subscriber::{fmt, EnvFilter};

/// Initializes tracing/logging based on environment variables.
///
/// Production mode defaults to `warn` and emits JSON lines; otherwise the
/// human-readable formatter at `info`. `RUST_LOG` overrides both levels.
pub fn init_tracing(production_mode: bool) {
    let default_level = if production_mode { "warn" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(false);

    if production_mode {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

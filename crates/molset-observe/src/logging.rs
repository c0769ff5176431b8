use tracing_subscriber::EnvFilter;

/// Initializes a `tracing_subscriber` using `MOLSET_LOG` first, then `RUST_LOG`, then a default.
///
/// Log field contract for merge-pass events:
/// - Always include `event` as the first field.
/// - Include `task` on any per-task event.
/// - Include `rows` / `entities` counts on merge lifecycle events.
pub fn init_tracing() {
    let filter = env_filter();
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env("MOLSET_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

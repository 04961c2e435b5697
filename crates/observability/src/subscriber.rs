use tracing_subscriber::EnvFilter;

fn filter_or(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// JSON logs with timestamps, filtered by `RUST_LOG` or `default_directive`.
pub fn init(default_directive: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter_or(default_directive))
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}

pub fn init_for_tests(default_directive: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter_or(default_directive))
        .with_test_writer()
        .with_target(true)
        .try_init();
}

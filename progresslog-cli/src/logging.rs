use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber.
///
/// The filter comes from `RUST_LOG`, falling back to `default_directive`.
/// Returns the active filter so it can be reported by the healthcheck.
pub fn init_logging(default_directive: &str) -> String {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let active = filter.to_string();

    if tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .is_err()
    {
        eprintln!("Logging registry already initialized");
    }

    active
}

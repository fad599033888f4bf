use tracing_subscriber::{fmt, EnvFilter};

pub const DEFAULT_DIRECTIVE: &str = "hdfs=info";

/// Install a stderr subscriber filtered by `RUST_LOG`, falling back to
/// `default_directive`. Safe to call more than once.
pub fn init(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

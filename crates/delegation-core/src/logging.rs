use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "SPED_LOG";
const DEFAULT_DIRECTIVES: &str = "sped_delegation=info";

/// Installs the fmt subscriber on stderr, filtered by `SPED_LOG` when set.
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init();
}

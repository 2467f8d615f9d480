use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "warn,slopify=info";

pub(crate) fn initialize_logger() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))?;

    tracing_subscriber::fmt().with_env_filter(filter).try_init()
}

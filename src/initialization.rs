// Initialize tracing subsystem based on feature flags
pub fn init_tracing_subsystem() {
    #[cfg(feature = "fmt_logging")]
    {
        use tracing_subscriber::{fmt, EnvFilter};
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("symphony_bridge=info,warn"));
        let _ = fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
        tracing::debug!(target = "symphony_bridge", "tracing initialized");
    }
}

/// Load a `.env` file from the working directory if one exists.
pub fn load_dotenv() {
    if let Err(err) = dotenvy::dotenv() {
        if !err.not_found() {
            tracing::warn!(target = "symphony_bridge", error = %err, "failed to read .env");
        }
    }
}

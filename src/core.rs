use std::path::PathBuf;

use dirs::data_dir;
use once_cell::sync::Lazy;

use crate::config::endpoints::DATA_DIR_ENV;

// ----------------------------------------------------------------------------
// Constants and paths
// ----------------------------------------------------------------------------

pub static APP_NAME: &str = "Symphony";

/// Tracing target shared by every bridge log line.
pub const LOG_TARGET: &str = "symphony_bridge";

pub static DATA_DIR: Lazy<PathBuf> = Lazy::new(|| {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }
    let base = data_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join(APP_NAME)
});

pub fn user_agent() -> String {
    format!("{}/bridge {}", APP_NAME, env!("CARGO_PKG_VERSION"))
}

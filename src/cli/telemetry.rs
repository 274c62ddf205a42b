//! Tracing initialization.
//!
//! The environment filter wins when `RUST_LOG` is set; otherwise the CLI
//! verbosity level applies. JSON output is selected with `SESAMO_LOG_JSON`.

use anyhow::Result;
use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the global subscriber.
///
/// # Errors
/// Returns an error if a subscriber was already installed.
pub fn init(level: Option<Level>) -> Result<()> {
    let filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(_) => EnvFilter::try_from_default_env()?,
        Err(_) => {
            let level = level.unwrap_or(Level::ERROR);
            EnvFilter::new(format!("{}={level}", env!("CARGO_PKG_NAME")))
        }
    };

    let registry = tracing_subscriber::registry().with(filter);
    if std::env::var("SESAMO_LOG_JSON").is_ok() {
        registry.with(fmt::layer().json()).try_init()?;
    } else {
        registry.with(fmt::layer()).try_init()?;
    }
    Ok(())
}

//! Logging setup for hosts that do not install their own subscriber.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is not set: tracker warnings and errors only.
pub const DEFAULT_LOG_FILTER: &str = "ugm_tracker=warn";

/// Install a formatting subscriber filtered by `RUST_LOG`.
///
/// A `.env` file in the working directory is loaded first, so `RUST_LOG` can
/// live there. Returns false when a global subscriber was already installed,
/// in which case nothing changes.
pub fn init_tracing() -> bool {
    if tracing::dispatcher::has_been_set() {
        return false;
    }
    let _ = dotenvy::dotenv();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

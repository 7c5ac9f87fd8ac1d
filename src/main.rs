use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::AppState;
use attic_core::constants::DEFAULT_REST_ADDR;
use attic_core::{
    credential_from_env_values, extensions_from_env_value, rate_limits_from_env_values,
    store_dir_from_env_value, store_limits_from_env_values, CoreConfig,
};

/// Main entry point for the attic file locker
///
/// Reads configuration from the environment once, opens the store and serves the REST API.
///
/// # Environment Variables
/// - `ATTIC_REST_ADDR`: listen address (default: "0.0.0.0:5000")
/// - `ATTIC_STORE_DIR`: store directory, created if missing (default: "uploads")
/// - `ATTIC_USERNAME`: account name (required)
/// - `ATTIC_PASSWORD_HASH`: Argon2 PHC hash of the password (preferred)
/// - `ATTIC_PASSWORD`: plaintext password, hashed at startup when no hash is set
/// - `ATTIC_MAX_FILE_BYTES`: per-file cap (default: 2 GiB)
/// - `ATTIC_MAX_STORE_BYTES`: total store cap (default: none)
/// - `ATTIC_ALLOWED_EXTENSIONS`: comma-separated subset of the built-in file types
/// - `ATTIC_RATE_LIMIT_PER_MINUTE`: requests per client per minute (default: 64)
/// - `ATTIC_RATE_LIMIT_PER_DAY`: requests per client per day (default: 1024)
///
/// # Errors
/// Returns an error if configuration is missing or invalid, the store cannot be opened, or the
/// server fails to bind or run.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("attic_run=info".parse()?)
                .add_directive("api_rest=info".parse()?)
                .add_directive("attic_core=info".parse()?)
                .add_directive("attic_files=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("ATTIC_REST_ADDR").unwrap_or_else(|_| DEFAULT_REST_ADDR.into());

    let credential = credential_from_env_values(
        std::env::var("ATTIC_USERNAME").ok(),
        std::env::var("ATTIC_PASSWORD_HASH").ok(),
        std::env::var("ATTIC_PASSWORD").ok(),
    )?;
    let limits = store_limits_from_env_values(
        std::env::var("ATTIC_MAX_FILE_BYTES").ok(),
        std::env::var("ATTIC_MAX_STORE_BYTES").ok(),
    )?;

    let rate_limits = rate_limits_from_env_values(
        std::env::var("ATTIC_RATE_LIMIT_PER_MINUTE").ok(),
        std::env::var("ATTIC_RATE_LIMIT_PER_DAY").ok(),
    )?;

    let cfg = CoreConfig::new(
        store_dir_from_env_value(std::env::var("ATTIC_STORE_DIR").ok()),
        credential,
        limits,
        extensions_from_env_value(std::env::var("ATTIC_ALLOWED_EXTENSIONS").ok()),
    )?;

    let store = cfg.open_store()?;
    tracing::info!(
        user = %cfg.credential().username(),
        store = %store.root().display(),
        max_file_bytes = cfg.limits().max_file_bytes,
        rate_per_minute = rate_limits.per_minute.get(),
        rate_per_day = rate_limits.per_day.get(),
        "configuration loaded"
    );

    api_rest::serve(
        &rest_addr,
        AppState::new(store, cfg.access_gate(), rate_limits),
    )
    .await
}

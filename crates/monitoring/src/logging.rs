//! A set of utilities to enable logging configuration using tracing_subscriber.

use std::{io::IsTerminal, sync::Once};

use tracing_subscriber::{self, EnvFilter, filter::LevelFilter};

static RELPUB_LOG_ENV_VAR: &str = "RELPUB_LOG";

/// Initializes a tracing subscriber for logging.
pub fn init() {
    // Since we also use this function to enable logging in tests, wrap it in `Once` to prevent
    // multiple initializations.
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let (env_filter, log_level) = env_filter_and_log_level();

        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_ansi(std::io::stderr().is_terminal())
            .init();

        tracing::info!("log level: {}", log_level);
    });
}

/// List of crates in the workspace.
const RELPUB_CRATES: &[&str] = &[
    "relpub",
    "relpub_common",
    "relpub_config",
    "relpub_monitoring",
    "relpub_object_store",
    "relpub_publish",
    "relpub_schema",
    "relpub_warehouse",
];

fn env_filter_and_log_level() -> (EnvFilter, String) {
    // Parse directives from RUST_LOG
    let log_filter = EnvFilter::builder().with_default_directive(LevelFilter::ERROR.into());
    let directive_string = std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_default();
    let mut env_filter = log_filter.parse(&directive_string).unwrap();

    let log_level = std::env::var(RELPUB_LOG_ENV_VAR).unwrap_or_else(|_| "info".to_string());

    for crate_name in RELPUB_CRATES {
        // Add directives for each crate in RELPUB_CRATES, if not overriden by RUST_LOG
        if !directive_string.contains(&format!("{crate_name}=")) {
            env_filter =
                env_filter.add_directive(format!("{crate_name}={log_level}").parse().unwrap());
        }
    }

    (env_filter, log_level)
}

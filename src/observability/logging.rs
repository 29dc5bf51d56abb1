use std::fs;
use std::path::Path;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initializes the logging system with both console and file output.
pub fn init_logging() {
    init_logging_in(Path::new("logs"));
}

/// Installs the global subscriber with its file layer under `dir`.
/// Returns false when a subscriber was already installed.
pub(crate) fn init_logging_in(dir: &Path) -> bool {
    // Ensure logs directory exists
    let _ = fs::create_dir_all(dir);

    // Create a non-blocking file appender for daily log rotation
    let file_appender = tracing_appender::rolling::daily(dir, "fest_scout.log");
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);

    // Create a JSON layer for file logging
    let file_layer = fmt::layer().json().with_writer(non_blocking_writer);

    // Console stays terse; the progress report itself goes through println!
    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    // Respect RUST_LOG if set; otherwise info for our crate
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("fest_scout=info,warn"));

    // Set the global default subscriber
    match tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
    {
        Ok(()) => {
            // We need to keep the guard alive so logs are flushed on exit
            std::mem::forget(guard);
            true
        }
        Err(e) => {
            eprintln!("Logging disabled, could not install subscriber: {}", e);
            false
        }
    }
}

use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Initialise logging. In debug mode the default level is `debug` and can be
/// overridden via `RUST_LOG`; otherwise the level is fixed at `info`.
///
/// With `log_file` set, output goes to that file instead of stdout.
pub fn init(debug: bool, log_file: Option<PathBuf>) {
    // Without debug we ignore `RUST_LOG` so a stray variable in the user's
    // environment cannot turn on verbose output.
    let level = if debug { "debug" } else { "info" };

    let filter = if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    } else {
        EnvFilter::new(level)
    };

    let Some(path) = log_file else {
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
        return;
    };

    let dir = path
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let Some(file_name) = path.file_name() else {
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
        return;
    };
    if let Err(err) = std::fs::create_dir_all(&dir) {
        eprintln!("failed to create log folder {}: {err}", dir.display());
    }

    let appender = tracing_appender::rolling::never(&dir, file_name);
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(appender)
        .with_ansi(false)
        .try_init();
}

//! Session logger — `tracing` output to stderr and to a single file in the OS
//! data directory.
//!
//! The file is **truncated (overwritten) at each launch**, so it only ever
//! contains output from the most-recent session.
//!
//! Log location:
//!   Windows:  `%APPDATA%\Orthy\orthy.log`
//!   Linux:    `~/.local/share/Orthy/orthy.log`
//!   macOS:    `~/Library/Application Support/Orthy/orthy.log`
//!
//! The filter comes from `RUST_LOG` when set, else from the level in the
//! settings file.

use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Returns the path to the current session log file.
pub fn log_path() -> Option<&'static PathBuf> {
    LOG_PATH.get()
}

fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialise the session logger. Call once, before anything logs.
///
/// * Creates (or truncates) the log file. Failing to open it is not fatal;
///   stderr logging still works.
/// * Installs a panic hook that logs the panic before running the default
///   handler.
pub fn init(default_level: &str) {
    let path = log_file_path();
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&path);

    let file_layer = match file {
        Ok(f) => {
            let _ = LOG_PATH.set(path.clone());
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(f)))
        }
        Err(e) => {
            eprintln!("[logger] Failed to open log file {:?}: {}", path, e);
            None
        }
    };

    let installed = tracing_subscriber::registry()
        .with(filter(default_level))
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init();
    if installed.is_err() {
        // Someone (a test harness) got there first
        return;
    }

    info!(version = env!("CARGO_PKG_VERSION"), log = %path.display(), "=== Orthy session started ===");

    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        error!("PANIC: {panic}");
        prev(panic);
    }));
}

/// Stderr-only logging for headless runs.
pub fn init_stderr(default_level: &str) {
    let _ = tracing_subscriber::registry()
        .with(filter(default_level))
        .with(fmt::layer().with_writer(std::io::stderr).without_time())
        .try_init();
}

fn log_file_path() -> PathBuf {
    data_dir().join("Orthy").join("orthy.log")
}

/// Platform data directory (without the app sub-folder).
fn data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata);
        }
    }
    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support");
        }
    }
    // Linux / fallback
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    PathBuf::from(".")
}

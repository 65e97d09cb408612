//! Run log for the healing CLI.
//!
//! One file per run, truncated on open. The header carries a random run id so
//! lines from a batch can be matched with the console output that produced
//! them. Before `init_at` the macros write nothing, which keeps library use
//! and unit tests silent.
//!
//! Default location is `<data dir>/PaintFE-Heal/heal.log`; `--log-file`
//! overrides it.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

use uuid::Uuid;

struct RunLog {
    id: Uuid,
    path: PathBuf,
    file: Mutex<File>,
}

static RUN_LOG: OnceLock<RunLog> = OnceLock::new();

pub fn log_path() -> Option<&'static PathBuf> {
    RUN_LOG.get().map(|log| &log.path)
}

/// Id of the current run, once the log is open.
pub fn run_id() -> Option<Uuid> {
    RUN_LOG.get().map(|log| log.id)
}

/// Append a raw line. I/O errors are dropped.
pub fn write_line(line: &str) {
    if let Some(log) = RUN_LOG.get()
        && let Ok(mut file) = log.file.lock()
    {
        let _ = writeln!(file, "{}", line);
    }
}

/// Append `[secs] [LEVEL] msg`, seconds since the epoch.
pub fn write(level: &str, msg: &str) {
    write_line(&format!("[{}] [{}] {}", unix_secs(), level, msg));
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::write("INFO", &format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logger::write("WARN", &format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_err {
    ($($arg:tt)*) => {
        $crate::logger::write("ERROR", &format!($($arg)*));
    };
}

pub fn init() {
    init_at(data_dir().join("PaintFE-Heal").join("heal.log"));
}

/// Open the run log at `path`. Only the first successful call counts; a
/// panic hook mirrors panic messages into the log afterwards.
pub fn init_at(path: PathBuf) {
    if RUN_LOG.get().is_some() {
        return;
    }
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let file = match OpenOptions::new().create(true).write(true).truncate(true).open(&path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("warning: cannot open log file {}: {}", path.display(), e);
            return;
        }
    };
    let id = Uuid::new_v4();
    if RUN_LOG.set(RunLog { id, path: path.clone(), file: Mutex::new(file) }).is_err() {
        return;
    }

    write_line(&format!("=== paintfe-heal run {} started at unix {} ===", id, unix_secs()));
    write_line(&format!("log: {}", path.display()));
    write_line("");

    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        write("PANIC", &info.to_string());
        prev(info);
    }));
}

fn unix_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

/// XDG-style data directory, `%APPDATA%` on Windows, or the working directory.
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
            return PathBuf::from(home).join("Library").join("Application Support");
        }
    }
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".local").join("share")))
        .unwrap_or_else(|_| PathBuf::from("."))
}

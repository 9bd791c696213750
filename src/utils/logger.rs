//! File-backed logger. Playback runs with the terminal in raw mode, so
//! diagnostics go to log files instead of stdout, and the panic hook restores
//! the terminal before reporting.

use crate::shared::constants;
use lazy_static::lazy_static;
use std::backtrace::Backtrace;
use std::fs::OpenOptions;
use std::io::Write;
use std::panic;
use std::path::PathBuf;
use std::sync::Mutex;

#[derive(Clone)]
struct LogFiles {
    error_path: String,
    debug_path: String,
}

lazy_static! {
    static ref FILES: Mutex<Option<LogFiles>> = Mutex::new(None);
}

fn append_line(path: &str, line: &str) {
    if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
        let _ = writeln!(file, "{}", line);
    }
}

pub fn init() {
    let mut error_path = std::env::current_dir().unwrap_or_default();
    error_path.push(constants::ERROR_LOG_FILE);
    let mut debug_path = PathBuf::from(&error_path);
    debug_path.set_file_name(constants::DEBUG_LOG_FILE);

    for path in [&error_path, &debug_path] {
        if let Ok(mut file) = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
        {
            let _ = writeln!(
                file,
                "=== {} log started: {} ===",
                constants::APP_NAME,
                chrono::Local::now()
            );
        }
    }

    let files = LogFiles {
        error_path: error_path.to_string_lossy().to_string(),
        debug_path: debug_path.to_string_lossy().to_string(),
    };
    *FILES.lock().unwrap() = Some(files.clone());

    panic::set_hook(Box::new(move |info| {
        let backtrace = Backtrace::capture();
        let msg = match info.payload().downcast_ref::<&str>() {
            Some(s) => *s,
            None => match info.payload().downcast_ref::<String>() {
                Some(s) => &s[..],
                None => "Box<Any>",
            },
        };
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_else(|| "unknown".to_string());

        let report = format!(
            "\nPANIC at {}:\nMessage: {}\nBacktrace:\n{:?}\n",
            location, msg, backtrace
        );
        append_line(&files.error_path, &report);
        append_line(&files.debug_path, &report);

        // Best effort: leave the terminal usable after a crash mid-playback.
        let _ = crossterm::terminal::disable_raw_mode();
        println!("Crashed. See {} for details.", files.error_path);
    }));
}

pub fn log(level: &str, msg: &str) {
    if let Some(files) = FILES.lock().unwrap().as_ref() {
        let timestamp = chrono::Local::now().format("%H:%M:%S%.3f");
        let line = format!("[{}][{}] {}", timestamp, level, msg);
        append_line(&files.debug_path, &line);
        if level == "ERROR" {
            append_line(&files.error_path, &line);
        }
    }
}

pub fn info(msg: &str) {
    log("INFO", msg);
}

pub fn debug(msg: &str) {
    log("DEBUG", msg);
}

pub fn error(msg: &str) {
    log("ERROR", msg);
}

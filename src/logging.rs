use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use tauri::{AppHandle, Manager};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::svn::SvnCapture;

pub(crate) fn prepare_log_file(app: &AppHandle) {
    let path = match log_file_path(app) {
        Ok(path) => path,
        Err(error) => {
            eprintln!("[log-warning] {error}");
            return;
        }
    };

    if let Some(parent) = path.parent() {
        if let Err(error) = fs::create_dir_all(parent) {
            eprintln!("[log-warning] Failed to create log directory: {error}");
            return;
        }
    }

    if let Err(error) = OpenOptions::new()
        .write(true)
        .truncate(true)
        .create(true)
        .open(&path)
    {
        eprintln!("[log-warning] Failed to create log file: {error}");
    }
}

pub(crate) fn log_command(app: &AppHandle, cwd: &std::path::Path, command: &str, capture: &SvnCapture) {
    let mut text = format!("in {}\n$ {command}\n", cwd.display());
    if let Some(error) = &capture.error {
        text.push_str(&format!("\nINVOCATION FAILURE:\n{error}\n"));
    } else {
        text.push_str("\nSTDOUT:\n");
        text.push_str(&capture.stdout);
        text.push_str("\nSTDERR:\n");
        text.push_str(&capture.stderr);
        if let Some(code) = capture.exit_code {
            text.push_str(&format!("\nwith exit code: {code}"));
        }
    }
    text.push('\n');

    log_line(app, &text);
}

pub(crate) fn log_line(app: &AppHandle, text: &str) {
    let path = match log_file_path(app) {
        Ok(path) => path,
        Err(error) => {
            eprintln!("[log-warning] {error}");
            return;
        }
    };

    match OpenOptions::new().append(true).create(true).open(&path) {
        Ok(mut file) => {
            let _ = writeln!(file, "[{}] {text}", timestamp());
        }
        Err(error) => eprintln!("[log-warning] Failed to open log file: {error}"),
    }
}

fn log_file_path(app: &AppHandle) -> Result<PathBuf, String> {
    app.path()
        .app_log_dir()
        .map(|dir| dir.join("log.txt"))
        .map_err(|error| format!("Failed to resolve app log directory: {error}"))
}

fn timestamp() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| String::new())
}

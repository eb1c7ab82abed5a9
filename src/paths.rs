//! Path utilities and file name helpers

use crate::error::{Error, Result};
use std::path::PathBuf;

/// Archive name used for whole-project exports
pub const PROJECT_ARCHIVE_NAME: &str = "project_screens.zip";

/// Gets the application data directory
pub fn get_app_data_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|p| p.join("uix-agent"))
        .ok_or_else(|| Error::Config("Could not find app data directory".to_string()))
}

/// Gets the database file path
pub fn get_db_path() -> Result<PathBuf> {
    get_app_data_dir().map(|p| p.join("uix_agent.db"))
}

/// Gets the default directory for exported files
pub fn get_exports_dir() -> Result<PathBuf> {
    get_app_data_dir().map(|p| p.join("exports"))
}

/// Reduces a screen name to one safe path component. Spaces become `_`,
/// separators and control characters become `_`, and leading dots are
/// dropped so the result can never climb out of its directory.
fn file_stem(screen_name: &str) -> String {
    let mapped: String = screen_name
        .chars()
        .map(|c| match c {
            ' ' | '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let stem = mapped.trim_start_matches('.');
    if stem.is_empty() {
        "screen".to_string()
    } else {
        stem.to_string()
    }
}

/// File name for a standalone single-screen export
pub fn screen_export_file_name(screen_name: &str) -> String {
    format!("{}.html", file_stem(&screen_name.to_lowercase()))
}

/// Entry name for a screen inside the project archive
pub fn screen_archive_entry_name(screen_name: &str) -> String {
    format!("{}.html", file_stem(screen_name))
}

/// File name for a history export taken on the given date
pub fn history_export_file_name(date: chrono::NaiveDate) -> String {
    format!("uix_agent_history_{}.json", date.format("%Y-%m-%d"))
}

//! Action logging for boq commands.
//!
//! Every command invocation is appended to a JSONL audit file so that edits
//! to a BOQ and issued certificates can be traced back to who ran what.

use crate::storage::{Storage, base_data_dir};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Strings longer than this are truncated in logged arguments.
const MAX_ARG_CHARS: usize = 100;

/// Arrays longer than this are summarized in logged arguments.
const MAX_ARG_ITEMS: usize = 10;

/// Argument keys whose values are file paths.
const PATH_ARG_KEYS: [&str; 3] = ["file", "output", "action_log_path"];

/// Represents a single action log entry.
#[derive(Debug, Serialize, Deserialize)]
pub struct ActionLog {
    /// ISO 8601 timestamp when the action occurred
    pub timestamp: DateTime<Utc>,

    /// Workspace the command ran against
    pub workspace: String,

    /// Job number the command targeted, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,

    /// Command name (e.g., "item edit", "cert generate")
    pub command: String,

    /// Command arguments as JSON
    pub args: serde_json::Value,

    /// Whether the command succeeded
    pub success: bool,

    /// Error message if the command failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Command execution duration in milliseconds
    pub duration_ms: u64,

    /// User who executed the command
    pub user: String,
}

/// Log an action to the configured log file.
///
/// Failures are reported through `tracing` and never propagate, so a broken
/// log never fails the command that produced it.
pub fn log_action(
    workspace: &Path,
    project: Option<&str>,
    command: &str,
    args: serde_json::Value,
    success: bool,
    error: Option<String>,
    duration_ms: u64,
) {
    // Uninitialized workspaces have no config table; logging stays on.
    let storage = Storage::open(workspace).ok();

    let enabled = storage
        .as_ref()
        .and_then(|s| s.get_config("action_log_enabled").ok().flatten())
        .map(|v| parse_bool(&v))
        .unwrap_or(true);
    if !enabled {
        return;
    }

    let custom_path = storage
        .as_ref()
        .and_then(|s| s.get_config("action_log_path").ok().flatten());
    let log_path = match get_log_path(custom_path.as_deref()) {
        Ok(path) => path,
        Err(e) => {
            tracing::warn!(error = %e, "failed to resolve action log path");
            return;
        }
    };

    let entry = ActionLog {
        timestamp: Utc::now(),
        workspace: workspace.to_string_lossy().to_string(),
        project: project.map(str::to_string),
        command: command.to_string(),
        args: sanitize_args(&args),
        success,
        error,
        duration_ms,
        user: get_current_user(),
    };

    if let Err(e) = write_log_entry(&log_path, &entry) {
        tracing::warn!(path = %log_path.display(), error = %e, "failed to write action log");
    }
}

/// Resolve the log file path: configured path, else `<base-data-dir>/action.log`.
fn get_log_path(custom_path: Option<&str>) -> Result<PathBuf> {
    match custom_path {
        Some(path) => Ok(expand_home(Path::new(path))),
        None => Ok(base_data_dir()?.join("action.log")),
    }
}

/// Expand ~ in path to home directory.
fn expand_home(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}

/// Append one JSON line to the log file.
fn write_log_entry(path: &Path, entry: &ActionLog) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string(entry)?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", json)?;

    Ok(())
}

/// Sanitize arguments before they are written to disk.
///
/// Sensitive keys are redacted and path arguments reduced to their file name.
/// Long strings are truncated; large arrays are summarized.
fn sanitize_args(args: &serde_json::Value) -> serde_json::Value {
    sanitize_value(args, false)
}

fn is_path_arg(map: &serde_json::Map<String, serde_json::Value>, key: &str) -> bool {
    // `config set action_log_path <path>` logs the path under "value"
    PATH_ARG_KEYS.contains(&key)
        || (key == "value"
            && map.get("key").and_then(|k| k.as_str()) == Some("action_log_path"))
}

fn sanitize_value(args: &serde_json::Value, is_path: bool) -> serde_json::Value {
    match args {
        serde_json::Value::Object(map) => {
            let mut sanitized = serde_json::Map::new();
            for (key, value) in map {
                let key_lower = key.to_lowercase();
                if ["password", "token", "secret", "credential"]
                    .iter()
                    .any(|s| key_lower.contains(s))
                {
                    sanitized.insert(
                        key.clone(),
                        serde_json::Value::String("[REDACTED]".to_string()),
                    );
                } else {
                    sanitized.insert(key.clone(), sanitize_value(value, is_path_arg(map, key)));
                }
            }
            serde_json::Value::Object(sanitized)
        }
        serde_json::Value::Array(arr) => {
            if arr.len() > MAX_ARG_ITEMS {
                serde_json::Value::String(format!("[Array with {} items]", arr.len()))
            } else {
                serde_json::Value::Array(arr.iter().map(|v| sanitize_value(v, is_path)).collect())
            }
        }
        serde_json::Value::String(s) => {
            let sanitized = if is_path && (s.contains('/') || s.contains('\\')) {
                s.rsplit(['/', '\\']).next().unwrap_or(s).to_string()
            } else {
                s.clone()
            };

            let len = sanitized.chars().count();
            if len > MAX_ARG_CHARS {
                let head: String = sanitized.chars().take(MAX_ARG_CHARS - 3).collect();
                serde_json::Value::String(format!("{}... ({} chars)", head, len))
            } else {
                serde_json::Value::String(sanitized)
            }
        }
        _ => args.clone(),
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes")
}

/// Get the current user's username.
fn get_current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

//! boqtrack - Bill of quantities and payment certificate tracking.
//!
//! This library provides the core functionality for the `boq` CLI tool,
//! including BOQ line-item bookkeeping, progress roll-ups, delimited text
//! import/export, and payment certificate generation.

pub mod action_log;
pub mod certificate;
pub mod cli;
pub mod commands;
pub mod config;
pub mod ledger;
pub mod models;
pub mod render;
pub mod state;
pub mod storage;


/// Library-level error type for boqtrack operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Config parse error: {0}")]
    Kdl(#[from] kdl::KdlError),

    #[error("Not initialized: run `boq system init` first")]
    NotInitialized,

    #[error("No project selected: pass --project or run `boq project use <JOB_NO>`")]
    NoProjectSelected,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A user-input check failed (blank certificate number, empty BOQ).
    #[error("{0}")]
    Validation(String),

    /// A destructive operation was attempted without `--yes`.
    #[error("Confirmation required: {0} Re-run with --yes to proceed.")]
    ConfirmationRequired(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for boqtrack operations.
pub type Result<T> = std::result::Result<T, Error>;

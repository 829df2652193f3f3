//! Configuration management for boqtrack.
//!
//! ## config.kdl - User preferences
//!
//! Located at:
//! - System: `~/.config/boqtrack/config.kdl` (or `$BOQ_CONFIG_DIR/config.kdl`)
//! - Session: `~/.local/share/boqtrack/<workspace-hash>/config.kdl`
//!
//! Contains:
//! - `output-format` - "json" or "human"
//! - `currency` - Currency label for amounts (default "AED")
//! - `retention-rate`, `advance-rate`, `vat-rate` - Certificate rates (0-1)
//!
//! ## Precedence
//!
//! CLI flag > session config > system config > defaults.
//! Use the [`resolver`] module for resolution with source tracking.
//!
//! Operational settings such as the selected project live in the database
//! config table instead (see [`crate::storage::Storage::get_config`]).

pub mod resolver;
pub mod schema;

pub use resolver::{
    ConfigOverrides, Resolved, ResolvedConfig, ValueSource, resolve_config, resolve_from,
};
pub use schema::{BoqConfig, DEFAULT_CURRENCY, OutputFormat, PREFERENCE_KEYS};

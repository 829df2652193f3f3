//! CLI argument definitions for boqtrack.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// boqtrack - Bill of quantities ledger and payment certificate generator.
///
/// Start with `boq system init`, then `boq project create` to register a job.
#[derive(Parser, Debug)]
#[command(name = "boq")]
#[command(author, version, about = "Track construction BOQs and issue interim payment certificates", long_about = None)]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Run as if boq was started in <path> instead of the current directory.
    /// Each workspace directory keeps its own store.
    #[arg(short = 'C', long = "workspace", global = true, env = "BOQ_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Job number to operate on (defaults to the project selected with `boq project use`)
    #[arg(short = 'P', long = "project", global = true, env = "BOQ_PROJECT")]
    pub project: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Project registration and selection
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },

    /// BOQ line item bookkeeping
    Item {
        #[command(subcommand)]
        command: ItemCommands,
    },

    /// Interim payment certificates
    Cert {
        #[command(subcommand)]
        command: CertCommands,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// System administration commands
    System {
        #[command(subcommand)]
        command: SystemCommands,
    },
}

/// Project subcommands
#[derive(Subcommand, Debug)]
pub enum ProjectCommands {
    /// Register a new project
    Create {
        /// Job number (letters, digits, '-', '_' and '.')
        job_no: String,

        /// Project name
        name: String,

        /// Client name
        #[arg(long)]
        client: Option<String>,

        /// Site location
        #[arg(long)]
        location: Option<String>,
    },

    /// List registered projects
    List,

    /// Show a project with its BOQ totals (defaults to the selected project)
    Show {
        /// Job number
        job_no: Option<String>,
    },

    /// Select the project later commands operate on
    Use {
        /// Job number
        job_no: String,
    },
}

/// BOQ item subcommands
#[derive(Subcommand, Debug)]
pub enum ItemCommands {
    /// Append a blank variation order line
    Add,

    /// Edit one field of a line item
    Edit {
        /// Item index (0-based, as shown by `boq item list`)
        index: usize,

        /// Field: id, description, unit, qty, rate, curr-perc
        field: String,

        /// New value (numbers that fail to parse read as 0)
        #[arg(allow_hyphen_values = true)]
        value: String,
    },

    /// Delete a line item
    Delete {
        /// Item index (0-based)
        index: usize,

        /// Confirm the deletion
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// List line items with derived columns and totals
    List {
        /// Filter by ID or description (case-insensitive substring)
        #[arg(long, short = 's')]
        search: Option<String>,
    },

    /// Show BOQ totals and progress
    Totals,

    /// Replace the BOQ from a comma-separated file
    ///
    /// Without --yes only a preview is printed and nothing changes.
    Import {
        /// File to import (columns: id, description, unit, qty, rate)
        file: PathBuf,

        /// Confirm replacing the current BOQ
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Export the BOQ as a comma-separated file
    Export {
        /// Output path, or '-' for stdout (default: <JOB_NO>_BOQ_Export.csv)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },
}

/// Certificate subcommands
#[derive(Subcommand, Debug)]
pub enum CertCommands {
    /// Suggest the next certificate number
    Next,

    /// Generate and record the next payment certificate
    Generate {
        /// Certificate number (default: the suggested next number)
        cert_no: Option<String>,
    },

    /// List issued certificates
    List,

    /// Show an issued certificate
    Show {
        /// Certificate index (0-based, as shown by `boq cert list`)
        index: usize,

        /// Render the printable certificate document
        #[arg(long)]
        document: bool,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Get a configuration value
    Get {
        /// Configuration key
        key: String,
    },

    /// Set a configuration value
    ///
    /// Preference keys (output-format, currency, retention-rate, advance-rate,
    /// vat-rate) are written to config.kdl; other keys to the database.
    Set {
        /// Configuration key
        key: String,
        /// Configuration value
        value: String,

        /// Write preferences to the system config.kdl instead of the session one
        #[arg(long)]
        system: bool,
    },

    /// List all configuration values
    List,
}

/// System subcommands
#[derive(Subcommand, Debug)]
pub enum SystemCommands {
    /// Initialize storage for this workspace
    Init,

    /// Show storage locations and build information
    Info,
}

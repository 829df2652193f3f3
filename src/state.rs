//! Per-invocation application state.
//!
//! Bundles the opened store, the resolved preferences and the selected
//! project so command handlers receive everything through one reference.

use crate::config::{ConfigOverrides, ResolvedConfig, resolve_config};
use crate::storage::Storage;
use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Database config key holding the project chosen with `boq project use`.
pub const CURRENT_PROJECT_KEY: &str = "current_project";

/// Everything a command needs for one invocation.
pub struct AppState {
    pub workspace: PathBuf,
    pub storage: Storage,
    /// Job number commands operate on, if one is selected
    pub current_job_no: Option<String>,
    pub config: ResolvedConfig,
}

impl AppState {
    /// Open the workspace store and resolve the project and preferences.
    ///
    /// `project` (from `-P`/`BOQ_PROJECT`) wins over the stored selection.
    pub fn load(workspace: &Path, project: Option<&str>, overrides: &ConfigOverrides) -> Result<Self> {
        let storage = Storage::open(workspace)?;
        let config = resolve_config(&storage, overrides)?;
        Self::from_parts(workspace.to_path_buf(), storage, project, config)
    }

    /// Build state around an already opened store.
    pub fn from_parts(
        workspace: PathBuf,
        storage: Storage,
        project: Option<&str>,
        config: ResolvedConfig,
    ) -> Result<Self> {
        let current_job_no = match project {
            Some(job_no) => Some(job_no.to_string()),
            None => storage.get_config(CURRENT_PROJECT_KEY)?,
        };

        Ok(Self {
            workspace,
            storage,
            current_job_no,
            config,
        })
    }

    /// The selected job number, or [`Error::NoProjectSelected`].
    pub fn require_project(&self) -> Result<String> {
        self.current_job_no.clone().ok_or(Error::NoProjectSelected)
    }

    /// Currency label for display.
    pub fn currency(&self) -> &str {
        self.config.currency()
    }
}

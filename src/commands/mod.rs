//! Command implementations for the boq CLI.
//!
//! Each command returns a result struct implementing [`Output`], which the
//! binary prints as JSON (default) or human-readable text.
//!
//! - `mod.rs` - system, project and config commands
//! - [`boq`] - BOQ line item commands
//! - [`cert`] - payment certificate commands

pub mod boq;
pub mod cert;

pub use boq::*;
pub use cert::*;

use crate::config::{PREFERENCE_KEYS, schema};
use crate::ledger;
use crate::models::{BoqTotals, Project};
use crate::render::format_money;
use crate::state::{AppState, CURRENT_PROJECT_KEY};
use crate::storage::{Storage, base_data_dir, get_storage_dir, validate_job_no};
use crate::{Error, Result};
use serde::Serialize;
use std::path::Path;

/// Command results that can be serialized to JSON or formatted for humans.
pub trait Output {
    /// Serialize to a JSON string.
    fn to_json(&self) -> String;

    /// Format for human-readable output.
    fn to_human(&self) -> String;
}

/// Serialize a result, reporting serialization failure as a JSON error object.
pub(crate) fn json_string<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }).to_string())
}

/// Database config keys `boq config set` accepts.
pub const SETTING_KEYS: [&str; 3] = [CURRENT_PROJECT_KEY, "action_log_enabled", "action_log_path"];

// === System Commands ===

#[derive(Debug, Serialize)]
pub struct InitResult {
    pub initialized: bool,
    pub storage_path: String,
}

impl Output for InitResult {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        if self.initialized {
            format!("Initialized boq storage at {}", self.storage_path)
        } else {
            format!("Already initialized at {}", self.storage_path)
        }
    }
}

/// Initialize storage for a workspace. Safe to re-run.
pub fn system_init(workspace: &Path) -> Result<InitResult> {
    let existed = Storage::exists(workspace)?;
    let storage = Storage::init(workspace)?;
    Ok(InitResult {
        initialized: !existed,
        storage_path: storage.root().display().to_string(),
    })
}

#[derive(Debug, Serialize)]
pub struct SystemInfo {
    pub version: String,
    pub build_timestamp: Option<String>,
    pub git_commit: Option<String>,
    pub workspace: String,
    pub storage_path: String,
    pub initialized: bool,
    pub project_count: usize,
    pub session_config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_config_path: Option<String>,
    pub data_dir: String,
}

impl Output for SystemInfo {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        let mut lines = vec![format!("boq {}", self.version)];
        if let (Some(ts), Some(commit)) = (&self.build_timestamp, &self.git_commit) {
            lines.push(format!("  Built: {} ({})", ts, commit));
        }
        lines.push(format!("  Workspace: {}", self.workspace));
        lines.push(format!(
            "  Storage: {}{}",
            self.storage_path,
            if self.initialized { "" } else { " (not initialized)" }
        ));
        lines.push(format!("  Projects: {}", self.project_count));
        lines.push(format!("  Session config: {}", self.session_config_path));
        if let Some(ref path) = self.system_config_path {
            lines.push(format!("  System config: {}", path));
        }
        lines.push(format!("  Data dir: {}", self.data_dir));
        lines.join("\n")
    }
}

/// Report storage locations and build information.
pub fn system_info(workspace: &Path) -> Result<SystemInfo> {
    let storage_dir = get_storage_dir(workspace)?;
    let initialized = Storage::exists(workspace)?;
    let project_count = if initialized {
        Storage::open(workspace)?.list_projects()?.len()
    } else {
        0
    };

    Ok(SystemInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        build_timestamp: option_env!("BOQ_BUILD_TIMESTAMP").map(str::to_string),
        git_commit: option_env!("BOQ_GIT_COMMIT").map(str::to_string),
        workspace: workspace.display().to_string(),
        storage_path: storage_dir.display().to_string(),
        initialized,
        project_count,
        session_config_path: storage_dir.join("config.kdl").display().to_string(),
        system_config_path: Storage::system_config_kdl_path().map(|p| p.display().to_string()),
        data_dir: base_data_dir()?.display().to_string(),
    })
}

// === Project Commands ===

#[derive(Debug, Serialize)]
pub struct ProjectCreated {
    pub job_no: String,
    pub name: String,
    /// Whether the new project became the selected one
    pub selected: bool,
}

impl Output for ProjectCreated {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        let mut out = format!("Created project {} \"{}\"", self.job_no, self.name);
        if self.selected {
            out.push_str(" (now selected)");
        }
        out
    }
}

/// Register a project. The first project created is selected automatically.
pub fn project_create(
    state: &mut AppState,
    job_no: &str,
    name: &str,
    client: Option<String>,
    location: Option<String>,
) -> Result<ProjectCreated> {
    let job_no = job_no.trim();
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput("Project name must not be empty".to_string()));
    }

    let mut project = Project::new(job_no.to_string(), name.to_string());
    project.client = client.filter(|c| !c.trim().is_empty());
    project.location = location.filter(|l| !l.trim().is_empty());
    state.storage.create_project(&project)?;

    let selected = state.storage.get_config(CURRENT_PROJECT_KEY)?.is_none();
    if selected {
        state.storage.set_config(CURRENT_PROJECT_KEY, job_no)?;
        state.current_job_no = Some(job_no.to_string());
    }

    Ok(ProjectCreated {
        job_no: project.job_no,
        name: project.name,
        selected,
    })
}

#[derive(Debug, Serialize)]
pub struct ProjectSummary {
    pub job_no: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
    pub item_count: usize,
    pub progress: u32,
    pub certificate_count: usize,
    pub current: bool,
}

#[derive(Debug, Serialize)]
pub struct ProjectList {
    pub projects: Vec<ProjectSummary>,
    pub count: usize,
}

impl Output for ProjectList {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        if self.projects.is_empty() {
            return "No projects. Create one with `boq project create <JOB_NO> <NAME>`.".to_string();
        }
        let mut lines = vec![format!("{} project(s):", self.count)];
        for p in &self.projects {
            lines.push(format!(
                "{} {:<12} {:<32} {:>3}%  {} items, {} certificates",
                if p.current { "*" } else { " " },
                p.job_no,
                p.name,
                p.progress,
                p.item_count,
                p.certificate_count
            ));
        }
        lines.join("\n")
    }
}

/// List registered projects with their cached progress.
pub fn project_list(state: &AppState) -> Result<ProjectList> {
    let mut projects = Vec::new();
    for project in state.storage.list_projects()? {
        let site = state.storage.get_site_data(&project.job_no)?;
        let current = state.current_job_no.as_deref() == Some(project.job_no.as_str());
        projects.push(ProjectSummary {
            item_count: site.boq.len(),
            progress: site.progress,
            certificate_count: site.payment_certificates.len(),
            current,
            job_no: project.job_no,
            name: project.name,
            client: project.client,
        });
    }

    Ok(ProjectList {
        count: projects.len(),
        projects,
    })
}

#[derive(Debug, Serialize)]
pub struct ProjectShow {
    pub project: Project,
    pub item_count: usize,
    pub totals: BoqTotals,
    pub certificate_count: usize,
    pub total_certified: f64,
    pub currency: String,
}

impl Output for ProjectShow {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        let p = &self.project;
        let mut lines = vec![format!("{} - {}", p.job_no, p.name)];
        if let Some(ref client) = p.client {
            lines.push(format!("  Client: {}", client));
        }
        if let Some(ref location) = p.location {
            lines.push(format!("  Location: {}", location));
        }
        lines.push(format!("  Created: {}", p.created_at.format("%Y-%m-%d")));
        lines.push(format!("  BOQ items: {}", self.item_count));
        lines.push(format!(
            "  Contract value: {}",
            format_money(self.totals.total_value, &self.currency)
        ));
        lines.push(format!(
            "  Work done: {} ({}%)",
            format_money(self.totals.total_work_done, &self.currency),
            self.totals.progress
        ));
        lines.push(format!(
            "  Certificates: {} (certified {})",
            self.certificate_count,
            format_money(self.total_certified, &self.currency)
        ));
        lines.join("\n")
    }
}

/// Show a project (the selected one when `job_no` is None).
pub fn project_show(state: &AppState, job_no: Option<&str>) -> Result<ProjectShow> {
    let job_no = match job_no {
        Some(j) => j.to_string(),
        None => state.require_project()?,
    };
    let project = state.storage.get_project(&job_no)?;
    let site = state.storage.get_site_data(&job_no)?;

    Ok(ProjectShow {
        project,
        item_count: site.boq.len(),
        totals: ledger::compute_totals(&site.boq),
        certificate_count: site.payment_certificates.len(),
        total_certified: crate::certificate::previously_certified(&site.payment_certificates),
        currency: state.currency().to_string(),
    })
}

#[derive(Debug, Serialize)]
pub struct ProjectUsed {
    pub job_no: String,
    pub name: String,
}

impl Output for ProjectUsed {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        format!("Now working on {} \"{}\"", self.job_no, self.name)
    }
}

/// Select the project later commands operate on.
pub fn project_use(state: &mut AppState, job_no: &str) -> Result<ProjectUsed> {
    let project = state.storage.get_project(job_no)?;
    state.storage.set_config(CURRENT_PROJECT_KEY, &project.job_no)?;
    state.current_job_no = Some(project.job_no.clone());

    Ok(ProjectUsed {
        job_no: project.job_no,
        name: project.name,
    })
}

// === Config Commands ===

#[derive(Debug, Serialize)]
pub struct ConfigValue {
    pub key: String,
    pub value: Option<String>,
    pub source: String,
}

impl Output for ConfigValue {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        match &self.value {
            Some(v) => format!("{} = {} ({})", self.key, v, self.source),
            None => format!("{} is not set", self.key),
        }
    }
}

/// Get a preference (resolved, with its source) or a database setting.
pub fn config_get(state: &AppState, key: &str) -> Result<ConfigValue> {
    if let Some((value, source)) = state.config.lookup(key) {
        return Ok(ConfigValue {
            key: key.to_string(),
            value: Some(value),
            source: source.to_string(),
        });
    }

    Ok(ConfigValue {
        key: key.to_string(),
        value: state.storage.get_config(key)?,
        source: "database".to_string(),
    })
}

#[derive(Debug, Serialize)]
pub struct ConfigSet {
    pub key: String,
    pub value: String,
    /// Where the value was written: session, system or database
    pub scope: String,
}

impl Output for ConfigSet {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        format!("Set {} = {} ({})", self.key, self.value, self.scope)
    }
}

/// Set a preference in config.kdl or an operational setting in the database.
pub fn config_set(state: &mut AppState, key: &str, value: &str, system: bool) -> Result<ConfigSet> {
    if schema::is_preference_key(key) {
        let mut config = if system {
            Storage::read_system_boq_config()?
        } else {
            state.storage.read_boq_config()?
        };
        config.set(key, value).map_err(Error::InvalidInput)?;
        if system {
            Storage::write_system_boq_config(&config)?;
        } else {
            state.storage.write_boq_config(&config)?;
        }
        return Ok(ConfigSet {
            key: key.to_string(),
            value: config.get(key).unwrap_or_else(|| value.to_string()),
            scope: if system { "system" } else { "session" }.to_string(),
        });
    }

    if system {
        return Err(Error::InvalidInput(format!(
            "--system only applies to preference keys ({})",
            PREFERENCE_KEYS.join(", ")
        )));
    }

    match key {
        CURRENT_PROJECT_KEY => {
            validate_job_no(value)?;
            if !state.storage.project_exists(value)? {
                return Err(Error::NotFound(format!("Project not found: {}", value)));
            }
        }
        "action_log_enabled" => {
            if !matches!(
                value.to_lowercase().as_str(),
                "true" | "false" | "1" | "0" | "yes" | "no"
            ) {
                return Err(Error::InvalidInput(format!(
                    "action_log_enabled must be true or false, got '{}'",
                    value
                )));
            }
        }
        "action_log_path" => {}
        _ => {
            return Err(Error::InvalidInput(format!(
                "Unknown config key: {}. Valid keys: {}, {}",
                key,
                PREFERENCE_KEYS.join(", "),
                SETTING_KEYS.join(", ")
            )));
        }
    }

    state.storage.set_config(key, value)?;
    if key == CURRENT_PROJECT_KEY {
        state.current_job_no = Some(value.to_string());
    }
    Ok(ConfigSet {
        key: key.to_string(),
        value: value.to_string(),
        scope: "database".to_string(),
    })
}

#[derive(Debug, Serialize)]
pub struct ConfigEntry {
    pub key: String,
    pub value: String,
    pub source: String,
}

#[derive(Debug, Serialize)]
pub struct ConfigList {
    pub configs: Vec<ConfigEntry>,
}

impl Output for ConfigList {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        self.configs
            .iter()
            .map(|c| format!("{} = {} ({})", c.key, c.value, c.source))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// List resolved preferences followed by database settings.
pub fn config_list(state: &AppState) -> Result<ConfigList> {
    let mut configs: Vec<ConfigEntry> = PREFERENCE_KEYS
        .iter()
        .filter_map(|key| {
            state.config.lookup(key).map(|(value, source)| ConfigEntry {
                key: key.to_string(),
                value,
                source: source.to_string(),
            })
        })
        .collect();

    for (key, value) in state.storage.list_configs()? {
        configs.push(ConfigEntry {
            key,
            value,
            source: "database".to_string(),
        });
    }

    Ok(ConfigList { configs })
}

//! Storage layer for boqtrack data.
//!
//! Each workspace directory gets its own store under
//! `~/.local/share/boqtrack/<workspace-hash>/` (or `$BOQ_DATA_DIR/<workspace-hash>/`):
//!
//! - `site.db` - SQLite database holding projects, per-project site data
//!   (BOQ and certificate history as JSON documents keyed by job number)
//!   and operational settings
//! - `config.kdl` - Session-level preferences (see [`crate::config`])
//!
//! Site data is always changed through [`Storage::update_site_data`], which
//! reads, mutates and writes the document inside one `IMMEDIATE` transaction.

use crate::config::BoqConfig;
use crate::ledger;
use crate::models::{BoqTotals, Project, SiteData};
use crate::{Error, Result};
use chrono::Utc;
use kdl::KdlDocument;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the base data directory.
pub const DATA_DIR_ENV: &str = "BOQ_DATA_DIR";

/// Environment variable overriding the system config directory.
pub const CONFIG_DIR_ENV: &str = "BOQ_CONFIG_DIR";

const DB_FILE: &str = "site.db";
const CONFIG_FILE: &str = "config.kdl";

/// How long a writer waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Storage manager for a single workspace.
pub struct Storage {
    /// Root directory for this workspace's data
    pub root: PathBuf,
    conn: Connection,
}

impl Storage {
    /// Open existing storage for the given workspace.
    pub fn open(workspace: &Path) -> Result<Self> {
        Self::open_at(get_storage_dir(workspace)?)
    }

    /// Open existing storage using an explicit base data directory.
    pub fn open_with_data_dir(workspace: &Path, data_dir: &Path) -> Result<Self> {
        Self::open_at(get_storage_dir_with_data_dir(workspace, data_dir)?)
    }

    /// Initialize storage for a workspace. Safe to call on existing storage.
    pub fn init(workspace: &Path) -> Result<Self> {
        Self::init_at(get_storage_dir(workspace)?)
    }

    /// Initialize storage using an explicit base data directory.
    pub fn init_with_data_dir(workspace: &Path, data_dir: &Path) -> Result<Self> {
        Self::init_at(get_storage_dir_with_data_dir(workspace, data_dir)?)
    }

    /// Check if storage exists for the given workspace.
    pub fn exists(workspace: &Path) -> Result<bool> {
        Ok(get_storage_dir(workspace)?.join(DB_FILE).exists())
    }

    /// Check if storage exists using an explicit base data directory.
    pub fn exists_with_data_dir(workspace: &Path, data_dir: &Path) -> Result<bool> {
        Ok(get_storage_dir_with_data_dir(workspace, data_dir)?
            .join(DB_FILE)
            .exists())
    }

    fn open_at(root: PathBuf) -> Result<Self> {
        if !root.join(DB_FILE).exists() {
            return Err(Error::NotInitialized);
        }
        let conn = Self::connect(&root)?;
        tracing::debug!(root = %root.display(), "opened storage");
        Ok(Self { root, conn })
    }

    fn init_at(root: PathBuf) -> Result<Self> {
        fs::create_dir_all(&root)?;
        let conn = Self::connect(&root)?;
        tracing::info!(root = %root.display(), "initialized storage");
        Ok(Self { root, conn })
    }

    fn connect(root: &Path) -> Result<Connection> {
        let conn = Connection::open(root.join(DB_FILE))?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Self::init_schema(&conn)?;
        Ok(conn)
    }

    /// Initialize the SQLite schema.
    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS projects (
                job_no TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                data TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS site_data (
                job_no TEXT PRIMARY KEY,
                data TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (job_no) REFERENCES projects(job_no) ON DELETE CASCADE
            );

            -- Configuration table
            CREATE TABLE IF NOT EXISTS config (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    /// Get the storage root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the SQLite database file.
    pub fn db_path(&self) -> PathBuf {
        self.root.join(DB_FILE)
    }

    // === Project Operations ===

    /// Register a new project with an empty site record.
    pub fn create_project(&mut self, project: &Project) -> Result<()> {
        validate_job_no(&project.job_no)?;

        let tx = self.conn.transaction()?;
        if project_row_exists(&tx, &project.job_no)? {
            return Err(Error::InvalidInput(format!(
                "Project already exists: {}",
                project.job_no
            )));
        }
        upsert_project(&tx, project)?;
        store_site_data(&tx, &SiteData::new(project.job_no.clone()))?;
        tx.commit()?;

        tracing::info!(job_no = %project.job_no, "created project");
        Ok(())
    }

    /// Insert or replace a project record.
    pub fn put_project(&mut self, project: &Project) -> Result<()> {
        validate_job_no(&project.job_no)?;
        upsert_project(&self.conn, project)
    }

    /// Get a project by job number.
    pub fn get_project(&self, job_no: &str) -> Result<Project> {
        let data: Option<String> = self
            .conn
            .query_row(
                "SELECT data FROM projects WHERE job_no = ?",
                [job_no],
                |row| row.get(0),
            )
            .optional()?;

        match data {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Err(project_not_found(job_no)),
        }
    }

    /// List all projects ordered by job number.
    pub fn list_projects(&self) -> Result<Vec<Project>> {
        let mut stmt = self
            .conn
            .prepare("SELECT data FROM projects ORDER BY job_no ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut projects = Vec::new();
        for json in rows {
            projects.push(serde_json::from_str(&json?)?);
        }
        Ok(projects)
    }

    /// Check whether a project is registered.
    pub fn project_exists(&self, job_no: &str) -> Result<bool> {
        project_row_exists(&self.conn, job_no)
    }

    // === Site Data Operations ===

    /// Get the site record for a project (empty if nothing stored yet).
    pub fn get_site_data(&self, job_no: &str) -> Result<SiteData> {
        load_site_data(&self.conn, job_no)
    }

    /// Replace the site record for a project.
    pub fn put_site_data(&mut self, site: &SiteData) -> Result<()> {
        let tx = self.conn.transaction()?;
        if !project_row_exists(&tx, &site.job_no)? {
            return Err(project_not_found(&site.job_no));
        }
        store_site_data(&tx, site)?;
        tx.commit()?;
        Ok(())
    }

    /// Read, mutate and write a project's site record atomically.
    ///
    /// The cached progress is refreshed before the write. If `mutator`
    /// returns an error the transaction rolls back and nothing is stored.
    pub fn update_site_data<T, F>(&mut self, job_no: &str, mutator: F) -> Result<T>
    where
        F: FnOnce(&mut SiteData) -> Result<T>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut site = load_site_data(&tx, job_no)?;
        let out = mutator(&mut site)?;
        ledger::refresh_progress(&mut site);
        store_site_data(&tx, &site)?;
        tx.commit()?;

        tracing::debug!(
            job_no,
            items = site.boq.len(),
            progress = site.progress,
            "updated site data"
        );
        Ok(out)
    }

    /// Recompute BOQ totals and store the progress only if it changed.
    ///
    /// Returns the totals and whether a write happened.
    pub fn refresh_progress(&mut self, job_no: &str) -> Result<(BoqTotals, bool)> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut site = load_site_data(&tx, job_no)?;
        let totals = ledger::compute_totals(&site.boq);
        let changed = ledger::refresh_progress(&mut site);
        if changed {
            store_site_data(&tx, &site)?;
            tx.commit()?;
            tracing::debug!(job_no, progress = site.progress, "progress changed");
        }

        Ok((totals, changed))
    }

    // === Config Operations ===

    /// Get a configuration value.
    pub fn get_config(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM config WHERE key = ?", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Set a configuration value.
    pub fn set_config(&mut self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO config (key, value) VALUES (?, ?)",
            [key, value],
        )?;
        Ok(())
    }

    /// List all configuration values sorted by key.
    pub fn list_configs(&self) -> Result<Vec<(String, String)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, value FROM config ORDER BY key")?;
        let configs = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(configs)
    }

    // === KDL Preference Files ===

    /// Path of the session-level `config.kdl`.
    pub fn config_kdl_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    /// Read session preferences (empty if the file does not exist).
    pub fn read_boq_config(&self) -> Result<BoqConfig> {
        read_config_file(&self.config_kdl_path())
    }

    /// Write session preferences.
    pub fn write_boq_config(&self, config: &BoqConfig) -> Result<()> {
        write_config_file(&self.config_kdl_path(), config)
    }

    /// Path of the system-level `config.kdl`, if a config directory is known.
    pub fn system_config_kdl_path() -> Option<PathBuf> {
        if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
            return Some(PathBuf::from(dir).join(CONFIG_FILE));
        }
        dirs::config_dir().map(|dir| dir.join("boqtrack").join(CONFIG_FILE))
    }

    /// Read system preferences (empty if absent).
    pub fn read_system_boq_config() -> Result<BoqConfig> {
        match Self::system_config_kdl_path() {
            Some(path) => read_config_file(&path),
            None => Ok(BoqConfig::default()),
        }
    }

    /// Write system preferences.
    pub fn write_system_boq_config(config: &BoqConfig) -> Result<()> {
        let path = Self::system_config_kdl_path()
            .ok_or_else(|| Error::Other("Could not determine config directory".to_string()))?;
        write_config_file(&path, config)
    }
}

fn project_not_found(job_no: &str) -> Error {
    Error::NotFound(format!("Project not found: {}", job_no))
}

fn project_row_exists(conn: &Connection, job_no: &str) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM projects WHERE job_no = ?",
        [job_no],
        |row| row.get(0),
    )?;
    Ok(exists)
}

fn upsert_project(conn: &Connection, project: &Project) -> Result<()> {
    conn.execute(
        "INSERT INTO projects (job_no, name, data, created_at) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(job_no) DO UPDATE SET name = excluded.name, data = excluded.data",
        params![
            project.job_no,
            project.name,
            serde_json::to_string(project)?,
            project.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn load_site_data(conn: &Connection, job_no: &str) -> Result<SiteData> {
    if !project_row_exists(conn, job_no)? {
        return Err(project_not_found(job_no));
    }

    let data: Option<String> = conn
        .query_row(
            "SELECT data FROM site_data WHERE job_no = ?",
            [job_no],
            |row| row.get(0),
        )
        .optional()?;

    match data {
        Some(json) => Ok(serde_json::from_str(&json)?),
        None => Ok(SiteData::new(job_no.to_string())),
    }
}

fn store_site_data(conn: &Connection, site: &SiteData) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO site_data (job_no, data, updated_at) VALUES (?1, ?2, ?3)",
        params![
            site.job_no,
            serde_json::to_string(site)?,
            Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn read_config_file(path: &Path) -> Result<BoqConfig> {
    if !path.exists() {
        return Ok(BoqConfig::default());
    }
    let content = fs::read_to_string(path)?;
    let doc: KdlDocument = content.parse()?;
    Ok(BoqConfig::from_kdl(&doc))
}

fn write_config_file(path: &Path, config: &BoqConfig) -> Result<()> {
    config.validate().map_err(Error::InvalidInput)?;
    write_atomic(path, &config.to_kdl().to_string())
}

/// Write a file by persisting a sibling temp file over it.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

/// Base directory holding all workspace stores.
///
/// `$BOQ_DATA_DIR` if set, otherwise `<data-dir>/boqtrack`.
pub fn base_data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    let data_dir = dirs::data_dir()
        .ok_or_else(|| Error::Other("Could not determine data directory".to_string()))?;
    Ok(data_dir.join("boqtrack"))
}

/// Get the storage directory for a workspace.
pub fn get_storage_dir(workspace: &Path) -> Result<PathBuf> {
    get_storage_dir_with_data_dir(workspace, &base_data_dir()?)
}

/// Get the storage directory for a workspace under an explicit base directory.
///
/// Uses a hash of the canonical workspace path so every workspace gets a
/// separate store.
pub fn get_storage_dir_with_data_dir(workspace: &Path, data_dir: &Path) -> Result<PathBuf> {
    let canonical = workspace
        .canonicalize()
        .map_err(|e| Error::Other(format!("Could not canonicalize workspace path: {}", e)))?;

    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string_lossy().as_bytes());
    let hash_hex = format!("{:x}", hasher.finalize());

    Ok(data_dir.join(&hash_hex[..12]))
}

/// Validate a job number.
///
/// Job numbers key the database and name export files, so they are limited
/// to ASCII letters, digits, `-`, `_` and `.`.
pub fn validate_job_no(job_no: &str) -> Result<()> {
    if job_no.is_empty() || job_no.len() > 64 {
        return Err(Error::InvalidInput(format!(
            "Job number must be 1-64 characters, got {}",
            job_no.len()
        )));
    }
    if !job_no
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(Error::InvalidInput(format!(
            "Job number may only contain letters, digits, '-', '_' and '.': {}",
            job_no
        )));
    }
    if job_no.chars().all(|c| c == '.') {
        return Err(Error::InvalidInput(format!("Invalid job number: {}", job_no)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BoqField, LineItem};
    use crate::test_utils::TestEnv;

    #[test]
    fn test_storage_init_and_exists() {
        let env = TestEnv::new();
        assert!(!Storage::exists_with_data_dir(env.path(), env.data_path()).unwrap());

        let storage = env.init_storage();
        assert!(storage.root().exists());
        assert!(storage.db_path().exists());
        assert!(Storage::exists_with_data_dir(env.path(), env.data_path()).unwrap());
    }

    #[test]
    fn test_open_uninitialized() {
        let env = TestEnv::new();
        let result = Storage::open_with_data_dir(env.path(), env.data_path());
        assert!(matches!(result, Err(Error::NotInitialized)));
    }

    #[test]
    fn test_init_is_idempotent() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        storage
            .create_project(&Project::new("J-1".to_string(), "Villa".to_string()))
            .unwrap();
        drop(storage);

        let storage = env.init_storage();
        assert!(storage.project_exists("J-1").unwrap());
    }

    #[test]
    fn test_storage_dir_is_per_workspace() {
        let env_a = TestEnv::new();
        let env_b = TestEnv::new();
        let a = get_storage_dir_with_data_dir(env_a.path(), env_a.data_path()).unwrap();
        let b = get_storage_dir_with_data_dir(env_b.path(), env_a.data_path()).unwrap();
        assert_ne!(a, b);
        assert_eq!(a.file_name().unwrap().len(), 12);
    }

    #[test]
    fn test_create_and_get_project() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();

        let mut project = Project::new("J-2041".to_string(), "Marina Villa".to_string());
        project.client = Some("Al Noor".to_string());
        storage.create_project(&project).unwrap();

        let loaded = storage.get_project("J-2041").unwrap();
        assert_eq!(loaded.name, "Marina Villa");
        assert_eq!(loaded.client.as_deref(), Some("Al Noor"));

        let site = storage.get_site_data("J-2041").unwrap();
        assert_eq!(site.job_no, "J-2041");
        assert!(site.boq.is_empty());
    }

    #[test]
    fn test_create_duplicate_project() {
        let env = TestEnv::new();
        let mut storage = env.init_with_project("J-1");
        let result = storage.create_project(&Project::new("J-1".to_string(), "Again".to_string()));
        assert!(result.unwrap_err().to_string().contains("already exists"));
    }

    #[test]
    fn test_list_projects_sorted() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        for job in ["J-3", "J-1", "J-2"] {
            storage
                .create_project(&Project::new(job.to_string(), format!("Project {}", job)))
                .unwrap();
        }
        let jobs: Vec<String> = storage
            .list_projects()
            .unwrap()
            .into_iter()
            .map(|p| p.job_no)
            .collect();
        assert_eq!(jobs, vec!["J-1", "J-2", "J-3"]);
    }

    #[test]
    fn test_put_project_updates() {
        let env = TestEnv::new();
        let mut storage = env.init_with_project("J-1");
        let mut project = storage.get_project("J-1").unwrap();
        project.location = Some("Plot 44".to_string());
        storage.put_project(&project).unwrap();
        assert_eq!(
            storage.get_project("J-1").unwrap().location.as_deref(),
            Some("Plot 44")
        );
    }

    #[test]
    fn test_get_site_data_unknown_project() {
        let env = TestEnv::new();
        let storage = env.init_storage();
        assert!(matches!(
            storage.get_site_data("NOPE"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_put_site_data_round_trip() {
        let env = TestEnv::new();
        let mut storage = env.init_with_project("J-1");

        let mut site = storage.get_site_data("J-1").unwrap();
        site.boq.push(LineItem::new(
            "1".to_string(),
            "Slab".to_string(),
            "m3".to_string(),
            12.0,
            450.0,
        ));
        storage.put_site_data(&site).unwrap();

        assert_eq!(storage.get_site_data("J-1").unwrap(), site);
    }

    #[test]
    fn test_update_site_data_refreshes_progress() {
        let env = TestEnv::new();
        let mut storage = env.init_with_project("J-1");

        storage
            .update_site_data("J-1", |site| {
                let index = ledger::add_item(site);
                ledger::edit_item(site, index, BoqField::Qty, "10")?;
                ledger::edit_item(site, index, BoqField::Rate, "100")?;
                ledger::edit_item(site, index, BoqField::CurrPerc, "50")?;
                Ok(())
            })
            .unwrap();

        let site = storage.get_site_data("J-1").unwrap();
        assert_eq!(site.boq.len(), 1);
        assert_eq!(site.progress, 50);
    }

    #[test]
    fn test_update_site_data_rolls_back_on_error() {
        let env = TestEnv::new();
        let mut storage = env.init_with_project("J-1");

        let result: Result<()> = storage.update_site_data("J-1", |site| {
            ledger::add_item(site);
            Err(Error::Validation("abort".to_string()))
        });
        assert!(result.is_err());
        assert!(storage.get_site_data("J-1").unwrap().boq.is_empty());
    }

    #[test]
    fn test_refresh_progress_writes_only_on_change() {
        let env = TestEnv::new();
        let mut storage = env.init_with_project("J-1");

        let mut site = storage.get_site_data("J-1").unwrap();
        let mut item = LineItem::new(
            "1".to_string(),
            "Slab".to_string(),
            "m3".to_string(),
            10.0,
            100.0,
        );
        item.curr_perc = 40.0;
        site.boq.push(item);
        storage.put_site_data(&site).unwrap();

        let (totals, changed) = storage.refresh_progress("J-1").unwrap();
        assert!(changed);
        assert_eq!(totals.progress, 40);

        let (_, changed_again) = storage.refresh_progress("J-1").unwrap();
        assert!(!changed_again);
        assert_eq!(storage.get_site_data("J-1").unwrap().progress, 40);
    }

    #[test]
    fn test_config_set_get_list() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();

        assert_eq!(storage.get_config("current_project").unwrap(), None);
        storage.set_config("current_project", "J-1").unwrap();
        storage.set_config("current_project", "J-2").unwrap();
        storage.set_config("action_log_enabled", "false").unwrap();

        assert_eq!(
            storage.get_config("current_project").unwrap(),
            Some("J-2".to_string())
        );
        let configs = storage.list_configs().unwrap();
        assert_eq!(configs.len(), 2);
        assert_eq!(configs[0].0, "action_log_enabled");
    }

    #[test]
    fn test_session_config_file_round_trip() {
        let env = TestEnv::new();
        let storage = env.init_storage();
        assert_eq!(storage.read_boq_config().unwrap(), BoqConfig::default());

        let config = BoqConfig {
            currency: Some("USD".to_string()),
            vat_rate: Some(0.15),
            ..Default::default()
        };
        storage.write_boq_config(&config).unwrap();
        assert_eq!(storage.read_boq_config().unwrap(), config);
    }

    #[test]
    fn test_write_atomic_replaces_contents() {
        let env = TestEnv::new();
        let path = env.path().join("out.csv");
        write_atomic(&path, "first").unwrap();
        write_atomic(&path, "second").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
    }

    #[test]
    fn test_validate_job_no() {
        assert!(validate_job_no("J-2041").is_ok());
        assert!(validate_job_no("2024_017.B").is_ok());
        assert!(validate_job_no("").is_err());
        assert!(validate_job_no("J 1").is_err());
        assert!(validate_job_no("../etc").is_err());
        assert!(validate_job_no("..").is_err());
        assert!(validate_job_no(&"x".repeat(65)).is_err());
    }
}

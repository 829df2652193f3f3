//! boq CLI - Bill of quantities ledger and payment certificate generator.

use boqtrack::action_log;
use boqtrack::cli::{
    CertCommands, Cli, Commands, ConfigCommands, ItemCommands, ProjectCommands, SystemCommands,
};
use boqtrack::commands::{self, Output};
use boqtrack::config::{ConfigOverrides, OutputFormat};
use boqtrack::state::AppState;
use clap::Parser;
use std::env;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

fn main() {
    init_tracing();

    let cli = Cli::parse();
    let mut human = cli.human_readable;

    // Determine workspace: --workspace flag > BOQ_WORKSPACE env > cwd
    let workspace = resolve_workspace(cli.workspace, human);

    let (cmd_name, args_json) = serialize_command(&cli.command);
    let project = cli.project;

    let start = Instant::now();
    let result = run_command(cli.command, &workspace, project.as_deref(), &mut human);
    let duration = start.elapsed().as_millis() as u64;

    let (success, error) = match &result {
        Ok(_) => (true, None),
        Err(e) => (false, Some(e.to_string())),
    };
    action_log::log_action(
        &workspace,
        project.as_deref(),
        &cmd_name,
        args_json,
        success,
        error,
        duration,
    );

    if let Err(e) = result {
        if human {
            eprintln!("Error: {}", e);
        } else {
            eprintln!("{}", serde_json::json!({ "error": e.to_string() }));
        }
        process::exit(1);
    }
}

/// Diagnostics go to stderr so JSON on stdout stays parseable.
///
/// `BOQ_LOG` takes an `EnvFilter` directive (default `warn`);
/// `BOQ_LOG_FORMAT=json` switches to structured lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("BOQ_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let json = env::var("BOQ_LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.with_target(false).try_init()
    };
}

/// Resolve the workspace directory from the explicit flag or the current directory.
///
/// An explicit path must exist; it is used literally.
fn resolve_workspace(explicit_path: Option<PathBuf>, human: bool) -> PathBuf {
    match explicit_path {
        Some(path) => {
            if !path.is_dir() {
                let message = format!("Specified workspace does not exist: {}", path.display());
                if human {
                    eprintln!("Error: {}", message);
                } else {
                    eprintln!("{}", serde_json::json!({ "error": message }));
                }
                process::exit(1);
            }
            path
        }
        None => env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Dispatch a command. Once config is loaded, `human_flag` is updated to the
/// resolved output format so errors print the same way as results.
fn run_command(
    command: Commands,
    workspace: &Path,
    project: Option<&str>,
    human_flag: &mut bool,
) -> Result<(), boqtrack::Error> {
    // System commands work without an initialized store.
    let command = match command {
        Commands::System { command } => {
            match command {
                SystemCommands::Init => output(&commands::system_init(workspace)?, *human_flag),
                SystemCommands::Info => output(&commands::system_info(workspace)?, *human_flag),
            }
            return Ok(());
        }
        other => other,
    };

    let mut overrides = ConfigOverrides::new();
    if *human_flag {
        overrides = overrides.with_output_format(OutputFormat::Human);
    }
    let mut state = AppState::load(workspace, project, &overrides)?;
    let human = *state.config.output_format() == OutputFormat::Human;
    *human_flag = human;

    match command {
        Commands::Project { command } => match command {
            ProjectCommands::Create {
                job_no,
                name,
                client,
                location,
            } => {
                let result = commands::project_create(&mut state, &job_no, &name, client, location)?;
                output(&result, human);
            }
            ProjectCommands::List => output(&commands::project_list(&state)?, human),
            ProjectCommands::Show { job_no } => {
                output(&commands::project_show(&state, job_no.as_deref())?, human)
            }
            ProjectCommands::Use { job_no } => {
                output(&commands::project_use(&mut state, &job_no)?, human)
            }
        },
        Commands::Item { command } => match command {
            ItemCommands::Add => output(&commands::item_add(&mut state)?, human),
            ItemCommands::Edit {
                index,
                field,
                value,
            } => {
                let result = commands::item_edit(&mut state, index, &field, &value)?;
                output(&result, human);
            }
            ItemCommands::Delete { index, yes } => {
                output(&commands::item_delete(&mut state, index, yes)?, human)
            }
            ItemCommands::List { search } => {
                output(&commands::item_list(&state, search.as_deref())?, human)
            }
            ItemCommands::Totals => output(&commands::item_totals(&mut state)?, human),
            ItemCommands::Import { file, yes } => {
                output(&commands::item_import(&mut state, &file, yes)?, human)
            }
            ItemCommands::Export { output: path } => {
                output(&commands::item_export(&state, path.as_deref())?, human)
            }
        },
        Commands::Cert { command } => match command {
            CertCommands::Next => output(&commands::cert_next(&state)?, human),
            CertCommands::Generate { cert_no } => {
                output(&commands::cert_generate(&mut state, cert_no.as_deref())?, human)
            }
            CertCommands::List => output(&commands::cert_list(&state)?, human),
            CertCommands::Show { index, document } => {
                output(&commands::cert_show(&state, index, document)?, human)
            }
        },
        Commands::Config { command } => match command {
            ConfigCommands::Get { key } => output(&commands::config_get(&state, &key)?, human),
            ConfigCommands::Set { key, value, system } => {
                output(&commands::config_set(&mut state, &key, &value, system)?, human)
            }
            ConfigCommands::List => output(&commands::config_list(&state)?, human),
        },
        Commands::System { .. } => {}
    }

    Ok(())
}

/// Print output in JSON or human-readable format.
fn output<T: Output>(result: &T, human: bool) {
    if human {
        println!("{}", result.to_human());
    } else {
        println!("{}", result.to_json());
    }
}

/// Serialize a command into its name and arguments for the action log.
fn serialize_command(command: &Commands) -> (String, serde_json::Value) {
    match command {
        Commands::Project { command } => match command {
            ProjectCommands::Create {
                job_no,
                name,
                client,
                location,
            } => (
                "project create".to_string(),
                serde_json::json!({
                    "job_no": job_no,
                    "name": name,
                    "client": client,
                    "location": location,
                }),
            ),
            ProjectCommands::List => ("project list".to_string(), serde_json::json!({})),
            ProjectCommands::Show { job_no } => (
                "project show".to_string(),
                serde_json::json!({ "job_no": job_no }),
            ),
            ProjectCommands::Use { job_no } => (
                "project use".to_string(),
                serde_json::json!({ "job_no": job_no }),
            ),
        },

        Commands::Item { command } => match command {
            ItemCommands::Add => ("item add".to_string(), serde_json::json!({})),
            ItemCommands::Edit {
                index,
                field,
                value,
            } => (
                "item edit".to_string(),
                serde_json::json!({ "index": index, "field": field, "value": value }),
            ),
            ItemCommands::Delete { index, yes } => (
                "item delete".to_string(),
                serde_json::json!({ "index": index, "yes": yes }),
            ),
            ItemCommands::List { search } => (
                "item list".to_string(),
                serde_json::json!({ "search": search }),
            ),
            ItemCommands::Totals => ("item totals".to_string(), serde_json::json!({})),
            ItemCommands::Import { file, yes } => (
                "item import".to_string(),
                serde_json::json!({ "file": file, "yes": yes }),
            ),
            ItemCommands::Export { output } => (
                "item export".to_string(),
                serde_json::json!({ "output": output }),
            ),
        },

        Commands::Cert { command } => match command {
            CertCommands::Next => ("cert next".to_string(), serde_json::json!({})),
            CertCommands::Generate { cert_no } => (
                "cert generate".to_string(),
                serde_json::json!({ "cert_no": cert_no }),
            ),
            CertCommands::List => ("cert list".to_string(), serde_json::json!({})),
            CertCommands::Show { index, document } => (
                "cert show".to_string(),
                serde_json::json!({ "index": index, "document": document }),
            ),
        },

        Commands::Config { command } => match command {
            ConfigCommands::Get { key } => {
                ("config get".to_string(), serde_json::json!({ "key": key }))
            }
            ConfigCommands::Set { key, value, system } => (
                "config set".to_string(),
                serde_json::json!({ "key": key, "value": value, "system": system }),
            ),
            ConfigCommands::List => ("config list".to_string(), serde_json::json!({})),
        },

        Commands::System { command } => match command {
            SystemCommands::Init => ("system init".to_string(), serde_json::json!({})),
            SystemCommands::Info => ("system info".to_string(), serde_json::json!({})),
        },
    }
}

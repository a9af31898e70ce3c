//! Command implementations for the cron daemon.
//!
//! Handles:
//! - start: Load config, open storage, schedule stored tasks, start HTTP server
//! - job-kinds: Print the job kind catalog
//! - validate: Check a task configuration form offline

use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{info, warn};

use cron_scheduler::{
    register_builtin_job_kinds, AutocompleteValidators, ConfigurationValidator, CronJobScheduler,
    EventBus, FieldTypeValidators, JobKindRegistry, MaintenanceHandler, SchedulerConfig,
    ValidationErrors,
};
use cron_service::{run_server_with_shutdown, CronTaskService};
use cron_storage::Storage;
use cron_types::{JobKindDefinition, Settings, TaskConfigurationForm};

use crate::LoggingMaintenanceHandler;

/// Load configuration (defaults -> file -> env -> CLI) and apply CLI overrides.
pub fn load_settings(
    config_path: Option<&str>,
    port_override: Option<u16>,
    db_path_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Settings> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;

    if let Some(port) = port_override {
        settings.http_port = port;
    }
    if let Some(db_path) = db_path_override {
        settings.db_path = db_path.to_string();
    }
    if let Some(log_level) = log_level_override {
        settings.log_level = log_level.to_string();
    }
    Ok(settings)
}

/// Install the global tracing subscriber. `RUST_LOG` wins over `log_level`.
pub fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

fn job_kind_catalog(handler: Arc<dyn MaintenanceHandler>) -> Result<Arc<JobKindRegistry>> {
    let mut kinds = JobKindRegistry::new();
    register_builtin_job_kinds(&mut kinds, handler).context("Failed to register job kinds")?;
    Ok(Arc::new(kinds))
}

fn configuration_validator(
    kinds: Arc<JobKindRegistry>,
    settings: &Settings,
) -> Result<ConfigurationValidator> {
    ConfigurationValidator::new(
        kinds,
        FieldTypeValidators::new(),
        AutocompleteValidators::for_storages(&settings.storages),
    )
    .context("Job kind catalog references unknown validators")
}

/// Open storage and assemble the task configuration service.
pub fn build_service(settings: &Settings) -> Result<Arc<CronTaskService>> {
    let db_path = settings.expanded_db_path();
    info!("Opening storage at {:?}", db_path);

    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent).context("Failed to create database directory")?;
    }
    let storage = Arc::new(Storage::open(&db_path).context("Failed to open storage")?);

    let handler = Arc::new(LoggingMaintenanceHandler::new(storage.clone()));
    let kinds = job_kind_catalog(handler)?;
    let validator = configuration_validator(kinds.clone(), settings)?;
    let scheduler_config =
        SchedulerConfig::try_from(settings).context("Invalid scheduler settings")?;
    let scheduler = CronJobScheduler::new(scheduler_config, kinds, Arc::new(EventBus::new()))
        .context("Failed to create scheduler")?;

    Ok(Arc::new(CronTaskService::new(
        storage.clone(),
        storage,
        Arc::new(validator),
        Arc::new(scheduler),
    )))
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}

/// Start the cron daemon.
///
/// 1. Load configuration
/// 2. Open RocksDB storage and build the service
/// 3. Schedule stored tasks and start the HTTP server
/// 4. Handle graceful shutdown on SIGINT/SIGTERM
pub async fn start_daemon(
    config_path: Option<&str>,
    port_override: Option<u16>,
    db_path_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<()> {
    let settings = load_settings(config_path, port_override, db_path_override, log_level_override)?;
    init_logging(&settings.log_level)?;

    info!("Cron daemon starting...");
    info!("Configuration:");
    info!("  Database path: {}", settings.db_path);
    info!("  HTTP address: {}", settings.http_addr());
    info!("  Timezone: {}", settings.default_timezone);
    info!("  Log level: {}", settings.log_level);

    let service = build_service(&settings)?;

    let addr: SocketAddr = settings
        .http_addr()
        .parse()
        .context("Invalid HTTP address")?;

    run_server_with_shutdown(addr, service, shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))
}

fn describe_job_kind(definition: &JobKindDefinition) -> String {
    let mut out = format!("{} ({})", definition.id, definition.name);
    if !definition.description.is_empty() {
        out.push_str(&format!("\n  {}", definition.description));
    }
    for field in &definition.fields {
        out.push_str(&format!("\n    {}: {}", field.name, field.field_type));
        if field.required {
            out.push_str(" (required)");
        }
        if let Some(source) = &field.autocomplete {
            out.push_str(&format!(" [autocomplete: {}]", source));
        }
    }
    out
}

/// Print the job kind catalog.
pub fn show_job_kinds(config_path: Option<&str>) -> Result<()> {
    // Validators are assembled too so a broken catalog fails here as it would on start
    let settings = load_settings(config_path, None, None, None)?;
    let kinds = job_kind_catalog(Arc::new(LoggingMaintenanceHandler::detached()))?;
    configuration_validator(kinds.clone(), &settings)?;

    for definition in kinds.definitions() {
        println!("{}", describe_job_kind(definition));
    }
    Ok(())
}

/// Validate a JSON form against the catalog and the configured storages.
///
/// The outer error is for unreadable input, the inner one carries the violations.
pub fn validate_form(settings: &Settings, json: &str) -> Result<Result<(), ValidationErrors>> {
    let form: TaskConfigurationForm =
        serde_json::from_str(json).context("Failed to parse task configuration form")?;
    let kinds = job_kind_catalog(Arc::new(LoggingMaintenanceHandler::detached()))?;
    let validator = configuration_validator(kinds, settings)?;
    Ok(validator.validate(&form))
}

/// Validate a form file, printing every violation.
pub fn validate_form_file(config_path: Option<&str>, file: &Path) -> Result<()> {
    let settings = load_settings(config_path, None, None, None)?;
    let json = fs::read_to_string(file).with_context(|| format!("Failed to read {:?}", file))?;

    match validate_form(&settings, &json)? {
        Ok(()) => {
            println!("{}: valid", file.display());
            Ok(())
        }
        Err(errors) => {
            println!("{}: {} violation(s)", file.display(), errors.len());
            for (path, messages) in errors.grouped() {
                for message in messages {
                    println!("  {}: {}", path, message);
                }
            }
            anyhow::bail!("Task configuration form is invalid")
        }
    }
}

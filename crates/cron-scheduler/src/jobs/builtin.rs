//! Built-in job kinds.
//!
//! The maintenance kinds of an artifact repository plus the dynamic script
//! kind. Each body only decodes its parameters into a `MaintenanceRequest`;
//! the actual work is done by the `MaintenanceHandler` the host supplies.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use cron_types::{FieldDefinition, FieldType, JobKindDefinition};

use crate::jobs::{CronJob, JobContext, JobError};
use crate::{JobKindRegistry, SchedulerError};

/// Job kind id of dynamically scripted tasks
pub const SCRIPT_JOB_KIND: &str = "ScriptCronJob";

/// Property naming the uploaded script of a `ScriptCronJob`
pub const SCRIPT_FILE_NAME_FIELD: &str = "fileName";

pub const REGENERATE_CHECKSUM_JOB_KIND: &str = "RegenerateChecksumCronJob";
pub const CLEANUP_EXPIRED_ARTIFACTS_JOB_KIND: &str =
    "CleanupExpiredArtifactsFromProxyRepositoriesCronJob";
pub const REBUILD_MAVEN_INDEXES_JOB_KIND: &str = "RebuildMavenIndexesCronJob";
pub const REBUILD_MAVEN_METADATA_JOB_KIND: &str = "RebuildMavenMetadataCronJob";
pub const DOWNLOAD_REMOTE_MAVEN_INDEX_JOB_KIND: &str = "DownloadRemoteMavenIndexCronJob";

/// Autocomplete source listing known storages
pub const STORAGE_ID_SOURCE: &str = "storageId";

/// Autocomplete source listing known repositories
pub const REPOSITORY_ID_SOURCE: &str = "repositoryId";

/// Decoded parameters of a built-in job firing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaintenanceRequest {
    RegenerateChecksums {
        storage_id: Option<String>,
        repository_id: Option<String>,
        base_path: Option<String>,
        force_regeneration: bool,
    },
    CleanupExpiredArtifacts {
        last_accessed_time_in_days: i32,
        min_size_in_bytes: Option<i64>,
    },
    RebuildMavenIndexes {
        storage_id: String,
        repository_id: String,
    },
    RebuildMavenMetadata {
        storage_id: Option<String>,
        repository_id: Option<String>,
        base_path: Option<String>,
    },
    DownloadRemoteMavenIndex {
        storage_id: String,
        repository_id: String,
    },
    RunScript {
        file_name: String,
    },
}

/// Host side executor for built-in job kinds.
#[async_trait]
pub trait MaintenanceHandler: Send + Sync {
    async fn handle(&self, ctx: &JobContext, request: MaintenanceRequest) -> Result<(), JobError>;
}

type Decoder = fn(&JobContext) -> Result<MaintenanceRequest, JobError>;

/// Body shared by every built-in kind: decode, then hand over.
struct MaintenanceJob {
    decode: Decoder,
    handler: Arc<dyn MaintenanceHandler>,
}

#[async_trait]
impl CronJob for MaintenanceJob {
    async fn run(&self, ctx: JobContext) -> Result<(), JobError> {
        let request = (self.decode)(&ctx)?;
        debug!(task_id = %ctx.task_id, ?request, "Dispatching maintenance request");
        self.handler.handle(&ctx, request).await
    }
}

fn owned(ctx: &JobContext, name: &str) -> Option<String> {
    ctx.property(name).map(str::to_string)
}

fn decode_regenerate_checksums(ctx: &JobContext) -> Result<MaintenanceRequest, JobError> {
    Ok(MaintenanceRequest::RegenerateChecksums {
        storage_id: owned(ctx, "storageId"),
        repository_id: owned(ctx, "repositoryId"),
        base_path: owned(ctx, "basePath"),
        force_regeneration: ctx.flag("forceRegeneration", false)?,
    })
}

fn decode_cleanup_expired(ctx: &JobContext) -> Result<MaintenanceRequest, JobError> {
    let days = ctx
        .parsed::<i32>("lastAccessedTimeInDays")?
        .ok_or_else(|| JobError::InvalidParameter {
            name: "lastAccessedTimeInDays".to_string(),
            reason: "not provided".to_string(),
        })?;
    Ok(MaintenanceRequest::CleanupExpiredArtifacts {
        last_accessed_time_in_days: days,
        min_size_in_bytes: ctx.parsed::<i64>("minSizeInBytes")?,
    })
}

fn decode_rebuild_indexes(ctx: &JobContext) -> Result<MaintenanceRequest, JobError> {
    Ok(MaintenanceRequest::RebuildMavenIndexes {
        storage_id: ctx.required("storageId")?.to_string(),
        repository_id: ctx.required("repositoryId")?.to_string(),
    })
}

fn decode_rebuild_metadata(ctx: &JobContext) -> Result<MaintenanceRequest, JobError> {
    Ok(MaintenanceRequest::RebuildMavenMetadata {
        storage_id: owned(ctx, "storageId"),
        repository_id: owned(ctx, "repositoryId"),
        base_path: owned(ctx, "basePath"),
    })
}

fn decode_download_remote_index(ctx: &JobContext) -> Result<MaintenanceRequest, JobError> {
    Ok(MaintenanceRequest::DownloadRemoteMavenIndex {
        storage_id: ctx.required("storageId")?.to_string(),
        repository_id: ctx.required("repositoryId")?.to_string(),
    })
}

fn decode_run_script(ctx: &JobContext) -> Result<MaintenanceRequest, JobError> {
    Ok(MaintenanceRequest::RunScript {
        file_name: ctx.required(SCRIPT_FILE_NAME_FIELD)?.to_string(),
    })
}

fn storage_field() -> FieldDefinition {
    FieldDefinition::new("storageId", FieldType::String).with_autocomplete(STORAGE_ID_SOURCE)
}

fn repository_field() -> FieldDefinition {
    FieldDefinition::new("repositoryId", FieldType::String).with_autocomplete(REPOSITORY_ID_SOURCE)
}

/// Schemas and decoders of every built-in kind
fn builtin_job_kinds() -> Vec<(JobKindDefinition, Decoder)> {
    vec![
        (
            JobKindDefinition::new(REGENERATE_CHECKSUM_JOB_KIND, "Regenerate Checksum")
                .with_description("Regenerate missing or stale checksum files")
                .with_field(FieldDefinition::new("storageId", FieldType::String))
                .with_field(FieldDefinition::new("repositoryId", FieldType::String))
                .with_field(FieldDefinition::new("basePath", FieldType::String))
                .with_field(FieldDefinition::new("forceRegeneration", FieldType::Boolean)),
            decode_regenerate_checksums as Decoder,
        ),
        (
            JobKindDefinition::new(
                CLEANUP_EXPIRED_ARTIFACTS_JOB_KIND,
                "Cleanup Expired Artifacts From Proxy Repositories",
            )
            .with_description("Remove cached proxy artifacts not accessed for a given number of days")
            .with_field(FieldDefinition::new("lastAccessedTimeInDays", FieldType::Int).required())
            .with_field(FieldDefinition::new("minSizeInBytes", FieldType::Int)),
            decode_cleanup_expired as Decoder,
        ),
        (
            JobKindDefinition::new(REBUILD_MAVEN_INDEXES_JOB_KIND, "Rebuild Maven Indexes")
                .with_description("Rebuild the Maven index of a repository")
                .with_field(storage_field().required())
                .with_field(repository_field().required()),
            decode_rebuild_indexes as Decoder,
        ),
        (
            JobKindDefinition::new(REBUILD_MAVEN_METADATA_JOB_KIND, "Rebuild Maven Metadata")
                .with_description("Regenerate maven-metadata.xml files")
                .with_field(storage_field())
                .with_field(repository_field())
                .with_field(FieldDefinition::new("basePath", FieldType::String)),
            decode_rebuild_metadata as Decoder,
        ),
        (
            JobKindDefinition::new(DOWNLOAD_REMOTE_MAVEN_INDEX_JOB_KIND, "Download Remote Maven Index")
                .with_description("Fetch the remote index of a proxy repository")
                .with_field(storage_field().required())
                .with_field(repository_field().required()),
            decode_download_remote_index as Decoder,
        ),
        (
            JobKindDefinition::new(SCRIPT_JOB_KIND, "Script Cron Job")
                .with_description("Run an uploaded script")
                .with_field(FieldDefinition::new(SCRIPT_FILE_NAME_FIELD, FieldType::String).required()),
            decode_run_script as Decoder,
        ),
    ]
}

/// Register all built-in kinds, wired to `handler`.
pub fn register_builtin_job_kinds(
    registry: &mut JobKindRegistry,
    handler: Arc<dyn MaintenanceHandler>,
) -> Result<(), SchedulerError> {
    for (definition, decode) in builtin_job_kinds() {
        let handler = handler.clone();
        registry.register(definition, move || MaintenanceJob {
            decode,
            handler: handler.clone(),
        })?;
    }
    Ok(())
}

//! HTTP control surface for task configurations.

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::error;

use cron_types::{JobKindDefinition, TaskConfiguration, TaskConfigurationForm};

use crate::{CronTaskService, ServiceError};

pub const BASE_PATH: &str = "/api/configuration/crontasks";

/// Response header carrying the id of a saved configuration
pub const TASK_ID_HEADER: &str = "x-task-id";

/// Request header naming an uploaded script
pub const FILE_NAME_HEADER: &str = "x-file-name";

type AppState = Arc<CronTaskService>;

/// Build the router with all task configuration routes.
pub fn router(service: Arc<CronTaskService>) -> Router {
    let api = Router::new()
        .route("/", get(list_configurations).put(create_configuration))
        .route("/types/list", get(list_job_kinds))
        .route("/scripts/names", get(list_script_names))
        .route("/scripts/{id}", put(upload_script))
        .route(
            "/{id}",
            get(get_configuration)
                .put(replace_configuration)
                .delete(delete_configuration),
        );

    Router::new().nest(BASE_PATH, api).with_state(service)
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ServiceError::Validation(errors) => {
                let errors: Vec<Value> = errors
                    .grouped()
                    .into_iter()
                    .map(|(path, messages)| json!({ "name": path.to_string(), "messages": messages }))
                    .collect();
                (
                    StatusCode::BAD_REQUEST,
                    json!({ "message": "Validation failed", "errors": errors }),
                )
            }
            ServiceError::NotFound(_) => (StatusCode::NOT_FOUND, json!({ "message": self.to_string() })),
            ServiceError::InvalidRequest(_) => {
                (StatusCode::BAD_REQUEST, json!({ "message": self.to_string() }))
            }
            ServiceError::Storage(_) | ServiceError::Scheduling(_) => {
                error!(error = %self, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "message": self.to_string() }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

fn saved(id: String) -> Response {
    (
        StatusCode::OK,
        [(TASK_ID_HEADER, id.clone())],
        Json(json!({ "message": "Successfully saved cron task", "id": id })),
    )
        .into_response()
}

async fn list_configurations(State(service): State<AppState>) -> Result<Json<Value>, ServiceError> {
    let configurations = service.list()?;
    Ok(Json(json!({
        "count": configurations.len(),
        "configurations": configurations,
    })))
}

async fn get_configuration(
    State(service): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TaskConfiguration>, ServiceError> {
    service
        .get(&id)?
        .map(Json)
        .ok_or(ServiceError::NotFound(id))
}

async fn create_configuration(
    State(service): State<AppState>,
    Json(form): Json<TaskConfigurationForm>,
) -> Result<Response, ServiceError> {
    service.save(form, None).map(saved)
}

async fn replace_configuration(
    State(service): State<AppState>,
    Path(id): Path<String>,
    Json(form): Json<TaskConfigurationForm>,
) -> Result<Response, ServiceError> {
    service.save(form, Some(id)).map(saved)
}

async fn delete_configuration(
    State(service): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ServiceError> {
    if service.delete(&id)? {
        Ok(Json(json!({ "message": "Successfully deleted cron task", "id": id })))
    } else {
        Err(ServiceError::NotFound(id))
    }
}

async fn list_job_kinds(State(service): State<AppState>) -> Json<Vec<JobKindDefinition>> {
    Json(service.job_kinds())
}

async fn list_script_names(State(service): State<AppState>) -> Json<BTreeSet<String>> {
    Json(service.script_names())
}

async fn upload_script(
    State(service): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ServiceError> {
    let file_name = headers
        .get(FILE_NAME_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    service.upload_script(&id, file_name, &body)?;
    Ok(Json(json!({ "message": "Successfully uploaded script", "id": id, "fileName": file_name.trim() })))
}

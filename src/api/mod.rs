//! REST surface: the queue's operational RPCs exposed over HTTP —
//! a single `ApiError` enum mapping engine errors to HTTP status,
//! `poem-openapi` per-resource API structs wired up in
//! `make_open_api_service`.

use crate::bootstrap::Services;
use crate::error::{SafeDisplay, WorkQueueError};
use poem_openapi::payload::Json;
use poem_openapi::{ApiResponse, Object, OpenApiService, Tags};

pub mod healthcheck;
pub mod queue;
pub mod replication;

#[derive(Debug, Clone, Object)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Clone, Object)]
pub struct ErrorsBody {
    pub errors: Vec<String>,
}

#[derive(Tags)]
enum ApiTags {
    Queue,
    Replication,
    HealthCheck,
}

#[derive(ApiResponse, Debug, Clone)]
pub enum ApiError {
    /// Invalid request (e.g. spec identity mismatch).
    #[oai(status = 400)]
    BadRequest(Json<ErrorsBody>),
    /// Entity not found (no matching elements, unknown inbox element).
    #[oai(status = 404)]
    NotFound(Json<ErrorBody>),
    /// The requested operation conflicts with the workflow's current state
    /// (e.g. a terminal split failure).
    #[oai(status = 409)]
    Conflict(Json<ErrorBody>),
    /// Internal server error.
    #[oai(status = 500)]
    InternalError(Json<ErrorBody>),
}

impl ApiError {
    pub fn bad_request(error: impl Into<String>) -> Self {
        ApiError::BadRequest(Json(ErrorsBody {
            errors: vec![error.into()],
        }))
    }
}

impl From<WorkQueueError> for ApiError {
    fn from(value: WorkQueueError) -> Self {
        match &value {
            WorkQueueError::WMSpecError { .. } => ApiError::bad_request(value.to_safe_string()),
            WorkQueueError::NoMatchingElements => ApiError::NotFound(Json(ErrorBody {
                error: value.to_safe_string(),
            })),
            WorkQueueError::TerminalSplitError { .. } => ApiError::Conflict(Json(ErrorBody {
                error: value.to_safe_string(),
            })),
            WorkQueueError::Generic(_)
            | WorkQueueError::TransientAdapterError { .. }
            | WorkQueueError::Repo(_) => ApiError::InternalError(Json(ErrorBody {
                error: value.to_safe_string(),
            })),
        }
    }
}

pub(crate) type ApiResult<T> = Result<T, ApiError>;

pub type Apis = (queue::QueueApi, replication::ReplicationApi, healthcheck::HealthcheckApi);

pub fn make_open_api_service(services: &Services) -> OpenApiService<Apis, ()> {
    OpenApiService::new(
        (
            queue::QueueApi {
                engine: services.engine.clone(),
            },
            replication::ReplicationApi {
                engine: services.engine.clone(),
            },
            healthcheck::HealthcheckApi,
        ),
        "Work Queue API",
        crate::VERSION,
    )
}

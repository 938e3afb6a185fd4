//! `GET /healthcheck`, `GET /version`.

use poem_openapi::payload::Json;
use poem_openapi::{Object, OpenApi};

use crate::api::ApiTags;

#[derive(Debug, Clone, Object)]
pub struct HealthcheckResponse {}

#[derive(Debug, Clone, Object)]
pub struct VersionInfo {
    pub version: String,
}

pub struct HealthcheckApi;

#[OpenApi(prefix_path = "/", tag = ApiTags::HealthCheck)]
impl HealthcheckApi {
    #[oai(path = "/healthcheck", method = "get", operation_id = "healthcheck")]
    async fn healthcheck(&self) -> Json<HealthcheckResponse> {
        Json(HealthcheckResponse {})
    }

    #[oai(path = "/version", method = "get", operation_id = "version")]
    async fn version(&self) -> Json<VersionInfo> {
        Json(VersionInfo {
            version: crate::VERSION.to_string(),
        })
    }
}

//! Operator REST API Handlers
//!
//! Endpoints for probing a federation definition end to end and for
//! managing federation secrets in the secret backend.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use fedsync::{FederationProbe, ProbeDefinition, SecretStore, StatusReport};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shared application state
pub struct AppState {
    pub probe: FederationProbe,
    pub secrets: Arc<dyn SecretStore>,
}

// ==================== Error Handling ====================

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    pub error: String,
}

pub struct ApiError(pub StatusCode, pub Json<ErrorBody>);

impl ApiError {
    pub fn bad_request(message: impl Into<String>, error: impl Into<String>) -> Self {
        ApiError(
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                message: message.into(),
                error: error.into(),
            }),
        )
    }

    pub fn internal(message: impl Into<String>, error: impl Into<String>) -> Self {
        ApiError(
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody {
                message: message.into(),
                error: error.into(),
            }),
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, self.1).into_response()
    }
}

// ==================== Health Check ====================

pub async fn health() -> StatusCode {
    StatusCode::OK
}

// ==================== Federation Probe ====================

/// Probe a federation definition end to end.
///
/// Runs the credential check first and, only if it passed cleanly, the full
/// list-endpoint fetch with schema validation. Every probe outcome rides an
/// HTTP 200 carrying a `StatusReport`; only an undecodable request body is
/// a 400.
pub async fn test_federation(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ProbeDefinition>, JsonRejection>,
) -> Response {
    let Json(definition) = match payload {
        Ok(json) => json,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(StatusReport::new(
                    400,
                    false,
                    "unable to decode request body",
                    &e.to_string(),
                )),
            )
                .into_response();
        }
    };

    let report = state.probe.credentials(&definition).await;
    if !report.errors.is_empty() {
        return (StatusCode::OK, Json(report)).into_response();
    }

    let report = state.probe.list_endpoint(&definition).await;
    if !report.errors.is_empty() {
        return (StatusCode::OK, Json(report)).into_response();
    }

    (
        StatusCode::OK,
        Json(StatusReport::new(200, true, "Test Successful", "")),
    )
        .into_response()
}

// ==================== Federation Secrets ====================

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSecretRequest {
    pub secret_id: String,
    /// Serialized credential payload, stored verbatim
    pub payload: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteSecretRequest {
    pub secret_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Create a federation's secret in the backend.
pub async fn create_federation_secret(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateSecretRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(request) = payload
        .map_err(|e| ApiError::bad_request("unable to decode request body", e.to_string()))?;

    let reference = state
        .secrets
        .create_secret(&request.secret_id, &request.payload)
        .await
        .map_err(|e| ApiError::internal("unable to create secret", e.to_string()))?;

    Ok(Json(MessageResponse { message: reference }))
}

/// Add a new version to a federation's secret.
pub async fn update_federation_secret(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateSecretRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(request) = payload
        .map_err(|e| ApiError::bad_request("unable to decode request body", e.to_string()))?;

    let reference = state
        .secrets
        .update_secret(&request.secret_id, &request.payload)
        .await
        .map_err(|e| ApiError::internal("unable to update secret", e.to_string()))?;

    Ok(Json(MessageResponse { message: reference }))
}

/// Delete a federation's secret and all its versions.
pub async fn delete_federation_secret(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DeleteSecretRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(request) = payload
        .map_err(|e| ApiError::bad_request("unable to decode request body", e.to_string()))?;

    state
        .secrets
        .delete_secret(&request.secret_id)
        .await
        .map_err(|e| ApiError::internal("unable to delete secret", e.to_string()))?;

    Ok(Json(MessageResponse {
        message: "OK".to_string(),
    }))
}

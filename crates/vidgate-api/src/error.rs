//! HTTP error response conversion.
//!
//! Handlers return `Result<impl IntoResponse, HttpAppError>`; domain errors
//! convert via `?` and render with a consistent status, body, and log line.

use axum::{
    extract::rejection::JsonRejection,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Serialize};
use utoipa::ToSchema;

use vidgate_core::AppError;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    /// Machine-readable error code for programmatic handling.
    pub code: String,
    /// Whether the client may retry the same request.
    pub recoverable: bool,
}

/// Wrapper so `IntoResponse` can be implemented for the domain error type
/// without violating orphan rules.
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

/// Rejections from JSON body extraction render in the same shape as domain
/// validation errors.
impl From<JsonRejection> for HttpAppError {
    fn from(rejection: JsonRejection) -> Self {
        HttpAppError(AppError::Validation(format!(
            "Invalid request body: {}",
            rejection.body_text()
        )))
    }
}

fn status_for(error: &AppError) -> StatusCode {
    match error {
        AppError::Validation(_) => StatusCode::BAD_REQUEST,
        AppError::NotFound(_) => StatusCode::NOT_FOUND,
        AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);

        if status.is_server_error() {
            tracing::error!(error = %self.0, code = self.0.code(), "Request failed");
        } else {
            tracing::debug!(error = %self.0, code = self.0.code(), "Request rejected");
        }

        let body = Json(ErrorResponse {
            error: self.0.to_string(),
            code: self.0.code().to_string(),
            recoverable: self.0.is_recoverable(),
        });
        (status, body).into_response()
    }
}

/// JSON extractor that reports deserialization failures as a 400 in the API's
/// own error shape instead of axum's default rejection.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = HttpAppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(inner) = Json::<T>::from_request(req, state)
            .await
            .map_err(HttpAppError::from)?;
        Ok(ValidatedJson(inner))
    }
}

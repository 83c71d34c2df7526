// HTTP Routes
// Thin dispatch from the three GET endpoints to the language service

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::models::{DetectionResponse, EvaluationReport};
use crate::services::corpus::CorpusError;
use crate::services::detection_client::{DetectionError, LanguageDetector};
use crate::services::evaluation::EvaluationError;
use crate::services::language_service::LanguageService;

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

/// Error response with a stable kind so callers can tell failures apart.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub kind: &'static str,
    pub message: String,
}

impl ApiError {
    fn new(status: StatusCode, kind: &'static str, err: impl std::fmt::Display) -> Self {
        Self {
            status,
            kind,
            message: err.to_string(),
        }
    }
}

impl From<EvaluationError> for ApiError {
    fn from(err: EvaluationError) -> Self {
        let (status, kind) = match &err {
            EvaluationError::Input(_)
            | EvaluationError::Corpus(CorpusError::IndexOutOfRange { .. })
            | EvaluationError::Detection(DetectionError::InvalidInput(_)) => {
                (StatusCode::BAD_REQUEST, "input_validation")
            }
            EvaluationError::Corpus(_) => (StatusCode::INTERNAL_SERVER_ERROR, "corpus_error"),
            EvaluationError::Detection(DetectionError::Config(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "configuration_error")
            }
            EvaluationError::Detection(DetectionError::Timeout(_)) => {
                (StatusCode::GATEWAY_TIMEOUT, "external_timeout")
            }
            EvaluationError::Detection(DetectionError::HttpError(e)) if e.is_timeout() => {
                (StatusCode::GATEWAY_TIMEOUT, "external_timeout")
            }
            EvaluationError::Detection(
                DetectionError::HttpError(_) | DetectionError::ApiError { .. } | DetectionError::JsonError(_),
            ) => (StatusCode::BAD_GATEWAY, "external_service_error"),
        };
        Self::new(status, kind, err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!(status = self.status.as_u16(), kind = self.kind, message = %self.message, "request.failed");
        let body = ErrorBody {
            error: self.kind,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

pub fn router<D>(service: Arc<LanguageService<D>>) -> Router
where
    D: LanguageDetector + 'static,
{
    Router::new()
        .route("/detect_languages/:text", get(detect_languages::<D>))
        .route("/test_languages_list_indices/:text", get(test_languages_list_indices::<D>))
        .route("/test_languages_nb_indices/:nb", get(test_languages_nb_indices::<D>))
        .with_state(service)
}

/// Language detection of sentences passed in the path, comma separated.
async fn detect_languages<D: LanguageDetector + 'static>(
    State(service): State<Arc<LanguageService<D>>>,
    Path(text): Path<String>,
) -> Result<Json<DetectionResponse>, ApiError> {
    let span = info_span!("request", request_id = %Uuid::new_v4(), route = "detect_languages");
    async move {
        let response = service.detect_text(&text).await?;
        info!(documents = response.documents.len(), "request.ok");
        Ok(Json(response))
    }
    .instrument(span)
    .await
}

/// Detection of the corpus sentences whose indices are passed in the path.
async fn test_languages_list_indices<D: LanguageDetector + 'static>(
    State(service): State<Arc<LanguageService<D>>>,
    Path(text): Path<String>,
) -> Result<Json<DetectionResponse>, ApiError> {
    let span = info_span!("request", request_id = %Uuid::new_v4(), route = "test_languages_list_indices");
    async move {
        let response = service.detect_indices_text(&text).await?;
        info!(documents = response.documents.len(), "request.ok");
        Ok(Json(response))
    }
    .instrument(span)
    .await
}

/// Success rate of the detector over a random sample of the corpus.
async fn test_languages_nb_indices<D: LanguageDetector + 'static>(
    State(service): State<Arc<LanguageService<D>>>,
    Path(nb): Path<String>,
) -> Result<Json<EvaluationReport>, ApiError> {
    let span = info_span!("request", request_id = %Uuid::new_v4(), route = "test_languages_nb_indices");
    async move {
        let outcome = service.evaluate_text(&nb).await?;
        info!(success_percentage = outcome.success_percentage, "request.ok");
        Ok(Json(EvaluationReport::from(&outcome)))
    }
    .instrument(span)
    .await
}

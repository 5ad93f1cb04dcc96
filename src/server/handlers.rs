// HTTP request handlers

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;

use super::RewriteServer;
use crate::errors::{generic_error_message, RewriteError};
use crate::prompts::Task;

/// Create the main application router
pub fn create_router(server: Arc<RewriteServer>) -> Router {
    Router::new()
        .route("/api/interface/grammar_check", post(grammar_check))
        .route("/api/interface/paraphrase", post(paraphrase))
        .route("/api/interface/aiBypass", post(ai_bypass))
        .route("/health", get(health_check))
        .with_state(server)
}

/// Health check endpoint
pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn grammar_check(
    State(server): State<Arc<RewriteServer>>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    handle_rewrite(server, Task::GrammarCorrection, body).await
}

async fn paraphrase(
    State(server): State<Arc<RewriteServer>>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    handle_rewrite(server, Task::Paraphrase, body).await
}

async fn ai_bypass(
    State(server): State<Arc<RewriteServer>>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    handle_rewrite(server, Task::DetectorEvasion, body).await
}

/// `{text, style}` read leniently: a body that is not a JSON object, or a
/// field that is not a string, counts as absent.
fn parse_fields(body: &[u8]) -> (Option<String>, Option<String>) {
    let object = match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(object)) => object,
        _ => Map::new(),
    };
    let field = |name: &str| object.get(name).and_then(Value::as_str).map(String::from);
    (field("text"), field("style"))
}

async fn handle_rewrite(
    server: Arc<RewriteServer>,
    task: Task,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let locale = server.config().error_locale.clone();
    let (text, style) = parse_fields(&body);
    let service = Arc::clone(server.service());

    // Inference is CPU-bound; keep it off the async workers
    let outcome = tokio::task::spawn_blocking(move || {
        service.handle(task, text.as_deref(), style.as_deref())
    })
    .await
    .map_err(|e| {
        tracing::error!(error = %e, operation = task.operation(), "Rewrite worker panicked");
        AppError::new(RewriteError::Generation(anyhow::anyhow!("worker panicked: {}", e)), &locale)
    })?
    .map_err(|e| AppError::new(e, &locale))?;

    let mut response = Map::new();
    response.insert(
        task.response_field().to_string(),
        Value::String(outcome.normalized_text),
    );
    Ok(Json(Value::Object(response)))
}

/// Application error wrapper for proper HTTP error responses
///
/// Validation failures are returned verbatim with 400. Everything else is
/// answered with the localized generic message.
pub struct AppError {
    error: RewriteError,
    locale: String,
}

impl AppError {
    pub fn new(error: RewriteError, locale: &str) -> Self {
        Self {
            error,
            locale: locale.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.error.is_client_error() {
            let body = json!({ "error": self.error.to_string() });
            return (StatusCode::BAD_REQUEST, Json(body)).into_response();
        }

        // Detail was already logged inside the request span
        let body = json!({ "error": generic_error_message(&self.locale) });
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ValidationError;

    #[test]
    fn test_parse_fields_lenient() {
        assert_eq!(
            parse_fields(br#"{"text": "Hi", "style": "casual"}"#),
            (Some("Hi".to_string()), Some("casual".to_string()))
        );
        assert_eq!(parse_fields(b"not json"), (None, None));
        assert_eq!(parse_fields(b"[1, 2]"), (None, None));
        assert_eq!(parse_fields(br#"{"text": 42}"#), (None, None));
        assert_eq!(parse_fields(b""), (None, None));
    }

    #[test]
    fn test_validation_error_is_400() {
        let error = AppError::new(RewriteError::Validation(ValidationError::MissingText), "ar");
        assert_eq!(error.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_internal_error_is_500() {
        let error = AppError::new(RewriteError::Generation(anyhow::anyhow!("boom")), "en");
        assert_eq!(error.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

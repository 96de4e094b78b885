use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use tracing::error;

use invoicer_core::DomainError;
use invoicer_documents::RenderError;

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        err @ DomainError::NotFound { .. } => {
            json_error(StatusCode::NOT_FOUND, "not_found", err.to_string())
        }
        DomainError::Storage(msg) => {
            error!(error = %msg, "storage failure");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "store_error",
                "storage backend failure",
            )
        }
    }
}

/// Out-of-range amounts answer 400 `validation_error`; everything else is a
/// 500 `render_error`.
pub fn render_error_to_response(err: RenderError) -> axum::response::Response {
    if let RenderError::Amount(msg) = &err {
        return json_error(StatusCode::BAD_REQUEST, "validation_error", msg.clone());
    }
    error!(error = %err, "invoice rendering failed");
    let msg = match err {
        RenderError::Template(msg) => format!("template: {msg}"),
        RenderError::Markup(msg) => format!("markup: {msg}"),
        RenderError::Converter(msg) => format!("converter: {msg}"),
        RenderError::Amount(msg) => msg,
    };
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "render_error", msg)
}

/// Malformed or missing JSON bodies are a plain 400, including the cases
/// axum would report as 415 or 422.
pub fn body_rejection_to_response(rejection: JsonRejection) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_body", rejection.body_text())
}

pub fn invalid_id(raw: &str) -> axum::response::Response {
    json_error(
        StatusCode::BAD_REQUEST,
        "invalid_id",
        format!("'{raw}' is not a valid id"),
    )
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

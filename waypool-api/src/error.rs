use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use waypool_bookings::EngineError;
use waypool_core::identity::IdentityError;
use waypool_core::{Categorized, ErrorCategory};
use waypool_trips::TripServiceError;

#[derive(Debug)]
pub enum AppError {
    Trip(TripServiceError),
    Booking(EngineError),
    Identity(IdentityError),
}

impl From<TripServiceError> for AppError {
    fn from(e: TripServiceError) -> Self {
        Self::Trip(e)
    }
}

impl From<EngineError> for AppError {
    fn from(e: EngineError) -> Self {
        Self::Booking(e)
    }
}

impl From<IdentityError> for AppError {
    fn from(e: IdentityError) -> Self {
        Self::Identity(e)
    }
}

fn status_for(category: ErrorCategory) -> StatusCode {
    match category {
        ErrorCategory::Validation => StatusCode::BAD_REQUEST,
        ErrorCategory::Conflict => StatusCode::CONFLICT,
        ErrorCategory::InvalidState => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorCategory::NotFound => StatusCode::NOT_FOUND,
        ErrorCategory::Forbidden => StatusCode::FORBIDDEN,
        ErrorCategory::Transient => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, category, message) = match &self {
            AppError::Trip(e) => (status_for(e.category()), e.category(), e.to_string()),
            AppError::Booking(e) => (status_for(e.category()), e.category(), e.to_string()),
            AppError::Identity(e) => (
                StatusCode::UNAUTHORIZED,
                ErrorCategory::Forbidden,
                e.to_string(),
            ),
        };

        if status.is_server_error() {
            tracing::error!("request failed: {}", message);
        }

        let body = Json(json!({
            "error": message,
            "category": category,
        }));

        (status, body).into_response()
    }
}

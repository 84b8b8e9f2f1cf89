use axum::response::{IntoResponse, Response};

use super::AppError;

/// Router fallback rendering the uniform 404 body.
pub async fn not_found() -> Response {
    AppError::NotFound("The requested resource was not found".to_string()).into_response()
}

use axum::response::IntoResponse;
use http::StatusCode;

/// Answers as long as the listener is accepting; upstream providers are not
/// contacted
pub async fn liveness() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

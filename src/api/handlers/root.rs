use axum::response::IntoResponse;

// axum handler for root
pub async fn root() -> impl IntoResponse {
    format!(
        "{} {} - API under /api/students, docs at /swagger-ui",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    )
}

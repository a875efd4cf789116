use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};

use super::HTTP_REQUESTS_TOTAL;

/// Count requests by method, route template and status.
///
/// Routes are labelled by their template (`/v1/runs/:id`) so the label set
/// stays bounded.
pub async fn track_http_requests(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, response.status().as_str()])
        .inc();

    response
}

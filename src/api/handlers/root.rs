use axum::response::IntoResponse;

/// axum handler for the root path, returns the app name and version
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "App name and version", body = String)
    ),
    tag = "health"
)]
pub async fn root() -> impl IntoResponse {
    concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::to_bytes, response::IntoResponse};

    #[tokio::test]
    async fn test_root() {
        let response = root().await.into_response();
        assert_eq!(response.status(), 200);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.starts_with(env!("CARGO_PKG_NAME")));
        assert!(body.ends_with(env!("CARGO_PKG_VERSION")));
    }
}

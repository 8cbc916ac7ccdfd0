#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use tower::ServiceExt;

    use crate::tests::support::*;

    #[tokio::test]
    async fn test_healthz() {
        let t = setup_test_app().await;
        let response = t.app.oneshot(request(Method::GET, "/healthz", None, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, b"ok");
    }

    #[tokio::test]
    async fn test_readyz() {
        let t = setup_test_app().await;
        let response = t.app.oneshot(request(Method::GET, "/readyz", None, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_readyz_reports_closed_pool() {
        let t = setup_test_app().await;
        t.db().close().await;
        let response = t.app.clone().oneshot(request(Method::GET, "/readyz", None, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_metrics() {
        let t = setup_test_app().await;
        let response = t.app.oneshot(request(Method::GET, "/metrics", None, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        for key in [
            "books_created",
            "books_updated",
            "books_deleted",
            "relations_updated",
            "permission_denied",
            "uptime_seconds",
        ] {
            assert!(body[key].is_u64(), "missing {}", key);
        }
    }

    #[tokio::test]
    async fn test_version() {
        let t = setup_test_app().await;
        let response = t.app.oneshot(request(Method::GET, "/version", None, None)).await.unwrap();
        let body = body_json(response).await;
        assert_eq!(body["name"], "libris");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_security_headers() {
        let t = setup_test_app().await;
        let response = t.app.oneshot(request(Method::GET, "/book/", None, None)).await.unwrap();
        let headers = response.headers();
        assert_eq!(headers["x-content-type-options"], "nosniff");
        assert_eq!(headers["x-frame-options"], "DENY");
        assert_eq!(headers["referrer-policy"], "no-referrer");
        assert_eq!(headers["cache-control"], "no-store");
        assert!(headers.get("strict-transport-security").is_none());
    }
}

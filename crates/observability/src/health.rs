//! Health-Check-Endpunkt fuer LiftCom
//!
//! Endpoint: `GET /health`
//! Response: statischer Text `ok` (fuer Load-Balancer und Hosting-Proben)

use axum::{Router, http::header, response::IntoResponse, routing::get};

/// Body der Health-Antwort
pub const HEALTH_BODY: &str = "ok";

/// Axum-Router fuer den `/health`-Endpunkt
pub fn health_router() -> Router {
    Router::new().route("/health", get(health_handler))
}

/// `GET /health` – unabhaengig vom Relay-Zustand immer `200 ok`
async fn health_handler() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], HEALTH_BODY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, http::StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn health_liefert_ok() {
        let antwort = health_router()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(antwort.status(), StatusCode::OK);

        let body = axum::body::to_bytes(antwort.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn unbekannter_pfad_ist_404() {
        let antwort = health_router()
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(antwort.status(), StatusCode::NOT_FOUND);
    }
}

use axum::extract::State;
use axum::http::header::{CONTENT_TYPE, HOST};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use tracing::{error, info};

use super::AppState;
use crate::texml;

const DEFAULT_HOST: &str = "localhost";

/// `GET /`
pub async fn health_check() -> Json<Value> {
    Json(json!({ "message": "Telnyx Media Stream Server is running!" }))
}

/// `POST /inbound`: answers the platform's call webhook with the TeXML
/// document pointing it at our media stream socket.
pub async fn inbound_call(State(state): State<AppState>, headers: HeaderMap) -> Response {
    info!("Incoming call received");

    let host = headers
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_HOST);

    match texml::load_and_render(&state.config.texml_path, host).await {
        Ok(body) => (StatusCode::OK, [(CONTENT_TYPE, "text/xml")], body).into_response(),
        Err(e) => {
            error!("{}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(CONTENT_TYPE, "text/plain")],
                "TeXML file not found",
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::Path;

    use axum::body::Body;
    use axum::http::Request;
    use axum::Router;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::server::{http_router, AppState};

    fn app(texml_path: &Path) -> Router {
        let path = texml_path.display().to_string();
        let config = Config::from_lookup(|key| match key {
            "OPENAI_API_KEY" => Some("sk-test".to_string()),
            "TEXML_PATH" => Some(path.clone()),
            _ => None,
        })
        .unwrap();
        http_router(AppState::new(config))
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn template() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"<Response><Connect><Stream url="wss://{{host}}/media-stream"/></Connect></Response>"#
        )
        .unwrap();
        file
    }

    #[tokio::test]
    async fn inbound_renders_host_into_texml() {
        let file = template();
        let response = app(file.path())
            .oneshot(
                Request::post("/inbound")
                    .header("host", "example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(response.headers()["content-type"], "text/xml");
        let body = body_string(response).await;
        assert!(body.contains("wss://example.com/media-stream"));
        assert!(!body.contains("{host}"));
    }

    #[tokio::test]
    async fn inbound_without_host_uses_localhost() {
        let file = template();
        let response = app(file.path())
            .oneshot(Request::post("/inbound").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        assert!(body_string(response).await.contains("wss://localhost/media-stream"));
    }

    #[tokio::test]
    async fn missing_template_is_server_error() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(&dir.path().join("texml.xml"))
            .oneshot(
                Request::post("/inbound")
                    .header("host", "example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), 500);
        assert_eq!(response.headers()["content-type"], "text/plain");
        assert_eq!(body_string(response).await, "TeXML file not found");
    }

    #[tokio::test]
    async fn health_check_is_repeatable() {
        let file = template();
        let app = app(file.path());
        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(Request::get("/").body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), 200);
            let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
            assert_eq!(body["message"], "Telnyx Media Stream Server is running!");
        }
    }

    #[tokio::test]
    async fn unknown_routes_and_methods_are_not_found() {
        let file = template();
        let app = app(file.path());
        for request in [
            Request::get("/inbound").body(Body::empty()).unwrap(),
            Request::post("/").body(Body::empty()).unwrap(),
            Request::get("/nope").body(Body::empty()).unwrap(),
            Request::get("/media-stream").body(Body::empty()).unwrap(),
        ] {
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), 404);
            assert_eq!(body_string(response).await, "Not Found");
        }
    }
}

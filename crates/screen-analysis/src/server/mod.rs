//! HTTP surface.
//!
//! ```text
//! GET  /                  welcome message
//! GET  /health            liveness
//! GET  /api/              capture page (templates/index.html)
//! POST /api/analyze       JSON {image, prompt?, backend?, model?}
//! POST /api/analyze/file  multipart upload
//!      /static/*          static assets
//! ```

mod error;
mod handlers;

use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use screen_analysis_core::{Analyzer, Config};
use serde_json::json;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{self, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub use error::ApiError;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub analyzer: Arc<Analyzer>,
    pub templates_dir: PathBuf,
}

impl AppState {
    pub fn new(analyzer: Arc<Analyzer>, config: &Config) -> Self {
        Self {
            analyzer,
            templates_dir: config.templates_dir(),
        }
    }
}

/// Build the application router.
///
/// Fails if a configured CORS origin is not a valid header value.
pub fn router(state: AppState, config: &Config) -> anyhow::Result<Router> {
    let routes = Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/api", get(handlers::index))
        .route("/api/", get(handlers::index))
        .route("/api/analyze", post(handlers::analyze))
        .route("/api/analyze/file", post(handlers::analyze_file))
        .with_state(state);

    with_middleware(routes, config)
}

fn with_middleware(routes: Router, config: &Config) -> anyhow::Result<Router> {
    Ok(routes
        .nest_service("/static", ServeDir::new(config.static_dir()))
        .layer(DefaultBodyLimit::max(config.server.max_body_mb * 1024 * 1024))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(create_cors_layer(&config.server.cors_origins)?)
        .layer(TraceLayer::new_for_http()))
}

/// Create the CORS layer. A `"*"` entry allows any origin.
fn create_cors_layer(origins: &[String]) -> anyhow::Result<CorsLayer> {
    if origins.iter().any(|origin| origin == "*") {
        return Ok(CorsLayer::new()
            .allow_origin(cors::Any)
            .allow_methods(cors::Any)
            .allow_headers(cors::Any));
    }

    let mut allowed = Vec::with_capacity(origins.len());
    for origin in origins {
        allowed.push(
            origin
                .parse::<HeaderValue>()
                .map_err(|e| anyhow::anyhow!("Invalid CORS origin {origin:?}: {e}"))?,
        );
    }

    Ok(CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(cors::Any))
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let details = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    tracing::error!("Handler panicked: {}", details);

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "detail": "Internal server error" })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum_test::multipart::{MultipartForm, Part};
    use axum_test::TestServer;
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
    use serde_json::Value;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PIXEL_PNG: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

    // Backends that are never contacted still need an endpoint.
    const UNREACHABLE: &str = "http://127.0.0.1:9";

    /// An endpoint with nothing listening, so connections are refused.
    fn closed_endpoint() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        format!("http://127.0.0.1:{port}")
    }

    fn test_config(endpoint: &str, root: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.remote.endpoint = endpoint.to_string();
        config.paths.templates_dir = root.join("templates");
        config.paths.static_dir = root.join("static");
        config.local.model_dir = root.join("models");
        config
    }

    fn test_server(config: &Config) -> TestServer {
        let analyzer = Arc::new(Analyzer::new(config));
        TestServer::new(router(AppState::new(analyzer, config), config).unwrap()).unwrap()
    }

    async fn mock_ollama(text: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "llava",
                "response": text,
                "done": true
            })))
            .mount(&server)
            .await;
        server
    }

    fn analyze_body(backend: &str) -> Value {
        json!({
            "image": PIXEL_PNG,
            "prompt": "Describe this image",
            "backend": backend,
        })
    }

    #[tokio::test]
    async fn test_root_and_health() {
        let dir = tempfile::tempdir().unwrap();
        let server = test_server(&test_config(UNREACHABLE, dir.path()));

        let root = server.get("/").await;
        root.assert_status_ok();
        let body: Value = root.json();
        assert_eq!(body["message"], "Welcome to Screen Analysis API");

        // Healthy even though no backend is reachable.
        let health = server.get("/health").await;
        health.assert_status_ok();
        let body: Value = health.json();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["version"], screen_analysis_core::VERSION);
    }

    #[tokio::test]
    async fn test_unsupported_backend_is_400() {
        let dir = tempfile::tempdir().unwrap();
        let server = test_server(&test_config(UNREACHABLE, dir.path()));

        let response = server.post("/api/analyze").json(&analyze_body("gpt-vision")).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["detail"], "Unsupported backend: gpt-vision");
    }

    #[tokio::test]
    async fn test_malformed_base64_is_400() {
        let dir = tempfile::tempdir().unwrap();
        let server = test_server(&test_config(UNREACHABLE, dir.path()));

        let response = server
            .post("/api/analyze")
            .json(&json!({ "image": "not base64 at all!", "backend": "remote-llm" }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert!(body["detail"].as_str().unwrap().starts_with("Invalid image data"));
    }

    #[tokio::test]
    async fn test_malformed_json_is_400() {
        let dir = tempfile::tempdir().unwrap();
        let server = test_server(&test_config(UNREACHABLE, dir.path()));

        let response = server
            .post("/api/analyze")
            .json(&json!({ "prompt": "no image field" }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert!(body["detail"].as_str().unwrap().starts_with("Invalid request body"));
    }

    #[tokio::test]
    async fn test_unreachable_remote_is_500_with_connection_error() {
        let dir = tempfile::tempdir().unwrap();
        let server = test_server(&test_config(&closed_endpoint(), dir.path()));

        let response = server.post("/api/analyze").json(&analyze_body("remote-llm")).await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = response.json();
        assert!(body["detail"]
            .as_str()
            .unwrap()
            .contains("Error communicating with Ollama"));
    }

    #[tokio::test]
    async fn test_remote_llm_success() {
        let ollama = mock_ollama("A blank screen.").await;
        let dir = tempfile::tempdir().unwrap();
        let server = test_server(&test_config(&ollama.uri(), dir.path()));

        let response = server.post("/api/analyze").json(&analyze_body("remote-llm")).await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["analysis"], "A blank screen.");
        assert_eq!(body["backend"], "remote-llm");
        assert_eq!(body["model"], "llava");
        assert!(body["processing_time"].as_f64().unwrap() >= 0.0);
    }

    #[tokio::test]
    async fn test_local_model_missing_is_500() {
        let dir = tempfile::tempdir().unwrap();
        let server = test_server(&test_config(UNREACHABLE, dir.path()));

        let response = server.post("/api/analyze").json(&analyze_body("local-model")).await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = response.json();
        assert!(body["detail"].as_str().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn test_index_template() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(UNREACHABLE, dir.path());
        let server = test_server(&config);

        let missing = server.get("/api/").await;
        missing.assert_status(StatusCode::NOT_FOUND);
        let body: Value = missing.json();
        assert!(body["detail"].is_string());

        std::fs::create_dir_all(&config.paths.templates_dir).unwrap();
        std::fs::write(
            config.paths.templates_dir.join("index.html"),
            "<h1>Screen Analysis</h1>",
        )
        .unwrap();

        let page = server.get("/api/").await;
        page.assert_status_ok();
        assert_eq!(page.text(), "<h1>Screen Analysis</h1>");
    }

    #[tokio::test]
    async fn test_static_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(UNREACHABLE, dir.path());
        std::fs::create_dir_all(config.paths.static_dir.join("js")).unwrap();
        std::fs::write(config.paths.static_dir.join("js/app.js"), "console.log(1);").unwrap();
        let server = test_server(&config);

        let response = server.get("/static/js/app.js").await;
        response.assert_status_ok();
        assert_eq!(response.text(), "console.log(1);");
    }

    #[tokio::test]
    async fn test_file_upload_success() {
        let ollama = mock_ollama("An uploaded pixel.").await;
        let dir = tempfile::tempdir().unwrap();
        let server = test_server(&test_config(&ollama.uri(), dir.path()));

        let png = BASE64.decode(PIXEL_PNG).unwrap();
        let form = MultipartForm::new()
            .add_text("prompt", "Describe this image")
            .add_part("file", Part::bytes(png).file_name("pixel.png").mime_type("image/png"));

        let response = server
            .post("/api/analyze/file")
            .add_query_param("backend", "ollama")
            .multipart(form)
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["analysis"], "An uploaded pixel.");
        assert_eq!(body["backend"], "remote-llm");

        let received = ollama.received_requests().await.unwrap();
        let sent: Value = serde_json::from_slice(&received[0].body).unwrap();
        assert_eq!(sent["prompt"], "Describe this image");
    }

    #[tokio::test]
    async fn test_file_upload_text_part_wins_over_query() {
        let dir = tempfile::tempdir().unwrap();
        let server = test_server(&test_config(UNREACHABLE, dir.path()));

        let png = BASE64.decode(PIXEL_PNG).unwrap();
        let form = MultipartForm::new()
            .add_text("backend", "nope")
            .add_part("file", Part::bytes(png).file_name("pixel.png"));

        let response = server
            .post("/api/analyze/file")
            .add_query_param("backend", "remote-llm")
            .multipart(form)
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(
            body["detail"],
            "Error processing image: Unsupported backend: nope"
        );
    }

    #[tokio::test]
    async fn test_file_upload_rejects_bad_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let server = test_server(&test_config(UNREACHABLE, dir.path()));

        let form = MultipartForm::new()
            .add_part("file", Part::bytes(b"definitely not an image".to_vec()).file_name("x.png"));
        let response = server.post("/api/analyze/file").multipart(form).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert!(body["detail"]
            .as_str()
            .unwrap()
            .starts_with("Error processing image:"));
    }

    #[tokio::test]
    async fn test_file_upload_missing_file_part() {
        let dir = tempfile::tempdir().unwrap();
        let server = test_server(&test_config(UNREACHABLE, dir.path()));

        let form = MultipartForm::new().add_text("prompt", "hello");
        let response = server.post("/api/analyze/file").multipart(form).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["detail"], "Error processing image: missing `file` part");
    }

    #[tokio::test]
    async fn test_file_upload_backend_failure_stays_500() {
        let dir = tempfile::tempdir().unwrap();
        let server = test_server(&test_config(&closed_endpoint(), dir.path()));

        let png = BASE64.decode(PIXEL_PNG).unwrap();
        let form = MultipartForm::new().add_part("file", Part::bytes(png).file_name("pixel.png"));
        let response = server.post("/api/analyze/file").multipart(form).await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_panic_becomes_generic_500() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(UNREACHABLE, dir.path());
        async fn boom() -> &'static str {
            panic!("handler exploded")
        }
        let routes = Router::new().route("/boom", get(boom));
        let server = TestServer::new(with_middleware(routes, &config).unwrap()).unwrap();

        let response = server.get("/boom").await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = response.json();
        assert_eq!(body["detail"], "Internal server error");
    }

    async fn preflight(server: &TestServer, origin: &'static str) -> axum_test::TestResponse {
        server
            .method(Method::OPTIONS, "/api/analyze")
            .add_header(
                axum::http::header::ORIGIN,
                HeaderValue::from_static(origin),
            )
            .add_header(
                axum::http::header::ACCESS_CONTROL_REQUEST_METHOD,
                HeaderValue::from_static("POST"),
            )
            .add_header(
                axum::http::header::ACCESS_CONTROL_REQUEST_HEADERS,
                HeaderValue::from_static("content-type"),
            )
            .await
    }

    #[tokio::test]
    async fn test_cors_preflight_allows_any_origin_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let server = test_server(&test_config(UNREACHABLE, dir.path()));

        let response = preflight(&server, "http://other.example").await;
        response.assert_status_ok();
        assert_eq!(
            response.header(axum::http::header::ACCESS_CONTROL_ALLOW_ORIGIN),
            "*"
        );
    }

    #[tokio::test]
    async fn test_cors_simple_request_carries_allow_origin() {
        let dir = tempfile::tempdir().unwrap();
        let server = test_server(&test_config(UNREACHABLE, dir.path()));

        let response = server
            .get("/health")
            .add_header(
                axum::http::header::ORIGIN,
                HeaderValue::from_static("http://other.example"),
            )
            .await;
        response.assert_status_ok();
        assert_eq!(
            response.header(axum::http::header::ACCESS_CONTROL_ALLOW_ORIGIN),
            "*"
        );
    }

    #[tokio::test]
    async fn test_cors_restricted_origins() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(UNREACHABLE, dir.path());
        config.server.cors_origins = vec!["https://dashboard.example".to_string()];
        let server = test_server(&config);

        let allowed = preflight(&server, "https://dashboard.example").await;
        allowed.assert_status_ok();
        assert_eq!(
            allowed.header(axum::http::header::ACCESS_CONTROL_ALLOW_ORIGIN),
            "https://dashboard.example"
        );

        let denied = preflight(&server, "http://other.example").await;
        assert!(denied
            .maybe_header(axum::http::header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
    }

    #[test]
    fn test_create_cors_layer_rejects_bad_origin() {
        assert!(create_cors_layer(&["https://bad\norigin".to_string()]).is_err());
    }
}

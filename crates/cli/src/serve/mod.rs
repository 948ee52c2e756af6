//! `proctrack serve` -- HTTP JSON API over the process store.
//!
//! Security features:
//! - CORS headers on all responses (permissive)
//! - Optional API key authentication (`--api-key` / `PROCTRACK_API_KEY`)
//! - Request body size limit
//!
//! Endpoints:
//! - GET    /health              - Server status (exempt from auth)
//! - GET    /processes           - List records (skip, limit, department, status)
//! - POST   /processes           - Create a record
//! - POST   /processes/import    - Bulk create from a CSV body
//! - GET    /processes/{id}      - Fetch one record
//! - PUT    /processes/{id}      - Partially update a record
//! - DELETE /processes/{id}      - Delete a record
//!
//! All responses except 204 use Content-Type: application/json.

mod error;
mod handlers;
mod middleware;
mod state;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{middleware as axum_middleware, Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use proctrack_storage::{FileStorage, MemoryStorage, ProcessStorage, ProcessStore};

use crate::config::{DataLocation, ServeConfig};

use self::handlers::{
    handle_create, handle_delete, handle_get, handle_health, handle_import, handle_list,
    handle_not_found, handle_update,
};
use self::middleware::auth_middleware;
use self::state::AppState;

/// Maximum request body size: 10 MB.
const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Construct a JSON error response with the given status code and message.
fn json_error(status: StatusCode, message: &str) -> impl IntoResponse {
    (status, Json(serde_json::json!({"error": message})))
}

/// Build the router over an already opened store.
pub(crate) fn router(store: ProcessStore, api_key: Option<String>) -> Router {
    let state = Arc::new(AppState { store, api_key });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/processes", get(handle_list).post(handle_create))
        .route("/processes/import", post(handle_import))
        .route(
            "/processes/{id}",
            get(handle_get).put(handle_update).delete(handle_delete),
        )
        .fallback(handle_not_found)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .with_state(state)
}

/// Open the configured backend.
pub(crate) fn open_storage(data: &DataLocation) -> Result<Arc<dyn ProcessStorage>, Box<dyn std::error::Error>> {
    Ok(match data {
        DataLocation::File(path) => Arc::new(FileStorage::open(path)?),
        DataLocation::Memory => {
            tracing::warn!("using in-memory storage; records are lost on shutdown");
            Arc::new(MemoryStorage::new())
        }
    })
}

/// Start the HTTP server and run until Ctrl+C.
///
/// When TLS cert/key paths are configured, the server listens over HTTPS
/// using `axum-server` with rustls. Otherwise it uses plain HTTP. The store
/// is closed after the server stops accepting requests.
pub async fn start_server(config: ServeConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = ProcessStore::new(open_storage(&config.data)?).with_rules(config.rules.clone());

    if config.api_key.is_some() {
        tracing::info!("API key authentication enabled");
    }
    if config.rules.strict_apps {
        tracing::info!("strict application list enabled");
    }

    let app = router(store.clone(), config.api_key.clone());
    let addr = format!("0.0.0.0:{}", config.port);

    // TLS support via axum-server + rustls (requires `tls` feature)
    #[cfg(feature = "tls")]
    if let (Some(cert_path), Some(key_path)) = (&config.tls_cert, &config.tls_key) {
        let tls = axum_server::tls_rustls::RustlsConfig::from_pem_file(cert_path, key_path).await?;
        let socket_addr: std::net::SocketAddr = addr.parse()?;
        let handle = axum_server::Handle::new();
        let shutdown = handle.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            shutdown.graceful_shutdown(None);
        });
        tracing::info!("proctrack listening on https://{addr}");
        axum_server::bind_rustls(socket_addr, tls)
            .handle(handle)
            .serve(app.into_make_service())
            .await?;
        store.close().await?;
        return Ok(());
    }

    #[cfg(not(feature = "tls"))]
    if config.tls_cert.is_some() {
        return Err("TLS requested but proctrack was built without the `tls` feature".into());
    }

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("proctrack listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.close().await?;
    tracing::info!("server shut down");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C, or SIGTERM on unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("received shutdown signal");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use proctrack_core::ValidationRules;
    use tower::ServiceExt;

    fn app(api_key: Option<&str>) -> Router {
        let store = ProcessStore::new(Arc::new(MemoryStorage::new()))
            .with_rules(ValidationRules::default());
        router(store, api_key.map(str::to_string))
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn sample() -> serde_json::Value {
        serde_json::json!({
            "email": "clerk@example.com",
            "department": "AR",
            "processName": "Cash application",
            "appsUsed": "ERP, Excel",
            "frequency": "DAILY",
            "duration": "00:45",
            "volume": 3,
            "status": "STANDARDIZED"
        })
    }

    #[tokio::test]
    async fn create_get_update_delete_round_trip() {
        let app = app(None);

        let (status, created) = send(&app, json_request("POST", "/processes", sample())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["id"], 1);
        assert_eq!(created["processName"], "Cash application");
        assert_eq!(created["yearlyVolume"], 660);

        let (status, fetched) = send(&app, get_request("/processes/1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched, created);

        let patch = serde_json::json!({ "status": "OPTIMIZED" });
        let (status, updated) = send(&app, json_request("PUT", "/processes/1", patch)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["status"], "OPTIMIZED");
        assert_eq!(updated["department"], "AR");

        let delete = Request::builder()
            .method("DELETE")
            .uri("/processes/1")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, delete).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(body, serde_json::Value::Null);

        let (status, body) = send(&app, get_request("/processes/1")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn null_in_update_clears_description() {
        let app = app(None);
        let mut body = sample();
        body["description"] = serde_json::json!("Apply receipts to open invoices");
        let (status, created) = send(&app, json_request("POST", "/processes", body)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["description"], "Apply receipts to open invoices");

        let patch = serde_json::json!({ "description": null });
        let (status, updated) = send(&app, json_request("PUT", "/processes/1", patch)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["description"], serde_json::Value::Null);
        assert_eq!(updated["processName"], "Cash application");
    }

    #[tokio::test]
    async fn validation_failures_list_violations() {
        let app = app(None);
        let mut body = sample();
        body["department"] = "XX".into();
        body["duration"] = "25:99".into();

        let (status, json) = send(&app, json_request("POST", "/processes", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let fields: Vec<&str> = json["violations"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v["field"].as_str().unwrap())
            .collect();
        assert_eq!(fields, vec!["department", "duration"]);
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let app = app(None);
        let request = Request::builder()
            .method("POST")
            .uri("/processes")
            .header("content-type", "application/json")
            .body(Body::from("{\"email\": "))
            .unwrap();
        let (status, json) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().starts_with("malformed JSON"));
    }

    #[tokio::test]
    async fn list_filters_and_rejects_bad_limit() {
        let app = app(None);
        send(&app, json_request("POST", "/processes", sample())).await;
        let mut other = sample();
        other["department"] = "GL".into();
        send(&app, json_request("POST", "/processes", other)).await;

        let (status, json) = send(&app, get_request("/processes?department=GL")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["total"], 1);
        assert_eq!(json["processes"][0]["id"], 2);

        let (status, _) = send(&app, get_request("/processes?limit=500")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn non_numeric_id_is_bad_request() {
        let app = app(None);
        let (status, json) = send(&app, get_request("/processes/abc")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["violations"][0]["field"], "id");
    }

    #[tokio::test]
    async fn import_creates_rows_from_csv_body() {
        let app = app(None);
        let csv = "Email ID,Team,Process Name,Apps Used,Frequency,Duration,Volume,Process Status\n\
                   a@b.co,AP,Invoice entry,ERP,DAILY,00:15,12,UNSTRUCTURED\n\
                   a@b.co,AP,Broken,ERP,HOURLY,00:15,12,UNSTRUCTURED\n";
        let request = Request::builder()
            .method("POST")
            .uri("/processes/import")
            .header("content-type", "text/csv")
            .body(Body::from(csv))
            .unwrap();
        let (status, json) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["successCount"], 1);
        assert_eq!(json["errorCount"], 1);
        assert!(json["errors"][0].as_str().unwrap().starts_with("Row 3: frequency"));
    }

    #[tokio::test]
    async fn api_key_guards_everything_but_health() {
        let app = app(Some("s3cret"));

        let (status, _) = send(&app, get_request("/health")).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(&app, get_request("/processes")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let wrong = Request::builder()
            .uri("/processes")
            .header("x-api-key", "nope")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, wrong).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let right = Request::builder()
            .uri("/processes")
            .header("authorization", "Bearer s3cret")
            .body(Body::empty())
            .unwrap();
        let (status, json) = send(&app, right).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["total"], 0);
    }

    #[tokio::test]
    async fn unknown_route_is_json_404() {
        let app = app(None);
        let (status, json) = send(&app, get_request("/nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "not found");
    }
}

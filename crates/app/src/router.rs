use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use chrono::{DateTime, Utc};
use grainstore_storage::Database;
use metrics_exporter_prometheus::PrometheusHandle;

use crate::{telemetry, tenants, translations};

#[derive(Clone)]
pub struct AppState {
    metrics: PrometheusHandle,
    storage: Database,
    clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>,
}

impl AppState {
    pub fn new(metrics: PrometheusHandle, storage: Database) -> Self {
        Self {
            metrics,
            storage,
            clock: Arc::new(Utc::now),
        }
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>) -> Self {
        self.clock = clock;
        self
    }

    pub fn metrics(&self) -> &PrometheusHandle {
        &self.metrics
    }

    pub fn storage(&self) -> &Database {
        &self.storage
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route("/api/tenants", post(tenants::create))
        .route(
            "/api/tenants/:tenant/:kind/:entity_id/text/:field",
            put(translations::put_text),
        )
        .route(
            "/api/locales/:locale/tenants/:tenant/:kind/:entity_id/text/:field",
            get(translations::get_text),
        )
        .route(
            "/api/locales/:locale/tenants/:tenant/translate",
            post(translations::translate_batch),
        )
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = telemetry::render_metrics(state.metrics());
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        Body::from(body),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use chrono::TimeZone;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    async fn setup_state() -> (AppState, TempDir) {
        let metrics = telemetry::init_metrics().expect("metrics init");

        let dir = tempfile::tempdir().expect("tempdir");
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("app.db").display());
        let database = Database::connect(&url).await.expect("connect");
        database.run_migrations().await.expect("migrations");

        let fixed = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let state = AppState::new(metrics, database).with_clock(Arc::new(move || fixed));
        (state, dir)
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(request)
            .await
            .expect("handler should respond");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body should read")
            .to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, body)
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn seeded_app() -> (Router, TempDir) {
        let (state, dir) = setup_state().await;
        let app = app_router(state);

        let (status, _) = send(
            &app,
            json_request("POST", "/api/tenants", json!({"id": "t-1", "name": "Northern Silos"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _) = send(
            &app,
            json_request(
                "PUT",
                "/api/tenants/t-1/commodity/c-1/text/name",
                json!({"en": "Wheat", "he": "חיטה", "th": "  "}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        (app, dir)
    }

    #[tokio::test]
    async fn healthz_returns_ok() {
        let (state, _dir) = setup_state().await;
        let app = app_router(state);

        let response = app
            .oneshot(get_request("/healthz"))
            .await
            .expect("handler should respond");

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn metrics_exports_build_info() {
        let (state, _dir) = setup_state().await;
        let app = app_router(state);

        let response = app
            .oneshot(get_request("/metrics"))
            .await
            .expect("handler should respond");

        assert_eq!(response.status(), StatusCode::OK);
        let collected = response
            .into_body()
            .collect()
            .await
            .expect("body should read");
        let body = String::from_utf8(collected.to_bytes().to_vec()).expect("utf-8");
        assert!(body.contains("app_build_info"));
        assert!(body.contains("app_uptime_seconds"));
    }

    #[tokio::test]
    async fn create_tenant_returns_created_record() {
        let (state, _dir) = setup_state().await;
        let app = app_router(state);

        let (status, body) = send(
            &app,
            json_request("POST", "/api/tenants", json!({"id": " t-9 ", "name": "Delta"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["id"], "t-9");
        assert_eq!(body["created_at"], "2024-05-01T12:00:00Z");

        let (status, body) = send(
            &app,
            json_request("POST", "/api/tenants", json!({"id": "t-9", "name": "Again"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["type"], "tenant_exists");
    }

    #[tokio::test]
    async fn create_tenant_rejects_blank_fields() {
        let (state, _dir) = setup_state().await;
        let app = app_router(state);

        let (status, body) = send(
            &app,
            json_request("POST", "/api/tenants", json!({"id": "t-1", "name": "  "})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["type"], "invalid_tenant");
    }

    #[tokio::test]
    async fn get_text_walks_fallback_chain() {
        let (app, _dir) = seeded_app().await;

        let (status, body) = send(
            &app,
            get_request("/api/locales/he/tenants/t-1/commodity/c-1/text/name"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["text"], "חיטה");
        assert_eq!(body["source"], "requested");
        assert_eq!(body["direction"], "rtl");

        // Whitespace-only Thai entry falls through to English.
        let (_, body) = send(
            &app,
            get_request("/api/locales/th/tenants/t-1/commodity/c-1/text/name"),
        )
        .await;
        assert_eq!(body["text"], "Wheat");
        assert_eq!(body["source"], "canonical");
        assert_eq!(body["direction"], "ltr");

        let (status, body) = send(
            &app,
            get_request("/api/locales/fr/tenants/t-1/site/s-1/text/address?fallback=Main%20road"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["text"], "Main road");
        assert_eq!(body["source"], "fallback");
        assert_eq!(body["locale"], "fr");

        // Without `?fallback=` a missing map resolves to the empty string.
        let (status, body) = send(
            &app,
            get_request("/api/locales/he/tenants/t-1/site/s-9/text/name"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["text"], "");
        assert_eq!(body["source"], "fallback");
        assert_eq!(body["direction"], "rtl");
    }

    #[tokio::test]
    async fn get_text_reports_unknown_tenant_and_kind() {
        let (app, _dir) = seeded_app().await;

        let (status, body) = send(
            &app,
            get_request("/api/locales/en/tenants/nope/commodity/c-1/text/name"),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["type"], "tenant_not_found");

        let (status, body) = send(
            &app,
            get_request("/api/locales/en/tenants/t-1/silo/c-1/text/name"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["type"], "unknown_entity_kind");
    }

    #[tokio::test]
    async fn put_text_validates_payload() {
        let (app, _dir) = seeded_app().await;

        let (status, body) = send(
            &app,
            json_request("PUT", "/api/tenants/t-1/site/s-1/text/name", json!({"fr": "Silo"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["type"], "invalid_locale_map");

        let (status, body) = send(
            &app,
            json_request("PUT", "/api/tenants/t-1/site/s-1/text/name", json!({"en": " "})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["type"], "invalid_locale_map");

        let (status, body) = send(
            &app,
            json_request("PUT", "/api/tenants/ghost/site/s-1/text/name", json!({"en": "Silo"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["type"], "tenant_not_found");

        let (status, body) = send(
            &app,
            json_request("PUT", "/api/tenants/t-1/silo/s-1/text/name", json!({"en": "Silo"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["type"], "unknown_entity_kind");
    }

    #[tokio::test]
    async fn batch_translate_resolves_each_item() {
        let (app, _dir) = seeded_app().await;

        let (status, _) = send(
            &app,
            json_request(
                "PUT",
                "/api/tenants/t-1/site/s-1/text/address",
                json!({"ar": "  طريق الميناء  "}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = send(
            &app,
            json_request(
                "POST",
                "/api/locales/ar/tenants/t-1/translate",
                json!({"items": [
                    {"kind": "commodity", "id": "c-1", "field": "name", "fallback": "?"},
                    {"kind": "site", "id": "s-1", "field": "address", "fallback": "?"},
                    {"kind": "gateway", "id": "g-1", "field": "name", "fallback": "Gateway 1"}
                ]}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["locale"], "ar");
        assert_eq!(body["direction"], "rtl");
        let texts: Vec<&str> = body["items"]
            .as_array()
            .expect("items array")
            .iter()
            .map(|item| item["text"].as_str().expect("text"))
            .collect();
        assert_eq!(texts, vec!["Wheat", "  طريق الميناء  ", "Gateway 1"]);
    }

    #[tokio::test]
    async fn batch_translate_rejects_unknown_kind() {
        let (app, _dir) = seeded_app().await;

        let (status, body) = send(
            &app,
            json_request(
                "POST",
                "/api/locales/en/tenants/t-1/translate",
                json!({"items": [{"kind": "silo", "id": "x", "field": "name"}]}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["type"], "invalid_batch");
    }

    #[tokio::test]
    async fn batch_translate_requires_known_tenant() {
        let (app, _dir) = seeded_app().await;

        let (status, body) = send(
            &app,
            json_request(
                "POST",
                "/api/locales/en/tenants/ghost/translate",
                json!({"items": [{"kind": "commodity", "id": "c-1", "field": "name"}]}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["type"], "tenant_not_found");
    }
}

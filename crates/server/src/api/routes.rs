use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{catalog, handlers, runs, ws};
use crate::api::middleware::metrics_middleware;
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route("/metrics", get(handlers::metrics))
        // Runs
        .route("/runs", post(runs::start_run))
        .route("/runs", get(runs::list_runs))
        .route("/runs/{id}", get(runs::get_run))
        .route("/runs/{id}", delete(runs::cancel_run))
        // Catalogs (selection UI reads these)
        .route("/catalog/scripts", get(catalog::get_scripts))
        .route("/catalog/columns", get(catalog::get_columns))
        // Real-time status stream
        .route("/ws", get(ws::ws_handler))
        .layer(middleware::from_fn(metrics_middleware))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use std::time::Duration;
    use tempfile::TempDir;
    use tower::ServiceExt;

    use dbexport_core::config::{Config, ExecutionConfig, OutputConfig};
    use dbexport_core::testing::{fixtures, MockCatalogProvider, ScriptedSessionFactory};
    use dbexport_core::RunEngine;

    use crate::api::WsBroadcaster;

    struct TestApp {
        router: Router,
        _temp_dir: TempDir,
    }

    async fn test_app() -> TestApp {
        let temp_dir = TempDir::new().unwrap();
        let scripts_root = temp_dir.path().join("scripts");
        tokio::fs::create_dir_all(&scripts_root).await.unwrap();
        tokio::fs::write(scripts_root.join("s1_v1.sql"), "SELECT 1")
            .await
            .unwrap();

        let catalog = Arc::new(MockCatalogProvider::new());
        catalog
            .set_scripts(fixtures::scripts_catalog(
                "g1",
                vec![fixtures::script("s1", 0, &["v1"])],
            ))
            .await;

        let output = OutputConfig {
            root_path: temp_dir.path().join("output"),
            scripts_root,
            ..Default::default()
        };
        let config = Config {
            output: output.clone(),
            ..Default::default()
        };

        let broadcaster = WsBroadcaster::default();
        let engine = RunEngine::new(
            output,
            ExecutionConfig::default(),
            Arc::clone(&catalog) as Arc<dyn dbexport_core::catalog::CatalogProvider>,
            Arc::new(ScriptedSessionFactory::new()),
            Arc::new(broadcaster.clone()),
        );

        let state = Arc::new(AppState::new(
            config,
            engine,
            catalog as Arc<dyn dbexport_core::catalog::CatalogProvider>,
            broadcaster,
        ));

        TestApp {
            router: create_router(state),
            _temp_dir: temp_dir,
        }
    }

    async fn get_json(app: &TestApp, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    fn start_run_body() -> serde_json::Value {
        serde_json::json!({
            "userContext": {
                "login": "tester",
                "databaseId": "db-test",
                "managerId": "m1",
                "streamId": "st1"
            },
            "selection": {
                "groups": [{
                    "groupId": "g1",
                    "enabled": true,
                    "scripts": [{
                        "scriptId": "s1",
                        "enabled": true,
                        "exportMode": "default_columns",
                        "selectedColumnItemIds": []
                    }]
                }]
            }
        })
    }

    async fn start_run(app: &TestApp) -> (StatusCode, serde_json::Value) {
        let response = app
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/runs")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(start_run_body().to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&body).unwrap();
        (status, json)
    }

    async fn wait_for_terminal(app: &TestApp, run_id: &str) -> serde_json::Value {
        for _ in 0..100 {
            let (status, json) = get_json(app, &format!("/api/v1/runs/{run_id}")).await;
            assert_eq!(status, StatusCode::OK);
            let s = json["status"].as_str().unwrap_or_default().to_string();
            if s != "queued" && s != "running" {
                return json;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("run {run_id} did not reach a terminal status");
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = test_app().await;
        let (status, json) = get_json(&app, "/api/v1/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_config_endpoint() {
        let app = test_app().await;
        let (status, json) = get_json(&app, "/api/v1/config").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["execution"]["lane_count"], 4);
        assert_eq!(json["datasource"]["backend"], "mock");
        // Filesystem paths stay server-side.
        assert!(json["output"].get("root_path").is_none());
        assert!(json["output"].get("scripts_root").is_none());
    }

    #[tokio::test]
    async fn test_catalog_scripts_endpoint() {
        let app = test_app().await;
        let (status, json) = get_json(&app, "/api/v1/catalog/scripts").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["groups"][0]["id"], "g1");
        assert_eq!(json["groups"][0]["scripts"][0]["id"], "s1");
    }

    #[tokio::test]
    async fn test_start_run_and_poll_to_success() {
        let app = test_app().await;

        let (status, json) = start_run(&app).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(json["status"], "queued");
        let run_id = json["runId"].as_str().unwrap().to_string();

        let terminal = wait_for_terminal(&app, &run_id).await;
        assert_eq!(terminal["status"], "success");
        assert_eq!(terminal["groupStatuses"]["g1"], "success");
        assert_eq!(terminal["scriptStatuses"]["g1"]["s1"], "success");
    }

    #[tokio::test]
    async fn test_list_runs_contains_started_run() {
        let app = test_app().await;
        let (_, json) = start_run(&app).await;
        let run_id = json["runId"].as_str().unwrap().to_string();

        let (status, json) = get_json(&app, "/api/v1/runs").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["total"], 1);
        assert_eq!(json["runs"][0]["runId"], run_id.as_str());
    }

    #[tokio::test]
    async fn test_get_unknown_run_returns_404() {
        let app = test_app().await;
        let (status, json) = get_json(&app, "/api/v1/runs/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(json["error"].as_str().unwrap().contains("nope"));
    }

    #[tokio::test]
    async fn test_cancel_unknown_run_returns_404() {
        let app = test_app().await;
        let response = app
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/api/v1/runs/nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cancel_finished_run_returns_409() {
        let app = test_app().await;
        let (_, json) = start_run(&app).await;
        let run_id = json["runId"].as_str().unwrap().to_string();
        wait_for_terminal(&app, &run_id).await;

        let response = app
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(&format!("/api/v1/runs/{run_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_metrics_endpoint_exposes_engine_metrics() {
        let app = test_app().await;
        let response = app
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("dbexport_runs_started_total"));
    }
}

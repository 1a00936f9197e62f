//! HTTP status surface: `GET /` and `GET /health`.

use crate::gateway::ConnectionControl;
use axum::{extract::State, response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};
use yamato_core::config::ApiConfig;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    bot_name: String,
    connection: Arc<dyn ConnectionControl>,
    started: Instant,
}

impl ApiState {
    pub fn new(bot_name: String, connection: Arc<dyn ConnectionControl>, started: Instant) -> Self {
        Self {
            bot_name,
            connection,
            started,
        }
    }
}

/// `GET /`: overall status and reconnection counters.
async fn root(State(state): State<ApiState>) -> Json<Value> {
    let status = state.connection.status();
    Json(json!({
        "status": "running",
        "bot": state.bot_name,
        "connection": if status.is_connected { "connected" } else { "disconnected" },
        "state": status.state,
        "uptime": state.started.elapsed().as_secs_f64(),
        "retryCount": status.retry_count,
        "connectionAttempts": status.connection_attempts,
    }))
}

/// `GET /health`: liveness for process supervisors.
async fn health(State(state): State<ApiState>) -> Json<Value> {
    let status = state.connection.status();
    Json(json!({
        "healthy": status.is_connected,
        "state": status.state,
        "uptime": state.started.elapsed().as_secs_f64(),
    }))
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .with_state(state)
}

/// Serve until the process exits. A bind failure is logged, not fatal.
pub async fn serve(config: ApiConfig, state: ApiState) {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("http server failed to bind to {addr}: {e}");
            return;
        }
    };
    info!("http server running on {addr}");
    if let Err(e) = axum::serve(listener, build_router(state)).await {
        error!("http server error: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;
    use yamato_channels::whatsapp::{ConnectionState, ConnectionStatus};

    struct StaticConnection(ConnectionStatus);

    #[async_trait]
    impl ConnectionControl for StaticConnection {
        fn status(&self) -> ConnectionStatus {
            self.0.clone()
        }
        async fn reconnect(&self, _reason: &str) {}
    }

    fn test_router(status: ConnectionStatus) -> Router {
        build_router(ApiState::new(
            "Yamato Bot".into(),
            Arc::new(StaticConnection(status)),
            Instant::now(),
        ))
    }

    async fn body_json(resp: axum::response::Response) -> Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_root_reports_counters() {
        let app = test_router(ConnectionStatus {
            state: ConnectionState::Connecting,
            is_connected: false,
            retry_count: 3,
            connection_attempts: 7,
            own_id: None,
        });
        let resp = app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let json = body_json(resp).await;
        assert_eq!(json["status"], "running");
        assert_eq!(json["bot"], "Yamato Bot");
        assert_eq!(json["connection"], "disconnected");
        assert_eq!(json["state"], "connecting");
        assert_eq!(json["retryCount"], 3);
        assert_eq!(json["connectionAttempts"], 7);
        assert!(json["uptime"].as_f64().unwrap() >= 0.0);
    }

    #[tokio::test]
    async fn test_health_when_connected() {
        let app = test_router(ConnectionStatus {
            state: ConnectionState::Connected,
            is_connected: true,
            ..Default::default()
        });
        let resp = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["healthy"], true);
        assert_eq!(json["state"], "connected");
    }

    #[tokio::test]
    async fn test_health_when_down() {
        let app = test_router(ConnectionStatus::default());
        let resp = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let json = body_json(resp).await;
        assert_eq!(json["healthy"], false);
        assert_eq!(json["state"], "disconnected");
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let app = test_router(ConnectionStatus::default());
        let resp = app
            .oneshot(Request::get("/api/pair").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}

//! Spider Control Plane - Multi-Cloud Resource Identity Service
//!
//! This is the main entry point for the control plane daemon.
//! It exposes health and introspection endpoints; resource operations are
//! served by the transport layer embedding `ControlPlaneService`.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use spider_control::{ControlConfig, ControlPlaneService, LockStatus, MockConnection};
use spider_store::{RocksStore, Store};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application state shared across handlers.
struct AppState<S: Store> {
    control: Arc<ControlPlaneService<S>>,
}

impl<S: Store> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            control: Arc::clone(&self.control),
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
}

#[derive(Serialize)]
struct ConnectionsResponse {
    connections: Vec<String>,
}

#[derive(Serialize)]
struct LocksResponse {
    locks: Vec<LockStatus>,
}

async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        service: "spider-control",
    })
}

async fn ready_handler<S: Store + 'static>(State(state): State<AppState<S>>) -> impl IntoResponse {
    if state.control.connection_names().is_empty() {
        (StatusCode::SERVICE_UNAVAILABLE, "no connections")
    } else {
        (StatusCode::OK, "ready")
    }
}

async fn connections_handler<S: Store + 'static>(
    State(state): State<AppState<S>>,
) -> impl IntoResponse {
    Json(ConnectionsResponse {
        connections: state.control.connection_names(),
    })
}

async fn locks_handler<S: Store + 'static>(State(state): State<AppState<S>>) -> impl IntoResponse {
    Json(LocksResponse {
        locks: state.control.lock_snapshot(),
    })
}

fn create_router<S: Store + 'static>(state: AppState<S>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler::<S>))
        .route("/v1/connections", get(connections_handler::<S>))
        .route("/v1/locks", get(locks_handler::<S>))
        .with_state(state)
}

/// `ON`/`OFF` and `true`/`false`, case-insensitive.
fn env_flag(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "on" | "true" | "1" => true,
            "off" | "false" | "0" => false,
            _ => {
                tracing::warn!(variable = name, value = %value, "Unrecognised flag value, using default");
                default
            }
        },
        Err(_) => default,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,spider=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Spider Control Plane");

    // Load configuration from environment
    let listen_addr = std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:1024".to_string());
    let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "/data/spider".to_string());
    let config = ControlConfig {
        id_transform: env_flag("SPIDER_ID_TRANSFORM", true),
        lock_vm_create: env_flag("SPIDER_LOCK_VM_CREATE", false),
    };
    tracing::info!(
        id_transform = config.id_transform,
        lock_vm_create = config.lock_vm_create,
        "Loaded configuration"
    );

    // Initialize store
    let store = Arc::new(RocksStore::open(&data_dir)?);
    tracing::info!(data_dir = %data_dir, "Initialized RocksDB store");

    // Initialize control plane service
    let control = Arc::new(ControlPlaneService::new(store, config));
    if let Ok(names) = std::env::var("SPIDER_MOCK_CONNECTIONS") {
        for name in names.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            control.register_connection(name, Arc::new(MockConnection::new("mock")));
        }
    }

    let state = AppState { control };
    let app = create_router(state);

    // Start server
    tracing::info!(listen_addr = %listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

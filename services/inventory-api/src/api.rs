use crate::cleanup::CleanupQueue;
use crate::config::{ApiConfig, UploadConfig};
use crate::error::{AppError, AppResult};
use crate::metrics::track_metrics;
use crate::object_store::ObjectStore;
use crate::repository::Repository;
use crate::resources::{
    users, BankingDetail, Brand, CapacityType, City, Country, Customer, Instrument, Item, ItemType,
    Organization, Payment, Permission, Role, Sale, Shipment, ShippingAgent, Status, User, Vendor,
    Warehouse,
};
use crate::response::ApiResponse;
use crate::service::{Resource, ResourceService};
use crate::upload::Submission;
use anyhow::{Context, Result};
use axum::{
    async_trait,
    extract::{DefaultBodyLimit, FromRef, FromRequest, Path, Request, State},
    http::{header, StatusCode},
    middleware,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{SecondsFormat, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::de::DeserializeOwned;
use sqlx::PgPool;
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Room for multipart boundaries and text parts on top of the file cap
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub store: Arc<dyn ObjectStore>,
    pub cleanup: CleanupQueue,
    pub uploads: UploadConfig,
    pub service_name: String,
    pub metrics: Option<PrometheusHandle>,
}

impl FromRef<AppState> for UploadConfig {
    fn from_ref(state: &AppState) -> Self {
        state.uploads.clone()
    }
}

impl<R: Resource> FromRef<AppState> for ResourceService<R> {
    fn from_ref(state: &AppState) -> Self {
        ResourceService::new(
            Repository::new(state.pool.clone(), state.cleanup.clone()),
            state.store.clone(),
        )
    }
}

/// JSON body whose rejections use the error envelope
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;
        Ok(Self(value))
    }
}

/// Create the API router
pub fn create_router(state: AppState, config: &ApiConfig) -> Router {
    let cors = if config.cors_enabled {
        if config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<_> = config
                .cors_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    } else {
        CorsLayer::new()
    };

    let body_limit = state.uploads.max_file_size_bytes + MULTIPART_OVERHEAD_BYTES;

    let api = Router::new()
        .route("/health", get(health_check))
        .route("/cicd-working", get(cicd_working))
        .nest("/roles", resource_routes::<Role>())
        .nest("/permissions", resource_routes::<Permission>())
        .nest("/banking-details", resource_routes::<BankingDetail>())
        .nest("/countries", resource_routes::<Country>())
        .nest("/cities", resource_routes::<City>())
        .nest("/status", resource_routes::<Status>())
        .nest("/item-types", resource_routes::<ItemType>())
        .nest("/capacity-types", resource_routes::<CapacityType>())
        .nest("/vendor", resource_routes::<Vendor>())
        .nest("/brand", resource_routes::<Brand>())
        .nest("/users", resource_routes::<User>().merge(users::routes()))
        .nest("/organizations", resource_routes::<Organization>())
        .nest("/warehouses", resource_routes::<Warehouse>())
        .nest("/items", resource_routes::<Item>())
        .nest("/payments", resource_routes::<Payment>())
        .nest("/instruments", resource_routes::<Instrument>())
        .nest("/customers", resource_routes::<Customer>())
        .nest("/sales", resource_routes::<Sale>())
        .nest("/shipping-agents", resource_routes::<ShippingAgent>())
        .nest("/shipments", resource_routes::<Shipment>());

    Router::new()
        .route("/health", get(health_check))
        .route("/cicd-working", get(cicd_working))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(render_metrics))
        .nest("/api", api)
        .fallback(route_not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(track_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// CRUD routes for one resource
pub fn resource_routes<R: Resource>() -> Router<AppState> {
    Router::new()
        .route("/", get(list_records::<R>).post(create_record::<R>))
        .route(
            "/:id",
            get(get_record::<R>)
                .put(update_record::<R>)
                .delete(delete_record::<R>),
        )
}

async fn list_records<R: Resource>(
    State(service): State<ResourceService<R>>,
) -> AppResult<ApiResponse> {
    service.list().await
}

async fn get_record<R: Resource>(
    State(service): State<ResourceService<R>>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse> {
    service.get(&id).await
}

async fn create_record<R: Resource>(
    State(service): State<ResourceService<R>>,
    submission: Submission<R>,
) -> AppResult<ApiResponse> {
    service.create(submission).await
}

async fn update_record<R: Resource>(
    State(service): State<ResourceService<R>>,
    Path(id): Path<String>,
    submission: Submission<R>,
) -> AppResult<ApiResponse> {
    service.update(&id, submission).await
}

async fn delete_record<R: Resource>(
    State(service): State<ResourceService<R>>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse> {
    service.delete(&id).await
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "OK",
        "timestamp": timestamp(),
        "service": state.service_name
    }))
}

/// Deployment smoke-test endpoint
async fn cicd_working() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "OK",
        "timestamp": timestamp(),
        "service": "Congratulations! CI/CD Working!!"
    }))
}

/// Readiness check endpoint
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match sqlx::query("SELECT 1").fetch_one(&state.pool).await {
        Ok(_) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "ready",
                "database": "connected"
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "not_ready",
                "database": "disconnected",
                "error": e.to_string()
            })),
        ),
    }
}

/// Prometheus exposition
async fn render_metrics(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let handle = state
        .metrics
        .as_ref()
        .ok_or_else(|| AppError::NotFound("Metrics are not enabled".to_string()))?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle.render(),
    ))
}

async fn route_not_found() -> AppError {
    AppError::NotFound("Route not found".to_string())
}

/// Start the API server and serve until `shutdown` resolves
pub async fn start_api_server(
    state: AppState,
    config: &ApiConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let router = create_router(state, config);
    let addr = format!("{}:{}", config.host, config.port);

    info!(address = %addr, "Starting inventory API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .context("API server error")?;

    Ok(())
}

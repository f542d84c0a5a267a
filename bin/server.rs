// MCML Roster - Web Server
// JSON API over the same search / check / info operations as the CLI

use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use mcml_roster::config::{Config, MatchPolicy};
use mcml_roster::db::Store;
use mcml_roster::service::{self, PersonQuery};
use mcml_roster::LookupError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_ADDR: &str = "127.0.0.1:3000";

/// Shared application state
#[derive(Clone)]
struct AppState {
    store: Arc<Mutex<Store>>,
    policy: Arc<MatchPolicy>,
}

impl AppState {
    fn store(&self) -> Result<MutexGuard<'_, Store>, ApiError> {
        self.store.lock().map_err(|_| ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "store lock poisoned".to_string(),
        })
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Error rendered as an `ApiResponse` with a matching status code
struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<LookupError> for ApiError {
    fn from(err: LookupError) -> Self {
        let status = match err {
            LookupError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %err, "request failed");
        }
        ApiError {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(self.message),
        };
        (self.status, Json(body)).into_response()
    }
}

/// `?first=&last=&name=&limit=`
#[derive(Debug, Default, Deserialize)]
struct NameParams {
    first: Option<String>,
    last: Option<String>,
    name: Option<String>,
    limit: Option<usize>,
}

impl NameParams {
    fn query(&self) -> PersonQuery {
        PersonQuery::from_parts(self.first.as_deref(), self.last.as_deref(), self.name.as_deref())
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/search - Ranked candidates
async fn search(
    State(state): State<AppState>,
    Query(params): Query<NameParams>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state.store()?;
    let matches = service::search(&store, &params.query(), params.limit, &state.policy)?;
    Ok(Json(ApiResponse::ok(matches)))
}

/// GET /api/check - Membership answer plus top matches
async fn check(
    State(state): State<AppState>,
    Query(params): Query<NameParams>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state.store()?;
    let outcome = service::check(&store, &params.query(), &state.policy)?;
    Ok(Json(ApiResponse::ok(outcome)))
}

/// GET /api/info - Record count and last export
async fn info(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let store = state.store()?;
    let metadata = service::info(&store)?;
    Ok(Json(ApiResponse::ok(metadata)))
}

fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/search", get(search))
        .route("/check", get(check))
        .route("/info", get(info))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // MCML_DB is picked up by Config::resolve
    let policy_path = std::env::var_os("MCML_POLICY").map(PathBuf::from);
    let config = Config::resolve(None, policy_path.as_deref())?;

    let store = Store::open(&config.db_path)
        .with_context(|| format!("opening database {}", config.db_path.display()))?;
    let records = store.verify_count()?;
    info!(db = %config.db_path.display(), records, "database opened");
    if records == 0 {
        info!("database is empty; run 'mcml export' to populate it");
    }

    let state = AppState {
        store: Arc::new(Mutex::new(store)),
        policy: Arc::new(config.policy),
    };

    let addr = std::env::var("MCML_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;

    info!("🚀 Server running on http://{}", addr);
    info!("   API: http://{}/api/search?name=Daniel%20Cremers", addr);

    axum::serve(listener, router(state))
        .await
        .context("server stopped")?;
    Ok(())
}

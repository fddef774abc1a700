/// Deploy API - JSON endpoints for deployments, assignments, alerts and members
///
/// Serves the deploy controller and the options menus over HTTP. Rows are
/// kept in the database at `DATABASE_URL` when a backend feature is
/// enabled, otherwise in memory for the lifetime of the process.

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

use deploy_model::controller::{self, DeployResource};
use deploy_model::{
    all_modules, export_list, resolve_options_menu, Db, ExportFormat, ListRequest, MemoryStore,
    Model, ModelError, RecordId, RequestContext, Resource, Row, Settings, Store,
};

type AppDb = Db<Box<dyn Store>>;

struct AppState {
    db: RwLock<AppDb>,
    settings: Arc<Settings>,
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run().await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let settings = match std::env::var("DEPLOY_SETTINGS") {
        Ok(path) => Settings::load_from_file(path)?,
        Err(_) => Settings::default(),
    };
    let model = Arc::new(Model::load(&all_modules(), &settings)?);
    tracing::info!("Loaded model with {} relations", model.tables().count());

    let store = open_store(&model)?;
    let state = Arc::new(AppState {
        db: RwLock::new(Db::new(model, store)?),
        settings: Arc::new(settings),
    });

    let app = Router::new()
        .route("/deploy", get(index))
        .route("/deploy/:resource", get(list_records).post(create_record))
        .route(
            "/deploy/:resource/:id",
            get(read_record).post(record_action).delete(delete_record),
        )
        .route("/export/:resource", get(export_records))
        .route("/import/:resource", post(import_records))
        .route("/menu/:controller", get(menu))
        .route("/health", get(health_check))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()?;
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Deploy API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(any(feature = "postgres", feature = "mysql"))]
fn open_store(model: &Arc<Model>) -> Result<Box<dyn Store>, Box<dyn std::error::Error>> {
    match std::env::var("DATABASE_URL") {
        Ok(url) => {
            let database = deploy_model::Database::new(&url)?;
            database.test_connection()?;
            tracing::info!("Storing rows in the database");
            Ok(Box::new(deploy_model::SqlStore::new(database, Arc::clone(model))?))
        }
        Err(_) => {
            tracing::warn!("DATABASE_URL is not set, storing rows in memory");
            Ok(Box::new(MemoryStore::new()))
        }
    }
}

#[cfg(not(any(feature = "postgres", feature = "mysql")))]
fn open_store(_model: &Arc<Model>) -> Result<Box<dyn Store>, Box<dyn std::error::Error>> {
    Ok(Box::new(MemoryStore::new()))
}

/// Request context from `X-User-Id` and the comma separated `X-Roles`
fn request_context(state: &AppState, headers: &HeaderMap) -> RequestContext {
    let mut ctx = RequestContext::new(state.settings.clone());
    if let Some(user_id) = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<RecordId>().ok())
    {
        ctx = ctx.with_user(user_id);
    }
    if let Some(roles) = headers.get("x-roles").and_then(|v| v.to_str().ok()) {
        for role in roles.split(',').map(str::trim).filter(|r| !r.is_empty()) {
            ctx = ctx.with_role(role);
        }
    }
    ctx
}

/// List query parameters; `location` is a comma separated id list
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ListParams {
    search: Option<String>,
    location: Option<String>,
    limit: Option<usize>,
    offset: usize,
    format: Option<String>,
}

impl ListParams {
    fn to_request(&self) -> Result<ListRequest, AppError> {
        let location = match self.location.as_deref() {
            Some(ids) => ids
                .split(',')
                .map(|id| id.trim().parse::<RecordId>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| AppError::BadRequest(format!("Invalid location id: {}", e)))?,
            None => Vec::new(),
        };
        Ok(ListRequest {
            search: self.search.clone(),
            location,
            limit: self.limit,
            offset: self.offset,
        })
    }
}

fn parse_resource(resource: &str) -> Result<DeployResource, AppError> {
    Ok(resource.parse::<DeployResource>()?)
}

fn parse_id(id: &str) -> Result<RecordId, AppError> {
    id.parse::<RecordId>()
        .map_err(|_| AppError::BadRequest(format!("Invalid record id: {}", id)))
}

fn read_lock(state: &AppState) -> Result<std::sync::RwLockReadGuard<'_, AppDb>, AppError> {
    state
        .db
        .read()
        .map_err(|_| AppError::Internal("Store lock poisoned".to_string()))
}

fn write_lock(state: &AppState) -> Result<std::sync::RwLockWriteGuard<'_, AppDb>, AppError> {
    state
        .db
        .write()
        .map_err(|_| AppError::Internal("Store lock poisoned".to_string()))
}

async fn index(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let ctx = request_context(&state, &headers);
    Ok(Json(controller::index(&ctx)?))
}

async fn list_records(
    State(state): State<Arc<AppState>>,
    Path(resource): Path<String>,
    Query(params): Query<ListParams>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let ctx = request_context(&state, &headers);
    let which = parse_resource(&resource)?;
    let db = read_lock(&state)?;
    Ok(Json(controller::list(&*db, &ctx, which, &params.to_request()?)?))
}

async fn create_record(
    State(state): State<Arc<AppState>>,
    Path(resource): Path<String>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Result<impl IntoResponse, AppError> {
    let ctx = request_context(&state, &headers);
    let which = parse_resource(&resource)?;
    let row = Row::from_json(body)
        .ok_or_else(|| AppError::BadRequest("Expected a JSON object".to_string()))?;

    let mut db = write_lock(&state)?;
    let created = controller::create(&mut *db, &ctx, which, row)?;
    tracing::info!("Created {} {}", which.table(), created.id);
    Ok((StatusCode::CREATED, Json(created)))
}

/// A record, or the summary page at `/deploy/:resource/summary`
async fn read_record(
    State(state): State<Arc<AppState>>,
    Path((resource, id)): Path<(String, String)>,
    Query(params): Query<ListParams>,
    headers: HeaderMap,
) -> Result<axum::response::Response, AppError> {
    let ctx = request_context(&state, &headers);
    let which = parse_resource(&resource)?;
    let db = read_lock(&state)?;
    if id == "summary" {
        let page = controller::list(&*db, &ctx, which, &params.to_request()?)?;
        return Ok(Json(page).into_response());
    }
    let record = controller::read(&*db, &ctx, which, parse_id(&id)?)?;
    Ok(Json(record).into_response())
}

/// `POST /deploy/:resource/import` takes NDJSON like `/import/:resource`
async fn record_action(
    State(state): State<Arc<AppState>>,
    Path((resource, action)): Path<(String, String)>,
    headers: HeaderMap,
    body: String,
) -> Result<impl IntoResponse, AppError> {
    if action != "import" {
        return Err(AppError::NotFound(format!("No action {} on {}", action, resource)));
    }
    let ctx = request_context(&state, &headers);
    let which = parse_resource(&resource)?;
    import_lines(&state, &ctx, which, &body)
}

async fn delete_record(
    State(state): State<Arc<AppState>>,
    Path((resource, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let ctx = request_context(&state, &headers);
    let which = parse_resource(&resource)?;
    let id = parse_id(&id)?;
    let mut db = write_lock(&state)?;
    Ok(Json(controller::delete(&mut *db, &ctx, which, id)?))
}

/// Export the filtered list as NDJSON (default) or a JSON array
async fn export_records(
    State(state): State<Arc<AppState>>,
    Path(resource): Path<String>,
    Query(params): Query<ListParams>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let ctx = request_context(&state, &headers);
    controller::ensure_enabled(&ctx)?;
    let which = parse_resource(&resource)?;
    let format = match params.format.as_deref() {
        Some(name) => name
            .parse::<ExportFormat>()
            .map_err(|e| AppError::BadRequest(e.to_string()))?,
        None => ExportFormat::default(),
    };

    let db = read_lock(&state)?;
    let list = Resource::new(&*db, &ctx, which.table(), which.base_url())?.list(&params.to_request()?)?;
    let mut body = Vec::new();
    export_list(&list, format, &mut body).map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(([(header::CONTENT_TYPE, format.content_type())], body))
}

/// Create one record per NDJSON line; failed lines are reported, not fatal
async fn import_records(
    State(state): State<Arc<AppState>>,
    Path(resource): Path<String>,
    headers: HeaderMap,
    body: String,
) -> Result<impl IntoResponse, AppError> {
    let ctx = request_context(&state, &headers);
    let which = parse_resource(&resource)?;
    import_lines(&state, &ctx, which, &body)
}

fn import_lines(
    state: &AppState,
    ctx: &RequestContext,
    which: DeployResource,
    body: &str,
) -> Result<(StatusCode, Json<ImportResponse>), AppError> {
    let start = std::time::Instant::now();

    let mut db = write_lock(state)?;
    let mut response = ImportResponse::default();
    for (line_num, line) in body.lines().enumerate().filter(|(_, l)| !l.trim().is_empty()) {
        response.processed += 1;
        let row = serde_json::from_str::<serde_json::Value>(line)
            .map_err(|e| format!("Invalid JSON: {}", e))
            .and_then(|v| Row::from_json(v).ok_or_else(|| "Expected a JSON object".to_string()));
        let result = match row {
            Ok(row) => controller::create(&mut *db, ctx, which, row).map_err(|e| e.to_string()),
            Err(e) => Err(e),
        };
        match result {
            Ok(created) => response.created.push(created.id),
            Err(e) => {
                response.failed += 1;
                response.errors.push(format!("Line {}: {}", line_num + 1, e));
            }
        }
    }
    response.duration_ms = start.elapsed().as_millis() as u64;

    let status = if response.failed == 0 {
        StatusCode::CREATED
    } else {
        StatusCode::MULTI_STATUS
    };
    Ok((status, Json(response)))
}

async fn menu(
    State(state): State<Arc<AppState>>,
    Path(controller): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let ctx = request_context(&state, &headers);
    let menu = resolve_options_menu(&ctx, &controller)
        .ok_or_else(|| AppError::NotFound(format!("No options menu for {}", controller)))?;
    Ok(Json(menu))
}

/// Health check endpoint (liveness)
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "deploy-api",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// Error handling

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    Model(ModelError),
    Internal(String),
}

impl From<ModelError> for AppError {
    fn from(err: ModelError) -> Self {
        AppError::Model(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, serde_json::json!({ "error": msg })),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, serde_json::json!({ "error": msg })),
            AppError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, serde_json::json!({ "error": msg }))
            }
            AppError::Model(ModelError::Validation(errors)) => {
                let fields: serde_json::Map<String, serde_json::Value> = errors
                    .errors()
                    .iter()
                    .map(|e| (e.field.clone(), serde_json::Value::String(e.message.clone())))
                    .collect();
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    serde_json::json!({ "error": "Validation failed", "fields": fields }),
                )
            }
            AppError::Model(err) => {
                let status = match &err {
                    ModelError::ModuleDisabled(_)
                    | ModelError::NotFound { .. }
                    | ModelError::UnknownTable(_) => StatusCode::NOT_FOUND,
                    ModelError::Restricted { .. } => StatusCode::CONFLICT,
                    ModelError::UnknownField { .. } => StatusCode::BAD_REQUEST,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, serde_json::json!({ "error": err.to_string() }))
            }
        };

        (status, Json(body)).into_response()
    }
}

// Response types

#[derive(Debug, Default, serde::Serialize)]
struct ImportResponse {
    processed: usize,
    created: Vec<RecordId>,
    failed: usize,
    errors: Vec<String>,
    duration_ms: u64,
}

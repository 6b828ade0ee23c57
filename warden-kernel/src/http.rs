/*!
 * API REST WARDEN - Serveur HTTP du kernel
 *
 * RÔLE :
 * Expose les ressources hosts/clusters et traduit chaque requête en appel
 * typé vers le HostController ou le StatusAggregator.
 *
 * FONCTIONNEMENT :
 * - Serveur Axum, état partagé immuable (AppState)
 * - Corps JSON parsés puis validés une seule fois avant la logique métier
 * - Échec = code HTTP + corps vide `{}`, jamais de détail de diagnostic
 *   (le détail part dans les logs)
 * - Middleware de traçage : request_id + méthode + chemin + durée
 *
 * ROUTES :
 * /health, /hosts, /host, /host/{address}[/creds|/status],
 * /clusters, /cluster/{name}, /system/stores
 */

use crate::hosts::{CreateOutcome, HostController, HostError};
use crate::models::{Cluster, Clusters, HostCreds, HostRequest, HostSpec, HostStatusView, HostView};
use crate::status::{StatusAggregator, StatusError};
use crate::store::{HandlerSummary, StoreHandlerManager};
use axum::body::Bytes;
use axum::extract::{ConnectInfo, Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub hosts: HostController,
    pub status: StatusAggregator,
    pub store: Arc<StoreHandlerManager>,
}

impl AppState {
    pub fn new(store: Arc<StoreHandlerManager>) -> Self {
        Self {
            hosts: HostController::new(store.clone()),
            status: StatusAggregator::new(store.clone()),
            store,
        }
    }
}

/// Réponse d'échec : code seul, corps `{}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiError(pub StatusCode);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(serde_json::json!({}))).into_response()
    }
}

impl From<HostError> for ApiError {
    fn from(err: HostError) -> Self {
        let code = match &err {
            HostError::NotFound(_) => StatusCode::NOT_FOUND,
            HostError::Conflict { .. } | HostError::PreconditionFailed(_) => StatusCode::CONFLICT,
            HostError::InvalidAddress(_) => StatusCode::BAD_REQUEST,
            HostError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if code == StatusCode::INTERNAL_SERVER_ERROR {
            warn!(error = %err, "[http] store failure");
        } else {
            debug!(error = %err, "[http] request refused");
        }
        ApiError(code)
    }
}

impl From<StatusError> for ApiError {
    fn from(err: StatusError) -> Self {
        debug!(error = %err, "[http] status unavailable");
        ApiError(StatusCode::NOT_FOUND)
    }
}

type ApiResult<T> = Result<T, ApiError>;

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/hosts", get(list_hosts))
        .route("/host", axum::routing::put(put_implicit_host))
        .route("/host/{address}", get(get_host).put(put_host).delete(delete_host))
        .route("/host/{address}/creds", get(get_host_creds))
        .route("/host/{address}/status", get(get_host_status))
        .route("/clusters", get(list_clusters))
        .route("/cluster/{name}", get(get_cluster))
        .route("/system/stores", get(list_stores))
        .with_state(app_state)
        .layer(middleware::from_fn(trace_requests))
}

/// Sert le router avec l'adresse du pair (nécessaire au PUT implicite)
pub async fn serve(listener: TcpListener, app: Router) -> std::io::Result<()> {
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await
}

async fn trace_requests(req: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4();
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let started = Instant::now();

    let response = next.run(req).await;

    info!(
        %request_id,
        %method,
        %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "[http] request handled"
    );
    response
}

/// Corps vide = `{}` ; JSON invalide ou champ invalide = 400
fn parse_host_request(body: &[u8]) -> ApiResult<HostSpec> {
    let request: HostRequest = if body.iter().all(u8::is_ascii_whitespace) {
        HostRequest::default()
    } else {
        serde_json::from_slice(body).map_err(|e| {
            debug!(error = %e, "[http] malformed host request");
            ApiError(StatusCode::BAD_REQUEST)
        })?
    };

    request.validate().map_err(|e| {
        debug!(error = %e, "[http] invalid host request");
        ApiError(StatusCode::BAD_REQUEST)
    })
}

fn outcome_response(outcome: CreateOutcome) -> (StatusCode, Json<HostView>) {
    let code = if outcome.is_created() {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    (code, Json(outcome.host().view()))
}

// GET /hosts
async fn list_hosts(State(app): State<AppState>) -> ApiResult<Json<Vec<HostView>>> {
    let hosts = app.hosts.list();
    if hosts.is_empty() {
        return Err(ApiError(StatusCode::NOT_FOUND));
    }
    Ok(Json(hosts.views()))
}

// GET /host/{address}
async fn get_host(State(app): State<AppState>, Path(address): Path<String>) -> ApiResult<Json<HostView>> {
    Ok(Json(app.hosts.retrieve(&address)?.view()))
}

// PUT /host/{address}
async fn put_host(
    State(app): State<AppState>,
    Path(address): Path<String>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<HostView>)> {
    let spec = parse_host_request(&body)?;
    let outcome = app.hosts.create_or_confirm(&address, spec)?;
    Ok(outcome_response(outcome))
}

// PUT /host (adresse = IP du client)
async fn put_implicit_host(
    State(app): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<HostView>)> {
    let spec = parse_host_request(&body)?;
    let outcome = app.hosts.create_or_confirm_implicit(peer.ip(), spec)?;
    Ok(outcome_response(outcome))
}

// DELETE /host/{address}
async fn delete_host(State(app): State<AppState>, Path(address): Path<String>) -> ApiResult<Json<serde_json::Value>> {
    app.hosts.delete(&address)?;
    Ok(Json(serde_json::json!({})))
}

// GET /host/{address}/creds
async fn get_host_creds(State(app): State<AppState>, Path(address): Path<String>) -> ApiResult<Json<HostCreds>> {
    Ok(Json(app.hosts.credentials(&address)?))
}

// GET /host/{address}/status
async fn get_host_status(
    State(app): State<AppState>,
    Path(address): Path<String>,
) -> ApiResult<Json<HostStatusView>> {
    Ok(Json(app.status.status(&address).await?))
}

// GET /clusters
async fn list_clusters(State(app): State<AppState>) -> ApiResult<Json<Clusters>> {
    let clusters = Clusters(app.store.list::<Cluster>());
    if clusters.is_empty() {
        return Err(ApiError(StatusCode::NOT_FOUND));
    }
    Ok(Json(clusters))
}

// GET /cluster/{name}
async fn get_cluster(State(app): State<AppState>, Path(name): Path<String>) -> ApiResult<Json<Cluster>> {
    app.store
        .get::<Cluster>(&name)
        .map(Json)
        .map_err(|_| ApiError(StatusCode::NOT_FOUND))
}

// GET /system/stores
async fn list_stores(State(app): State<AppState>) -> Json<Vec<HandlerSummary>> {
    Json(app.store.handler_summaries())
}

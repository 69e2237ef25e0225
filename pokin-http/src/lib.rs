use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{rejection::QueryRejection, Path, Query, Request, State},
    http::{
        header::{
            ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ALLOW,
            CONTENT_TYPE,
        },
        HeaderValue, Method, StatusCode,
    },
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::timeout;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use pokin_core::{ReportError, ReportKernel};
use pokin_store::ReportSource;
use pokin_types::{Envelope, TagReport, TreeNode};

pub mod config;

pub const REPORT_MESSAGE: &str = "Laporan Tagging Pohon Kinerja";
pub const HEALTH_STATUS: &str = "LAPORAN TAGGING POHON KINERJA UP";

#[derive(Clone)]
struct AppState {
    kernel: Arc<ReportKernel>,
}

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: u16,
    pub message: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

#[derive(Debug, Deserialize)]
struct TagReportParams {
    nama_tagging: Option<String>,
    tahun: Option<String>,
}

pub fn router(kernel: Arc<ReportKernel>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/laporan/tagging_pokin", get(tag_report))
        .route("/tagging/getDetail", get(missing_code))
        .route("/tagging/getDetail/", get(missing_code))
        .route("/tagging/getDetail/:code", get(detail))
        .fallback(not_found)
        .with_state(AppState { kernel })
        .layer(middleware::from_fn(cors))
        .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<HealthBody> {
    Json(HealthBody {
        status: HEALTH_STATUS,
    })
}

async fn tag_report(
    State(state): State<AppState>,
    params: Result<Query<TagReportParams>, QueryRejection>,
) -> Result<Json<Envelope<TagReport>>, ApiError> {
    let Query(params) = params.map_err(|e| bad_request(&e.body_text()))?;
    let tag = params
        .nama_tagging
        .filter(|t| !t.is_empty())
        .ok_or_else(|| bad_request("params nama_tagging is required, misal: ?nama_tagging=tagAbc"))?;
    let year = params
        .tahun
        .filter(|t| !t.is_empty())
        .ok_or_else(|| bad_request("params tahun is required, misal: ?tahun=2025"))?;
    let year: i32 = year.trim().parse().map_err(|_| bad_request("invalid tahun"))?;

    let report = state.kernel.tag_report(&tag, year).await.map_err(internal)?;
    Ok(Json(Envelope::ok(REPORT_MESSAGE, vec![report])))
}

async fn detail(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<Envelope<TreeNode>>, ApiError> {
    let nodes = state.kernel.indicator_tree(&code).await.map_err(internal)?;
    Ok(Json(Envelope::ok(REPORT_MESSAGE, nodes)))
}

async fn missing_code() -> ApiError {
    bad_request("KODE tidak ditemukan")
}

async fn not_found() -> ApiError {
    error_body(StatusCode::NOT_FOUND, "route tidak ditemukan")
}

fn bad_request(message: &str) -> ApiError {
    error_body(StatusCode::BAD_REQUEST, message)
}

fn error_body(status: StatusCode, message: &str) -> ApiError {
    (
        status,
        Json(ErrorBody {
            status: status.as_u16(),
            message: message.to_string(),
        }),
    )
}

fn internal(err: ReportError) -> ApiError {
    error!(error = %err, "report failed");
    error_body(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string())
}

/// Permissive CORS on every response; preflight `OPTIONS` never reaches a handler.
///
/// Bodiless client errors produced by routing itself (wrong method) are given the
/// same JSON error body as handler errors.
async fn cors(req: Request, next: Next) -> Response {
    let mut res = if req.method() == Method::OPTIONS {
        StatusCode::OK.into_response()
    } else {
        next.run(req).await
    };
    if res.status().is_client_error() && !res.headers().contains_key(CONTENT_TYPE) {
        let status = res.status();
        let allow = res.headers().get(ALLOW).cloned();
        res = error_body(status, status.canonical_reason().unwrap_or("request rejected")).into_response();
        if let Some(allow) = allow {
            res.headers_mut().insert(ALLOW, allow);
        }
    }
    let headers = res.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static("GET, OPTIONS"));
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("*"));
    res
}

#[derive(Debug, Error)]
#[error("database unreachable: {0}")]
pub struct StartupError(String);

/// Pings the source once within `first`, then once more within `retry`.
pub async fn wait_for_source(
    source: &dyn ReportSource,
    first: Duration,
    retry: Duration,
) -> Result<(), StartupError> {
    let reason = match timeout(first, source.ping()).await {
        Ok(Ok(())) => return Ok(()),
        Ok(Err(e)) => e.to_string(),
        Err(_) => format!("no answer within {first:?}"),
    };
    warn!(%reason, "database ping failed, retrying");

    match timeout(retry, source.ping()).await {
        Ok(Ok(())) => {
            info!("database reachable after retry");
            Ok(())
        }
        Ok(Err(e)) => Err(StartupError(e.to_string())),
        Err(_) => Err(StartupError(format!("no answer within {retry:?}"))),
    }
}

//! In-process fake of the scanning API.

use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use parking_lot::Mutex;
use serde_json::{Value, json};

const CREATED_AT: &str = "2025-03-01T10:22:31.482113";
const COMPLETED_AT: &str = "2025-03-01T10:40:02";

#[derive(Debug, Clone)]
struct FakeJob {
    job_id: String,
    domain: String,
    status: String,
    subdomains: Vec<Value>,
    wafs: Vec<Value>,
}

#[derive(Debug, Default)]
pub struct FakeState {
    jobs: Vec<FakeJob>,
    progress_calls: HashMap<String, u32>,
    next_id: u32,
    /// Progress polls before a job reports `completed`.
    pub polls_to_complete: u32,
    pub requests: Vec<String>,
}

pub type Shared = Arc<Mutex<FakeState>>;

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "detail": "Scan job not found" })),
    )
        .into_response()
}

fn live_subdomain(id: i64, hostname: String, http_status: u16) -> Value {
    json!({
        "id": id,
        "subdomain": hostname,
        "status": "live",
        "is_live": true,
        "http_status": http_status,
    })
}

fn detail_json(job: &FakeJob) -> Value {
    json!({
        "job_id": job.job_id,
        "domain": job.domain,
        "status": job.status,
        "created_at": CREATED_AT,
        "completed_at": (job.status == "completed").then_some(COMPLETED_AT),
        "error_message": null,
        "subdomains": job.subdomains,
        "screenshots": [],
        "waf_detections": job.wafs,
        "leak_detections": [],
        "scan_metadata": { "tools": ["subfinder", "httpx"] },
    })
}

async fn list_scans(
    State(state): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let mut state = state.lock();
    state.requests.push(format!(
        "GET /scans limit={} offset={}",
        params.get("limit").map(String::as_str).unwrap_or("-"),
        params.get("offset").map(String::as_str).unwrap_or("-"),
    ));
    let rows: Vec<Value> = state
        .jobs
        .iter()
        .map(|job| {
            json!({
                "job_id": job.job_id,
                "domain": job.domain,
                "status": job.status,
                "created_at": CREATED_AT,
                "subdomains_count": job.subdomains.len(),
                "screenshots_count": 0,
            })
        })
        .collect();
    Json(Value::Array(rows))
}

async fn create_scan(
    State(state): State<Shared>,
    Json(body): Json<Value>,
) -> Json<Value> {
    let mut state = state.lock();
    let domain = body["domain"].as_str().unwrap_or_default().to_string();
    state.next_id += 1;
    let job_id = format!("job-{}", state.next_id);
    state.requests.push(format!("POST /scans {domain}"));
    state.jobs.push(FakeJob {
        job_id: job_id.clone(),
        domain: domain.clone(),
        status: "running".into(),
        subdomains: Vec::new(),
        wafs: Vec::new(),
    });
    Json(json!({
        "job_id": job_id,
        "domain": domain,
        "status": "running",
        "message": format!("Scan started for {domain}"),
    }))
}

async fn scan_detail(
    State(state): State<Shared>,
    Path(id): Path<String>,
) -> Response {
    let state = state.lock();
    match state.jobs.iter().find(|job| job.job_id == id) {
        Some(job) => Json(detail_json(job)).into_response(),
        None => not_found(),
    }
}

async fn scan_progress(
    State(state): State<Shared>,
    Path(id): Path<String>,
) -> Response {
    let mut state = state.lock();
    let threshold = state.polls_to_complete;
    let calls = {
        let entry = state.progress_calls.entry(id.clone()).or_default();
        *entry += 1;
        *entry
    };
    let Some(job) = state.jobs.iter_mut().find(|job| job.job_id == id) else {
        return not_found();
    };

    if calls >= threshold {
        job.status = "completed".into();
        job.subdomains = vec![
            live_subdomain(1, format!("a.{}", job.domain), 200),
            live_subdomain(2, format!("b.{}", job.domain), 301),
        ];
        job.wafs = vec![json!({
            "url": format!("https://a.{}", job.domain),
            "has_waf": true,
            "waf_name": "Cloudflare",
        })];
        Json(json!({
            "job_id": id,
            "status": "completed",
            "progress": {"current": 100},
        }))
        .into_response()
    } else {
        Json(json!({
            "job_id": id,
            "status": "running",
            "progress": {"current": 50, "stage": "httpx"},
            "db_status": "running",
        }))
        .into_response()
    }
}

async fn stop_scan(
    State(state): State<Shared>,
    Path(id): Path<String>,
) -> Response {
    let state = state.lock();
    match state.jobs.iter().find(|job| job.job_id == id) {
        Some(job) if job.status == "completed" => {
            let detail = format!("Cannot stop scan in {} state", job.status);
            (StatusCode::BAD_REQUEST, Json(json!({"detail": detail})))
                .into_response()
        }
        Some(_) => {
            Json(json!({"message": format!("Scan job {id} stopped")}))
                .into_response()
        }
        None => not_found(),
    }
}

async fn delete_scan(
    State(state): State<Shared>,
    Path(id): Path<String>,
) -> Response {
    let mut state = state.lock();
    let Some(pos) = state.jobs.iter().position(|job| job.job_id == id) else {
        return not_found();
    };
    let job = state.jobs.remove(pos);
    Json(json!({
        "message": format!("Scan job {id} and all related data deleted"),
        "deleted_items": {
            "subdomains": job.subdomains.len(),
            "screenshots": 0,
            "waf_detections": job.wafs.len(),
            "leak_detections": 0,
        },
    }))
    .into_response()
}

async fn leak_scan(
    State(state): State<Shared>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Json<Value> {
    let mut state = state.lock();
    state.requests.push(format!("POST /scans/{id}/leak-scan {body}"));
    let count = body["urls"].as_array().map(Vec::len).unwrap_or_default();
    Json(json!({
        "task_id": format!("leak-{id}"),
        "urls_to_scan": count,
        "mode": body["mode"],
        "message": format!("Leak scan started for {count} URLs"),
    }))
}

async fn add_subdomain(
    State(state): State<Shared>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock();
    state.requests.push(format!("POST /scans/{id}/subdomains {body}"));
    let Some(job) = state.jobs.iter_mut().find(|job| job.job_id == id) else {
        return not_found();
    };
    let name = body["subdomain"].as_str().unwrap_or_default().to_string();
    let next_id = job.subdomains.len() + 1;
    job.subdomains.push(json!({
        "id": next_id,
        "subdomain": name,
        "status": "found",
        "is_live": body.get("is_live").cloned().unwrap_or(Value::Bool(false)),
        "http_status": body.get("http_status").cloned().unwrap_or(Value::Null),
        "discovered_by": "manual",
    }));
    let message = format!("Subdomain {name} added successfully");
    Json(json!({"message": message})).into_response()
}

async fn screenshot(Path((id, file)): Path<(String, String)>) -> Response {
    if file == "a.png" {
        let body = format!("PNG:{id}:{file}").into_bytes();
        (StatusCode::OK, body).into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

pub async fn spawn(polls_to_complete: u32) -> (SocketAddr, Shared) {
    let state: Shared = Arc::new(Mutex::new(FakeState {
        polls_to_complete,
        ..FakeState::default()
    }));

    let app = Router::new()
        .route("/api/v1/scans", get(list_scans).post(create_scan))
        .route("/api/v1/scans/{id}", get(scan_detail).delete(delete_scan))
        .route("/api/v1/scans/{id}/progress", get(scan_progress))
        .route("/api/v1/scans/{id}/stop", post(stop_scan))
        .route("/api/v1/scans/{id}/leak-scan", post(leak_scan))
        .route("/api/v1/scans/{id}/subdomains", post(add_subdomain))
        .route("/jobs/{id}/screenshots/{file}", get(screenshot))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fake server");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("fake server");
    });
    (addr, state)
}

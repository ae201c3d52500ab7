//! Canned wire documents.

use recon_model::{JobSummary, ProgressSnapshot};
use serde_json::{Value, json};

pub const CREATED_AT: &str = "2025-03-01T10:22:31.482113";
pub const COMPLETED_AT: &str = "2025-03-01T10:40:02";

pub fn summary(job_id: &str, domain: &str, status: &str) -> JobSummary {
    summary_with_counts(job_id, domain, status, 0, 0)
}

pub fn summary_with_counts(
    job_id: &str,
    domain: &str,
    status: &str,
    subdomains: u64,
    screenshots: u64,
) -> JobSummary {
    serde_json::from_value(json!({
        "job_id": job_id,
        "domain": domain,
        "status": status,
        "created_at": CREATED_AT,
        "subdomains_count": subdomains,
        "screenshots_count": screenshots,
    }))
    .expect("fixture summary decodes")
}

/// Detail document with `(host, is_live)` subdomains, `(url, has_waf)` WAF
/// detections and `leaks` leak detections.
pub fn detail_document(
    job_id: &str,
    domain: &str,
    status: &str,
    subdomains: &[(&str, bool)],
    wafs: &[(&str, bool)],
    leaks: usize,
) -> Value {
    let subdomains: Vec<Value> = subdomains
        .iter()
        .enumerate()
        .map(|(idx, (host, live))| {
            json!({
                "id": idx + 1,
                "subdomain": host,
                "status": if *live { "live" } else { "dead" },
                "is_live": live,
                "http_status": if *live { Some(200) } else { None },
                "discovered_by": "subfinder",
            })
        })
        .collect();
    let wafs: Vec<Value> = wafs
        .iter()
        .map(|(url, has_waf)| {
            json!({
                "url": url,
                "has_waf": has_waf,
                "waf_name": if *has_waf { Some("Cloudflare") } else { None },
            })
        })
        .collect();
    let leaks: Vec<Value> = (0..leaks)
        .map(|idx| {
            json!({
                "base_url": format!("https://{domain}"),
                "leaked_file_url": format!("https://{domain}/.env.{idx}"),
                "http_status": 200,
                "file_type": "env",
                "severity": "high",
            })
        })
        .collect();

    json!({
        "job_id": job_id,
        "domain": domain,
        "status": status,
        "created_at": CREATED_AT,
        "completed_at": (status == "completed").then_some(COMPLETED_AT),
        "subdomains": subdomains,
        "screenshots": [],
        "waf_detections": wafs,
        "leak_detections": leaks,
    })
}

pub fn progress(status: &str, current: Option<f64>) -> ProgressSnapshot {
    let mut body = json!({ "status": status });
    if let Some(current) = current {
        body["progress"] = json!({ "current": current });
    }
    serde_json::from_value(body).expect("fixture progress decodes")
}

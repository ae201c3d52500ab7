//! Plain-text rendering for operator output.

use chrono::{DateTime, Utc};
use recon_core::{
    Candidate, SelectionSet, SubScanSummary, SubdomainFilter,
    view::filter_subdomains,
};
use recon_model::{
    DeletionReport, JobDetail, JobId, JobSummary, Subdomain, Technology,
};

const BAR_WIDTH: usize = 20;

/// "just now", "5m ago", "3h ago", "2d ago", else the calendar date.
pub fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(then);
    let minutes = elapsed.num_minutes();
    let hours = elapsed.num_hours();
    let days = elapsed.num_days();

    if minutes < 1 {
        "just now".to_string()
    } else if hours < 1 {
        format!("{minutes}m ago")
    } else if days < 1 {
        format!("{hours}h ago")
    } else if days < 7 {
        format!("{days}d ago")
    } else {
        then.format("%Y-%m-%d").to_string()
    }
}

pub fn progress_bar(percent: f64) -> String {
    let percent = percent.clamp(0.0, 100.0);
    let filled = ((percent / 100.0) * BAR_WIDTH as f64).round() as usize;
    format!(
        "[{}{}] {:>3}%",
        "#".repeat(filled),
        "-".repeat(BAR_WIDTH - filled),
        percent.round() as u8
    )
}

/// Left-aligned columns sized to their widest cell.
fn table(header: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = header.iter().map(|h| h.len()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |cells: Vec<&str>| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = vec![line(header.to_vec())];
    out.extend(
        rows.iter()
            .map(|row| line(row.iter().map(String::as_str).collect())),
    );
    out.join("\n")
}

pub fn job_table<F>(
    jobs: &[JobSummary],
    now: DateTime<Utc>,
    percent: F,
) -> String
where
    F: Fn(&JobId) -> Option<f64>,
{
    if jobs.is_empty() {
        return "No scan jobs yet.".to_string();
    }

    let rows: Vec<Vec<String>> = jobs
        .iter()
        .map(|job| {
            let status = match percent(&job.job_id) {
                Some(pct) if !job.status.is_terminal() => {
                    format!("{} {:.0}%", job.status, pct)
                }
                _ => job.status.to_string(),
            };
            vec![
                job.job_id.to_string(),
                job.domain.clone(),
                status,
                job.subdomains_count.to_string(),
                job.screenshots_count.to_string(),
                relative_time(job.created_at, now),
            ]
        })
        .collect();

    table(
        &["JOB", "DOMAIN", "STATUS", "SUBDOMAINS", "SCREENSHOTS", "CREATED"],
        &rows,
    )
}

fn subdomain_row(sub: &Subdomain) -> Vec<String> {
    let or_dash = |value: Option<String>| value.unwrap_or_else(|| "-".into());
    vec![
        sub.id.to_string(),
        sub.hostname.clone(),
        if sub.is_live { "live" } else { "dead" }.to_string(),
        or_dash(sub.http_status.map(|code| code.to_string())),
        or_dash(sub.title.clone()),
        or_dash(sub.webserver.clone()),
        or_dash(sub.response_time.as_ref().map(ToString::to_string)),
    ]
}

pub fn job_detail(
    detail: &JobDetail,
    filter: SubdomainFilter,
    search: &str,
    now: DateTime<Utc>,
) -> String {
    let mut out = vec![
        format!("{} ({})", detail.domain, detail.job_id),
        format!("status:    {}", detail.status),
        format!("created:   {}", relative_time(detail.created_at, now)),
    ];
    if let Some(done) = detail.completed_at {
        out.push(format!("completed: {}", relative_time(done, now)));
    }
    if let Some(message) = &detail.error_message {
        out.push(format!("error:     {message}"));
    }
    out.push(format!(
        "subdomains: {} ({} live), screenshots: {}, leaks: {}",
        detail.subdomains.len(),
        detail.live_count(),
        detail.screenshots.len(),
        detail.leak_count(),
    ));

    let shown = filter_subdomains(detail, filter, search);
    out.push(String::new());
    if shown.is_empty() {
        out.push(format!("No {filter} subdomains match."));
    } else {
        let rows: Vec<_> = shown.into_iter().map(subdomain_row).collect();
        out.push(table(
            &["ID", "HOST", "STATE", "HTTP", "TITLE", "SERVER", "TIME"],
            &rows,
        ));
    }

    let wafs: Vec<_> = detail
        .waf_detections
        .iter()
        .filter(|waf| waf.has_waf)
        .map(|waf| {
            vec![
                waf.url.clone(),
                waf.waf_name.clone().unwrap_or_else(|| "unknown".into()),
            ]
        })
        .collect();
    if !wafs.is_empty() {
        out.push(String::new());
        out.push(table(&["WAF URL", "WAF"], &wafs));
    }

    if !detail.leak_detections.is_empty() {
        let leaks: Vec<_> = detail
            .leak_detections
            .iter()
            .map(|leak| {
                vec![
                    leak.effective_severity().to_string(),
                    leak.leaked_file_url.clone(),
                    leak.file_type.clone().unwrap_or_else(|| "-".into()),
                ]
            })
            .collect();
        out.push(String::new());
        out.push(table(&["SEVERITY", "LEAKED FILE", "TYPE"], &leaks));
    }

    if !detail.screenshots.is_empty() {
        let shots: Vec<_> = detail
            .screenshots
            .iter()
            .map(|shot| {
                vec![
                    shot.id.to_string(),
                    shot.url.clone(),
                    shot.filename.clone(),
                ]
            })
            .collect();
        out.push(String::new());
        out.push(table(&["SHOT", "URL", "FILE"], &shots));
    }

    out.join("\n")
}

/// Every HTTP field recorded for one subdomain, plus the WAF verdict and
/// leaks found under it.
pub fn subdomain_detail(detail: &JobDetail, sub: &Subdomain) -> String {
    let field = |label: &str, value: Option<String>| {
        format!("{label:<15}{}", value.unwrap_or_else(|| "-".into()))
    };
    fn list(items: &[String]) -> Option<String> {
        (!items.is_empty()).then(|| items.join(", "))
    }

    let technologies: Vec<String> = sub
        .technologies
        .iter()
        .map(|tech| match tech {
            Technology::Named {
                name,
                version: Some(version),
            } => format!("{name} {version}"),
            other => other.name().to_string(),
        })
        .collect();
    let chain: Vec<String> = sub
        .chain_status_codes
        .iter()
        .map(u16::to_string)
        .collect();

    let mut out = vec![
        format!("{} (#{}) in {}", sub.hostname, sub.id, detail.domain),
        field("state", Some(if sub.is_live { "live" } else { "dead" }.into())),
        field("status", sub.status.clone()),
        field("http status", sub.http_status.map(|code| code.to_string())),
        field("redirects", list(&chain)),
        field("url", sub.url.clone()),
        field("final url", sub.final_url.clone()),
        field("title", sub.title.clone()),
        field("webserver", sub.webserver.clone()),
        field("cdn", sub.cdn_name.clone()),
        field("content type", sub.content_type.clone()),
        field(
            "content length",
            sub.content_length.map(|len| len.to_string()),
        ),
        field(
            "response time",
            sub.response_time.as_ref().map(ToString::to_string),
        ),
        field("host", sub.host.clone()),
        field("ipv4", list(&sub.ipv4_addresses)),
        field("ipv6", list(&sub.ipv6_addresses)),
        field("technologies", list(&technologies)),
        field("discovered by", sub.discovered_by.clone()),
    ];

    let origins = [sub.https_url(), sub.http_url()];
    let trimmed = |url: &str| url.trim_end_matches('/').to_string();
    let waf = detail
        .waf_detections
        .iter()
        .find(|waf| waf.has_waf && origins.contains(&trimmed(&waf.url)));
    let waf = match waf {
        Some(waf) => waf.waf_name.clone().unwrap_or_else(|| "unknown".into()),
        None => "none detected".into(),
    };
    out.push(field("waf", Some(waf)));

    let leaks: Vec<_> = detail
        .leak_detections
        .iter()
        .filter(|leak| origins.contains(&trimmed(&leak.base_url)))
        .map(|leak| {
            vec![
                leak.effective_severity().to_string(),
                leak.leaked_file_url.clone(),
            ]
        })
        .collect();
    if !leaks.is_empty() {
        out.push(String::new());
        out.push(table(&["SEVERITY", "LEAKED FILE"], &leaks));
    }

    out.join("\n")
}

/// Server message plus the counts it reported, verbatim.
pub fn deletion_report(report: &DeletionReport) -> String {
    let Some(items) = &report.deleted_items else {
        return report.message.clone();
    };

    let mut out = vec![
        report.message.clone(),
        format!("  subdomains:      {}", items.subdomains),
        format!("  screenshots:     {}", items.screenshots),
        format!("  waf detections:  {}", items.waf_detections),
        format!("  leak detections: {}", items.leak_detections),
    ];
    let revoked = match items.task_revoked {
        Some(true) => "yes",
        Some(false) => "no",
        None => "unknown",
    };
    out.push(format!("  task revoked:    {revoked}"));
    out.join("\n")
}

pub fn candidates(selection: &SelectionSet) -> String {
    let rows: Vec<_> = selection
        .candidates()
        .iter()
        .map(|Candidate { url, subdomain_id, http_status }| {
            let mark = if selection.is_selected(url) { "[x]" } else { "[ ]" };
            vec![
                mark.to_string(),
                url.clone(),
                subdomain_id.to_string(),
                http_status.map_or_else(|| "-".into(), |code| code.to_string()),
            ]
        })
        .collect();
    table(&["", "URL", "SUBDOMAIN", "HTTP"], &rows)
}

pub fn subscan_summary(summary: &SubScanSummary) -> String {
    format!(
        "leak scan {} finished after {} polls: \
         {} URLs scanned, {} leaks found",
        summary.task_id,
        summary.ticks,
        summary.urls_scanned,
        summary.leaks_found
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use recon_model::{DeletedItems, JobStatus};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn relative_time_buckets() {
        let now = now();
        let cases = [
            (Duration::seconds(30), "just now"),
            (Duration::minutes(5), "5m ago"),
            (Duration::hours(3), "3h ago"),
            (Duration::days(2), "2d ago"),
            (Duration::days(9), "2025-03-01"),
        ];
        for (ago, expected) in cases {
            assert_eq!(relative_time(now - ago, now), expected, "{ago:?}");
        }
    }

    #[test]
    fn deletion_counts_are_shown_verbatim() {
        let report = DeletionReport {
            message: "Scan job job-1 force deleted".into(),
            deleted_items: Some(DeletedItems {
                subdomains: 12,
                screenshots: 4,
                waf_detections: 0,
                leak_detections: 1,
                task_revoked: None,
            }),
        };
        let text = deletion_report(&report);
        assert!(text.contains("subdomains:      12"));
        assert!(text.contains("task revoked:    unknown"));

        let bare = DeletionReport {
            message: "deleted".into(),
            deleted_items: None,
        };
        assert_eq!(deletion_report(&bare), "deleted");
    }

    #[test]
    fn job_table_shows_progress_only_for_live_jobs() {
        let jobs = vec![
            JobSummary {
                job_id: JobId::new("job-1"),
                domain: "example.com".into(),
                status: JobStatus::Running,
                created_at: now() - Duration::minutes(5),
                completed_at: None,
                subdomains_count: 0,
                screenshots_count: 0,
            },
            JobSummary {
                job_id: JobId::new("job-2"),
                domain: "example.org".into(),
                status: JobStatus::Completed,
                created_at: now() - Duration::days(2),
                completed_at: Some(now()),
                subdomains_count: 31,
                screenshots_count: 8,
            },
        ];
        let text = job_table(&jobs, now(), |_| Some(42.0));
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("JOB"));
        assert!(lines[1].contains("running 42%"));
        assert!(lines[1].contains("5m ago"));
        assert!(lines[2].contains("completed"));
        assert!(!lines[2].contains('%'));
    }

    #[test]
    fn subdomain_detail_lists_http_metadata_and_findings() {
        let detail: JobDetail = serde_json::from_value(serde_json::json!({
            "job_id": "job-1",
            "domain": "example.com",
            "status": "completed",
            "created_at": "2025-03-01T10:22:31",
            "subdomains": [{
                "id": 4,
                "subdomain": "api.example.com",
                "is_live": true,
                "http_status": 200,
                "technologies": [{"name": "nginx", "version": "1.25"}, "React"],
                "ipv4_addresses": ["203.0.113.7"],
                "chain_status_codes": [301, 200],
            }],
            "waf_detections": [
                {
                    "url": "http://api.example.com/",
                    "has_waf": true,
                    "waf_name": "Cloudflare"
                }
            ],
            "leak_detections": [{
                "base_url": "https://api.example.com",
                "leaked_file_url": "https://api.example.com/.env",
                "severity": "high",
            }],
        }))
        .unwrap();
        let sub = detail.subdomain(4).unwrap();

        let text = subdomain_detail(&detail, sub);
        assert!(text.starts_with("api.example.com (#4) in example.com"));
        assert!(text.contains("technologies   nginx 1.25, React"));
        assert!(text.contains("ipv4           203.0.113.7"));
        assert!(text.contains("ipv6           -"));
        assert!(text.contains("redirects      301, 200"));
        assert!(text.contains("waf            Cloudflare"));
        assert!(text.contains("high      https://api.example.com/.env"));
        assert!(detail.subdomain(5).is_none());
    }

    #[test]
    fn progress_bar_clamps() {
        assert_eq!(
            progress_bar(50.0),
            format!("[{}{}]  50%", "#".repeat(10), "-".repeat(10))
        );
        assert!(progress_bar(140.0).ends_with("100%"));
    }
}

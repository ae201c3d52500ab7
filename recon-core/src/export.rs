use std::path::{Path, PathBuf};

use recon_model::JobId;
use serde::Serialize;
use serde_json::{Value, ser::PrettyFormatter};
use tracing::info;

use crate::{api::ScanApi, error::Result};

/// `recon_{domain}_{jobId}.json`, with path separators neutralised.
pub fn export_file_name(domain: &str, job_id: &JobId) -> String {
    let safe = |raw: &str| raw.replace(['/', '\\'], "_");
    format!("recon_{}_{}.json", safe(domain), safe(job_id.as_str()))
}

/// Two-space indented JSON.
pub fn to_pretty_json(document: &Value) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"  ");
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut out, formatter);
    document.serialize(&mut serializer)?;
    out.push(b'\n');
    Ok(out)
}

/// Re-fetch the job detail as the server sent it and write it to `dir`.
pub async fn export_job(
    api: &dyn ScanApi,
    job_id: &JobId,
    dir: &Path,
) -> Result<PathBuf> {
    let document = api.scan_document(job_id).await?;
    let domain = document
        .get("domain")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();

    let path = dir.join(export_file_name(&domain, job_id));
    let bytes = to_pretty_json(&document)?;
    tokio::fs::write(&path, &bytes).await?;
    info!(
        job_id = %job_id,
        path = %path.display(),
        bytes = bytes.len(),
        "exported job detail"
    );
    Ok(path)
}

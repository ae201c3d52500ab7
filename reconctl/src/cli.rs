use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use recon_core::SubdomainFilter;
use recon_model::LeakScanMode;

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "reconctl")]
#[command(about = "Create, follow and manage recon scan jobs")]
pub struct Cli {
    /// Scan API origin (overrides config and $RECON_SERVER_URL)
    #[arg(long, global = true)]
    pub server: Option<String>,

    /// Answer yes to every confirmation prompt
    #[arg(short = 'y', long, global = true, default_value_t = false)]
    pub yes: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List scan jobs, newest first
    List {
        /// 1-based listing page
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Show one job with its subdomains, WAF and leak findings
    Show(ShowArgs),
    /// Start a scan for one domain
    Create {
        domain: String,
    },
    /// Start scans for several domains at once
    Bulk(BulkArgs),
    /// Stop a pending or running scan
    Stop {
        job_id: String,
    },
    /// Delete a finished scan and all of its results
    Delete {
        job_id: String,
    },
    /// Terminate a pending or running scan and delete its results
    ForceDelete {
        job_id: String,
    },
    /// Write the job detail to recon_{domain}_{job}.json
    Export {
        job_id: String,
        /// Target directory
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
    /// List hosts eligible for a selective leak scan
    Candidates {
        job_id: String,
    },
    /// Run a leak scan over selected hosts of a completed job
    LeakScan(LeakScanArgs),
    /// Add a subdomain to a job by hand
    AddSubdomain(AddSubdomainArgs),
    /// Follow the listing, or one job, until interrupted
    Watch {
        /// Open this job and exit once it reaches a terminal state
        #[arg(long)]
        job: Option<String>,
    },
    /// Download a job's screenshot
    Screenshot {
        job_id: String,
        /// Screenshot id as listed by `show`
        #[arg(long)]
        id: i64,
        /// Target directory
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    pub job_id: String,

    /// Subdomain filter: all, live or dead
    #[arg(long, default_value_t = SubdomainFilter::All)]
    pub filter: SubdomainFilter,

    /// Case-insensitive hostname search
    #[arg(long, default_value = "")]
    pub search: String,

    /// Show everything recorded for one subdomain id instead of the table
    #[arg(long)]
    pub subdomain: Option<i64>,
}

#[derive(Args, Debug)]
pub struct BulkArgs {
    /// Domains, one per argument; each is treated as its own line
    pub domains: Vec<String>,

    /// Read domains from a file, one per line
    #[arg(long)]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct LeakScanArgs {
    pub job_id: String,

    /// Host URL to include (repeatable), as printed by `candidates`
    #[arg(long = "url")]
    pub urls: Vec<String>,

    /// Include every eligible host
    #[arg(long, conflicts_with = "urls")]
    pub all: bool,

    /// Scan mode: tiny or full (defaults to the configured mode)
    #[arg(long)]
    pub mode: Option<LeakScanMode>,

    /// Submit and exit without following progress
    #[arg(long)]
    pub detach: bool,
}

#[derive(Args, Debug)]
pub struct AddSubdomainArgs {
    pub job_id: String,

    pub hostname: String,

    /// Mark the subdomain as live
    #[arg(long)]
    pub live: bool,

    /// Mark the subdomain as not live
    #[arg(long, conflicts_with = "live")]
    pub dead: bool,

    /// HTTP status observed for the host
    #[arg(long)]
    pub http_status: Option<u16>,
}

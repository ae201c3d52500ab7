use std::{
    io::Write as _,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use recon_core::{
    Liveness, ReconError, ScanApi as _, Session, SubdomainDraft,
    SubdomainFilter, SyncEvent,
};
use recon_model::{JobId, JobStatus, LeakScanMode};
use tracing::info;

use crate::{
    cli::{AddSubdomainArgs, BulkArgs, Command, LeakScanArgs, ShowArgs},
    render,
};

/// Extra wait on top of the configured refresh delay after a manual add.
const AUGMENT_REFRESH_GRACE: Duration = Duration::from_secs(5);

pub async fn run(command: Command, session: &mut Session) -> Result<()> {
    match command {
        Command::List { page } => list(session, page).await,
        Command::Show(args) => show(session, args).await,
        Command::Create { domain } => create(session, &domain).await,
        Command::Bulk(args) => bulk(session, args).await,
        Command::Stop { job_id } => {
            let job_id = JobId::from(job_id);
            confirmed(session.stop(&job_id).await, |ack| ack.message)
        }
        Command::Delete { job_id } => {
            let job_id = JobId::from(job_id);
            confirmed(session.delete(&job_id).await, |report| {
                render::deletion_report(&report)
            })
        }
        Command::ForceDelete { job_id } => {
            let job_id = JobId::from(job_id);
            confirmed(session.force_delete(&job_id).await, |report| {
                render::deletion_report(&report)
            })
        }
        Command::Export { job_id, dir } => {
            let path = session
                .export(&JobId::from(job_id), &dir)
                .await
                .context("export failed")?;
            println!("wrote {}", path.display());
            Ok(())
        }
        Command::Candidates { job_id } => candidates(session, job_id).await,
        Command::LeakScan(args) => leak_scan(session, args).await,
        Command::AddSubdomain(args) => add_subdomain(session, args).await,
        Command::Watch { job } => match job {
            Some(job_id) => watch_job(session, JobId::from(job_id)).await,
            None => watch_listing(session).await,
        },
        Command::Screenshot { job_id, id, dir } => {
            let path =
                screenshot(session, JobId::from(job_id), id, &dir).await?;
            println!("wrote {}", path.display());
            Ok(())
        }
    }
}

/// A declined confirmation is a normal outcome, not a failure.
fn confirmed<T>(
    outcome: recon_core::Result<T>,
    describe: impl FnOnce(T) -> String,
) -> Result<()> {
    match outcome {
        Ok(value) => {
            println!("{}", describe(value));
            Ok(())
        }
        Err(ReconError::Declined { action }) => {
            println!("{action} cancelled, nothing changed");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

async fn list(session: &mut Session, page: u32) -> Result<()> {
    session.registry_mut().set_page(page.saturating_sub(1));
    session
        .refresh_registry()
        .await
        .context("failed to list scan jobs")?;
    let table = render::job_table(session.listing(), Utc::now(), |id| {
        session.poller().percent(id)
    });
    println!("{table}");
    Ok(())
}

async fn show(session: &mut Session, args: ShowArgs) -> Result<()> {
    let open = session.open(&JobId::from(args.job_id)).await?;
    let detail = open.detail();
    let text = match args.subdomain {
        Some(id) => {
            let sub = detail.subdomain(id).ok_or_else(|| {
                anyhow!("job {} has no subdomain {id}", detail.job_id)
            })?;
            render::subdomain_detail(detail, sub)
        }
        None => {
            render::job_detail(detail, args.filter, &args.search, Utc::now())
        }
    };
    println!("{text}");
    Ok(())
}

async fn create(session: &mut Session, domain: &str) -> Result<()> {
    let accepted = session.create(domain).await?;
    println!("{}", accepted.message);
    println!("job {} ({})", accepted.job_id, accepted.status);
    Ok(())
}

async fn bulk(session: &mut Session, args: BulkArgs) -> Result<()> {
    let mut input = args.domains.join("\n");
    if let Some(path) = &args.file {
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        input.push('\n');
        input.push_str(&contents);
    }

    let accepted = session.create_bulk(&input).await?;
    println!("{}", accepted.message);
    for job in &accepted.jobs {
        println!("  {}  {}", job.job_id, job.domain);
    }
    Ok(())
}

async fn candidates(session: &mut Session, job_id: String) -> Result<()> {
    session.open(&JobId::from(job_id)).await?;
    let selection = session.open_selection()?;
    println!("{}", render::candidates(selection));
    Ok(())
}

async fn leak_scan(session: &mut Session, args: LeakScanArgs) -> Result<()> {
    let job_id = JobId::from(args.job_id);
    session.open(&job_id).await?;

    let selection = session.open_selection()?;
    if args.all {
        selection.select_all();
    }
    for url in &args.urls {
        selection.select(url)?;
    }

    let mode = args.mode.unwrap_or_else(|| session.default_leak_mode());
    let accepted = session.submit_selection(Some(mode)).await?;
    println!("{}", accepted.message);
    info!(
        job_id = %job_id,
        task_id = %accepted.task_id,
        %mode,
        "leak scan submitted"
    );

    if args.detach {
        return Ok(());
    }
    follow_subscan(session, &job_id, mode).await
}

async fn follow_subscan(
    session: &mut Session,
    job_id: &JobId,
    mode: LeakScanMode,
) -> Result<()> {
    println!("following {mode} leak scan, ctrl-c to stop watching");
    loop {
        let event = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!();
                return Ok(());
            }
            event = session.next_event() => event,
        };

        match event {
            Some(SyncEvent::SubScanProgress {
                job_id: id,
                percent,
                ..
            }) if &id == job_id => {
                print!("\r{}", render::progress_bar(percent));
                std::io::stdout().flush()?;
            }
            Some(SyncEvent::SubScanCompleted { job_id: id, summary })
                if &id == job_id =>
            {
                println!("\r{}", render::progress_bar(100.0));
                println!("{}", render::subscan_summary(&summary));
                return Ok(());
            }
            Some(_) => {}
            None => return Err(anyhow!("event channel closed")),
        }
    }
}

async fn add_subdomain(
    session: &mut Session,
    args: AddSubdomainArgs,
) -> Result<()> {
    let job_id = JobId::from(args.job_id);
    session.open(&job_id).await?;

    let liveness = match (args.live, args.dead) {
        (true, _) => Liveness::Live,
        (_, true) => Liveness::Dead,
        _ => Liveness::Unspecified,
    };
    if let Some(draft) = session.draft_mut() {
        *draft = SubdomainDraft::new(args.hostname)
            .with_liveness(liveness)
            .with_http_status(args.http_status);
    }
    let ack = session.submit_draft().await?;
    println!("{}", ack.message);

    let deadline =
        session.config().augment_refresh_delay() + AUGMENT_REFRESH_GRACE;
    let refreshed = tokio::time::timeout(deadline, async {
        loop {
            match session.next_event().await {
                Some(SyncEvent::DetailRefreshRequested(id)) if id == job_id => {
                    break;
                }
                Some(_) => continue,
                None => break,
            }
        }
    })
    .await;

    if refreshed.is_ok()
        && let Some(open) = session.open_job()
    {
        println!("{} subdomains now listed", open.detail().subdomains.len());
    }
    Ok(())
}

async fn watch_listing(session: &mut Session) -> Result<()> {
    session.refresh_registry().await?;
    print_listing(session);
    session.start_auto_refresh();

    loop {
        let event = tokio::select! {
            _ = tokio::signal::ctrl_c() => return Ok(()),
            event = session.next_event() => event,
        };

        match event {
            Some(SyncEvent::RegistryRefreshRequested) => print_listing(session),
            Some(SyncEvent::ProgressUpdated { job_id, percent }) => {
                println!("{job_id}  {}", render::progress_bar(percent));
            }
            Some(SyncEvent::JobFinished { job_id, status }) => {
                println!("{job_id}  finished: {status}");
            }
            Some(SyncEvent::JobRemoved(job_id)) => {
                println!("{job_id}  removed");
            }
            Some(_) => {}
            None => return Err(anyhow!("event channel closed")),
        }
    }
}

fn print_listing(session: &Session) {
    println!(
        "\n{}",
        render::job_table(session.listing(), Utc::now(), |id| {
            session.poller().percent(id)
        })
    );
}

async fn watch_job(session: &mut Session, job_id: JobId) -> Result<()> {
    let open = session.open(&job_id).await?;
    let status = open.detail().status;
    if status.is_terminal() {
        println!("{job_id} already {status}");
        return Ok(());
    }
    println!("following {job_id} ({status}), ctrl-c to stop watching");

    loop {
        let event = tokio::select! {
            _ = tokio::signal::ctrl_c() => return Ok(()),
            event = session.next_event() => event,
        };

        match event {
            Some(SyncEvent::ProgressUpdated { job_id: id, percent })
                if id == job_id =>
            {
                print!("\r{}", render::progress_bar(percent));
                std::io::stdout().flush()?;
            }
            Some(SyncEvent::JobFinished { job_id: id, status })
                if id == job_id =>
            {
                println!();
                if let Some(open) = session.open_job() {
                    println!(
                        "{}",
                        render::job_detail(
                            open.detail(),
                            SubdomainFilter::All,
                            "",
                            Utc::now()
                        )
                    );
                }
                if status != JobStatus::Completed {
                    return Err(anyhow!("job {job_id} ended {status}"));
                }
                return Ok(());
            }
            Some(SyncEvent::JobRemoved(id)) if id == job_id => {
                return Err(anyhow!("job {job_id} was deleted"));
            }
            Some(_) => {}
            None => return Err(anyhow!("event channel closed")),
        }
    }
}

async fn screenshot(
    session: &mut Session,
    job_id: JobId,
    id: i64,
    dir: &Path,
) -> Result<PathBuf> {
    let open = session.open(&job_id).await?;
    let shot = open
        .detail()
        .screenshots
        .iter()
        .find(|shot| shot.id == id)
        .cloned()
        .ok_or_else(|| anyhow!("job {job_id} has no screenshot {id}"))?;

    let bytes = session
        .api()
        .fetch_asset(&shot.file_path)
        .await
        .with_context(|| format!("failed to download {}", shot.file_path))?;

    let file_name = Path::new(&shot.filename)
        .file_name()
        .ok_or_else(|| anyhow!("screenshot {id} has no usable file name"))?;
    let path = dir.join(file_name);
    tokio::fs::write(&path, &bytes)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

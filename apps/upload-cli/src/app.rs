//! Runs the uploader against the configured host and backend.

use std::sync::Arc;

use anyhow::{Context, bail};
use moments_uploader::{RecordMetadata, UploadEvent, UploadOrchestrator, UploadRequest};
use moments_vimeo::HostCredentials;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::cli::Args;
use crate::config::Config;

/// Runs the requested command. Returns the number of failed uploads.
pub async fn run(config: Config, args: Args) -> anyhow::Result<usize> {
    let backend = moments_backend::Client::new(&config.backend.base_url)
        .context("building backend client")?;

    if args.list {
        list(&backend).await?;
        return Ok(0);
    }

    if args.files.is_empty() {
        bail!("no video files given");
    }
    let Some(user_id) = args.user_id.clone().filter(|u| !u.trim().is_empty()) else {
        bail!("--user-id is required to upload");
    };

    let credentials = HostCredentials::new(config.host.access_token.clone());
    if credentials.is_empty() {
        bail!(
            "no host access token: set [host].access_token or {}",
            crate::config::ENV_HOST_TOKEN
        );
    }
    let host = moments_vimeo::Client::new(&credentials)
        .context("building host client")?
        .with_base_url(&config.host.base_url);

    let mut options = config.upload_options();
    if let Some(chunk_size) = args.chunk_size {
        options.chunk_size = chunk_size;
    }

    let requests: Vec<UploadRequest> = args
        .files
        .iter()
        .map(|path| {
            UploadRequest::new(
                path,
                RecordMetadata {
                    user_id: user_id.clone(),
                    title: args.title.clone().unwrap_or_default(),
                    description: args.description.clone(),
                    is_public: !args.private,
                },
            )
        })
        .collect();

    let mut orchestrator = UploadOrchestrator::new(Arc::new(host), Arc::new(backend), options);
    let events = orchestrator
        .take_events()
        .context("event receiver already taken")?;
    let printer = tokio::spawn(print_events(events));

    let cancel = orchestrator.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling uploads");
            cancel.cancel();
        }
    });

    let reports = orchestrator.upload_all(requests).await;
    drop(orchestrator);
    let _ = printer.await;

    let mut failed = 0;
    for report in &reports {
        if report.success {
            println!(
                "OK    {}  {}",
                report.path.display(),
                report.video_url.as_deref().unwrap_or_default()
            );
        } else {
            failed += 1;
            println!(
                "FAIL  {}  {}",
                report.path.display(),
                report.user_message.as_deref().unwrap_or("upload failed")
            );
        }
    }
    info!(total = reports.len(), failed, "uploads finished");
    Ok(failed)
}

async fn list(backend: &moments_backend::Client) -> anyhow::Result<()> {
    let videos = backend.list_videos().await.context("listing videos")?;
    if videos.is_empty() {
        println!("no videos registered");
        return Ok(());
    }
    for video in videos {
        let visibility = if video.is_public { "public" } else { "private" };
        println!(
            "{}  {:<8} {:>6} views  {}  {}",
            video.video_id, visibility, video.view_count, video.video_url, video.title
        );
    }
    Ok(())
}

async fn print_events(mut events: mpsc::Receiver<UploadEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            UploadEvent::Phase { upload_id, phase } => {
                info!(upload = %upload_id, %phase, "phase changed");
            }
            UploadEvent::Progress(p) => {
                eprintln!(
                    "{}  {:5.1}%  {:.1} KiB/s",
                    p.upload_id,
                    p.percentage(),
                    p.bytes_per_second / 1024.0
                );
            }
            UploadEvent::Retrying {
                upload_id,
                offset,
                attempt,
                delay,
                reason,
            } => {
                warn!(
                    upload = %upload_id,
                    offset,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    reason = %reason,
                    "retrying"
                );
            }
            UploadEvent::Completed {
                upload_id,
                video_url,
                ..
            } => info!(upload = %upload_id, url = %video_url, "upload complete"),
            UploadEvent::Failed { upload_id, error } => {
                warn!(upload = %upload_id, error = %error, "upload failed");
            }
        }
    }
}

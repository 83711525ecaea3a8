//! `process` and `single`: run images through the dispatch policy.

use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Local;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use nameplate_core::ProcessingSummary;
use nameplate_dispatch::{file_timestamp, list_images, FullReport, ProcessingInfo};

use crate::config::AppConfig;

/// Cancel `token` on Ctrl-C so a deferred wait stops at the next tick.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; cancelling");
            token.cancel();
        }
    });
}

pub async fn run(app: &AppConfig, input: Option<PathBuf>, report: bool) -> Result<()> {
    let policy = app.policy().await?;
    let dir = input.unwrap_or_else(|| policy.input_dir().to_path_buf());
    let images = list_images(&dir).await;
    println!("Found {} image(s) in {}", images.len(), dir.display());

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let summary = policy.process(&images, &cancel).await?;
    print_summary(&summary);

    if report {
        let full = FullReport::build(
            &summary.records,
            &app.config.validation.required_fields,
            ProcessingInfo::from(&summary),
        );
        let timestamp = file_timestamp(Local::now());
        match policy.output().save_report(&full, &timestamp).await {
            Some(path) => println!("Report: {}", path.display()),
            None => warn!("Full report was not saved"),
        }
    }
    Ok(())
}

pub async fn single(app: &AppConfig, image: &Path) -> Result<()> {
    let policy = app.policy().await?;
    let (record, saved) = policy.process_single(image).await?;
    if let Some(validation) = record.validation() {
        println!(
            "{}: completeness {:.1}% ({})",
            image.display(),
            validation.completeness,
            if validation.valid { "valid" } else { "incomplete" }
        );
        if !validation.missing.is_empty() {
            let missing: Vec<&str> = validation.missing.iter().map(|f| f.as_str()).collect();
            println!("  missing: {}", missing.join(", "));
        }
    }
    if let Some(path) = saved {
        info!(path = %path.display(), "Record saved");
        println!("Saved: {}", path.display());
    }
    Ok(())
}

fn print_summary(summary: &ProcessingSummary) {
    println!();
    println!("Mode:         {}", summary.mode);
    if let Some(job_id) = &summary.job_id {
        println!("Bulk job(s):  {job_id}");
    }
    println!("Images:       {}", summary.total_images);
    println!("Succeeded:    {}", summary.success);
    println!("Failed:       {}", summary.errors);
    println!("Success rate: {:.1}%", summary.success_rate);
    println!("Elapsed:      {:.1}s", summary.elapsed_secs);
    for failure in &summary.failures {
        println!("  ✗ {}: {}", failure.source_file, failure.error);
    }
}

//! `jobs`, `stats` and `validate`: read-only views of saved state.

use anyhow::Result;

use nameplate_config::validate as validate_config;
use nameplate_dispatch::revalidate;

use crate::config::AppConfig;

pub async fn jobs(app: &AppConfig, limit: usize) -> Result<()> {
    let registry = app.registry().await;
    let jobs = registry.list_jobs(limit).await;
    if jobs.is_empty() {
        println!("No bulk jobs recorded.");
        return Ok(());
    }
    for job in jobs {
        println!(
            "{}  {:<10} {:>4}/{:<4} images  {}",
            job.created_at.format("%Y-%m-%d %H:%M:%S"),
            job.status,
            job.processed,
            job.total_images,
            job.job_id
        );
        for error in &job.errors {
            println!("    ! {error}");
        }
    }
    Ok(())
}

pub async fn stats(app: &AppConfig) -> Result<()> {
    let mappings = app.normalizer().mapping_stats();
    let jobs = app.registry().await.stats().await;

    println!("Field mappings:");
    println!("  predefined fields:    {}", mappings.total_predefined);
    println!("  learned keys:         {}", mappings.total_learned);
    println!("  similarity threshold: {}", mappings.similarity_threshold);
    if !mappings.learned_fields.is_empty() {
        let names: Vec<&str> = mappings.learned_fields.iter().map(|f| f.as_str()).collect();
        println!("  learned for:          {}", names.join(", "));
    }

    println!("Bulk jobs:");
    println!("  total:                {}", jobs.total_jobs);
    for (status, count) in &jobs.status_breakdown {
        println!("  {status:<21} {count}");
    }
    println!("  images processed:     {}", jobs.total_images_processed);
    Ok(())
}

/// Report config problems, then re-check every saved record file.
pub async fn validate(app: &AppConfig) -> Result<()> {
    let report = validate_config(&app.config);
    println!("Config: {}", app.path.display());
    for error in &report.errors {
        println!("  ✗ {}: {}", error.path, error.message);
    }
    for warning in &report.warnings {
        println!("  ! {}: {}", warning.path, warning.message);
    }
    if report.is_valid() {
        println!("  ✓ ready");
    }

    let results = revalidate(&app.output(), &app.config.validation.required_fields).await;
    if results.is_empty() {
        println!("No saved records to check.");
        return Ok(());
    }
    let mut valid = 0;
    for result in &results {
        let name = result
            .file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if result.valid {
            valid += 1;
            println!("  ✓ {name} ({:.1}%)", result.completeness);
        } else {
            let missing: Vec<&str> = result.missing.iter().map(|f| f.as_str()).collect();
            println!(
                "  ✗ {name} ({:.1}%) missing: {}",
                result.completeness,
                missing.join(", ")
            );
        }
    }
    println!("{valid}/{} records valid", results.len());
    Ok(())
}

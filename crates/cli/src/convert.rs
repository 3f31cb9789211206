use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use anyhow::Context;
use dropzone_core::convert::{convert_file, ConversionOutcome};
use dropzone_core::layout::SheetLayout;
use dropzone_core::registry::ConversionRegistry;

use crate::args::{ConvertArgs, LayoutArgs, WatchArgs};

fn load_layout(args: &LayoutArgs) -> anyhow::Result<SheetLayout> {
    match &args.layout {
        Some(path) => SheetLayout::load(path)
            .with_context(|| format!("Failed to load layout {}", path.display())),
        None => Ok(SheetLayout::default()),
    }
}

fn report(input: &Path, outcome: &ConversionOutcome) {
    match outcome {
        ConversionOutcome::Skipped { previous } => println!(
            "{}: already converted at {}",
            input.display(),
            previous.converted_at
        ),
        ConversionOutcome::Converted(report) => {
            for (batch, path) in report.batches.iter().zip(&report.written) {
                println!("{} ({} uploads)", path.display(), batch.upload_count());
            }
            println!(
                "{}: {} files, {} uploads",
                input.display(),
                report.total_files(),
                report.total_uploads()
            );
        }
    }
}

pub fn run_convert(args: ConvertArgs) -> anyhow::Result<()> {
    let layout = load_layout(&args.layout)?;
    let registry = ConversionRegistry::from_env();
    let outcome = convert_file(
        &args.input,
        &args.layout.output_dir,
        &layout,
        &registry,
        args.force,
    )
    .with_context(|| format!("Failed to convert {}", args.input.display()))?;
    report(&args.input, &outcome);
    Ok(())
}

/// `.xlsx` files in `dir`, skipping Office lock files.
pub fn workbooks_in(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_xlsx = path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("xlsx"));
        let is_lock = path
            .file_name()
            .is_some_and(|n| n.to_string_lossy().starts_with("~$"));
        if is_xlsx && !is_lock && path.is_file() {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}

/// Run [`convert_file`] on the blocking pool so the watch loop keeps
/// reacting to Ctrl-C while calamine parses a large workbook.
async fn convert_in_background(
    path: PathBuf,
    output_dir: PathBuf,
    layout: Arc<SheetLayout>,
    registry: Arc<ConversionRegistry>,
) -> anyhow::Result<ConversionOutcome> {
    tokio::task::spawn_blocking(move || {
        convert_file(&path, &output_dir, &layout, &registry, false)
            .with_context(|| format!("Failed to convert {}", path.display()))
    })
    .await
    .context("Conversion task panicked")?
}

pub async fn run_watch(args: WatchArgs) -> anyhow::Result<()> {
    let layout = Arc::new(load_layout(&args.layout)?);
    let registry = Arc::new(ConversionRegistry::from_env());
    let mut seen: HashMap<PathBuf, SystemTime> = HashMap::new();
    let mut ticker = tokio::time::interval(Duration::from_secs(args.interval.max(1)));

    tracing::info!(dir = %args.dir.display(), interval_secs = args.interval, "Watching for workbooks");
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl-C, stopping watch");
                return Ok(());
            }
        }

        let workbooks = match workbooks_in(&args.dir) {
            Ok(found) => found,
            Err(e) => {
                tracing::error!(dir = %args.dir.display(), error = %e, "Failed to list directory");
                continue;
            }
        };

        for path in workbooks {
            let modified = std::fs::metadata(&path).and_then(|m| m.modified()).ok();
            if modified.is_some() && seen.get(&path) == modified.as_ref() {
                continue;
            }

            let job = convert_in_background(
                path.clone(),
                args.layout.output_dir.clone(),
                Arc::clone(&layout),
                Arc::clone(&registry),
            );
            let result = tokio::select! {
                result = job => result,
                _ = tokio::signal::ctrl_c() => {
                    // The blocking conversion still runs to completion before exit.
                    tracing::info!(path = %path.display(), "Received Ctrl-C during conversion, stopping watch");
                    return Ok(());
                }
            };
            match result {
                Ok(outcome) => report(&path, &outcome),
                Err(e) => tracing::error!(path = %path.display(), error = format!("{e:#}"), "Conversion failed"),
            }
            if let Some(modified) = modified {
                seen.insert(path, modified);
            }
        }
    }
}

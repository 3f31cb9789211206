use anyhow::{anyhow, Context};
use dropzone_core::retention::{
    export_schedule, write_records_file, RetentionPolicy, DEFAULT_OUTPUT_FILE,
};
use dropzone_core::workbook::Workbook;

use crate::args::RetentionArgs;

pub fn run_retention(args: RetentionArgs) -> anyhow::Result<()> {
    let policy = match &args.policy {
        Some(path) => RetentionPolicy::load(path)
            .with_context(|| format!("Failed to load policy {}", path.display()))?,
        None => RetentionPolicy::default(),
    };

    let workbook = Workbook::open(&args.input)
        .with_context(|| format!("Failed to open {}", args.input.display()))?;
    let sheet = workbook
        .sheet(&args.sheet)
        .ok_or_else(|| anyhow!("Sheet '{}' not found in {}", args.sheet, args.input.display()))?;

    let export = export_schedule(sheet, &policy)?;
    let output = args
        .output
        .unwrap_or_else(|| args.output_dir.join(DEFAULT_OUTPUT_FILE));
    write_records_file(&export.records, &output)?;

    println!(
        "{}: {} record classes, {} rows skipped",
        output.display(),
        export.records.len(),
        export.skipped_total()
    );
    for (reason, count) in &export.skipped {
        println!("  skipped ({reason}): {count}");
    }
    Ok(())
}

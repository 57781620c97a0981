mod args;

use anyhow::{Context, Result, bail};
use chrono::Local;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use args::Args;
use cb_failed_assistant::{
    classify::{Classifier, ReferenceData, Summary, retain_actions},
    common::default_output_path,
    constants::NPPES_API_DOC_URL,
    corrections::load_corrections,
    dictionary::load_dictionaries,
    learning::{LearnedCodes, learn_codes, ticket_npis},
    npi::{CachedRegistry, NpiRegistry, NppesClient, OfflineRegistry},
    report::ReportSheet,
    workbook::{SheetGrid, read_workbook, write_workbook},
};

fn main() -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();

    if !args.report.exists() {
        bail!("Report not found at {}", args.report.display());
    }

    tracing::info!("Loading dictionaries...");
    let dictionaries = load_dictionaries(&args.dictionaries);
    if dictionaries.is_empty() {
        tracing::warn!("No dictionary file matched a known kind; dictionary lookups will find nothing");
    }

    tracing::info!("Processing USAP corrections...");
    let corrections = load_corrections(&args.corrections);

    let report_sheets = read_workbook(&args.report)
        .with_context(|| format!("Failed reading report {}", args.report.display()))?;

    let learned_codes = match ticket_npis(&report_sheets) {
        Some(rows) => learn_codes(&corrections, &rows),
        None => {
            tracing::warn!("Could not read SIN/NPI from the report for learning; no codes learned");
            LearnedCodes::new()
        }
    };
    tracing::info!("Learned {} CB codes to apply globally", learned_codes.len());

    let reference = ReferenceData {
        dictionaries: &dictionaries,
        corrections: &corrections,
        learned_codes: &learned_codes,
    };

    let processed = if args.skip_api {
        tracing::info!("--skip-api set; registry lookups disabled.");
        process_sheets(report_sheets, reference, OfflineRegistry, &args)
    } else {
        tracing::info!("NPI registry reference: {}", NPPES_API_DOC_URL);
        let client = NppesClient::new(
            &args.api_base_url,
            &args.api_version,
            Duration::from_secs(args.request_timeout_secs),
        )?;
        process_sheets(report_sheets, reference, client, &args)
    };

    if processed.is_empty() {
        bail!(
            "Report {} has no sheets with data rows",
            args.report.display()
        );
    }

    let output_path = args
        .output_path
        .clone()
        .unwrap_or_else(|| default_output_path(&args.report, Local::now()));
    write_workbook(&output_path, &processed)?;
    tracing::info!("Wrote processed report {}", output_path.display());
    Ok(())
}

fn process_sheets<R: NpiRegistry>(
    report_sheets: Vec<SheetGrid>,
    reference: ReferenceData<'_>,
    registry: R,
    args: &Args,
) -> Vec<SheetGrid> {
    let mut registry = CachedRegistry::new(registry);
    let mut classifier = Classifier::new(reference, &mut registry);
    let mut overall = Summary::default();
    let mut processed = Vec::new();

    for SheetGrid { name, grid } in report_sheets {
        let Some(mut sheet) = ReportSheet::from_grid(&name, grid) else {
            tracing::info!("Sheet '{name}' has no data rows; skipping");
            continue;
        };

        let progress = ProgressBar::new(sheet.rows.len() as u64);
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        ) {
            progress.set_style(style.progress_chars("=> "));
        }
        progress.set_message(name.clone());

        classifier.annotate_sheet(&mut sheet, Some(&progress));
        progress.finish_and_clear();

        let summary = Summary::of_sheet(&sheet);
        tracing::info!("Sheet '{}': {} rows, {}", name, sheet.rows.len(), summary.describe());
        overall.add_sheet(&sheet);

        retain_actions(&mut sheet, &args.actions);
        processed.push(SheetGrid {
            grid: sheet.to_grid(),
            name,
        });
    }

    drop(classifier);
    let stats = registry.stats();
    tracing::info!("Overall {}", overall.describe());
    tracing::info!(
        "Registry cache: {} lookups, {} hits, {} failed",
        stats.misses,
        stats.hits,
        stats.failures
    );
    processed
}

use crate::archive::{self, FileLocator};
use crate::cli::args::{Cli, Commands};
use crate::cli::init_logging;
use crate::error::{ProcessingError, Result};
use crate::models::NormalizedOutput;
use crate::processors::{
    ExtractionPipeline, PipelineOutput, RayonExecutor, Recipe, RunReport, WorkUnit,
};
use crate::readers::StationReader;
use crate::settings::Settings;
use crate::utils::filename::{default_grid_filename, report_filename, table_filename};
use crate::utils::progress::ProgressReporter;
use crate::utils::constants::STATIONS_SUBDIR;
use crate::writers::{
    grid_info, parse_compression, read_grid, GridWriter, StationWriter, TableWriter,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

pub async fn run(cli: Cli) -> Result<()> {
    init_logging(cli.verbose, cli.log_file.as_deref())?;
    let mut settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Extract {
            variable,
            stations,
            output_file,
            extreme_days,
            levels,
            time_mean,
            start_year,
            end_year,
            single_level_root,
            pressure_level_root,
            compression,
            max_workers,
            table,
            per_station,
            dry_run,
        } => {
            if let Some(year) = start_year {
                settings.start_year = year;
            }
            if let Some(year) = end_year {
                settings.end_year = year;
            }
            if let Some(root) = single_level_root {
                settings.single_level_root = root;
            }
            if let Some(root) = pressure_level_root {
                settings.pressure_level_root = root;
            }
            if let Some(compression) = compression {
                settings.compression = compression;
            }
            if let Some(workers) = max_workers {
                settings.max_workers = workers;
            }
            validator::Validate::validate(&settings)?;
            parse_compression(&settings.compression)?;

            let recipe = Recipe::parse(&variable)?;
            let catalog = StationReader::with_require_dates(extreme_days).read_catalog(&stations)?;
            let output_file = output_file.unwrap_or_else(|| {
                default_grid_filename(&settings.output_dir, recipe.name(), extreme_days)
            });

            println!("Extracting {} for {} stations", recipe, catalog.locations().len());
            println!("Output file: {}", output_file.display());
            println!(
                "Years: {}-{}, Workers: {}",
                settings.start_year, settings.end_year, settings.max_workers
            );

            let locator = locator_for(&settings);
            if dry_run {
                return dry_run_report(&settings, recipe, extreme_days, &catalog, locator);
            }

            ensure_output_dir(&output_file)?;
            let source = archive::default_source()?;

            let cancel = Arc::new(AtomicBool::new(false));
            let signal_flag = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupt received, stopping after the running units");
                    signal_flag.store(true, Ordering::Relaxed);
                }
            });

            let max_workers = settings.max_workers;
            let years = (settings.start_year, settings.end_year);
            let result = tokio::task::spawn_blocking(move || -> Result<PipelineOutput> {
                let pipeline = ExtractionPipeline::new(locator, source.as_ref(), recipe)
                    .with_years(years.0, years.1)
                    .with_levels(levels)
                    .with_time_mean(time_mean)
                    .with_extreme_days(extreme_days)
                    .with_cancel_flag(cancel);

                let units = pipeline.plan(&catalog)?;
                let progress =
                    ProgressReporter::new(units.len() as u64, "Extracting archive files...", false);
                pipeline.run_planned(
                    &catalog,
                    &units,
                    &RayonExecutor::new(max_workers),
                    Some(&progress),
                )
            })
            .await??;

            let PipelineOutput { output, mut report } = result;
            let artifacts = Artifacts {
                grid: &output_file,
                table,
                per_station,
                name: recipe.name(),
                compression: &settings.compression,
            };
            match &output {
                Some(output) => write_outputs(output, &artifacts, &mut report),
                None => {
                    error!("reassembly stopped on a conflicting duplicate, no grid written");
                    report.record_artifact_failure(
                        &output_file,
                        "conflicting duplicate observation".to_string(),
                    );
                }
            }

            let report_path = report_filename(&output_file);
            report.write_json(&report_path)?;
            println!("\n{}", report.generate_summary());
            println!("Report: {}", report_path.display());
            if report.has_failures() {
                warn!(
                    failed = report.failed_artifacts.len(),
                    "run finished with failures, see the report"
                );
            }

            if report.artifacts_written.contains(&output_file) {
                println!("\n{}", grid_info(&output_file)?.summary());
            }
            println!("Extraction complete!");
        }

        Commands::Locate {
            variable,
            start_year,
            end_year,
            missing_only,
        } => {
            let recipe = Recipe::parse(&variable)?;
            let locator = locator_for(&settings);
            let start = start_year.unwrap_or(settings.start_year);
            let end = end_year.unwrap_or(settings.end_year);

            let mut missing = 0;
            let mut total = 0;
            for input in recipe.inputs() {
                for year in start..=end {
                    for month in 1..=12 {
                        let path =
                            locator.expected_path(input.code(), year, month, input.granularity())?;
                        let exists = path.is_file();
                        total += 1;
                        if !exists {
                            missing += 1;
                        }
                        if !missing_only || !exists {
                            println!(
                                "{} {}",
                                if exists { "found  " } else { "MISSING" },
                                path.display()
                            );
                        }
                    }
                }
            }
            println!("\n{} of {} expected files missing", missing, total);
        }

        Commands::Info { file, sample } => {
            println!("Analyzing grid file: {}", file.display());

            let info = grid_info(&file)?;
            println!("\n{}", info.summary());

            if sample > 0 {
                let output = read_grid(&file)?;
                println!("\nSample Rows (showing up to {}):", sample);
                print_sample(&output, sample);
            }
        }
    }

    Ok(())
}

fn locator_for(settings: &Settings) -> FileLocator {
    FileLocator::new(&settings.single_level_root, &settings.pressure_level_root)
        .with_product(&settings.product)
}

/// The output directory must be creatable before any archive is touched.
fn ensure_output_dir(output_file: &Path) -> Result<()> {
    if let Some(parent) = output_file.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| {
                ProcessingError::Config(format!(
                    "Output directory {} is not writable: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }
    Ok(())
}

fn dry_run_report(
    settings: &Settings,
    recipe: Recipe,
    extreme_days: bool,
    catalog: &crate::models::StationCatalog,
    locator: FileLocator,
) -> Result<()> {
    let source = archive::MemorySource::new();
    let pipeline = ExtractionPipeline::new(locator.clone(), &source, recipe)
        .with_years(settings.start_year, settings.end_year)
        .with_extreme_days(extreme_days);
    let units: Vec<WorkUnit> = pipeline.plan(catalog)?;

    let mut missing: Vec<PathBuf> = Vec::new();
    for unit in &units {
        for input in recipe.inputs() {
            if let Err(ProcessingError::NotFound { path }) =
                locator.locate(input.code(), unit.year, unit.month, input.granularity())
            {
                missing.push(path);
            }
        }
    }

    println!(
        "\nPlanned {} work units, {} input files missing",
        units.len(),
        missing.len()
    );
    for path in missing.iter().take(20) {
        println!("  {}", path.display());
    }
    Ok(())
}

/// Which artifacts an extraction writes.
struct Artifacts<'a> {
    grid: &'a Path,
    table: bool,
    per_station: bool,
    name: &'a str,
    compression: &'a str,
}

/// Write every artifact; a failure is recorded and the others still go out.
fn write_outputs(output: &NormalizedOutput, artifacts: &Artifacts<'_>, report: &mut RunReport) {
    let output_file = artifacts.grid;
    let grid = GridWriter::new()
        .with_compression(artifacts.compression)
        .and_then(|writer| writer.write_grid(output, output_file));
    match grid {
        Ok(()) => report.record_artifact(output_file),
        Err(e) => {
            error!(path = %output_file.display(), error = %e, "grid output failed");
            report.record_artifact_failure(output_file, e.to_string());
        }
    }

    if artifacts.per_station {
        let dir = output_file
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(STATIONS_SUBDIR);
        let written = GridWriter::new()
            .with_compression(artifacts.compression)
            .and_then(|grid| StationWriter::new(grid).write_stations(output, &dir, artifacts.name));
        match written {
            Ok(outcomes) => {
                for (path, outcome) in outcomes {
                    match outcome {
                        Ok(()) => report.record_artifact(&path),
                        Err(e) => report.record_artifact_failure(&path, e.to_string()),
                    }
                }
            }
            Err(e) => {
                error!(dir = %dir.display(), error = %e, "per-station output failed");
                report.record_artifact_failure(&dir, e.to_string());
            }
        }
    }

    if artifacts.table {
        let table_path = table_filename(output_file);
        match TableWriter::new().write_table(output, &table_path) {
            Ok(()) => report.record_artifact(&table_path),
            Err(e) => {
                error!(path = %table_path.display(), error = %e, "table output failed");
                report.record_artifact_failure(&table_path, e.to_string());
            }
        }
    }

    info!(
        written = report.artifacts_written.len(),
        failed = report.failed_artifacts.len(),
        "outputs finished"
    );
}

fn print_sample(output: &NormalizedOutput, limit: usize) {
    let lengths: Vec<usize> = output.dimensions.iter().map(|d| d.len()).collect();
    let strides: Vec<usize> = (0..lengths.len())
        .map(|i| lengths[i + 1..].iter().product())
        .collect();

    for row in 0..output.cell_count().min(limit) {
        let mut fields: Vec<String> = output
            .dimensions
            .iter()
            .enumerate()
            .map(|(d, dim)| {
                format!(
                    "{}={}",
                    dim.name,
                    dim.coordinates.format_at((row / strides[d]) % lengths[d])
                )
            })
            .collect();
        for variable in &output.variables {
            let value = variable.values[row];
            if value.is_nan() {
                fields.push(format!("{}=missing", variable.meta.name));
            } else {
                fields.push(format!(
                    "{}={:.3} {}",
                    variable.meta.name, value, variable.meta.units
                ));
            }
        }
        println!("{}. {}", row + 1, fields.join(", "));
    }
}

use crate::archive::{FileLocator, VolumeSource};
use crate::error::{ProcessingError, Result};
use crate::models::{
    ExtractionQuery, NormalizedOutput, Station, StationCatalog, StationId, TimeSelection,
};
use crate::processors::point_selector::PointSelector;
use crate::processors::reassembler::Reassembler;
use crate::processors::recipe::Recipe;
use crate::processors::run_report::{ReportEvent, RunReport};
use crate::processors::SeriesAccumulator;
use crate::utils::filename::mode_token;
use crate::utils::progress::ProgressReporter;
use chrono::Datelike;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// One (year, month) of archive files and the stations that need it.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkUnit {
    pub index: usize,
    pub year: i32,
    pub month: u32,
    /// Stations paired with the time steps wanted from this month.
    pub targets: Vec<(Station, TimeSelection)>,
}

/// What one unit produced. Partitions stay separate until the reduction.
#[derive(Debug, Default)]
pub struct UnitOutcome {
    pub index: usize,
    pub accumulator: SeriesAccumulator,
    pub events: Vec<ReportEvent>,
    pub files_opened: usize,
    pub slices: usize,
    pub samples: usize,
    pub completed: bool,
}

pub type UnitTask<'a> = dyn Fn(&WorkUnit) -> Result<UnitOutcome> + Sync + 'a;

/// Runs independent work units. Results come back in unit order.
pub trait Executor {
    fn execute(&self, units: &[WorkUnit], task: &UnitTask<'_>) -> Result<Vec<UnitOutcome>>;
}

/// Runs units one after another on the calling thread.
pub struct SequentialExecutor;

impl Executor for SequentialExecutor {
    fn execute(&self, units: &[WorkUnit], task: &UnitTask<'_>) -> Result<Vec<UnitOutcome>> {
        units.iter().map(task).collect()
    }
}

/// Runs units on a bounded rayon pool.
pub struct RayonExecutor {
    max_workers: usize,
}

impl RayonExecutor {
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
        }
    }
}

impl Default for RayonExecutor {
    fn default() -> Self {
        Self::new(num_cpus::get())
    }
}

impl Executor for RayonExecutor {
    fn execute(&self, units: &[WorkUnit], task: &UnitTask<'_>) -> Result<Vec<UnitOutcome>> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.max_workers)
            .build()
            .map_err(|e| ProcessingError::Config(e.to_string()))?;

        pool.install(|| units.par_iter().map(task).collect())
    }
}

/// Reassembled recipe output and the report of the run that produced it.
///
/// `output` is `None` when two sources disagreed on a cell; the conflict is
/// then in the report.
#[derive(Debug)]
pub struct PipelineOutput {
    pub output: Option<NormalizedOutput>,
    pub report: RunReport,
}

/// Plans, extracts, reduces and reassembles one recipe over a station catalog.
pub struct ExtractionPipeline<'a> {
    locator: FileLocator,
    source: &'a dyn VolumeSource,
    recipe: Recipe,
    start_year: i32,
    end_year: i32,
    levels: Option<Vec<i32>>,
    time_mean: bool,
    extreme_days: bool,
    cancel: Arc<AtomicBool>,
}

impl<'a> ExtractionPipeline<'a> {
    pub fn new(locator: FileLocator, source: &'a dyn VolumeSource, recipe: Recipe) -> Self {
        Self {
            locator,
            source,
            recipe,
            start_year: crate::utils::constants::DEFAULT_START_YEAR,
            end_year: crate::utils::constants::DEFAULT_END_YEAR,
            levels: None,
            time_mean: false,
            extreme_days: false,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_years(mut self, start_year: i32, end_year: i32) -> Self {
        self.start_year = start_year;
        self.end_year = end_year;
        self
    }

    pub fn with_levels(mut self, levels: Option<Vec<i32>>) -> Self {
        self.levels = levels;
        self
    }

    pub fn with_time_mean(mut self, time_mean: bool) -> Self {
        self.time_mean = time_mean;
        self
    }

    /// Select each catalog row's event date instead of whole years.
    pub fn with_extreme_days(mut self, extreme_days: bool) -> Self {
        self.extreme_days = extreme_days;
        self
    }

    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Work units for the catalog.
    ///
    /// In all-days mode every location is extracted in bulk for every month
    /// of the year range. In extreme-days mode each row becomes a nearest
    /// time query against its own month's file.
    pub fn plan(&self, catalog: &StationCatalog) -> Result<Vec<WorkUnit>> {
        if self.extreme_days && !catalog.has_anchors() {
            return Err(ProcessingError::Config(
                "Extreme-days mode needs a date on every catalog row".to_string(),
            ));
        }
        if self.start_year > self.end_year {
            return Err(ProcessingError::Config(format!(
                "Start year {} is after end year {}",
                self.start_year, self.end_year
            )));
        }

        let mut months: BTreeMap<(i32, u32), Vec<(Station, TimeSelection)>> = BTreeMap::new();

        if self.extreme_days {
            for station in catalog.rows() {
                if let Some(anchor) = station.anchor {
                    months
                        .entry((anchor.year(), anchor.month()))
                        .or_default()
                        .push((station.clone(), TimeSelection::Nearest(anchor)));
                }
            }
        } else {
            let targets: Vec<(Station, TimeSelection)> = catalog
                .locations()
                .into_iter()
                .map(|s| (s, TimeSelection::All))
                .collect();
            for year in self.start_year..=self.end_year {
                for month in 1..=12 {
                    months.insert((year, month), targets.clone());
                }
            }
        }

        Ok(months
            .into_iter()
            .enumerate()
            .map(|(index, ((year, month), targets))| WorkUnit {
                index,
                year,
                month,
                targets,
            })
            .collect())
    }

    /// Open each input file of the unit once and extract every target from it.
    pub fn run_unit(&self, unit: &WorkUnit) -> Result<UnitOutcome> {
        let mut outcome = UnitOutcome {
            index: unit.index,
            ..Default::default()
        };
        if self.cancel.load(Ordering::Relaxed) {
            return Ok(outcome);
        }

        let selector = PointSelector::new();

        for variable in self.recipe.inputs() {
            let code = variable.code();
            let path = match self
                .locator
                .locate(code, unit.year, unit.month, variable.granularity())
            {
                Ok(path) => path,
                Err(ProcessingError::NotFound { path }) => {
                    warn!(path = %path.display(), "archive file missing, skipping");
                    outcome.events.push(ReportEvent::MissingFile { path });
                    continue;
                }
                Err(e) => return Err(e),
            };

            let volume = match self.source.open(&path) {
                Ok(volume) => volume,
                Err(e) if e.is_data_gap() => {
                    warn!(path = %path.display(), error = %e, "archive file vanished, skipping");
                    outcome.events.push(ReportEvent::MissingFile { path });
                    continue;
                }
                Err(e) => {
                    error!(path = %path.display(), error = %e, "cannot open archive file");
                    outcome.events.push(ReportEvent::UnreadableFile {
                        path,
                        message: e.to_string(),
                    });
                    continue;
                }
            };
            outcome.files_opened += 1;
            let levels = self.recipe.levels_for(variable, self.levels.as_deref());

            for (station, time) in &unit.targets {
                let mut query = ExtractionQuery::new(code, station.clone()).with_time(*time);
                if let Some(levels) = &levels {
                    query = query.with_levels(levels.clone());
                }

                match selector.select(volume.as_ref(), &query) {
                    Ok(slice) => {
                        if !slice.unresolved_levels.is_empty() {
                            outcome.events.push(ReportEvent::LevelsUnresolved {
                                station: station.id,
                                file: volume.name().to_string(),
                                levels: slice.unresolved_levels.clone(),
                            });
                        }
                        if slice.is_empty() {
                            outcome.events.push(ReportEvent::EmptySelection {
                                station: station.id,
                                file: volume.name().to_string(),
                                time: match time {
                                    TimeSelection::Nearest(t) => Some(*t),
                                    _ => None,
                                },
                            });
                        }
                        outcome.slices += 1;
                        outcome.samples += slice.len();
                        outcome.accumulator.append(station.id, slice);
                    }
                    Err(ProcessingError::VariableMissing {
                        variable,
                        source_name,
                    }) => {
                        warn!(variable = %variable, file = %source_name, "variable missing in file");
                        outcome.events.push(ReportEvent::VariableMissing {
                            variable,
                            file: source_name,
                        });
                        break;
                    }
                    Err(ProcessingError::LevelNotFound {
                        levels,
                        source_name,
                    }) => {
                        warn!(levels = ?levels, file = %source_name, "no requested level present");
                        outcome.events.push(ReportEvent::LevelsUnresolved {
                            station: station.id,
                            file: source_name,
                            levels,
                        });
                        break;
                    }
                    Err(e) => {
                        error!(station = %station.id, file = volume.name(), error = %e, "selection failed");
                        outcome.events.push(ReportEvent::SelectionFailed {
                            station: station.id,
                            file: volume.name().to_string(),
                            message: e.to_string(),
                        });
                    }
                }
            }
            debug!(file = volume.name(), targets = unit.targets.len(), "file processed");
        }

        outcome.completed = true;
        Ok(outcome)
    }

    /// Run every unit through the executor and fold the partitions in unit
    /// order.
    pub fn extract(
        &self,
        units: &[WorkUnit],
        executor: &dyn Executor,
        progress: Option<&ProgressReporter>,
    ) -> Result<(SeriesAccumulator, RunReport)> {
        let mut report = RunReport::new(self.recipe.name());
        report.units_planned = units.len();

        info!(
            recipe = %self.recipe,
            units = units.len(),
            "extracting"
        );

        let task = |unit: &WorkUnit| {
            let outcome = self.run_unit(unit);
            if let Some(p) = progress {
                p.increment(1);
            }
            outcome
        };
        let mut outcomes = executor.execute(units, &task)?;
        outcomes.sort_by_key(|o| o.index);

        let mut accumulator = SeriesAccumulator::new();
        for outcome in outcomes {
            if outcome.completed {
                report.units_completed += 1;
            }
            report.files_opened += outcome.files_opened;
            report.slices_extracted += outcome.slices;
            report.samples_extracted += outcome.samples;
            for event in outcome.events {
                report.record(event);
            }
            accumulator.merge(outcome.accumulator);
        }

        if self.cancel.load(Ordering::Relaxed) {
            warn!(
                completed = report.units_completed,
                planned = report.units_planned,
                "run cancelled"
            );
            return Err(ProcessingError::Cancelled);
        }

        Ok((accumulator, report))
    }

    /// Plan, extract, reassemble and apply the recipe.
    pub fn run(
        &self,
        catalog: &StationCatalog,
        executor: &dyn Executor,
        progress: Option<&ProgressReporter>,
    ) -> Result<PipelineOutput> {
        let units = self.plan(catalog)?;
        self.run_planned(catalog, &units, executor, progress)
    }

    /// Extract, reassemble and apply the recipe over already planned units.
    pub fn run_planned(
        &self,
        catalog: &StationCatalog,
        units: &[WorkUnit],
        executor: &dyn Executor,
        progress: Option<&ProgressReporter>,
    ) -> Result<PipelineOutput> {
        let (accumulator, mut report) = self.extract(units, executor, progress)?;

        if let Some(p) = progress {
            p.set_message("Reassembling...");
        }

        let reassembly =
            match Reassembler::new().reassemble(&accumulator, catalog, &self.recipe.input_metas())
            {
                Ok(reassembly) => reassembly,
                Err(ProcessingError::DuplicateObservation {
                    station,
                    time,
                    level,
                    first,
                    second,
                }) => {
                    error!(
                        station,
                        time = %time,
                        level = ?level,
                        first,
                        second,
                        "conflicting duplicate observation, no grid produced"
                    );
                    report.record(ReportEvent::ConflictingDuplicate {
                        station: StationId(station),
                        time,
                        level,
                        first,
                        second,
                    });
                    if let Some(p) = progress {
                        p.finish_with_message("Reassembly stopped on a conflicting duplicate");
                    }
                    return Ok(PipelineOutput {
                        output: None,
                        report,
                    });
                }
                Err(e) => return Err(e),
            };
        report.duplicates_resolved = reassembly.duplicates_resolved;

        let average = self.time_mean || self.recipe.always_time_mean();
        let mut output = self.recipe.finish(reassembly.output, average)?;
        output.set_attribute("recipe", self.recipe.name());
        output.set_attribute("selection", mode_token(self.extreme_days));
        output.set_attribute("grid_selection", "nearest");

        if let Some(p) = progress {
            p.finish_with_message(&format!(
                "Extracted {} slices from {} files",
                report.slices_extracted, report.files_opened
            ));
        }

        Ok(PipelineOutput {
            output: Some(output),
            report,
        })
    }
}

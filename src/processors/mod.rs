pub mod accumulator;
pub mod derived;
pub mod pipeline;
pub mod point_selector;
pub mod reassembler;
pub mod recipe;
pub mod run_report;

pub use accumulator::SeriesAccumulator;
pub use pipeline::{
    ExtractionPipeline, Executor, PipelineOutput, RayonExecutor, SequentialExecutor, UnitOutcome,
    WorkUnit,
};
pub use point_selector::{nearest_index, nearest_time_index, PointSelector};
pub use reassembler::{time_mean, Reassembler, Reassembly};
pub use recipe::Recipe;
pub use run_report::{ArtifactFailure, ReportEvent, RunReport};

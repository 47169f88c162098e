pub mod config;
mod import;
mod orchestrator;
mod types;

pub use config::{ColumnConfig, PipelineConfig, RowConfig, TrenchOrientation};
pub use import::{import_channels, inspect_channels, IMPORTED_KEY};
pub use orchestrator::{generate_kymographs, generate_kymographs_reported, read_layout};
pub use types::{
    FieldLayout, FieldSpec, NoOpReporter, PipelineStage, ProgressReporter, RowLayout,
};

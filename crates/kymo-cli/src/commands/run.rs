use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use kymo_core::pipeline::{
    generate_kymographs_reported, FieldSpec, PipelineConfig, PipelineStage, ProgressReporter,
    TrenchOrientation,
};
use kymo_core::scheduler::FieldScheduler;
use tracing::info;

use crate::summary::{print_outcomes, print_run_summary};

#[derive(Clone, Copy, ValueEnum)]
pub enum OrientationArg {
    OpenDown,
    OpenUp,
}

impl From<OrientationArg> for TrenchOrientation {
    fn from(arg: OrientationArg) -> Self {
        match arg {
            OrientationArg::OpenDown => Self::OpenDown,
            OrientationArg::OpenUp => Self::OpenUp,
        }
    }
}

#[derive(Args)]
pub struct RunArgs {
    /// Input container prefix; field N is read from "<prefix>N"
    pub input_prefix: String,

    /// Directory receiving one kymo_<fov> container per field
    #[arg(short, long)]
    pub output: PathBuf,

    /// Comma-separated fields of view to process
    #[arg(long, value_delimiter = ',', required = true)]
    pub fov: Vec<usize>,

    /// Comma-separated channel names; the first is used for segmentation
    #[arg(long, value_delimiter = ',')]
    pub channels: Vec<String>,

    /// Pipeline config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Fields processed concurrently (0 = one per core)
    #[arg(long, default_value = "0")]
    pub workers: usize,

    /// Extra attempts for fields that fail on storage errors
    #[arg(long, default_value = "1")]
    pub retries: usize,

    /// Timepoints per chunk
    #[arg(long)]
    pub t_chunk: Option<usize>,

    /// Keep every n-th timepoint
    #[arg(long)]
    pub t_subsample: Option<usize>,

    /// Crop length into the trench along y (pixels)
    #[arg(long)]
    pub trench_len: Option<usize>,

    /// Crop padding beyond the trench opening (pixels)
    #[arg(long)]
    pub padding: Option<usize>,

    /// Kymograph width (pixels)
    #[arg(long)]
    pub trench_width: Option<usize>,

    /// Orientation of the first row
    #[arg(long, value_enum)]
    pub top_orientation: Option<OrientationArg>,
}

/// Drives one progress bar per field from pipeline stage events.
struct FieldProgress {
    fov: usize,
    bar: ProgressBar,
}

impl ProgressReporter for FieldProgress {
    fn begin_stage(&self, stage: PipelineStage, total_items: Option<usize>) {
        self.bar.set_message(format!("fov {}: {stage}", self.fov));
        self.bar.set_length(total_items.unwrap_or(1) as u64);
        self.bar.set_position(0);
    }

    fn advance(&self, items_done: usize) {
        self.bar.set_position(items_done as u64);
    }

    fn finish_stage(&self) {
        if let Some(len) = self.bar.length() {
            self.bar.set_position(len);
        }
    }
}

pub fn run(args: &RunArgs) -> Result<()> {
    let config = load_config(args)?;
    let scheduler = FieldScheduler::new(args.workers, args.retries)?;

    print_run_summary(
        &config,
        &args.input_prefix,
        &args.output,
        &args.fov,
        scheduler.workers(),
    );
    info!(fields = args.fov.len(), workers = scheduler.workers(), "Starting run");

    let multi = MultiProgress::new();
    let overall = multi.add(ProgressBar::new(args.fov.len() as u64));
    overall.set_style(
        ProgressStyle::default_bar()
            .template("{msg:32} [{bar:40}] {pos}/{len}")?
            .progress_chars("=> "),
    );
    overall.set_message("Fields");
    let field_style = ProgressStyle::default_bar()
        .template("{msg:32} [{bar:40}] {pos}/{len}")?
        .progress_chars("=> ");

    let config = Arc::new(config);
    let prefix = args.input_prefix.clone();
    let output_dir = args.output.clone();
    let job_multi = multi.clone();
    let job = move |fov: usize| {
        let field = FieldSpec::from_prefix(&prefix, &output_dir, fov);
        let bar = job_multi.add(ProgressBar::new(1));
        bar.set_style(field_style.clone());
        let reporter = FieldProgress { fov, bar };
        let result = generate_kymographs_reported(&field, &config, &reporter);
        reporter.bar.finish_and_clear();
        result
    };

    let outcomes = scheduler.run(&args.fov, job, |fov, outcome| {
        overall.inc(1);
        if !outcome.is_finished() {
            overall.println(format!("fov {fov}: {}", outcome.label()));
        }
    });
    overall.finish_with_message("Done");

    print_outcomes(&outcomes);

    let failed = outcomes.values().filter(|o| !o.is_finished()).count();
    if failed > 0 {
        bail!("{failed} of {} field(s) failed", outcomes.len());
    }
    println!("Kymographs saved under {}", args.output.display());
    Ok(())
}

fn load_config(args: &RunArgs) -> Result<PipelineConfig> {
    let mut config = if let Some(ref config_path) = args.config {
        let contents = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config {}", config_path.display()))?;
        PipelineConfig::from_toml(&contents).context("Invalid pipeline config")?
    } else {
        PipelineConfig::default()
    };

    if !args.channels.is_empty() {
        config.channels = args.channels.clone();
    }
    if let Some(t_chunk) = args.t_chunk {
        config.t_chunk = t_chunk;
    }
    if let Some(step) = args.t_subsample {
        config.t_subsample_step = step;
    }
    if let Some(len) = args.trench_len {
        config.rows.trench_len_y = len;
    }
    if let Some(padding) = args.padding {
        config.rows.padding_y = padding;
    }
    if let Some(width) = args.trench_width {
        config.columns.trench_width_x = width;
    }
    if let Some(orientation) = args.top_orientation {
        config.rows.top_orientation = orientation.into();
    }

    config.validate().context("Invalid pipeline config")?;
    Ok(config)
}

use std::collections::BTreeMap;

use console::Style;
use kymo_core::pipeline::PipelineConfig;
use kymo_core::scheduler::FieldOutcome;

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    method: Style,
    failed: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            failed: Style::new().red().bold(),
            path: Style::new().underlined(),
        }
    }
}

pub fn print_run_summary(
    config: &PipelineConfig,
    input_prefix: &str,
    output_dir: &std::path::Path,
    fovs: &[usize],
    workers: usize,
) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("Kymograph Extraction"));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(20)));
    println!();

    println!(
        "  {:<14}{}",
        s.label.apply_to("Input"),
        s.path.apply_to(format!("{input_prefix}<fov>"))
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Output"),
        s.path.apply_to(output_dir.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Fields"),
        s.value.apply_to(format!("{} ({} workers)", fovs.len(), workers))
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Channels"),
        s.method.apply_to(config.channels.join(", "))
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Time"),
        s.value.apply_to(format!(
            "chunk {}, every {} frame(s)",
            config.t_chunk, config.t_subsample_step
        ))
    );
    println!();

    let rows = &config.rows;
    println!("  {}", s.header.apply_to("Rows"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Crop"),
        s.value.apply_to(format!(
            "{} px + {} px padding",
            rows.trench_len_y, rows.padding_y
        ))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Top"),
        s.method.apply_to(format!("{:?}", rows.top_orientation))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Threshold"),
        s.value.apply_to(format!(
            "triangle x{} (p{}, {} bins)",
            rows.triangle_scaling, rows.y_percentile, rows.triangle_nbins
        ))
    );
    println!();

    let cols = &config.columns;
    println!("  {}", s.header.apply_to("Trenches"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Width"),
        s.value.apply_to(format!("{} px", cols.trench_width_x))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Threshold"),
        s.value.apply_to(format!(
            "otsu x{} (p{}, {} bins)",
            cols.otsu_scaling, cols.x_percentile, cols.otsu_nbins
        ))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Kernels"),
        s.value.apply_to(format!(
            "background {}, smoothing {}",
            cols.background_kernel_x, cols.smoothing_kernel_x
        ))
    );
    println!();
}

pub fn print_outcomes(outcomes: &BTreeMap<usize, FieldOutcome>) {
    let s = Styles::new();

    println!();
    println!("  {}", s.header.apply_to("Results"));
    for (fov, outcome) in outcomes {
        match outcome {
            FieldOutcome::Finished(layout) => println!(
                "    {:<12}{}",
                s.label.apply_to(format!("fov {fov}")),
                s.method.apply_to(format!(
                    "{} rows, {} kymographs",
                    layout.rows.len(),
                    layout.kymograph_count()
                ))
            ),
            FieldOutcome::DetectionFailure(msg)
            | FieldOutcome::LayoutError(msg)
            | FieldOutcome::ResourceError(msg) => println!(
                "    {:<12}{} {}",
                s.label.apply_to(format!("fov {fov}")),
                s.failed.apply_to(outcome.label()),
                msg
            ),
        }
    }
    println!();
}

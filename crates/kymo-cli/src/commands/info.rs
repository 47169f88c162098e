use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use kymo_core::consts::LAYOUT_MANIFEST;
use kymo_core::pipeline::read_layout;
use kymo_core::store::ChunkedStore;

#[derive(Args)]
pub struct InfoArgs {
    /// Input or output container directory
    pub container: PathBuf,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let store = ChunkedStore::open(&args.container)?;
    let keys = store.keys()?;

    println!("Container:   {}", args.container.display());
    println!("Datasets:    {}", keys.len());
    println!();
    println!("{:<28}  {:>5}  {:<24}  {:>5}  {:>10}", "Name", "Type", "Shape", "Chunk", "Size");
    println!("{}", "-".repeat(80));

    let mut total_bytes = 0usize;
    for key in &keys {
        let header = store
            .describe(key)
            .with_context(|| format!("Failed to read dataset '{key}'"))?;
        let bytes = header.element_count() * header.dtype.size();
        total_bytes += bytes;
        println!(
            "{:<28}  {:>5}  {:<24}  {:>5}  {:>7.1} MB",
            key,
            header.dtype.to_string(),
            format!("{:?}", header.shape),
            header.chunk_axis,
            bytes as f64 / (1024.0 * 1024.0)
        );
    }
    println!();
    println!(
        "Data size:   {:.1} MB",
        total_bytes as f64 / (1024.0 * 1024.0)
    );

    if args.container.join(LAYOUT_MANIFEST).is_file() {
        let layout = read_layout(&args.container)?;
        println!();
        println!("Field:       {}", layout.fov);
        println!("Timepoints:  {}", layout.timepoints);
        println!(
            "Kymograph:   {} x {} px",
            layout.trench_width, layout.crop_height
        );
        for row in &layout.rows {
            println!(
                "Row {:<8} {:?}, {} trenches, final drift {} px",
                row.row,
                row.orientation,
                row.midpoints.len(),
                row.drift.last().copied().unwrap_or(0)
            );
        }
    }

    Ok(())
}

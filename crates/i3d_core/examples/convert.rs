//! Example: Convert one file between I3D, 3DS and OBJ.
//!
//! Run with: cargo run --example convert -- ship.i3d ship.obj [options.json]

use std::env;
use std::fs;

use anyhow::{Context, Result};
use i3d_core::{convert_file, ConvertOptions, FileJob};

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 3 {
        println!("Usage: convert <input> <output> [options.json]");
        println!("\nExamples:");
        println!("  cargo run --example convert -- ship.i3d ship.obj");
        println!("  cargo run --example convert -- ship.obj ship.3ds options.json");
        return Ok(());
    }

    let options = match args.get(3) {
        Some(path) => {
            let text = fs::read_to_string(path).with_context(|| format!("reading {}", path))?;
            ConvertOptions::from_json(&text).with_context(|| format!("parsing {}", path))?
        }
        None => ConvertOptions::default(),
    };

    let job = FileJob::new(&args[1], &args[2]);
    let report = convert_file(&job, &options)
        .with_context(|| format!("converting {}", args[1]))?;

    println!("Wrote {} object(s) to {}", report.objects_written, args[2]);

    if !report.anomalies.is_empty() {
        println!("\n--- Anomalies ({}) ---", report.anomalies.len());
        for anomaly in &report.anomalies {
            println!("  {}", anomaly);
        }
    }
    for error in &report.malformed {
        println!("  malformed: {}", error);
    }
    for error in &report.object_errors {
        println!("  skipped {}", error);
    }

    Ok(())
}

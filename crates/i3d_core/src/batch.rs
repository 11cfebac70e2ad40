//! File-level conversion and the parallel batch driver.
//!
//! Each file runs its own pipeline on its own buffers; the registry is the
//! only shared state and it is read-only.

use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::convert::{
    convert, ConversionReport, ConvertError, ConvertResult, Output, Source, Target,
};
use crate::formats::obj::mtllib_name;
use crate::formats::Format;
use crate::options::ConvertOptions;

/// One input file and where its conversion goes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileJob {
    pub input: PathBuf,
    pub output: PathBuf,
}

impl FileJob {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
        }
    }
}

fn detect(path: &Path) -> ConvertResult<Format> {
    Format::from_path(path)
        .ok_or_else(|| ConvertError::UnsupportedFormat(path.display().to_string()))
}

fn file_stem(path: &Path) -> &str {
    path.file_stem().and_then(|s| s.to_str()).unwrap_or("object")
}

/// Convert one file, writing the output (and an `.mtl` sibling for OBJ).
pub fn convert_file(job: &FileJob, options: &ConvertOptions) -> ConvertResult<ConversionReport> {
    let source_format = detect(&job.input)?;
    let target_format = detect(&job.output)?;
    log::info!("Converting {} -> {}", job.input.display(), job.output.display());

    let mtl_name = format!("{}.mtl", file_stem(&job.output));
    let target = match target_format {
        Format::I3d => Target::I3d,
        Format::ThreeDs => Target::ThreeDs,
        Format::Obj => Target::Obj {
            mtl_name: &mtl_name,
        },
    };

    let report = match source_format {
        Format::Obj => {
            let obj = fs::read_to_string(&job.input)?;
            let mtl = match mtllib_name(&obj) {
                Some(name) => {
                    let path = job.input.with_file_name(&name);
                    match fs::read_to_string(&path) {
                        Ok(text) => Some(text),
                        Err(e) => {
                            log::warn!("Material library {} not readable: {}", path.display(), e);
                            None
                        }
                    }
                }
                None => None,
            };
            let source = Source::Obj {
                obj: &obj,
                mtl: mtl.as_deref(),
                fallback_name: file_stem(&job.input),
            };
            convert(&source, &target, options)?
        }
        format => {
            let bytes = fs::read(&job.input)?;
            convert(&Source::Chunked { format, bytes: &bytes }, &target, options)?
        }
    };

    match &report.output {
        Output::Chunked(bytes) => fs::write(&job.output, bytes)?,
        Output::Obj { obj, mtl } => {
            fs::write(&job.output, obj)?;
            fs::write(job.output.with_file_name(&mtl_name), mtl)?;
        }
    }

    Ok(report)
}

/// Convert every job on the rayon pool. Results are in job order.
pub fn convert_batch(
    jobs: &[FileJob],
    options: &ConvertOptions,
) -> Vec<ConvertResult<ConversionReport>> {
    let results: Vec<_> = jobs
        .par_iter()
        .map(|job| {
            let result = convert_file(job, options);
            if let Err(e) = &result {
                log::warn!("{}: {}", job.input.display(), e);
            }
            result
        })
        .collect();

    let failed = results.iter().filter(|r| r.is_err()).count();
    log::info!("Batch finished: {} converted, {} failed", jobs.len() - failed, failed);
    results
}

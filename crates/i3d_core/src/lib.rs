//! I3D Core - chunk codec and mesh topology reconciliation for I3D scenes.
//!
//! This crate provides:
//!
//! - **Chunk codec**: lossless decode/encode of nested length-prefixed chunk trees,
//!   with boundary repair and anomaly reporting
//! - **Scene extraction**: typed meshes, UV channels and materials from a chunk tree
//! - **Topology reconciliation**: seam expansion and vertex welding between decoupled,
//!   coupled and per-corner UV layouts
//! - **Formats**: I3D, 3DS and OBJ/MTL encoders and decoders
//! - **Conversion**: an in-memory pipeline plus a parallel file batch driver
//! - **Patching**: transform baking and smoothing repair on a chunk file in place
//!
//! # Example
//!
//! ```ignore
//! use i3d_core::{convert_file, ConvertOptions, FileJob};
//!
//! let job = FileJob::new("ship.i3d", "ship.obj");
//! let report = convert_file(&job, &ConvertOptions::default())?;
//! println!("{} objects written, {} anomalies",
//!     report.objects_written,
//!     report.anomalies.len());
//! ```

pub mod anomaly;
pub mod batch;
pub mod chunk;
pub mod convert;
pub mod extract;
pub mod formats;
pub mod mesh;
pub mod options;
pub mod patch;
pub mod placement;
pub mod scene;
pub mod topology;

// Re-export commonly used types
pub use anomaly::Anomaly;
pub use batch::{convert_batch, convert_file, FileJob};
pub use chunk::{decode, encode, ChunkNode, DecodedChunks, MalformedChunkError};
pub use convert::{
    convert, ConversionReport, ConvertError, ConvertResult, ObjectError, Output, Source, Target,
};
pub use extract::{extract, Extraction};
pub use formats::Format;
pub use mesh::{CornerMesh, CoupledMesh, MaterialGroup, MeshObject, UvSet};
pub use options::ConvertOptions;
pub use patch::{
    patch, patch_bytes, patch_file, MatrixAction, PatchError, PatchOptions, PatchReport,
};
pub use scene::{Material, Scene};
pub use topology::{ConversionError, ConversionResult};

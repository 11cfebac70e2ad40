//! Non-fatal structural findings.
//!
//! Anomalies never abort decoding or extraction; they are collected into
//! the conversion report and logged at `warn` level by the pipeline.

use std::fmt;

/// A structural problem detected in an input file that was worked around.
#[derive(Clone, Debug, PartialEq)]
pub enum Anomaly {
    /// A chunk's declared end ran past its parent (or the buffer); the chunk
    /// was truncated at the boundary.
    BoundaryOverflow {
        offset: usize,
        id: u16,
        declared_end: usize,
        boundary: usize,
    },

    /// A container's leading header (name, face records, ...) did not fit
    /// inside the chunk; the chunk was kept as raw bytes.
    TruncatedHeader { offset: usize, id: u16 },

    /// A structured payload ended early; the readable prefix was used.
    TruncatedPayload {
        object: String,
        id: u16,
        expected: usize,
        available: usize,
    },

    /// A second UV channel chunk reused a channel index; it was discarded.
    DuplicateChannel { object: String, channel: i32 },

    /// A UV channel chunk carried a channel index below 1; it was discarded.
    InvalidChannel { object: String, channel: i32 },

    UvFaceCountMismatch {
        object: String,
        channel: u32,
        uv_faces: usize,
        faces: usize,
    },

    /// A face referenced a missing position; the face was dropped.
    FaceIndexOutOfBounds {
        object: String,
        face: usize,
        index: u32,
        positions: usize,
    },

    /// A UV triple referenced a missing coordinate; it was replaced by (0,0,0).
    UvIndexOutOfBounds {
        object: String,
        channel: u32,
        face: usize,
        index: u32,
        coords: usize,
    },

    MaterialFaceOutOfBounds {
        object: String,
        material: String,
        face: u32,
        faces: usize,
    },

    /// A face was listed by two material groups; the later group keeps it.
    MaterialFaceConflict {
        object: String,
        face: u32,
        previous: String,
        material: String,
    },

    /// A material-link named a material that is not defined in the file.
    UnresolvedMaterial { object: String, material: String },

    SmoothingCountMismatch {
        object: String,
        masks: usize,
        faces: usize,
    },
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anomaly::BoundaryOverflow {
                offset,
                id,
                declared_end,
                boundary,
            } => write!(
                f,
                "chunk 0x{id:04X} at offset {offset} ends at {declared_end}, \
                 past its boundary {boundary}"
            ),
            Anomaly::TruncatedHeader { offset, id } => {
                write!(f, "chunk 0x{id:04X} at offset {offset} is too short for its header")
            }
            Anomaly::TruncatedPayload {
                object,
                id,
                expected,
                available,
            } => write!(
                f,
                "{object}: chunk 0x{id:04X} needs {expected} bytes, only {available} present"
            ),
            Anomaly::DuplicateChannel { object, channel } => {
                write!(f, "{object}: duplicate UV channel {channel} ignored")
            }
            Anomaly::InvalidChannel { object, channel } => {
                write!(f, "{object}: invalid UV channel index {channel} ignored")
            }
            Anomaly::UvFaceCountMismatch {
                object,
                channel,
                uv_faces,
                faces,
            } => write!(
                f,
                "{object}: UV channel {channel} covers {uv_faces} faces, mesh has {faces}"
            ),
            Anomaly::FaceIndexOutOfBounds {
                object,
                face,
                index,
                positions,
            } => write!(
                f,
                "{object}: face {face} references vertex {index} of {positions}; face dropped"
            ),
            Anomaly::UvIndexOutOfBounds {
                object,
                channel,
                face,
                index,
                coords,
            } => write!(
                f,
                "{object}: channel {channel} face {face} references UV {index} of {coords}; \
                 reset to 0"
            ),
            Anomaly::MaterialFaceOutOfBounds {
                object,
                material,
                face,
                faces,
            } => write!(
                f,
                "{object}: material {material:?} lists face {face} of {faces}; dropped"
            ),
            Anomaly::MaterialFaceConflict {
                object,
                face,
                previous,
                material,
            } => write!(
                f,
                "{object}: face {face} moved from material {previous:?} to {material:?}"
            ),
            Anomaly::UnresolvedMaterial { object, material } => {
                write!(f, "{object}: material {material:?} is not defined")
            }
            Anomaly::SmoothingCountMismatch {
                object,
                masks,
                faces,
            } => write!(f, "{object}: {masks} smoothing masks for {faces} faces"),
        }
    }
}

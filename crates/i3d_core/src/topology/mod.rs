//! Topology reconciliation between the decoupled, coupled and per-corner
//! mesh layouts.
//!
//! Every adapter takes its input by reference and builds a fresh output;
//! nothing here mutates a [`MeshObject`] in place.

mod corner;
mod expand;
mod triangulate;
mod weld;

use thiserror::Error;

use crate::mesh::MeshObject;

pub use corner::to_corner_indexed;
pub use expand::expand;
pub use triangulate::{fan_triangulate, triangulate_polygons, Triangle};
pub use weld::{coupled_view, weld_coupled, weld_corners, WELD_EPSILON};

/// Largest vertex (and face) count the 16-bit chunk formats can index.
pub const VERTEX_LIMIT: usize = 65_535;

/// Errors that abort the conversion of one object.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    #[error("{kind} index {index} out of range ({len} entries)")]
    IndexOutOfRange {
        kind: &'static str,
        index: u32,
        len: usize,
    },

    #[error("{count} vertices exceed the coupled format limit of {limit}")]
    VertexLimitExceeded { count: usize, limit: usize },

    #[error("{count} faces exceed the format limit of {limit}")]
    FaceLimitExceeded { count: usize, limit: usize },

    #[error("polygon {polygon} has only {distinct} distinct corners")]
    UnsupportedArity { polygon: usize, distinct: usize },

    #[error("payload encoding failed: {0}")]
    Encode(String),
}

impl From<binrw::Error> for ConversionError {
    fn from(err: binrw::Error) -> Self {
        ConversionError::Encode(err.to_string())
    }
}

/// Result type for reconciliation and encoding of a single object.
pub type ConversionResult<T> = Result<T, ConversionError>;

/// Pick the UV channel that feeds a single-UV target.
///
/// A requested channel is used when present. Otherwise the lowest channel
/// covering every face wins, then simply the lowest channel.
pub fn select_channel(mesh: &MeshObject, requested: Option<u32>) -> Option<u32> {
    if let Some(channel) = requested {
        if mesh.uv_channels.contains_key(&channel) {
            return Some(channel);
        }
        log::warn!(
            "{}: UV channel {} not present, falling back",
            mesh.name,
            channel
        );
        let covering = mesh
            .uv_channels
            .iter()
            .find(|(_, set)| set.face_uv_indices.len() == mesh.faces.len())
            .map(|(&c, _)| c);
        if covering.is_some() {
            return covering;
        }
    }
    mesh.uv_channels.keys().next().copied()
}

/// Look up `index` in `list`, reporting `kind` on failure.
pub(crate) fn fetch<T: Copy>(list: &[T], index: u32, kind: &'static str) -> ConversionResult<T> {
    list.get(index as usize)
        .copied()
        .ok_or(ConversionError::IndexOutOfRange {
            kind,
            index,
            len: list.len(),
        })
}

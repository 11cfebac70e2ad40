//! 3DS object encoding: coupled meshes with one UV per vertex.

use super::chunk_builder::{
    face_list, legacy_uv_chunk, matrix_chunk, material_link, object_chunk, point_array,
    smoothing_chunk,
};
use crate::chunk::ChunkNode;
use crate::mesh::CoupledMesh;
use crate::topology::{ConversionError, ConversionResult};

/// Version always written to 3DS output.
pub const VERSION: u32 = 3;

/// Encode one coupled mesh as an OBJECT chunk.
pub fn encode_object(mesh: &CoupledMesh) -> ConversionResult<ChunkNode> {
    let mut links = Vec::with_capacity(mesh.materials.len());
    for group in &mesh.materials {
        links.push(material_link(group, mesh.faces.len())?);
    }

    let mut children = vec![point_array(&mesh.positions)?];
    if let Some(matrix) = &mesh.transform {
        children.push(matrix_chunk(matrix)?);
    }
    children.push(face_list(
        &mesh.faces,
        &mesh.face_flags,
        mesh.positions.len(),
        links,
    )?);
    if let Some(masks) = &mesh.smoothing {
        children.push(smoothing_chunk(masks)?);
    }
    if let Some(uvs) = &mesh.uvs {
        if uvs.len() != mesh.positions.len() {
            return Err(ConversionError::IndexOutOfRange {
                kind: "uv",
                index: uvs.len() as u32,
                len: mesh.positions.len(),
            });
        }
        children.push(legacy_uv_chunk(uvs)?);
    }

    log::debug!(
        "Encoded 3DS object {:?}: {} vertices, {} faces",
        mesh.name,
        mesh.positions.len(),
        mesh.faces.len()
    );
    Ok(object_chunk(&mesh.name, children)?)
}

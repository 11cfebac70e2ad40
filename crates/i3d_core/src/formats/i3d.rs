//! I3D object encoding: decoupled meshes with vendor UV channels.

use super::chunk_builder::{
    face_list, matrix_chunk, material_link, object_chunk, point_array, smoothing_chunk,
    uv_channel_chunk,
};
use crate::chunk::ChunkNode;
use crate::mesh::MeshObject;
use crate::topology::ConversionResult;

/// Version written when the source does not carry one.
pub const DEFAULT_VERSION: u32 = 200;

/// Encode one mesh as an OBJECT chunk.
///
/// Material links and smoothing sit under the face list; every UV channel
/// is written in ascending channel order.
pub fn encode_object(mesh: &MeshObject) -> ConversionResult<ChunkNode> {
    let mut face_children = Vec::with_capacity(mesh.materials.len() + 1);
    for group in &mesh.materials {
        face_children.push(material_link(group, mesh.face_count())?);
    }
    if let Some(masks) = &mesh.smoothing {
        face_children.push(smoothing_chunk(masks)?);
    }

    let mut children = vec![point_array(&mesh.positions)?];
    if let Some(matrix) = &mesh.transform {
        children.push(matrix_chunk(matrix)?);
    }
    children.push(face_list(
        &mesh.faces,
        &mesh.face_flags,
        mesh.vertex_count(),
        face_children,
    )?);
    for (&channel, set) in &mesh.uv_channels {
        children.push(uv_channel_chunk(channel, set)?);
    }

    log::debug!(
        "Encoded I3D object {:?}: {} vertices, {} faces, {} channels",
        mesh.name,
        mesh.vertex_count(),
        mesh.face_count(),
        mesh.uv_channels.len()
    );
    Ok(object_chunk(&mesh.name, children)?)
}

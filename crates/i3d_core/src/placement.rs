//! Object placement: transform baking and axis remapping.
//!
//! Runs independently of topology reconciliation, on the canonical mesh.

use i3d_math::AxisRemap;

use crate::mesh::MeshObject;

/// Apply optional baking and an axis remap to a copy of `mesh`.
///
/// Baking multiplies every position by the object's matrix and drops the
/// matrix. A matrix that is kept is re-expressed in the remapped axes.
/// Mirroring remaps reverse triangle winding (positions and UV triples).
pub fn place(mesh: &MeshObject, bake: bool, remap: AxisRemap) -> MeshObject {
    let mut out = mesh.clone();

    if bake {
        if let Some(matrix) = out.transform.take() {
            for p in &mut out.positions {
                *p = matrix.transform_point3(*p);
            }
            log::debug!("{}: baked transform into {} positions", out.name, out.positions.len());
        }
    }

    if remap.is_identity() {
        return out;
    }

    for p in &mut out.positions {
        *p = remap.apply(*p);
    }
    out.transform = out.transform.map(|m| m.remapped(&remap));

    if remap.is_mirror() {
        for face in &mut out.faces {
            face.swap(1, 2);
        }
        for set in out.uv_channels.values_mut() {
            for tri in &mut set.face_uv_indices {
                tri.swap(1, 2);
            }
        }
    }

    out
}

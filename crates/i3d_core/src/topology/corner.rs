// Decoupled -> per-corner pass-through.

use i3d_math::Vec2;

use super::{fetch, ConversionResult};
use crate::mesh::{Corner, CornerMesh, MeshObject, Polygon};

/// Re-index `mesh` per corner using one UV channel.
///
/// Position and UV lists are carried over unchanged; every face becomes a
/// triangle whose corners pair its position index with the matching UV
/// index. There is no vertex ceiling on this path.
pub fn to_corner_indexed(mesh: &MeshObject, channel: Option<u32>) -> ConversionResult<CornerMesh> {
    let mut out = CornerMesh::new(mesh.name.clone());
    out.positions = mesh.positions.clone();
    out.transform = mesh.transform;

    let set = channel.and_then(|c| mesh.uv_channels.get(&c));
    if let Some(set) = set {
        out.uvs = set.coords.clone();
    }

    let face_materials = mesh.face_materials();
    let mut padded = 0usize;

    for (i, face) in mesh.faces.iter().enumerate() {
        let uv_face = match set {
            Some(set) => match set.face_uv_indices.get(i) {
                Some(tri) => {
                    for &t in tri {
                        fetch(&set.coords, t, "uv")?;
                    }
                    Some(*tri)
                }
                None => {
                    padded += 1;
                    if out.uvs.is_empty() {
                        out.uvs.push(Vec2::ZERO);
                    }
                    Some([0, 0, 0])
                }
            },
            None => None,
        };

        let mut corners = Vec::with_capacity(3);
        for k in 0..3 {
            fetch(&mesh.positions, face[k], "position")?;
            corners.push(Corner {
                position: face[k],
                uv: uv_face.map(|tri| tri[k]),
            });
        }

        let material = face_materials[i].map(|name| out.material_index(name));
        let smoothing = mesh.smoothing.as_ref().and_then(|s| s.get(i).copied());

        out.polygons.push(Polygon {
            corners,
            material,
            smoothing,
        });
    }

    if padded > 0 {
        log::warn!(
            "{}: {} faces have no UVs in the selected channel; padded with (0,0,0)",
            mesh.name,
            padded
        );
    }

    Ok(out)
}

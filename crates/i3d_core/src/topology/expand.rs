// Decoupled -> coupled expansion (seam splitting).

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use i3d_math::Vec2;

use super::{fetch, ConversionError, ConversionResult, VERTEX_LIMIT};
use crate::mesh::{CoupledMesh, MeshObject};

/// Expand `mesh` so every vertex carries exactly one UV from `channel`.
///
/// Each distinct `(position, uv)` corner pair becomes one coupled vertex,
/// numbered in first-seen order. Faces keep their order and count, so
/// material groups and smoothing carry over untouched. Faces beyond the
/// end of the channel's UV list use the degenerate `(0, 0, 0)` triple.
///
/// Without a channel the positions are copied as they are.
pub fn expand(mesh: &MeshObject, channel: Option<u32>) -> ConversionResult<CoupledMesh> {
    let mut out = CoupledMesh {
        name: mesh.name.clone(),
        faces: Vec::with_capacity(mesh.faces.len()),
        face_flags: mesh.face_flags.clone(),
        materials: mesh.materials.clone(),
        smoothing: mesh.smoothing.clone(),
        transform: mesh.transform,
        ..Default::default()
    };

    let Some(set) = channel.and_then(|c| mesh.uv_channels.get(&c)) else {
        for face in &mesh.faces {
            for &index in face {
                fetch(&mesh.positions, index, "position")?;
            }
        }
        out.positions = mesh.positions.clone();
        out.faces = mesh.faces.clone();
        check_limit(out.positions.len())?;
        return Ok(out);
    };

    let mut uvs = Vec::new();
    let mut ids: HashMap<(u32, u32), u32> = HashMap::new();
    let mut padded = 0usize;

    for (face_index, face) in mesh.faces.iter().enumerate() {
        let uv_face = match set.face_uv_indices.get(face_index) {
            Some(tri) => Some(*tri),
            None => {
                padded += 1;
                None
            }
        };

        let mut expanded = [0u32; 3];
        for k in 0..3 {
            let p = face[k];
            let t = uv_face.map_or(0, |tri| tri[k]);
            expanded[k] = match ids.entry((p, t)) {
                Entry::Occupied(e) => *e.get(),
                Entry::Vacant(e) => {
                    let position = fetch(&mesh.positions, p, "position")?;
                    let uv = match uv_face {
                        Some(_) => fetch(&set.coords, t, "uv")?,
                        None => set.coords.first().copied().unwrap_or(Vec2::ZERO),
                    };
                    let id = out.positions.len() as u32;
                    out.positions.push(position);
                    uvs.push(uv);
                    *e.insert(id)
                }
            };
        }
        out.faces.push(expanded);
    }

    if padded > 0 {
        log::warn!(
            "{}: {} faces have no UVs in the selected channel; padded with (0,0,0)",
            mesh.name,
            padded
        );
    }

    let seams = out.positions.len().saturating_sub(mesh.positions.len());
    log::debug!(
        "{}: expanded {} positions to {} coupled vertices ({} seam splits)",
        mesh.name,
        mesh.positions.len(),
        out.positions.len(),
        seams
    );

    check_limit(out.positions.len())?;
    out.uvs = Some(uvs);
    Ok(out)
}

fn check_limit(count: usize) -> ConversionResult<()> {
    if count > VERTEX_LIMIT {
        return Err(ConversionError::VertexLimitExceeded {
            count,
            limit: VERTEX_LIMIT,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{MaterialGroup, UvSet};
    use i3d_math::Vec3;

    fn quad() -> MeshObject {
        let mut mesh = MeshObject::new("quad");
        mesh.positions = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        mesh.faces = vec![[0, 1, 2], [0, 2, 3]];
        mesh.face_flags = vec![7, 7];
        mesh
    }

    #[test]
    fn test_seam_expansion_count() {
        // Position 2 is used with UV 2 by the first face and UV 4 by the second.
        let mut mesh = quad();
        mesh.uv_channels.insert(
            1,
            UvSet {
                coords: vec![
                    Vec2::new(0.0, 0.0),
                    Vec2::new(1.0, 0.0),
                    Vec2::new(1.0, 1.0),
                    Vec2::new(0.0, 1.0),
                    Vec2::new(0.5, 0.5),
                ],
                face_uv_indices: vec![[0, 1, 2], [0, 4, 3]],
            },
        );
        let mut group = MaterialGroup::new("red");
        group.face_indices.insert(1);
        mesh.materials = vec![group];

        let coupled = expand(&mesh, Some(1)).unwrap();
        assert_eq!(coupled.positions.len(), 5);
        assert_eq!(coupled.faces.len(), 2);
        assert_eq!(coupled.faces, vec![[0, 1, 2], [0, 3, 4]]);
        assert_eq!(coupled.positions[3], mesh.positions[2]);

        let uvs = coupled.uvs.unwrap();
        assert_eq!(uvs.len(), 5);
        assert_eq!(uvs[2], Vec2::new(1.0, 1.0));
        assert_eq!(uvs[3], Vec2::new(0.5, 0.5));
        assert_eq!(coupled.materials, mesh.materials);
        assert_eq!(coupled.face_flags, vec![7, 7]);
    }

    #[test]
    fn test_no_channel_copies_positions() {
        let mesh = quad();
        let coupled = expand(&mesh, None).unwrap();
        assert_eq!(coupled.positions, mesh.positions);
        assert_eq!(coupled.faces, mesh.faces);
        assert!(coupled.uvs.is_none());
    }

    #[test]
    fn test_missing_uv_faces_are_padded() {
        let mut mesh = quad();
        mesh.uv_channels.insert(
            1,
            UvSet {
                coords: vec![Vec2::new(0.25, 0.75), Vec2::new(1.0, 0.0), Vec2::new(1.0, 1.0)],
                face_uv_indices: vec![[0, 1, 2]],
            },
        );
        let coupled = expand(&mesh, Some(1)).unwrap();
        // Second face: (0,0) already exists, (2,0) and (3,0) are new.
        assert_eq!(coupled.faces[1], [0, 3, 4]);
        let uvs = coupled.uvs.unwrap();
        assert_eq!(uvs[3], Vec2::new(0.25, 0.75));
        assert_eq!(uvs[4], Vec2::new(0.25, 0.75));
    }

    #[test]
    fn test_out_of_range_uv_fails() {
        let mut mesh = quad();
        mesh.uv_channels.insert(
            1,
            UvSet {
                coords: vec![Vec2::ZERO],
                face_uv_indices: vec![[0, 0, 3], [0, 0, 0]],
            },
        );
        assert_eq!(
            expand(&mesh, Some(1)).unwrap_err(),
            ConversionError::IndexOutOfRange {
                kind: "uv",
                index: 3,
                len: 1
            }
        );
    }

    #[test]
    fn test_vertex_ceiling() {
        // A triangle strip over 70,000 positions with a single shared UV:
        // every position becomes its own coupled vertex.
        let mut mesh = MeshObject::new("big");
        mesh.positions = (0..70_000)
            .map(|i| Vec3::new(i as f32, (i % 2) as f32, 0.0))
            .collect();
        mesh.faces = (0..69_998u32).map(|f| [f, f + 1, f + 2]).collect();
        mesh.uv_channels.insert(
            1,
            UvSet {
                coords: vec![Vec2::ZERO],
                face_uv_indices: vec![[0, 0, 0]; 69_998],
            },
        );

        let err = expand(&mesh, Some(1)).unwrap_err();
        assert_eq!(
            err,
            ConversionError::VertexLimitExceeded {
                count: 70_000,
                limit: VERTEX_LIMIT
            }
        );
    }
}

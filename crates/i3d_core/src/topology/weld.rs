// Coupled / per-corner -> decoupled welding.

use std::collections::{BTreeMap, HashMap};

use i3d_math::{Vec2, Vec3};

use super::triangulate::triangulate_polygons;
use super::{fetch, ConversionResult};
use crate::mesh::{CornerMesh, CoupledMesh, MaterialGroup, MeshObject, UvSet};

/// Absolute per-component tolerance for merging positions.
pub const WELD_EPSILON: f32 = 1e-5;

/// Merges positions within [`WELD_EPSILON`] using a uniform grid whose cell
/// size equals the tolerance, so a match is always in one of 27 cells.
struct PositionWelder {
    positions: Vec<Vec3>,
    grid: HashMap<[i64; 3], Vec<u32>>,
}

impl PositionWelder {
    fn new() -> Self {
        Self {
            positions: Vec::new(),
            grid: HashMap::new(),
        }
    }

    /// Grid cell of `p`; `None` for non-finite positions, which never weld.
    /// Coordinates past the `i64` range saturate into the outermost cells.
    fn cell(p: Vec3) -> Option<[i64; 3]> {
        if !p.is_finite() {
            return None;
        }
        let c = (p / WELD_EPSILON).floor();
        Some([c.x as i64, c.y as i64, c.z as i64])
    }

    fn push(&mut self, p: Vec3) -> u32 {
        let i = self.positions.len() as u32;
        self.positions.push(p);
        i
    }

    /// Index of the first position within tolerance of `p`, adding `p` if none.
    fn insert(&mut self, p: Vec3) -> u32 {
        let Some([cx, cy, cz]) = Self::cell(p) else {
            log::debug!("non-finite position {:?} kept unwelded", p);
            return self.push(p);
        };
        let mut best: Option<u32> = None;
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let key = [
                        cx.saturating_add(dx),
                        cy.saturating_add(dy),
                        cz.saturating_add(dz),
                    ];
                    let Some(bucket) = self.grid.get(&key) else {
                        continue;
                    };
                    for &i in bucket {
                        let q = self.positions[i as usize];
                        if (q - p).abs().max_element() <= WELD_EPSILON
                            && best.map_or(true, |b| i < b)
                        {
                            best = Some(i);
                        }
                    }
                }
            }
        }
        if let Some(i) = best {
            return i;
        }
        let i = self.push(p);
        self.grid.entry([cx, cy, cz]).or_default().push(i);
        i
    }
}

/// Exact-value UV deduplication; `-0.0` and `0.0` stay distinct.
#[derive(Default)]
struct UvDedup {
    coords: Vec<Vec2>,
    lookup: HashMap<[u32; 2], u32>,
}

impl UvDedup {
    fn insert(&mut self, uv: Vec2) -> u32 {
        let key = [uv.x.to_bits(), uv.y.to_bits()];
        let next = self.coords.len() as u32;
        let id = *self.lookup.entry(key).or_insert(next);
        if id == next {
            self.coords.push(uv);
        }
        id
    }
}

/// Weld every input position, returning the welded list and the old -> new map.
fn weld_positions(positions: &[Vec3]) -> (Vec<Vec3>, Vec<u32>) {
    let mut welder = PositionWelder::new();
    let map = positions.iter().map(|&p| welder.insert(p)).collect();
    (welder.positions, map)
}

fn dedup_uvs(uvs: &[Vec2]) -> (Vec<Vec2>, Vec<u32>) {
    let mut dedup = UvDedup::default();
    let map = uvs.iter().map(|&uv| dedup.insert(uv)).collect();
    (dedup.coords, map)
}

/// View a mesh read from a coupled file as a [`CoupledMesh`], using its
/// legacy UV list. A list whose length disagrees with the positions is
/// padded with zeros or cut to fit.
pub fn coupled_view(mesh: &MeshObject) -> CoupledMesh {
    let uvs = mesh.legacy_uvs.as_ref().map(|uvs| {
        let mut uvs = uvs.clone();
        if uvs.len() != mesh.positions.len() {
            log::warn!(
                "{}: {} legacy UVs for {} vertices; resized",
                mesh.name,
                uvs.len(),
                mesh.positions.len()
            );
            uvs.resize(mesh.positions.len(), Vec2::ZERO);
        }
        uvs
    });
    CoupledMesh {
        name: mesh.name.clone(),
        positions: mesh.positions.clone(),
        uvs,
        faces: mesh.faces.clone(),
        face_flags: mesh.face_flags.clone(),
        materials: mesh.materials.clone(),
        smoothing: mesh.smoothing.clone(),
        transform: mesh.transform,
    }
}

/// Convert a coupled mesh to the decoupled layout.
///
/// Coincident positions are merged; UVs become channel 1, deduplicated by
/// exact value. Each face gets a position triple and a UV triple that may
/// now differ per corner.
pub fn weld_coupled(mesh: &CoupledMesh) -> ConversionResult<MeshObject> {
    let (positions, pos_map) = weld_positions(&mesh.positions);

    let mut faces = Vec::with_capacity(mesh.faces.len());
    for face in &mesh.faces {
        let mut out = [0u32; 3];
        for (slot, &v) in out.iter_mut().zip(face) {
            *slot = fetch(&pos_map, v, "vertex")?;
        }
        faces.push(out);
    }

    let mut uv_channels = BTreeMap::new();
    if let Some(uvs) = &mesh.uvs {
        let (coords, uv_map) = dedup_uvs(uvs);
        let mut face_uv_indices = Vec::with_capacity(mesh.faces.len());
        for face in &mesh.faces {
            let mut out = [0u32; 3];
            for (slot, &v) in out.iter_mut().zip(face) {
                *slot = fetch(&uv_map, v, "uv")?;
            }
            face_uv_indices.push(out);
        }
        uv_channels.insert(
            1,
            UvSet {
                coords,
                face_uv_indices,
            },
        );
    }

    log::debug!(
        "{}: welded {} coupled vertices into {} positions",
        mesh.name,
        mesh.positions.len(),
        positions.len()
    );

    Ok(MeshObject {
        name: mesh.name.clone(),
        positions,
        faces,
        face_flags: mesh.face_flags.clone(),
        uv_channels,
        materials: mesh.materials.clone(),
        smoothing: mesh.smoothing.clone(),
        transform: mesh.transform,
        legacy_uvs: None,
    })
}

/// Convert a per-corner polygon mesh to the decoupled layout.
///
/// Polygons are fan-triangulated first. Corners without a UV use `(0, 0)`
/// when any other corner has one; a mesh without UVs gets no channel.
pub fn weld_corners(mesh: &CornerMesh) -> ConversionResult<MeshObject> {
    let triangles = triangulate_polygons(&mesh.polygons)?;
    let (positions, pos_map) = weld_positions(&mesh.positions);
    let (mut coords, uv_map) = dedup_uvs(&mesh.uvs);

    let has_uvs = triangles
        .iter()
        .any(|t| t.corners.iter().any(|c| c.uv.is_some()));
    let mut fallback_uv: Option<u32> = None;

    let mut faces = Vec::with_capacity(triangles.len());
    let mut face_uv_indices = Vec::with_capacity(triangles.len());
    for tri in &triangles {
        let mut face = [0u32; 3];
        let mut uv_face = [0u32; 3];
        for k in 0..3 {
            let corner = tri.corners[k];
            face[k] = fetch(&pos_map, corner.position, "position")?;
            uv_face[k] = match corner.uv {
                Some(t) => fetch(&uv_map, t, "uv")?,
                None => *fallback_uv.get_or_insert_with(|| {
                    match coords.iter().position(|&c| c == Vec2::ZERO) {
                        Some(i) => i as u32,
                        None => {
                            coords.push(Vec2::ZERO);
                            coords.len() as u32 - 1
                        }
                    }
                }),
            };
        }
        faces.push(face);
        face_uv_indices.push(uv_face);
    }

    let mut uv_channels = BTreeMap::new();
    if has_uvs {
        uv_channels.insert(
            1,
            UvSet {
                coords,
                face_uv_indices,
            },
        );
    }

    let mut materials: Vec<MaterialGroup> = mesh
        .material_names
        .iter()
        .map(|name| MaterialGroup::new(name.clone()))
        .collect();
    for (face, tri) in triangles.iter().enumerate() {
        if let Some(group) = tri.material.and_then(|m| materials.get_mut(m)) {
            group.face_indices.insert(face as u32);
        }
    }
    materials.retain(|g| !g.face_indices.is_empty());

    let smoothing = triangles
        .iter()
        .any(|t| t.smoothing.is_some())
        .then(|| triangles.iter().map(|t| t.smoothing.unwrap_or(0)).collect());

    log::debug!(
        "{}: {} polygons -> {} triangles, {} positions after welding",
        mesh.name,
        mesh.polygons.len(),
        faces.len(),
        positions.len()
    );

    Ok(MeshObject {
        name: mesh.name.clone(),
        positions,
        face_flags: vec![0; faces.len()],
        faces,
        uv_channels,
        materials,
        smoothing,
        transform: mesh.transform,
        legacy_uvs: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{Corner, Polygon};
    use crate::topology::expand;

    fn quad_mesh() -> MeshObject {
        let mut mesh = MeshObject::new("quad");
        mesh.positions = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        mesh.faces = vec![[0, 1, 2], [0, 2, 3]];
        mesh.face_flags = vec![0, 0];
        mesh.uv_channels.insert(
            1,
            UvSet {
                coords: vec![
                    Vec2::new(0.0, 0.0),
                    Vec2::new(1.0, 0.0),
                    Vec2::new(1.0, 1.0),
                    Vec2::new(0.0, 1.0),
                ],
                face_uv_indices: vec![[0, 1, 2], [0, 2, 3]],
            },
        );
        mesh
    }

    #[test]
    fn test_weld_expand_inverse_without_seams() {
        let mesh = quad_mesh();
        let welded = weld_coupled(&expand(&mesh, Some(1)).unwrap()).unwrap();

        assert_eq!(welded.positions, mesh.positions);
        assert_eq!(welded.faces, mesh.faces);
        assert_eq!(welded.uv_channels[&1], mesh.uv_channels[&1]);
    }

    #[test]
    fn test_weld_merges_within_epsilon() {
        let coupled = CoupledMesh {
            name: "seam".into(),
            positions: vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
                Vec3::new(1.0 + 4e-6, 0.0, -4e-6),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(0.0, 1.0 + 5e-5, 0.0),
            ],
            uvs: Some(vec![
                Vec2::new(0.0, 0.0),
                Vec2::new(0.5, 0.0),
                Vec2::new(0.0, 1.0),
                Vec2::new(0.6, 0.0),
                Vec2::new(1.0, 1.0),
                Vec2::new(0.0, 1.0),
            ]),
            faces: vec![[0, 1, 2], [3, 4, 5]],
            ..Default::default()
        };

        let welded = weld_coupled(&coupled).unwrap();
        // Vertex 3 merges into 1; vertex 5 is outside the tolerance.
        assert_eq!(welded.positions.len(), 5);
        assert_eq!(welded.faces, vec![[0, 1, 2], [1, 3, 4]]);

        let set = &welded.uv_channels[&1];
        // UV (0,1) appears twice and collapses; (0.5,0) and (0.6,0) stay apart.
        assert_eq!(set.coords.len(), 5);
        assert_eq!(set.face_uv_indices, vec![[0, 1, 2], [3, 4, 2]]);
    }

    #[test]
    fn test_weld_across_grid_cell_boundary() {
        let mut welder = PositionWelder::new();
        let a = welder.insert(Vec3::new(-1e-7, 0.0, 0.0));
        let b = welder.insert(Vec3::new(1e-7, 0.0, 0.0));
        assert_eq!(a, b);
    }

    #[test]
    fn test_weld_huge_coordinates() {
        let far = Vec3::new(1e15, 0.0, 0.0);
        let coupled = CoupledMesh {
            name: "far".into(),
            positions: vec![far, Vec3::X, Vec3::Y, far, Vec3::new(-f32::MAX, f32::MAX, 0.0)],
            faces: vec![[0, 1, 2], [3, 1, 4]],
            ..Default::default()
        };
        let welded = weld_coupled(&coupled).unwrap();
        assert_eq!(welded.positions.len(), 4);
        assert_eq!(welded.faces, vec![[0, 1, 2], [0, 1, 3]]);
    }

    #[test]
    fn test_non_finite_positions_never_weld() {
        let inf = Vec3::new(f32::INFINITY, 0.0, 0.0);
        let nan = Vec3::new(0.0, f32::NAN, 0.0);
        let coupled = CoupledMesh {
            name: "bad".into(),
            positions: vec![inf, Vec3::X, Vec3::Y, inf, nan, Vec3::ZERO],
            faces: vec![[0, 1, 2], [3, 4, 5]],
            ..Default::default()
        };
        let welded = weld_coupled(&coupled).unwrap();
        assert_eq!(welded.positions.len(), 6);
        assert_eq!(welded.faces, vec![[0, 1, 2], [3, 4, 5]]);
    }

    #[test]
    fn test_uv_dedup_is_exact() {
        let (coords, map) = dedup_uvs(&[
            Vec2::new(0.5, 0.5),
            Vec2::new(0.5, 0.500001),
            Vec2::new(0.5, 0.5),
        ]);
        assert_eq!(coords.len(), 2);
        assert_eq!(map, vec![0, 1, 0]);
    }

    #[test]
    fn test_weld_corners_triangulates_and_groups() {
        let corner = |p: u32, t: u32| Corner {
            position: p,
            uv: Some(t),
        };
        let mesh = CornerMesh {
            name: "plane".into(),
            positions: vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
                Vec3::new(0.0, 0.0, 0.0),
            ],
            uvs: vec![
                Vec2::new(0.0, 0.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(1.0, 1.0),
                Vec2::new(0.0, 1.0),
            ],
            polygons: vec![
                Polygon {
                    corners: vec![corner(0, 0), corner(1, 1), corner(2, 2), corner(3, 3)],
                    material: Some(1),
                    smoothing: Some(1),
                },
                Polygon {
                    corners: vec![
                        corner(4, 0),
                        corner(2, 2),
                        Corner {
                            position: 3,
                            uv: None,
                        },
                    ],
                    material: None,
                    smoothing: None,
                },
            ],
            material_names: vec!["unused".into(), "red".into()],
            transform: None,
        };

        let out = weld_corners(&mesh).unwrap();
        assert_eq!(out.positions.len(), 4);
        assert_eq!(out.faces, vec![[0, 1, 2], [0, 2, 3], [0, 2, 3]]);
        assert_eq!(out.uv_channels[&1].face_uv_indices[2], [0, 2, 0]);
        assert_eq!(out.materials.len(), 1);
        assert_eq!(out.materials[0].material_name, "red");
        assert_eq!(out.materials[0].face_indices.len(), 2);
        assert_eq!(out.smoothing, Some(vec![1, 1, 0]));
    }

    #[test]
    fn test_weld_corners_without_uvs_has_no_channel() {
        let mesh = CornerMesh {
            name: "tri".into(),
            positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            polygons: vec![Polygon {
                corners: (0..3).map(|p| Corner { position: p, uv: None }).collect(),
                material: None,
                smoothing: None,
            }],
            ..Default::default()
        };
        let out = weld_corners(&mesh).unwrap();
        assert!(out.uv_channels.is_empty());
        assert!(out.smoothing.is_none());
        assert_eq!(out.faces, vec![[0, 1, 2]]);
    }

    #[test]
    fn test_coupled_view_resizes_legacy_uvs() {
        let mut mesh = quad_mesh();
        mesh.legacy_uvs = Some(vec![Vec2::ONE]);
        let view = coupled_view(&mesh);
        assert_eq!(view.uvs.as_ref().map(Vec::len), Some(4));
        assert_eq!(view.uvs.unwrap()[3], Vec2::ZERO);
    }
}

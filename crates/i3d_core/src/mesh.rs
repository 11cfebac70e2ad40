//! Mesh entities shared by every format.
//!
//! [`MeshObject`] is the canonical decoupled representation: positions and
//! each UV channel are independent lists with their own per-face index
//! triples. [`CoupledMesh`] (one UV per position) and [`CornerMesh`]
//! (per-corner index pairs, arbitrary polygons) are the two target-side
//! shapes produced and consumed by the topology reconciler.

use std::collections::{BTreeMap, BTreeSet};

use i3d_math::{Matrix3x4, Vec2, Vec3};

/// A UV coordinate set with its own index space.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UvSet {
    pub coords: Vec<Vec2>,

    /// One triple per face, indexing `coords`.
    pub face_uv_indices: Vec<[u32; 3]>,
}

/// Faces that use one named material.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MaterialGroup {
    pub material_name: String,
    pub face_indices: BTreeSet<u32>,
}

impl MaterialGroup {
    pub fn new(material_name: impl Into<String>) -> Self {
        Self {
            material_name: material_name.into(),
            face_indices: BTreeSet::new(),
        }
    }
}

/// A triangle mesh in the decoupled layout.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshObject {
    pub name: String,

    pub positions: Vec<Vec3>,

    /// Position-index triples.
    pub faces: Vec<[u32; 3]>,

    /// Per-face flag bits (edge visibility, wrap flags). Same length as `faces`.
    pub face_flags: Vec<u16>,

    /// UV channels keyed by channel index (1-based).
    pub uv_channels: BTreeMap<u32, UvSet>,

    pub materials: Vec<MaterialGroup>,

    /// Per-face smoothing group bitmasks.
    pub smoothing: Option<Vec<u32>>,

    pub transform: Option<Matrix3x4>,

    /// Coupled UV list read from a legacy UV chunk, one entry per position.
    pub legacy_uvs: Option<Vec<Vec2>>,
}

impl MeshObject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Flag bits for a face, zero when not recorded.
    pub fn face_flag(&self, face: usize) -> u16 {
        self.face_flags.get(face).copied().unwrap_or(0)
    }

    /// Material name for every face (`None` for faces outside all groups).
    pub fn face_materials(&self) -> Vec<Option<&str>> {
        let mut out = vec![None; self.faces.len()];
        for group in &self.materials {
            for &face in &group.face_indices {
                if let Some(slot) = out.get_mut(face as usize) {
                    *slot = Some(group.material_name.as_str());
                }
            }
        }
        out
    }
}

/// A mesh with exactly one UV per position and a single index triple per face.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CoupledMesh {
    pub name: String,
    pub positions: Vec<Vec3>,

    /// Same length as `positions` when present.
    pub uvs: Option<Vec<Vec2>>,

    pub faces: Vec<[u32; 3]>,
    pub face_flags: Vec<u16>,
    pub materials: Vec<MaterialGroup>,
    pub smoothing: Option<Vec<u32>>,
    pub transform: Option<Matrix3x4>,
}

/// One polygon corner: a position index and an optional UV index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Corner {
    pub position: u32,
    pub uv: Option<u32>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Polygon {
    pub corners: Vec<Corner>,

    /// Index into [`CornerMesh::material_names`].
    pub material: Option<usize>,

    pub smoothing: Option<u32>,
}

/// A polygon mesh indexed per corner, the layout of the text mesh format.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CornerMesh {
    pub name: String,
    pub positions: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub polygons: Vec<Polygon>,
    pub material_names: Vec<String>,
    pub transform: Option<Matrix3x4>,
}

impl CornerMesh {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Index of a material name, registering it on first use.
    pub fn material_index(&mut self, name: &str) -> usize {
        match self.material_names.iter().position(|n| n == name) {
            Some(i) => i,
            None => {
                self.material_names.push(name.to_string());
                self.material_names.len() - 1
            }
        }
    }
}

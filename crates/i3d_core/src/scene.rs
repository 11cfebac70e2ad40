//! Scene-level entities extracted from a chunk file.

use i3d_math::Vec3;

use crate::chunk::ChunkNode;
use crate::mesh::MeshObject;

/// A material definition.
///
/// Colours are RGB in 0-1. Percent values are stored as fractions (0-1).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Material {
    /// Material name, as referenced by material-link chunks
    pub name: String,

    pub ambient: Option<Vec3>,

    /// Diffuse colour (the only colour the text format round-trips)
    pub diffuse: Option<Vec3>,

    pub specular: Option<Vec3>,

    pub shininess: Option<f32>,

    pub transparency: Option<f32>,

    /// Diffuse texture path as stored in the file
    pub texture_path: Option<String>,

    /// Texture tiling flags
    pub tiling_flags: Option<u16>,

    pub two_sided: bool,
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// File name component of the texture path, accepting either separator.
    pub fn texture_basename(&self) -> Option<&str> {
        let path = self.texture_path.as_deref()?;
        let base = path.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(path);
        (!base.is_empty()).then_some(base)
    }
}

/// Everything the converter understands from one file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Scene {
    pub objects: Vec<MeshObject>,
    pub materials: Vec<Material>,

    /// File version from the top-level version chunk
    pub m3d_version: Option<u32>,

    /// Mesh data version from the editor block
    pub mesh_version: Option<u32>,

    /// Raw keyframer subtrees, carried but never interpreted
    pub keyframer: Vec<ChunkNode>,
}

impl Scene {
    pub fn material(&self, name: &str) -> Option<&Material> {
        self.materials.iter().find(|m| m.name == name)
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn total_face_count(&self) -> usize {
        self.objects.iter().map(MeshObject::face_count).sum()
    }
}

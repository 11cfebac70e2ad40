//! Chunk constructors shared by the two chunk-format encoders.

use binrw::BinResult;
use i3d_math::{Matrix3x4, Vec2, Vec3};

use crate::chunk::payload::{
    to_bytes, FaceRecord, MaterialLinkHeader, MatrixRecord, Point, TexCoord, UvChannelHeader,
};
use crate::chunk::{ids, ChunkNode, PayloadWriter};
use crate::mesh::{MaterialGroup, UvSet};
use crate::scene::Material;
use crate::topology::{ConversionError, ConversionResult, VERTEX_LIMIT};

fn vertex_count(count: usize) -> ConversionResult<u16> {
    u16::try_from(count).map_err(|_| ConversionError::VertexLimitExceeded {
        count,
        limit: VERTEX_LIMIT,
    })
}

fn face_count(count: usize) -> ConversionResult<u16> {
    u16::try_from(count).map_err(|_| ConversionError::FaceLimitExceeded {
        count,
        limit: VERTEX_LIMIT,
    })
}

fn index_u16(index: u32, len: usize, kind: &'static str) -> ConversionResult<u16> {
    u16::try_from(index)
        .ok()
        .filter(|&i| (i as usize) < len)
        .ok_or(ConversionError::IndexOutOfRange { kind, index, len })
}

fn cstr_chunk(id: u16, text: &str) -> BinResult<ChunkNode> {
    Ok(ChunkNode::leaf(id, PayloadWriter::new().cstr(text)?.finish()))
}

fn color24(rgb: Vec3) -> ChunkNode {
    let c = (rgb.clamp(Vec3::ZERO, Vec3::ONE) * 255.0).round();
    ChunkNode::leaf(ids::COLOR_24, vec![c.x as u8, c.y as u8, c.z as u8])
}

fn percent(id: u16, fraction: f32) -> BinResult<ChunkNode> {
    let value = (fraction.clamp(0.0, 1.0) * 100.0).round() as u16;
    Ok(ChunkNode::container(
        id,
        Vec::new(),
        vec![ChunkNode::leaf(ids::PERCENT_I, to_bytes(&value)?)],
    ))
}

/// MATERIAL container: name, colours, percents, two-sided flag, texture map.
pub fn material_chunk(material: &Material) -> BinResult<ChunkNode> {
    let mut children = vec![cstr_chunk(ids::MAT_NAME, &material.name)?];

    for (id, color) in [
        (ids::MAT_AMBIENT, material.ambient),
        (ids::MAT_DIFFUSE, material.diffuse),
        (ids::MAT_SPECULAR, material.specular),
    ] {
        if let Some(rgb) = color {
            children.push(ChunkNode::container(id, Vec::new(), vec![color24(rgb)]));
        }
    }
    if let Some(v) = material.shininess {
        children.push(percent(ids::MAT_SHININESS, v)?);
    }
    if let Some(v) = material.transparency {
        children.push(percent(ids::MAT_TRANSPARENCY, v)?);
    }
    if material.two_sided {
        children.push(ChunkNode::leaf(ids::MAT_TWO_SIDE, Vec::new()));
    }
    if let Some(path) = &material.texture_path {
        let mut map = vec![cstr_chunk(ids::MAT_MAP_FILEPATH, path)?];
        if let Some(flags) = material.tiling_flags {
            map.push(ChunkNode::leaf(ids::MAT_MAP_TILING, to_bytes(&flags)?));
        }
        children.push(ChunkNode::container(ids::MAT_TEXMAP, Vec::new(), map));
    }

    Ok(ChunkNode::container(ids::MATERIAL, Vec::new(), children))
}

pub fn point_array(positions: &[Vec3]) -> ConversionResult<ChunkNode> {
    let mut w = PayloadWriter::new();
    w.write(&vertex_count(positions.len())?)?;
    for &p in positions {
        w.write(&Point(p))?;
    }
    Ok(ChunkNode::leaf(ids::POINT_ARRAY, w.finish()))
}

pub fn material_link(group: &MaterialGroup, total_faces: usize) -> ConversionResult<ChunkNode> {
    let header = MaterialLinkHeader {
        name: group.material_name.as_str().into(),
        face_count: face_count(group.face_indices.len())?,
    };
    let mut w = PayloadWriter::new();
    w.write(&header)?;
    for &face in &group.face_indices {
        w.write(&index_u16(face, total_faces, "face")?)?;
    }
    Ok(ChunkNode::leaf(ids::OBJECT_MATERIAL, w.finish()))
}

pub fn smoothing_chunk(masks: &[u32]) -> BinResult<ChunkNode> {
    let payload = PayloadWriter::new().write_all(masks)?.finish();
    Ok(ChunkNode::leaf(ids::OBJECT_SMOOTH, payload))
}

pub fn matrix_chunk(matrix: &Matrix3x4) -> BinResult<ChunkNode> {
    Ok(ChunkNode::leaf(
        ids::OBJECT_TRANS_MATRIX,
        to_bytes(&MatrixRecord(*matrix))?,
    ))
}

/// OBJECT_FACES: face records followed by the given children.
pub fn face_list(
    faces: &[[u32; 3]],
    flags: &[u16],
    total_vertices: usize,
    children: Vec<ChunkNode>,
) -> ConversionResult<ChunkNode> {
    let mut w = PayloadWriter::new();
    w.write(&face_count(faces.len())?)?;
    for (i, face) in faces.iter().enumerate() {
        let mut vertices = [0u16; 3];
        for (slot, &v) in vertices.iter_mut().zip(face) {
            *slot = index_u16(v, total_vertices, "vertex")?;
        }
        let flags = flags.get(i).copied().unwrap_or(0);
        w.write(&FaceRecord { vertices, flags })?;
    }
    Ok(ChunkNode::container(ids::OBJECT_FACES, w.finish(), children))
}

pub fn uv_channel_chunk(channel: u32, set: &UvSet) -> ConversionResult<ChunkNode> {
    let header = UvChannelHeader {
        channel: i32::try_from(channel).unwrap_or(i32::MAX),
        coord_count: vertex_count(set.coords.len())?,
    };
    let mut w = PayloadWriter::new();
    w.write(&header)?;
    for &uv in &set.coords {
        w.write(&TexCoord(uv))?;
    }
    w.write(&face_count(set.face_uv_indices.len())?)?;
    for tri in &set.face_uv_indices {
        let mut out = [0u16; 3];
        for (slot, &t) in out.iter_mut().zip(tri) {
            *slot = index_u16(t, set.coords.len(), "uv")?;
        }
        w.write(&out)?;
    }
    Ok(ChunkNode::leaf(ids::FACE_MAP_CHANNEL, w.finish()))
}

pub fn legacy_uv_chunk(uvs: &[Vec2]) -> ConversionResult<ChunkNode> {
    let mut w = PayloadWriter::new();
    w.write(&vertex_count(uvs.len())?)?;
    for &uv in uvs {
        w.write(&TexCoord(uv))?;
    }
    Ok(ChunkNode::leaf(ids::OBJECT_UV, w.finish()))
}

/// OBJECT container with a single mesh.
pub fn object_chunk(name: &str, mesh_children: Vec<ChunkNode>) -> BinResult<ChunkNode> {
    Ok(ChunkNode::container(
        ids::OBJECT,
        PayloadWriter::new().cstr(name)?.finish(),
        vec![ChunkNode::container(ids::OBJECT_MESH, Vec::new(), mesh_children)],
    ))
}

/// Top-level layout shared by both chunk formats.
pub struct FileLayout<'a> {
    pub m3d_version: u32,
    pub mesh_version: Option<u32>,
    pub materials: &'a [Material],
    pub objects: Vec<ChunkNode>,
    pub keyframer: &'a [ChunkNode],
}

impl FileLayout<'_> {
    pub fn into_root(self) -> BinResult<ChunkNode> {
        let mut info = Vec::new();
        if let Some(v) = self.mesh_version {
            info.push(ChunkNode::leaf(ids::MESH_VERSION, to_bytes(&v)?));
        }
        for material in self.materials {
            info.push(material_chunk(material)?);
        }
        info.extend(self.objects);

        let mut children = vec![
            ChunkNode::leaf(ids::M3D_VERSION, to_bytes(&self.m3d_version)?),
            ChunkNode::container(ids::OBJECTINFO, Vec::new(), info),
        ];
        children.extend(self.keyframer.iter().cloned());
        Ok(ChunkNode::container(ids::PRIMARY, Vec::new(), children))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::PayloadReader;

    #[test]
    fn test_point_array_layout() {
        let node = point_array(&[Vec3::new(1.0, 2.0, 3.0)]).unwrap();
        assert_eq!(node.declared_length, 6 + 2 + 12);
        let mut r = PayloadReader::new(&node.payload);
        assert_eq!(r.read::<u16>(), Some(1));
        assert_eq!(r.read::<Point>(), Some(Point(Vec3::new(1.0, 2.0, 3.0))));
    }

    #[test]
    fn test_point_array_limit() {
        let points = vec![Vec3::ZERO; VERTEX_LIMIT + 1];
        assert!(matches!(
            point_array(&points),
            Err(ConversionError::VertexLimitExceeded { count: 65_536, .. })
        ));
    }

    #[test]
    fn test_face_list_rejects_bad_vertex() {
        let err = face_list(&[[0, 1, 3]], &[0], 3, Vec::new()).unwrap_err();
        assert_eq!(
            err,
            ConversionError::IndexOutOfRange {
                kind: "vertex",
                index: 3,
                len: 3
            }
        );
    }

    #[test]
    fn test_material_chunk_children() {
        let mut mat = Material::new("brick");
        mat.diffuse = Some(Vec3::new(1.0, 0.5, 0.0));
        mat.two_sided = true;
        mat.texture_path = Some("BRICK.BMP".into());

        let node = material_chunk(&mat).unwrap();
        let ids_seen: Vec<u16> = node.children.iter().map(|c| c.id).collect();
        assert_eq!(
            ids_seen,
            vec![ids::MAT_NAME, ids::MAT_DIFFUSE, ids::MAT_TWO_SIDE, ids::MAT_TEXMAP]
        );
        let color = &node.child(ids::MAT_DIFFUSE).unwrap().children[0];
        assert_eq!(color.payload, vec![255, 128, 0]);
    }

    #[test]
    fn test_material_link_payload() {
        let mut group = MaterialGroup::new("a");
        group.face_indices.extend([2, 0]);
        let node = material_link(&group, 3).unwrap();
        assert_eq!(node.payload, vec![b'a', 0, 2, 0, 0, 0, 2, 0]);
    }
}

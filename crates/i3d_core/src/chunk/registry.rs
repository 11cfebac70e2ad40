//! Static table of known chunk identifiers.
//!
//! The codec only needs to know whether a chunk nests children (and how
//! many leading bytes precede them); the extractor uses the leaf layouts
//! to pick a payload reader. The table is built once and never mutated.

use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::OnceLock;

use binrw::BinRead;

use super::{ChunkHeader, HEADER_SIZE};

/// Chunk identifiers understood by this crate.
pub mod ids {
    pub const PRIMARY: u16 = 0x4D4D;
    pub const M3D_VERSION: u16 = 0x0002;
    pub const COLOR_F32: u16 = 0x0010;
    pub const COLOR_24: u16 = 0x0011;
    pub const LIN_COLOR_24: u16 = 0x0012;
    pub const LIN_COLOR_F32: u16 = 0x0013;
    pub const PERCENT_I: u16 = 0x0030;
    pub const PERCENT_F: u16 = 0x0031;
    pub const MASTER_SCALE: u16 = 0x0100;

    pub const OBJECTINFO: u16 = 0x3D3D;
    pub const MESH_VERSION: u16 = 0x3D3E;

    pub const MATERIAL: u16 = 0xAFFF;
    pub const MAT_NAME: u16 = 0xA000;
    pub const MAT_AMBIENT: u16 = 0xA010;
    pub const MAT_DIFFUSE: u16 = 0xA020;
    pub const MAT_SPECULAR: u16 = 0xA030;
    pub const MAT_SHININESS: u16 = 0xA040;
    pub const MAT_SHIN2PCT: u16 = 0xA041;
    pub const MAT_TRANSPARENCY: u16 = 0xA050;
    pub const MAT_XPFALL: u16 = 0xA052;
    pub const MAT_REFBLUR: u16 = 0xA053;
    pub const MAT_TWO_SIDE: u16 = 0xA081;
    pub const MAT_SELF_ILPCT: u16 = 0xA084;
    pub const MAT_WIRESIZE: u16 = 0xA087;
    pub const MAT_TRANS_FALLOFF_IN: u16 = 0xA08A;
    pub const MAT_SOFTEN: u16 = 0xA08C;
    pub const MAT_SHADING: u16 = 0xA100;
    pub const MAT_TEXMAP: u16 = 0xA200;
    pub const MAT_MAP_FILEPATH: u16 = 0xA300;
    pub const MAT_MAP_TILING: u16 = 0xA351;
    pub const MAT_MAP_TEXBLUR: u16 = 0xA353;

    pub const OBJECT: u16 = 0x4000;
    pub const OBJECT_MESH: u16 = 0x4100;
    pub const POINT_ARRAY: u16 = 0x4110;
    pub const VERTEX_OPTIONS: u16 = 0x4111;
    pub const OBJECT_FACES: u16 = 0x4120;
    pub const OBJECT_MATERIAL: u16 = 0x4130;
    pub const OBJECT_UV: u16 = 0x4140;
    pub const OBJECT_SMOOTH: u16 = 0x4150;
    pub const OBJECT_TRANS_MATRIX: u16 = 0x4160;
    pub const OBJECT_TRI_VISIBLE: u16 = 0x4165;
    pub const MESH_TEXTURE_INFO: u16 = 0x4170;
    pub const MESH_COLOR: u16 = 0x4190;
    pub const FACE_MAP_CHANNEL: u16 = 0x4200;
    pub const OBJECT_LIGHT: u16 = 0x4600;
    pub const OBJECT_CAMERA: u16 = 0x4700;

    pub const VIEWPORT_LAYOUT: u16 = 0x7001;
    pub const VIEWPORT_DATA: u16 = 0x7011;
    pub const VIEWPORT_DATA_3: u16 = 0x7012;
    pub const MESH_DISPLAY: u16 = 0x7020;

    pub const KFDATA: u16 = 0xB000;
    pub const OBJECT_NODE_TAG: u16 = 0xB002;
    pub const CAMERA_NODE_TAG: u16 = 0xB003;
    pub const TARGET_NODE_TAG: u16 = 0xB004;
    pub const LIGHT_NODE_TAG: u16 = 0xB005;
    pub const L_TARGET_NODE_TAG: u16 = 0xB006;
    pub const SPOTLIGHT_NODE_TAG: u16 = 0xB007;
    pub const KFCURTIME_RANGE: u16 = 0xB008;
    pub const KFCURTIME: u16 = 0xB009;
    pub const KFHDR: u16 = 0xB00A;
    pub const NODE_HDR: u16 = 0xB010;
    pub const INSTANCE_NAME: u16 = 0xB011;
    pub const PIVOT: u16 = 0xB013;
    pub const BOUNDBOX: u16 = 0xB014;
    pub const POS_TRACK_TAG: u16 = 0xB020;
    pub const ROT_TRACK_TAG: u16 = 0xB021;
    pub const SCL_TRACK_TAG: u16 = 0xB022;
    pub const NODE_ID: u16 = 0xB030;
}

/// Bytes a container carries before its first child.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeaderLayout {
    None,
    /// Null-terminated name (object chunks).
    CString,
    Fixed(usize),
    /// `count:u16` followed by `count` 8-byte face records.
    FaceRecords,
}

impl HeaderLayout {
    /// Length of the leading header within `body`, or `None` if it does not fit.
    pub fn measure(&self, body: &[u8]) -> Option<usize> {
        match *self {
            HeaderLayout::None => Some(0),
            HeaderLayout::CString => body.iter().position(|&b| b == 0).map(|i| i + 1),
            HeaderLayout::Fixed(n) => (body.len() >= n).then_some(n),
            HeaderLayout::FaceRecords => {
                let count = u16::read_le(&mut Cursor::new(body)).ok()? as usize;
                let len = 2 + count * 8;
                (body.len() >= len).then_some(len)
            }
        }
    }
}

/// Known payload layouts of leaf chunks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LeafLayout {
    /// Known chunk whose payload is carried but not interpreted.
    Raw,
    CString,
    U16,
    U32,
    Color24,
    ColorF32,
    PercentU16,
    PercentF32,
    PointArray,
    MaterialLink,
    LegacyUv,
    Smoothing,
    TransformMatrix,
    UvChannel,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkKind {
    Container(HeaderLayout),
    Leaf(LeafLayout),
    /// Unknown identifier, payload kept as raw bytes.
    Opaque,
}

#[derive(Clone, Copy, Debug)]
pub struct ChunkInfo {
    pub id: u16,
    pub name: &'static str,
    pub kind: ChunkKind,
}

const fn container(id: u16, name: &'static str) -> ChunkInfo {
    ChunkInfo {
        id,
        name,
        kind: ChunkKind::Container(HeaderLayout::None),
    }
}

const fn leaf(id: u16, name: &'static str, layout: LeafLayout) -> ChunkInfo {
    ChunkInfo {
        id,
        name,
        kind: ChunkKind::Leaf(layout),
    }
}

use ids::*;
use LeafLayout as L;

const KNOWN_CHUNKS: &[ChunkInfo] = &[
    container(PRIMARY, "PRIMARY"),
    leaf(M3D_VERSION, "M3D_VERSION", L::U32),
    leaf(COLOR_F32, "COLOR_FLOAT", L::ColorF32),
    leaf(COLOR_24, "COLOR_24", L::Color24),
    leaf(LIN_COLOR_24, "LIN_COLOR_24", L::Color24),
    leaf(LIN_COLOR_F32, "LIN_COLOR_24F", L::ColorF32),
    leaf(PERCENT_I, "PERCENT_I", L::PercentU16),
    leaf(PERCENT_F, "PERCENT_F", L::PercentF32),
    leaf(MASTER_SCALE, "MASTER_SCALE", L::Raw),
    container(OBJECTINFO, "OBJECTINFO"),
    leaf(MESH_VERSION, "EDIT_CONFIG", L::U32),
    container(MATERIAL, "MATERIAL"),
    leaf(MAT_NAME, "MAT_NAME", L::CString),
    container(MAT_AMBIENT, "MAT_AMBIENT"),
    container(MAT_DIFFUSE, "MAT_DIFFUSE"),
    container(MAT_SPECULAR, "MAT_SPECULAR"),
    container(MAT_SHININESS, "MAT_SHININESS"),
    container(MAT_SHIN2PCT, "MAT_SHIN2PCT"),
    container(MAT_TRANSPARENCY, "MAT_TRANSPARENCY"),
    container(MAT_XPFALL, "MAT_XPFALL"),
    container(MAT_REFBLUR, "MAT_REFBLUR"),
    leaf(MAT_TWO_SIDE, "MAT_TWO_SIDE", L::Raw),
    container(MAT_SELF_ILPCT, "MAT_SELF_ILPCT"),
    leaf(MAT_WIRESIZE, "MAT_WIRESIZE", L::Raw),
    leaf(MAT_TRANS_FALLOFF_IN, "MAT_TRANS_FALLOFF_IN", L::Raw),
    leaf(MAT_SOFTEN, "MAT_SOFTEN", L::Raw),
    leaf(MAT_SHADING, "MAT_SHADING", L::U16),
    container(MAT_TEXMAP, "MAT_TEXMAP"),
    leaf(MAT_MAP_FILEPATH, "MAT_MAP_FILEPATH", L::CString),
    leaf(MAT_MAP_TILING, "MAT_MAP_TILING", L::U16),
    leaf(MAT_MAP_TEXBLUR, "MAT_MAP_TEXBLUR", L::Raw),
    ChunkInfo {
        id: OBJECT,
        name: "OBJECT",
        kind: ChunkKind::Container(HeaderLayout::CString),
    },
    container(OBJECT_MESH, "OBJECT_MESH"),
    leaf(POINT_ARRAY, "POINT_ARRAY", L::PointArray),
    leaf(VERTEX_OPTIONS, "VERTEX_OPTIONS", L::Raw),
    ChunkInfo {
        id: OBJECT_FACES,
        name: "OBJECT_FACES",
        kind: ChunkKind::Container(HeaderLayout::FaceRecords),
    },
    leaf(OBJECT_MATERIAL, "OBJECT_MATERIAL", L::MaterialLink),
    leaf(OBJECT_UV, "OBJECT_UV", L::LegacyUv),
    leaf(OBJECT_SMOOTH, "OBJECT_SMOOTH", L::Smoothing),
    leaf(OBJECT_TRANS_MATRIX, "OBJECT_TRANS_MATRIX", L::TransformMatrix),
    leaf(OBJECT_TRI_VISIBLE, "OBJECT_TRI_VISIBLE", L::Raw),
    leaf(MESH_TEXTURE_INFO, "MESH_TEXTURE_INFO", L::Raw),
    leaf(MESH_COLOR, "MESH_COLOR", L::Raw),
    leaf(FACE_MAP_CHANNEL, "FACE_MAP_CHANNEL", L::UvChannel),
    ChunkInfo {
        id: OBJECT_LIGHT,
        name: "OBJECT_LIGHT",
        kind: ChunkKind::Container(HeaderLayout::Fixed(12)),
    },
    ChunkInfo {
        id: OBJECT_CAMERA,
        name: "OBJECT_CAMERA",
        kind: ChunkKind::Container(HeaderLayout::Fixed(32)),
    },
    leaf(VIEWPORT_LAYOUT, "VIEWPORT_LAYOUT", L::Raw),
    leaf(VIEWPORT_DATA, "VIEWPORT_DATA", L::Raw),
    leaf(VIEWPORT_DATA_3, "VIEWPORT_DATA_3", L::Raw),
    leaf(MESH_DISPLAY, "MESH_DISPLAY", L::Raw),
    container(KFDATA, "KFDATA"),
    container(OBJECT_NODE_TAG, "OBJECT_NODE_TAG"),
    container(CAMERA_NODE_TAG, "CAMERA_NODE_TAG"),
    container(TARGET_NODE_TAG, "TARGET_NODE_TAG"),
    container(LIGHT_NODE_TAG, "LIGHT_NODE_TAG"),
    container(L_TARGET_NODE_TAG, "L_TARGET_NODE_TAG"),
    container(SPOTLIGHT_NODE_TAG, "SPOTLIGHT_NODE_TAG"),
    leaf(KFCURTIME_RANGE, "KFCURTIME_RANGE", L::Raw),
    leaf(KFCURTIME, "KFCURTIME", L::Raw),
    leaf(KFHDR, "KFHDR", L::Raw),
    leaf(NODE_HDR, "NODE_HDR", L::Raw),
    leaf(INSTANCE_NAME, "INSTANCE_NAME", L::CString),
    leaf(PIVOT, "PIVOT", L::Raw),
    leaf(BOUNDBOX, "BOUNDBOX", L::Raw),
    leaf(POS_TRACK_TAG, "POS_TRACK_TAG", L::Raw),
    leaf(ROT_TRACK_TAG, "ROT_TRACK_TAG", L::Raw),
    leaf(SCL_TRACK_TAG, "SCL_TRACK_TAG", L::Raw),
    leaf(NODE_ID, "NODE_ID", L::Raw),
];

struct Registry {
    by_id: HashMap<u16, ChunkInfo>,
    /// High bytes shared by known containers.
    container_families: HashSet<u8>,
}

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let by_id = KNOWN_CHUNKS.iter().map(|info| (info.id, *info)).collect();
        let container_families = KNOWN_CHUNKS
            .iter()
            .filter(|info| matches!(info.kind, ChunkKind::Container(_)))
            .map(|info| (info.id >> 8) as u8)
            .collect();
        Registry {
            by_id,
            container_families,
        }
    })
}

/// Look up a known chunk.
pub fn lookup(id: u16) -> Option<&'static ChunkInfo> {
    registry().by_id.get(&id)
}

/// Display name for a chunk id (`"UNKNOWN"` when unregistered).
pub fn chunk_name(id: u16) -> &'static str {
    lookup(id).map(|info| info.name).unwrap_or("UNKNOWN")
}

/// Classify a chunk given its payload.
///
/// Unknown ids are opaque unless they share a high byte with a known
/// container and their payload is an exact sequence of well-formed chunk
/// headers, in which case they are walked as header-less containers.
pub fn classify(id: u16, body: &[u8]) -> ChunkKind {
    if let Some(info) = lookup(id) {
        return info.kind;
    }
    let family = (id >> 8) as u8;
    if registry().container_families.contains(&family) && tiles_into_chunks(body) {
        ChunkKind::Container(HeaderLayout::None)
    } else {
        ChunkKind::Opaque
    }
}

fn tiles_into_chunks(body: &[u8]) -> bool {
    if body.is_empty() {
        return false;
    }
    let mut cursor = 0usize;
    while cursor < body.len() {
        let Ok(header) = ChunkHeader::read(&mut Cursor::new(&body[cursor..])) else {
            return false;
        };
        let len = header.length as usize;
        if len < HEADER_SIZE || len > body.len() - cursor {
            return false;
        }
        cursor += len;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_ids() {
        assert_eq!(chunk_name(ids::FACE_MAP_CHANNEL), "FACE_MAP_CHANNEL");
        assert_eq!(
            classify(ids::OBJECT, b"box\0"),
            ChunkKind::Container(HeaderLayout::CString)
        );
        assert_eq!(
            classify(ids::POINT_ARRAY, &[]),
            ChunkKind::Leaf(LeafLayout::PointArray)
        );
    }

    #[test]
    fn test_table_has_no_duplicate_ids() {
        let unique: HashSet<u16> = KNOWN_CHUNKS.iter().map(|c| c.id).collect();
        assert_eq!(unique.len(), KNOWN_CHUNKS.len());
    }

    #[test]
    fn test_unknown_id_is_opaque() {
        assert_eq!(chunk_name(0x9999), "UNKNOWN");
        assert_eq!(classify(0x9999, &[8, 0, 8, 0, 0, 0, 1, 2]), ChunkKind::Opaque);
    }

    #[test]
    fn test_unknown_id_in_container_family_with_nested_payload() {
        // 0x41F0 shares the mesh family; payload is one 8-byte child chunk.
        let body = [0x10, 0x41, 8, 0, 0, 0, 0xAA, 0xBB];
        assert_eq!(classify(0x41F0, &body), ChunkKind::Container(HeaderLayout::None));

        // Same family, payload is not a clean chunk sequence.
        assert_eq!(classify(0x41F0, &[1, 2, 3]), ChunkKind::Opaque);
        assert_eq!(classify(0x41F0, &[]), ChunkKind::Opaque);
    }

    #[test]
    fn test_header_measure() {
        assert_eq!(HeaderLayout::CString.measure(b"cube\0rest"), Some(5));
        assert_eq!(HeaderLayout::CString.measure(b"cube"), None);
        assert_eq!(HeaderLayout::Fixed(12).measure(&[0; 11]), None);
        let mut faces = vec![1, 0];
        faces.extend_from_slice(&[0; 8]);
        assert_eq!(HeaderLayout::FaceRecords.measure(&faces), Some(10));
        assert_eq!(HeaderLayout::FaceRecords.measure(&faces[..9]), None);
    }
}

//! Wire formats: the two chunk formats and the OBJ/MTL text format.

pub mod chunk_builder;
pub mod i3d;
pub mod obj;
pub mod three_ds;

use std::path::Path;

use serde::{Deserialize, Serialize};

/// The three supported wire formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Format {
    /// Chunk format with vendor UV channels (decoupled topology).
    I3d,
    /// Chunk format with one UV per vertex (coupled topology).
    ThreeDs,
    /// Text format with per-corner position/UV indices.
    Obj,
}

impl Format {
    /// Detect a format from a file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "i3d" => Some(Self::I3d),
            "3ds" => Some(Self::ThreeDs),
            "obj" => Some(Self::Obj),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::I3d => "i3d",
            Self::ThreeDs => "3ds",
            Self::Obj => "obj",
        }
    }

    /// True for the two binary chunk formats.
    pub fn is_chunked(&self) -> bool {
        !matches!(self, Self::Obj)
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::I3d => "I3D",
            Self::ThreeDs => "3DS",
            Self::Obj => "OBJ",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path() {
        assert_eq!(Format::from_path(Path::new("a/b/SHIP.I3D")), Some(Format::I3d));
        assert_eq!(Format::from_path(Path::new("ship.3ds")), Some(Format::ThreeDs));
        assert_eq!(Format::from_path(Path::new("ship.obj")), Some(Format::Obj));
        assert_eq!(Format::from_path(Path::new("ship.mtl")), None);
        assert_eq!(Format::from_path(Path::new("ship")), None);
    }

    #[test]
    fn test_extension_round_trip() {
        for format in [Format::I3d, Format::ThreeDs, Format::Obj] {
            let path = format!("x.{}", format.extension());
            assert_eq!(Format::from_path(Path::new(&path)), Some(format));
        }
        assert!(Format::I3d.is_chunked());
        assert!(!Format::Obj.is_chunked());
    }
}

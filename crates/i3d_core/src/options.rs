//! Conversion options.
//!
//! Options can be built in code or loaded from JSON; every field is
//! optional in JSON and falls back to [`ConvertOptions::default`].
//!
//! ```ignore
//! let options = ConvertOptions::from_json(
//!     r#"{ "bake_transform": true, "axis_remap": "(x, z, y)" }"#,
//! )?;
//! ```

use i3d_math::AxisRemap;
use serde::{Deserialize, Serialize};

use crate::formats::Format;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertOptions {
    /// UV channel fed to single-UV targets. `None` picks the lowest
    /// channel present. A requested channel that is missing falls back
    /// to the lowest channel covering every face, then to the lowest.
    pub channel_selector: Option<u32>,

    /// Multiply positions by the object matrix and drop the matrix.
    pub bake_transform: bool,

    /// Axis remap applied at the OBJ boundary. `None` uses the
    /// per-format-pair default (see [`ConvertOptions::remap_for`]).
    pub axis_remap: Option<AxisRemap>,

    /// Store `v' = 1 - v` when crossing the OBJ boundary.
    pub flip_v: bool,

    /// Re-emit raw keyframer subtrees into chunk outputs.
    pub keep_keyframer: bool,

    /// Name for the object imported from OBJ input.
    pub object_name: Option<String>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            channel_selector: None,
            bake_transform: false,
            axis_remap: None,
            flip_v: true,
            keep_keyframer: false,
            object_name: None,
        }
    }
}

impl ConvertOptions {
    /// Parse options from JSON text.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Serialize options as pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Remap from I3D space into OBJ space for a conversion pair.
    ///
    /// Chunk-to-chunk pairs default to identity; any pair touching OBJ
    /// defaults to `(x, -y, -z)`. Imports apply the inverse.
    pub fn remap_for(&self, source: Format, target: Format) -> AxisRemap {
        match self.axis_remap {
            Some(remap) => remap,
            None if source == Format::Obj || target == Format::Obj => AxisRemap::FLIP_YZ,
            None => AxisRemap::IDENTITY,
        }
    }
}

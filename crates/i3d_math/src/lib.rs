//! I3D math types: glam re-exports plus the object transform and the
//! axis remap applied at format boundaries.

// Re-export glam for convenience
pub use glam::*;

mod axis;
mod transform;

pub use axis::{Axis, AxisParseError, AxisRemap, SignedAxis};
pub use transform::Matrix3x4;

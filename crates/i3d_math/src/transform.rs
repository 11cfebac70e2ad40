// Object-local transform as stored in the chunk formats.
//
// The wire layout is 12 floats, three rows of four (rotation/scale in the
// first three columns, translation in the last). The raw values are kept
// as-is so an unbaked matrix is re-emitted bit for bit; the math goes
// through glam.

use glam::{Affine3A, Mat3, Vec3};

use crate::AxisRemap;

/// Row-major 3x4 transform matrix.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Matrix3x4 {
    pub rows: [[f32; 4]; 3],
}

impl Matrix3x4 {
    pub const IDENTITY: Self = Self {
        rows: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
        ],
    };

    /// Build from the 12 wire floats, in file order.
    pub fn from_floats(values: [f32; 12]) -> Self {
        let mut rows = [[0.0; 4]; 3];
        for (i, v) in values.into_iter().enumerate() {
            rows[i / 4][i % 4] = v;
        }
        Self { rows }
    }

    /// The 12 wire floats, in file order.
    pub fn to_floats(&self) -> [f32; 12] {
        let mut out = [0.0; 12];
        for (i, v) in out.iter_mut().enumerate() {
            *v = self.rows[i / 4][i % 4];
        }
        out
    }

    fn from_parts(linear: Mat3, translation: Vec3) -> Self {
        let row = |i: usize| {
            let r = linear.row(i);
            [r.x, r.y, r.z, translation[i]]
        };
        Self {
            rows: [row(0), row(1), row(2)],
        }
    }

    /// Rotation/scale part.
    pub fn linear(&self) -> Mat3 {
        let r = &self.rows;
        Mat3::from_cols(
            Vec3::new(r[0][0], r[1][0], r[2][0]),
            Vec3::new(r[0][1], r[1][1], r[2][1]),
            Vec3::new(r[0][2], r[1][2], r[2][2]),
        )
    }

    pub fn translation(&self) -> Vec3 {
        Vec3::new(self.rows[0][3], self.rows[1][3], self.rows[2][3])
    }

    pub fn to_affine(&self) -> Affine3A {
        Affine3A::from_mat3_translation(self.linear(), self.translation())
    }

    /// Apply the matrix to a point (translation included).
    pub fn transform_point3(&self, p: Vec3) -> Vec3 {
        self.to_affine().transform_point3(p)
    }

    /// Express the same transform in a remapped coordinate system
    /// (`R * M * R^T`), for use on positions that were remapped by `remap`.
    pub fn remapped(&self, remap: &AxisRemap) -> Self {
        let r = remap.to_mat3();
        Self::from_parts(r * self.linear() * r.transpose(), r * self.translation())
    }
}

impl Default for Matrix3x4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

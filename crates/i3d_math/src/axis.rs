//! Signed axis permutations.
//!
//! A remap such as `(x, -y, -z)` says which input component (and sign)
//! lands in each output slot. It is applied to every position when a mesh
//! crosses into or out of a format with a different axis convention.

use std::fmt;
use std::str::FromStr;

use glam::{Mat3, Vec3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced when parsing an axis remap from text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AxisParseError {
    #[error("expected three comma-separated axes, got {0}")]
    WrongArity(usize),

    #[error("unknown axis token: {0:?}")]
    UnknownAxis(String),

    #[error("axis {0} used more than once")]
    RepeatedAxis(Axis),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// Component index (x = 0).
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    fn from_index(i: usize) -> Self {
        match i {
            0 => Axis::X,
            1 => Axis::Y,
            _ => Axis::Z,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        };
        f.write_str(name)
    }
}

/// One output slot of a remap: the source axis and whether it is negated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SignedAxis {
    pub axis: Axis,
    pub negate: bool,
}

impl SignedAxis {
    pub const fn pos(axis: Axis) -> Self {
        Self { axis, negate: false }
    }

    pub const fn neg(axis: Axis) -> Self {
        Self { axis, negate: true }
    }
}

/// A signed permutation of the three coordinate axes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AxisRemap {
    slots: [SignedAxis; 3],
}

impl AxisRemap {
    pub const IDENTITY: Self = Self {
        slots: [
            SignedAxis::pos(Axis::X),
            SignedAxis::pos(Axis::Y),
            SignedAxis::pos(Axis::Z),
        ],
    };

    /// `(x, -y, -z)`: the conversion used between the chunk formats and
    /// the text mesh format.
    pub const FLIP_YZ: Self = Self {
        slots: [
            SignedAxis::pos(Axis::X),
            SignedAxis::neg(Axis::Y),
            SignedAxis::neg(Axis::Z),
        ],
    };

    /// Build a remap, rejecting slots that reuse an axis.
    pub fn new(slots: [SignedAxis; 3]) -> Result<Self, AxisParseError> {
        let mut seen = [false; 3];
        for slot in &slots {
            let i = slot.axis.index();
            if seen[i] {
                return Err(AxisParseError::RepeatedAxis(slot.axis));
            }
            seen[i] = true;
        }
        Ok(Self { slots })
    }

    pub fn slots(&self) -> [SignedAxis; 3] {
        self.slots
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    pub fn apply(&self, p: Vec3) -> Vec3 {
        let src = p.to_array();
        let mut out = [0.0f32; 3];
        for (o, slot) in out.iter_mut().zip(self.slots.iter()) {
            let v = src[slot.axis.index()];
            *o = if slot.negate { -v } else { v };
        }
        Vec3::from_array(out)
    }

    /// The remap as a signed permutation matrix: `to_mat3() * p` equals
    /// `apply(p)` up to the sign of zero.
    pub fn to_mat3(&self) -> Mat3 {
        let mut cols = [[0.0f32; 3]; 3];
        for (row, slot) in self.slots.iter().enumerate() {
            cols[slot.axis.index()][row] = if slot.negate { -1.0 } else { 1.0 };
        }
        Mat3::from_cols_array_2d(&cols)
    }

    /// True when the remap flips handedness (determinant -1); triangle
    /// winding must be reversed to keep faces pointing the same way.
    pub fn is_mirror(&self) -> bool {
        self.to_mat3().determinant() < 0.0
    }

    /// The remap that undoes this one.
    pub fn inverse(&self) -> Self {
        let mut slots = [SignedAxis::pos(Axis::X); 3];
        for (i, slot) in self.slots.iter().enumerate() {
            slots[slot.axis.index()] = SignedAxis {
                axis: Axis::from_index(i),
                negate: slot.negate,
            };
        }
        Self { slots }
    }
}

impl Default for AxisRemap {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl fmt::Display for AxisRemap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .slots
            .iter()
            .map(|s| format!("{}{}", if s.negate { "-" } else { "" }, s.axis))
            .collect();
        write!(f, "({})", parts.join(", "))
    }
}

impl FromStr for AxisRemap {
    type Err = AxisParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let inner = s.trim().trim_start_matches('(').trim_end_matches(')');
        let tokens: Vec<&str> = inner.split(',').map(str::trim).collect();
        if tokens.len() != 3 {
            return Err(AxisParseError::WrongArity(tokens.len()));
        }

        let mut slots = [SignedAxis::pos(Axis::X); 3];
        for (slot, token) in slots.iter_mut().zip(tokens) {
            let (negate, name) = match token.strip_prefix('-') {
                Some(rest) => (true, rest),
                None => (false, token.strip_prefix('+').unwrap_or(token)),
            };
            let axis = match name.trim().to_ascii_lowercase().as_str() {
                "x" => Axis::X,
                "y" => Axis::Y,
                "z" => Axis::Z,
                _ => return Err(AxisParseError::UnknownAxis(token.to_string())),
            };
            *slot = SignedAxis { axis, negate };
        }
        Self::new(slots)
    }
}

impl TryFrom<String> for AxisRemap {
    type Error = AxisParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AxisRemap> for String {
    fn from(remap: AxisRemap) -> Self {
        remap.to_string()
    }
}

// Fan triangulation of per-corner polygons.

use std::collections::HashSet;

use super::{ConversionError, ConversionResult};
use crate::mesh::{Corner, Polygon};

/// A triangle cut from a source polygon; material and smoothing carry over.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Triangle {
    pub corners: [Corner; 3],
    pub material: Option<usize>,
    pub smoothing: Option<u32>,
}

/// Fan-triangulate around the first vertex:
/// `[v0, v1, .., vn-1]` -> `(v0,v1,v2), (v0,v2,v3), ...`.
pub fn fan_triangulate<T: Copy>(polygon: &[T]) -> Vec<[T; 3]> {
    if polygon.len() < 3 {
        return Vec::new();
    }
    (1..polygon.len() - 1)
        .map(|i| [polygon[0], polygon[i], polygon[i + 1]])
        .collect()
}

/// Triangulate every polygon.
///
/// A polygon touching fewer than three distinct positions cannot produce
/// a triangle and fails the whole mesh.
pub fn triangulate_polygons(polygons: &[Polygon]) -> ConversionResult<Vec<Triangle>> {
    let mut triangles = Vec::with_capacity(polygons.len());
    for (i, polygon) in polygons.iter().enumerate() {
        let distinct = polygon
            .corners
            .iter()
            .map(|c| c.position)
            .collect::<HashSet<_>>()
            .len();
        if distinct < 3 {
            return Err(ConversionError::UnsupportedArity {
                polygon: i,
                distinct,
            });
        }
        triangles.extend(fan_triangulate(&polygon.corners).into_iter().map(|corners| Triangle {
            corners,
            material: polygon.material,
            smoothing: polygon.smoothing,
        }));
    }
    Ok(triangles)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn polygon(indices: &[u32]) -> Polygon {
        Polygon {
            corners: indices
                .iter()
                .map(|&i| Corner {
                    position: i,
                    uv: Some(i),
                })
                .collect(),
            material: Some(0),
            smoothing: Some(2),
        }
    }

    #[test]
    fn test_fan_triangulate_triangle() {
        assert_eq!(fan_triangulate(&[0, 1, 2]), vec![[0, 1, 2]]);
    }

    #[test]
    fn test_fan_triangulate_quad() {
        assert_eq!(fan_triangulate(&[0, 1, 2, 3]), vec![[0, 1, 2], [0, 2, 3]]);
    }

    #[test]
    fn test_fan_triangulate_pentagon() {
        assert_eq!(
            fan_triangulate(&[5, 6, 7, 8, 9]),
            vec![[5, 6, 7], [5, 7, 8], [5, 8, 9]]
        );
        assert!(fan_triangulate(&[0, 1]).is_empty());
    }

    #[test]
    fn test_triangles_inherit_polygon_attributes() {
        let tris = triangulate_polygons(&[polygon(&[0, 1, 2, 3])]).unwrap();
        assert_eq!(tris.len(), 2);
        assert_eq!(tris[1].corners.map(|c| c.position), [0, 2, 3]);
        assert_eq!(tris[1].corners.map(|c| c.uv), [Some(0), Some(2), Some(3)]);
        assert!(tris.iter().all(|t| t.material == Some(0) && t.smoothing == Some(2)));
    }

    #[test]
    fn test_degenerate_polygon_rejected() {
        let err = triangulate_polygons(&[polygon(&[0, 1, 2]), polygon(&[4, 4, 5])]).unwrap_err();
        assert_eq!(
            err,
            ConversionError::UnsupportedArity {
                polygon: 1,
                distinct: 2
            }
        );
    }
}

//! Convex Hull Shape
//!
//! Runtime format for hull data produced by
//! [`compute_hull`](crate::convex_hull_builder::compute_hull): hull points
//! packed into wide bundles for vectorized support queries, face vertex
//! references as bundle/lane pairs, and one bounding plane per face.

use glam::Vec3;

use crate::convex_hull_builder::HullData;
use crate::error::PhysicsError;
use crate::math::{bundle_indices, Vec3Wide};

/// Reference to one hull point inside the bundled point array.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BundleVertexIndex {
    /// Bundle holding the point
    pub bundle_index: u16,
    /// Lane of the point within its bundle
    pub inner_index: u16,
}

/// Supporting plane of one hull face: `normal · p == offset` on the face,
/// `normal · p < offset` strictly inside.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HullBoundingPlane {
    /// Outward unit normal
    pub normal: Vec3,
    /// `normal` dotted with any point of the face
    pub offset: f32,
}

/// A convex hull in runtime format.
#[derive(Clone, Debug, Default)]
pub struct ConvexHull {
    /// Hull points in wide bundles; trailing lanes repeat the last point so
    /// they never win a support query.
    pub points: Vec<Vec3Wide>,
    /// Number of real points in `points`
    pub point_count: usize,
    /// Start of each face's slice of `face_vertex_indices`
    pub face_start_indices: Vec<usize>,
    /// Concatenated per-face vertex references
    pub face_vertex_indices: Vec<BundleVertexIndex>,
    /// One bounding plane per face
    pub bounding_planes: Vec<HullBoundingPlane>,
}

impl ConvexHull {
    /// Number of faces.
    #[inline]
    #[must_use]
    pub fn face_count(&self) -> usize {
        self.face_start_indices.len()
    }

    /// Read one hull point.
    #[inline]
    #[must_use]
    pub fn point(&self, index: BundleVertexIndex) -> Vec3 {
        self.points[index.bundle_index as usize].read_slot(index.inner_index as usize)
    }

    /// Vertex references of face `face_index`.
    #[must_use]
    pub fn face(&self, face_index: usize) -> &[BundleVertexIndex] {
        let start = self.face_start_indices[face_index];
        let end = self
            .face_start_indices
            .get(face_index + 1)
            .copied()
            .unwrap_or(self.face_vertex_indices.len());
        &self.face_vertex_indices[start..end]
    }
}

/// Process hull data into a runtime usable convex hull shape.
///
/// `points` is the *original* point cloud the hull data was computed from.
/// Fails when the hull data carries no faces, a face with fewer than three
/// vertices, or a face whose winding normal has no length.
pub fn process_hull(points: &[Vec3], hull_data: &HullData) -> Result<ConvexHull, PhysicsError> {
    if hull_data.face_count() == 0 {
        return Err(PhysicsError::DegenerateGeometry {
            context: "hull without faces",
        });
    }

    let hull_points: Vec<Vec3> = hull_data
        .original_vertex_mapping
        .iter()
        .map(|&original| points[original])
        .collect();
    let last_point = *hull_points.last().expect("faces imply vertices");
    let bundles = Vec3Wide::pack(&hull_points, last_point);

    let mut hull = ConvexHull {
        points: bundles,
        point_count: hull_points.len(),
        face_start_indices: hull_data.face_start_indices.clone(),
        face_vertex_indices: Vec::with_capacity(hull_data.face_vertex_indices.len()),
        bounding_planes: Vec::with_capacity(hull_data.face_count()),
    };
    for &hull_index in &hull_data.face_vertex_indices {
        let (bundle_index, inner_index) = bundle_indices(hull_index);
        debug_assert!(bundle_index <= u16::MAX as usize);
        hull.face_vertex_indices.push(BundleVertexIndex {
            bundle_index: bundle_index as u16,
            inner_index: inner_index as u16,
        });
    }

    for face_index in 0..hull_data.face_count() {
        let face = hull_data.face(face_index);
        if face.len() < 3 {
            return Err(PhysicsError::DegenerateGeometry {
                context: "hull face with fewer than three vertices",
            });
        }
        // Area-weighted winding normal around the face pivot.
        let pivot = hull_points[face[0]];
        let mut face_normal = Vec3::ZERO;
        let mut previous_offset = hull_points[face[1]] - pivot;
        for &vertex in &face[2..] {
            let offset = hull_points[vertex] - pivot;
            face_normal += previous_offset.cross(offset);
            previous_offset = offset;
        }
        let Some(normal) = face_normal.try_normalize() else {
            return Err(PhysicsError::DegenerateGeometry {
                context: "hull face normal",
            });
        };
        hull.bounding_planes.push(HullBoundingPlane {
            normal,
            offset: pivot.dot(normal),
        });
    }
    Ok(hull)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convex_hull_builder::compute_hull;
    use crate::math::SIMD_WIDTH;

    fn cube_corners() -> Vec<Vec3> {
        let mut corners = Vec::new();
        for x in [-1.0f32, 1.0] {
            for y in [-1.0f32, 1.0] {
                for z in [-1.0f32, 1.0] {
                    corners.push(Vec3::new(x, y, z));
                }
            }
        }
        corners
    }

    #[test]
    fn test_process_cube() {
        let points = cube_corners();
        let hull_data = compute_hull(&points);
        let hull = process_hull(&points, &hull_data).expect("cube is not degenerate");

        assert_eq!(hull.point_count, 8);
        assert_eq!(hull.face_count(), 6);
        assert_eq!(hull.points.len(), 8usize.div_ceil(SIMD_WIDTH));

        for face_index in 0..hull.face_count() {
            let plane = hull.bounding_planes[face_index];
            // Cube face planes are axis-aligned at distance 1.
            let axis_alignment = plane.normal.abs().max_element();
            assert!(
                (axis_alignment - 1.0).abs() < 1e-5,
                "normal {:?} not axis aligned",
                plane.normal
            );
            assert!((plane.offset - 1.0).abs() < 1e-5);
            // Every face vertex lies on the plane.
            for &vertex in hull.face(face_index) {
                let distance = hull.point(vertex).dot(plane.normal) - plane.offset;
                assert!(distance.abs() < 1e-5);
            }
        }
    }

    #[test]
    fn test_bounding_planes_contain_all_points() {
        let points = cube_corners();
        let hull_data = compute_hull(&points);
        let hull = process_hull(&points, &hull_data).expect("cube is not degenerate");
        for plane in &hull.bounding_planes {
            for point_index in 0..hull.point_count {
                let (bundle, lane) = crate::math::bundle_indices(point_index);
                let point = hull.points[bundle].read_slot(lane);
                assert!(point.dot(plane.normal) <= plane.offset + 1e-5);
            }
        }
    }

    #[test]
    fn test_padding_repeats_last_point() {
        let points = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
        ];
        let hull_data = compute_hull(&points);
        let hull = process_hull(&points, &hull_data).expect("tetrahedron is fine");
        let last_real = hull.points[(hull.point_count - 1) / SIMD_WIDTH]
            .read_slot((hull.point_count - 1) % SIMD_WIDTH);
        for lane in hull.point_count..hull.points.len() * SIMD_WIDTH {
            let (bundle, inner) = crate::math::bundle_indices(lane);
            assert_eq!(hull.points[bundle].read_slot(inner), last_real);
        }
    }

    #[test]
    fn test_faceless_hull_is_rejected() {
        let points = [Vec3::ZERO, Vec3::X];
        let hull_data = compute_hull(&points);
        let result = process_hull(&points, &hull_data);
        assert!(matches!(
            result,
            Err(PhysicsError::DegenerateGeometry {
                context: "hull without faces",
            })
        ));
    }
}

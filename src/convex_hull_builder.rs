//! Convex Hull Builder
//!
//! Builds an indexed face-vertex hull from an arbitrary point cloud using a
//! gift-wrapping traversal over edges.
//!
//! # Algorithm
//!
//! 1. Pack the points into wide bundles; find the point farthest from the
//!    centroid as the initial vertex.
//! 2. Rotate a plane around a source edge to find the *extreme face*: the
//!    point minimizing the counterclockwise angle with the search basis,
//!    plus every point coplanar with it within a size-scaled epsilon.
//! 3. Reduce each raw face in 2D: gift-wrap its projected points, drop
//!    interior and redundant collinear vertices, and globally disallow them
//!    so later faces cannot resurrect them.
//! 4. Push each boundary edge of an accepted face onto a work stack; pop
//!    until every edge is shared by two faces. Faces that turn out
//!    coplanar are merged; faces holding disallowed vertices are deleted
//!    and their edges re-exposed.
//! 5. Compact the surviving vertices into a dense index space.
//!
//! # Output
//!
//! A [`HullData`]: face start offsets, face vertex lists with consistent
//! outward (counterclockwise from outside) winding, and the mapping from
//! hull vertices back to the source point cloud. Feed it to
//! [`process_hull`](crate::convex_hull::process_hull) to build the runtime
//! shape.

use core::hash::{Hash, Hasher};
use std::collections::hash_map::Entry;

use glam::{Vec2, Vec3};
use rustc_hash::FxHashMap;

use crate::math::{bundle_indices, Vec3Wide, SIMD_WIDTH};

/// Points closer to a face plane than `initial distance * this` count as
/// part of the face.
const PLANE_EPSILON_SCALE: f32 = 1e-6;

/// Cosine threshold above which two face normals are considered the same
/// plane and the faces merged.
const NORMAL_COPLANARITY_EPSILON: f32 = 1.0 - 1e-6;

// ============================================================================
// Output data
// ============================================================================

/// Raw data representing a convex hull. Not yet in runtime format; see
/// [`process_hull`](crate::convex_hull::process_hull).
#[derive(Clone, Debug, Default)]
pub struct HullData {
    /// Mapping of points on the convex hull back to the original point set.
    pub original_vertex_mapping: Vec<usize>,
    /// Start of each face's vertex list in `face_vertex_indices`.
    pub face_start_indices: Vec<usize>,
    /// Concatenated face vertex lists, indexing into
    /// `original_vertex_mapping`.
    pub face_vertex_indices: Vec<usize>,
}

impl HullData {
    /// Number of faces.
    #[inline]
    #[must_use]
    pub fn face_count(&self) -> usize {
        self.face_start_indices.len()
    }

    /// Hull vertex indices of face `face_index`.
    #[must_use]
    pub fn face(&self, face_index: usize) -> &[usize] {
        let start = self.face_start_indices[face_index];
        let end = self
            .face_start_indices
            .get(face_index + 1)
            .copied()
            .unwrap_or(self.face_vertex_indices.len());
        &self.face_vertex_indices[start..end]
    }
}

/// Unordered edge key: `(a, b)` and `(b, a)` are the same edge.
#[derive(Clone, Copy, Debug)]
pub struct EdgeEndpoints {
    /// First endpoint, as an index into the source point cloud
    pub a: usize,
    /// Second endpoint
    pub b: usize,
}

impl PartialEq for EdgeEndpoints {
    fn eq(&self, other: &Self) -> bool {
        (self.a == other.a && self.b == other.b) || (self.a == other.b && self.b == other.a)
    }
}

impl Eq for EdgeEndpoints {}

impl Hash for EdgeEndpoints {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Symmetric, so both orientations land in the same bucket.
        (self.a ^ self.b).hash(state);
    }
}

// ============================================================================
// Internal working state
// ============================================================================

struct EarlyFace {
    vertex_indices: Vec<usize>,
    normal: Vec3,
}

struct EdgeToTest {
    endpoints: EdgeEndpoints,
    face_normal: Vec3,
}

// ============================================================================
// Extreme-face kernel
// ============================================================================

/// Rotate a plane around the source edge and find the face it lands on:
/// the allowed point minimizing the counterclockwise angle with `basis_y`,
/// then every point within `plane_epsilon` of that point's plane.
///
/// Candidates are ranked by `sign(y) * y^2 / (x^2 + y^2)`; the fractions
/// are compared cross-multiplied so no lane ever divides. Projections are
/// cached in the `projected_on_*` buffers for the coplanarity pass.
///
/// Returns the face normal; the raw face vertex list is appended to
/// `face_vertex_indices`.
#[allow(clippy::too_many_arguments)]
fn find_extreme_face(
    basis_x: Vec3,
    basis_y: Vec3,
    basis_origin: Vec3,
    source_edge: EdgeEndpoints,
    point_bundles: &[Vec3Wide],
    point_count: usize,
    allow_vertex: &[bool],
    projected_on_x: &mut [[f32; SIMD_WIDTH]],
    projected_on_y: &mut [[f32; SIMD_WIDTH]],
    plane_epsilon: f32,
    face_vertex_indices: &mut Vec<usize>,
) -> Vec3 {
    debug_assert!(face_vertex_indices.is_empty());
    let wide_basis_x = Vec3Wide::splat(basis_x);
    let wide_basis_y = Vec3Wide::splat(basis_y);
    let wide_origin = Vec3Wide::splat(basis_origin);

    let mut best_numerator = 0.0f32;
    let mut best_denominator = 0.0f32;
    let mut best_index = None;
    for (bundle_index, bundle) in point_bundles.iter().enumerate() {
        let offset = bundle.sub(&wide_origin);
        let dots_x = offset.dot(&wide_basis_x);
        let dots_y = offset.dot(&wide_basis_y);
        for lane in 0..SIMD_WIDTH {
            let x = dots_x[lane].max(0.0);
            let y = dots_y[lane];
            projected_on_x[bundle_index][lane] = x;
            projected_on_y[bundle_index][lane] = y;

            let index = bundle_index * SIMD_WIDTH + lane;
            if index >= point_count
                || !allow_vertex[index]
                || index == source_edge.a
                || index == source_edge.b
                || (x <= plane_epsilon && y <= plane_epsilon)
            {
                continue;
            }
            let numerator = y * y.abs();
            let denominator = x * x + y * y;
            let better = match best_index {
                None => true,
                Some(_) => numerator * best_denominator > best_numerator * denominator,
            };
            if better {
                best_numerator = numerator;
                best_denominator = denominator;
                best_index = Some(index);
            }
        }
    }

    let Some(winner) = best_index else {
        return basis_y;
    };
    let (winner_bundle, winner_lane) = bundle_indices(winner);
    let winner_x = projected_on_x[winner_bundle][winner_lane];
    let winner_y = projected_on_y[winner_bundle][winner_lane];
    let projected_plane_normal = Vec2::new(-winner_y, winner_x)
        .try_normalize()
        .unwrap_or(Vec2::X);
    let face_normal = basis_x * projected_plane_normal.x + basis_y * projected_plane_normal.y;

    // Gather everything within the plane slab, the winner's edge endpoints
    // included.
    for bundle_index in 0..point_bundles.len() {
        let base = bundle_index * SIMD_WIDTH;
        let lanes = SIMD_WIDTH.min(point_count.saturating_sub(base));
        for lane in 0..lanes {
            let index = base + lane;
            if !allow_vertex[index] {
                continue;
            }
            let distance = projected_on_x[bundle_index][lane] * projected_plane_normal.x
                + projected_on_y[bundle_index][lane] * projected_plane_normal.y;
            if distance > -plane_epsilon {
                face_vertex_indices.push(index);
            }
        }
    }
    face_normal
}

// ============================================================================
// 2D face reduction
// ============================================================================

/// Next hull vertex of the projected face: the candidate making the
/// smallest turn from the incoming edge direction. Among near-collinear
/// candidates the farthest wins, suppressing redundant boundary vertices.
fn find_next_index_for_face_hull(
    start: Vec2,
    previous_edge_direction: Vec2,
    plane_epsilon: f32,
    face_points: &[Vec2],
) -> Option<usize> {
    let basis_x = Vec2::new(-previous_edge_direction.y, previous_edge_direction.x);
    let basis_y = previous_edge_direction;
    let mut best_numerator = 0.0f32;
    let mut best_denominator = 0.0f32;
    let mut best: Option<(usize, Vec2)> = None;
    for (index, &candidate) in face_points.iter().enumerate() {
        let to_candidate = candidate - start;
        let x = to_candidate.dot(basis_x);
        let y = to_candidate.dot(basis_y);
        let denominator = x * x + y * y;
        if denominator <= plane_epsilon * plane_epsilon {
            continue;
        }
        let numerator = y * y.abs();
        let better = match best {
            None => true,
            Some(_) => numerator * best_denominator > best_numerator * denominator,
        };
        if better {
            best_numerator = numerator;
            best_denominator = denominator;
            best = Some((index, Vec2::new(x, y)));
        }
    }
    let (best_index, projection) = best?;

    let projected_direction = projection.try_normalize().unwrap_or(Vec2::X);
    let edge_direction = basis_x * projected_direction.x + basis_y * projected_direction.y;
    let outward = Vec2::new(edge_direction.y, -edge_direction.x);
    let mut distance = 0.0f32;
    let mut most_distant = None;
    for (index, &candidate) in face_points.iter().enumerate() {
        let to_candidate = candidate - start;
        if to_candidate.dot(outward) > -plane_epsilon {
            let along_edge = to_candidate.dot(edge_direction);
            if along_edge > distance {
                distance = along_edge;
                most_distant = Some(index);
            }
        }
    }
    most_distant.or(Some(best_index))
}

/// Reduce a raw coplanar vertex set to the face's boundary polygon, wound
/// counterclockwise against `face_normal`. Vertices that do not survive
/// are globally disallowed through `allow_vertex`.
#[allow(clippy::too_many_arguments)]
fn reduce_face(
    face_vertex_indices: &mut Vec<usize>,
    face_normal: Vec3,
    points: &[Vec3],
    plane_epsilon: f32,
    face_points: &mut Vec<Vec2>,
    allow_vertex: &mut [bool],
    reduced_indices: &mut Vec<usize>,
) {
    debug_assert!(face_points.is_empty() && reduced_indices.is_empty());
    face_vertex_indices.retain(|&vertex| allow_vertex[vertex]);

    if face_vertex_indices.len() <= 3 {
        reduced_indices.extend_from_slice(face_vertex_indices);
        if reduced_indices.len() == 3 {
            let a = points[reduced_indices[0]];
            let ab = points[reduced_indices[1]] - a;
            let ac = points[reduced_indices[2]] - a;
            let uncalibrated_normal = ab.cross(ac);
            if uncalibrated_normal.length_squared() < 1e-14 {
                // Degenerate sliver; collapse it to whatever has extent.
                if ab.length_squared() > 1e-14 {
                    allow_vertex[reduced_indices[2]] = false;
                    reduced_indices.swap_remove(2);
                } else if ac.length_squared() > 1e-14 {
                    allow_vertex[reduced_indices[1]] = false;
                    reduced_indices.swap_remove(1);
                } else {
                    allow_vertex[reduced_indices[1]] = false;
                    allow_vertex[reduced_indices[2]] = false;
                    reduced_indices.truncate(1);
                }
            } else if face_normal.dot(uncalibrated_normal) < 0.0 {
                reduced_indices.swap(0, 1);
            }
        }
        return;
    }

    let (basis_x, basis_y) = crate::math::build_orthonormal_basis(face_normal);
    let mut centroid = Vec2::ZERO;
    for &vertex in face_vertex_indices.iter() {
        let source = points[vertex];
        let face_point = Vec2::new(basis_x.dot(source), basis_y.dot(source));
        face_points.push(face_point);
        centroid += face_point;
    }
    centroid /= face_vertex_indices.len() as f32;

    let mut greatest_distance_squared = -1.0f32;
    let mut initial_index = 0;
    for (index, face_point) in face_points.iter().enumerate() {
        let distance_squared = (*face_point - centroid).length_squared();
        if distance_squared > greatest_distance_squared {
            greatest_distance_squared = distance_squared;
            initial_index = index;
        }
    }
    if greatest_distance_squared < 1e-14 {
        // The projected face has no extent at all.
        for &vertex in face_vertex_indices.iter() {
            allow_vertex[vertex] = false;
        }
        return;
    }

    let initial_offset_direction =
        (face_points[initial_index] - centroid) / greatest_distance_squared.sqrt();
    let mut previous_edge_direction =
        Vec2::new(-initial_offset_direction.y, initial_offset_direction.x);
    reduced_indices.push(face_vertex_indices[initial_index]);

    let mut previous_end_index = initial_index;
    for _ in 0..face_points.len() {
        let next = find_next_index_for_face_hull(
            face_points[previous_end_index],
            previous_edge_direction,
            plane_epsilon,
            face_points,
        );
        match next {
            Some(next_index)
                if !reduced_indices.contains(&face_vertex_indices[next_index]) =>
            {
                reduced_indices.push(face_vertex_indices[next_index]);
                previous_edge_direction = (face_points[next_index]
                    - face_points[previous_end_index])
                    .try_normalize()
                    .unwrap_or(Vec2::X);
                previous_end_index = next_index;
            }
            other => {
                // Closed the loop. If it closed onto a mid-polygon vertex,
                // the prefix before the cycle start is not on the boundary.
                if let Some(next_index) = other {
                    let target = face_vertex_indices[next_index];
                    if let Some(cycle_start) =
                        reduced_indices.iter().position(|&vertex| vertex == target)
                    {
                        if cycle_start > 0 {
                            reduced_indices.drain(..cycle_start);
                        }
                    }
                }
                break;
            }
        }
    }

    for &vertex in face_vertex_indices.iter() {
        if !reduced_indices.contains(&vertex) {
            allow_vertex[vertex] = false;
        }
    }
}

// ============================================================================
// Edge bookkeeping
// ============================================================================

/// Register a new face's boundary edges: first sighting inserts the edge
/// with count 1 and queues it for testing, later sightings only bump the
/// count.
fn add_face_edges_to_test_list(
    reduced_face_indices: &[usize],
    edges_to_test: &mut Vec<EdgeToTest>,
    edge_face_counts: &mut FxHashMap<EdgeEndpoints, usize>,
    face_normal: Vec3,
) {
    let mut previous_index = reduced_face_indices[reduced_face_indices.len() - 1];
    for &index in reduced_face_indices {
        let endpoints = EdgeEndpoints {
            a: previous_index,
            b: index,
        };
        previous_index = index;
        match edge_face_counts.entry(endpoints) {
            Entry::Occupied(mut entry) => *entry.get_mut() += 1,
            Entry::Vacant(entry) => {
                entry.insert(1);
                edges_to_test.push(EdgeToTest {
                    endpoints,
                    face_normal,
                });
            }
        }
    }
}

// ============================================================================
// Hull construction
// ============================================================================

/// Compute the convex hull of a point cloud.
///
/// Degenerate inputs degrade gracefully: an empty input produces an empty
/// hull, one or two points produce a faceless hull with an identity
/// mapping, three points produce a single arbitrarily wound face, and a
/// cloud whose extent is below 1e-7 collapses to a single vertex.
#[must_use]
pub fn compute_hull(points: &[Vec3]) -> HullData {
    if points.is_empty() {
        return HullData::default();
    }
    if points.len() <= 3 {
        let mut hull_data = HullData {
            original_vertex_mapping: (0..points.len()).collect(),
            ..HullData::default()
        };
        if points.len() == 3 {
            hull_data.face_start_indices.push(0);
            hull_data.face_vertex_indices.extend_from_slice(&[0, 1, 2]);
        }
        return hull_data;
    }

    // AoSoA prep; trailing lanes hold the centroid so they lose every
    // extremum comparison.
    let mut centroid = Vec3::ZERO;
    for point in points {
        centroid += *point;
    }
    centroid /= points.len() as f32;
    let point_bundles = Vec3Wide::pack(points, centroid);

    // Initial vertex: farthest from the centroid.
    let centroid_bundle = Vec3Wide::splat(centroid);
    let mut best_distance_squared = -1.0f32;
    let mut initial_index = 0;
    for (bundle_index, bundle) in point_bundles.iter().enumerate() {
        let distances = bundle.distance_squared(&centroid_bundle);
        let base = bundle_index * SIMD_WIDTH;
        let lanes = SIMD_WIDTH.min(points.len() - base);
        for lane in 0..lanes {
            if distances[lane] > best_distance_squared {
                best_distance_squared = distances[lane];
                initial_index = base + lane;
            }
        }
    }
    let initial_distance = best_distance_squared.max(0.0).sqrt();
    if initial_distance < 1e-7 {
        // Every point coincides.
        return HullData {
            original_vertex_mapping: vec![0],
            ..HullData::default()
        };
    }
    let initial_vertex = points[initial_index];
    let plane_epsilon = initial_distance * PLANE_EPSILON_SCALE;

    let initial_basis_x = (centroid - initial_vertex) / initial_distance;
    let initial_basis_y = crate::math::find_perpendicular(initial_basis_x);

    let mut projected_on_x = vec![[0.0f32; SIMD_WIDTH]; point_bundles.len()];
    let mut projected_on_y = vec![[0.0f32; SIMD_WIDTH]; point_bundles.len()];
    let mut allow_vertex = vec![true; points.len()];
    let mut raw_face_vertex_indices = Vec::with_capacity(points.len());
    let mut face_points = Vec::with_capacity(points.len());
    let mut reduced_face_indices = Vec::with_capacity(points.len());

    let initial_face_normal = find_extreme_face(
        initial_basis_x,
        initial_basis_y,
        initial_vertex,
        EdgeEndpoints {
            a: initial_index,
            b: initial_index,
        },
        &point_bundles,
        points.len(),
        &allow_vertex,
        &mut projected_on_x,
        &mut projected_on_y,
        plane_epsilon,
        &mut raw_face_vertex_indices,
    );

    reduce_face(
        &mut raw_face_vertex_indices,
        initial_face_normal,
        points,
        plane_epsilon,
        &mut face_points,
        &mut allow_vertex,
        &mut reduced_face_indices,
    );

    let mut faces: Vec<EarlyFace> = Vec::new();
    let mut edges_to_test: Vec<EdgeToTest> = Vec::new();
    let mut edge_face_counts: FxHashMap<EdgeEndpoints, usize> = FxHashMap::default();

    if reduced_face_indices.len() >= 3 {
        add_face_edges_to_test_list(
            &reduced_face_indices,
            &mut edges_to_test,
            &mut edge_face_counts,
            initial_face_normal,
        );
        faces.push(EarlyFace {
            vertex_indices: reduced_face_indices.clone(),
            normal: initial_face_normal,
        });
    } else if reduced_face_indices.len() == 2 {
        // The initial search found only an edge. Orient it so expansion
        // sweeps away from the degenerate face plane, then wrap from there.
        let mut endpoints = EdgeEndpoints {
            a: reduced_face_indices[0],
            b: reduced_face_indices[1],
        };
        let edge_offset = points[endpoints.b] - points[endpoints.a];
        let basis_y = edge_offset.cross(initial_face_normal);
        let basis_x = edge_offset.cross(basis_y);
        if basis_x.dot(initial_face_normal) > 0.0 {
            core::mem::swap(&mut endpoints.a, &mut endpoints.b);
        }
        edges_to_test.push(EdgeToTest {
            endpoints,
            face_normal: initial_face_normal,
        });
    } else {
        // Nothing with extent survived the initial reduction.
        return HullData {
            original_vertex_mapping: vec![initial_index],
            ..HullData::default()
        };
    }

    while let Some(edge_to_test) = edges_to_test.pop() {
        if edge_face_counts
            .get(&edge_to_test.endpoints)
            .is_some_and(|&count| count >= 2)
        {
            continue;
        }

        let edge_start = points[edge_to_test.endpoints.a];
        let edge_offset = points[edge_to_test.endpoints.b] - edge_start;
        let basis_y = edge_offset.cross(edge_to_test.face_normal);
        let basis_x = edge_offset.cross(basis_y);
        let (Some(basis_x), Some(basis_y)) = (basis_x.try_normalize(), basis_y.try_normalize())
        else {
            continue;
        };

        raw_face_vertex_indices.clear();
        let face_normal = find_extreme_face(
            basis_x,
            basis_y,
            edge_start,
            edge_to_test.endpoints,
            &point_bundles,
            points.len(),
            &allow_vertex,
            &mut projected_on_x,
            &mut projected_on_y,
            plane_epsilon,
            &mut raw_face_vertex_indices,
        );

        reduced_face_indices.clear();
        face_points.clear();
        reduce_face(
            &mut raw_face_vertex_indices,
            face_normal,
            points,
            plane_epsilon,
            &mut face_points,
            &mut allow_vertex,
            &mut reduced_face_indices,
        );
        if reduced_face_indices.len() < 3 {
            continue;
        }

        // A rediscovered or numerically coplanar face is merged instead of
        // duplicated.
        let mut merged_face = false;
        for face in &mut faces {
            if face.normal.dot(face_normal) > NORMAL_COPLANARITY_EPSILON {
                raw_face_vertex_indices.clear();
                raw_face_vertex_indices.extend_from_slice(&reduced_face_indices);
                for &vertex in &face.vertex_indices {
                    if allow_vertex[vertex] && !reduced_face_indices.contains(&vertex) {
                        raw_face_vertex_indices.push(vertex);
                    }
                }
                face.vertex_indices.clear();
                face_points.clear();
                reduce_face(
                    &mut raw_face_vertex_indices,
                    face_normal,
                    points,
                    plane_epsilon,
                    &mut face_points,
                    &mut allow_vertex,
                    &mut face.vertex_indices,
                );
                merged_face = true;
                break;
            }
        }

        if !merged_face {
            add_face_edges_to_test_list(
                &reduced_face_indices,
                &mut edges_to_test,
                &mut edge_face_counts,
                face_normal,
            );
            faces.push(EarlyFace {
                vertex_indices: reduced_face_indices.clone(),
                normal: face_normal,
            });
        }

        // Reductions may have disallowed vertices that earlier faces still
        // use; those faces are stale. Delete them and re-expose their edges
        // so the hole gets wrapped again.
        let mut write_index = 0;
        for read_index in 0..faces.len() {
            let deleted = faces[read_index]
                .vertex_indices
                .iter()
                .any(|&vertex| !allow_vertex[vertex]);
            if deleted {
                let face = &faces[read_index];
                let count = face.vertex_indices.len();
                for vertex_slot in 0..count {
                    let previous_slot = if vertex_slot == 0 {
                        count - 1
                    } else {
                        vertex_slot - 1
                    };
                    // Flipped endpoints: the replacement face winds the
                    // other way across the hole boundary.
                    let endpoints = EdgeEndpoints {
                        a: face.vertex_indices[vertex_slot],
                        b: face.vertex_indices[previous_slot],
                    };
                    if edge_face_counts.contains_key(&endpoints)
                        && allow_vertex[endpoints.a]
                        && allow_vertex[endpoints.b]
                    {
                        edges_to_test.push(EdgeToTest {
                            endpoints,
                            face_normal: face.normal,
                        });
                    }
                }
            } else {
                faces.swap(write_index, read_index);
                write_index += 1;
            }
        }
        faces.truncate(write_index);
    }

    // Remap the surviving vertices into a dense hull index space, faces in
    // acceptance order.
    let mut hull_data = HullData::default();
    let mut original_to_hull: Vec<Option<usize>> = vec![None; points.len()];
    for face in &faces {
        hull_data
            .face_start_indices
            .push(hull_data.face_vertex_indices.len());
        for &original in &face.vertex_indices {
            let hull_index = match original_to_hull[original] {
                Some(hull_index) => hull_index,
                None => {
                    let hull_index = hull_data.original_vertex_mapping.len();
                    original_to_hull[original] = Some(hull_index);
                    hull_data.original_vertex_mapping.push(original);
                    hull_index
                }
            };
            hull_data.face_vertex_indices.push(hull_index);
        }
    }
    hull_data
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

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

    /// Every directed edge must appear exactly once reversed in another face.
    fn assert_manifold(hull_data: &HullData) {
        let mut directed: Vec<(usize, usize)> = Vec::new();
        for face_index in 0..hull_data.face_count() {
            let face = hull_data.face(face_index);
            assert!(face.len() >= 3, "face {face_index} too small");
            for i in 0..face.len() {
                let j = (i + 1) % face.len();
                directed.push((face[i], face[j]));
            }
        }
        for &(a, b) in &directed {
            let forward = directed.iter().filter(|&&e| e == (a, b)).count();
            let reverse = directed.iter().filter(|&&e| e == (b, a)).count();
            assert_eq!(forward, 1, "directed edge ({a},{b}) duplicated");
            assert_eq!(reverse, 1, "directed edge ({a},{b}) unmatched");
        }
    }

    #[test]
    fn test_empty_input() {
        let hull_data = compute_hull(&[]);
        assert!(hull_data.original_vertex_mapping.is_empty());
        assert_eq!(hull_data.face_count(), 0);
    }

    #[test]
    fn test_one_and_two_points() {
        let hull_data = compute_hull(&[Vec3::ONE]);
        assert_eq!(hull_data.original_vertex_mapping, vec![0]);
        assert_eq!(hull_data.face_count(), 0);

        let hull_data = compute_hull(&[Vec3::ZERO, Vec3::X]);
        assert_eq!(hull_data.original_vertex_mapping, vec![0, 1]);
        assert_eq!(hull_data.face_count(), 0);
    }

    #[test]
    fn test_three_points_single_face() {
        let hull_data = compute_hull(&[Vec3::ZERO, Vec3::X, Vec3::Y]);
        assert_eq!(hull_data.original_vertex_mapping, vec![0, 1, 2]);
        assert_eq!(hull_data.face_count(), 1);
        assert_eq!(hull_data.face(0), &[0, 1, 2]);
    }

    #[test]
    fn test_coincident_cloud_collapses() {
        let points = vec![Vec3::splat(2.0); 6];
        let hull_data = compute_hull(&points);
        assert_eq!(hull_data.original_vertex_mapping.len(), 1);
        assert_eq!(hull_data.face_count(), 0);
    }

    #[test]
    fn test_tetrahedron() {
        let points = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
        ];
        let hull_data = compute_hull(&points);
        assert_eq!(hull_data.original_vertex_mapping.len(), 4);
        assert_eq!(hull_data.face_count(), 4);
        assert_manifold(&hull_data);
    }

    #[test]
    fn test_cube_topology() {
        let hull_data = compute_hull(&cube_corners());
        assert_eq!(hull_data.original_vertex_mapping.len(), 8);
        assert_eq!(hull_data.face_count(), 6, "cube has six faces");
        for face_index in 0..6 {
            assert_eq!(hull_data.face(face_index).len(), 4, "cube faces are quads");
        }
        assert_manifold(&hull_data);
    }

    #[test]
    fn test_interior_point_excluded() {
        let mut points = cube_corners();
        points.push(Vec3::ZERO);
        let hull_data = compute_hull(&points);
        assert_eq!(hull_data.original_vertex_mapping.len(), 8);
        assert!(!hull_data.original_vertex_mapping.contains(&8));
    }

    #[test]
    fn test_coplanar_quad_with_center() {
        let points = [
            Vec3::new(-1.0, 0.0, -1.0),
            Vec3::new(1.0, 0.0, -1.0),
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::new(-1.0, 0.0, 1.0),
            Vec3::new(0.0, 0.0, 0.0),
        ];
        let hull_data = compute_hull(&points);
        assert!(
            !hull_data.original_vertex_mapping.contains(&4),
            "interior midpoint must be reduced away"
        );
        assert_eq!(hull_data.original_vertex_mapping.len(), 4);
        assert!(hull_data.face_count() >= 1);
        let face = hull_data.face(0);
        assert_eq!(face.len(), 4);
    }

    #[test]
    fn test_duplicate_points_do_not_change_topology() {
        let base = cube_corners();
        let base_hull = compute_hull(&base);

        let mut duplicated = base.clone();
        duplicated.push(base[0]);
        duplicated.push(base[5]);
        let duplicated_hull = compute_hull(&duplicated);

        assert_eq!(
            duplicated_hull.original_vertex_mapping.len(),
            base_hull.original_vertex_mapping.len()
        );
        assert_eq!(duplicated_hull.face_count(), base_hull.face_count());
        let face_sizes = |hull_data: &HullData| {
            let mut sizes: Vec<usize> = (0..hull_data.face_count())
                .map(|face| hull_data.face(face).len())
                .collect();
            sizes.sort_unstable();
            sizes
        };
        assert_eq!(face_sizes(&duplicated_hull), face_sizes(&base_hull));
    }

    #[test]
    fn test_edge_endpoints_unordered_equality() {
        let forward = EdgeEndpoints { a: 3, b: 9 };
        let backward = EdgeEndpoints { a: 9, b: 3 };
        assert_eq!(forward, backward);
        let mut counts: FxHashMap<EdgeEndpoints, usize> = FxHashMap::default();
        counts.insert(forward, 1);
        assert_eq!(counts.get(&backward), Some(&1));
    }
}

#![no_main]
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use soma_physics::compute_hull;

#[derive(Debug, Arbitrary)]
struct HullInput {
    /// Quantized point coordinates; duplicates and coplanar sets are
    /// exactly the degenerate cases the builder must survive.
    points: Vec<(i8, i8, i8)>,
}

// Fuzz hull construction with arbitrary (often degenerate) point clouds.
// Must never panic, and the output must always be structurally valid.
fuzz_target!(|input: HullInput| {
    let count = input.points.len().min(64);
    let points: Vec<glam::Vec3> = input.points[..count]
        .iter()
        .map(|&(x, y, z)| glam::Vec3::new(x as f32, y as f32, z as f32))
        .collect();

    let hull_data = compute_hull(&points);

    for &original in &hull_data.original_vertex_mapping {
        assert!(original < points.len().max(1));
    }
    for face_index in 0..hull_data.face_count() {
        let face = hull_data.face(face_index);
        assert!(face.len() >= 3, "face {face_index} has too few vertices");
        for &vertex in face {
            assert!(vertex < hull_data.original_vertex_mapping.len());
        }
    }
});

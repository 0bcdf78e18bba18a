//! Tests for ribbon vectorization in batch and incremental mode.

use crate::geom::{
    RibbonOptions, StrokePoint, StrokeVectorizerState, Tolerance, Vec2, vectorize_points,
};

fn point(x: f64, y: f64) -> StrokePoint {
    StrokePoint::new(x, y, 0.5, 0.0)
}

#[test]
fn collinear_stroke_has_two_vertices_per_point_plus_caps() {
    let options = RibbonOptions::new(0.05);
    for count in [2usize, 3, 7, 20] {
        let points: Vec<_> = (0..count).map(|i| point(i as f64 * 0.1, i as f64 * 0.05)).collect();
        let mesh = vectorize_points(&points, &options);
        assert_eq!(mesh.join_vertex_count, 0);
        assert_eq!(mesh.vertex_count(), 2 * count + mesh.cap_vertex_count);
        assert_eq!(mesh.to_flat().len(), 2 * mesh.vertex_count());
    }
}

#[test]
fn duplicate_samples_are_coalesced() {
    let options = RibbonOptions::new(0.05);
    let clean = vectorize_points(&[point(0.0, 0.0), point(1.0, 0.0)], &options);
    let noisy = vectorize_points(&[point(0.0, 0.0), point(0.0, 0.0), point(1.0, 0.0)], &options);
    assert_eq!(clean, noisy);
}

#[test]
fn batch_matches_settled_incremental_shape() {
    let options = RibbonOptions::new(0.1);
    let points = [point(0.0, 0.0), point(1.0, 0.0), point(1.0, 1.0)];

    let batch = vectorize_points(&points, &options);

    let mut state = StrokeVectorizerState::new(options);
    for sample in points {
        state.push(sample);
        state.settle();
        assert!(state.is_settled());
    }
    let incremental = state.mesh();
    let settled_path: Vec<Vec2> = state.path().iter().map(|p| p.position()).collect();
    let batch_path: Vec<Vec2> = points.iter().map(StrokePoint::position).collect();

    let a = batch.bounds.expect("batch bounds");
    let b = incremental.bounds.expect("incremental bounds");
    let r = options.radius(0.5);
    let tol = Tolerance::LOOSE;
    for (x, y) in [(a.x_min, b.x_min), (a.x_max, b.x_max), (a.y_min, b.y_min), (a.y_max, b.y_max)] {
        assert!(tol.approx_eq_f64(x, y), "batch {a:?} vs incremental {b:?}");
    }
    assert!(tol.approx_eq_f64(a.x_min, -r));
    assert!(tol.approx_eq_f64(a.x_max, 1.0 + r));
    assert!(tol.approx_eq_f64(a.y_min, -r));
    assert!(tol.approx_eq_f64(a.y_max, 1.0 + r));

    // Each ribbon stays inside the other.
    for v in &incremental.vertices {
        let d = distance_to_polyline(Vec2::from_array(*v), &batch_path);
        assert!(d <= r + 1e-6, "incremental vertex {v:?} is {d} from the batch centerline");
    }
    for v in &batch.vertices {
        let d = distance_to_polyline(Vec2::from_array(*v), &settled_path);
        assert!(d <= r + 1e-6, "batch vertex {v:?} is {d} from the settled centerline");
    }

    // Away from the corner, where the live pen rounds it over its first step,
    // the incremental outline lies on the batch offset curve.
    let corner = Vec2::new(1.0, 0.0);
    let mut on_curve = 0;
    for v in &incremental.vertices {
        let v = Vec2::from_array(*v);
        if v.distance_to(corner) <= 0.25 + 2.0 * r {
            continue;
        }
        let d = distance_to_polyline(v, &batch_path);
        assert!(tol.approx_eq_f64(d, r), "vertex {v:?} is {d} from the centerline, expected {r}");
        on_curve += 1;
    }
    assert!(on_curve > 20, "only {on_curve} vertices checked");
}

fn distance_to_polyline(v: Vec2, polyline: &[Vec2]) -> f64 {
    polyline
        .windows(2)
        .map(|w| crate::geom::point_segment_distance(v, w[0], w[1]))
        .fold(f64::INFINITY, f64::min)
}

#[test]
fn ribbon_vertices_stay_within_radius_of_centerline() {
    let options = RibbonOptions::new(0.2);
    let points: Vec<_> = (0..30)
        .map(|i| {
            let a = i as f64 * 0.2;
            StrokePoint::new(a.cos(), a.sin(), (i % 5) as f64 / 4.0, i as f64)
        })
        .collect();
    let mesh = vectorize_points(&points, &options);
    let max_r = options.radius(1.0);
    for v in &mesh.vertices {
        let v = Vec2::from_array(*v);
        let nearest = points
            .windows(2)
            .map(|w| crate::geom::point_segment_distance(v, w[0].position(), w[1].position()))
            .fold(f64::INFINITY, f64::min);
        assert!(nearest <= max_r + 1e-9, "vertex {v:?} is {nearest} from the stroke");
    }
}

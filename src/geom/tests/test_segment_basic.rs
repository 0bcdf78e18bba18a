//! Tests for the bottleneck polyline segmenter.

use crate::geom::{
    PolylineSegmenterState, SegmenterOptions, StrokePoint, Tolerance, detect_shape, segment_polyline,
};

fn l_shape() -> Vec<StrokePoint> {
    let mut points: Vec<StrokePoint> = (0..=10)
        .map(|i| StrokePoint::new(i as f64 / 10.0, 0.0, 0.5, i as f64))
        .collect();
    points.extend((1..=10).map(|i| StrokePoint::new(1.0, i as f64 / 10.0, 0.5, 10.0 + i as f64)));
    points
}

#[test]
fn l_shape_needs_exactly_two_segments() {
    let points = l_shape();
    let seg = segment_polyline(&points, &SegmenterOptions::default(), Tolerance::default());

    assert_eq!(seg.layer_costs.len(), 2);
    assert!(seg.layer_costs[0] > 0.01, "one segment cost {}", seg.layer_costs[0]);
    assert!(seg.layer_costs[1] < 1e-12, "two segment cost {}", seg.layer_costs[1]);
    assert_eq!(seg.corners, vec![0, 10, 20]);
    assert_eq!(seg.segment_count(), 2);
    assert!(!seg.closed);
}

#[test]
fn bottleneck_is_not_hidden_by_good_segments() {
    // A long straight run with a short tail bent upwards at sample 39.
    let mut points: Vec<StrokePoint> = (0..40)
        .map(|i| StrokePoint::new(i as f64 / 40.0, 0.0, 0.5, i as f64))
        .collect();
    let corner_x = 39.0 / 40.0;
    points.push(StrokePoint::new(corner_x, 0.3, 0.5, 40.0));
    points.push(StrokePoint::new(corner_x, 0.6, 0.5, 41.0));

    let mut state = PolylineSegmenterState::new(&points, Tolerance::default());
    let one = state.push_layer();
    let two = state.push_layer();
    assert!(one > 0.002);
    assert!(two < 1e-9);
    assert_eq!(state.corners(2), vec![0, 39, 41]);
}

#[test]
fn endpoints_keep_first_and_last_timestamps() {
    let points = l_shape();
    let seg = segment_polyline(&points, &SegmenterOptions::default().timestamp_scale(3.0), Tolerance::default());
    assert_eq!(seg.points[0].timestamp, 0.0);
    assert_eq!(seg.points[2].timestamp, 20.0);
    assert_eq!(seg.points[1].timestamp, 30.0);
}

#[test]
fn closed_loop_is_snapped_shut() {
    let mut points = vec![
        StrokePoint::new(0.0, 0.0, 0.5, 0.0),
        StrokePoint::new(1.0, 0.0, 0.5, 1.0),
        StrokePoint::new(1.0, 1.0, 0.5, 2.0),
        StrokePoint::new(0.0, 1.0, 0.5, 3.0),
    ];
    points.push(StrokePoint::new(0.02, 0.03, 0.5, 4.0));

    let seg = segment_polyline(&points, &SegmenterOptions::default(), Tolerance::default());
    assert!(seg.closed);
    let (first, last) = (seg.points[0], seg.points[seg.points.len() - 1]);
    assert_eq!(first.position(), last.position());
    assert!((first.x - 0.01).abs() < 1e-12 && (first.y - 0.015).abs() < 1e-12);
    assert_eq!(first.timestamp, 0.0);
    assert_eq!(last.timestamp, 4.0);
}

/// Out to an apex and back, ending 0.05 from the start.
fn sliver_loop() -> Vec<StrokePoint> {
    let mut points: Vec<StrokePoint> = (0..=20)
        .map(|i| {
            let t = i as f64 / 20.0;
            StrokePoint::new(0.5 * t, t, 0.5, i as f64)
        })
        .collect();
    points.extend((1..=20).map(|i| {
        let t = i as f64 / 20.0;
        StrokePoint::new(0.5 - 0.45 * t, 1.0 - t, 0.5, 20.0 + i as f64)
    }));
    points
}

#[test]
fn two_sided_loop_is_snapped_shut() {
    let points = sliver_loop();
    let seg = segment_polyline(&points, &SegmenterOptions::default(), Tolerance::default());
    assert_eq!(seg.corners, vec![0, 20, 40]);
    assert!(seg.closed);
    assert_eq!(seg.points.len(), 3);
    assert_eq!(seg.points[0].position(), seg.points[2].position());
    assert_eq!(seg.points[0].timestamp, 0.0);
    assert_eq!(seg.points[2].timestamp, 40.0);

    let shape = detect_shape(&points);
    let out = shape.points();
    assert_eq!(out.len(), 3);
    assert_eq!(out[0].position(), out[out.len() - 1].position());
}

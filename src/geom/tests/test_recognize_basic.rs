//! End-to-end tests for shape recognition.

use crate::geom::{
    InkToolbox, RecognizedShape, ShapeKind, StrokePoint, Vec2, corner_angle, detect_shape,
    detect_shape_with_context, mean_pressure,
};

fn stroke(coords: &[(f64, f64)]) -> Vec<StrokePoint> {
    coords
        .iter()
        .enumerate()
        .map(|(i, &(x, y))| StrokePoint::new(x, y, 0.2 + 0.1 * (i % 3) as f64, 100.0 + 10.0 * i as f64))
        .collect()
}

fn assert_boundaries(input: &[StrokePoint], output: &[StrokePoint]) {
    assert_eq!(output[0].timestamp, input[0].timestamp);
    assert_eq!(output[output.len() - 1].timestamp, input[input.len() - 1].timestamp);
    let pressure = mean_pressure(input);
    for p in output {
        assert!((p.pressure - pressure).abs() < 1e-9);
    }
}

#[test]
fn single_point_is_returned_unchanged() {
    let p = StrokePoint::new(0.25, -0.5, 0.7, 3.0);
    let shape = detect_shape(&[p]);
    assert_eq!(shape.points(), &[p]);
    assert_eq!(shape.kind(), ShapeKind::Dot);
}

#[test]
fn skewed_quadrilateral_becomes_exact_rectangle() {
    let input = stroke(&[(0.0, 0.0), (2.0, 0.05), (2.03, 1.0), (0.02, 0.98), (0.0, 0.0)]);
    let shape = detect_shape(&input);
    assert_eq!(shape.kind(), ShapeKind::Rectangle);

    let out = shape.points();
    assert_eq!(out.len(), 5);
    assert_eq!(out[0].position(), out[4].position());

    let (a, b, c, d) = (out[0].position(), out[1].position(), out[2].position(), out[3].position());
    assert!((a.distance_to(c) - b.distance_to(d)).abs() < 1e-9);
    assert!(a.midpoint(c).distance_to(b.midpoint(d)) < 1e-9);
    assert!((a.y - b.y).abs() < 1e-9, "rectangle should be axis aligned");
    assert_boundaries(&input, out);
}

#[test]
fn near_right_triangle_is_snapped_to_ninety_degrees() {
    let input = stroke(&[(0.0, 0.0), (2.0, 0.0), (-0.03, 1.5), (0.0, 0.0)]);
    let opposite = input[1].distance_to(&input[2]);

    let shape = detect_shape(&input);
    assert_eq!(shape.kind(), ShapeKind::RightTriangle);
    let out = shape.points();
    assert_eq!(out.len(), 4);
    assert_eq!(out[0].position(), out[3].position());

    let angle = corner_angle(out[2].position(), out[0].position(), out[1].position());
    assert!((angle.to_degrees() - 90.0).abs() < 1e-6, "angle {}", angle.to_degrees());
    assert!((out[1].distance_to(&out[2]) - opposite).abs() < 1e-12);
    assert_boundaries(&input, out);
}

#[test]
fn acute_triangle_is_left_as_triangle() {
    let h = 3.0_f64.sqrt() / 2.0;
    let input = stroke(&[(0.0, 0.0), (1.0, 0.0), (0.5, h), (0.0, 0.0)]);
    let shape = detect_shape(&input);
    assert_eq!(shape.kind(), ShapeKind::Triangle);
    for (a, b) in input.iter().zip(shape.points()) {
        assert_eq!(a.position(), b.position());
    }
}

#[test]
fn perfect_rectangle_is_a_fixed_point() {
    let input = stroke(&[(0.0, 0.0), (2.0, 0.0), (2.0, 1.0), (0.0, 1.0), (0.0, 0.0)]);
    let first = detect_shape(&input);
    assert_eq!(first.kind(), ShapeKind::Rectangle);
    for (a, b) in input.iter().zip(first.points()) {
        assert!(a.distance_to(b) < 1e-9);
    }

    let second = detect_shape(first.points());
    for (a, b) in first.points().iter().zip(second.points()) {
        assert!(a.distance_to(b) < 1e-9);
    }
}

#[test]
fn closed_polygon_output_is_exactly_closed() {
    let mut coords: Vec<(f64, f64)> = (0..6)
        .map(|i| {
            let a = std::f64::consts::TAU * i as f64 / 6.0;
            (a.cos(), a.sin())
        })
        .collect();
    coords.push((1.0 + 1e-4, -1e-4));
    let input = stroke(&coords);

    let shape = detect_shape(&input);
    assert_eq!(shape.kind(), ShapeKind::Polyline);
    let out = shape.points();
    assert_eq!(out.len(), 7);
    assert_eq!(out[0].position(), out[6].position());
    assert_boundaries(&input, out);
}

#[test]
fn drawn_circle_becomes_resampled_circle() {
    let coords: Vec<(f64, f64)> = (0..=80)
        .map(|i| {
            let a = std::f64::consts::TAU * i as f64 / 80.0;
            (0.5 + 0.2 * a.cos(), 0.5 + 0.2 * a.sin())
        })
        .collect();
    let input = stroke(&coords);

    let mut toolbox = InkToolbox::new();
    toolbox.recognition = toolbox.recognition.output_point_budget(32);
    let (shape, diagnostics) = detect_shape_with_context(&input, &mut toolbox);
    assert!(diagnostics.vertex_count >= 10, "{diagnostics:?}");

    let RecognizedShape::Ellipse { ellipse, points } = &shape else {
        panic!("expected an ellipse, got {shape:?}");
    };
    assert_eq!(shape.kind(), ShapeKind::Circle);
    assert!(ellipse.center.distance_to(Vec2::new(0.5, 0.5)) < 1e-9);
    assert!((ellipse.rx - 0.2).abs() < 1e-9);
    assert_eq!(points.len(), 32);
    assert_eq!(points[0].position(), points[31].position());
    assert_boundaries(&input, points);
}

#[test]
fn open_wavy_stroke_stays_polyline() {
    let coords: Vec<(f64, f64)> = (0..40)
        .map(|i| {
            let x = i as f64 / 39.0;
            (x, if (i / 10) % 2 == 0 { 0.0 } else { 0.2 })
        })
        .collect();
    let input = stroke(&coords);
    let shape = detect_shape(&input);
    assert_eq!(shape.kind(), ShapeKind::Polyline);
    let out = shape.points();
    assert!(out.len() > 2);
    assert_eq!(out[0].position(), input[0].position());
    assert_eq!(out[out.len() - 1].position(), input[39].position());
    assert_boundaries(&input, out);
}

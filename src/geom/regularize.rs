//! Snapping closed polylines to canonical triangles and rectangles.
//!
//! Both entry points take a *closed* polyline (first and last points share
//! coordinates) with the vertex count of their shape plus the repeated seam,
//! and return `None` when the shape does not qualify. Callers keep the input
//! unchanged in that case.

use std::f64::consts::FRAC_PI_2;

use serde::{Deserialize, Serialize};

use super::core::{Tolerance, Vec2, corner_angle};
use super::recognize::ShapeKind;
use super::stroke::StrokePoint;

/// Angle windows (degrees) and ratios used by the regularizers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RegularizeOptions {
    pub right_angle_min_deg: f64,
    pub right_angle_max_deg: f64,
    pub rectangle_min_deg: f64,
    pub rectangle_max_deg: f64,
    /// Rectangles whose longest/shortest side ratio is at most this become squares.
    pub square_ratio: f64,
    /// Rectangles whose longest edge is within this of an axis are rotated onto it.
    pub axis_snap_deg: f64,
}

impl RegularizeOptions {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            right_angle_min_deg: 75.0,
            right_angle_max_deg: 100.0,
            rectangle_min_deg: 60.0,
            rectangle_max_deg: 120.0,
            square_ratio: 1.2,
            axis_snap_deg: 15.0,
        }
    }

    #[must_use]
    pub const fn right_angle_window(mut self, min_deg: f64, max_deg: f64) -> Self {
        self.right_angle_min_deg = min_deg;
        self.right_angle_max_deg = max_deg;
        self
    }

    #[must_use]
    pub const fn rectangle_window(mut self, min_deg: f64, max_deg: f64) -> Self {
        self.rectangle_min_deg = min_deg;
        self.rectangle_max_deg = max_deg;
        self
    }

    #[must_use]
    pub const fn square_ratio(mut self, ratio: f64) -> Self {
        self.square_ratio = ratio;
        self
    }

    #[must_use]
    pub const fn axis_snap_deg(mut self, degrees: f64) -> Self {
        self.axis_snap_deg = degrees;
        self
    }
}

impl Default for RegularizeOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Interior angles in degrees of the closed polygon `vertices` (seam not repeated).
fn interior_angles(vertices: &[Vec2]) -> Vec<f64> {
    let n = vertices.len();
    (0..n)
        .map(|i| corner_angle(vertices[(i + n - 1) % n], vertices[i], vertices[(i + 1) % n]).to_degrees())
        .collect()
}

/// Distinct vertices of a closed polyline with `sides` sides.
fn closed_vertices(points: &[StrokePoint], sides: usize) -> Option<Vec<Vec2>> {
    let (first, last) = (points.first()?, points.last()?);
    if points.len() != sides + 1 || first.position() != last.position() {
        return None;
    }
    Some(points[..sides].iter().map(StrokePoint::position).collect())
}

/// Writes `vertices` back onto the input samples, repeating the first vertex
/// at the seam. Timestamps and pressures stay with their samples.
fn rebuild(points: &[StrokePoint], vertices: &[Vec2]) -> Vec<StrokePoint> {
    let n = vertices.len();
    points
        .iter()
        .enumerate()
        .map(|(i, p)| p.with_position(vertices[i % n]))
        .collect()
}

/// Snaps a closed triangle with exactly one near-right angle onto a right
/// triangle by moving that vertex onto the Thales circle of the opposite
/// edge, along the ray from the circle center.
#[must_use]
pub fn regularize_triangle(points: &[StrokePoint], options: &RegularizeOptions) -> Option<Vec<StrokePoint>> {
    let mut vertices = closed_vertices(points, 3)?;
    let angles = interior_angles(&vertices);
    let mut candidates = angles
        .iter()
        .enumerate()
        .filter(|(_, a)| (options.right_angle_min_deg..=options.right_angle_max_deg).contains(*a));
    let (corner, angle) = candidates.next()?;
    if candidates.next().is_some() {
        log::debug!("regularize: triangle has more than one near-right angle ({angles:?})");
        return None;
    }

    let a = vertices[(corner + 1) % 3];
    let b = vertices[(corner + 2) % 3];
    let center = a.midpoint(b);
    let radius = a.distance_to(b) / 2.0;
    let mut direction = (vertices[corner] - center).normalized();
    if direction.is_zero() {
        direction = (b - a).perp().normalized();
    }
    vertices[corner] = center + direction * radius;
    log::debug!("regularize: right triangle at vertex {corner} (was {angle:.2}°)");

    Some(rebuild(points, &vertices))
}

/// Snaps a closed quadrilateral whose angles all lie in the rectangle window
/// onto an exact rectangle (or square), optionally aligned to the axes.
/// Sides within `tol` of zero length disqualify the shape.
#[must_use]
pub fn regularize_quad(
    points: &[StrokePoint],
    options: &RegularizeOptions,
    tol: Tolerance,
) -> Option<(ShapeKind, Vec<StrokePoint>)> {
    let vertices = closed_vertices(points, 4)?;
    let angles = interior_angles(&vertices);
    if !angles
        .iter()
        .all(|a| (options.rectangle_min_deg..=options.rectangle_max_deg).contains(a))
    {
        log::debug!("regularize: quadrilateral angles {angles:?} outside rectangle window");
        return None;
    }

    // Equal diagonals bisecting each other make a rectangle.
    let (d1, d2) = (vertices[2] - vertices[0], vertices[3] - vertices[1]);
    let center = vertices[0].midpoint(vertices[2]).midpoint(vertices[1].midpoint(vertices[3]));
    let half = (d1.length() * d2.length()).sqrt() / 2.0;
    let (u1, u2) = (d1.normalized(), d2.normalized());
    if u1.is_zero() || u2.is_zero() {
        return None;
    }
    let mut rect = [center - u1 * half, center - u2 * half, center + u1 * half, center + u2 * half];

    let sides: Vec<f64> = (0..4).map(|i| rect[i].distance_to(rect[(i + 1) % 4])).collect();
    let longest = sides.iter().copied().fold(0.0, f64::max);
    let shortest = sides.iter().copied().fold(f64::INFINITY, f64::min);
    if tol.is_zero_length(shortest) {
        return None;
    }

    let kind = if longest / shortest <= options.square_ratio {
        let target = sides.iter().product::<f64>().powf(0.25);
        let mut moved = rect;
        for i in 0..4 {
            let j = (i + 1) % 4;
            let edge = (rect[j] - rect[i]).normalized();
            let shift = edge * ((target - sides[i]) / 2.0);
            moved[i] = moved[i] - shift;
            moved[j] = moved[j] + shift;
        }
        rect = moved;
        ShapeKind::Square
    } else {
        ShapeKind::Rectangle
    };

    let edge = (0..4)
        .map(|i| rect[(i + 1) % 4] - rect[i])
        .fold(Vec2::ZERO, |best, e| if e.length_squared() > best.length_squared() { e } else { best });
    let heading = edge.y.atan2(edge.x);
    let snap = (heading / FRAC_PI_2).round() * FRAC_PI_2 - heading;
    if snap.abs() <= options.axis_snap_deg.to_radians() {
        for v in &mut rect {
            *v = v.rotate_about(snap, center);
        }
    }
    log::debug!("regularize: {kind:?} with heading {:.2}°", heading.to_degrees());

    Some((kind, rebuild(points, &rect)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn closed(coords: &[(f64, f64)]) -> Vec<StrokePoint> {
        let mut points: Vec<StrokePoint> = coords
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| StrokePoint::new(x, y, 0.5, i as f64))
            .collect();
        let seam = points[0].position();
        points.push(StrokePoint::new(seam.x, seam.y, 0.5, coords.len() as f64));
        points
    }

    #[test]
    fn test_wrong_vertex_count_is_left_alone() {
        let options = RegularizeOptions::default();
        let square = closed(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]);
        assert!(regularize_triangle(&square, &options).is_none());
        let tri = closed(&[(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)]);
        assert!(regularize_quad(&tri, &options, Tolerance::default()).is_none());
        assert!(regularize_quad(&[], &options, Tolerance::default()).is_none());
    }

    #[test]
    fn test_open_polyline_is_left_alone() {
        let mut points = closed(&[(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)]);
        points[3].x = 0.1;
        assert!(regularize_triangle(&points, &RegularizeOptions::default()).is_none());
    }

    #[test]
    fn test_acute_triangle_is_not_right() {
        let equilateral = closed(&[(0.0, 0.0), (1.0, 0.0), (0.5, 3.0_f64.sqrt() / 2.0)]);
        assert!(regularize_triangle(&equilateral, &RegularizeOptions::default()).is_none());
    }

    #[test]
    fn test_rectangle_keeps_seam_and_timestamps() {
        let points = closed(&[(0.0, 0.0), (2.1, 0.1), (2.0, 1.0), (-0.1, 0.9)]);
        let (kind, out) = regularize_quad(&points, &RegularizeOptions::default(), Tolerance::default()).expect("rectangle");
        assert_eq!(kind, ShapeKind::Rectangle);
        assert_eq!(out.len(), 5);
        assert_eq!(out[0].position(), out[4].position());
        assert_eq!(out[4].timestamp, 4.0);
        // Axis snapped.
        assert!((out[0].y - out[1].y).abs() < 1e-9);
        assert!((out[1].x - out[2].x).abs() < 1e-9);
    }

    #[test]
    fn test_near_square_becomes_square() {
        let points = closed(&[(0.0, 0.0), (1.1, 0.0), (1.1, 1.0), (0.0, 1.0)]);
        let (kind, out) = regularize_quad(&points, &RegularizeOptions::default(), Tolerance::default()).expect("square");
        assert_eq!(kind, ShapeKind::Square);
        let sides: Vec<f64> = out.windows(2).map(|w| w[0].distance_to(&w[1])).collect();
        for side in &sides {
            assert!((side - sides[0]).abs() < 1e-9, "{sides:?}");
        }
        assert!((sides[0] - 1.1_f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_tilted_rectangle_keeps_heading() {
        let angle = 30.0_f64.to_radians();
        let coords: Vec<(f64, f64)> = [(0.0, 0.0), (3.0, 0.0), (3.0, 1.0), (0.0, 1.0)]
            .iter()
            .map(|&(x, y)| {
                let v = Vec2::new(x, y).rotate(angle);
                (v.x, v.y)
            })
            .collect();
        let points = closed(&coords);
        let (_, out) = regularize_quad(&points, &RegularizeOptions::default(), Tolerance::default()).expect("rectangle");
        for (a, b) in points.iter().zip(&out) {
            assert!(a.distance_to(b) < 1e-9);
        }
    }
}

//! Stroke samples and the owned containers built from them.
//!
//! A stroke is an ordered list of [`StrokePoint`]s in capture order. While the
//! pen is down an [`ActiveStroke`] collects samples, grows its bounds and
//! drives the incremental vectorizer for live previews. Lifting the pen turns
//! it into a [`Stroke`] whose ribbon is rebuilt in batch mode.

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::core::{
    Rect, Tolerance, Vec2, point_segment_distance, segment_intersects_rect, segments_intersect,
};
use super::ellipse_fit::Ellipse;
use super::recognize::{RecognizedShape, ShapeKind};
use super::ribbon::{RibbonMesh, RibbonOptions, StrokeVectorizerState, vectorize_points};

/// One pointer sample in canvas space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrokePoint {
    pub x: f64,
    pub y: f64,
    /// Normalized pen pressure in `[0, 1]`.
    pub pressure: f64,
    pub timestamp: f64,
}

impl StrokePoint {
    /// Pressure is clamped into `[0, 1]`.
    #[must_use]
    pub fn new(x: f64, y: f64, pressure: f64, timestamp: f64) -> Self {
        Self {
            x,
            y,
            pressure: pressure.clamp(0.0, 1.0),
            timestamp,
        }
    }

    #[must_use]
    pub const fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    /// Same pressure and timestamp, new position.
    #[must_use]
    pub const fn with_position(mut self, position: Vec2) -> Self {
        self.x = position.x;
        self.y = position.y;
        self
    }

    #[must_use]
    pub fn distance_to(&self, other: &Self) -> f64 {
        self.position().distance_to(other.position())
    }

    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.pressure.is_finite()
            && self.timestamp.is_finite()
    }
}

/// Errors raised when stroke input crosses the engine boundary.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StrokeError {
    #[error("stroke has no points")]
    Empty,
    #[error("stroke point {index} has a non-finite coordinate, pressure or timestamp")]
    NonFinite { index: usize },
    #[error("no stroke is in progress")]
    NoActiveStroke,
}

/// Rejects empty input and samples carrying NaN or infinities.
pub fn validate_points(points: &[StrokePoint]) -> Result<(), StrokeError> {
    if points.is_empty() {
        return Err(StrokeError::Empty);
    }
    match points.iter().position(|p| !p.is_finite()) {
        Some(index) => Err(StrokeError::NonFinite { index }),
        None => Ok(()),
    }
}

/// Drops samples closer than `epsilon` to the previously kept sample.
#[must_use]
pub fn coalesce_points(points: &[StrokePoint], epsilon: f64) -> Vec<StrokePoint> {
    let mut kept: Vec<StrokePoint> = Vec::with_capacity(points.len());
    for point in points {
        match kept.last() {
            Some(last) if last.distance_to(point) <= epsilon => {}
            _ => kept.push(*point),
        }
    }
    kept
}

/// Arithmetic mean of the sample pressures (0.0 for an empty slice).
#[must_use]
pub fn mean_pressure(points: &[StrokePoint]) -> f64 {
    if points.is_empty() {
        return 0.0;
    }
    points.iter().map(|p| p.pressure).sum::<f64>() / points.len() as f64
}

#[must_use]
pub fn bounds_of(points: &[StrokePoint]) -> Option<Rect> {
    Rect::from_points(points.iter().map(StrokePoint::position))
}

// ─────────────────────────────────────────────────────────────────────────────
// ActiveStroke
// ─────────────────────────────────────────────────────────────────────────────

/// A stroke that is still being drawn.
#[derive(Debug, Clone)]
pub struct ActiveStroke {
    options: RibbonOptions,
    points: Vec<StrokePoint>,
    bounds: Option<Rect>,
    vectorizer: StrokeVectorizerState,
}

impl ActiveStroke {
    #[must_use]
    pub fn new(options: RibbonOptions) -> Self {
        Self {
            vectorizer: StrokeVectorizerState::new(options),
            options,
            points: Vec::new(),
            bounds: None,
        }
    }

    /// Appends a sample. Returns `false` when it was coalesced into the
    /// previous one.
    pub fn push(&mut self, sample: StrokePoint) -> bool {
        if let Some(last) = self.points.last() {
            if last.distance_to(&sample) <= self.options.coalesce_epsilon {
                return false;
            }
        }

        let position = sample.position();
        match self.bounds.as_mut() {
            Some(bounds) => bounds.include(position),
            None => self.bounds = Some(Rect::from_point(position)),
        }
        self.points.push(sample);
        self.vectorizer.push(sample);
        true
    }

    #[must_use]
    pub fn points(&self) -> &[StrokePoint] {
        &self.points
    }

    /// Bounds of the raw samples; only ever grows while the stroke is active.
    #[must_use]
    pub fn bounds(&self) -> Option<Rect> {
        self.bounds
    }

    /// Advances the pen simulation by `steps` ticks and returns the live mesh.
    pub fn preview(&mut self, steps: usize) -> RibbonMesh {
        self.vectorizer.advance(steps);
        self.vectorizer.mesh()
    }

    /// Finalizes the stroke; the ribbon is rebuilt from the samples in batch mode.
    #[must_use]
    pub fn finish(self) -> Stroke {
        Stroke::new(self.points, &self.options)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Stroke
// ─────────────────────────────────────────────────────────────────────────────

/// A completed stroke with its batch-built ribbon.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stroke {
    pub points: Vec<StrokePoint>,
    pub width: f64,
    pub ribbon: RibbonMesh,
}

impl Stroke {
    #[must_use]
    pub fn new(points: Vec<StrokePoint>, options: &RibbonOptions) -> Self {
        let ribbon = vectorize_points(&points, options);
        Self {
            points,
            width: options.width,
            ribbon,
        }
    }

    /// Bounds of the rendered ink (ribbon), falling back to the samples.
    #[must_use]
    pub fn bounds(&self) -> Option<Rect> {
        self.ribbon.bounds.or_else(|| bounds_of(&self.points))
    }

    /// Whether an eraser of `radius` dragged from `a` to `b` touches the ink.
    #[must_use]
    pub fn hit_test(&self, a: Vec2, b: Vec2, radius: f64) -> bool {
        let Some(bounds) = self.bounds() else {
            return false;
        };
        if !bounds.intersects(Rect::new(a, b), radius) {
            return false;
        }

        let ink = RibbonOptions::new(self.width);
        let reach = |pressure: f64| radius + ink.radius(pressure);
        match self.points.as_slice() {
            [] => false,
            [only] => point_segment_distance(only.position(), a, b) <= reach(only.pressure),
            points => points.windows(2).any(|w| {
                let (p0, p1) = (w[0].position(), w[1].position());
                let reach = reach(w[0].pressure.max(w[1].pressure));
                segment_intersects_rect(a, b, Rect::new(p0, p1).expand_by(reach))
                    && segment_distance(p0, p1, a, b) <= reach
            }),
        }
    }
}

fn segment_distance(a0: Vec2, a1: Vec2, b0: Vec2, b1: Vec2) -> f64 {
    if segments_intersect(a0, a1, b0, b1) {
        return 0.0;
    }
    point_segment_distance(a0, b0, b1)
        .min(point_segment_distance(a1, b0, b1))
        .min(point_segment_distance(b0, a0, a1))
        .min(point_segment_distance(b1, a0, a1))
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire record and geometry kinds
// ─────────────────────────────────────────────────────────────────────────────

/// Storage/wire form of a finished stroke. Color is passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrokeRecord {
    pub id: String,
    pub color: String,
    pub width: f64,
    pub z_index: i64,
    pub points: Vec<StrokePoint>,
}

impl StrokeRecord {
    /// Rebuilds the stroke (batch mode) using the record's own width.
    #[must_use]
    pub fn to_stroke(&self, options: &RibbonOptions) -> Stroke {
        let options = options.width(self.width);
        Stroke::new(self.points.clone(), &options)
    }
}

#[cfg(feature = "parallel")]
#[must_use]
pub fn vectorize_records(records: &[StrokeRecord], options: &RibbonOptions) -> Vec<RibbonMesh> {
    records
        .par_iter()
        .map(|record| vectorize_points(&record.points, &options.width(record.width)))
        .collect()
}

#[cfg(not(feature = "parallel"))]
#[must_use]
pub fn vectorize_records(records: &[StrokeRecord], options: &RibbonOptions) -> Vec<RibbonMesh> {
    records
        .iter()
        .map(|record| vectorize_points(&record.points, &options.width(record.width)))
        .collect()
}

/// What a stroke renders as.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InkGeometry {
    /// Freehand ink.
    Ribbon { points: Vec<StrokePoint> },
    /// A recognized ellipse or circle with its resampled outline.
    Ellipse {
        ellipse: Ellipse,
        points: Vec<StrokePoint>,
    },
    /// A recognized polygonal shape (line, triangle, rectangle, ...).
    Polygon {
        kind: ShapeKind,
        points: Vec<StrokePoint>,
    },
}

impl InkGeometry {
    #[must_use]
    pub fn points(&self) -> &[StrokePoint] {
        match self {
            Self::Ribbon { points } | Self::Ellipse { points, .. } | Self::Polygon { points, .. } => {
                points
            }
        }
    }

    #[must_use]
    pub fn vectorize(&self, options: &RibbonOptions) -> RibbonMesh {
        vectorize_points(self.points(), options)
    }

    /// Closed outlines have coincident first and last points.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        match self {
            Self::Ribbon { .. } => false,
            Self::Ellipse { .. } => true,
            Self::Polygon { points, .. } => match (points.first(), points.last()) {
                (Some(first), Some(last)) if points.len() > 2 => {
                    Tolerance::ZERO_LENGTH.approx_eq_vec2(first.position(), last.position())
                }
                _ => false,
            },
        }
    }
}

impl From<RecognizedShape> for InkGeometry {
    fn from(shape: RecognizedShape) -> Self {
        match shape {
            RecognizedShape::Dot(point) => Self::Ribbon {
                points: vec![point],
            },
            RecognizedShape::Polygon { kind, points } => Self::Polygon { kind, points },
            RecognizedShape::Ellipse { ellipse, points } => Self::Ellipse { ellipse, points },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(x: f64, y: f64) -> StrokePoint {
        StrokePoint::new(x, y, 0.5, 0.0)
    }

    #[test]
    fn test_new_clamps_pressure() {
        assert_eq!(StrokePoint::new(0.0, 0.0, 1.7, 0.0).pressure, 1.0);
        assert_eq!(StrokePoint::new(0.0, 0.0, -0.2, 0.0).pressure, 0.0);
    }

    #[test]
    fn test_coalesce_drops_adjacent_duplicates() {
        let points = vec![sample(0.0, 0.0), sample(0.0, 0.0), sample(1.0, 0.0), sample(1.0, 1e-12)];
        let kept = coalesce_points(&points, 1e-9);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[1].x, 1.0);
    }

    #[test]
    fn test_validate_reports_first_bad_index() {
        let points = vec![sample(0.0, 0.0), sample(f64::NAN, 0.0)];
        assert_eq!(validate_points(&points), Err(StrokeError::NonFinite { index: 1 }));
        assert_eq!(validate_points(&[]), Err(StrokeError::Empty));
    }

    #[test]
    fn test_active_stroke_bounds_only_grow() {
        let mut stroke = ActiveStroke::new(RibbonOptions::default());
        assert!(stroke.push(sample(0.0, 0.0)));
        assert!(stroke.push(sample(2.0, 1.0)));
        assert!(!stroke.push(sample(2.0, 1.0)));
        assert!(stroke.push(sample(1.0, 0.5)));

        let bounds = stroke.bounds().expect("bounds");
        assert_eq!((bounds.x_min, bounds.x_max), (0.0, 2.0));
        assert_eq!((bounds.y_min, bounds.y_max), (0.0, 1.0));
        assert_eq!(stroke.points().len(), 3);
    }

    #[test]
    fn test_hit_test_respects_ink_width() {
        let options = RibbonOptions::default().width(0.3);
        let stroke = Stroke::new(vec![sample(0.0, 0.0), sample(1.0, 0.0)], &options);
        // Half-width at pressure 0.5 is 0.15.
        assert!(stroke.hit_test(Vec2::new(0.5, 0.2), Vec2::new(0.5, 0.5), 0.1));
        assert!(!stroke.hit_test(Vec2::new(0.5, 0.3), Vec2::new(0.5, 0.5), 0.1));
        assert!(stroke.hit_test(Vec2::new(0.5, -1.0), Vec2::new(0.5, 1.0), 0.0));
    }

    #[test]
    fn test_hit_test_clamps_pressure_like_the_ribbon() {
        let options = RibbonOptions::default().width(0.3);
        let mut heavy = vec![sample(0.0, 0.0), sample(1.0, 0.0), sample(1.0, 1.0)];
        for p in &mut heavy {
            p.pressure = 4.0;
        }
        let stroke = Stroke::new(heavy, &options);
        // Pressure clamps to 1, so the half-width is 0.2, not 0.5.
        let half_width = options.radius(4.0);
        assert!((half_width - 0.2).abs() < 1e-12);
        assert!(stroke.hit_test(Vec2::new(0.5, 0.25), Vec2::new(0.5, 0.5), 0.1));
        assert!(!stroke.hit_test(Vec2::new(0.5, 0.35), Vec2::new(0.5, 0.5), 0.1));
        let bottom = stroke.bounds().expect("bounds").y_min;
        assert!((bottom + half_width).abs() < 1e-9, "ribbon bottom {bottom}");
    }

    #[test]
    fn test_hit_test_between_zigzag_segments() {
        let points: Vec<StrokePoint> = (0..=4).map(|i| sample(i as f64, (i % 2) as f64)).collect();
        let stroke = Stroke::new(points, &RibbonOptions::default().width(0.03));
        // Inside the overall bounds but away from every segment.
        assert!(!stroke.hit_test(Vec2::new(1.0, 0.8), Vec2::new(1.0, 0.9), 0.01));
        assert!(stroke.hit_test(Vec2::new(2.5, 0.0), Vec2::new(2.5, 1.0), 0.0));
    }

    #[test]
    fn test_record_uses_its_own_width() {
        let record = StrokeRecord {
            id: "s1".to_owned(),
            color: "#000000".to_owned(),
            width: 0.02,
            z_index: 3,
            points: vec![sample(0.0, 0.0), sample(1.0, 0.0)],
        };
        let stroke = record.to_stroke(&RibbonOptions::default());
        assert_eq!(stroke.width, 0.02);
        assert!(!stroke.ribbon.is_empty());
    }

    #[test]
    fn test_polygon_geometry_closed() {
        let square = vec![
            sample(0.0, 0.0),
            sample(1.0, 0.0),
            sample(1.0, 1.0),
            sample(0.0, 1.0),
            sample(0.0, 0.0),
        ];
        let geometry = InkGeometry::Polygon {
            kind: ShapeKind::Square,
            points: square,
        };
        assert!(geometry.is_closed());
        assert!(!InkGeometry::Ribbon { points: vec![sample(0.0, 0.0)] }.is_closed());
    }
}

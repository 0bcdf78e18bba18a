//! Shape recognition for a finished stroke.
//!
//! Fixed decision order, one outcome per call:
//!
//! 1. a single sample is a dot and is returned as-is;
//! 2. the stroke is segmented into dominant vertices;
//! 3. polylines with at least `min_ellipse_vertices` vertices are tried as an
//!    ellipse fit on the *original* samples, and an accepted fit wins;
//! 4. closed triangles and quadrilaterals go through the regularizers;
//! 5. everything else is returned as the plain polyline.
//!
//! The ellipse fit only influences step 3, so it is skipped for polylines
//! that could not use it.

use serde::{Deserialize, Serialize};

use super::ellipse_fit::{Ellipse, EllipseFitError, EllipseFitOptions, fit_ellipse};
use super::metrics::TimingBucket;
use super::regularize::{RegularizeOptions, regularize_quad, regularize_triangle};
use super::segment::{SegmenterOptions, segment_polyline};
use super::stroke::{StrokePoint, mean_pressure};
use super::toolbox::InkToolbox;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ShapeKind {
    Dot,
    Line,
    Polyline,
    Triangle,
    RightTriangle,
    Rectangle,
    Square,
    Circle,
    Ellipse,
}

/// Outcome of [`detect_shape`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecognizedShape {
    Dot(StrokePoint),
    Polygon {
        kind: ShapeKind,
        points: Vec<StrokePoint>,
    },
    Ellipse {
        ellipse: Ellipse,
        points: Vec<StrokePoint>,
    },
}

impl RecognizedShape {
    #[must_use]
    pub fn kind(&self) -> ShapeKind {
        match self {
            Self::Dot(_) => ShapeKind::Dot,
            Self::Polygon { kind, .. } => *kind,
            Self::Ellipse { ellipse, .. } if ellipse.is_circle() => ShapeKind::Circle,
            Self::Ellipse { .. } => ShapeKind::Ellipse,
        }
    }

    #[must_use]
    pub fn points(&self) -> &[StrokePoint] {
        match self {
            Self::Dot(point) => std::slice::from_ref(point),
            Self::Polygon { points, .. } | Self::Ellipse { points, .. } => points,
        }
    }

    #[must_use]
    pub fn into_points(self) -> Vec<StrokePoint> {
        match self {
            Self::Dot(point) => vec![point],
            Self::Polygon { points, .. } | Self::Ellipse { points, .. } => points,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RecognitionOptions {
    pub segmenter: SegmenterOptions,
    pub ellipse: EllipseFitOptions,
    pub regularize: RegularizeOptions,
    /// Polylines need at least this many vertices before an ellipse may win.
    pub min_ellipse_vertices: usize,
    /// Number of points in a resampled ellipse outline.
    pub output_point_budget: usize,
}

impl RecognitionOptions {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            segmenter: SegmenterOptions::new(),
            ellipse: EllipseFitOptions::new(),
            regularize: RegularizeOptions::new(),
            min_ellipse_vertices: 10,
            output_point_budget: 64,
        }
    }

    #[must_use]
    pub const fn output_point_budget(mut self, budget: usize) -> Self {
        self.output_point_budget = budget;
        self
    }

    #[must_use]
    pub const fn min_ellipse_vertices(mut self, count: usize) -> Self {
        self.min_ellipse_vertices = count;
        self
    }
}

impl Default for RecognitionOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// What the pipeline saw on its way to the result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecognitionDiagnostics {
    pub sample_count: usize,
    /// Vertices in the segmented polyline (including the repeated seam).
    pub vertex_count: usize,
    pub closed: bool,
    /// Score of the ellipse fit, when one was attempted and produced an ellipse.
    pub ellipse_wobbliness: Option<f64>,
    /// Why the ellipse fit did not win, when one was attempted.
    pub ellipse_error: Option<EllipseFitError>,
    /// Whether a regularizer moved the polyline vertices.
    pub regularized: bool,
}

/// Recognizes `points` with default options.
#[must_use]
pub fn detect_shape(points: &[StrokePoint]) -> RecognizedShape {
    let mut toolbox = InkToolbox::new();
    detect_shape_with_context(points, &mut toolbox).0
}

#[must_use]
pub fn detect_shape_with_context(
    points: &[StrokePoint],
    toolbox: &mut InkToolbox,
) -> (RecognizedShape, RecognitionDiagnostics) {
    let options = toolbox.recognition;
    let tol = toolbox.tolerance;
    let mut diagnostics = RecognitionDiagnostics {
        sample_count: points.len(),
        ..RecognitionDiagnostics::default()
    };

    match points {
        [] => {
            return (
                RecognizedShape::Polygon {
                    kind: ShapeKind::Polyline,
                    points: Vec::new(),
                },
                diagnostics,
            );
        }
        [only] => return (RecognizedShape::Dot(*only), diagnostics),
        _ => {}
    }

    let segmentation = toolbox
        .metrics
        .time(TimingBucket::Segment, || segment_polyline(points, &options.segmenter, tol));
    diagnostics.vertex_count = segmentation.points.len();
    diagnostics.closed = segmentation.closed;

    if segmentation.points.len() >= options.min_ellipse_vertices {
        let fit = toolbox
            .metrics
            .time(TimingBucket::EllipseFit, || fit_ellipse(points, &options.ellipse, tol));
        match fit {
            Ok(fit) => {
                log::debug!(
                    "recognize: ellipse accepted (wobbliness {:.6}, circle: {})",
                    fit.wobbliness,
                    fit.snapped_to_circle
                );
                diagnostics.ellipse_wobbliness = Some(fit.wobbliness);
                let outline = toolbox.metrics.time(TimingBucket::Recognize, || {
                    fit.ellipse.resample(
                        points,
                        options.output_point_budget,
                        options.ellipse.arc_length_resampling,
                    )
                });
                return (
                    RecognizedShape::Ellipse {
                        ellipse: fit.ellipse,
                        points: outline,
                    },
                    diagnostics,
                );
            }
            Err(err) => {
                log::debug!("recognize: no ellipse ({err})");
                if let EllipseFitError::Rejected { score, .. } = err {
                    diagnostics.ellipse_wobbliness = Some(score);
                }
                diagnostics.ellipse_error = Some(err);
            }
        }
    }

    let polyline = segmentation.points;
    let sides = polyline.len() - 1;
    let (kind, mut out) = if segmentation.closed {
        match sides {
            3 => match toolbox
                .metrics
                .time(TimingBucket::Regularize, || regularize_triangle(&polyline, &options.regularize))
            {
                Some(snapped) => {
                    diagnostics.regularized = true;
                    (ShapeKind::RightTriangle, snapped)
                }
                None => (ShapeKind::Triangle, polyline),
            },
            4 => match toolbox
                .metrics
                .time(TimingBucket::Regularize, || regularize_quad(&polyline, &options.regularize, tol))
            {
                Some((kind, snapped)) => {
                    diagnostics.regularized = true;
                    (kind, snapped)
                }
                None => (ShapeKind::Polyline, polyline),
            },
            _ => (ShapeKind::Polyline, polyline),
        }
    } else if sides == 1 {
        (ShapeKind::Line, polyline)
    } else {
        (ShapeKind::Polyline, polyline)
    };
    log::debug!(
        "recognize: {kind:?} from {} samples ({} vertices, closed: {})",
        points.len(),
        diagnostics.vertex_count,
        diagnostics.closed
    );

    let pressure = mean_pressure(points);
    for point in &mut out {
        point.pressure = pressure;
    }
    (RecognizedShape::Polygon { kind, points: out }, diagnostics)
}

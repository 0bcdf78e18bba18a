mod core;
mod ellipse_fit;
mod metrics;
mod recognize;
mod regularize;
mod ribbon;
mod segment;
mod stroke;
mod toolbox;

pub use core::{
    Rect, Tolerance, Vec2, corner_angle, point_segment_distance, segment_intersects_rect,
    segments_intersect,
};
pub use ellipse_fit::{
    Ellipse, EllipseFit, EllipseFitError, EllipseFitOptions, MIN_FIT_POINTS, fit_conic_ellipse,
    fit_ellipse,
};
pub use metrics::{InkMetrics, InkTimingReport, TimingBucket};
pub use recognize::{
    RecognitionDiagnostics, RecognitionOptions, RecognizedShape, ShapeKind, detect_shape,
    detect_shape_with_context,
};
pub use regularize::{RegularizeOptions, regularize_quad, regularize_triangle};
pub use ribbon::{
    PathPoint, RibbonMesh, RibbonOptions, StrokeVectorizerState, batch_path, build_ribbon,
    vectorize_points,
};
pub use segment::{PolylineSegmenterState, SegmenterOptions, Segmentation, segment_polyline};
pub use stroke::{
    ActiveStroke, InkGeometry, Stroke, StrokeError, StrokePoint, StrokeRecord, bounds_of,
    coalesce_points, mean_pressure, validate_points, vectorize_records,
};
pub use toolbox::{InkToolbox, ToolboxConfig, vectorize_with_context};

#[cfg(test)]
mod tests;

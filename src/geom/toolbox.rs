//! Explicit context passed through the ink pipeline.
//!
//! Holds the tuned constants for vectorizing and recognizing strokes plus the
//! optional timing collector. Plain entry points such as
//! [`detect_shape`](super::recognize::detect_shape) build a default toolbox;
//! the `*_with_context` variants take one from the caller.

use serde::Deserialize;

use super::core::Tolerance;
use super::metrics::{InkMetrics, TimingBucket};
use super::recognize::RecognitionOptions;
use super::ribbon::{RibbonMesh, RibbonOptions, vectorize_points};
use super::stroke::StrokePoint;

#[derive(Debug, Clone, Default)]
pub struct InkToolbox {
    pub tolerance: Tolerance,
    pub ribbon: RibbonOptions,
    pub recognition: RecognitionOptions,
    pub metrics: InkMetrics,
}

impl InkToolbox {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_config(config: ToolboxConfig) -> Self {
        Self {
            tolerance: config.tolerance,
            ribbon: config.ribbon,
            recognition: config.recognition,
            metrics: InkMetrics::default(),
        }
    }

    #[must_use]
    pub fn with_ribbon(mut self, ribbon: RibbonOptions) -> Self {
        self.ribbon = ribbon;
        self
    }

    #[must_use]
    pub fn with_recognition(mut self, recognition: RecognitionOptions) -> Self {
        self.recognition = recognition;
        self
    }

    #[must_use]
    pub fn with_tolerance(mut self, tolerance: Tolerance) -> Self {
        self.tolerance = tolerance;
        self
    }
}

/// Partial configuration accepted from JS; missing fields keep their defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ToolboxConfig {
    pub tolerance: Tolerance,
    pub ribbon: RibbonOptions,
    pub recognition: RecognitionOptions,
}

/// Batch-vectorizes `points` with the toolbox's ribbon options at `width`.
#[must_use]
pub fn vectorize_with_context(points: &[StrokePoint], width: f64, toolbox: &mut InkToolbox) -> RibbonMesh {
    let options = toolbox.ribbon.width(width);
    toolbox
        .metrics
        .time(TimingBucket::Vectorize, || vectorize_points(points, &options))
}

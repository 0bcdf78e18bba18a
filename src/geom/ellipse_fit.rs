//! Direct least-squares ellipse fitting.
//!
//! The conic `A x² + B xy + C y² + D x + E y + F = 0` is fitted with the
//! numerically stable Halíř–Flusser split of Fitzgibbon's method: the scatter
//! matrix is partitioned into quadratic (`S1`), mixed (`S2`) and linear (`S3`)
//! blocks, the linear part is eliminated, and the remaining 3×3 eigenproblem
//! is constrained to `4AC - B² > 0`. Input is shifted to its centroid and
//! scaled to unit RMS radius before building the scatter.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use serde::{Deserialize, Serialize};

use super::core::{Tolerance, Vec2};
use super::stroke::{StrokePoint, mean_pressure};

type Mat3 = [[f64; 3]; 3];

/// Minimum sample count for a well-posed conic fit.
pub const MIN_FIT_POINTS: usize = 6;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EllipseFitError {
    #[error("ellipse fit needs at least {MIN_FIT_POINTS} points, got {count}")]
    TooFewPoints { count: usize },
    #[error("ellipse fit input contains non-finite coordinates")]
    NonFinite,
    #[error("scatter matrix is singular")]
    SingularMatrix,
    #[error("no eigenvector satisfies the ellipse constraint")]
    NoEllipticSolution,
    #[error("ellipse rejected: wobbliness {score:.6} >= {threshold}")]
    Rejected { score: f64, threshold: f64 },
}

/// Tuning for [`fit_ellipse`] and the resampled outline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EllipseFitOptions {
    /// Fits scoring at or above this are rejected.
    pub wobbliness_threshold: f64,
    /// Fits with `rx / ry` at or below this snap to a circle.
    pub circle_ratio: f64,
    /// Space resampled points by arc length instead of parametric angle.
    pub arc_length_resampling: bool,
}

impl EllipseFitOptions {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            wobbliness_threshold: 0.001,
            circle_ratio: 1.5,
            arc_length_resampling: false,
        }
    }

    #[must_use]
    pub const fn wobbliness_threshold(mut self, threshold: f64) -> Self {
        self.wobbliness_threshold = threshold;
        self
    }

    #[must_use]
    pub const fn circle_ratio(mut self, ratio: f64) -> Self {
        self.circle_ratio = ratio;
        self
    }

    #[must_use]
    pub const fn arc_length_resampling(mut self, enabled: bool) -> Self {
        self.arc_length_resampling = enabled;
        self
    }
}

impl Default for EllipseFitOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// An ellipse with `rx >= ry > 0` and `angle` (radians, in `(-π/2, π/2]`)
/// measured from the x axis to the `rx` axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ellipse {
    pub center: Vec2,
    pub rx: f64,
    pub ry: f64,
    pub angle: f64,
}

impl Ellipse {
    /// Swaps axes if needed so that `rx >= ry` and normalizes the angle.
    #[must_use]
    pub fn new(center: Vec2, rx: f64, ry: f64, angle: f64) -> Self {
        let (rx, ry, angle) = if ry > rx {
            (ry, rx, angle + FRAC_PI_2)
        } else {
            (rx, ry, angle)
        };
        Self {
            center,
            rx,
            ry,
            angle: normalize_axis_angle(angle),
        }
    }

    #[must_use]
    pub fn is_circle(&self) -> bool {
        Tolerance::DEFAULT.approx_eq_f64(self.rx, self.ry)
    }

    /// Boundary point at parametric angle `t`.
    #[must_use]
    pub fn point_at(&self, t: f64) -> Vec2 {
        self.center + Vec2::new(self.rx * t.cos(), self.ry * t.sin()).rotate(self.angle)
    }

    /// Parametric angle of the boundary point matched to `p`.
    #[must_use]
    pub fn parameter_of(&self, p: Vec2) -> f64 {
        let local = (p - self.center).rotate(-self.angle);
        (local.y / self.ry).atan2(local.x / self.rx)
    }

    /// Mean squared distance of `points` to their matched boundary points,
    /// normalized by `rx * ry * (2π)²`.
    #[must_use]
    pub fn wobbliness(&self, points: &[Vec2]) -> f64 {
        if points.is_empty() {
            return f64::INFINITY;
        }
        let sum: f64 = points
            .iter()
            .map(|&p| p.distance_squared_to(self.point_at(self.parameter_of(p))))
            .sum();
        sum / points.len() as f64 / (self.rx * self.ry * TAU * TAU)
    }

    /// Replaces both radii by their geometric mean.
    #[must_use]
    pub fn to_circle(self) -> Self {
        let r = (self.rx * self.ry).sqrt();
        Self {
            rx: r,
            ry: r,
            angle: 0.0,
            ..self
        }
    }

    /// Closed outline of `count` points (at least 4) tracing the ellipse from
    /// the first input sample's parameter in the input's winding direction.
    ///
    /// The last point repeats the first point's coordinates. Pressure is the
    /// input mean; timestamps run linearly from the first to the last input
    /// timestamp by index.
    #[must_use]
    pub fn resample(&self, input: &[StrokePoint], count: usize, arc_length: bool) -> Vec<StrokePoint> {
        let (Some(first), Some(last)) = (input.first(), input.last()) else {
            return Vec::new();
        };
        let count = count.max(4);
        let start = self.parameter_of(first.position());
        let direction = if signed_area(input) < 0.0 { -1.0 } else { 1.0 };
        let pressure = mean_pressure(input);

        let params = if arc_length {
            self.arc_length_parameters(start, direction, count)
        } else {
            (0..count)
                .map(|k| start + direction * TAU * k as f64 / (count - 1) as f64)
                .collect()
        };

        let span = last.timestamp - first.timestamp;
        let mut points: Vec<StrokePoint> = params
            .iter()
            .enumerate()
            .map(|(k, &t)| {
                let p = self.point_at(t);
                StrokePoint {
                    x: p.x,
                    y: p.y,
                    pressure,
                    timestamp: first.timestamp + span * k as f64 / (count - 1) as f64,
                }
            })
            .collect();

        let head = points[0].position();
        if let Some(tail) = points.last_mut() {
            *tail = tail.with_position(head);
            tail.timestamp = last.timestamp;
        }
        points
    }

    /// Parameters of `count` points equally spaced by arc length, found by
    /// inverting a piecewise-linear length table.
    fn arc_length_parameters(&self, start: f64, direction: f64, count: usize) -> Vec<f64> {
        let steps = (count * 16).max(256);
        let dt = direction * TAU / steps as f64;
        let mut lengths = Vec::with_capacity(steps + 1);
        lengths.push(0.0);
        let mut prev = self.point_at(start);
        for i in 1..=steps {
            let p = self.point_at(start + dt * i as f64);
            let acc = lengths[i - 1] + prev.distance_to(p);
            lengths.push(acc);
            prev = p;
        }
        let total = lengths[steps];

        let mut params = Vec::with_capacity(count);
        let mut seg = 0;
        for k in 0..count {
            let target = total * k as f64 / (count - 1) as f64;
            while seg + 1 < steps && lengths[seg + 1] < target {
                seg += 1;
            }
            let run = lengths[seg + 1] - lengths[seg];
            let frac = if run > 0.0 {
                ((target - lengths[seg]) / run).clamp(0.0, 1.0)
            } else {
                0.0
            };
            params.push(start + dt * (seg as f64 + frac));
        }
        params
    }
}

/// Result of an accepted [`fit_ellipse`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EllipseFit {
    pub ellipse: Ellipse,
    /// Score of the raw fit, before any circle snap.
    pub wobbliness: f64,
    pub snapped_to_circle: bool,
}

/// Fits an ellipse to the stroke and applies the wobbliness acceptance test
/// and circle snap.
pub fn fit_ellipse(
    points: &[StrokePoint],
    options: &EllipseFitOptions,
    tol: Tolerance,
) -> Result<EllipseFit, EllipseFitError> {
    let positions: Vec<Vec2> = points.iter().map(StrokePoint::position).collect();
    let ellipse = fit_conic_ellipse(&positions, tol)?;

    let wobbliness = ellipse.wobbliness(&positions);
    if !(wobbliness < options.wobbliness_threshold) {
        return Err(EllipseFitError::Rejected {
            score: wobbliness,
            threshold: options.wobbliness_threshold,
        });
    }

    let snapped_to_circle = ellipse.rx / ellipse.ry <= options.circle_ratio;
    Ok(EllipseFit {
        ellipse: if snapped_to_circle { ellipse.to_circle() } else { ellipse },
        wobbliness,
        snapped_to_circle,
    })
}

/// Least-squares ellipse through `points`, without acceptance testing.
/// Point sets whose RMS spread is within `tol` are singular.
pub fn fit_conic_ellipse(points: &[Vec2], tol: Tolerance) -> Result<Ellipse, EllipseFitError> {
    if points.len() < MIN_FIT_POINTS {
        return Err(EllipseFitError::TooFewPoints { count: points.len() });
    }
    if points.iter().any(|p| !p.is_finite()) {
        return Err(EllipseFitError::NonFinite);
    }

    let n = points.len() as f64;
    let centroid = points.iter().fold(Vec2::ZERO, |acc, &p| acc + p) / n;
    let scale = (points.iter().map(|&p| p.distance_squared_to(centroid)).sum::<f64>() / n).sqrt();
    if tol.is_zero_length(scale) {
        return Err(EllipseFitError::SingularMatrix);
    }

    // Scatter blocks over [x², xy, y²] and [x, y, 1], averaged per sample.
    let mut s1 = [[0.0; 3]; 3];
    let mut s2 = [[0.0; 3]; 3];
    let mut s3 = [[0.0; 3]; 3];
    for &p in points {
        let q = (p - centroid) / scale;
        let quad = [q.x * q.x, q.x * q.y, q.y * q.y];
        let lin = [q.x, q.y, 1.0];
        for r in 0..3 {
            for c in 0..3 {
                s1[r][c] += quad[r] * quad[c] / n;
                s2[r][c] += quad[r] * lin[c] / n;
                s3[r][c] += lin[r] * lin[c] / n;
            }
        }
    }

    let s3_inv = mat3_inverse(&s3).ok_or(EllipseFitError::SingularMatrix)?;
    let t = mat3_scale(&mat3_mul(&s3_inv, &mat3_transpose(&s2)), -1.0);
    let m = mat3_add(&s1, &mat3_mul(&s2, &t));
    // Premultiply by the inverse of the constraint matrix [[0,0,2],[0,-1,0],[2,0,0]].
    let reduced: Mat3 = [
        [m[2][0] / 2.0, m[2][1] / 2.0, m[2][2] / 2.0],
        [-m[1][0], -m[1][1], -m[1][2]],
        [m[0][0] / 2.0, m[0][1] / 2.0, m[0][2] / 2.0],
    ];

    let quadratic = real_eigenvalues(&reduced)
        .into_iter()
        .filter_map(|lambda| null_vector(&reduced, lambda))
        .filter_map(|v| {
            let constraint = 4.0 * v[0] * v[2] - v[1] * v[1];
            let norm_sq = v[0] * v[0] + v[1] * v[1] + v[2] * v[2];
            (constraint > 0.0).then_some((constraint / norm_sq, v))
        })
        .fold(None, |best: Option<(f64, [f64; 3])>, candidate| match best {
            Some(b) if b.0 >= candidate.0 => Some(b),
            _ => Some(candidate),
        })
        .map(|(_, v)| v)
        .ok_or(EllipseFitError::NoEllipticSolution)?;
    let linear = mat3_mul_vec(&t, quadratic);

    let local = conic_to_ellipse(quadratic, linear).ok_or(EllipseFitError::NoEllipticSolution)?;
    Ok(Ellipse::new(
        centroid + local.center * scale,
        local.rx * scale,
        local.ry * scale,
        local.angle,
    ))
}

/// Canonical parameters of the conic `[A, B, C]·[x², xy, y²] + [D, E, F]·[x, y, 1]`.
fn conic_to_ellipse(quadratic: [f64; 3], linear: [f64; 3]) -> Option<Ellipse> {
    // Fix the overall sign so that the `+` root below is the major axis.
    let sign = if quadratic[0] + quadratic[2] < 0.0 { -1.0 } else { 1.0 };
    let [a, b, c] = quadratic.map(|v| v * sign);
    let [d, e, f] = linear.map(|v| v * sign);

    let denom = b * b - 4.0 * a * c;
    if denom >= 0.0 {
        return None;
    }
    let center = Vec2::new((2.0 * c * d - b * e) / denom, (2.0 * a * e - b * d) / denom);
    let k = 2.0 * (a * e * e + c * d * d - b * d * e + denom * f);
    let root = ((a - c) * (a - c) + b * b).sqrt();
    let major = k * (a + c + root);
    let minor = k * (a + c - root);
    if !(major > 0.0 && minor > 0.0) {
        return None;
    }
    let rx = -major.sqrt() / denom;
    let ry = -minor.sqrt() / denom;

    let angle = if b != 0.0 {
        ((c - a - root) / b).atan()
    } else if a < c {
        0.0
    } else {
        FRAC_PI_2
    };

    (rx.is_finite() && ry.is_finite() && rx > 0.0 && ry > 0.0).then(|| Ellipse::new(center, rx, ry, angle))
}

/// Maps an axis direction (defined modulo π) into `(-π/2, π/2]`.
fn normalize_axis_angle(angle: f64) -> f64 {
    let mut a = angle.rem_euclid(PI);
    if a > FRAC_PI_2 {
        a -= PI;
    }
    a
}

/// Shoelace area, positive for counter-clockwise samples.
fn signed_area(points: &[StrokePoint]) -> f64 {
    let len = points.len();
    (0..len)
        .map(|i| points[i].position().cross(points[(i + 1) % len].position()))
        .sum::<f64>()
        / 2.0
}

// ─────────────────────────────────────────────────────────────────────────────
// 3×3 helpers
// ─────────────────────────────────────────────────────────────────────────────

fn mat3_mul(a: &Mat3, b: &Mat3) -> Mat3 {
    let mut out = [[0.0; 3]; 3];
    for (r, row) in out.iter_mut().enumerate() {
        for (c, cell) in row.iter_mut().enumerate() {
            *cell = (0..3).map(|i| a[r][i] * b[i][c]).sum();
        }
    }
    out
}

fn mat3_mul_vec(a: &Mat3, v: [f64; 3]) -> [f64; 3] {
    a.map(|row| row[0] * v[0] + row[1] * v[1] + row[2] * v[2])
}

fn mat3_add(a: &Mat3, b: &Mat3) -> Mat3 {
    let mut out = *a;
    for r in 0..3 {
        for c in 0..3 {
            out[r][c] += b[r][c];
        }
    }
    out
}

fn mat3_scale(a: &Mat3, s: f64) -> Mat3 {
    a.map(|row| row.map(|v| v * s))
}

fn mat3_transpose(a: &Mat3) -> Mat3 {
    let mut out = [[0.0; 3]; 3];
    for r in 0..3 {
        for c in 0..3 {
            out[c][r] = a[r][c];
        }
    }
    out
}

fn mat3_det(a: &Mat3) -> f64 {
    a[0][0] * (a[1][1] * a[2][2] - a[1][2] * a[2][1]) - a[0][1] * (a[1][0] * a[2][2] - a[1][2] * a[2][0])
        + a[0][2] * (a[1][0] * a[2][1] - a[1][1] * a[2][0])
}

fn mat3_inverse(a: &Mat3) -> Option<Mat3> {
    let det = mat3_det(a);
    let scale = a.iter().flatten().fold(0.0_f64, |m, v| m.max(v.abs()));
    if !det.is_finite() || det.abs() <= 1e-12 * scale.powi(3) {
        return None;
    }
    let mut out = [[0.0; 3]; 3];
    for r in 0..3 {
        for c in 0..3 {
            let (r1, r2) = ((c + 1) % 3, (c + 2) % 3);
            let (c1, c2) = ((r + 1) % 3, (r + 2) % 3);
            out[r][c] = (a[r1][c1] * a[r2][c2] - a[r1][c2] * a[r2][c1]) / det;
        }
    }
    Some(out)
}

/// Real roots of the characteristic polynomial.
fn real_eigenvalues(a: &Mat3) -> Vec<f64> {
    let trace = a[0][0] + a[1][1] + a[2][2];
    let minors = a[0][0] * a[1][1] - a[0][1] * a[1][0] + a[0][0] * a[2][2] - a[0][2] * a[2][0]
        + a[1][1] * a[2][2]
        - a[1][2] * a[2][1];
    // λ³ + b λ² + c λ + d
    solve_cubic(-trace, minors, -mat3_det(a))
}

fn solve_cubic(b: f64, c: f64, d: f64) -> Vec<f64> {
    let shift = b / 3.0;
    let p = c - b * b / 3.0;
    let q = 2.0 * b * b * b / 27.0 - b * c / 3.0 + d;
    let disc = q * q / 4.0 + p * p * p / 27.0;

    if disc > 0.0 {
        let s = disc.sqrt();
        vec![(-q / 2.0 + s).cbrt() + (-q / 2.0 - s).cbrt() - shift]
    } else if p == 0.0 {
        vec![-shift]
    } else {
        let r = (-p / 3.0).sqrt();
        let phi = (-q / (2.0 * r * r * r)).clamp(-1.0, 1.0).acos();
        (0..3)
            .map(|k| 2.0 * r * ((phi - TAU * k as f64) / 3.0).cos() - shift)
            .collect()
    }
}

/// Eigenvector for `lambda`: the largest cross product of two rows of
/// `a - λI`.
fn null_vector(a: &Mat3, lambda: f64) -> Option<[f64; 3]> {
    let mut shifted = *a;
    for (i, row) in shifted.iter_mut().enumerate() {
        row[i] -= lambda;
    }
    let cross = |u: [f64; 3], v: [f64; 3]| {
        [
            u[1] * v[2] - u[2] * v[1],
            u[2] * v[0] - u[0] * v[2],
            u[0] * v[1] - u[1] * v[0],
        ]
    };
    [(0, 1), (0, 2), (1, 2)]
        .into_iter()
        .map(|(i, j)| cross(shifted[i], shifted[j]))
        .map(|v| (v[0] * v[0] + v[1] * v[1] + v[2] * v[2], v))
        .filter(|(norm_sq, _)| norm_sq.is_finite() && *norm_sq > 0.0)
        .fold(None, |best: Option<(f64, [f64; 3])>, candidate| match best {
            Some(b) if b.0 >= candidate.0 => Some(b),
            _ => Some(candidate),
        })
        .map(|(_, v)| v)
}

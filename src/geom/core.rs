use std::ops::{Add, Div, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Vec2
// ─────────────────────────────────────────────────────────────────────────────

/// Plain 2D value type. Every operation returns a new vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    /// Zero vector.
    pub const ZERO: Self = Self::new(0.0, 0.0);
    /// Unit vector along the X axis.
    pub const X: Self = Self::new(1.0, 0.0);
    /// Unit vector along the Y axis.
    pub const Y: Self = Self::new(0.0, 1.0);

    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub const fn from_array(arr: [f64; 2]) -> Self {
        Self::new(arr[0], arr[1])
    }

    #[must_use]
    pub const fn to_array(self) -> [f64; 2] {
        [self.x, self.y]
    }

    #[must_use]
    pub const fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }

    #[must_use]
    pub const fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }

    #[must_use]
    pub const fn mul_scalar(self, s: f64) -> Self {
        Self::new(self.x * s, self.y * s)
    }

    #[must_use]
    pub const fn div_scalar(self, s: f64) -> Self {
        Self::new(self.x / s, self.y / s)
    }

    #[must_use]
    pub const fn dot(self, rhs: Self) -> f64 {
        self.x * rhs.x + self.y * rhs.y
    }

    /// Z component of the 3D cross product.
    #[must_use]
    pub const fn cross(self, rhs: Self) -> f64 {
        self.x * rhs.y - self.y * rhs.x
    }

    #[must_use]
    pub const fn length_squared(self) -> f64 {
        self.dot(self)
    }

    #[must_use]
    pub fn length(self) -> f64 {
        self.length_squared().sqrt()
    }

    /// Unit vector in the same direction.
    ///
    /// The zero vector (and any vector whose length is not a positive finite
    /// number) normalizes to [`Vec2::ZERO`].
    #[must_use]
    pub fn normalized(self) -> Self {
        let len = self.length();
        if len.is_finite() && len > 0.0 {
            self.div_scalar(len)
        } else {
            Self::ZERO
        }
    }

    /// Counter-clockwise perpendicular `(-y, x)`.
    #[must_use]
    pub const fn perp(self) -> Self {
        Self::new(-self.y, self.x)
    }

    /// Rotate about the origin by `angle` radians (counter-clockwise).
    #[must_use]
    pub fn rotate(self, angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        Self::new(self.x * c - self.y * s, self.x * s + self.y * c)
    }

    /// Rotate about `center` by `angle` radians.
    #[must_use]
    pub fn rotate_about(self, angle: f64, center: Self) -> Self {
        self.sub(center).rotate(angle).add(center)
    }

    /// Signed angle that rotates `self` onto `other`, in `(-π, π]`.
    #[must_use]
    pub fn angle_to(self, other: Self) -> f64 {
        self.cross(other).atan2(self.dot(other))
    }

    #[must_use]
    pub fn distance_to(self, other: Self) -> f64 {
        self.sub(other).length()
    }

    #[must_use]
    pub const fn distance_squared_to(self, other: Self) -> f64 {
        self.sub(other).length_squared()
    }

    #[must_use]
    pub fn lerp(self, rhs: Self, t: f64) -> Self {
        Self::new(self.x + (rhs.x - self.x) * t, self.y + (rhs.y - self.y) * t)
    }

    #[must_use]
    pub fn midpoint(self, rhs: Self) -> Self {
        self.lerp(rhs, 0.5)
    }

    /// Both components exactly zero.
    #[must_use]
    pub fn is_zero(self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }

    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Default for Vec2 {
    fn default() -> Self {
        Self::ZERO
    }
}

impl From<[f64; 2]> for Vec2 {
    fn from(arr: [f64; 2]) -> Self {
        Self::from_array(arr)
    }
}

impl From<Vec2> for [f64; 2] {
    fn from(v: Vec2) -> Self {
        v.to_array()
    }
}

impl Add for Vec2 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self::Output {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

impl Mul<Vec2> for f64 {
    type Output = Vec2;
    fn mul(self, rhs: Vec2) -> Self::Output {
        Vec2::new(self * rhs.x, self * rhs.y)
    }
}

impl Div<f64> for Vec2 {
    type Output = Self;
    fn div(self, rhs: f64) -> Self::Output {
        Self::new(self.x / rhs, self.y / rhs)
    }
}

impl Neg for Vec2 {
    type Output = Self;
    fn neg(self) -> Self::Output {
        Self::new(-self.x, -self.y)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Rect
// ─────────────────────────────────────────────────────────────────────────────

/// Axis-aligned bounding box with `x_min <= x_max` and `y_min <= y_max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rect {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl Rect {
    /// Builds a box from two corners in any order.
    #[must_use]
    pub fn new(a: Vec2, b: Vec2) -> Self {
        Self {
            x_min: a.x.min(b.x),
            x_max: a.x.max(b.x),
            y_min: a.y.min(b.y),
            y_max: a.y.max(b.y),
        }
    }

    /// Zero-area box around a single point.
    #[must_use]
    pub const fn from_point(p: Vec2) -> Self {
        Self {
            x_min: p.x,
            x_max: p.x,
            y_min: p.y,
            y_max: p.y,
        }
    }

    #[must_use]
    pub fn from_points(points: impl IntoIterator<Item = Vec2>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        Some(iter.fold(Self::from_point(first), Self::expand_point))
    }

    #[must_use]
    pub fn expand_point(self, p: Vec2) -> Self {
        Self {
            x_min: self.x_min.min(p.x),
            x_max: self.x_max.max(p.x),
            y_min: self.y_min.min(p.y),
            y_max: self.y_max.max(p.y),
        }
    }

    /// Grow in place so that `p` is covered.
    pub fn include(&mut self, p: Vec2) {
        *self = self.expand_point(p);
    }

    #[must_use]
    pub fn expand_by(self, amount: f64) -> Self {
        Self {
            x_min: self.x_min - amount,
            x_max: self.x_max + amount,
            y_min: self.y_min - amount,
            y_max: self.y_max + amount,
        }
    }

    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self {
            x_min: self.x_min.min(other.x_min),
            x_max: self.x_max.max(other.x_max),
            y_min: self.y_min.min(other.y_min),
            y_max: self.y_max.max(other.y_max),
        }
    }

    #[must_use]
    pub fn width(self) -> f64 {
        self.x_max - self.x_min
    }

    #[must_use]
    pub fn height(self) -> f64 {
        self.y_max - self.y_min
    }

    #[must_use]
    pub fn center(self) -> Vec2 {
        Vec2::new(
            (self.x_min + self.x_max) * 0.5,
            (self.y_min + self.y_max) * 0.5,
        )
    }

    /// Length of the box diagonal.
    #[must_use]
    pub fn diagonal(self) -> f64 {
        self.width().hypot(self.height())
    }

    #[must_use]
    pub fn contains_point(self, p: Vec2) -> bool {
        p.x >= self.x_min && p.x <= self.x_max && p.y >= self.y_min && p.y <= self.y_max
    }

    /// True when the two boxes, each grown by `padding`, overlap on both axes.
    #[must_use]
    pub fn intersects(self, other: Self, padding: f64) -> bool {
        self.x_min - padding <= other.x_max + padding
            && other.x_min - padding <= self.x_max + padding
            && self.y_min - padding <= other.y_max + padding
            && other.y_min - padding <= self.y_max + padding
    }
}

/// Whether segments `a0-a1` and `b0-b1` touch, including collinear overlap.
#[must_use]
pub fn segments_intersect(a0: Vec2, a1: Vec2, b0: Vec2, b1: Vec2) -> bool {
    if !Rect::new(a0, a1).intersects(Rect::new(b0, b1), 0.0) {
        return false;
    }

    let d1 = (a1 - a0).cross(b0 - a0);
    let d2 = (a1 - a0).cross(b1 - a0);
    let d3 = (b1 - b0).cross(a0 - b0);
    let d4 = (b1 - b0).cross(a1 - b0);

    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }

    // Remaining cases are touching endpoints or collinear overlap; the
    // bounding boxes already overlap, so any zero orientation means contact.
    (d1 == 0.0 && Rect::new(a0, a1).contains_point(b0))
        || (d2 == 0.0 && Rect::new(a0, a1).contains_point(b1))
        || (d3 == 0.0 && Rect::new(b0, b1).contains_point(a0))
        || (d4 == 0.0 && Rect::new(b0, b1).contains_point(a1))
}

/// Whether the segment `a-b` touches the (closed) rectangle.
#[must_use]
pub fn segment_intersects_rect(a: Vec2, b: Vec2, rect: Rect) -> bool {
    if !Rect::new(a, b).intersects(rect, 0.0) {
        return false;
    }
    if rect.contains_point(a) || rect.contains_point(b) {
        return true;
    }

    let corners = [
        Vec2::new(rect.x_min, rect.y_min),
        Vec2::new(rect.x_max, rect.y_min),
        Vec2::new(rect.x_max, rect.y_max),
        Vec2::new(rect.x_min, rect.y_max),
    ];
    (0..4).any(|i| segments_intersect(a, b, corners[i], corners[(i + 1) % 4]))
}

/// Shortest distance from `p` to the segment `a-b`.
#[must_use]
pub fn point_segment_distance(p: Vec2, a: Vec2, b: Vec2) -> f64 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq <= Tolerance::ZERO_LENGTH.eps_squared() {
        return p.distance_to(a);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    p.distance_to(a + ab * t)
}

/// Interior angle at `vertex` between the edges towards `prev` and `next`,
/// in `[0, π]`.
#[must_use]
pub fn corner_angle(prev: Vec2, vertex: Vec2, next: Vec2) -> f64 {
    (prev - vertex).angle_to(next - vertex).abs()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tolerance
// ─────────────────────────────────────────────────────────────────────────────

/// Tolerance configuration for geometric comparisons.
///
/// - `Tolerance::default_geom()` - General geometry comparisons (1e-9)
/// - `Tolerance::ZERO_LENGTH` - Detecting degenerate/zero-length vectors (1e-12)
/// - `Tolerance::LOOSE` - Coarse comparisons such as "do these endpoints meet" (1e-6)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    pub eps: f64,
}

impl Tolerance {
    /// Default geometric tolerance (1e-9).
    pub const DEFAULT: Self = Self { eps: 1e-9 };
    /// Tolerance for detecting zero-length/degenerate vectors and edges (1e-12).
    pub const ZERO_LENGTH: Self = Self { eps: 1e-12 };
    /// Loose tolerance for coarse comparisons (1e-6).
    pub const LOOSE: Self = Self { eps: 1e-6 };

    #[must_use]
    pub const fn new(eps: f64) -> Self {
        Self { eps }
    }

    #[must_use]
    pub const fn default_geom() -> Self {
        Self::DEFAULT
    }

    #[must_use]
    pub const fn eps_squared(self) -> f64 {
        self.eps * self.eps
    }

    #[must_use]
    pub fn approx_eq_f64(self, a: f64, b: f64) -> bool {
        (a - b).abs() <= self.eps
    }

    #[must_use]
    pub fn approx_eq_vec2(self, a: Vec2, b: Vec2) -> bool {
        a.distance_squared_to(b) <= self.eps_squared()
    }

    #[must_use]
    pub fn is_zero_length(self, len: f64) -> bool {
        len.abs() <= self.eps
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

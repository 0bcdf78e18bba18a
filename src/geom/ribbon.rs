//! Variable-width ribbon meshes for ink strokes.
//!
//! A ribbon is a `TRIANGLE_STRIP` of vertex pairs offset to either side of the
//! stroke centerline (`+r·n` first, then `-r·n`). Both modes share one mesh
//! builder:
//!
//! - **Incremental** ([`StrokeVectorizerState`]): a damped mass point chases the
//!   latest sample and every integration step with non-zero velocity becomes a
//!   [`PathPoint`]. Pressure is integrated the same way with a softer spring,
//!   so width trails position slightly and strokes taper naturally.
//! - **Batch** ([`vectorize_points`]): path points come straight from the
//!   samples; corners are only rounded where three consecutive samples turn by
//!   more than the local angular step.
//!
//! Joins are filleted by bisecting the angular gap between consecutive normals
//! until each step is within `angle_step`; both ends get round caps swept at
//! the same resolution. A single sample becomes a filled disc.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use serde::{Deserialize, Serialize};

use super::core::{Rect, Tolerance, Vec2};
use super::stroke::{StrokePoint, coalesce_points};

/// Smallest angular step a join or cap is subdivided to (radians).
const MIN_ANGLE_STEP: f64 = 1e-3;

/// Tuning for ribbon generation and the incremental pen simulation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RibbonOptions {
    /// Nominal stroke width in canvas units.
    pub width: f64,
    /// Roughness constant `k` in `angle_step = k / sqrt(2π·r)`.
    pub roughness: f64,
    /// Spring constant pulling the mass point towards the latest sample.
    pub stiffness: f64,
    /// Velocity damping of the mass point.
    pub drag: f64,
    /// Spring constant for pressure (smaller than `stiffness` so width lags).
    pub pressure_stiffness: f64,
    pub pressure_drag: f64,
    /// Fixed integration step.
    pub dt: f64,
    /// Position and speed below which the simulation counts as settled.
    pub settle_epsilon: f64,
    pub max_settle_steps: usize,
    /// Upper bound on join bisection depth.
    pub max_join_depth: usize,
    /// Adjacent samples closer than this are merged.
    pub coalesce_epsilon: f64,
}

impl RibbonOptions {
    #[must_use]
    pub const fn new(width: f64) -> Self {
        Self {
            width,
            roughness: 0.05,
            stiffness: 0.25,
            drag: 1.0,
            pressure_stiffness: 0.1,
            pressure_drag: 0.632,
            dt: 1.0,
            settle_epsilon: 1e-9,
            max_settle_steps: 512,
            max_join_depth: 16,
            coalesce_epsilon: 1e-9,
        }
    }

    #[must_use]
    pub const fn width(mut self, width: f64) -> Self {
        self.width = width;
        self
    }

    #[must_use]
    pub const fn roughness(mut self, roughness: f64) -> Self {
        self.roughness = roughness;
        self
    }

    /// Set the position spring; `drag` is reset to the critically damped value
    /// for a unit mass.
    #[must_use]
    pub fn stiffness(mut self, stiffness: f64) -> Self {
        self.stiffness = stiffness;
        self.drag = 2.0 * stiffness.max(0.0).sqrt();
        self
    }

    #[must_use]
    pub const fn drag(mut self, drag: f64) -> Self {
        self.drag = drag;
        self
    }

    #[must_use]
    pub const fn dt(mut self, dt: f64) -> Self {
        self.dt = dt;
        self
    }

    #[must_use]
    pub const fn max_join_depth(mut self, depth: usize) -> Self {
        self.max_join_depth = depth;
        self
    }

    /// Half-width of the ribbon at `pressure`; never below `width / 3`.
    #[must_use]
    pub fn radius(&self, pressure: f64) -> f64 {
        self.width * (pressure.clamp(0.0, 1.0) + 1.0) / 3.0
    }

    /// Angular resolution used for joins and caps at radius `r`.
    #[must_use]
    pub fn angle_step(&self, r: f64) -> f64 {
        let step = self.roughness / (TAU * r).sqrt();
        if step.is_nan() {
            FRAC_PI_2
        } else {
            step.clamp(MIN_ANGLE_STEP, FRAC_PI_2)
        }
    }
}

impl Default for RibbonOptions {
    fn default() -> Self {
        Self::new(0.005)
    }
}

/// A sampled centerline point with its unit normal and local radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathPoint {
    pub x: f64,
    pub y: f64,
    pub t: f64,
    pub nx: f64,
    pub ny: f64,
    pub r: f64,
    pub angle_step: f64,
}

impl PathPoint {
    #[must_use]
    pub fn new(position: Vec2, t: f64, normal: Vec2, r: f64, options: &RibbonOptions) -> Self {
        Self {
            x: position.x,
            y: position.y,
            t,
            nx: normal.x,
            ny: normal.y,
            r,
            angle_step: options.angle_step(r),
        }
    }

    #[must_use]
    pub const fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    #[must_use]
    pub const fn normal(&self) -> Vec2 {
        Vec2::new(self.nx, self.ny)
    }

    /// Direction of travel, i.e. the normal rotated clockwise.
    #[must_use]
    pub const fn tangent(&self) -> Vec2 {
        Vec2::new(self.ny, -self.nx)
    }

    /// Halfway point between `self` and `other`, normal rotated half the gap.
    fn bisect(&self, other: &Self, options: &RibbonOptions) -> Self {
        let gap = self.normal().angle_to(other.normal());
        Self::new(
            self.position().midpoint(other.position()),
            (self.t + other.t) * 0.5,
            self.normal().rotate(gap * 0.5),
            (self.r + other.r) * 0.5,
            options,
        )
    }
}

/// Triangle-strip vertices for one ribbon.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RibbonMesh {
    pub vertices: Vec<[f64; 2]>,
    /// Vertices contributed by the two end caps (or the whole disc for a dot).
    pub cap_vertex_count: usize,
    /// Vertices inserted to round joins.
    pub join_vertex_count: usize,
    pub bounds: Option<Rect>,
}

impl RibbonMesh {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Interleaved `x, y` positions ready for a vertex buffer.
    #[must_use]
    pub fn to_flat(&self) -> Vec<f64> {
        self.vertices.iter().flat_map(|v| *v).collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Mesh builder
// ─────────────────────────────────────────────────────────────────────────────

struct RibbonBuilder<'a> {
    options: &'a RibbonOptions,
    vertices: Vec<[f64; 2]>,
    bounds: Option<Rect>,
    cap_vertex_count: usize,
    join_vertex_count: usize,
}

impl<'a> RibbonBuilder<'a> {
    fn new(options: &'a RibbonOptions, capacity: usize) -> Self {
        Self {
            options,
            vertices: Vec::with_capacity(capacity),
            bounds: None,
            cap_vertex_count: 0,
            join_vertex_count: 0,
        }
    }

    fn vertex(&mut self, v: Vec2) {
        match self.bounds.as_mut() {
            Some(bounds) => bounds.include(v),
            None => self.bounds = Some(Rect::from_point(v)),
        }
        self.vertices.push(v.to_array());
    }

    fn pair(&mut self, p: &PathPoint) {
        let c = p.position();
        let offset = p.normal() * p.r;
        self.vertex(c + offset);
        self.vertex(c - offset);
    }

    /// Number of sweep steps covering a quarter turn at `p`'s resolution.
    fn quarter_steps(p: &PathPoint) -> usize {
        ((FRAC_PI_2 / p.angle_step).ceil() as usize).max(1)
    }

    /// Half-disc behind the first point, zig-zagging from the tip outwards.
    fn start_cap(&mut self, p: &PathPoint) {
        let steps = Self::quarter_steps(p);
        let (c, n, back) = (p.position(), p.normal(), -p.tangent());
        for k in 0..steps {
            let phi = FRAC_PI_2 * k as f64 / steps as f64;
            let (s, co) = phi.sin_cos();
            self.vertex(c + (back * co + n * s) * p.r);
            self.vertex(c + (back * co - n * s) * p.r);
        }
        self.cap_vertex_count += 2 * steps;
    }

    /// Mirror of [`start_cap`](Self::start_cap) ahead of the last point.
    fn end_cap(&mut self, p: &PathPoint) {
        let steps = Self::quarter_steps(p);
        let (c, n, ahead) = (p.position(), p.normal(), p.tangent());
        for k in (0..steps).rev() {
            let phi = FRAC_PI_2 * k as f64 / steps as f64;
            let (s, co) = phi.sin_cos();
            self.vertex(c + (ahead * co + n * s) * p.r);
            self.vertex(c + (ahead * co - n * s) * p.r);
        }
        self.cap_vertex_count += 2 * steps;
    }

    fn disc(&mut self, center: Vec2, r: f64) {
        let steps = ((PI / self.options.angle_step(r)).ceil() as usize).max(2);
        for k in 0..=steps {
            let (s, co) = (PI * k as f64 / steps as f64).sin_cos();
            self.vertex(center + Vec2::new(co, s) * r);
            self.vertex(center + Vec2::new(co, -s) * r);
        }
        self.cap_vertex_count += 2 * (steps + 1);
    }

    /// Emits everything after `a` up to and including `b`, filleting the
    /// normal gap with an explicit work stack (left half first).
    fn segment(&mut self, a: &PathPoint, b: &PathPoint) {
        let mut stack = vec![(*a, *b, 0usize)];
        let mut emitted = 0usize;
        while let Some((p, q, depth)) = stack.pop() {
            let gap = p.normal().angle_to(q.normal()).abs();
            if gap > p.angle_step.min(q.angle_step) && depth < self.options.max_join_depth {
                let mid = p.bisect(&q, self.options);
                stack.push((mid, q, depth + 1));
                stack.push((p, mid, depth + 1));
            } else {
                self.pair(&q);
                emitted += 1;
            }
        }
        self.join_vertex_count += 2 * emitted.saturating_sub(1);
    }

    fn finish(self) -> RibbonMesh {
        RibbonMesh {
            vertices: self.vertices,
            cap_vertex_count: self.cap_vertex_count,
            join_vertex_count: self.join_vertex_count,
            bounds: self.bounds,
        }
    }
}

/// Builds the ribbon for an already sampled centerline.
#[must_use]
pub fn build_ribbon(path: &[PathPoint], options: &RibbonOptions) -> RibbonMesh {
    let mut builder = RibbonBuilder::new(options, path.len() * 2 + 16);
    match path {
        [] => {}
        [only] if only.normal().is_zero() => builder.disc(only.position(), only.r),
        [first, rest @ ..] => {
            builder.start_cap(first);
            builder.pair(first);
            let mut previous = first;
            for point in rest {
                builder.segment(previous, point);
                previous = point;
            }
            builder.end_cap(previous);
        }
    }
    builder.finish()
}

// ─────────────────────────────────────────────────────────────────────────────
// Batch mode
// ─────────────────────────────────────────────────────────────────────────────

/// Centerline for a finished stroke, one path point per sample except at
/// corners, which get an incoming and an outgoing copy for the join.
#[must_use]
pub fn batch_path(points: &[StrokePoint], options: &RibbonOptions) -> Vec<PathPoint> {
    let at = |p: &StrokePoint, normal: Vec2| {
        PathPoint::new(p.position(), p.timestamp, normal, options.radius(p.pressure), options)
    };

    match points {
        [] => Vec::new(),
        [only] => vec![at(only, Vec2::ZERO)],
        [first, .., last] => {
            let normals: Vec<Vec2> = points
                .windows(2)
                .map(|w| (w[1].position() - w[0].position()).normalized().perp())
                .collect();

            let mut path = Vec::with_capacity(points.len() + 8);
            path.push(at(first, normals[0]));
            for (i, point) in points.iter().enumerate().take(points.len() - 1).skip(1) {
                let (incoming, outgoing) = (normals[i - 1], normals[i]);
                let turn = incoming.angle_to(outgoing);
                if turn.abs() <= options.angle_step(options.radius(point.pressure)) {
                    path.push(at(point, incoming.rotate(turn * 0.5)));
                } else {
                    path.push(at(point, incoming));
                    path.push(at(point, outgoing));
                }
            }
            path.push(at(last, normals[normals.len() - 1]));
            path
        }
    }
}

/// Ribbon for a completed (or deserialized) stroke.
#[must_use]
pub fn vectorize_points(points: &[StrokePoint], options: &RibbonOptions) -> RibbonMesh {
    let points = coalesce_points(points, options.coalesce_epsilon);
    build_ribbon(&batch_path(&points, options), options)
}

// ─────────────────────────────────────────────────────────────────────────────
// Incremental mode
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct MassPoint {
    position: Vec2,
    velocity: Vec2,
    pressure: f64,
    pressure_velocity: f64,
}

/// Live vectorizer state for a stroke that is still being drawn.
#[derive(Debug, Clone)]
pub struct StrokeVectorizerState {
    options: RibbonOptions,
    origin: Option<StrokePoint>,
    mass: Option<MassPoint>,
    target: Option<StrokePoint>,
    /// Where the mass was, and the time, when the current target was set.
    leg_start: (Vec2, f64),
    path: Vec<PathPoint>,
}

impl StrokeVectorizerState {
    #[must_use]
    pub fn new(options: RibbonOptions) -> Self {
        Self {
            options,
            origin: None,
            mass: None,
            target: None,
            leg_start: (Vec2::ZERO, 0.0),
            path: Vec::new(),
        }
    }

    /// Makes `sample` the new target. The first sample places the mass at rest.
    pub fn push(&mut self, sample: StrokePoint) {
        let mass = *self.mass.get_or_insert(MassPoint {
            position: sample.position(),
            velocity: Vec2::ZERO,
            pressure: sample.pressure,
            pressure_velocity: 0.0,
        });
        if self.origin.is_none() {
            self.origin = Some(sample);
        }
        let start_time = self.target.map_or(sample.timestamp, |t| t.timestamp);
        self.leg_start = (mass.position, start_time);
        self.target = Some(sample);
    }

    /// One integration step. Returns `true` when a path point was emitted.
    pub fn step(&mut self) -> bool {
        let (Some(mut mass), Some(target)) = (self.mass, self.target) else {
            return false;
        };
        let o = self.options;

        let accel = (target.position() - mass.position) * o.stiffness - mass.velocity * o.drag;
        mass.velocity = mass.velocity + accel * o.dt;
        mass.position = mass.position + mass.velocity * o.dt;

        let pressure_accel = (target.pressure - mass.pressure) * o.pressure_stiffness
            - mass.pressure_velocity * o.pressure_drag;
        mass.pressure_velocity += pressure_accel * o.dt;
        mass.pressure = (mass.pressure + mass.pressure_velocity * o.dt).clamp(0.0, 1.0);
        self.mass = Some(mass);

        if mass.velocity.length() <= Tolerance::ZERO_LENGTH.eps {
            return false;
        }
        let normal = mass.velocity.normalized().perp();

        if self.path.is_empty() {
            if let Some(origin) = self.origin {
                let r = o.radius(origin.pressure);
                self.path
                    .push(PathPoint::new(origin.position(), origin.timestamp, normal, r, &o));
            }
        }

        let t = self.leg_time(mass.position, &target);
        self.path
            .push(PathPoint::new(mass.position, t, normal, o.radius(mass.pressure), &o));
        true
    }

    fn leg_time(&self, position: Vec2, target: &StrokePoint) -> f64 {
        let (start, start_time) = self.leg_start;
        let total = start.distance_to(target.position());
        if total <= Tolerance::ZERO_LENGTH.eps {
            return target.timestamp;
        }
        let progress = (1.0 - position.distance_to(target.position()) / total).clamp(0.0, 1.0);
        start_time + (target.timestamp - start_time) * progress
    }

    /// Runs up to `steps` integration steps; returns how many emitted points.
    pub fn advance(&mut self, steps: usize) -> usize {
        (0..steps).filter(|_| self.step()).count()
    }

    #[must_use]
    pub fn is_settled(&self) -> bool {
        match (self.mass, self.target) {
            (Some(mass), Some(target)) => {
                let eps = self.options.settle_epsilon;
                mass.position.distance_to(target.position()) <= eps
                    && mass.velocity.length() <= eps
                    && (mass.pressure - target.pressure).abs() <= eps.max(1e-6)
            }
            _ => true,
        }
    }

    /// Integrates until the mass rests on the target (bounded by
    /// `max_settle_steps`). Returns the number of steps taken.
    pub fn settle(&mut self) -> usize {
        let mut steps = 0;
        while !self.is_settled() && steps < self.options.max_settle_steps {
            self.step();
            steps += 1;
        }
        steps
    }

    #[must_use]
    pub fn path(&self) -> &[PathPoint] {
        &self.path
    }

    /// Mesh of everything simulated so far. Before the pen has moved this is
    /// a dot at the first sample.
    #[must_use]
    pub fn mesh(&self) -> RibbonMesh {
        if self.path.is_empty() {
            let path: Vec<PathPoint> = self
                .origin
                .iter()
                .map(|p| {
                    let r = self.options.radius(p.pressure);
                    PathPoint::new(p.position(), p.timestamp, Vec2::ZERO, r, &self.options)
                })
                .collect();
            return build_ribbon(&path, &self.options);
        }
        build_ribbon(&self.path, &self.options)
    }

    /// Settles the simulation and returns the final mesh.
    #[must_use]
    pub fn finish(mut self) -> RibbonMesh {
        self.settle();
        self.mesh()
    }
}

//! Curve fitting: dense lattice contours → closed line/cubic paths.
//!
//! Per contour:
//! 1. Interleave edge midpoints with the vertices; midpoints of a staircase
//!    are collinear, so they are the preferred segment endpoints
//! 2. Pick anchors (sharp corners, padded with midpoints to at least three)
//! 3. Between anchors, keep a straight line if the span stays within tolerance
//! 4. Otherwise try one cubic on short spans, and split near the farthest point

use kurbo::{
    BezPath, CubicBez, Line, ParamCurve, ParamCurveNearest, PathEl, PathSeg, Point, Vec2,
};

use crate::config::SimplifyOptions;
use crate::contour::Contour;

/// A closed path of line and cubic segments.
pub type Path = BezPath;

/// Straight runs at least this long on both sides make a vertex a corner.
const CORNER_MIN_RUN: f64 = 2.0;
/// cos(45°): smaller turns are never treated as corners.
const CORNER_MAX_COS: f64 = std::f64::consts::FRAC_1_SQRT_2;
/// Longer spans are split without attempting a cubic.
const MAX_CUBIC_SPAN: usize = 256;
const TANGENT_REACH: usize = 4;
const REPARAM_PASSES: usize = 4;
const CURVE_SAMPLES: usize = 16;
const NEAREST_ACCURACY: f64 = 1e-9;
const TIE_EPS: f64 = 1e-9;
const EPS: f64 = 1e-12;

/// Reduce a contour to a closed path whose distance to every contour point is
/// at most `options.tolerance`.
///
/// The path starts at an anchor (a corner vertex or an edge midpoint) and
/// follows the contour's direction, so winding is preserved. A tolerance of
/// zero reproduces the contour polygon exactly.
pub fn simplify(contour: &Contour, options: &SimplifyOptions) -> Path {
    let tolerance = options.tolerance.max(0.0);
    let points = dedup_cyclic(&contour.points);
    let n = points.len();
    if n < 3 {
        return polygon_path(&points);
    }

    let corners = if options.corner_preserve {
        detect_corners(&points)
    } else {
        Vec::new()
    };
    let (nodes, endpoint) = interleave_midpoints(&points, &corners);

    let mut anchors: Vec<usize> = corners.iter().map(|&c| 2 * c).collect();
    if anchors.len() < 3 {
        anchors.extend([0, n / 3, 2 * n / 3].map(|i| 2 * i + 1));
        anchors.sort_unstable();
        anchors.dedup();
    }

    let start = nodes[anchors[0]];
    let mut elements = vec![PathEl::MoveTo(start)];
    for k in 0..anchors.len() {
        let (from, to) = (anchors[k], anchors[(k + 1) % anchors.len()]);
        let run = cyclic_run(&nodes, from, to);
        let run_endpoint = cyclic_run(&endpoint, from, to);
        fit_run(&run, &run_endpoint, tolerance, &mut elements);
    }

    // ClosePath already draws the final edge back to the start.
    if let Some(PathEl::LineTo(p)) = elements.last() {
        if *p == start {
            elements.pop();
        }
    }
    elements.push(PathEl::ClosePath);
    BezPath::from_vec(elements)
}

/// Largest distance from any contour point to the nearest segment of `path`.
pub fn max_deviation(contour: &Contour, path: &Path) -> f64 {
    let segments: Vec<_> = path.segments().collect();
    contour
        .points
        .iter()
        .map(|&p| {
            segments
                .iter()
                .map(|seg| seg_distance(seg, p))
                .fold(f64::INFINITY, f64::min)
        })
        .fold(0.0, f64::max)
}

fn polygon_path(points: &[Point]) -> Path {
    let mut path = BezPath::new();
    if let Some(&first) = points.first() {
        path.move_to(first);
        for &p in &points[1..] {
            path.line_to(p);
        }
        path.close_path();
    }
    path
}

/// Drop consecutive duplicates, including a repeated closing point.
fn dedup_cyclic(points: &[Point]) -> Vec<Point> {
    let mut out: Vec<Point> = Vec::with_capacity(points.len());
    for &p in points {
        if out.last() != Some(&p) {
            out.push(p);
        }
    }
    while out.len() > 1 && out.first() == out.last() {
        out.pop();
    }
    out
}

/// Indices of sharp corners, in contour order.
///
/// Collinear vertices are skipped; a remaining vertex is a corner when it turns
/// by at least 45° and the straight runs on both sides are long enough. A
/// contour with exactly four turning vertices is a rectangle and keeps all four.
fn detect_corners(points: &[Point]) -> Vec<usize> {
    let n = points.len();
    let turning: Vec<usize> = (0..n)
        .filter(|&i| {
            let a = points[(i + n - 1) % n];
            let b = points[i];
            let c = points[(i + 1) % n];
            (b - a).cross(c - b).abs() > EPS
        })
        .collect();

    if turning.len() == 4 {
        return turning;
    }

    let m = turning.len();
    (0..m)
        .filter(|&k| {
            let prev = points[turning[(k + m - 1) % m]];
            let here = points[turning[k]];
            let next = points[turning[(k + 1) % m]];
            let (into, out) = (here - prev, next - here);
            let sharp = match (unit(into), unit(out)) {
                (Some(u), Some(v)) => u.dot(v) <= CORNER_MAX_COS,
                _ => false,
            };
            sharp && into.hypot() >= CORNER_MIN_RUN && out.hypot() >= CORNER_MIN_RUN
        })
        .map(|k| turning[k])
        .collect()
}

/// Vertices interleaved with the midpoints of the edges that follow them.
///
/// Every node is checked against the tolerance. Only midpoints and corner
/// vertices are marked as endpoint candidates; other vertices become segment
/// endpoints only when no candidate is left inside a failing span.
fn interleave_midpoints(points: &[Point], corners: &[usize]) -> (Vec<Point>, Vec<bool>) {
    let n = points.len();
    let mut nodes = Vec::with_capacity(2 * n);
    let mut endpoint = Vec::with_capacity(2 * n);
    for (i, &p) in points.iter().enumerate() {
        nodes.push(p);
        endpoint.push(false);
        nodes.push(p.midpoint(points[(i + 1) % n]));
        endpoint.push(true);
    }
    for &c in corners {
        endpoint[2 * c] = true;
    }
    (nodes, endpoint)
}

/// Items from `start` to `end` inclusive, wrapping around the contour.
fn cyclic_run<T: Copy>(items: &[T], start: usize, end: usize) -> Vec<T> {
    let n = items.len();
    let len = if end > start { end - start } else { end + n - start };
    (0..=len).map(|k| items[(start + k) % n]).collect()
}

fn unit(v: Vec2) -> Option<Vec2> {
    let len = v.hypot();
    (len > EPS).then(|| v / len)
}

/// Distance from `p` to segment `ab`; exactly zero for collinear lattice points.
fn segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let ab = b - a;
    let ap = p - a;
    let len_sq = ab.hypot2();
    if len_sq <= EPS {
        return ap.hypot();
    }
    let t = ap.dot(ab) / len_sq;
    if t <= 0.0 {
        ap.hypot()
    } else if t >= 1.0 {
        (p - b).hypot()
    } else {
        ap.cross(ab).abs() / len_sq.sqrt()
    }
}

fn seg_distance(seg: &PathSeg, p: Point) -> f64 {
    match seg {
        PathSeg::Line(Line { p0, p1 }) => segment_distance(p, *p0, *p1),
        other => other.nearest(p, NEAREST_ACCURACY).distance_sq.sqrt(),
    }
}

/// Split index for a span that misses the tolerance, and the largest chord
/// distance over all of its interior points.
///
/// The split goes to the farthest endpoint candidate (any interior node when
/// there is none). Among nodes tied for the farthest, the one nearest the
/// middle wins, so a uniform staircase is halved instead of peeled one step
/// at a time.
fn split_point(span: &[Point], endpoint: &[bool]) -> (usize, f64) {
    let last = span.len() - 1;
    let (a, b) = (span[0], span[last]);
    let dist: Vec<f64> = span.iter().map(|&p| segment_distance(p, a, b)).collect();
    let max_dist = dist[1..last].iter().copied().fold(0.0, f64::max);

    let any_candidate = endpoint[1..last].iter().any(|&e| e);
    let candidate = |i: usize| !any_candidate || endpoint[i];
    let farthest = (1..last)
        .filter(|&i| candidate(i))
        .map(|i| dist[i])
        .fold(0.0, f64::max);
    let middle = span.len() / 2;
    let split = (1..last)
        .filter(|&i| candidate(i) && dist[i] >= farthest - TIE_EPS)
        .min_by_key(|&i| i.abs_diff(middle))
        .unwrap_or(middle);
    (split, max_dist)
}

/// Fit `run` left to right, pushing one element per fitted span.
fn fit_run(run: &[Point], endpoint: &[bool], tolerance: f64, out: &mut Vec<PathEl>) {
    // right halves wait below left halves so elements come out in order
    let mut pending = vec![(0, run.len() - 1)];
    while let Some((first, last)) = pending.pop() {
        let span = &run[first..=last];
        let end = run[last];
        if span.len() <= 2 {
            out.push(PathEl::LineTo(end));
            continue;
        }

        let (split, max_dist) = split_point(span, &endpoint[first..=last]);
        if max_dist <= tolerance {
            out.push(PathEl::LineTo(end));
            continue;
        }

        if tolerance > 0.0 && span.len() <= MAX_CUBIC_SPAN {
            if let Some(c) = fit_cubic(span, tolerance) {
                out.push(PathEl::CurveTo(c.p1, c.p2, c.p3));
                continue;
            }
        }

        pending.push((first + split, last));
        pending.push((first, first + split));
    }
}

fn bernstein(u: f64) -> [f64; 4] {
    let v = 1.0 - u;
    [v * v * v, 3.0 * u * v * v, 3.0 * u * u * v, u * u * u]
}

/// Fit a single cubic with fixed endpoints; `None` when it misses the tolerance.
fn fit_cubic(run: &[Point], tolerance: f64) -> Option<CubicBez> {
    let n = run.len();
    let (p0, p3) = (run[0], run[n - 1]);
    let reach = TANGENT_REACH.min(n - 1);
    let t1 = unit(run[reach] - p0)?;
    let t2 = unit(run[n - 1 - reach] - p3)?;

    let mut lengths = Vec::with_capacity(n);
    let mut total = 0.0;
    lengths.push(0.0);
    for w in run.windows(2) {
        total += (w[1] - w[0]).hypot();
        lengths.push(total);
    }
    if total <= EPS {
        return None;
    }
    let mut params: Vec<f64> = lengths.iter().map(|l| l / total).collect();
    let chord = (p3 - p0).hypot();

    for _ in 0..=REPARAM_PASSES {
        let cubic = solve_handles(run, &params, t1, t2, chord.max(total / 3.0));
        let fits_points = run
            .iter()
            .all(|&p| cubic.nearest(p, NEAREST_ACCURACY).distance_sq <= tolerance * tolerance);
        if fits_points && hugs_polyline(&cubic, run, tolerance) {
            return Some(cubic);
        }
        for (u, &p) in params.iter_mut().zip(run) {
            *u = cubic.nearest(p, NEAREST_ACCURACY).t;
        }
    }
    None
}

/// Least-squares handle lengths along fixed end tangents.
fn solve_handles(run: &[Point], params: &[f64], t1: Vec2, t2: Vec2, scale: f64) -> CubicBez {
    let (p0, p3) = (run[0], run[run.len() - 1]);
    let mut c = [[0.0f64; 2]; 2];
    let mut x = [0.0f64; 2];

    for (&p, &u) in run.iter().zip(params) {
        let [b0, b1, b2, b3] = bernstein(u);
        let a1 = t1 * b1;
        let a2 = t2 * b2;
        c[0][0] += a1.dot(a1);
        c[0][1] += a1.dot(a2);
        c[1][1] += a2.dot(a2);
        let base = p0.to_vec2() * (b0 + b1) + p3.to_vec2() * (b2 + b3);
        let tmp = p.to_vec2() - base;
        x[0] += a1.dot(tmp);
        x[1] += a2.dot(tmp);
    }
    c[1][0] = c[0][1];

    let det = c[0][0] * c[1][1] - c[0][1] * c[1][0];
    let fallback = scale / 3.0;
    let (mut alpha1, mut alpha2) = if det.abs() > EPS {
        (
            (x[0] * c[1][1] - x[1] * c[0][1]) / det,
            (c[0][0] * x[1] - c[1][0] * x[0]) / det,
        )
    } else {
        (fallback, fallback)
    };
    if alpha1 < EPS || alpha2 < EPS {
        alpha1 = fallback;
        alpha2 = fallback;
    }

    CubicBez::new(p0, p0 + t1 * alpha1, p3 + t2 * alpha2, p3)
}

/// Sampled cubic points all lie within `tolerance` of the run polyline.
fn hugs_polyline(cubic: &CubicBez, run: &[Point], tolerance: f64) -> bool {
    (1..CURVE_SAMPLES).all(|i| {
        let q = cubic.eval(i as f64 / CURVE_SAMPLES as f64);
        run.windows(2)
            .any(|w| segment_distance(q, w[0], w[1]) <= tolerance)
    })
}

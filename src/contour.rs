//! Boundary following on the pixel-corner lattice.
//!
//! Contours walk the edges between set and unset pixels, always keeping the
//! set pixel on the right-hand side. In image coordinates (y grows downward)
//! this makes outer boundaries run clockwise on screen (positive shoelace
//! area) and hole boundaries counter-clockwise (negative area).
//!
//! Saddle vertices, where only two diagonal pixels are set, always turn
//! toward the diagonal set pixel: foreground regions are 8-connected and
//! background regions are 4-connected.

use image::{GrayImage, Luma};
use imageproc::region_labelling::{Connectivity, connected_components};
use kurbo::Point;
use tracing::debug;

use crate::config::TraceOptions;
use crate::{VectorizeError, VectorizeResult};

/// Whether a contour bounds a region from the outside or a hole inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContourKind {
    Outer,
    /// `parent` is the index of the enclosing outer contour in the same result.
    Hole { parent: usize },
}

/// A closed loop of lattice points. The first point is not repeated at the end.
#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    pub points: Vec<Point>,
    pub kind: ContourKind,
}

impl Contour {
    /// Shoelace area; positive for outer contours, negative for holes.
    pub fn signed_area(&self) -> f64 {
        signed_area(&self.points)
    }

    pub fn area(&self) -> f64 {
        self.signed_area().abs()
    }

    /// Clockwise as seen on screen, with y pointing down.
    pub fn is_clockwise(&self) -> bool {
        self.signed_area() > 0.0
    }

    pub fn is_hole(&self) -> bool {
        matches!(self.kind, ContourKind::Hole { .. })
    }

    pub fn parent(&self) -> Option<usize> {
        match self.kind {
            ContourKind::Outer => None,
            ContourKind::Hole { parent } => Some(parent),
        }
    }
}

pub(crate) fn signed_area(points: &[Point]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    (0..n)
        .map(|i| {
            let j = (i + 1) % n;
            points[i].x * points[j].y - points[j].x * points[i].y
        })
        .sum::<f64>()
        / 2.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dir {
    Right,
    Down,
    Left,
    Up,
}

impl Dir {
    fn delta(self) -> (i64, i64) {
        match self {
            Dir::Right => (1, 0),
            Dir::Down => (0, 1),
            Dir::Left => (-1, 0),
            Dir::Up => (0, -1),
        }
    }

    fn bit(self) -> u8 {
        match self {
            Dir::Right => 1,
            Dir::Down => 2,
            Dir::Left => 4,
            Dir::Up => 8,
        }
    }

    /// Counter-clockwise on screen.
    fn turn_left(self) -> Self {
        match self {
            Dir::Right => Dir::Up,
            Dir::Up => Dir::Left,
            Dir::Left => Dir::Down,
            Dir::Down => Dir::Right,
        }
    }

    /// Clockwise on screen.
    fn turn_right(self) -> Self {
        match self {
            Dir::Right => Dir::Down,
            Dir::Down => Dir::Left,
            Dir::Left => Dir::Up,
            Dir::Up => Dir::Right,
        }
    }
}

/// Pixel lookup treating everything outside the mask as unset.
struct Grid<'a> {
    set: &'a [bool],
    width: i64,
    height: i64,
}

impl Grid<'_> {
    fn is_set(&self, x: i64, y: i64) -> bool {
        x >= 0
            && y >= 0
            && x < self.width
            && y < self.height
            && self.set[(y * self.width + x) as usize]
    }

    /// Pixel diagonally ahead of vertex `(vx, vy)` on the given side of `dir`.
    fn ahead(&self, vx: i64, vy: i64, dir: Dir, left: bool) -> bool {
        let (dx, dy) = dir.delta();
        let (sx, sy) = if left { (dx + dy, dy - dx) } else { (dx - dy, dy + dx) };
        let px = vx + if sx > 0 { 0 } else { -1 };
        let py = vy + if sy > 0 { 0 } else { -1 };
        self.is_set(px, py)
    }

    fn next_dir(&self, vx: i64, vy: i64, dir: Dir) -> Dir {
        if self.ahead(vx, vy, dir, true) {
            dir.turn_left()
        } else if self.ahead(vx, vy, dir, false) {
            dir
        } else {
            dir.turn_right()
        }
    }
}

/// Traced loop before classification, with the pixel owning its first edge.
struct RawLoop {
    points: Vec<Point>,
    owner: (u32, u32),
}

fn follow(grid: &Grid<'_>, visited: &mut [u8], start: (i64, i64)) -> VectorizeResult<Vec<Point>> {
    let stride = grid.width + 1;
    let max_steps = 4 * (grid.width * grid.height) as usize + 4;
    let (mut vx, mut vy) = start;
    let mut dir = Dir::Right;
    let mut points = Vec::new();

    loop {
        visited[(vy * stride + vx) as usize] |= dir.bit();
        points.push(Point::new(vx as f64, vy as f64));
        if points.len() > max_steps {
            return Err(VectorizeError::Tracing(format!(
                "boundary starting at ({}, {}) did not close",
                start.0, start.1
            )));
        }

        let (dx, dy) = dir.delta();
        vx += dx;
        vy += dy;
        dir = grid.next_dir(vx, vy, dir);

        if (vx, vy) == start && dir == Dir::Right {
            return Ok(points);
        }
    }
}

/// Trace every boundary of `mask` (non-zero = set).
///
/// Returns outer contours and holes in discovery order (row-major by the
/// top edge that starts them). Contours below `options.min_contour_area`
/// are dropped; dropping an outer contour drops its holes too.
pub fn trace_contours(mask: &GrayImage, options: &TraceOptions) -> VectorizeResult<Vec<Contour>> {
    let (w, h) = mask.dimensions();
    if w == 0 || h == 0 {
        return Err(VectorizeError::Tracing(format!(
            "mask dimensions must be positive, got {w}x{h}"
        )));
    }
    let lattice = (w as usize + 1)
        .checked_mul(h as usize + 1)
        .filter(|&n| n <= i64::MAX as usize / 4)
        .ok_or_else(|| VectorizeError::Tracing(format!("mask {w}x{h} is too large to trace")))?;

    let set: Vec<bool> = mask.pixels().map(|p| p[0] > 0).collect();
    let grid = Grid {
        set: &set,
        width: w as i64,
        height: h as i64,
    };
    let mut visited = vec![0u8; lattice];
    let stride = w as i64 + 1;

    let mut loops = Vec::new();
    for y in 0..grid.height {
        for x in 0..grid.width {
            let starts_here = grid.is_set(x, y)
                && !grid.is_set(x, y - 1)
                && visited[(y * stride + x) as usize] & Dir::Right.bit() == 0;
            if starts_here {
                loops.push(RawLoop {
                    points: follow(&grid, &mut visited, (x, y))?,
                    owner: (x as u32, y as u32),
                });
            }
        }
    }

    let contours = classify(mask, loops, options.min_contour_area)?;
    debug!(
        width = w,
        height = h,
        contours = contours.len(),
        holes = contours.iter().filter(|c| c.is_hole()).count(),
        "traced mask"
    );
    Ok(contours)
}

/// Tag loops as outer or hole, link holes to their outer contour, filter by area.
fn classify(
    mask: &GrayImage,
    loops: Vec<RawLoop>,
    min_area: f64,
) -> VectorizeResult<Vec<Contour>> {
    if loops.is_empty() {
        return Ok(Vec::new());
    }

    let binary = GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        Luma([if mask.get_pixel(x, y)[0] > 0 { 255 } else { 0 }])
    });
    let labels = connected_components(&binary, Connectivity::Eight, Luma([0u8]));

    let areas: Vec<f64> = loops.iter().map(|l| signed_area(&l.points)).collect();
    let label_of = |l: &RawLoop| labels.get_pixel(l.owner.0, l.owner.1)[0];

    // Outer contour (loop index) per component label.
    let mut outer_of = std::collections::HashMap::new();
    for (i, l) in loops.iter().enumerate() {
        if areas[i] > 0.0 && outer_of.insert(label_of(l), i).is_some() {
            return Err(VectorizeError::Tracing(format!(
                "component {} has more than one outer boundary",
                label_of(l)
            )));
        }
    }

    let mut parents = Vec::with_capacity(loops.len());
    for (i, l) in loops.iter().enumerate() {
        if areas[i] > 0.0 {
            parents.push(None);
        } else {
            let parent = outer_of.get(&label_of(l)).copied().ok_or_else(|| {
                VectorizeError::Tracing(format!("hole {i} has no enclosing outer boundary"))
            })?;
            parents.push(Some(parent));
        }
    }

    let keep: Vec<bool> = (0..loops.len())
        .map(|i| {
            let big_enough = areas[i].abs() >= min_area;
            match parents[i] {
                None => big_enough,
                Some(p) => big_enough && areas[p].abs() >= min_area,
            }
        })
        .collect();

    let mut new_index = vec![usize::MAX; loops.len()];
    let mut next = 0;
    for (i, &k) in keep.iter().enumerate() {
        if k {
            new_index[i] = next;
            next += 1;
        }
    }

    let contours = loops
        .into_iter()
        .enumerate()
        .filter(|(i, _)| keep[*i])
        .map(|(i, l)| Contour {
            points: l.points,
            kind: match parents[i] {
                None => ContourKind::Outer,
                Some(p) => ContourKind::Hole {
                    parent: new_index[p],
                },
            },
        })
        .collect();
    Ok(contours)
}

/// Outer contour indices paired with their hole indices, in discovery order.
pub fn group_shapes(contours: &[Contour]) -> Vec<(usize, Vec<usize>)> {
    let mut groups: Vec<(usize, Vec<usize>)> = Vec::new();
    let mut slot = vec![usize::MAX; contours.len()];
    for (i, c) in contours.iter().enumerate() {
        if c.kind == ContourKind::Outer {
            slot[i] = groups.len();
            groups.push((i, Vec::new()));
        }
    }
    for (i, c) in contours.iter().enumerate() {
        if let Some(parent) = c.parent() {
            if let Some(group) = groups.get_mut(slot[parent]) {
                group.1.push(i);
            }
        }
    }
    groups
}

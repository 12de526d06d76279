//! Scanline rasterization of flattened paths.
//!
//! Paths are flattened to polylines with de Casteljau subdivision, then
//! scan-converted by collecting directed crossings at pixel-center height.
//! Strokes become filled polygons (one quad per segment plus cap/join
//! octagons) so a single fill routine serves both operations.

use super::geometry::{Matrix, Point, Rect};
use super::path::{LineCap, Path, PathElement, StrokeState};

const MAX_SUBDIVISION_DEPTH: u32 = 10;

/// A flattened subpath.
#[derive(Debug, Clone)]
pub struct Polyline {
    pub points: Vec<Point>,
    pub closed: bool,
}

/// Flatten a path into device-space polylines. `tolerance` is the maximum
/// allowed distance between a curve and its polyline approximation, in the
/// units of the path (transform before flattening for device-space
/// tolerances).
pub fn flatten_path(path: &Path, tolerance: f64) -> Vec<Polyline> {
    let tol = tolerance.max(1e-3);
    let mut out: Vec<Polyline> = Vec::new();
    let mut cur: Option<Polyline> = None;
    for el in path.elements() {
        match *el {
            PathElement::MoveTo(p) => {
                if let Some(pl) = cur.take()
                    && pl.points.len() > 1
                {
                    out.push(pl);
                }
                cur = Some(Polyline { points: vec![p], closed: false });
            }
            PathElement::LineTo(p) => {
                if let Some(pl) = cur.as_mut() {
                    pl.points.push(p);
                }
            }
            PathElement::CurveTo(c1, c2, p) => {
                if let Some(pl) = cur.as_mut() {
                    let start = *pl.points.last().unwrap_or(&Point::ORIGIN);
                    subdivide_curve(start, c1, c2, p, tol, 0, &mut pl.points);
                    pl.points.push(p);
                }
            }
            PathElement::Close => {
                if let Some(mut pl) = cur.take() {
                    pl.closed = true;
                    if pl.points.len() > 1 {
                        let start = pl.points[0];
                        out.push(pl);
                        // A segment after a close continues from the start.
                        cur = Some(Polyline { points: vec![start], closed: false });
                    } else {
                        cur = Some(pl);
                    }
                }
            }
        }
    }
    if let Some(pl) = cur
        && pl.points.len() > 1
    {
        out.push(pl);
    }
    out
}

/// Recursive curve subdivision; pushes interior points only.
fn subdivide_curve(
    p0: Point,
    p1: Point,
    p2: Point,
    p3: Point,
    tol: f64,
    depth: u32,
    out: &mut Vec<Point>,
) {
    if depth >= MAX_SUBDIVISION_DEPTH || curve_is_flat(p0, p1, p2, p3, tol) {
        return;
    }
    // de Casteljau split at t = 1/2.
    let p01 = midpoint(p0, p1);
    let p12 = midpoint(p1, p2);
    let p23 = midpoint(p2, p3);
    let p012 = midpoint(p01, p12);
    let p123 = midpoint(p12, p23);
    let mid = midpoint(p012, p123);
    subdivide_curve(p0, p01, p012, mid, tol, depth + 1, out);
    out.push(mid);
    subdivide_curve(mid, p123, p23, p3, tol, depth + 1, out);
}

fn midpoint(a: Point, b: Point) -> Point {
    Point::new(0.5 * (a.x + b.x), 0.5 * (a.y + b.y))
}

/// Flat when both control points lie within `tol` of the chord.
fn curve_is_flat(p0: Point, p1: Point, p2: Point, p3: Point, tol: f64) -> bool {
    let d = p3 - p0;
    let len = d.x.hypot(d.y);
    if len < 1e-12 {
        return p1.distance(&p0) <= tol && p2.distance(&p0) <= tol;
    }
    let cross1 = ((p1.x - p0.x) * d.y - (p1.y - p0.y) * d.x).abs();
    let cross2 = ((p2.x - p0.x) * d.y - (p2.y - p0.y) * d.x).abs();
    cross1 <= tol * len && cross2 <= tol * len
}

/// Scan-convert filled polylines (implicitly closed) over integer device
/// rows `clip.y0..clip.y1` and columns `clip.x0..clip.x1`. Emits one call
/// per covered span: `span(y, x0, x1)` with `x1` exclusive.
pub fn fill_polys(
    polys: &[Polyline],
    even_odd: bool,
    clip_x0: i32,
    clip_y0: i32,
    clip_x1: i32,
    clip_y1: i32,
    mut span: impl FnMut(i32, i32, i32),
) {
    if polys.is_empty() || clip_x0 >= clip_x1 || clip_y0 >= clip_y1 {
        return;
    }
    // Restrict the row range to the geometry.
    let mut ymin = f64::INFINITY;
    let mut ymax = f64::NEG_INFINITY;
    for pl in polys {
        for p in &pl.points {
            ymin = ymin.min(p.y);
            ymax = ymax.max(p.y);
        }
    }
    if !ymin.is_finite() || !ymax.is_finite() {
        return;
    }
    let y_start = (ymin.floor() as i64).max(clip_y0 as i64) as i32;
    let y_end = (ymax.ceil() as i64).min(clip_y1 as i64) as i32;

    let mut crossings: Vec<(f64, i32)> = Vec::new();
    for y in y_start..y_end {
        let sy = y as f64 + 0.5;
        crossings.clear();
        for pl in polys {
            let n = pl.points.len();
            if n < 2 {
                continue;
            }
            for i in 0..n {
                // Implicit closing edge from last point back to first.
                let a = pl.points[i];
                let b = pl.points[(i + 1) % n];
                if i + 1 == n && a.distance(&pl.points[0]) < 1e-12 {
                    continue;
                }
                let (lo, hi, dir) = if a.y <= b.y { (a, b, 1) } else { (b, a, -1) };
                if sy < lo.y || sy >= hi.y {
                    continue;
                }
                let t = (sy - lo.y) / (hi.y - lo.y);
                crossings.push((lo.x + t * (hi.x - lo.x), dir));
            }
        }
        if crossings.len() < 2 {
            continue;
        }
        crossings.sort_by(|l, r| l.0.partial_cmp(&r.0).unwrap_or(std::cmp::Ordering::Equal));

        let mut winding = 0i32;
        let mut span_start: Option<f64> = None;
        for &(x, dir) in crossings.iter() {
            let was_inside = if even_odd { winding % 2 != 0 } else { winding != 0 };
            winding += dir;
            let is_inside = if even_odd { winding % 2 != 0 } else { winding != 0 };
            if !was_inside && is_inside {
                span_start = Some(x);
            } else if was_inside && !is_inside
                && let Some(xs) = span_start.take()
            {
                // Pixel centers in [xs, x).
                let px0 = ((xs - 0.5).ceil() as i64).max(clip_x0 as i64) as i32;
                let px1 = ((x - 0.5).ceil() as i64).min(clip_x1 as i64) as i32;
                if px0 < px1 {
                    span(y, px0, px1);
                }
            }
        }
    }
}

/// Expand stroked polylines into closed polygons for filling with the
/// nonzero rule. `width` is the device-space stroke width.
pub fn stroke_polys(polys: &[Polyline], width: f64, cap: LineCap) -> Vec<Polyline> {
    let hw = (width * 0.5).max(0.35);
    let mut out = Vec::new();
    for pl in polys {
        let pts = &pl.points;
        let n = pts.len();
        if n < 2 {
            if n == 1 && cap == LineCap::Round {
                out.push(octagon(pts[0], hw));
            }
            continue;
        }
        let last = if pl.closed { n } else { n - 1 };
        for i in 0..last {
            let a = pts[i];
            let b = pts[(i + 1) % n];
            let d = b - a;
            let len = d.x.hypot(d.y);
            if len < 1e-12 {
                continue;
            }
            let (nx, ny) = (-d.y / len * hw, d.x / len * hw);
            let (mut a2, mut b2) = (a, b);
            if !pl.closed && cap == LineCap::Square {
                let ext = Point::new(d.x / len * hw, d.y / len * hw);
                if i == 0 {
                    a2 = a - ext;
                }
                if i == last - 1 {
                    b2 = b + ext;
                }
            }
            out.push(Polyline {
                points: vec![
                    Point::new(a2.x + nx, a2.y + ny),
                    Point::new(b2.x + nx, b2.y + ny),
                    Point::new(b2.x - nx, b2.y - ny),
                    Point::new(a2.x - nx, a2.y - ny),
                ],
                closed: true,
            });
        }
        // Octagons fill the gaps at joins, and serve as round caps.
        let joint_range = if pl.closed { 0..n } else { 1..n - 1 };
        for i in joint_range {
            out.push(octagon(pts[i], hw));
        }
        if !pl.closed && cap == LineCap::Round {
            out.push(octagon(pts[0], hw));
            out.push(octagon(pts[n - 1], hw));
        }
    }
    // Consistent winding per polygon so overlapping pieces union under the
    // nonzero rule.
    for poly in &mut out {
        make_ccw(poly);
    }
    out
}

fn octagon(c: Point, r: f64) -> Polyline {
    let k = r * std::f64::consts::FRAC_1_SQRT_2;
    Polyline {
        points: vec![
            Point::new(c.x + r, c.y),
            Point::new(c.x + k, c.y + k),
            Point::new(c.x, c.y + r),
            Point::new(c.x - k, c.y + k),
            Point::new(c.x - r, c.y),
            Point::new(c.x - k, c.y - k),
            Point::new(c.x, c.y - r),
            Point::new(c.x + k, c.y - k),
        ],
        closed: true,
    }
}

fn make_ccw(poly: &mut Polyline) {
    let pts = &poly.points;
    let mut area2 = 0.0;
    for i in 0..pts.len() {
        let a = pts[i];
        let b = pts[(i + 1) % pts.len()];
        area2 += a.x * b.y - b.x * a.y;
    }
    if area2 < 0.0 {
        poly.points.reverse();
    }
}

/// Cut dashed polylines into their on-segments.
pub fn dash_polys(polys: &[Polyline], pattern: &[f64], phase: f64) -> Vec<Polyline> {
    let total: f64 = pattern.iter().copied().filter(|d| *d >= 0.0).sum();
    if total <= 0.0 {
        return polys.to_vec();
    }
    let mut out = Vec::new();
    for pl in polys {
        let mut pts: Vec<Point> = pl.points.clone();
        if pl.closed && pts.len() > 1 {
            pts.push(pts[0]);
        }
        let mut idx = 0usize;
        let mut remaining = pattern[0].max(0.0);
        let mut on = true;
        // Consume the phase.
        let mut phase_left = phase.max(0.0) % (total * 2.0);
        while phase_left > 0.0 {
            if phase_left >= remaining {
                phase_left -= remaining;
                idx = (idx + 1) % pattern.len();
                remaining = pattern[idx].max(0.0);
                on = !on;
            } else {
                remaining -= phase_left;
                phase_left = 0.0;
            }
        }
        let mut current: Vec<Point> = if on { vec![pts[0]] } else { Vec::new() };
        for w in pts.windows(2) {
            let (a, b) = (w[0], w[1]);
            let seg_len = a.distance(&b);
            if seg_len < 1e-12 {
                continue;
            }
            let mut t0 = 0.0;
            while t0 < seg_len {
                let step = remaining.min(seg_len - t0);
                let t1 = t0 + step;
                let pt1 = a + (b - a) * (t1 / seg_len);
                if on {
                    current.push(pt1);
                }
                remaining -= step;
                if remaining <= 1e-12 {
                    if on && current.len() > 1 {
                        out.push(Polyline { points: std::mem::take(&mut current), closed: false });
                    }
                    on = !on;
                    idx = (idx + 1) % pattern.len();
                    remaining = pattern[idx].max(0.0);
                    if remaining <= 0.0 {
                        remaining = 1e-9;
                    }
                    if on {
                        current = vec![pt1];
                    } else {
                        current.clear();
                    }
                }
                t0 = t1;
            }
        }
        if on && current.len() > 1 {
            out.push(Polyline { points: current, closed: false });
        }
    }
    out
}

/// Flatten in path space, then map through `ctm`. `tolerance` is a
/// device-space deviation bound, so it shrinks by the transform's expansion
/// before flattening.
pub fn flatten_transformed(path: &Path, ctm: &Matrix, tolerance: f64) -> Vec<Polyline> {
    let path_tol = tolerance / ctm.expansion().max(1e-6);
    let mut polys = flatten_path(path, path_tol);
    for pl in &mut polys {
        for p in &mut pl.points {
            *p = p.transform(ctm);
        }
    }
    polys
}

/// Device-space bounds of a set of polylines.
pub fn polys_bounds(polys: &[Polyline]) -> Rect {
    let mut r = Rect::EMPTY;
    for pl in polys {
        for p in &pl.points {
            r.include_point(*p);
        }
    }
    r
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> Path {
        let mut p = Path::new();
        p.rect(0.0, 0.0, 4.0, 4.0);
        p
    }

    fn collect_spans(polys: &[Polyline], even_odd: bool) -> Vec<(i32, i32, i32)> {
        let mut spans = Vec::new();
        fill_polys(polys, even_odd, -100, -100, 100, 100, |y, x0, x1| {
            spans.push((y, x0, x1));
        });
        spans
    }

    #[test]
    fn square_fills_expected_rows() {
        let polys = flatten_path(&unit_square(), 0.1);
        let spans = collect_spans(&polys, false);
        assert_eq!(spans, vec![(0, 0, 4), (1, 0, 4), (2, 0, 4), (3, 0, 4)]);
    }

    #[test]
    fn even_odd_hole() {
        // Outer 8x8 square with inner 4x4 square: even-odd leaves a hole.
        let mut p = Path::new();
        p.rect(0.0, 0.0, 8.0, 8.0);
        p.rect(2.0, 2.0, 4.0, 4.0);
        let polys = flatten_path(&p, 0.1);
        let spans = collect_spans(&polys, true);
        let row3: Vec<_> = spans.iter().filter(|s| s.0 == 3).collect();
        assert_eq!(row3.len(), 2);
        assert_eq!((row3[0].1, row3[0].2), (0, 2));
        assert_eq!((row3[1].1, row3[1].2), (6, 8));
        // Nonzero keeps it filled only when windings agree; rect() always
        // winds the same direction, so the hole disappears.
        let spans_nz = collect_spans(&polys, false);
        let row3_nz: Vec<_> = spans_nz.iter().filter(|s| s.0 == 3).collect();
        assert_eq!(row3_nz.len(), 1);
        assert_eq!((row3_nz[0].1, row3_nz[0].2), (0, 8));
    }

    #[test]
    fn curve_flattening_stays_close() {
        let mut p = Path::new();
        p.move_to(Point::new(0.0, 0.0));
        p.curve_to(Point::new(0.0, 10.0), Point::new(10.0, 10.0), Point::new(10.0, 0.0));
        let polys = flatten_path(&p, 0.05);
        assert_eq!(polys.len(), 1);
        assert!(polys[0].points.len() > 4);
        // All interior points must stay inside the control hull.
        for pt in &polys[0].points {
            assert!(pt.y <= 10.0 + 1e-9 && pt.y >= -1e-9);
        }
    }

    #[test]
    fn stroke_covers_line_neighborhood() {
        let mut p = Path::new();
        p.move_to(Point::new(0.0, 2.5));
        p.line_to(Point::new(10.0, 2.5));
        let polys = flatten_path(&p, 0.1);
        let quads = stroke_polys(&polys, 2.0, LineCap::Butt);
        let spans = collect_spans(&quads, false);
        // Width 2 centered on y=2.5 covers rows 1 and 3 at least partially,
        // and surely row 2.
        assert!(spans.iter().any(|s| s.0 == 2 && s.1 <= 1 && s.2 >= 9));
    }

    #[test]
    fn dashes_split_segments() {
        let mut p = Path::new();
        p.move_to(Point::new(0.0, 0.0));
        p.line_to(Point::new(10.0, 0.0));
        let polys = flatten_path(&p, 0.1);
        let dashed = dash_polys(&polys, &[2.0, 3.0], 0.0);
        assert_eq!(dashed.len(), 2);
        assert!((dashed[0].points[0].x - 0.0).abs() < 1e-9);
        assert!((dashed[0].points.last().unwrap().x - 2.0).abs() < 1e-9);
        assert!((dashed[1].points[0].x - 5.0).abs() < 1e-9);
        assert!((dashed[1].points.last().unwrap().x - 7.0).abs() < 1e-9);
    }

    #[test]
    fn degenerate_inputs_do_not_panic() {
        let p = Path::new();
        assert!(flatten_path(&p, 0.1).is_empty());
        let polys = flatten_path(&unit_square(), 0.1);
        // Inverted clip region.
        let mut called = false;
        fill_polys(&polys, false, 10, 10, 0, 0, |_, _, _| called = true);
        assert!(!called);
    }
}

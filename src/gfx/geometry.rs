//! Points, rectangles and 2D affine transforms.
//!
//! Everything is `f64`: the text-matrix compositions performed by the
//! interpreter chain several small transforms per glyph and single
//! precision visibly drifts over long text runs.

/// A point in 2D space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }

    /// Transform this point by a matrix.
    pub fn transform(&self, m: &Matrix) -> Point {
        Point {
            x: self.x * m.a + self.y * m.c + m.e,
            y: self.x * m.b + self.y * m.d + m.f,
        }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl std::ops::Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::ops::Mul<f64> for Point {
    type Output = Point;
    fn mul(self, rhs: f64) -> Point {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

/// An axis-aligned rectangle, stored as two corners with `x0 <= x1` and
/// `y0 <= y1` for non-empty rectangles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Rect {
    /// The empty rectangle. Any rectangle with `x0 > x1` or `y0 > y1` is
    /// treated as empty.
    pub const EMPTY: Rect = Rect {
        x0: f64::INFINITY,
        y0: f64::INFINITY,
        x1: f64::NEG_INFINITY,
        y1: f64::NEG_INFINITY,
    };

    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Rect { x0, y0, x1, y1 }
    }

    pub fn is_empty(&self) -> bool {
        self.x0 > self.x1 || self.y0 > self.y1
    }

    pub fn width(&self) -> f64 {
        if self.is_empty() { 0.0 } else { self.x1 - self.x0 }
    }

    pub fn height(&self) -> f64 {
        if self.is_empty() { 0.0 } else { self.y1 - self.y0 }
    }

    pub fn top_left(&self) -> Point {
        Point::new(self.x0, self.y1)
    }

    pub fn bottom_left(&self) -> Point {
        Point::new(self.x0, self.y0)
    }

    pub fn top_right(&self) -> Point {
        Point::new(self.x1, self.y1)
    }

    pub fn center(&self) -> Point {
        Point::new(0.5 * (self.x0 + self.x1), 0.5 * (self.y0 + self.y1))
    }

    pub fn contains(&self, p: Point) -> bool {
        !self.is_empty() && p.x >= self.x0 && p.x <= self.x1 && p.y >= self.y0 && p.y <= self.y1
    }

    /// Grow to include a single point.
    pub fn include_point(&mut self, p: Point) {
        self.x0 = self.x0.min(p.x);
        self.y0 = self.y0.min(p.y);
        self.x1 = self.x1.max(p.x);
        self.y1 = self.y1.max(p.y);
    }

    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            *other
        } else if other.is_empty() {
            *self
        } else {
            Rect {
                x0: self.x0.min(other.x0),
                y0: self.y0.min(other.y0),
                x1: self.x1.max(other.x1),
                y1: self.y1.max(other.y1),
            }
        }
    }

    pub fn intersect(&self, other: &Rect) -> Rect {
        if self.is_empty() || other.is_empty() {
            Rect::EMPTY
        } else {
            Rect {
                x0: self.x0.max(other.x0),
                y0: self.y0.max(other.y0),
                x1: self.x1.min(other.x1),
                y1: self.y1.min(other.y1),
            }
        }
    }

    /// Transform the rectangle: the bounding box of the four transformed
    /// corners.
    pub fn transform(&self, m: &Matrix) -> Rect {
        if self.is_empty() {
            return Rect::EMPTY;
        }
        let mut r = Rect::EMPTY;
        r.include_point(Point::new(self.x0, self.y0).transform(m));
        r.include_point(Point::new(self.x1, self.y0).transform(m));
        r.include_point(Point::new(self.x0, self.y1).transform(m));
        r.include_point(Point::new(self.x1, self.y1).transform(m));
        r
    }
}

/// A 2D affine transform:
///
/// ```text
/// | a b 0 |
/// | c d 0 |
/// | e f 1 |
/// ```
///
/// mapping `(x, y)` to `(a*x + c*y + e, b*x + d*y + f)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Default for Matrix {
    fn default() -> Self {
        Matrix::IDENTITY
    }
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Matrix { a, b, c, d, e, f }
    }

    /// Linear part only, translation zero.
    pub fn linear(a: f64, b: f64, c: f64, d: f64) -> Self {
        Matrix::new(a, b, c, d, 0.0, 0.0)
    }

    pub fn translate(tx: f64, ty: f64) -> Self {
        Matrix::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        Matrix::new(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    pub fn rotate(radians: f64) -> Self {
        let (s, c) = radians.sin_cos();
        Matrix::new(c, s, -s, c, 0.0, 0.0)
    }

    /// `self` applied first, then `m`.
    pub fn concat(&self, m: &Matrix) -> Matrix {
        Matrix {
            a: self.a * m.a + self.b * m.c,
            b: self.a * m.b + self.b * m.d,
            c: self.c * m.a + self.d * m.c,
            d: self.c * m.b + self.d * m.d,
            e: self.e * m.a + self.f * m.c + m.e,
            f: self.e * m.b + self.f * m.d + m.f,
        }
    }

    pub fn transform_point(&self, p: Point) -> Point {
        p.transform(self)
    }

    /// Transform a direction vector, ignoring translation.
    pub fn transform_vector(&self, p: Point) -> Point {
        Point {
            x: p.x * self.a + p.y * self.c,
            y: p.x * self.b + p.y * self.d,
        }
    }

    pub fn determinant(&self) -> f64 {
        self.a * self.d - self.b * self.c
    }

    pub fn invert(&self) -> Option<Matrix> {
        let det = self.determinant();
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let inv = 1.0 / det;
        Some(Matrix {
            a: self.d * inv,
            b: -self.b * inv,
            c: -self.c * inv,
            d: self.a * inv,
            e: (self.c * self.f - self.d * self.e) * inv,
            f: (self.b * self.e - self.a * self.f) * inv,
        })
    }

    pub fn is_finite(&self) -> bool {
        self.a.is_finite()
            && self.b.is_finite()
            && self.c.is_finite()
            && self.d.is_finite()
            && self.e.is_finite()
            && self.f.is_finite()
    }

    /// An upper bound on the scaling this matrix applies to distances, used
    /// to translate user-space flattening tolerances to device space.
    pub fn expansion(&self) -> f64 {
        (self.a.hypot(self.b)).max(self.c.hypot(self.d))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_transform() {
        let m = Matrix::new(2.0, 0.0, 0.0, 2.0, 10.0, 5.0);
        let p = Point::new(3.0, 4.0).transform(&m);
        assert_eq!(p, Point::new(16.0, 13.0));
    }

    #[test]
    fn rect_union_and_intersect() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 5.0, 20.0, 20.0);
        assert_eq!(a.union(&b), Rect::new(0.0, 0.0, 20.0, 20.0));
        assert_eq!(a.intersect(&b), Rect::new(5.0, 5.0, 10.0, 10.0));
        assert!(a.intersect(&Rect::new(50.0, 50.0, 60.0, 60.0)).is_empty());
    }

    #[test]
    fn empty_rect_behaves() {
        let mut r = Rect::EMPTY;
        assert!(r.is_empty());
        assert_eq!(r.width(), 0.0);
        r.include_point(Point::new(2.0, 3.0));
        assert!(!r.is_empty());
        assert_eq!(r, Rect::new(2.0, 3.0, 2.0, 3.0));
        assert_eq!(Rect::EMPTY.union(&r), r);
        assert!(Rect::EMPTY.transform(&Matrix::scale(2.0, 2.0)).is_empty());
    }

    #[test]
    fn concat_order() {
        // scale then translate: the translation is not scaled.
        let m = Matrix::scale(2.0, 2.0).concat(&Matrix::translate(5.0, 0.0));
        assert_eq!(m.transform_point(Point::new(1.0, 1.0)), Point::new(7.0, 2.0));
        // translate then scale: it is.
        let m = Matrix::translate(5.0, 0.0).concat(&Matrix::scale(2.0, 2.0));
        assert_eq!(m.transform_point(Point::new(1.0, 1.0)), Point::new(12.0, 2.0));
    }

    #[test]
    fn invert_round_trip() {
        let m = Matrix::new(2.0, 1.0, -1.0, 3.0, 4.0, -2.0);
        let inv = m.invert().unwrap();
        let p = Point::new(7.0, -3.0);
        let q = inv.transform_point(m.transform_point(p));
        assert!((q.x - p.x).abs() < 1e-12);
        assert!((q.y - p.y).abs() < 1e-12);
        assert!(Matrix::scale(0.0, 1.0).invert().is_none());
    }

    #[test]
    fn flipped_transform_maps_paper_to_device() {
        // The compositor's document-to-device transform: y-up paper space
        // onto a y-down raster.
        let paper = Rect::new(0.0, 0.0, 100.0, 200.0);
        let m = Matrix::scale(1.0, -1.0).concat(&Matrix::translate(0.0, 200.0));
        let tl = paper.top_left().transform(&m);
        assert_eq!(tl, Point::new(0.0, 0.0));
        let bl = paper.bottom_left().transform(&m);
        assert_eq!(bl, Point::new(0.0, 200.0));
    }

    #[test]
    fn non_finite_detected() {
        let mut m = Matrix::IDENTITY;
        assert!(m.is_finite());
        m.c = f64::NAN;
        assert!(!m.is_finite());
    }
}

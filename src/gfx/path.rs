//! Path construction and stroke parameters.

use smallvec::SmallVec;

use super::geometry::{Matrix, Point, Rect};

/// One element of a path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathElement {
    MoveTo(Point),
    LineTo(Point),
    CurveTo(Point, Point, Point),
    Close,
}

/// Line cap style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineCap {
    #[default]
    Butt,
    Round,
    Square,
}

impl LineCap {
    pub fn from_i32(v: i32) -> LineCap {
        match v {
            1 => LineCap::Round,
            2 => LineCap::Square,
            _ => LineCap::Butt,
        }
    }
}

/// Line join style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineJoin {
    #[default]
    Miter,
    Round,
    Bevel,
}

impl LineJoin {
    pub fn from_i32(v: i32) -> LineJoin {
        match v {
            1 => LineJoin::Round,
            2 => LineJoin::Bevel,
            _ => LineJoin::Miter,
        }
    }
}

/// Stroke parameters carried in the graphics state.
#[derive(Debug, Clone, PartialEq)]
pub struct StrokeState {
    pub line_width: f64,
    pub miter_limit: f64,
    pub cap: LineCap,
    pub join: LineJoin,
    pub dash_phase: f64,
    pub dash_pattern: SmallVec<[f64; 4]>,
}

impl Default for StrokeState {
    fn default() -> Self {
        StrokeState {
            line_width: 1.0,
            miter_limit: 10.0,
            cap: LineCap::Butt,
            join: LineJoin::Miter,
            dash_phase: 0.0,
            dash_pattern: SmallVec::new(),
        }
    }
}

impl StrokeState {
    pub fn is_dashed(&self) -> bool {
        self.dash_pattern.iter().any(|&d| d > 0.0)
    }
}

/// Fill/stroke selector for a painting operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawMode {
    StrokedOnly,
    FilledOnly,
    StrokedAndFilled,
}

impl DrawMode {
    pub fn fills(&self) -> bool {
        !matches!(self, DrawMode::StrokedOnly)
    }

    pub fn strokes(&self) -> bool {
        !matches!(self, DrawMode::FilledOnly)
    }
}

/// A path under construction or ready for painting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Path {
    elements: Vec<PathElement>,
    current: Option<Point>,
    start: Option<Point>,
}

impl Path {
    pub fn new() -> Self {
        Path::default()
    }

    pub fn elements(&self) -> &[PathElement] {
        &self.elements
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn current_point(&self) -> Option<Point> {
        self.current
    }

    pub fn move_to(&mut self, p: Point) {
        self.elements.push(PathElement::MoveTo(p));
        self.current = Some(p);
        self.start = Some(p);
    }

    pub fn line_to(&mut self, p: Point) {
        // A trailing segment without a preceding moveto starts at the origin;
        // permissive producers do emit this.
        if self.current.is_none() {
            self.move_to(Point::ORIGIN);
        }
        self.elements.push(PathElement::LineTo(p));
        self.current = Some(p);
    }

    pub fn curve_to(&mut self, c1: Point, c2: Point, p: Point) {
        if self.current.is_none() {
            self.move_to(Point::ORIGIN);
        }
        self.elements.push(PathElement::CurveTo(c1, c2, p));
        self.current = Some(p);
    }

    pub fn close(&mut self) {
        if self.current.is_some() {
            self.elements.push(PathElement::Close);
            self.current = self.start;
        }
    }

    /// Append an axis-aligned rectangle as an explicit closed subpath, the
    /// expansion the `re` operator specifies.
    pub fn rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        self.move_to(Point::new(x, y));
        self.line_to(Point::new(x + w, y));
        self.line_to(Point::new(x + w, y + h));
        self.line_to(Point::new(x, y + h));
        self.close();
    }

    /// Bounding box of the control polygon. Curve control points are
    /// included, so this is conservative for curves.
    pub fn bounds(&self) -> Rect {
        let mut r = Rect::EMPTY;
        for el in &self.elements {
            match *el {
                PathElement::MoveTo(p) | PathElement::LineTo(p) => r.include_point(p),
                PathElement::CurveTo(c1, c2, p) => {
                    r.include_point(c1);
                    r.include_point(c2);
                    r.include_point(p);
                }
                PathElement::Close => {}
            }
        }
        r
    }

    pub fn transform(&self, m: &Matrix) -> Path {
        let elements = self
            .elements
            .iter()
            .map(|el| match *el {
                PathElement::MoveTo(p) => PathElement::MoveTo(p.transform(m)),
                PathElement::LineTo(p) => PathElement::LineTo(p.transform(m)),
                PathElement::CurveTo(c1, c2, p) => {
                    PathElement::CurveTo(c1.transform(m), c2.transform(m), p.transform(m))
                }
                PathElement::Close => PathElement::Close,
            })
            .collect();
        Path {
            elements,
            current: self.current.map(|p| p.transform(m)),
            start: self.start.map(|p| p.transform(m)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_expands_to_closed_subpath() {
        let mut r = Path::new();
        r.rect(1.0, 2.0, 10.0, 20.0);

        let mut explicit = Path::new();
        explicit.move_to(Point::new(1.0, 2.0));
        explicit.line_to(Point::new(11.0, 2.0));
        explicit.line_to(Point::new(11.0, 22.0));
        explicit.line_to(Point::new(1.0, 22.0));
        explicit.close();

        assert_eq!(r.elements(), explicit.elements());
    }

    #[test]
    fn close_restores_subpath_start() {
        let mut p = Path::new();
        p.move_to(Point::new(5.0, 5.0));
        p.line_to(Point::new(9.0, 5.0));
        p.close();
        assert_eq!(p.current_point(), Some(Point::new(5.0, 5.0)));
    }

    #[test]
    fn line_without_move_starts_at_origin() {
        let mut p = Path::new();
        p.line_to(Point::new(3.0, 4.0));
        assert_eq!(
            p.elements(),
            &[
                PathElement::MoveTo(Point::ORIGIN),
                PathElement::LineTo(Point::new(3.0, 4.0))
            ]
        );
    }

    #[test]
    fn bounds_and_transform() {
        let mut p = Path::new();
        p.move_to(Point::new(0.0, 0.0));
        p.line_to(Point::new(10.0, 5.0));
        assert_eq!(p.bounds(), Rect::new(0.0, 0.0, 10.0, 5.0));
        let q = p.transform(&Matrix::scale(2.0, 2.0));
        assert_eq!(q.bounds(), Rect::new(0.0, 0.0, 20.0, 10.0));
    }

    #[test]
    fn dash_detection() {
        let mut s = StrokeState::default();
        assert!(!s.is_dashed());
        s.dash_pattern.push(0.0);
        assert!(!s.is_dashed());
        s.dash_pattern.push(3.0);
        assert!(s.is_dashed());
    }
}

//! The backend painting contract.
//!
//! The interpreter drives a `Canvas`; implementations draw into a pixel
//! buffer ([`super::raster_canvas::RasterCanvas`]) or write vector output
//! (`svg`, `eps`, `pdfout`). `BBoxCanvas` and `TraceCanvas` observe instead
//! of drawing and serve crop-box computation and tests.

use bytes::Bytes;

use super::color::Color;
use super::error::Result;
use super::geometry::{Matrix, Point, Rect};
use super::path::{Path, StrokeState};
use super::raster;

/// A decoded bitmap: straight-alpha RGBA bytes, row major.
#[derive(Debug, Clone)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub rgba: Bytes,
}

impl Image {
    pub fn new(width: u32, height: u32, rgba: Bytes) -> Option<Image> {
        if width == 0 || height == 0 || rgba.len() != (width as usize) * (height as usize) * 4 {
            return None;
        }
        Some(Image { width, height, rgba })
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let off = (y as usize * self.width as usize + x as usize) * 4;
        [self.rgba[off], self.rgba[off + 1], self.rgba[off + 2], self.rgba[off + 3]]
    }
}

/// One positioned glyph outline, in user space.
#[derive(Debug, Clone)]
pub struct Glyph {
    pub outline: Path,
}

/// A run of glyphs produced by one text-showing operator.
#[derive(Debug, Clone, Default)]
pub struct TextRun {
    pub glyphs: Vec<Glyph>,
}

/// Shading geometry with a pre-sampled color ramp. The interpreter
/// evaluates the PDF function objects into `stops` so backends only
/// interpolate.
#[derive(Debug, Clone)]
pub struct Shading {
    pub kind: ShadingKind,
    pub extend_start: bool,
    pub extend_end: bool,
    pub stops: Vec<(f64, Color)>,
}

#[derive(Debug, Clone, Copy)]
pub enum ShadingKind {
    Axial { p0: Point, p1: Point },
    Radial { p0: Point, r0: f64, p1: Point, r1: f64 },
}

impl Shading {
    /// Color at normalized parameter `t` (clamped).
    pub fn color_at(&self, t: f64) -> Color {
        let t = t.clamp(0.0, 1.0);
        match self.stops.as_slice() {
            [] => Color::BLACK,
            [only] => only.1,
            stops => {
                let mut prev = &stops[0];
                for stop in &stops[1..] {
                    if t <= stop.0 {
                        let range = stop.0 - prev.0;
                        let f = if range > 0.0 { (t - prev.0) / range } else { 0.0 };
                        return prev.1.lerp(&stop.1, f);
                    }
                    prev = stop;
                }
                stops[stops.len() - 1].1
            }
        }
    }

    pub fn mid_color(&self) -> Color {
        self.color_at(0.5)
    }
}

/// Backend painting surface. Paths and stroke parameters arrive in user
/// space together with the user-to-device transform.
pub trait Canvas {
    fn fill_path(&mut self, path: &Path, even_odd: bool, ctm: &Matrix, color: Color, alpha: f64);

    fn stroke_path(
        &mut self,
        path: &Path,
        stroke: &StrokeState,
        ctm: &Matrix,
        color: Color,
        alpha: f64,
    );

    /// Install the path as a clip; stays active until the matching
    /// [`Canvas::pop_clip`].
    fn clip_path(&mut self, path: &Path, even_odd: bool, ctm: &Matrix);

    fn pop_clip(&mut self);

    /// Glyph outlines are plain paths by the time they reach the backend;
    /// the default forwards to `fill_path` per glyph.
    fn fill_text(&mut self, run: &TextRun, ctm: &Matrix, color: Color, alpha: f64) {
        for glyph in &run.glyphs {
            self.fill_path(&glyph.outline, false, ctm, color, alpha);
        }
    }

    fn fill_image(&mut self, image: &Image, ctm: &Matrix, alpha: f64);

    fn fill_shading(&mut self, shading: &Shading, ctm: &Matrix, alpha: f64);

    /// Flush pending output. Sink failures surface here or from the
    /// individual drawing calls, whichever the backend prefers.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Accumulates the device-space bounding box of everything drawn.
#[derive(Debug)]
pub struct BBoxCanvas {
    bbox: Rect,
    clips: Vec<Rect>,
}

impl Default for BBoxCanvas {
    fn default() -> Self {
        Self::new()
    }
}

impl BBoxCanvas {
    pub fn new() -> Self {
        BBoxCanvas { bbox: Rect::EMPTY, clips: Vec::new() }
    }

    pub fn bbox(&self) -> Rect {
        self.bbox
    }

    fn add(&mut self, r: Rect) {
        let mut r = r;
        for clip in &self.clips {
            r = r.intersect(clip);
        }
        self.bbox = self.bbox.union(&r);
    }
}

impl Canvas for BBoxCanvas {
    fn fill_path(&mut self, path: &Path, _even_odd: bool, ctm: &Matrix, _color: Color, _a: f64) {
        self.add(path.bounds().transform(ctm));
    }

    fn stroke_path(
        &mut self,
        path: &Path,
        stroke: &StrokeState,
        ctm: &Matrix,
        _color: Color,
        _a: f64,
    ) {
        let r = path.bounds().transform(ctm);
        let hw = 0.5 * stroke.line_width.max(1.0) * ctm.expansion();
        self.add(Rect::new(r.x0 - hw, r.y0 - hw, r.x1 + hw, r.y1 + hw));
    }

    fn clip_path(&mut self, path: &Path, _even_odd: bool, ctm: &Matrix) {
        self.clips.push(path.bounds().transform(ctm));
    }

    fn pop_clip(&mut self) {
        self.clips.pop();
    }

    fn fill_image(&mut self, _image: &Image, ctm: &Matrix, _alpha: f64) {
        // Images occupy the unit square in image space.
        self.add(Rect::new(0.0, 0.0, 1.0, 1.0).transform(ctm));
    }

    fn fill_shading(&mut self, shading: &Shading, ctm: &Matrix, _alpha: f64) {
        let r = match shading.kind {
            ShadingKind::Axial { p0, p1 } => {
                let mut r = Rect::EMPTY;
                r.include_point(p0);
                r.include_point(p1);
                r
            }
            ShadingKind::Radial { p0, r0, p1, r1 } => {
                let mut r = Rect::EMPTY;
                r.include_point(Point::new(p0.x - r0, p0.y - r0));
                r.include_point(Point::new(p0.x + r0, p0.y + r0));
                r.include_point(Point::new(p1.x - r1, p1.y - r1));
                r.include_point(Point::new(p1.x + r1, p1.y + r1));
                r
            }
        };
        self.add(r.transform(ctm));
    }
}

/// Records a line per painting call; test observability.
#[derive(Debug, Default)]
pub struct TraceCanvas {
    pub log: Vec<String>,
    depth: usize,
}

impl TraceCanvas {
    pub fn new() -> Self {
        TraceCanvas::default()
    }

    fn record(&mut self, line: String) {
        self.log.push(format!("{}{}", "  ".repeat(self.depth), line));
    }
}

impl Canvas for TraceCanvas {
    fn fill_path(&mut self, path: &Path, even_odd: bool, ctm: &Matrix, color: Color, alpha: f64) {
        let b = path.bounds().transform(ctm);
        self.record(format!(
            "fill even_odd={} bounds=({:.1},{:.1})-({:.1},{:.1}) rgb=({:.2},{:.2},{:.2}) a={:.2}",
            even_odd, b.x0, b.y0, b.x1, b.y1, color.r, color.g, color.b, alpha
        ));
    }

    fn stroke_path(
        &mut self,
        path: &Path,
        stroke: &StrokeState,
        ctm: &Matrix,
        color: Color,
        alpha: f64,
    ) {
        let b = path.bounds().transform(ctm);
        self.record(format!(
            "stroke w={:.2} dashed={} bounds=({:.1},{:.1})-({:.1},{:.1}) rgb=({:.2},{:.2},{:.2}) a={:.2}",
            stroke.line_width,
            stroke.is_dashed(),
            b.x0,
            b.y0,
            b.x1,
            b.y1,
            color.r,
            color.g,
            color.b,
            alpha
        ));
    }

    fn clip_path(&mut self, path: &Path, even_odd: bool, ctm: &Matrix) {
        let b = path.bounds().transform(ctm);
        self.record(format!(
            "clip even_odd={} bounds=({:.1},{:.1})-({:.1},{:.1})",
            even_odd, b.x0, b.y0, b.x1, b.y1
        ));
        self.depth += 1;
    }

    fn pop_clip(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        self.record("pop clip".to_string());
    }

    fn fill_text(&mut self, run: &TextRun, _ctm: &Matrix, color: Color, alpha: f64) {
        self.record(format!(
            "text glyphs={} rgb=({:.2},{:.2},{:.2}) a={:.2}",
            run.glyphs.len(),
            color.r,
            color.g,
            color.b,
            alpha
        ));
    }

    fn fill_image(&mut self, image: &Image, _ctm: &Matrix, alpha: f64) {
        self.record(format!("image {}x{} a={:.2}", image.width, image.height, alpha));
    }

    fn fill_shading(&mut self, shading: &Shading, _ctm: &Matrix, alpha: f64) {
        let kind = match shading.kind {
            ShadingKind::Axial { .. } => "axial",
            ShadingKind::Radial { .. } => "radial",
        };
        self.record(format!("shading {kind} stops={} a={alpha:.2}", shading.stops.len()));
    }
}

/// Device-space coverage bounds of a fill, shared by backends that need a
/// quick conservative answer.
pub fn fill_device_bounds(path: &Path, ctm: &Matrix) -> Rect {
    let polys = raster::flatten_transformed(path, ctm, 1.0);
    raster::polys_bounds(&polys)
}

//! The raster backend: paints into a premultiplied ARGB32 [`Buffer`].

use super::canvas::{Canvas, Image, Shading, ShadingKind};
use super::color::Color;
use super::geometry::{Matrix, Point, Rect};
use super::path::{Path, StrokeState};
use super::pixmap::{Buffer, mul_255};
use super::raster::{self, Polyline};

/// One entry of the clip stack: an 8-bit coverage mask over the whole
/// buffer, already intersected with every enclosing clip.
struct ClipMask {
    coverage: Vec<u8>,
}

/// Canvas implementation that rasterizes into a caller-owned buffer.
pub struct RasterCanvas<'a> {
    buf: &'a mut Buffer,
    tolerance: f64,
    clips: Vec<ClipMask>,
}

impl<'a> RasterCanvas<'a> {
    pub fn new(buf: &'a mut Buffer, tolerance: f64) -> Self {
        RasterCanvas { buf, tolerance: tolerance.max(1e-3), clips: Vec::new() }
    }

    fn width(&self) -> i32 {
        self.buf.width() as i32
    }

    fn height(&self) -> i32 {
        self.buf.height() as i32
    }

    fn clip_coverage(&self, x: i32, y: i32) -> u8 {
        match self.clips.last() {
            None => 255,
            Some(m) => m.coverage[y as usize * self.buf.width() as usize + x as usize],
        }
    }

    fn fill_polys_blended(&mut self, polys: &[Polyline], even_odd: bool, argb: u32) {
        let (w, h) = (self.width(), self.height());
        let mut spans: Vec<(i32, i32, i32)> = Vec::new();
        raster::fill_polys(polys, even_odd, 0, 0, w, h, |y, x0, x1| {
            spans.push((y, x0, x1));
        });
        for (y, x0, x1) in spans {
            for x in x0..x1 {
                let cov = self.clip_coverage(x, y);
                if cov == 0 {
                    continue;
                }
                let px = if cov == 255 { argb } else { scale_argb(argb, cov) };
                self.buf.blend(x as u32, y as u32, px);
            }
        }
    }

    fn blend_pixel(&mut self, x: i32, y: i32, argb: u32) {
        let cov = self.clip_coverage(x, y);
        if cov == 0 {
            return;
        }
        let px = if cov == 255 { argb } else { scale_argb(argb, cov) };
        self.buf.blend(x as u32, y as u32, px);
    }

    /// Pixel bounds of the active clip (whole buffer when unclipped).
    fn clip_bounds(&self) -> (i32, i32, i32, i32) {
        match self.clips.last() {
            None => (0, 0, self.width(), self.height()),
            Some(m) => {
                let w = self.buf.width() as i32;
                let (mut x0, mut y0, mut x1, mut y1) = (self.width(), self.height(), 0, 0);
                for (i, &c) in m.coverage.iter().enumerate() {
                    if c > 0 {
                        let x = i as i32 % w;
                        let y = i as i32 / w;
                        x0 = x0.min(x);
                        y0 = y0.min(y);
                        x1 = x1.max(x + 1);
                        y1 = y1.max(y + 1);
                    }
                }
                if x0 >= x1 { (0, 0, 0, 0) } else { (x0, y0, x1, y1) }
            }
        }
    }
}

/// Scale a premultiplied ARGB word by an 8-bit coverage value.
fn scale_argb(argb: u32, cov: u8) -> u32 {
    let cov = cov as u32;
    (mul_255(argb >> 24, cov) << 24)
        | (mul_255((argb >> 16) & 0xff, cov) << 16)
        | (mul_255((argb >> 8) & 0xff, cov) << 8)
        | mul_255(argb & 0xff, cov)
}

impl Canvas for RasterCanvas<'_> {
    fn fill_path(&mut self, path: &Path, even_odd: bool, ctm: &Matrix, color: Color, alpha: f64) {
        if !ctm.is_finite() {
            return;
        }
        let polys = raster::flatten_transformed(path, ctm, self.tolerance);
        self.fill_polys_blended(&polys, even_odd, color.to_argb(alpha));
    }

    fn stroke_path(
        &mut self,
        path: &Path,
        stroke: &StrokeState,
        ctm: &Matrix,
        color: Color,
        alpha: f64,
    ) {
        if !ctm.is_finite() {
            return;
        }
        let expansion = ctm.expansion().max(1e-6);
        let mut polys = raster::flatten_transformed(path, ctm, self.tolerance);
        if stroke.is_dashed() {
            let pattern: Vec<f64> =
                stroke.dash_pattern.iter().map(|d| d * expansion).collect();
            polys = raster::dash_polys(&polys, &pattern, stroke.dash_phase * expansion);
        }
        let width = stroke.line_width * expansion;
        let quads = raster::stroke_polys(&polys, width, stroke.cap);
        self.fill_polys_blended(&quads, false, color.to_argb(alpha));
    }

    fn clip_path(&mut self, path: &Path, even_odd: bool, ctm: &Matrix) {
        let size = self.buf.width() as usize * self.buf.height() as usize;
        let mut coverage = vec![0u8; size];
        if ctm.is_finite() {
            let polys = raster::flatten_transformed(path, ctm, self.tolerance);
            let w = self.buf.width() as i32;
            raster::fill_polys(&polys, even_odd, 0, 0, w, self.height(), |y, x0, x1| {
                let off = y as usize * w as usize;
                coverage[off + x0 as usize..off + x1 as usize].fill(255);
            });
        }
        if let Some(prev) = self.clips.last() {
            for (c, p) in coverage.iter_mut().zip(prev.coverage.iter()) {
                *c = (*c).min(*p);
            }
        }
        self.clips.push(ClipMask { coverage });
    }

    fn pop_clip(&mut self) {
        self.clips.pop();
    }

    fn fill_image(&mut self, image: &Image, ctm: &Matrix, alpha: f64) {
        if !ctm.is_finite() {
            return;
        }
        let Some(inv) = ctm.invert() else { return };
        // Device extent of the unit image square.
        let dev = Rect::new(0.0, 0.0, 1.0, 1.0).transform(ctm);
        let x0 = (dev.x0.floor() as i64).max(0) as i32;
        let y0 = (dev.y0.floor() as i64).max(0) as i32;
        let x1 = (dev.x1.ceil() as i64).min(self.width() as i64) as i32;
        let y1 = (dev.y1.ceil() as i64).min(self.height() as i64) as i32;
        let alpha = alpha.clamp(0.0, 1.0);
        for y in y0..y1 {
            for x in x0..x1 {
                let u = inv.transform_point(Point::new(x as f64 + 0.5, y as f64 + 0.5));
                if !(0.0..1.0).contains(&u.x) || !(0.0..1.0).contains(&u.y) {
                    continue;
                }
                // Image rows run top-down while the unit square's y runs up.
                let sx = ((u.x * image.width as f64) as u32).min(image.width - 1);
                let sy = (((1.0 - u.y) * image.height as f64) as u32).min(image.height - 1);
                let [r, g, b, a] = image.pixel(sx, sy);
                let a_f = a as f64 / 255.0 * alpha;
                if a_f <= 0.0 {
                    continue;
                }
                let c = Color::rgb(r as f64 / 255.0, g as f64 / 255.0, b as f64 / 255.0);
                self.blend_pixel(x, y, c.to_argb(a_f));
            }
        }
    }

    fn fill_shading(&mut self, shading: &Shading, ctm: &Matrix, alpha: f64) {
        if !ctm.is_finite() {
            return;
        }
        let Some(inv) = ctm.invert() else { return };
        let (x0, y0, x1, y1) = self.clip_bounds();
        for y in y0..y1 {
            for x in x0..x1 {
                let p = inv.transform_point(Point::new(x as f64 + 0.5, y as f64 + 0.5));
                let Some(t) = shading_param(shading, p) else { continue };
                self.blend_pixel(x, y, shading.color_at(t).to_argb(alpha));
            }
        }
    }
}

/// Parameter of point `p` along the shading axis, or `None` when the point
/// is outside the (possibly extended) shading geometry.
fn shading_param(sh: &Shading, p: Point) -> Option<f64> {
    match sh.kind {
        ShadingKind::Axial { p0, p1 } => {
            let d = p1 - p0;
            let len2 = d.x * d.x + d.y * d.y;
            if len2 < 1e-12 {
                return None;
            }
            let t = ((p.x - p0.x) * d.x + (p.y - p0.y) * d.y) / len2;
            clamp_extend(t, sh.extend_start, sh.extend_end)
        }
        ShadingKind::Radial { p0, r0, p1, r1 } => {
            let f = p - p0;
            let d = p1 - p0;
            let dr = r1 - r0;
            let a = d.x * d.x + d.y * d.y - dr * dr;
            let b = f.x * d.x + f.y * d.y + r0 * dr;
            let c = f.x * f.x + f.y * f.y - r0 * r0;
            let s = if a.abs() < 1e-9 {
                if b.abs() < 1e-12 {
                    return None;
                }
                c / (2.0 * b)
            } else {
                let disc = b * b - a * c;
                if disc < 0.0 {
                    return None;
                }
                let root = disc.sqrt();
                // Prefer the larger root with a non-negative radius.
                let s1 = (b + root) / a;
                let s2 = (b - root) / a;
                if r0 + s1 * dr >= 0.0 {
                    s1
                } else if r0 + s2 * dr >= 0.0 {
                    s2
                } else {
                    return None;
                }
            };
            clamp_extend(s, sh.extend_start, sh.extend_end)
        }
    }
}

fn clamp_extend(t: f64, extend_start: bool, extend_end: bool) -> Option<f64> {
    if t < 0.0 {
        if extend_start { Some(0.0) } else { None }
    } else if t > 1.0 {
        if extend_end { Some(1.0) } else { None }
    } else {
        Some(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn canvas_buffer() -> Buffer {
        let mut b = Buffer::new(20, 20).unwrap();
        b.fill(0xffffffff);
        b
    }

    #[test]
    fn fill_square_colors_center() {
        let mut buf = canvas_buffer();
        let mut c = RasterCanvas::new(&mut buf, 0.1);
        let mut p = Path::new();
        p.rect(5.0, 5.0, 10.0, 10.0);
        c.fill_path(&p, false, &Matrix::IDENTITY, Color::rgb(0.0, 1.0, 0.0), 1.0);
        assert_eq!(buf.get(10, 10), 0xff00ff00);
        assert_eq!(buf.get(1, 1), 0xffffffff);
    }

    #[test]
    fn clip_restricts_fill() {
        let mut buf = canvas_buffer();
        let mut c = RasterCanvas::new(&mut buf, 0.1);
        let mut clip = Path::new();
        clip.rect(0.0, 0.0, 10.0, 20.0);
        c.clip_path(&clip, false, &Matrix::IDENTITY);
        let mut p = Path::new();
        p.rect(0.0, 0.0, 20.0, 20.0);
        c.fill_path(&p, false, &Matrix::IDENTITY, Color::BLACK, 1.0);
        c.pop_clip();
        assert_eq!(buf.get(5, 10), 0xff000000);
        assert_eq!(buf.get(15, 10), 0xffffffff);
    }

    #[test]
    fn nested_clips_intersect() {
        let mut buf = canvas_buffer();
        let mut c = RasterCanvas::new(&mut buf, 0.1);
        let mut a = Path::new();
        a.rect(0.0, 0.0, 10.0, 20.0);
        c.clip_path(&a, false, &Matrix::IDENTITY);
        let mut b = Path::new();
        b.rect(0.0, 0.0, 20.0, 10.0);
        c.clip_path(&b, false, &Matrix::IDENTITY);
        let mut p = Path::new();
        p.rect(0.0, 0.0, 20.0, 20.0);
        c.fill_path(&p, false, &Matrix::IDENTITY, Color::BLACK, 1.0);
        assert_eq!(buf.get(5, 5), 0xff000000);
        assert_eq!(buf.get(5, 15), 0xffffffff);
        assert_eq!(buf.get(15, 5), 0xffffffff);
    }

    #[test]
    fn image_draws_into_unit_square() {
        let mut buf = canvas_buffer();
        let mut c = RasterCanvas::new(&mut buf, 0.1);
        // 1x1 opaque blue image stretched over a 10x10 device area.
        let img = Image::new(1, 1, Bytes::from_static(&[0, 0, 255, 255])).unwrap();
        let ctm = Matrix::scale(10.0, 10.0).concat(&Matrix::translate(5.0, 5.0));
        c.fill_image(&img, &ctm, 1.0);
        assert_eq!(buf.get(10, 10), 0xff0000ff);
        assert_eq!(buf.get(2, 2), 0xffffffff);
    }

    #[test]
    fn axial_shading_gradient_direction() {
        let mut buf = canvas_buffer();
        let mut c = RasterCanvas::new(&mut buf, 0.1);
        let sh = Shading {
            kind: ShadingKind::Axial { p0: Point::ORIGIN, p1: Point::new(20.0, 0.0) },
            extend_start: true,
            extend_end: true,
            stops: vec![(0.0, Color::BLACK), (1.0, Color::WHITE)],
        };
        c.fill_shading(&sh, &Matrix::IDENTITY, 1.0);
        let left = buf.get(1, 10) & 0xff;
        let right = buf.get(18, 10) & 0xff;
        assert!(left < 40, "left = {left}");
        assert!(right > 215, "right = {right}");
    }

    #[test]
    fn radial_shading_outside_not_painted() {
        let mut buf = canvas_buffer();
        let mut c = RasterCanvas::new(&mut buf, 0.1);
        let sh = Shading {
            kind: ShadingKind::Radial {
                p0: Point::new(10.0, 10.0),
                r0: 0.0,
                p1: Point::new(10.0, 10.0),
                r1: 5.0,
            },
            extend_start: false,
            extend_end: false,
            stops: vec![(0.0, Color::BLACK), (1.0, Color::BLACK)],
        };
        c.fill_shading(&sh, &Matrix::IDENTITY, 1.0);
        assert_eq!(buf.get(10, 10), 0xff000000);
        assert_eq!(buf.get(1, 1), 0xffffffff);
    }
}

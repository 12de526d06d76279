//! Encapsulated PostScript backend.
//!
//! The document prolog flips the coordinate system so the body can be
//! written in the same y-down device space the other backends use.
//! PostScript has no transparency; alpha below a small threshold drops
//! the drawing, anything else paints opaque.

use std::fmt::Write as _;

use super::canvas::{Canvas, Image, Shading, fill_device_bounds};
use super::color::Color;
use super::error::Result;
use super::geometry::{Matrix, Rect};
use super::output::Output;
use super::path::{LineCap, LineJoin, Path, PathElement, StrokeState};

pub struct PostscriptCanvas {
    out: Output,
    body: String,
    width: f64,
    height: f64,
    clip_depth: usize,
    clip_bounds: Vec<Rect>,
    title: String,
}

impl PostscriptCanvas {
    pub fn new(out: Output, width: f64, height: f64) -> PostscriptCanvas {
        PostscriptCanvas {
            out,
            body: String::new(),
            width,
            height,
            clip_depth: 0,
            clip_bounds: Vec::new(),
            title: "inkstream output".to_string(),
        }
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    fn emit_path(&mut self, path: &Path, ctm: &Matrix) {
        for el in path.elements() {
            match *el {
                PathElement::MoveTo(p) => {
                    let p = p.transform(ctm);
                    let _ = writeln!(self.body, "{:.3} {:.3} moveto", p.x, p.y);
                }
                PathElement::LineTo(p) => {
                    let p = p.transform(ctm);
                    let _ = writeln!(self.body, "{:.3} {:.3} lineto", p.x, p.y);
                }
                PathElement::CurveTo(c1, c2, p) => {
                    let (c1, c2, p) = (c1.transform(ctm), c2.transform(ctm), p.transform(ctm));
                    let _ = writeln!(
                        self.body,
                        "{:.3} {:.3} {:.3} {:.3} {:.3} {:.3} curveto",
                        c1.x, c1.y, c2.x, c2.y, p.x, p.y
                    );
                }
                PathElement::Close => self.body.push_str("closepath\n"),
            }
        }
    }

    fn set_color(&mut self, color: Color) {
        let _ = writeln!(self.body, "{:.4} {:.4} {:.4} setrgbcolor", color.r, color.g, color.b);
    }

    fn current_clip(&self) -> Rect {
        *self
            .clip_bounds
            .last()
            .unwrap_or(&Rect::new(0.0, 0.0, self.width, self.height))
    }
}

const ALPHA_DROP: f64 = 0.004;

impl Canvas for PostscriptCanvas {
    fn fill_path(&mut self, path: &Path, even_odd: bool, ctm: &Matrix, color: Color, alpha: f64) {
        if !ctm.is_finite() || alpha < ALPHA_DROP {
            return;
        }
        self.body.push_str("newpath\n");
        self.emit_path(path, ctm);
        self.set_color(color);
        self.body.push_str(if even_odd { "eofill\n" } else { "fill\n" });
    }

    fn stroke_path(
        &mut self,
        path: &Path,
        stroke: &StrokeState,
        ctm: &Matrix,
        color: Color,
        alpha: f64,
    ) {
        if !ctm.is_finite() || alpha < ALPHA_DROP {
            return;
        }
        let expansion = ctm.expansion().max(1e-6);
        self.body.push_str("newpath\n");
        self.emit_path(path, ctm);
        self.set_color(color);
        let _ = writeln!(self.body, "{:.3} setlinewidth", stroke.line_width * expansion);
        let cap = match stroke.cap {
            LineCap::Butt => 0,
            LineCap::Round => 1,
            LineCap::Square => 2,
        };
        let join = match stroke.join {
            LineJoin::Miter => 0,
            LineJoin::Round => 1,
            LineJoin::Bevel => 2,
        };
        let _ = writeln!(self.body, "{cap} setlinecap {join} setlinejoin");
        if stroke.is_dashed() {
            let dashes: Vec<String> = stroke
                .dash_pattern
                .iter()
                .map(|d| format!("{:.3}", d * expansion))
                .collect();
            let _ = writeln!(
                self.body,
                "[{}] {:.3} setdash",
                dashes.join(" "),
                stroke.dash_phase * expansion
            );
        } else {
            self.body.push_str("[] 0 setdash\n");
        }
        self.body.push_str("stroke\n");
    }

    fn clip_path(&mut self, path: &Path, even_odd: bool, ctm: &Matrix) {
        self.body.push_str("gsave\nnewpath\n");
        self.emit_path(path, ctm);
        self.body.push_str(if even_odd { "eoclip\n" } else { "clip\n" });
        self.body.push_str("newpath\n");
        self.clip_depth += 1;
        let bounds = self.current_clip().intersect(&fill_device_bounds(path, ctm));
        self.clip_bounds.push(bounds);
    }

    fn pop_clip(&mut self) {
        if self.clip_depth > 0 {
            self.clip_depth -= 1;
            self.clip_bounds.pop();
            self.body.push_str("grestore\n");
        }
    }

    fn fill_image(&mut self, image: &Image, ctm: &Matrix, alpha: f64) {
        if !ctm.is_finite() || alpha < ALPHA_DROP {
            return;
        }
        let (w, h) = (image.width as usize, image.height as usize);
        // Alpha composited against white; PostScript is opaque-only.
        let mut hex = String::with_capacity(w * h * 6);
        for (i, px) in image.rgba.chunks_exact(4).enumerate() {
            let a = px[3] as u32;
            for ch in 0..3 {
                let v = (px[ch] as u32 * a + 255 * (255 - a)) / 255;
                let _ = write!(hex, "{v:02x}");
            }
            if i % 12 == 11 {
                hex.push('\n');
            }
        }
        let _ = writeln!(
            self.body,
            "gsave\n[{:.4} {:.4} {:.4} {:.4} {:.4} {:.4}] concat",
            ctm.a, ctm.b, ctm.c, ctm.d, ctm.e, ctm.f
        );
        let _ = writeln!(
            self.body,
            "{w} {h} 8 [{w} 0 0 -{h} 0 {h}] {{<\n{hex}\n>}} false 3 colorimage\ngrestore"
        );
    }

    fn fill_shading(&mut self, shading: &Shading, _ctm: &Matrix, alpha: f64) {
        if alpha < ALPHA_DROP {
            return;
        }
        let r = self.current_clip();
        if r.is_empty() {
            return;
        }
        self.body.push_str("newpath\n");
        let _ = writeln!(
            self.body,
            "{:.3} {:.3} moveto {:.3} {:.3} lineto {:.3} {:.3} lineto {:.3} {:.3} lineto closepath",
            r.x0, r.y0, r.x1, r.y0, r.x1, r.y1, r.x0, r.y1
        );
        self.set_color(shading.mid_color());
        self.body.push_str("fill\n");
    }

    fn finish(&mut self) -> Result<()> {
        let header = format!(
            "%!PS-Adobe-3.0 EPSF-3.0\n\
             %%Title: {}\n\
             %%BoundingBox: 0 0 {} {}\n\
             %%EndComments\n\
             0 {:.3} translate\n1 -1 scale\n",
            self.title,
            self.width.ceil() as i64,
            self.height.ceil() as i64,
            self.height
        );
        self.out.write_str(&header)?;
        self.out.write_str(&self.body)?;
        for _ in 0..self.clip_depth {
            self.out.write_str("grestore\n")?;
        }
        self.out.write_str("showpage\n%%EOF\n")?;
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::geometry::Point;

    fn render_to_string(f: impl FnOnce(&mut PostscriptCanvas)) -> String {
        let mut c = PostscriptCanvas::new(Output::to_buffer(), 200.0, 100.0);
        f(&mut c);
        c.finish().unwrap();
        String::from_utf8(std::mem::replace(&mut c.out, Output::to_buffer()).into_buffer()).unwrap()
    }

    #[test]
    fn header_and_flip() {
        let eps = render_to_string(|_| {});
        assert!(eps.starts_with("%!PS-Adobe-3.0 EPSF-3.0"));
        assert!(eps.contains("%%BoundingBox: 0 0 200 100"));
        assert!(eps.contains("1 -1 scale"));
        assert!(eps.trim_end().ends_with("%%EOF"));
    }

    #[test]
    fn fill_uses_eofill_for_even_odd() {
        let eps = render_to_string(|c| {
            let mut p = Path::new();
            p.rect(0.0, 0.0, 10.0, 10.0);
            c.fill_path(&p, true, &Matrix::IDENTITY, Color::rgb(0.0, 0.0, 1.0), 1.0);
        });
        assert!(eps.contains("eofill"));
        assert!(eps.contains("0.0000 0.0000 1.0000 setrgbcolor"));
    }

    #[test]
    fn unbalanced_clip_closed_at_finish() {
        let eps = render_to_string(|c| {
            let mut p = Path::new();
            p.move_to(Point::new(0.0, 0.0));
            p.line_to(Point::new(5.0, 0.0));
            p.line_to(Point::new(5.0, 5.0));
            p.close();
            c.clip_path(&p, false, &Matrix::IDENTITY);
        });
        assert_eq!(eps.matches("gsave").count(), eps.matches("grestore").count());
    }

    #[test]
    fn invisible_alpha_dropped() {
        let eps = render_to_string(|c| {
            let mut p = Path::new();
            p.rect(0.0, 0.0, 10.0, 10.0);
            c.fill_path(&p, false, &Matrix::IDENTITY, Color::BLACK, 0.0);
        });
        assert!(!eps.contains("fill\n"));
    }
}

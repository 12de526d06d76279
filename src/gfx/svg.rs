//! SVG vector backend.
//!
//! Geometry is written in device space (y-down, like SVG itself), so the
//! generated markup needs no global transform. Clips become `<clipPath>`
//! definitions wrapping the subsequent content in groups.

use std::fmt::Write as _;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use super::canvas::{Canvas, Image, Shading, fill_device_bounds};
use super::color::Color;
use super::error::{Error, Result};
use super::geometry::{Matrix, Rect};
use super::output::Output;
use super::path::{LineCap, LineJoin, Path, PathElement, StrokeState};

pub struct SvgCanvas {
    out: Output,
    body: String,
    width: f64,
    height: f64,
    next_clip: usize,
    clip_bounds: Vec<Rect>,
    error: Option<Error>,
}

impl SvgCanvas {
    pub fn new(out: Output, width: f64, height: f64) -> SvgCanvas {
        SvgCanvas {
            out,
            body: String::new(),
            width,
            height,
            next_clip: 0,
            clip_bounds: Vec::new(),
            error: None,
        }
    }

    fn path_data(path: &Path, ctm: &Matrix) -> String {
        let mut d = String::new();
        for el in path.elements() {
            match *el {
                PathElement::MoveTo(p) => {
                    let p = p.transform(ctm);
                    let _ = write!(d, "M {:.3} {:.3} ", p.x, p.y);
                }
                PathElement::LineTo(p) => {
                    let p = p.transform(ctm);
                    let _ = write!(d, "L {:.3} {:.3} ", p.x, p.y);
                }
                PathElement::CurveTo(c1, c2, p) => {
                    let (c1, c2, p) = (c1.transform(ctm), c2.transform(ctm), p.transform(ctm));
                    let _ = write!(
                        d,
                        "C {:.3} {:.3} {:.3} {:.3} {:.3} {:.3} ",
                        c1.x, c1.y, c2.x, c2.y, p.x, p.y
                    );
                }
                PathElement::Close => d.push_str("Z "),
            }
        }
        d.trim_end().to_string()
    }

    fn hex(color: Color) -> String {
        format!(
            "#{:02x}{:02x}{:02x}",
            (color.r * 255.0 + 0.5) as u8,
            (color.g * 255.0 + 0.5) as u8,
            (color.b * 255.0 + 0.5) as u8
        )
    }

    fn current_clip(&self) -> Rect {
        *self
            .clip_bounds
            .last()
            .unwrap_or(&Rect::new(0.0, 0.0, self.width, self.height))
    }
}

impl Canvas for SvgCanvas {
    fn fill_path(&mut self, path: &Path, even_odd: bool, ctm: &Matrix, color: Color, alpha: f64) {
        if !ctm.is_finite() {
            return;
        }
        let rule = if even_odd { " fill-rule=\"evenodd\"" } else { "" };
        let opacity = if alpha < 1.0 { format!(" fill-opacity=\"{alpha:.3}\"") } else { String::new() };
        let _ = writeln!(
            self.body,
            "<path d=\"{}\" fill=\"{}\"{rule}{opacity}/>",
            Self::path_data(path, ctm),
            Self::hex(color)
        );
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
        let mut attrs = format!(
            " stroke=\"{}\" stroke-width=\"{:.3}\" fill=\"none\"",
            Self::hex(color),
            stroke.line_width * expansion
        );
        if alpha < 1.0 {
            let _ = write!(attrs, " stroke-opacity=\"{alpha:.3}\"");
        }
        match stroke.cap {
            LineCap::Round => attrs.push_str(" stroke-linecap=\"round\""),
            LineCap::Square => attrs.push_str(" stroke-linecap=\"square\""),
            LineCap::Butt => {}
        }
        match stroke.join {
            LineJoin::Round => attrs.push_str(" stroke-linejoin=\"round\""),
            LineJoin::Bevel => attrs.push_str(" stroke-linejoin=\"bevel\""),
            LineJoin::Miter => {}
        }
        if stroke.is_dashed() {
            let dashes: Vec<String> = stroke
                .dash_pattern
                .iter()
                .map(|d| format!("{:.3}", d * expansion))
                .collect();
            let _ = write!(attrs, " stroke-dasharray=\"{}\"", dashes.join(","));
            if stroke.dash_phase != 0.0 {
                let _ = write!(attrs, " stroke-dashoffset=\"{:.3}\"", stroke.dash_phase * expansion);
            }
        }
        let _ = writeln!(self.body, "<path d=\"{}\"{attrs}/>", Self::path_data(path, ctm));
    }

    fn clip_path(&mut self, path: &Path, even_odd: bool, ctm: &Matrix) {
        let id = self.next_clip;
        self.next_clip += 1;
        let rule = if even_odd { " clip-rule=\"evenodd\"" } else { "" };
        let _ = writeln!(
            self.body,
            "<clipPath id=\"clip{id}\"><path d=\"{}\"{rule}/></clipPath>",
            Self::path_data(path, ctm)
        );
        let _ = writeln!(self.body, "<g clip-path=\"url(#clip{id})\">");
        let bounds = self.current_clip().intersect(&fill_device_bounds(path, ctm));
        self.clip_bounds.push(bounds);
    }

    fn pop_clip(&mut self) {
        if self.clip_bounds.pop().is_some() {
            self.body.push_str("</g>\n");
        }
    }

    fn fill_image(&mut self, image: &Image, ctm: &Matrix, alpha: f64) {
        if !ctm.is_finite() {
            return;
        }
        let mut png = Vec::new();
        let enc = image::codecs::png::PngEncoder::new(&mut png);
        if image::ImageEncoder::write_image(
            enc,
            &image.rgba,
            image.width,
            image.height,
            image::ExtendedColorType::Rgba8,
        )
        .is_err()
        {
            return;
        }
        // The image element's own y axis runs down; flip it into the y-up
        // unit square the transform expects.
        let m = Matrix::new(1.0, 0.0, 0.0, -1.0, 0.0, 1.0).concat(ctm);
        let opacity = if alpha < 1.0 { format!(" opacity=\"{alpha:.3}\"") } else { String::new() };
        let _ = writeln!(
            self.body,
            "<image transform=\"matrix({:.4} {:.4} {:.4} {:.4} {:.4} {:.4})\" x=\"0\" y=\"0\" \
             width=\"1\" height=\"1\" preserveAspectRatio=\"none\"{opacity} \
             href=\"data:image/png;base64,{}\"/>",
            m.a,
            m.b,
            m.c,
            m.d,
            m.e,
            m.f,
            BASE64.encode(&png)
        );
    }

    fn fill_shading(&mut self, shading: &Shading, _ctm: &Matrix, alpha: f64) {
        // Flat approximation: the ramp's mid color over the active clip.
        let r = self.current_clip();
        if r.is_empty() {
            return;
        }
        let opacity = if alpha < 1.0 { format!(" fill-opacity=\"{alpha:.3}\"") } else { String::new() };
        let _ = writeln!(
            self.body,
            "<rect x=\"{:.3}\" y=\"{:.3}\" width=\"{:.3}\" height=\"{:.3}\" fill=\"{}\"{opacity}/>",
            r.x0,
            r.y0,
            r.width(),
            r.height(),
            Self::hex(shading.mid_color())
        );
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        self.out.write_str(&format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w:.2}\" height=\"{h:.2}\" \
             viewBox=\"0 0 {w:.2} {h:.2}\">\n",
            w = self.width,
            h = self.height
        ))?;
        self.out.write_str(&self.body)?;
        for _ in 0..self.clip_bounds.len() {
            self.out.write_str("</g>\n")?;
        }
        self.out.write_str("</svg>\n")?;
        self.out.flush()
    }
}

//! Single-page PDF vector backend.
//!
//! Drawing calls append to a content stream written in the same y-down
//! device space as the other backends (a flip is prepended). The document
//! skeleton, image XObjects, ExtGState dictionaries, xref table and
//! trailer are assembled in `finish`.

use std::fmt::Write as _;
use std::io::Write as _;

use flate2::Compression;
use flate2::write::ZlibEncoder;

use super::canvas::{Canvas, Image, Shading, fill_device_bounds};
use super::color::Color;
use super::error::{Error, Result};
use super::geometry::{Matrix, Rect};
use super::output::Output;
use super::path::{LineCap, LineJoin, Path, PathElement, StrokeState};

pub struct PdfCanvas {
    out: Output,
    content: String,
    width: f64,
    height: f64,
    clip_depth: usize,
    clip_bounds: Vec<Rect>,
    // Deduplicated (ca, CA) pairs, referenced as /GS1, /GS2, ...
    alphas: Vec<(f64, f64)>,
    images: Vec<Image>,
}

impl PdfCanvas {
    pub fn new(out: Output, width: f64, height: f64) -> PdfCanvas {
        PdfCanvas {
            out,
            content: String::new(),
            width,
            height,
            clip_depth: 0,
            clip_bounds: Vec::new(),
            alphas: Vec::new(),
            images: Vec::new(),
        }
    }

    fn emit_path(&mut self, path: &Path, ctm: &Matrix) {
        for el in path.elements() {
            match *el {
                PathElement::MoveTo(p) => {
                    let p = p.transform(ctm);
                    let _ = writeln!(self.content, "{:.3} {:.3} m", p.x, p.y);
                }
                PathElement::LineTo(p) => {
                    let p = p.transform(ctm);
                    let _ = writeln!(self.content, "{:.3} {:.3} l", p.x, p.y);
                }
                PathElement::CurveTo(c1, c2, p) => {
                    let (c1, c2, p) = (c1.transform(ctm), c2.transform(ctm), p.transform(ctm));
                    let _ = writeln!(
                        self.content,
                        "{:.3} {:.3} {:.3} {:.3} {:.3} {:.3} c",
                        c1.x, c1.y, c2.x, c2.y, p.x, p.y
                    );
                }
                PathElement::Close => self.content.push_str("h\n"),
            }
        }
    }

    fn alpha_gs(&mut self, ca: f64, cap: f64) {
        let key = (quantize(ca), quantize(cap));
        let idx = match self.alphas.iter().position(|&(a, b)| (quantize(a), quantize(b)) == key) {
            Some(i) => i,
            None => {
                self.alphas.push((ca, cap));
                self.alphas.len() - 1
            }
        };
        let _ = writeln!(self.content, "/GS{} gs", idx + 1);
    }

    fn current_clip(&self) -> Rect {
        *self
            .clip_bounds
            .last()
            .unwrap_or(&Rect::new(0.0, 0.0, self.width, self.height))
    }
}

fn quantize(a: f64) -> u32 {
    (a.clamp(0.0, 1.0) * 1000.0) as u32
}

fn flate(data: &[u8]) -> Result<Vec<u8>> {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data)?;
    enc.finish().map_err(Error::Io)
}

impl Canvas for PdfCanvas {
    fn fill_path(&mut self, path: &Path, even_odd: bool, ctm: &Matrix, color: Color, alpha: f64) {
        if !ctm.is_finite() {
            return;
        }
        self.content.push_str("q\n");
        if alpha < 1.0 {
            self.alpha_gs(alpha, 1.0);
        }
        let _ = writeln!(self.content, "{:.4} {:.4} {:.4} rg", color.r, color.g, color.b);
        self.emit_path(path, ctm);
        self.content.push_str(if even_odd { "f*\n" } else { "f\n" });
        self.content.push_str("Q\n");
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
        self.content.push_str("q\n");
        if alpha < 1.0 {
            self.alpha_gs(1.0, alpha);
        }
        let _ = writeln!(self.content, "{:.4} {:.4} {:.4} RG", color.r, color.g, color.b);
        let _ = writeln!(self.content, "{:.3} w", stroke.line_width * expansion);
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
        let _ = writeln!(self.content, "{cap} J {join} j");
        if stroke.is_dashed() {
            let dashes: Vec<String> = stroke
                .dash_pattern
                .iter()
                .map(|d| format!("{:.3}", d * expansion))
                .collect();
            let _ = writeln!(
                self.content,
                "[{}] {:.3} d",
                dashes.join(" "),
                stroke.dash_phase * expansion
            );
        }
        self.emit_path(path, ctm);
        self.content.push_str("S\nQ\n");
    }

    fn clip_path(&mut self, path: &Path, even_odd: bool, ctm: &Matrix) {
        self.content.push_str("q\n");
        self.emit_path(path, ctm);
        self.content.push_str(if even_odd { "W* n\n" } else { "W n\n" });
        self.clip_depth += 1;
        let bounds = self.current_clip().intersect(&fill_device_bounds(path, ctm));
        self.clip_bounds.push(bounds);
    }

    fn pop_clip(&mut self) {
        if self.clip_depth > 0 {
            self.clip_depth -= 1;
            self.clip_bounds.pop();
            self.content.push_str("Q\n");
        }
    }

    fn fill_image(&mut self, image: &Image, ctm: &Matrix, alpha: f64) {
        if !ctm.is_finite() {
            return;
        }
        self.images.push(image.clone());
        let n = self.images.len();
        self.content.push_str("q\n");
        if alpha < 1.0 {
            self.alpha_gs(alpha, 1.0);
        }
        let _ = writeln!(
            self.content,
            "{:.4} {:.4} {:.4} {:.4} {:.4} {:.4} cm",
            ctm.a, ctm.b, ctm.c, ctm.d, ctm.e, ctm.f
        );
        let _ = writeln!(self.content, "/Im{n} Do");
        self.content.push_str("Q\n");
    }

    fn fill_shading(&mut self, shading: &Shading, _ctm: &Matrix, alpha: f64) {
        let r = self.current_clip();
        if r.is_empty() {
            return;
        }
        let c = shading.mid_color();
        self.content.push_str("q\n");
        if alpha < 1.0 {
            self.alpha_gs(alpha, 1.0);
        }
        let _ = writeln!(self.content, "{:.4} {:.4} {:.4} rg", c.r, c.g, c.b);
        let _ = writeln!(self.content, "{:.3} {:.3} {:.3} {:.3} re f", r.x0, r.y0, r.width(), r.height());
        self.content.push_str("Q\n");
    }

    fn finish(&mut self) -> Result<()> {
        let mut content = format!("1 0 0 -1 0 {:.3} cm\n", self.height);
        content.push_str(&self.content);
        for _ in 0..self.clip_depth {
            content.push_str("Q\n");
        }
        let stream = flate(content.as_bytes())?;

        // Object numbering: 1 catalog, 2 pages, 3 page, 4 content,
        // 5.. ExtGStates, then image/smask pairs.
        let first_gs = 5u32;
        let first_image = first_gs + self.alphas.len() as u32;

        let mut body: Vec<u8> = Vec::new();
        let mut offsets: Vec<usize> = Vec::new();
        let mut push = |body: &mut Vec<u8>, offsets: &mut Vec<usize>, obj: &[u8]| {
            offsets.push(body.len());
            body.extend_from_slice(obj);
        };

        let header = b"%PDF-1.4\n".to_vec();

        push(&mut body, &mut offsets, b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");
        push(&mut body, &mut offsets, b"2 0 obj\n<< /Type /Pages /Kids [3 0 R] /Count 1 >>\nendobj\n");

        let mut resources = String::new();
        if !self.alphas.is_empty() {
            resources.push_str(" /ExtGState <<");
            for (i, _) in self.alphas.iter().enumerate() {
                let _ = write!(resources, " /GS{} {} 0 R", i + 1, first_gs + i as u32);
            }
            resources.push_str(" >>");
        }
        if !self.images.is_empty() {
            resources.push_str(" /XObject <<");
            for (i, _) in self.images.iter().enumerate() {
                let _ = write!(resources, " /Im{} {} 0 R", i + 1, first_image + 2 * i as u32);
            }
            resources.push_str(" >>");
        }
        let page = format!(
            "3 0 obj\n<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {:.2} {:.2}] \
             /Resources <<{resources} >> /Contents 4 0 R >>\nendobj\n",
            self.width, self.height
        );
        push(&mut body, &mut offsets, page.as_bytes());

        let mut content_obj = format!(
            "4 0 obj\n<< /Length {} /Filter /FlateDecode >>\nstream\n",
            stream.len()
        )
        .into_bytes();
        content_obj.extend_from_slice(&stream);
        content_obj.extend_from_slice(b"\nendstream\nendobj\n");
        push(&mut body, &mut offsets, &content_obj);

        for (i, &(ca, cap)) in self.alphas.iter().enumerate() {
            let obj = format!(
                "{} 0 obj\n<< /Type /ExtGState /ca {ca:.3} /CA {cap:.3} >>\nendobj\n",
                first_gs + i as u32
            );
            push(&mut body, &mut offsets, obj.as_bytes());
        }

        for (i, img) in self.images.iter().enumerate() {
            let num = first_image + 2 * i as u32;
            let mut rgb = Vec::with_capacity(img.rgba.len() / 4 * 3);
            let mut gray = Vec::with_capacity(img.rgba.len() / 4);
            for px in img.rgba.chunks_exact(4) {
                rgb.extend_from_slice(&px[..3]);
                gray.push(px[3]);
            }
            let rgb_z = flate(&rgb)?;
            let mut obj = format!(
                "{num} 0 obj\n<< /Type /XObject /Subtype /Image /Width {} /Height {} \
                 /ColorSpace /DeviceRGB /BitsPerComponent 8 /Filter /FlateDecode \
                 /SMask {} 0 R /Length {} >>\nstream\n",
                img.width,
                img.height,
                num + 1,
                rgb_z.len()
            )
            .into_bytes();
            obj.extend_from_slice(&rgb_z);
            obj.extend_from_slice(b"\nendstream\nendobj\n");
            push(&mut body, &mut offsets, &obj);

            let gray_z = flate(&gray)?;
            let mut smask = format!(
                "{} 0 obj\n<< /Type /XObject /Subtype /Image /Width {} /Height {} \
                 /ColorSpace /DeviceGray /BitsPerComponent 8 /Filter /FlateDecode \
                 /Length {} >>\nstream\n",
                num + 1,
                img.width,
                img.height,
                gray_z.len()
            )
            .into_bytes();
            smask.extend_from_slice(&gray_z);
            smask.extend_from_slice(b"\nendstream\nendobj\n");
            push(&mut body, &mut offsets, &smask);
        }

        let xref_off = header.len() + body.len();
        let count = offsets.len() + 1;
        let mut xref = format!("xref\n0 {count}\n0000000000 65535 f \n");
        for off in &offsets {
            let _ = write!(xref, "{:010} 00000 n \n", header.len() + off);
        }
        let trailer = format!(
            "trailer\n<< /Size {count} /Root 1 0 R >>\nstartxref\n{xref_off}\n%%EOF\n"
        );

        self.out.write(&header)?;
        self.out.write(&body)?;
        self.out.write_str(&xref)?;
        self.out.write_str(&trailer)?;
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn render_to_bytes(f: impl FnOnce(&mut PdfCanvas)) -> Vec<u8> {
        let mut c = PdfCanvas::new(Output::to_buffer(), 100.0, 100.0);
        f(&mut c);
        c.finish().unwrap();
        std::mem::replace(&mut c.out, Output::to_buffer()).into_buffer()
    }

    #[test]
    fn skeleton_is_well_formed() {
        let pdf = render_to_bytes(|c| {
            let mut p = Path::new();
            p.rect(10.0, 10.0, 50.0, 50.0);
            c.fill_path(&p, false, &Matrix::IDENTITY, Color::rgb(1.0, 0.0, 0.0), 1.0);
        });
        let s = String::from_utf8_lossy(&pdf);
        assert!(s.starts_with("%PDF-1.4"));
        assert!(s.contains("/Type /Catalog"));
        assert!(s.contains("/MediaBox [0 0 100.00 100.00]"));
        assert!(s.contains("startxref"));
        assert!(s.trim_end().ends_with("%%EOF"));
    }

    #[test]
    fn alpha_produces_extgstate() {
        let pdf = render_to_bytes(|c| {
            let mut p = Path::new();
            p.rect(0.0, 0.0, 10.0, 10.0);
            c.fill_path(&p, false, &Matrix::IDENTITY, Color::BLACK, 0.5);
            c.fill_path(&p, false, &Matrix::IDENTITY, Color::BLACK, 0.5);
        });
        let s = String::from_utf8_lossy(&pdf);
        // The same alpha is deduplicated into one dictionary.
        assert_eq!(s.matches("/Type /ExtGState").count(), 1);
        assert!(s.contains("/ca 0.500"));
    }

    #[test]
    fn image_becomes_xobject_with_smask() {
        let pdf = render_to_bytes(|c| {
            let img = Image::new(1, 1, Bytes::from_static(&[255, 0, 0, 128])).unwrap();
            c.fill_image(&img, &Matrix::scale(10.0, 10.0), 1.0);
        });
        let s = String::from_utf8_lossy(&pdf);
        assert!(s.contains("/Subtype /Image"));
        assert!(s.contains("/SMask"));
        assert!(s.contains("/Im1 Do"));
    }

    fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack.windows(needle.len()).position(|w| w == needle)
    }

    #[test]
    fn xref_offsets_point_at_objects() {
        let pdf = render_to_bytes(|_| {});
        // The flate-compressed content stream is binary, so all bookkeeping
        // is checked on raw bytes.
        let xref_at = find_bytes(&pdf, b"xref\n0 ").unwrap();
        let tail = String::from_utf8_lossy(&pdf[xref_at..]);
        let startxref: usize = tail[tail.find("startxref\n").unwrap() + 10..]
            .lines()
            .next()
            .unwrap()
            .trim()
            .parse()
            .unwrap();
        assert_eq!(startxref, xref_at);
        let first_off: usize = tail.lines().nth(3).unwrap()[..10].parse().unwrap();
        assert_eq!(first_off, find_bytes(&pdf, b"1 0 obj").unwrap());
    }
}

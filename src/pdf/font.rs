//! Font faces: advance metrics and glyph outlines for text rendering.
//!
//! A `Face` wraps one PDF font dictionary. Advances come from the
//! `/Widths` table (or the embedded program's metrics when absent);
//! outlines come from an embedded FontFile parsed with `ttf-parser`.
//! Type3 fonts are never executed, only flagged, and render as
//! placeholder boxes.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;

use crate::gfx::geometry::Point;
use crate::gfx::path::Path;

use super::file::PdfFile;
use super::object::{Dict, Object, number_array};

const DEFAULT_WIDTH: f64 = 500.0;

#[derive(Debug)]
pub struct Face {
    base_font: String,
    first_char: u32,
    widths: Vec<f64>,
    missing_width: f64,
    /// CID default width (`/DW`) and the parsed `/W` ranges.
    cid_default_width: f64,
    cid_widths: HashMap<u32, f64>,
    is_type3: bool,
    is_cid: bool,
    program: Option<Bytes>,
}

impl Face {
    pub fn from_dict(file: &PdfFile, dict: &Dict) -> Face {
        let subtype = file.get_name(dict, "Subtype").unwrap_or("");
        let is_cid = subtype == "Type0";
        let is_type3 = subtype == "Type3";

        // Type0 fonts keep their metrics on the descendant font.
        let metrics_dict: &Dict = if is_cid {
            file.get(dict, "DescendantFonts")
                .and_then(Object::as_array)
                .and_then(|a| a.first())
                .and_then(|d| file.resolve(d).as_dict())
                .unwrap_or(dict)
        } else {
            dict
        };

        let base_font = file
            .get_name(dict, "BaseFont")
            .unwrap_or("unknown")
            .to_string();
        let first_char = file
            .get(metrics_dict, "FirstChar")
            .and_then(Object::as_int)
            .unwrap_or(0)
            .max(0) as u32;
        let widths = file
            .get(metrics_dict, "Widths")
            .and_then(number_array)
            .unwrap_or_default();
        let descriptor = file.get_dict(metrics_dict, "FontDescriptor");
        let missing_width = descriptor
            .and_then(|d| file.get(d, "MissingWidth"))
            .and_then(Object::as_real)
            .unwrap_or(DEFAULT_WIDTH);

        let cid_default_width = file
            .get(metrics_dict, "DW")
            .and_then(Object::as_real)
            .unwrap_or(1000.0);
        let cid_widths = file
            .get(metrics_dict, "W")
            .map(|w| parse_cid_widths(file, w))
            .unwrap_or_default();

        let program = descriptor.and_then(|d| {
            for key in ["FontFile2", "FontFile3", "FontFile"] {
                if let Some(s) = file.get(d, key).and_then(Object::as_stream) {
                    return Some(Bytes::from(file.decode_stream(s).to_vec()));
                }
            }
            None
        });

        Face {
            base_font,
            first_char,
            widths,
            missing_width,
            cid_default_width,
            cid_widths,
            is_type3,
            is_cid,
            program,
        }
    }

    pub fn base_font(&self) -> &str {
        &self.base_font
    }

    pub fn is_type3(&self) -> bool {
        self.is_type3
    }

    /// Type0 fonts consume two bytes per character code.
    pub fn is_cid(&self) -> bool {
        self.is_cid
    }

    /// Advance width of a character code in 1000-unit font space.
    pub fn advance(&self, code: u32) -> f64 {
        if self.is_cid {
            return self
                .cid_widths
                .get(&code)
                .copied()
                .unwrap_or(self.cid_default_width);
        }
        if code >= self.first_char {
            if let Some(w) = self.widths.get((code - self.first_char) as usize) {
                return *w;
            }
        }
        if let Some(w) = self.program_advance(code) {
            return w;
        }
        self.missing_width
    }

    /// Outline of a character code in 1000-unit font space (y up), or
    /// `None` when there is nothing to draw.
    pub fn outline(&self, code: u32) -> Option<Path> {
        let data = self.program.as_ref()?;
        let face = ttf_parser::Face::parse(data, 0).ok()?;
        let gid = self.glyph_id(&face, code)?;
        let scale = 1000.0 / face.units_per_em() as f64;
        let mut builder = OutlineToPath { path: Path::new(), scale };
        face.outline_glyph(gid, &mut builder)?;
        Some(builder.path)
    }

    fn glyph_id(&self, face: &ttf_parser::Face<'_>, code: u32) -> Option<ttf_parser::GlyphId> {
        if self.is_cid {
            // Identity encoding: the code is the glyph index.
            return (code < face.number_of_glyphs() as u32)
                .then_some(ttf_parser::GlyphId(code as u16));
        }
        if let Some(c) = char::from_u32(code)
            && let Some(gid) = face.glyph_index(c)
        {
            return Some(gid);
        }
        (code < face.number_of_glyphs() as u32).then_some(ttf_parser::GlyphId(code as u16))
    }

    fn program_advance(&self, code: u32) -> Option<f64> {
        let data = self.program.as_ref()?;
        let face = ttf_parser::Face::parse(data, 0).ok()?;
        let gid = self.glyph_id(&face, code)?;
        let adv = face.glyph_hor_advance(gid)?;
        Some(adv as f64 * 1000.0 / face.units_per_em() as f64)
    }
}

fn parse_cid_widths(file: &PdfFile, w: &Object) -> HashMap<u32, f64> {
    let mut out = HashMap::new();
    let Some(arr) = w.as_array() else { return out };
    let mut i = 0;
    while i < arr.len() {
        let Some(start) = file.resolve(&arr[i]).as_int() else { break };
        match file.resolve(arr.get(i + 1).unwrap_or(&Object::Null)) {
            // `c [w1 w2 ...]`
            Object::Array(ws) => {
                for (j, wv) in ws.iter().enumerate() {
                    if let Some(wv) = file.resolve(wv).as_real() {
                        out.insert(start as u32 + j as u32, wv);
                    }
                }
                i += 2;
            }
            // `c1 c2 w`
            other => {
                let Some(end) = other.as_int() else { break };
                let Some(wv) = arr.get(i + 2).and_then(|o| file.resolve(o).as_real()) else {
                    break;
                };
                for c in start..=end.max(start) {
                    out.insert(c as u32, wv);
                }
                i += 3;
            }
        }
    }
    out
}

struct OutlineToPath {
    path: Path,
    scale: f64,
}

impl ttf_parser::OutlineBuilder for OutlineToPath {
    fn move_to(&mut self, x: f32, y: f32) {
        self.path.move_to(Point::new(x as f64 * self.scale, y as f64 * self.scale));
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.path.line_to(Point::new(x as f64 * self.scale, y as f64 * self.scale));
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        // Raise the quadratic to a cubic.
        let s = self.scale;
        let start = self.path.current_point().unwrap_or(Point::ORIGIN);
        let q = Point::new(x1 as f64 * s, y1 as f64 * s);
        let end = Point::new(x as f64 * s, y as f64 * s);
        let c1 = start + (q - start) * (2.0 / 3.0);
        let c2 = end + (q - end) * (2.0 / 3.0);
        self.path.curve_to(c1, c2, end);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let s = self.scale;
        self.path.curve_to(
            Point::new(x1 as f64 * s, y1 as f64 * s),
            Point::new(x2 as f64 * s, y2 as f64 * s),
            Point::new(x as f64 * s, y as f64 * s),
        );
    }

    fn close(&mut self) {
        self.path.close();
    }
}

/// Per-render face cache, keyed by the resolved font dictionary's address.
/// Also records whether any Type3 font was seen so callers can warn once.
pub struct FontShop<'a> {
    file: &'a PdfFile,
    faces: HashMap<usize, Arc<Face>>,
    type3_seen: bool,
}

impl<'a> FontShop<'a> {
    pub fn new(file: &'a PdfFile) -> FontShop<'a> {
        FontShop { file, faces: HashMap::new(), type3_seen: false }
    }

    pub fn face(&mut self, dict: &Dict) -> Arc<Face> {
        let key = dict as *const Dict as usize;
        if let Some(f) = self.faces.get(&key) {
            return f.clone();
        }
        let face = Arc::new(Face::from_dict(self.file, dict));
        if face.is_type3() {
            self.type3_seen = true;
        }
        self.faces.insert(key, face.clone());
        face
    }

    pub fn has_type3_font(&self) -> bool {
        self.type3_seen
    }
}

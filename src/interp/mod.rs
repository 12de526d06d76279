//! The content-stream interpreter.
//!
//! [`ContentPainter`] executes PDF content streams against a [`Canvas`]
//! backend and doubles as the drawing surface for the document model,
//! which calls the painter-level methods (`save`, `transform`,
//! `draw_path`, ...) directly instead of going through operator syntax.
//!
//! Malformed streams never abort a render: unknown operators, missing
//! resources and bad operand counts all degrade to no-ops.

pub mod image;
pub mod shading;
pub mod state;

use crate::gfx::canvas::{Canvas, Glyph, Image, TextRun};
use crate::gfx::color::{Color, Colorspace};
use crate::gfx::geometry::{Matrix, Point};
use crate::gfx::path::{DrawMode, LineCap, LineJoin, Path};
use crate::pdf::file::PdfFile;
use crate::pdf::font::FontShop;
use crate::pdf::lexer::{LexBuf, Lexer, Token};
use crate::pdf::object::{Dict, Name, Object, PdfString, number_array};

use state::{GraphicsState, ResourceStack, StateStack};

/// Form XObject and pattern recursion limit.
const MAX_NESTING: usize = 8;

/// Upper bound on tiling-pattern cell replays per fill.
const PATTERN_CELL_CAP: i64 = 4096;

/// Operand stack limit; streams pushing more are broken.
const MAX_OPERANDS: usize = 16;

/// Per-execute lookup context: the file the stream came from, its scoped
/// resource dictionaries and the font cache.
struct ExecCtx<'f> {
    file: &'f PdfFile,
    fonts: FontShop<'f>,
    resources: ResourceStack<'f>,
}

pub struct ContentPainter<'c> {
    canvas: &'c mut dyn Canvas,
    states: StateStack,
    path: Path,
    /// Set by `W`/`W*`, installed by the next path-painting operator.
    pending_clip: Option<bool>,
    in_text: bool,
    text_matrix: Matrix,
    line_matrix: Matrix,
    type3_seen: bool,
}

impl<'c> ContentPainter<'c> {
    pub fn new(canvas: &'c mut dyn Canvas) -> ContentPainter<'c> {
        ContentPainter::with_matrix(canvas, Matrix::IDENTITY)
    }

    /// Painter whose base transform maps user space to the device.
    pub fn with_matrix(canvas: &'c mut dyn Canvas, base: Matrix) -> ContentPainter<'c> {
        let initial = GraphicsState { ctm: base, ..GraphicsState::default() };
        ContentPainter {
            canvas,
            states: StateStack::new(initial),
            path: Path::new(),
            pending_clip: None,
            in_text: false,
            text_matrix: Matrix::IDENTITY,
            line_matrix: Matrix::IDENTITY,
            type3_seen: false,
        }
    }

    pub fn matrix(&self) -> Matrix {
        self.states.top().ctm
    }

    pub fn state(&self) -> &GraphicsState {
        self.states.top()
    }

    /// True once any executed stream selected a Type3 font.
    pub fn has_type3_font(&self) -> bool {
        self.type3_seen
    }

    #[cfg(test)]
    pub(crate) fn text_matrix(&self) -> Matrix {
        self.text_matrix
    }

    // ----- painter-level API, used by the document model -----

    pub fn save(&mut self) {
        self.states.push();
    }

    pub fn restore(&mut self) {
        let clips = self.states.pop();
        for _ in 0..clips {
            self.canvas.pop_clip();
        }
    }

    pub fn transform(&mut self, m: &Matrix) {
        if m.is_finite() {
            let st = self.states.top_mut();
            st.ctm = m.concat(&st.ctm);
        }
    }

    pub fn move_to(&mut self, p: Point) {
        self.path.move_to(p);
    }

    pub fn line_to(&mut self, p: Point) {
        self.path.line_to(p);
    }

    pub fn curve_to(&mut self, c1: Point, c2: Point, p: Point) {
        self.path.curve_to(c1, c2, p);
    }

    pub fn rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        self.path.rect(x, y, w, h);
    }

    pub fn close_path(&mut self) {
        self.path.close();
    }

    /// Paint and clear the current path.
    pub fn draw_path(&mut self, mode: DrawMode, even_odd: bool) {
        self.paint_current(mode.fills().then_some(even_odd), mode.strokes());
    }

    /// Intersect the clip region with the current path and clear it.
    pub fn add_clip_path(&mut self, even_odd: bool) {
        let ctm = self.states.top().ctm;
        self.canvas.clip_path(&self.path, even_odd, &ctm);
        self.states.top_mut().clip_count += 1;
        self.path = Path::new();
    }

    pub fn set_stroke(&mut self, color: Color) {
        self.states.top_mut().stroke_color = color;
    }

    pub fn set_fill(&mut self, color: Color) {
        let st = self.states.top_mut();
        st.fill_color = color;
        st.fill_pattern = None;
    }

    pub fn set_pen(&mut self, width: f64) {
        if width >= 0.0 {
            self.states.top_mut().stroke.line_width = width;
        }
    }

    pub fn set_dash(&mut self, pattern: &[f64], phase: f64) {
        let stroke = &mut self.states.top_mut().stroke;
        if pattern.iter().all(|&d| d <= 0.0) {
            stroke.dash_pattern.clear();
            stroke.dash_phase = 0.0;
        } else {
            stroke.dash_pattern = pattern.iter().copied().collect();
            stroke.dash_phase = phase;
        }
    }

    pub fn set_line_cap(&mut self, cap: LineCap) {
        self.states.top_mut().stroke.cap = cap;
    }

    pub fn set_line_join(&mut self, join: LineJoin) {
        self.states.top_mut().stroke.join = join;
    }

    pub fn set_miter_limit(&mut self, limit: f64) {
        if limit >= 1.0 {
            self.states.top_mut().stroke.miter_limit = limit;
        }
    }

    pub fn set_opacity(&mut self, alpha: f64) {
        let st = self.states.top_mut();
        st.fill_alpha = alpha.clamp(0.0, 1.0);
        st.stroke_alpha = st.fill_alpha;
    }

    pub fn draw_bitmap(&mut self, img: &Image) {
        let st = self.states.top();
        let (ctm, alpha) = (st.ctm, st.fill_alpha);
        self.canvas.fill_image(img, &ctm, alpha);
    }

    /// Unwind outstanding clips and flush the canvas.
    pub fn finish(&mut self) -> crate::gfx::Result<()> {
        for _ in 0..self.states.total_clips() {
            self.canvas.pop_clip();
        }
        self.canvas.finish()
    }

    // ----- content-stream execution -----

    /// Execute a content stream with the given resource dictionary in
    /// scope.
    pub fn execute<'f>(&mut self, file: &'f PdfFile, resources: Option<&'f Dict>, data: &[u8]) {
        let mut ctx =
            ExecCtx { file, fonts: FontShop::new(file), resources: ResourceStack::new(file) };
        if let Some(res) = resources {
            ctx.resources.push(res);
        }
        self.run(&mut ctx, data, 0);
        self.type3_seen |= ctx.fonts.has_type3_font();
    }

    /// Execute a document page: its content stream with its (possibly
    /// inherited) resources.
    pub fn execute_page(&mut self, file: &PdfFile, index: usize) {
        if let Some(content) = file.page_content(index) {
            self.execute(file, file.page_resources(index), &content);
        }
    }

    fn run(&mut self, ctx: &mut ExecCtx<'_>, data: &[u8], depth: usize) {
        if depth > MAX_NESTING {
            return;
        }
        let mut lx = Lexer::new(data);
        let mut buf = LexBuf::default();
        let mut ops: Vec<Object> = Vec::new();
        loop {
            let tok = lx.next(&mut buf);
            match tok {
                Token::Eof => break,
                Token::Keyword => {
                    let op = buf.bytes.clone();
                    self.operator(ctx, &op, &ops, &mut lx, &mut buf, depth);
                    ops.clear();
                }
                _ => {
                    if ops.len() >= MAX_OPERANDS {
                        ops.clear();
                    }
                    if let Some(v) = parse_operand(&mut lx, &mut buf, tok, 0) {
                        ops.push(v);
                    }
                }
            }
        }
    }

    fn operator(
        &mut self,
        ctx: &mut ExecCtx<'_>,
        op: &[u8],
        ops: &[Object],
        lx: &mut Lexer<'_>,
        buf: &mut LexBuf,
        depth: usize,
    ) {
        match op {
            b"q" => self.save(),
            b"Q" => self.restore(),
            b"cm" => {
                if let Some(m) = matrix_operand(ops) {
                    self.transform(&m);
                }
            }
            b"w" => {
                if let Some(w) = real(ops, 0) {
                    self.set_pen(w);
                }
            }
            b"J" => {
                if let Some(c) = int(ops, 0) {
                    self.set_line_cap(LineCap::from_i32(c as i32));
                }
            }
            b"j" => {
                if let Some(j) = int(ops, 0) {
                    self.set_line_join(LineJoin::from_i32(j as i32));
                }
            }
            b"M" => {
                if let Some(m) = real(ops, 0) {
                    self.set_miter_limit(m);
                }
            }
            b"d" => {
                if let (Some(arr), Some(phase)) =
                    (ops.first().and_then(number_array), real(ops, 1))
                {
                    self.set_dash(&arr, phase);
                }
            }
            b"gs" => self.op_gs(ctx, ops),
            // Rendering intent and flatness carry no meaning here.
            b"ri" | b"i" => {}

            b"m" => {
                if let Some(p) = point(ops, 0) {
                    self.path.move_to(p);
                }
            }
            b"l" => {
                if let Some(p) = point(ops, 0) {
                    self.path.line_to(p);
                }
            }
            b"c" => {
                if let (Some(c1), Some(c2), Some(p)) = (point(ops, 0), point(ops, 2), point(ops, 4))
                {
                    self.path.curve_to(c1, c2, p);
                }
            }
            b"v" => {
                if let (Some(c2), Some(p)) = (point(ops, 0), point(ops, 2)) {
                    let c1 = self.path.current_point().unwrap_or(Point::ORIGIN);
                    self.path.curve_to(c1, c2, p);
                }
            }
            b"y" => {
                if let (Some(c1), Some(p)) = (point(ops, 0), point(ops, 2)) {
                    self.path.curve_to(c1, p, p);
                }
            }
            b"h" => self.path.close(),
            b"re" => {
                if let (Some(p), Some(w), Some(h)) = (point(ops, 0), real(ops, 2), real(ops, 3)) {
                    self.path.rect(p.x, p.y, w, h);
                }
            }

            b"S" => self.end_path(ctx, None, true, false, depth),
            b"s" => self.end_path(ctx, None, true, true, depth),
            b"f" | b"F" => self.end_path(ctx, Some(false), false, false, depth),
            b"f*" => self.end_path(ctx, Some(true), false, false, depth),
            b"B" => self.end_path(ctx, Some(false), true, false, depth),
            b"B*" => self.end_path(ctx, Some(true), true, false, depth),
            b"b" => self.end_path(ctx, Some(false), true, true, depth),
            b"b*" => self.end_path(ctx, Some(true), true, true, depth),
            b"n" => self.end_path(ctx, None, false, false, depth),

            b"W" => self.pending_clip = Some(false),
            b"W*" => self.pending_clip = Some(true),

            b"G" => self.op_color(ops, Colorspace::DeviceGray, true),
            b"g" => self.op_color(ops, Colorspace::DeviceGray, false),
            b"RG" => self.op_color(ops, Colorspace::DeviceRgb, true),
            b"rg" => self.op_color(ops, Colorspace::DeviceRgb, false),
            b"K" => self.op_color(ops, Colorspace::DeviceCmyk, true),
            b"k" => self.op_color(ops, Colorspace::DeviceCmyk, false),
            b"CS" => self.op_colorspace(ops, true),
            b"cs" => self.op_colorspace(ops, false),
            b"SC" | b"SCN" => self.op_set_components(ops, true),
            b"sc" => self.op_set_components(ops, false),
            b"scn" => self.op_scn(ops),

            b"BT" => {
                self.in_text = true;
                self.text_matrix = Matrix::IDENTITY;
                self.line_matrix = Matrix::IDENTITY;
            }
            b"ET" => self.in_text = false,
            b"Td" => {
                if let Some(p) = point(ops, 0) {
                    self.text_displace(p.x, p.y);
                }
            }
            b"TD" => {
                if let Some(p) = point(ops, 0) {
                    self.states.top_mut().leading = -p.y;
                    self.text_displace(p.x, p.y);
                }
            }
            b"Tm" => {
                if let Some(m) = matrix_operand(ops) {
                    self.text_matrix = m;
                    self.line_matrix = m;
                }
            }
            b"T*" => self.next_line(),
            b"Tc" => {
                if let Some(v) = real(ops, 0) {
                    self.states.top_mut().char_spacing = v;
                }
            }
            b"Tw" => {
                if let Some(v) = real(ops, 0) {
                    self.states.top_mut().word_spacing = v;
                }
            }
            b"Tz" => {
                if let Some(v) = real(ops, 0) {
                    self.states.top_mut().horizontal_scaling = v / 100.0;
                }
            }
            b"TL" => {
                if let Some(v) = real(ops, 0) {
                    self.states.top_mut().leading = v;
                }
            }
            b"Tf" => self.op_font(ctx, ops),
            b"Tr" => {
                if let Some(v) = int(ops, 0) {
                    self.states.top_mut().text_render_mode = v as i32;
                }
            }
            b"Ts" => {
                if let Some(v) = real(ops, 0) {
                    self.states.top_mut().text_rise = v;
                }
            }

            b"Tj" => {
                if let Some(Object::String(s)) = ops.first() {
                    let s = s.clone();
                    self.show_text(&s);
                }
            }
            b"'" => {
                if let Some(Object::String(s)) = ops.first() {
                    let s = s.clone();
                    self.next_line();
                    self.show_text(&s);
                }
            }
            b"\"" => {
                if let (Some(aw), Some(ac), Some(Object::String(s))) =
                    (real(ops, 0), real(ops, 1), ops.get(2))
                {
                    let s = s.clone();
                    {
                        let st = self.states.top_mut();
                        st.word_spacing = aw;
                        st.char_spacing = ac;
                    }
                    self.next_line();
                    self.show_text(&s);
                }
            }
            b"TJ" => self.op_show_kerned(ops),

            b"Do" => self.op_do(ctx, ops, depth),
            b"sh" => self.op_sh(ctx, ops),
            b"BI" => skip_inline_image(lx, buf),

            // Marked content and compatibility sections are transparent.
            b"BMC" | b"BDC" | b"EMC" | b"BX" | b"EX" | b"MP" | b"DP" => {}

            _ => {}
        }
    }

    fn end_path(
        &mut self,
        ctx: &mut ExecCtx<'_>,
        mut fill: Option<bool>,
        stroke: bool,
        close: bool,
        depth: usize,
    ) {
        if close {
            self.path.close();
        }
        if let Some(eo) = fill
            && self.states.top().fill_pattern.is_some()
            && self.try_pattern_fill(ctx, eo, depth)
        {
            // The pattern replay painted the interior.
            fill = None;
        }
        self.paint_current(fill, stroke);
    }

    fn paint_current(&mut self, fill: Option<bool>, stroke: bool) {
        let st = self.states.top();
        let ctm = st.ctm;
        let (fc, fa) = (st.fill_color, st.fill_alpha);
        let (sc, sa) = (st.stroke_color, st.stroke_alpha);
        let stroke_state = st.stroke.clone();
        if let Some(eo) = fill {
            self.canvas.fill_path(&self.path, eo, &ctm, fc, fa);
        }
        if stroke {
            self.canvas.stroke_path(&self.path, &stroke_state, &ctm, sc, sa);
        }
        if let Some(eo) = self.pending_clip.take() {
            self.canvas.clip_path(&self.path, eo, &ctm);
            self.states.top_mut().clip_count += 1;
        }
        self.path = Path::new();
    }

    /// Tiling-pattern fill: clip to the path, then replay the cell
    /// content stream across the path's pattern-space bounds. Returns
    /// false when the pattern is unusable and the caller should fall
    /// back to a plain fill. The current path survives for the stroke
    /// and deferred-clip handling that follows.
    fn try_pattern_fill(&mut self, ctx: &mut ExecCtx<'_>, even_odd: bool, depth: usize) -> bool {
        let Some(name) = self.states.top().fill_pattern.clone() else { return false };
        let Some(obj) = ctx.resources.find("Pattern", name.as_str()) else { return false };
        let Some(stream) = ctx.file.resolve(obj).as_stream() else { return false };
        let dict = &stream.dict;
        if ctx.file.get(dict, "PatternType").and_then(|o| o.as_int()) != Some(1) {
            return false;
        }
        let pat_matrix = ctx
            .file
            .get(dict, "Matrix")
            .and_then(number_array)
            .filter(|m| m.len() == 6)
            .map(|m| Matrix::new(m[0], m[1], m[2], m[3], m[4], m[5]))
            .unwrap_or(Matrix::IDENTITY);
        let Some(inv) = pat_matrix.invert() else { return false };
        let bbox = ctx.file.get(dict, "BBox").and_then(number_array).filter(|b| b.len() == 4);
        let (bw, bh) = match &bbox {
            Some(b) => ((b[2] - b[0]).abs(), (b[3] - b[1]).abs()),
            None => (0.0, 0.0),
        };
        let xstep = ctx.file.get(dict, "XStep").and_then(|o| o.as_real()).unwrap_or(bw);
        let ystep = ctx.file.get(dict, "YStep").and_then(|o| o.as_real()).unwrap_or(bh);
        if !(xstep.is_finite() && ystep.is_finite() && xstep > 1e-9 && ystep > 1e-9) {
            return false;
        }
        let cell_res = ctx.file.get_dict(dict, "Resources");
        let data = ctx.file.decode_stream(stream);

        let bounds = self.path.bounds().transform(&inv);
        if bounds.is_empty() {
            // Nothing inside the path; the fill is a no-op either way.
            return true;
        }
        let i0 = (bounds.x0 / xstep).floor() as i64;
        let i1 = (bounds.x1 / xstep).ceil() as i64;
        let j0 = (bounds.y0 / ystep).floor() as i64;
        let j1 = (bounds.y1 / ystep).ceil() as i64;
        if (i1 - i0 + 1).saturating_mul(j1 - j0 + 1) > PATTERN_CELL_CAP {
            return false;
        }

        let outer_ctm = self.states.top().ctm;
        self.save();
        self.canvas.clip_path(&self.path, even_odd, &outer_ctm);
        self.states.top_mut().clip_count += 1;
        if let Some(res) = cell_res {
            ctx.resources.push(res);
        }
        for j in j0..=j1 {
            for i in i0..=i1 {
                self.save();
                {
                    let st = self.states.top_mut();
                    st.ctm = Matrix::translate(i as f64 * xstep, j as f64 * ystep)
                        .concat(&pat_matrix)
                        .concat(&outer_ctm);
                    st.fill_pattern = None;
                }
                let saved_path = std::mem::take(&mut self.path);
                self.run(ctx, &data, depth + 1);
                self.path = saved_path;
                self.restore();
            }
        }
        if cell_res.is_some() {
            ctx.resources.pop();
        }
        self.restore();
        true
    }

    fn op_gs(&mut self, ctx: &ExecCtx<'_>, ops: &[Object]) {
        let Some(Object::Name(name)) = ops.first() else { return };
        let Some(ext) = ctx.resources.find_dict("ExtGState", name.as_str()) else { return };
        if let Some(ca) = ctx.file.get(ext, "ca").and_then(|o| o.as_real()) {
            self.states.top_mut().fill_alpha = ca.clamp(0.0, 1.0);
        }
        if let Some(ca) = ctx.file.get(ext, "CA").and_then(|o| o.as_real()) {
            self.states.top_mut().stroke_alpha = ca.clamp(0.0, 1.0);
        }
    }

    fn op_color(&mut self, ops: &[Object], space: Colorspace, stroking: bool) {
        let comps: Vec<f64> = (0..space.components()).filter_map(|i| real(ops, i)).collect();
        if comps.len() != space.components() {
            return;
        }
        let color = space.color(&comps);
        let st = self.states.top_mut();
        if stroking {
            st.stroke_space = space;
            st.stroke_color = color;
        } else {
            st.fill_space = space;
            st.fill_color = color;
            st.fill_pattern = None;
        }
    }

    fn op_colorspace(&mut self, ops: &[Object], stroking: bool) {
        let Some(Object::Name(name)) = ops.first() else { return };
        if name.as_str() == "Pattern" {
            // Color arrives with the pattern name in the following scn.
            return;
        }
        let Some(space) = Colorspace::from_name(name.as_str()) else { return };
        let st = self.states.top_mut();
        if stroking {
            st.stroke_space = space;
            st.stroke_color = Color::BLACK;
        } else {
            st.fill_space = space;
            st.fill_color = Color::BLACK;
            st.fill_pattern = None;
        }
    }

    fn op_set_components(&mut self, ops: &[Object], stroking: bool) {
        // Strip a trailing pattern name so SCN in a pattern space still
        // sets the underlying color.
        let nums: Vec<f64> = ops.iter().filter_map(|o| o.as_real()).collect();
        let space = if stroking {
            self.states.top().stroke_space
        } else {
            self.states.top().fill_space
        };
        if nums.len() != space.components() {
            return;
        }
        let color = space.color(&nums);
        let st = self.states.top_mut();
        if stroking {
            st.stroke_color = color;
        } else {
            st.fill_color = color;
        }
    }

    /// `scn`: one name operand selects a colored pattern; three numbers
    /// plus a name select an uncolored pattern with its fill color;
    /// plain numbers behave like `sc`.
    fn op_scn(&mut self, ops: &[Object]) {
        match ops.last() {
            Some(Object::Name(name)) => {
                let name = name.clone();
                if ops.len() == 4
                    && let (Some(r), Some(g), Some(b)) = (real(ops, 0), real(ops, 1), real(ops, 2))
                {
                    self.states.top_mut().fill_color = Color::rgb(r, g, b);
                }
                if ops.len() == 1 || ops.len() == 4 {
                    self.states.top_mut().fill_pattern = Some(name);
                }
            }
            _ => self.op_set_components(ops, false),
        }
    }

    fn text_displace(&mut self, tx: f64, ty: f64) {
        self.line_matrix = Matrix::translate(tx, ty).concat(&self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        let leading = self.states.top().leading;
        self.text_displace(0.0, -leading);
    }

    fn op_font(&mut self, ctx: &mut ExecCtx<'_>, ops: &[Object]) {
        let (Some(Object::Name(name)), Some(size)) = (ops.first(), real(ops, 1)) else { return };
        let dict = ctx.resources.find_dict("Font", name.as_str());
        let face = dict.map(|d| ctx.fonts.face(d));
        let st = self.states.top_mut();
        st.font = face;
        st.font_size = size;
    }

    fn show_text(&mut self, s: &PdfString) {
        if !self.in_text {
            return;
        }
        let st = self.states.top();
        let Some(face) = st.font.clone() else { return };
        let size = st.font_size;
        let hscale = st.horizontal_scaling;
        let char_spacing = st.char_spacing;
        let word_spacing = st.word_spacing;
        let rise = st.text_rise;
        let invisible = st.text_render_mode == 3;
        let (ctm, color, alpha) = (st.ctm, st.fill_color, st.fill_alpha);

        let bytes = s.as_bytes();
        let codes: Vec<u32> = if face.is_cid() {
            bytes.chunks(2).map(|c| ((c[0] as u32) << 8) | *c.get(1).unwrap_or(&0) as u32).collect()
        } else {
            bytes.iter().map(|&b| b as u32).collect()
        };

        let mut run = TextRun::default();
        for &code in &codes {
            let trm = Matrix::new(size * hscale, 0.0, 0.0, size, 0.0, rise)
                .concat(&self.text_matrix)
                .concat(&ctm);
            if !invisible {
                if face.is_type3() {
                    self.type3_seen = true;
                    let mut boxed = Path::new();
                    boxed.rect(0.05, 0.0, 0.55, 0.65);
                    run.glyphs.push(Glyph { outline: boxed.transform(&trm) });
                } else if let Some(outline) = face.outline(code) {
                    let m = Matrix::scale(0.001, 0.001).concat(&trm);
                    run.glyphs.push(Glyph { outline: outline.transform(&m) });
                }
            }
            let is_space = code == 32 && !face.is_cid();
            let adv = (face.advance(code) / 1000.0 * size
                + char_spacing
                + if is_space { word_spacing } else { 0.0 })
                * hscale;
            self.text_matrix = Matrix::translate(adv, 0.0).concat(&self.text_matrix);
        }
        if !run.glyphs.is_empty() {
            // Glyph outlines are already in device space.
            self.canvas.fill_text(&run, &Matrix::IDENTITY, color, alpha);
        }
    }

    /// `TJ`: strings show text, numbers kern by `-n/1000` text-space
    /// units scaled by font size and horizontal scaling.
    fn op_show_kerned(&mut self, ops: &[Object]) {
        let Some(Object::Array(items)) = ops.first() else { return };
        let items = items.clone();
        for item in &items {
            match item {
                Object::String(s) => self.show_text(s),
                other => {
                    if let Some(n) = other.as_real() {
                        let st = self.states.top();
                        let tx = -n / 1000.0 * st.font_size * st.horizontal_scaling;
                        self.text_matrix = Matrix::translate(tx, 0.0).concat(&self.text_matrix);
                    }
                }
            }
        }
    }

    fn op_do(&mut self, ctx: &mut ExecCtx<'_>, ops: &[Object], depth: usize) {
        let Some(Object::Name(name)) = ops.first() else { return };
        let Some(obj) = ctx.resources.find("XObject", name.as_str()) else { return };
        let Some(stream) = ctx.file.resolve(obj).as_stream() else { return };
        match ctx.file.get_name(&stream.dict, "Subtype") {
            Some("Image") => {
                if let Some(img) = image::decode(ctx.file, stream) {
                    let st = self.states.top();
                    let (ctm, alpha) = (st.ctm, st.fill_alpha);
                    self.canvas.fill_image(&img, &ctm, alpha);
                }
            }
            Some("Form") => self.run_form(ctx, stream, depth),
            _ => {}
        }
    }

    fn run_form<'f>(&mut self, ctx: &mut ExecCtx<'f>, stream: &'f crate::pdf::object::Stream, depth: usize) {
        let dict = &stream.dict;
        let data = ctx.file.decode_stream(stream);
        self.save();
        if let Some(m) = ctx
            .file
            .get(dict, "Matrix")
            .and_then(number_array)
            .filter(|m| m.len() == 6)
        {
            self.transform(&Matrix::new(m[0], m[1], m[2], m[3], m[4], m[5]));
        }
        if let Some(bbox) = ctx.file.get(dict, "BBox").and_then(number_array).filter(|b| b.len() == 4)
        {
            let mut clip = Path::new();
            clip.rect(bbox[0], bbox[1], bbox[2] - bbox[0], bbox[3] - bbox[1]);
            let ctm = self.states.top().ctm;
            self.canvas.clip_path(&clip, false, &ctm);
            self.states.top_mut().clip_count += 1;
        }
        let pushed = match ctx.file.get_dict(dict, "Resources") {
            Some(res) => {
                ctx.resources.push(res);
                true
            }
            None => false,
        };
        let saved_path = std::mem::take(&mut self.path);
        self.run(ctx, &data, depth + 1);
        self.path = saved_path;
        if pushed {
            ctx.resources.pop();
        }
        self.restore();
    }

    fn op_sh(&mut self, ctx: &ExecCtx<'_>, ops: &[Object]) {
        let Some(Object::Name(name)) = ops.first() else { return };
        let Some(obj) = ctx.resources.find("Shading", name.as_str()) else { return };
        let Some(dict) = ctx.file.resolve(obj).as_dict() else { return };
        if let Some(sh) = shading::build(ctx.file, dict) {
            let st = self.states.top();
            let (ctm, alpha) = (st.ctm, st.fill_alpha);
            self.canvas.fill_shading(&sh, &ctm, alpha);
        }
    }
}

// ----- operand parsing helpers -----

fn real(ops: &[Object], i: usize) -> Option<f64> {
    ops.get(i)?.as_real()
}

fn int(ops: &[Object], i: usize) -> Option<i64> {
    ops.get(i)?.as_int()
}

fn point(ops: &[Object], i: usize) -> Option<Point> {
    Some(Point::new(real(ops, i)?, real(ops, i + 1)?))
}

fn matrix_operand(ops: &[Object]) -> Option<Matrix> {
    if ops.len() < 6 {
        return None;
    }
    let m = Matrix::new(
        real(ops, 0)?,
        real(ops, 1)?,
        real(ops, 2)?,
        real(ops, 3)?,
        real(ops, 4)?,
        real(ops, 5)?,
    );
    m.is_finite().then_some(m)
}

/// Parse one operand, recursing into arrays and dictionaries.
fn parse_operand(lx: &mut Lexer<'_>, buf: &mut LexBuf, tok: Token, depth: usize) -> Option<Object> {
    if depth > 16 {
        return None;
    }
    match tok {
        Token::Int => Some(Object::Int(buf.int)),
        Token::Real => Some(Object::Real(buf.real)),
        Token::True => Some(Object::Bool(true)),
        Token::False => Some(Object::Bool(false)),
        Token::Null => Some(Object::Null),
        Token::String => Some(Object::String(PdfString(buf.bytes.clone()))),
        Token::Name => Some(Object::Name(Name::intern(&String::from_utf8_lossy(&buf.bytes)))),
        Token::OpenArray => {
            let mut items = Vec::new();
            loop {
                let t = lx.next(buf);
                if matches!(t, Token::CloseArray | Token::Eof) {
                    break;
                }
                if let Some(v) = parse_operand(lx, buf, t, depth + 1) {
                    items.push(v);
                }
            }
            Some(Object::Array(items))
        }
        Token::OpenDict => {
            let mut dict = Dict::new();
            loop {
                let t = lx.next(buf);
                match t {
                    Token::CloseDict | Token::Eof => break,
                    Token::Name => {
                        let key = Name::intern(&String::from_utf8_lossy(&buf.bytes));
                        let vt = lx.next(buf);
                        if matches!(vt, Token::CloseDict | Token::Eof) {
                            break;
                        }
                        if let Some(v) = parse_operand(lx, buf, vt, depth + 1) {
                            dict.insert(key, v);
                        }
                    }
                    _ => {}
                }
            }
            Some(Object::Dict(dict))
        }
        _ => None,
    }
}

/// Skip from after `BI` past the matching `EI`. The binary payload rules
/// out token-level scanning, so this looks for a whitespace-delimited
/// `EI` in the raw bytes.
fn skip_inline_image(lx: &mut Lexer<'_>, _buf: &mut LexBuf) {
    fn ws(b: u8) -> bool {
        matches!(b, b'\0' | b'\t' | b'\n' | b'\x0c' | b'\r' | b' ')
    }
    let base = lx.pos();
    let rest = lx.remaining();
    let mut i = 0;
    while i + 1 < rest.len() {
        if rest[i] == b'E'
            && rest[i + 1] == b'I'
            && (i == 0 || ws(rest[i - 1]))
            && (i + 2 >= rest.len() || ws(rest[i + 2]))
        {
            lx.seek(base + i + 2);
            return;
        }
        i += 1;
    }
    lx.seek(base + rest.len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::canvas::Shading;
    use crate::gfx::path::StrokeState;

    /// Records every canvas call as a line of text.
    #[derive(Default)]
    struct RecordCanvas {
        events: Vec<String>,
    }

    impl Canvas for RecordCanvas {
        fn fill_path(&mut self, path: &Path, even_odd: bool, _ctm: &Matrix, color: Color, alpha: f64) {
            self.events.push(format!(
                "fill eo={} n={} color=({:.2},{:.2},{:.2}) a={:.2}",
                even_odd,
                path.elements().len(),
                color.r,
                color.g,
                color.b,
                alpha
            ));
        }

        fn stroke_path(
            &mut self,
            path: &Path,
            stroke: &StrokeState,
            _ctm: &Matrix,
            color: Color,
            _alpha: f64,
        ) {
            self.events.push(format!(
                "stroke w={} n={} color=({:.2},{:.2},{:.2})",
                stroke.line_width,
                path.elements().len(),
                color.r,
                color.g,
                color.b
            ));
        }

        fn clip_path(&mut self, _path: &Path, even_odd: bool, _ctm: &Matrix) {
            self.events.push(format!("clip eo={even_odd}"));
        }

        fn pop_clip(&mut self) {
            self.events.push("pop_clip".into());
        }

        fn fill_image(&mut self, image: &Image, _ctm: &Matrix, _alpha: f64) {
            self.events.push(format!("image {}x{}", image.width, image.height));
        }

        fn fill_shading(&mut self, _shading: &Shading, _ctm: &Matrix, _alpha: f64) {
            self.events.push("shading".into());
        }
    }

    fn empty_file() -> PdfFile {
        PdfFile::parse_bytes(
            b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n\
              2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n\
              3 0 obj << /Type /Page /Parent 2 0 R >> endobj\n\
              trailer << /Root 1 0 R >>\n",
        )
        .unwrap()
    }

    fn run_content(canvas: &mut RecordCanvas, content: &[u8]) {
        let file = empty_file();
        let mut p = ContentPainter::new(canvas);
        p.execute(&file, None, content);
    }

    #[test]
    fn stroke_uses_stroke_color_and_width() {
        let mut rec = RecordCanvas::default();
        run_content(&mut rec, b"1 0 0 RG 2 w 0 0 m 100 100 l S");
        assert_eq!(rec.events, vec!["stroke w=2 n=2 color=(1.00,0.00,0.00)"]);
    }

    #[test]
    fn save_restore_round_trips_state() {
        let file = empty_file();
        let mut rec = RecordCanvas::default();
        let mut p = ContentPainter::new(&mut rec);
        p.execute(&file, None, b"q 2 0 0 2 0 0 cm 1 0 0 1 5 5 cm");
        let inside = p.matrix();
        assert_eq!((inside.a, inside.e, inside.f), (2.0, 10.0, 10.0));
        p.execute(&file, None, b"Q");
        assert_eq!(p.matrix(), Matrix::IDENTITY);
    }

    #[test]
    fn unbalanced_restore_is_clamped() {
        let file = empty_file();
        let mut rec = RecordCanvas::default();
        let mut p = ContentPainter::new(&mut rec);
        p.execute(&file, None, b"0 1 0 rg Q Q Q");
        assert_eq!(p.state().fill_color, Color::rgb(0.0, 1.0, 0.0));
        assert_eq!(p.matrix(), Matrix::IDENTITY);
    }

    #[test]
    fn cmyk_converts_on_entry() {
        let file = empty_file();
        let mut rec = RecordCanvas::default();
        let mut p = ContentPainter::new(&mut rec);
        p.execute(&file, None, b"1 0 0 0.5 k");
        // v = 1 - k = 0.5; red channel additionally scaled by (1 - c).
        assert_eq!(p.state().fill_color, Color::rgb(0.0, 0.5, 0.5));
    }

    #[test]
    fn deferred_clip_installs_after_paint() {
        let mut rec = RecordCanvas::default();
        run_content(&mut rec, b"0 0 10 10 re W n 0 0 5 5 re f");
        assert_eq!(rec.events[0], "clip eo=false");
        assert!(rec.events[1].starts_with("fill eo=false"));
    }

    #[test]
    fn restore_unwinds_clips() {
        let mut rec = RecordCanvas::default();
        run_content(&mut rec, b"q 0 0 10 10 re W n Q");
        assert_eq!(rec.events, vec!["clip eo=false", "pop_clip"]);
    }

    #[test]
    fn even_odd_variants_map_through() {
        let mut rec = RecordCanvas::default();
        run_content(&mut rec, b"0 0 4 4 re f* 0 0 4 4 re B*");
        assert!(rec.events[0].starts_with("fill eo=true"));
        assert!(rec.events[1].starts_with("fill eo=true"));
        assert!(rec.events[2].starts_with("stroke"));
    }

    #[test]
    fn gs_sets_alphas_only() {
        let pdf = b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n\
            2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n\
            3 0 obj << /Type /Page /Parent 2 0 R /Resources 4 0 R >> endobj\n\
            4 0 obj << /ExtGState << /GS1 << /ca 0.25 /CA 0.5 /LW 9 >> >> >> endobj\n\
            trailer << /Root 1 0 R >>\n";
        let file = PdfFile::parse_bytes(pdf).unwrap();
        let res = file.page_resources(0).unwrap();
        let mut rec = RecordCanvas::default();
        let mut p = ContentPainter::new(&mut rec);
        p.execute(&file, Some(res), b"/GS1 gs");
        assert_eq!(p.state().fill_alpha, 0.25);
        assert_eq!(p.state().stroke_alpha, 0.5);
        // The line-width entry is not applied.
        assert_eq!(p.state().stroke.line_width, 1.0);
    }

    #[test]
    fn scn_disambiguates_patterns() {
        let file = empty_file();
        let mut rec = RecordCanvas::default();
        let mut p = ContentPainter::new(&mut rec);
        p.execute(&file, None, b"/Pattern cs /P1 scn");
        assert_eq!(p.state().fill_pattern.as_ref().map(|n| n.as_str()), Some("P1"));

        p.execute(&file, None, b"0.2 0.4 0.6 /P2 scn");
        assert_eq!(p.state().fill_pattern.as_ref().map(|n| n.as_str()), Some("P2"));
        assert_eq!(p.state().fill_color, Color::rgb(0.2, 0.4, 0.6));

        // A plain color operator drops the pattern.
        p.execute(&file, None, b"0 0 0 rg");
        assert!(p.state().fill_pattern.is_none());
    }

    fn font_file() -> PdfFile {
        PdfFile::parse_bytes(
            b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n\
              2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n\
              3 0 obj << /Type /Page /Parent 2 0 R /Resources 4 0 R >> endobj\n\
              4 0 obj << /Font << /F1 5 0 R >> >> endobj\n\
              5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /T\n\
                 /FirstChar 65 /Widths [500 600] >> endobj\n\
              trailer << /Root 1 0 R >>\n",
        )
        .unwrap()
    }

    #[test]
    fn text_advance_accumulates() {
        let file = font_file();
        let res = file.page_resources(0).unwrap();
        let mut rec = RecordCanvas::default();
        let mut p = ContentPainter::new(&mut rec);
        p.execute(&file, Some(res), b"BT /F1 10 Tf 100 0 Td (AB) Tj ET");
        // 500/1000*10 + 600/1000*10 = 11 on top of the Td offset.
        let tm = p.text_matrix();
        assert!((tm.e - 111.0).abs() < 1e-9);
        assert!((tm.f - 0.0).abs() < 1e-9);
    }

    #[test]
    fn kerning_shifts_against_advance() {
        let file = font_file();
        let res = file.page_resources(0).unwrap();
        let mut rec = RecordCanvas::default();
        let mut p = ContentPainter::new(&mut rec);
        p.execute(&file, Some(res), b"BT /F1 10 Tf [ (A) 250 (B) ] TJ ET");
        // 5 - 2.5 + 6
        assert!((p.text_matrix().e - 8.5).abs() < 1e-9);
    }

    #[test]
    fn char_spacing_and_hscale_scale_advance() {
        let file = font_file();
        let res = file.page_resources(0).unwrap();
        let mut rec = RecordCanvas::default();
        let mut p = ContentPainter::new(&mut rec);
        p.execute(&file, Some(res), b"BT /F1 10 Tf 1 Tc 50 Tz (AB) Tj ET");
        // ((5 + 1) + (6 + 1)) * 0.5
        assert!((p.text_matrix().e - 6.5).abs() < 1e-9);
    }

    #[test]
    fn td_moves_the_line_matrix() {
        let file = font_file();
        let res = file.page_resources(0).unwrap();
        let mut rec = RecordCanvas::default();
        let mut p = ContentPainter::new(&mut rec);
        p.execute(&file, Some(res), b"BT 2 TL 10 20 Td T* ET");
        let tm = p.text_matrix();
        assert_eq!((tm.e, tm.f), (10.0, 18.0));
    }

    #[test]
    fn form_xobject_applies_matrix_and_restores() {
        let pdf = b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n\
            2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n\
            3 0 obj << /Type /Page /Parent 2 0 R /Resources 4 0 R >> endobj\n\
            4 0 obj << /XObject << /Fm 5 0 R >> >> endobj\n\
            5 0 obj << /Subtype /Form /Matrix [2 0 0 2 0 0] /Length 21 >>\n\
            stream\n0 0 1 rg 0 0 4 4 re f\nendstream\nendobj\n\
            trailer << /Root 1 0 R >>\n";
        let file = PdfFile::parse_bytes(pdf).unwrap();
        let res = file.page_resources(0).unwrap();
        let mut rec = RecordCanvas::default();
        let mut p = ContentPainter::new(&mut rec);
        p.execute(&file, Some(res), b"1 0 0 rg /Fm Do 0 0 2 2 re f");
        assert_eq!(p.matrix(), Matrix::IDENTITY);
        assert!(rec.events[0].contains("color=(0.00,0.00,1.00)"));
        // The fill after Do is back to red with the outer matrix.
        assert!(rec.events[1].contains("color=(1.00,0.00,0.00)"));
    }

    #[test]
    fn inline_image_is_skipped() {
        let mut rec = RecordCanvas::default();
        run_content(
            &mut rec,
            b"BI /W 2 /H 2 ID \x00\x01)](\xff EI 1 0 0 rg 0 0 1 1 re f",
        );
        assert_eq!(rec.events.len(), 1);
        assert!(rec.events[0].contains("color=(1.00,0.00,0.00)"));
    }

    #[test]
    fn tiling_pattern_replays_cells_under_clip() {
        let pdf = b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n\
            2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n\
            3 0 obj << /Type /Page /Parent 2 0 R /Resources 4 0 R >> endobj\n\
            4 0 obj << /Pattern << /P1 5 0 R >> >> endobj\n\
            5 0 obj << /PatternType 1 /BBox [0 0 10 10] /XStep 10 /YStep 10 /Length 12 >>\n\
            stream\n0 0 2 2 re f\nendstream\nendobj\n\
            trailer << /Root 1 0 R >>\n";
        let file = PdfFile::parse_bytes(pdf).unwrap();
        let res = file.page_resources(0).unwrap();
        let mut rec = RecordCanvas::default();
        let mut p = ContentPainter::new(&mut rec);
        p.execute(&file, Some(res), b"/Pattern cs /P1 scn 0 0 10 10 re f");
        // Clip to the path, at least one cell fill, then the clip pops.
        assert_eq!(rec.events.first().map(String::as_str), Some("clip eo=false"));
        assert!(rec.events.iter().any(|e| e.starts_with("fill")));
        assert_eq!(rec.events.last().map(String::as_str), Some("pop_clip"));
    }

    #[test]
    fn shading_paint_reaches_canvas() {
        let pdf = b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n\
            2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n\
            3 0 obj << /Type /Page /Parent 2 0 R /Resources 4 0 R >> endobj\n\
            4 0 obj << /Shading << /Sh << /ShadingType 2 /ColorSpace /DeviceRGB\n\
               /Coords [0 0 1 0]\n\
               /Function << /FunctionType 2 /C0 [0 0 0] /C1 [1 1 1] >> >> >> >> endobj\n\
            trailer << /Root 1 0 R >>\n";
        let file = PdfFile::parse_bytes(pdf).unwrap();
        let res = file.page_resources(0).unwrap();
        let mut rec = RecordCanvas::default();
        let mut p = ContentPainter::new(&mut rec);
        p.execute(&file, Some(res), b"/Sh sh");
        assert_eq!(rec.events, vec!["shading"]);
    }

    #[test]
    fn finish_unwinds_remaining_clips() {
        let file = empty_file();
        let mut rec = RecordCanvas::default();
        {
            let mut p = ContentPainter::new(&mut rec);
            p.execute(&file, None, b"0 0 10 10 re W n q 0 0 5 5 re W n");
            p.finish().unwrap();
        }
        let pops = rec.events.iter().filter(|e| *e == "pop_clip").count();
        assert_eq!(pops, 2);
    }
}

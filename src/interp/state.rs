//! Graphics state frames and the two stacks the interpreter maintains:
//! the save/restore stack driven by `q`/`Q` and the scoped resource
//! dictionary stack driven by Form XObject recursion.

use std::sync::Arc;

use crate::gfx::color::{Color, Colorspace};
use crate::gfx::geometry::Matrix;
use crate::gfx::path::StrokeState;
use crate::pdf::file::PdfFile;
use crate::pdf::font::Face;
use crate::pdf::object::{Dict, Name, Object};

/// One frame of painter state. `q` copies the top frame, `Q` discards it.
#[derive(Clone)]
pub struct GraphicsState {
    pub ctm: Matrix,
    pub stroke_color: Color,
    pub fill_color: Color,
    pub stroke_alpha: f64,
    pub fill_alpha: f64,
    pub stroke_space: Colorspace,
    pub fill_space: Colorspace,
    pub stroke: StrokeState,
    /// Name of the active fill pattern, set by `scn`.
    pub fill_pattern: Option<Name>,
    pub font: Option<Arc<Face>>,
    pub font_size: f64,
    pub char_spacing: f64,
    pub word_spacing: f64,
    /// Fraction, `Tz / 100`.
    pub horizontal_scaling: f64,
    pub leading: f64,
    pub text_rise: f64,
    pub text_render_mode: i32,
    /// Clips installed while this frame was on top; unwound on restore.
    pub clip_count: usize,
}

impl Default for GraphicsState {
    fn default() -> Self {
        GraphicsState {
            ctm: Matrix::IDENTITY,
            stroke_color: Color::BLACK,
            fill_color: Color::BLACK,
            stroke_alpha: 1.0,
            fill_alpha: 1.0,
            stroke_space: Colorspace::DeviceRgb,
            fill_space: Colorspace::DeviceRgb,
            stroke: StrokeState::default(),
            fill_pattern: None,
            font: None,
            font_size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scaling: 1.0,
            leading: 0.0,
            text_rise: 0.0,
            text_render_mode: 0,
            clip_count: 0,
        }
    }
}

/// Vector-backed save/restore stack. Never pops below depth 1, so an
/// unbalanced stream cannot leave the interpreter without a state.
pub struct StateStack {
    stack: Vec<GraphicsState>,
}

impl StateStack {
    pub fn new(initial: GraphicsState) -> StateStack {
        StateStack { stack: vec![initial] }
    }

    pub fn top(&self) -> &GraphicsState {
        // Construction guarantees at least one frame.
        self.stack.last().unwrap()
    }

    pub fn top_mut(&mut self) -> &mut GraphicsState {
        self.stack.last_mut().unwrap()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// `q`: duplicate the top frame. The copy starts with no clips of its
    /// own.
    pub fn push(&mut self) {
        let mut copy = self.top().clone();
        copy.clip_count = 0;
        self.stack.push(copy);
    }

    /// `Q`: drop the top frame, reporting how many clips it had
    /// installed so the caller can unwind the canvas. Underflow is a
    /// no-op reporting zero.
    pub fn pop(&mut self) -> usize {
        if self.stack.len() > 1 {
            self.stack.pop().map(|s| s.clip_count).unwrap_or(0)
        } else {
            0
        }
    }

    /// Total clips still installed across all frames; `finish` unwinds
    /// them.
    pub fn total_clips(&self) -> usize {
        self.stack.iter().map(|s| s.clip_count).sum()
    }
}

/// The resource-dictionary scope stack. Lookup scans innermost-first and
/// never errors; an empty result means the operator becomes a no-op.
pub struct ResourceStack<'f> {
    file: &'f PdfFile,
    stack: Vec<&'f Dict>,
}

impl<'f> ResourceStack<'f> {
    pub fn new(file: &'f PdfFile) -> ResourceStack<'f> {
        ResourceStack { file, stack: Vec::new() }
    }

    pub fn push(&mut self, resources: &'f Dict) {
        self.stack.push(resources);
    }

    pub fn pop(&mut self) {
        self.stack.pop();
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// `findResource(kind, name)`: first hit from the innermost scope
    /// outwards.
    pub fn find(&self, kind: &str, name: &str) -> Option<&'f Object> {
        for resources in self.stack.iter().rev() {
            if let Some(category) = self.file.get_dict(resources, kind)
                && let Some(obj) = self.file.get(category, name)
            {
                return Some(obj);
            }
        }
        None
    }

    pub fn find_dict(&self, kind: &str, name: &str) -> Option<&'f Dict> {
        self.find(kind, name)?.as_dict()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_copies_and_pop_restores() {
        let mut st = StateStack::new(GraphicsState::default());
        st.top_mut().fill_color = Color::rgb(1.0, 0.0, 0.0);
        st.push();
        assert_eq!(st.top().fill_color, Color::rgb(1.0, 0.0, 0.0));
        st.top_mut().fill_color = Color::rgb(0.0, 1.0, 0.0);
        st.top_mut().clip_count = 2;
        assert_eq!(st.pop(), 2);
        assert_eq!(st.top().fill_color, Color::rgb(1.0, 0.0, 0.0));
    }

    #[test]
    fn pop_clamps_at_depth_one() {
        let mut st = StateStack::new(GraphicsState::default());
        st.top_mut().font_size = 12.0;
        assert_eq!(st.pop(), 0);
        assert_eq!(st.pop(), 0);
        assert_eq!(st.depth(), 1);
        assert_eq!(st.top().font_size, 12.0);
    }

    #[test]
    fn nested_push_pop_round_trip() {
        let mut st = StateStack::new(GraphicsState::default());
        let before = st.top().ctm;
        for _ in 0..8 {
            st.push();
            st.top_mut().ctm = Matrix::scale(2.0, 2.0).concat(&st.top().ctm);
        }
        for _ in 0..8 {
            st.pop();
        }
        assert_eq!(st.depth(), 1);
        assert_eq!(st.top().ctm, before);
    }

    #[test]
    fn resource_shadowing() {
        let pdf = b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n\
            2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n\
            3 0 obj << /Type /Page /Parent 2 0 R >> endobj\n\
            4 0 obj << /Font << /F1 5 0 R >> >> endobj\n\
            5 0 obj << /BaseFont /Outer >> endobj\n\
            6 0 obj << /Font << /F1 7 0 R >> >> endobj\n\
            7 0 obj << /BaseFont /Inner >> endobj\n\
            trailer << /Root 1 0 R >>\n";
        let file = PdfFile::parse_bytes(pdf).unwrap();
        let page_res = file.object(4).unwrap().as_dict().unwrap();
        let form_res = file.object(6).unwrap().as_dict().unwrap();

        let mut rs = ResourceStack::new(&file);
        rs.push(page_res);
        let outer = rs.find_dict("Font", "F1").unwrap();
        assert_eq!(file.get_name(outer, "BaseFont"), Some("Outer"));

        // Inside the form the inner definition shadows the outer one.
        rs.push(form_res);
        let inner = rs.find_dict("Font", "F1").unwrap();
        assert_eq!(file.get_name(inner, "BaseFont"), Some("Inner"));

        // Popping back out restores visibility.
        rs.pop();
        let outer_again = rs.find_dict("Font", "F1").unwrap();
        assert_eq!(file.get_name(outer_again, "BaseFont"), Some("Outer"));

        assert!(rs.find("Font", "F9").is_none());
        assert!(rs.find("XObject", "F1").is_none());
    }
}

//! Drawable page objects.
//!
//! Each variant knows how to paint itself onto a [`ContentPainter`].
//! Text objects carry a pre-compiled PDF (the typesetting step happens
//! upstream); drawing one executes its first page's content stream under
//! the object matrix.

use std::sync::Arc;

use crate::gfx::canvas::Image;
use crate::gfx::geometry::Matrix;
use crate::gfx::path::{DrawMode, LineCap, LineJoin, Path, PathElement};
use crate::interp::ContentPainter;
use crate::pdf::file::PdfFile;

use super::attributes::{Attribute, AttributeMap, Cascade};

/// Everything `DocObject::draw` needs besides the painter.
pub struct DrawContext<'a> {
    pub cascade: &'a Cascade,
    /// The active view's symbolic remapping, if any.
    pub map: Option<&'a AttributeMap>,
}

impl<'a> DrawContext<'a> {
    pub fn new(cascade: &'a Cascade, map: Option<&'a AttributeMap>) -> DrawContext<'a> {
        DrawContext { cascade, map }
    }

    /// Resolve an attribute with the view map applied to symbolic names.
    fn remap(&self, attr: &Attribute) -> Attribute {
        match (attr, self.map) {
            (Attribute::Symbolic(name), Some(map)) => {
                Attribute::Symbolic(map.lookup(name).to_string())
            }
            _ => attr.clone(),
        }
    }
}

#[derive(Clone)]
pub struct PathObject {
    pub matrix: Matrix,
    pub shape: Path,
    pub mode: DrawMode,
    pub even_odd: bool,
    pub stroke: Attribute,
    pub fill: Attribute,
    pub pen: Attribute,
    pub dash: Attribute,
    pub opacity: Attribute,
    pub cap: LineCap,
    pub join: LineJoin,
}

impl PathObject {
    /// Stroked path with the default style names.
    pub fn stroked(shape: Path, stroke: Attribute) -> PathObject {
        PathObject {
            matrix: Matrix::IDENTITY,
            shape,
            mode: DrawMode::StrokedOnly,
            even_odd: false,
            stroke,
            fill: Attribute::symbolic("white"),
            pen: Attribute::symbolic("normal"),
            dash: Attribute::symbolic("solid"),
            opacity: Attribute::symbolic("opaque"),
            cap: LineCap::Butt,
            join: LineJoin::Miter,
        }
    }

    pub fn filled(shape: Path, fill: Attribute) -> PathObject {
        PathObject { mode: DrawMode::FilledOnly, fill, ..PathObject::stroked(shape, Attribute::symbolic("black")) }
    }
}

#[derive(Clone)]
pub struct TextObject {
    pub matrix: Matrix,
    /// Compiled rendition of the text, a standalone one-page PDF.
    pub pdf: Arc<PdfFile>,
}

#[derive(Clone)]
pub struct ImageObject {
    pub matrix: Matrix,
    pub image: Image,
    pub opacity: Attribute,
}

#[derive(Clone)]
pub struct GroupObject {
    pub matrix: Matrix,
    pub clip: Option<Path>,
    pub children: Vec<DocObject>,
}

/// A use of a named symbol from the cascade.
#[derive(Clone)]
pub struct ReferenceObject {
    pub matrix: Matrix,
    pub name: String,
}

#[derive(Clone)]
pub enum DocObject {
    Path(PathObject),
    Text(TextObject),
    Image(ImageObject),
    Group(GroupObject),
    Reference(ReferenceObject),
}

impl DocObject {
    pub fn draw(&self, painter: &mut ContentPainter<'_>, ctx: &DrawContext<'_>) {
        self.draw_at(painter, ctx, 0);
    }

    fn draw_at(&self, painter: &mut ContentPainter<'_>, ctx: &DrawContext<'_>, depth: usize) {
        if depth > 8 {
            return;
        }
        match self {
            DocObject::Path(p) => p.draw(painter, ctx),
            DocObject::Text(t) => {
                painter.save();
                painter.transform(&t.matrix);
                painter.execute_page(&t.pdf, 0);
                painter.restore();
            }
            DocObject::Image(img) => {
                painter.save();
                painter.transform(&img.matrix);
                painter.set_opacity(ctx.cascade.opacity(&ctx.remap(&img.opacity)));
                painter.draw_bitmap(&img.image);
                painter.restore();
            }
            DocObject::Group(g) => {
                painter.save();
                painter.transform(&g.matrix);
                if let Some(clip) = &g.clip {
                    replay(clip, painter);
                    painter.add_clip_path(false);
                }
                for child in &g.children {
                    child.draw_at(painter, ctx, depth + 1);
                }
                painter.restore();
            }
            DocObject::Reference(r) => {
                let name = match ctx.map {
                    Some(map) => map.lookup(&r.name),
                    None => r.name.as_str(),
                };
                if let Some(symbol) = ctx.cascade.symbol(name).cloned() {
                    painter.save();
                    painter.transform(&r.matrix);
                    symbol.draw_at(painter, ctx, depth + 1);
                    painter.restore();
                }
            }
        }
    }
}

impl PathObject {
    fn draw(&self, painter: &mut ContentPainter<'_>, ctx: &DrawContext<'_>) {
        let cascade = ctx.cascade;
        painter.save();
        painter.transform(&self.matrix);
        painter.set_stroke(cascade.color(&ctx.remap(&self.stroke)));
        painter.set_fill(cascade.color(&ctx.remap(&self.fill)));
        painter.set_pen(cascade.pen(&ctx.remap(&self.pen)));
        let dash = cascade.dash(&ctx.remap(&self.dash));
        painter.set_dash(&dash.pattern, dash.phase);
        painter.set_line_cap(self.cap);
        painter.set_line_join(self.join);
        painter.set_opacity(cascade.opacity(&ctx.remap(&self.opacity)));
        replay(&self.shape, painter);
        painter.draw_path(self.mode, self.even_odd);
        painter.restore();
    }
}

/// Feed a stored path into the painter's path accumulator.
fn replay(path: &Path, painter: &mut ContentPainter<'_>) {
    for el in path.elements() {
        match *el {
            PathElement::MoveTo(p) => painter.move_to(p),
            PathElement::LineTo(p) => painter.line_to(p),
            PathElement::CurveTo(c1, c2, p) => painter.curve_to(c1, c2, p),
            PathElement::Close => painter.close_path(),
        }
    }
}

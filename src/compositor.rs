//! Page compositing: turn a document page (or a raw PDF page) into a
//! pixel buffer or a vector file.
//!
//! The raster path renders at `zoom` pixels per point; the vector paths
//! emit point coordinates. Crop boxes default to the tightest bounds of
//! what the page actually draws; `no_crop` uses the paper rectangle and
//! additionally paints the background symbol and the page title.

use crate::doc::{Cascade, DrawContext, Page};
use crate::gfx::canvas::{BBoxCanvas, Canvas};
use crate::gfx::error::{Error, Result};
use crate::gfx::eps::PostscriptCanvas;
use crate::gfx::geometry::{Matrix, Rect};
use crate::gfx::output::Output;
use crate::gfx::pdfout::PdfCanvas;
use crate::gfx::pixmap::Buffer;
use crate::gfx::raster_canvas::RasterCanvas;
use crate::gfx::svg::SvgCanvas;
use crate::interp::ContentPainter;
use crate::pdf::file::PdfFile;

/// Name of the cascade symbol painted behind uncropped pages.
const BACKGROUND_SYMBOL: &str = "Background";

const DEFAULT_TOLERANCE: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Png,
    Eps,
    Pdf,
    Svg,
}

#[derive(Debug, Clone, Copy)]
pub struct RenderOpts {
    pub tolerance: f64,
    pub transparent: bool,
    pub no_crop: bool,
}

impl Default for RenderOpts {
    fn default() -> Self {
        RenderOpts { tolerance: DEFAULT_TOLERANCE, transparent: false, no_crop: false }
    }
}

/// Device transform mapping the crop rectangle's top-left corner to the
/// origin, y flipped, at `zoom` device units per point.
fn device_matrix(crop: &Rect, zoom: f64) -> Matrix {
    Matrix::translate(-crop.x0, -crop.y1).concat(&Matrix::scale(zoom, -zoom))
}

fn paint_page(
    canvas: &mut dyn Canvas,
    device: Matrix,
    page: &Page,
    cascade: &Cascade,
    view: usize,
    no_crop: bool,
) -> Result<()> {
    let mut painter = ContentPainter::with_matrix(canvas, device);
    let map = page.view(view).map(|v| &v.attributes).filter(|m| !m.is_empty());
    let ctx = DrawContext::new(cascade, map);
    if no_crop {
        if let Some(symbol) = cascade.symbol(BACKGROUND_SYMBOL).cloned() {
            symbol.draw(&mut painter, &ctx);
        }
        if let Some(title) = page.title_text() {
            crate::doc::DocObject::Text(title.clone()).draw(&mut painter, &ctx);
        }
    }
    for i in 0..page.count_objects() {
        if !page.object_visible(view, i) {
            continue;
        }
        painter.save();
        painter.transform(&page.object_matrix(view, i));
        if let Some(obj) = page.object(i) {
            obj.draw(&mut painter, &ctx);
        }
        painter.restore();
    }
    painter.finish()
}

fn paint_pdf(canvas: &mut dyn Canvas, device: Matrix, file: &PdfFile, pno: usize) -> Result<()> {
    let mut painter = ContentPainter::with_matrix(canvas, device);
    painter.execute_page(file, pno);
    painter.finish()
}

/// Tightest user-space bounds of one painted page, or `paper` when the
/// page draws nothing.
fn tight_bounds(paint: &mut dyn FnMut(&mut dyn Canvas, Matrix) -> Result<()>, paper: Rect) -> Rect {
    let mut bbox = BBoxCanvas::new();
    // A bbox pass has no sink, so paint cannot fail.
    let _ = paint(&mut bbox, Matrix::IDENTITY);
    let r = bbox.bbox();
    if r.is_empty() { paper } else { r.intersect(&paper) }
}

fn raster(
    paint: &mut dyn FnMut(&mut dyn Canvas, Matrix) -> Result<()>,
    crop: Rect,
    zoom: f64,
    tolerance: f64,
    transparent: bool,
) -> Result<Buffer> {
    if !(zoom.is_finite() && zoom > 0.0) {
        return Err(Error::argument(format!("bad zoom {zoom}")));
    }
    let width = (crop.width() * zoom).ceil() as u32;
    let height = (crop.height() * zoom).ceil() as u32;
    let mut buf = Buffer::new(width, height)?;
    buf.fill(if transparent { 0x0000_0000 } else { 0xffff_ffff });
    let mut canvas = RasterCanvas::new(&mut buf, tolerance);
    paint(&mut canvas, device_matrix(&crop, zoom))?;
    Ok(buf)
}

fn write_png(buf: &Buffer, out: &mut Output) -> Result<()> {
    use image::ImageEncoder;
    let mut encoded = Vec::new();
    image::codecs::png::PngEncoder::new(&mut encoded)
        .write_image(
            &buf.to_rgba(),
            buf.width(),
            buf.height(),
            image::ExtendedColorType::Rgba8,
        )
        .map_err(|e| Error::format(format!("png encode: {e}")))?;
    out.write(&encoded)?;
    out.flush()
}

fn save_common(
    paint: &mut dyn FnMut(&mut dyn Canvas, Matrix) -> Result<()>,
    format: Format,
    mut out: Output,
    paper: Rect,
    zoom: f64,
    opts: &RenderOpts,
) -> Result<()> {
    let crop = if opts.no_crop { paper } else { tight_bounds(paint, paper) };
    match format {
        Format::Png => {
            let buf = raster(paint, crop, zoom, opts.tolerance, opts.transparent)?;
            write_png(&buf, &mut out)
        }
        Format::Svg | Format::Eps | Format::Pdf => {
            // Vector output is in points; snap the crop box outwards.
            let crop = Rect::new(crop.x0.floor(), crop.y0.floor(), crop.x1.ceil(), crop.y1.ceil());
            let device = device_matrix(&crop, 1.0);
            let (w, h) = (crop.width(), crop.height());
            match format {
                Format::Svg => {
                    let mut canvas = SvgCanvas::new(out, w, h);
                    paint(&mut canvas, device)
                }
                Format::Eps => {
                    let mut canvas = PostscriptCanvas::new(out, w, h);
                    paint(&mut canvas, device)
                }
                _ => {
                    let mut canvas = PdfCanvas::new(out, w, h);
                    paint(&mut canvas, device)
                }
            }
        }
    }
}

/// Render one view of a page into a fresh pixel buffer.
pub fn render(
    page: &Page,
    cascade: &Cascade,
    view: usize,
    zoom: f64,
    transparent: bool,
) -> Result<Buffer> {
    if view >= page.count_views() {
        return Err(Error::argument(format!("no view {view}")));
    }
    let mut paint = |canvas: &mut dyn Canvas, device: Matrix| {
        paint_page(canvas, device, page, cascade, view, false)
    };
    raster(&mut paint, page.paper(), zoom, DEFAULT_TOLERANCE, transparent)
}

/// Render one view of a page to an output sink in the given format.
pub fn save_render(
    format: Format,
    out: Output,
    page: &Page,
    cascade: &Cascade,
    view: usize,
    zoom: f64,
    opts: &RenderOpts,
) -> Result<()> {
    if view >= page.count_views() {
        return Err(Error::argument(format!("no view {view}")));
    }
    let no_crop = opts.no_crop;
    let mut paint = |canvas: &mut dyn Canvas, device: Matrix| {
        paint_page(canvas, device, page, cascade, view, no_crop)
    };
    save_common(&mut paint, format, out, page.paper(), zoom, opts)
}

/// Render a raw PDF page into a pixel buffer sized from its media box.
pub fn render_pdf_page(file: &PdfFile, pno: usize, zoom: f64, transparent: bool) -> Result<Buffer> {
    if pno >= file.count_pages() {
        return Err(Error::argument(format!("no page {pno}")));
    }
    let mut paint =
        |canvas: &mut dyn Canvas, device: Matrix| paint_pdf(canvas, device, file, pno);
    raster(&mut paint, file.media_box(pno), zoom, DEFAULT_TOLERANCE, transparent)
}

/// Render a raw PDF page to an output sink in the given format.
pub fn save_pdf_page(
    format: Format,
    out: Output,
    file: &PdfFile,
    pno: usize,
    zoom: f64,
    opts: &RenderOpts,
) -> Result<()> {
    if pno >= file.count_pages() {
        return Err(Error::argument(format!("no page {pno}")));
    }
    let mut paint =
        |canvas: &mut dyn Canvas, device: Matrix| paint_pdf(canvas, device, file, pno);
    save_common(&mut paint, format, out, file.media_box(pno), zoom, opts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc::{Attribute, DocObject, PathObject};
    use crate::gfx::path::Path;

    fn green_square_page() -> (Page, Cascade) {
        let mut page = Page::new(Rect::new(0.0, 0.0, 100.0, 100.0));
        let mut shape = Path::new();
        shape.rect(10.0, 10.0, 80.0, 80.0);
        page.add_object(0, DocObject::Path(PathObject::filled(shape, Attribute::symbolic("green"))));
        (page, Cascade::new())
    }

    #[test]
    fn empty_page_renders_blank() {
        let page = Page::new(Rect::new(0.0, 0.0, 10.0, 10.0));
        let cascade = Cascade::new();
        let buf = render(&page, &cascade, 0, 1.0, false).unwrap();
        assert_eq!((buf.width(), buf.height()), (10, 10));
        assert!(buf.pixels().iter().all(|&p| p == 0xffff_ffff));

        let buf = render(&page, &cascade, 0, 1.0, true).unwrap();
        assert!(buf.pixels().iter().all(|&p| p == 0x0000_0000));
    }

    #[test]
    fn green_square_hits_center_not_corner() {
        let (page, cascade) = green_square_page();
        let buf = render(&page, &cascade, 0, 1.0, false).unwrap();
        // Paper y runs up, device y runs down; the center is green.
        assert_eq!(buf.get(50, 50), 0xff00_ff00);
        // The 10-point margin stays white.
        assert_eq!(buf.get(2, 2), 0xffff_ffff);
        assert_eq!(buf.get(97, 97), 0xffff_ffff);
    }

    #[test]
    fn zoom_scales_the_buffer() {
        let (page, cascade) = green_square_page();
        let buf = render(&page, &cascade, 0, 2.0, false).unwrap();
        assert_eq!((buf.width(), buf.height()), (200, 200));
        assert_eq!(buf.get(100, 100), 0xff00_ff00);
    }

    #[test]
    fn invalid_view_is_an_error() {
        let (page, cascade) = green_square_page();
        assert!(render(&page, &cascade, 3, 1.0, false).is_err());
    }

    #[test]
    fn hidden_view_renders_blank() {
        let (mut page, cascade) = green_square_page();
        let v = page.add_view(crate::doc::View::new());
        let buf = render(&page, &cascade, v, 1.0, false).unwrap();
        assert!(buf.pixels().iter().all(|&p| p == 0xffff_ffff));
    }

    #[test]
    fn pixel_cap_enforced_before_allocation() {
        let page = Page::new(Rect::new(0.0, 0.0, 10_000.0, 10_000.0));
        let cascade = Cascade::new();
        match render(&page, &cascade, 0, 1.0, false) {
            Err(Error::Limit(_)) => {}
            other => panic!("expected limit error, got {other:?}"),
        }
        // 4000 * 5000 = 20e6 exactly fits the cap.
        let page = Page::new(Rect::new(0.0, 0.0, 4_000.0, 5_000.0));
        assert!(render(&page, &cascade, 0, 1.0, true).is_ok());
    }

    #[test]
    fn save_render_png_crops_to_content() {
        let (page, cascade) = green_square_page();
        let collected = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let sink = collected.clone();
        let out = Output::to_writer(move |d| {
            sink.borrow_mut().extend_from_slice(d);
            Ok(())
        });
        save_render(Format::Png, out, &page, &cascade, 0, 1.0, &RenderOpts::default()).unwrap();
        let bytes = collected.borrow();
        // PNG magic plus an 80x80 IHDR (cropped to the square).
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
        assert_eq!(&bytes[16..20], &80u32.to_be_bytes());
        assert_eq!(&bytes[20..24], &80u32.to_be_bytes());
    }

    #[test]
    fn save_render_svg_mentions_fill() {
        let (page, cascade) = green_square_page();
        let collected = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let sink = collected.clone();
        let out = Output::to_writer(move |d| {
            sink.borrow_mut().extend_from_slice(d);
            Ok(())
        });
        save_render(Format::Svg, out, &page, &cascade, 0, 1.0, &RenderOpts::default()).unwrap();
        let text = String::from_utf8(collected.borrow().clone()).unwrap();
        assert!(text.starts_with("<?xml"));
        assert!(text.contains("fill=\"#00ff00\""));
    }

    #[test]
    fn raw_pdf_page_renders() {
        let file = PdfFile::parse_bytes(&crate::pdf::file::tests::two_page_pdf()).unwrap();
        let buf = render_pdf_page(&file, 1, 1.0, false).unwrap();
        // Page 2 has its own 100x100 media box and a green square fill.
        assert_eq!((buf.width(), buf.height()), (100, 100));
        assert_eq!(buf.get(30, 60), 0xff00_ff00);
        assert!(render_pdf_page(&file, 2, 1.0, false).is_err());
    }
}

//! End-to-end checks through the public API: parse a file from disk,
//! render it, and navigate it.

use std::io::Write;

use inkstream::compositor::{self, Format, RenderOpts};
use inkstream::gfx::geometry::Point;
use inkstream::gfx::output::Output;
use inkstream::pdf::file::PdfFile;
use inkstream::presenter::{Action, Presenter};

/// Three pages on 100x100 paper. Page 1 fills a green square, pages 2
/// and 3 are blank; `/PageLabels` names them title, body-1, body-2.
fn sample_pdf() -> Vec<u8> {
    let content = b"0 1 0 rg 20 20 60 60 re f";
    let mut pdf = Vec::new();
    pdf.extend_from_slice(b"%PDF-1.4\n");
    pdf.extend_from_slice(
        b"1 0 obj << /Type /Catalog /Pages 2 0 R\n\
            /PageLabels << /Nums [0 << /P (title) >> 1 << /P (body) >>] >>\n\
          >> endobj\n",
    );
    pdf.extend_from_slice(
        b"2 0 obj << /Type /Pages /Kids [3 0 R 4 0 R 5 0 R] /Count 3\n\
            /MediaBox [0 0 100 100] >> endobj\n",
    );
    pdf.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /Contents 6 0 R >> endobj\n");
    pdf.extend_from_slice(b"4 0 obj << /Type /Page /Parent 2 0 R >> endobj\n");
    pdf.extend_from_slice(b"5 0 obj << /Type /Page /Parent 2 0 R >> endobj\n");
    pdf.extend_from_slice(
        format!("6 0 obj << /Length {} >> stream\n", content.len()).as_bytes(),
    );
    pdf.extend_from_slice(content);
    pdf.extend_from_slice(b"\nendstream endobj\n");
    pdf.extend_from_slice(b"trailer << /Root 1 0 R /Size 7 >>\n%%EOF\n");
    pdf
}

fn write_sample() -> tempfile::NamedTempFile {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    f.write_all(&sample_pdf()).unwrap();
    f.flush().unwrap();
    f
}

#[test]
fn parse_and_render_from_disk() {
    let f = write_sample();
    let file = PdfFile::parse_file(f.path()).unwrap();
    assert_eq!(file.count_pages(), 3);

    let buf = compositor::render_pdf_page(&file, 0, 1.0, false).unwrap();
    // Raw rendering covers the whole media box.
    assert_eq!((buf.width(), buf.height()), (100, 100));
    assert_eq!(buf.get(50, 50), 0xff00_ff00);
    assert_eq!(buf.get(5, 5), 0xffff_ffff);
}

#[test]
fn blank_page_renders_paper_sized() {
    let f = write_sample();
    let file = PdfFile::parse_file(f.path()).unwrap();
    let buf = compositor::render_pdf_page(&file, 1, 1.0, false).unwrap();
    assert_eq!((buf.width(), buf.height()), (100, 100));
    assert_eq!(buf.get(50, 50), 0xffff_ffff);
}

#[test]
fn save_png_to_file() {
    let f = write_sample();
    let file = PdfFile::parse_file(f.path()).unwrap();
    let out_file = tempfile::NamedTempFile::new().unwrap();
    let out = Output::to_path(out_file.path()).unwrap();
    compositor::save_pdf_page(
        Format::Png,
        out,
        &file,
        0,
        2.0,
        &RenderOpts::default(),
    )
    .unwrap();
    let data = std::fs::read(out_file.path()).unwrap();
    assert_eq!(&data[..8], b"\x89PNG\r\n\x1a\n");
    // Tight crop of the 60pt square at zoom 2, from the IHDR chunk.
    let w = u32::from_be_bytes([data[16], data[17], data[18], data[19]]);
    let h = u32::from_be_bytes([data[20], data[21], data[22], data[23]]);
    assert_eq!((w, h), (120, 120));
}

#[test]
fn save_svg_to_file() {
    let f = write_sample();
    let file = PdfFile::parse_file(f.path()).unwrap();
    let out_file = tempfile::NamedTempFile::new().unwrap();
    let out = Output::to_path(out_file.path()).unwrap();
    compositor::save_pdf_page(
        Format::Svg,
        out,
        &file,
        0,
        1.0,
        &RenderOpts::default(),
    )
    .unwrap();
    let text = std::fs::read_to_string(out_file.path()).unwrap();
    assert!(text.contains("<svg"));
    assert!(text.contains("#00ff00"));
}

#[test]
fn page_out_of_range_is_an_error() {
    let f = write_sample();
    let file = PdfFile::parse_file(f.path()).unwrap();
    assert!(compositor::render_pdf_page(&file, 3, 1.0, false).is_err());
}

#[test]
fn presenter_labels_and_jump() {
    let f = write_sample();
    let mut p = Presenter::load(f.path()).unwrap();
    assert_eq!(p.page_label(0), "title");
    assert_eq!(p.page_label(1), "body-1");
    assert_eq!(p.page_label(2), "body-2");

    // The bare label finds the first view of the run.
    assert!(p.jump_to_page("body"));
    assert_eq!(p.current_view(), 1);
    p.next_page(-1);
    assert_eq!(p.current_view(), 0);
    assert!(p.find_link(Point::new(50.0, 50.0)).is_none());
    assert_eq!(
        p.interpret_action(&Action::Named("LastPage".into())),
        None
    );
    assert_eq!(p.current_view(), 2);
}

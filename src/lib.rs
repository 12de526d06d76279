//! inkstream - a PDF content-stream interpreter and vector-graphics painter.
//!
//! The crate is organized in layers:
//!
//! - `gfx`: generic 2D graphics (geometry, paths, colors, the `Canvas`
//!   backend contract, a scanline rasterizer, and vector writer backends
//!   for SVG, PostScript and PDF)
//! - `pdf`: the PDF object model, lexer, permissive file reader, and font
//!   faces
//! - `interp`: the content-stream interpreter driving a `Canvas` through a
//!   graphics-state stack and a scoped resource stack
//! - `doc`: an editor-style document model (pages, views, layers, attribute
//!   cascade) whose objects draw themselves through the interpreter
//! - `compositor`: renders a page/view (or a raw PDF page) into a pixel
//!   buffer or a vector output file
//! - `presenter`: page navigation, page labels, and link/action resolution
//!   over a PDF file

pub mod compositor;
pub mod doc;
pub mod gfx;
pub mod interp;
pub mod pdf;
pub mod presenter;

pub use gfx::error::{Error, Result};

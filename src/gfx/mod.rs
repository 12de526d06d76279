//! Generic 2D graphics layer: geometry, paths, colors, pixel buffers, the
//! `Canvas` backend contract and its raster and vector implementations.

pub mod canvas;
pub mod color;
pub mod eps;
pub mod error;
pub mod geometry;
pub mod output;
pub mod path;
pub mod pdfout;
pub mod pixmap;
pub mod raster;
pub mod raster_canvas;
pub mod svg;

pub use canvas::{BBoxCanvas, Canvas, TraceCanvas};
pub use color::{Color, Colorspace};
pub use error::{Error, Result};
pub use geometry::{Matrix, Point, Rect};
pub use output::Output;
pub use path::{DrawMode, LineCap, LineJoin, Path, PathElement, StrokeState};
pub use pixmap::Buffer;
pub use raster_canvas::RasterCanvas;

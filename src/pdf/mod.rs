//! PDF object model, lexer, permissive file reader, and font faces.

pub mod file;
pub mod font;
pub mod lexer;
pub mod object;

pub use file::PdfFile;
pub use font::{Face, FontShop};
pub use object::{Dict, Name, Object, ObjRef, PdfString, Stream};

//! The PDF object model.
//!
//! Accessors are permissive throughout: every `as_*` returns `Option` and
//! callers treat `None` as "entry absent", which the interpreter turns
//! into a silent no-op.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use bytes::Bytes;

/// Names that appear in virtually every document; interning hits this
/// table before allocating.
static COMMON_NAMES: LazyLock<Vec<Name>> = LazyLock::new(|| {
    [
        "Type", "Subtype", "Length", "Filter", "FlateDecode", "DCTDecode", "Page", "Pages",
        "Catalog", "Kids", "Count", "Parent", "MediaBox", "Resources", "Contents", "Font",
        "XObject", "Pattern", "ExtGState", "Shading", "ColorSpace", "Form", "Image", "Width",
        "Height", "BitsPerComponent", "DeviceRGB", "DeviceGray", "DeviceCMYK", "Matrix", "BBox",
        "Name", "FirstChar", "LastChar", "Widths", "FontDescriptor", "FontFile", "FontFile2",
        "FontFile3", "BaseFont", "Annots", "Rect", "A", "S", "D", "URI", "Names", "Dests",
        "PageLabels", "Nums", "P", "Root", "Prev", "Encrypt",
    ]
    .iter()
    .map(|s| Name(Arc::from(*s)))
    .collect()
});

/// An interned PDF name (written `/Name` in the file).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Name(Arc<str>);

impl Name {
    pub fn intern(s: &str) -> Name {
        for n in COMMON_NAMES.iter() {
            if n.as_str() == s {
                return n.clone();
            }
        }
        Name(Arc::from(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Name {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Name {
        Name::intern(s)
    }
}

/// A PDF string: raw bytes, not necessarily UTF-8.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct PdfString(pub Vec<u8>);

impl PdfString {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Lossy text decode, good enough for labels and URIs.
    pub fn to_text(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }
}

impl fmt::Debug for PdfString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", String::from_utf8_lossy(&self.0))
    }
}

/// An indirect object reference (`N G R`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjRef {
    pub num: u32,
    pub r#gen: u16,
}

pub type Dict = HashMap<Name, Object>;

/// A stream object: its dictionary plus the raw (still encoded) payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Stream {
    pub dict: Dict,
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Object {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Real(f64),
    String(PdfString),
    Name(Name),
    Array(Vec<Object>),
    Dict(Dict),
    Stream(Stream),
    Ref(ObjRef),
}

impl Object {
    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Object::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Object::Int(i) => Some(*i),
            Object::Real(r) => Some(*r as i64),
            _ => None,
        }
    }

    /// Numbers are interchangeable: integers coerce to reals.
    pub fn as_real(&self) -> Option<f64> {
        match self {
            Object::Int(i) => Some(*i as f64),
            Object::Real(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&PdfString> {
        match self {
            Object::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&Name> {
        match self {
            Object::Name(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Object]> {
        match self {
            Object::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Dictionaries and stream dictionaries answer alike.
    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            Object::Dict(d) => Some(d),
            Object::Stream(s) => Some(&s.dict),
            _ => None,
        }
    }

    pub fn as_stream(&self) -> Option<&Stream> {
        match self {
            Object::Stream(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_ref_obj(&self) -> Option<ObjRef> {
        match self {
            Object::Ref(r) => Some(*r),
            _ => None,
        }
    }
}

/// Collect an array of numbers; `None` if the entry is missing or any
/// element is non-numeric.
pub fn number_array(obj: &Object) -> Option<Vec<f64>> {
    obj.as_array()?.iter().map(Object::as_real).collect()
}

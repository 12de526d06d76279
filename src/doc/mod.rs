//! Editor-style document model: symbolic attributes, drawable objects,
//! and pages with layers and views.

pub mod attributes;
pub mod object;
pub mod page;

pub use attributes::{Attribute, AttributeMap, Cascade, DashStyle};
pub use object::{
    DocObject, DrawContext, GroupObject, ImageObject, PathObject, ReferenceObject, TextObject,
};
pub use page::{Layer, Page, View};

//! Symbolic attributes and the style cascade.
//!
//! Objects store either absolute values or symbolic names; the cascade
//! turns names into concrete colors, pen widths and dash styles at draw
//! time. Views can remap symbolic names first through an
//! [`AttributeMap`], which is how one page renders differently per view.

use std::collections::HashMap;
use std::sync::Arc;

use crate::gfx::color::Color;

use super::object::DocObject;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DashStyle {
    pub pattern: Vec<f64>,
    pub phase: f64,
}

impl DashStyle {
    pub fn solid() -> DashStyle {
        DashStyle::default()
    }

    pub fn new(pattern: Vec<f64>, phase: f64) -> DashStyle {
        DashStyle { pattern, phase }
    }

    pub fn is_solid(&self) -> bool {
        self.pattern.is_empty()
    }
}

/// A style value: absolute, or a name resolved through the cascade.
#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    Symbolic(String),
    Color(Color),
    Scalar(f64),
    Dash(DashStyle),
}

impl Attribute {
    pub fn symbolic(name: &str) -> Attribute {
        Attribute::Symbolic(name.to_string())
    }
}

/// Per-view remapping of symbolic names, applied before cascade lookup.
#[derive(Debug, Clone, Default)]
pub struct AttributeMap {
    map: HashMap<String, String>,
}

impl AttributeMap {
    pub fn new() -> AttributeMap {
        AttributeMap::default()
    }

    pub fn insert(&mut self, from: &str, to: &str) {
        self.map.insert(from.to_string(), to.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Mapped name, or the input when no entry exists.
    pub fn lookup<'a>(&'a self, name: &'a str) -> &'a str {
        self.map.get(name).map(String::as_str).unwrap_or(name)
    }
}

/// Name-to-value style lookups plus the symbol table.
pub struct Cascade {
    values: HashMap<String, Attribute>,
    symbols: HashMap<String, Arc<DocObject>>,
}

impl Default for Cascade {
    fn default() -> Self {
        Cascade::new()
    }
}

impl Cascade {
    /// Cascade preloaded with the standard style names.
    pub fn new() -> Cascade {
        let mut c = Cascade { values: HashMap::new(), symbols: HashMap::new() };
        c.set("black", Attribute::Color(Color::BLACK));
        c.set("white", Attribute::Color(Color::WHITE));
        c.set("red", Attribute::Color(Color::rgb(1.0, 0.0, 0.0)));
        c.set("green", Attribute::Color(Color::rgb(0.0, 1.0, 0.0)));
        c.set("blue", Attribute::Color(Color::rgb(0.0, 0.0, 1.0)));
        c.set("gray", Attribute::Color(Color::gray(0.745)));
        c.set("normal", Attribute::Scalar(0.4));
        c.set("heavier", Attribute::Scalar(0.8));
        c.set("fat", Attribute::Scalar(1.2));
        c.set("ultrafat", Attribute::Scalar(2.0));
        c.set("opaque", Attribute::Scalar(1.0));
        c.set("solid", Attribute::Dash(DashStyle::solid()));
        c.set("dashed", Attribute::Dash(DashStyle::new(vec![4.0], 0.0)));
        c.set("dotted", Attribute::Dash(DashStyle::new(vec![1.0, 3.0], 0.0)));
        c.set("dash dotted", Attribute::Dash(DashStyle::new(vec![4.0, 2.0, 1.0, 2.0], 0.0)));
        c
    }

    pub fn set(&mut self, name: &str, value: Attribute) {
        self.values.insert(name.to_string(), value);
    }

    pub fn set_symbol(&mut self, name: &str, object: DocObject) {
        self.symbols.insert(name.to_string(), Arc::new(object));
    }

    pub fn symbol(&self, name: &str) -> Option<&Arc<DocObject>> {
        self.symbols.get(name)
    }

    /// Follow symbolic chains to an absolute attribute. Unknown names
    /// and cycles resolve to `None`.
    pub fn resolve(&self, attr: &Attribute) -> Option<Attribute> {
        let mut cur = attr;
        for _ in 0..8 {
            match cur {
                Attribute::Symbolic(name) => cur = self.values.get(name)?,
                absolute => return Some(absolute.clone()),
            }
        }
        None
    }

    pub fn color(&self, attr: &Attribute) -> Color {
        match self.resolve(attr) {
            Some(Attribute::Color(c)) => c,
            _ => Color::BLACK,
        }
    }

    pub fn pen(&self, attr: &Attribute) -> f64 {
        match self.resolve(attr) {
            Some(Attribute::Scalar(w)) if w >= 0.0 => w,
            _ => 0.4,
        }
    }

    pub fn dash(&self, attr: &Attribute) -> DashStyle {
        match self.resolve(attr) {
            Some(Attribute::Dash(d)) => d,
            _ => DashStyle::solid(),
        }
    }

    pub fn opacity(&self, attr: &Attribute) -> f64 {
        match self.resolve(attr) {
            Some(Attribute::Scalar(v)) => v.clamp(0.0, 1.0),
            _ => 1.0,
        }
    }
}

//! Pages, layers and views.
//!
//! A page holds objects on named layers; each view selects which layers
//! are visible, remaps symbolic attributes, and can shift whole layers
//! with a per-layer matrix.

use std::collections::{HashMap, HashSet};

use crate::gfx::geometry::{Matrix, Rect};

use super::attributes::AttributeMap;
use super::object::{DocObject, TextObject};

#[derive(Debug, Clone)]
pub struct Layer {
    pub name: String,
    pub locked: bool,
}

#[derive(Debug, Clone, Default)]
pub struct View {
    visible: HashSet<String>,
    pub attributes: AttributeMap,
    layer_matrices: HashMap<String, Matrix>,
}

impl View {
    pub fn new() -> View {
        View::default()
    }

    pub fn show_layer(&mut self, name: &str) {
        self.visible.insert(name.to_string());
    }

    pub fn is_visible(&self, layer: &str) -> bool {
        self.visible.contains(layer)
    }

    pub fn set_layer_matrix(&mut self, layer: &str, m: Matrix) {
        self.layer_matrices.insert(layer.to_string(), m);
    }

    pub fn layer_matrix(&self, layer: &str) -> Matrix {
        self.layer_matrices.get(layer).copied().unwrap_or(Matrix::IDENTITY)
    }
}

struct PlacedObject {
    layer: usize,
    object: DocObject,
}

pub struct Page {
    paper: Rect,
    title: String,
    /// Compiled title rendition, drawn in uncropped output.
    title_text: Option<TextObject>,
    layers: Vec<Layer>,
    views: Vec<View>,
    objects: Vec<PlacedObject>,
}

impl Page {
    /// Page with one default layer and one view showing it.
    pub fn new(paper: Rect) -> Page {
        let mut page = Page {
            paper,
            title: String::new(),
            title_text: None,
            layers: Vec::new(),
            views: Vec::new(),
            objects: Vec::new(),
        };
        page.add_layer("alpha");
        let mut view = View::new();
        view.show_layer("alpha");
        page.add_view(view);
        page
    }

    pub fn paper(&self) -> Rect {
        self.paper
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    pub fn title_text(&self) -> Option<&TextObject> {
        self.title_text.as_ref()
    }

    pub fn set_title_text(&mut self, text: TextObject) {
        self.title_text = Some(text);
    }

    pub fn add_layer(&mut self, name: &str) -> usize {
        self.layers.push(Layer { name: name.to_string(), locked: false });
        self.layers.len() - 1
    }

    pub fn count_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn layer(&self, index: usize) -> Option<&Layer> {
        self.layers.get(index)
    }

    pub fn add_view(&mut self, view: View) -> usize {
        self.views.push(view);
        self.views.len() - 1
    }

    pub fn count_views(&self) -> usize {
        self.views.len()
    }

    pub fn view(&self, index: usize) -> Option<&View> {
        self.views.get(index)
    }

    pub fn view_mut(&mut self, index: usize) -> Option<&mut View> {
        self.views.get_mut(index)
    }

    /// Place an object on a layer; out-of-range layers go to layer 0.
    pub fn add_object(&mut self, layer: usize, object: DocObject) {
        let layer = if layer < self.layers.len() { layer } else { 0 };
        self.objects.push(PlacedObject { layer, object });
    }

    pub fn count_objects(&self) -> usize {
        self.objects.len()
    }

    pub fn object(&self, index: usize) -> Option<&DocObject> {
        self.objects.get(index).map(|p| &p.object)
    }

    pub fn layer_of(&self, index: usize) -> usize {
        self.objects.get(index).map(|p| p.layer).unwrap_or(0)
    }

    /// Whether object `index` is on a layer the view shows.
    pub fn object_visible(&self, view: usize, index: usize) -> bool {
        let Some(placed) = self.objects.get(index) else { return false };
        let Some(view) = self.views.get(view) else { return false };
        let Some(layer) = self.layers.get(placed.layer) else { return false };
        view.is_visible(&layer.name)
    }

    /// The layer matrix the view applies to object `index`.
    pub fn object_matrix(&self, view: usize, index: usize) -> Matrix {
        let Some(placed) = self.objects.get(index) else { return Matrix::IDENTITY };
        let Some(view) = self.views.get(view) else { return Matrix::IDENTITY };
        let Some(layer) = self.layers.get(placed.layer) else { return Matrix::IDENTITY };
        view.layer_matrix(&layer.name)
    }
}

//! Presentation navigation over a PDF file.
//!
//! A presentation PDF carries one PDF page per view; pages sharing a
//! `/PageLabels` label belong to the same logical page. The presenter
//! tracks the current view, resolves link annotations and named
//! destinations, and interprets the navigation actions a viewer needs.

use std::collections::HashMap;

use crate::gfx::error::{Error, Result};
use crate::gfx::geometry::{Point, Rect};
use crate::pdf::file::PdfFile;
use crate::pdf::object::{Dict, Object, number_array};

/// A link annotation's area and decoded action.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub rect: Rect,
    pub action: Action,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// `/URI` and `/Launch`: hand the target to the environment.
    Browse(String),
    /// `/GoTo` with a named destination.
    Goto(String),
    /// `/GoTo` straight to a page object.
    GotoPage(u32),
    /// `/Named` viewer actions (NextPage, PrevPage, ...).
    Named(String),
}

/// What the caller must do after interpreting an action; navigation
/// itself happens inside the presenter.
#[derive(Debug, Clone, PartialEq)]
pub enum External {
    Browse(String),
}

pub struct Presenter {
    file: PdfFile,
    file_name: String,
    labels: Vec<String>,
    links: Vec<Vec<Link>>,
    notes: Vec<String>,
    destinations: HashMap<String, u32>,
    current: usize,
}

impl Presenter {
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Presenter> {
        let name = path
            .as_ref()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file = PdfFile::parse_file(path)?;
        Presenter::from_file(file, &name)
    }

    pub fn from_file(file: PdfFile, file_name: &str) -> Result<Presenter> {
        if file.count_pages() == 0 {
            return Err(Error::format("document has no pages"));
        }
        let labels = collect_page_labels(&file);
        let links = (0..file.count_pages()).map(|i| collect_links(&file, i)).collect();
        let notes = (0..file.count_pages()).map(|i| collect_notes(&file, i)).collect();
        let destinations = collect_destinations(&file);
        Ok(Presenter {
            file,
            file_name: file_name.to_string(),
            labels,
            links,
            notes,
            destinations,
            current: 0,
        })
    }

    pub fn file(&self) -> &PdfFile {
        &self.file
    }

    pub fn count_views(&self) -> usize {
        self.file.count_pages()
    }

    pub fn current_view(&self) -> usize {
        self.current
    }

    pub fn page_label(&self, view: usize) -> &str {
        self.labels.get(view).map(String::as_str).unwrap_or("")
    }

    pub fn notes(&self, view: usize) -> &str {
        self.notes.get(view).map(String::as_str).unwrap_or("")
    }

    /// Status line: `file : label / last-label (view / count)`.
    pub fn current_label(&self) -> String {
        let last = self.labels.last().map(String::as_str).unwrap_or("");
        format!(
            "{} : {} / {} ({} / {})",
            self.file_name,
            self.page_label(self.current),
            last,
            self.current + 1,
            self.count_views()
        )
    }

    /// Media box of a view; -1 selects the current view, -2 the next.
    pub fn media_box(&self, which: i32) -> Rect {
        let index = match which {
            -1 => self.current,
            -2 => (self.current + 1).min(self.count_views() - 1),
            v if v >= 0 => v as usize,
            _ => self.current,
        };
        self.file.media_box(index)
    }

    pub fn links(&self, view: usize) -> &[Link] {
        self.links.get(view).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Link under a point on the current view, in paper coordinates.
    pub fn find_link(&self, pos: Point) -> Option<&Link> {
        self.links(self.current).iter().find(|l| l.rect.contains(pos))
    }

    /// Apply an action. Navigation updates the current view; actions the
    /// environment must handle come back as `External`.
    pub fn interpret_action(&mut self, action: &Action) -> Option<External> {
        match action {
            Action::Browse(target) => return Some(External::Browse(target.clone())),
            Action::Goto(name) => self.goto_destination(name),
            Action::GotoPage(num) => {
                if let Some(index) = self.file.page_from_object_number(*num) {
                    self.current = index;
                }
            }
            Action::Named(name) => match name.as_str() {
                "NextPage" => self.next_page(1),
                "PrevPage" => self.next_page(-1),
                "FirstPage" => self.current = 0,
                "LastPage" => self.current = self.count_views() - 1,
                _ => {}
            },
        }
        None
    }

    pub fn goto_destination(&mut self, name: &str) {
        if let Some(&num) = self.destinations.get(name) {
            if let Some(index) = self.file.page_from_object_number(num) {
                self.current = index;
            }
        }
    }

    /// Jump to the view whose label matches exactly, or matches with the
    /// `-1` first-view suffix.
    pub fn jump_to_page(&mut self, label: &str) -> bool {
        let with_suffix = format!("{label}-1");
        if let Some(index) =
            self.labels.iter().position(|l| l == label || *l == with_suffix)
        {
            self.current = index;
            true
        } else {
            false
        }
    }

    /// Step by whole views, clamped to the document.
    pub fn next_view(&mut self, delta: i32) {
        let target = self.current as i64 + delta as i64;
        self.current = target.clamp(0, self.count_views() as i64 - 1) as usize;
    }

    /// Step by logical pages: forward skips the remaining views of the
    /// current label; backward lands on the first view of the previous
    /// label.
    pub fn next_page(&mut self, delta: i32) {
        let label = self.page_label(self.current).to_string();
        if delta > 0 {
            if let Some(index) =
                (self.current + 1..self.count_views()).find(|&i| self.labels[i] != label)
            {
                self.current = index;
            }
        } else if delta < 0 {
            let Some(prev) = (0..self.current).rev().find(|&i| self.labels[i] != label) else {
                self.current = self.first_view_of(self.current);
                return;
            };
            self.current = self.first_view_of(prev);
        }
    }

    /// First view sharing the current label.
    pub fn first_view(&mut self) {
        self.current = self.first_view_of(self.current);
    }

    /// Last view sharing the current label.
    pub fn last_view(&mut self) {
        let label = &self.labels[self.current];
        let mut i = self.current;
        while i + 1 < self.count_views() && self.labels[i + 1] == *label {
            i += 1;
        }
        self.current = i;
    }

    fn first_view_of(&self, view: usize) -> usize {
        let label = &self.labels[view];
        let mut i = view;
        while i > 0 && self.labels[i - 1] == *label {
            i -= 1;
        }
        i
    }

    /// Whether any font in the document is Type3; surfaced once by
    /// viewers as a rendering-quality warning.
    pub fn has_type3_font(&self) -> bool {
        self.file.objects().any(|obj| {
            obj.as_dict().is_some_and(|d| {
                self.file.get_name(d, "Type") == Some("Font")
                    && self.file.get_name(d, "Subtype") == Some("Type3")
            })
        })
    }
}

/// Expand `/PageLabels` into one label per page. Ranges without a
/// numbering style repeat their prefix; runs longer than one view get a
/// `-<n>` suffix so every view stays addressable.
fn collect_page_labels(file: &PdfFile) -> Vec<String> {
    let count = file.count_pages();
    let mut ranges: Vec<(usize, String, bool, i64)> = Vec::new();
    if let Some(catalog) = file.catalog() {
        if let Some(labels) = file.get_dict(catalog, "PageLabels") {
            collect_number_tree(file, labels, &mut ranges, 0);
        }
    }
    ranges.sort_by_key(|r| r.0);

    if ranges.is_empty() {
        return (1..=count).map(|n| n.to_string()).collect();
    }

    let mut labels = vec![String::new(); count];
    for (ri, range) in ranges.iter().enumerate() {
        let end = ranges.get(ri + 1).map(|r| r.0).unwrap_or(count).min(count);
        let (start, prefix, numbered, st) = (range.0, &range.1, range.2, range.3);
        let span = end.saturating_sub(start);
        for (k, label) in labels.iter_mut().enumerate().take(end).skip(start) {
            let k = k - start;
            *label = if numbered {
                format!("{prefix}{}", st + k as i64)
            } else if span > 1 {
                format!("{prefix}-{}", k + 1)
            } else {
                prefix.clone()
            };
        }
    }
    labels
}

fn collect_number_tree(
    file: &PdfFile,
    node: &Dict,
    out: &mut Vec<(usize, String, bool, i64)>,
    depth: usize,
) {
    if depth > 16 {
        return;
    }
    if let Some(Object::Array(nums)) = file.get(node, "Nums") {
        for pair in nums.chunks(2) {
            let (Some(index), Some(entry)) =
                (pair.first().and_then(Object::as_int), pair.get(1))
            else {
                continue;
            };
            let Some(entry) = file.resolve(entry).as_dict() else { continue };
            let prefix = entry
                .get("P")
                .and_then(Object::as_string)
                .map(|s| s.to_text())
                .unwrap_or_default();
            let numbered = file.get_name(entry, "S").is_some();
            let start = file.get(entry, "St").and_then(Object::as_int).unwrap_or(1);
            out.push((index.max(0) as usize, prefix, numbered, start));
        }
    }
    if let Some(Object::Array(kids)) = file.get(node, "Kids") {
        for kid in kids {
            if let Some(kid) = file.resolve(kid).as_dict() {
                collect_number_tree(file, kid, out, depth + 1);
            }
        }
    }
}

fn collect_links(file: &PdfFile, page: usize) -> Vec<Link> {
    let mut links = Vec::new();
    let Some(dict) = file.page(page) else { return links };
    let Some(Object::Array(annots)) = file.get(dict, "Annots") else { return links };
    for annot in annots {
        let Some(annot) = file.resolve(annot).as_dict() else { continue };
        if file.get_name(annot, "Subtype") != Some("Link") {
            continue;
        }
        let Some(rect) = file.get(annot, "Rect").and_then(number_array).filter(|r| r.len() == 4)
        else {
            continue;
        };
        let rect = Rect::new(
            rect[0].min(rect[2]),
            rect[1].min(rect[3]),
            rect[0].max(rect[2]),
            rect[1].max(rect[3]),
        );
        let Some(action_dict) = file.get_dict(annot, "A") else { continue };
        if let Some(action) = decode_action(file, action_dict) {
            links.push(Link { rect, action });
        }
    }
    links
}

fn decode_action(file: &PdfFile, action: &Dict) -> Option<Action> {
    match file.get_name(action, "S")? {
        "URI" => {
            let uri = file.get(action, "URI")?.as_string()?.to_text();
            Some(Action::Browse(uri))
        }
        "Launch" => {
            let target = file.get(action, "F")?.as_string()?.to_text();
            Some(Action::Browse(target))
        }
        "GoTo" => decode_destination(file.get(action, "D")?),
        "Named" => {
            let name = file.get(action, "N")?.as_name()?.as_str().to_string();
            Some(Action::Named(name))
        }
        _ => None,
    }
}

/// A destination: a name, a string, or an explicit `[pageref ...]`.
fn decode_destination(dest: &Object) -> Option<Action> {
    match dest {
        Object::Name(n) => Some(Action::Goto(n.as_str().to_string())),
        Object::String(s) => Some(Action::Goto(s.to_text())),
        Object::Array(items) => {
            let r = items.first()?.as_ref_obj()?;
            Some(Action::GotoPage(r.num))
        }
        _ => None,
    }
}

/// Walk `/Names` → `/Dests` and map destination names to page object
/// numbers.
fn collect_destinations(file: &PdfFile) -> HashMap<String, u32> {
    let mut out = HashMap::new();
    let Some(catalog) = file.catalog() else { return out };
    let Some(names) = file.get_dict(catalog, "Names") else { return out };
    let Some(dests) = file.get_dict(names, "Dests") else { return out };
    collect_dest_node(file, dests, &mut out, 0);
    out
}

fn collect_dest_node(file: &PdfFile, node: &Dict, out: &mut HashMap<String, u32>, depth: usize) {
    if depth > 16 {
        return;
    }
    if let Some(Object::Array(pairs)) = file.get(node, "Names") {
        for pair in pairs.chunks(2) {
            let (Some(name), Some(dest)) = (pair.first().and_then(Object::as_string), pair.get(1))
            else {
                continue;
            };
            let dest = file.resolve(dest);
            let target = match dest {
                Object::Array(items) => items.first().and_then(Object::as_ref_obj),
                Object::Dict(d) => d
                    .get("D")
                    .and_then(|d| file.resolve(d).as_array())
                    .and_then(|a| a.first())
                    .and_then(Object::as_ref_obj),
                _ => None,
            };
            if let Some(r) = target {
                out.insert(name.to_text(), r.num);
            }
        }
    }
    if let Some(Object::Array(kids)) = file.get(node, "Kids") {
        for kid in kids {
            if let Some(kid) = file.resolve(kid).as_dict() {
                collect_dest_node(file, kid, out, depth + 1);
            }
        }
    }
}

/// Text annotation contents, concatenated per page.
fn collect_notes(file: &PdfFile, page: usize) -> String {
    let mut notes = String::new();
    let Some(dict) = file.page(page) else { return notes };
    let Some(Object::Array(annots)) = file.get(dict, "Annots") else { return notes };
    for annot in annots {
        let Some(annot) = file.resolve(annot).as_dict() else { continue };
        if file.get_name(annot, "Subtype") != Some("Text") {
            continue;
        }
        if let Some(text) = file.get(annot, "Contents").and_then(Object::as_string) {
            if !notes.is_empty() {
                notes.push('\n');
            }
            notes.push_str(&text.to_text());
        }
    }
    notes
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Five pages: labels intro, 2-1, 2-2, 2-3, 3 (pages 1..3 share the
    /// label "2"); a link with a URI and one with a named destination.
    fn presentation_pdf() -> Vec<u8> {
        let mut pdf = Vec::new();
        pdf.extend_from_slice(b"%PDF-1.4\n");
        pdf.extend_from_slice(
            b"1 0 obj << /Type /Catalog /Pages 2 0 R\n\
                /PageLabels << /Nums [0 << /P (intro) >> 1 << /P (2) >> 4 << /P (3) >>] >>\n\
                /Names << /Dests << /Names [(summary) [7 0 R /XYZ 0 0 0]] >> >>\n\
              >> endobj\n",
        );
        pdf.extend_from_slice(
            b"2 0 obj << /Type /Pages /Kids [3 0 R 4 0 R 5 0 R 6 0 R 7 0 R] /Count 5\n\
                /MediaBox [0 0 400 300] >> endobj\n",
        );
        pdf.extend_from_slice(
            b"3 0 obj << /Type /Page /Parent 2 0 R /Annots [8 0 R 9 0 R 10 0 R] >> endobj\n\
              4 0 obj << /Type /Page /Parent 2 0 R >> endobj\n\
              5 0 obj << /Type /Page /Parent 2 0 R >> endobj\n\
              6 0 obj << /Type /Page /Parent 2 0 R >> endobj\n\
              7 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 200 100] >> endobj\n",
        );
        pdf.extend_from_slice(
            b"8 0 obj << /Subtype /Link /Rect [10 10 50 30]\n\
                /A << /S /URI /URI (https://example.org) >> >> endobj\n\
              9 0 obj << /Subtype /Link /Rect [100 10 150 30]\n\
                /A << /S /GoTo /D (summary) >> >> endobj\n\
              10 0 obj << /Subtype /Text /Contents (speaker notes) >> endobj\n",
        );
        pdf.extend_from_slice(b"trailer << /Root 1 0 R >>\n%%EOF\n");
        pdf
    }

    fn presenter() -> Presenter {
        let file = PdfFile::parse_bytes(&presentation_pdf()).unwrap();
        Presenter::from_file(file, "talk.pdf").unwrap()
    }

    #[test]
    fn labels_with_repeat_suffix() {
        let p = presenter();
        assert_eq!(p.page_label(0), "intro");
        assert_eq!(p.page_label(1), "2-1");
        assert_eq!(p.page_label(2), "2-2");
        assert_eq!(p.page_label(3), "2-3");
        assert_eq!(p.page_label(4), "3");
    }

    #[test]
    fn next_page_skips_same_label_views() {
        let mut p = presenter();
        p.next_view(1);
        assert_eq!(p.current_view(), 1);
        // Forward from 2-1 jumps past 2-2 and 2-3.
        p.next_page(1);
        assert_eq!(p.current_view(), 4);
        // Backward lands on the first view of label 2.
        p.next_page(-1);
        assert_eq!(p.current_view(), 1);
        p.next_page(-1);
        assert_eq!(p.current_view(), 0);
        p.next_page(-1);
        assert_eq!(p.current_view(), 0);
    }

    #[test]
    fn view_stepping_clamps() {
        let mut p = presenter();
        p.next_view(-3);
        assert_eq!(p.current_view(), 0);
        p.next_view(100);
        assert_eq!(p.current_view(), 4);
    }

    #[test]
    fn first_and_last_view_of_label() {
        let mut p = presenter();
        p.next_view(2);
        p.last_view();
        assert_eq!(p.current_view(), 3);
        p.first_view();
        assert_eq!(p.current_view(), 1);
    }

    #[test]
    fn jump_to_page_tolerates_first_view_suffix() {
        let mut p = presenter();
        assert!(p.jump_to_page("3"));
        assert_eq!(p.current_view(), 4);
        // "2" matches "2-1".
        assert!(p.jump_to_page("2"));
        assert_eq!(p.current_view(), 1);
        assert!(!p.jump_to_page("nope"));
    }

    #[test]
    fn links_and_find_link() {
        let p = presenter();
        assert_eq!(p.links(0).len(), 2);
        let hit = p.find_link(Point::new(20.0, 20.0)).unwrap();
        assert_eq!(hit.action, Action::Browse("https://example.org".to_string()));
        assert!(p.find_link(Point::new(70.0, 20.0)).is_none());
    }

    #[test]
    fn goto_named_destination() {
        let mut p = presenter();
        let link = p.links(0)[1].clone();
        assert_eq!(p.interpret_action(&link.action), None);
        assert_eq!(p.current_view(), 4);
    }

    #[test]
    fn uri_action_is_external() {
        let mut p = presenter();
        let out = p.interpret_action(&Action::Browse("https://example.org".into()));
        assert_eq!(out, Some(External::Browse("https://example.org".to_string())));
        assert_eq!(p.current_view(), 0);
    }

    #[test]
    fn named_actions_navigate() {
        let mut p = presenter();
        p.interpret_action(&Action::Named("LastPage".into()));
        assert_eq!(p.current_view(), 4);
        p.interpret_action(&Action::Named("FirstPage".into()));
        assert_eq!(p.current_view(), 0);
        p.interpret_action(&Action::Named("NextPage".into()));
        assert_eq!(p.current_view(), 1);
    }

    #[test]
    fn media_box_current_and_next() {
        let mut p = presenter();
        p.interpret_action(&Action::Named("LastPage".into()));
        assert_eq!(p.media_box(-1), Rect::new(0.0, 0.0, 200.0, 100.0));
        // Next clamps at the last view.
        assert_eq!(p.media_box(-2), Rect::new(0.0, 0.0, 200.0, 100.0));
        assert_eq!(p.media_box(0), Rect::new(0.0, 0.0, 400.0, 300.0));
    }

    #[test]
    fn notes_and_status_line() {
        let p = presenter();
        assert_eq!(p.notes(0), "speaker notes");
        assert_eq!(p.current_label(), "talk.pdf : intro / 3 (1 / 5)");
    }

    #[test]
    fn default_labels_without_page_labels() {
        let file = PdfFile::parse_bytes(&crate::pdf::file::tests::two_page_pdf()).unwrap();
        let p = Presenter::from_file(file, "plain.pdf").unwrap();
        assert_eq!(p.page_label(0), "1");
        assert_eq!(p.page_label(1), "2");
        assert!(!p.has_type3_font());
    }
}

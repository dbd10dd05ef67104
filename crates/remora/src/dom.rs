//! Rendered-node tree: the host document the converter walks.
//!
//! The tree is read-only once built. Element nodes keep their lowercase
//! tag name, attributes and class list; text nodes keep their text. The
//! geometry/style facts a live renderer would compute on demand are
//! carried as serialized attributes (`data-bbox`, `data-display`,
//! `data-visibility`) with sensible fallbacks, so the query surface here
//! is synchronous and side-effect-free.

use crate::geom::{self, Rect};
use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) u32);

#[derive(Debug, Clone)]
pub enum NodeData {
    Element(ElementData),
    Text(String),
}

#[derive(Debug, Clone)]
pub struct ElementData {
    tag: String,
    attrs: Vec<(String, String)>,
    classes: Vec<String>,
}

impl ElementData {
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }
}

#[derive(Debug, Clone)]
struct NodeRecord {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    data: NodeData,
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeRecord>,
    root: NodeId,
}

/// Incremental builder used by the snapshot loader and by tests.
#[derive(Debug, Default)]
pub struct DocumentBuilder {
    nodes: Vec<NodeRecord>,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn element(
        &mut self,
        parent: Option<NodeId>,
        tag: &str,
        attrs: Vec<(String, String)>,
    ) -> NodeId {
        let classes = attrs
            .iter()
            .find(|(k, _)| k == "class")
            .map(|(_, v)| v.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();
        let data = NodeData::Element(ElementData {
            tag: tag.to_ascii_lowercase(),
            attrs,
            classes,
        });
        self.push(parent, data)
    }

    pub fn text(&mut self, parent: NodeId, text: &str) -> NodeId {
        self.push(Some(parent), NodeData::Text(text.to_string()))
    }

    fn push(&mut self, parent: Option<NodeId>, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeRecord {
            parent,
            children: Vec::new(),
            data,
        });
        if let Some(parent) = parent {
            self.nodes[parent.0 as usize].children.push(id);
        }
        id
    }

    pub fn finish(self, root: NodeId) -> Document {
        Document {
            nodes: self.nodes,
            root,
        }
    }
}

fn translate_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"translate\(([^,]+),\s*([^)]+)\)").expect("valid regex"))
}

impl Document {
    pub fn root(&self) -> NodeId {
        self.root
    }

    fn record(&self, id: NodeId) -> &NodeRecord {
        &self.nodes[id.0 as usize]
    }

    pub fn data(&self, id: NodeId) -> &NodeData {
        &self.record(id).data
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.record(id).data {
            NodeData::Element(el) => Some(el),
            NodeData::Text(_) => None,
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(ElementData::tag)
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.record(id).data {
            NodeData::Text(t) => Some(t),
            NodeData::Element(_) => None,
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?.attr(name)
    }

    pub fn id_attr(&self, id: NodeId) -> Option<&str> {
        self.attr(id, "id")
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.element(id)
            .is_some_and(|el| el.classes.iter().any(|c| c == class))
    }

    pub fn has_classes(&self, id: NodeId, classes: &[&str]) -> bool {
        classes.iter().all(|c| self.has_class(id, c))
    }

    pub fn classes(&self, id: NodeId) -> &[String] {
        self.element(id).map(ElementData::classes).unwrap_or(&[])
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.record(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.record(id).children
    }

    pub fn element_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(|&c| self.is_element(c))
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let siblings = self.children(parent);
        let pos = siblings.iter().position(|&s| s == id)?;
        siblings.get(pos + 1).copied()
    }

    pub fn prev_element_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let siblings = self.children(parent);
        let pos = siblings.iter().position(|&s| s == id)?;
        siblings[..pos]
            .iter()
            .rev()
            .copied()
            .find(|&s| self.is_element(s))
    }

    /// Nearest ancestor (the node itself included) matching the predicate.
    pub fn closest<P>(&self, id: NodeId, pred: P) -> Option<NodeId>
    where
        P: Fn(&Document, NodeId) -> bool,
    {
        let mut current = Some(id);
        while let Some(node) = current {
            if self.is_element(node) && pred(self, node) {
                return Some(node);
            }
            current = self.parent(node);
        }
        None
    }

    /// Preorder descendants of `id`, the node itself excluded.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).iter().rev());
        }
        out
    }

    /// Element descendants matching the predicate, in document order.
    pub fn select<P>(&self, root: NodeId, pred: P) -> Vec<NodeId>
    where
        P: Fn(&Document, NodeId) -> bool,
    {
        self.descendants(root)
            .into_iter()
            .filter(|&n| self.is_element(n) && pred(self, n))
            .collect()
    }

    /// First element descendant matching the predicate.
    pub fn first_match<P>(&self, root: NodeId, pred: P) -> Option<NodeId>
    where
        P: Fn(&Document, NodeId) -> bool,
    {
        self.descendants(root)
            .into_iter()
            .find(|&n| self.is_element(n) && pred(self, n))
    }

    /// Concatenated text of the node and all its descendants.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        if let Some(t) = self.text(id) {
            out.push_str(t);
        }
        for d in self.descendants(id) {
            if let Some(t) = self.text(d) {
                out.push_str(t);
            }
        }
        out
    }

    /// Serialized bounding box (`data-bbox="x y w h"`), if present.
    pub fn bounding_box(&self, id: NodeId) -> Option<Rect> {
        let raw = self.attr(id, "data-bbox")?;
        let parts: Vec<f64> = raw
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .filter_map(|s| s.parse().ok())
            .collect();
        if parts.len() != 4 {
            return None;
        }
        Some(geom::rect(parts[0], parts[1], parts[2], parts[3]))
    }

    /// Translation component of the element's `transform` attribute.
    pub fn translate(&self, id: NodeId) -> Option<(f64, f64)> {
        let transform = self.attr(id, "transform")?;
        let caps = translate_regex().captures(transform)?;
        let x: f64 = caps.get(1)?.as_str().trim().parse().ok()?;
        let y: f64 = caps.get(2)?.as_str().trim().parse().ok()?;
        Some((x, y))
    }

    fn style_property(&self, id: NodeId, name: &str) -> Option<String> {
        let style = self.attr(id, "style")?;
        for decl in style.split(';') {
            let mut parts = decl.splitn(2, ':');
            let key = parts.next()?.trim();
            if key.eq_ignore_ascii_case(name) {
                return parts.next().map(|v| v.trim().to_ascii_lowercase());
            }
        }
        None
    }

    /// Effective display: serialized computed value, inline style, or the
    /// tag's default.
    pub fn computed_display(&self, id: NodeId) -> String {
        if let Some(v) = self.attr(id, "data-display") {
            return v.trim().to_ascii_lowercase();
        }
        if let Some(v) = self.style_property(id, "display") {
            return v;
        }
        self.tag(id)
            .map(default_display)
            .unwrap_or("inline")
            .to_string()
    }

    pub fn computed_visibility(&self, id: NodeId) -> String {
        if let Some(v) = self.attr(id, "data-visibility") {
            return v.trim().to_ascii_lowercase();
        }
        if let Some(v) = self.style_property(id, "visibility") {
            return v;
        }
        "visible".to_string()
    }

    pub fn is_hidden(&self, id: NodeId) -> bool {
        self.computed_display(id) == "none" || self.computed_visibility(id) == "hidden"
    }
}

fn default_display(tag: &str) -> &'static str {
    match tag {
        "address" | "article" | "aside" | "blockquote" | "details" | "dialog" | "dd" | "div"
        | "dl" | "dt" | "fieldset" | "figcaption" | "figure" | "footer" | "form" | "h1" | "h2"
        | "h3" | "h4" | "h5" | "h6" | "header" | "hgroup" | "hr" | "main" | "nav" | "ol" | "p"
        | "pre" | "section" | "summary" | "ul" | "body" | "html" => "block",
        "li" => "list-item",
        "table" => "table",
        "thead" => "table-header-group",
        "tbody" => "table-row-group",
        "tfoot" => "table-footer-group",
        "tr" => "table-row",
        "td" | "th" => "table-cell",
        _ => "inline",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Document, NodeId, NodeId, NodeId) {
        let mut b = DocumentBuilder::new();
        let root = b.element(None, "DIV", vec![("class".into(), "container prose".into())]);
        let p = b.element(
            Some(root),
            "p",
            vec![("style".into(), "display: none; color: red".into())],
        );
        b.text(p, "hello ");
        let em = b.element(Some(p), "em", vec![]);
        b.text(em, "world");
        (b.finish(root), root, p, em)
    }

    #[test]
    fn tags_are_lowercased_and_classes_split() {
        let (doc, root, ..) = sample();
        assert_eq!(doc.tag(root), Some("div"));
        assert!(doc.has_class(root, "prose"));
        assert!(doc.has_classes(root, &["container", "prose"]));
        assert!(!doc.has_class(root, "pro"));
    }

    #[test]
    fn text_content_concatenates_descendants() {
        let (doc, root, ..) = sample();
        assert_eq!(doc.text_content(root), "hello world");
    }

    #[test]
    fn inline_style_feeds_computed_display() {
        let (doc, _, p, em) = sample();
        assert_eq!(doc.computed_display(p), "none");
        assert!(doc.is_hidden(p));
        assert_eq!(doc.computed_display(em), "inline");
        assert!(!doc.is_hidden(em));
    }

    #[test]
    fn data_attributes_override_defaults() {
        let mut b = DocumentBuilder::new();
        let root = b.element(
            None,
            "span",
            vec![
                ("data-display".into(), "Block".into()),
                ("data-bbox".into(), "1 2 30 40".into()),
                ("transform".into(), "translate(12.5, -3)".into()),
            ],
        );
        let doc = b.finish(root);
        assert_eq!(doc.computed_display(root), "block");
        let bbox = doc.bounding_box(root).unwrap();
        assert_eq!(
            (bbox.min_x(), bbox.min_y(), bbox.width(), bbox.height()),
            (1.0, 2.0, 30.0, 40.0)
        );
        assert_eq!(doc.translate(root), Some((12.5, -3.0)));
    }

    #[test]
    fn sibling_navigation() {
        let mut b = DocumentBuilder::new();
        let root = b.element(None, "div", vec![]);
        let a = b.element(Some(root), "p", vec![]);
        let t = b.text(root, "between");
        let c = b.element(Some(root), "ul", vec![]);
        let doc = b.finish(root);
        assert_eq!(doc.next_sibling(a), Some(t));
        assert_eq!(doc.prev_element_sibling(c), Some(a));
        assert_eq!(doc.prev_element_sibling(a), None);
    }
}

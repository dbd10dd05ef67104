//! Markdown tree conversion (`process_node`).
//!
//! The converter walks a rendered node tree and renders each node into a
//! typed [`Fragment`]: inline fragments are passed through verbatim,
//! block fragments always end in exactly one blank line. Dispatch runs
//! over a closed [`ElementKind`] sum instead of ad-hoc tag comparisons,
//! so the block/inline newline discipline lives in the type, not in each
//! handler.
//!
//! Fault containment: a child that fails to render degrades to a literal
//! `[err]` marker at its call site, an element that fails as a whole
//! renders a marker naming its tag, and neither aborts the surrounding
//! conversion.

mod code;
mod links;
mod table;

pub(crate) use code::reconstruct_diagram;

use crate::ConvertOptions;
use crate::dom::{Document, NodeId};
use crate::error::{Error, Result};
use regex::Regex;
use std::sync::OnceLock;

/// One rendered node, typed by its layout role.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Fragment {
    Empty,
    /// Verbatim inline text; carries no added newlines of its own.
    Inline(String),
    /// A Markdown hard break (`"  \n"`).
    HardBreak,
    /// A block; rendering appends exactly one blank line. The body may
    /// carry a *leading* newline to separate it from inline content.
    Block(String),
}

impl Fragment {
    pub(crate) fn write_to(&self, out: &mut String) {
        match self {
            Fragment::Empty => {}
            Fragment::Inline(s) => out.push_str(s),
            Fragment::HardBreak => out.push_str("  \n"),
            Fragment::Block(s) => {
                out.push_str(s);
                out.push_str("\n\n");
            }
        }
    }
}

/// Closed classification of element nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ElementKind {
    Paragraph,
    Heading(usize),
    UnorderedList,
    OrderedList,
    Preformatted,
    Anchor,
    Image,
    BlockQuote,
    Rule,
    Strong,
    Emphasis,
    Code,
    LineBreak,
    Table,
    TableSection,
    Details,
    Summary,
    Container,
}

fn classify(tag: &str) -> ElementKind {
    match tag {
        "p" => ElementKind::Paragraph,
        "h1" => ElementKind::Heading(1),
        "h2" => ElementKind::Heading(2),
        "h3" => ElementKind::Heading(3),
        "h4" => ElementKind::Heading(4),
        "h5" => ElementKind::Heading(5),
        "h6" => ElementKind::Heading(6),
        "ul" => ElementKind::UnorderedList,
        "ol" => ElementKind::OrderedList,
        "pre" => ElementKind::Preformatted,
        "a" => ElementKind::Anchor,
        "img" => ElementKind::Image,
        "blockquote" => ElementKind::BlockQuote,
        "hr" => ElementKind::Rule,
        "strong" | "b" => ElementKind::Strong,
        "em" | "i" => ElementKind::Emphasis,
        "code" => ElementKind::Code,
        "br" => ElementKind::LineBreak,
        "table" => ElementKind::Table,
        "thead" | "tbody" | "tfoot" | "tr" | "th" | "td" => ElementKind::TableSection,
        "details" => ElementKind::Details,
        "summary" => ElementKind::Summary,
        _ => ElementKind::Container,
    }
}

/// Tags that never contribute content: interactive chrome and page
/// furniture.
const SKIPPED_TAGS: &[&str] = &[
    "button", "nav", "footer", "aside", "script", "style", "noscript", "iframe", "embed",
    "object", "header",
];

fn is_block_display(display: &str) -> bool {
    matches!(
        display,
        "block"
            | "flex"
            | "grid"
            | "list-item"
            | "table"
            | "table-row-group"
            | "table-header-group"
            | "table-footer-group"
    )
}

fn source_text_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)source").expect("valid regex"))
}

fn newline_run_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n+").expect("valid regex"))
}

/// Renders the children of `root` to Markdown.
pub fn convert_fragment(doc: &Document, root: NodeId, options: &ConvertOptions) -> String {
    let renderer = Renderer { doc, options };
    let mut out = String::new();
    for &child in doc.children(root) {
        renderer.append_node(&mut out, child, 0);
    }
    out
}

pub(crate) struct Renderer<'a> {
    pub(crate) doc: &'a Document,
    pub(crate) options: &'a ConvertOptions,
}

impl Renderer<'_> {
    /// Renders one child into the accumulator; failures degrade to a
    /// visible `[err]` marker and the caller keeps going.
    fn append_node(&self, out: &mut String, id: NodeId, depth: usize) {
        match self.try_process(id, depth) {
            Ok(fragment) => fragment.write_to(out),
            Err(err) => {
                tracing::warn!(error = %err, "failed to process node; emitting marker");
                out.push_str("[err]");
            }
        }
    }

    /// Concatenated rendering of all children, fault-isolated per child.
    fn render_children(&self, id: NodeId, depth: usize) -> String {
        let mut out = String::new();
        for &child in self.doc.children(id) {
            self.append_node(&mut out, child, depth);
        }
        out
    }

    fn try_process(&self, id: NodeId, depth: usize) -> Result<Fragment> {
        if depth > self.options.max_depth {
            return Err(Error::DepthExceeded { depth });
        }
        if let Some(text) = self.doc.text(id) {
            return Ok(Fragment::Inline(text.to_string()));
        }
        if self.is_skipped(id) {
            return Ok(Fragment::Empty);
        }
        match self.handle_element(id, depth) {
            Ok(fragment) => Ok(fragment),
            Err(err) => {
                let tag = self.doc.tag(id).unwrap_or("unknown").to_ascii_uppercase();
                tracing::warn!(error = %err, tag = %tag, "element handler failed; emitting marker");
                Ok(Fragment::Block(format!(
                    "\n[ERROR_PROCESSING_ELEMENT: {tag}]"
                )))
            }
        }
    }

    fn is_skipped(&self, id: NodeId) -> bool {
        let tag = self.doc.tag(id).unwrap_or("");
        if self.doc.is_hidden(id) && !matches!(tag, "details" | "summary") {
            return true;
        }
        if SKIPPED_TAGS.contains(&tag) {
            return true;
        }
        if self.doc.attr(id, "role") == Some("button") {
            return true;
        }
        // Search/input chrome that wraps an icon.
        if self.doc.has_class(id, "bg-input-dark")
            && self
                .doc
                .first_match(id, |d, n| d.tag(n) == Some("svg"))
                .is_some()
        {
            return true;
        }
        false
    }

    fn handle_element(&self, id: NodeId, depth: usize) -> Result<Fragment> {
        let tag = self.doc.tag(id).unwrap_or("");
        Ok(match classify(tag) {
            ElementKind::Paragraph => self.handle_paragraph(id, depth),
            ElementKind::Heading(level) => self.handle_heading(id, level),
            ElementKind::UnorderedList => self.handle_list(id, depth, false),
            ElementKind::OrderedList => self.handle_list(id, depth, true),
            ElementKind::Preformatted => self.handle_pre(id),
            ElementKind::Anchor => self.handle_anchor(id, depth),
            ElementKind::Image => self.handle_image(id),
            ElementKind::BlockQuote => self.handle_blockquote(id, depth),
            ElementKind::Rule => Fragment::Block("\n---".to_string()),
            ElementKind::Strong => {
                Fragment::Inline(format!("**{}**", self.render_children(id, depth + 1).trim()))
            }
            ElementKind::Emphasis => {
                Fragment::Inline(format!("*{}*", self.render_children(id, depth + 1).trim()))
            }
            ElementKind::Code => self.handle_inline_code(id),
            ElementKind::LineBreak => self.handle_line_break(id),
            ElementKind::Table => self.handle_table(id, depth),
            // Table internals render through the table handler; met on
            // their own they contribute nothing.
            ElementKind::TableSection => Fragment::Empty,
            ElementKind::Details => self.handle_details(id, depth),
            ElementKind::Summary => Fragment::Empty,
            ElementKind::Container => self.handle_container(id, depth),
        })
    }

    fn handle_paragraph(&self, id: NodeId, depth: usize) -> Fragment {
        let txt = self.render_children(id, depth + 1);
        let txt = txt.trim();
        if txt.is_empty() {
            Fragment::Empty
        } else {
            Fragment::Block(txt.to_string())
        }
    }

    fn handle_heading(&self, id: NodeId, level: usize) -> Fragment {
        let text = self.doc.text_content(id);
        let text = text.trim();
        if text.is_empty() {
            Fragment::Empty
        } else {
            Fragment::Block(format!("{} {}", "#".repeat(level), text))
        }
    }

    fn handle_list(&self, id: NodeId, depth: usize, ordered: bool) -> Fragment {
        let flatten = self.is_source_list(id);
        let mut list = String::new();
        let mut index = 1usize;
        for li in self.doc.children(id).iter().copied() {
            if self.doc.tag(li) != Some("li") {
                continue;
            }
            let raw = self.render_children(li, depth + 1);
            let item = if flatten {
                // Source citations flatten to single-line bullets.
                newline_run_regex().replace_all(raw.trim(), " ").into_owned()
            } else {
                raw.trim().to_string()
            };
            if item.is_empty() {
                continue;
            }
            if ordered {
                list.push_str(&format!("{index}. {item}\n"));
                index += 1;
            } else {
                list.push_str(&format!("* {item}\n"));
            }
        }
        if list.is_empty() {
            Fragment::Empty
        } else {
            Fragment::Block(list.trim_end().to_string())
        }
    }

    /// A list renders as one-line-per-item when its surroundings say it
    /// lists sources: the preceding sibling or parent mentions "source",
    /// or the list is explicitly classed.
    fn is_source_list(&self, id: NodeId) -> bool {
        if self.doc.has_class(id, "source-list") {
            return true;
        }
        if let Some(prev) = self.doc.prev_element_sibling(id) {
            if source_text_regex().is_match(&self.doc.text_content(prev)) {
                return true;
            }
        }
        if let Some(parent) = self.doc.parent(id) {
            if self.doc.is_element(parent)
                && source_text_regex().is_match(&self.doc.text_content(parent))
            {
                return true;
            }
        }
        false
    }

    fn handle_blockquote(&self, id: NodeId, depth: usize) -> Fragment {
        let content = self.render_children(id, depth + 1);
        let content = content.trim();
        if content.is_empty() {
            return Fragment::Empty;
        }
        let body: Vec<String> = content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| format!("> {l}"))
            .collect();
        Fragment::Block(body.join("\n"))
    }

    fn handle_inline_code(&self, id: NodeId) -> Fragment {
        if self.doc.parent(id).and_then(|p| self.doc.tag(p)) == Some("pre") {
            return Fragment::Inline(self.doc.text_content(id));
        }
        Fragment::Inline(format!("`{}`", self.doc.text_content(id).trim()))
    }

    /// A `<br>` is a hard break only inside paragraph-like containers and
    /// only when something follows it on the line.
    fn handle_line_break(&self, id: NodeId) -> Fragment {
        let parent_tag = self.doc.parent(id).and_then(|p| self.doc.tag(p));
        if !matches!(parent_tag, Some("p") | Some("div") | Some("li")) {
            return Fragment::Empty;
        }
        match self.doc.next_sibling(id) {
            None => Fragment::HardBreak,
            Some(next) => {
                if let Some(text) = self.doc.text(next) {
                    if text.trim().is_empty() {
                        Fragment::Empty
                    } else {
                        Fragment::HardBreak
                    }
                } else {
                    Fragment::HardBreak
                }
            }
        }
    }

    fn handle_details(&self, id: NodeId, depth: usize) -> Fragment {
        let summary = self
            .doc
            .first_match(id, |d, n| d.tag(n) == Some("summary"))
            .map(|s| self.render_children(s, depth + 1).trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "Details".to_string());

        let mut content = String::new();
        for &child in self.doc.children(id) {
            if self.doc.tag(child) == Some("summary") {
                continue;
            }
            self.append_node(&mut content, child, depth + 1);
        }
        let quoted: Vec<String> = content.trim().lines().map(|l| format!("> {l}")).collect();
        let body = format!("> **{summary}**\n{}", quoted.join("\n"));
        Fragment::Block(body.trim_end().to_string())
    }

    fn handle_container(&self, id: NodeId, depth: usize) -> Fragment {
        let txt = self.render_children(id, depth + 1);
        let display = self.doc.computed_display(id);
        if is_block_display(&display) && !txt.trim().is_empty() {
            Fragment::Block(txt.trim_end().to_string())
        } else {
            Fragment::Inline(txt)
        }
    }
}

//! Page-level assembly: where the article lives, what the page is
//! called, and what the exported file should be named.

use crate::dom::{Document, NodeId};
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

/// One converted page, ready to be written out.
#[derive(Debug, Clone, Serialize)]
pub struct PageExport {
    pub title: String,
    pub file_name: String,
    pub markdown: String,
}

fn blank_run_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{3,}").expect("valid regex"))
}

fn whitespace_run_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid regex"))
}

fn slash_pipe_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[/|]").expect("valid regex"))
}

/// The element whose children make up the article: the prose container
/// when the page has one, then the `container`'s second pane, then the
/// body, then the document root.
pub(crate) fn content_root(doc: &Document) -> NodeId {
    let root = doc.root();
    for class in ["prose", "prose-custom"] {
        if let Some(found) = doc.first_match(root, |d, n| d.has_class(n, class)) {
            return found;
        }
        if doc.has_class(root, class) {
            return root;
        }
    }
    if let Some(container) = doc.first_match(root, |d, n| d.has_class(n, "container")) {
        if let Some(second) = doc.element_children(container).nth(1) {
            return second;
        }
    }
    doc.first_match(root, |d, n| d.tag(n) == Some("body"))
        .unwrap_or(root)
}

/// Best available page title: the selected sidebar entry, the first
/// heading, or a placeholder.
pub(crate) fn page_title(doc: &Document) -> String {
    let root = doc.root();
    let selected = doc.first_match(root, |d, n| {
        d.tag(n) == Some("a") && d.attr(n, "data-selected") == Some("true")
    });
    if let Some(title) = selected
        .map(|a| doc.text_content(a).trim().to_string())
        .filter(|t| !t.is_empty())
    {
        return title;
    }
    if let Some(title) = doc
        .first_match(root, |d, n| d.tag(n) == Some("h1"))
        .map(|h| doc.text_content(h).trim().to_string())
        .filter(|t| !t.is_empty())
    {
        return title;
    }
    "Untitled".to_string()
}

/// The document `<title>` text, when the snapshot includes a head.
pub(crate) fn head_title(doc: &Document) -> String {
    doc.first_match(doc.root(), |d, n| d.tag(n) == Some("title"))
        .map(|t| doc.text_content(t).trim().to_string())
        .unwrap_or_default()
}

/// Export file name: the head title (slashes, pipes and whitespace runs
/// hyphenated, the first `---` collapsed) joined with the hyphenated
/// page title.
pub(crate) fn export_file_name(head_title: &str, page_title: &str) -> String {
    let formatted = slash_pipe_regex().replace_all(head_title, "-");
    let formatted = whitespace_run_regex().replace_all(&formatted, "-");
    let formatted = formatted.replacen("---", "-", 1);
    let markdown_title = whitespace_run_regex().replace_all(page_title, "-");
    if formatted.is_empty() {
        format!("{markdown_title}.md")
    } else {
        format!("{formatted}-{markdown_title}.md")
    }
}

/// Final cleanup over the assembled page: outer whitespace trimmed, runs
/// of blank lines collapsed to a single blank line.
pub(crate) fn finalize(markdown: &str) -> String {
    blank_run_regex()
        .replace_all(markdown.trim(), "\n\n")
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot;

    #[test]
    fn content_root_prefers_prose() {
        let doc = snapshot::parse(
            r#"<div class="container"><div>sidebar</div><div><div class="prose"><p>x</p></div></div></div>"#,
        )
        .unwrap();
        let root = content_root(&doc);
        assert!(doc.has_class(root, "prose"));
    }

    #[test]
    fn content_root_falls_back_to_second_pane() {
        let doc = snapshot::parse(
            r#"<div class="container"><div>sidebar</div><div><p>article</p></div></div>"#,
        )
        .unwrap();
        let root = content_root(&doc);
        assert_eq!(doc.text_content(root), "article");
    }

    #[test]
    fn page_title_prefers_the_selected_sidebar_entry() {
        let doc = snapshot::parse(
            r#"<div><a href="/a" data-selected="true">Current Page</a><h1>Other</h1></div>"#,
        )
        .unwrap();
        assert_eq!(page_title(&doc), "Current Page");
    }

    #[test]
    fn page_title_falls_back_to_h1_then_placeholder() {
        let doc = snapshot::parse("<div><h1>Heading</h1></div>").unwrap();
        assert_eq!(page_title(&doc), "Heading");
        let doc = snapshot::parse("<div><p>no title</p></div>").unwrap();
        assert_eq!(page_title(&doc), "Untitled");
    }

    #[test]
    fn export_file_name_hyphenates() {
        assert_eq!(
            export_file_name("repo/name | wiki", "Getting Started"),
            "repo-name-wiki-Getting-Started.md"
        );
        assert_eq!(export_file_name("", "A B"), "A-B.md");
    }

    #[test]
    fn finalize_collapses_blank_runs() {
        assert_eq!(finalize("a\n\n\n\nb\n\n"), "a\n\nb");
    }
}

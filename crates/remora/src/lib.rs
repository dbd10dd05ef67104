#![forbid(unsafe_code)]

//! Reconstruct Markdown from rendered-page snapshots.
//!
//! remora walks the rendered element tree of a documentation page and
//! produces an equivalent Markdown document. Where the page embeds an
//! SVG diagram rendering, the matching reconstructor re-derives Mermaid
//! source from the rendered shapes (flowchart, class, sequence and state
//! diagrams); everything else degrades gracefully to fenced code blocks
//! or plain text.
//!
//! Design goals:
//! - faithful structural recovery, never pixel-perfect reproduction
//! - no failure is fatal to a page: diagrams fall back to raw code,
//!   broken subtrees to inline markers
//! - synchronous and re-entrant; no state survives a conversion call
//!
//! ```
//! use remora::{Converter, snapshot};
//!
//! let doc = snapshot::parse("<div class=\"prose\"><h1>Hi</h1></div>").unwrap();
//! let page = Converter::new().convert_page(&doc);
//! assert_eq!(page.markdown, "# Hi");
//! ```

pub mod detect;
pub mod diagrams;
pub mod dom;
pub mod error;
pub mod geom;
pub mod lang;
pub mod markdown;
pub mod page;
pub mod snapshot;

pub use detect::DiagramKind;
pub use dom::{Document, DocumentBuilder, NodeId};
pub use error::{Error, Result};
pub use page::PageExport;

/// Conversion knobs.
#[derive(Debug, Clone, Copy)]
pub struct ConvertOptions {
    /// Recursion ceiling; subtrees nested deeper degrade to markers.
    pub max_depth: usize,
    /// Infer a language tag for unlabelled code blocks.
    pub detect_languages: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            max_depth: 512,
            detect_languages: true,
        }
    }
}

/// Page-to-Markdown converter. Stateless between calls: re-running a
/// conversion over an unchanged document yields identical output.
#[derive(Debug, Clone, Default)]
pub struct Converter {
    options: ConvertOptions,
}

impl Converter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConvertOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    /// Converts a whole page snapshot: locates the article container,
    /// derives title and export file name, renders and normalizes the
    /// Markdown body.
    pub fn convert_page(&self, doc: &Document) -> PageExport {
        let root = page::content_root(doc);
        let markdown = page::finalize(&self.convert_fragment(doc, root));
        let title = page::page_title(doc);
        let file_name = page::export_file_name(&page::head_title(doc), &title);
        PageExport {
            title,
            file_name,
            markdown,
        }
    }

    /// Renders the children of `root` to Markdown, without page-level
    /// trimming.
    pub fn convert_fragment(&self, doc: &Document, root: NodeId) -> String {
        markdown::convert_fragment(doc, root, &self.options)
    }

    /// Reconstructs Mermaid source from a rendered SVG subtree, or
    /// `None` when nothing recognizable is found (callers fall back to
    /// raw code rendering).
    pub fn reconstruct_diagram(&self, doc: &Document, svg: NodeId) -> Option<String> {
        markdown::reconstruct_diagram(doc, svg)
    }

    /// Parses and converts a snapshot string in one step.
    pub fn convert_snapshot(&self, input: &str) -> Result<PageExport> {
        let doc = snapshot::parse(input)?;
        Ok(self.convert_page(&doc))
    }
}

//! Diagram reconstructors: each takes a rendered SVG subtree and returns
//! fenced Mermaid source, or `None` when the subtree has no recognizable
//! content for that diagram kind (the caller then falls back to raw code
//! rendering).

use crate::detect::DiagramKind;
use crate::dom::{Document, NodeId};

pub mod class;
pub mod flowchart;
pub mod sequence;
pub mod state;

/// Dispatches to the reconstructor for `kind`.
pub fn reconstruct(doc: &Document, svg: NodeId, kind: DiagramKind) -> Option<String> {
    tracing::debug!(kind = %kind, "reconstructing diagram");
    match kind {
        DiagramKind::Flowchart => flowchart::reconstruct(doc, svg),
        DiagramKind::Class => class::reconstruct(doc, svg),
        DiagramKind::Sequence => sequence::reconstruct(doc, svg),
        DiagramKind::State => state::reconstruct(doc, svg),
    }
}

/// Wraps reconstructed Mermaid source in its fence.
pub(crate) fn fence(body: &str) -> String {
    format!("```mermaid\n{}\n```", body.trim())
}

/// Strips a leading and a trailing double quote, each independently.
pub(crate) fn strip_outer_quotes(text: &str) -> &str {
    let text = text.strip_prefix('"').unwrap_or(text);
    text.strip_suffix('"').unwrap_or(text)
}

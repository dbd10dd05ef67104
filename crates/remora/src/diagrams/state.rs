//! State diagram reconstruction.
//!
//! States become boxes (start/end pseudo-states get small fixed-radius
//! boxes named `[*]`), and every transition path is matched to its source
//! and target by box distance with a near-zero tolerance: a path that
//! does not touch a state box on both ends is not a transition.

use crate::dom::{Document, NodeId};
use crate::geom::{self, Point, Rect};
use rustc_hash::FxHashSet;

/// A transition endpoint must effectively touch its state box.
pub(crate) const ENDPOINT_TOLERANCE: f64 = 5.0;
/// Maximum distance between a transition midpoint and an edge label.
pub(crate) const LABEL_RADIUS: f64 = 150.0;
/// Pseudo-state circle radius used for end markers.
const PSEUDO_STATE_RADIUS: f64 = 7.0;

#[derive(Debug)]
struct StateBox {
    name: String,
    rect: Rect,
}

#[derive(Debug)]
struct EdgeLabel {
    text: String,
    position: Point,
}

pub fn reconstruct(doc: &Document, svg: NodeId) -> Option<String> {
    let states = collect_states(doc, svg);
    let labels = collect_labels(doc, svg);

    let mut seen: FxHashSet<(usize, usize, String)> = FxHashSet::default();
    let mut lines: Vec<String> = Vec::new();
    for path in doc.select(svg, |d, n| {
        d.tag(n) == Some("path") && d.has_class(n, "transition")
    }) {
        let Some(d_attr) = doc.attr(path, "d") else {
            continue;
        };
        let (Some(start), Some(end)) = (geom::leading_move(d_attr), geom::trailing_point(d_attr))
        else {
            continue;
        };

        let Some((source, source_dist)) = closest_state(&states, start) else {
            continue;
        };
        let Some((target, target_dist)) = closest_state(&states, end) else {
            continue;
        };
        if source_dist >= ENDPOINT_TOLERANCE || target_dist >= ENDPOINT_TOLERANCE {
            continue;
        }
        if source == target {
            // Self-loops are excluded by design.
            continue;
        }

        let midpoint = geom::point((start.x + end.x) / 2.0, (start.y + end.y) / 2.0);
        let label = closest_label(&labels, midpoint).unwrap_or_default();

        let key = (source, target, label.clone());
        if !seen.insert(key) {
            continue;
        }
        let mut line = format!("    {} --> {}", states[source].name, states[target].name);
        if !label.is_empty() {
            line.push_str(&format!(" : \"{label}\""));
        }
        lines.push(line);
    }

    if lines.is_empty() {
        return None;
    }
    Some(super::fence(&format!("stateDiagram-v2\n{}", lines.join("\n"))))
}

fn collect_states(doc: &Document, svg: NodeId) -> Vec<StateBox> {
    let mut states: Vec<StateBox> = Vec::new();

    for g in doc.select(svg, |d, n| {
        d.tag(n) == Some("g") && d.has_classes(n, &["node", "statediagram-state"])
    }) {
        let name = doc
            .first_match(g, |d, n| {
                matches!(d.tag(n), Some("p") | Some("span"))
                    && d.closest(n, |d2, a| d2.has_class(a, "nodeLabel")).is_some()
                    && d.closest(n, |d2, a| d2.tag(a) == Some("foreignobject"))
                        .is_some()
            })
            .map(|el| doc.text_content(el).trim().to_string())
            .unwrap_or_default();
        if name.is_empty() {
            continue;
        }
        let Some((tx, ty)) = doc.translate(g) else {
            continue;
        };
        let rect = doc.first_match(g, |d, n| {
            d.tag(n) == Some("rect") && d.has_classes(n, &["basic", "label-container"])
        });
        let Some(rect) = rect else {
            continue;
        };
        let (Some(rx), Some(ry), Some(w), Some(h)) = (
            parse_attr(doc, rect, "x"),
            parse_attr(doc, rect, "y"),
            parse_attr(doc, rect, "width"),
            parse_attr(doc, rect, "height"),
        ) else {
            continue;
        };
        states.push(StateBox {
            name,
            rect: geom::rect(tx + rx, ty + ry, w, h),
        });
    }

    // Start pseudo-state: a circle marked as start, positioned by its
    // owning node group.
    if let Some(circle) = doc.first_match(svg, |d, n| {
        d.tag(n) == Some("circle") && d.has_class(n, "state-start")
    }) {
        let group = doc.closest(circle, |d, n| d.tag(n) == Some("g") && d.has_class(n, "node"));
        let translate = group.and_then(|g| doc.translate(g));
        let radius = parse_attr(doc, circle, "r");
        if let (Some((tx, ty)), Some(r)) = (translate, radius) {
            if r > 0.0 {
                states.push(StateBox {
                    name: "[*]".to_string(),
                    rect: geom::rect(tx - r, ty - r, 2.0 * r, 2.0 * r),
                });
            }
        }
    }

    // End pseudo-states: default nodes drawn as two nested paths.
    for g in doc.select(svg, |d, n| {
        d.tag(n) == Some("g") && d.has_classes(n, &["node", "default"])
    }) {
        let path_children = doc
            .select(g, |d, n| d.tag(n) == Some("path"))
            .len();
        if path_children < 2 {
            continue;
        }
        let Some((tx, ty)) = doc.translate(g) else {
            continue;
        };
        let r = PSEUDO_STATE_RADIUS;
        states.push(StateBox {
            name: "[*]".to_string(),
            rect: geom::rect(tx - r, ty - r, 2.0 * r, 2.0 * r),
        });
    }

    states
}

fn collect_labels(doc: &Document, svg: NodeId) -> Vec<EdgeLabel> {
    let mut labels = Vec::new();
    for g in doc.select(svg, |d, n| d.tag(n) == Some("g") && d.has_class(n, "edgeLabel")) {
        let text = doc
            .first_match(g, |d, n| {
                matches!(d.tag(n), Some("p") | Some("span"))
                    && d.closest(n, |d2, a| d2.tag(a) == Some("foreignobject"))
                        .is_some()
            })
            .map(|el| {
                super::strip_outer_quotes(doc.text_content(el).trim()).to_string()
            })
            .unwrap_or_default();
        if text.is_empty() {
            continue;
        }
        let Some((x, y)) = doc.translate(g) else {
            continue;
        };
        labels.push(EdgeLabel {
            text,
            position: geom::point(x, y),
        });
    }
    labels
}

/// Scored candidate search: index and distance of the state box nearest
/// to the point.
fn closest_state(states: &[StateBox], p: Point) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (index, state) in states.iter().enumerate() {
        let dist = geom::distance_point_to_box(p, &state.rect);
        if best.is_none_or(|(_, d)| dist < d) {
            best = Some((index, dist));
        }
    }
    best
}

fn closest_label(labels: &[EdgeLabel], midpoint: Point) -> Option<String> {
    let mut best: Option<(&EdgeLabel, f64)> = None;
    for label in labels {
        let dist = geom::distance(label.position, midpoint);
        if best.is_none_or(|(_, d)| dist < d) {
            best = Some((label, dist));
        }
    }
    match best {
        Some((label, dist)) if dist < LABEL_RADIUS => Some(label.text.clone()),
        _ => None,
    }
}

fn parse_attr(doc: &Document, id: NodeId, name: &str) -> Option<f64> {
    doc.attr(id, name)?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxes() -> Vec<StateBox> {
        vec![
            StateBox {
                name: "Idle".into(),
                rect: geom::rect(0.0, 0.0, 100.0, 40.0),
            },
            StateBox {
                name: "Busy".into(),
                rect: geom::rect(0.0, 100.0, 100.0, 40.0),
            },
        ]
    }

    #[test]
    fn closest_state_measures_box_distance() {
        let states = boxes();
        let (index, dist) = closest_state(&states, geom::point(50.0, 42.0)).unwrap();
        assert_eq!(index, 0);
        assert_eq!(dist, 2.0);
        let (index, dist) = closest_state(&states, geom::point(50.0, 120.0)).unwrap();
        assert_eq!(index, 1);
        assert_eq!(dist, 0.0);
    }

    #[test]
    fn closest_label_is_bounded_by_radius() {
        let labels = vec![EdgeLabel {
            text: "go".into(),
            position: geom::point(0.0, 0.0),
        }];
        assert_eq!(
            closest_label(&labels, geom::point(100.0, 0.0)),
            Some("go".to_string())
        );
        assert_eq!(closest_label(&labels, geom::point(200.0, 0.0)), None);
    }
}

//! Sequence diagram reconstruction.
//!
//! Participants are located by x, messages by their line geometry, and
//! everything is linearized into one event stream ordered by vertical
//! position. Message texts pair with message lines positionally (the
//! i-th line with the i-th text, both sorted by y): a known limitation
//! carried over from the tuned heuristics, not a geometric match.

use crate::dom::{Document, NodeId};
use crate::geom;
use rustc_hash::FxHashSet;

/// A curved message path whose endpoints differ by less than this in x is
/// a self-message.
pub(crate) const SELF_MESSAGE_X_TOLERANCE: f64 = 20.0;
/// A loop region needs at least this many boundary lines.
const LOOP_MIN_LINES: usize = 4;

#[derive(Debug, Clone)]
struct Participant {
    name: String,
    x: f64,
}

#[derive(Debug)]
struct MessageLine {
    x1: f64,
    y1: f64,
    x2: f64,
    dashed: bool,
    self_message: bool,
}

#[derive(Debug)]
struct Message {
    from: String,
    to: String,
    text: String,
    arrow: &'static str,
    y: f64,
}

#[derive(Debug)]
struct SeqNote {
    text: String,
    target: String,
    y: f64,
}

#[derive(Debug)]
struct LoopRegion {
    y_min: f64,
    y_max: f64,
    text: String,
}

/// One renderable event; the stream is ordered by `y`.
#[derive(Debug)]
enum Event {
    Message(Message),
    Note(SeqNote),
    LoopStart { text: String },
    LoopEnd,
}

pub fn reconstruct(doc: &Document, svg: NodeId) -> Option<String> {
    let participants = collect_participants(doc, svg);
    let notes = collect_notes(doc, svg, &participants);
    let messages = collect_messages(doc, svg, &participants);
    let loop_region = collect_loop_region(doc, svg);

    if participants.is_empty() && messages.is_empty() {
        return None;
    }

    let mut out = String::from("sequenceDiagram\n");
    for p in &participants {
        out.push_str(&format!("  participant {}\n", p.name));
    }
    out.push('\n');

    let mut events: Vec<(f64, Event)> = Vec::new();
    for m in messages {
        events.push((m.y, Event::Message(m)));
    }
    for n in notes {
        events.push((n.y, Event::Note(n)));
    }
    if let Some(region) = &loop_region {
        events.push((
            region.y_min - 1.0,
            Event::LoopStart {
                text: region.text.clone(),
            },
        ));
        events.push((region.y_max + 1.0, Event::LoopEnd));
    }
    events.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    let mut open_loops = 0usize;
    for (_, event) in events {
        let indent = if open_loops > 0 { "  " } else { "" };
        match event {
            Event::LoopStart { text } => {
                if text.is_empty() {
                    out.push_str("  loop\n");
                } else {
                    out.push_str(&format!("  loop {text}\n"));
                }
                open_loops += 1;
            }
            Event::LoopEnd => {
                if open_loops > 0 {
                    out.push_str("  end\n");
                    open_loops -= 1;
                }
            }
            Event::Note(note) => {
                out.push_str(&format!(
                    "{indent}  note over {}: {}\n",
                    note.target, note.text
                ));
            }
            Event::Message(msg) => {
                out.push_str(&format!(
                    "{indent}  {}{}{}: {}\n",
                    msg.from, msg.arrow, msg.to, msg.text
                ));
            }
        }
    }
    // Any loop the stream left open still closes.
    while open_loops > 0 {
        out.push_str("  end\n");
        open_loops -= 1;
    }

    Some(super::fence(&out))
}

fn collect_participants(doc: &Document, svg: NodeId) -> Vec<Participant> {
    let mut participants: Vec<Participant> = Vec::new();
    for el in doc.select(svg, |d, n| {
        d.tag(n) == Some("text") && d.has_class(n, "actor-box")
    }) {
        let raw = doc.text_content(el);
        let name = super::strip_outer_quotes(raw.trim()).to_string();
        let Some(x) = parse_attr(doc, el, "x") else {
            continue;
        };
        if name.is_empty() {
            continue;
        }
        participants.push(Participant { name, x });
    }
    participants.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal));

    let mut seen: FxHashSet<String> = FxHashSet::default();
    participants.retain(|p| seen.insert(p.name.clone()));
    participants
}

fn collect_notes(doc: &Document, svg: NodeId, participants: &[Participant]) -> Vec<SeqNote> {
    let mut notes = Vec::new();
    for g in doc.select(svg, |d, n| d.tag(n) == Some("g")) {
        let rect = doc.first_match(g, |d, n| d.tag(n) == Some("rect") && d.has_class(n, "note"));
        let text_el =
            doc.first_match(g, |d, n| d.tag(n) == Some("text") && d.has_class(n, "noteText"));
        let (Some(rect), Some(text_el)) = (rect, text_el) else {
            continue;
        };
        let text = doc.text_content(text_el).trim().to_string();
        let (Some(x), Some(width)) = (parse_attr(doc, rect, "x"), parse_attr(doc, rect, "width"))
        else {
            continue;
        };
        let (left, right) = (x, x + width);

        // Participants (already in x order) covered by the note's span.
        let covered: Vec<&Participant> = participants
            .iter()
            .filter(|p| p.x >= left && p.x <= right)
            .collect();
        if covered.is_empty() {
            continue;
        }
        let target = if covered.len() == 1 {
            covered[0].name.clone()
        } else {
            format!("{},{}", covered[0].name, covered[covered.len() - 1].name)
        };
        notes.push(SeqNote {
            text,
            target,
            y: parse_attr(doc, rect, "y").unwrap_or(0.0),
        });
    }
    notes
}

fn collect_messages(doc: &Document, svg: NodeId, participants: &[Participant]) -> Vec<Message> {
    let mut texts: Vec<(String, f64)> = Vec::new();
    for el in doc.select(svg, |d, n| {
        d.tag(n) == Some("text") && d.has_class(n, "messageText")
    }) {
        let text = doc.text_content(el).trim().to_string();
        let Some(y) = parse_attr(doc, el, "y") else {
            continue;
        };
        if text.is_empty() {
            continue;
        }
        texts.push((text, y));
    }
    texts.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut lines: Vec<MessageLine> = Vec::new();
    for el in doc.select(svg, |d, n| {
        d.tag(n) == Some("line")
            && (d.has_class(n, "messageLine0") || d.has_class(n, "messageLine1"))
    }) {
        let (Some(x1), Some(y1), Some(x2), Some(_y2)) = (
            parse_attr(doc, el, "x1"),
            parse_attr(doc, el, "y1"),
            parse_attr(doc, el, "x2"),
            parse_attr(doc, el, "y2"),
        ) else {
            continue;
        };
        lines.push(MessageLine {
            x1,
            y1,
            x2,
            dashed: doc.has_class(el, "messageLine1"),
            self_message: false,
        });
    }

    // Curved paths whose endpoints share an x are self-messages.
    for el in doc.select(svg, |d, n| {
        d.tag(n) == Some("path")
            && (d.has_class(n, "messageLine0") || d.has_class(n, "messageLine1"))
    }) {
        let Some(d_attr) = doc.attr(el, "d") else {
            continue;
        };
        let (Some(start), Some(end)) = (geom::leading_move(d_attr), geom::trailing_point(d_attr))
        else {
            continue;
        };
        if (start.x - end.x).abs() < SELF_MESSAGE_X_TOLERANCE {
            lines.push(MessageLine {
                x1: start.x,
                y1: start.y,
                x2: end.x,
                dashed: doc.has_class(el, "messageLine1"),
                self_message: true,
            });
        }
    }
    lines.sort_by(|a, b| a.y1.partial_cmp(&b.y1).unwrap_or(std::cmp::Ordering::Equal));

    let mut messages = Vec::new();
    for (line, (text, _)) in lines.iter().zip(texts.iter()) {
        let (from, to) = if line.self_message {
            let Some(p) = closest_participant(participants, line.x1) else {
                continue;
            };
            (p.name.clone(), p.name.clone())
        } else {
            let (Some(from), Some(to)) = (
                closest_participant(participants, line.x1),
                closest_participant(participants, line.x2),
            ) else {
                continue;
            };
            (from.name.clone(), to.name.clone())
        };
        messages.push(Message {
            from,
            to,
            text: text.clone(),
            arrow: if line.dashed { "-->>" } else { "->>" },
            y: line.y1,
        });
    }
    messages
}

/// Scored candidate search over participant x positions; no radius, the
/// nearest lifeline always wins.
fn closest_participant(participants: &[Participant], x: f64) -> Option<&Participant> {
    let mut best: Option<(&Participant, f64)> = None;
    for p in participants {
        let dist = (p.x - x).abs();
        if best.is_none_or(|(_, d)| dist < d) {
            best = Some((p, dist));
        }
    }
    best.map(|(p, _)| p)
}

fn collect_loop_region(doc: &Document, svg: NodeId) -> Option<LoopRegion> {
    let boundary_lines = doc.select(svg, |d, n| {
        d.tag(n) == Some("line") && d.has_class(n, "loopLine")
    });
    if boundary_lines.len() < LOOP_MIN_LINES {
        return None;
    }

    let mut xs: Vec<f64> = Vec::new();
    let mut ys: Vec<f64> = Vec::new();
    for line in &boundary_lines {
        for attr in ["x1", "x2"] {
            if let Some(v) = parse_attr(doc, *line, attr) {
                xs.push(v);
            }
        }
        for attr in ["y1", "y2"] {
            if let Some(v) = parse_attr(doc, *line, attr) {
                ys.push(v);
            }
        }
    }
    if ys.is_empty() {
        return None;
    }
    let y_min = ys.iter().copied().fold(f64::INFINITY, f64::min);
    let y_max = ys.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let text = doc
        .first_match(svg, |d, n| d.has_class(n, "loopText"))
        .map(|el| doc.text_content(el).trim().to_string())
        .unwrap_or_default();

    Some(LoopRegion { y_min, y_max, text })
}

fn parse_attr(doc: &Document, id: NodeId, name: &str) -> Option<f64> {
    doc.attr(id, name)?.trim().parse().ok()
}

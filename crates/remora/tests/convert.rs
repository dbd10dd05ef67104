//! End-to-end conversions over snapshot fixtures: each scenario feeds a
//! rendered subtree through the full pipeline and checks the exact
//! Markdown that comes out.

use remora::{Converter, snapshot};

fn convert(input: &str) -> String {
    let doc = snapshot::parse(input).unwrap();
    Converter::new().convert_page(&doc).markdown
}

const FLOWCHART_PAGE: &str = r#"<div class="prose"><pre><svg id="mermaid-1" aria-roledescription="flowchart-v2"><g class="node default" id="flowchart-A-0" data-bbox="10 10 80 40"><g class="label"><foreignObject><div><p>start</p></div></foreignObject></g></g><g class="node default" id="flowchart-B-1" data-bbox="10 110 80 40"><g class="label"><foreignObject><div><p>end</p></div></foreignObject></g></g><path class="flowchart-link" id="L_A_B_0" d="M50,50 L50,110"/><g class="edgeLabels"><g class="edgeLabel" data-bbox="40 75 20 10"><foreignObject><div><p>go</p></div></foreignObject></g></g></svg></pre></div>"#;

#[test]
fn flowchart_reconstruction_matches_the_rendering() {
    let expected = "```mermaid\nflowchart TD\n\nA[\"start\"]\nB[\"end\"]\n\nA -->|\"go\"| B\n```";
    assert_eq!(convert(FLOWCHART_PAGE), expected);
}

#[test]
fn flowchart_edges_only_reference_declared_nodes() {
    let out = convert(FLOWCHART_PAGE);
    for line in out.lines().filter(|l| l.contains("-->")) {
        let (from, rest) = line.split_once(" -->").unwrap();
        let to = rest.rsplit(' ').next().unwrap();
        assert!(out.contains(&format!("{from}[\"")), "dangling source {from}");
        assert!(out.contains(&format!("{to}[\"")), "dangling target {to}");
    }
}

#[test]
fn flowchart_clusters_render_as_nested_subgraphs() {
    let page = r#"<div class="prose"><pre><svg id="mermaid-1" aria-roledescription="flowchart-v2"><g class="cluster" id="C1"><rect data-bbox="0 0 300 200"/><g class="cluster-label">Group</g></g><g class="node" id="flowchart-A-0" data-bbox="10 10 50 30"><g class="label"><foreignObject><div><p>a</p></div></foreignObject></g></g><g class="node" id="flowchart-B-1" data-bbox="10 100 50 30"><g class="label"><foreignObject><div><p>b</p></div></foreignObject></g></g><g class="node" id="flowchart-D-2" data-bbox="400 10 50 30"><g class="label"><foreignObject><div><p>d</p></div></foreignObject></g></g><path class="flowchart-link" id="L_A_B_0" d="M35,40 L35,100"/><path class="flowchart-link" id="L_A_D_1" d="M60,25 L400,25"/></svg></pre></div>"#;
    let expected = "```mermaid\nflowchart TD\n\nA[\"a\"]\nB[\"b\"]\nD[\"d\"]\n\nA --> D\n\nsubgraph C1 [\"Group\"]\n    A\n    B\n    A --> B\nend\n```";
    assert_eq!(convert(page), expected);
}

#[test]
fn class_diagram_reconstruction() {
    let page = r#"<div class="prose"><pre><svg id="mermaid-2" aria-roledescription="classDiagram"><g class="node default" id="classId-Foo-0" transform="translate(100, 100)"><g class="basic label-container"><path d="M-60 -40 L60 -40 L60 40 L-60 40 Z"/></g><g class="annotation-group text"><g class="label"><foreignObject><span class="nodeLabel"><p>&lt;&lt;interface&gt;&gt;</p></span></foreignObject></g></g><g class="members-group text"><g class="label"><foreignObject><span class="nodeLabel"><p>+int x</p></span></foreignObject></g></g><g class="methods-group text"><g class="label"><foreignObject><span class="nodeLabel"><p>+run()</p></span></foreignObject></g></g></g><g class="node default" id="classId-Bar-1" transform="translate(400, 100)"><g class="basic label-container"><path d="M-50 -30 L50 -30 L50 30 L-50 30 Z"/></g></g><g><rect class="note" x="300" y="40" width="80" height="30"/><text class="noteText">remember</text></g><path id="edgeNote1" d="M300,40 L100,100"/><path class="relation" id="id_Foo_Bar_0" marker-end="url(#mermaid-2_classDiagram-extensionEnd)" d="M160,100 L350,100"/><g class="edgeLabels"><g class="edgeLabel"><foreignObject><p>owns</p></foreignObject></g></g></svg></pre></div>"#;
    let expected = "```mermaid\nclassDiagram\n    note for Foo \"remember\"\n    class Foo {\n        <<interface>>\n        +int x\n        +run()\n    }\n    class Bar {\n    }\n    Bar <|-- Foo : owns\n```";
    assert_eq!(convert(page), expected);
}

#[test]
fn sequence_diagram_with_note_and_loop() {
    let page = r#"<div class="prose"><pre><svg id="mermaid-3" aria-roledescription="sequence"><text class="actor-box" x="75">Alice</text><text class="actor-box" x="275">Bob</text><text class="actor-box" x="75">Alice</text><g><rect class="note" x="60" y="90" width="30" height="20"/><text class="noteText">hi note</text></g><line class="messageLine0" x1="75" y1="120" x2="275" y2="120"/><text class="messageText" x="175" y="110">hello</text><line class="messageLine1" x1="275" y1="180" x2="75" y2="180"/><text class="messageText" x="175" y="170">reply</text><line class="loopLine" x1="50" y1="150" x2="300" y2="150"/><line class="loopLine" x1="50" y1="210" x2="300" y2="210"/><line class="loopLine" x1="50" y1="150" x2="50" y2="210"/><line class="loopLine" x1="300" y1="150" x2="300" y2="210"/><text class="loopText">retry</text></svg></pre></div>"#;
    let expected = "```mermaid\nsequenceDiagram\n  participant Alice\n  participant Bob\n\n  note over Alice: hi note\n  Alice->>Bob: hello\n  loop retry\n    Bob-->>Alice: reply\n  end\n```";
    assert_eq!(convert(page), expected);
}

#[test]
fn sequence_participant_lines_match_unique_names() {
    let page = r#"<div class="prose"><pre><svg id="mermaid-3" aria-roledescription="sequence"><text class="actor-box" x="75">A</text><text class="actor-box" x="75">A</text><text class="actor-box" x="200">B</text><text class="actor-box" x="300">C</text></svg></pre></div>"#;
    let out = convert(page);
    assert_eq!(out.matches("participant ").count(), 3);
}

#[test]
fn sequence_self_messages_use_curved_paths() {
    let page = r#"<div class="prose"><pre><svg id="mermaid-3" aria-roledescription="sequence"><text class="actor-box" x="75">Alice</text><text class="actor-box" x="275">Bob</text><path class="messageLine0" d="M275,220 C355,220 355,260 277,260"/><text class="messageText" x="300" y="215">think</text></svg></pre></div>"#;
    let expected =
        "```mermaid\nsequenceDiagram\n  participant Alice\n  participant Bob\n\n  Bob->>Bob: think\n```";
    assert_eq!(convert(page), expected);
}

#[test]
fn sequence_loops_always_balance() {
    // A loop region with no content after it still closes.
    let page = r#"<div class="prose"><pre><svg id="mermaid-3" aria-roledescription="sequence"><text class="actor-box" x="75">A</text><line class="messageLine0" x1="75" y1="300" x2="75" y2="300"/><text class="messageText" x="75" y="290">m</text><line class="loopLine" x1="50" y1="250" x2="300" y2="250"/><line class="loopLine" x1="50" y1="400" x2="300" y2="400"/><line class="loopLine" x1="50" y1="250" x2="50" y2="400"/><line class="loopLine" x1="300" y1="250" x2="300" y2="400"/></svg></pre></div>"#;
    let out = convert(page);
    let opens = out.lines().filter(|l| l.trim_start().starts_with("loop")).count();
    let closes = out.lines().filter(|l| l.trim() == "end").count();
    assert_eq!(opens, closes);
}

#[test]
fn state_diagram_reconstruction() {
    let page = r#"<div class="prose"><pre><svg id="mermaid-4" aria-roledescription="stateDiagram"><g class="node default" transform="translate(50, 30)"><circle class="state-start" r="7"/></g><g class="node statediagram-state" transform="translate(150, 100)"><rect class="basic label-container" x="-40" y="-20" width="80" height="40"/><foreignObject><div><span class="nodeLabel"><p>Idle</p></span></div></foreignObject></g><g class="node default" transform="translate(450, 100)"><path d="M-7 0 A7 7 0 1 0 7 0"/><path d="M-4 0 A4 4 0 1 0 4 0"/></g><g class="edgeLabel" transform="translate(80, 58)"><foreignObject><div><p>"boot"</p></div></foreignObject></g><path class="transition" d="M50,37 L110,80"/><path class="transition" d="M190,100 L443,100"/></svg></pre></div>"#;
    let expected =
        "```mermaid\nstateDiagram-v2\n    [*] --> Idle : \"boot\"\n    Idle --> [*]\n```";
    assert_eq!(convert(page), expected);
}

#[test]
fn state_diagrams_never_emit_self_loops() {
    // Both endpoints of the path touch the same box.
    let page = r#"<div class="prose"><pre><svg id="mermaid-4" aria-roledescription="stateDiagram"><g class="node statediagram-state" transform="translate(150, 100)"><rect class="basic label-container" x="-40" y="-20" width="80" height="40"/><foreignObject><div><span class="nodeLabel"><p>Idle</p></span></div></foreignObject></g><path class="transition" d="M110,100 C60,40 240,40 190,100"/></svg></pre></div>"#;
    let out = convert(page);
    // The lone transition is a self-loop, so reconstruction yields null
    // and the converter falls back to a plain fence of the SVG text.
    assert!(!out.contains("stateDiagram"));
    assert!(out.starts_with("```"));
}

#[test]
fn unrecognizable_diagrams_fall_back_to_raw_code() {
    let page = r#"<div class="prose"><pre><svg id="mermaid-7"><rect width="5" height="5"/>orphan text</svg></pre></div>"#;
    assert_eq!(convert(page), "```\norphan text\n```");
}

#[test]
fn mixed_page_renders_blocks_in_order() {
    let page = r#"<div class="prose"><h1>Title</h1><p>Intro <em>text</em>.</p><ul><li>first</li><li>second</li></ul><table><thead><tr><th>K</th></tr></thead><tbody><tr><td>V</td></tr></tbody></table></div>"#;
    let expected = "# Title\n\nIntro *text*.\n\n* first\n* second\n\n| K |\n| --- |\n| V |";
    assert_eq!(convert(page), expected);
}

#[test]
fn conversion_is_byte_identical_across_runs() {
    let doc = snapshot::parse(FLOWCHART_PAGE).unwrap();
    let converter = Converter::new();
    let first = converter.convert_page(&doc);
    let second = converter.convert_page(&doc);
    assert_eq!(first.markdown, second.markdown);
    assert_eq!(first.file_name, second.file_name);
}

#[test]
fn page_export_carries_title_and_file_name() {
    let page = r#"<html><head><title>acme/docs</title></head><body><div class="container"><div><a href="/x" data-selected="true">Setup</a></div><div><div class="prose"><p>body</p></div></div></div></body></html>"#;
    let doc = snapshot::parse(page).unwrap();
    let export = Converter::new().convert_page(&doc);
    assert_eq!(export.title, "Setup");
    assert_eq!(export.file_name, "acme-docs-Setup.md");
    assert_eq!(export.markdown, "body");
}

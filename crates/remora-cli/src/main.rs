use remora::{Converter, Document, detect, dom::NodeId};
use serde::Serialize;
use std::io::Read;

#[derive(Debug)]
enum CliError {
    Usage(&'static str),
    Io(std::io::Error),
    Remora(remora::Error),
    Json(serde_json::Error),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Usage(msg) => write!(f, "{msg}"),
            CliError::Io(err) => write!(f, "I/O error: {err}"),
            CliError::Remora(err) => write!(f, "{err}"),
            CliError::Json(err) => write!(f, "JSON error: {err}"),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<remora::Error> for CliError {
    fn from(value: remora::Error) -> Self {
        Self::Remora(value)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

#[derive(Debug, Clone, Copy, Default)]
enum Command {
    #[default]
    Convert,
    Detect,
    Diagrams,
}

#[derive(Debug, Default)]
struct Args {
    command: Command,
    input: Option<String>,
    out: Option<String>,
    json: bool,
}

#[derive(Serialize)]
struct DetectedDiagram {
    index: usize,
    kind: detect::DiagramKind,
    svg_id: Option<String>,
}

fn usage() -> &'static str {
    "remora-cli\n\
\n\
USAGE:\n\
  remora-cli [convert] [--json] [--out <path>] [<path>|-]\n\
  remora-cli detect [<path>|-]\n\
  remora-cli diagrams [<path>|-]\n\
\n\
NOTES:\n\
  - If <path> is omitted or '-', the snapshot is read from stdin.\n\
  - convert prints the page Markdown; --json wraps it with title and\n\
    export file name.\n\
  - detect lists the diagram renderings found, one JSON object per line.\n\
  - diagrams prints every reconstructed Mermaid block.\n\
"
}

fn parse_args(argv: &[String]) -> Result<Args, CliError> {
    let mut args = Args::default();
    let mut rest = argv;
    if let Some(first) = rest.first() {
        match first.as_str() {
            "convert" => {
                args.command = Command::Convert;
                rest = &rest[1..];
            }
            "detect" => {
                args.command = Command::Detect;
                rest = &rest[1..];
            }
            "diagrams" => {
                args.command = Command::Diagrams;
                rest = &rest[1..];
            }
            "help" | "--help" | "-h" => return Err(CliError::Usage(usage())),
            _ => {}
        }
    }

    let mut i = 0;
    while i < rest.len() {
        match rest[i].as_str() {
            "--json" => args.json = true,
            "--out" => {
                i += 1;
                let path = rest.get(i).ok_or(CliError::Usage("--out needs a path"))?;
                args.out = Some(path.clone());
            }
            "--help" | "-h" => return Err(CliError::Usage(usage())),
            other if other.starts_with("--") => {
                return Err(CliError::Usage("unknown flag; see --help"));
            }
            other => {
                if args.input.is_some() {
                    return Err(CliError::Usage("only one input path is accepted"));
                }
                args.input = Some(other.to_string());
            }
        }
        i += 1;
    }
    Ok(args)
}

fn read_input(path: Option<&str>) -> Result<String, CliError> {
    match path {
        None | Some("-") => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
        Some(path) => Ok(std::fs::read_to_string(path)?),
    }
}

/// Every mermaid-rendered SVG in the document, in document order.
fn diagram_svgs(doc: &Document) -> Vec<NodeId> {
    doc.select(doc.root(), |d, n| {
        d.tag(n) == Some("svg") && d.id_attr(n).is_some_and(|i| i.starts_with("mermaid-"))
    })
}

fn run(args: Args) -> Result<(), CliError> {
    let input = read_input(args.input.as_deref())?;
    let doc = remora::snapshot::parse(&input)?;
    let converter = Converter::new();

    match args.command {
        Command::Convert => {
            let page = converter.convert_page(&doc);
            let output = if args.json {
                let mut text = serde_json::to_string_pretty(&page)?;
                text.push('\n');
                text
            } else {
                let mut text = page.markdown;
                text.push('\n');
                text
            };
            match &args.out {
                Some(path) => std::fs::write(path, output)?,
                None => print!("{output}"),
            }
        }
        Command::Detect => {
            for (index, svg) in diagram_svgs(&doc).into_iter().enumerate() {
                let Some(kind) = detect::detect_kind(&doc, svg) else {
                    continue;
                };
                let record = DetectedDiagram {
                    index,
                    kind,
                    svg_id: doc.id_attr(svg).map(str::to_string),
                };
                println!("{}", serde_json::to_string(&record)?);
            }
        }
        Command::Diagrams => {
            for svg in diagram_svgs(&doc) {
                if let Some(mermaid) = converter.reconstruct_diagram(&doc, svg) {
                    println!("{mermaid}");
                    println!();
                }
            }
        }
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let argv: Vec<String> = std::env::args().skip(1).collect();
    let args = match parse_args(&argv) {
        Ok(args) => args,
        Err(CliError::Usage(msg)) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = run(args) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

use narwhal::{Graph, Layout, LayoutOptions, Rectangle, StartOptions};
use serde::{Deserialize, Serialize};
use std::io::Read;

#[derive(Debug)]
enum CliError {
    Usage(&'static str),
    Io(std::io::Error),
    Layout(narwhal::Error),
    Json(serde_json::Error),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Usage(msg) => write!(f, "{msg}"),
            CliError::Io(err) => write!(f, "I/O error: {err}"),
            CliError::Layout(err) => write!(f, "layout error: {err}"),
            CliError::Json(err) => write!(f, "JSON error: {err}"),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<narwhal::Error> for CliError {
    fn from(value: narwhal::Error) -> Self {
        Self::Layout(value)
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
    Layout,
    Overlaps,
    PowerGraph,
}

#[derive(Debug, Default)]
struct Args {
    command: Command,
    pretty: bool,
    avoid_overlaps: bool,
    link_distance: Option<f64>,
    iterations: Option<[usize; 3]>,
    grid_snap: Option<usize>,
    seed: Option<u64>,
    input: Option<String>,
    out: Option<String>,
}

/// Input document of the `layout` and `power-graph` commands.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Document {
    #[serde(flatten)]
    graph: Graph,
    options: LayoutOptions,
    start: Option<StartOptions>,
}

#[derive(Debug, Serialize)]
struct OverlapsOutput {
    rectangles: Vec<Rectangle>,
}

fn usage() -> &'static str {
    "narwhal-cli\n\
\n\
USAGE:\n\
  narwhal-cli [layout] [--pretty] [--avoid-overlaps] [--link-distance <d>] [--iterations <u>,<uc>,<ac>] [--grid-snap <n>] [--seed <n>] [--out <path>] [<path>|-]\n\
  narwhal-cli overlaps [--pretty] [--out <path>] [<path>|-]\n\
  narwhal-cli power-graph [--pretty] [--out <path>] [<path>|-]\n\
\n\
NOTES:\n\
  - If <path> is omitted or '-', input is read from stdin.\n\
  - layout reads {nodes, links, groups, constraints, options, start} and prints node positions,\n\
    group bounds and the final stress.\n\
  - overlaps reads a JSON array of rectangles {minX, maxX, minY, maxY} and prints them moved\n\
    apart.\n\
  - power-graph reads {nodes, links} and prints the power-graph groups and edges.\n\
  - Flags override the matching fields of the document's options and start objects.\n\
"
}

fn parse_iterations(s: &str) -> Option<[usize; 3]> {
    let mut parts = s.split(',').map(|p| p.trim().parse::<usize>());
    let u = parts.next()?.ok()?;
    let uc = parts.next()?.ok()?;
    let ac = parts.next()?.ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some([u, uc, ac])
}

fn parse_args(argv: &[String]) -> Result<Args, CliError> {
    let mut args = Args::default();

    let mut it = argv.iter().skip(1);
    while let Some(a) = it.next() {
        match a.as_str() {
            "--help" | "-h" => return Err(CliError::Usage(usage())),
            "layout" => args.command = Command::Layout,
            "overlaps" => args.command = Command::Overlaps,
            "power-graph" => args.command = Command::PowerGraph,
            "--pretty" => args.pretty = true,
            "--avoid-overlaps" => args.avoid_overlaps = true,
            "--link-distance" => {
                let Some(d) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.link_distance = Some(d.parse::<f64>().map_err(|_| CliError::Usage(usage()))?);
            }
            "--iterations" => {
                let Some(s) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.iterations = Some(parse_iterations(s).ok_or(CliError::Usage(usage()))?);
            }
            "--grid-snap" => {
                let Some(n) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.grid_snap = Some(n.parse::<usize>().map_err(|_| CliError::Usage(usage()))?);
            }
            "--seed" => {
                let Some(seed) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.seed = Some(seed.parse::<u64>().map_err(|_| CliError::Usage(usage()))?);
            }
            "--out" => {
                let Some(path) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.out = Some(path.clone());
            }
            "-" => args.input = Some("-".to_string()),
            other if other.starts_with('-') => return Err(CliError::Usage(usage())),
            other => {
                if args.input.is_some() {
                    return Err(CliError::Usage(usage()));
                }
                args.input = Some(other.to_string());
            }
        }
    }

    Ok(args)
}

fn read_input(input: Option<&str>) -> Result<String, CliError> {
    match input {
        None | Some("-") => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
        Some(path) => Ok(std::fs::read_to_string(path)?),
    }
}

fn write_json(value: &impl Serialize, pretty: bool, out: Option<&str>) -> Result<(), CliError> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    match out {
        None => println!("{text}"),
        Some(path) => std::fs::write(path, text)?,
    }
    Ok(())
}

fn run_layout(args: &Args, text: &str) -> Result<(), CliError> {
    let doc: Document = serde_json::from_str(text)?;
    let mut options = doc.options;
    if args.avoid_overlaps {
        options.avoid_overlaps = true;
    }
    if let Some(d) = args.link_distance {
        options.link_distance = d;
        options.link_lengths = narwhal::LinkLengths::None;
    }
    if let Some(seed) = args.seed {
        options.random_seed = seed;
    }
    let mut start = doc.start.unwrap_or_else(|| StartOptions::iterations(10, 10, 10));
    if let Some([u, uc, ac]) = args.iterations {
        start.unconstrained_iterations = u;
        start.user_constraint_iterations = uc;
        start.all_constraints_iterations = ac;
    }
    if let Some(n) = args.grid_snap {
        start.grid_snap_iterations = n;
    }
    let result = narwhal::layout(doc.graph, options, start)?;
    write_json(&result, args.pretty, args.out.as_deref())
}

fn run(args: Args) -> Result<(), CliError> {
    let text = read_input(args.input.as_deref())?;
    match args.command {
        Command::Layout => run_layout(&args, &text),
        Command::Overlaps => {
            let mut rectangles: Vec<Rectangle> = serde_json::from_str(&text)?;
            narwhal::remove_overlaps(&mut rectangles)?;
            write_json(&OverlapsOutput { rectangles }, args.pretty, args.out.as_deref())
        }
        Command::PowerGraph => {
            let doc: Document = serde_json::from_str(&text)?;
            let mut layout = Layout::with_options(doc.options)
                .with_nodes(doc.graph.nodes)
                .with_links(doc.graph.links);
            let pg = layout.power_graph_groups()?;
            write_json(&pg, args.pretty, args.out.as_deref())
        }
    }
}

fn main() {
    let args = match parse_args(&std::env::args().collect::<Vec<_>>()) {
        Ok(v) => v,
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

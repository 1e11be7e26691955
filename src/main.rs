use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, Subcommand};
use tracing::level_filters::LevelFilter;

use drawsync::{LayoutOptions, ReconcileOptions, canvas};

#[derive(Parser)]
#[command(
    name = "drawsync",
    about = "Keep diagram text and whiteboard canvas elements in sync"
)]
struct Cli {
    /// Log to stderr (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the updated element list (JSON) for diagram text
    Reconcile {
        /// Diagram text file (reads from stdin if not provided)
        text: Option<PathBuf>,

        /// Current canvas elements (JSON array or scene object)
        #[arg(long, short = 'e')]
        elements: Option<PathBuf>,

        /// Layout options (JSON)
        #[arg(long, short = 'o')]
        options: Option<PathBuf>,
    },
    /// Print diagram text for canvas elements
    Describe {
        /// Canvas elements file (reads from stdin if not provided)
        elements: Option<PathBuf>,

        /// Omit declarations and quotes where possible
        #[arg(long, short = 'c')]
        compact: bool,
    },
    /// Parse diagram text and print it in canonical form
    Format {
        /// Diagram text file (reads from stdin if not provided)
        text: Option<PathBuf>,

        #[arg(long, short = 'c')]
        compact: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Command::Reconcile {
            text,
            elements,
            options,
        } => run_reconcile(text.as_deref(), elements.as_deref(), options.as_deref()),
        Command::Describe { elements, compact } => read_json(elements.as_deref())
            .map(|v| drawsync::describe(&canvas::elements_from_json(v), compact)),
        Command::Format { text, compact } => read_input(text.as_deref())
            .and_then(|t| drawsync::format(&t, compact).map_err(|e| e.to_string())),
    };

    match result {
        Ok(output) => print!("{output}"),
        Err(e) => {
            eprintln!("ERROR: {e}");
            std::process::exit(1);
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn run_reconcile(
    text: Option<&Path>,
    elements: Option<&Path>,
    options: Option<&Path>,
) -> Result<String, String> {
    let text = read_input(text)?;
    let current = match elements {
        Some(path) => canvas::elements_from_json(read_json(Some(path))?),
        None => Vec::new(),
    };
    let layout: LayoutOptions = match options {
        Some(path) => serde_json::from_value(read_json(Some(path))?)
            .map_err(|e| format!("invalid options in {}: {e}", path.display()))?,
        None => LayoutOptions::default(),
    };
    let options = ReconcileOptions {
        layout,
        board: None,
    };

    let next = drawsync::reconcile_with_options(&text, &current, &options)
        .map_err(|e| e.to_string())?;
    let mut json = serde_json::to_string_pretty(&next).map_err(|e| e.to_string())?;
    json.push('\n');
    Ok(json)
}

fn read_json(path: Option<&Path>) -> Result<serde_json::Value, String> {
    let raw = read_input(path)?;
    serde_json::from_str(&raw).map_err(|e| match path {
        Some(p) => format!("invalid JSON in {}: {e}", p.display()),
        None => format!("invalid JSON on stdin: {e}"),
    })
}

fn read_input(path: Option<&Path>) -> Result<String, String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {e}", path.display())),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| format!("failed to read stdin: {e}"))?;
            Ok(buf)
        }
    }
}

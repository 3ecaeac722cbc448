use std::path::PathBuf;

use clap::Parser;
use pipe_optimizer::history::{self, History, HistoryEntry, SolutionSnapshot};
use pipe_optimizer::solver::DEFAULT_TOP_N;
use pipe_optimizer::{InventoryItem, Scale, Solver, TieBreak, input, render};
use serde::Serialize;
use tracing::Level;

#[derive(Parser)]
#[command(
    name = "pipe_optimizer",
    about = "Find the pipe combinations closest to a desired length without going over"
)]
struct Cli {
    /// Desired total length (e.g. 120.5)
    #[arg(long, required_unless_present_any = ["show_history", "clear_history"])]
    length: Option<String>,

    /// Available pipes as LEN:COUNT (e.g. 25.5:4 10:2)
    #[arg(long = "pipes", num_args = 1..)]
    pipes: Vec<String>,

    /// Number of solutions to show
    #[arg(long, default_value_t = DEFAULT_TOP_N)]
    top: usize,

    /// Decimal places lengths are rounded to
    #[arg(long, default_value_t = pipe_optimizer::scale::DEFAULT_DECIMALS)]
    decimals: u32,

    /// Ordering among equally close solutions: fewest-pieces or discovery-order
    #[arg(long, default_value = "fewest-pieces", value_parser = parse_tie_break)]
    tie_break: TieBreak,

    /// Append this calculation to a JSON history file
    #[arg(long)]
    history: Option<PathBuf>,

    /// Print the history file and exit
    #[arg(long, requires = "history")]
    show_history: bool,

    /// Empty the history file and exit
    #[arg(long, requires = "history")]
    clear_history: bool,

    /// Print solutions as JSON
    #[arg(long)]
    json: bool,

    /// Log search details to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Serialize)]
struct JsonOutput {
    desired_length: String,
    solutions: Vec<SolutionSnapshot>,
}

fn parse_tie_break(s: &str) -> Result<TieBreak, String> {
    match s {
        "fewest-pieces" => Ok(TieBreak::FewestPieces),
        "discovery-order" => Ok(TieBreak::DiscoveryOrder),
        _ => Err(format!(
            "invalid tie break '{}', expected: fewest-pieces or discovery-order",
            s
        )),
    }
}

fn fail(e: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", e);
    std::process::exit(1);
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .init();

    if let Some(path) = &cli.history
        && (cli.show_history || cli.clear_history)
    {
        let mut log = History::load(path).unwrap_or_else(|e| fail(e));
        if cli.clear_history {
            log.clear();
            log.save(path).unwrap_or_else(|e| fail(e));
            println!("History cleared.");
        } else {
            print!("{}", history::render_history(&log));
        }
        return;
    }

    let scale = Scale::new(cli.decimals).unwrap_or_else(|e| fail(e));
    input::validate_top_n(cli.top).unwrap_or_else(|e| fail(e));

    let target = input::parse_target(scale, cli.length.as_deref().unwrap_or_default())
        .unwrap_or_else(|e| fail(e));

    let inventory: Vec<InventoryItem> = cli
        .pipes
        .iter()
        .map(|p| input::parse_pipe(scale, p))
        .collect::<Result<Vec<_>, _>>()
        .unwrap_or_else(|e| fail(e));
    input::validate_inventory(scale, &inventory).unwrap_or_else(|e| fail(e));

    let solver = Solver::new(target, inventory)
        .with_top_n(cli.top)
        .with_scale(scale)
        .with_tie_break(cli.tie_break);
    let result = solver.solve();

    if cli.json {
        let output = JsonOutput {
            desired_length: scale.format_real(target),
            solutions: SolutionSnapshot::from_result(&result),
        };
        let json = serde_json::to_string_pretty(&output).unwrap_or_else(|e| fail(e));
        println!("{}", json);
    } else {
        print!("{}", render::render_inventory(scale, solver.inventory()));
        println!();
        print!("{}", render::render_solutions(&result));
    }

    if let Some(path) = &cli.history {
        let mut log = History::load(path).unwrap_or_else(|e| fail(e));
        log.record(HistoryEntry::new(scale, target, solver.inventory(), &result));
        log.save(path).unwrap_or_else(|e| fail(e));
    }
}

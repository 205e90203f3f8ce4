//! Upgrade Placement Solver
//!
//! Packs a selection of hex-pattern upgrades into a piece of gear's
//! equipment grid. The search runs cooperatively, a bounded number of steps
//! per frame, and the finished board can be saved, checked and replayed in
//! an interactive 3D viewer.

mod logging;
mod visualization;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use thiserror::Error;
use tracing::{error, info};

use upgrade_solver::config::SolverConfig;
use upgrade_solver::error::{ConfigError, PersistenceError, PuzzleError};
use upgrade_solver::geometry::NUM_ROTATIONS;
use upgrade_solver::persistence::{self, Layout, Puzzle};
use upgrade_solver::solver::required_cells;
use upgrade_solver::{EquipSlots, SolveOutcome, SolveSession, Workbench};

use visualization::BoardFrame;

/// Packs upgrades into an equipment grid and shows the result.
#[derive(Parser)]
#[command(name = "upgrade-solver")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Solver configuration file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all log output.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Also write logs to this file.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Solve a puzzle and print the board.
    Solve {
        /// Puzzle file; the built-in demo if omitted.
        puzzle: Option<PathBuf>,
        /// Allow all six rotations regardless of player level.
        #[arg(long)]
        rotate: bool,
        /// Save the resulting layout (TOML) and board (.txt) here.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Report whether the selection can fit by cell count.
    Check {
        /// Puzzle file; the built-in demo if omitted.
        puzzle: Option<PathBuf>,
    },
    /// Apply a saved layout to a puzzle and print the board.
    Show {
        /// Puzzle file the layout was solved for.
        puzzle: PathBuf,
        /// Layout file written by `solve --output`.
        layout: PathBuf,
    },
    /// Solve a puzzle and replay the search in an interactive 3D viewer.
    Display {
        /// Puzzle file; the built-in demo if omitted.
        puzzle: Option<PathBuf>,
        /// Allow all six rotations regardless of player level.
        #[arg(long)]
        rotate: bool,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    Puzzle(#[from] PuzzleError),
    #[error("Failed to set up logging: {0}")]
    Logging(#[source] std::io::Error),
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::setup_logging(cli.verbose, cli.quiet, cli.log_file.as_deref()) {
        eprintln!("{}", CliError::Logging(e));
        std::process::exit(1);
    }

    if let Err(e) = run(cli) {
        error!("{e}");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = SolverConfig::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Some(Command::Solve {
            puzzle,
            rotate,
            output,
        }) => run_solve(puzzle.as_deref(), rotate, output.as_deref(), &config),
        Some(Command::Check { puzzle }) => {
            let puzzle = open_puzzle(puzzle.as_deref())?;
            println!("{}", feasibility_report(&puzzle));
            Ok(())
        }
        Some(Command::Show { puzzle, layout }) => run_show(&puzzle, &layout),
        Some(Command::Display { puzzle, rotate }) => run_display(puzzle.as_deref(), rotate, &config),
        // default: solve the demo
        None => run_solve(None, false, None, &config),
    }
}

/// Loads `path`, or the built-in demo puzzle.
fn open_puzzle(path: Option<&Path>) -> Result<Puzzle, CliError> {
    match path {
        Some(path) => Ok(persistence::load_puzzle(path)?),
        None => Ok(persistence::parse_puzzle(persistence::DEMO_PUZZLE)?),
    }
}

fn rotations_for(rotate: bool, config: &SolverConfig) -> u8 {
    if rotate {
        NUM_ROTATIONS
    } else {
        config.max_rotations()
    }
}

/// Solves the puzzle in place, calling `on_frame` after every scheduler frame.
fn solve_puzzle<F>(
    puzzle: &mut Puzzle,
    max_rotations: u8,
    config: &SolverConfig,
    on_frame: F,
) -> SolveOutcome
where
    F: FnMut(&Workbench, u64),
{
    let session = SolveSession::new(puzzle.carrier, max_rotations)
        .with_cancel_policy(config.session.cancel_policy);
    let selection = puzzle.selection();

    let mut task = session.try_solve(&mut puzzle.workbench, selection, |solved| {
        if solved {
            info!("Found a solution");
        } else {
            info!("No solution");
        }
    });
    config
        .frame_scheduler()
        .run(&mut task, &mut puzzle.workbench, on_frame)
}

/// Summarizes the cell-count check for the puzzle's selection.
fn feasibility_report(puzzle: &Puzzle) -> String {
    let selection = puzzle.selection();
    let required = required_cells(&selection);
    let capacity = puzzle.workbench.width() * puzzle.workbench.height();
    let enabled = puzzle.workbench.grid().cells().filter(|c| c.enabled).count();
    let verdict = if required <= capacity {
        "fits by cell count"
    } else {
        "cannot fit"
    };

    let mut report = format!(
        "{} upgrades need {} cells, grid has {} ({} enabled): {}\n",
        selection.len(),
        required,
        capacity,
        enabled,
        verdict
    );
    for upgrade in &selection {
        report.push_str(&format!(
            "  {} - {} cells\n",
            upgrade,
            upgrade.pattern().enabled_cell_count()
        ));
    }
    report
}

fn run_solve(
    path: Option<&Path>,
    rotate: bool,
    output: Option<&Path>,
    config: &SolverConfig,
) -> Result<(), CliError> {
    let mut puzzle = open_puzzle(path)?;
    let outcome = solve_puzzle(&mut puzzle, rotations_for(rotate, config), config, |_, _| {});

    println!("{outcome}");
    println!("{}", puzzle.board());

    if let Some(output) = output {
        let layout = Layout::capture(&puzzle, outcome.is_success());
        persistence::save_layout(output, &layout, &puzzle.board())?;
        println!(
            "Wrote {} and {}",
            output.display(),
            persistence::board_path(output).display()
        );
    }
    Ok(())
}

fn run_show(puzzle_path: &Path, layout_path: &Path) -> Result<(), CliError> {
    let mut puzzle = persistence::load_puzzle(puzzle_path)?;
    let layout = persistence::load_layout(layout_path)?;
    persistence::apply_layout(&mut puzzle, &layout)?;

    println!(
        "{} upgrades placed ({})",
        layout.placements.len(),
        if layout.solved { "solved" } else { "partial" }
    );
    println!("{}", puzzle.board());
    Ok(())
}

fn run_display(path: Option<&Path>, rotate: bool, config: &SolverConfig) -> Result<(), CliError> {
    let mut puzzle = open_puzzle(path)?;
    let selection = puzzle.selection();
    let mut frames = Vec::new();
    let mut last_frame = 0;

    let outcome = solve_puzzle(
        &mut puzzle,
        rotations_for(rotate, config),
        config,
        |bench, frame| {
            BoardFrame::record(&mut frames, bench, &selection, frame);
            last_frame = frame;
        },
    );
    BoardFrame::finish(&mut frames, &puzzle.workbench, &selection, last_frame);

    println!("{outcome}: {} frames recorded", frames.len());
    println!("Controls: Left/Right step through frames, Up/Down lift upgrades, R reset");
    visualization::display(frames, outcome);
    Ok(())
}

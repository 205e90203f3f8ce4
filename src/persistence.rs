//! File I/O for puzzle definitions and solved layouts.
//!
//! Puzzle files are TOML:
//! - `gear`: optional `{ id, kind = "equipment" | "character" }`
//! - `[grid] rows`: one string per row, '.' for an enabled cell, 'x' for a disabled one
//! - `[[upgrade]]`: `name`, `rarity`, `pattern` rows ('#' enabled, '.' empty),
//!   optional `selected` (default true) and `equipped = { carrier, x, y, rotation }`
//!   for upgrades already on the grid
//!
//! Layout files store the committed anchors and rotations as `[[placement]]`
//! tables, with a rendered board written alongside as `.txt`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{PersistenceError, PuzzleError};
use crate::grid::{format_board, EquipGrid, GridMap, CELL_DISABLED, CELL_FREE, PATTERN_EMPTY, PATTERN_ENABLED};
use crate::session::SolveSession;
use crate::upgrades::{solve_order, Carrier, GearKind, Pattern, Rarity, Upgrade, UpgradeId};
use crate::workbench::Workbench;
use crate::EquipSlots;

/// The puzzle solved when no file is given.
pub const DEMO_PUZZLE: &str = include_str!("../puzzles/demo.toml");

#[derive(Deserialize, Debug)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PuzzleFile {
    #[serde(default)]
    gear: GearSection,
    grid: GridSection,
    #[serde(default, rename = "upgrade")]
    upgrades: Vec<UpgradeSection>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct GearSection {
    #[serde(default)]
    id: u32,
    #[serde(default)]
    kind: GearKind,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct GridSection {
    rows: Vec<String>,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct UpgradeSection {
    name: String,
    rarity: Rarity,
    pattern: Vec<String>,
    #[serde(default = "selected_by_default")]
    selected: bool,
    #[serde(default)]
    equipped: Option<EquippedSection>,
}

fn selected_by_default() -> bool {
    true
}

#[derive(Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum EquipOwner {
    #[default]
    Gear,
    Global,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct EquippedSection {
    #[serde(default)]
    carrier: EquipOwner,
    x: i32,
    y: i32,
    #[serde(default)]
    rotation: u8,
}

/// A loaded puzzle: the gear's grid, its upgrades and the player's selection.
#[derive(Debug, Clone)]
pub struct Puzzle {
    pub carrier: Carrier,
    pub workbench: Workbench,
    /// Every upgrade defined in the file, in file order.
    pub upgrades: Vec<Upgrade>,
    selected: Vec<UpgradeId>,
}

impl Puzzle {
    /// Selected upgrades in solve order.
    pub fn selection(&self) -> Vec<Upgrade> {
        let mut selection: Vec<Upgrade> = self
            .upgrades
            .iter()
            .filter(|u| self.selected.contains(&u.id()))
            .cloned()
            .collect();
        solve_order(&mut selection);
        selection
    }

    pub fn find(&self, name: &str) -> Option<&Upgrade> {
        self.upgrades.iter().find(|u| u.name() == name)
    }

    /// Renders the grid, numbering upgrades by their position in the selection.
    pub fn board(&self) -> String {
        format_board(self.workbench.grid(), &self.selection())
    }
}

/// Checks that every character of `row` is one of `allowed`.
fn check_row(row: &str, allowed: [char; 2], context: impl Fn() -> String) -> Result<(), PuzzleError> {
    match row.chars().find(|c| !allowed.contains(c)) {
        Some(found) => Err(PuzzleError::InvalidCharacter {
            context: context(),
            found,
        }),
        None => Ok(()),
    }
}

fn build_grid(rows: &[String]) -> Result<EquipGrid, PuzzleError> {
    if rows.first().map_or(true, |row| row.is_empty()) {
        return Err(PuzzleError::EmptyGrid);
    }
    let width = rows[0].chars().count();
    for (i, row) in rows.iter().enumerate() {
        check_row(row, [CELL_FREE, CELL_DISABLED], || format!("grid row {i}"))?;
        if row.chars().count() != width {
            return Err(PuzzleError::RaggedGrid { row: i });
        }
    }
    let layout = GridMap::from_rows(rows, CELL_FREE).ok_or(PuzzleError::RaggedGrid { row: 0 })?;
    Ok(EquipGrid::from_layout(&layout))
}

fn build_pattern(name: &str, rows: &[String]) -> Result<Pattern, PuzzleError> {
    for row in rows {
        check_row(row, [PATTERN_ENABLED, PATTERN_EMPTY], || {
            format!("pattern of '{name}'")
        })?;
    }
    let map = GridMap::from_rows(rows, PATTERN_ENABLED).ok_or_else(|| PuzzleError::RaggedPattern {
        name: name.to_string(),
    })?;
    if map.enabled_count() == 0 {
        return Err(PuzzleError::EmptyPattern {
            name: name.to_string(),
        });
    }
    Ok(Pattern::new(map))
}

fn build_puzzle(file: PuzzleFile) -> Result<Puzzle, PuzzleError> {
    let carrier = Carrier::Gear {
        id: file.gear.id,
        kind: file.gear.kind,
    };
    let mut workbench = Workbench::new(build_grid(&file.grid.rows)?);

    let mut upgrades: Vec<Upgrade> = Vec::with_capacity(file.upgrades.len());
    let mut selected = Vec::new();
    for (i, section) in file.upgrades.into_iter().enumerate() {
        if upgrades.iter().any(|u| u.name() == section.name) {
            return Err(PuzzleError::DuplicateName { name: section.name });
        }
        let pattern = build_pattern(&section.name, &section.pattern)?;
        let upgrade = Upgrade::new(UpgradeId(i as u32), section.name, section.rarity, pattern);

        if let Some(equipped) = section.equipped {
            let owner = match equipped.carrier {
                EquipOwner::Gear => carrier,
                EquipOwner::Global => Carrier::Global,
            };
            if !workbench.place(owner, &upgrade, equipped.x, equipped.y, equipped.rotation) {
                return Err(PuzzleError::EquipRejected {
                    name: upgrade.name().to_string(),
                    x: equipped.x,
                    y: equipped.y,
                    rotation: equipped.rotation,
                });
            }
        }
        if section.selected {
            selected.push(upgrade.id());
        }
        upgrades.push(upgrade);
    }
    workbench.reset_stats();

    Ok(Puzzle {
        carrier,
        workbench,
        upgrades,
        selected,
    })
}

/// Parses a puzzle definition from TOML text.
pub fn parse_puzzle(content: &str) -> Result<Puzzle, PuzzleError> {
    let file: PuzzleFile =
        toml::from_str(content).map_err(|e| PuzzleError::Syntax(e.message().to_string()))?;
    build_puzzle(file)
}

/// Loads a puzzle definition from disk.
pub fn load_puzzle(path: &Path) -> Result<Puzzle, PersistenceError> {
    let content = fs::read_to_string(path).map_err(|source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let file: PuzzleFile = toml::from_str(&content).map_err(|source| PersistenceError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let puzzle = build_puzzle(file)?;
    info!(
        path = %path.display(),
        upgrades = puzzle.upgrades.len(),
        selected = puzzle.selected.len(),
        "loaded puzzle"
    );
    Ok(puzzle)
}

/// One committed upgrade in a saved layout.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LayoutEntry {
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub rotation: u8,
}

/// A saved solve result.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Layout {
    pub solved: bool,
    #[serde(default, rename = "placement")]
    pub placements: Vec<LayoutEntry>,
}

impl Layout {
    /// Records the upgrades the puzzle's gear currently has committed.
    pub fn capture(puzzle: &Puzzle, solved: bool) -> Self {
        let placements = puzzle
            .workbench
            .placements()
            .filter(|(_, p)| p.carrier == puzzle.carrier)
            .filter_map(|(id, p)| {
                let upgrade = puzzle.upgrades.iter().find(|u| u.id() == id)?;
                Some(LayoutEntry {
                    name: upgrade.name().to_string(),
                    x: p.anchor.0,
                    y: p.anchor.1,
                    rotation: p.rotation,
                })
            })
            .collect();
        Self { solved, placements }
    }
}

/// Path of the rendered board written next to a layout file.
pub fn board_path(layout_path: &Path) -> PathBuf {
    layout_path.with_extension("txt")
}

/// Saves a layout as TOML plus a rendered board next to it.
pub fn save_layout(path: &Path, layout: &Layout, board: &str) -> Result<(), PersistenceError> {
    let io_error = |path: &Path| {
        let path = path.to_path_buf();
        move |source| PersistenceError::Io { path, source }
    };

    let content = toml::to_string_pretty(layout)?;
    fs::write(path, content).map_err(io_error(path))?;

    let board_file = board_path(path);
    let header = if layout.solved {
        "Found a solution:"
    } else {
        "No solution:"
    };
    fs::write(&board_file, format!("{header}\n{board}")).map_err(io_error(&board_file))?;

    debug!(path = %path.display(), placements = layout.placements.len(), "saved layout");
    Ok(())
}

/// Loads a layout saved by [`save_layout`].
pub fn load_layout(path: &Path) -> Result<Layout, PersistenceError> {
    let content = fs::read_to_string(path).map_err(|source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| PersistenceError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Clears the puzzle's grid and re-commits a saved layout on it.
pub fn apply_layout(puzzle: &mut Puzzle, layout: &Layout) -> Result<(), PuzzleError> {
    SolveSession::new(puzzle.carrier, 1).clear_slots(&mut puzzle.workbench);

    for entry in &layout.placements {
        let upgrade = puzzle
            .find(&entry.name)
            .cloned()
            .ok_or_else(|| PuzzleError::UnknownUpgrade {
                name: entry.name.clone(),
            })?;
        if !puzzle
            .workbench
            .place(puzzle.carrier, &upgrade, entry.x, entry.y, entry.rotation)
        {
            return Err(PuzzleError::EquipRejected {
                name: entry.name.clone(),
                x: entry.x,
                y: entry.y,
                rotation: entry.rotation,
            });
        }
    }
    Ok(())
}

//! Grid representations for patterns and equip slots.
//!
//! Two grids share the same row-major layout:
//! - [`GridMap`] is a local shape: a width, a height and one enabled flag per
//!   node. Patterns and their rotations are stored this way.
//! - [`EquipGrid`] is the physical grid attached to a piece of gear. Each
//!   [`Cell`] additionally carries its coordinates and the upgrade occupying it.
//!
//! Columns use the odd-q hex layout: odd columns sit half a cell lower than
//! even columns. Storage and translation are plain `(x, y)` offsets.

use crate::upgrades::{Upgrade, UpgradeId};

/// Character for an enabled node in a pattern row.
pub const PATTERN_ENABLED: char = '#';
/// Character for an empty node in a pattern row.
pub const PATTERN_EMPTY: char = '.';
/// Character for an enabled, free cell in a grid row or a rendered board.
pub const CELL_FREE: char = '.';
/// Character for a disabled cell in a grid row or a rendered board.
pub const CELL_DISABLED: char = 'x';

/// An immutable rectangular map of enabled flags.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GridMap {
    width: usize,
    height: usize,
    nodes: Vec<bool>,
}

impl GridMap {
    /// Creates a map from row-major node flags.
    ///
    /// Returns `None` if `nodes.len()` does not equal `width * height`.
    pub fn new(width: usize, height: usize, nodes: Vec<bool>) -> Option<Self> {
        (nodes.len() == width * height).then_some(Self {
            width,
            height,
            nodes,
        })
    }

    /// Creates a map from text rows, treating `enabled` as an enabled node and
    /// anything else as disabled.
    ///
    /// Returns `None` for ragged rows.
    pub fn from_rows<S: AsRef<str>>(rows: &[S], enabled: char) -> Option<Self> {
        let width = rows.first().map_or(0, |row| row.as_ref().chars().count());
        let mut nodes = Vec::with_capacity(width * rows.len());
        for row in rows {
            let row = row.as_ref();
            if row.chars().count() != width {
                return None;
            }
            nodes.extend(row.chars().map(|c| c == enabled));
        }
        Self::new(width, rows.len(), nodes)
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the node flag at `(x, y)`, or `None` outside the map.
    #[inline]
    pub fn node(&self, x: i32, y: i32) -> Option<bool> {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return None;
        }
        Some(self.nodes[y as usize * self.width + x as usize])
    }

    /// Returns true if the node at `(x, y)` exists and is enabled.
    #[inline]
    pub fn is_enabled(&self, x: i32, y: i32) -> bool {
        self.node(x, y) == Some(true)
    }

    /// Iterates the coordinates of all enabled nodes in row-major order.
    pub fn enabled_cells(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, &enabled)| enabled)
            .map(|(i, _)| ((i % self.width) as i32, (i / self.width) as i32))
    }

    /// Number of enabled nodes.
    pub fn enabled_count(&self) -> usize {
        self.nodes.iter().filter(|&&enabled| enabled).count()
    }
}

/// One cell of the physical equip grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
    /// Disabled cells exist in the grid but can never be occupied.
    pub enabled: bool,
    pub occupant: Option<UpgradeId>,
}

/// The physical grid attached to a carrier.
///
/// Occupancy is only changed through [`EquipGrid::occupy`] and
/// [`EquipGrid::release`]; validation lives with the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquipGrid {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl EquipGrid {
    /// Creates an empty grid from a layout map. Disabled nodes become disabled cells.
    pub fn from_layout(layout: &GridMap) -> Self {
        let mut cells = Vec::with_capacity(layout.width() * layout.height());
        for y in 0..layout.height() as i32 {
            for x in 0..layout.width() as i32 {
                cells.push(Cell {
                    x,
                    y,
                    enabled: layout.is_enabled(x, y),
                    occupant: None,
                });
            }
        }
        Self {
            width: layout.width(),
            height: layout.height(),
            cells,
        }
    }

    /// Creates a fully enabled grid.
    pub fn open(width: usize, height: usize) -> Self {
        let layout = GridMap {
            width,
            height,
            nodes: vec![true; width * height],
        };
        Self::from_layout(&layout)
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Total number of cells, enabled or not.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.width * self.height
    }

    #[inline]
    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return None;
        }
        Some(y as usize * self.width + x as usize)
    }

    /// Returns the cell at `(x, y)`, or `None` outside the grid.
    #[inline]
    pub fn cell_at(&self, x: i32, y: i32) -> Option<&Cell> {
        self.index(x, y).map(|i| &self.cells[i])
    }

    /// Returns true if `(x, y)` is an enabled, unoccupied cell.
    #[inline]
    pub fn is_free(&self, x: i32, y: i32) -> bool {
        self.cell_at(x, y)
            .is_some_and(|cell| cell.enabled && cell.occupant.is_none())
    }

    /// Marks the given cells as occupied by `upgrade`.
    ///
    /// Coordinates outside the grid are ignored.
    pub fn occupy(&mut self, cells: &[(i32, i32)], upgrade: UpgradeId) {
        for &(x, y) in cells {
            if let Some(i) = self.index(x, y) {
                self.cells[i].occupant = Some(upgrade);
            }
        }
    }

    /// Clears the given cells if they are occupied by `upgrade`.
    pub fn release(&mut self, cells: &[(i32, i32)], upgrade: UpgradeId) {
        for &(x, y) in cells {
            if let Some(i) = self.index(x, y) {
                if self.cells[i].occupant == Some(upgrade) {
                    self.cells[i].occupant = None;
                }
            }
        }
    }

    /// Iterates all cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter()
    }

    /// Number of occupied cells.
    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|c| c.occupant.is_some()).count()
    }

    /// Number of cells occupied by one upgrade.
    pub fn cells_of(&self, upgrade: UpgradeId) -> usize {
        self.cells
            .iter()
            .filter(|c| c.occupant == Some(upgrade))
            .count()
    }
}

/// Returns the display symbol for the upgrade at `position` in a listing.
///
/// Uses 1-9, then A-Z; anything further shows as '*'.
fn upgrade_symbol(position: usize) -> char {
    match position {
        0..=8 => char::from(b'1' + position as u8),
        9..=34 => char::from(b'A' + (position - 9) as u8),
        _ => '*',
    }
}

/// Formats a grid as text, one line per row.
///
/// Occupied cells show the symbol of their upgrade's position in `upgrades`;
/// occupants not in the list show as '?'.
pub fn format_board(grid: &EquipGrid, upgrades: &[Upgrade]) -> String {
    let mut output = String::with_capacity((grid.width() + 1) * grid.height());
    for y in 0..grid.height() as i32 {
        for x in 0..grid.width() as i32 {
            let display_char = match grid.cell_at(x, y) {
                Some(Cell {
                    occupant: Some(id), ..
                }) => upgrades
                    .iter()
                    .position(|u| u.id() == *id)
                    .map_or('?', upgrade_symbol),
                Some(Cell { enabled: true, .. }) => CELL_FREE,
                _ => CELL_DISABLED,
            };
            output.push(display_char);
        }
        output.push('\n');
    }
    output
}

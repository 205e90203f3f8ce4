//! Upgrade Solver Library
//!
//! Finds a non-overlapping placement of a chosen set of upgrades on a bounded
//! hex grid, trying up to six orientations per upgrade, and commits it.

pub mod config;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod persistence;
pub mod scheduler;
pub mod session;
pub mod solver;
pub mod upgrades;
pub mod workbench;

use grid::Cell;
use upgrades::{Carrier, Upgrade, UpgradeId};

pub use scheduler::FrameScheduler;
pub use session::{CancelPolicy, SolveOutcome, SolveSession, SolveTask, TaskState};
pub use workbench::Workbench;

/// The host surface the solver works against.
///
/// The host owns occupancy. The solver never mutates cells directly; every
/// change goes through [`EquipSlots::place`] and [`EquipSlots::unplace`].
pub trait EquipSlots {
    /// Physical grid width in cells.
    fn width(&self) -> usize;

    /// Physical grid height in cells.
    fn height(&self) -> usize;

    /// Returns the cell at `(x, y)`, or `None` outside the grid.
    fn cell_at(&self, x: i32, y: i32) -> Option<&Cell>;

    /// Atomically validates and commits a placement.
    ///
    /// Every enabled cell of `upgrade`'s pattern at `rotation`, translated by
    /// `(anchor_x, anchor_y)`, must be inside the grid, enabled and free. On
    /// success all of them become occupied by `upgrade`; on failure nothing
    /// changes and `false` is returned.
    fn place(
        &mut self,
        carrier: Carrier,
        upgrade: &Upgrade,
        anchor_x: i32,
        anchor_y: i32,
        rotation: u8,
    ) -> bool;

    /// Removes a committed placement.
    fn unplace(&mut self, carrier: Carrier, upgrade: UpgradeId);

    /// Upgrades currently attached to `carrier`.
    fn attached_upgrades(&self, carrier: Carrier) -> Vec<UpgradeId>;
}

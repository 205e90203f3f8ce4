//! In-memory equip host.
//!
//! [`Workbench`] owns an [`EquipGrid`] plus the placement records for every
//! carrier sharing it, and implements [`EquipSlots`] with atomic
//! validate-and-commit semantics.

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::grid::{Cell, EquipGrid};
use crate::upgrades::{Carrier, Upgrade, UpgradeId};
use crate::EquipSlots;

/// A committed placement of one upgrade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub carrier: Carrier,
    pub anchor: (i32, i32),
    pub rotation: u8,
    /// Absolute grid cells covered, in pattern row-major order.
    pub cells: Vec<(i32, i32)>,
}

/// Counters for host-side placement traffic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlacementStats {
    pub attempts: u64,
    pub commits: u64,
    pub removals: u64,
}

/// An equip grid with its placement records.
#[derive(Debug, Clone)]
pub struct Workbench {
    grid: EquipGrid,
    placements: FxHashMap<UpgradeId, Placement>,
    /// Placement order per upgrade, for stable attachment listings.
    order: Vec<UpgradeId>,
    stats: PlacementStats,
}

impl Workbench {
    pub fn new(grid: EquipGrid) -> Self {
        Self {
            grid,
            placements: FxHashMap::default(),
            order: Vec::new(),
            stats: PlacementStats::default(),
        }
    }

    #[inline]
    pub fn grid(&self) -> &EquipGrid {
        &self.grid
    }

    pub fn stats(&self) -> PlacementStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = PlacementStats::default();
    }

    pub fn placement(&self, upgrade: UpgradeId) -> Option<&Placement> {
        self.placements.get(&upgrade)
    }

    /// Iterates placements in the order they were committed.
    pub fn placements(&self) -> impl Iterator<Item = (UpgradeId, &Placement)> {
        self.order
            .iter()
            .filter_map(|id| self.placements.get(id).map(|p| (*id, p)))
    }

    /// Computes the absolute cells a placement would cover, if all are free.
    fn free_footprint(
        &self,
        upgrade: &Upgrade,
        anchor_x: i32,
        anchor_y: i32,
        rotation: u8,
    ) -> Option<Vec<(i32, i32)>> {
        let shape = upgrade.pattern().rotated(rotation);
        let mut cells = Vec::with_capacity(shape.enabled_count());
        for (local_x, local_y) in shape.enabled_cells() {
            let (x, y) = (anchor_x + local_x, anchor_y + local_y);
            if !self.grid.is_free(x, y) {
                return None;
            }
            cells.push((x, y));
        }
        Some(cells)
    }
}

impl EquipSlots for Workbench {
    fn width(&self) -> usize {
        self.grid.width()
    }

    fn height(&self) -> usize {
        self.grid.height()
    }

    fn cell_at(&self, x: i32, y: i32) -> Option<&Cell> {
        self.grid.cell_at(x, y)
    }

    fn place(
        &mut self,
        carrier: Carrier,
        upgrade: &Upgrade,
        anchor_x: i32,
        anchor_y: i32,
        rotation: u8,
    ) -> bool {
        self.stats.attempts += 1;

        if self.placements.contains_key(&upgrade.id()) {
            return false;
        }
        let Some(cells) = self.free_footprint(upgrade, anchor_x, anchor_y, rotation) else {
            return false;
        };

        self.grid.occupy(&cells, upgrade.id());
        self.placements.insert(
            upgrade.id(),
            Placement {
                carrier,
                anchor: (anchor_x, anchor_y),
                rotation,
                cells,
            },
        );
        self.order.push(upgrade.id());
        self.stats.commits += 1;
        trace!(upgrade = %upgrade, anchor_x, anchor_y, rotation, "placed");
        true
    }

    fn unplace(&mut self, carrier: Carrier, upgrade: UpgradeId) {
        match self.placements.get(&upgrade) {
            Some(placement) if placement.carrier == carrier => {}
            _ => return,
        }
        if let Some(placement) = self.placements.remove(&upgrade) {
            self.grid.release(&placement.cells, upgrade);
            self.order.retain(|id| *id != upgrade);
            self.stats.removals += 1;
            trace!(%upgrade, "unplaced");
        }
    }

    fn attached_upgrades(&self, carrier: Carrier) -> Vec<UpgradeId> {
        self.placements()
            .filter(|(_, p)| p.carrier == carrier)
            .map(|(id, _)| id)
            .collect()
    }
}

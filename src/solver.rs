//! Backtracking placement search.
//!
//! Key points:
//! - Candidates are enumerated row-major over target cells, then by rotation;
//!   this order decides which solution is found first
//! - The search is an explicit stack of frames, so it can be suspended after
//!   any step and resumed later
//! - Every commit is recorded in an undo log; backtracking pops it and calls
//!   the host's unplace, keeping commit and rollback symmetric
//! - Anchor offsets are cached per (upgrade id, rotation) for the lifetime of
//!   one search

use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::geometry::{anchor_base_offset, NUM_ROTATIONS};
use crate::upgrades::{Carrier, Upgrade, UpgradeId};
use crate::EquipSlots;

/// Lazily populated anchor offsets keyed by upgrade identity and rotation.
///
/// Two upgrades sharing an identical pattern still get separate entries.
#[derive(Debug, Default)]
pub struct AnchorOffsetCache {
    base_offsets: FxHashMap<(UpgradeId, u8), (i32, i32)>,
}

impl AnchorOffsetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the anchor that centers `upgrade` at `rotation` over `target`.
    ///
    /// Affine in `target`: only the cell-independent base offset is cached.
    pub fn offset_for(&mut self, upgrade: &Upgrade, rotation: u8, target: (i32, i32)) -> (i32, i32) {
        let (base_x, base_y) = *self
            .base_offsets
            .entry((upgrade.id(), rotation))
            .or_insert_with(|| anchor_base_offset(upgrade.pattern().rotated(rotation)));
        (target.0 + base_x, target.1 + base_y)
    }

    /// Number of (upgrade, rotation) pairs computed so far.
    pub fn len(&self) -> usize {
        self.base_offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.base_offsets.is_empty()
    }
}

/// Necessary condition for a placement to exist: the upgrades' total cell
/// count must not exceed the grid's cell count.
///
/// Rotation-invariant, so no orientation needs to be chosen.
pub fn can_fit_all(upgrades: &[Upgrade], width: usize, height: usize) -> bool {
    required_cells(upgrades) <= width * height
}

/// Total enabled cells over all upgrades.
pub fn required_cells(upgrades: &[Upgrade]) -> usize {
    upgrades.iter().map(|u| u.pattern().enabled_cell_count()).sum()
}

/// The next candidate to try within a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Candidate {
    y: i32,
    x: i32,
    rotation: u8,
}

impl Candidate {
    const FIRST: Self = Self {
        y: 0,
        x: 0,
        rotation: 0,
    };

    /// Advances rotation fastest, then column, then row.
    #[inline]
    fn advance(&mut self, width: i32, max_rotations: u8) {
        self.rotation += 1;
        if self.rotation < max_rotations {
            return;
        }
        self.rotation = 0;
        self.x += 1;
        if self.x < width {
            return;
        }
        self.x = 0;
        self.y += 1;
    }
}

/// One level of the search tree.
#[derive(Debug, Clone, Copy)]
struct SearchFrame {
    /// Index of the upgrade this frame is placing.
    index: usize,
    cursor: Candidate,
}

/// A placement committed by the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Commit {
    pub upgrade: UpgradeId,
    pub anchor: (i32, i32),
    pub rotation: u8,
}

/// Stack of commits made by the search, most recent last.
#[derive(Debug, Default)]
pub struct UndoLog {
    commits: Vec<Commit>,
}

impl UndoLog {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            commits: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    fn push(&mut self, commit: Commit) {
        self.commits.push(commit);
    }

    #[inline]
    fn pop(&mut self) -> Option<Commit> {
        self.commits.pop()
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    /// Commits currently standing, oldest first.
    pub fn commits(&self) -> &[Commit] {
        &self.commits
    }

    /// Unplaces every recorded commit in reverse order and empties the log.
    ///
    /// Returns the number of commits undone.
    pub fn rollback<S: EquipSlots>(&mut self, slots: &mut S, carrier: Carrier) -> usize {
        let undone = self.commits.len();
        while let Some(commit) = self.commits.pop() {
            slots.unplace(carrier, commit.upgrade);
        }
        undone
    }
}

/// Result of a single search step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStatus {
    /// More steps are needed.
    Running,
    /// Every upgrade is placed; the commits stay on the grid.
    Found,
    /// No complete placement exists; every commit has been undone.
    Exhausted,
}

/// Counters describing search effort.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub steps: u64,
    pub attempts: u64,
    pub commits: u64,
    pub backtracks: u64,
}

/// A resumable depth-first placement search.
///
/// Each call to [`Search::step`] performs one recursive step: it either
/// commits a candidate and descends, exhausts the current level and
/// backtracks, or reaches full depth.
#[derive(Debug)]
pub struct Search {
    upgrades: Vec<Upgrade>,
    carrier: Carrier,
    max_rotations: u8,
    cache: AnchorOffsetCache,
    frames: Vec<SearchFrame>,
    undo: UndoLog,
    status: SearchStatus,
    stats: SearchStats,
}

impl Search {
    /// Creates a search over `upgrades` in the given order.
    ///
    /// `max_rotations` is clamped to `1..=6`.
    pub fn new(upgrades: Vec<Upgrade>, carrier: Carrier, max_rotations: u8) -> Self {
        let depth = upgrades.len();
        let mut frames = Vec::with_capacity(depth + 1);
        frames.push(SearchFrame {
            index: 0,
            cursor: Candidate::FIRST,
        });
        Self {
            upgrades,
            carrier,
            max_rotations: max_rotations.clamp(1, NUM_ROTATIONS),
            cache: AnchorOffsetCache::new(),
            frames,
            undo: UndoLog::with_capacity(depth),
            status: SearchStatus::Running,
            stats: SearchStats::default(),
        }
    }

    pub fn status(&self) -> SearchStatus {
        self.status
    }

    pub fn stats(&self) -> SearchStats {
        self.stats
    }

    pub fn cache(&self) -> &AnchorOffsetCache {
        &self.cache
    }

    pub fn undo_log(&self) -> &UndoLog {
        &self.undo
    }

    pub fn carrier(&self) -> Carrier {
        self.carrier
    }

    /// Current search depth (number of upgrades committed).
    pub fn depth(&self) -> usize {
        self.undo.len()
    }

    /// Performs one recursive step.
    pub fn step<S: EquipSlots>(&mut self, slots: &mut S) -> SearchStatus {
        if self.status != SearchStatus::Running {
            return self.status;
        }
        self.stats.steps += 1;

        let Self {
            upgrades,
            carrier,
            max_rotations,
            cache,
            frames,
            undo,
            stats,
            ..
        } = self;

        let Some(frame) = frames.last_mut() else {
            self.status = SearchStatus::Exhausted;
            return self.status;
        };

        if frame.index >= upgrades.len() {
            frames.clear();
            debug!(placed = undo.len(), "all upgrades placed");
            self.status = SearchStatus::Found;
            return self.status;
        }

        let upgrade = &upgrades[frame.index];
        let width = slots.width() as i32;
        let height = slots.height() as i32;

        while frame.cursor.y < height {
            let candidate = frame.cursor;
            frame.cursor.advance(width, *max_rotations);

            let target = match slots.cell_at(candidate.x, candidate.y) {
                Some(cell) if cell.occupant.is_none() => (cell.x, cell.y),
                _ => continue,
            };

            let (anchor_x, anchor_y) = cache.offset_for(upgrade, candidate.rotation, target);
            stats.attempts += 1;
            if !slots.place(*carrier, upgrade, anchor_x, anchor_y, candidate.rotation) {
                continue;
            }

            stats.commits += 1;
            trace!(
                upgrade = %upgrade,
                depth = frame.index,
                anchor_x,
                anchor_y,
                rotation = candidate.rotation,
                "committed"
            );
            undo.push(Commit {
                upgrade: upgrade.id(),
                anchor: (anchor_x, anchor_y),
                rotation: candidate.rotation,
            });
            let index = frame.index + 1;
            frames.push(SearchFrame {
                index,
                cursor: Candidate::FIRST,
            });
            return SearchStatus::Running;
        }

        // level exhausted: drop it and undo the parent's commit
        frames.pop();
        if let Some(commit) = undo.pop() {
            slots.unplace(*carrier, commit.upgrade);
            stats.backtracks += 1;
            trace!(upgrade = %commit.upgrade, "backtracked");
        }
        if frames.is_empty() {
            debug!(steps = stats.steps, "search exhausted");
            self.status = SearchStatus::Exhausted;
        }
        self.status
    }

    /// Steps until the search finishes.
    pub fn run<S: EquipSlots>(&mut self, slots: &mut S) -> SearchStatus {
        while self.step(slots) == SearchStatus::Running {}
        self.status
    }

    /// Undoes every standing commit. Used when a running search is abandoned.
    pub fn rollback<S: EquipSlots>(&mut self, slots: &mut S) -> usize {
        self.frames.clear();
        self.undo.rollback(slots, self.carrier)
    }
}

/// Runs a complete search synchronously.
///
/// Returns true if every upgrade was placed; the placement is left committed.
/// On false the grid is back in the state it was in before the call.
pub fn solve<S: EquipSlots>(
    upgrades: Vec<Upgrade>,
    slots: &mut S,
    carrier: Carrier,
    max_rotations: u8,
) -> bool {
    Search::new(upgrades, carrier, max_rotations).run(slots) == SearchStatus::Found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Cell, EquipGrid, GridMap, CELL_FREE, PATTERN_ENABLED};
    use crate::upgrades::{GearKind, Pattern, Rarity};
    use crate::workbench::Workbench;

    const GEAR: Carrier = Carrier::Gear {
        id: 7,
        kind: GearKind::Equipment,
    };

    fn upgrade(id: u32, rows: &[&str]) -> Upgrade {
        let map = GridMap::from_rows(rows, PATTERN_ENABLED).unwrap();
        Upgrade::new(UpgradeId(id), format!("U{id}"), Rarity::Common, Pattern::new(map))
    }

    /// Wraps a workbench and records every `(anchor_x, anchor_y, rotation)` passed to `place`.
    struct RecordingSlots {
        inner: Workbench,
        attempts: Vec<(i32, i32, u8)>,
    }

    impl RecordingSlots {
        fn open(width: usize, height: usize) -> Self {
            Self {
                inner: Workbench::new(EquipGrid::open(width, height)),
                attempts: Vec::new(),
            }
        }

        fn rotations(&self) -> impl Iterator<Item = u8> + '_ {
            self.attempts.iter().map(|&(_, _, rotation)| rotation)
        }
    }

    impl EquipSlots for RecordingSlots {
        fn width(&self) -> usize {
            self.inner.width()
        }
        fn height(&self) -> usize {
            self.inner.height()
        }
        fn cell_at(&self, x: i32, y: i32) -> Option<&Cell> {
            self.inner.cell_at(x, y)
        }
        fn place(&mut self, carrier: Carrier, upgrade: &Upgrade, x: i32, y: i32, rotation: u8) -> bool {
            self.attempts.push((x, y, rotation));
            self.inner.place(carrier, upgrade, x, y, rotation)
        }
        fn unplace(&mut self, carrier: Carrier, upgrade: UpgradeId) {
            self.inner.unplace(carrier, upgrade)
        }
        fn attached_upgrades(&self, carrier: Carrier) -> Vec<UpgradeId> {
            self.inner.attached_upgrades(carrier)
        }
    }

    #[test]
    fn test_can_fit_all_compares_against_capacity() {
        let upgrades = vec![upgrade(0, &["###"]), upgrade(1, &["##", "#."])];
        assert!(can_fit_all(&upgrades, 3, 2));
        assert!(!can_fit_all(&upgrades, 5, 1));
        assert!(can_fit_all(&[], 0, 0));
        assert_eq!(required_cells(&upgrades), 6);
    }

    #[test]
    fn test_offset_is_affine_in_target() {
        let mut cache = AnchorOffsetCache::new();
        let u = upgrade(0, &["###", ".#."]);
        for rotation in 0..NUM_ROTATIONS {
            let a = cache.offset_for(&u, rotation, (5, 2));
            let b = cache.offset_for(&u, rotation, (1, 7));
            assert_eq!((a.0 - b.0, a.1 - b.1), (4, -5), "rotation {rotation}");
        }
        assert_eq!(cache.len(), NUM_ROTATIONS as usize);
    }

    #[test]
    fn test_cache_is_keyed_by_upgrade_not_pattern() {
        let mut cache = AnchorOffsetCache::new();
        let first = upgrade(0, &["##", "##"]);
        let second = upgrade(1, &["##", "##"]);
        assert_eq!(cache.offset_for(&first, 0, (3, 3)), (2, 2));
        assert_eq!(cache.offset_for(&first, 0, (4, 4)), (3, 3));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.offset_for(&second, 0, (3, 3)), (2, 2));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_two_halves_tile_square_grid() {
        let mut bench = Workbench::new(EquipGrid::open(4, 4));
        let top = upgrade(0, &["####", "####"]);
        let bottom = upgrade(1, &["####", "####"]);

        assert!(solve(vec![top.clone(), bottom.clone()], &mut bench, GEAR, 1));
        assert_eq!(bench.grid().occupied_count(), 16);
        assert_eq!(bench.grid().cells_of(top.id()), 8);
        assert_eq!(bench.grid().cells_of(bottom.id()), 8);
        assert_eq!(bench.placement(top.id()).unwrap().anchor, (0, 0));
        assert_eq!(bench.placement(bottom.id()).unwrap().anchor, (0, 2));
    }

    #[test]
    fn test_single_slot_for_two_upgrades_backtracks_to_empty() {
        let layout = GridMap::from_rows(&["..x", "..x", "xxx"], CELL_FREE).unwrap();
        let mut bench = Workbench::new(EquipGrid::from_layout(&layout));
        let upgrades = vec![upgrade(0, &["##", "##"]), upgrade(1, &["##", "##"])];
        assert!(can_fit_all(&upgrades, 3, 3));

        let mut search = Search::new(upgrades, GEAR, 1);
        assert_eq!(search.run(&mut bench), SearchStatus::Exhausted);
        assert_eq!(bench.grid().occupied_count(), 0);
        assert!(search.undo_log().is_empty());
        // the first upgrade fit once and was taken back
        assert_eq!(search.stats().commits, 1);
        assert_eq!(search.stats().backtracks, 1);
        assert_eq!(bench.stats().removals, 1);
    }

    #[test]
    fn test_single_cell_slot_with_all_rotations() {
        let layout = GridMap::from_rows(&[".x"], CELL_FREE).unwrap();
        let mut bench = Workbench::new(EquipGrid::from_layout(&layout));
        let upgrades = vec![upgrade(0, &["#"]), upgrade(1, &["#"])];

        assert!(!solve(upgrades, &mut bench, GEAR, NUM_ROTATIONS));
        assert_eq!(bench.grid().occupied_count(), 0);
    }

    #[test]
    fn test_single_rotation_never_tries_others() {
        let mut slots = RecordingSlots::open(3, 3);
        let upgrades = vec![upgrade(0, &["###"]), upgrade(1, &["#", "#"]), upgrade(2, &["##"])];
        solve(upgrades, &mut slots, GEAR, 1);
        assert!(!slots.attempts.is_empty());
        assert!(slots.rotations().all(|r| r == 0));
    }

    #[test]
    fn test_full_rotation_tries_every_orientation() {
        let mut slots = RecordingSlots::open(1, 2);
        // a horizontal pair only fits a single column once turned
        let bar = upgrade(0, &["##"]);
        assert!(solve(vec![bar.clone()], &mut slots, GEAR, NUM_ROTATIONS));
        assert_ne!(slots.inner.placement(bar.id()).unwrap().rotation, 0);
        assert_eq!(slots.rotations().collect::<Vec<_>>(), [0, 1]);
    }

    #[test]
    fn test_candidates_run_rotation_then_column_then_row() {
        let mut slots = RecordingSlots::open(3, 3);
        let bar = upgrade(0, &["#", "#", "#"]);
        let mut search = Search::new(vec![bar.clone()], GEAR, NUM_ROTATIONS);

        assert_eq!(search.run(&mut slots), SearchStatus::Found);
        assert_eq!(search.status(), SearchStatus::Found);
        assert_eq!(search.carrier(), GEAR);
        // row 0 is tried in full, every rotation per column, before row 1
        assert_eq!(
            slots.attempts,
            [
                (0, -1, 0),
                (-1, -1, 1),
                (-1, -1, 2),
                (0, -1, 3),
                (-1, -1, 4),
                (-1, -1, 5),
                (1, -1, 0),
                (0, -1, 1),
                (0, -1, 2),
                (1, -1, 3),
                (0, -1, 4),
                (0, -1, 5),
                (2, -1, 0),
                (1, -1, 1),
                (1, -1, 2),
                (2, -1, 3),
                (1, -1, 4),
                (1, -1, 5),
                (0, 0, 0),
            ]
        );
        assert_eq!(
            search.undo_log().commits(),
            [Commit {
                upgrade: bar.id(),
                anchor: (0, 0),
                rotation: 0,
            }]
        );
        // one entry per rotation, however many cells were visited
        assert_eq!(search.cache().len(), NUM_ROTATIONS as usize);
        assert_eq!(search.stats().attempts, 19);
    }

    #[test]
    fn test_step_suspends_after_each_commit() {
        let mut bench = Workbench::new(EquipGrid::open(4, 4));
        let upgrades = vec![upgrade(0, &["####", "####"]), upgrade(1, &["####", "####"])];
        let mut search = Search::new(upgrades, GEAR, 1);

        assert_eq!(search.step(&mut bench), SearchStatus::Running);
        assert_eq!(search.depth(), 1);
        assert_eq!(bench.grid().occupied_count(), 8);

        assert_eq!(search.step(&mut bench), SearchStatus::Running);
        assert_eq!(search.depth(), 2);

        assert_eq!(search.step(&mut bench), SearchStatus::Found);
        assert_eq!(search.step(&mut bench), SearchStatus::Found);
        assert_eq!(search.stats().steps, 3);
    }

    #[test]
    fn test_rollback_restores_baseline() {
        let mut bench = Workbench::new(EquipGrid::open(4, 4));
        let upgrades = vec![upgrade(0, &["####", "####"]), upgrade(1, &["####", "####"])];
        let mut search = Search::new(upgrades, GEAR, 1);
        search.step(&mut bench);
        search.step(&mut bench);
        assert_eq!(bench.grid().occupied_count(), 16);

        assert_eq!(search.rollback(&mut bench), 2);
        assert_eq!(bench.grid().occupied_count(), 0);
    }

    #[test]
    fn test_empty_upgrade_list_is_found_immediately() {
        let mut bench = Workbench::new(EquipGrid::open(2, 2));
        let mut search = Search::new(Vec::new(), GEAR, 6);
        assert_eq!(search.step(&mut bench), SearchStatus::Found);
        assert_eq!(bench.stats().attempts, 0);
    }

    #[test]
    fn test_solution_is_disjoint_and_matches_patterns() {
        let mut bench = Workbench::new(EquipGrid::open(5, 4));
        let upgrades = vec![
            upgrade(0, &["##", "##"]),
            upgrade(1, &["###"]),
            upgrade(2, &["#", "#", "#"]),
            upgrade(3, &[".#", "##"]),
        ];
        assert!(solve(upgrades.clone(), &mut bench, GEAR, NUM_ROTATIONS));

        let mut seen = std::collections::HashSet::new();
        for u in &upgrades {
            let placement = bench.placement(u.id()).unwrap();
            assert!(placement.rotation < NUM_ROTATIONS);
            let expected: Vec<_> = u
                .pattern()
                .rotated(placement.rotation)
                .enabled_cells()
                .map(|(x, y)| (x + placement.anchor.0, y + placement.anchor.1))
                .collect();
            assert_eq!(placement.cells, expected);
            for &(x, y) in &placement.cells {
                assert!(bench.grid().cell_at(x, y).is_some());
                assert!(seen.insert((x, y)), "cell ({x},{y}) used twice");
            }
        }
    }
}

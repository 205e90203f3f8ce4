//! Solve sessions: reset, feasibility check, then a stepwise search.
//!
//! A [`SolveSession`] is created per solve request. [`SolveSession::try_solve`]
//! clears the carrier's grid, runs the feasibility check and hands back a
//! [`SolveTask`] that the caller advances one step at a time, typically from a
//! per-frame scheduler. The task owns the search (and with it the anchor
//! offset cache); dropping or cancelling it ends the session.

use std::fmt;

use tracing::{info, instrument, warn};

use crate::geometry::NUM_ROTATIONS;
use crate::solver::{can_fit_all, required_cells, Search, SearchStats, SearchStatus};
use crate::upgrades::{Carrier, Upgrade};
use crate::EquipSlots;

/// Completion callback; receives true if every upgrade was placed.
pub type CompletionCallback = Box<dyn FnOnce(bool)>;

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveOutcome {
    /// Every upgrade is placed and the placement is committed.
    Solved,
    /// The upgrades need more cells than the grid has; nothing was searched.
    InfeasibleByCount,
    /// The search exhausted every candidate; the grid is back at the cleared baseline.
    NoPlacementFound,
    /// Stopped from outside before finishing. The completion callback is not run.
    Aborted,
}

impl SolveOutcome {
    pub fn is_success(self) -> bool {
        self == SolveOutcome::Solved
    }
}

impl fmt::Display for SolveOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveOutcome::Solved => write!(f, "Found a solution"),
            SolveOutcome::InfeasibleByCount => write!(f, "No solution: not enough cells"),
            SolveOutcome::NoPlacementFound => write!(f, "No solution"),
            SolveOutcome::Aborted => write!(f, "Aborted"),
        }
    }
}

/// What cancelling a running task does to the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CancelPolicy {
    /// Leave partial commits in place. Callers wanting a clean grid must clear it themselves.
    #[default]
    Lossy,
    /// Undo every commit made by the search, restoring the cleared baseline.
    Rollback,
}

/// Progress of a [`SolveTask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Running,
    Finished(SolveOutcome),
}

/// Summary returned when a task is cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelReport {
    /// Upgrades still committed on the grid after cancelling.
    pub left_placed: usize,
    /// Commits undone by [`CancelPolicy::Rollback`].
    pub rolled_back: usize,
    pub steps: u64,
}

/// Parameters of one solve request.
#[derive(Debug, Clone, Copy)]
pub struct SolveSession {
    carrier: Carrier,
    max_rotations: u8,
    cancel_policy: CancelPolicy,
}

impl SolveSession {
    /// Creates a session for `carrier`'s grid.
    ///
    /// `max_rotations` is 1 when rotation is locked and 6 otherwise; values
    /// outside `1..=6` are clamped.
    pub fn new(carrier: Carrier, max_rotations: u8) -> Self {
        let clamped = max_rotations.clamp(1, NUM_ROTATIONS);
        if clamped != max_rotations {
            warn!(requested = max_rotations, used = clamped, "max rotations out of range");
        }
        Self {
            carrier,
            max_rotations: clamped,
            cancel_policy: CancelPolicy::default(),
        }
    }

    pub fn with_cancel_policy(mut self, cancel_policy: CancelPolicy) -> Self {
        self.cancel_policy = cancel_policy;
        self
    }

    pub fn carrier(&self) -> Carrier {
        self.carrier
    }

    pub fn max_rotations(&self) -> u8 {
        self.max_rotations
    }

    /// Unplaces every upgrade attached to the carrier, and to the global
    /// carrier when editing a character.
    ///
    /// Returns the number of upgrades removed.
    pub fn clear_slots<S: EquipSlots>(&self, slots: &mut S) -> usize {
        let mut cleared = 0;
        for owner in self.carrier.grid_owners() {
            for upgrade in slots.attached_upgrades(owner) {
                slots.unplace(owner, upgrade);
                cleared += 1;
            }
        }
        cleared
    }

    /// Starts a solve.
    ///
    /// Clears the grid, then checks feasibility. An infeasible request fires
    /// `on_complete(false)` immediately and returns a finished task without
    /// touching the grid again. Otherwise the returned task must be stepped
    /// to completion, which fires `on_complete` with the result.
    #[instrument(skip_all, fields(carrier = %self.carrier, upgrades = upgrades.len()))]
    pub fn try_solve<S, F>(self, slots: &mut S, upgrades: Vec<Upgrade>, on_complete: F) -> SolveTask
    where
        S: EquipSlots,
        F: FnOnce(bool) + 'static,
    {
        let cleared = self.clear_slots(slots);
        info!(cleared, "cleared equipped upgrades");

        let capacity = slots.width() * slots.height();
        if !can_fit_all(&upgrades, slots.width(), slots.height()) {
            info!(
                required = required_cells(&upgrades),
                capacity, "upgrades cannot fit by cell count"
            );
            on_complete(false);
            return SolveTask {
                state: TaskState::Finished(SolveOutcome::InfeasibleByCount),
                search: None,
                on_complete: None,
                cancel_policy: self.cancel_policy,
            };
        }

        info!(
            required = required_cells(&upgrades),
            capacity,
            max_rotations = self.max_rotations,
            "starting placement search"
        );
        SolveTask {
            state: TaskState::Running,
            search: Some(Search::new(upgrades, self.carrier, self.max_rotations)),
            on_complete: Some(Box::new(on_complete)),
            cancel_policy: self.cancel_policy,
        }
    }
}

/// A running or finished solve.
pub struct SolveTask {
    state: TaskState,
    search: Option<Search>,
    on_complete: Option<CompletionCallback>,
    cancel_policy: CancelPolicy,
}

impl fmt::Debug for SolveTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SolveTask")
            .field("state", &self.state)
            .field("search", &self.search)
            .field("cancel_policy", &self.cancel_policy)
            .finish_non_exhaustive()
    }
}

impl SolveTask {
    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, TaskState::Finished(_))
    }

    /// The outcome, once finished.
    pub fn outcome(&self) -> Option<SolveOutcome> {
        match self.state {
            TaskState::Finished(outcome) => Some(outcome),
            TaskState::Running => None,
        }
    }

    /// Search effort so far; `None` if no search was started.
    pub fn stats(&self) -> Option<SearchStats> {
        self.search.as_ref().map(Search::stats)
    }

    /// Upgrades currently committed by the search.
    pub fn depth(&self) -> usize {
        self.search.as_ref().map_or(0, Search::depth)
    }

    /// Performs one search step. Finishing fires the completion callback.
    pub fn step<S: EquipSlots>(&mut self, slots: &mut S) -> TaskState {
        if self.is_finished() {
            return self.state;
        }
        let Some(search) = self.search.as_mut() else {
            return self.state;
        };

        let outcome = match search.step(slots) {
            SearchStatus::Running => return TaskState::Running,
            SearchStatus::Found => SolveOutcome::Solved,
            SearchStatus::Exhausted => SolveOutcome::NoPlacementFound,
        };

        let stats = search.stats();
        info!(
            %outcome,
            steps = stats.steps,
            attempts = stats.attempts,
            backtracks = stats.backtracks,
            "search finished"
        );
        self.state = TaskState::Finished(outcome);
        if let Some(on_complete) = self.on_complete.take() {
            on_complete(outcome.is_success());
        }
        self.state
    }

    /// Stops the task without running the completion callback.
    ///
    /// Under [`CancelPolicy::Lossy`] the grid keeps whatever the search had
    /// committed. Under [`CancelPolicy::Rollback`] those commits are undone.
    /// Cancelling a finished task changes nothing.
    pub fn cancel<S: EquipSlots>(&mut self, slots: &mut S) -> CancelReport {
        let steps = self.stats().map_or(0, |s| s.steps);
        if self.is_finished() {
            return CancelReport {
                left_placed: self.depth(),
                rolled_back: 0,
                steps,
            };
        }

        self.on_complete = None;
        self.state = TaskState::Finished(SolveOutcome::Aborted);

        let rolled_back = match (self.cancel_policy, self.search.as_mut()) {
            (CancelPolicy::Rollback, Some(search)) => search.rollback(slots),
            _ => 0,
        };
        let left_placed = self.depth();
        warn!(left_placed, rolled_back, steps, "solve cancelled");
        CancelReport {
            left_placed,
            rolled_back,
            steps,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::grid::{EquipGrid, GridMap, PATTERN_ENABLED};
    use crate::upgrades::{GearKind, Pattern, Rarity, UpgradeId};
    use crate::workbench::Workbench;

    const GEAR: Carrier = Carrier::Gear {
        id: 3,
        kind: GearKind::Equipment,
    };
    const CHARACTER: Carrier = Carrier::Gear {
        id: 4,
        kind: GearKind::Character,
    };

    fn upgrade(id: u32, rows: &[&str]) -> Upgrade {
        let map = GridMap::from_rows(rows, PATTERN_ENABLED).unwrap();
        Upgrade::new(UpgradeId(id), format!("U{id}"), Rarity::Common, Pattern::new(map))
    }

    fn halves() -> Vec<Upgrade> {
        vec![upgrade(0, &["####", "####"]), upgrade(1, &["####", "####"])]
    }

    /// Returns a callback that stores its argument, and the slot it writes to.
    fn recorder() -> (Rc<Cell<Option<bool>>>, impl FnOnce(bool) + 'static) {
        let slot = Rc::new(Cell::new(None));
        let writer = slot.clone();
        (slot, move |found| writer.set(Some(found)))
    }

    fn run(task: &mut SolveTask, bench: &mut Workbench) -> SolveOutcome {
        loop {
            if let TaskState::Finished(outcome) = task.step(bench) {
                return outcome;
            }
        }
    }

    #[test]
    fn test_infeasible_reports_without_attempts() {
        let mut bench = Workbench::new(EquipGrid::open(2, 2));
        let (result, callback) = recorder();

        let task = SolveSession::new(GEAR, 6).try_solve(
            &mut bench,
            vec![upgrade(0, &["###", "##."])],
            callback,
        );

        assert_eq!(task.outcome(), Some(SolveOutcome::InfeasibleByCount));
        assert_eq!(result.get(), Some(false));
        assert_eq!(bench.stats().attempts, 0);
        assert!(task.stats().is_none());
    }

    #[test]
    fn test_solved_fires_callback_once() {
        let mut bench = Workbench::new(EquipGrid::open(4, 4));
        let (result, callback) = recorder();

        let mut task = SolveSession::new(GEAR, 1).try_solve(&mut bench, halves(), callback);
        assert_eq!(result.get(), None);
        assert_eq!(run(&mut task, &mut bench), SolveOutcome::Solved);
        assert_eq!(result.get(), Some(true));
        assert_eq!(bench.grid().occupied_count(), 16);

        // stepping a finished task is a no-op
        assert_eq!(task.step(&mut bench), TaskState::Finished(SolveOutcome::Solved));
    }

    #[test]
    fn test_failure_restores_cleared_baseline() {
        let mut bench = Workbench::new(EquipGrid::open(3, 2));
        let (result, callback) = recorder();
        // fits by count, but the square always leaves a vertical gap
        let upgrades = vec![upgrade(0, &["##", "##"]), upgrade(1, &["##"])];

        let mut task = SolveSession::new(GEAR, 1).try_solve(&mut bench, upgrades, callback);
        let after_clear = bench.grid().clone();
        assert_eq!(run(&mut task, &mut bench), SolveOutcome::NoPlacementFound);
        assert_eq!(result.get(), Some(false));
        assert_eq!(bench.grid(), &after_clear);
    }

    #[test]
    fn test_clear_removes_gear_upgrades_only() {
        let mut bench = Workbench::new(EquipGrid::open(4, 4));
        let own = upgrade(10, &["#"]);
        let global = upgrade(11, &["#"]);
        assert!(bench.place(GEAR, &own, 3, 3, 0));
        assert!(bench.place(Carrier::Global, &global, 2, 3, 0));

        let (_, callback) = recorder();
        let mut task = SolveSession::new(GEAR, 1).try_solve(&mut bench, halves(), callback);
        assert!(bench.placement(own.id()).is_none());
        assert!(bench.placement(global.id()).is_some());
        // the global upgrade blocks the bottom half
        assert_eq!(run(&mut task, &mut bench), SolveOutcome::NoPlacementFound);
    }

    #[test]
    fn test_clear_on_character_includes_global_upgrades() {
        let mut bench = Workbench::new(EquipGrid::open(4, 4));
        let own = upgrade(10, &["#"]);
        let global = upgrade(11, &["#"]);
        assert!(bench.place(CHARACTER, &own, 3, 3, 0));
        assert!(bench.place(Carrier::Global, &global, 2, 3, 0));

        let (result, callback) = recorder();
        let mut task = SolveSession::new(CHARACTER, 1).try_solve(&mut bench, halves(), callback);
        assert!(bench.placement(own.id()).is_none());
        assert!(bench.placement(global.id()).is_none());
        assert_eq!(run(&mut task, &mut bench), SolveOutcome::Solved);
        assert_eq!(result.get(), Some(true));
    }

    #[test]
    fn test_lossy_cancel_keeps_partial_commits() {
        let mut bench = Workbench::new(EquipGrid::open(4, 4));
        let (result, callback) = recorder();

        let mut task = SolveSession::new(GEAR, 1).try_solve(&mut bench, halves(), callback);
        assert_eq!(task.step(&mut bench), TaskState::Running);

        let report = task.cancel(&mut bench);
        assert_eq!(report.left_placed, 1);
        assert_eq!(report.rolled_back, 0);
        assert_eq!(bench.grid().occupied_count(), 8);
        assert_eq!(task.outcome(), Some(SolveOutcome::Aborted));
        assert_eq!(result.get(), None, "cancel must not run the callback");

        // a cancelled task does not resume
        assert_eq!(task.step(&mut bench), TaskState::Finished(SolveOutcome::Aborted));
        assert_eq!(bench.grid().occupied_count(), 8);
    }

    #[test]
    fn test_rollback_cancel_restores_baseline() {
        let mut bench = Workbench::new(EquipGrid::open(4, 4));
        let (result, callback) = recorder();

        let mut task = SolveSession::new(GEAR, 1)
            .with_cancel_policy(CancelPolicy::Rollback)
            .try_solve(&mut bench, halves(), callback);
        task.step(&mut bench);
        task.step(&mut bench);
        assert_eq!(bench.grid().occupied_count(), 16);

        let report = task.cancel(&mut bench);
        assert_eq!(report.rolled_back, 2);
        assert_eq!(report.left_placed, 0);
        assert_eq!(bench.grid().occupied_count(), 0);
        assert_eq!(result.get(), None);
    }

    #[test]
    fn test_rotations_are_clamped() {
        assert_eq!(SolveSession::new(GEAR, 0).max_rotations(), 1);
        assert_eq!(SolveSession::new(GEAR, 9).max_rotations(), 6);
        assert_eq!(SolveSession::new(GEAR, 6).max_rotations(), 6);
    }
}

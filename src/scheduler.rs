//! Cooperative per-frame driver for solve tasks.
//!
//! The host calls [`FrameScheduler::run_frame`] once per frame; each call
//! performs a bounded number of search steps and returns control. An optional
//! step cap turns a runaway search into an aborted one.

use tracing::{debug, warn};

use crate::session::{SolveOutcome, SolveTask, TaskState};
use crate::EquipSlots;

/// Default number of search steps per frame.
pub const DEFAULT_STEPS_PER_FRAME: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameScheduler {
    steps_per_frame: usize,
    max_steps: Option<u64>,
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self {
            steps_per_frame: DEFAULT_STEPS_PER_FRAME,
            max_steps: None,
        }
    }
}

impl FrameScheduler {
    /// Creates a scheduler running `steps_per_frame` steps per frame (at least one).
    pub fn new(steps_per_frame: usize) -> Self {
        Self {
            steps_per_frame: steps_per_frame.max(1),
            max_steps: None,
        }
    }

    /// Caps the total number of steps; exceeding it cancels the task.
    pub fn with_max_steps(mut self, max_steps: Option<u64>) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn steps_per_frame(&self) -> usize {
        self.steps_per_frame
    }

    pub fn max_steps(&self) -> Option<u64> {
        self.max_steps
    }

    /// Advances the task by up to one frame's worth of steps.
    pub fn run_frame<S: EquipSlots>(&self, task: &mut SolveTask, slots: &mut S) -> TaskState {
        for _ in 0..self.steps_per_frame {
            if let Some(limit) = self.max_steps {
                let taken = task.stats().map_or(0, |s| s.steps);
                if taken >= limit && !task.is_finished() {
                    warn!(limit, "step cap reached");
                    task.cancel(slots);
                    return task.state();
                }
            }
            if let TaskState::Finished(outcome) = task.step(slots) {
                return TaskState::Finished(outcome);
            }
        }
        task.state()
    }

    /// Runs frames until the task finishes.
    ///
    /// `on_frame` sees the host after every frame, together with the frame
    /// number (starting at 1).
    pub fn run<S, F>(&self, task: &mut SolveTask, slots: &mut S, mut on_frame: F) -> SolveOutcome
    where
        S: EquipSlots,
        F: FnMut(&S, u64),
    {
        let mut frame = 0;
        loop {
            let state = self.run_frame(task, slots);
            frame += 1;
            on_frame(slots, frame);
            if let TaskState::Finished(outcome) = state {
                debug!(frames = frame, %outcome, "task finished");
                return outcome;
            }
        }
    }
}

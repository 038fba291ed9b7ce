//! Deterministic virtual-time scheduler.
//!
//! `ManualScheduler` implements [`Scheduler`] against an explicit clock that
//! only moves when the driver says so: `fire_frame` drains the pending frame
//! queue (one "frame-presentation opportunity"), `advance_ms` moves the
//! virtual clock and fires due timers in due order. Tests and the CLI
//! `trace` command use it to replay gate behavior with exact timings.

use std::cell::RefCell;
use std::rc::Rc;

use crate::scheduler::{ScheduledAction, Scheduler};

/// Cancellation token for a frame action queued on a [`ManualScheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManualFrameHandle(u64);

/// Cancellation token for a timer queued on a [`ManualScheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManualTimerHandle(u64);

struct TimerEntry {
    id: u64,
    due_ms: u64,
    action: ScheduledAction,
}

#[derive(Default)]
struct ManualCore {
    now_ms: u64,
    next_id: u64,
    frames: Vec<(u64, ScheduledAction)>,
    timers: Vec<TimerEntry>,
}

impl ManualCore {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Pop the earliest timer due at or before `deadline_ms`.
    /// Ties break on schedule order (lower id first).
    fn pop_due(&mut self, deadline_ms: u64) -> Option<TimerEntry> {
        let mut best: Option<usize> = None;
        for (idx, entry) in self.timers.iter().enumerate() {
            if entry.due_ms > deadline_ms {
                continue;
            }
            best = match best {
                None => Some(idx),
                Some(cur) => {
                    let cur_entry = &self.timers[cur];
                    if (entry.due_ms, entry.id) < (cur_entry.due_ms, cur_entry.id) {
                        Some(idx)
                    } else {
                        Some(cur)
                    }
                }
            };
        }
        best.map(|idx| self.timers.remove(idx))
    }
}

/// Deterministic scheduler driven entirely by the caller.
///
/// Cloning is cheap and clones share the same clock and queues, so a test
/// can hand one clone to the controller and keep another to drive time.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    core: Rc<RefCell<ManualCore>>,
}

impl ManualScheduler {
    /// Create a scheduler with the virtual clock at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a scheduler with the virtual clock at `start_ms`.
    #[must_use]
    pub fn with_start_time(start_ms: u64) -> Self {
        let scheduler = Self::new();
        scheduler.core.borrow_mut().now_ms = start_ms;
        scheduler
    }

    /// Number of frame actions waiting for the next `fire_frame`.
    #[must_use]
    pub fn pending_frames(&self) -> usize {
        self.core.borrow().frames.len()
    }

    /// Number of timers that have not yet fired or been cancelled.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.core.borrow().timers.len()
    }

    /// Present one frame: drain the frame queue as it stood on entry and run
    /// each action in schedule order. Actions scheduled while the frame runs
    /// land in the *next* frame. The clock does not move.
    ///
    /// Returns the number of actions run.
    pub fn fire_frame(&self) -> usize {
        let batch = std::mem::take(&mut self.core.borrow_mut().frames);
        let count = batch.len();
        for (_, action) in batch {
            action();
        }
        count
    }

    /// Advance the virtual clock by `delta_ms`, firing every timer that
    /// comes due on the way (including timers scheduled by fired actions,
    /// when their due time still falls inside the window). Timers fire in
    /// due order; ties fire in schedule order.
    ///
    /// Returns the number of timers fired.
    pub fn advance_ms(&self, delta_ms: u64) -> usize {
        let deadline = self.core.borrow().now_ms + delta_ms;
        let mut fired = 0;
        loop {
            let entry = {
                let mut core = self.core.borrow_mut();
                match core.pop_due(deadline) {
                    Some(entry) => {
                        // Time jumps to the timer's due point before it runs,
                        // so actions observe a consistent clock.
                        core.now_ms = core.now_ms.max(entry.due_ms);
                        Some(entry)
                    }
                    None => None,
                }
            };
            match entry {
                Some(entry) => {
                    (entry.action)();
                    fired += 1;
                }
                None => break,
            }
        }
        self.core.borrow_mut().now_ms = deadline;
        fired
    }
}

impl Scheduler for ManualScheduler {
    type FrameHandle = ManualFrameHandle;
    type TimerHandle = ManualTimerHandle;

    fn now_ms(&self) -> u64 {
        self.core.borrow().now_ms
    }

    fn schedule_frame(&self, action: ScheduledAction) -> ManualFrameHandle {
        let mut core = self.core.borrow_mut();
        let id = core.next_id();
        core.frames.push((id, action));
        ManualFrameHandle(id)
    }

    fn cancel_frame(&self, handle: ManualFrameHandle) {
        self.core
            .borrow_mut()
            .frames
            .retain(|(id, _)| *id != handle.0);
    }

    fn schedule_timer(&self, delay_ms: u64, action: ScheduledAction) -> ManualTimerHandle {
        let mut core = self.core.borrow_mut();
        let id = core.next_id();
        let due_ms = core.now_ms + delay_ms;
        core.timers.push(TimerEntry { id, due_ms, action });
        ManualTimerHandle(id)
    }

    fn cancel_timer(&self, handle: ManualTimerHandle) {
        self.core
            .borrow_mut()
            .timers
            .retain(|entry| entry.id != handle.0);
    }
}

//! Split construction for host lifecycle systems.
//!
//! A component-lifecycle host typically builds its callback plumbing before
//! its teardown hook exists. [`create_load_control`] therefore hands back
//! two halves: a starter the host redeems for the live controller once it is
//! ready, and a disposer the host registers for teardown. The disposer runs
//! exactly once, on demand or on drop, whichever comes first.

use crate::controller::{LoadControlConfig, LoadController};
use crate::error::LoadControlError;
use crate::scheduler::Scheduler;

/// Build a controller and split it into its start and dispose halves.
pub fn create_load_control<A, S, F>(
    callback: F,
    config: LoadControlConfig,
    scheduler: S,
) -> (LoadControlStarter<A, S>, LoadControlDisposer<A, S>)
where
    A: 'static,
    S: Scheduler + 'static,
    F: FnMut(A) + 'static,
{
    let controller = LoadController::new(callback, config, scheduler);
    (
        LoadControlStarter {
            controller: controller.clone(),
        },
        LoadControlDisposer {
            controller,
            disposed: false,
        },
    )
}

/// Redeemable half: produces the live, `invoke`-capable controller handle.
pub struct LoadControlStarter<A, S: Scheduler> {
    controller: LoadController<A, S>,
}

impl<A, S: Scheduler> LoadControlStarter<A, S> {
    /// Return the live controller handle.
    ///
    /// # Errors
    ///
    /// Returns [`LoadControlError::Disposed`] when teardown already ran;
    /// handing out an inert controller would silently swallow every call.
    pub fn start(&self) -> Result<LoadController<A, S>, LoadControlError> {
        if self.controller.is_disposed() {
            return Err(LoadControlError::Disposed);
        }
        Ok(self.controller.clone())
    }
}

/// Teardown half: cancels all pending work exactly once.
pub struct LoadControlDisposer<A, S: Scheduler> {
    controller: LoadController<A, S>,
    disposed: bool,
}

impl<A, S: Scheduler> LoadControlDisposer<A, S> {
    /// Tear the controller down. Calling this again (or dropping the
    /// disposer afterwards) has no further effect.
    pub fn dispose(&mut self) {
        if !self.disposed {
            self.disposed = true;
            self.controller.dispose();
        }
    }

    /// Whether this disposer (or a drop of it) already ran.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

impl<A, S: Scheduler> Drop for LoadControlDisposer<A, S> {
    fn drop(&mut self) {
        if !self.disposed {
            self.disposed = true;
            self.controller.dispose();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manual::ManualScheduler;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn start_then_invoke_delivers_through_the_controller() {
        let scheduler = ManualScheduler::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);

        let (starter, _disposer) = create_load_control(
            move |value: u32| sink.borrow_mut().push(value),
            LoadControlConfig::default(),
            scheduler.clone(),
        );

        let controller = starter.start().unwrap();
        controller.invoke(9);
        scheduler.fire_frame();
        assert_eq!(*seen.borrow(), vec![9]);
    }

    #[test]
    fn start_after_dispose_is_rejected() {
        let scheduler = ManualScheduler::new();
        let (starter, mut disposer) =
            create_load_control(|_: u32| {}, LoadControlConfig::default(), scheduler);

        disposer.dispose();
        assert!(disposer.is_disposed());
        assert!(matches!(starter.start(), Err(LoadControlError::Disposed)));
    }

    #[test]
    fn dropping_the_disposer_cancels_pending_work() {
        let scheduler = ManualScheduler::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);

        let controller = {
            let (starter, _disposer) = create_load_control(
                move |value: u32| sink.borrow_mut().push(value),
                LoadControlConfig::default(),
                scheduler.clone(),
            );
            let controller = starter.start().unwrap();
            controller.invoke(1);
            controller
            // _disposer drops here, before the frame fires
        };

        assert!(controller.is_disposed());
        assert_eq!(scheduler.pending_frames(), 0);
        scheduler.fire_frame();
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn dispose_after_drop_guard_already_ran_is_harmless() {
        let scheduler = ManualScheduler::new();
        let (_starter, mut disposer) =
            create_load_control(|_: u32| {}, LoadControlConfig::default(), scheduler);
        disposer.dispose();
        disposer.dispose();
        assert!(disposer.is_disposed());
    }
}

//! Scheduling capability consumed by the load controller.
//!
//! The controller never owns a clock or an event loop; it registers
//! callbacks-of-callbacks with the host environment through this trait and
//! returns control immediately. Hosts supply a frame-presentation scheduler
//! (the point at which the environment is ready to render) and a millisecond
//! timer, both with cancellation tokens.

/// A deferred unit of work handed to the host scheduler.
///
/// Actions are `'static` but deliberately not `Send`: the whole system runs
/// on one logical thread driven by the host's frame/timer loop.
pub type ScheduledAction = Box<dyn FnOnce() + 'static>;

/// Host scheduling primitives: a frame-presentation hook, a millisecond
/// timer, and a monotonic-ish clock read.
///
/// # Contract
///
/// - `schedule_frame` runs the action at or after the next frame-presentation
///   opportunity; `schedule_timer` runs it at or after `delay_ms`.
/// - Neither may run the action synchronously inside the `schedule_*` call.
/// - Cancelling a handle whose action already ran (or was already cancelled)
///   is a no-op.
pub trait Scheduler {
    /// Cancellation token for a scheduled frame action.
    type FrameHandle;
    /// Cancellation token for a scheduled timer action.
    type TimerHandle;

    /// Current time in milliseconds. Only ever compared against other reads
    /// from the same scheduler, so the epoch is arbitrary.
    fn now_ms(&self) -> u64;

    /// Run `action` at the next frame-presentation opportunity.
    fn schedule_frame(&self, action: ScheduledAction) -> Self::FrameHandle;

    /// Cancel a pending frame action.
    fn cancel_frame(&self, handle: Self::FrameHandle);

    /// Run `action` once `delay_ms` milliseconds have elapsed.
    fn schedule_timer(&self, delay_ms: u64, action: ScheduledAction) -> Self::TimerHandle;

    /// Cancel a pending timer action.
    fn cancel_timer(&self, handle: Self::TimerHandle);
}

//! Frame-aligned throttle/debounce load controller.
//!
//! Coalesces a high-frequency stream of `invoke` calls into a bounded,
//! frame-synchronized stream of callback executions:
//!
//! - While the throttle gate is **closed**, `invoke` opens a window and asks
//!   the host scheduler to run the callback at the next frame-presentation
//!   opportunity (plus an optional extra throttle delay). The gate stays
//!   open until that execution completes.
//! - While the gate is **open**, `invoke` schedules a debounce deferral
//!   carrying the latest arguments, replacing (never stacking) any previous
//!   deferral. When the deferral's timer fires, a staleness check suppresses
//!   it if a fresher window has opened since it was scheduled.
//!
//! The controller is single-threaded and cooperative: `invoke` never blocks
//! and never runs the callback synchronously; all execution happens inside
//! actions registered with the injected [`Scheduler`].

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::LoadControlError;
use crate::scheduler::Scheduler;

/// Configuration for a load controller. Immutable for the controller's
/// lifetime; values are taken as given (no validation beyond the types).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadControlConfig {
    /// Extra delay, after the frame tick, before a throttled execution runs.
    /// Zero means the callback runs inline on the frame tick itself (no
    /// zero-delay timer round-trip).
    pub throttle_delay_ms: u64,
    /// Settle time for a deferral scheduled while the gate is open. The
    /// deferral timer fires after `debounce_delay_ms + throttle_delay_ms`.
    pub debounce_delay_ms: u64,
}

impl Default for LoadControlConfig {
    fn default() -> Self {
        Self {
            throttle_delay_ms: 0,
            debounce_delay_ms: 100,
        }
    }
}

impl LoadControlConfig {
    /// Create a configuration with explicit delays.
    #[must_use]
    pub const fn new(throttle_delay_ms: u64, debounce_delay_ms: u64) -> Self {
        Self {
            throttle_delay_ms,
            debounce_delay_ms,
        }
    }

    /// Parse a configuration from TOML. Missing fields take their defaults.
    pub fn from_toml_str(input: &str) -> Result<Self, LoadControlError> {
        Ok(toml::from_str(input)?)
    }

    /// Total delay applied to a debounce deferral.
    #[must_use]
    pub const fn deferral_delay_ms(&self) -> u64 {
        self.debounce_delay_ms + self.throttle_delay_ms
    }
}

/// Public-facing gate state for status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    /// No execution window is open; the next `invoke` starts one.
    Closed,
    /// A window is open; further `invoke` calls go to the debounce path.
    Open,
}

/// Counters accumulated over a controller's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadControlMetrics {
    /// Total `invoke` calls, including ones ignored after dispose.
    pub invokes: u64,
    /// Throttle windows opened (gate closed -> open transitions).
    pub windows_opened: u64,
    /// Callback executions of either kind.
    pub callback_runs: u64,
    /// Callback executions delivered by a throttle window.
    pub throttled_runs: u64,
    /// Callback executions delivered by a debounce deferral.
    pub deferred_runs: u64,
    /// Deferrals scheduled while the gate was open.
    pub deferrals_scheduled: u64,
    /// Deferrals cancelled because a newer `invoke` replaced them.
    pub deferrals_replaced: u64,
    /// Deferrals whose timer fired but were suppressed as stale.
    pub deferrals_suppressed: u64,
    /// `invoke` calls ignored because the controller was disposed.
    pub invokes_after_dispose: u64,
}

/// Point-in-time view of a controller for status reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadControlSnapshot {
    pub gate: GateState,
    pub disposed: bool,
    /// Open time of the currently open window, if any.
    pub window_opened_at_ms: Option<u64>,
    /// Open time of the most recent window, retained after it closes. This
    /// is the reference point for the deferral staleness check.
    pub last_opened_at_ms: Option<u64>,
    /// Schedule time of the pending deferral, if any.
    pub deferral_scheduled_at_ms: Option<u64>,
    pub metrics: LoadControlMetrics,
}

/// Live token for whichever scheduled action will close the current window.
enum WindowHandle<S: Scheduler> {
    /// Waiting for the frame tick.
    Frame(S::FrameHandle),
    /// Frame tick fired; waiting out the extra throttle delay.
    Tail(S::TimerHandle),
}

/// One open throttling cycle, from gate-open to callback completion.
struct ThrottleWindow<S: Scheduler> {
    opened_at_ms: u64,
    handle: Option<WindowHandle<S>>,
}

/// The single pending, replaceable, timer-delayed execution. Captured
/// arguments live inside the scheduled action itself.
struct DebounceDeferral<S: Scheduler> {
    scheduled_at_ms: u64,
    handle: Option<S::TimerHandle>,
}

struct Inner<A, S: Scheduler> {
    config: LoadControlConfig,
    scheduler: S,
    callback: Rc<RefCell<dyn FnMut(A)>>,
    window: Option<ThrottleWindow<S>>,
    deferral: Option<DebounceDeferral<S>>,
    last_opened_at_ms: Option<u64>,
    disposed: bool,
    metrics: LoadControlMetrics,
}

/// Rate-controlled entry point for one logical callback stream.
///
/// Cloning yields another handle to the same controller; construct a fresh
/// controller per stream instead of sharing one across unrelated callers.
pub struct LoadController<A, S: Scheduler> {
    inner: Rc<RefCell<Inner<A, S>>>,
}

impl<A, S: Scheduler> Clone for LoadController<A, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<A: 'static, S: Scheduler + 'static> LoadController<A, S> {
    /// Create a controller around `callback` with the given configuration
    /// and host scheduler. Nothing is scheduled until the first `invoke`.
    pub fn new<F>(callback: F, config: LoadControlConfig, scheduler: S) -> Self
    where
        F: FnMut(A) + 'static,
    {
        let callback: Rc<RefCell<dyn FnMut(A)>> = Rc::new(RefCell::new(callback));
        Self {
            inner: Rc::new(RefCell::new(Inner {
                config,
                scheduler,
                callback,
                window: None,
                deferral: None,
                last_opened_at_ms: None,
                disposed: false,
                metrics: LoadControlMetrics::default(),
            })),
        }
    }

    /// Rate-controlled call entry point.
    ///
    /// Never executes the callback synchronously; at most schedules future
    /// work with the host scheduler and returns. After [`dispose`] this is a
    /// no-op (the controller is inert).
    ///
    /// [`dispose`]: LoadController::dispose
    pub fn invoke(&self, args: A) {
        let mut inner = self.inner.borrow_mut();
        inner.metrics.invokes += 1;

        if inner.disposed {
            inner.metrics.invokes_after_dispose += 1;
            trace!("invoke ignored: controller disposed");
            return;
        }

        if inner.window.is_some() {
            // Gate open: the call is still important (dropping it could leave
            // the consumer out of sync with the final input), so defer it.
            // Only the latest arguments matter; any previous deferral is
            // cancelled outright, never stacked.
            if let Some(mut previous) = inner.deferral.take() {
                if let Some(handle) = previous.handle.take() {
                    inner.scheduler.cancel_timer(handle);
                }
                inner.metrics.deferrals_replaced += 1;
            }

            let scheduled_at_ms = inner.scheduler.now_ms();
            let delay_ms = inner.config.deferral_delay_ms();
            let shared = Rc::clone(&self.inner);
            let handle = inner.scheduler.schedule_timer(
                delay_ms,
                Box::new(move || fire_deferral(&shared, scheduled_at_ms, args)),
            );
            inner.deferral = Some(DebounceDeferral {
                scheduled_at_ms,
                handle: Some(handle),
            });
            inner.metrics.deferrals_scheduled += 1;
            trace!(scheduled_at_ms, delay_ms, "deferral scheduled");
        } else {
            // Gate closed: open a window and line the callback up behind the
            // next frame-presentation opportunity. One execution per cycle.
            let opened_at_ms = inner.scheduler.now_ms();
            let shared = Rc::clone(&self.inner);
            let handle = inner
                .scheduler
                .schedule_frame(Box::new(move || run_window(&shared, args)));
            inner.window = Some(ThrottleWindow {
                opened_at_ms,
                handle: Some(WindowHandle::Frame(handle)),
            });
            inner.last_opened_at_ms = Some(opened_at_ms);
            inner.metrics.windows_opened += 1;
            debug!(opened_at_ms, "throttle window opened");
        }
    }
}

impl<A, S: Scheduler> LoadController<A, S> {
    /// Cancel any pending frame-scheduled and timer-scheduled work and leave
    /// the controller inert. Idempotent; safe with nothing pending.
    pub fn dispose(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.disposed = true;

        if let Some(mut window) = inner.window.take() {
            match window.handle.take() {
                Some(WindowHandle::Frame(handle)) => inner.scheduler.cancel_frame(handle),
                Some(WindowHandle::Tail(handle)) => inner.scheduler.cancel_timer(handle),
                None => {}
            }
        }
        if let Some(mut deferral) = inner.deferral.take() {
            if let Some(handle) = deferral.handle.take() {
                inner.scheduler.cancel_timer(handle);
            }
        }
        debug!("load control disposed");
    }

    /// Current gate state.
    #[must_use]
    pub fn gate(&self) -> GateState {
        if self.inner.borrow().window.is_some() {
            GateState::Open
        } else {
            GateState::Closed
        }
    }

    /// Whether [`dispose`](LoadController::dispose) has run.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.borrow().disposed
    }

    /// Copy of the controller's configuration.
    #[must_use]
    pub fn config(&self) -> LoadControlConfig {
        self.inner.borrow().config
    }

    /// Copy of the lifetime counters.
    #[must_use]
    pub fn metrics(&self) -> LoadControlMetrics {
        self.inner.borrow().metrics.clone()
    }

    /// Point-in-time status snapshot.
    #[must_use]
    pub fn snapshot(&self) -> LoadControlSnapshot {
        let inner = self.inner.borrow();
        LoadControlSnapshot {
            gate: if inner.window.is_some() {
                GateState::Open
            } else {
                GateState::Closed
            },
            disposed: inner.disposed,
            window_opened_at_ms: inner.window.as_ref().map(|w| w.opened_at_ms),
            last_opened_at_ms: inner.last_opened_at_ms,
            deferral_scheduled_at_ms: inner.deferral.as_ref().map(|d| d.scheduled_at_ms),
            metrics: inner.metrics.clone(),
        }
    }
}

/// Frame tick for an open window: either run the callback inline (zero
/// throttle delay) or arm the throttle tail timer.
fn run_window<A: 'static, S: Scheduler + 'static>(shared: &Rc<RefCell<Inner<A, S>>>, args: A) {
    let tail_delay_ms = {
        let mut inner = shared.borrow_mut();
        if inner.disposed {
            return;
        }
        if let Some(window) = inner.window.as_mut() {
            // The frame token is spent; the window stays open.
            window.handle = None;
        }
        inner.config.throttle_delay_ms
    };

    if tail_delay_ms > 0 {
        let tail_shared = Rc::clone(shared);
        let handle = shared.borrow().scheduler.schedule_timer(
            tail_delay_ms,
            Box::new(move || complete_window(&tail_shared, args)),
        );
        if let Some(window) = shared.borrow_mut().window.as_mut() {
            window.handle = Some(WindowHandle::Tail(handle));
        }
    } else {
        // Inline on the frame tick. A zero-delay timer would cost an extra
        // scheduling round-trip ("next tick"), not immediate execution.
        complete_window(shared, args);
    }
}

/// Run the callback for an open window, then close the window. The gate
/// reopens for the *next* incoming invoke, not the current cycle.
fn complete_window<A, S: Scheduler>(shared: &Rc<RefCell<Inner<A, S>>>, args: A) {
    let callback = {
        let inner = shared.borrow();
        if inner.disposed {
            return;
        }
        Rc::clone(&inner.callback)
    };

    // The inner borrow is released before the callback runs, so a callback
    // that re-enters `invoke` sees the gate still open and takes the
    // debounce path. A callback panic propagates out of the scheduling
    // context uncaught; the window is intentionally left open in that case.
    (callback.borrow_mut())(args);

    let mut inner = shared.borrow_mut();
    inner.window = None;
    inner.metrics.callback_runs += 1;
    inner.metrics.throttled_runs += 1;
    debug!("throttle window closed");
}

/// Timer tick for a deferral: staleness check, then run or suppress.
fn fire_deferral<A, S: Scheduler>(
    shared: &Rc<RefCell<Inner<A, S>>>,
    scheduled_at_ms: u64,
    args: A,
) {
    let callback = {
        let mut inner = shared.borrow_mut();
        if inner.disposed {
            return;
        }
        inner.deferral = None;

        // Stale when a newer window opened after this deferral was
        // scheduled: that window carried (or carries) fresher arguments, so
        // delivering these would be redundant and out of order. The
        // comparison is deliberately against the window-*open* timestamp.
        let last_opened_at_ms = inner.last_opened_at_ms.unwrap_or(0);
        if scheduled_at_ms < last_opened_at_ms {
            inner.metrics.deferrals_suppressed += 1;
            debug!(scheduled_at_ms, last_opened_at_ms, "stale deferral suppressed");
            return;
        }
        Rc::clone(&inner.callback)
    };

    (callback.borrow_mut())(args);

    let mut inner = shared.borrow_mut();
    inner.metrics.callback_runs += 1;
    inner.metrics.deferred_runs += 1;
    debug!(scheduled_at_ms, "deferred callback delivered");
}

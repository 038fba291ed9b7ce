//! Real-time [`Scheduler`] backed by tokio's current-thread facilities.
//!
//! "Frame presentation" is emulated as a fixed cadence: frame actions fire
//! on the next boundary of `frame_interval` measured from the scheduler's
//! epoch, so a burst of schedules inside one frame all land on the same
//! upcoming boundary. Timers map to `tokio::time::sleep`. Actions are not
//! `Send`, so everything is spawned with `spawn_local` and the scheduler
//! must be used from inside a [`tokio::task::LocalSet`].
//!
//! Under `#[tokio::test(start_paused = true)]` the cadence and timers run on
//! tokio's virtual clock, which keeps tests deterministic.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::scheduler::{ScheduledAction, Scheduler};

/// Frame cadence used by [`TokioFrameScheduler::new`], roughly 60 Hz.
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Fixed-cadence frame/timer scheduler for tokio current-thread hosts.
#[derive(Debug, Clone)]
pub struct TokioFrameScheduler {
    frame_interval: Duration,
    epoch: Instant,
}

impl TokioFrameScheduler {
    /// Create a scheduler with the default ~60 Hz frame cadence.
    #[must_use]
    pub fn new() -> Self {
        Self::with_frame_interval(DEFAULT_FRAME_INTERVAL)
    }

    /// Create a scheduler with an explicit frame cadence. Intervals below
    /// one millisecond are clamped up to one millisecond.
    #[must_use]
    pub fn with_frame_interval(frame_interval: Duration) -> Self {
        Self {
            frame_interval: frame_interval.max(Duration::from_millis(1)),
            epoch: Instant::now(),
        }
    }

    /// The cadence frame actions are aligned to.
    #[must_use]
    pub const fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    /// Time remaining until the next frame boundary, in `(0, interval]`.
    fn until_next_frame(&self) -> Duration {
        let interval_ns = self.frame_interval.as_nanos();
        let elapsed_ns = self.epoch.elapsed().as_nanos();
        let into_frame_ns = elapsed_ns % interval_ns;
        Duration::from_nanos((interval_ns - into_frame_ns) as u64)
    }
}

impl Default for TokioFrameScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for TokioFrameScheduler {
    type FrameHandle = JoinHandle<()>;
    type TimerHandle = JoinHandle<()>;

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    fn schedule_frame(&self, action: ScheduledAction) -> JoinHandle<()> {
        let wait = self.until_next_frame();
        tokio::task::spawn_local(async move {
            tokio::time::sleep(wait).await;
            action();
        })
    }

    fn cancel_frame(&self, handle: JoinHandle<()>) {
        handle.abort();
    }

    fn schedule_timer(&self, delay_ms: u64, action: ScheduledAction) -> JoinHandle<()> {
        tokio::task::spawn_local(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            action();
        })
    }

    fn cancel_timer(&self, handle: JoinHandle<()>) {
        handle.abort();
    }
}

//! loadgate-core: frame-aligned throttle/debounce load control.
//!
//! Coalesces high-frequency interactive events (continuous input changes,
//! drag updates, resize streams) into a bounded, UI-synchronized stream of
//! callback invocations. One [`LoadController`] manages exactly one logical
//! callback stream.
//!
//! # Architecture
//!
//! ```text
//! invoke(args) ──► Throttle Gate ──closed──► frame tick (+ throttle delay) ──► callback
//!                       │
//!                      open
//!                       ▼
//!            Debounce Deferral (replace, never stack)
//!                       ▼
//!            timer tick ──► staleness check ──► callback | suppress
//! ```
//!
//! # Modules
//!
//! - `controller`: the rate-control state machine (gate, deferral, staleness)
//! - `scheduler`: host scheduling capability trait
//! - `manual`: deterministic virtual-time scheduler for tests and simulation
//! - `tokio_frame`: real-time fixed-cadence scheduler for tokio hosts
//! - `lifecycle`: split start/dispose construction for lifecycle hosts
//! - `error`: error types
//!
//! # Safety
//!
//! This crate forbids unsafe code.

#![forbid(unsafe_code)]

pub mod controller;
pub mod error;
pub mod lifecycle;
pub mod manual;
pub mod scheduler;
pub mod tokio_frame;

pub use controller::{
    GateState, LoadControlConfig, LoadControlMetrics, LoadControlSnapshot, LoadController,
};
pub use error::LoadControlError;
pub use lifecycle::{LoadControlDisposer, LoadControlStarter, create_load_control};
pub use manual::ManualScheduler;
pub use scheduler::{ScheduledAction, Scheduler};
pub use tokio_frame::TokioFrameScheduler;

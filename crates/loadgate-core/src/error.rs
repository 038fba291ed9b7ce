//! Error types for loadgate-core.

use thiserror::Error;

/// Errors surfaced by the load-control lifecycle and config loading.
///
/// The controller itself has no failure modes of its own: `invoke` and
/// `dispose` never fail, and a panicking callback propagates uncaught out of
/// whichever scheduled action ran it.
#[derive(Debug, Error)]
pub enum LoadControlError {
    /// `start` was called after the disposer already tore the controller down.
    #[error("load control already disposed")]
    Disposed,

    /// Configuration TOML failed to parse.
    #[error("invalid load control config: {0}")]
    Config(#[from] toml::de::Error),
}

//! Updater configuration and cooperative cancellation.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Which inference engine [`new_updater`](crate::new_updater) should build.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// Junction-tree propagation. Supports joint marginals.
    JunctionTree,
    /// Recursive ancestral-independence engine. Single-variable marginals only.
    Ancestral,
}

impl Default for EngineKind {
    fn default() -> Self {
        EngineKind::JunctionTree
    }
}

/// Configuration shared by both updaters.
///
/// Missing fields take their defaults when deserializing, so a partial document like
/// `{"engine": "ancestral"}` is a complete configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdaterConfig {
    /// The engine to build.
    pub engine: EngineKind,
    /// Upper bound on the number of cells in any one clique potential. Poor triangulations
    /// grow exponentially with the induced width, so this fails fast instead of exhausting
    /// memory.
    pub max_clique_cells: usize,
    /// How far a fully specified CPT row may sum away from 1.
    pub row_tolerance: f64,
    /// Reject networks whose complete CPT rows are not row-stochastic.
    pub validate_cpts: bool,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        UpdaterConfig {
            engine: EngineKind::JunctionTree,
            max_clique_cells: 1 << 24,
            row_tolerance: 1e-4,
            validate_cpts: true,
        }
    }
}

impl UpdaterConfig {
    /// Checks that every field is usable, returning the configuration unchanged if so.
    pub fn validate(self) -> Result<Self> {
        if self.max_clique_cells == 0 {
            return Err(Error::InvalidArgument(
                "max_clique_cells must be > 0".into(),
            ));
        }
        if !(self.row_tolerance >= 0.0 && self.row_tolerance.is_finite()) {
            return Err(Error::InvalidArgument(
                "row_tolerance must be finite and >= 0".into(),
            ));
        }
        Ok(self)
    }
}

/// A shared flag that long-running builds poll so another thread can abandon them.
///
/// Clones share the same flag.
///
/// ```
/// use bayes_update::CancelToken;
///
/// let token = CancelToken::new();
/// let handle = token.clone();
/// assert!(token.check().is_ok());
/// handle.cancel();
/// assert!(token.is_cancelled());
/// assert!(token.check().is_err());
/// ```
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates a token that hasn't been cancelled.
    pub fn new() -> Self {
        CancelToken::default()
    }

    /// Requests cancellation of every operation watching this token.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Returns [`Error::Cancelled`] if cancellation was requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

//! # ActionFlow
//!
//! A composable framework for executing batches of independent units of work
//! ("actions") under pluggable concurrency, backpressure, deduplication and
//! observability policies.
//!
//! ## Overview
//!
//! Callers hand a batch of [`ActionRef`]s to an [`Executor`]. The executor
//! decides how and in what order the actions run and returns a single
//! aggregated outcome. Base strategies schedule the work, decorators wrap any
//! executor (base or decorator) and add a cross-cutting policy while keeping
//! the same contract, so stacks compose freely.
//!
//! ```text
//!   Metrics ─► Debounce ─► ControlFlow ─► Pool | Parallel | Sequential
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use actionflow::{action_fn, named, Context, Executor, ActionRef};
//! use actionflow::decorator::Debounce;
//! use actionflow::executor::Parallel;
//!
//! # async fn example() -> actionflow::Result<()> {
//! let exec = Debounce::new(Parallel);
//!
//! let actions: Vec<ActionRef> = vec![
//!     named("fetch-user", "42", |_ctx| async { Ok(()) }),
//!     named("fetch-user", "42", |_ctx| async { Ok(()) }), // coalesced
//!     action_fn(|_ctx| async { Ok(()) }),
//! ];
//!
//! exec.execute(&Context::new(), actions).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`context`]: cancellable, deadline-aware execution context
//! - [`action`]: the unit-of-work contract and named identities
//! - [`executor`]: base strategies (sequential, parallel, worker pool)
//! - [`decorator`]: flow control, debounce and metrics decorators
//! - [`stats`]: metrics backend boundary and the stat cache
//! - [`config`]: declarative executor stacks

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

use std::any::Any;
use std::sync::Arc;

use thiserror::Error;

/// Result type for executor operations
pub type Result<T> = std::result::Result<T, ExecutorError>;

/// Main error type for executor operations
///
/// The error is cloneable so that a single coalesced outcome can be handed to
/// every caller waiting on it.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum ExecutorError {
    /// The context was cancelled
    #[error("context cancelled")]
    Cancelled,

    /// The context deadline passed
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    /// The batch is larger than a flow-control gate can ever admit
    #[error("maximum {max} actions allowed, got {requested}")]
    TooManyActions {
        /// Configured maximum of concurrent actions
        max: usize,
        /// Size of the rejected batch
        requested: usize,
    },

    /// The worker pool was released
    #[error("pool is closed")]
    PoolClosed,

    /// An admission gate was closed underneath a waiter
    #[error("admission gate is closed")]
    GateClosed,

    /// An action body panicked
    #[error("action panicked: {0}")]
    Panicked(String),

    /// Failure reported by an action body, surfaced verbatim
    #[error("{0}")]
    Action(Arc<anyhow::Error>),

    /// Invalid executor configuration
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl ExecutorError {
    /// Wraps an application failure reported by an action body.
    pub fn action(err: impl Into<anyhow::Error>) -> Self {
        ExecutorError::Action(Arc::new(err.into()))
    }

    /// Builds a [`ExecutorError::Panicked`] from a caught panic payload.
    pub fn panicked(payload: Box<dyn Any + Send>) -> Self {
        let msg = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        ExecutorError::Panicked(msg)
    }

    /// Returns `true` for cancellation and deadline errors.
    pub fn is_context_error(&self) -> bool {
        matches!(self, ExecutorError::Cancelled | ExecutorError::DeadlineExceeded)
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ExecutorError::Cancelled => "cancelled",
            ExecutorError::DeadlineExceeded => "deadline_exceeded",
            ExecutorError::TooManyActions { .. } => "too_many_actions",
            ExecutorError::PoolClosed => "pool_closed",
            ExecutorError::GateClosed => "gate_closed",
            ExecutorError::Panicked(_) => "action_panicked",
            ExecutorError::Action(_) => "action_failed",
            ExecutorError::Config(_) => "config_invalid",
        }
    }
}

/// Cancellable execution context
pub mod context;

/// Action contract and named identities
pub mod action;

/// Base execution strategies
pub mod executor;

/// Executor decorators
pub mod decorator;

/// Metrics backend boundary and stat caching
pub mod stats;

/// Declarative executor stacks
pub mod config;

pub use action::{action_fn, named, Action, ActionFn, ActionRef, Named, NamedAction};
pub use config::{BuiltExecutor, ExecutorConfig};
pub use context::Context;
pub use executor::{Executor, ExecutorRef};

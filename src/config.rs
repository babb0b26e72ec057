//! Executor configuration
//!
//! [`ExecutorConfig`] describes an executor stack declaratively so it can be
//! loaded from a config file. Decorators are layered innermost-first:
//!
//! ```text
//!   Metrics( Debounce( ControlFlow( <strategy> ) ) )
//! ```
//!
//! Any layer that is not configured is skipped.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::decorator::{ControlFlow, Debounce, Metrics};
use crate::executor::{ExecutorRef, Parallel, Pool, PoolCloser, Sequential};
use crate::stats::StatSource;
use crate::Result;

/// Errors raised while validating or loading a configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A flow-control limit was zero
    #[error("flow control limit `{0}` must be positive")]
    ZeroLimit(&'static str),

    /// Metrics were requested without a stat source
    #[error("metrics enabled but no stat source provided")]
    MissingStatSource,

    /// The configuration could not be parsed
    #[error("invalid configuration: {0}")]
    Parse(String),
}

/// Base scheduling strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Strategy {
    /// Strict in-order execution
    Sequential,
    /// Unbounded fan-out
    #[default]
    Parallel,
    /// Fixed-size worker pool
    Pool {
        /// Worker count; zero uses the number of CPUs
        #[serde(default)]
        workers: usize,
    },
}

/// Admission limits for the flow-control layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowConfig {
    /// Maximum concurrent `execute` calls
    pub max_calls: usize,
    /// Maximum concurrent actions across all calls
    pub max_actions: usize,
}

/// Declarative description of an executor stack
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Base strategy
    pub strategy: Strategy,
    /// Flow-control limits; `None` disables the layer
    pub flow: Option<FlowConfig>,
    /// Coalesce concurrent identical named actions
    pub debounce: bool,
    /// Instrument actions through the provided stat source
    pub metrics: bool,
}

/// An executor stack built from an [`ExecutorConfig`]
pub struct BuiltExecutor {
    /// The outermost layer
    pub executor: ExecutorRef,
    /// Release capability when the base strategy is a pool
    pub closer: Option<PoolCloser>,
}

impl BuiltExecutor {
    /// Release the pool, if any
    pub fn close(self) {
        if let Some(closer) = self.closer {
            closer.close();
        }
    }
}

impl std::fmt::Debug for BuiltExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltExecutor")
            .field("has_pool", &self.closer.is_some())
            .finish_non_exhaustive()
    }
}

impl ExecutorConfig {
    /// Parse a configuration from JSON
    pub fn from_json(json: &str) -> std::result::Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check limits for consistency
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if let Some(flow) = &self.flow {
            if flow.max_calls == 0 {
                return Err(ConfigError::ZeroLimit("max_calls"));
            }
            if flow.max_actions == 0 {
                return Err(ConfigError::ZeroLimit("max_actions"));
            }
        }
        Ok(())
    }

    /// Build the configured stack
    ///
    /// Pool strategies spawn their workers here, so this must run inside a
    /// Tokio runtime.
    pub fn build(&self, stats: Option<Arc<dyn StatSource>>) -> Result<BuiltExecutor> {
        self.validate()?;
        let stats = match (self.metrics, stats) {
            (true, None) => return Err(ConfigError::MissingStatSource.into()),
            (true, Some(src)) => Some(src),
            (false, _) => None,
        };

        let (mut executor, closer): (ExecutorRef, Option<PoolCloser>) = match self.strategy {
            Strategy::Sequential => (Arc::new(Sequential), None),
            Strategy::Parallel => (Arc::new(Parallel), None),
            Strategy::Pool { workers } => {
                let (pool, closer) = Pool::new(workers);
                (Arc::new(pool), Some(closer))
            }
        };

        if let Some(flow) = self.flow {
            executor = Arc::new(ControlFlow::new(executor, flow.max_calls, flow.max_actions));
        }
        if self.debounce {
            executor = Arc::new(Debounce::new(executor));
        }
        if let Some(src) = stats {
            executor = Arc::new(Metrics::new(executor, src));
        }

        debug!(config = ?self, "executor stack built");
        Ok(BuiltExecutor { executor, closer })
    }
}

//! Executor decorators
//!
//! Each decorator wraps any [`Executor`](crate::Executor) and is itself an
//! executor, so policies layer freely:
//!
//! ```rust
//! use std::sync::Arc;
//! use actionflow::decorator::{ControlFlow, Debounce, Metrics};
//! use actionflow::executor::Pool;
//! use actionflow::stats::MemoryStatSource;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let (pool, closer) = Pool::new(4);
//! let exec = Metrics::new(
//!     Debounce::new(ControlFlow::new(pool, 8, 64)),
//!     Arc::new(MemoryStatSource::new()),
//! );
//! # drop(exec);
//! closer.close();
//! # }
//! ```

pub mod debounce;
pub mod flow;
pub mod metrics;

pub use debounce::Debounce;
pub use flow::ControlFlow;
pub use metrics::{Metrics, ALL_ACTIONS};

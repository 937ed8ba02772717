//! A small declarative pipeline engine.
//!
//! Pipelines are lists of `name: options` expressions. Each name resolves to
//! a [`Task`] in a [`Registry`]; all top-level tasks run concurrently and
//! their records are concatenated. The resulting [`Chain`] can be extended
//! with further tasks or builtin collection transforms before awaiting it.
//!
//! ```no_run
//! # async fn demo() -> chapipe::Result<()> {
//! use chapipe::{plugins, Pipeline, Registry};
//!
//! let mut registry = Registry::new();
//! plugins::register_defaults(&mut registry)?;
//!
//! let records = Pipeline::new(&registry)
//!     .run(["seq: 1..10", "json: [20, 30]"])?
//!     .call("sh", "sort -n")
//!     .last()
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod error;
pub mod logger;
pub mod pipeline;
pub mod plugins;
pub mod registry;
pub mod task;
pub mod transforms;
pub mod util;

pub use error::{Error, Result};
pub use logger::Logger;
pub use pipeline::{Chain, Expression, Pipeline};
pub use registry::Registry;
pub use task::{invoke, Record, Records, Run, Task};
pub use transforms::{Builtin, Iteratee};

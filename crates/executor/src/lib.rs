//! Request scheduling for the tabula resource pipeline.
//!
//! Every network fetch passes through a [`RequestScheduler`], which admits
//! tasks in the order they were scheduled and never lets more than a
//! configured budget of them run at once.
//!
//! ## Usage
//!
//! ```ignore
//! use tabula_executor::RequestScheduler;
//!
//! let scheduler = RequestScheduler::new(6);
//! let bytes = scheduler.schedule(async { fetch("https://cdn/a.png").await }).await?;
//! ```

mod scheduler;

pub use scheduler::{DEFAULT_CONCURRENCY, RequestScheduler, SchedulerError};

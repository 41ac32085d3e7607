//! Async runtime abstraction layer for the cloud save core.
//!
//! Every `core-*` and `bridge-*` crate reaches the executor through this crate
//! instead of depending on Tokio directly. The sync job runner only ever needs
//! a handful of primitives: spawning the per-run poll task, sleeping between
//! polls, async locks and channels, and a cooperative cancellation token.
//!
//! # Modules
//!
//! - `task`: Task spawning
//! - `time`: Sleep and timeouts
//! - `sync`: Locks, channels and [`CancellationToken`](sync::CancellationToken)
//! - `runtime`: `block_on` for synchronous entry points and tests
//!
//! # Examples
//!
//! ```rust
//! use core_async::task;
//! use core_async::time::{sleep, Duration};
//!
//! async fn example() {
//!     let handle = task::spawn(async {
//!         sleep(Duration::from_millis(250)).await;
//!         "polled"
//!     });
//!     assert_eq!(handle.await.unwrap(), "polled");
//! }
//! ```

// Re-export the async entry-point/test macros so downstream crates never need
// direct Tokio dependencies.
pub use core_async_macros::{main, test};

pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;

pub use task::spawn;
pub use time::{sleep, Duration, Instant};

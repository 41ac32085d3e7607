//! Runtime utilities that abstract over the underlying async executor.
//!
//! `block_on` drives a future on a fresh current-thread runtime. That is the
//! cooperative, single-threaded scheduling model the sync core is written
//! against: only one continuation runs at a time.

pub use tokio::runtime::{Builder, Handle, Runtime};

/// Runs the provided future to completion on a current-thread runtime.
///
/// # Panics
///
/// Panics if the runtime cannot be built (e.g. the OS refuses to create the
/// timer driver).
pub fn block_on<F>(future: F) -> F::Output
where
    F: std::future::Future,
{
    Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("core_async::runtime::block_on: failed to build Tokio runtime")
        .block_on(future)
}

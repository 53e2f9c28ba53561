//! Scoped release of scenario resources.
//!
//! Channels, sessions, and seeded fixtures must be released on every exit
//! path, including a panicking assertion inside the scenario body. Async code
//! has no async `Drop`, so the body runs under `catch_unwind`, the release
//! runs, and a captured panic is resumed afterwards.

use futures_util::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::{resume_unwind, AssertUnwindSafe};

/// Panic payload captured from a scenario body.
pub type Panic = Box<dyn Any + Send + 'static>;

/// Run `body`, capturing a panic instead of unwinding through the caller.
pub async fn guarded<T>(body: impl Future<Output = T>) -> Result<T, Panic> {
    AssertUnwindSafe(body).catch_unwind().await
}

/// Return the body's output, or resume its panic.
pub fn finish<T>(outcome: Result<T, Panic>) -> T {
    match outcome {
        Ok(value) => value,
        Err(panic) => resume_unwind(panic),
    }
}

/// Run `body`, then `release`, whatever the body did.
///
/// Use [`guarded`] and [`finish`] directly when the release needs a mutable
/// borrow the body also holds.
pub async fn scoped<T>(body: impl Future<Output = T>, release: impl Future<Output = ()>) -> T {
    let outcome = guarded(body).await;
    release.await;
    finish(outcome)
}

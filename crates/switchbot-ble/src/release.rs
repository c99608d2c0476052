//! Cleanup that survives cancellation
//!
//! The delivery coordinator bounds `connect` with a timeout and drops the
//! future when it fires. Anything opened inside that future (a running scan,
//! a link that came up before service discovery finished) is registered in a
//! [`ReleaseGuard`], which spawns the release on drop unless it was disarmed
//! or run inline first.

use std::future::Future;
use std::pin::Pin;

use tokio::runtime::Handle;
use tracing::warn;

type ReleaseFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Runs an async release once, inline or from `Drop`
pub(crate) struct ReleaseGuard {
    label: &'static str,
    release: Option<ReleaseFuture>,
}

impl ReleaseGuard {
    /// Arm a guard around `release`, which is not polled until needed
    pub(crate) fn new<F>(label: &'static str, release: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            label,
            release: Some(Box::pin(release)),
        }
    }

    /// The resource was handed off; nothing to release
    pub(crate) fn disarm(mut self) {
        self.release = None;
    }

    /// Release now and wait for it
    pub(crate) async fn release(mut self) {
        if let Some(release) = self.release.take() {
            release.await;
        }
    }
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        let Some(release) = self.release.take() else {
            return;
        };
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(release);
            }
            Err(_) => warn!("No runtime left to release abandoned {}", self.label),
        }
    }
}

//! Single-slot scheduled callback used for status polling.

use std::time::Duration;

use tokio::task::JoinHandle;

/// Holds at most one pending callback.
///
/// Arming replaces (and cancels) whatever was scheduled before, and dropping
/// the timer cancels the pending callback, so a controller can never leave
/// two polls in flight or a poll behind after teardown.
#[derive(Debug, Default)]
pub struct PollTimer {
    slot: Option<JoinHandle<()>>,
}

impl PollTimer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `on_fire` once after `delay`, cancelling any earlier schedule.
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm<F>(&mut self, delay: Duration, on_fire: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel();
        self.slot = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            on_fire();
        }));
    }

    /// Cancel the pending callback.
    ///
    /// Returns `true` if a callback was still waiting to fire.
    pub fn cancel(&mut self) -> bool {
        match self.slot.take() {
            Some(handle) => {
                let pending = !handle.is_finished();
                handle.abort();
                pending
            }
            None => false,
        }
    }

    /// `true` while a callback is scheduled and has not fired yet.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.slot.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for PollTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

// src/utils/throttler.rs
//! Trailing-edge throttler for bursty async work
//!
//! `schedule()` keeps a single pending slot. The first call of a burst arms a
//! timer; calls made before it fires replace the pending job, so at most one
//! run starts per window and it is always the most recent request. Calls made
//! while a job is running are kept and run after another window, so nothing
//! is dropped, only coalesced.

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

type Job = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

#[derive(Default)]
struct ThrottleState {
    /// Most recently scheduled job, not yet started
    pending: Option<Job>,

    /// A timer task owns the slot and will start `pending`
    armed: bool,
}

/// Coalescing scheduler with a fixed quiescence window
#[derive(Clone)]
pub struct Throttler {
    window: Duration,
    state: Arc<Mutex<ThrottleState>>,
}

impl Throttler {
    /// Create a throttler with the given window
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            state: Arc::new(Mutex::new(ThrottleState::default())),
        }
    }

    /// Whether a job is waiting for the timer
    pub fn has_pending(&self) -> bool {
        self.state.lock().pending.is_some()
    }

    /// Schedule `job`, replacing any job that has not started yet
    ///
    /// Must be called from within a Tokio runtime.
    pub fn schedule<F, Fut>(&self, job: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut state = self.state.lock();
        state.pending = Some(Box::new(move || job().boxed()));

        if state.armed {
            debug!("Throttled job coalesced into pending slot");
            return;
        }
        state.armed = true;
        drop(state);

        let state = Arc::clone(&self.state);
        let window = self.window;

        tokio::spawn(async move {
            loop {
                tokio::time::sleep(window).await;

                let job = {
                    let mut s = state.lock();
                    match s.pending.take() {
                        Some(job) => job,
                        None => {
                            s.armed = false;
                            break;
                        }
                    }
                };

                // `armed` stays set while running so new calls only fill the slot
                job().await;

                let idle = {
                    let mut s = state.lock();
                    if s.pending.is_none() {
                        s.armed = false;
                    }
                    !s.armed
                };
                if idle {
                    break;
                }
            }
        });
    }
}

impl std::fmt::Debug for Throttler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Throttler")
            .field("window", &self.window)
            .field("pending", &self.has_pending())
            .finish()
    }
}

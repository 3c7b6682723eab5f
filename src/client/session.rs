//! Session wrapper enforcing strictly sequential turns.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

use super::SessionHandle;
use crate::streaming::{self, EventReceiver, TurnSummary};
use crate::types::{AssistantMessage, SessionEvent};
use crate::{Error, Result};

/// How long a new turn waits for abandoned turns to go idle by default.
pub const DEFAULT_SETTLE_TIMEOUT: Duration = Duration::from_secs(10);

/// A session whose events are queued instead of pushed at a callback.
///
/// One handler is registered with the SDK session at construction; turns then
/// pull from the queue. A second turn started before the first reaches idle is
/// rejected with [`Error::TurnInProgress`]. `destroy` consumes the session, so
/// it cannot be used afterwards.
///
/// A turn dropped after its prompt went out (a timeout, usually) keeps running
/// inside the SDK. The session remembers that it still owes an idle event, and
/// the next turn discards everything up to that idle before sending. If it does
/// not arrive within the settle timeout the next turn is rejected with
/// [`Error::TurnInProgress`] instead.
pub struct ManagedSession<S> {
    inner: S,
    events: Mutex<EventReceiver>,
    busy: AtomicBool,
    stale_turns: AtomicUsize,
    settle_timeout: Duration,
}

/// Clears the busy flag when a turn ends, however it ends (including when the
/// turn future is dropped by a timeout).
struct TurnGuard<'a> {
    busy: &'a AtomicBool,
    stale_turns: &'a AtomicUsize,
    in_flight: bool,
}

impl TurnGuard<'_> {
    fn issued(&mut self) {
        self.in_flight = true;
    }

    fn finished(&mut self) {
        self.in_flight = false;
    }
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        if self.in_flight {
            // the SDK is still working on it; its idle event is owed
            self.stale_turns.fetch_add(1, Ordering::AcqRel);
        }
        self.busy.store(false, Ordering::Release);
    }
}

impl<S: SessionHandle> ManagedSession<S> {
    pub fn new(inner: S) -> Self {
        let (handler, rx) = streaming::event_channel();
        inner.on(handler);
        Self {
            inner,
            events: Mutex::new(rx),
            busy: AtomicBool::new(false),
            stale_turns: AtomicUsize::new(0),
            settle_timeout: DEFAULT_SETTLE_TIMEOUT,
        }
    }

    /// Bound the wait for abandoned turns before a new one is sent.
    pub fn with_settle_timeout(mut self, timeout: Duration) -> Self {
        self.settle_timeout = timeout;
        self
    }

    pub fn id(&self) -> &str {
        self.inner.id()
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Whether a turn is currently in flight.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Abandoned turns whose idle event has not been seen yet.
    pub fn stale_turns(&self) -> usize {
        self.stale_turns.load(Ordering::Acquire)
    }

    fn begin_turn(&self) -> Result<TurnGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::TurnInProgress {
                session_id: self.id().to_string(),
            })?;
        Ok(TurnGuard {
            busy: &self.busy,
            stale_turns: &self.stale_turns,
            in_flight: false,
        })
    }

    /// Wait for every abandoned turn to go idle, discarding its events.
    ///
    /// Fails with [`Error::TurnInProgress`] if they are still running after
    /// the settle timeout; the debt is kept for the next attempt.
    pub async fn settle(&self) -> Result<()> {
        let _turn = self.begin_turn()?;
        let mut rx = self.events.lock().await;
        self.settle_locked(&mut rx).await
    }

    async fn settle_locked(&self, rx: &mut EventReceiver) -> Result<()> {
        if self.stale_turns() == 0 {
            streaming::drain_pending(rx);
            return Ok(());
        }

        let deadline = Instant::now() + self.settle_timeout;
        let mut discarded = 0usize;
        while self.stale_turns() > 0 {
            match timeout_at(deadline, rx.recv()).await {
                Ok(Some(event)) => {
                    discarded += 1;
                    if event.is_idle() {
                        self.stale_turns.fetch_sub(1, Ordering::AcqRel);
                    }
                }
                Ok(None) => {
                    return Err(Error::session_closed(
                        "event stream ended while waiting for an abandoned turn",
                    ))
                }
                Err(_) => {
                    warn!(
                        session_id = self.id(),
                        owed = self.stale_turns(),
                        waited_ms = self.settle_timeout.as_millis() as u64,
                        "abandoned turn still running"
                    );
                    return Err(Error::TurnInProgress {
                        session_id: self.id().to_string(),
                    });
                }
            }
        }
        debug!(session_id = self.id(), discarded, "abandoned turns settled");
        streaming::drain_pending(rx);
        Ok(())
    }

    /// Send a prompt and consume its events until idle, calling `on_event` for
    /// each one in arrival order.
    pub async fn send_streaming<F>(&self, prompt: &str, on_event: F) -> Result<TurnSummary>
    where
        F: FnMut(&SessionEvent),
    {
        let mut turn = self.begin_turn()?;
        let mut rx = self.events.lock().await;
        self.settle_locked(&mut rx).await?;

        debug!(session_id = self.id(), "sending streaming turn");
        turn.issued();
        if let Err(e) = self.inner.send(prompt).await {
            turn.finished();
            return Err(e);
        }
        let summary = streaming::consume_turn(&mut rx, on_event).await;
        turn.finished();
        summary
    }

    /// Send a prompt and wait for the final assistant message.
    pub async fn send_and_wait(&self, prompt: &str) -> Result<AssistantMessage> {
        let mut turn = self.begin_turn()?;
        let mut rx = self.events.lock().await;
        self.settle_locked(&mut rx).await?;

        debug!(session_id = self.id(), "sending blocking turn");
        turn.issued();
        let reply = self.inner.send_and_wait(prompt).await;
        turn.finished();
        // nobody consumes these events; keep the queue from growing across turns
        streaming::drain_pending(&mut rx);
        reply
    }

    pub async fn destroy(self) -> Result<()> {
        debug!(session_id = self.id(), "destroying session");
        self.inner.destroy().await
    }
}

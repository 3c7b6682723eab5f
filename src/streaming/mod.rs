//! 流式事件模块：把回调式事件投递转换为队列，并按顺序消费一个回合的事件。
//!
//! # Streaming Turn Consumption
//!
//! The client SDK delivers events through a callback registered once per
//! session. [`event_channel`] turns that callback into a queue: the handler
//! pushes typed events, and the task driving the turn pulls them with
//! [`consume_turn`] until it sees [`SessionEvent::Idle`]. Returning from
//! `consume_turn` is the turn's completion signal, so there is no flag to set
//! or reset by hand.

use tokio::sync::mpsc;
use tracing::debug;

use crate::client::EventHandler;
use crate::types::SessionEvent;
use crate::{Error, Result};
use std::sync::Arc;

pub type EventReceiver = mpsc::UnboundedReceiver<SessionEvent>;

/// Create a handler/queue pair.
///
/// The handler never blocks and can be called from any thread; events sent
/// after the receiver is gone are dropped.
pub fn event_channel() -> (EventHandler, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handler: EventHandler = Arc::new(move |event: SessionEvent| {
        if tx.send(event).is_err() {
            debug!("event receiver dropped; discarding session event");
        }
    });
    (handler, rx)
}

/// Discard events still queued from an earlier, abandoned turn.
///
/// Returns how many were dropped.
pub fn drain_pending(rx: &mut EventReceiver) -> usize {
    let mut dropped = 0;
    while rx.try_recv().is_ok() {
        dropped += 1;
    }
    if dropped > 0 {
        debug!(dropped, "drained stale session events");
    }
    dropped
}

/// What a completed turn delivered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnSummary {
    /// Final assistant content (the full message if one was sent, else the joined deltas).
    pub content: String,
    /// Names of tools invoked during the turn, in order.
    pub tool_calls: Vec<String>,
    /// Number of events observed, including the idle event.
    pub events: usize,
    /// `session.error` messages reported during the turn.
    pub errors: Vec<String>,
}

#[derive(Default)]
struct TurnAccumulator {
    streamed: String,
    message: Option<String>,
    tool_calls: Vec<String>,
    events: usize,
    errors: Vec<String>,
}

impl TurnAccumulator {
    fn record(&mut self, event: &SessionEvent) {
        self.events += 1;
        match event {
            SessionEvent::MessageDelta { content } => self.streamed.push_str(content),
            SessionEvent::Message { content } => self.message = Some(content.clone()),
            SessionEvent::ToolExecutionStart { tool_name, .. } => {
                self.tool_calls.push(tool_name.clone())
            }
            SessionEvent::Error { message } => self.errors.push(message.clone()),
            SessionEvent::ToolExecutionComplete { .. } | SessionEvent::Idle => {}
        }
    }

    fn finish(self) -> TurnSummary {
        TurnSummary {
            content: self.message.unwrap_or(self.streamed),
            tool_calls: self.tool_calls,
            events: self.events,
            errors: self.errors,
        }
    }
}

/// Pull events for one turn, handing each to `on_event` in arrival order,
/// until the idle event.
///
/// A `session.error` event does not end the turn early: the loop keeps going
/// to idle so nothing from this turn leaks into the next one, then fails with
/// [`Error::Transient`]. A closed queue means the session went away mid-turn.
pub async fn consume_turn<F>(rx: &mut EventReceiver, mut on_event: F) -> Result<TurnSummary>
where
    F: FnMut(&SessionEvent),
{
    let mut acc = TurnAccumulator::default();
    loop {
        let event = rx
            .recv()
            .await
            .ok_or_else(|| Error::session_closed("event stream ended before the turn went idle"))?;

        on_event(&event);
        acc.record(&event);

        if event.is_idle() {
            let summary = acc.finish();
            if !summary.errors.is_empty() {
                return Err(Error::transient(summary.errors.join("; ")));
            }
            return Ok(summary);
        }
    }
}

//! Inbound event queues
//!
//! Discrete events are delivered with send-or-drop semantics: a full queue
//! drops the event instead of stalling the sender. Every queue also accepts
//! ad hoc [`Subscription`]s that tap the stream without consuming it.

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::AbortHandle;

use crate::event::Event;

/// Sending half of a block's inbound event queue
#[derive(Clone, Debug)]
pub struct EventSender {
    tx: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(tx: mpsc::Sender<Event>) -> Self {
        Self { tx }
    }

    /// Deliver `event` if there is room, otherwise drop it.
    ///
    /// Returns whether the event was queued.
    pub fn send_or_drop(&self, event: Event) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                tracing::trace!(kind = event.kind(), "event queue full, dropping event");
                false
            }
            Err(TrySendError::Closed(event)) => {
                tracing::trace!(kind = event.kind(), "event queue closed, dropping event");
                false
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// What a subscription filter decided about one event
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Verdict {
    /// Forward this event to the subscriber
    pub accept: bool,
    /// Remove the subscription after this event
    pub done: bool,
}

impl Verdict {
    pub const IGNORE: Verdict = Verdict {
        accept: false,
        done: false,
    };
    pub const ACCEPT: Verdict = Verdict {
        accept: true,
        done: false,
    };
    /// Accept this event and unsubscribe
    pub const LAST: Verdict = Verdict {
        accept: true,
        done: true,
    };
}

pub type Filter = Box<dyn FnMut(&Event) -> Verdict + Send>;

/// A tap on a block's inbound events
pub struct Subscription {
    filter: Filter,
    sender: mpsc::Sender<Event>,
}

impl Subscription {
    pub fn new<F>(filter: F, sender: mpsc::Sender<Event>) -> Self
    where
        F: FnMut(&Event) -> Verdict + Send + 'static,
    {
        Self {
            filter: Box::new(filter),
            sender,
        }
    }

    /// Offer an event. Returns whether the subscription stays registered.
    fn offer(&mut self, event: &Event) -> bool {
        if self.sender.is_closed() {
            return false;
        }
        let verdict = (self.filter)(event);
        if verdict.accept && self.sender.try_send(event.clone()).is_err() {
            tracing::trace!(kind = event.kind(), "subscriber full, dropping event");
        }
        !verdict.done
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

/// The three ends of a subscription queue
pub struct EventQueue {
    /// Send-or-drop inbound side
    pub sender: EventSender,
    /// What the owning block reads
    pub events: mpsc::Receiver<Event>,
    /// Where subscriptions are registered
    pub subscribe: mpsc::UnboundedSender<Subscription>,
    /// The pump task. It runs until the inbound side closes or this is
    /// aborted.
    pub pump: AbortHandle,
}

/// Build an inbound queue holding up to `capacity` events.
///
/// A pump task offers every event to the registered subscriptions and then
/// hands it to the block. Must be called inside a tokio runtime.
pub fn subscription_queue(capacity: usize) -> EventQueue {
    let (in_tx, mut in_rx) = mpsc::channel::<Event>(capacity.max(1));
    let (out_tx, out_rx) = mpsc::channel::<Event>(1);
    let (sub_tx, mut sub_rx) = mpsc::unbounded_channel::<Subscription>();

    let pump = tokio::spawn(async move {
        let mut subscriptions: Vec<Subscription> = Vec::new();
        loop {
            tokio::select! {
                biased;
                Some(sub) = sub_rx.recv() => subscriptions.push(sub),
                event = in_rx.recv() => {
                    let Some(event) = event else { break };
                    subscriptions.retain_mut(|sub| sub.offer(&event));
                    if out_tx.send(event).await.is_err() {
                        break;
                    }
                }
            }
        }
    })
    .abort_handle();

    EventQueue {
        sender: EventSender::new(in_tx),
        events: out_rx,
        subscribe: sub_tx,
        pump,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{CloseEvent, KeyFocusEvent};
    use std::time::Duration;

    fn close() -> Event {
        Event::Close(CloseEvent {
            when: Duration::ZERO,
        })
    }

    #[tokio::test]
    async fn test_send_or_drop_drops_when_full() {
        let (tx, mut rx) = mpsc::channel(1);
        let sender = EventSender::new(tx);
        assert!(sender.send_or_drop(close()));
        assert!(!sender.send_or_drop(close()));
        assert!(rx.recv().await.is_some());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_subscriber_sees_events_before_block() {
        let mut queue = subscription_queue(4);
        let (tap_tx, mut tap_rx) = mpsc::channel(4);
        queue
            .subscribe
            .send(Subscription::new(
                |e| match e {
                    Event::Close(_) => Verdict::LAST,
                    _ => Verdict::IGNORE,
                },
                tap_tx,
            ))
            .unwrap();
        tokio::task::yield_now().await;

        queue
            .sender
            .send_or_drop(Event::KeyFocus(KeyFocusEvent { focus: true }));
        queue.sender.send_or_drop(close());
        queue.sender.send_or_drop(close());

        assert!(matches!(queue.events.recv().await, Some(Event::KeyFocus(_))));
        assert!(matches!(queue.events.recv().await, Some(Event::Close(_))));
        assert!(matches!(queue.events.recv().await, Some(Event::Close(_))));

        // The subscription was removed after its first match.
        assert!(matches!(tap_rx.recv().await, Some(Event::Close(_))));
        assert!(tap_rx.recv().await.is_none());
    }
}

// src/exec/subscriber.rs

//! Per-invocation line subscription.
//!
//! The engine calls every subscriber once per output line, in the order the
//! lines reach its dispatch loop. Within one stream that is the order the
//! child wrote them; stdout and stderr may interleave arbitrarily.
//!
//! A [`Subscribers`] list is moved into a single invocation and dropped with
//! it, so nothing registered for one run can observe another.

use std::fmt;

use tokio::sync::mpsc;

use crate::types::OutputLine;

/// Receiver of line-received notifications.
pub trait LineSubscriber: Send {
    fn on_line(&mut self, line: &OutputLine);
}

impl<F> LineSubscriber for F
where
    F: FnMut(&OutputLine) + Send,
{
    fn on_line(&mut self, line: &OutputLine) {
        self(line)
    }
}

/// Forwards every line to a channel. A closed receiver is ignored.
#[derive(Debug, Clone)]
pub struct ChannelSubscriber {
    tx: mpsc::UnboundedSender<OutputLine>,
}

impl ChannelSubscriber {
    pub fn new(tx: mpsc::UnboundedSender<OutputLine>) -> Self {
        Self { tx }
    }
}

impl From<mpsc::UnboundedSender<OutputLine>> for ChannelSubscriber {
    fn from(tx: mpsc::UnboundedSender<OutputLine>) -> Self {
        Self::new(tx)
    }
}

impl LineSubscriber for ChannelSubscriber {
    fn on_line(&mut self, line: &OutputLine) {
        let _ = self.tx.send(line.clone());
    }
}

/// Ordered list of subscribers for one invocation.
#[derive(Default)]
pub struct Subscribers {
    inner: Vec<Box<dyn LineSubscriber + 'static>>,
}

impl Subscribers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`push`](Subscribers::push).
    pub fn with(mut self, subscriber: impl LineSubscriber + 'static) -> Self {
        self.push(subscriber);
        self
    }

    pub fn push(&mut self, subscriber: impl LineSubscriber + 'static) {
        self.inner.push(Box::new(subscriber));
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub(crate) fn notify(&mut self, line: &OutputLine) {
        for subscriber in self.inner.iter_mut() {
            subscriber.on_line(line);
        }
    }
}

impl fmt::Debug for Subscribers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscribers")
            .field("len", &self.inner.len())
            .finish()
    }
}

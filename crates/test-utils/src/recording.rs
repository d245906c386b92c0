use std::sync::{Arc, Mutex};

use toolrun::exec::LineSubscriber;
use toolrun::types::{OutputLine, OutputStream};

/// Subscriber that records every line it is handed.
///
/// Clones share the same buffer, so keep one clone in the test and move the
/// other into the invocation's `Subscribers`.
#[derive(Debug, Clone, Default)]
pub struct RecordingSubscriber {
    lines: Arc<Mutex<Vec<OutputLine>>>,
}

impl RecordingSubscriber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<OutputLine> {
        self.lines.lock().unwrap().clone()
    }

    /// Texts received from one stream, in delivery order.
    pub fn texts(&self, stream: OutputStream) -> Vec<String> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.stream == stream)
            .map(|l| l.text.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LineSubscriber for RecordingSubscriber {
    fn on_line(&mut self, line: &OutputLine) {
        self.lines.lock().unwrap().push(line.clone());
    }
}

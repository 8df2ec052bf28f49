//! Trace message fan-out.
//!
//! Each chip carries two independent observer sets: plain traces emitted by
//! the logic kind, and I/O traces emitted on every pin transition. Observers
//! are identified by name; the sinks themselves live in a [`DebugHub`] owned
//! by the registry, together with the per-observer pause flags.

use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;

/// Receives trace messages for one named observer.
pub trait DebugSink {
    fn receive(&self, message: &str);
}

/// Owns every registered sink and the pause flags. Paused observers stay
/// subscribed but receive nothing until resumed.
#[derive(Default)]
pub struct DebugHub {
    sinks: FxHashMap<SmolStr, Box<dyn DebugSink>>,
    paused: FxHashSet<SmolStr>,
}

impl DebugHub {
    pub fn new() -> Self {
        DebugHub::default()
    }

    pub fn register(&mut self, id: impl Into<SmolStr>, sink: Box<dyn DebugSink>) {
        self.sinks.insert(id.into(), sink);
    }

    pub fn unregister(&mut self, id: &str) -> bool {
        self.paused.remove(id);
        self.sinks.remove(id).is_some()
    }

    pub fn pause(&mut self, id: &str) {
        if self.sinks.contains_key(id) {
            self.paused.insert(SmolStr::new(id));
        }
    }

    pub fn resume(&mut self, id: &str) {
        self.paused.remove(id);
    }

    pub fn is_paused(&self, id: &str) -> bool {
        self.paused.contains(id)
    }

    /// Deliver to every subscribed observer that is registered and not
    /// paused.
    pub fn deliver(&self, observers: &[SmolStr], message: &str) {
        for id in observers {
            if self.paused.contains(id) {
                continue;
            }
            if let Some(sink) = self.sinks.get(id) {
                sink.receive(message);
            }
        }
    }
}

/// Per-chip observer subscriptions.
#[derive(Debug, Clone, Default)]
pub struct DebugChannel {
    debuggers: Vec<SmolStr>,
    io_debuggers: Vec<SmolStr>,
}

fn subscribe(list: &mut Vec<SmolStr>, id: SmolStr) -> bool {
    if list.contains(&id) {
        return false;
    }
    list.push(id);
    true
}

fn unsubscribe(list: &mut Vec<SmolStr>, id: &str) -> bool {
    match list.iter().position(|entry| entry == id) {
        Some(index) => {
            list.remove(index);
            true
        }
        None => false,
    }
}

impl DebugChannel {
    /// Returns false when the observer is already subscribed.
    pub fn subscribe(&mut self, id: impl Into<SmolStr>) -> bool {
        subscribe(&mut self.debuggers, id.into())
    }

    /// Returns false when the observer was not subscribed.
    pub fn unsubscribe(&mut self, id: &str) -> bool {
        unsubscribe(&mut self.debuggers, id)
    }

    pub fn subscribe_io(&mut self, id: impl Into<SmolStr>) -> bool {
        subscribe(&mut self.io_debuggers, id.into())
    }

    pub fn unsubscribe_io(&mut self, id: &str) -> bool {
        unsubscribe(&mut self.io_debuggers, id)
    }

    /// Check before building a message; an empty set means nobody listens.
    pub fn has_debuggers(&self) -> bool {
        !self.debuggers.is_empty()
    }

    pub fn has_io_debuggers(&self) -> bool {
        !self.io_debuggers.is_empty()
    }

    pub(crate) fn debuggers(&self) -> &[SmolStr] {
        &self.debuggers
    }

    pub(crate) fn io_debuggers(&self) -> &[SmolStr] {
        &self.io_debuggers
    }
}

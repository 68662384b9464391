//! Runtime configuration

use crate::canvas::Color;

/// Settings shared by every block created with them
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    /// Capacity of each block's inbound event queue. Events beyond this are
    /// dropped.
    pub event_queue_capacity: usize,
    /// Color the default paint clears to
    pub background: Color,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            event_queue_capacity: 20,
            background: Color::WHITE,
        }
    }
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event_queue_capacity(mut self, capacity: usize) -> Self {
        self.event_queue_capacity = capacity;
        self
    }

    pub fn background(mut self, color: Color) -> Self {
        self.background = color;
        self
    }
}

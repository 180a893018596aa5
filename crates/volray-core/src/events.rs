//! In-process event queue between the models and the renderer.
//!
//! Producers push during input handling; the viewer drains the queue once
//! per frame before drawing.

use std::collections::VecDeque;

use crate::interaction::Intent;

/// FIFO of pending events.
#[derive(Debug, Clone, PartialEq)]
pub struct EventQueue<T = Intent> {
    pending: VecDeque<T>,
}

impl<T> Default for EventQueue<T> {
    fn default() -> Self {
        Self {
            pending: VecDeque::new(),
        }
    }
}

impl<T> EventQueue<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: T) {
        self.pending.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Removes and yields every pending event in arrival order.
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.pending.drain(..)
    }
}

impl<T> Extend<T> for EventQueue<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.pending.extend(iter);
    }
}

impl EventQueue<Intent> {
    /// Whether any pending intent asks for a new frame.
    pub fn wants_redraw(&self) -> bool {
        self.pending.iter().any(|i| matches!(i, Intent::Redraw))
    }
}

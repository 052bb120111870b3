//! Latched window signals.
//!
//! The frame scheduler needs exactly two facts from the event loop: whether a
//! resize happened since the last tick, and whether the user asked to close.
//! Rather than threading window events through the engine, the event handler
//! sets these flags and the render loop consumes them once per tick.

/// Latched flags produced by the window event handler.
#[derive(Debug, Default)]
pub struct WindowSignals {
    resized: bool,
    close_requested: bool,
}

impl WindowSignals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latch a resize. Stays set until [`take_resized`](Self::take_resized).
    pub fn notify_resized(&mut self) {
        self.resized = true;
    }

    /// Latch a close request. Never cleared.
    pub fn notify_close_requested(&mut self) {
        self.close_requested = true;
    }

    /// Consume the resize latch, clearing it.
    pub fn take_resized(&mut self) -> bool {
        std::mem::take(&mut self.resized)
    }

    pub fn close_requested(&self) -> bool {
        self.close_requested
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_latch_is_consumed_once() {
        let mut signals = WindowSignals::new();
        assert!(!signals.take_resized());

        signals.notify_resized();
        signals.notify_resized();
        assert!(signals.take_resized());
        assert!(!signals.take_resized());
    }

    #[test]
    fn close_request_is_sticky() {
        let mut signals = WindowSignals::new();
        assert!(!signals.close_requested());
        signals.notify_close_requested();
        assert!(signals.close_requested());
        assert!(signals.close_requested());
    }
}

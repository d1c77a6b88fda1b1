//! Recording hook.
//!
//! The core does not capture anything itself; hosts attach a [`Recorder`]
//! (screen capture, frame dump) and the controller starts it with the race when
//! `autoRecording` is set, then stops it shortly after the winner is resolved.

use std::cell::RefCell;
use std::rc::Rc;

/// Capture sink driven by the race lifecycle.
pub trait Recorder {
    fn start(&mut self);
    fn stop(&mut self);
}

/// Shared recorder, so the host keeps a handle to the one it attached.
impl<R: Recorder> Recorder for Rc<RefCell<R>> {
    fn start(&mut self) {
        self.borrow_mut().start();
    }

    fn stop(&mut self) {
        self.borrow_mut().stop();
    }
}

/// Recorder that only tracks whether it is running. Useful for headless hosts
/// that want to know the capture window without capturing.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecordingWindow {
    pub recording: bool,
    pub sessions: u32,
}

impl Recorder for RecordingWindow {
    fn start(&mut self) {
        if !self.recording {
            self.recording = true;
            self.sessions += 1;
        }
    }

    fn stop(&mut self) {
        self.recording = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_counts_sessions() {
        let mut window = RecordingWindow::default();
        window.start();
        window.start();
        assert!(window.recording);
        assert_eq!(window.sessions, 1);
        window.stop();
        window.start();
        assert_eq!(window.sessions, 2);
    }
}

//! Host frame scheduling and cancellable deferred actions.
//!
//! The race loop is a self-rescheduling callback: every
//! [`on_frame`](crate::race::RaceController::on_frame) ends by requesting the
//! next frame from the host. Nothing runs in the background; delayed side
//! effects are queued here and drained at the start of a frame.

use crate::marble::MarbleId;

/// Identifies one requested frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub u64);

/// Host hook that delivers frame callbacks (a display refresh, a game loop).
pub trait FrameScheduler {
    /// Requests one callback. The host later calls `on_frame` with the handle.
    fn request_frame(&mut self) -> FrameHandle;

    /// Withdraws a requested callback.
    fn cancel_frame(&mut self, handle: FrameHandle);
}

/// Scheduler for headless hosts and tests: frames are delivered by the caller.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    next: u64,
    pending: Option<FrameHandle>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> Option<FrameHandle> {
        self.pending
    }

    /// Takes the outstanding request so the caller can deliver it.
    pub fn take_pending(&mut self) -> Option<FrameHandle> {
        self.pending.take()
    }
}

impl FrameScheduler for ManualScheduler {
    fn request_frame(&mut self) -> FrameHandle {
        self.next += 1;
        let handle = FrameHandle(self.next);
        self.pending = Some(handle);
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        if self.pending == Some(handle) {
            self.pending = None;
        }
    }
}

/// Side effect that runs after a delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredAction {
    /// Drop a finished marble's body from the backend.
    RemoveMarble(MarbleId),
    /// Stop the attached recorder after the celebration.
    StopRecorder,
}

#[derive(Debug, Clone)]
struct Timer {
    due: f64,
    seq: u64,
    action: DeferredAction,
}

/// Queue of delayed actions keyed by host time in seconds.
#[derive(Debug, Default)]
pub struct DeferredTimers {
    timers: Vec<Timer>,
    next_seq: u64,
}

impl DeferredTimers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, now: f64, delay: f64, action: DeferredAction) {
        self.timers.push(Timer {
            due: now + delay,
            seq: self.next_seq,
            action,
        });
        self.next_seq += 1;
    }

    /// Removes and returns every action due at `now`, earliest first. Actions
    /// due at the same instant keep their scheduling order.
    pub fn drain_due(&mut self, now: f64) -> Vec<DeferredAction> {
        let (mut due, pending): (Vec<Timer>, Vec<Timer>) =
            self.timers.drain(..).partition(|timer| timer.due <= now);
        self.timers = pending;
        due.sort_by(|a, b| a.due.total_cmp(&b.due).then(a.seq.cmp(&b.seq)));
        due.into_iter().map(|timer| timer.action).collect()
    }

    pub fn clear(&mut self) {
        self.timers.clear();
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

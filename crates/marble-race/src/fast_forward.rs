//! Hold-to-fast-forward speed multiplier.

/// Simulated-time multiplier: `1` normally, the configured boost while held.
///
/// The controller multiplies real elapsed time by [`speed`](Self::speed) before
/// accumulating it, so more fixed steps run per frame while step length and
/// fidelity stay unchanged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FastForwardModifier {
    boost: f32,
    held: bool,
}

impl Default for FastForwardModifier {
    fn default() -> Self {
        Self::new(4.0)
    }
}

impl FastForwardModifier {
    pub fn new(boost: f32) -> Self {
        Self { boost, held: false }
    }

    pub fn speed(&self) -> f32 {
        if self.held { self.boost } else { 1.0 }
    }

    pub fn is_held(&self) -> bool {
        self.held
    }

    pub fn hold(&mut self) {
        self.held = true;
    }

    pub fn release(&mut self) {
        self.held = false;
    }

    pub fn set_held(&mut self, held: bool) {
        self.held = held;
    }
}

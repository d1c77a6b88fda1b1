//! Race notifications and the observer registry hosts subscribe through.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Notification dispatched by the race controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RaceEvent {
    /// The marble at the winning rank finished. Fired at most once per race.
    Goal { winner: String },
    /// Marbles were woken and the clock started.
    Started { count: usize },
    /// A marble crossed the goal line. `rank` is its zero-based finish position.
    MarbleFinished { name: String, rank: usize },
    /// The race was reset and the stage reloaded.
    Reset,
}

impl RaceEvent {
    pub fn kind(&self) -> RaceEventKind {
        match self {
            Self::Goal { .. } => RaceEventKind::Goal,
            Self::Started { .. } => RaceEventKind::Start,
            Self::MarbleFinished { .. } => RaceEventKind::Finish,
            Self::Reset => RaceEventKind::Reset,
        }
    }
}

/// Event name used for subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaceEventKind {
    Goal,
    Start,
    Finish,
    Reset,
}

impl RaceEventKind {
    pub const ALL: [Self; 4] = [Self::Goal, Self::Start, Self::Finish, Self::Reset];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Goal => "goal",
            Self::Start => "start",
            Self::Finish => "finish",
            Self::Reset => "reset",
        }
    }

    /// Looks up a kind by its event name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl fmt::Display for RaceEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&RaceEvent)>;

/// Callback registry keyed by event kind. Listeners run synchronously in
/// subscription order.
#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    listeners: Vec<(SubscriptionId, RaceEventKind, Listener)>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &mut self,
        kind: RaceEventKind,
        listener: impl FnMut(&RaceEvent) + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, kind, Box::new(listener)));
        id
    }

    /// Removes a listener. Returns `false` if it was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sub, _, _)| *sub != id);
        self.listeners.len() != before
    }

    pub fn emit(&mut self, event: &RaceEvent) {
        let kind = event.kind();
        for (_, _, listener) in self.listeners.iter_mut().filter(|(_, k, _)| *k == kind) {
            listener(event);
        }
    }

    pub fn listener_count(&self, kind: RaceEventKind) -> usize {
        self.listeners.iter().filter(|(_, k, _)| *k == kind).count()
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn test_dispatch_by_kind() {
        let mut bus = EventBus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let sink = Rc::clone(&seen);
        bus.subscribe(RaceEventKind::Goal, move |event| sink.borrow_mut().push(event.clone()));

        bus.emit(&RaceEvent::Started { count: 3 });
        bus.emit(&RaceEvent::Goal {
            winner: "Alice".to_string(),
        });

        assert_eq!(
            *seen.borrow(),
            vec![RaceEvent::Goal {
                winner: "Alice".to_string()
            }]
        );
    }

    #[test]
    fn test_unsubscribe() {
        let mut bus = EventBus::new();
        let count = Rc::new(RefCell::new(0));

        let sink = Rc::clone(&count);
        let id = bus.subscribe(RaceEventKind::Reset, move |_| *sink.borrow_mut() += 1);
        bus.emit(&RaceEvent::Reset);

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.emit(&RaceEvent::Reset);

        assert_eq!(*count.borrow(), 1);
        assert_eq!(bus.listener_count(RaceEventKind::Reset), 0);
    }

    #[test]
    fn test_kind_names() {
        for kind in RaceEventKind::ALL {
            assert_eq!(RaceEventKind::from_name(kind.as_str()), Some(kind));
        }
        assert_eq!(RaceEventKind::from_name("nope"), None);
        assert_eq!(RaceEventKind::Goal.to_string(), "goal");
    }
}

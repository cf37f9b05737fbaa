//! Typed game events
//!
//! Events are owned by the composing root rather than broadcast through a
//! global bus. Each concern gets its own [`GameEvent`] variant so payload
//! shapes are checked by the compiler.
//!
//! - Handler returns bool (true = consumed, stops forwarding)
//! - Registration by [`EventKind`] (only interested handlers are notified)
//! - Immediate and time-deferred delivery

use std::collections::{BTreeMap, HashMap};

use crate::foundation::math::Vec2;

/// Event payloads
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    /// A new level became current; the camera recentres on `start`
    LevelChanged {
        /// Spawn point of the new level
        start: Vec2,
    },
    /// The camera target moved to a world position
    TargetMoved(Vec2),
    /// State published for remote peers
    PositionUpdate {
        /// World position
        position: Vec2,
        /// Current animation name
        animation: String,
        /// Facing direction
        facing: String,
        /// Level the entity is in
        level_id: String,
    },
    /// Attribute snapshot published for remote peers
    AttributeUpdate {
        /// Attribute values by name
        attributes: BTreeMap<String, f64>,
    },
}

impl GameEvent {
    /// Registration key of this event
    pub fn kind(&self) -> EventKind {
        match self {
            Self::LevelChanged { .. } => EventKind::LevelChanged,
            Self::TargetMoved(_) => EventKind::TargetMoved,
            Self::PositionUpdate { .. } => EventKind::PositionUpdate,
            Self::AttributeUpdate { .. } => EventKind::AttributeUpdate,
        }
    }
}

/// Event type identification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// [`GameEvent::LevelChanged`]
    LevelChanged,
    /// [`GameEvent::TargetMoved`]
    TargetMoved,
    /// [`GameEvent::PositionUpdate`]
    PositionUpdate,
    /// [`GameEvent::AttributeUpdate`]
    AttributeUpdate,
}

/// Event handler trait
///
/// Returns true if the event was consumed, false to let it reach the next
/// handler registered for the same kind.
pub trait EventHandler {
    /// Handle an event, return true if consumed
    fn on_event(&mut self, event: &GameEvent) -> bool;
}

impl<F: FnMut(&GameEvent) -> bool> EventHandler for F {
    fn on_event(&mut self, event: &GameEvent) -> bool {
        self(event)
    }
}

/// Event queue with registration and deferred delivery
#[derive(Default)]
pub struct EventSystem {
    immediate_queue: Vec<GameEvent>,
    deferred_queue: Vec<(f64, GameEvent)>,
    handlers: HashMap<EventKind, Vec<Box<dyn EventHandler>>>,
    current_time_ms: f64,
}

impl EventSystem {
    /// Create a new empty event system
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the clock used for deferred delivery
    pub fn advance_time(&mut self, delta_ms: f64) {
        self.current_time_ms += delta_ms;
    }

    /// Milliseconds since creation
    pub fn current_time_ms(&self) -> f64 {
        self.current_time_ms
    }

    /// Register a handler for one kind of event
    pub fn register_handler(&mut self, kind: EventKind, handler: Box<dyn EventHandler>) {
        self.handlers.entry(kind).or_default().push(handler);
    }

    /// Queue an event for this frame
    pub fn send(&mut self, event: GameEvent) {
        self.immediate_queue.push(event);
    }

    /// Queue an event for delivery `delay_ms` from now
    pub fn post(&mut self, delay_ms: f64, event: GameEvent) {
        let due = self.current_time_ms + delay_ms;
        // Keep the queue ordered by due time, FIFO among equal times
        let index = self.deferred_queue.partition_point(|(t, _)| *t <= due);
        self.deferred_queue.insert(index, (due, event));
    }

    /// Number of queued events, deferred included
    pub fn pending(&self) -> usize {
        self.immediate_queue.len() + self.deferred_queue.len()
    }

    /// Take immediate events, then deferred events that are due
    pub fn drain_due(&mut self) -> Vec<GameEvent> {
        let mut due = std::mem::take(&mut self.immediate_queue);
        let ready = self.deferred_queue.partition_point(|(t, _)| *t <= self.current_time_ms);
        due.extend(self.deferred_queue.drain(..ready).map(|(_, event)| event));
        due
    }

    /// Offer one event to registered handlers; returns true if consumed
    pub fn forward(&mut self, event: &GameEvent) -> bool {
        let Some(handlers) = self.handlers.get_mut(&event.kind()) else {
            return false;
        };
        handlers.iter_mut().any(|handler| handler.on_event(event))
    }

    /// Deliver every due event to registered handlers
    pub fn dispatch(&mut self) {
        for event in self.drain_due() {
            self.forward(&event);
        }
    }

    /// Clear all queued events (used on level transitions)
    pub fn clear(&mut self) {
        self.immediate_queue.clear();
        self.deferred_queue.clear();
    }
}

impl std::fmt::Debug for EventSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSystem")
            .field("immediate", &self.immediate_queue.len())
            .field("deferred", &self.deferred_queue.len())
            .field("handler_kinds", &self.handlers.len())
            .field("current_time_ms", &self.current_time_ms)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recorder(log: &Rc<RefCell<Vec<String>>>, tag: &'static str, consume: bool) -> Box<dyn EventHandler> {
        let log = Rc::clone(log);
        Box::new(move |event: &GameEvent| {
            log.borrow_mut().push(format!("{tag}:{:?}", event.kind()));
            consume
        })
    }

    #[test]
    fn test_immediate_dispatch() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut system = EventSystem::new();
        system.register_handler(EventKind::TargetMoved, recorder(&log, "a", false));

        system.send(GameEvent::TargetMoved(Vec2::new(4.0, 2.0)));
        system.send(GameEvent::LevelChanged { start: Vec2::zeros() });
        system.dispatch();

        assert_eq!(*log.borrow(), vec!["a:TargetMoved"]);
        assert_eq!(system.pending(), 0);
    }

    #[test]
    fn test_deferred_dispatch() {
        let mut system = EventSystem::new();
        system.post(1000.0, GameEvent::TargetMoved(Vec2::new(1.0, 0.0)));
        system.post(500.0, GameEvent::TargetMoved(Vec2::new(2.0, 0.0)));

        system.advance_time(400.0);
        assert!(system.drain_due().is_empty());

        system.advance_time(100.0);
        assert_eq!(system.drain_due(), vec![GameEvent::TargetMoved(Vec2::new(2.0, 0.0))]);

        system.advance_time(500.0);
        assert_eq!(system.drain_due().len(), 1);
        assert_eq!(system.pending(), 0);
    }

    #[test]
    fn test_event_consumption() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut system = EventSystem::new();
        system.register_handler(EventKind::AttributeUpdate, recorder(&log, "first", true));
        system.register_handler(EventKind::AttributeUpdate, recorder(&log, "second", false));

        let mut attributes = BTreeMap::new();
        attributes.insert("health".to_string(), 100.0);
        assert!(system.forward(&GameEvent::AttributeUpdate { attributes }));
        assert_eq!(*log.borrow(), vec!["first:AttributeUpdate"]);
    }

    #[test]
    fn test_clear_drops_queued_events() {
        let mut system = EventSystem::new();
        system.send(GameEvent::TargetMoved(Vec2::zeros()));
        system.post(10.0, GameEvent::TargetMoved(Vec2::zeros()));
        system.clear();
        system.advance_time(20.0);
        assert!(system.drain_due().is_empty());
    }
}

//! Event system for editor notifications.
//!
//! ## Learning: Synchronous Fan-out with `Rc<dyn Fn>`
//!
//! Plugins react to events by calling straight back into the editor
//! (executing a command, saving the selection) within the same turn.
//! Subscribers are therefore plain callbacks invoked synchronously, in
//! registration order.
//!
//! Key points:
//! - Callbacks are `Rc<dyn Fn>`, so `off` can match by identity
//! - The subscriber list is cloned before delivery; callbacks may
//!   subscribe, unsubscribe or trigger other events re-entrantly
//! - Each callback runs inside [`guarded`], so one failing subscriber
//!   never stops delivery to the rest

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::guard::guarded;
use crate::input::KeyEvent;

/// Semantic event names.
///
/// ## Learning: Enum Variants
///
/// The built-in vocabulary is matched exhaustively; plugins publish their
/// own events through `Custom`. Always build names with `From<&str>` so a
/// built-in name never ends up as a `Custom` duplicate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventName {
    /// Document content changed
    Change,
    /// Selection moved or content under it changed
    SelectionChange,
    /// A key was pressed on the surface
    KeyDown,
    /// A key was released on the surface
    KeyUp,
    /// A pointer button was released on the surface
    MouseUp,
    /// The surface received focus
    Focus,
    /// The surface lost focus
    Blur,
    /// Initialization finished
    Ready,
    /// Teardown is starting
    Destroy,
    /// Any other (plugin-defined) event
    Custom(String),
}

impl EventName {
    /// The wire name of the event.
    pub fn as_str(&self) -> &str {
        match self {
            EventName::Change => "change",
            EventName::SelectionChange => "selection-change",
            EventName::KeyDown => "keydown",
            EventName::KeyUp => "keyup",
            EventName::MouseUp => "mouseup",
            EventName::Focus => "focus",
            EventName::Blur => "blur",
            EventName::Ready => "ready",
            EventName::Destroy => "destroy",
            EventName::Custom(name) => name,
        }
    }
}

impl From<&str> for EventName {
    fn from(name: &str) -> Self {
        match name {
            "change" => EventName::Change,
            "selection-change" => EventName::SelectionChange,
            "keydown" => EventName::KeyDown,
            "keyup" => EventName::KeyUp,
            "mouseup" => EventName::MouseUp,
            "focus" => EventName::Focus,
            "blur" => EventName::Blur,
            "ready" => EventName::Ready,
            "destroy" => EventName::Destroy,
            other => EventName::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Data delivered with an event.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum EventPayload {
    /// No data
    #[default]
    None,
    /// The key behind a keyboard event
    Key(KeyEvent),
    /// A string (plugin-defined)
    Text(String),
    /// Structured data (plugin-defined)
    Value(serde_json::Value),
}

/// A subscriber callback. Returning `Err` (or panicking) is logged and
/// contained.
pub type Subscriber = Rc<dyn Fn(&EventPayload) -> anyhow::Result<()>>;

/// Wraps a closure as a [`Subscriber`].
pub fn subscriber<F>(f: F) -> Subscriber
where
    F: Fn(&EventPayload) -> anyhow::Result<()> + 'static,
{
    Rc::new(f)
}

/// Named-event publish/subscribe.
///
/// Cloning an `EventBus` yields another handle to the same table.
#[derive(Clone, Default)]
pub struct EventBus {
    table: Rc<RefCell<HashMap<EventName, Vec<Subscriber>>>>,
}

impl EventBus {
    /// Creates a new event bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callback. The same callback may be registered twice and
    /// then fires twice.
    pub fn on(&self, event: impl Into<EventName>, callback: Subscriber) {
        self.table
            .borrow_mut()
            .entry(event.into())
            .or_default()
            .push(callback);
    }

    /// Removes every registration of `callback` for `event`.
    pub fn off(&self, event: impl Into<EventName>, callback: &Subscriber) {
        let event = event.into();
        let mut table = self.table.borrow_mut();
        if let Some(list) = table.get_mut(&event) {
            list.retain(|cb| !Rc::ptr_eq(cb, callback));
            if list.is_empty() {
                table.remove(&event);
            }
        }
    }

    /// Delivers `payload` to every subscriber of `event`, in order.
    pub fn trigger(&self, event: impl Into<EventName>, payload: &EventPayload) {
        let event = event.into();
        let callbacks: Vec<Subscriber> = match self.table.borrow().get(&event) {
            Some(list) => list.clone(),
            None => return,
        };

        for callback in callbacks {
            guarded(format_args!("event handler for '{}'", event), || {
                callback(payload)
            });
        }
    }

    /// Number of registrations for `event`.
    pub fn subscriber_count(&self, event: impl Into<EventName>) -> usize {
        self.table
            .borrow()
            .get(&event.into())
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Drops every subscription.
    pub fn clear(&self) {
        self.table.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn recorder(log: &Rc<RefCell<Vec<String>>>, tag: &'static str) -> Subscriber {
        let log = Rc::clone(log);
        subscriber(move |payload| {
            log.borrow_mut().push(format!("{tag}:{payload:?}"));
            Ok(())
        })
    }

    #[test]
    fn test_delivery_order() {
        let bus = EventBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        bus.on("change", recorder(&log, "a"));
        bus.on(EventName::Change, recorder(&log, "b"));

        bus.trigger("change", &EventPayload::Text("x".into()));
        assert_eq!(*log.borrow(), vec![r#"a:Text("x")"#, r#"b:Text("x")"#]);
    }

    #[test]
    fn test_failing_subscriber_is_isolated() {
        let bus = EventBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        bus.on("change", recorder(&log, "first"));
        bus.on("change", subscriber(|_| anyhow::bail!("second fails")));
        bus.on("change", subscriber(|_| panic!("second panics too")));
        bus.on("change", recorder(&log, "third"));

        bus.trigger("change", &EventPayload::Text("x".into()));
        assert_eq!(
            *log.borrow(),
            vec![r#"first:Text("x")"#, r#"third:Text("x")"#]
        );
    }

    #[test]
    fn test_duplicate_registration_fires_twice_and_off_removes_all() {
        let bus = EventBus::new();
        let count = Rc::new(Cell::new(0));
        let counter = {
            let count = Rc::clone(&count);
            subscriber(move |_| {
                count.set(count.get() + 1);
                Ok(())
            })
        };

        bus.on("ready", counter.clone());
        bus.on("ready", counter.clone());
        bus.trigger("ready", &EventPayload::None);
        assert_eq!(count.get(), 2);

        bus.off("ready", &counter);
        bus.trigger("ready", &EventPayload::None);
        assert_eq!(count.get(), 2);
        assert_eq!(bus.subscriber_count("ready"), 0);
    }

    #[test]
    fn test_off_unknown_is_noop() {
        let bus = EventBus::new();
        let cb = subscriber(|_| Ok(()));
        bus.off("nothing", &cb);
        bus.on("change", cb.clone());
        bus.off("change", &subscriber(|_| Ok(())));
        assert_eq!(bus.subscriber_count("change"), 1);
    }

    #[test]
    fn test_reentrant_subscribe_during_trigger() {
        let bus = EventBus::new();
        let inner_bus = bus.clone();
        bus.on(
            "change",
            subscriber(move |_| {
                inner_bus.on("change", subscriber(|_| Ok(())));
                inner_bus.trigger("custom-event", &EventPayload::None);
                Ok(())
            }),
        );

        bus.trigger("change", &EventPayload::None);
        assert_eq!(bus.subscriber_count("change"), 2);
    }

    #[test]
    fn test_custom_names_normalize() {
        assert_eq!(EventName::from("selection-change"), EventName::SelectionChange);
        assert_eq!(
            EventName::from("autosave:saved"),
            EventName::Custom("autosave:saved".into())
        );
        assert_eq!(EventName::KeyDown.to_string(), "keydown");
    }
}

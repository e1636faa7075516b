//! Change events and RAII subscriptions.
//!
//! [`Listeners`] is the notification primitive shared by records and record
//! sets. Subscribers are stored as `Weak` callbacks and cleaned up lazily
//! during notification; the strong reference lives inside the
//! [`Subscription`] returned to the caller, so dropping the guard is the
//! unsubscribe.
//!
//! # Invariants
//!
//! 1. Subscribers are notified in registration order.
//! 2. Dropping a [`Subscription`] silences its callback immediately — even
//!    for a notification already in flight in the same synchronous turn.
//! 3. A callback may subscribe, unsubscribe, or emit again; notification
//!    never holds a borrow across a callback invocation.
//!
//! # Failure Modes
//!
//! | Failure | Behavior |
//! |---------|----------|
//! | Emit with no subscribers | No-op |
//! | Callback panics | Propagates to the emitter's caller |
//! | Subscription outlives the emitter | Guard drop is a no-op |

use std::any::Any;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use serde_json::Value;

type SubscriberFn<E> = Box<dyn Fn(&E)>;

/// A change notification from a single record: one field took a new value.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordEvent {
    /// Id of the record that changed.
    pub record: String,
    /// The field that changed.
    pub field: String,
    /// The new value of the field.
    pub value: Value,
}

/// A change notification from a record set.
#[derive(Clone, Debug, PartialEq)]
pub enum SourceEvent {
    /// A record was appended to the set.
    RecordAdded(String),
    /// A record was removed from the set.
    RecordRemoved(String),
    /// The whole record set was replaced.
    Reset,
    /// A field of one of the set's records changed.
    RecordChanged(RecordEvent),
}

/// RAII subscription guard.
///
/// Holds the only strong reference to the subscriber callback; dropping the
/// guard makes the emitter's weak reference dead, so the callback can never
/// fire again.
pub struct Subscription {
    _keep: Rc<dyn Any>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish()
    }
}

/// Weakly-held subscriber list for one event type.
pub struct Listeners<E> {
    subscribers: RefCell<Vec<Weak<SubscriberFn<E>>>>,
}

impl<E> Default for Listeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for Listeners<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("subscribers", &self.len())
            .finish()
    }
}

impl<E> Listeners<E> {
    /// Create an empty subscriber list.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscribers: RefCell::new(Vec::new()),
        }
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscribers
            .borrow()
            .iter()
            .filter(|s| s.strong_count() > 0)
            .count()
    }

    /// Whether no live subscriber remains.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E: 'static> Listeners<E> {
    /// Register a callback. The callback stays live for as long as the
    /// returned [`Subscription`] is held.
    pub fn subscribe(&self, callback: impl Fn(&E) + 'static) -> Subscription {
        let callback: Rc<SubscriberFn<E>> = Rc::new(Box::new(callback));
        self.subscribers
            .borrow_mut()
            .push(Rc::downgrade(&callback));
        Subscription { _keep: callback }
    }

    /// Notify every live subscriber, in registration order.
    ///
    /// Dispatch runs over a snapshot: callbacks may freely subscribe or
    /// unsubscribe, and a subscriber dropped by an earlier callback of the
    /// same turn is skipped.
    pub fn emit(&self, event: &E) {
        let snapshot: Vec<Weak<SubscriberFn<E>>> = self.subscribers.borrow().clone();
        for subscriber in snapshot {
            if let Some(callback) = subscriber.upgrade() {
                callback(event);
            }
        }
        self.subscribers
            .borrow_mut()
            .retain(|s| s.strong_count() > 0);
    }
}

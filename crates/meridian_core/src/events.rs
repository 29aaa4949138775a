//! # Event Bus
//!
//! Synchronous publish/subscribe over a closed set of events.
//!
//! ## Subscriptions
//!
//! - `on` returns a [`SubscriptionId`] used to unsubscribe
//! - `limit` removes the subscription after N deliveries (`once` = 1)
//! - `expires_at` is a deadline on the tick clock, checked by [`EventBus::expire`]
//! - `unique` replaces every existing subscription of the same kind
//!
//! Handlers run in subscription order on the emitting thread.

use crate::action::{ActionId, ActionPhase};
use crate::ecs::EntityId;

/// Every event the simulation publishes.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// A client was assigned its controlled entity.
    Connected {
        /// Controlled entity.
        entity: EntityId,
    },
    /// A connection closed and its state was purged.
    Disconnected {
        /// Connection id.
        connection: u32,
        /// Entity the connection controlled.
        entity: EntityId,
    },
    /// A deferred despawn was applied by flush.
    Despawned {
        /// Handle that is now invalid.
        entity: EntityId,
    },
    /// Prediction performed a hard correction.
    Reconciled {
        /// Local entity.
        entity: EntityId,
        /// Sequence the server acknowledged.
        server_sequence: u32,
        /// Measured divergence.
        divergence: f64,
    },
    /// An action entered its first phase.
    ActionActivated {
        /// Acting entity.
        entity: EntityId,
        /// Action.
        action: ActionId,
    },
    /// An action was cancelled.
    ActionCancelled {
        /// Acting entity.
        entity: EntityId,
        /// Action.
        action: ActionId,
    },
    /// An action moved to a new phase on the tick clock.
    PhaseChanged {
        /// Acting entity.
        entity: EntityId,
        /// Action.
        action: ActionId,
        /// Phase entered.
        phase: ActionPhase,
    },
    /// An input arrived faster than the server accepts.
    InputThrottled {
        /// Connection id.
        connection: u32,
        /// Controlled entity.
        entity: EntityId,
    },
    /// The server accepted an input.
    InputReceived {
        /// Connection id.
        connection: u32,
        /// Controlled entity.
        entity: EntityId,
        /// Input sequence.
        sequence: u32,
    },
    /// The client sent an input.
    InputSent {
        /// Input sequence.
        sequence: u32,
        /// Packed buttons.
        buttons: u16,
    },
}

/// Discriminant of [`Event`], used as the subscription key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// [`Event::Connected`]
    Connected,
    /// [`Event::Disconnected`]
    Disconnected,
    /// [`Event::Despawned`]
    Despawned,
    /// [`Event::Reconciled`]
    Reconciled,
    /// [`Event::ActionActivated`]
    ActionActivated,
    /// [`Event::ActionCancelled`]
    ActionCancelled,
    /// [`Event::PhaseChanged`]
    PhaseChanged,
    /// [`Event::InputThrottled`]
    InputThrottled,
    /// [`Event::InputReceived`]
    InputReceived,
    /// [`Event::InputSent`]
    InputSent,
}

impl Event {
    /// Discriminant of this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Connected { .. } => EventKind::Connected,
            Self::Disconnected { .. } => EventKind::Disconnected,
            Self::Despawned { .. } => EventKind::Despawned,
            Self::Reconciled { .. } => EventKind::Reconciled,
            Self::ActionActivated { .. } => EventKind::ActionActivated,
            Self::ActionCancelled { .. } => EventKind::ActionCancelled,
            Self::PhaseChanged { .. } => EventKind::PhaseChanged,
            Self::InputThrottled { .. } => EventKind::InputThrottled,
            Self::InputReceived { .. } => EventKind::InputReceived,
            Self::InputSent { .. } => EventKind::InputSent,
        }
    }
}

/// Handle returned by [`EventBus::on`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Subscription options.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SubscribeOptions {
    /// Remove after this many deliveries.
    pub limit: Option<u32>,
    /// Tick-clock deadline in milliseconds.
    pub expires_at: Option<f64>,
    /// Drop existing subscriptions of the same kind first.
    pub unique: bool,
}

type Handler = Box<dyn FnMut(&Event) + Send>;

struct Subscription {
    id: SubscriptionId,
    kind: EventKind,
    handler: Handler,
    invocations: u32,
    options: SubscribeOptions,
}

/// Synchronous event dispatcher.
#[derive(Default)]
pub struct EventBus {
    subscriptions: Vec<Subscription>,
    next_id: u64,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}

impl EventBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of active subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Returns `true` if nothing is subscribed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Subscribes `handler` to events of `kind`.
    pub fn on<F>(&mut self, kind: EventKind, handler: F, options: SubscribeOptions) -> SubscriptionId
    where
        F: FnMut(&Event) + Send + 'static,
    {
        if options.unique {
            self.off_kind(kind);
        }
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscriptions.push(Subscription {
            id,
            kind,
            handler: Box::new(handler),
            invocations: 0,
            options,
        });
        id
    }

    /// Subscribes `handler` for a single delivery.
    pub fn once<F>(&mut self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: FnMut(&Event) + Send + 'static,
    {
        self.on(
            kind,
            handler,
            SubscribeOptions {
                limit: Some(1),
                ..SubscribeOptions::default()
            },
        )
    }

    /// Removes one subscription. Returns `false` if it was already gone.
    pub fn off(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.id != id);
        self.subscriptions.len() != before
    }

    /// Removes every subscription of `kind`, returning how many were removed.
    pub fn off_kind(&mut self, kind: EventKind) -> usize {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.kind != kind);
        before - self.subscriptions.len()
    }

    /// Delivers `event` to every matching subscription in order.
    pub fn emit(&mut self, event: &Event) {
        let kind = event.kind();
        for sub in self.subscriptions.iter_mut().filter(|s| s.kind == kind) {
            sub.invocations += 1;
            (sub.handler)(event);
        }
        self.subscriptions
            .retain(|s| s.options.limit.map_or(true, |limit| s.invocations < limit));
    }

    /// Drops subscriptions whose deadline is at or before `now`.
    pub fn expire(&mut self, now: f64) -> usize {
        let before = self.subscriptions.len();
        self.subscriptions
            .retain(|s| s.options.expires_at.map_or(true, |deadline| now < deadline));
        before - self.subscriptions.len()
    }
}

//! Ordered, failure-isolating subscriber lists for deniable events.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

use thiserror::Error;

use crate::events::{
    DroppingItemEvent, HurtingEvent, ItemDestroyedEvent, PickingUpItemEvent, ReloadingWeaponEvent,
    RespawningTeamEvent, ShootingEvent, ShotEvent,
};
use crate::host::HostError;

/// Handle returned by [`EventHub::subscribe`], unique within one hub.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Failure reported by a subscriber. The hub logs it and keeps dispatching.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Host(#[from] HostError),
    #[error("{0} is already running")]
    Busy(String),
    #[error("{0}")]
    Rejected(String),
}

pub type HandlerResult = Result<(), HandlerError>;

type BoxedHandler<E> = Box<dyn FnMut(&mut E) -> HandlerResult + Send>;

struct Subscriber<E> {
    id: SubscriptionId,
    label: Arc<str>,
    handler: Arc<Mutex<BoxedHandler<E>>>,
}

impl<E> Clone for Subscriber<E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            label: Arc::clone(&self.label),
            handler: Arc::clone(&self.handler),
        }
    }
}

/// Summary of one [`EventHub::dispatch`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Handlers that were called, including the ones that failed.
    pub invoked: usize,
    /// Handlers that returned an error or panicked.
    pub failed: usize,
    /// Snapshot entries not called: unsubscribed mid-dispatch or already running.
    pub skipped: usize,
}

/// Subscriber list for one event kind.
///
/// Handlers fire in registration order. Dispatch iterates a snapshot taken on
/// entry, so a handler may subscribe or unsubscribe any handler (itself
/// included) while the event is in flight. Entries removed mid-dispatch are
/// skipped; entries added mid-dispatch first fire on the next dispatch.
///
/// Nothing short-circuits on a denied event: each handler decides for itself
/// whether to respect the `allowed` flag it sees.
pub struct EventHub<E> {
    kind: &'static str,
    subscribers: Mutex<Vec<Subscriber<E>>>,
    next_id: AtomicU64,
}

impl<E: 'static> fmt::Debug for EventHub<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHub")
            .field("kind", &self.kind)
            .field("subscribers", &self.len())
            .finish()
    }
}

impl<E: 'static> EventHub<E> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn subscribe<F>(&self, label: impl Into<Arc<str>>, handler: F) -> SubscriptionId
    where
        F: FnMut(&mut E) -> HandlerResult + Send + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let boxed: BoxedHandler<E> = Box::new(handler);
        self.lock().push(Subscriber {
            id,
            label: label.into(),
            handler: Arc::new(Mutex::new(boxed)),
        });
        id
    }

    /// Remove a subscriber. Returns `false` when the id was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.lock();
        match subscribers.iter().position(|entry| entry.id == id) {
            Some(index) => {
                subscribers.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.lock().iter().any(|entry| entry.id == id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Run every subscriber against `event`.
    ///
    /// A failing subscriber (error or panic) is logged and counted, and any
    /// change it made to the event is rolled back. The event ends up
    /// reflecting only the subscribers that completed.
    pub fn dispatch(&self, event: &mut E) -> DispatchReport
    where
        E: Clone,
    {
        let snapshot: Vec<Subscriber<E>> = self.lock().clone();
        let mut report = DispatchReport::default();

        for subscriber in snapshot {
            if !self.contains(subscriber.id) {
                report.skipped += 1;
                continue;
            }

            let mut handler = match subscriber.handler.try_lock() {
                Ok(guard) => guard,
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                Err(TryLockError::WouldBlock) => {
                    tracing::warn!(
                        target: "overlay::hub",
                        kind = self.kind,
                        subscriber = %subscriber.label,
                        "hub.handler_reentered"
                    );
                    report.skipped += 1;
                    continue;
                }
            };

            report.invoked += 1;
            let before = event.clone();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                let callback = &mut *handler;
                callback(event)
            }));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    *event = before;
                    report.failed += 1;
                    tracing::warn!(
                        target: "overlay::hub",
                        kind = self.kind,
                        subscriber = %subscriber.label,
                        error = %err,
                        "hub.handler_failed"
                    );
                }
                Err(payload) => {
                    *event = before;
                    report.failed += 1;
                    tracing::error!(
                        target: "overlay::hub",
                        kind = self.kind,
                        subscriber = %subscriber.label,
                        panic = panic_message(payload.as_ref()),
                        "hub.handler_panicked"
                    );
                }
            }
        }

        report
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Subscriber<E>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

/// One hub per interceptable action, shared by the host and every definition.
#[derive(Debug)]
pub struct EventHubs {
    pub reloading: EventHub<ReloadingWeaponEvent>,
    pub shooting: EventHub<ShootingEvent>,
    pub shot: EventHub<ShotEvent>,
    pub hurting: EventHub<HurtingEvent>,
    pub dropping: EventHub<DroppingItemEvent>,
    pub picking_up: EventHub<PickingUpItemEvent>,
    pub respawning_team: EventHub<RespawningTeamEvent>,
    pub item_destroyed: EventHub<ItemDestroyedEvent>,
}

impl Default for EventHubs {
    fn default() -> Self {
        Self {
            reloading: EventHub::new("reloading"),
            shooting: EventHub::new("shooting"),
            shot: EventHub::new("shot"),
            hurting: EventHub::new("hurting"),
            dropping: EventHub::new("dropping"),
            picking_up: EventHub::new("picking_up"),
            respawning_team: EventHub::new("respawning_team"),
            item_destroyed: EventHub::new("item_destroyed"),
        }
    }
}

impl EventHubs {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Total subscribers across every hub.
    pub fn subscriber_count(&self) -> usize {
        self.reloading.len()
            + self.shooting.len()
            + self.shot.len()
            + self.hurting.len()
            + self.dropping.len()
            + self.picking_up.len()
            + self.respawning_team.len()
            + self.item_destroyed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Deniable;
    use crate::ids::{ItemSerial, PlayerId};

    fn reload_event() -> ReloadingWeaponEvent {
        ReloadingWeaponEvent::new(PlayerId(1), ItemSerial(10))
    }

    #[test]
    fn subscribers_fire_in_registration_order() {
        let hub = EventHub::<ReloadingWeaponEvent>::new("reloading");
        let order = Arc::new(Mutex::new(Vec::new()));
        for index in 0..3 {
            let order = Arc::clone(&order);
            hub.subscribe(format!("sub-{index}"), move |_event| {
                order.lock().unwrap().push(index);
                Ok(())
            });
        }

        let report = hub.dispatch(&mut reload_event());

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(report.invoked, 3);
        assert_eq!(report.failed, 0);
    }

    #[test]
    fn denial_does_not_short_circuit_later_subscribers() {
        let hub = EventHub::<ReloadingWeaponEvent>::new("reloading");
        let seen_allowed = Arc::new(Mutex::new(None));
        hub.subscribe("deny", |event: &mut ReloadingWeaponEvent| {
            event.deny();
            Ok(())
        });
        let seen = Arc::clone(&seen_allowed);
        hub.subscribe("observe", move |event: &mut ReloadingWeaponEvent| {
            *seen.lock().unwrap() = Some(event.is_allowed());
            Ok(())
        });

        let mut event = reload_event();
        hub.dispatch(&mut event);

        assert_eq!(*seen_allowed.lock().unwrap(), Some(false));
        assert!(!event.is_allowed());
    }

    #[test]
    fn failing_and_panicking_subscribers_are_isolated() {
        let hub = EventHub::<ReloadingWeaponEvent>::new("reloading");
        hub.subscribe("error", |event: &mut ReloadingWeaponEvent| {
            event.serial = ItemSerial(999);
            Err(HandlerError::Rejected("boom".to_string()))
        });
        hub.subscribe("panic", |event: &mut ReloadingWeaponEvent| -> HandlerResult {
            event.player = PlayerId(77);
            panic!("subscriber exploded")
        });
        hub.subscribe("deny", |event: &mut ReloadingWeaponEvent| {
            event.deny();
            Ok(())
        });

        let mut event = reload_event();
        let report = hub.dispatch(&mut event);

        assert_eq!(report.invoked, 3);
        assert_eq!(report.failed, 2);
        assert!(!event.is_allowed(), "last subscriber still ran");
        assert_eq!(event.serial, ItemSerial(10));
        assert_eq!(event.player, PlayerId(1));

        // The panicking handler stays usable on later dispatches.
        let second = hub.dispatch(&mut reload_event());
        assert_eq!(second.invoked, 3);
    }

    #[test]
    fn failed_subscriber_changes_are_invisible_to_later_ones() {
        let hub = EventHub::<HurtingEvent>::new("hurting");
        hub.subscribe("rewrite", |event: &mut HurtingEvent| {
            event.amount = 999.0;
            event.deny();
            Err(HandlerError::Rejected("half done".to_string()))
        });
        let seen = Arc::new(Mutex::new(None));
        let seen_ref = Arc::clone(&seen);
        hub.subscribe("observe", move |event: &mut HurtingEvent| {
            *seen_ref.lock().unwrap() = Some((event.amount, event.is_allowed()));
            Ok(())
        });

        let mut event = HurtingEvent::new(None, PlayerId(2), 10.0, "ballistic".into());
        let report = hub.dispatch(&mut event);

        assert_eq!(report.failed, 1);
        assert_eq!(*seen.lock().unwrap(), Some((10.0, true)));
        assert_eq!(event.amount, 10.0);
        assert!(event.is_allowed());
    }

    #[test]
    fn handler_can_unsubscribe_itself_and_a_later_handler() {
        let hub = Arc::new(EventHub::<ReloadingWeaponEvent>::new("reloading"));
        let calls = Arc::new(Mutex::new(Vec::new()));
        let ids = Arc::new(Mutex::new(Vec::new()));

        let hub_ref = Arc::clone(&hub);
        let ids_ref = Arc::clone(&ids);
        let calls_ref = Arc::clone(&calls);
        let first = hub.subscribe("first", move |_event: &mut ReloadingWeaponEvent| {
            calls_ref.lock().unwrap().push("first");
            for id in ids_ref.lock().unwrap().iter() {
                hub_ref.unsubscribe(*id);
            }
            Ok(())
        });
        let calls_ref = Arc::clone(&calls);
        let second = hub.subscribe("second", move |_event: &mut ReloadingWeaponEvent| {
            calls_ref.lock().unwrap().push("second");
            Ok(())
        });
        ids.lock().unwrap().extend([first, second]);

        let report = hub.dispatch(&mut reload_event());

        assert_eq!(*calls.lock().unwrap(), vec!["first"]);
        assert_eq!(report.skipped, 1);
        assert!(hub.is_empty());
    }

    #[test]
    fn subscriber_added_during_dispatch_waits_for_next_dispatch() {
        let hub = Arc::new(EventHub::<ReloadingWeaponEvent>::new("reloading"));
        let late_calls = Arc::new(Mutex::new(0usize));

        let hub_ref = Arc::clone(&hub);
        let late_ref = Arc::clone(&late_calls);
        let mut added = false;
        hub.subscribe("adder", move |_event: &mut ReloadingWeaponEvent| {
            if !added {
                added = true;
                let late = Arc::clone(&late_ref);
                hub_ref.subscribe("late", move |_event: &mut ReloadingWeaponEvent| {
                    *late.lock().unwrap() += 1;
                    Ok(())
                });
            }
            Ok(())
        });

        hub.dispatch(&mut reload_event());
        assert_eq!(*late_calls.lock().unwrap(), 0);

        hub.dispatch(&mut reload_event());
        assert_eq!(*late_calls.lock().unwrap(), 1);
    }

    #[test]
    fn unsubscribe_unknown_id_is_false() {
        let hub = EventHub::<ReloadingWeaponEvent>::new("reloading");
        let id = hub.subscribe("only", |_event: &mut ReloadingWeaponEvent| Ok(()));
        assert!(hub.unsubscribe(id));
        assert!(!hub.unsubscribe(id));
        assert_eq!(EventHubs::default().subscriber_count(), 0);
    }
}

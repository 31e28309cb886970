//! Interceptable action payloads.
//!
//! Every guarded action is described by a value carrying an `allowed` flag.
//! The host builds the payload right before the action, dispatches it through
//! the matching [`EventHub`](crate::hub::EventHub), then acts on the final
//! flag and on any fields subscribers rewrote.

use bevy::prelude::Event;

use crate::ids::{DamageType, ItemSerial, PlayerId};
use crate::respawn::RespawnWave;

/// Common surface of events that subscribers may veto.
pub trait Deniable {
    fn is_allowed(&self) -> bool;

    fn set_allowed(&mut self, allowed: bool);

    fn deny(&mut self) {
        self.set_allowed(false);
    }
}

macro_rules! impl_deniable {
    ($($event:ty),+ $(,)?) => {
        $(
            impl Deniable for $event {
                fn is_allowed(&self) -> bool {
                    self.allowed
                }

                fn set_allowed(&mut self, allowed: bool) {
                    self.allowed = allowed;
                }
            }
        )+
    };
}

/// A player starts reloading the firearm identified by `serial`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReloadingWeaponEvent {
    pub player: PlayerId,
    pub serial: ItemSerial,
    pub allowed: bool,
}

impl ReloadingWeaponEvent {
    pub fn new(player: PlayerId, serial: ItemSerial) -> Self {
        Self {
            player,
            serial,
            allowed: true,
        }
    }
}

/// A shot is about to be fired.
#[derive(Debug, Clone, PartialEq)]
pub struct ShootingEvent {
    pub player: PlayerId,
    pub serial: ItemSerial,
    pub target: Option<PlayerId>,
    pub allowed: bool,
}

impl ShootingEvent {
    pub fn new(player: PlayerId, serial: ItemSerial, target: Option<PlayerId>) -> Self {
        Self {
            player,
            serial,
            target,
            allowed: true,
        }
    }
}

/// A shot has been resolved against the world but its effects are not applied yet.
#[derive(Debug, Clone, PartialEq)]
pub struct ShotEvent {
    pub player: PlayerId,
    pub serial: ItemSerial,
    pub target: Option<PlayerId>,
    pub distance: f32,
    pub damage: f32,
    pub allowed: bool,
}

impl ShotEvent {
    pub fn new(
        player: PlayerId,
        serial: ItemSerial,
        target: Option<PlayerId>,
        distance: f32,
        damage: f32,
    ) -> Self {
        Self {
            player,
            serial,
            target,
            distance,
            damage,
            allowed: true,
        }
    }
}

/// Who dealt damage, and with which held item if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attacker {
    pub player: PlayerId,
    pub weapon: Option<ItemSerial>,
}

/// A player is about to take damage. `amount` is what the host applies.
#[derive(Debug, Clone, PartialEq)]
pub struct HurtingEvent {
    pub attacker: Option<Attacker>,
    pub target: PlayerId,
    pub amount: f32,
    pub damage_type: DamageType,
    pub allowed: bool,
}

impl HurtingEvent {
    pub fn new(
        attacker: Option<Attacker>,
        target: PlayerId,
        amount: f32,
        damage_type: DamageType,
    ) -> Self {
        Self {
            attacker,
            target,
            amount,
            damage_type,
            allowed: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DroppingItemEvent {
    pub player: PlayerId,
    pub serial: ItemSerial,
    pub allowed: bool,
}

impl DroppingItemEvent {
    pub fn new(player: PlayerId, serial: ItemSerial) -> Self {
        Self {
            player,
            serial,
            allowed: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PickingUpItemEvent {
    pub player: PlayerId,
    pub serial: ItemSerial,
    pub allowed: bool,
}

impl PickingUpItemEvent {
    pub fn new(player: PlayerId, serial: ItemSerial) -> Self {
        Self {
            player,
            serial,
            allowed: true,
        }
    }
}

/// A respawn wave has been announced. Subscribers reshape it through the
/// [`RespawnWave`] methods; the host spawns whatever is left when allowed.
#[derive(Debug, Clone)]
pub struct RespawningTeamEvent {
    pub wave: RespawnWave,
    pub allowed: bool,
}

impl RespawningTeamEvent {
    pub fn new(wave: RespawnWave) -> Self {
        Self {
            wave,
            allowed: true,
        }
    }

    /// A wave the host already knows it cannot spawn, offered for inspection only.
    pub fn denied(wave: RespawnWave) -> Self {
        Self {
            wave,
            allowed: false,
        }
    }
}

impl_deniable!(
    ReloadingWeaponEvent,
    ShootingEvent,
    ShotEvent,
    HurtingEvent,
    DroppingItemEvent,
    PickingUpItemEvent,
    RespawningTeamEvent,
);

/// The host destroyed an item instance. Not deniable.
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemDestroyedEvent {
    pub serial: ItemSerial,
}

//! Operations the overlay needs from the host simulation.

use bevy::math::Vec3;
use bitflags::bitflags;
use thiserror::Error;

use crate::ids::{AmmoType, ItemSerial, ItemType, PlayerId, RoleId, StatusEffect};

bitflags! {
    /// Firearm state bits mirrored from the host.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FirearmStatusFlags: u8 {
        const CHAMBERED = 1 << 0;
        const MAG_INSERTED = 1 << 1;
        const CYCLED = 1 << 2;
        const FLASHLIGHT = 1 << 3;
    }
}

/// Ammo and state bits written onto a firearm pickup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FirearmStatus {
    pub ammo: u16,
    pub flags: FirearmStatusFlags,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HostError {
    #[error("player {0} is not connected")]
    UnknownPlayer(PlayerId),
    #[error("item {0} does not exist")]
    UnknownItem(ItemSerial),
    #[error("item {0} is not a firearm")]
    NotAFirearm(ItemSerial),
    #[error("host rejected {operation}: {reason}")]
    Rejected {
        operation: &'static str,
        reason: String,
    },
}

/// Outbound calls into the host simulation.
///
/// Implementations own the entities; the overlay only ever addresses them by
/// serial or player id. Every method takes `&self` so a single host handle can
/// be shared by all definitions and called from inside event handlers.
pub trait SimulationHost: Send + Sync {
    /// Create a pickup of `item_type` lying at `position`.
    fn spawn_pickup(&self, item_type: &ItemType, position: Vec3) -> Result<ItemSerial, HostError>;

    fn set_pickup_weight(&self, serial: ItemSerial, weight: f32) -> Result<(), HostError>;

    fn firearm_status(&self, serial: ItemSerial) -> Result<FirearmStatus, HostError>;

    fn set_firearm_status(&self, serial: ItemSerial, status: FirearmStatus)
        -> Result<(), HostError>;

    /// Add an item of `item_type` to the player's inventory.
    fn add_item(&self, player: PlayerId, item_type: &ItemType) -> Result<ItemSerial, HostError>;

    fn firearm_ammo(&self, serial: ItemSerial) -> Result<u16, HostError>;

    fn set_firearm_ammo(&self, serial: ItemSerial, ammo: u16) -> Result<(), HostError>;

    fn reserve_ammo(&self, player: PlayerId, ammo_type: &AmmoType) -> Result<u16, HostError>;

    fn set_reserve_ammo(
        &self,
        player: PlayerId,
        ammo_type: &AmmoType,
        amount: u16,
    ) -> Result<(), HostError>;

    fn player_role(&self, player: PlayerId) -> Result<RoleId, HostError>;

    fn player_position(&self, player: PlayerId) -> Result<Vec3, HostError>;

    fn set_effect_intensity(
        &self,
        player: PlayerId,
        effect: &StatusEffect,
        intensity: u8,
    ) -> Result<(), HostError>;

    /// Play the reload animation without running the host's own reload logic.
    fn request_reload_animation(&self, player: PlayerId, serial: ItemSerial)
        -> Result<(), HostError>;

    fn show_pickup_hint(&self, player: PlayerId, name: &str, description: &str);
}

//! A self-contained [`SimulationHost`] keeping every entity in memory.
//!
//! Useful for dry runs of authored content and as the reference host in tests.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use bevy::math::Vec3;

use crate::config::{BaseItemSpec, ItemCatalog};
use crate::host::{FirearmStatus, FirearmStatusFlags, HostError, SimulationHost};
use crate::ids::{AmmoType, ItemSerial, ItemType, PlayerId, RoleId, StatusEffect};

#[derive(Debug, Clone, PartialEq)]
pub struct ItemRecord {
    pub item_type: ItemType,
    pub owner: Option<PlayerId>,
    pub position: Option<Vec3>,
    pub weight: f32,
    pub firearm: Option<FirearmStatus>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerRecord {
    pub role: RoleId,
    pub position: Vec3,
    pub reserve: HashMap<AmmoType, u16>,
    pub effects: HashMap<StatusEffect, u8>,
    pub inventory: Vec<ItemSerial>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickupHint {
    pub player: PlayerId,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Default)]
struct HostState {
    next_serial: u32,
    items: HashMap<ItemSerial, ItemRecord>,
    players: HashMap<PlayerId, PlayerRecord>,
    hints: Vec<PickupHint>,
    reload_animations: Vec<(PlayerId, ItemSerial)>,
}

impl HostState {
    fn create_item(&mut self, item_type: &ItemType, firearm: bool) -> ItemSerial {
        self.next_serial += 1;
        let serial = ItemSerial(self.next_serial);
        self.items.insert(
            serial,
            ItemRecord {
                item_type: item_type.clone(),
                owner: None,
                position: None,
                weight: 0.0,
                firearm: firearm.then(|| FirearmStatus {
                    ammo: 0,
                    flags: FirearmStatusFlags::MAG_INSERTED,
                }),
            },
        );
        serial
    }

    fn item_mut(&mut self, serial: ItemSerial) -> Result<&mut ItemRecord, HostError> {
        self.items
            .get_mut(&serial)
            .ok_or(HostError::UnknownItem(serial))
    }

    fn firearm_mut(&mut self, serial: ItemSerial) -> Result<&mut FirearmStatus, HostError> {
        self.item_mut(serial)?
            .firearm
            .as_mut()
            .ok_or(HostError::NotAFirearm(serial))
    }

    fn player(&self, player: PlayerId) -> Result<&PlayerRecord, HostError> {
        self.players
            .get(&player)
            .ok_or(HostError::UnknownPlayer(player))
    }

    fn player_mut(&mut self, player: PlayerId) -> Result<&mut PlayerRecord, HostError> {
        self.players
            .get_mut(&player)
            .ok_or(HostError::UnknownPlayer(player))
    }
}

#[derive(Debug)]
pub struct InMemoryHost {
    catalog: ItemCatalog,
    state: Mutex<HostState>,
}

impl InMemoryHost {
    pub fn new(catalog: ItemCatalog) -> Self {
        Self {
            catalog,
            state: Mutex::new(HostState::default()),
        }
    }

    pub fn add_player(&self, player: PlayerId, role: RoleId, position: Vec3) {
        self.state().players.insert(
            player,
            PlayerRecord {
                role,
                position,
                reserve: HashMap::new(),
                effects: HashMap::new(),
                inventory: Vec::new(),
            },
        );
    }

    pub fn set_role(&self, player: PlayerId, role: RoleId) -> Result<(), HostError> {
        self.state().player_mut(player)?.role = role;
        Ok(())
    }

    pub fn player(&self, player: PlayerId) -> Option<PlayerRecord> {
        self.state().players.get(&player).cloned()
    }

    pub fn item(&self, serial: ItemSerial) -> Option<ItemRecord> {
        self.state().items.get(&serial).cloned()
    }

    pub fn item_count(&self) -> usize {
        self.state().items.len()
    }

    /// Remove an item from the world and from its owner's inventory.
    pub fn destroy_item(&self, serial: ItemSerial) -> bool {
        let mut state = self.state();
        let Some(record) = state.items.remove(&serial) else {
            return false;
        };
        if let Some(owner) = record.owner {
            if let Some(player) = state.players.get_mut(&owner) {
                player.inventory.retain(|held| *held != serial);
            }
        }
        true
    }

    pub fn effect_intensity(&self, player: PlayerId, effect: &StatusEffect) -> u8 {
        self.state()
            .players
            .get(&player)
            .and_then(|record| record.effects.get(effect).copied())
            .unwrap_or(0)
    }

    pub fn hints(&self) -> Vec<PickupHint> {
        self.state().hints.clone()
    }

    pub fn reload_animations(&self) -> Vec<(PlayerId, ItemSerial)> {
        self.state().reload_animations.clone()
    }

    fn is_firearm(&self, item_type: &ItemType) -> Result<bool, HostError> {
        match self.catalog.get(item_type) {
            Some(BaseItemSpec::Firearm { .. }) => Ok(true),
            Some(BaseItemSpec::Other) => Ok(false),
            None => Err(HostError::Rejected {
                operation: "create_item",
                reason: format!("unknown item type '{item_type}'"),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SimulationHost for InMemoryHost {
    fn spawn_pickup(&self, item_type: &ItemType, position: Vec3) -> Result<ItemSerial, HostError> {
        let firearm = self.is_firearm(item_type)?;
        let mut state = self.state();
        let serial = state.create_item(item_type, firearm);
        state.item_mut(serial)?.position = Some(position);
        Ok(serial)
    }

    fn set_pickup_weight(&self, serial: ItemSerial, weight: f32) -> Result<(), HostError> {
        self.state().item_mut(serial)?.weight = weight;
        Ok(())
    }

    fn firearm_status(&self, serial: ItemSerial) -> Result<FirearmStatus, HostError> {
        self.state().firearm_mut(serial).map(|status| *status)
    }

    fn set_firearm_status(&self, serial: ItemSerial, status: FirearmStatus) -> Result<(), HostError> {
        *self.state().firearm_mut(serial)? = status;
        Ok(())
    }

    fn add_item(&self, player: PlayerId, item_type: &ItemType) -> Result<ItemSerial, HostError> {
        let firearm = self.is_firearm(item_type)?;
        let mut state = self.state();
        state.player(player)?;
        let serial = state.create_item(item_type, firearm);
        state.item_mut(serial)?.owner = Some(player);
        state.player_mut(player)?.inventory.push(serial);
        Ok(serial)
    }

    fn firearm_ammo(&self, serial: ItemSerial) -> Result<u16, HostError> {
        self.state().firearm_mut(serial).map(|status| status.ammo)
    }

    fn set_firearm_ammo(&self, serial: ItemSerial, ammo: u16) -> Result<(), HostError> {
        self.state().firearm_mut(serial)?.ammo = ammo;
        Ok(())
    }

    fn reserve_ammo(&self, player: PlayerId, ammo_type: &AmmoType) -> Result<u16, HostError> {
        let state = self.state();
        let record = state.player(player)?;
        Ok(record.reserve.get(ammo_type).copied().unwrap_or(0))
    }

    fn set_reserve_ammo(
        &self,
        player: PlayerId,
        ammo_type: &AmmoType,
        amount: u16,
    ) -> Result<(), HostError> {
        self.state()
            .player_mut(player)?
            .reserve
            .insert(ammo_type.clone(), amount);
        Ok(())
    }

    fn player_role(&self, player: PlayerId) -> Result<RoleId, HostError> {
        self.state().player(player).map(|record| record.role.clone())
    }

    fn player_position(&self, player: PlayerId) -> Result<Vec3, HostError> {
        self.state().player(player).map(|record| record.position)
    }

    fn set_effect_intensity(
        &self,
        player: PlayerId,
        effect: &StatusEffect,
        intensity: u8,
    ) -> Result<(), HostError> {
        self.state()
            .player_mut(player)?
            .effects
            .insert(effect.clone(), intensity);
        Ok(())
    }

    fn request_reload_animation(
        &self,
        player: PlayerId,
        serial: ItemSerial,
    ) -> Result<(), HostError> {
        let mut state = self.state();
        state.player(player)?;
        state.reload_animations.push((player, serial));
        Ok(())
    }

    fn show_pickup_hint(&self, player: PlayerId, name: &str, description: &str) {
        self.state().hints.push(PickupHint {
            player,
            name: name.to_string(),
            description: description.to_string(),
        });
    }
}

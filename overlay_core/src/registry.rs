use std::collections::BTreeMap;
use std::sync::Arc;

use bevy::prelude::Resource;
use thiserror::Error;

use crate::config::OverlayConfig;
use crate::host::SimulationHost;
use crate::hub::EventHubs;
use crate::ids::{DefinitionId, ItemSerial};
use crate::weapon::{CustomWeapon, DefinitionError, WeaponRules};

#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("definition id {0} is already registered")]
    DuplicateId(DefinitionId),
    #[error("definition name '{0}' is already registered")]
    DuplicateName(String),
    #[error("no definition with id {0}")]
    UnknownDefinition(DefinitionId),
    #[error("serial {serial} already belongs to definition {owner}")]
    AlreadyClaimed {
        serial: ItemSerial,
        owner: DefinitionId,
    },
    #[error(transparent)]
    Definition(#[from] DefinitionError),
}

/// Every live custom weapon, one per authored definition.
#[derive(Resource, Debug, Default)]
pub struct CustomItemRegistry {
    weapons: BTreeMap<DefinitionId, Arc<CustomWeapon>>,
}

impl CustomItemRegistry {
    /// Build and register a default-hooked weapon for every configured definition.
    pub fn from_config(
        config: &OverlayConfig,
        hubs: &Arc<EventHubs>,
        host: &Arc<dyn SimulationHost>,
    ) -> Result<Self, RegistryError> {
        let rules = WeaponRules::from_config(config);
        let mut registry = Self::default();
        for definition in config.weapon_definitions()? {
            registry.register(CustomWeapon::with_default_hooks(
                definition,
                Arc::clone(hubs),
                Arc::clone(host),
                rules.clone(),
            ))?;
        }
        tracing::info!(
            target: "overlay::weapon",
            weapons = registry.len(),
            "registry.loaded"
        );
        Ok(registry)
    }

    pub fn register(&mut self, weapon: Arc<CustomWeapon>) -> Result<(), RegistryError> {
        if self.weapons.contains_key(&weapon.id()) {
            return Err(RegistryError::DuplicateId(weapon.id()));
        }
        if self.get_by_name(weapon.name()).is_some() {
            return Err(RegistryError::DuplicateName(weapon.name().to_string()));
        }
        self.weapons.insert(weapon.id(), weapon);
        Ok(())
    }

    pub fn unregister(&mut self, id: DefinitionId) -> Option<Arc<CustomWeapon>> {
        self.weapons.remove(&id)
    }

    pub fn get(&self, id: DefinitionId) -> Option<&Arc<CustomWeapon>> {
        self.weapons.get(&id)
    }

    /// Case-insensitive lookup by display name.
    pub fn get_by_name(&self, name: &str) -> Option<&Arc<CustomWeapon>> {
        self.weapons
            .values()
            .find(|weapon| weapon.name().eq_ignore_ascii_case(name))
    }

    /// The definition that owns `serial`, if any.
    pub fn find_by_serial(&self, serial: ItemSerial) -> Option<&Arc<CustomWeapon>> {
        self.weapons
            .values()
            .find(|weapon| weapon.is_tracked(serial))
    }

    /// Hand an item the host created by other means to definition `id`.
    ///
    /// A serial belongs to at most one definition; claiming one owned by
    /// another definition is refused. Re-claiming by the owner is a no-op.
    pub fn claim(&self, id: DefinitionId, serial: ItemSerial) -> Result<(), RegistryError> {
        let weapon = self.get(id).ok_or(RegistryError::UnknownDefinition(id))?;
        if let Some(owner) = self.find_by_serial(serial) {
            if owner.id() != id {
                return Err(RegistryError::AlreadyClaimed {
                    serial,
                    owner: owner.id(),
                });
            }
        }
        weapon.claim(serial);
        Ok(())
    }

    /// Forget `serial` in whichever definition tracks it.
    pub fn release_serial(&self, serial: ItemSerial) -> bool {
        match self.find_by_serial(serial) {
            Some(weapon) => weapon.release(serial),
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<CustomWeapon>> {
        self.weapons.values()
    }

    pub fn len(&self) -> usize {
        self.weapons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weapons.is_empty()
    }
}

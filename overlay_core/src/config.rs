use std::{
    collections::BTreeMap,
    env, fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use bevy::math::Vec3;
use bevy::prelude::Resource;
use serde::Deserialize;
use thiserror::Error;

use crate::ids::{AmmoType, DamageType, DefinitionId, ItemType, RoleId, StatusEffect, Team};
use crate::weapon::{DefinitionError, WeaponDefinition};

pub const BUILTIN_OVERLAY_CONFIG: &str = include_str!("data/overlay_config.json");

/// Static parameters of the host's base item types.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BaseItemSpec {
    Firearm {
        ammo_type: AmmoType,
        damage_type: DamageType,
    },
    Other,
}

/// Base catalog the authored definitions are layered on. Never modified by the overlay.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct ItemCatalog {
    items: BTreeMap<ItemType, BaseItemSpec>,
}

impl ItemCatalog {
    pub fn get(&self, item_type: &ItemType) -> Option<&BaseItemSpec> {
        self.items.get(item_type)
    }

    pub fn insert(&mut self, item_type: ItemType, spec: BaseItemSpec) {
        self.items.insert(item_type, spec);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SpawnPoint {
    pub name: String,
    pub position: [f32; 3],
    /// Percentage in `0..=100`.
    pub chance: f32,
}

impl SpawnPoint {
    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SpawnProperties {
    pub limit: u32,
    pub points: Vec<SpawnPoint>,
}

/// Authored weapon as written in configuration, before validation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WeaponSpec {
    pub id: DefinitionId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub base_type: ItemType,
    pub damage: f32,
    pub clip_size: u16,
    #[serde(default)]
    pub weight: f32,
    #[serde(default)]
    pub spawn: SpawnProperties,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TeamSpec {
    pub max_wave_size: usize,
    #[serde(default)]
    pub leader_role: Option<RoleId>,
    pub roles: Vec<RoleId>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DamageRules {
    pub armored_roles: Vec<RoleId>,
    pub armor_reduction: f32,
}

impl Default for DamageRules {
    fn default() -> Self {
        Self {
            armored_roles: Vec::new(),
            armor_reduction: 0.9,
        }
    }
}

impl DamageRules {
    pub fn is_armored(&self, role: &RoleId) -> bool {
        self.armored_roles.contains(role)
    }

    /// Damage dealt to a target of `role` by a weapon configured for `damage`.
    pub fn damage_against(&self, damage: f32, role: &RoleId) -> f32 {
        if self.is_armored(role) {
            damage * (1.0 - self.armor_reduction.clamp(0.0, 1.0))
        } else {
            damage
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReloadRules {
    /// Effect whose intensity is reset when the overlay performs a reload.
    pub cleared_effect: Option<StatusEffect>,
}

impl Default for ReloadRules {
    fn default() -> Self {
        Self {
            cleared_effect: Some(StatusEffect::new("invisible")),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Seed for spawn point rolls at startup.
    pub spawn_seed: u64,
    pub catalog: ItemCatalog,
    pub weapons: Vec<WeaponSpec>,
    pub teams: BTreeMap<Team, TeamSpec>,
    pub damage: DamageRules,
    pub reload: ReloadRules,
}

#[derive(Debug, Error)]
pub enum OverlayConfigError {
    #[error("failed to parse overlay config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read overlay config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl OverlayConfig {
    pub fn builtin() -> Arc<Self> {
        Arc::new(
            Self::from_json_str(BUILTIN_OVERLAY_CONFIG).expect("builtin overlay config should parse"),
        )
    }

    pub fn from_json_str(json: &str) -> Result<Self, OverlayConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, OverlayConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| OverlayConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    /// Validate every authored weapon against the catalog.
    ///
    /// Fails on the first invalid entry: a broken definition must stop startup.
    pub fn weapon_definitions(&self) -> Result<Vec<WeaponDefinition>, DefinitionError> {
        self.weapons
            .iter()
            .map(|spec| WeaponDefinition::new(spec.clone(), &self.catalog))
            .collect()
    }
}

#[derive(Resource, Debug, Clone)]
pub struct OverlayConfigHandle(Arc<OverlayConfig>);

impl OverlayConfigHandle {
    pub fn new(config: Arc<OverlayConfig>) -> Self {
        Self(config)
    }

    pub fn get(&self) -> Arc<OverlayConfig> {
        self.0.clone()
    }
}

pub fn load_overlay_config_from_env() -> Arc<OverlayConfig> {
    let override_path = env::var("OVERLAY_CONFIG_PATH").ok().map(PathBuf::from);
    let default_path =
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("src/data/overlay_config.json");
    let path = override_path.unwrap_or(default_path);

    match OverlayConfig::from_file(&path) {
        Ok(config) => {
            tracing::info!(
                target: "overlay::config",
                path = %path.display(),
                weapons = config.weapons.len(),
                teams = config.teams.len(),
                "overlay_config.loaded=file"
            );
            return Arc::new(config);
        }
        Err(err) => {
            tracing::warn!(
                target: "overlay::config",
                path = %path.display(),
                error = %err,
                "overlay_config.load_failed"
            );
        }
    }

    tracing::info!(target: "overlay::config", "overlay_config.loaded=builtin");
    OverlayConfig::builtin()
}

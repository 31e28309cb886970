//! Action interception and custom item overlay for a live game server.
//!
//! The host simulation dispatches deniable events through shared
//! [`EventHubs`]; authored weapons ([`CustomWeapon`]) subscribe while they own
//! live item instances and rewrite reloads and damage for those instances.
//! Respawn waves are reshaped through [`RespawnWave`] before the host spawns
//! them. [`build_headless_app`] wires everything into a Bevy [`App`].

pub mod config;
pub mod events;
pub mod host;
pub mod hub;
pub mod ids;
pub mod memory_host;
pub mod registry;
pub mod respawn;
pub mod systems;
pub mod tracking;
pub mod weapon;

use std::sync::Arc;

use bevy::prelude::*;

pub use config::{
    load_overlay_config_from_env, BaseItemSpec, DamageRules, ItemCatalog, OverlayConfig,
    OverlayConfigError, OverlayConfigHandle, ReloadRules, SpawnPoint, SpawnProperties, TeamSpec,
    WeaponSpec,
};
pub use events::{
    Attacker, Deniable, DroppingItemEvent, HurtingEvent, ItemDestroyedEvent, PickingUpItemEvent,
    ReloadingWeaponEvent, RespawningTeamEvent, ShootingEvent, ShotEvent,
};
pub use host::{FirearmStatus, FirearmStatusFlags, HostError, SimulationHost};
pub use hub::{DispatchReport, EventHub, EventHubs, HandlerError, HandlerResult, SubscriptionId};
pub use ids::{
    AmmoType, DamageType, DefinitionId, ItemSerial, ItemType, PlayerId, RoleId, StatusEffect, Team,
};
pub use memory_host::InMemoryHost;
pub use registry::{CustomItemRegistry, RegistryError};
pub use respawn::{CyclicTeamHandler, RespawnWave, TeamHandler, TeamHandlerRegistry};
pub use systems::{announce_respawn_wave, OverlayHubHandle, SpawnRng, TeamHandlersHandle};
pub use tracking::{Activation, TrackedSerials};
pub use weapon::{
    apply_configured_damage, plan_reload, CustomWeapon, DefaultHooks, DefinitionError,
    OverlayError, WeaponContext, WeaponDefinition, WeaponHooks, WeaponRules,
};

/// Construct a Bevy [`App`] with the overlay resources, using the
/// configuration found through `OVERLAY_CONFIG_PATH` (or the builtin one).
pub fn build_headless_app(host: Arc<dyn SimulationHost>) -> Result<App, RegistryError> {
    build_app_with_config(load_overlay_config_from_env(), host)
}

/// Construct a Bevy [`App`] from an explicit configuration.
///
/// Fails when an authored definition is invalid. Custom items are spawned on
/// the first update.
pub fn build_app_with_config(
    config: Arc<OverlayConfig>,
    host: Arc<dyn SimulationHost>,
) -> Result<App, RegistryError> {
    let hubs = EventHubs::shared();
    let registry = CustomItemRegistry::from_config(&config, &hubs, &host)?;
    let teams = Arc::new(TeamHandlerRegistry::from_config(&config));

    let mut app = App::new();
    app.insert_resource(OverlayConfigHandle::new(config.clone()))
        .insert_resource(OverlayHubHandle::new(hubs))
        .insert_resource(TeamHandlersHandle::new(teams))
        .insert_resource(SpawnRng::seeded(config.spawn_seed))
        .insert_resource(registry)
        .add_event::<ItemDestroyedEvent>()
        .add_plugins(MinimalPlugins)
        .add_systems(Startup, systems::spawn_configured_items)
        .add_systems(Update, systems::forward_destroyed_items);

    Ok(app)
}

/// Install an env-filtered `tracing` subscriber for a host process. Safe to
/// call more than once.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

use std::sync::Arc;

use bevy::prelude::*;
use rand::{rngs::SmallRng, SeedableRng};

use crate::events::{ItemDestroyedEvent, RespawningTeamEvent};
use crate::hub::EventHubs;
use crate::ids::{PlayerId, Team};
use crate::registry::CustomItemRegistry;
use crate::respawn::{RespawnWave, TeamHandlerRegistry};

#[derive(Resource, Debug, Clone)]
pub struct OverlayHubHandle(Arc<EventHubs>);

impl OverlayHubHandle {
    pub fn new(hubs: Arc<EventHubs>) -> Self {
        Self(hubs)
    }

    pub fn get(&self) -> Arc<EventHubs> {
        self.0.clone()
    }
}

#[derive(Resource, Debug, Clone)]
pub struct TeamHandlersHandle(Arc<TeamHandlerRegistry>);

impl TeamHandlersHandle {
    pub fn new(handlers: Arc<TeamHandlerRegistry>) -> Self {
        Self(handlers)
    }

    pub fn get(&self) -> Arc<TeamHandlerRegistry> {
        self.0.clone()
    }
}

/// Deterministic source for spawn point rolls.
#[derive(Resource, Debug)]
pub struct SpawnRng(pub SmallRng);

impl SpawnRng {
    pub fn seeded(seed: u64) -> Self {
        Self(SmallRng::seed_from_u64(seed))
    }
}

/// Startup: roll every definition's spawn points once.
pub fn spawn_configured_items(registry: Res<CustomItemRegistry>, mut rng: ResMut<SpawnRng>) {
    for weapon in registry.iter() {
        if let Err(err) = weapon.spawn_all(&mut rng.0) {
            tracing::warn!(
                target: "overlay::weapon",
                weapon = %weapon.name(),
                error = %err,
                "weapon.spawn_all_failed"
            );
        }
    }
}

/// Route host destruction notices into the hub, then make sure no definition
/// still claims the serial.
pub fn forward_destroyed_items(
    mut destroyed: EventReader<ItemDestroyedEvent>,
    hubs: Res<OverlayHubHandle>,
    registry: Res<CustomItemRegistry>,
) {
    for event in destroyed.read() {
        let mut event = *event;
        hubs.0.item_destroyed.dispatch(&mut event);
        if registry.release_serial(event.serial) {
            tracing::error!(
                target: "overlay::weapon",
                serial = %event.serial,
                "registry.stale_serial_released"
            );
        }
    }
}

/// Build a wave for `team`, let every subscriber reshape it, and hand the
/// result back to the host's spawn routine.
pub fn announce_respawn_wave(
    world: &World,
    players: Vec<PlayerId>,
    team: Team,
) -> RespawningTeamEvent {
    let handlers = world.resource::<TeamHandlersHandle>().get();
    let hubs = world.resource::<OverlayHubHandle>().get();
    let mut event = RespawningTeamEvent::new(RespawnWave::new(players, team, handlers));
    hubs.respawning_team.dispatch(&mut event);
    tracing::debug!(
        target: "overlay::respawn",
        team = %event.wave.next_known_team(),
        players = event.wave.players().len(),
        allowed = event.allowed,
        "respawn.wave_announced"
    );
    event
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OverlayConfig;
    use crate::host::SimulationHost;
    use crate::ids::{DefinitionId, RoleId};
    use crate::memory_host::InMemoryHost;
    use bevy::math::Vec3;
    use bevy::ecs::system::RunSystemOnce;

    fn world_with_registry() -> (World, Arc<InMemoryHost>) {
        let config = OverlayConfig::builtin();
        let hubs = EventHubs::shared();
        let memory = Arc::new(InMemoryHost::new(config.catalog.clone()));
        let host: Arc<dyn SimulationHost> = memory.clone();
        let registry = CustomItemRegistry::from_config(&config, &hubs, &host).expect("registry");

        let mut world = World::default();
        world.insert_resource(OverlayHubHandle::new(hubs));
        world.insert_resource(TeamHandlersHandle::new(Arc::new(
            TeamHandlerRegistry::from_config(&config),
        )));
        world.insert_resource(registry);
        world.insert_resource(SpawnRng::seeded(config.spawn_seed));
        world.init_resource::<Events<ItemDestroyedEvent>>();
        (world, memory)
    }

    #[test]
    fn destroyed_items_are_released_and_weapon_deactivates() {
        let (mut world, host) = world_with_registry();
        let serial = {
            let registry = world.resource::<CustomItemRegistry>();
            let weapon = registry.get(DefinitionId(2)).expect("shotgun");
            weapon.spawn(Vec3::ZERO).expect("spawn")
        };
        assert!(host.destroy_item(serial));

        world
            .resource_mut::<Events<ItemDestroyedEvent>>()
            .send(ItemDestroyedEvent { serial });
        world.run_system_once(forward_destroyed_items);

        let registry = world.resource::<CustomItemRegistry>();
        let weapon = registry.get(DefinitionId(2)).expect("shotgun");
        assert!(!weapon.is_tracked(serial));
        assert!(!weapon.is_active());
        assert_eq!(world.resource::<OverlayHubHandle>().get().subscriber_count(), 0);
    }

    #[test]
    fn startup_spawn_respects_limits() {
        let (mut world, host) = world_with_registry();
        world.run_system_once(spawn_configured_items);

        let registry = world.resource::<CustomItemRegistry>();
        let carbine = registry.get(DefinitionId(1)).expect("carbine");
        let shotgun = registry.get(DefinitionId(2)).expect("shotgun");
        assert!(carbine.tracked_count() <= 2);
        assert_eq!(shotgun.tracked_count(), 0, "no spawn points configured");
        assert_eq!(host.item_count(), carbine.tracked_count());
    }

    #[test]
    fn announced_wave_reflects_subscriber_changes() {
        let (world, _host) = world_with_registry();
        world
            .resource::<OverlayHubHandle>()
            .get()
            .respawning_team
            .subscribe("shrink", |event: &mut RespawningTeamEvent| {
                event.wave.set_maximum_respawn_amount(2);
                Ok(())
            });

        let players = (1..=5).map(PlayerId).collect();
        let event = announce_respawn_wave(&world, players, Team::new("task_force"));

        assert!(event.allowed);
        assert_eq!(event.wave.players(), &[PlayerId(1), PlayerId(2)]);
        let assignments = event.wave.into_assignments();
        assert_eq!(assignments[0].1, RoleId::new("task_force_captain"));
    }
}

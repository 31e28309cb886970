#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Once};

use bevy::math::Vec3;
use overlay_core::{
    AmmoType, CustomItemRegistry, DefinitionId, EventHubs, InMemoryHost, OverlayConfig, PlayerId,
    RoleId, SimulationHost,
};

static INIT: Once = Once::new();

pub const CARBINE: DefinitionId = DefinitionId(1);
pub const SHOTGUN: DefinitionId = DefinitionId(2);
pub const TRAINING_PISTOL: DefinitionId = DefinitionId(3);

pub fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("test_overlay_config.json")
}

pub fn ensure_test_config() {
    INIT.call_once(|| {
        let config_path = fixture_path();

        debug_assert!(
            config_path.exists(),
            "missing test overlay config at {}",
            config_path.display()
        );

        std::env::set_var("OVERLAY_CONFIG_PATH", &config_path);
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn test_config() -> Arc<OverlayConfig> {
    Arc::new(OverlayConfig::from_file(&fixture_path()).expect("fixture config parses"))
}

/// Registry, hubs and in-memory host built from the fixture config.
pub struct Harness {
    pub config: Arc<OverlayConfig>,
    pub hubs: Arc<EventHubs>,
    pub host: Arc<InMemoryHost>,
    pub registry: CustomItemRegistry,
}

impl Harness {
    pub fn new() -> Self {
        ensure_test_config();
        let config = test_config();
        let hubs = EventHubs::shared();
        let host = Arc::new(InMemoryHost::new(config.catalog.clone()));
        let dyn_host: Arc<dyn SimulationHost> = host.clone();
        let registry =
            CustomItemRegistry::from_config(&config, &hubs, &dyn_host).expect("fixture registry");
        Self {
            config,
            hubs,
            host,
            registry,
        }
    }

    pub fn player(&self, id: u32, role: &str) -> PlayerId {
        let player = PlayerId(id);
        self.host
            .add_player(player, RoleId::new(role), Vec3::new(id as f32, 0.0, 0.0));
        player
    }

    pub fn ammo_of(&self, definition: DefinitionId) -> AmmoType {
        self.registry
            .get(definition)
            .expect("definition registered")
            .definition()
            .ammo_type
            .clone()
    }
}

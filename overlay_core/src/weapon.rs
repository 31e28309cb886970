//! Authored weapon definitions layered over base firearm types.
//!
//! A [`CustomWeapon`] owns one [`WeaponDefinition`], the set of item serials
//! it has produced, and the hooks that customise its behaviour. While it
//! tracks at least one serial it is subscribed to the shared [`EventHubs`];
//! each handler first checks that the event concerns one of its serials, then
//! hands the event to the hooks.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError, Weak};

use bevy::math::Vec3;
use rand::Rng;
use thiserror::Error;

use crate::config::{
    BaseItemSpec, DamageRules, ItemCatalog, OverlayConfig, ReloadRules, SpawnProperties,
    WeaponSpec,
};
use crate::events::{
    Deniable, DroppingItemEvent, HurtingEvent, ItemDestroyedEvent, PickingUpItemEvent,
    ReloadingWeaponEvent, ShootingEvent, ShotEvent,
};
use crate::host::{HostError, SimulationHost};
use crate::hub::{EventHubs, HandlerError, HandlerResult, SubscriptionId};
use crate::ids::{AmmoType, DamageType, DefinitionId, ItemSerial, ItemType, PlayerId};
use crate::tracking::{Activation, TrackedSerials};

/// Validated, immutable parameters of an authored weapon.
#[derive(Debug, Clone, PartialEq)]
pub struct WeaponDefinition {
    pub id: DefinitionId,
    pub name: String,
    pub description: String,
    pub base_type: ItemType,
    pub ammo_type: AmmoType,
    pub damage_type: DamageType,
    /// Damage per hit. `0` keeps whatever the base simulation computed.
    pub damage: f32,
    /// Magazine capacity written on spawn/give and used as the reload ceiling.
    pub clip_size: u16,
    pub weight: f32,
    pub spawn: SpawnProperties,
}

#[derive(Debug, Error, PartialEq)]
pub enum DefinitionError {
    #[error("weapon '{name}' uses unknown base type '{base_type}'")]
    UnknownBaseType { name: String, base_type: ItemType },
    #[error("weapon '{name}' base type '{base_type}' is not a firearm")]
    NotAFirearm { name: String, base_type: ItemType },
    #[error("weapon '{name}' has a clip size of zero")]
    EmptyClip { name: String },
    #[error("weapon '{name}' has invalid damage {damage}")]
    InvalidDamage { name: String, damage: f32 },
    #[error("weapon '{name}' has invalid weight {weight}")]
    InvalidWeight { name: String, weight: f32 },
}

impl WeaponDefinition {
    pub fn new(spec: WeaponSpec, catalog: &ItemCatalog) -> Result<Self, DefinitionError> {
        let (ammo_type, damage_type) = match catalog.get(&spec.base_type) {
            Some(BaseItemSpec::Firearm {
                ammo_type,
                damage_type,
            }) => (ammo_type.clone(), damage_type.clone()),
            Some(BaseItemSpec::Other) => {
                return Err(DefinitionError::NotAFirearm {
                    name: spec.name,
                    base_type: spec.base_type,
                })
            }
            None => {
                return Err(DefinitionError::UnknownBaseType {
                    name: spec.name,
                    base_type: spec.base_type,
                })
            }
        };
        if spec.clip_size == 0 {
            return Err(DefinitionError::EmptyClip { name: spec.name });
        }
        if !spec.damage.is_finite() || spec.damage < 0.0 {
            return Err(DefinitionError::InvalidDamage {
                name: spec.name,
                damage: spec.damage,
            });
        }
        if !spec.weight.is_finite() || spec.weight < 0.0 {
            return Err(DefinitionError::InvalidWeight {
                name: spec.name,
                weight: spec.weight,
            });
        }

        Ok(Self {
            id: spec.id,
            name: spec.name,
            description: spec.description,
            base_type: spec.base_type,
            ammo_type,
            damage_type,
            damage: spec.damage,
            clip_size: spec.clip_size,
            weight: spec.weight,
            spawn: spec.spawn,
        })
    }
}

/// Rounds to move from the reserve pool into the magazine, or `None` when the
/// magazine is already full or the reserve is empty.
pub fn plan_reload(clip_size: u16, current_ammo: u16, reserve_ammo: u16) -> Option<u16> {
    let amount = clip_size.saturating_sub(current_ammo).min(reserve_ammo);
    (amount > 0).then_some(amount)
}

/// Rules shared by every weapon, taken from configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeaponRules {
    pub damage: DamageRules,
    pub reload: ReloadRules,
}

impl WeaponRules {
    pub fn from_config(config: &OverlayConfig) -> Self {
        Self {
            damage: config.damage.clone(),
            reload: config.reload.clone(),
        }
    }
}

/// What a hook can see besides the event.
pub struct WeaponContext<'a> {
    pub definition: &'a WeaponDefinition,
    pub host: &'a dyn SimulationHost,
    pub rules: &'a WeaponRules,
}

/// Per-weapon extension points.
///
/// Hooks only run for events that concern a serial owned by the weapon. A hook
/// that finds the event already denied should leave it alone.
pub trait WeaponHooks: Send {
    /// Runs before the overlay takes over the reload. Denying here cancels it.
    fn on_reloading(
        &mut self,
        _ctx: &WeaponContext<'_>,
        _event: &mut ReloadingWeaponEvent,
    ) -> HandlerResult {
        Ok(())
    }

    fn on_shooting(&mut self, _ctx: &WeaponContext<'_>, _event: &mut ShootingEvent) -> HandlerResult {
        Ok(())
    }

    fn on_shot(&mut self, _ctx: &WeaponContext<'_>, _event: &mut ShotEvent) -> HandlerResult {
        Ok(())
    }

    /// Defaults to [`apply_configured_damage`].
    fn on_hurting(&mut self, ctx: &WeaponContext<'_>, event: &mut HurtingEvent) -> HandlerResult {
        apply_configured_damage(ctx, event)
    }

    fn on_dropping(
        &mut self,
        _ctx: &WeaponContext<'_>,
        _event: &mut DroppingItemEvent,
    ) -> HandlerResult {
        Ok(())
    }

    fn on_picking_up(
        &mut self,
        _ctx: &WeaponContext<'_>,
        _event: &mut PickingUpItemEvent,
    ) -> HandlerResult {
        Ok(())
    }
}

/// Hooks with no customisation.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHooks;

impl WeaponHooks for DefaultHooks {}

/// Replace the hit's damage with the weapon's configured damage.
///
/// Targets playing an armored role take the configured fraction only. Does
/// nothing on a denied event or when the weapon's damage is `0`.
pub fn apply_configured_damage(ctx: &WeaponContext<'_>, event: &mut HurtingEvent) -> HandlerResult {
    if !event.is_allowed() || ctx.definition.damage <= 0.0 {
        return Ok(());
    }
    let role = ctx.host.player_role(event.target)?;
    event.amount = ctx.rules.damage.damage_against(ctx.definition.damage, &role);
    Ok(())
}

#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("host call failed: {0}")]
    Host(#[from] HostError),
    /// The host created the item but a later step failed. The serial stays
    /// tracked so its destruction notice still releases it.
    #[error("item {serial} was created but not fully prepared: {source}")]
    Incomplete {
        serial: ItemSerial,
        #[source]
        source: HostError,
    },
}

#[derive(Debug, Clone, Copy)]
struct WeaponSubscriptions {
    reloading: SubscriptionId,
    shooting: SubscriptionId,
    shot: SubscriptionId,
    hurting: SubscriptionId,
    dropping: SubscriptionId,
    picking_up: SubscriptionId,
    item_destroyed: SubscriptionId,
}

/// Live overlay for one authored weapon.
pub struct CustomWeapon {
    definition: WeaponDefinition,
    rules: WeaponRules,
    hooks: Mutex<Box<dyn WeaponHooks>>,
    tracked: Mutex<TrackedSerials>,
    subscriptions: Mutex<Option<WeaponSubscriptions>>,
    hubs: Arc<EventHubs>,
    host: Arc<dyn SimulationHost>,
    this: Weak<CustomWeapon>,
}

impl fmt::Debug for CustomWeapon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomWeapon")
            .field("definition", &self.definition)
            .field("tracked", &self.tracked_count())
            .field("active", &self.is_active())
            .finish()
    }
}

impl CustomWeapon {
    pub fn new(
        definition: WeaponDefinition,
        hooks: Box<dyn WeaponHooks>,
        hubs: Arc<EventHubs>,
        host: Arc<dyn SimulationHost>,
        rules: WeaponRules,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            definition,
            rules,
            hooks: Mutex::new(hooks),
            tracked: Mutex::new(TrackedSerials::new()),
            subscriptions: Mutex::new(None),
            hubs,
            host,
            this: this.clone(),
        })
    }

    pub fn with_default_hooks(
        definition: WeaponDefinition,
        hubs: Arc<EventHubs>,
        host: Arc<dyn SimulationHost>,
        rules: WeaponRules,
    ) -> Arc<Self> {
        Self::new(definition, Box::new(DefaultHooks), hubs, host, rules)
    }

    pub fn definition(&self) -> &WeaponDefinition {
        &self.definition
    }

    pub fn id(&self) -> DefinitionId {
        self.definition.id
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn is_tracked(&self, serial: ItemSerial) -> bool {
        self.tracked().is_tracked(serial)
    }

    pub fn tracked_count(&self) -> usize {
        self.tracked().len()
    }

    pub fn tracked_serials(&self) -> Vec<ItemSerial> {
        let mut serials: Vec<_> = self.tracked().iter().collect();
        serials.sort();
        serials
    }

    /// Whether the weapon currently listens on the event hubs.
    pub fn is_active(&self) -> bool {
        self.subscriptions().is_some()
    }

    /// Drop a pickup of this weapon at `position`.
    pub fn spawn(&self, position: Vec3) -> Result<ItemSerial, OverlayError> {
        let serial = self
            .host
            .spawn_pickup(&self.definition.base_type, position)?;
        self.track(serial);
        self.prepare_pickup(serial)
            .map_err(|source| self.incomplete(serial, source))?;
        tracing::debug!(
            target: "overlay::weapon",
            weapon = %self.definition.name,
            serial = %serial,
            x = position.x,
            y = position.y,
            z = position.z,
            "weapon.spawned"
        );
        Ok(serial)
    }

    fn prepare_pickup(&self, serial: ItemSerial) -> Result<(), HostError> {
        self.host.set_pickup_weight(serial, self.definition.weight)?;
        match self.host.firearm_status(serial) {
            Ok(mut status) => {
                status.ammo = self.definition.clip_size;
                self.host.set_firearm_status(serial, status)
            }
            Err(HostError::NotAFirearm(_)) => Ok(()),
            Err(err) => Err(err),
        }
    }

    fn incomplete(&self, serial: ItemSerial, source: HostError) -> OverlayError {
        tracing::warn!(
            target: "overlay::weapon",
            weapon = %self.definition.name,
            serial = %serial,
            error = %source,
            "weapon.prepare_failed"
        );
        OverlayError::Incomplete { serial, source }
    }

    pub fn spawn_at_player(&self, player: PlayerId) -> Result<ItemSerial, OverlayError> {
        let position = self.host.player_position(player)?;
        self.spawn(position)
    }

    /// Roll every configured spawn point in order until `limit` pickups exist.
    pub fn spawn_all<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Vec<ItemSerial>, OverlayError> {
        let properties = &self.definition.spawn;
        let mut spawned = Vec::new();
        for point in &properties.points {
            if spawned.len() >= properties.limit as usize {
                break;
            }
            let roll: f32 = rng.gen_range(0.0..100.0);
            if roll >= point.chance {
                continue;
            }
            spawned.push(self.spawn(point.position())?);
        }
        tracing::info!(
            target: "overlay::weapon",
            weapon = %self.definition.name,
            spawned = spawned.len(),
            points = properties.points.len(),
            "weapon.spawn_all"
        );
        Ok(spawned)
    }

    /// Put this weapon, fully loaded, into the player's inventory.
    pub fn give(&self, player: PlayerId, show_hint: bool) -> Result<ItemSerial, OverlayError> {
        let serial = self.host.add_item(player, &self.definition.base_type)?;
        self.track(serial);
        self.host
            .set_firearm_ammo(serial, self.definition.clip_size)
            .map_err(|source| self.incomplete(serial, source))?;
        if show_hint {
            self.host
                .show_pickup_hint(player, &self.definition.name, &self.definition.description);
        }
        tracing::debug!(
            target: "overlay::weapon",
            weapon = %self.definition.name,
            serial = %serial,
            %player,
            "weapon.given"
        );
        Ok(serial)
    }

    /// Claim an item the host created by other means. Ownership checks
    /// across definitions live in [`crate::CustomItemRegistry::claim`].
    pub(crate) fn claim(&self, serial: ItemSerial) {
        self.track(serial);
    }

    /// Forget a serial. Returns `false` when it was not tracked.
    pub fn release(&self, serial: ItemSerial) -> bool {
        let (was_tracked, activation) = {
            let mut tracked = self.tracked();
            let was_tracked = tracked.is_tracked(serial);
            (was_tracked, tracked.unregister(serial))
        };
        if activation == Activation::Deactivated {
            self.deactivate();
        }
        if !was_tracked {
            tracing::debug!(
                target: "overlay::weapon",
                weapon = %self.definition.name,
                serial = %serial,
                "weapon.release_untracked"
            );
        }
        was_tracked
    }

    fn track(&self, serial: ItemSerial) {
        let activation = self.tracked().register(serial);
        if activation == Activation::Activated {
            self.activate();
        }
    }

    fn activate(&self) {
        let mut subscriptions = self.subscriptions();
        if subscriptions.is_some() {
            return;
        }
        let label: Arc<str> = Arc::from(format!("weapon:{}", self.definition.name));
        *subscriptions = Some(WeaponSubscriptions {
            reloading: self
                .hubs
                .reloading
                .subscribe(label.clone(), self.route(Self::handle_reloading)),
            shooting: self
                .hubs
                .shooting
                .subscribe(label.clone(), self.route(Self::handle_shooting)),
            shot: self
                .hubs
                .shot
                .subscribe(label.clone(), self.route(Self::handle_shot)),
            hurting: self
                .hubs
                .hurting
                .subscribe(label.clone(), self.route(Self::handle_hurting)),
            dropping: self
                .hubs
                .dropping
                .subscribe(label.clone(), self.route(Self::handle_dropping)),
            picking_up: self
                .hubs
                .picking_up
                .subscribe(label.clone(), self.route(Self::handle_picking_up)),
            item_destroyed: self
                .hubs
                .item_destroyed
                .subscribe(label, self.route(Self::handle_item_destroyed)),
        });
        tracing::info!(
            target: "overlay::weapon",
            weapon = %self.definition.name,
            "weapon.activated"
        );
    }

    fn deactivate(&self) {
        let Some(subscriptions) = self.subscriptions().take() else {
            return;
        };
        self.hubs.reloading.unsubscribe(subscriptions.reloading);
        self.hubs.shooting.unsubscribe(subscriptions.shooting);
        self.hubs.shot.unsubscribe(subscriptions.shot);
        self.hubs.hurting.unsubscribe(subscriptions.hurting);
        self.hubs.dropping.unsubscribe(subscriptions.dropping);
        self.hubs.picking_up.unsubscribe(subscriptions.picking_up);
        self.hubs
            .item_destroyed
            .unsubscribe(subscriptions.item_destroyed);
        tracing::info!(
            target: "overlay::weapon",
            weapon = %self.definition.name,
            "weapon.deactivated"
        );
    }

    /// Wrap a handler so the hub holds only a weak reference to the weapon.
    fn route<E: 'static>(
        &self,
        handler: fn(&CustomWeapon, &mut E) -> HandlerResult,
    ) -> impl FnMut(&mut E) -> HandlerResult + Send + 'static {
        let weak = self.this.clone();
        move |event: &mut E| match weak.upgrade() {
            Some(weapon) => handler(&*weapon, event),
            None => Ok(()),
        }
    }

    fn handle_reloading(&self, event: &mut ReloadingWeaponEvent) -> HandlerResult {
        if !self.is_tracked(event.serial) {
            return Ok(());
        }
        self.run_hooks(|hooks, ctx| hooks.on_reloading(ctx, event))?;
        if !event.is_allowed() {
            return Ok(());
        }

        // The overlay reloads by itself; the host must not run its own reload.
        event.deny();

        let ammo_type = &self.definition.ammo_type;
        let current = self.host.firearm_ammo(event.serial)?;
        let reserve = self.host.reserve_ammo(event.player, ammo_type)?;
        let Some(amount) = plan_reload(self.definition.clip_size, current, reserve) else {
            return Ok(());
        };

        self.host.request_reload_animation(event.player, event.serial)?;
        if let Some(effect) = &self.rules.reload.cleared_effect {
            self.host.set_effect_intensity(event.player, effect, 0)?;
        }
        self.host
            .set_reserve_ammo(event.player, ammo_type, reserve - amount)?;
        if let Err(err) = self.host.set_firearm_ammo(event.serial, current + amount) {
            self.host.set_reserve_ammo(event.player, ammo_type, reserve)?;
            return Err(err.into());
        }

        tracing::debug!(
            target: "overlay::weapon",
            weapon = %self.definition.name,
            serial = %event.serial,
            player = %event.player,
            amount,
            "weapon.reloaded"
        );
        Ok(())
    }

    fn handle_shooting(&self, event: &mut ShootingEvent) -> HandlerResult {
        if !self.is_tracked(event.serial) {
            return Ok(());
        }
        self.run_hooks(|hooks, ctx| hooks.on_shooting(ctx, event))
    }

    fn handle_shot(&self, event: &mut ShotEvent) -> HandlerResult {
        if !self.is_tracked(event.serial) {
            return Ok(());
        }
        self.run_hooks(|hooks, ctx| hooks.on_shot(ctx, event))
    }

    fn handle_hurting(&self, event: &mut HurtingEvent) -> HandlerResult {
        let Some(attacker) = event.attacker else {
            return Ok(());
        };
        let Some(weapon) = attacker.weapon else {
            return Ok(());
        };
        if !self.is_tracked(weapon)
            || attacker.player == event.target
            || event.damage_type != self.definition.damage_type
        {
            return Ok(());
        }
        self.run_hooks(|hooks, ctx| hooks.on_hurting(ctx, event))
    }

    fn handle_dropping(&self, event: &mut DroppingItemEvent) -> HandlerResult {
        if !self.is_tracked(event.serial) {
            return Ok(());
        }
        self.run_hooks(|hooks, ctx| hooks.on_dropping(ctx, event))
    }

    fn handle_picking_up(&self, event: &mut PickingUpItemEvent) -> HandlerResult {
        if !self.is_tracked(event.serial) {
            return Ok(());
        }
        self.run_hooks(|hooks, ctx| hooks.on_picking_up(ctx, event))
    }

    fn handle_item_destroyed(&self, event: &mut ItemDestroyedEvent) -> HandlerResult {
        self.release(event.serial);
        Ok(())
    }

    fn run_hooks<F>(&self, hook: F) -> HandlerResult
    where
        F: FnOnce(&mut Box<dyn WeaponHooks>, &WeaponContext<'_>) -> HandlerResult,
    {
        let mut hooks = match self.hooks.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                return Err(HandlerError::Busy(format!(
                    "hooks of weapon '{}'",
                    self.definition.name
                )))
            }
        };
        let ctx = WeaponContext {
            definition: &self.definition,
            host: self.host.as_ref(),
            rules: &self.rules,
        };
        hook(&mut *hooks, &ctx)
    }

    fn tracked(&self) -> MutexGuard<'_, TrackedSerials> {
        self.tracked.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn subscriptions(&self) -> MutexGuard<'_, Option<WeaponSubscriptions>> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for CustomWeapon {
    fn drop(&mut self) {
        self.deactivate();
    }
}

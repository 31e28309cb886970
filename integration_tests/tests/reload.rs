mod common;

use common::{Harness, CARBINE};
use overlay_core::{
    Deniable, HandlerResult, ItemSerial, PlayerId, ReloadingWeaponEvent, SimulationHost,
    StatusEffect, WeaponContext, WeaponHooks,
};

fn armed_player(harness: &Harness, current: u16, reserve: u16) -> (PlayerId, ItemSerial) {
    let player = harness.player(1, "task_force_private");
    let carbine = harness.registry.get(CARBINE).expect("carbine");
    let serial = carbine.give(player, false).expect("give");
    let ammo = harness.ammo_of(CARBINE);
    harness.host.set_firearm_ammo(serial, current).expect("ammo");
    harness
        .host
        .set_reserve_ammo(player, &ammo, reserve)
        .expect("reserve");
    harness
        .host
        .set_effect_intensity(player, &StatusEffect::new("invisible"), 1)
        .expect("effect");
    (player, serial)
}

fn state(harness: &Harness, player: PlayerId, serial: ItemSerial) -> (u16, u16) {
    let ammo = harness.ammo_of(CARBINE);
    (
        harness.host.firearm_ammo(serial).expect("ammo"),
        harness.host.reserve_ammo(player, &ammo).expect("reserve"),
    )
}

#[test]
fn reload_moves_only_what_the_clip_needs() {
    let harness = Harness::new();
    let (player, serial) = armed_player(&harness, 10, 50);

    let mut event = ReloadingWeaponEvent::new(player, serial);
    harness.hubs.reloading.dispatch(&mut event);

    assert!(!event.is_allowed(), "host reload must be suppressed");
    assert_eq!(state(&harness, player, serial), (20, 40));
    assert_eq!(harness.host.reload_animations(), vec![(player, serial)]);
    assert_eq!(
        harness
            .host
            .effect_intensity(player, &StatusEffect::new("invisible")),
        0
    );
}

#[test]
fn reload_with_short_reserve_empties_it() {
    let harness = Harness::new();
    let (player, serial) = armed_player(&harness, 10, 5);

    let mut event = ReloadingWeaponEvent::new(player, serial);
    harness.hubs.reloading.dispatch(&mut event);

    assert_eq!(state(&harness, player, serial), (15, 0));
}

#[test]
fn total_rounds_are_conserved() {
    for (current, reserve) in [(0u16, 100u16), (10, 50), (19, 1), (3, 7), (20, 40)] {
        let harness = Harness::new();
        let (player, serial) = armed_player(&harness, current, reserve);

        let mut event = ReloadingWeaponEvent::new(player, serial);
        harness.hubs.reloading.dispatch(&mut event);

        let (after_current, after_reserve) = state(&harness, player, serial);
        assert_eq!(after_current + after_reserve, current + reserve);
        assert!(after_current <= 20);
    }
}

#[test]
fn full_clip_is_denied_without_side_effects() {
    let harness = Harness::new();
    let (player, serial) = armed_player(&harness, 20, 40);

    let mut event = ReloadingWeaponEvent::new(player, serial);
    harness.hubs.reloading.dispatch(&mut event);

    assert!(!event.is_allowed());
    assert_eq!(state(&harness, player, serial), (20, 40));
    assert!(harness.host.reload_animations().is_empty());
    assert_eq!(
        harness
            .host
            .effect_intensity(player, &StatusEffect::new("invisible")),
        1
    );
}

#[test]
fn untracked_weapons_reload_normally() {
    let harness = Harness::new();
    let player = harness.player(2, "task_force_private");
    let serial = harness
        .host
        .add_item(player, &"carbine".into())
        .expect("plain carbine");
    // Keep the overlay active with an unrelated instance.
    harness
        .registry
        .get(CARBINE)
        .expect("carbine")
        .give(player, false)
        .expect("give");

    let mut event = ReloadingWeaponEvent::new(player, serial);
    harness.hubs.reloading.dispatch(&mut event);

    assert!(event.is_allowed());
    assert!(harness.host.reload_animations().is_empty());
}

#[derive(Default)]
struct JammedHooks;

impl WeaponHooks for JammedHooks {
    fn on_reloading(
        &mut self,
        _ctx: &WeaponContext<'_>,
        event: &mut ReloadingWeaponEvent,
    ) -> HandlerResult {
        event.deny();
        Ok(())
    }
}

#[test]
fn hook_denial_cancels_the_overlay_reload() {
    let harness = Harness::new();
    let player = harness.player(3, "task_force_private");
    let carbine = harness.registry.get(CARBINE).expect("carbine");
    let jammed = overlay_core::CustomWeapon::new(
        carbine.definition().clone(),
        Box::new(JammedHooks),
        harness.hubs.clone(),
        harness.host.clone(),
        overlay_core::WeaponRules::from_config(&harness.config),
    );
    let serial = jammed.give(player, false).expect("give");
    harness.host.set_firearm_ammo(serial, 5).expect("ammo");
    harness
        .host
        .set_reserve_ammo(player, &harness.ammo_of(CARBINE), 30)
        .expect("reserve");

    let mut event = ReloadingWeaponEvent::new(player, serial);
    harness.hubs.reloading.dispatch(&mut event);

    assert!(!event.is_allowed());
    assert_eq!(state(&harness, player, serial), (5, 30));
}

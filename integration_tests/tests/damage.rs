mod common;

use bevy::math::Vec3;
use common::{Harness, CARBINE, SHOTGUN, TRAINING_PISTOL};
use overlay_core::{Attacker, Deniable, HurtingEvent, ItemSerial, PlayerId};

fn hit(
    harness: &Harness,
    attacker: PlayerId,
    weapon: ItemSerial,
    target: PlayerId,
    kind: &str,
) -> HurtingEvent {
    let mut event = HurtingEvent::new(
        Some(Attacker {
            player: attacker,
            weapon: Some(weapon),
        }),
        target,
        12.0,
        kind.into(),
    );
    harness.hubs.hurting.dispatch(&mut event);
    event
}

#[test]
fn configured_damage_replaces_base_damage() {
    let harness = Harness::new();
    let shooter = harness.player(1, "task_force_private");
    let target = harness.player(2, "insurgent_rifleman");
    let serial = harness
        .registry
        .get(CARBINE)
        .expect("carbine")
        .give(shooter, false)
        .expect("give");

    let event = hit(&harness, shooter, serial, target, "ballistic_carbine");
    assert!((event.amount - 45.0).abs() < 1e-4);
    assert!(event.is_allowed());
}

#[test]
fn armored_targets_take_reduced_damage() {
    let harness = Harness::new();
    let shooter = harness.player(1, "insurgent_rifleman");
    let target = harness.player(2, "juggernaut");
    let serial = harness
        .registry
        .get(SHOTGUN)
        .expect("shotgun")
        .give(shooter, false)
        .expect("give");

    let event = hit(&harness, shooter, serial, target, "ballistic_shotgun");
    assert!((event.amount - 7.0).abs() < 1e-3);
}

#[test]
fn self_damage_and_other_damage_types_are_untouched() {
    let harness = Harness::new();
    let shooter = harness.player(1, "task_force_private");
    let target = harness.player(2, "insurgent_rifleman");
    let serial = harness
        .registry
        .get(CARBINE)
        .expect("carbine")
        .give(shooter, false)
        .expect("give");

    let own = hit(&harness, shooter, serial, shooter, "ballistic_carbine");
    assert!((own.amount - 12.0).abs() < 1e-4);

    let blast = hit(&harness, shooter, serial, target, "explosion");
    assert!((blast.amount - 12.0).abs() < 1e-4);
}

#[test]
fn zero_configured_damage_keeps_base_damage() {
    let harness = Harness::new();
    let shooter = harness.player(1, "task_force_private");
    let target = harness.player(2, "insurgent_rifleman");
    let serial = harness
        .registry
        .get(TRAINING_PISTOL)
        .expect("training pistol")
        .give(shooter, false)
        .expect("give");

    let event = hit(&harness, shooter, serial, target, "ballistic_pistol");
    assert!((event.amount - 12.0).abs() < 1e-4);
}

#[test]
fn untracked_weapon_hits_are_untouched() {
    let harness = Harness::new();
    let shooter = harness.player(1, "task_force_private");
    let target = harness.player(2, "insurgent_rifleman");
    let carbine = harness.registry.get(CARBINE).expect("carbine");
    carbine.spawn(Vec3::ZERO).expect("keep active");

    let event = hit(&harness, shooter, ItemSerial(999), target, "ballistic_carbine");
    assert!((event.amount - 12.0).abs() < 1e-4);

    let mut environmental = HurtingEvent::new(None, target, 3.0, "falldown".into());
    let report = harness.hubs.hurting.dispatch(&mut environmental);
    assert_eq!(report.failed, 0);
    assert!((environmental.amount - 3.0).abs() < 1e-4);
}

#[test]
fn unknown_target_is_reported_as_a_failure() {
    let harness = Harness::new();
    let shooter = harness.player(1, "task_force_private");
    let serial = harness
        .registry
        .get(CARBINE)
        .expect("carbine")
        .give(shooter, false)
        .expect("give");

    let mut event = HurtingEvent::new(
        Some(Attacker {
            player: shooter,
            weapon: Some(serial),
        }),
        PlayerId(404),
        12.0,
        "ballistic_carbine".into(),
    );
    let report = harness.hubs.hurting.dispatch(&mut event);
    assert_eq!(report.failed, 1);
    assert!((event.amount - 12.0).abs() < 1e-4);
}

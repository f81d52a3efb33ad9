use outpost_core::{CellCoord, Command, FactionId, Ticks, UnitType};
use outpost_system_objectives::{is_defeated, DEFEAT_GRACE_TICKS};
use outpost_world::{self as world, World};

const PLAYER: FactionId = FactionId::new(1);
const ENEMY: FactionId = FactionId::new(2);

#[test]
fn empty_factions_are_spared_during_the_grace_period() {
    let world = World::new();

    assert!(!is_defeated(&world, PLAYER, Ticks::ZERO));
    assert!(!is_defeated(&world, PLAYER, DEFEAT_GRACE_TICKS));
    assert!(is_defeated(&world, PLAYER, Ticks::new(3)));
}

#[test]
fn factions_with_required_units_are_not_defeated() {
    let mut world = World::new();
    let tank = world.place(None, &UnitType::new("mtnk"), ENEMY, CellCoord::new(2, 2));

    assert!(!is_defeated(&world, ENEMY, Ticks::new(100)));

    let mut events = Vec::new();
    world::apply(&mut world, Command::Kill { entity: tank }, &mut events);
    assert!(is_defeated(&world, ENEMY, Ticks::new(100)));
}

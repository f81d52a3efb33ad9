use outpost_core::{Capability, CellCoord, Command, EntityId, FactionId, UnitType};
use outpost_system_repair::RepairWatcher;
use outpost_world::{self as world, query, ActorTemplate, JournalEntry, World};

const PLAYER: FactionId = FactionId::new(1);
const ENEMY: FactionId = FactionId::new(2);

fn world_with_refinery() -> (World, EntityId) {
    let mut world = World::new();
    world.define_template(
        UnitType::new("proc"),
        ActorTemplate {
            max_health: 1000,
            capabilities: vec![Capability::Building, Capability::SelfRepair],
            attacker: false,
            required: true,
        },
    );
    world.define_template(
        UnitType::new("sam"),
        ActorTemplate {
            max_health: 1000,
            capabilities: vec![Capability::Building],
            attacker: false,
            required: true,
        },
    );
    let refinery = world.place(Some("refinery"), &UnitType::new("proc"), ENEMY, CellCoord::new(5, 5));
    (world, refinery)
}

fn damage(world: &mut World, watcher: &mut RepairWatcher, entity: EntityId, amount: u32) -> Vec<EntityId> {
    let mut events = Vec::new();
    world::apply(
        world,
        Command::Damage {
            entity,
            amount,
            attacker: None,
        },
        &mut events,
    );
    let mut repaired = Vec::new();
    watcher.handle(world, &events, &mut repaired);
    repaired
}

fn repair_requests(world: &World) -> usize {
    query::journal(world)
        .iter()
        .filter(|entry| matches!(entry, JournalEntry::StartRepair(_)))
        .count()
}

#[test]
fn repairs_start_below_threshold_and_repeat() {
    let (mut world, refinery) = world_with_refinery();
    let mut watcher = RepairWatcher::install(&world, ENEMY, 0.6);

    assert!(damage(&mut world, &mut watcher, refinery, 350).is_empty(), "650 of 1000 is above 60%");
    assert_eq!(repair_requests(&world), 0);

    assert_eq!(damage(&mut world, &mut watcher, refinery, 100), vec![refinery]);
    assert_eq!(repair_requests(&world), 1);
    assert!(query::is_repairing(&world, refinery));

    assert_eq!(damage(&mut world, &mut watcher, refinery, 50), vec![refinery]);
    assert_eq!(repair_requests(&world), 2, "repair requests are not deduplicated");
}

#[test]
fn structures_without_self_repair_are_ignored() {
    let (mut world, _) = world_with_refinery();
    let sam = world.place(None, &UnitType::new("sam"), ENEMY, CellCoord::new(6, 6));
    let mut watcher = RepairWatcher::install(&world, ENEMY, 0.9);

    assert_eq!(watcher.rules().count(), 1);
    assert!(damage(&mut world, &mut watcher, sam, 500).is_empty());
}

#[test]
fn captured_structures_are_no_longer_repaired() {
    let (mut world, refinery) = world_with_refinery();
    let mut watcher = RepairWatcher::install(&world, ENEMY, 0.6);
    let mut events = Vec::new();
    world::apply(
        &mut world,
        Command::Capture {
            entity: refinery,
            faction: PLAYER,
        },
        &mut events,
    );

    assert!(damage(&mut world, &mut watcher, refinery, 900).is_empty());
}

#[test]
fn rules_end_with_their_structure() {
    let (mut world, refinery) = world_with_refinery();
    let mut watcher = RepairWatcher::install(&world, ENEMY, 0.6);

    let _ = damage(&mut world, &mut watcher, refinery, 1000);
    assert_eq!(watcher.rules().count(), 0);
}

use outpost_core::{CellCoord, Command, FactionId, Stance, Tick, Ticks, UnitType, WorldHost};
use outpost_system_reinforcements::{ArrivalOrder, Delivered, ReinforcementScheduler};
use outpost_world::{self as world, query, JournalEntry, Order, World};

const PLAYER: FactionId = FactionId::new(1);

fn path() -> Vec<CellCoord> {
    vec![
        CellCoord::new(0, 10),
        CellCoord::new(4, 8),
        CellCoord::new(8, 6),
    ]
}

fn run(
    world: &mut World,
    scheduler: &mut ReinforcementScheduler,
    ticks: u64,
) -> Vec<Delivered> {
    let mut delivered = Vec::new();
    let mut events = Vec::new();
    for _ in 0..ticks {
        world::apply(world, Command::Tick, &mut events);
        scheduler.deliver_due(world, &mut delivered);
    }
    delivered
}

#[test]
fn units_arrive_spaced_by_the_per_unit_delay() {
    let mut world = World::new();
    let mut scheduler = ReinforcementScheduler::new();
    let units = vec![UnitType::new("e1"), UnitType::new("e1"), UnitType::new("mtnk")];

    let last = scheduler
        .reinforce(
            &world,
            PLAYER,
            &units,
            &path(),
            Ticks::new(10),
            ArrivalOrder::Hold,
        )
        .expect("path is not empty");
    assert_eq!(last, Some(Tick::new(21)));

    let delivered = run(&mut world, &mut scheduler, 25);
    let ticks: Vec<_> = delivered.iter().map(|unit| unit.fire_tick).collect();
    assert_eq!(ticks, vec![Tick::new(1), Tick::new(11), Tick::new(21)]);
    let gaps: Vec<u64> = ticks
        .windows(2)
        .map(|pair| pair[1].since(pair[0]).get())
        .collect();
    assert_eq!(gaps, vec![10, 10]);
    assert_eq!(delivered[2].unit_type, UnitType::new("mtnk"));
    assert_eq!(scheduler.pending(), 0);
}

#[test]
fn delivered_units_enter_at_the_first_cell_and_follow_the_rest() {
    let mut world = World::new();
    let mut scheduler = ReinforcementScheduler::new();
    let _ = scheduler
        .reinforce(
            &world,
            PLAYER,
            &[UnitType::new("jeep")],
            &path(),
            Ticks::ZERO,
            ArrivalOrder::SetStance(Stance::Defend),
        )
        .expect("path is not empty");

    let delivered = run(&mut world, &mut scheduler, 1);
    let jeep = delivered[0].entity;

    assert_eq!(world.owner(jeep), Some(PLAYER));
    assert_eq!(world.location(jeep), Some(CellCoord::new(0, 10)));
    assert_eq!(query::orders(&world, jeep), vec![Order::Move(path()[1..].to_vec())]);
    assert_eq!(query::stance(&world, jeep), Some(Stance::Defend));

    let journal = query::journal(&world);
    assert!(matches!(journal[0], JournalEntry::Spawned { entity, .. } if entity == jeep));
    assert!(matches!(journal[1], JournalEntry::MoveAlong { entity, .. } if entity == jeep));
    assert!(matches!(journal[2], JournalEntry::SetStance { entity, .. } if entity == jeep));
}

#[test]
fn empty_paths_are_rejected() {
    let world = World::new();
    let mut scheduler = ReinforcementScheduler::new();
    let result = scheduler.reinforce(
        &world,
        PLAYER,
        &[UnitType::new("e1")],
        &[],
        Ticks::new(5),
        ArrivalOrder::Hunt,
    );

    assert!(result.is_err());
    assert_eq!(scheduler.pending(), 0);
}

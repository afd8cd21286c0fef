//! Whole-tick scenarios driven through the public simulation API.

use arena_common::{ArenaError, CommandError, EntityId, MatchId, Team};
use arena_sim::prelude::*;

const UNITS: &str = r#"[
    (
        name: "brute", class: Melee, cost: 1.0, health: 500.0, radius: 50.0, speed: 1.0,
        damage: 10.0, attack_rate: 10, damage_frame: 5, attack_radius: 100.0, aggro_radius: 400.0,
        attack: Melee,
    ),
    (
        name: "dummy", class: Melee, cost: 1.0, health: 5000.0, radius: 50.0, speed: 1.0,
        damage: 0.0, attack_rate: 10, damage_frame: 5, attack_radius: 10.0, aggro_radius: 100.0,
        attack: Melee,
    ),
    (
        name: "slinger", class: Range, cost: 1.0, health: 200.0, radius: 20.0, speed: 1.0,
        damage: 35.0, attack_rate: 4, damage_frame: 2, attack_radius: 200.0, aggro_radius: 300.0,
        attack: Range(projectile: "stone"),
    ),
    (
        name: "ogre", class: Melee, cost: 1.0, health: 900.0, radius: 30.0, speed: 1.0,
        damage: 10.0, attack_rate: 4, damage_frame: 2, attack_radius: 20.0, aggro_radius: 300.0,
        attack: Melee,
        special: Some((
            rate: 4, max_charge: 1, damage_frame: 2, damage_end_frame: 2, attack_radius: 20.0,
            structure_targetable: false,
            power: KnockUp(radius: 60.0, height: 30.0, speed: 10.0, damage: 25.0),
        )),
    ),
    (
        name: "base", class: Structure, health: 100.0, radius: 30.0,
        damage: 0.0, attack_rate: 10, damage_frame: 5, attack_radius: 50.0, aggro_radius: 50.0,
        attack: Structure, structure: Some(Base),
    ),
    (
        name: "tower", class: Structure, health: 200.0, radius: 30.0,
        damage: 0.0, attack_rate: 10, damage_frame: 5, attack_radius: 50.0, aggro_radius: 50.0,
        attack: Structure, structure: Some(Tower),
    ),
]"#;

const PROJECTILES: &str = r#"[
    (name: "stone", speed: 20.0, radius: 3.0, center_offset: 10.0, range: 300.0),
]"#;

const MAPS: &str = r#"[
    (
        name: "pit",
        width: 1000.0,
        height: 1000.0,
        lane_step: 50.0,
        blue_base: (x: 50.0, y: 500.0),
        red_base: (x: 950.0, y: 500.0),
        structures: [
            (unit: "base", team: Blue, at: (x: 50.0, y: 500.0)),
            (unit: "base", team: Red, at: (x: 950.0, y: 500.0)),
            (unit: "tower", team: Red, at: (x: 500.0, y: 850.0)),
        ],
    ),
]"#;

const MATCH: MatchId = MatchId::new(1);

fn simulation() -> Simulation {
    let registries = Registries::from_ron(UNITS, PROJECTILES, MAPS).expect("test registries");
    let mut sim = Simulation::new(registries, SimConfig::default()).expect("simulation");
    let deck: Vec<String> = ["brute", "dummy", "slinger", "ogre"].into_iter().map(String::from).collect();
    sim.apply(&Command::CreateMatch {
        match_id: MATCH,
        map: "pit".into(),
        players: [
            PlayerSetup {
                nickname: "blue".into(),
                deck: deck.clone(),
            },
            PlayerSetup {
                nickname: "red".into(),
                deck,
            },
        ],
    })
    .expect("match created");
    sim
}

fn deploy(sim: &mut Simulation, team: Team, unit: &str, x: f32, y: f32) -> EntityId {
    let outcome = sim
        .apply(&Command::CreateUnit {
            match_id: MATCH,
            team,
            unit: unit.into(),
            x,
            y,
        })
        .expect("unit deployed");
    match outcome {
        CommandOutcome::UnitCreated { entity, .. } => entity,
        other => panic!("unexpected outcome {other:?}"),
    }
}

fn structure(sim: &Simulation, kind: StructureKind, team: Team) -> EntityId {
    sim.world()
        .iter::<Structure>()
        .map(|(id, _)| id)
        .find(|id| {
            sim.world().get_ref::<Structure>(*id).is_ok_and(|s| s.kind == kind)
                && sim.world().get_ref::<Body>(*id).is_ok_and(|b| b.team == team)
        })
        .expect("structure placed")
}

fn health(sim: &Simulation, id: EntityId) -> Health {
    sim.world().get::<Health>(id).expect("health")
}

#[test]
fn test_engages_enemy_in_attack_range() {
    let mut sim = simulation();
    let a = deploy(&mut sim, Team::Blue, "brute", 300.0, 150.0);
    let b = deploy(&mut sim, Team::Red, "dummy", 420.0, 150.0);

    sim.tick();

    let attack = sim.world().get_ref::<Attack>(a).expect("attack");
    assert_eq!(attack.state, CombatState::Engaged);
    assert_eq!(attack.target_id(), Some(b));
}

#[test]
fn test_projectile_hits_target() {
    let mut sim = simulation();
    let slinger = deploy(&mut sim, Team::Blue, "slinger", 300.0, 150.0);
    let dummy = deploy(&mut sim, Team::Red, "dummy", 450.0, 150.0);
    sim.events().drain();

    let mut hit = None;
    for _ in 0..40 {
        sim.tick();
        hit = sim.events().drain().into_iter().find_map(|e| match e {
            SimEvent::Damaged {
                entity,
                amount,
                source,
                ..
            } if entity == dummy => Some((amount, source)),
            _ => None,
        });
        if hit.is_some() {
            break;
        }
    }
    let (amount, source) = hit.expect("projectile landed");
    assert_eq!(amount, 35.0);
    assert_eq!(source, Some(slinger));
    assert_eq!(health(&sim, dummy).current, 5000.0 - 35.0);
}

#[test]
fn test_knock_up_returns_target_to_ground() {
    let mut sim = simulation();
    deploy(&mut sim, Team::Blue, "ogre", 300.0, 150.0);
    let dummy = deploy(&mut sim, Team::Red, "dummy", 395.0, 150.0);
    let z = |sim: &Simulation| sim.world().get_ref::<Position>(dummy).expect("position").z;

    let mut launched = false;
    for _ in 0..60 {
        sim.tick();
        if z(&sim) > 0.0 {
            launched = true;
            break;
        }
    }
    assert!(launched, "ogre never knocked the dummy up");

    let mut peak = 0.0f32;
    for _ in 0..20 {
        sim.tick();
        peak = peak.max(z(&sim));
        if z(&sim) == 0.0 {
            break;
        }
    }
    assert_eq!(peak, 30.0);
    assert_eq!(z(&sim), 0.0);
    let cc = sim.world().get_ref::<CrowdControl>(dummy).expect("crowd control");
    assert!(!cc.airborne);
    assert!(health(&sim, dummy).current < 5000.0 - 25.0);
}

#[test]
fn test_tower_converts_and_recovers() {
    let mut sim = simulation();
    let tower = structure(&sim, StructureKind::Tower, Team::Red);
    sim.world_mut().get_mut::<Health>(tower).expect("health").set(0.0);

    sim.tick();
    assert_eq!(sim.world().get_ref::<Body>(tower).expect("body").team, Team::Blue);
    assert_eq!(health(&sim, tower).current, 100.0);
    let state = |sim: &Simulation| sim.world().get_ref::<Structure>(tower).expect("structure").state;
    assert_eq!(state(&sim), StructureState::Converting);

    for _ in 0..9 {
        sim.tick();
    }
    assert_eq!(health(&sim, tower).current, 190.0);
    assert_eq!(state(&sim), StructureState::Converting);

    sim.tick();
    assert_eq!(health(&sim, tower).current, 200.0);
    assert_eq!(state(&sim), StructureState::Default);
    assert!(sim
        .events()
        .drain()
        .iter()
        .any(|e| matches!(e, SimEvent::TowerRestored { entity, .. } if *entity == tower)));
}

#[test]
fn test_base_death_ends_match() {
    let mut sim = simulation();
    let base = structure(&sim, StructureKind::Base, Team::Red);
    sim.world_mut().get_mut::<Health>(base).expect("health").set(0.0);

    sim.tick();
    let state = sim.match_state(MATCH).expect("match");
    assert_eq!(state.winner, Some(Team::Blue));
    assert!(sim
        .events()
        .drain()
        .iter()
        .any(|e| matches!(e, SimEvent::MatchEnded { winner: Team::Blue, .. })));

    let late = sim.apply(&Command::CreateUnit {
        match_id: MATCH,
        team: Team::Red,
        unit: "brute".into(),
        x: 500.0,
        y: 500.0,
    });
    assert!(matches!(late, Err(ArenaError::Command(CommandError::MatchOver(_)))));
    assert_eq!(sim.tick().matches, 0);
}

#[test]
fn test_commands_flow_through_queue() {
    let mut sim = simulation();
    sim.commands()
        .push(Command::CreateUnit {
            match_id: MATCH,
            team: Team::Blue,
            unit: "brute".into(),
            x: 200.0,
            y: 200.0,
        })
        .expect("queued");
    sim.commands()
        .push(Command::CreateUnit {
            match_id: MATCH,
            team: Team::Blue,
            unit: "brute".into(),
            x: 5000.0,
            y: 200.0,
        })
        .expect("queued");

    let report = sim.tick();
    assert_eq!(report.commands, 1);
    assert_eq!(report.rejected, 1);
    let receipts = sim.take_receipts();
    assert!(receipts[0].result.is_ok());
    assert!(matches!(
        receipts[1].result,
        Err(ArenaError::Command(CommandError::OutOfBounds { .. }))
    ));
}

#[test]
fn test_removal_acknowledged_once() {
    let mut sim = simulation();
    let brute = deploy(&mut sim, Team::Blue, "brute", 200.0, 200.0);
    let uid = sim.world().get_ref::<Body>(brute).expect("body").uid;
    sim.world_mut().get_mut::<Health>(brute).expect("health").set(0.0);
    sim.tick();
    assert!(!sim.world().contains(brute));

    let ack = |sim: &mut Simulation| {
        sim.apply(&Command::RemoveUnits {
            match_id: MATCH,
            team: Team::Blue,
            uids: vec![uid],
        })
        .expect("acknowledged")
    };
    assert!(matches!(ack(&mut sim), CommandOutcome::UnitsRemoved { acknowledged: 1, .. }));
    assert!(matches!(ack(&mut sim), CommandOutcome::UnitsRemoved { acknowledged: 0, .. }));
}

#[test]
fn test_remove_all_entities_clears_match() {
    let mut sim = simulation();
    deploy(&mut sim, Team::Blue, "brute", 200.0, 200.0);
    deploy(&mut sim, Team::Red, "slinger", 800.0, 200.0);
    sim.run_for(5);

    let outcome = sim
        .apply(&Command::RemoveAllEntities { match_id: MATCH })
        .expect("removed");
    assert!(matches!(outcome, CommandOutcome::MatchRemoved { .. }));
    assert!(sim.world().is_empty());
    assert!(sim.match_state(MATCH).is_none());
}

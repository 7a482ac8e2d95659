//! Compression chain integration tests
//!
//! End-to-end runs on small lattices: connectivity of neighboring particles
//! is never broken, every activation leaves the particle contracted, and bad
//! initial configurations fail before anything moves.

use amoebot_sim::compression::{activate, metropolis_accepts, Algorithm, CompressionVariant, MoveOutcome};
use amoebot_sim::core::error::{PlacementError, SimError};
use amoebot_sim::core::types::ParticleId;
use amoebot_sim::graph::{NodeGraph, NodeStore, Occupancy};
use amoebot_sim::lattice::{Coord, TriangularLattice};
use amoebot_sim::particle::{Particle, ParticleParams};
use amoebot_sim::placement::{ParticlePlacement, Placement};
use amoebot_sim::runner::{count_particle_edges, prepare};
use amoebot_sim::scheduler::{audit, run_sequential, SchedulerSettings};
use amoebot_sim::tracker::MemoryTracker;
use amoebot_sim::RunConfig;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn pair_on_small_lattice(seed: u64) -> (NodeGraph, Vec<Particle>) {
    let mut graph = NodeGraph::from_lattice(&TriangularLattice::new(4, 4).unwrap());
    let placement = Placement {
        particles: vec![
            ParticlePlacement::contracted(Coord::new(0, 0)),
            ParticlePlacement::contracted(Coord::new(2, 0)),
        ],
        walls: Vec::new(),
    };
    let particles = placement.apply(&mut graph, ParticleParams::default(), seed).unwrap();
    (graph, particles)
}

// ========================================
// Two adjacent particles stay adjacent
// ========================================

#[test]
fn test_pair_stays_connected_for_fifty_rounds() {
    for variant in [CompressionVariant::Sequential, CompressionVariant::Asynchronous] {
        let (mut graph, mut particles) = pair_on_small_lattice(2024);
        let settings = SchedulerSettings {
            rounds: 1,
            variant,
            ..Default::default()
        };
        let mut tracker = MemoryTracker::new();

        for round in 0..50 {
            run_sequential(&mut graph, &mut particles, &settings, &mut tracker).unwrap();

            let (a, b) = (&particles[0], &particles[1]);
            assert!(a.is_contracted() && b.is_contracted(), "round {}", round);
            assert!(
                a.head().is_adjacent(&b.head()),
                "round {}: {} and {} drifted apart",
                round,
                a.head(),
                b.head()
            );
            audit(&graph, &particles).unwrap();
        }
        assert_eq!(tracker.records().len(), 100);
    }
}

#[test]
fn test_pair_actually_moves_in_sequential_variant() {
    let (mut graph, mut particles) = pair_on_small_lattice(5);
    let settings = SchedulerSettings {
        rounds: 50,
        variant: CompressionVariant::Sequential,
        ..Default::default()
    };
    let mut tracker = MemoryTracker::new();
    let counters = run_sequential(&mut graph, &mut particles, &settings, &mut tracker).unwrap();

    assert!(counters.accepted > 0, "no move accepted in 100 turns");
    assert_eq!(counters.accepted + counters.rejected + counters.blocked, counters.activations);
}

// ========================================
// Larger blob: connectivity and compaction
// ========================================

fn line_config(n: i32) -> (NodeGraph, Vec<Particle>) {
    let mut graph = NodeGraph::from_lattice(&TriangularLattice::new(12, 12).unwrap());
    let placement = Placement {
        particles: (0..n).map(|i| ParticlePlacement::contracted(Coord::new(2 * i, 10))).collect(),
        walls: Vec::new(),
    };
    let particles = placement.apply(&mut graph, ParticleParams { mu: 1.0, tau0: 0.25 }, 77).unwrap();
    (graph, particles)
}

fn is_connected(particles: &[Particle]) -> bool {
    let coords = particles.iter().map(|p| p.head()).collect();
    amoebot_sim::connectivity::is_connected(&coords)
}

#[test]
fn test_line_never_disconnects() {
    let (mut graph, mut particles) = line_config(8);
    let settings = SchedulerSettings {
        rounds: 1,
        variant: CompressionVariant::Sequential,
        ..Default::default()
    };
    let mut tracker = MemoryTracker::new();

    for _ in 0..300 {
        run_sequential(&mut graph, &mut particles, &settings, &mut tracker).unwrap();
        assert!(is_connected(&particles));
    }
    audit(&graph, &particles).unwrap();
}

#[test]
fn test_strong_bias_does_not_lose_edges_overall() {
    let (mut graph, mut particles) = line_config(8);
    let initial = count_particle_edges(&particles);
    assert_eq!(initial, 7);

    let settings = SchedulerSettings {
        rounds: 2000,
        variant: CompressionVariant::Sequential,
        ..Default::default()
    };
    run_sequential(&mut graph, &mut particles, &settings, &mut MemoryTracker::new()).unwrap();
    assert!(count_particle_edges(&particles) >= initial);
}

// ========================================
// Walls
// ========================================

#[test]
fn test_particles_never_enter_walls() {
    let mut graph = NodeGraph::from_lattice(&TriangularLattice::new(6, 6).unwrap());
    let walls: Vec<Coord> = [(3, 1), (5, 1), (6, 0)].into_iter().map(Coord::from).collect();
    let placement = Placement {
        particles: vec![
            ParticlePlacement::contracted(Coord::new(2, 0)),
            ParticlePlacement::contracted(Coord::new(4, 0)),
        ],
        walls: walls.clone(),
    };
    let mut particles = placement.apply(&mut graph, ParticleParams::default(), 8).unwrap();

    let settings = SchedulerSettings {
        rounds: 200,
        algorithm: Algorithm::RandomMove,
        ..Default::default()
    };
    run_sequential(&mut graph, &mut particles, &settings, &mut MemoryTracker::new()).unwrap();

    for wall in walls {
        let handle = graph.handle_of(wall).unwrap();
        assert_eq!(graph.occupancy(handle), Occupancy::Wall);
        assert_eq!(graph.occupant(handle), None);
    }
    audit(&graph, &particles).unwrap();
}

#[test]
fn test_head_on_wall_is_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("placement.json");
    std::fs::write(
        &path,
        r#"{ "particles": [{ "head": [2, 0], "tail": [0, 0] }], "walls": [[2, 0]] }"#,
    )
    .unwrap();

    let config = RunConfig {
        width: 4,
        height: 4,
        placement: Some(path),
        ..Default::default()
    };
    let err = prepare(&config).err().unwrap();
    assert!(err.is_configuration());
    assert!(matches!(err, SimError::Placement(PlacementError::Wall(c)) if c == Coord::new(2, 0)));
}

#[test]
fn test_config_wall_under_placed_particle_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("placement.json");
    Placement {
        particles: vec![ParticlePlacement::contracted(Coord::new(1, 1))],
        walls: Vec::new(),
    }
    .save(&path)
    .unwrap();

    let config = RunConfig {
        width: 4,
        height: 4,
        placement: Some(path),
        walls: vec![Coord::new(1, 1)],
        ..Default::default()
    };
    assert!(prepare(&config).err().unwrap().is_configuration());
}

#[test]
fn test_off_lattice_placement_is_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("placement.json");
    std::fs::write(&path, r#"{ "particles": [{ "head": [0, 0] }, { "head": [1, 0] }] }"#).unwrap();

    let config = RunConfig {
        width: 4,
        height: 4,
        placement: Some(path),
        ..Default::default()
    };
    let err = prepare(&config).err().unwrap();
    assert!(err.is_configuration());
    assert!(matches!(err, SimError::InvalidPlacement(_)));
}

#[test]
fn test_off_lattice_config_wall_is_configuration_error() {
    let config = RunConfig {
        width: 4,
        height: 4,
        particles: 3,
        walls: vec![Coord::new(3, 0)],
        ..Default::default()
    };
    assert!(matches!(prepare(&config), Err(SimError::InvalidPlacement(_))));
}

// ========================================
// Movement primitives
// ========================================

#[test]
fn test_expand_then_contract_back_restores_position() {
    let mut graph = NodeGraph::from_lattice(&TriangularLattice::new(5, 5).unwrap());
    let mut particle =
        Particle::new(ParticleId::new(0), Coord::new(4, 2), Coord::new(4, 2), ParticleParams::default(), 1).unwrap();
    particle.place_on(&mut graph).unwrap();

    for port in amoebot_sim::lattice::Port::ALL {
        assert!(particle.expand(&mut graph, port).unwrap());
        assert_eq!(particle.head().distance(&particle.tail()), 1);
        particle.contract(&mut graph, amoebot_sim::particle::ContractToward::Tail).unwrap();
        assert_eq!((particle.head(), particle.tail()), (Coord::new(4, 2), Coord::new(4, 2)));
    }
}

#[test]
fn test_every_activation_ends_contracted() {
    let (mut graph, mut particles) = line_config(6);
    for _ in 0..200 {
        for particle in particles.iter_mut() {
            let report = activate(particle, &mut graph, Algorithm::Compress, CompressionVariant::Asynchronous).unwrap();
            assert_ne!(report.outcome, MoveOutcome::Idle);
            assert!(particle.is_contracted());
        }
    }
}

// ========================================
// Metropolis filter
// ========================================

fn acceptance_rate(e_head: usize, e_tail: usize, tau0: f64, rng: &mut ChaCha8Rng) -> f64 {
    const SAMPLES: usize = 20_000;
    let hits = (0..SAMPLES)
        .filter(|_| metropolis_accepts(rng.gen::<f64>(), e_head, e_tail, tau0))
        .count();
    hits as f64 / SAMPLES as f64
}

#[test]
fn test_acceptance_rate_monotone_in_neighbor_gain() {
    let mut rng = ChaCha8Rng::seed_from_u64(31);
    let e_tail = 3;
    let rates: Vec<f64> = (0..=5).map(|e_head| acceptance_rate(e_head, e_tail, 1.0, &mut rng)).collect();

    for pair in rates.windows(2) {
        // Sampling noise at 20k draws stays well under 0.02
        assert!(pair[1] + 0.02 >= pair[0], "rates not monotone: {:?}", rates);
    }
    assert!(rates[0] < 0.1);
    assert_eq!(rates[5], 1.0);
}

#[test]
fn test_acceptance_rate_matches_exponential() {
    let mut rng = ChaCha8Rng::seed_from_u64(32);
    let rate = acceptance_rate(1, 2, 1.0, &mut rng);
    assert!((rate - (-1.0f64).exp()).abs() < 0.02, "rate {}", rate);
}

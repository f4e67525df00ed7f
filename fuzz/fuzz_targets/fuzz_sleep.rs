#![no_main]
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use soma_physics::{
    Bodies, BodyActivity, BodyDescription, DistanceTypeProcessor, IslandSleeper,
    SequentialDispatcher, Solver,
};

#[derive(Debug, Arbitrary)]
struct SleepInput {
    body_count: u8,
    /// Candidate flag per body, one bit each
    candidate_bits: u16,
    /// Constraint endpoints, reduced modulo the body count
    edges: Vec<(u8, u8)>,
    workers: u8,
    deterministic: bool,
}

// Fuzz the sleeper with arbitrary small worlds. Must never panic, and the
// accepted islands must stay disjoint and candidate-closed.
fuzz_target!(|input: SleepInput| {
    let body_count = (input.body_count as usize % 16) + 1;
    let mut bodies = Bodies::new();
    let mut solver = Solver::new();
    let mut candidate = vec![false; body_count];
    for i in 0..body_count {
        candidate[i] = input.candidate_bits & (1 << i) != 0;
        let mut description = BodyDescription {
            activity: BodyActivity::candidate(),
            ..Default::default()
        };
        description.activity.sleep_candidate = candidate[i];
        bodies.add_body(&description);
    }
    for &(a, b) in input.edges.iter().take(48) {
        let a = a as usize % body_count;
        let b = b as usize % body_count;
        if a != b {
            solver.add_constraint(
                &mut bodies,
                DistanceTypeProcessor::TYPE_ID,
                &[a, b],
                &[1.0, 0.0],
            );
        }
    }

    let mut sleeper = IslandSleeper::new();
    sleeper.tested_fraction_per_frame = 1.0;
    sleeper.target_slept_fraction = 1.0;
    sleeper.target_traversed_fraction = 1.0;
    let workers = (input.workers as usize % 4) + 1;
    let dispatcher = SequentialDispatcher::new(workers);
    let slept = sleeper.update(&mut bodies, &mut solver, &dispatcher, input.deterministic);

    let mut seen = vec![false; body_count];
    for island in &slept {
        for &body in &island.body_indices {
            assert!(candidate[body], "non-candidate body slept");
            assert!(!seen[body], "body slept twice");
            seen[body] = true;
        }
    }
});

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use lookahead_life::cell::{CellSet, cell_set_from};
use lookahead_life::rules::next_generation;
use lookahead_life::{
    Cell, PatternData, PlaybackListener, Shutdown, SimState, Simulation, SimulationConfig,
    Snapshot,
};
use rand::SeedableRng;
use rand::rngs::StdRng;

#[derive(Default)]
struct Recorded {
    displayed: Vec<u64>,
    pulses: u32,
    gps: Vec<u64>,
    states: Vec<SimState>,
}

struct Recorder(Arc<Mutex<Recorded>>);

impl PlaybackListener for Recorder {
    fn on_generation_displayed(&mut self, generation: u64) {
        self.0.lock().unwrap().displayed.push(generation);
    }
    fn on_haptic_pulse(&mut self) {
        self.0.lock().unwrap().pulses += 1;
    }
    fn on_generations_per_second(&mut self, gps: u64) {
        self.0.lock().unwrap().gps.push(gps);
    }
    fn on_state_changed(&mut self, state: SimState) {
        self.0.lock().unwrap().states.push(state);
    }
}

fn recording(sim: &mut Simulation) -> Arc<Mutex<Recorded>> {
    let recorded = Arc::new(Mutex::new(Recorded::default()));
    sim.set_listener(Box::new(Recorder(Arc::clone(&recorded))));
    recorded
}

fn fast_config() -> SimulationConfig {
    SimulationConfig::default()
        .idle_sleep(Duration::from_millis(1))
        .backoff_sleep(Duration::from_millis(1))
}

fn glider() -> CellSet {
    cell_set_from([(1, 0), (2, -1), (0, -2), (1, -2), (2, -2)])
}

fn blinker() -> CellSet {
    cell_set_from([(0, 0), (1, 0), (2, 0)])
}

fn wait_for_lookahead(sim: &Simulation, at_least: u64) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while sim.ring().lookahead() < at_least && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(1));
    }
    assert!(
        sim.ring().lookahead() >= at_least,
        "worker did not reach lookahead {at_least}"
    );
}

/// Reference generations, extended on demand.
struct Expected(Vec<CellSet>);

impl Expected {
    fn new(seed: CellSet) -> Self {
        Self(vec![seed])
    }

    fn get(&mut self, generation: u64) -> &CellSet {
        while self.0.len() as u64 <= generation {
            let next = next_generation(self.0.last().unwrap(), true);
            self.0.push(next);
        }
        &self.0[generation as usize]
    }
}

fn stress(rule_threads: usize) {
    let config = fast_config().gen_per_sec(1000).rule_threads(rule_threads);
    let mut sim = Simulation::new(config);
    let recorded = recording(&mut sim);
    sim.load_cells(glider());
    let mut expected = Expected::new(glider());

    let t0 = Instant::now();
    assert!(sim.run(t0).expect("spawn worker"));
    let mut last = 0;
    let mut starved = 0;
    for frame in 1..=300u64 {
        if frame % 3 == 0 {
            std::thread::sleep(Duration::from_millis(1));
        }
        let report = sim.tick(t0 + Duration::from_millis(frame * 5));
        assert!(report.last_generation >= last);
        assert_eq!(report.last_generation - last, u64::from(report.shown));
        starved += u32::from(report.starved);
        last = report.last_generation;
        assert_eq!(
            &sim.living_cells(),
            expected.get(last),
            "displayed generation {last} differs from reference"
        );
        assert!(sim.ring().lookahead() <= sim.ring().max_ahead());
    }
    assert_eq!(sim.pause(), Shutdown::Joined);

    let recorded = recorded.lock().unwrap();
    assert!(last > 0, "nothing displayed ({starved} starved ticks)");
    assert_eq!(recorded.displayed, (1..=last).collect::<Vec<_>>());
    assert_eq!(recorded.pulses, 0);
}

#[test]
fn concurrent_playback_matches_reference_sequence() {
    stress(1);
}

#[test]
fn concurrent_playback_with_rule_pool_matches_reference_sequence() {
    stress(2);
}

#[test]
fn worker_exits_within_join_timeout() {
    let mut sim = Simulation::new(fast_config().join_timeout(Duration::from_secs(1)));
    sim.load_cells(glider());
    assert!(sim.run(Instant::now()).expect("spawn worker"));
    wait_for_lookahead(&sim, 5);

    let start = Instant::now();
    assert_eq!(sim.pause(), Shutdown::Joined);
    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(sim.last_shutdown(), Shutdown::Joined);
    assert!(!sim.is_running());

    // Buffered generations stop growing once paused.
    let calculated = sim.ring().calculated_generation();
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(sim.ring().calculated_generation(), calculated);
}

#[test]
fn state_machine_transitions() {
    let mut sim = Simulation::new(fast_config());
    let recorded = recording(&mut sim);
    let now = Instant::now();

    assert_eq!(sim.state(), SimState::Idle);
    assert_eq!(sim.toggle(now).expect("toggle"), SimState::Idle);

    sim.load_cells(blinker());
    assert_eq!(sim.toggle(now).expect("toggle"), SimState::Running);
    assert!(sim.run(now).expect("already running"));
    assert_eq!(sim.toggle(now).expect("toggle"), SimState::Idle);

    assert!(sim.run(now).expect("spawn worker"));
    sim.reset();
    assert_eq!(sim.state(), SimState::Idle);
    assert!(sim.is_empty());
    assert_eq!(sim.population(), 0);
    assert!(!sim.run(now).expect("empty grid"));

    assert_eq!(
        recorded.lock().unwrap().states,
        vec![
            SimState::Running,
            SimState::Idle,
            SimState::Running,
            SimState::Idle
        ]
    );
}

#[test]
fn slow_rate_pulses_once_per_generation() {
    let mut sim = Simulation::new(fast_config().gen_per_sec(1));
    let recorded = recording(&mut sim);
    sim.load_cells(blinker());

    let t0 = Instant::now();
    assert!(sim.run(t0).expect("spawn worker"));
    wait_for_lookahead(&sim, 3);
    assert_eq!(sim.tick(t0 + Duration::from_millis(500)).shown, 0);
    assert_eq!(sim.tick(t0 + Duration::from_millis(3_000)).shown, 3);
    sim.pause();
    assert_eq!(recorded.lock().unwrap().pulses, 3);

    sim.set_vibrate_every_gen(false);
    let t1 = Instant::now();
    assert!(sim.run(t1).expect("spawn worker"));
    wait_for_lookahead(&sim, 2);
    assert_eq!(sim.tick(t1 + Duration::from_secs(2)).pulses, 0);
}

#[test]
fn speed_change_reanchors_next_display() {
    let mut sim = Simulation::new(fast_config().gen_per_sec(1));
    sim.load_cells(blinker());

    let t0 = Instant::now();
    assert!(sim.run(t0).expect("spawn worker"));
    wait_for_lookahead(&sim, 5);

    let later = t0 + Duration::from_secs(30);
    sim.set_speed(4, later);
    assert_eq!(sim.gen_per_sec(), 4);
    // No backlog from the 30 s gap at the old rate.
    assert_eq!(sim.tick(later + Duration::from_millis(200)).shown, 0);
    assert_eq!(sim.tick(later + Duration::from_millis(260)).shown, 1);
    assert_eq!(sim.tick(later + Duration::from_millis(760)).shown, 2);
    assert_eq!(sim.displayed_generation(), 3);
}

#[test]
fn throughput_is_sampled_per_interval() {
    let config = fast_config().stats_interval(Duration::from_millis(100));
    let mut sim = Simulation::new(config);
    let recorded = recording(&mut sim);
    sim.load_cells(glider());

    let t0 = Instant::now();
    assert!(sim.run(t0).expect("spawn worker"));
    sim.tick(t0);
    wait_for_lookahead(&sim, 20);
    sim.tick(t0 + Duration::from_millis(50));
    assert!(recorded.lock().unwrap().gps.is_empty());

    sim.tick(t0 + Duration::from_millis(200));
    assert!(sim.generations_per_second() > 0);
    assert_eq!(recorded.lock().unwrap().gps, vec![sim.generations_per_second()]);
    assert!(sim.total_calculated() >= 20);
}

#[test]
fn births_can_be_disabled() {
    let mut sim = Simulation::new(fast_config().gen_per_sec(10));
    sim.load_cells(blinker());
    assert!(sim.allow_birth());
    sim.set_allow_birth(false);

    let t0 = Instant::now();
    assert!(sim.run(t0).expect("spawn worker"));
    wait_for_lookahead(&sim, 2);
    assert_eq!(sim.tick(t0 + Duration::from_millis(100)).shown, 1);
    assert_eq!(sim.living_cells(), cell_set_from([(1, 0)]));
    assert_eq!(sim.tick(t0 + Duration::from_millis(200)).shown, 1);
    assert!(sim.is_empty());
    sim.pause();
    sim.set_allow_birth(true);
    assert!(sim.allow_birth());
}

#[test]
fn skip_to_latest_jumps_and_playback_continues() {
    let mut sim = Simulation::new(fast_config().gen_per_sec(10));
    let recorded = recording(&mut sim);
    sim.load_cells(glider());
    let mut expected = Expected::new(glider());

    let t0 = Instant::now();
    assert!(sim.run(t0).expect("spawn worker"));
    wait_for_lookahead(&sim, 10);

    assert!(sim.skip_to_latest(t0));
    let jumped = sim.displayed_generation();
    assert!(jumped >= 10);
    assert_eq!(sim.ring().displayed_generation(), jumped);
    assert_eq!(&sim.living_cells(), expected.get(jumped));

    wait_for_lookahead(&sim, 1);
    let report = sim.tick(t0 + Duration::from_millis(100));
    assert_eq!(report.shown, 1);
    assert_eq!(report.last_generation, jumped + 1);
    assert_eq!(&sim.living_cells(), expected.get(jumped + 1));
    sim.pause();

    let displayed = recorded.lock().unwrap().displayed.clone();
    assert_eq!(displayed.last(), Some(&(jumped + 1)));
}

#[test]
fn skip_to_latest_is_ignored_while_idle() {
    let mut sim = Simulation::new(fast_config().gen_per_sec(10));
    sim.load_cells(blinker());

    let t0 = Instant::now();
    assert!(sim.run(t0).expect("spawn worker"));
    wait_for_lookahead(&sim, 4);
    sim.pause();

    let edited = Cell::new(50, 50);
    assert!(sim.set_alive(edited, true));
    assert!(!sim.skip_to_latest(t0));
    assert!(sim.is_alive(edited));
    assert_eq!(sim.displayed_generation(), 0);
    assert_eq!(sim.ring().lookahead(), 0);
}

#[test]
fn ring_view_follows_the_running_buffer() {
    let mut sim = Simulation::new(fast_config().gen_per_sec(10));
    sim.load_cells(glider());
    let view = sim.ring();
    assert_eq!(view.latest_ready_generation(), None);
    assert_eq!(view.buffered(0), Some(glider()));
    assert_eq!(view.buffered(1), None);

    let t0 = Instant::now();
    assert!(sim.run(t0).expect("spawn worker"));
    wait_for_lookahead(&sim, 3);
    assert!(!sim.set_alive(Cell::new(9, 9), true));

    let view = sim.ring();
    let status = view.status();
    assert_eq!(status.displayed_generation, 0);
    assert!(status.calculated_generation >= 3);
    assert!(view.latest_ready_generation() >= Some(3));
    assert!(view.lookahead() <= view.max_ahead());
    assert!((view.max_ahead() as usize) < view.capacity());
    assert_eq!(
        view.buffered(1).as_ref(),
        Some(&next_generation(&glider(), true))
    );
    sim.pause();
    assert!(!sim.is_alive(Cell::new(9, 9)));
}

#[test]
fn worker_stop_timeout_is_not_fatal() {
    let config = SimulationConfig::default()
        .gen_per_sec(10)
        .idle_sleep(Duration::from_millis(50))
        .backoff_sleep(Duration::from_millis(50))
        .join_timeout(Duration::ZERO);
    let mut sim = Simulation::new(config);
    let mut rng = StdRng::seed_from_u64(7);
    assert!(sim.randomize(200, 200, 0.35, &mut rng));

    let t0 = Instant::now();
    assert!(sim.run(t0).expect("spawn worker"));
    wait_for_lookahead(&sim, 1);
    sim.tick(t0 + Duration::from_millis(100));
    assert_eq!(sim.pause(), Shutdown::TimedOut);
    assert_eq!(sim.last_shutdown(), Shutdown::TimedOut);
    assert!(!sim.is_running());

    // The detached worker must not leak stale generations into the next run.
    let mut expected = Expected::new(sim.living_cells());
    let t1 = Instant::now();
    assert!(sim.run(t1).expect("spawn second worker"));
    for step in 1..=3u64 {
        wait_for_lookahead(&sim, 1);
        let report = sim.tick(t1 + Duration::from_millis(step * 100));
        assert_eq!(report.shown, 1);
        assert_eq!(report.last_generation, step);
        assert_eq!(
            &sim.living_cells(),
            expected.get(step),
            "generation {step} after restart differs from reference"
        );
    }
    sim.pause();
}

#[test]
fn save_and_load_only_while_idle() {
    let mut sim = Simulation::new(fast_config().gen_per_sec(10));
    assert!(!sim.load());
    sim.load_cells(blinker());
    assert!(sim.save());

    let t0 = Instant::now();
    assert!(sim.run(t0).expect("spawn worker"));
    assert!(!sim.save());
    assert!(!sim.load());
    wait_for_lookahead(&sim, 1);
    sim.tick(t0 + Duration::from_millis(100));
    sim.pause();
    assert_ne!(sim.living_cells(), blinker());

    assert!(sim.load());
    assert_eq!(sim.living_cells(), blinker());
    assert_eq!(sim.ring().displayed_generation(), 0);
}

#[test]
fn snapshot_restores_grid() {
    let mut sim = Simulation::new(fast_config());
    sim.load_cells(glider());
    let snapshot = sim.snapshot();
    assert_eq!(snapshot.len(), 5);

    let json = snapshot.to_json().expect("serialize");
    let parsed = Snapshot::from_json(&json).expect("parse");
    sim.load_cells(blinker());
    assert!(sim.restore(&parsed));
    assert_eq!(sim.living_cells(), glider());

    assert!(sim.run(Instant::now()).expect("spawn worker"));
    assert!(!sim.restore(&Snapshot::default()));
    sim.pause();
}

#[test]
fn loading_a_pattern_pauses_and_replaces_grid() {
    let rle = "#N Glider\n#O Richard K. Guy\nx = 3, y = 3, rule = B3/S23\nbob$2bo$3o!\n";
    let pattern = PatternData::from_rle_file(rle, "glider.rle").expect("parse rle");

    let mut sim = Simulation::new(fast_config());
    sim.load_cells(blinker());
    assert!(sim.run(Instant::now()).expect("spawn worker"));

    assert_eq!(sim.load_pattern(&pattern).expect("decode"), 5);
    assert_eq!(sim.state(), SimState::Idle);
    assert_eq!(
        sim.living_cells(),
        cell_set_from([(1, 2), (2, 1), (0, 0), (1, 0), (2, 0)])
    );
    assert_eq!(sim.ring().calculated_generation(), 0);
}

#[test]
fn edits_are_visible_and_flag_changes() {
    let sim = Simulation::new(fast_config());
    assert!(sim.set_alive(Cell::new(3, 4), true));
    assert!(sim.is_alive(Cell::new(3, 4)));
    assert!(sim.has_state_changed());
    sim.reset_state_change();
    assert!(!sim.has_state_changed());
    assert!(sim.set_alive(Cell::new(3, 4), false));
    assert!(sim.is_empty());
}

#[test]
fn dropping_a_running_simulation_stops_the_worker() {
    let mut sim = Simulation::new(fast_config());
    sim.load_cells(glider());
    assert!(sim.run(Instant::now()).expect("spawn worker"));
    wait_for_lookahead(&sim, 1);
    let start = Instant::now();
    drop(sim);
    assert!(start.elapsed() < Duration::from_secs(2));
}

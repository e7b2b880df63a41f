#[cfg(feature = "mimalloc-global")]
#[global_allocator]
static GLOBAL_ALLOCATOR: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::env;
use std::time::{Duration, Instant};

use lookahead_life::{Simulation, SimulationConfig};
use rand::SeedableRng;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct BenchReport {
    side: i32,
    density: f64,
    gen_per_sec: u32,
    fps: u32,
    threads: usize,
    seeded: usize,
    elapsed_s: f64,
    frames: u64,
    starved_frames: u64,
    displayed: u64,
    calculated: u64,
    display_rate: f64,
    calc_rate: f64,
    max_lookahead: u64,
    shutdown: String,
}

#[derive(Clone, Debug)]
struct BenchConfig {
    side: i32,
    density: f64,
    gen_per_sec: u32,
    fps: u32,
    millis: u64,
    seed: u64,
    threads: usize,
    json: bool,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            side: 128,
            density: 0.35,
            gen_per_sec: 240,
            fps: 120,
            millis: 3_000,
            seed: 0x5EED_1234_ABCD_EF01,
            threads: 1,
            json: false,
        }
    }
}

fn parse_args() -> BenchConfig {
    let mut cfg = BenchConfig::default();
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--side" => {
                if let Some(v) = args.next() {
                    cfg.side = v.parse().expect("--side expects i32");
                }
            }
            "--density" => {
                if let Some(v) = args.next() {
                    cfg.density = v.parse().expect("--density expects f64");
                }
            }
            "--gen-per-sec" => {
                if let Some(v) = args.next() {
                    cfg.gen_per_sec = v.parse().expect("--gen-per-sec expects u32");
                }
            }
            "--fps" => {
                if let Some(v) = args.next() {
                    cfg.fps = v.parse().expect("--fps expects u32");
                }
            }
            "--millis" => {
                if let Some(v) = args.next() {
                    cfg.millis = v.parse().expect("--millis expects u64");
                }
            }
            "--threads" => {
                if let Some(v) = args.next() {
                    cfg.threads = v.parse().expect("--threads expects usize");
                }
            }
            "--seed" => {
                if let Some(v) = args.next() {
                    cfg.seed = v.parse().expect("--seed expects u64");
                }
            }
            "--json" => {
                cfg.json = true;
            }
            other => panic!("unknown arg: {other}"),
        }
    }
    cfg
}

fn main() {
    env_logger::init();
    let cfg = parse_args();

    let config = SimulationConfig::default()
        .gen_per_sec(cfg.gen_per_sec)
        .rule_threads(cfg.threads)
        .vibrate_every_gen(false)
        .idle_sleep(Duration::from_millis(1))
        .backoff_sleep(Duration::from_millis(1));
    let mut sim = Simulation::new(config);
    let mut rng = rand::rngs::StdRng::seed_from_u64(cfg.seed);
    sim.randomize(cfg.side, cfg.side, cfg.density, &mut rng);
    let seeded = sim.population();

    let frame = Duration::from_secs(1) / cfg.fps.max(1);
    let start = Instant::now();
    let end = start + Duration::from_millis(cfg.millis);
    if !sim.run(start).expect("failed to spawn calculation worker") {
        panic!("seeded grid is empty");
    }

    let mut frames = 0u64;
    let mut starved = 0u64;
    let mut max_lookahead = 0u64;
    while Instant::now() < end {
        std::thread::sleep(frame);
        let report = sim.tick(Instant::now());
        frames += 1;
        starved += u64::from(report.starved);
        max_lookahead = max_lookahead.max(sim.ring().lookahead());
    }

    let elapsed = start.elapsed().as_secs_f64();
    let shutdown = sim.pause();
    let displayed = sim.displayed_generation();
    let calculated = sim.total_calculated();
    let report = BenchReport {
        side: cfg.side,
        density: cfg.density,
        gen_per_sec: cfg.gen_per_sec,
        fps: cfg.fps,
        threads: cfg.threads,
        seeded,
        elapsed_s: elapsed,
        frames,
        starved_frames: starved,
        displayed,
        calculated,
        display_rate: displayed as f64 / elapsed,
        calc_rate: calculated as f64 / elapsed,
        max_lookahead,
        shutdown: format!("{shutdown:?}"),
    };

    if cfg.json {
        println!(
            "{}",
            serde_json::to_string(&report).expect("bench report serializes")
        );
    } else {
        println!(
            "side={},density={},gen_per_sec={},fps={},threads={},seeded={},elapsed_s={:.3},frames={},starved_frames={},displayed={},calculated={},display_rate={:.1},calc_rate={:.1},max_lookahead={},shutdown={}",
            report.side,
            report.density,
            report.gen_per_sec,
            report.fps,
            report.threads,
            report.seeded,
            report.elapsed_s,
            report.frames,
            report.starved_frames,
            report.displayed,
            report.calculated,
            report.display_rate,
            report.calc_rate,
            report.max_lookahead,
            report.shutdown,
        );
    }
}

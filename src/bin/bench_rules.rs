#[cfg(feature = "mimalloc-global")]
#[global_allocator]
static GLOBAL_ALLOCATOR: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::env;
use std::time::Instant;

use lookahead_life::{GridState, RuleEngine};
use rand::SeedableRng;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct BenchReport {
    side: i32,
    density: f64,
    warmup: u64,
    iters: u64,
    seed: u64,
    threads: usize,
    seeded: usize,
    total_ms: f64,
    avg_ms: f64,
    gens_per_sec: f64,
    population: usize,
}

#[derive(Clone, Debug)]
struct BenchConfig {
    side: i32,
    density: f64,
    warmup: u64,
    iters: u64,
    seed: u64,
    threads: usize,
    no_birth: bool,
    json: bool,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            side: 256,
            density: 0.35,
            warmup: 3,
            iters: 100,
            seed: 0x5EED_1234_ABCD_EF01,
            threads: 1,
            no_birth: false,
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
            "--warmup" => {
                if let Some(v) = args.next() {
                    cfg.warmup = v.parse().expect("--warmup expects u64");
                }
            }
            "--iters" => {
                if let Some(v) = args.next() {
                    cfg.iters = v.parse().expect("--iters expects u64");
                }
            }
            "--threads" => {
                if let Some(v) = args.next() {
                    cfg.threads = v.parse().expect("--threads expects usize");
                }
            }
            "--seed" => {
                if let Some(v) = args.next() {
                    cfg.seed = if let Some(hex) = v.strip_prefix("0x") {
                        u64::from_str_radix(hex, 16).expect("--seed hex parse failed")
                    } else {
                        v.parse().expect("--seed expects u64")
                    };
                }
            }
            "--no-birth" => {
                cfg.no_birth = true;
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

    let mut grid = GridState::new();
    let mut rng = rand::rngs::StdRng::seed_from_u64(cfg.seed);
    grid.randomize(cfg.side, cfg.side, cfg.density, &mut rng);
    let engine = RuleEngine::with_threads(cfg.threads);
    let allow_birth = !cfg.no_birth;

    let mut cells = grid.living_cells();
    let seeded = cells.len();
    for _ in 0..cfg.warmup {
        cells = engine.next(&cells, allow_birth);
    }

    let start = Instant::now();
    for _ in 0..cfg.iters {
        cells = engine.next(&cells, allow_birth);
    }
    let elapsed = start.elapsed();
    let total_ms = elapsed.as_secs_f64() * 1000.0;
    let report = BenchReport {
        side: cfg.side,
        density: cfg.density,
        warmup: cfg.warmup,
        iters: cfg.iters,
        seed: cfg.seed,
        threads: engine.threads(),
        seeded,
        total_ms,
        avg_ms: total_ms / cfg.iters.max(1) as f64,
        gens_per_sec: cfg.iters as f64 / elapsed.as_secs_f64().max(f64::EPSILON),
        population: cells.len(),
    };

    if cfg.json {
        println!(
            "{}",
            serde_json::to_string(&report).expect("bench report serializes")
        );
    } else {
        println!(
            "side={},density={},warmup={},iters={},seed={},threads={},seeded={},total_ms={:.6},avg_ms={:.6},gens_per_sec={:.1},population={}",
            report.side,
            report.density,
            report.warmup,
            report.iters,
            report.seed,
            report.threads,
            report.seeded,
            report.total_ms,
            report.avg_ms,
            report.gens_per_sec,
            report.population,
        );
    }
}

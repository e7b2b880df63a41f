#[cfg(feature = "mimalloc-global")]
#[global_allocator]
static GLOBAL_ALLOCATOR: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::error::Error;
use std::path::Path;
use std::process::ExitCode;
use std::str::FromStr;
use std::time::{Duration, Instant};

use lookahead_life::{PatternData, PlaybackListener, SimState, Simulation, SimulationConfig};
use rand::SeedableRng;

const DEFAULT_SIDE: i32 = 64;
const DEFAULT_DENSITY: f64 = 0.35;
const DEFAULT_SEED: u64 = 0x5EED_1234_ABCD_EF01;
const DEFAULT_SECONDS: u64 = 10;
const DEFAULT_FPS: u32 = 60;
const USAGE: &str = "usage: lookahead-life [--gen-per-sec N] [--seconds N] [--fps N] [--side N] \
[--density F] [--seed N] [--rle FILE] [--no-birth] [--rule-threads N]";

struct MainArgs {
    config: SimulationConfig,
    seconds: u64,
    fps: u32,
    side: i32,
    density: f64,
    seed: u64,
    rle: Option<String>,
    allow_birth: bool,
}

fn parse_args() -> Result<MainArgs, String> {
    fn number<T: FromStr>(raw: &str, flag: &str) -> Result<T, String> {
        raw.parse()
            .map_err(|_| format!("{flag}: invalid value {raw:?}"))
    }

    let args: Vec<String> = std::env::args().collect();
    let mut parsed = MainArgs {
        config: SimulationConfig::from_env(),
        seconds: DEFAULT_SECONDS,
        fps: DEFAULT_FPS,
        side: DEFAULT_SIDE,
        density: DEFAULT_DENSITY,
        seed: DEFAULT_SEED,
        rle: None,
        allow_birth: true,
    };
    let value = |i: usize, flag: &str| -> Result<&str, String> {
        args.get(i)
            .map(String::as_str)
            .ok_or_else(|| format!("{flag} requires a value"))
    };

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--gen-per-sec" => {
                i += 1;
                parsed.config = parsed.config.gen_per_sec(number(value(i, flag)?, flag)?);
            }
            "--rule-threads" => {
                i += 1;
                parsed.config = parsed.config.rule_threads(number(value(i, flag)?, flag)?);
            }
            "--seconds" => {
                i += 1;
                parsed.seconds = number(value(i, flag)?, flag)?;
            }
            "--fps" => {
                i += 1;
                parsed.fps = number::<u32>(value(i, flag)?, flag)?.max(1);
            }
            "--side" => {
                i += 1;
                parsed.side = number(value(i, flag)?, flag)?;
            }
            "--density" => {
                i += 1;
                parsed.density = number(value(i, flag)?, flag)?;
            }
            "--seed" => {
                i += 1;
                let raw = value(i, flag)?;
                parsed.seed = match raw.strip_prefix("0x") {
                    Some(hex) => u64::from_str_radix(hex, 16)
                        .map_err(|_| format!("{flag}: invalid hex value {raw:?}"))?,
                    None => number(raw, flag)?,
                };
            }
            "--rle" => {
                i += 1;
                parsed.rle = Some(value(i, flag)?.to_string());
            }
            "--no-birth" => {
                parsed.allow_birth = false;
            }
            "-h" | "--help" => return Err(USAGE.to_string()),
            other => return Err(format!("unknown argument: {other}\n{USAGE}")),
        }
        i += 1;
    }
    Ok(parsed)
}

struct ConsoleListener;

impl PlaybackListener for ConsoleListener {
    fn on_generations_per_second(&mut self, gps: u64) {
        log::debug!("calculating {gps} gen/s");
    }

    fn on_state_changed(&mut self, state: SimState) {
        println!("state: {state:?}");
    }
}

fn seed_world(sim: &mut Simulation, args: &MainArgs) -> Result<(), Box<dyn Error>> {
    let Some(path) = args.rle.as_deref() else {
        let mut rng = rand::rngs::StdRng::seed_from_u64(args.seed);
        sim.randomize(args.side, args.side, args.density, &mut rng);
        println!(
            "random soup: {side}x{side}, density {density}, seed {seed:#x}, {population} cells",
            side = args.side,
            density = args.density,
            seed = args.seed,
            population = sim.population()
        );
        return Ok(());
    };

    let text = std::fs::read_to_string(path)?;
    let file_name = Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(path);
    let pattern = PatternData::from_rle_file(&text, file_name)
        .ok_or_else(|| format!("{path}: no RLE body"))?;
    let count = sim.load_pattern(&pattern)?;
    println!(
        "pattern: {} by {} ({}x{}), {count} cells",
        if pattern.name.is_empty() { file_name } else { pattern.name.as_str() },
        if pattern.author.is_empty() { "unknown" } else { pattern.author.as_str() },
        pattern.width,
        pattern.height
    );
    Ok(())
}

fn run(args: MainArgs) -> Result<(), Box<dyn Error>> {
    let mut sim = Simulation::new(args.config.clone());
    sim.set_listener(Box::new(ConsoleListener));
    seed_world(&mut sim, &args)?;
    sim.set_allow_birth(args.allow_birth);

    let frame = Duration::from_secs(1) / args.fps;
    let start = Instant::now();
    let end = start + Duration::from_secs(args.seconds);
    if !sim.run(start)? {
        println!("grid is empty, nothing to run");
        return Ok(());
    }

    let mut next_report = start + Duration::from_secs(1);
    let mut starved_frames = 0u64;
    let mut pulses = 0u64;
    loop {
        std::thread::sleep(frame);
        let now = Instant::now();
        if now >= end {
            break;
        }
        let report = sim.tick(now);
        starved_frames += u64::from(report.starved);
        pulses += u64::from(report.pulses);

        if now >= next_report {
            next_report += Duration::from_secs(1);
            println!(
                "t={:>5.1}s  generation {:>6}  population {:>7}  lookahead {:>3}  calc {:>6} gen/s",
                now.duration_since(start).as_secs_f64(),
                sim.displayed_generation(),
                sim.population(),
                sim.ring().lookahead(),
                sim.generations_per_second(),
            );
        }
    }

    let shutdown = sim.pause();
    let elapsed = start.elapsed().as_secs_f64();
    let displayed = sim.displayed_generation();
    println!("\n--- Summary ({elapsed:.1} s at {} gen/s target) ---", sim.gen_per_sec());
    println!("Displayed generations: {displayed} ({:.2}/s)", displayed as f64 / elapsed);
    println!("Calculated generations: {}", sim.total_calculated());
    println!("Final population: {}", sim.population());
    match lookahead_life::cell::bounds(&sim.living_cells()) {
        Some((min_x, min_y, max_x, max_y)) => println!(
            "Final bounds: ({min_x}, {min_y})..=({max_x}, {max_y}), {}x{}",
            i64::from(max_x) - i64::from(min_x) + 1,
            i64::from(max_y) - i64::from(min_y) + 1
        ),
        None => println!("Final bounds: empty"),
    }
    println!("Starved frames: {starved_frames}, haptic pulses: {pulses}");
    println!("Worker shutdown: {shutdown:?}");
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::from(2);
        }
    };
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

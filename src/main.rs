mod analytic;
mod autorun;
mod config;
mod content;
mod error;
mod estimate;
mod i18n;
mod probability;
mod rng;
mod session;
mod sim; // Monte Carlo engine
mod worker;

use analytic::{Mechanic, LINES};
use autorun::{AutoReport, AutoRun, AutoStatus, Policy, Target};
use clap::{Parser, Subcommand};
use colored::Colorize;
use config::{Config, Preset};
use content::{Payload, PresetContent};
use error::{CubeError, Result};
use estimate::{estimate, EstimateReport, EstimateRequest};
use i18n::{I18n, Language};
use log::{debug, error, info};
use probability::{format_percent, SuccessRate};
use rng::Rng;
use session::Session;
use sim::{simulate, simulate_parallel, SimControl};
use std::io::{self, Write};
use std::time::{Duration, Instant};
use worker::SimWorker;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "data/config.json")]
    config: String,

    /// Random seed (optional)
    #[arg(short, long)]
    seed: Option<u64>,

    /// UI language (en / zh); defaults to config, then $LANG
    #[arg(short, long)]
    lang: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Args, Clone, Default)]
struct RateArgs {
    /// Preset key (see `presets`)
    #[arg(short, long)]
    preset: Option<String>,

    /// Override the common-tier hit rate, in percent
    #[arg(long)]
    p_common: Option<f64>,

    /// Override the rare-tier hit rate, in percent
    #[arg(long)]
    p_rare: Option<f64>,

    /// Stat substituted into the preset's target text (e.g. DEX)
    #[arg(long)]
    stat: Option<String>,

    /// How the rerolled line is picked
    #[arg(short, long, value_enum, default_value_t = Mechanic::RandomLine)]
    mechanic: Mechanic,
}

#[derive(Subcommand, Clone)]
enum Commands {
    /// Cube an item line by line (default)
    Interactive {
        #[command(flatten)]
        rate: RateArgs,
    },
    /// Expected cubes and simulated percentiles
    Estimate {
        #[command(flatten)]
        rate: RateArgs,
        /// Target lines already on the item (0-3)
        #[arg(long, default_value_t = 0)]
        hits: usize,
        /// Monte Carlo trials (defaults to config)
        #[arg(short = 'n', long)]
        trials: Option<usize>,
        /// Price of one cube (defaults to config)
        #[arg(long)]
        price: Option<f64>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Auto-cube a fresh item until a goal or the cap
    Auto {
        #[command(flatten)]
        rate: RateArgs,
        /// Line (1-3) to target; without it, keep hits until three lines match
        #[arg(long)]
        target: Option<usize>,
        /// Minimum magnitude for the targeted line (0 = any)
        #[arg(long, default_value_t = 0.0)]
        min: f64,
        /// Require the rare tier for the targeted line
        #[arg(long)]
        rare: bool,
        /// Cube cap (defaults to config)
        #[arg(long)]
        cap: Option<u64>,
        /// Cubes per slice (defaults to config)
        #[arg(long)]
        chunk: Option<u64>,
        /// Stop after this many seconds (checked between slices)
        #[arg(long)]
        time_limit: Option<f64>,
        #[arg(long)]
        json: bool,
    },
    /// List configured presets
    Presets,
    /// Benchmark simulation throughput
    Benchmark,
}

struct Selected {
    key: String,
    preset: Preset,
    rate: SuccessRate,
}

fn select_rate(config: &Config, args: &RateArgs) -> Result<Selected> {
    let key = args
        .preset
        .clone()
        .unwrap_or_else(|| config.default_preset.clone());
    let preset = config.preset(&key)?.clone();
    let p_common = args.p_common.map(|v| v / 100.0).unwrap_or(preset.p_common);
    let p_rare = args.p_rare.map(|v| v / 100.0).unwrap_or(preset.p_rare);
    let rate = SuccessRate::new(p_common, p_rare)?;
    Ok(Selected { key, preset, rate })
}

fn new_session(selected: &Selected, args: &RateArgs, seed: u64) -> Session<PresetContent> {
    let content = PresetContent::new(selected.preset.clone()).with_stat(args.stat.as_deref());
    Session::new(selected.rate, args.mechanic, content, Rng::from_seed(seed))
}

fn fmt_expected(lang: Language, value: f64) -> String {
    if value.is_finite() {
        format!("{:.2}", value)
    } else {
        I18n::get(lang, "unreachable")
    }
}

fn print_estimate(lang: Language, selected: &Selected, report: &EstimateReport) {
    println!("{}: {} ({})", I18n::get(lang, "preset"), selected.preset.label, selected.key);
    if !selected.preset.hint.is_empty() {
        println!("  {}", selected.preset.hint);
    }
    println!(
        "{}: p = {}  ({}={} / {}={})",
        I18n::get(lang, "rate"),
        format_percent(report.p),
        I18n::get(lang, "common"),
        format_percent(report.p_common),
        I18n::get(lang, "rare"),
        format_percent(report.p_rare)
    );
    println!(
        "{}: {}/{} -> {} {}  [{:?}]",
        I18n::get(lang, "hits"),
        report.hits,
        LINES,
        I18n::get(lang, "need"),
        report.need,
        report.mechanic
    );
    println!(
        "{}: {} ({}: {})",
        I18n::get(lang, "expected"),
        fmt_expected(lang, report.expected_attempts),
        I18n::get(lang, "cost"),
        fmt_expected(lang, report.expected_cost)
    );
    let by_hits: Vec<String> = report
        .by_hits
        .iter()
        .enumerate()
        .map(|(k, e)| format!("{}/{}: {}", k, LINES, fmt_expected(lang, *e)))
        .collect();
    println!("  {}", by_hits.join(" | "));
    let mc = &report.simulation;
    println!(
        "{} ({}): {} {:.2} | P50={} | P90={} | P99={}",
        I18n::get(lang, "monte_carlo"),
        mc.trials,
        I18n::get(lang, "mean"),
        mc.mean,
        mc.p50,
        mc.p90,
        mc.p99
    );
    if mc.capped > 0 {
        println!("  {} {}", mc.capped, I18n::get(lang, "capped"));
    }
}

fn describe(lang: Language, payload: Option<&Payload>) -> String {
    match payload {
        None => I18n::get(lang, "unset"),
        Some(p) => {
            let mut out = p.text.clone();
            if let Some(m) = p.magnitude {
                out.push_str(&format!(" {}", m));
            }
            if let Some(label) = &p.tier_label {
                out.push_str(&format!(" [{}]", label));
            }
            out
        }
    }
}

fn print_session(lang: Language, session: &Session<PresetContent>, price: f64) {
    for (i, line) in session.lines().iter().enumerate() {
        let text = describe(lang, line.display.as_ref());
        let mark = if line.is_hit { "✔".green() } else { "✘".red() };
        println!("  {} {}: {} {}", I18n::get(lang, "line"), i + 1, mark, text);
    }
    if let Some(pending) = session.pending() {
        let mark = if pending.is_hit { "✔".green() } else { "✘".red() };
        println!(
            "  {} -> {} {}: {} {}",
            I18n::get(lang, "pending"),
            I18n::get(lang, "line"),
            pending.slot + 1,
            mark,
            describe(lang, Some(&pending.payload))
        );
    }
    let selections = session.selections();
    println!(
        "  {}: {} ({}: {:.0}) | {}/{} | {}: {:?}",
        I18n::get(lang, "cubes_used"),
        session.attempts_used(),
        I18n::get(lang, "spent"),
        session.spent(price),
        session.hit_count(),
        LINES,
        I18n::get(lang, "selections"),
        selections
    );
}

fn print_auto_report(lang: Language, report: &AutoReport) {
    let key = match report.status {
        AutoStatus::Reached => "auto_reached",
        AutoStatus::CapReached => "auto_cap",
        AutoStatus::Cancelled => "auto_cancelled",
        AutoStatus::Running => "running",
    };
    println!("{} ({} cubes, {} slices)", I18n::get(lang, key), report.attempts, report.slices);
}

fn run_auto(
    session: &mut Session<PresetContent>,
    policy: Policy,
    cap: u64,
    chunk: u64,
    time_limit: Option<Duration>,
) -> Result<AutoReport> {
    let started = Instant::now();
    let mut run = AutoRun::new(policy, cap, chunk);
    let token = run.token();
    let report = run.run(session, |progress| {
        debug!("auto-run: {} cubes after {} slices", progress.attempts, progress.slices);
        if time_limit.is_some_and(|limit| started.elapsed() >= limit) {
            token.cancel();
        }
    })?;
    info!("Auto-run {:?} in {:.2?}", report.status, started.elapsed());
    Ok(report)
}

fn read_line() -> Result<Option<String>> {
    io::stdout().flush()?;
    let mut input = String::new();
    if io::stdin().read_line(&mut input)? == 0 {
        return Ok(None);
    }
    Ok(Some(input.trim().to_string()))
}

fn parse_target(parts: &[&str]) -> Option<Target> {
    let line: usize = parts.first()?.parse().ok()?;
    let min = match parts.get(1) {
        Some(v) if !v.eq_ignore_ascii_case("rare") => v.parse().ok()?,
        _ => 0.0,
    };
    let rare = parts.iter().any(|p| p.eq_ignore_ascii_case("rare"));
    Target::new(line.checked_sub(1)?, min, rare).ok()
}

fn parse_init(parts: &[&str]) -> Option<[bool; LINES]> {
    if parts.len() != LINES {
        return None;
    }
    let mut hits = [false; LINES];
    for (hit, part) in hits.iter_mut().zip(parts) {
        *hit = match *part {
            "1" | "y" | "o" => true,
            "0" | "n" | "x" => false,
            _ => return None,
        };
    }
    Some(hits)
}

fn run_interactive(
    config: &Config,
    lang: Language,
    rate_args: &RateArgs,
    worker: &SimWorker,
    master: &mut Rng,
) -> Result<()> {
    let mut rate_args = rate_args.clone();
    let mut selected = select_rate(config, &rate_args)?;
    let mut session = new_session(&selected, &rate_args, master.next_u64());
    let price = config.price_per_cube;

    println!("{}", I18n::get(lang, "title"));
    println!(
        "{}: {} | p = {}",
        I18n::get(lang, "preset"),
        selected.preset.label,
        format_percent(selected.rate.effective())
    );

    loop {
        print_session(lang, &session, price);
        print!("{}", I18n::get(lang, "prompt"));
        let Some(input) = read_line()? else {
            break;
        };
        let parts: Vec<&str> = input.split_whitespace().collect();
        let Some((&cmd, rest)) = parts.split_first() else {
            continue;
        };

        let outcome: Result<()> = match cmd {
            "q" | "quit" => break,
            "u" | "use" => match rest.first().and_then(|v| v.parse::<usize>().ok()) {
                Some(line) if line >= 1 => session.use_once_on(line - 1).map(|_| ()),
                Some(line) => Err(CubeError::InvalidSlot(line)),
                None => session.use_next().map(|_| ()),
            },
            "c" | "confirm" => {
                if session.confirm().is_none() {
                    println!("{}", I18n::get(lang, "nothing_pending"));
                }
                Ok(())
            }
            "x" | "cancel" => {
                if session.cancel().is_none() {
                    println!("{}", I18n::get(lang, "nothing_pending"));
                }
                Ok(())
            }
            "r" | "reselect" => session.reselect().map(|_| ()),
            "a" | "auto" => {
                let cap = rest
                    .first()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(config.auto_attempt_cap);
                run_auto(&mut session, Policy::GreedyToThree, cap, config.auto_chunk_size, None)
                    .map(|report| print_auto_report(lang, &report))
            }
            "t" | "target" => match parse_target(rest) {
                Some(target) => run_auto(
                    &mut session,
                    Policy::Targeted(target),
                    config.auto_attempt_cap,
                    config.auto_chunk_size,
                    None,
                )
                .map(|report| print_auto_report(lang, &report)),
                None => {
                    println!("{}", I18n::get(lang, "help_target"));
                    Ok(())
                }
            },
            "i" | "init" => match parse_init(rest) {
                Some(hits) => {
                    let text = session.content().hit_text();
                    let payloads = hits.map(|hit| hit.then(|| Payload::plain(text.clone())));
                    session.apply_initial_state(hits, payloads);
                    Ok(())
                }
                None => {
                    println!("{}", I18n::get(lang, "help_init"));
                    Ok(())
                }
            },
            "e" | "estimate" => {
                let request = EstimateRequest {
                    rate: session.rate(),
                    hits: session.hit_count(),
                    trials: config.clamp_interactive_trials(config.default_trials),
                    cap: config.simulation_cap,
                    price_per_cube: price,
                    mechanic: session.mechanic(),
                    seed: master.next_u64(),
                };
                estimate(&request, worker).map(|report| print_estimate(lang, &selected, &report))
            }
            "reset" => {
                session.reset();
                Ok(())
            }
            "p" | "preset" => match rest.first() {
                Some(key) => {
                    let args = RateArgs {
                        preset: Some(key.to_string()),
                        ..rate_args.clone()
                    };
                    select_rate(config, &args).map(|next| {
                        let content = PresetContent::new(next.preset.clone())
                            .with_stat(args.stat.as_deref());
                        session.set_rate(next.rate, content);
                        println!(
                            "{}: {} | p = {}",
                            I18n::get(lang, "preset"),
                            next.preset.label,
                            format_percent(next.rate.effective())
                        );
                        selected = next;
                        rate_args = args;
                    })
                }
                None => {
                    for key in config.presets.keys() {
                        println!("  {}", key);
                    }
                    Ok(())
                }
            },
            _ => {
                println!("{}", I18n::get(lang, "unknown_command"));
                Ok(())
            }
        };

        if let Err(e) = outcome {
            println!("{}", e.to_string().red());
        }
    }

    println!("{}", I18n::get(lang, "goodbye"));
    Ok(())
}

fn benchmark_simulation(worker: &SimWorker, rng: &mut Rng) -> Result<()> {
    let control = SimControl::new(0.25, 0, 100_000);

    let start = Instant::now();
    let seq = simulate(&control, rng)?;
    let seq_elapsed = start.elapsed();
    println!(
        "[Bench] simulate: {} trials in {:.2?} ({:.0} trials/sec, mean {:.2})",
        control.trials,
        seq_elapsed,
        control.trials as f64 / seq_elapsed.as_secs_f64(),
        seq.mean
    );

    let start = Instant::now();
    let par = simulate_parallel(&control, rng.next_u64(), worker)?;
    let par_elapsed = start.elapsed();
    println!(
        "[Bench] simulate_parallel ({} threads): {} trials in {:.2?} ({:.0} trials/sec, mean {:.2})",
        worker.thread_count(),
        control.trials,
        par_elapsed,
        control.trials as f64 / par_elapsed.as_secs_f64(),
        par.mean
    );
    Ok(())
}

fn run(args: Args) -> Result<()> {
    let config = Config::load(&args.config)?;
    let lang = args
        .lang
        .as_deref()
        .and_then(Language::parse)
        .unwrap_or_else(|| Language::from_config(&config));
    let mut master = match args.seed {
        Some(seed) => Rng::from_seed(seed),
        None => Rng::from_entropy(),
    };
    let worker = SimWorker::new_with_config(&config)?;

    match args
        .command
        .unwrap_or(Commands::Interactive { rate: RateArgs::default() })
    {
        Commands::Interactive { rate } => run_interactive(&config, lang, &rate, &worker, &mut master)?,
        Commands::Estimate {
            rate,
            hits,
            trials,
            price,
            json,
        } => {
            let selected = select_rate(&config, &rate)?;
            let request = EstimateRequest {
                rate: selected.rate,
                hits,
                trials: trials.unwrap_or(config.default_trials),
                cap: config.simulation_cap,
                price_per_cube: price.unwrap_or(config.price_per_cube),
                mechanic: rate.mechanic,
                seed: master.next_u64(),
            };
            let report = estimate(&request, &worker)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_estimate(lang, &selected, &report);
            }
        }
        Commands::Auto {
            rate,
            target,
            min,
            rare,
            cap,
            chunk,
            time_limit,
            json,
        } => {
            let selected = select_rate(&config, &rate)?;
            let mut session = new_session(&selected, &rate, master.next_u64());
            let policy = match target {
                Some(line) => {
                    let slot = line.checked_sub(1).ok_or(CubeError::InvalidSlot(line))?;
                    Policy::Targeted(Target::new(slot, min, rare)?)
                }
                None => Policy::GreedyToThree,
            };
            let time_limit = time_limit
                .map(|secs| {
                    Duration::try_from_secs_f64(secs)
                        .map_err(|e| CubeError::Config(format!("time limit: {}", e)))
                })
                .transpose()?;
            let report = run_auto(
                &mut session,
                policy,
                cap.unwrap_or(config.auto_attempt_cap),
                chunk.unwrap_or(config.auto_chunk_size),
                time_limit,
            )?;
            if json {
                let out = serde_json::json!({
                    "report": report,
                    "session": session.snapshot(),
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                print_auto_report(lang, &report);
                print_session(lang, &session, config.price_per_cube);
            }
        }
        Commands::Presets => {
            for (key, preset) in &config.presets {
                println!(
                    "{:<20} p = {:<9} ({} / {})  {}",
                    key,
                    format_percent(probability::mix(preset.p_common, preset.p_rare)),
                    format_percent(preset.p_common),
                    format_percent(preset.p_rare),
                    preset.label
                );
            }
        }
        Commands::Benchmark => benchmark_simulation(&worker, &mut master)?,
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    if let Err(e) = run(args) {
        error!("{}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_estimate() {
        let args = Args::try_parse_from([
            "cube-odds", "--seed", "7", "estimate", "--preset", "glove_crit_dmg", "--hits", "1",
            "-n", "2000", "--mechanic", "chosen-line",
        ])
        .unwrap();
        assert_eq!(args.seed, Some(7));
        match args.command {
            Some(Commands::Estimate { rate, hits, trials, .. }) => {
                assert_eq!(rate.preset.as_deref(), Some("glove_crit_dmg"));
                assert_eq!(rate.mechanic, Mechanic::ChosenLine);
                assert_eq!(hits, 1);
                assert_eq!(trials, Some(2000));
            }
            _ => panic!("expected estimate"),
        }
    }

    #[test]
    fn percent_overrides_replace_preset_rates() {
        let config = Config::default();
        let args = RateArgs {
            p_common: Some(1.0),
            ..RateArgs::default()
        };
        let selected = select_rate(&config, &args).unwrap();
        assert!((selected.rate.p_common - 0.01).abs() < 1e-12);
        assert!((selected.rate.p_rare - 0.0126).abs() < 1e-12);
    }

    #[test]
    fn bad_override_is_rejected() {
        let config = Config::default();
        let args = RateArgs {
            p_rare: Some(150.0),
            ..RateArgs::default()
        };
        assert!(matches!(
            select_rate(&config, &args),
            Err(CubeError::InvalidProbability { .. })
        ));
    }

    #[test]
    fn parses_interactive_arguments() {
        let t = parse_target(&["2", "12", "rare"]).unwrap();
        assert_eq!((t.slot, t.min_magnitude, t.require_rare), (1, 12.0, true));
        let t = parse_target(&["3", "rare"]).unwrap();
        assert_eq!((t.slot, t.min_magnitude, t.require_rare), (2, 0.0, true));
        assert!(parse_target(&["0"]).is_none());
        assert_eq!(parse_init(&["1", "0", "1"]), Some([true, false, true]));
        assert!(parse_init(&["1", "0"]).is_none());
    }

    #[test]
    fn auto_from_fresh_session() {
        let config = Config::default();
        let args = RateArgs {
            p_common: Some(100.0),
            p_rare: Some(100.0),
            ..RateArgs::default()
        };
        let selected = select_rate(&config, &args).unwrap();
        let mut session = new_session(&selected, &args, 5);
        let report = run_auto(&mut session, Policy::GreedyToThree, 1_000, 10, None).unwrap();
        assert_eq!(report.status, AutoStatus::Reached);
        assert_eq!(session.hit_count(), LINES);
    }
}

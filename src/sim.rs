use crate::analytic::{check_hits, Mechanic, LINES};
use crate::error::{CubeError, Result};
use crate::probability::validate_probability;
use crate::rng::{RollExt, Rng};
use crate::worker::SimWorker;
use log::{debug, warn};
use rand_core::RngCore;
use rayon::prelude::*;
use serde::Serialize;
use std::time::Instant;

pub const DEFAULT_ITERATION_CAP: u64 = 2_000_000;
const CHUNK_TRIALS: usize = 64;

/// Distribution of cubes-to-completion over all trials.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct SimulationResult {
    pub trials: usize,
    pub mean: f64,
    pub p50: u64,
    pub p90: u64,
    pub p99: u64,
    /// Runs stopped by the iteration cap before reaching three lines.
    pub capped: usize,
}

#[derive(Clone, Copy, Debug)]
pub struct SimControl {
    pub p: f64,
    pub hits: usize,
    pub trials: usize,
    pub cap: u64,
    pub mechanic: Mechanic,
}

impl SimControl {
    pub fn new(p: f64, hits: usize, trials: usize) -> Self {
        SimControl {
            p,
            hits,
            trials,
            cap: DEFAULT_ITERATION_CAP,
            mechanic: Mechanic::RandomLine,
        }
    }

    fn validate(&self) -> Result<()> {
        validate_probability("p", self.p)?;
        check_hits(self.hits)?;
        if self.trials == 0 {
            return Err(CubeError::NoTrials);
        }
        Ok(())
    }

    /// With `p == 0` every run burns the whole cap; no need to loop.
    fn all_capped(&self) -> Option<SimulationResult> {
        if self.p > 0.0 {
            return None;
        }
        Some(SimulationResult {
            trials: self.trials,
            mean: self.cap as f64,
            p50: self.cap,
            p90: self.cap,
            p99: self.cap,
            capped: self.trials,
        })
    }
}

/// One run. Returns the cubes used and whether three lines were reached.
pub fn run_once<R: RngCore + ?Sized>(control: &SimControl, rng: &mut R) -> (u64, bool) {
    let mut lines = [false; LINES];
    for line in lines.iter_mut().take(control.hits) {
        *line = true;
    }
    rng.shuffle(&mut lines);

    let mut hits = control.hits;
    let mut cubes = 0u64;
    while hits < LINES && cubes < control.cap {
        let idx = match control.mechanic {
            Mechanic::RandomLine => rng.below(LINES),
            Mechanic::ChosenLine => lines.iter().position(|hit| !hit).unwrap_or(0),
        };
        let hit = rng.chance(control.p);
        if hit != lines[idx] {
            if hit {
                hits += 1;
            } else {
                hits -= 1;
            }
            lines[idx] = hit;
        }
        cubes += 1;
    }
    (cubes, hits == LINES)
}

pub fn simulate<R: RngCore + ?Sized>(control: &SimControl, rng: &mut R) -> Result<SimulationResult> {
    control.validate()?;
    if control.hits == LINES {
        return Ok(SimulationResult::default());
    }
    if let Some(result) = control.all_capped() {
        return Ok(result);
    }

    let start = Instant::now();
    let mut samples = Vec::with_capacity(control.trials);
    let mut capped = 0usize;
    for _ in 0..control.trials {
        let (cubes, done) = run_once(control, rng);
        if !done {
            capped += 1;
        }
        samples.push(cubes);
    }
    let result = summarize(&mut samples, capped);
    log_run(control, &result, start);
    Ok(result)
}

/// Splits trials into fixed chunks; each chunk owns a forked RNG and a
/// disjoint slice of the sample buffer.
pub fn simulate_parallel(control: &SimControl, seed: u64, worker: &SimWorker) -> Result<SimulationResult> {
    control.validate()?;
    if control.hits == LINES {
        return Ok(SimulationResult::default());
    }
    if let Some(result) = control.all_capped() {
        return Ok(result);
    }

    let start = Instant::now();
    let base_seed = Rng::from_seed(seed).next_u64();
    let mut samples = vec![0u64; control.trials];
    let capped = worker.execute(|| {
        samples
            .par_chunks_mut(CHUNK_TRIALS)
            .enumerate()
            .map(|(chunk_idx, chunk)| {
                let mut local_rng = Rng::fork(base_seed, chunk_idx as u64);
                let mut capped = 0usize;
                for slot in chunk.iter_mut() {
                    let (cubes, done) = run_once(control, &mut local_rng);
                    if !done {
                        capped += 1;
                    }
                    *slot = cubes;
                }
                capped
            })
            .sum::<usize>()
    })?;

    let result = summarize(&mut samples, capped);
    log_run(control, &result, start);
    Ok(result)
}

/// Sorts in place; quantiles are nearest-rank at `floor(n * q)`.
pub fn summarize(samples: &mut [u64], capped: usize) -> SimulationResult {
    if samples.is_empty() {
        return SimulationResult::default();
    }
    samples.sort_unstable();
    let n = samples.len();
    let total: u128 = samples.iter().map(|&s| s as u128).sum();
    let at = |q: f64| samples[((n as f64 * q).floor() as usize).min(n - 1)];
    SimulationResult {
        trials: n,
        mean: total as f64 / n as f64,
        p50: at(0.5),
        p90: at(0.9),
        p99: at(0.99),
        capped,
    }
}

fn log_run(control: &SimControl, result: &SimulationResult, start: Instant) {
    debug!(
        "Simulated {} trials (p={:.6}, hits={}, {:?}) in {:.2?}",
        control.trials,
        control.p,
        control.hits,
        control.mechanic,
        start.elapsed()
    );
    if result.capped > 0 {
        warn!(
            "{} of {} runs hit the {}-cube cap; tail quantiles are truncated",
            result.capped, control.trials, control.cap
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytic::{expected_attempts, expected_attempts_for};

    #[test]
    fn complete_start_is_degenerate() {
        let mut rng = Rng::from_seed(1);
        let res = simulate(&SimControl::new(0.3, 3, 1000), &mut rng).unwrap();
        assert_eq!(res.mean, 0.0);
        assert_eq!((res.p50, res.p90, res.p99), (0, 0, 0));
    }

    #[test]
    fn quantiles_are_ordered() {
        let mut rng = Rng::from_seed(2);
        let res = simulate(&SimControl::new(0.3, 0, 2000), &mut rng).unwrap();
        assert!(res.p50 <= res.p90 && res.p90 <= res.p99);
        assert!(res.p50 >= 3);
        assert_eq!(res.capped, 0);
    }

    #[test]
    fn mean_tracks_analytic_expectation() {
        let mut rng = Rng::from_seed(2024);
        for (p, hits) in [(0.25, 0), (0.5, 2), (0.2, 1)] {
            let exact = expected_attempts(p, hits).unwrap();
            let res = simulate(&SimControl::new(p, hits, 20_000), &mut rng).unwrap();
            let rel = (exact - res.mean).abs() / exact;
            assert!(rel < 0.05, "p={p} hits={hits}: exact {exact} vs mc {}", res.mean);
        }
    }

    #[test]
    fn chosen_line_mean_is_need_over_p() {
        let mut rng = Rng::from_seed(77);
        let control = SimControl {
            mechanic: Mechanic::ChosenLine,
            ..SimControl::new(0.1, 1, 20_000)
        };
        let exact = expected_attempts_for(Mechanic::ChosenLine, 0.1, 1).unwrap();
        let res = simulate(&control, &mut rng).unwrap();
        assert!((exact - res.mean).abs() / exact < 0.05, "{exact} vs {}", res.mean);
    }

    #[test]
    fn cap_truncates_runs() {
        let mut rng = Rng::from_seed(3);
        let control = SimControl {
            cap: 10,
            ..SimControl::new(0.01, 0, 500)
        };
        let res = simulate(&control, &mut rng).unwrap();
        assert!(res.capped > 400);
        assert_eq!(res.p99, 10);
    }

    #[test]
    fn zero_rate_reports_every_run_capped() {
        let mut rng = Rng::from_seed(4);
        let control = SimControl {
            cap: 1000,
            ..SimControl::new(0.0, 1, 50)
        };
        let res = simulate(&control, &mut rng).unwrap();
        assert_eq!(res.capped, 50);
        assert_eq!(res.p50, 1000);
    }

    #[test]
    fn rejects_invalid_controls() {
        let mut rng = Rng::from_seed(5);
        assert!(matches!(
            simulate(&SimControl::new(0.5, 0, 0), &mut rng),
            Err(CubeError::NoTrials)
        ));
        assert!(simulate(&SimControl::new(-0.1, 0, 10), &mut rng).is_err());
        assert!(simulate(&SimControl::new(0.5, 5, 10), &mut rng).is_err());
    }

    #[test]
    fn nearest_rank_indices() {
        let mut samples: Vec<u64> = (1..=100).rev().collect();
        let res = summarize(&mut samples, 0);
        assert_eq!(res.p50, 51);
        assert_eq!(res.p90, 91);
        assert_eq!(res.p99, 100);
        assert!((res.mean - 50.5).abs() < 1e-12);
    }

    #[test]
    fn parallel_is_reproducible_and_close() {
        let worker = SimWorker::new(2).unwrap();
        let control = SimControl::new(0.25, 0, 20_000);
        let a = simulate_parallel(&control, 99, &worker).unwrap();
        let b = simulate_parallel(&control, 99, &worker).unwrap();
        assert_eq!(a, b);
        let exact = expected_attempts(0.25, 0).unwrap();
        assert!((a.mean - exact).abs() / exact < 0.05);
    }
}

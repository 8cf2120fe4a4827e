use crate::analytic::{check_hits, expected_all, Mechanic, LINES};
use crate::error::Result;
use crate::probability::SuccessRate;
use crate::sim::{simulate_parallel, SimControl, SimulationResult};
use crate::worker::SimWorker;
use serde::Serialize;

#[derive(Clone, Copy, Debug)]
pub struct EstimateRequest {
    pub rate: SuccessRate,
    pub hits: usize,
    pub trials: usize,
    pub cap: u64,
    pub price_per_cube: f64,
    pub mechanic: Mechanic,
    pub seed: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct EstimateReport {
    pub p: f64,
    pub p_common: f64,
    pub p_rare: f64,
    pub hits: usize,
    pub need: usize,
    pub mechanic: Mechanic,
    /// `f64::INFINITY` serialises as `null`.
    pub expected_attempts: f64,
    pub expected_cost: f64,
    /// Expected cubes from 0, 1, 2 and 3 current target lines.
    pub by_hits: [f64; LINES + 1],
    pub simulation: SimulationResult,
}

/// Analytic expectation plus a Monte Carlo distribution for the same inputs.
pub fn estimate(request: &EstimateRequest, worker: &SimWorker) -> Result<EstimateReport> {
    let hits = check_hits(request.hits)?;
    let p = request.rate.effective();
    let by_hits = expected_all(request.mechanic, p)?;
    let expected = by_hits[hits];

    let control = SimControl {
        p,
        hits,
        trials: request.trials,
        cap: request.cap,
        mechanic: request.mechanic,
    };
    let simulation = simulate_parallel(&control, request.seed, worker)?;

    Ok(EstimateReport {
        p,
        p_common: request.rate.p_common,
        p_rare: request.rate.p_rare,
        hits,
        need: LINES - hits,
        mechanic: request.mechanic,
        expected_attempts: expected,
        expected_cost: expected * request.price_per_cube,
        by_hits,
        simulation,
    })
}

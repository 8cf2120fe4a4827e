use crate::analytic::{Mechanic, LINES};
use crate::content::ContentSource;
use crate::error::{CubeError, Result};
use crate::probability::Tier;
use crate::session::{PendingDraw, Session};
use log::{debug, info};
use rand_core::RngCore;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag checked between slices of an auto-run.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Condition a single line has to meet for the targeted policy.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Target {
    pub slot: usize,
    /// `0.0` means any magnitude.
    pub min_magnitude: f64,
    pub require_rare: bool,
}

impl Target {
    pub fn new(slot: usize, min_magnitude: f64, require_rare: bool) -> Result<Self> {
        if slot >= LINES {
            return Err(CubeError::InvalidSlot(slot));
        }
        if !min_magnitude.is_finite() || min_magnitude < 0.0 {
            return Err(CubeError::Config(format!(
                "minimum magnitude must be a non-negative number, got {}",
                min_magnitude
            )));
        }
        Ok(Target {
            slot,
            min_magnitude,
            require_rare,
        })
    }

    pub fn accepts(&self, draw: &PendingDraw) -> bool {
        if draw.slot != self.slot || !draw.is_hit {
            return false;
        }
        let magnitude_ok = self.min_magnitude <= 0.0
            || draw
                .payload
                .magnitude
                .is_some_and(|m| m >= self.min_magnitude);
        let tier_ok = !self.require_rare || draw.tier == Tier::Rare;
        magnitude_ok && tier_ok
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub enum Policy {
    /// Keep every hit until all three lines are targets.
    GreedyToThree,
    Targeted(Target),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoStatus {
    Running,
    Reached,
    CapReached,
    Cancelled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct AutoReport {
    pub status: AutoStatus,
    pub attempts: u64,
    pub slices: u64,
}

/// Resumable auto-run. Each `step` spends at most `chunk` cubes, so a host
/// can interleave other work or cancel between slices.
#[derive(Debug)]
pub struct AutoRun {
    policy: Policy,
    cap: u64,
    chunk: u64,
    attempts: u64,
    slices: u64,
    status: AutoStatus,
    token: CancelToken,
}

impl AutoRun {
    pub fn new(policy: Policy, cap: u64, chunk: u64) -> Self {
        AutoRun {
            policy,
            cap,
            chunk: chunk.max(1),
            attempts: 0,
            slices: 0,
            status: AutoStatus::Running,
            token: CancelToken::new(),
        }
    }

    pub fn with_token(mut self, token: CancelToken) -> Self {
        self.token = token;
        self
    }

    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    pub fn report(&self) -> AutoReport {
        AutoReport {
            status: self.status,
            attempts: self.attempts,
            slices: self.slices,
        }
    }

    /// Runs one slice. The session is idle again when this returns.
    pub fn step<C: ContentSource, R: RngCore>(&mut self, session: &mut Session<C, R>) -> Result<AutoStatus> {
        if self.status != AutoStatus::Running {
            return Ok(self.status);
        }
        if self.token.is_cancelled() {
            info!("Auto-run cancelled after {} cubes", self.attempts);
            self.status = AutoStatus::Cancelled;
            return Ok(self.status);
        }
        self.slices += 1;

        for _ in 0..self.chunk {
            if self.policy == Policy::GreedyToThree && session.hit_count() == LINES {
                self.status = AutoStatus::Reached;
                break;
            }
            if self.attempts >= self.cap {
                self.status = AutoStatus::CapReached;
                break;
            }

            match self.policy {
                Policy::Targeted(target) if session.mechanic() == Mechanic::ChosenLine => {
                    session.use_once_on(target.slot)?
                }
                _ => session.use_next()?,
            };
            self.attempts += 1;

            let accept = session.pending().is_some_and(|draw| match self.policy {
                Policy::GreedyToThree => draw.is_hit,
                Policy::Targeted(target) => target.accepts(draw),
            });
            if accept {
                session.confirm();
                if matches!(self.policy, Policy::Targeted(_)) {
                    self.status = AutoStatus::Reached;
                    break;
                }
            } else {
                session.cancel();
            }
        }

        debug_assert!(session.is_idle());
        if self.status == AutoStatus::Running
            && self.policy == Policy::GreedyToThree
            && session.hit_count() == LINES
        {
            self.status = AutoStatus::Reached;
        }
        debug!(
            "Auto-run slice {}: {} cubes, {} hits, {:?}",
            self.slices,
            self.attempts,
            session.hit_count(),
            self.status
        );
        Ok(self.status)
    }

    /// Drives `step` to completion, calling `on_slice` between slices.
    pub fn run<C, R, F>(&mut self, session: &mut Session<C, R>, mut on_slice: F) -> Result<AutoReport>
    where
        C: ContentSource,
        R: RngCore,
        F: FnMut(&AutoReport),
    {
        while self.step(session)? == AutoStatus::Running {
            on_slice(&self.report());
        }
        Ok(self.report())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Preset};
    use crate::content::PresetContent;
    use crate::rng::Rng;
    use crate::session::tests::session_with;

    #[test]
    fn zero_cap_targeted_returns_immediately() {
        let mut s = session_with(0.5, 0.5, 1);
        let target = Target::new(0, 0.0, false).unwrap();
        let mut run = AutoRun::new(Policy::Targeted(target), 0, 100);
        let report = run.run(&mut s, |_| {}).unwrap();
        assert_eq!(report.status, AutoStatus::CapReached);
        assert_eq!(report.attempts, 0);
        assert_eq!(s.attempts_used(), 0);
        assert!(s.lines().iter().all(|l| l.display.is_none()));
    }

    #[test]
    fn greedy_reaches_three_with_certain_hits() {
        let mut s = session_with(1.0, 1.0, 2);
        let mut run = AutoRun::new(Policy::GreedyToThree, 10_000, 7);
        let report = run.run(&mut s, |_| {}).unwrap();
        assert_eq!(report.status, AutoStatus::Reached);
        assert_eq!(s.hit_count(), 3);
        assert_eq!(s.attempts_used(), report.attempts);
        assert!(s.is_idle());
    }

    #[test]
    fn greedy_stops_at_cap() {
        let mut s = session_with(0.0, 0.0, 3);
        let mut run = AutoRun::new(Policy::GreedyToThree, 1_234, 100);
        let mut slices_seen = 0;
        let report = run.run(&mut s, |_| slices_seen += 1).unwrap();
        assert_eq!(report.status, AutoStatus::CapReached);
        assert_eq!(report.attempts, 1_234);
        assert_eq!(s.attempts_used(), 1_234);
        assert_eq!(slices_seen, 12);
        assert_eq!(report.slices, 13);
    }

    #[test]
    fn greedy_with_three_hits_does_nothing() {
        let mut s = session_with(0.5, 0.5, 4);
        s.apply_initial_state([true; 3], Default::default());
        let mut run = AutoRun::new(Policy::GreedyToThree, 0, 10);
        assert_eq!(run.step(&mut s).unwrap(), AutoStatus::Reached);
        assert_eq!(s.attempts_used(), 0);
    }

    #[test]
    fn slices_are_bounded_and_cancellable() {
        let mut s = session_with(0.0, 0.0, 5);
        let mut run = AutoRun::new(Policy::GreedyToThree, 1_000_000, 250);
        let token = run.token();
        assert_eq!(run.step(&mut s).unwrap(), AutoStatus::Running);
        assert_eq!(s.attempts_used(), 250);
        assert!(s.is_idle());

        token.cancel();
        assert_eq!(run.step(&mut s).unwrap(), AutoStatus::Cancelled);
        assert_eq!(s.attempts_used(), 250);
        assert_eq!(run.step(&mut s).unwrap(), AutoStatus::Cancelled);
    }

    #[test]
    fn cancel_from_callback_stops_at_next_slice() {
        let mut s = session_with(0.0, 0.0, 6);
        let token = CancelToken::new();
        let mut run = AutoRun::new(Policy::GreedyToThree, 1_000_000, 100).with_token(token.clone());
        let report = run
            .run(&mut s, |r| {
                if r.slices == 3 {
                    token.cancel();
                }
            })
            .unwrap();
        assert_eq!(report.status, AutoStatus::Cancelled);
        assert_eq!(report.attempts, 300);
    }

    #[test]
    fn targeted_only_changes_target_line() {
        let mut s = session_with(1.0, 1.0, 7);
        let target = Target::new(1, 0.0, false).unwrap();
        let mut run = AutoRun::new(Policy::Targeted(target), 10_000, 50);
        let report = run.run(&mut s, |_| {}).unwrap();
        assert_eq!(report.status, AutoStatus::Reached);
        assert!(s.lines()[1].is_hit);
        assert!(s.lines()[0].display.is_none());
        assert!(s.lines()[2].display.is_none());
        assert_eq!(s.selections()[1], 1);
    }

    #[test]
    fn targeted_respects_tier_and_magnitude() {
        let mut s = session_with(1.0, 1.0, 8);
        let target = Target::new(2, 12.0, true).unwrap();
        let mut run = AutoRun::new(Policy::Targeted(target), 200_000, 500);
        let report = run.run(&mut s, |_| {}).unwrap();
        assert_eq!(report.status, AutoStatus::Reached);
        let line = &s.lines()[2];
        assert!(line.is_hit);
        let payload = line.display.as_ref().unwrap();
        assert_eq!(payload.magnitude, Some(12.0));
        assert_eq!(payload.tier_label.as_deref(), Some("Legendary"));
    }

    #[test]
    fn unreachable_magnitude_hits_cap() {
        let mut s = session_with(1.0, 1.0, 9);
        let target = Target::new(0, 99.0, false).unwrap();
        let mut run = AutoRun::new(Policy::Targeted(target), 300, 64);
        let report = run.run(&mut s, |_| {}).unwrap();
        assert_eq!(report.status, AutoStatus::CapReached);
        assert!(s.lines().iter().all(|l| l.display.is_none()));
    }

    #[test]
    fn chosen_line_targeted_draws_on_target() {
        let config = Config::default();
        let preset = Preset {
            p_common: 1.0,
            p_rare: 1.0,
            ..config.preset("weapon_phys_pct").unwrap().clone()
        };
        let mut s = Session::new(
            preset.rate().unwrap(),
            Mechanic::ChosenLine,
            PresetContent::new(preset),
            Rng::from_seed(10),
        );
        let target = Target::new(2, 0.0, false).unwrap();
        let report = AutoRun::new(Policy::Targeted(target), 10, 10)
            .run(&mut s, |_| {})
            .unwrap();
        assert_eq!(report.attempts, 1);
        assert_eq!(s.selections(), [0, 0, 1]);
    }

    #[test]
    fn pending_draw_blocks_auto_run() {
        let mut s = session_with(0.5, 0.5, 11);
        s.use_once().unwrap();
        let mut run = AutoRun::new(Policy::GreedyToThree, 10, 10);
        assert!(matches!(run.step(&mut s), Err(CubeError::DrawPending { .. })));
    }

    #[test]
    fn target_validation() {
        assert!(Target::new(3, 0.0, false).is_err());
        assert!(Target::new(0, -1.0, false).is_err());
        assert!(Target::new(0, f64::NAN, false).is_err());
    }
}

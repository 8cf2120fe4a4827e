//! Interactive cube session.
//!
//! A draw is held as pending until the caller confirms (the line takes the
//! new value) or cancels (the line keeps its old value). Either way the cube
//! is spent.

use crate::analytic::{Mechanic, LINES};
use crate::content::{ContentSource, Payload};
use crate::error::{CubeError, Result};
use crate::probability::{SuccessRate, Tier};
use crate::rng::{RollExt, Rng};
use log::debug;
use rand_core::RngCore;
use serde::Serialize;

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct LineState {
    pub is_hit: bool,
    /// `None` while the line is unset.
    pub display: Option<Payload>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PendingDraw {
    pub slot: usize,
    pub is_hit: bool,
    pub tier: Tier,
    pub payload: Payload,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SessionCounters {
    pub attempts_used: u64,
    pub selections: [u64; LINES],
}

#[derive(Clone, Debug, Serialize)]
pub struct SessionSnapshot {
    pub lines: [LineState; LINES],
    pub pending: Option<PendingDraw>,
    pub hits: usize,
    pub counters: SessionCounters,
}

pub struct Session<C, R = Rng> {
    rate: SuccessRate,
    mechanic: Mechanic,
    content: C,
    rng: R,
    lines: [LineState; LINES],
    pending: Option<PendingDraw>,
    counters: SessionCounters,
}

impl<C: ContentSource, R: RngCore> Session<C, R> {
    pub fn new(rate: SuccessRate, mechanic: Mechanic, content: C, rng: R) -> Self {
        Session {
            rate,
            mechanic,
            content,
            rng,
            lines: Default::default(),
            pending: None,
            counters: SessionCounters::default(),
        }
    }

    /// Rerolls a uniformly selected line.
    pub fn use_once(&mut self) -> Result<usize> {
        self.ensure_idle()?;
        let slot = self.rng.below(LINES);
        self.draw(slot);
        Ok(slot)
    }

    /// Rerolls the given line (chosen-line mechanic).
    pub fn use_once_on(&mut self, slot: usize) -> Result<usize> {
        if slot >= LINES {
            return Err(CubeError::InvalidSlot(slot));
        }
        self.ensure_idle()?;
        self.draw(slot);
        Ok(slot)
    }

    /// Draws according to the session's mechanic: a random line, or the
    /// first missed line when lines are chosen.
    pub fn use_next(&mut self) -> Result<usize> {
        match self.mechanic {
            Mechanic::RandomLine => self.use_once(),
            Mechanic::ChosenLine => {
                let slot = self.lines.iter().position(|l| !l.is_hit).unwrap_or(0);
                self.use_once_on(slot)
            }
        }
    }

    fn ensure_idle(&self) -> Result<()> {
        match &self.pending {
            Some(pending) => Err(CubeError::DrawPending { slot: pending.slot }),
            None => Ok(()),
        }
    }

    fn draw(&mut self, slot: usize) {
        self.counters.attempts_used += 1;
        self.counters.selections[slot] += 1;

        let tier = Tier::sample(&mut self.rng);
        let is_hit = self.rng.chance(self.rate.for_tier(tier));
        let payload = if is_hit {
            self.content.hit_payload(tier, &mut self.rng)
        } else {
            self.content.miss_payload(&mut self.rng)
        };
        debug!(
            "Cube #{} on line {}: {} ({:?})",
            self.counters.attempts_used,
            slot + 1,
            if is_hit { "hit" } else { "miss" },
            tier
        );
        self.pending = Some(PendingDraw {
            slot,
            is_hit,
            tier,
            payload,
        });
    }

    /// Applies the pending draw. Returns the draw, or `None` when idle.
    pub fn confirm(&mut self) -> Option<PendingDraw> {
        let pending = self.pending.take()?;
        let line = &mut self.lines[pending.slot];
        line.is_hit = pending.is_hit;
        line.display = Some(pending.payload.clone());
        Some(pending)
    }

    /// Discards the pending draw. Returns it, or `None` when idle.
    pub fn cancel(&mut self) -> Option<PendingDraw> {
        self.pending.take()
    }

    pub fn reselect(&mut self) -> Result<usize> {
        self.cancel();
        self.use_once()
    }

    /// Seeds the lines directly; counters are left alone.
    pub fn apply_initial_state(&mut self, hits: [bool; LINES], payloads: [Option<Payload>; LINES]) {
        self.pending = None;
        for ((line, is_hit), payload) in self.lines.iter_mut().zip(hits).zip(payloads) {
            line.is_hit = is_hit;
            line.display = payload;
        }
    }

    pub fn reset(&mut self) {
        self.lines = Default::default();
        self.pending = None;
        self.counters = SessionCounters::default();
    }

    /// Switches rate and content (e.g. a new preset) and starts over.
    pub fn set_rate(&mut self, rate: SuccessRate, content: C) {
        self.rate = rate;
        self.content = content;
        self.reset();
    }

    pub fn hit_count(&self) -> usize {
        self.lines.iter().filter(|l| l.is_hit).count()
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_none()
    }

    pub fn pending(&self) -> Option<&PendingDraw> {
        self.pending.as_ref()
    }

    pub fn lines(&self) -> &[LineState; LINES] {
        &self.lines
    }

    pub fn attempts_used(&self) -> u64 {
        self.counters.attempts_used
    }

    pub fn selections(&self) -> [u64; LINES] {
        self.counters.selections
    }

    pub fn rate(&self) -> SuccessRate {
        self.rate
    }

    pub fn mechanic(&self) -> Mechanic {
        self.mechanic
    }

    pub fn content(&self) -> &C {
        &self.content
    }

    pub fn spent(&self, price_per_cube: f64) -> f64 {
        self.counters.attempts_used as f64 * price_per_cube
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            lines: self.lines.clone(),
            pending: self.pending.clone(),
            hits: self.hit_count(),
            counters: self.counters,
        }
    }
}

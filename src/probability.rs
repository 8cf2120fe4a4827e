use crate::error::{CubeError, Result};
use crate::rng::RollExt;
use rand_core::RngCore;
use serde::{Deserialize, Serialize};

/// How often a rerolled line lands in each internal tier before the
/// target attribute is checked.
pub const W_COMMON: f64 = 0.995;
pub const W_RARE: f64 = 0.005;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Common,
    Rare,
}

impl Tier {
    pub fn sample<R: RngCore + ?Sized>(rng: &mut R) -> Tier {
        if rng.chance(W_RARE) {
            Tier::Rare
        } else {
            Tier::Common
        }
    }
}

/// Mixed per-attempt success probability. Inputs are not validated here.
pub fn mix(p_common: f64, p_rare: f64) -> f64 {
    W_COMMON * p_common + W_RARE * p_rare
}

pub fn validate_probability(name: &'static str, value: f64) -> Result<f64> {
    if value.is_nan() || !(0.0..=1.0).contains(&value) {
        return Err(CubeError::InvalidProbability { name, value });
    }
    Ok(value)
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SuccessRate {
    pub p_common: f64,
    pub p_rare: f64,
}

impl SuccessRate {
    pub fn new(p_common: f64, p_rare: f64) -> Result<Self> {
        Ok(Self {
            p_common: validate_probability("p_common", p_common)?,
            p_rare: validate_probability("p_rare", p_rare)?,
        })
    }

    pub fn effective(&self) -> f64 {
        mix(self.p_common, self.p_rare)
    }

    pub fn for_tier(&self, tier: Tier) -> f64 {
        match tier {
            Tier::Common => self.p_common,
            Tier::Rare => self.p_rare,
        }
    }
}

/// `0.0123015` -> `"1.2302%"`.
pub fn format_percent(p: f64) -> String {
    format!("{:.4}%", p * 100.0)
}

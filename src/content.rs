use crate::config::Preset;
use crate::probability::Tier;
use crate::rng::RollExt;
use rand_core::RngCore;
use serde::Serialize;

/// What a line shows after a draw.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Payload {
    pub text: String,
    pub magnitude: Option<f64>,
    pub tier_label: Option<String>,
}

impl Payload {
    pub fn plain(text: impl Into<String>) -> Self {
        Payload {
            text: text.into(),
            magnitude: None,
            tier_label: None,
        }
    }
}

/// Supplies the text and value of target and non-target lines.
pub trait ContentSource {
    fn hit_payload<R: RngCore + ?Sized>(&self, tier: Tier, rng: &mut R) -> Payload;
    fn miss_payload<R: RngCore + ?Sized>(&self, rng: &mut R) -> Payload;
}

#[derive(Clone, Debug)]
pub struct PresetContent {
    preset: Preset,
    stat: Option<String>,
}

impl PresetContent {
    pub fn new(preset: Preset) -> Self {
        let stat = preset.stat_choices.first().cloned();
        PresetContent { preset, stat }
    }

    /// Selects the stat substituted into `{stat}`; ignored when unknown.
    pub fn with_stat(mut self, stat: Option<&str>) -> Self {
        if let Some(stat) = stat {
            if self.preset.stat_choices.iter().any(|s| s.eq_ignore_ascii_case(stat)) {
                self.stat = Some(stat.to_ascii_uppercase());
            }
        }
        self
    }

    pub fn hit_text(&self) -> String {
        match &self.stat {
            Some(stat) => self.preset.hit_text.replace("{stat}", stat),
            None => self.preset.hit_text.clone(),
        }
    }
}

impl ContentSource for PresetContent {
    fn hit_payload<R: RngCore + ?Sized>(&self, tier: Tier, _rng: &mut R) -> Payload {
        Payload {
            text: self.hit_text(),
            magnitude: self.preset.magnitude(tier),
            tier_label: Some(self.preset.tier_label(tier).to_string()),
        }
    }

    fn miss_payload<R: RngCore + ?Sized>(&self, rng: &mut R) -> Payload {
        let text = rng
            .choose(&self.preset.miss_pool)
            .cloned()
            .unwrap_or_else(|| "(non-target)".to_string());
        Payload::plain(text)
    }
}

use crate::error::{CubeError, Result};
use crate::probability::{SuccessRate, Tier};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;

// --- Presets (data-driven content) ---

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Preset {
    pub label: String,
    pub hint: String,
    pub p_common: f64,
    pub p_rare: f64,
    /// Text of a target line; `{stat}` is replaced by the selected stat.
    pub hit_text: String,
    pub stat_choices: Vec<String>,
    pub magnitude_common: Option<f64>,
    pub magnitude_rare: Option<f64>,
    pub common_label: String,
    pub rare_label: String,
    pub miss_pool: Vec<String>,
}

impl Default for Preset {
    fn default() -> Self {
        Preset {
            label: String::new(),
            hint: String::new(),
            p_common: 0.0,
            p_rare: 0.0,
            hit_text: "(target)".to_string(),
            stat_choices: vec![],
            magnitude_common: None,
            magnitude_rare: None,
            common_label: "Unique".to_string(),
            rare_label: "Legendary".to_string(),
            miss_pool: vec!["(non-target)".to_string()],
        }
    }
}

impl Preset {
    pub fn rate(&self) -> Result<SuccessRate> {
        SuccessRate::new(self.p_common, self.p_rare)
    }

    pub fn magnitude(&self, tier: Tier) -> Option<f64> {
        match tier {
            Tier::Common => self.magnitude_common,
            Tier::Rare => self.magnitude_rare,
        }
    }

    pub fn tier_label(&self, tier: Tier) -> &str {
        match tier {
            Tier::Common => &self.common_label,
            Tier::Rare => &self.rare_label,
        }
    }
}

fn builtin_presets() -> BTreeMap<String, Preset> {
    let mut presets = BTreeMap::new();
    presets.insert(
        "weapon_phys_pct".to_string(),
        Preset {
            label: "Weapon / Secondary / Emblem: three lines of ATK%".to_string(),
            hint: "Target: ATK %".to_string(),
            p_common: 0.0123,
            p_rare: 0.0126,
            hit_text: "ATK %".to_string(),
            magnitude_common: Some(9.0),
            magnitude_rare: Some(12.0),
            miss_pool: vec![
                "Boss Damage +30%".to_string(),
                "Ignore DEF +30%".to_string(),
                "All Stats +6%".to_string(),
                "Damage +9%".to_string(),
            ],
            ..Preset::default()
        },
    );
    presets.insert(
        "armor_mainstat_pct".to_string(),
        Preset {
            label: "Armor: three lines of main stat %".to_string(),
            hint: "Target: STR / DEX / INT / LUK %".to_string(),
            p_common: 0.0190,
            p_rare: 0.0157,
            hit_text: "{stat} %".to_string(),
            stat_choices: vec![
                "STR".to_string(),
                "DEX".to_string(),
                "INT".to_string(),
                "LUK".to_string(),
            ],
            magnitude_common: Some(9.0),
            magnitude_rare: Some(12.0),
            miss_pool: vec![
                "Max HP +12%".to_string(),
                "DEF +12%".to_string(),
                "All Stats +6%".to_string(),
            ],
            ..Preset::default()
        },
    );
    presets.insert(
        "glove_crit_dmg".to_string(),
        Preset {
            label: "Gloves: three lines of Critical Damage %".to_string(),
            hint: "Target: Critical Damage %".to_string(),
            p_common: 0.0104,
            p_rare: 0.0104,
            hit_text: "Critical Damage %".to_string(),
            magnitude_common: Some(8.0),
            magnitude_rare: Some(8.0),
            miss_pool: vec![
                "Max HP +12%".to_string(),
                "DEF +12%".to_string(),
                "All Stats +6%".to_string(),
            ],
            ..Preset::default()
        },
    );
    presets.insert(
        "hat_cooldown".to_string(),
        Preset {
            label: "Hat: three lines of skill cooldown reduction (legendary only)".to_string(),
            hint: "Target: -sec all skill cooldowns".to_string(),
            p_common: 0.0,
            p_rare: 0.0104,
            hit_text: "Skill Cooldown -sec".to_string(),
            magnitude_common: None,
            magnitude_rare: Some(2.0),
            miss_pool: vec![
                "Max HP +12%".to_string(),
                "DEF +12%".to_string(),
                "All Stats +6%".to_string(),
            ],
            ..Preset::default()
        },
    );
    presets
}

// --- Configuration ---

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub language: Option<String>,
    pub default_preset: String,
    pub price_per_cube: f64,
    pub default_trials: usize,
    pub max_interactive_trials: usize,
    pub simulation_cap: u64,
    pub auto_attempt_cap: u64,
    pub auto_chunk_size: u64,
    pub worker_max_threads: usize,
    pub worker_reserve_cores: usize,
    pub worker_stack_size_mb: usize,
    pub presets: BTreeMap<String, Preset>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            language: None,
            default_preset: "weapon_phys_pct".to_string(),
            price_per_cube: 0.0,
            default_trials: 50_000,
            max_interactive_trials: 8_000,
            simulation_cap: 2_000_000,
            auto_attempt_cap: 200_000,
            auto_chunk_size: 500,
            worker_max_threads: 0,
            worker_reserve_cores: 1,
            worker_stack_size_mb: 4,
            presets: builtin_presets(),
        }
    }
}

impl Config {
    /// Reads `path`, then `../../path` (running from `target/<profile>`),
    /// then falls back to the built-in presets.
    pub fn load(path: &str) -> Result<Self> {
        let candidates = [path.to_string(), format!("../../{}", path)];
        for candidate in &candidates {
            match fs::read_to_string(candidate) {
                Ok(contents) => {
                    let config = Self::from_json(&contents)?;
                    info!("Config loaded from {}", candidate);
                    return Ok(config);
                }
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
        }
        warn!(
            "Config not found at '{}' or '../../{}'; using built-in presets",
            path, path
        );
        Ok(Self::default())
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.presets.is_empty() {
            return Err(CubeError::Config("no presets defined".to_string()));
        }
        if !self.presets.contains_key(&self.default_preset) {
            return Err(CubeError::Config(format!(
                "default_preset '{}' is not defined",
                self.default_preset
            )));
        }
        if self.auto_chunk_size == 0 {
            return Err(CubeError::Config("auto_chunk_size must be positive".to_string()));
        }
        if self.price_per_cube < 0.0 {
            return Err(CubeError::Config("price_per_cube must not be negative".to_string()));
        }
        for (key, preset) in &self.presets {
            preset
                .rate()
                .map_err(|e| CubeError::Config(format!("preset '{}': {}", key, e)))?;
            if preset.miss_pool.is_empty() {
                return Err(CubeError::Config(format!("preset '{}': empty miss_pool", key)));
            }
        }
        Ok(())
    }

    pub fn preset(&self, key: &str) -> Result<&Preset> {
        self.presets
            .get(key)
            .ok_or_else(|| CubeError::UnknownPreset(key.to_string()))
    }

    /// Interactive runs are bounded to keep the prompt responsive.
    pub fn clamp_interactive_trials(&self, requested: usize) -> usize {
        requested.clamp(1, self.max_interactive_trials.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shipped_config_parses() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/data/config.json");
        let contents = fs::read_to_string(path).unwrap();
        let config = Config::from_json(&contents).unwrap();
        assert!(config.presets.contains_key("weapon_phys_pct"));
        assert_eq!(config.max_interactive_trials, 8_000);
        let armor = config.preset("armor_mainstat_pct").unwrap();
        assert_eq!(armor.stat_choices.len(), 4);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config = Config::from_json("{}").unwrap();
        assert_eq!(config.simulation_cap, 2_000_000);
        assert_eq!(config.presets.len(), 4);
    }

    #[test]
    fn rejects_out_of_range_preset() {
        let json = r#"{"default_preset":"x","presets":{"x":{"p_common":1.5}}}"#;
        assert!(matches!(Config::from_json(json), Err(CubeError::Config(_))));
    }

    #[test]
    fn rejects_unknown_default() {
        let json = r#"{"default_preset":"nope"}"#;
        assert!(Config::from_json(json).is_err());
    }

    #[test]
    fn interactive_trials_are_clamped() {
        let config = Config::default();
        assert_eq!(config.clamp_interactive_trials(50_000), 8_000);
        assert_eq!(config.clamp_interactive_trials(0), 1);
        assert_eq!(config.clamp_interactive_trials(500), 500);
    }

    #[test]
    fn unknown_preset_is_reported() {
        let config = Config::default();
        assert!(matches!(config.preset("boots"), Err(CubeError::UnknownPreset(_))));
    }

    #[test]
    fn missing_file_falls_back_to_builtins() {
        let config = Config::load("definitely/not/here.json").unwrap();
        assert_eq!(config.default_preset, "weapon_phys_pct");
    }
}

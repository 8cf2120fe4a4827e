use crate::config::Config;
use colored::*;

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Language {
    En,
    Zh,
}

impl Language {
    pub fn parse(value: &str) -> Option<Self> {
        let lower = value.to_lowercase();
        if lower.contains("zh") || lower.contains("tw") || lower.contains("cn") {
            Some(Language::Zh)
        } else if lower.contains("en") {
            Some(Language::En)
        } else {
            None
        }
    }

    pub fn from_config(config: &Config) -> Self {
        config
            .language
            .as_deref()
            .and_then(Self::parse)
            .unwrap_or_else(Self::from_env)
    }

    pub fn from_env() -> Self {
        std::env::var("LANG")
            .ok()
            .and_then(|lang| Self::parse(&lang))
            .unwrap_or(Language::En)
    }
}

pub struct I18n;

impl I18n {
    pub fn get(lang: Language, key: &str) -> String {
        match (lang, key) {
            (Language::En, "title") => "=== Three-Line Cube Estimator ===".cyan().bold().to_string(),
            (Language::Zh, "title") => "=== 三排方塊期望計算器 ===".cyan().bold().to_string(),

            (Language::En, "preset") => "Preset".to_string(),
            (Language::Zh, "preset") => "預設".to_string(),

            (Language::En, "rate") => "Per-line hit rate (mixed)".to_string(),
            (Language::Zh, "rate") => "每洗一行命中率（混合）".to_string(),

            (Language::En, "common") => "common".to_string(),
            (Language::Zh, "common") => "罕見".to_string(),

            (Language::En, "rare") => "rare".to_string(),
            (Language::Zh, "rare") => "傳說".to_string(),

            (Language::En, "hits") => "Current target lines".to_string(),
            (Language::Zh, "hits") => "目前命中".to_string(),

            (Language::En, "need") => "lines still needed".to_string(),
            (Language::Zh, "need") => "還差行數".to_string(),

            (Language::En, "expected") => "Analytic expected cubes".to_string(),
            (Language::Zh, "expected") => "解析期望顆數".to_string(),

            (Language::En, "cost") => "estimated cost".to_string(),
            (Language::Zh, "cost") => "估花費".to_string(),

            (Language::En, "monte_carlo") => "Monte Carlo".to_string(),
            (Language::Zh, "monte_carlo") => "Monte Carlo 模擬".to_string(),

            (Language::En, "mean") => "mean".to_string(),
            (Language::Zh, "mean") => "平均".to_string(),

            (Language::En, "capped") => "runs truncated at cap".yellow().to_string(),
            (Language::Zh, "capped") => "次模擬達上限被截斷".yellow().to_string(),

            (Language::En, "unreachable") => "unreachable".red().to_string(),
            (Language::Zh, "unreachable") => "無法達成".red().to_string(),

            (Language::En, "line") => "Line".to_string(),
            (Language::Zh, "line") => "行".to_string(),

            (Language::En, "unset") => "(unset)".dimmed().to_string(),
            (Language::Zh, "unset") => "（未設定）".dimmed().to_string(),

            (Language::En, "pending") => "Pending".magenta().bold().to_string(),
            (Language::Zh, "pending") => "待確認".magenta().bold().to_string(),

            (Language::En, "cubes_used") => "Cubes used".to_string(),
            (Language::Zh, "cubes_used") => "已用方塊".to_string(),

            (Language::En, "selections") => "selections per line".to_string(),
            (Language::Zh, "selections") => "各行被選次數".to_string(),

            (Language::En, "spent") => "spent".to_string(),
            (Language::Zh, "spent") => "花費".to_string(),

            (Language::En, "prompt") => "\n[u]se [c]onfirm [x]cancel [r]eselect [a]uto [t]arget [e]stimate [i]nit [reset] [q]uit > ".yellow().to_string(),
            (Language::Zh, "prompt") => "\n[u]使用 [c]確認 [x]取消 [r]重選 [a]自動 [t]目標 [e]估算 [i]初始 [reset]重置 [q]離開 > ".yellow().to_string(),

            (Language::En, "help_target") => "usage: t <line 1-3> [min magnitude] [rare]".to_string(),
            (Language::Zh, "help_target") => "用法：t <行 1-3> [最低數值] [rare]".to_string(),

            (Language::En, "help_init") => "usage: i <0|1> <0|1> <0|1>".to_string(),
            (Language::Zh, "help_init") => "用法：i <0|1> <0|1> <0|1>".to_string(),

            (Language::En, "unknown_command") => "Unknown command.".red().to_string(),
            (Language::Zh, "unknown_command") => "未知指令。".red().to_string(),

            (Language::En, "nothing_pending") => "Nothing pending.".dimmed().to_string(),
            (Language::Zh, "nothing_pending") => "沒有待確認的結果。".dimmed().to_string(),

            (Language::En, "auto_reached") => "Auto-run reached its goal".green().bold().to_string(),
            (Language::Zh, "auto_reached") => "自動洗已達成目標".green().bold().to_string(),

            (Language::En, "auto_cap") => "Auto-run stopped at the cube cap".yellow().to_string(),
            (Language::Zh, "auto_cap") => "自動洗已達方塊上限".yellow().to_string(),

            (Language::En, "auto_cancelled") => "Auto-run cancelled".yellow().to_string(),
            (Language::Zh, "auto_cancelled") => "自動洗已取消".yellow().to_string(),

            (Language::En, "goodbye") => "Exiting. Goodbye!".to_string(),
            (Language::Zh, "goodbye") => "結束，再見！".to_string(),

            // Default fallback
            (_, k) => k.to_string(),
        }
    }
}

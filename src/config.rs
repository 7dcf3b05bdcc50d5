// config.rs — Loads YumiaDisplayFix.ini from the directory the DLL sits in.
//
// The ini is the only external input. A missing file is fatal to the
// injected module (the host process is never taken down over it); unknown
// keys and unparseable values fall back to defaults so a stale ini from an
// older fix version still loads.

use std::path::Path;

use thiserror::Error;

/// FOV multipliers outside this range produce unusable cameras.
pub const FOV_MULT_MIN: f32 = 0.10;
pub const FOV_MULT_MAX: f32 = 2.00;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FixConfig {
    pub custom_res_enabled: bool,
    pub custom_res_width: i32,
    pub custom_res_height: i32,
    pub fix_hud: bool,
    pub gameplay_fov_mult: f32,
    pub battle_fov_mult: f32,
    pub skip_intro: bool,
}

impl Default for FixConfig {
    fn default() -> Self {
        Self {
            custom_res_enabled: false,
            custom_res_width: 0,
            custom_res_height: 0,
            fix_hud: true,
            gameplay_fov_mult: 1.0,
            battle_fov_mult: 1.0,
            skip_intro: false,
        }
    }
}

impl FixConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::parse(&text))
    }

    /// Parse ini text. Every field is optional; values that fail to parse
    /// keep their defaults, FOV multipliers are clamped to a sane range.
    pub fn parse(text: &str) -> Self {
        let mut cfg = Self::default();
        let mut section = String::new();

        for raw in text.lines() {
            let line = strip_comment(raw).trim();
            if line.is_empty() {
                continue;
            }
            if line.starts_with('[') && line.ends_with(']') {
                section = line[1..line.len() - 1].trim().to_ascii_lowercase();
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();

            match (section.as_str(), key.as_str()) {
                ("custom resolution", "enabled") => {
                    parse_bool(value, &mut cfg.custom_res_enabled)
                }
                ("custom resolution", "width") => parse_num(value, &mut cfg.custom_res_width),
                ("custom resolution", "height") => parse_num(value, &mut cfg.custom_res_height),
                ("fix hud", "enabled") => parse_bool(value, &mut cfg.fix_hud),
                ("gameplay fov", "multiplier") => parse_num(value, &mut cfg.gameplay_fov_mult),
                ("battle fov", "multiplier") => parse_num(value, &mut cfg.battle_fov_mult),
                ("skip intro", "enabled") => parse_bool(value, &mut cfg.skip_intro),
                _ => {}
            }
        }

        cfg.gameplay_fov_mult = cfg.gameplay_fov_mult.clamp(FOV_MULT_MIN, FOV_MULT_MAX);
        cfg.battle_fov_mult = cfg.battle_fov_mult.clamp(FOV_MULT_MIN, FOV_MULT_MAX);
        cfg
    }

    /// One line per field into the log, so a support log always shows what
    /// the fix actually ran with.
    pub fn log_values(&self) {
        log::info!("Config Parse: bCustomRes: {}", self.custom_res_enabled);
        log::info!("Config Parse: iCustomResX: {}", self.custom_res_width);
        log::info!("Config Parse: iCustomResY: {}", self.custom_res_height);
        log::info!("Config Parse: bFixHUD: {}", self.fix_hud);
        log::info!("Config Parse: fGameplayFOVMulti: {}", self.gameplay_fov_mult);
        log::info!("Config Parse: fBattleFOVMulti: {}", self.battle_fov_mult);
        log::info!("Config Parse: bSkipIntro: {}", self.skip_intro);
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find([';', '#']) {
        Some(i) => &line[..i],
        None => line,
    }
}

fn parse_bool(value: &str, out: &mut bool) {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => *out = true,
        "false" | "0" | "no" | "off" => *out = false,
        _ => {}
    }
}

fn parse_num<T: std::str::FromStr>(value: &str, out: &mut T) {
    if let Ok(v) = value.parse() {
        *out = v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = "\
[Custom Resolution]
Enabled = true
Width = 3440   ; ultrawide
Height = 1440

[Fix HUD]
Enabled = false

[Gameplay FOV]
Multiplier = 1.25

[Battle FOV]
Multiplier = 0.9

[Skip Intro]
Enabled = on
";

    #[test]
    fn parses_full_file() {
        let cfg = FixConfig::parse(FULL);
        assert!(cfg.custom_res_enabled);
        assert_eq!(cfg.custom_res_width, 3440);
        assert_eq!(cfg.custom_res_height, 1440);
        assert!(!cfg.fix_hud);
        assert_eq!(cfg.gameplay_fov_mult, 1.25);
        assert_eq!(cfg.battle_fov_mult, 0.9);
        assert!(cfg.skip_intro);
    }

    #[test]
    fn missing_keys_keep_defaults() {
        let cfg = FixConfig::parse("[Fix HUD]\nEnabled = true\n");
        assert_eq!(
            cfg,
            FixConfig {
                fix_hud: true,
                ..FixConfig::default()
            }
        );
    }

    #[test]
    fn fov_multipliers_are_clamped() {
        let cfg = FixConfig::parse(
            "[Gameplay FOV]\nMultiplier = 9.5\n[Battle FOV]\nMultiplier = 0.0\n",
        );
        assert_eq!(cfg.gameplay_fov_mult, FOV_MULT_MAX);
        assert_eq!(cfg.battle_fov_mult, FOV_MULT_MIN);
    }

    #[test]
    fn garbage_values_keep_defaults() {
        let cfg = FixConfig::parse(
            "[Custom Resolution]\nEnabled = maybe\nWidth = wide\n[Gameplay FOV]\nMultiplier = x\n",
        );
        assert_eq!(cfg, FixConfig::default());
    }

    #[test]
    fn comments_and_spacing_ignored() {
        let cfg = FixConfig::parse("  [ Skip Intro ]  \n  Enabled=1 # skip logos\n");
        assert!(cfg.skip_intro);
    }
}

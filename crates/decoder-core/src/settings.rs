//! Global settings loaded from TOML.
//!
//! - `init_custom(toml_content)` sets a custom TOML before first `settings()` call
//! - `settings()` returns `&'static Settings` (lazy-init singleton)
//! - Default values are embedded via `include_str!("default_settings.toml")`
//!
//! Search components never read the singleton on their hot paths; they take
//! explicit config values built from a `Settings` reference.

use std::sync::OnceLock;

use serde::Deserialize;

use crate::search::PurgeStrategy;

pub const DEFAULT_SETTINGS_TOML: &str = include_str!("default_settings.toml");

static CUSTOM_TOML: OnceLock<String> = OnceLock::new();

/// Set custom TOML before first `settings()` call.
pub fn init_custom(toml_content: String) -> Result<(), SettingsError> {
    parse_settings_toml(&toml_content)?;
    CUSTOM_TOML
        .set(toml_content)
        .map_err(|_| SettingsError::AlreadyInitialized)
}

/// Get or initialize the global settings singleton.
pub fn settings() -> &'static Settings {
    static INSTANCE: OnceLock<Settings> = OnceLock::new();
    INSTANCE.get_or_init(|| {
        let toml_str = CUSTOM_TOML
            .get()
            .map(|s| s.as_str())
            .unwrap_or(DEFAULT_SETTINGS_TOML);
        parse_settings_toml(toml_str).expect("settings TOML must be valid")
    })
}

/// Returns the embedded default settings TOML content.
pub fn default_toml() -> &'static str {
    DEFAULT_SETTINGS_TOML
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("TOML parse error: {0}")]
    Parse(String),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
    #[error("settings already initialized")]
    AlreadyInitialized,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub search: SearchSettings,
    pub active_list: ActiveListSettings,
    pub lookahead: LookaheadSettings,
    pub posterior: PosteriorSettings,
    pub nbest: NbestSettings,
    pub log_math: LogMathSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchSettings {
    pub absolute_beam_width: usize,
    pub relative_beam_width: f64,
    pub grow_skip_interval: usize,
    pub check_state_order: bool,
    pub build_word_lattice: bool,
    pub keep_all_tokens: bool,
    pub max_lattice_edges: usize,
    pub acoustic_lookahead_frames: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActiveListSettings {
    pub strategy: PurgeStrategy,
    pub max_paths_per_word: usize,
    pub max_filler_words: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LookaheadSettings {
    pub window: usize,
    pub weight: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PosteriorSettings {
    pub language_weight: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NbestSettings {
    pub max_frontier: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogMathSettings {
    pub log_base: f64,
}

pub fn parse_settings_toml(toml_str: &str) -> Result<Settings, SettingsError> {
    let s: Settings = toml::from_str(toml_str).map_err(|e| SettingsError::Parse(e.to_string()))?;
    validate(&s)?;
    Ok(s)
}

fn validate(s: &Settings) -> Result<(), SettingsError> {
    macro_rules! check_non_negative {
        ($section:ident . $field:ident) => {
            if s.$section.$field < 0.0 {
                return Err(SettingsError::InvalidValue {
                    field: concat!(stringify!($section), ".", stringify!($field)).to_string(),
                    reason: "must be non-negative".to_string(),
                });
            }
        };
    }
    macro_rules! check_positive_usize {
        ($section:ident . $field:ident) => {
            if s.$section.$field == 0 {
                return Err(SettingsError::InvalidValue {
                    field: concat!(stringify!($section), ".", stringify!($field)).to_string(),
                    reason: "must be positive".to_string(),
                });
            }
        };
    }

    if !(0.0..=1.0).contains(&s.search.relative_beam_width) {
        return Err(SettingsError::InvalidValue {
            field: "search.relative_beam_width".to_string(),
            reason: "must be a probability in [0, 1]".to_string(),
        });
    }
    check_non_negative!(search.acoustic_lookahead_frames);
    check_positive_usize!(search.max_lattice_edges);

    check_positive_usize!(lookahead.window);
    check_non_negative!(lookahead.weight);

    check_non_negative!(posterior.language_weight);
    check_positive_usize!(nbest.max_frontier);

    if s.log_math.log_base <= 1.0 {
        return Err(SettingsError::InvalidValue {
            field: "log_math.log_base".to_string(),
            reason: "must be greater than 1".to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_override(key: &str, value: &str) -> String {
        DEFAULT_SETTINGS_TOML
            .lines()
            .map(|line| {
                if line.starts_with(&format!("{key} =")) {
                    format!("{key} = {value}")
                } else {
                    line.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn parse_default_toml() {
        let s = parse_settings_toml(DEFAULT_SETTINGS_TOML).unwrap();
        assert_eq!(s.search.absolute_beam_width, 20000);
        assert!((s.search.relative_beam_width - 1e-80).abs() < 1e-90);
        assert_eq!(s.search.grow_skip_interval, 0);
        assert!(!s.search.check_state_order);
        assert!(s.search.build_word_lattice);
        assert!(!s.search.keep_all_tokens);
        assert_eq!(s.search.max_lattice_edges, 100);
        assert_eq!(s.active_list.strategy, PurgeStrategy::Partition);
        assert_eq!(s.active_list.max_filler_words, 1);
        assert_eq!(s.lookahead.window, 5);
        assert_eq!(s.nbest.max_frontier, 10000);
        assert!((s.log_math.log_base - 1.0001).abs() < f64::EPSILON);
    }

    #[test]
    fn parse_strategy_names() {
        let toml = with_override("strategy", "\"word\"");
        let s = parse_settings_toml(&toml).unwrap();
        assert_eq!(s.active_list.strategy, PurgeStrategy::Word);
    }

    #[test]
    fn error_unknown_strategy() {
        let toml = with_override("strategy", "\"heap\"");
        let err = parse_settings_toml(&toml).unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }

    #[test]
    fn error_relative_beam_out_of_range() {
        let toml = with_override("relative_beam_width", "2.0");
        let err = parse_settings_toml(&toml).unwrap_err();
        assert!(err.to_string().contains("search.relative_beam_width"));
    }

    #[test]
    fn error_log_base_too_small() {
        let toml = with_override("log_base", "1.0");
        let err = parse_settings_toml(&toml).unwrap_err();
        assert!(err.to_string().contains("log_math.log_base"));
    }

    #[test]
    fn error_zero_window() {
        let toml = with_override("window", "0");
        let err = parse_settings_toml(&toml).unwrap_err();
        assert!(err.to_string().contains("lookahead.window"));
    }

    #[test]
    fn error_negative_lookahead_frames() {
        let toml = with_override("acoustic_lookahead_frames", "-1.0");
        let err = parse_settings_toml(&toml).unwrap_err();
        assert!(err.to_string().contains("search.acoustic_lookahead_frames"));
    }

    #[test]
    fn error_invalid_toml() {
        let err = parse_settings_toml("not valid toml {{{").unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }

    #[test]
    fn error_missing_section() {
        let toml = r#"
[search]
absolute_beam_width = 10
"#;
        let err = parse_settings_toml(toml).unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }
}

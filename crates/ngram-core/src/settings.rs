//! Global settings loaded from TOML.
//!
//! - `init_custom(toml_content)` sets a custom TOML before first `settings()` call
//! - `settings()` returns `&'static Settings` (lazy-init singleton)
//! - Default values are embedded via `include_str!("default_settings.toml")`

use std::sync::OnceLock;

use serde::Deserialize;

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
///
/// The embedded defaults are validated by `build.rs` and by the tests, and a
/// custom document is validated by `init_custom`, so the parse here cannot fail.
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
    pub cache: CacheSettings,
    pub tokenizer: TokenizerSettings,
    pub features: FeatureSettings,
    pub factored: FactoredSettings,
    pub precision: PrecisionSettings,
    pub repetition: RepetitionSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    pub capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenizerSettings {
    #[serde(default)]
    pub replacement_sem_classes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeatureSettings {
    pub ngram_features: bool,
    pub log_prob_feature: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FactoredSettings {
    pub max_tokens_per_line: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrecisionSettings {
    pub order: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepetitionSettings {
    pub penalty: f64,
    pub older_count: f64,
    pub even_older_count: f64,
    pub oldest_count: f64,
    #[serde(default)]
    pub pos_to_use: Vec<String>,
    #[serde(default)]
    pub stems_to_ignore: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    pub file_name: String,
    pub rotation: LogRotation,
    pub default_filter: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Never,
    Daily,
    Hourly,
}

pub fn parse_settings_toml(toml_str: &str) -> Result<Settings, SettingsError> {
    let s: Settings = toml::from_str(toml_str).map_err(|e| SettingsError::Parse(e.to_string()))?;
    validate(&s)?;
    Ok(s)
}

fn validate(s: &Settings) -> Result<(), SettingsError> {
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

    macro_rules! check_non_negative_f64 {
        ($section:ident . $field:ident) => {
            if !(s.$section.$field.is_finite() && s.$section.$field >= 0.0) {
                return Err(SettingsError::InvalidValue {
                    field: concat!(stringify!($section), ".", stringify!($field)).to_string(),
                    reason: format!("must be finite and non-negative, got {}", s.$section.$field),
                });
            }
        };
    }

    check_positive_usize!(cache.capacity);
    check_positive_usize!(factored.max_tokens_per_line);
    check_positive_usize!(precision.order);
    check_non_negative_f64!(repetition.penalty);
    check_non_negative_f64!(repetition.older_count);
    check_non_negative_f64!(repetition.even_older_count);
    check_non_negative_f64!(repetition.oldest_count);

    // a spec line needs at least `child : numParents countfile lmfile`
    if s.factored.max_tokens_per_line < 5 {
        return Err(SettingsError::InvalidValue {
            field: "factored.max_tokens_per_line".to_string(),
            reason: "must be at least 5".to_string(),
        });
    }
    for (field, value) in [
        ("logging.file_name", &s.logging.file_name),
        ("logging.default_filter", &s.logging.default_filter),
    ] {
        if value.trim().is_empty() {
            return Err(SettingsError::InvalidValue {
                field: field.to_string(),
                reason: "must not be empty".to_string(),
            });
        }
    }
    if let Some(class) = s
        .tokenizer
        .replacement_sem_classes
        .iter()
        .find(|c| c.trim().is_empty())
    {
        return Err(SettingsError::InvalidValue {
            field: "tokenizer.replacement_sem_classes".to_string(),
            reason: format!("empty class name {class:?}"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_default_settings() {
        let s = parse_settings_toml(DEFAULT_SETTINGS_TOML).unwrap();
        assert_eq!(s.cache.capacity, 4096);
        assert_eq!(s.factored.max_tokens_per_line, 64);
        assert!(s.features.ngram_features);
        assert!(s.features.log_prob_feature);
        assert_eq!(s.precision.order, 4);
        assert_eq!(s.repetition.penalty, 1.0);
        assert_eq!(s.repetition.oldest_count, 0.125);
        assert!(s.repetition.pos_to_use.iter().any(|p| p == "NNP"));
        assert_eq!(s.repetition.stems_to_ignore, vec!["do", "not"]);
        assert_eq!(s.logging.file_name, "ngram-trace.jsonl");
        assert_eq!(s.logging.rotation, LogRotation::Never);
        assert!(s
            .tokenizer
            .replacement_sem_classes
            .iter()
            .any(|c| c == "date"));
    }

    #[test]
    fn parse_custom_settings() {
        let toml = r#"
[cache]
capacity = 16

[tokenizer]
replacement_sem_classes = ["city"]

[features]
ngram_features = false
log_prob_feature = true

[factored]
max_tokens_per_line = 32

[precision]
order = 4

[repetition]
penalty = 1.0
older_count = 0.5
even_older_count = 0.25
oldest_count = 0.125

[logging]
file_name = "trace.jsonl"
rotation = "daily"
default_filter = "ngram_core=info"
"#;
        let s = parse_settings_toml(toml).unwrap();
        assert_eq!(s.cache.capacity, 16);
        assert_eq!(s.tokenizer.replacement_sem_classes, vec!["city".to_string()]);
        assert!(!s.features.ngram_features);
        assert_eq!(s.factored.max_tokens_per_line, 32);
        assert_eq!(s.logging.rotation, LogRotation::Daily);
        assert_eq!(s.logging.default_filter, "ngram_core=info");
    }

    #[test]
    fn replacement_classes_default_to_empty() {
        let toml = r#"
[cache]
capacity = 16

[tokenizer]

[features]
ngram_features = true
log_prob_feature = true

[factored]
max_tokens_per_line = 64

[precision]
order = 4

[repetition]
penalty = 1.0
older_count = 0.5
even_older_count = 0.25
oldest_count = 0.125

[logging]
file_name = "trace.jsonl"
rotation = "daily"
default_filter = "ngram_core=info"
"#;
        let s = parse_settings_toml(toml).unwrap();
        assert!(s.tokenizer.replacement_sem_classes.is_empty());
    }

    #[test]
    fn error_zero_capacity() {
        let toml = r#"
[cache]
capacity = 0

[tokenizer]
replacement_sem_classes = []

[features]
ngram_features = true
log_prob_feature = true

[factored]
max_tokens_per_line = 64

[precision]
order = 4

[repetition]
penalty = 1.0
older_count = 0.5
even_older_count = 0.25
oldest_count = 0.125

[logging]
file_name = "trace.jsonl"
rotation = "daily"
default_filter = "ngram_core=info"
"#;
        let err = parse_settings_toml(toml).unwrap_err();
        assert!(matches!(err, SettingsError::InvalidValue { .. }));
        assert!(err.to_string().contains("cache.capacity"));
    }

    #[test]
    fn error_short_spec_lines() {
        let toml = r#"
[cache]
capacity = 8

[tokenizer]
replacement_sem_classes = []

[features]
ngram_features = true
log_prob_feature = true

[factored]
max_tokens_per_line = 3

[precision]
order = 4

[repetition]
penalty = 1.0
older_count = 0.5
even_older_count = 0.25
oldest_count = 0.125

[logging]
file_name = "trace.jsonl"
rotation = "daily"
default_filter = "ngram_core=info"
"#;
        let err = parse_settings_toml(toml).unwrap_err();
        assert!(err.to_string().contains("factored.max_tokens_per_line"));
    }

    #[test]
    fn error_blank_sem_class() {
        let toml = r#"
[cache]
capacity = 8

[tokenizer]
replacement_sem_classes = ["date", " "]

[features]
ngram_features = true
log_prob_feature = true

[factored]
max_tokens_per_line = 64

[precision]
order = 4

[repetition]
penalty = 1.0
older_count = 0.5
even_older_count = 0.25
oldest_count = 0.125

[logging]
file_name = "trace.jsonl"
rotation = "daily"
default_filter = "ngram_core=info"
"#;
        let err = parse_settings_toml(toml).unwrap_err();
        assert!(err.to_string().contains("tokenizer.replacement_sem_classes"));
    }

    #[test]
    fn error_negative_repetition_penalty() {
        let toml = r#"
[cache]
capacity = 8

[tokenizer]

[features]
ngram_features = true
log_prob_feature = true

[factored]
max_tokens_per_line = 64

[precision]
order = 2

[repetition]
penalty = -1.0
older_count = 0.5
even_older_count = 0.25
oldest_count = 0.125

[logging]
file_name = "trace.jsonl"
rotation = "daily"
default_filter = "ngram_core=info"
"#;
        let err = parse_settings_toml(toml).unwrap_err();
        assert!(err.to_string().contains("repetition.penalty"));
    }

    #[test]
    fn error_unknown_rotation() {
        let toml = DEFAULT_SETTINGS_TOML.replace(r#"rotation = "never""#, r#"rotation = "weekly""#);
        let err = parse_settings_toml(&toml).unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }

    #[test]
    fn error_empty_log_file_name() {
        let toml = DEFAULT_SETTINGS_TOML.replace(
            r#"file_name = "ngram-trace.jsonl""#,
            r#"file_name = """#,
        );
        let err = parse_settings_toml(&toml).unwrap_err();
        assert!(err.to_string().contains("logging.file_name"));
    }

    #[test]
    fn error_invalid_toml() {
        let err = parse_settings_toml("not valid toml {{{").unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }

    #[test]
    fn error_missing_section() {
        let toml = r#"
[cache]
capacity = 8
"#;
        let err = parse_settings_toml(toml).unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }
}

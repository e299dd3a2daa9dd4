//! Tunables for a [`FormValidator`](crate::validator::FormValidator).
//!
//! Every struct here deserializes with `#[serde(default)]`, so a host can
//! ship a partial JSON document and inherit the rest:
//!
//! ```ignore
//! let options = ValidatorOptions::from_json(r#"{
//!     "debouncing": { "criticalDelay": 100 },
//!     "buttonStrategy": "lenient"
//! }"#)?;
//! ```
//!
//! Delays are whole milliseconds.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::FieldConfig;
use crate::error::ConfigError;
use crate::priority::{FieldPriority, ValidationMode};

/// Policy for the submit button.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonStrategy {
    Strict,
    #[default]
    Progressive,
    Lenient,
    Smart,
}

/// Options for the whole validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValidatorOptions {
    pub field_configs: Vec<FieldConfig>,
    pub smart_empty_handling: bool,
    pub progressive_validation: bool,
    pub debounce_validation: bool,
    pub context_aware: bool,
    pub validation_mode: ValidationMode,
    pub button_strategy: ButtonStrategy,
    pub debouncing: DebounceOptions,
    pub context_awareness: ContextAwareOptions,
    pub empty_fields: SmartEmptyOptions,
    pub progressive: ProgressiveOptions,
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        Self {
            field_configs: Vec::new(),
            smart_empty_handling: true,
            progressive_validation: true,
            debounce_validation: true,
            context_aware: true,
            validation_mode: ValidationMode::default(),
            button_strategy: ButtonStrategy::default(),
            debouncing: DebounceOptions::default(),
            context_awareness: ContextAwareOptions::default(),
            empty_fields: SmartEmptyOptions::default(),
            progressive: ProgressiveOptions::default(),
        }
    }
}

impl ValidatorOptions {
    /// Parse options from JSON; missing keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Debounce timing per priority tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DebounceOptions {
    pub default_delay: u64,
    pub critical_delay: u64,
    pub important_delay: u64,
    pub optional_delay: u64,
    pub max_delay: u64,
    pub min_delay: u64,
    /// Shorten the delay as a field sees more interactions.
    pub adaptive_delays: bool,
    /// Lower bound of the adaptive multiplier.
    pub frequency_factor: f64,
}

impl Default for DebounceOptions {
    fn default() -> Self {
        Self {
            default_delay: 300,
            critical_delay: 150,
            important_delay: 300,
            optional_delay: 500,
            max_delay: 1000,
            min_delay: 50,
            adaptive_delays: true,
            frequency_factor: 0.8,
        }
    }
}

impl DebounceOptions {
    /// Base delay for a tier; `None` means the field has no known tier.
    pub fn base_delay(&self, priority: Option<FieldPriority>) -> Duration {
        let ms = match priority {
            Some(FieldPriority::Critical) => self.critical_delay,
            Some(FieldPriority::Important) => self.important_delay,
            Some(FieldPriority::Optional) => self.optional_delay,
            None => self.default_delay,
        };
        Duration::from_millis(ms)
    }
}

/// Behaviour learning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContextAwareOptions {
    pub enable_learning: bool,
    /// Events needed before the first pattern analysis.
    pub min_interactions_for_adaptation: usize,
    pub adaptive_validation_timing: bool,
    pub smart_field_prioritization: bool,
    pub predictive_validation: bool,
    /// Delay used before any pattern is known.
    pub base_delay: u64,
}

impl Default for ContextAwareOptions {
    fn default() -> Self {
        Self {
            enable_learning: true,
            min_interactions_for_adaptation: 10,
            adaptive_validation_timing: true,
            smart_field_prioritization: true,
            predictive_validation: true,
            base_delay: 300,
        }
    }
}

/// A value per priority tier, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierDelays {
    pub critical: u64,
    pub important: u64,
    pub optional: u64,
}

impl TierDelays {
    pub fn get(&self, priority: FieldPriority) -> Duration {
        Duration::from_millis(match priority {
            FieldPriority::Critical => self.critical,
            FieldPriority::Important => self.important,
            FieldPriority::Optional => self.optional,
        })
    }
}

/// Patience for empty fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SmartEmptyOptions {
    /// Show required errors as soon as an empty field is touched.
    pub immediate_required_validation: bool,
    /// Wait after a field is cleared before complaining.
    pub clear_delays: TierDelays,
    /// Wait after a field is first touched before complaining.
    pub grace_periods: TierDelays,
}

impl Default for SmartEmptyOptions {
    fn default() -> Self {
        Self {
            immediate_required_validation: false,
            clear_delays: TierDelays {
                critical: 500,
                important: 1000,
                optional: 2000,
            },
            grace_periods: TierDelays {
                critical: 1000,
                important: 1500,
                optional: 3000,
            },
        }
    }
}

/// Progressive disclosure thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProgressiveOptions {
    /// How long an important field must have been failing before it shows.
    pub interaction_threshold: u64,
    /// Non-critical errors stop showing once this many are on screen.
    pub max_visible_errors: usize,
    /// Smart button: interactions below which the button stays enabled.
    pub smart_interaction_window: u32,
    /// Smart button: quiet time below which the button stays enabled.
    pub smart_time_window: u64,
}

impl Default for ProgressiveOptions {
    fn default() -> Self {
        Self {
            interaction_threshold: 1000,
            max_visible_errors: 3,
            smart_interaction_window: 3,
            smart_time_window: 5000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let options = ValidatorOptions::from_json(
            r#"{ "debouncing": { "criticalDelay": 100 }, "buttonStrategy": "lenient" }"#,
        )
        .unwrap();
        assert_eq!(options.debouncing.critical_delay, 100);
        assert_eq!(options.debouncing.optional_delay, 500);
        assert_eq!(options.button_strategy, ButtonStrategy::Lenient);
        assert!(options.smart_empty_handling);
    }

    #[test]
    fn test_bad_json_is_config_error() {
        assert!(matches!(
            ValidatorOptions::from_json("{ nope"),
            Err(ConfigError::Parse(_))
        ));
    }
}

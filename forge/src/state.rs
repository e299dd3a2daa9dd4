//! Per-field and whole-form validation snapshots.
//!
//! Both are rebuilt from scratch every cycle; nothing here is patched in
//! place across cycles.

use indexmap::IndexMap;

use crate::empty::EmptyType;
use crate::priority::{ErrorSeverity, FieldPriority, ValidationPhase};

/// Extra per-field facts carried alongside the validation outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMetadata {
    /// Empty-state classification, when the field was empty.
    pub empty_type: Option<EmptyType>,
    /// Times the field went from filled to empty.
    pub clear_count: u32,
    /// Effective priority is above the configured one.
    pub priority_upgraded: bool,
    /// Middleware that contributed to this state, in execution order.
    pub middleware: Vec<String>,
    /// A middleware asked to skip validation this cycle.
    pub validation_skipped: bool,
}

/// One field in one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldValidationState {
    pub is_valid: bool,
    pub is_empty: bool,
    pub is_touched: bool,
    pub is_validating: bool,
    pub is_required: bool,
    /// Effective priority for this cycle.
    pub priority: FieldPriority,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub should_show_error: bool,
    pub validation_state: ValidationPhase,
    pub error_severity: ErrorSeverity,
    pub metadata: FieldMetadata,
}

impl FieldValidationState {
    pub fn first_error(&self) -> Option<&str> {
        self.errors.first().map(String::as_str)
    }

    /// The message to render, if any.
    pub fn visible_error(&self) -> Option<&str> {
        if self.should_show_error {
            self.first_error()
        } else {
            None
        }
    }

    /// Hide the error for this cycle.
    pub fn hide_error(&mut self) {
        self.should_show_error = false;
        self.error_severity = ErrorSeverity::None;
    }
}

/// Whole-form aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct EnhancedValidationState {
    /// Every tier is valid.
    pub is_valid: bool,
    /// Critical and important tiers are valid.
    pub is_partially_valid: bool,
    pub critical_fields_valid: bool,
    pub important_fields_valid: bool,
    pub optional_fields_valid: bool,
    pub has_empty_required_fields: bool,
    pub has_untouched_required_fields: bool,
    /// Priority-weighted share of valid fields, 0 to 100.
    pub validation_progress: f64,
    /// Field states in declaration order.
    pub field_states: IndexMap<String, FieldValidationState>,
}

impl Default for EnhancedValidationState {
    fn default() -> Self {
        Self::from_fields(IndexMap::new())
    }
}

impl EnhancedValidationState {
    /// Aggregate a set of field states.
    pub fn from_fields(field_states: IndexMap<String, FieldValidationState>) -> Self {
        let tier_valid = |tier: FieldPriority| {
            field_states
                .values()
                .filter(|s| s.priority == tier)
                .all(|s| s.is_valid)
        };
        let critical_fields_valid = tier_valid(FieldPriority::Critical);
        let important_fields_valid = tier_valid(FieldPriority::Important);
        let optional_fields_valid = tier_valid(FieldPriority::Optional);

        let total: u32 = field_states.values().map(|s| s.priority.weight()).sum();
        let valid: u32 = field_states
            .values()
            .filter(|s| s.is_valid)
            .map(|s| s.priority.weight())
            .sum();
        let validation_progress = if total == 0 {
            100.0
        } else {
            (f64::from(valid) / f64::from(total) * 100.0).clamp(0.0, 100.0)
        };

        let is_partially_valid = critical_fields_valid && important_fields_valid;
        Self {
            is_valid: is_partially_valid && optional_fields_valid,
            is_partially_valid,
            critical_fields_valid,
            important_fields_valid,
            optional_fields_valid,
            has_empty_required_fields: field_states
                .values()
                .any(|s| s.is_required && s.is_empty),
            has_untouched_required_fields: field_states
                .values()
                .any(|s| s.is_required && !s.is_touched),
            validation_progress,
            field_states,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldValidationState> {
        self.field_states.get(name)
    }

    /// Fields currently displaying an error, with the message shown.
    pub fn visible_errors(&self) -> Vec<(&str, &str)> {
        self.field_states
            .iter()
            .filter_map(|(name, s)| s.visible_error().map(|msg| (name.as_str(), msg)))
            .collect()
    }

    /// Unweighted share of valid fields, 0 to 100.
    pub fn simple_progress(&self) -> f64 {
        if self.field_states.is_empty() {
            return 100.0;
        }
        let valid = self.field_states.values().filter(|s| s.is_valid).count();
        valid as f64 / self.field_states.len() as f64 * 100.0
    }

    /// First invalid field, scanning critical, then important, then optional.
    pub fn next_field_to_focus(&self) -> Option<&str> {
        FieldPriority::TIERS.iter().find_map(|&tier| {
            self.field_states
                .iter()
                .find(|(_, s)| s.priority == tier && !s.is_valid)
                .map(|(name, _)| name.as_str())
        })
    }
}

//! Smart handling of empty fields.
//!
//! An empty required field is not always a mistake. The classifier tells
//! apart a field the user has not reached yet, one they are clearing
//! mid-edit, and one they left empty, and waits longer before complaining
//! about less important fields.
//!
//! Precedence for an empty field:
//!
//! 1. never touched and never filled: [`EmptyType::Untouched`], hidden
//! 2. filled before, empty now: [`EmptyType::Cleared`], shown once the
//!    clear delay has passed (or after a submit attempt) if required
//! 3. touched and required: [`EmptyType::InvalidEmpty`], shown once the
//!    grace period since first touch has passed, immediately after a submit
//!    attempt or when immediate validation is on
//! 4. touched, not required: [`EmptyType::ValidEmpty`], hidden
//!
//! Filled fields classify as [`EmptyType::ValidEmpty`] with `is_empty` false.

use std::time::Instant;

use serde_json::Value;

use crate::config::FieldConfig;
use crate::context::ValidationContext;
use crate::form::is_empty_value;
use crate::history::InteractionHistory;
use crate::options::SmartEmptyOptions;
use crate::priority::{ErrorSeverity, FieldPriority};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmptyType {
    Untouched,
    Cleared,
    InvalidEmpty,
    ValidEmpty,
}

/// Classification of one field in one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmptyFieldState {
    pub is_empty: bool,
    pub is_untouched: bool,
    pub is_required: bool,
    pub should_show_error: bool,
    pub empty_type: EmptyType,
    pub priority: FieldPriority,
}

impl EmptyFieldState {
    pub fn severity(&self) -> ErrorSeverity {
        severity_for(self.empty_type, self.priority, self.should_show_error)
    }
}

/// Severity of an empty-field error.
pub fn severity_for(empty_type: EmptyType, priority: FieldPriority, shown: bool) -> ErrorSeverity {
    if !shown {
        return ErrorSeverity::None;
    }
    match (empty_type, priority) {
        (EmptyType::InvalidEmpty, FieldPriority::Critical) => ErrorSeverity::Error,
        (EmptyType::InvalidEmpty, _) => ErrorSeverity::Warning,
        (EmptyType::Cleared, FieldPriority::Critical) => ErrorSeverity::Warning,
        (EmptyType::Cleared, _) => ErrorSeverity::Info,
        _ => ErrorSeverity::Info,
    }
}

#[derive(Debug, Clone, Default)]
pub struct SmartEmptyClassifier {
    options: SmartEmptyOptions,
}

impl SmartEmptyClassifier {
    pub fn new(options: SmartEmptyOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SmartEmptyOptions {
        &self.options
    }

    /// Classify a field and update its emptiness history.
    ///
    /// `priority` is the field's effective priority for this cycle.
    #[allow(clippy::too_many_arguments)]
    pub fn classify(
        &self,
        config: &FieldConfig,
        priority: FieldPriority,
        value: Option<&Value>,
        touched: bool,
        context: &ValidationContext,
        history: &mut InteractionHistory,
        now: Instant,
    ) -> EmptyFieldState {
        let is_empty = value.is_none_or(is_empty_value);
        let record = history.field_mut(&config.name);
        if touched && record.touched_at.is_none() {
            record.touched_at = Some(now);
        }

        let mut state = EmptyFieldState {
            is_empty,
            is_untouched: !touched,
            is_required: config.required,
            should_show_error: false,
            empty_type: EmptyType::ValidEmpty,
            priority,
        };

        if !is_empty {
            record.was_non_empty = true;
            record.empty_since = None;
            return state;
        }

        if record.was_non_empty && record.empty_since.is_none() {
            record.empty_since = Some(now);
            record.clear_count += 1;
            record.last_cleared = Some(now);
        }

        let submitted = context.submission_attempted;
        if !touched && !record.was_non_empty {
            state.empty_type = EmptyType::Untouched;
        } else if record.was_non_empty {
            state.empty_type = EmptyType::Cleared;
            let elapsed = record
                .empty_since
                .map(|since| now.saturating_duration_since(since))
                .unwrap_or_default();
            state.should_show_error = config.required
                && (submitted || elapsed > self.options.clear_delays.get(priority));
        } else if config.required {
            state.empty_type = EmptyType::InvalidEmpty;
            let immediate = self.options.immediate_required_validation || config.validate_on_empty;
            let elapsed = record
                .touched_at
                .map(|at| now.saturating_duration_since(at))
                .unwrap_or_default();
            state.should_show_error =
                submitted || immediate || elapsed > self.options.grace_periods.get(priority);
        } else {
            state.empty_type = EmptyType::ValidEmpty;
        }

        log::trace!(
            "[empty] '{}' classified {:?} (show: {})",
            config.name,
            state.empty_type,
            state.should_show_error
        );
        state
    }

    /// Times the field has been cleared so far.
    pub fn clear_count(&self, history: &InteractionHistory, field: &str) -> u32 {
        history.field(field).map_or(0, |f| f.clear_count)
    }
}

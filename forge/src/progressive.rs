//! Progressive disclosure of validation errors.
//!
//! Turns raw per-field errors into [`FieldValidationState`]s and decides,
//! field by field, whether an error is shown yet:
//!
//! - critical, touched, invalid: shown at once as an error
//! - important, touched, invalid: shown as a warning once the field has been
//!   touched for the interaction threshold
//! - optional, invalid: shown as info after a submit attempt, or when
//!   touched in `onBlur` mode
//! - after a submit attempt every invalid field shows with its tier's
//!   severity
//! - empty fields defer to the [`SmartEmptyClassifier`]
//! - once `max_visible_errors` fields are showing, further non-critical
//!   errors are held back (their messages move to `warnings`)

use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};

use indexmap::IndexMap;

use crate::config::{FieldConfig, FieldConfigRegistry};
use crate::context::ValidationContext;
use crate::empty::{EmptyType, SmartEmptyClassifier, severity_for};
use crate::form::{FormSnapshot, is_empty_value};
use crate::history::InteractionHistory;
use crate::options::ProgressiveOptions;
use crate::priority::{ErrorSeverity, FieldPriority, ValidationMode, ValidationPhase};
use crate::state::{EnhancedValidationState, FieldMetadata, FieldValidationState};

/// Message used when a required field is empty and the container reported
/// nothing.
pub const REQUIRED_MESSAGE: &str = "This field is required";

/// Everything a cycle reads besides the registry and history.
#[derive(Debug, Clone, Copy)]
pub struct CycleInputs<'a> {
    pub snapshot: &'a FormSnapshot,
    pub context: &'a ValidationContext,
    /// Learned priority upgrades; never lower a field.
    pub priority_overrides: &'a HashMap<String, FieldPriority>,
    pub now: Instant,
}

#[derive(Debug, Clone, Copy)]
struct DisclosureRecord {
    first_seen: Instant,
    touched_since: Option<Instant>,
    last_valid: bool,
}

#[derive(Debug, Clone)]
pub struct ProgressiveValidator {
    options: ProgressiveOptions,
    progressive: bool,
    classifier: Option<SmartEmptyClassifier>,
    records: HashMap<String, DisclosureRecord>,
}

impl ProgressiveValidator {
    /// `classifier` is `None` when smart empty handling is off.
    pub fn new(
        options: ProgressiveOptions,
        progressive: bool,
        classifier: Option<SmartEmptyClassifier>,
    ) -> Self {
        Self {
            options,
            progressive,
            classifier,
            records: HashMap::new(),
        }
    }

    pub fn is_progressive(&self) -> bool {
        self.progressive
    }

    /// When the field first appeared in a cycle and whether it was valid last
    /// time.
    pub fn field_record(&self, field: &str) -> Option<(Instant, bool)> {
        self.records.get(field).map(|r| (r.first_seen, r.last_valid))
    }

    pub fn reset(&mut self) {
        self.records.clear();
    }

    /// Run one cycle over every known field.
    pub fn validate_progressively(
        &mut self,
        registry: &mut FieldConfigRegistry,
        history: &mut InteractionHistory,
        inputs: CycleInputs<'_>,
    ) -> EnhancedValidationState {
        let names = field_names(registry, inputs.snapshot);
        let mut field_states = IndexMap::with_capacity(names.len());
        for name in names {
            let config = registry.get_or_create(&name).clone();
            let state = if self.progressive {
                self.progressive_state(&config, history, &inputs)
            } else {
                strict_state(&config, &inputs)
            };
            field_states.insert(name, state);
        }
        if self.progressive {
            self.apply_visibility_cap(&mut field_states);
        }
        EnhancedValidationState::from_fields(field_states)
    }

    fn progressive_state(
        &mut self,
        config: &FieldConfig,
        history: &mut InteractionHistory,
        inputs: &CycleInputs<'_>,
    ) -> FieldValidationState {
        let mut state = base_state(config, inputs);
        let now = inputs.now;
        let context = inputs.context;
        let submitted = context.submission_attempted;

        let record = self
            .records
            .entry(config.name.clone())
            .or_insert(DisclosureRecord {
                first_seen: now,
                touched_since: None,
                last_valid: state.is_valid,
            });
        if state.is_touched && record.touched_since.is_none() {
            record.touched_since = Some(now);
        }
        record.last_valid = state.is_valid;
        let touched_for = record
            .touched_since
            .map(|at| now.saturating_duration_since(at))
            .unwrap_or_default();

        if !state.is_valid {
            let (show, severity) = if submitted {
                (true, tier_severity(state.priority))
            } else {
                match state.priority {
                    FieldPriority::Critical => (state.is_touched, ErrorSeverity::Error),
                    FieldPriority::Important => {
                        let threshold = Duration::from_millis(self.options.interaction_threshold);
                        (state.is_touched && touched_for > threshold, ErrorSeverity::Warning)
                    }
                    FieldPriority::Optional => (
                        state.is_touched && context.validation_mode == ValidationMode::OnBlur,
                        ErrorSeverity::Info,
                    ),
                }
            };
            state.should_show_error = show;
            state.error_severity = if show { severity } else { ErrorSeverity::None };
        }

        if state.is_empty {
            if let Some(classifier) = &self.classifier {
                let empty = classifier.classify(
                    config,
                    state.priority,
                    inputs.snapshot.value(&config.name),
                    state.is_touched,
                    context,
                    history,
                    now,
                );
                state.metadata.empty_type = Some(empty.empty_type);
                state.should_show_error = empty.should_show_error;
                state.error_severity = empty.severity();
                if submitted && !state.is_valid && !state.should_show_error {
                    state.should_show_error = true;
                    state.error_severity =
                        severity_for(EmptyType::InvalidEmpty, state.priority, true);
                }
                if state.is_valid {
                    state.hide_error();
                }
            }
        } else if let Some(classifier) = &self.classifier {
            // Keeps the filled/cleared bookkeeping current.
            classifier.classify(
                config,
                state.priority,
                inputs.snapshot.value(&config.name),
                state.is_touched,
                context,
                history,
                now,
            );
        }
        state.metadata.clear_count = history.field(&config.name).map_or(0, |f| f.clear_count);

        state.validation_state = phase(&state, submitted);
        state
    }

    fn apply_visibility_cap(&self, field_states: &mut IndexMap<String, FieldValidationState>) {
        let mut visible = 0;
        for state in field_states.values_mut() {
            if !state.should_show_error {
                continue;
            }
            if state.priority != FieldPriority::Critical
                && visible >= self.options.max_visible_errors
            {
                state.hide_error();
                state.warnings.extend(state.errors.iter().cloned());
                continue;
            }
            visible += 1;
        }
    }
}

/// Fields for a cycle: configured ones in declaration order, then anything
/// else the container mentions, sorted.
fn field_names(registry: &FieldConfigRegistry, snapshot: &FormSnapshot) -> Vec<String> {
    let mut names: Vec<String> = registry.names().map(str::to_string).collect();
    let extra: BTreeSet<&String> = snapshot
        .errors
        .keys()
        .chain(snapshot.touched.iter())
        .chain(snapshot.validating.iter())
        .filter(|name| !registry.contains(name))
        .collect();
    names.extend(extra.into_iter().cloned());
    names
}

fn base_state(config: &FieldConfig, inputs: &CycleInputs<'_>) -> FieldValidationState {
    let snapshot = inputs.snapshot;
    let name = &config.name;
    let priority = match inputs.priority_overrides.get(name) {
        Some(&upgrade) => config.priority.at_least(upgrade),
        None => config.priority,
    };
    let is_empty = snapshot.value(name).is_none_or(is_empty_value);
    let mut errors = snapshot.messages(name);
    if config.required && is_empty && errors.is_empty() {
        errors.push(REQUIRED_MESSAGE.to_string());
    }
    FieldValidationState {
        is_valid: errors.is_empty(),
        is_empty,
        is_touched: snapshot.is_touched(name),
        is_validating: snapshot.is_validating(name),
        is_required: config.required,
        priority,
        errors,
        warnings: Vec::new(),
        should_show_error: false,
        validation_state: ValidationPhase::Pending,
        error_severity: ErrorSeverity::None,
        metadata: FieldMetadata {
            priority_upgraded: priority > config.priority,
            ..Default::default()
        },
    }
}

/// Raw errors, no disclosure rules.
fn strict_state(config: &FieldConfig, inputs: &CycleInputs<'_>) -> FieldValidationState {
    let mut state = base_state(config, inputs);
    state.should_show_error = !state.is_valid;
    state.error_severity = if state.is_valid {
        ErrorSeverity::None
    } else {
        ErrorSeverity::Error
    };
    state.validation_state = if state.is_validating {
        ValidationPhase::Validating
    } else if state.is_valid {
        ValidationPhase::Valid
    } else {
        ValidationPhase::Invalid
    };
    state
}

/// Severity an invalid field shows with at its tier.
pub(crate) fn tier_severity(priority: FieldPriority) -> ErrorSeverity {
    match priority {
        FieldPriority::Critical => ErrorSeverity::Error,
        FieldPriority::Important => ErrorSeverity::Warning,
        FieldPriority::Optional => ErrorSeverity::Info,
    }
}

fn phase(state: &FieldValidationState, submitted: bool) -> ValidationPhase {
    if state.is_validating {
        ValidationPhase::Validating
    } else if !state.is_touched && !submitted {
        ValidationPhase::Pending
    } else if state.is_valid {
        ValidationPhase::Valid
    } else {
        ValidationPhase::Invalid
    }
}

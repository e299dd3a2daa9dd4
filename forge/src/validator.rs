//! The validation orchestrator.
//!
//! [`FormValidator`] owns one form instance's engine state: field configs,
//! session context, progressive validator, adaptation engine, middleware and
//! debouncer. A cycle reads a [`FormSnapshot`] from the container, runs the
//! progressive validator, passes every field through the middleware
//! pipeline, stores the resulting [`EnhancedValidationState`] and writes the
//! overall-valid flag back to the container when it changed.
//!
//! # Example
//!
//! ```ignore
//! let form = FormState::new();
//! let validator = FormValidator::builder()
//!     .field(FieldConfig::new("email").critical().required())
//!     .build();
//!
//! form.set_value("email", json!("ada@example.com"));
//! form.touch("email");
//! validator.handle_event(&form, "email", InteractionKind::Change);
//! // ... later, once the debounce window has passed:
//! let button = validator.button_state();
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use futures::FutureExt;
use serde_json::Value;

use crate::adaptive::{ContextAwareEngine, FieldPrediction, UserInteractionPattern};
use crate::clock::{SharedClock, system_clock};
use crate::config::{DEFAULT_DEBOUNCE_MS, FieldConfig, FieldConfigRegistry};
use crate::context::{ContextUpdate, ValidationContext};
use crate::debounce::{DebounceStats, ValidationDebouncer};
use crate::empty::SmartEmptyClassifier;
use crate::error::{AsyncValidationError, FieldError, extract_panic_message};
use crate::form::{AsyncOutcome, FormSnapshot, FormStore};
use crate::history::{FieldHistory, InteractionKind};
use crate::middleware::{
    MiddlewareConfig, MiddlewareContext, MiddlewareExecution, MiddlewareManager, PipelineOutcome,
    ValidationMiddleware,
};
use crate::options::{ButtonStrategy, ValidatorOptions};
use crate::priority::{ErrorSeverity, FieldPriority, ValidationMode, ValidationPhase};
use crate::progressive::{CycleInputs, ProgressiveValidator, tier_severity};
use crate::state::{EnhancedValidationState, FieldValidationState};

/// Error shown when an async validator rejects or panics.
pub const ASYNC_FALLBACK_MESSAGE: &str = "Validation could not be completed";

const STRICT_MESSAGE: &str = "Please fix all errors before submitting";
const CRITICAL_MESSAGE: &str = "Complete critical fields";
const OPTIONAL_MESSAGE: &str = "Some optional fields need attention";

// ============================================================================
// Button policy
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ButtonVariant {
    #[default]
    Default,
    Warning,
    Success,
}

/// What the submit button should look like.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ButtonValidationState {
    pub disabled: bool,
    pub variant: ButtonVariant,
    pub message: Option<String>,
}

impl ButtonValidationState {
    fn enabled(variant: ButtonVariant) -> Self {
        Self {
            disabled: false,
            variant,
            message: None,
        }
    }

    fn blocked(message: &str) -> Self {
        Self {
            disabled: true,
            variant: ButtonVariant::Default,
            message: Some(message.to_string()),
        }
    }

    fn with_message(mut self, message: &str) -> Self {
        self.message = Some(message.to_string());
        self
    }
}

// ============================================================================
// Submit and async results
// ============================================================================

/// Result of [`FormValidator::submit`].
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitOutcome {
    /// The form is valid enough to submit.
    pub accepted: bool,
    pub state: EnhancedValidationState,
    /// Where to send the user when rejected.
    pub focus: Option<String>,
}

/// Identifies one async validation run for a field.
///
/// Starting a newer run for the same field makes older tickets stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationTicket {
    pub field: String,
    pub generation: u64,
}

// ============================================================================
// Validator
// ============================================================================

struct ValidatorInner {
    options: ValidatorOptions,
    registry: FieldConfigRegistry,
    context: ValidationContext,
    progressive: ProgressiveValidator,
    adaptive: ContextAwareEngine,
    middleware: MiddlewareManager,
    state: EnhancedValidationState,
    generations: HashMap<String, u64>,
    validating: HashSet<String>,
    async_errors: HashMap<String, Vec<String>>,
    custom_delays: HashMap<String, Duration>,
}

impl ValidatorInner {
    fn effective_priority(&mut self, field: &str) -> FieldPriority {
        let base = self.registry.get_or_create(field).priority;
        if self.options.context_aware {
            self.adaptive.adaptive_field_priority(field, base)
        } else {
            base
        }
    }

    /// Debounce base for a field: middleware hint, learned delay, then an
    /// explicit per-field delay. `None` means the tier delay.
    fn debounce_base(&mut self, field: &str) -> Option<Duration> {
        if let Some(&delay) = self.custom_delays.get(field) {
            return Some(delay);
        }
        if self.options.context_aware
            && let Some(delay) = self.adaptive.field_delay(field)
        {
            return Some(delay);
        }
        let explicit = !self.registry.is_inferred(field);
        let config = self.registry.get_or_create(field);
        (explicit && config.debounce_ms != DEFAULT_DEBOUNCE_MS)
            .then(|| Duration::from_millis(config.debounce_ms))
    }

    fn decorate(&self, mut snapshot: FormSnapshot) -> FormSnapshot {
        snapshot.validating.extend(self.validating.iter().cloned());
        for (field, messages) in &self.async_errors {
            snapshot
                .errors
                .entry(field.clone())
                .or_default()
                .extend(messages.iter().map(|m| FieldError::new(field, "async", m)));
        }
        snapshot
    }

    fn run_cycle(&mut self, snapshot: &FormSnapshot, now: Instant) -> EnhancedValidationState {
        let overrides = if self.options.context_aware {
            self.adaptive.priority_adjustments().clone()
        } else {
            HashMap::new()
        };
        let context = self.context.clone();
        let mut state = self.progressive.validate_progressively(
            &mut self.registry,
            self.adaptive.history_mut(),
            CycleInputs {
                snapshot,
                context: &context,
                priority_overrides: &overrides,
                now,
            },
        );

        if !self.middleware.is_empty() {
            state = self.apply_pipeline(state, snapshot, &context, now);
        }
        self.state = state.clone();
        state
    }

    fn apply_pipeline(
        &mut self,
        state: EnhancedValidationState,
        snapshot: &FormSnapshot,
        context: &ValidationContext,
        now: Instant,
    ) -> EnhancedValidationState {
        let validity: HashMap<String, bool> = state
            .field_states
            .iter()
            .map(|(name, s)| (name.clone(), s.is_valid))
            .collect();
        let mut field_states = state.field_states;
        let mut updates: Option<ContextUpdate> = None;

        for (name, field) in field_states.iter_mut() {
            let config = self.registry.get_or_create(name).clone();
            let cx = MiddlewareContext {
                field_name: name.clone(),
                value: snapshot.value(name).cloned().unwrap_or(Value::Null),
                errors: field.errors.clone(),
                is_touched: field.is_touched,
                priority: field.priority,
                validation_context: context.clone(),
                validation_count: self.middleware.validation_count(name),
                dependencies: config.dependencies.clone(),
                field_validity: validity.clone(),
            };
            let outcome = self.middleware.execute(&cx, context.validation_mode);
            if outcome.executed.is_empty() {
                continue;
            }
            apply_outcome(
                field,
                &outcome,
                &config,
                self.state.field(name),
                context.submission_attempted,
            );
            if let Some(delay) = outcome.result.custom_delay {
                self.custom_delays.insert(name.clone(), delay);
            }
            if let Some(update) = outcome.result.context_updates {
                updates = Some(match updates {
                    Some(earlier) => earlier.merge(&update),
                    None => update,
                });
            }
        }

        if let Some(update) = updates {
            self.context = self.context.merged(&update, now);
        }
        EnhancedValidationState::from_fields(field_states)
    }

    fn form_valid(&self, state: &EnhancedValidationState) -> bool {
        if self.options.progressive_validation {
            state.is_partially_valid
        } else {
            state.is_valid
        }
    }
}

/// Fold a middleware outcome into a field's state.
fn apply_outcome(
    field: &mut FieldValidationState,
    outcome: &PipelineOutcome,
    config: &FieldConfig,
    previous: Option<&FieldValidationState>,
    submitted: bool,
) {
    let result = &outcome.result;
    if result.skip_validation == Some(true) {
        if let Some(previous) = previous {
            *field = previous.clone();
        }
        field.metadata.validation_skipped = true;
    }

    if let Some(upgrade) = result.updated_priority {
        field.priority = field.priority.at_least(upgrade);
        field.metadata.priority_upgraded = field.priority > config.priority;
    }

    if let Some(message) = &result.custom_error {
        field.errors = vec![message.clone()];
        field.is_valid = false;
        if !field.is_validating {
            field.validation_state = ValidationPhase::Invalid;
        }
        if field.is_touched || submitted {
            field.should_show_error = true;
            field.error_severity = tier_severity(field.priority);
        }
    }

    match result.show_error {
        Some(true) if !field.errors.is_empty() => {
            field.should_show_error = true;
            if field.error_severity == ErrorSeverity::None {
                field.error_severity = tier_severity(field.priority);
            }
        }
        Some(false) => field.hide_error(),
        _ => {}
    }

    field.metadata.middleware = outcome.executed.clone();
}

/// Whether an interaction should trigger validation in a mode.
fn triggers(mode: ValidationMode, kind: InteractionKind, touched: bool) -> bool {
    match (mode, kind) {
        (ValidationMode::All, InteractionKind::Change | InteractionKind::Blur) => true,
        (ValidationMode::OnChange, InteractionKind::Change) => true,
        (ValidationMode::OnBlur, InteractionKind::Blur) => true,
        (ValidationMode::OnTouched, InteractionKind::Blur) => true,
        (ValidationMode::OnTouched, InteractionKind::Change) => touched,
        _ => false,
    }
}

/// Form validation orchestrator.
///
/// Cheap to clone; clones drive the same form instance.
#[derive(Clone)]
pub struct FormValidator {
    inner: Arc<Mutex<ValidatorInner>>,
    debouncer: ValidationDebouncer,
    clock: SharedClock,
}

impl FormValidator {
    pub fn builder() -> FormValidatorBuilder {
        FormValidatorBuilder::default()
    }

    /// Validator with the given options and no middleware.
    pub fn new(options: ValidatorOptions) -> Self {
        Self::builder().options(options).build()
    }

    fn lock(&self) -> MutexGuard<'_, ValidatorInner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    // -------------------------------------------------------------------------
    // Cycles
    // -------------------------------------------------------------------------

    /// Run a cycle against the container and push the overall-valid flag.
    pub fn validate<S: FormStore + ?Sized>(&self, store: &S) -> EnhancedValidationState {
        let snapshot = store.snapshot();
        let (state, valid) = {
            let mut inner = self.lock();
            let snapshot = inner.decorate(snapshot);
            let state = inner.run_cycle(&snapshot, self.clock.now());
            let valid = inner.form_valid(&state);
            (state, valid)
        };
        if store.is_valid() != valid {
            log::debug!("[validator] Form validity -> {}", valid);
            store.set_valid(valid);
        }
        state
    }

    /// Run a cycle over a snapshot without touching any container.
    pub fn validate_progressively(&self, snapshot: &FormSnapshot) -> EnhancedValidationState {
        let mut inner = self.lock();
        let snapshot = inner.decorate(snapshot.clone());
        inner.run_cycle(&snapshot, self.clock.now())
    }

    /// Feed a host UI event into the engine.
    ///
    /// Records the interaction, updates the focus in the session context and,
    /// when the validation mode reacts to this kind of event, schedules a
    /// debounced cycle. Returns the debounce delay if one was scheduled.
    pub fn handle_event<S>(&self, store: &S, field: &str, kind: InteractionKind) -> Option<Duration>
    where
        S: FormStore + Clone + 'static,
    {
        let now = self.clock.now();
        let (mode, priority, base, debounce) = {
            let mut inner = self.lock();
            if inner.options.context_aware {
                inner.adaptive.record_interaction_at(field, kind, now);
            } else {
                inner.adaptive.history_mut().record(field, kind, now);
            }
            let update = match kind {
                InteractionKind::Focus => Some(ContextUpdate::focus(field)),
                InteractionKind::Blur
                    if inner.context.focused_field.as_deref() == Some(field) =>
                {
                    Some(ContextUpdate::blur())
                }
                _ => None,
            };
            if let Some(update) = update {
                inner.context = inner.context.merged(&update, now);
            }
            let priority = inner.effective_priority(field);
            let base = inner.debounce_base(field);
            (
                inner.context.validation_mode,
                priority,
                base,
                inner.options.debounce_validation,
            )
        };

        let touched = mode == ValidationMode::OnTouched && store.snapshot().is_touched(field);
        if !triggers(mode, kind, touched) {
            return None;
        }
        if !debounce {
            self.validate(store);
            return None;
        }

        let validator = self.clone();
        let store = store.clone();
        let delay = self
            .debouncer
            .schedule(field, Some(priority), base, move || {
                validator.validate(&store);
            });
        Some(delay)
    }

    /// Mark a submit attempt, flush pending work and validate everything.
    pub fn submit<S: FormStore + ?Sized>(&self, store: &S) -> SubmitOutcome {
        let now = self.clock.now();
        {
            let mut inner = self.lock();
            inner.context = inner.context.merged(&ContextUpdate::submitted(), now);
        }
        self.debouncer.flush_all();
        store.on_submit();

        let state = self.validate(store);
        let accepted = self.lock().form_valid(&state);
        let focus = if accepted {
            None
        } else {
            state.next_field_to_focus().map(str::to_string)
        };
        log::debug!(
            "[validator] Submit {} ({:.0}% complete)",
            if accepted { "accepted" } else { "rejected" },
            state.validation_progress
        );
        SubmitOutcome {
            accepted,
            state,
            focus,
        }
    }

    /// Start an async validation run for a field.
    ///
    /// The field reads as validating until the newest ticket completes.
    pub fn begin_async_validation(&self, field: &str) -> ValidationTicket {
        let mut inner = self.lock();
        let generation = inner.generations.entry(field.to_string()).or_default();
        *generation += 1;
        let ticket = ValidationTicket {
            field: field.to_string(),
            generation: *generation,
        };
        inner.validating.insert(field.to_string());
        ticket
    }

    /// Apply the result of an async run and revalidate.
    ///
    /// Returns `false` when a newer run for the same field has started; the
    /// outcome is then discarded.
    pub fn complete_async_validation<S: FormStore + ?Sized>(
        &self,
        store: &S,
        ticket: &ValidationTicket,
        outcome: AsyncOutcome,
    ) -> bool {
        {
            let mut inner = self.lock();
            let current = inner.generations.get(&ticket.field).copied().unwrap_or(0);
            if current != ticket.generation {
                log::debug!(
                    "[validator] Discarding stale async result for '{}' ({} < {})",
                    ticket.field,
                    ticket.generation,
                    current
                );
                return false;
            }
            inner.validating.remove(&ticket.field);
            match outcome {
                Ok(messages) if messages.is_empty() => {
                    inner.async_errors.remove(&ticket.field);
                }
                Ok(messages) => {
                    inner.async_errors.insert(ticket.field.clone(), messages);
                }
                Err(err) => {
                    log::warn!("[validator] {}", err);
                    inner
                        .async_errors
                        .insert(ticket.field.clone(), vec![ASYNC_FALLBACK_MESSAGE.to_string()]);
                }
            }
        }
        self.validate(store);
        true
    }

    /// Run an async validator for a field, discarding the result if a newer
    /// run overtook it.
    pub async fn validate_field_async<S, F>(&self, store: &S, field: &str, future: F) -> bool
    where
        S: FormStore + ?Sized,
        F: Future<Output = AsyncOutcome>,
    {
        let ticket = self.begin_async_validation(field);
        self.validate(store);
        let outcome = match AssertUnwindSafe(future).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => Err(AsyncValidationError::new(field, extract_panic_message(&panic))),
        };
        self.complete_async_validation(store, &ticket, outcome)
    }

    /// Run the container's own async rules for a field.
    ///
    /// Returns `None` when the field has none, otherwise whether the result
    /// was applied.
    pub async fn validate_store_async<S>(&self, store: &S, field: &str) -> Option<bool>
    where
        S: FormStore + ?Sized,
    {
        let future = store.async_validation(field)?;
        Some(self.validate_field_async(store, field, future).await)
    }

    /// Forget the session: histories, async results, pending debounces and
    /// the stored state. Configs, middleware and the configured mode stay.
    pub fn reset(&self) {
        {
            let mut inner = self.lock();
            inner.context = ValidationContext::new(inner.options.validation_mode);
            inner.progressive.reset();
            inner.adaptive.reset();
            inner.middleware.reset();
            inner.state = EnhancedValidationState::default();
            for generation in inner.generations.values_mut() {
                *generation += 1;
            }
            inner.validating.clear();
            inner.async_errors.clear();
            inner.custom_delays.clear();
        }
        self.debouncer.cancel_all();
        self.debouncer.reset_stats(None);
        log::debug!("[validator] Reset");
    }

    // -------------------------------------------------------------------------
    // State
    // -------------------------------------------------------------------------

    /// State from the latest cycle.
    pub fn validation_state(&self) -> EnhancedValidationState {
        self.lock().state.clone()
    }

    pub fn field_state(&self, field: &str) -> Option<FieldValidationState> {
        self.lock().state.field(field).cloned()
    }

    /// Button policy under the configured strategy.
    pub fn button_state(&self) -> ButtonValidationState {
        let strategy = self.lock().options.button_strategy;
        self.button_state_for(strategy)
    }

    pub fn button_state_for(&self, strategy: ButtonStrategy) -> ButtonValidationState {
        let inner = self.lock();
        let state = &inner.state;
        let context = &inner.context;
        match strategy {
            ButtonStrategy::Strict => strict_button(state),
            ButtonStrategy::Progressive => progressive_button(state, context),
            ButtonStrategy::Lenient => lenient_button(state),
            ButtonStrategy::Smart => {
                let options = &inner.options.progressive;
                let recent = context.last_interaction_time.is_none_or(|at| {
                    self.clock.now().saturating_duration_since(at)
                        < Duration::from_millis(options.smart_time_window)
                });
                if context.user_interaction_count < options.smart_interaction_window && recent {
                    ButtonValidationState::enabled(ButtonVariant::Default)
                } else {
                    progressive_button(state, context)
                }
            }
        }
    }

    pub fn context(&self) -> ValidationContext {
        self.lock().context.clone()
    }

    /// Merge an update into the session context.
    pub fn update_context(&self, update: &ContextUpdate) {
        let now = self.clock.now();
        let mut inner = self.lock();
        inner.context = inner.context.merged(update, now);
    }

    pub fn options(&self) -> ValidatorOptions {
        self.lock().options.clone()
    }

    /// Config for a field, created from its name if not configured.
    pub fn field_config(&self, field: &str) -> FieldConfig {
        self.lock().registry.get_or_create(field).clone()
    }

    /// Add or replace a field config.
    pub fn configure_field(&self, config: FieldConfig) {
        self.lock().registry.insert(config);
    }

    // -------------------------------------------------------------------------
    // Middleware
    // -------------------------------------------------------------------------

    pub fn add_middleware(&self, middleware: ValidationMiddleware) {
        self.lock().middleware.add(middleware);
    }

    pub fn remove_middleware(&self, name: &str) -> bool {
        self.lock().middleware.remove(name)
    }

    pub fn get_middleware(&self, name: &str) -> Option<MiddlewareConfig> {
        self.lock().middleware.get(name).map(|m| m.config.clone())
    }

    pub fn set_middleware_enabled(&self, name: &str, enabled: bool) -> bool {
        self.lock().middleware.set_enabled(name, enabled)
    }

    /// Middleware configs in execution order.
    pub fn middleware(&self) -> Vec<MiddlewareConfig> {
        self.lock()
            .middleware
            .all()
            .iter()
            .map(|m| m.config.clone())
            .collect()
    }

    pub fn middleware_history(&self, field: &str) -> Vec<MiddlewareExecution> {
        self.lock().middleware.history(field)
    }

    pub fn clear_middleware_history(&self, field: Option<&str>) {
        self.lock().middleware.clear_history(field);
    }

    // -------------------------------------------------------------------------
    // Debouncing
    // -------------------------------------------------------------------------

    pub fn cancel_field_validation(&self, field: &str) -> bool {
        self.debouncer.cancel(field)
    }

    pub fn cancel_all_validations(&self) {
        self.debouncer.cancel_all();
    }

    pub fn flush_field_validation(&self, field: &str) -> bool {
        self.debouncer.flush(field)
    }

    pub fn flush_all_validations(&self) {
        self.debouncer.flush_all();
    }

    pub fn is_validation_pending(&self, field: &str) -> bool {
        self.debouncer.is_pending(field)
    }

    pub fn debounce_stats(&self, field: &str) -> Option<DebounceStats> {
        self.debouncer.stats(field)
    }

    pub fn reset_debounce_stats(&self, field: Option<&str>) {
        self.debouncer.reset_stats(field);
    }

    // -------------------------------------------------------------------------
    // Adaptation
    // -------------------------------------------------------------------------

    /// Record an interaction without scheduling validation.
    pub fn record_interaction(&self, field: &str, kind: InteractionKind) {
        let now = self.clock.now();
        self.lock().adaptive.record_interaction_at(field, kind, now);
    }

    pub fn adaptive_field_priority(&self, field: &str, base: FieldPriority) -> FieldPriority {
        self.lock().adaptive.adaptive_field_priority(field, base)
    }

    pub fn adaptive_delay(&self, field: &str) -> Duration {
        self.lock().adaptive.adaptive_delay(field)
    }

    pub fn predict_next_field(&self, current: &str) -> Option<FieldPrediction> {
        self.lock().adaptive.predict_next_field(current)
    }

    pub fn user_pattern(&self) -> Option<UserInteractionPattern> {
        self.lock().adaptive.user_pattern().cloned()
    }

    pub fn interaction_stats(&self, field: &str) -> Option<FieldHistory> {
        self.lock().adaptive.field_stats(field).cloned()
    }
}

impl fmt::Debug for FormValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("FormValidator")
            .field("fields", &inner.registry.len())
            .field("middleware", &inner.middleware.len())
            .field("context", &inner.context)
            .finish_non_exhaustive()
    }
}

fn strict_button(state: &EnhancedValidationState) -> ButtonValidationState {
    if state.is_valid {
        ButtonValidationState::enabled(ButtonVariant::Success)
    } else {
        ButtonValidationState::blocked(STRICT_MESSAGE)
    }
}

fn progressive_button(
    state: &EnhancedValidationState,
    context: &ValidationContext,
) -> ButtonValidationState {
    if state.has_untouched_required_fields && !context.submission_attempted {
        return ButtonValidationState::enabled(ButtonVariant::Default);
    }
    if state.critical_fields_valid && state.is_partially_valid {
        return if state.is_valid {
            ButtonValidationState::enabled(ButtonVariant::Success)
        } else {
            ButtonValidationState::enabled(ButtonVariant::Warning).with_message(OPTIONAL_MESSAGE)
        };
    }
    ButtonValidationState::blocked(CRITICAL_MESSAGE)
}

fn lenient_button(state: &EnhancedValidationState) -> ButtonValidationState {
    if !state.critical_fields_valid {
        return ButtonValidationState::blocked(CRITICAL_MESSAGE);
    }
    let variant = if state.is_valid {
        ButtonVariant::Success
    } else if state.is_partially_valid {
        ButtonVariant::Warning
    } else {
        ButtonVariant::Default
    };
    ButtonValidationState::enabled(variant)
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`FormValidator`].
#[derive(Default)]
pub struct FormValidatorBuilder {
    options: ValidatorOptions,
    fields: Vec<FieldConfig>,
    middleware: Vec<ValidationMiddleware>,
    clock: Option<SharedClock>,
}

impl FormValidatorBuilder {
    pub fn options(mut self, options: ValidatorOptions) -> Self {
        self.options = options;
        self
    }

    /// Configure a field. Later configs for the same name win.
    pub fn field(mut self, config: FieldConfig) -> Self {
        self.fields.push(config);
        self
    }

    pub fn middleware(mut self, middleware: ValidationMiddleware) -> Self {
        self.middleware.push(middleware);
        self
    }

    /// Time source for every elapsed-time rule.
    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> FormValidator {
        let clock = self.clock.unwrap_or_else(system_clock);
        let options = self.options;

        let mut registry = FieldConfigRegistry::with_configs(options.field_configs.iter().cloned());
        for config in self.fields {
            registry.insert(config);
        }

        let classifier = options
            .smart_empty_handling
            .then(|| SmartEmptyClassifier::new(options.empty_fields));
        let progressive = ProgressiveValidator::new(
            options.progressive,
            options.progressive_validation,
            classifier,
        );

        let mut middleware = MiddlewareManager::new(Arc::clone(&clock));
        for m in self.middleware {
            middleware.add(m);
        }

        let debouncer = ValidationDebouncer::new(options.debouncing);
        let inner = ValidatorInner {
            registry,
            context: ValidationContext::new(options.validation_mode),
            progressive,
            adaptive: ContextAwareEngine::new(
                options.context_awareness,
                Arc::clone(&clock),
            ),
            middleware,
            state: EnhancedValidationState::default(),
            generations: HashMap::new(),
            validating: HashSet::new(),
            async_errors: HashMap::new(),
            custom_delays: HashMap::new(),
            options,
        };

        FormValidator {
            inner: Arc::new(Mutex::new(inner)),
            debouncer,
            clock,
        }
    }
}

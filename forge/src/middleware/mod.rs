//! Validation middleware pipeline.
//!
//! A middleware is a named hook that looks at one field before its state is
//! finalised and may veto further hooks, skip validation, replace the error,
//! force the error visible or hidden, ask for a different delay, raise the
//! field's priority for this cycle, or update the session context.
//!
//! The [`MiddlewareManager`] keeps middleware sorted by descending priority
//! (ties keep insertion order) and runs the ones whose filters match:
//!
//! ```ignore
//! let mut manager = MiddlewareManager::new(system_clock());
//! manager.add(ValidationMiddleware::from_fn(
//!     MiddlewareConfig::new("trim-check").priority(10).fields(["username"]),
//!     |cx| Ok(MiddlewareResult::proceed().show_error(cx.is_touched)),
//! ));
//! let outcome = manager.execute(&cx, ValidationMode::OnChange);
//! ```
//!
//! A middleware that returns `Err` or panics is logged and skipped; the rest
//! of the pipeline still runs.

mod builtin;

pub use builtin::{
    ConditionalMiddleware, DependencyMode, FieldDependencyMiddleware, RateLimitMiddleware,
};

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::clock::SharedClock;
use crate::context::{ContextUpdate, ValidationContext};
use crate::error::{MiddlewareError, extract_panic_message};
use crate::priority::{FieldPriority, ValidationMode};

/// Execution records kept per field.
pub const HISTORY_LIMIT: usize = 50;

/// Extra gates a middleware can require before it runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MiddlewareConditions {
    /// Only the first pipeline run for the field.
    pub first_validation_only: bool,
    /// Only while the field has errors.
    pub only_if_errors: bool,
    pub only_if_touched: bool,
    /// Only for fields whose effective priority is listed.
    pub field_priorities: Option<Vec<FieldPriority>>,
}

impl MiddlewareConditions {
    fn pass(&self, cx: &MiddlewareContext) -> bool {
        if self.first_validation_only && cx.validation_count > 0 {
            return false;
        }
        if self.only_if_errors && cx.errors.is_empty() {
            return false;
        }
        if self.only_if_touched && !cx.is_touched {
            return false;
        }
        self.field_priorities
            .as_ref()
            .is_none_or(|allowed| allowed.contains(&cx.priority))
    }
}

/// Name, ordering and filters of a middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiddlewareConfig {
    pub name: String,
    /// Higher runs first.
    pub priority: i32,
    pub enabled: bool,
    /// Restrict to these fields.
    pub target_fields: Option<Vec<String>>,
    /// Restrict to these validation modes.
    pub validation_modes: Option<Vec<ValidationMode>>,
    pub conditions: Option<MiddlewareConditions>,
}

impl MiddlewareConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            priority: 0,
            enabled: true,
            target_fields: None,
            validation_modes: None,
            conditions: None,
        }
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn modes(mut self, modes: impl IntoIterator<Item = ValidationMode>) -> Self {
        self.validation_modes = Some(modes.into_iter().collect());
        self
    }

    pub fn conditions(mut self, conditions: MiddlewareConditions) -> Self {
        self.conditions = Some(conditions);
        self
    }

    fn applies(&self, cx: &MiddlewareContext, mode: ValidationMode) -> bool {
        self.enabled
            && self
                .target_fields
                .as_ref()
                .is_none_or(|fields| fields.iter().any(|f| *f == cx.field_name))
            && self
                .validation_modes
                .as_ref()
                .is_none_or(|modes| modes.contains(&mode))
            && self.conditions.as_ref().is_none_or(|c| c.pass(cx))
    }
}

/// What a middleware sees for one field.
#[derive(Debug, Clone, PartialEq)]
pub struct MiddlewareContext {
    pub field_name: String,
    pub value: Value,
    pub errors: Vec<String>,
    pub is_touched: bool,
    /// Effective priority before this pipeline run.
    pub priority: FieldPriority,
    pub validation_context: ValidationContext,
    /// Pipeline runs for this field before this one.
    pub validation_count: u32,
    pub dependencies: Vec<String>,
    /// Validity of every field in this cycle, before any middleware ran.
    pub field_validity: HashMap<String, bool>,
}

impl MiddlewareContext {
    pub fn new(field_name: impl Into<String>, validation_context: ValidationContext) -> Self {
        Self {
            field_name: field_name.into(),
            value: Value::Null,
            errors: Vec::new(),
            is_touched: false,
            priority: FieldPriority::default(),
            validation_context,
            validation_count: 0,
            dependencies: Vec::new(),
            field_validity: HashMap::new(),
        }
    }

    /// Whether another field is valid in this cycle, before middleware ran.
    /// Unknown fields count as invalid.
    pub fn is_field_valid(&self, field: &str) -> bool {
        self.field_validity.get(field).copied().unwrap_or(false)
    }
}

/// A middleware's opinion. `None` means "no opinion".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiddlewareResult {
    pub should_continue: bool,
    pub skip_validation: Option<bool>,
    pub custom_error: Option<String>,
    pub show_error: Option<bool>,
    pub custom_delay: Option<Duration>,
    pub updated_priority: Option<FieldPriority>,
    pub context_updates: Option<ContextUpdate>,
}

impl Default for MiddlewareResult {
    fn default() -> Self {
        Self::proceed()
    }
}

impl MiddlewareResult {
    /// Continue with no opinion.
    pub fn proceed() -> Self {
        Self {
            should_continue: true,
            skip_validation: None,
            custom_error: None,
            show_error: None,
            custom_delay: None,
            updated_priority: None,
            context_updates: None,
        }
    }

    /// Stop the pipeline after this middleware.
    pub fn halt() -> Self {
        Self {
            should_continue: false,
            ..Self::proceed()
        }
    }

    pub fn skip_validation(mut self, skip: bool) -> Self {
        self.skip_validation = Some(skip);
        self
    }

    pub fn error(mut self, message: impl Into<String>) -> Self {
        self.custom_error = Some(message.into());
        self
    }

    pub fn show_error(mut self, show: bool) -> Self {
        self.show_error = Some(show);
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.custom_delay = Some(delay);
        self
    }

    pub fn priority(mut self, priority: FieldPriority) -> Self {
        self.updated_priority = Some(priority);
        self
    }

    pub fn context(mut self, update: ContextUpdate) -> Self {
        self.context_updates = Some(update);
        self
    }

    /// Fold a later result into this one.
    fn absorb(&mut self, later: &MiddlewareResult) {
        self.should_continue &= later.should_continue;
        if later.skip_validation.is_some() {
            self.skip_validation = later.skip_validation;
        }
        if later.show_error.is_some() {
            self.show_error = later.show_error;
        }
        if let Some(message) = later.custom_error.as_ref().filter(|m| !m.is_empty()) {
            self.custom_error = Some(message.clone());
        }
        if later.updated_priority.is_some() {
            self.updated_priority = later.updated_priority;
        }
        if later.custom_delay.is_some() {
            self.custom_delay = later.custom_delay;
        }
        if let Some(update) = &later.context_updates {
            self.context_updates = Some(match self.context_updates.take() {
                Some(earlier) => earlier.merge(update),
                None => update.clone(),
            });
        }
    }
}

/// The behaviour half of a middleware.
///
/// Implemented for any `Fn(&MiddlewareContext) -> Result<MiddlewareResult, MiddlewareError>`.
pub trait Middleware: Send + Sync {
    fn execute(&self, cx: &MiddlewareContext) -> Result<MiddlewareResult, MiddlewareError>;
}

impl<F> Middleware for F
where
    F: Fn(&MiddlewareContext) -> Result<MiddlewareResult, MiddlewareError> + Send + Sync,
{
    fn execute(&self, cx: &MiddlewareContext) -> Result<MiddlewareResult, MiddlewareError> {
        self(cx)
    }
}

/// A configured middleware.
#[derive(Clone)]
pub struct ValidationMiddleware {
    pub config: MiddlewareConfig,
    handler: Arc<dyn Middleware>,
}

impl ValidationMiddleware {
    pub fn new(config: MiddlewareConfig, handler: impl Middleware + 'static) -> Self {
        Self {
            config,
            handler: Arc::new(handler),
        }
    }

    /// Shorthand for closure middleware.
    pub fn from_fn<F>(config: MiddlewareConfig, f: F) -> Self
    where
        F: Fn(&MiddlewareContext) -> Result<MiddlewareResult, MiddlewareError>
            + Send
            + Sync
            + 'static,
    {
        Self::new(config, f)
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn priority(&self) -> i32 {
        self.config.priority
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn run(&self, cx: &MiddlewareContext) -> Result<MiddlewareResult, MiddlewareError> {
        match catch_unwind(AssertUnwindSafe(|| self.handler.execute(cx))) {
            Ok(result) => result,
            Err(panic) => Err(MiddlewareError::Panicked {
                name: self.config.name.clone(),
                message: extract_panic_message(&panic),
            }),
        }
    }
}

impl fmt::Debug for ValidationMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationMiddleware")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// One middleware run, kept for diagnostics.
#[derive(Debug, Clone)]
pub struct MiddlewareExecution {
    pub middleware: String,
    pub at: Instant,
    pub outcome: Result<MiddlewareResult, MiddlewareError>,
}

/// Merged result of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutcome {
    pub result: MiddlewareResult,
    /// Middleware that ran and produced a result, in order.
    pub executed: Vec<String>,
    /// A middleware stopped the pipeline early.
    pub short_circuited: bool,
}

/// Ordered middleware list plus execution bookkeeping.
pub struct MiddlewareManager {
    clock: SharedClock,
    middleware: Vec<ValidationMiddleware>,
    history: HashMap<String, VecDeque<MiddlewareExecution>>,
    validation_counts: HashMap<String, u32>,
}

impl MiddlewareManager {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            middleware: Vec::new(),
            history: HashMap::new(),
            validation_counts: HashMap::new(),
        }
    }

    /// Insert by priority. A middleware with the same name is replaced.
    pub fn add(&mut self, middleware: ValidationMiddleware) {
        if self.remove(middleware.name()) {
            log::debug!("[middleware] Replacing '{}'", middleware.name());
        }
        let at = self
            .middleware
            .iter()
            .position(|m| m.priority() < middleware.priority())
            .unwrap_or(self.middleware.len());
        self.middleware.insert(at, middleware);
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.middleware.len();
        self.middleware.retain(|m| m.name() != name);
        self.middleware.len() != before
    }

    pub fn get(&self, name: &str) -> Option<&ValidationMiddleware> {
        self.middleware.iter().find(|m| m.name() == name)
    }

    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> bool {
        match self.middleware.iter_mut().find(|m| m.name() == name) {
            Some(m) => {
                m.config.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Every middleware in execution order.
    pub fn all(&self) -> &[ValidationMiddleware] {
        &self.middleware
    }

    pub fn len(&self) -> usize {
        self.middleware.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middleware.is_empty()
    }

    /// Pipeline runs so far for a field.
    pub fn validation_count(&self, field: &str) -> u32 {
        self.validation_counts.get(field).copied().unwrap_or(0)
    }

    /// Run the matching middleware for one field.
    pub fn execute(&mut self, cx: &MiddlewareContext, mode: ValidationMode) -> PipelineOutcome {
        let mut outcome = PipelineOutcome {
            result: MiddlewareResult::proceed(),
            executed: Vec::new(),
            short_circuited: false,
        };
        let matching: Vec<ValidationMiddleware> = self
            .middleware
            .iter()
            .filter(|m| m.config.applies(cx, mode))
            .cloned()
            .collect();

        for middleware in matching {
            let result = middleware.run(cx);
            self.record(&cx.field_name, middleware.name(), result.clone());
            match result {
                Ok(result) => {
                    outcome.result.absorb(&result);
                    outcome.executed.push(middleware.name().to_string());
                    if !result.should_continue {
                        log::trace!(
                            "[middleware] '{}' stopped the pipeline for '{}'",
                            middleware.name(),
                            cx.field_name
                        );
                        outcome.short_circuited = true;
                        break;
                    }
                }
                Err(err) => log::warn!("[middleware] {}; skipping", err),
            }
        }

        *self
            .validation_counts
            .entry(cx.field_name.clone())
            .or_default() += 1;
        outcome
    }

    fn record(
        &mut self,
        field: &str,
        middleware: &str,
        outcome: Result<MiddlewareResult, MiddlewareError>,
    ) {
        let entries = self.history.entry(field.to_string()).or_default();
        if entries.len() == HISTORY_LIMIT {
            entries.pop_front();
        }
        entries.push_back(MiddlewareExecution {
            middleware: middleware.to_string(),
            at: self.clock.now(),
            outcome,
        });
    }

    /// Execution records for a field, oldest first.
    pub fn history(&self, field: &str) -> Vec<MiddlewareExecution> {
        self.history
            .get(field)
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Clear records for one field, or every field.
    pub fn clear_history(&mut self, field: Option<&str>) {
        match field {
            Some(field) => {
                self.history.remove(field);
            }
            None => self.history.clear(),
        }
    }

    /// Clear records and per-field run counts.
    pub fn reset(&mut self) {
        self.history.clear();
        self.validation_counts.clear();
    }
}

impl fmt::Debug for MiddlewareManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareManager")
            .field("middleware", &self.middleware)
            .finish_non_exhaustive()
    }
}

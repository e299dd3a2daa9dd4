//! Ready-made middleware.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::clock::SharedClock;
use crate::error::MiddlewareError;

use super::{Middleware, MiddlewareContext, MiddlewareResult};

const RATE_WINDOW: Duration = Duration::from_secs(1);

/// Caps validations per field per second.
///
/// Calls over the cap stop the pipeline, skip validation and suggest a delay
/// until the window frees a slot.
pub struct RateLimitMiddleware {
    max_per_second: usize,
    clock: SharedClock,
    calls: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimitMiddleware {
    pub const DEFAULT_MAX_PER_SECOND: usize = 5;

    pub fn new(max_per_second: usize, clock: SharedClock) -> Self {
        Self {
            max_per_second: max_per_second.max(1),
            clock,
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub fn max_per_second(&self) -> usize {
        self.max_per_second
    }
}

impl Middleware for RateLimitMiddleware {
    fn execute(&self, cx: &MiddlewareContext) -> Result<MiddlewareResult, MiddlewareError> {
        let now = self.clock.now();
        let mut calls = self.calls.lock().unwrap_or_else(|p| p.into_inner());
        let window = calls.entry(cx.field_name.clone()).or_default();
        while window
            .front()
            .is_some_and(|&at| now.saturating_duration_since(at) >= RATE_WINDOW)
        {
            window.pop_front();
        }

        if window.len() >= self.max_per_second {
            let wait = window
                .front()
                .map(|&oldest| RATE_WINDOW.saturating_sub(now.saturating_duration_since(oldest)))
                .unwrap_or(RATE_WINDOW);
            log::debug!(
                "[middleware] Rate limit hit for '{}', retry in {:?}",
                cx.field_name,
                wait
            );
            return Ok(MiddlewareResult::halt().skip_validation(true).delay(wait));
        }
        window.push_back(now);
        Ok(MiddlewareResult::proceed())
    }
}

impl fmt::Debug for RateLimitMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimitMiddleware")
            .field("max_per_second", &self.max_per_second)
            .finish_non_exhaustive()
    }
}

/// How [`FieldDependencyMiddleware`] treats unmet dependencies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DependencyMode {
    /// Stop the pipeline and skip validation.
    #[default]
    Block,
    /// Replace the error with a hint naming the missing fields.
    Annotate,
}

/// Holds a field back until the fields it depends on are valid.
///
/// Dependencies come from the field's config unless overridden here.
#[derive(Debug, Clone, Default)]
pub struct FieldDependencyMiddleware {
    mode: DependencyMode,
    dependencies: HashMap<String, Vec<String>>,
}

impl FieldDependencyMiddleware {
    pub fn new(mode: DependencyMode) -> Self {
        Self {
            mode,
            dependencies: HashMap::new(),
        }
    }

    /// Declare dependencies for a field instead of using its config.
    pub fn depends<I, S>(mut self, field: impl Into<String>, on: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies
            .insert(field.into(), on.into_iter().map(Into::into).collect());
        self
    }
}

impl Middleware for FieldDependencyMiddleware {
    fn execute(&self, cx: &MiddlewareContext) -> Result<MiddlewareResult, MiddlewareError> {
        let dependencies = self
            .dependencies
            .get(&cx.field_name)
            .unwrap_or(&cx.dependencies);
        let missing: Vec<&str> = dependencies
            .iter()
            .filter(|dep| !cx.is_field_valid(dep))
            .map(String::as_str)
            .collect();
        if missing.is_empty() {
            return Ok(MiddlewareResult::proceed());
        }

        Ok(match self.mode {
            DependencyMode::Block => MiddlewareResult::halt()
                .skip_validation(true)
                .show_error(false),
            DependencyMode::Annotate => {
                MiddlewareResult::proceed().error(format!("Complete {} first", missing.join(", ")))
            }
        })
    }
}

type Predicate = Box<dyn Fn(&MiddlewareContext) -> bool + Send + Sync>;

/// Returns one of two fixed results depending on a predicate.
pub struct ConditionalMiddleware {
    predicate: Predicate,
    when_true: MiddlewareResult,
    when_false: MiddlewareResult,
}

impl ConditionalMiddleware {
    pub fn new<P>(predicate: P, when_true: MiddlewareResult, when_false: MiddlewareResult) -> Self
    where
        P: Fn(&MiddlewareContext) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Box::new(predicate),
            when_true,
            when_false,
        }
    }
}

impl Middleware for ConditionalMiddleware {
    fn execute(&self, cx: &MiddlewareContext) -> Result<MiddlewareResult, MiddlewareError> {
        Ok(if (self.predicate)(cx) {
            self.when_true.clone()
        } else {
            self.when_false.clone()
        })
    }
}

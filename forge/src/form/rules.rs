//! Fluent rule builder for [`FormState`](super::FormState) fields.

use std::future::Future;
use std::sync::Arc;

use regex::Regex;
use serde_json::Value;

use super::{BoxFuture, is_empty_value};
use crate::error::{ConfigError, FieldError};

/// Type alias for sync validation rule closures.
type SyncRule = Box<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// Type alias for async validation rule closures.
type AsyncRule = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<(), String>> + Send + Sync>;

/// Rules for one field.
///
/// # Example
///
/// ```ignore
/// let rules = FieldRules::new()
///     .required("Email is required")
///     .email("Please enter a valid email")
///     .rule_async(|v| async move { !taken(&v).await }, "Email already registered");
/// form.rules("email", rules);
/// ```
///
/// Length, pattern and email rules pass on empty values; use
/// [`required`](Self::required) to demand input.
#[derive(Default)]
pub struct FieldRules {
    sync_rules: Vec<(&'static str, SyncRule)>,
    async_rules: Vec<AsyncRule>,
}

impl FieldRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a custom synchronous validation rule.
    pub fn rule<F>(self, f: F, msg: impl Into<String>) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.named_rule("custom", f, msg)
    }

    fn named_rule<F>(mut self, kind: &'static str, f: F, msg: impl Into<String>) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        let msg = msg.into();
        self.sync_rules.push((
            kind,
            Box::new(move |v| if f(v) { Ok(()) } else { Err(msg.clone()) }),
        ));
        self
    }

    /// Add a custom asynchronous validation rule.
    pub fn rule_async<F, Fut>(mut self, f: F, msg: impl Into<String>) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let msg = msg.into();
        self.async_rules.push(Arc::new(move |v| {
            let fut = f(v);
            let msg = msg.clone();
            Box::pin(async move { if fut.await { Ok(()) } else { Err(msg) } })
        }));
        self
    }

    /// Require the field to be non-empty.
    pub fn required(self, msg: impl Into<String>) -> Self {
        self.named_rule("required", |v| !is_empty_value(v), msg)
    }

    /// Require minimum length (in characters).
    pub fn min_length(self, min: usize, msg: impl Into<String>) -> Self {
        self.named_rule(
            "min_length",
            move |v| skip_empty(v, |s| s.chars().count() >= min),
            msg,
        )
    }

    /// Require maximum length (in characters).
    pub fn max_length(self, max: usize, msg: impl Into<String>) -> Self {
        self.named_rule(
            "max_length",
            move |v| skip_empty(v, |s| s.chars().count() <= max),
            msg,
        )
    }

    /// Require the value to match a regex pattern.
    pub fn pattern(self, pattern: &str, msg: impl Into<String>) -> Result<Self, ConfigError> {
        let re = Regex::new(pattern).map_err(|source| ConfigError::Pattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(self.named_rule("pattern", move |v| skip_empty(v, |s| re.is_match(s)), msg))
    }

    /// Require a valid email address.
    pub fn email(self, msg: impl Into<String>) -> Self {
        self.named_rule(
            "email",
            |v| skip_empty(v, email_address::EmailAddress::is_valid),
            msg,
        )
    }

    /// Require a checkbox-style value to be `true`.
    pub fn checked(self, msg: impl Into<String>) -> Self {
        self.named_rule("checked", |v| v.as_bool() == Some(true), msg)
    }

    pub fn has_async_rules(&self) -> bool {
        !self.async_rules.is_empty()
    }

    /// Run the synchronous rules.
    pub fn check(&self, field: &str, value: &Value) -> Vec<FieldError> {
        self.sync_rules
            .iter()
            .filter_map(|(kind, rule)| {
                rule(value)
                    .err()
                    .map(|message| FieldError::new(field, *kind, message))
            })
            .collect()
    }

    /// Run the asynchronous rules, collecting failure messages.
    pub fn check_async(&self, value: Value) -> BoxFuture<'static, Vec<String>> {
        let rules = self.async_rules.clone();
        Box::pin(async move {
            let mut errors = Vec::new();
            for rule in &rules {
                if let Err(msg) = rule(value.clone()).await {
                    errors.push(msg);
                }
            }
            errors
        })
    }
}

fn skip_empty(value: &Value, check: impl Fn(&str) -> bool) -> bool {
    if is_empty_value(value) {
        return true;
    }
    match value {
        Value::String(s) => check(s),
        other => check(&other.to_string()),
    }
}

//! The form container the engine sits on top of.
//!
//! The container owns values, touched flags and raw rule execution. The
//! engine only reads a [`FormSnapshot`] from it and writes back the overall
//! valid flag. [`FormState`] is a ready-made in-memory container; hosts with
//! their own store implement [`FormStore`] (and [`FormControl`] if they want
//! tree binding).

mod rules;
mod state;

pub use rules::FieldRules;
pub use state::{FormState, SUBMIT_HANDLER};

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{AsyncValidationError, FieldError};
use crate::node::{FieldBinding, HandlerId};

/// Type alias for boxed futures used in async validation.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Outcome of a field's async rules: error messages, or a rejection.
pub type AsyncOutcome = Result<Vec<String>, AsyncValidationError>;

/// Point-in-time view of the container.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormSnapshot {
    pub values: Value,
    pub errors: HashMap<String, Vec<FieldError>>,
    pub touched: HashSet<String>,
    pub validating: HashSet<String>,
}

impl FormSnapshot {
    /// Value at a dotted path (`event.0.date`).
    pub fn value(&self, path: &str) -> Option<&Value> {
        lookup(&self.values, path)
    }

    pub fn is_touched(&self, field: &str) -> bool {
        self.touched.contains(field)
    }

    pub fn is_validating(&self, field: &str) -> bool {
        self.validating.contains(field)
    }

    /// Error messages for a field, in rule order.
    pub fn messages(&self, field: &str) -> Vec<String> {
        self.errors
            .get(field)
            .map(|errors| errors.iter().map(|e| e.message.clone()).collect())
            .unwrap_or_default()
    }

    /// Whether the field's value counts as empty.
    pub fn is_empty(&self, field: &str) -> bool {
        self.value(field).is_none_or(is_empty_value)
    }
}

/// Read/write access the engine needs from a form container.
pub trait FormStore: Send + Sync {
    /// Current errors, values, touched and validating fields.
    fn snapshot(&self) -> FormSnapshot;

    /// The container's overall-valid flag.
    fn is_valid(&self) -> bool;

    /// Overwrite the overall-valid flag.
    fn set_valid(&self, valid: bool);

    /// Async validation registered for `field`, if any.
    fn async_validation(&self, _field: &str) -> Option<BoxFuture<'static, AsyncOutcome>> {
        None
    }

    /// Called once per submit attempt.
    fn on_submit(&self) {}
}

impl<T: FormStore + ?Sized> FormStore for Arc<T> {
    fn snapshot(&self) -> FormSnapshot {
        (**self).snapshot()
    }

    fn is_valid(&self) -> bool {
        (**self).is_valid()
    }

    fn set_valid(&self, valid: bool) {
        (**self).set_valid(valid);
    }

    fn async_validation(&self, field: &str) -> Option<BoxFuture<'static, AsyncOutcome>> {
        (**self).async_validation(field)
    }

    fn on_submit(&self) {
        (**self).on_submit();
    }
}

/// Registration surface used by the tree binder.
pub trait FormControl {
    /// Register a named input. Registering the same name twice must be
    /// harmless.
    fn register(&self, name: &str) -> FieldBinding;

    /// Handler a submit trigger should invoke.
    fn submit_handler(&self) -> HandlerId;
}

/// Resolve a dotted path through objects and arrays.
pub fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(root);
    }
    path.split('.').try_fold(root, |node, segment| match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Null, blank strings and empty collections are empty.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

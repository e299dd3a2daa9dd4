use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::{Map, Value};

use super::{AsyncOutcome, BoxFuture, FieldRules, FormControl, FormSnapshot, FormStore, lookup};
use crate::error::FieldError;
use crate::node::{FieldBinding, HandlerId};

/// Handler ID bound to submit triggers by [`FormState`].
pub const SUBMIT_HANDLER: &str = "form:submit";

#[derive(Default)]
struct FormInner {
    initial: Value,
    values: Value,
    errors: HashMap<String, Vec<FieldError>>,
    touched: HashSet<String>,
    rules: Vec<(String, FieldRules)>,
    registrations: Vec<(String, u32)>,
    valid: bool,
    valid_writes: u32,
    submit_count: u32,
}

/// In-memory form container.
///
/// Cheap to clone; clones share the same state, so one handle can be given
/// to the validator while the UI keeps another.
///
/// # Example
///
/// ```ignore
/// let form = FormState::new();
/// form.rules("email", FieldRules::new().required("Email is required"));
/// form.set_value("email", json!("someone@example.com"));
/// form.touch("email");
/// form.run_rules();
/// ```
#[derive(Clone, Default)]
pub struct FormState {
    inner: Arc<RwLock<FormInner>>,
}

impl FormState {
    /// Create an empty form.
    pub fn new() -> Self {
        Self::with_values(Value::Object(Map::new()))
    }

    /// Create a form with initial values. `reset()` returns to them.
    pub fn with_values(values: Value) -> Self {
        Self {
            inner: Arc::new(RwLock::new(FormInner {
                initial: values.clone(),
                values,
                ..Default::default()
            })),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, FormInner> {
        self.inner.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, FormInner> {
        self.inner.write().unwrap_or_else(|p| p.into_inner())
    }

    // -------------------------------------------------------------------------
    // Values
    // -------------------------------------------------------------------------

    /// Get a clone of the value at `path`.
    pub fn value(&self, path: &str) -> Option<Value> {
        lookup(&self.read().values, path).cloned()
    }

    /// Get a clone of all values.
    pub fn values(&self) -> Value {
        self.read().values.clone()
    }

    /// Set the value at a dotted path, creating intermediate objects.
    pub fn set_value(&self, path: &str, value: Value) {
        set_path(&mut self.write().values, path, value);
    }

    /// Mark a field as touched.
    pub fn touch(&self, name: &str) {
        self.write().touched.insert(name.to_string());
    }

    pub fn is_touched(&self, name: &str) -> bool {
        self.read().touched.contains(name)
    }

    /// Restore initial values and clear errors, touched flags and counters.
    pub fn reset(&self) {
        let mut inner = self.write();
        inner.values = inner.initial.clone();
        inner.errors.clear();
        inner.touched.clear();
        inner.submit_count = 0;
    }

    // -------------------------------------------------------------------------
    // Rules and errors
    // -------------------------------------------------------------------------

    /// Attach rules to a field, replacing any previous rules.
    pub fn rules(&self, name: impl Into<String>, rules: FieldRules) {
        let name = name.into();
        let mut inner = self.write();
        inner.rules.retain(|(n, _)| *n != name);
        inner.rules.push((name, rules));
    }

    /// Evaluate every field's sync rules into the error map.
    pub fn run_rules(&self) {
        let mut inner = self.write();
        let mut results = Vec::with_capacity(inner.rules.len());
        for (name, rules) in &inner.rules {
            let value = lookup(&inner.values, name).cloned().unwrap_or(Value::Null);
            results.push((name.clone(), rules.check(name, &value)));
        }
        for (name, errors) in results {
            if errors.is_empty() {
                inner.errors.remove(&name);
            } else {
                inner.errors.insert(name, errors);
            }
        }
    }

    /// Replace a field's errors.
    pub fn set_errors(&self, name: impl Into<String>, errors: Vec<FieldError>) {
        let name = name.into();
        let mut inner = self.write();
        if errors.is_empty() {
            inner.errors.remove(&name);
        } else {
            inner.errors.insert(name, errors);
        }
    }

    pub fn clear_errors(&self, name: &str) {
        self.write().errors.remove(name);
    }

    pub fn errors(&self, name: &str) -> Vec<FieldError> {
        self.read().errors.get(name).cloned().unwrap_or_default()
    }

    // -------------------------------------------------------------------------
    // Diagnostics
    // -------------------------------------------------------------------------

    /// Registered field names, in registration order.
    pub fn registered_fields(&self) -> Vec<String> {
        self.read()
            .registrations
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// How many times `register` was called for a field.
    pub fn registration_count(&self, name: &str) -> u32 {
        self.read()
            .registrations
            .iter()
            .find(|(n, _)| n == name)
            .map_or(0, |(_, count)| *count)
    }

    /// How many times the valid flag was actually written.
    pub fn valid_writes(&self) -> u32 {
        self.read().valid_writes
    }

    pub fn submit_count(&self) -> u32 {
        self.read().submit_count
    }
}

impl FormStore for FormState {
    fn snapshot(&self) -> FormSnapshot {
        let inner = self.read();
        FormSnapshot {
            values: inner.values.clone(),
            errors: inner.errors.clone(),
            touched: inner.touched.clone(),
            validating: HashSet::new(),
        }
    }

    fn is_valid(&self) -> bool {
        self.read().valid
    }

    fn set_valid(&self, valid: bool) {
        let mut inner = self.write();
        inner.valid = valid;
        inner.valid_writes += 1;
    }

    fn async_validation(&self, field: &str) -> Option<BoxFuture<'static, AsyncOutcome>> {
        let inner = self.read();
        let (_, rules) = inner
            .rules
            .iter()
            .find(|(name, rules)| name == field && rules.has_async_rules())?;
        let value = lookup(&inner.values, field).cloned().unwrap_or(Value::Null);
        let pending = rules.check_async(value);
        Some(Box::pin(async move { Ok(pending.await) }))
    }

    fn on_submit(&self) {
        self.write().submit_count += 1;
    }
}

impl FormControl for FormState {
    fn register(&self, name: &str) -> FieldBinding {
        let mut inner = self.write();
        match inner.registrations.iter_mut().find(|(n, _)| n == name) {
            Some((_, count)) => *count += 1,
            None => inner.registrations.push((name.to_string(), 1)),
        }
        FieldBinding::for_field(name)
    }

    fn submit_handler(&self) -> HandlerId {
        HandlerId::new(SUBMIT_HANDLER)
    }
}

impl fmt::Debug for FormState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.read();
        f.debug_struct("FormState")
            .field("values", &inner.values)
            .field("errors", &inner.errors)
            .field("touched", &inner.touched)
            .field("valid", &inner.valid)
            .finish_non_exhaustive()
    }
}

fn set_path(root: &mut Value, path: &str, value: Value) {
    let mut node = root;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        let last = segments.peek().is_none();
        let index = match &*node {
            Value::Array(items) => segment.parse::<usize>().ok().filter(|&i| i < items.len()),
            _ => None,
        };
        if let Some(i) = index {
            let Value::Array(items) = node else {
                return;
            };
            if last {
                items[i] = value;
                return;
            }
            node = &mut items[i];
            continue;
        }
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        let Value::Object(map) = node else {
            return;
        };
        if last {
            map.insert(segment.to_string(), value);
            return;
        }
        node = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
}

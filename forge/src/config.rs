//! Per-field policy and the registry that hands it out.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::priority::FieldPriority;

static CRITICAL_NAMES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)email|password|username|phone|required|mandatory")
        .expect("Invalid regex pattern")
});

static IMPORTANT_NAMES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)name|address|date|amount|price|quantity")
        .expect("Invalid regex pattern")
});

/// Default debounce for fields without an explicit config.
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

/// Validation policy for one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FieldConfig {
    /// Path into the form values (`email`, `event.0.date`).
    pub name: String,
    pub priority: FieldPriority,
    pub required: bool,
    /// Surface errors on empty values immediately instead of waiting out
    /// the grace period.
    pub validate_on_empty: bool,
    pub debounce_ms: u64,
    /// Fields that must be valid before this one is judged.
    pub dependencies: Vec<String>,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            priority: FieldPriority::Optional,
            required: false,
            validate_on_empty: false,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            dependencies: Vec::new(),
        }
    }
}

impl FieldConfig {
    /// Explicit config with default policy.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Config derived from the field name alone.
    pub fn inferred(name: impl Into<String>) -> Self {
        let name = name.into();
        let priority = infer_priority(&name);
        Self {
            name,
            priority,
            ..Default::default()
        }
    }

    pub fn priority(mut self, priority: FieldPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn critical(self) -> Self {
        self.priority(FieldPriority::Critical)
    }

    pub fn important(self) -> Self {
        self.priority(FieldPriority::Important)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn validate_on_empty(mut self) -> Self {
        self.validate_on_empty = true;
        self
    }

    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.debounce_ms = ms;
        self
    }

    pub fn depends_on(mut self, field: impl Into<String>) -> Self {
        self.dependencies.push(field.into());
        self
    }
}

/// Guess a priority from the field name. Critical patterns win over
/// important ones; anything else is optional.
pub fn infer_priority(name: &str) -> FieldPriority {
    if CRITICAL_NAMES.is_match(name) {
        FieldPriority::Critical
    } else if IMPORTANT_NAMES.is_match(name) {
        FieldPriority::Important
    } else {
        FieldPriority::Optional
    }
}

/// Explicit configs plus lazily inferred ones, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct FieldConfigRegistry {
    configs: Vec<FieldConfig>,
    index: HashMap<String, usize>,
    inferred: HashSet<String>,
}

impl FieldConfigRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry seeded with explicit configs.
    pub fn with_configs(configs: impl IntoIterator<Item = FieldConfig>) -> Self {
        let mut registry = Self::new();
        for config in configs {
            registry.insert(config);
        }
        registry
    }

    /// Add or replace an explicit config.
    ///
    /// Replacing an inferred entry keeps its position.
    pub fn insert(&mut self, config: FieldConfig) {
        self.inferred.remove(&config.name);
        match self.index.get(&config.name) {
            Some(&i) => self.configs[i] = config,
            None => {
                self.index.insert(config.name.clone(), self.configs.len());
                self.configs.push(config);
            }
        }
    }

    /// Look up a config without creating one.
    pub fn get(&self, name: &str) -> Option<&FieldConfig> {
        self.index.get(name).map(|&i| &self.configs[i])
    }

    /// Look up a config, inferring and storing one if the field is new.
    pub fn get_or_create(&mut self, name: &str) -> &FieldConfig {
        let i = match self.index.get(name) {
            Some(&i) => i,
            None => {
                let i = self.configs.len();
                self.configs.push(FieldConfig::inferred(name));
                self.index.insert(name.to_string(), i);
                self.inferred.insert(name.to_string());
                i
            }
        };
        &self.configs[i]
    }

    /// Whether the config for `name` was inferred rather than supplied.
    pub fn is_inferred(&self, name: &str) -> bool {
        self.inferred.contains(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Field names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.configs.iter().map(|c| c.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldConfig> {
        self.configs.iter()
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}

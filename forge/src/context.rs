//! Session state describing how the user is currently engaging with a form.

use std::time::Instant;

use crate::priority::ValidationMode;

/// Per-form session snapshot.
///
/// Never edited in place: every change produces a new value through
/// [`ValidationContext::merged`], so readers always see a whole snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationContext {
    /// Focus changes recorded so far.
    pub user_interaction_count: u32,
    pub last_interaction_time: Option<Instant>,
    pub focused_field: Option<String>,
    pub submission_attempted: bool,
    pub validation_mode: ValidationMode,
}

impl ValidationContext {
    pub fn new(validation_mode: ValidationMode) -> Self {
        Self {
            validation_mode,
            ..Default::default()
        }
    }

    /// Apply an update, producing the next snapshot.
    ///
    /// Only a recorded focus change bumps the interaction counter and
    /// timestamp.
    pub fn merged(&self, update: &ContextUpdate, now: Instant) -> Self {
        let mut next = self.clone();
        if let Some(focused) = &update.focused_field {
            next.focused_field = focused.clone();
            if focused.is_some() {
                next.user_interaction_count += 1;
                next.last_interaction_time = Some(now);
            }
        }
        if let Some(submitted) = update.submission_attempted {
            next.submission_attempted = submitted;
        }
        if let Some(mode) = update.validation_mode {
            next.validation_mode = mode;
        }
        next
    }
}

/// Partial update to a [`ValidationContext`]. `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextUpdate {
    /// `Some(None)` clears focus; `Some(Some(name))` records a focus change.
    pub focused_field: Option<Option<String>>,
    pub submission_attempted: Option<bool>,
    pub validation_mode: Option<ValidationMode>,
}

impl ContextUpdate {
    pub fn focus(field: impl Into<String>) -> Self {
        Self {
            focused_field: Some(Some(field.into())),
            ..Default::default()
        }
    }

    pub fn blur() -> Self {
        Self {
            focused_field: Some(None),
            ..Default::default()
        }
    }

    pub fn submitted() -> Self {
        Self {
            submission_attempted: Some(true),
            ..Default::default()
        }
    }

    pub fn mode(mode: ValidationMode) -> Self {
        Self {
            validation_mode: Some(mode),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.focused_field.is_none()
            && self.submission_attempted.is_none()
            && self.validation_mode.is_none()
    }

    /// Shallow merge; keys set in `later` win.
    pub fn merge(mut self, later: &ContextUpdate) -> Self {
        if later.focused_field.is_some() {
            self.focused_field = later.focused_field.clone();
        }
        if later.submission_attempted.is_some() {
            self.submission_attempted = later.submission_attempted;
        }
        if later.validation_mode.is_some() {
            self.validation_mode = later.validation_mode;
        }
        self
    }
}

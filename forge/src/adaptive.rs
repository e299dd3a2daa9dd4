//! Learns how the user fills the form and adapts validation to it.
//!
//! Interaction events feed an [`InteractionHistory`]. Once enough events have
//! arrived, each new event re-runs the pattern analysis, which produces:
//!
//! - a global validation delay from the user's pace
//! - priority upgrades for fields the user keeps getting wrong or returning to
//! - per-field delays for error-prone and slow fields
//!
//! All outputs are advisory. Before the first analysis every query falls
//! back to the configured value, so callers behave the same with the engine
//! cold or switched off.
//!
//! The fill pattern is labelled `Sequential` when at least 70% of
//! consecutive focus changes land on a different field. That measures "not
//! bouncing on one field", not declaration order.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::clock::SharedClock;
use crate::history::{FieldHistory, InteractionHistory, InteractionKind};
use crate::options::ContextAwareOptions;
use crate::priority::FieldPriority;

/// Events considered when looking for revisits and errors.
const PATTERN_WINDOW: usize = 50;
/// Events considered when predicting the next field.
const PREDICTION_WINDOW: usize = 20;
const REVISIT_THRESHOLD: usize = 2;
const ERROR_THRESHOLD: usize = 1;
const SEQUENTIAL_RATIO: f64 = 0.7;
const FAST_EVENTS_PER_SEC: f64 = 2.0;
const SLOW_EVENTS_PER_SEC: f64 = 0.5;
const FAST_DELAY: Duration = Duration::from_millis(150);
const MEDIUM_DELAY: Duration = Duration::from_millis(300);
const SLOW_DELAY: Duration = Duration::from_millis(500);
const MIN_FIELD_DELAY: Duration = Duration::from_millis(100);
const SLOW_FIELD_TIME: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionSpeed {
    Fast,
    Medium,
    Slow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillPattern {
    Sequential,
    Random,
}

/// What the engine believes about the user.
#[derive(Debug, Clone, PartialEq)]
pub struct UserInteractionPattern {
    pub completion_speed: CompletionSpeed,
    pub events_per_second: f64,
    /// Fields focused more than twice in the recent window.
    pub frequently_revisited: Vec<String>,
    /// Fields with more than one error in the recent window.
    pub error_prone: Vec<String>,
    pub fill_pattern: FillPattern,
}

/// Guess of the field the user will focus next.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldPrediction {
    pub field: String,
    /// Share of observed transitions from the current field that went here.
    pub confidence: f64,
}

pub struct ContextAwareEngine {
    options: ContextAwareOptions,
    clock: SharedClock,
    history: InteractionHistory,
    pattern: Option<UserInteractionPattern>,
    global_delay: Option<Duration>,
    priority_adjustments: HashMap<String, FieldPriority>,
    field_delays: HashMap<String, Duration>,
}

impl ContextAwareEngine {
    pub fn new(options: ContextAwareOptions, clock: SharedClock) -> Self {
        Self {
            options,
            clock,
            history: InteractionHistory::new(),
            pattern: None,
            global_delay: None,
            priority_adjustments: HashMap::new(),
            field_delays: HashMap::new(),
        }
    }

    pub fn options(&self) -> &ContextAwareOptions {
        &self.options
    }

    /// Record an interaction at the current time.
    pub fn record_interaction(&mut self, field: &str, kind: InteractionKind) {
        let now = self.clock.now();
        self.record_interaction_at(field, kind, now);
    }

    pub fn record_interaction_at(&mut self, field: &str, kind: InteractionKind, at: Instant) {
        self.history.record(field, kind, at);
        if self.options.enable_learning
            && self.history.len() >= self.options.min_interactions_for_adaptation
        {
            self.analyze_patterns();
        }
    }

    /// Re-derive the pattern and adaptive outputs from the history.
    pub fn analyze_patterns(&mut self) -> Option<&UserInteractionPattern> {
        if self.history.is_empty() {
            return None;
        }
        let pattern = self.derive_pattern();
        log::debug!(
            "[adaptive] {:?} user ({:.2} events/s), {:?} fill, error-prone: {:?}, revisited: {:?}",
            pattern.completion_speed,
            pattern.events_per_second,
            pattern.fill_pattern,
            pattern.error_prone,
            pattern.frequently_revisited
        );

        if self.options.adaptive_validation_timing {
            let base = match pattern.completion_speed {
                CompletionSpeed::Fast => FAST_DELAY,
                CompletionSpeed::Slow => SLOW_DELAY,
                CompletionSpeed::Medium => MEDIUM_DELAY,
            };
            self.global_delay = Some(base);
            self.field_delays.clear();
            let mut fields = pattern.error_prone.clone();
            for name in self.slow_fields() {
                if !fields.contains(&name) {
                    fields.push(name);
                }
            }
            for name in fields {
                let mut delay = base;
                if pattern.error_prone.contains(&name) {
                    delay = (delay / 2).max(MIN_FIELD_DELAY);
                }
                if self.history.field(&name).is_some_and(is_slow) {
                    delay = delay * 3 / 2;
                }
                self.field_delays.insert(name, delay);
            }
        }

        if self.options.smart_field_prioritization {
            for name in &pattern.error_prone {
                self.priority_adjustments
                    .insert(name.clone(), FieldPriority::Critical);
            }
            for name in &pattern.frequently_revisited {
                let entry = self
                    .priority_adjustments
                    .entry(name.clone())
                    .or_insert(FieldPriority::Important);
                *entry = entry.at_least(FieldPriority::Important);
            }
        }

        self.pattern = Some(pattern);
        self.pattern.as_ref()
    }

    fn derive_pattern(&self) -> UserInteractionPattern {
        let events_per_second = match self.history.session_span() {
            Some(span) if !span.is_zero() => self.history.len() as f64 / span.as_secs_f64(),
            _ => f64::INFINITY,
        };
        let completion_speed = if events_per_second >= FAST_EVENTS_PER_SEC {
            CompletionSpeed::Fast
        } else if events_per_second < SLOW_EVENTS_PER_SEC {
            CompletionSpeed::Slow
        } else {
            CompletionSpeed::Medium
        };

        let mut focus_counts: Vec<(&str, usize)> = Vec::new();
        let mut error_counts: Vec<(&str, usize)> = Vec::new();
        let mut focus_sequence: Vec<&str> = Vec::new();
        for event in self.history.recent(PATTERN_WINDOW) {
            match event.kind {
                InteractionKind::Focus => {
                    bump(&mut focus_counts, &event.field);
                    focus_sequence.push(&event.field);
                }
                InteractionKind::Error => bump(&mut error_counts, &event.field),
                _ => {}
            }
        }

        let transitions = focus_sequence.windows(2).count();
        let moves = focus_sequence.windows(2).filter(|w| w[0] != w[1]).count();
        let fill_pattern =
            if transitions > 0 && moves as f64 / transitions as f64 >= SEQUENTIAL_RATIO {
                FillPattern::Sequential
            } else {
                FillPattern::Random
            };

        UserInteractionPattern {
            completion_speed,
            events_per_second,
            frequently_revisited: over_threshold(&focus_counts, REVISIT_THRESHOLD),
            error_prone: over_threshold(&error_counts, ERROR_THRESHOLD),
            fill_pattern,
        }
    }

    fn slow_fields(&self) -> Vec<String> {
        let mut slow: Vec<String> = Vec::new();
        for event in self.history.events() {
            if slow.contains(&event.field) {
                continue;
            }
            if self.history.field(&event.field).is_some_and(is_slow) {
                slow.push(event.field.clone());
            }
        }
        slow
    }

    /// The field's priority for this cycle; never below `base`.
    pub fn adaptive_field_priority(&self, field: &str, base: FieldPriority) -> FieldPriority {
        match self.priority_adjustments.get(field) {
            Some(&upgrade) if self.options.smart_field_prioritization => base.at_least(upgrade),
            _ => base,
        }
    }

    /// Learned upgrades, kept until [`reset`](Self::reset).
    pub fn priority_adjustments(&self) -> &HashMap<String, FieldPriority> {
        &self.priority_adjustments
    }

    /// Global delay; the configured base delay while cold.
    pub fn global_delay(&self) -> Duration {
        self.global_delay.unwrap_or(Duration::from_millis(self.options.base_delay))
    }

    /// Learned delay for a field, if it has one.
    pub fn field_delay(&self, field: &str) -> Option<Duration> {
        if !self.options.adaptive_validation_timing {
            return None;
        }
        self.field_delays.get(field).copied()
    }

    /// Delay for a field, falling back to the global delay.
    pub fn adaptive_delay(&self, field: &str) -> Duration {
        self.field_delay(field).unwrap_or_else(|| self.global_delay())
    }

    /// Most likely next field after `current`, from recent focus changes.
    pub fn predict_next_field(&self, current: &str) -> Option<FieldPrediction> {
        if !self.options.predictive_validation {
            return None;
        }
        let focus: Vec<&str> = self
            .history
            .recent(PREDICTION_WINDOW)
            .filter(|e| e.kind == InteractionKind::Focus)
            .map(|e| e.field.as_str())
            .collect();

        let mut next_counts: Vec<(&str, usize)> = Vec::new();
        let mut total = 0;
        for pair in focus.windows(2) {
            if pair[0] == current && pair[1] != current {
                bump(&mut next_counts, pair[1]);
                total += 1;
            }
        }

        let (field, count) = next_counts
            .iter()
            .fold(None::<(&str, usize)>, |best, &(f, c)| match best {
                Some((_, bc)) if bc >= c => best,
                _ => Some((f, c)),
            })?;
        Some(FieldPrediction {
            field: field.to_string(),
            confidence: count as f64 / total as f64,
        })
    }

    pub fn user_pattern(&self) -> Option<&UserInteractionPattern> {
        self.pattern.as_ref()
    }

    /// Whether a pattern has been learned yet.
    pub fn is_warm(&self) -> bool {
        self.pattern.is_some()
    }

    pub fn history(&self) -> &InteractionHistory {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut InteractionHistory {
        &mut self.history
    }

    pub fn field_stats(&self, field: &str) -> Option<&FieldHistory> {
        self.history.field(field)
    }

    /// Forget everything learned.
    pub fn reset(&mut self) {
        self.history.clear();
        self.pattern = None;
        self.global_delay = None;
        self.priority_adjustments.clear();
        self.field_delays.clear();
    }
}

fn bump<'a>(counts: &mut Vec<(&'a str, usize)>, field: &'a str) {
    match counts.iter_mut().find(|(f, _)| *f == field) {
        Some((_, count)) => *count += 1,
        None => counts.push((field, 1)),
    }
}

fn over_threshold(counts: &[(&str, usize)], threshold: usize) -> Vec<String> {
    counts
        .iter()
        .filter(|(_, count)| *count > threshold)
        .map(|(field, _)| (*field).to_string())
        .collect()
}

fn is_slow(record: &FieldHistory) -> bool {
    record.average_time() > SLOW_FIELD_TIME
}

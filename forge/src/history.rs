//! Per-field interaction history.
//!
//! One store serves two readers: the adaptation engine looks at focus,
//! change and error counts plus the recent event log, while the empty-field
//! classifier reads and writes the emptiness bookkeeping (`was_non_empty`,
//! clears, first touch). Both are cleared together on reset.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

/// Events kept in the rolling log.
pub const EVENT_LOG_CAPACITY: usize = 500;

/// A discrete interaction reported by the host UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InteractionKind {
    Focus,
    Blur,
    Change,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractionEvent {
    pub field: String,
    pub kind: InteractionKind,
    pub at: Instant,
}

/// Everything remembered about one field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldHistory {
    pub focus_count: u32,
    pub change_count: u32,
    pub error_count: u32,
    /// Completed focus-to-blur visits.
    pub visits: u32,
    pub total_time: Duration,
    pub last_interaction: Option<Instant>,
    focused_since: Option<Instant>,

    pub was_non_empty: bool,
    pub clear_count: u32,
    pub last_cleared: Option<Instant>,
    /// When the field most recently went from filled to empty.
    pub empty_since: Option<Instant>,
    /// When the field was first seen touched.
    pub touched_at: Option<Instant>,
}

impl FieldHistory {
    /// Mean time spent per completed visit.
    pub fn average_time(&self) -> Duration {
        if self.visits == 0 {
            Duration::ZERO
        } else {
            self.total_time / self.visits
        }
    }

    /// Whether the field currently holds focus.
    pub fn is_focused(&self) -> bool {
        self.focused_since.is_some()
    }

    fn apply(&mut self, kind: InteractionKind, at: Instant) {
        match kind {
            InteractionKind::Focus => {
                self.focus_count += 1;
                self.focused_since = Some(at);
            }
            InteractionKind::Blur => {
                if let Some(since) = self.focused_since.take() {
                    self.total_time += at.saturating_duration_since(since);
                    self.visits += 1;
                }
            }
            InteractionKind::Change => self.change_count += 1,
            InteractionKind::Error => self.error_count += 1,
        }
        self.last_interaction = Some(at);
    }
}

/// Interaction history for one form instance.
#[derive(Debug, Clone)]
pub struct InteractionHistory {
    fields: HashMap<String, FieldHistory>,
    events: VecDeque<InteractionEvent>,
    capacity: usize,
}

impl Default for InteractionHistory {
    fn default() -> Self {
        Self::with_capacity(EVENT_LOG_CAPACITY)
    }
}

impl InteractionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// History whose event log holds at most `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: HashMap::new(),
            events: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Record an interaction event.
    pub fn record(&mut self, field: &str, kind: InteractionKind, at: Instant) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .apply(kind, at);
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(InteractionEvent {
            field: field.to_string(),
            kind,
            at,
        });
    }

    pub fn field(&self, name: &str) -> Option<&FieldHistory> {
        self.fields.get(name)
    }

    /// Mutable entry for `name`, created on first use.
    pub fn field_mut(&mut self, name: &str) -> &mut FieldHistory {
        self.fields.entry(name.to_string()).or_default()
    }

    /// All events in the log, oldest first.
    pub fn events(&self) -> &VecDeque<InteractionEvent> {
        &self.events
    }

    /// The last `n` events, oldest first.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &InteractionEvent> {
        self.events.iter().skip(self.events.len().saturating_sub(n))
    }

    /// Time between the oldest and newest logged events.
    pub fn session_span(&self) -> Option<Duration> {
        let first = self.events.front()?;
        let last = self.events.back()?;
        Some(last.at.saturating_duration_since(first.at))
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.fields.clear();
        self.events.clear();
    }
}

//! Per-field trailing-edge debouncing of validation.
//!
//! Each field owns one slot. Scheduling replaces whatever was pending for
//! that field and restarts its timer, so only the last call in a burst runs.
//! The delay comes from the field's priority tier, shrinks by 5% per prior
//! interaction (down to `frequency_factor`), and is clamped to
//! `[min_delay, max_delay]`. It is recomputed on every call, so learned
//! delays take effect on the next interaction.
//!
//! Timers run on the ambient tokio runtime. Without one, jobs run
//! immediately.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::options::DebounceOptions;
use crate::priority::FieldPriority;

/// Per-interaction shrink of the adaptive delay.
const ADAPTIVE_STEP: f64 = 0.95;

type Job = Box<dyn FnOnce() + Send>;

/// Counters for one field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebounceStats {
    /// Times validation was requested.
    pub calls: u64,
    /// Times a validator actually ran (timer or flush).
    pub executions: u64,
    /// Pending validations thrown away by a cancel.
    pub cancellations: u64,
    pub flushes: u64,
    /// Delay used for the latest call.
    pub current_delay: Duration,
}

#[derive(Default)]
struct Slot {
    delay: Duration,
    generation: u64,
    pending: Option<Job>,
    timer: Option<JoinHandle<()>>,
    interactions: u32,
    stats: DebounceStats,
}

impl Slot {
    /// Invalidate the running timer and hand back the pending job.
    fn disarm(&mut self) -> Option<Job> {
        self.generation += 1;
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.pending.take()
    }
}

struct Inner {
    options: DebounceOptions,
    slots: Mutex<HashMap<String, Slot>>,
}

impl Inner {
    fn slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn fire(&self, field: &str, generation: u64) {
        let job = {
            let mut slots = self.slots();
            let Some(slot) = slots.get_mut(field) else {
                return;
            };
            if slot.generation != generation {
                log::trace!("[debounce] Stale timer for '{}' ignored", field);
                return;
            }
            slot.timer = None;
            let job = slot.pending.take();
            if job.is_some() {
                slot.stats.executions += 1;
            }
            job
        };
        if let Some(job) = job {
            log::trace!("[debounce] Running validation for '{}'", field);
            job();
        }
    }
}

/// Debounces validation per field name.
///
/// Cheap to clone; clones share slots.
#[derive(Clone)]
pub struct ValidationDebouncer {
    inner: Arc<Inner>,
}

impl ValidationDebouncer {
    pub fn new(options: DebounceOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                options,
                slots: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn options(&self) -> &DebounceOptions {
        &self.inner.options
    }

    /// Delay for a field with `interactions` prior calls.
    ///
    /// `base` replaces the tier delay when set (a learned per-field delay).
    pub fn compute_delay(
        &self,
        priority: Option<FieldPriority>,
        interactions: u32,
        base: Option<Duration>,
    ) -> Duration {
        let options = &self.inner.options;
        let base = base.unwrap_or_else(|| options.base_delay(priority));
        let delay = if options.adaptive_delays {
            let factor = ADAPTIVE_STEP
                .powi(interactions.min(i32::MAX as u32) as i32)
                .max(options.frequency_factor);
            Duration::from_micros((base.as_micros() as f64 * factor).round() as u64)
        } else {
            base
        };
        let min = Duration::from_millis(options.min_delay);
        let max = Duration::from_millis(options.max_delay).max(min);
        delay.clamp(min, max)
    }

    /// Schedule `job` for `field`, replacing anything pending for it.
    ///
    /// Returns the delay applied.
    pub fn schedule<F>(
        &self,
        field: &str,
        priority: Option<FieldPriority>,
        base: Option<Duration>,
        job: F,
    ) -> Duration
    where
        F: FnOnce() + Send + 'static,
    {
        let mut slots = self.inner.slots();
        let slot = slots.entry(field.to_string()).or_default();

        let delay = self.compute_delay(priority, slot.interactions, base);
        if slot.delay != delay {
            log::debug!(
                "[debounce] '{}' delay {:?} -> {:?}",
                field,
                slot.delay,
                delay
            );
            slot.delay = delay;
        }
        slot.interactions = slot.interactions.saturating_add(1);
        slot.stats.calls += 1;
        slot.stats.current_delay = delay;

        slot.disarm();
        let generation = slot.generation;

        match Handle::try_current() {
            Ok(handle) => {
                slot.pending = Some(Box::new(job));
                let inner = Arc::clone(&self.inner);
                let field = field.to_string();
                slot.timer = Some(handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    inner.fire(&field, generation);
                }));
            }
            Err(_) => {
                log::warn!(
                    "[debounce] No tokio runtime; validating '{}' immediately",
                    field
                );
                slot.stats.executions += 1;
                drop(slots);
                job();
            }
        }
        delay
    }

    /// Wrap a validator so calls through it are debounced under `field`.
    pub fn debounced<A, F>(
        &self,
        field: impl Into<String>,
        priority: Option<FieldPriority>,
        validator: F,
    ) -> DebouncedValidator<A>
    where
        A: Send + 'static,
        F: Fn(A) + Send + Sync + 'static,
    {
        DebouncedValidator {
            debouncer: self.clone(),
            field: field.into(),
            priority,
            validator: Arc::new(validator),
        }
    }

    /// Drop the pending validation for a field without running it.
    pub fn cancel(&self, field: &str) -> bool {
        let dropped = {
            let mut slots = self.inner.slots();
            let Some(slot) = slots.get_mut(field) else {
                return false;
            };
            let job = slot.disarm();
            if job.is_some() {
                slot.stats.cancellations += 1;
            }
            job
        };
        let cancelled = dropped.is_some();
        if cancelled {
            log::debug!("[debounce] Cancelled pending validation for '{}'", field);
        }
        cancelled
    }

    /// Drop every pending validation.
    pub fn cancel_all(&self) {
        let dropped: Vec<Job> = {
            let mut slots = self.inner.slots();
            slots
                .values_mut()
                .filter_map(|slot| {
                    let job = slot.disarm();
                    if job.is_some() {
                        slot.stats.cancellations += 1;
                    }
                    job
                })
                .collect()
        };
        log::debug!("[debounce] Cancelled {} pending validations", dropped.len());
    }

    /// Run the pending validation for a field now.
    pub fn flush(&self, field: &str) -> bool {
        let job = {
            let mut slots = self.inner.slots();
            let Some(slot) = slots.get_mut(field) else {
                return false;
            };
            let job = slot.disarm();
            if job.is_some() {
                slot.stats.flushes += 1;
                slot.stats.executions += 1;
            }
            job
        };
        match job {
            Some(job) => {
                log::debug!("[debounce] Flushing validation for '{}'", field);
                job();
                true
            }
            None => false,
        }
    }

    /// Run every pending validation now.
    pub fn flush_all(&self) {
        let jobs: Vec<Job> = {
            let mut slots = self.inner.slots();
            slots
                .values_mut()
                .filter_map(|slot| {
                    let job = slot.disarm();
                    if job.is_some() {
                        slot.stats.flushes += 1;
                        slot.stats.executions += 1;
                    }
                    job
                })
                .collect()
        };
        for job in jobs {
            job();
        }
    }

    pub fn is_pending(&self, field: &str) -> bool {
        self.inner
            .slots()
            .get(field)
            .is_some_and(|slot| slot.pending.is_some())
    }

    pub fn stats(&self, field: &str) -> Option<DebounceStats> {
        self.inner.slots().get(field).map(|slot| slot.stats)
    }

    /// Clear counters and interaction counts for one field, or all of them.
    pub fn reset_stats(&self, field: Option<&str>) {
        let mut slots = self.inner.slots();
        let reset = |slot: &mut Slot| {
            slot.stats = DebounceStats::default();
            slot.interactions = 0;
        };
        match field {
            Some(field) => {
                if let Some(slot) = slots.get_mut(field) {
                    reset(slot);
                }
            }
            None => slots.values_mut().for_each(reset),
        }
    }
}

/// Handle returned by [`ValidationDebouncer::debounced`].
pub struct DebouncedValidator<A> {
    debouncer: ValidationDebouncer,
    field: String,
    priority: Option<FieldPriority>,
    validator: Arc<dyn Fn(A) + Send + Sync>,
}

impl<A: Send + 'static> DebouncedValidator<A> {
    /// Request validation with `args`; only the last call in a burst runs.
    pub fn call(&self, args: A) -> Duration {
        let validator = Arc::clone(&self.validator);
        self.debouncer
            .schedule(&self.field, self.priority, None, move || validator(args))
    }

    pub fn cancel(&self) -> bool {
        self.debouncer.cancel(&self.field)
    }

    pub fn flush(&self) -> bool {
        self.debouncer.flush(&self.field)
    }

    pub fn field(&self) -> &str {
        &self.field
    }
}

use std::sync::Arc;
use std::time::Duration;

use forge::clock::ManualClock;
use forge::config::FieldConfig;
use forge::context::{ContextUpdate, ValidationContext};
use forge::error::{FieldError, MiddlewareError};
use forge::form::{FormState, FormStore};
use forge::history::InteractionKind;
use forge::middleware::{
    DependencyMode, FieldDependencyMiddleware, HISTORY_LIMIT, MiddlewareConditions,
    MiddlewareConfig, MiddlewareContext, MiddlewareManager, MiddlewareResult, RateLimitMiddleware,
    ValidationMiddleware,
};
use forge::priority::{ErrorSeverity, FieldPriority, ValidationMode};
use forge::validator::FormValidator;
use serde_json::json;

fn fixed(name: &str, priority: i32, result: MiddlewareResult) -> ValidationMiddleware {
    ValidationMiddleware::from_fn(MiddlewareConfig::new(name).priority(priority), move |_| {
        Ok(result.clone())
    })
}

fn manager(clock: &ManualClock) -> MiddlewareManager {
    MiddlewareManager::new(Arc::new(clock.clone()))
}

fn cx(field: &str) -> MiddlewareContext {
    MiddlewareContext::new(field, ValidationContext::default())
}

fn names(manager: &MiddlewareManager) -> Vec<&str> {
    manager.all().iter().map(|m| m.name()).collect()
}

// ============================================================================
// Registration
// ============================================================================

#[test]
fn test_sorted_by_priority_with_stable_ties() {
    let clock = ManualClock::new();
    let mut manager = manager(&clock);
    manager.add(fixed("a", 0, MiddlewareResult::proceed()));
    manager.add(fixed("b", 10, MiddlewareResult::proceed()));
    manager.add(fixed("c", 10, MiddlewareResult::proceed()));
    manager.add(fixed("d", 5, MiddlewareResult::proceed()));

    assert_eq!(names(&manager), vec!["b", "c", "d", "a"]);
}

#[test]
fn test_same_name_replaces() {
    let clock = ManualClock::new();
    let mut manager = manager(&clock);
    manager.add(fixed("a", 0, MiddlewareResult::proceed()));
    manager.add(fixed("b", 10, MiddlewareResult::proceed()));
    manager.add(fixed("b", -1, MiddlewareResult::proceed()));

    assert_eq!(names(&manager), vec!["a", "b"]);
    assert_eq!(manager.get("b").unwrap().priority(), -1);
    assert_eq!(manager.len(), 2);
}

#[test]
fn test_remove_and_toggle_unknown_names() {
    let clock = ManualClock::new();
    let mut manager = manager(&clock);
    manager.add(fixed("a", 0, MiddlewareResult::proceed()));

    assert!(!manager.remove("missing"));
    assert!(!manager.set_enabled("missing", false));
    assert!(manager.set_enabled("a", false));
    assert!(!manager.get("a").unwrap().is_enabled());
    assert!(manager.remove("a"));
    assert!(manager.is_empty());
}

// ============================================================================
// Execution
// ============================================================================

#[test]
fn test_halt_stops_pipeline_and_keeps_earlier_opinions() {
    let clock = ManualClock::new();
    let mut manager = manager(&clock);
    manager.add(fixed("first", 10, MiddlewareResult::proceed().error("first")));
    manager.add(fixed("stop", 5, MiddlewareResult::halt().show_error(false)));
    manager.add(fixed("never", 0, MiddlewareResult::proceed().error("never")));

    let outcome = manager.execute(&cx("email"), ValidationMode::OnChange);
    assert_eq!(outcome.executed, vec!["first", "stop"]);
    assert!(outcome.short_circuited);
    assert!(!outcome.result.should_continue);
    assert_eq!(outcome.result.custom_error.as_deref(), Some("first"));
    assert_eq!(outcome.result.show_error, Some(false));
    assert_eq!(manager.history("email").len(), 2);
}

#[test]
fn test_later_opinions_win() {
    let clock = ManualClock::new();
    let mut manager = manager(&clock);
    manager.add(fixed(
        "early",
        10,
        MiddlewareResult::proceed()
            .error("early")
            .show_error(true)
            .context(ContextUpdate::focus("email")),
    ));
    manager.add(fixed(
        "late",
        0,
        MiddlewareResult::proceed()
            .error("")
            .show_error(false)
            .context(ContextUpdate::submitted()),
    ));

    let result = manager.execute(&cx("email"), ValidationMode::OnChange).result;
    // empty messages never replace a real one
    assert_eq!(result.custom_error.as_deref(), Some("early"));
    assert_eq!(result.show_error, Some(false));
    assert_eq!(
        result.context_updates,
        Some(ContextUpdate::focus("email").merge(&ContextUpdate::submitted()))
    );
}

#[test]
fn test_panicking_middleware_is_isolated() {
    let clock = ManualClock::new();
    let mut manager = manager(&clock);
    manager.add(ValidationMiddleware::from_fn(
        MiddlewareConfig::new("boom").priority(10),
        |_| panic!("lookup table missing"),
    ));
    manager.add(fixed("after", 0, MiddlewareResult::proceed().error("still ran")));

    let outcome = manager.execute(&cx("email"), ValidationMode::OnChange);
    assert_eq!(outcome.executed, vec!["after"]);
    assert_eq!(outcome.result.custom_error.as_deref(), Some("still ran"));

    let history = manager.history("email");
    assert_eq!(history.len(), 2);
    match &history[0].outcome {
        Err(MiddlewareError::Panicked { name, message }) => {
            assert_eq!(name, "boom");
            assert!(message.contains("lookup table missing"));
        }
        other => panic!("expected a panic record, got {:?}", other),
    }
}

#[test]
fn test_failing_middleware_is_skipped() {
    let clock = ManualClock::new();
    let mut manager = manager(&clock);
    manager.add(ValidationMiddleware::from_fn(MiddlewareConfig::new("flaky"), |_| {
        Err(MiddlewareError::failed("flaky", "backend unavailable"))
    }));

    let outcome = manager.execute(&cx("email"), ValidationMode::OnChange);
    assert!(outcome.executed.is_empty());
    assert_eq!(outcome.result, MiddlewareResult::proceed());
    assert!(manager.history("email")[0].outcome.is_err());
}

#[test]
fn test_filters() {
    let clock = ManualClock::new();
    let mut manager = manager(&clock);
    manager.add(ValidationMiddleware::from_fn(
        MiddlewareConfig::new("email-only").fields(["email"]),
        |_| Ok(MiddlewareResult::proceed()),
    ));
    manager.add(ValidationMiddleware::from_fn(
        MiddlewareConfig::new("blur-only").modes([ValidationMode::OnBlur]),
        |_| Ok(MiddlewareResult::proceed()),
    ));
    manager.add(ValidationMiddleware::from_fn(
        MiddlewareConfig::new("touched-only").conditions(MiddlewareConditions {
            only_if_touched: true,
            ..Default::default()
        }),
        |_| Ok(MiddlewareResult::proceed()),
    ));
    manager.add(ValidationMiddleware::from_fn(
        MiddlewareConfig::new("once").conditions(MiddlewareConditions {
            first_validation_only: true,
            ..Default::default()
        }),
        |_| Ok(MiddlewareResult::proceed()),
    ));
    manager.add(ValidationMiddleware::from_fn(
        MiddlewareConfig::new("critical-errors").conditions(MiddlewareConditions {
            only_if_errors: true,
            field_priorities: Some(vec![FieldPriority::Critical]),
            ..Default::default()
        }),
        |_| Ok(MiddlewareResult::proceed()),
    ));
    manager.add(ValidationMiddleware::from_fn(
        MiddlewareConfig::new("off").disabled(),
        |_| Ok(MiddlewareResult::proceed()),
    ));

    let outcome = manager.execute(&cx("name"), ValidationMode::OnChange);
    assert_eq!(outcome.executed, vec!["once"]);

    let mut context = cx("email");
    context.is_touched = true;
    context.priority = FieldPriority::Critical;
    context.errors = vec!["Invalid".to_string()];
    let outcome = manager.execute(&context, ValidationMode::OnBlur);
    assert_eq!(
        outcome.executed,
        vec!["email-only", "blur-only", "touched-only", "once", "critical-errors"]
    );

    context.validation_count = manager.validation_count("email");
    assert_eq!(context.validation_count, 1);
    let outcome = manager.execute(&context, ValidationMode::OnChange);
    assert_eq!(
        outcome.executed,
        vec!["email-only", "touched-only", "critical-errors"]
    );
}

#[test]
fn test_history_is_capped() {
    let clock = ManualClock::new();
    let mut manager = manager(&clock);
    manager.add(fixed("noop", 0, MiddlewareResult::proceed()));

    for _ in 0..HISTORY_LIMIT + 10 {
        manager.execute(&cx("email"), ValidationMode::OnChange);
        clock.advance_ms(1);
    }
    let history = manager.history("email");
    assert_eq!(history.len(), HISTORY_LIMIT);
    assert!(history.windows(2).all(|w| w[0].at < w[1].at));

    manager.clear_history(Some("email"));
    assert!(manager.history("email").is_empty());
    assert_eq!(manager.validation_count("email"), 60);
    manager.reset();
    assert_eq!(manager.validation_count("email"), 0);
}

#[test]
fn test_rate_limit_sixth_call_in_a_second_is_skipped() {
    let clock = ManualClock::new();
    let mut manager = manager(&clock);
    manager.add(ValidationMiddleware::new(
        MiddlewareConfig::new("rate-limit").priority(100),
        RateLimitMiddleware::new(
            RateLimitMiddleware::DEFAULT_MAX_PER_SECOND,
            Arc::new(clock.clone()),
        ),
    ));

    for _ in 0..5 {
        let outcome = manager.execute(&cx("email"), ValidationMode::OnChange);
        assert!(outcome.result.should_continue);
        clock.advance_ms(100);
    }
    let outcome = manager.execute(&cx("email"), ValidationMode::OnChange);
    assert!(!outcome.result.should_continue);
    assert_eq!(outcome.result.skip_validation, Some(true));
    assert_eq!(outcome.result.custom_delay, Some(Duration::from_millis(500)));
}

// ============================================================================
// Through the validator
// ============================================================================

#[test]
fn test_custom_error_makes_field_invalid() {
    let clock = ManualClock::new();
    let validator = FormValidator::builder()
        .field(FieldConfig::new("handle").important())
        .middleware(fixed("taken", 0, MiddlewareResult::proceed().error("Handle taken")))
        .clock(Arc::new(clock.clone()))
        .build();
    let form = FormState::new();
    form.set_value("handle", json!("ada"));
    form.touch("handle");

    let state = validator.validate(&form);
    let handle = state.field("handle").unwrap();
    assert!(!handle.is_valid);
    assert_eq!(handle.errors, vec!["Handle taken".to_string()]);
    assert!(handle.should_show_error);
    assert_eq!(handle.error_severity, ErrorSeverity::Warning);
    assert_eq!(handle.metadata.middleware, vec!["taken".to_string()]);
    assert!(!state.is_partially_valid);
    assert!(!form.is_valid());
}

#[test]
fn test_updated_priority_only_upgrades() {
    let clock = ManualClock::new();
    let validator = FormValidator::builder()
        .field(FieldConfig::new("password").critical())
        .field(FieldConfig::new("nickname"))
        .middleware(ValidationMiddleware::from_fn(
            MiddlewareConfig::new("password-down").fields(["password"]),
            |_| Ok(MiddlewareResult::proceed().priority(FieldPriority::Optional)),
        ))
        .middleware(ValidationMiddleware::from_fn(
            MiddlewareConfig::new("nickname-up").fields(["nickname"]),
            |_| Ok(MiddlewareResult::proceed().priority(FieldPriority::Critical)),
        ))
        .clock(Arc::new(clock.clone()))
        .build();
    let form = FormState::new();
    fail(&form, "nickname", "Too short");

    let state = validator.validate(&form);
    let password = state.field("password").unwrap();
    assert_eq!(password.priority, FieldPriority::Critical);
    assert!(!password.metadata.priority_upgraded);
    let nickname = state.field("nickname").unwrap();
    assert_eq!(nickname.priority, FieldPriority::Critical);
    assert!(nickname.metadata.priority_upgraded);
    // the upgraded field now gates the critical tier
    assert!(!state.critical_fields_valid);
}

#[test]
fn test_skip_validation_keeps_previous_state() {
    let clock = ManualClock::new();
    let validator = FormValidator::builder()
        .clock(Arc::new(clock.clone()))
        .build();
    let form = FormState::new();
    fail(&form, "email", "Invalid email");
    form.touch("email");

    let before = validator.validate(&form);
    let before = before.field("email").unwrap().clone();
    assert!(before.should_show_error);

    validator.add_middleware(ValidationMiddleware::from_fn(
        MiddlewareConfig::new("freeze").fields(["email"]),
        |_| Ok(MiddlewareResult::proceed().skip_validation(true)),
    ));
    form.set_errors("email", Vec::new());
    let state = validator.validate(&form);
    let email = state.field("email").unwrap();
    assert!(email.metadata.validation_skipped);
    assert_eq!(email.errors, before.errors);
    assert_eq!(email.should_show_error, before.should_show_error);
    assert!(!email.is_valid);
}

#[test]
fn test_dependency_blocks_until_dependency_valid() {
    let clock = ManualClock::new();
    let validator = FormValidator::builder()
        .field(FieldConfig::new("password").critical())
        .field(FieldConfig::new("confirm").important().depends_on("password"))
        .middleware(ValidationMiddleware::new(
            MiddlewareConfig::new("dependencies").priority(50),
            FieldDependencyMiddleware::new(DependencyMode::Block),
        ))
        .clock(Arc::new(clock.clone()))
        .build();
    let form = FormState::new();
    fail(&form, "password", "Too short");
    fail(&form, "confirm", "Passwords do not match");

    let outcome = validator.submit(&form);
    let confirm = outcome.state.field("confirm").unwrap();
    assert!(!confirm.should_show_error);
    assert!(confirm.metadata.validation_skipped);
    assert!(outcome.state.field("password").unwrap().should_show_error);

    form.set_errors("password", Vec::new());
    let state = validator.validate(&form);
    let confirm = state.field("confirm").unwrap();
    assert!(!confirm.metadata.validation_skipped);
    assert!(confirm.should_show_error);
    assert_eq!(confirm.error_severity, ErrorSeverity::Warning);
}

#[test]
fn test_dependency_annotates_missing_fields() {
    let clock = ManualClock::new();
    let validator = FormValidator::builder()
        .field(FieldConfig::new("street").important())
        .field(FieldConfig::new("apartment").depends_on("street"))
        .middleware(ValidationMiddleware::new(
            MiddlewareConfig::new("dependencies"),
            FieldDependencyMiddleware::new(DependencyMode::Annotate),
        ))
        .clock(Arc::new(clock.clone()))
        .build();
    let form = FormState::new();
    fail(&form, "street", "Street is required");
    form.set_value("apartment", json!("4B"));
    form.touch("apartment");

    let state = validator.validate(&form);
    let apartment = state.field("apartment").unwrap();
    assert!(!apartment.is_valid);
    assert_eq!(apartment.first_error(), Some("Complete street first"));
    assert!(apartment.should_show_error);
    assert_eq!(apartment.error_severity, ErrorSeverity::Info);
}

#[test]
fn test_rate_limited_validation_reuses_state() {
    let clock = ManualClock::new();
    let validator = FormValidator::builder()
        .middleware(ValidationMiddleware::new(
            MiddlewareConfig::new("rate-limit").priority(100).fields(["email"]),
            RateLimitMiddleware::new(5, Arc::new(clock.clone())),
        ))
        .clock(Arc::new(clock.clone()))
        .build();
    let form = FormState::new();
    form.set_value("email", json!("ada@example.com"));
    form.touch("email");

    for _ in 0..5 {
        let state = validator.validate(&form);
        assert!(!state.field("email").unwrap().metadata.validation_skipped);
    }
    let state = validator.validate(&form);
    assert!(state.field("email").unwrap().metadata.validation_skipped);

    let history = validator.middleware_history("email");
    let last = history.last().unwrap();
    assert_eq!(last.middleware, "rate-limit");
    assert!(!last.outcome.as_ref().unwrap().should_continue);
}

#[test]
fn test_context_updates_are_merged_into_session() {
    let clock = ManualClock::new();
    let validator = FormValidator::builder()
        .middleware(ValidationMiddleware::from_fn(
            MiddlewareConfig::new("switch-mode").fields(["email"]),
            |_| {
                let update = ContextUpdate::mode(ValidationMode::OnBlur);
                Ok(MiddlewareResult::proceed().context(update))
            },
        ))
        .clock(Arc::new(clock.clone()))
        .build();
    let form = FormState::new();
    form.touch("email");

    assert_eq!(validator.context().validation_mode, ValidationMode::OnChange);
    validator.validate(&form);
    assert_eq!(validator.context().validation_mode, ValidationMode::OnBlur);
}

#[tokio::test(start_paused = true)]
async fn test_custom_delay_drives_next_debounce() {
    let validator = FormValidator::builder()
        .field(FieldConfig::new("search"))
        .middleware(ValidationMiddleware::from_fn(
            MiddlewareConfig::new("slow-down").fields(["search"]),
            |_| Ok(MiddlewareResult::proceed().delay(Duration::from_millis(700))),
        ))
        .build();
    let form = FormState::new();

    validator.validate(&form);
    let delay = validator.handle_event(&form, "search", InteractionKind::Change);
    assert_eq!(delay, Some(Duration::from_millis(700)));
}

#[test]
fn test_management_through_validator() {
    let validator = FormValidator::builder()
        .middleware(fixed("a", 1, MiddlewareResult::proceed()))
        .middleware(fixed("b", 2, MiddlewareResult::proceed()))
        .build();

    let order: Vec<String> = validator.middleware().into_iter().map(|c| c.name).collect();
    assert_eq!(order, vec!["b", "a"]);
    assert!(validator.set_middleware_enabled("a", false));
    assert!(!validator.get_middleware("a").unwrap().enabled);
    assert!(validator.remove_middleware("a"));
    assert!(!validator.remove_middleware("a"));
    assert!(validator.get_middleware("a").is_none());
}

fn fail(form: &FormState, field: &str, message: &str) {
    form.set_value(field, json!("x"));
    form.set_errors(field, vec![FieldError::new(field, "custom", message)]);
}

use std::sync::Arc;
use std::time::{Duration, Instant};

use forge::clock::ManualClock;
use forge::config::FieldConfig;
use forge::context::ValidationContext;
use forge::empty::{EmptyFieldState, EmptyType, SmartEmptyClassifier};
use forge::form::{FieldRules, FormState};
use forge::history::InteractionHistory;
use forge::options::{SmartEmptyOptions, ValidatorOptions};
use forge::priority::{ErrorSeverity, FieldPriority, ValidationMode, ValidationPhase};
use forge::validator::FormValidator;
use serde_json::{Value, json};

fn classify(
    classifier: &SmartEmptyClassifier,
    config: &FieldConfig,
    value: Value,
    touched: bool,
    context: &ValidationContext,
    history: &mut InteractionHistory,
    now: Instant,
) -> EmptyFieldState {
    classifier.classify(
        config,
        config.priority,
        Some(&value),
        touched,
        context,
        history,
        now,
    )
}

fn validator_with(clock: &ManualClock, config: FieldConfig) -> FormValidator {
    FormValidator::builder()
        .field(config)
        .clock(Arc::new(clock.clone()))
        .build()
}

// ============================================================================
// Classification
// ============================================================================

#[test]
fn test_untouched_empty_field_stays_untouched() {
    let classifier = SmartEmptyClassifier::default();
    let config = FieldConfig::new("email").critical().required();
    let context = ValidationContext::default();
    let mut history = InteractionHistory::new();
    let t0 = Instant::now();

    for step in 0..20 {
        let now = t0 + Duration::from_secs(step);
        let state = classify(&classifier, &config, json!(""), false, &context, &mut history, now);
        assert_eq!(state.empty_type, EmptyType::Untouched);
        assert!(!state.should_show_error);
        assert!(state.is_untouched);
        assert_eq!(state.severity(), ErrorSeverity::None);
    }
}

#[test]
fn test_filled_field_is_not_empty() {
    let classifier = SmartEmptyClassifier::default();
    let config = FieldConfig::new("email").required();
    let mut history = InteractionHistory::new();

    let state = classify(
        &classifier,
        &config,
        json!("ada@example.com"),
        true,
        &ValidationContext::default(),
        &mut history,
        Instant::now(),
    );
    assert!(!state.is_empty);
    assert!(!state.should_show_error);
    assert_eq!(state.empty_type, EmptyType::ValidEmpty);
    assert!(history.field("email").unwrap().was_non_empty);
}

#[test]
fn test_cleared_field_waits_for_clear_delay() {
    let classifier = SmartEmptyClassifier::default();
    let config = FieldConfig::new("name").important().required();
    let context = ValidationContext::default();
    let mut history = InteractionHistory::new();
    let t0 = Instant::now();

    classify(&classifier, &config, json!("Ada"), true, &context, &mut history, t0);
    let state = classify(&classifier, &config, json!(""), true, &context, &mut history, t0);
    assert_eq!(state.empty_type, EmptyType::Cleared);
    assert!(!state.should_show_error);

    // important clear delay is 1000ms and must be exceeded
    let at_delay = t0 + Duration::from_millis(1000);
    let state = classify(&classifier, &config, json!(""), true, &context, &mut history, at_delay);
    assert!(!state.should_show_error);

    let past_delay = t0 + Duration::from_millis(1001);
    let state = classify(&classifier, &config, json!(""), true, &context, &mut history, past_delay);
    assert!(state.should_show_error);
    assert_eq!(state.severity(), ErrorSeverity::Info);
    assert_eq!(classifier.clear_count(&history, "name"), 1);
}

#[test]
fn test_cleared_optional_field_never_shows() {
    let classifier = SmartEmptyClassifier::default();
    let config = FieldConfig::new("nickname");
    let context = ValidationContext::default();
    let mut history = InteractionHistory::new();
    let t0 = Instant::now();

    classify(&classifier, &config, json!("x"), true, &context, &mut history, t0);
    let later = t0 + Duration::from_secs(60);
    let state = classify(&classifier, &config, json!(""), true, &context, &mut history, later);
    assert_eq!(state.empty_type, EmptyType::Cleared);
    assert!(!state.should_show_error);
}

#[test]
fn test_cleared_required_field_shows_after_submit() {
    let classifier = SmartEmptyClassifier::default();
    let config = FieldConfig::new("password").critical().required();
    let mut history = InteractionHistory::new();
    let t0 = Instant::now();
    let mut context = ValidationContext::default();

    classify(&classifier, &config, json!("hunter2"), true, &context, &mut history, t0);
    context.submission_attempted = true;
    let state = classify(&classifier, &config, json!(""), true, &context, &mut history, t0);
    assert!(state.should_show_error);
    assert_eq!(state.severity(), ErrorSeverity::Warning);
}

#[test]
fn test_clear_count_counts_each_transition() {
    let classifier = SmartEmptyClassifier::default();
    let config = FieldConfig::new("city");
    let context = ValidationContext::default();
    let mut history = InteractionHistory::new();
    let now = Instant::now();

    for value in ["a", "", "", "b", "", "c"] {
        classify(&classifier, &config, json!(value), true, &context, &mut history, now);
    }
    assert_eq!(classifier.clear_count(&history, "city"), 2);
}

#[test]
fn test_immediate_required_validation_skips_grace() {
    let classifier = SmartEmptyClassifier::new(SmartEmptyOptions {
        immediate_required_validation: true,
        ..Default::default()
    });
    let config = FieldConfig::new("terms").required();
    let mut history = InteractionHistory::new();

    let state = classify(
        &classifier,
        &config,
        Value::Null,
        true,
        &ValidationContext::default(),
        &mut history,
        Instant::now(),
    );
    assert_eq!(state.empty_type, EmptyType::InvalidEmpty);
    assert!(state.should_show_error);
    assert_eq!(state.severity(), ErrorSeverity::Warning);
}

#[test]
fn test_touched_optional_empty_is_valid_empty() {
    let classifier = SmartEmptyClassifier::default();
    let config = FieldConfig::new("bio");
    let mut history = InteractionHistory::new();

    let state = classify(
        &classifier,
        &config,
        json!(""),
        true,
        &ValidationContext::new(ValidationMode::OnBlur),
        &mut history,
        Instant::now(),
    );
    assert_eq!(state.empty_type, EmptyType::ValidEmpty);
    assert!(!state.should_show_error);
}

// ============================================================================
// Through the validator
// ============================================================================

#[test]
fn test_untouched_email_is_pending_and_hidden() {
    let clock = ManualClock::new();
    let validator = FormValidator::builder()
        .clock(Arc::new(clock.clone()))
        .build();
    assert_eq!(
        validator.field_config("email").priority,
        FieldPriority::Critical
    );

    let form = FormState::new();
    for _ in 0..3 {
        let state = validator.validate(&form);
        let email = state.field("email").unwrap();
        assert!(!email.should_show_error);
        assert_eq!(email.validation_state, ValidationPhase::Pending);
        assert_eq!(email.metadata.empty_type, Some(EmptyType::Untouched));
        clock.advance_ms(5000);
    }
}

#[test]
fn test_required_email_waits_out_grace_period() {
    let clock = ManualClock::new();
    let validator = validator_with(&clock, FieldConfig::inferred("email").required());
    let form = FormState::new();
    form.set_value("email", json!(""));
    form.touch("email");

    validator.validate(&form);
    clock.advance_ms(200);
    let state = validator.validate(&form);
    let email = state.field("email").unwrap();
    assert!(!email.is_valid);
    assert!(!email.should_show_error);
    assert_eq!(email.metadata.empty_type, Some(EmptyType::InvalidEmpty));

    clock.advance_ms(900);
    let state = validator.validate(&form);
    let email = state.field("email").unwrap();
    assert!(email.should_show_error);
    assert_eq!(email.error_severity, ErrorSeverity::Error);
    assert_eq!(email.visible_error(), Some("This field is required"));
}

#[test]
fn test_validate_on_empty_shows_immediately() {
    let clock = ManualClock::new();
    let validator = validator_with(
        &clock,
        FieldConfig::new("phone").important().required().validate_on_empty(),
    );
    let form = FormState::new();
    form.touch("phone");

    let state = validator.validate(&form);
    let phone = state.field("phone").unwrap();
    assert!(phone.should_show_error);
    assert_eq!(phone.error_severity, ErrorSeverity::Warning);
}

#[test]
fn test_untouched_required_field_shows_after_submit() {
    let clock = ManualClock::new();
    let validator = validator_with(&clock, FieldConfig::new("username").critical().required());
    let form = FormState::new();

    let outcome = validator.submit(&form);
    let username = outcome.state.field("username").unwrap();
    assert!(username.should_show_error);
    assert_eq!(username.error_severity, ErrorSeverity::Error);
    assert_eq!(username.validation_state, ValidationPhase::Invalid);
}

#[test]
fn test_smart_empty_handling_off_uses_disclosure_rules() {
    let clock = ManualClock::new();
    let validator = FormValidator::builder()
        .options(ValidatorOptions {
            smart_empty_handling: false,
            ..Default::default()
        })
        .field(FieldConfig::new("email").critical().required())
        .clock(Arc::new(clock.clone()))
        .build();
    let form = FormState::new();
    form.touch("email");

    let state = validator.validate(&form);
    let email = state.field("email").unwrap();
    assert!(email.should_show_error);
    assert_eq!(email.metadata.empty_type, None);
}

#[test]
fn test_failing_touched_field_shows_after_rejected_submit() {
    let clock = ManualClock::new();
    let validator = FormValidator::builder()
        .clock(Arc::new(clock.clone()))
        .build();
    let form = FormState::new();
    form.rules("email", FieldRules::new().required("Email is required"));
    form.touch("email");
    form.run_rules();

    // inferred config is not required, so the classifier calls it valid-empty
    let state = validator.validate(&form);
    let email = state.field("email").unwrap();
    assert!(!email.is_valid);
    assert!(!email.should_show_error);
    assert_eq!(email.metadata.empty_type, Some(EmptyType::ValidEmpty));

    let outcome = validator.submit(&form);
    assert!(!outcome.accepted);
    assert_eq!(outcome.focus.as_deref(), Some("email"));
    let email = outcome.state.field("email").unwrap();
    assert!(email.should_show_error);
    assert_eq!(email.error_severity, ErrorSeverity::Error);
    assert_eq!(email.visible_error(), Some("Email is required"));
}

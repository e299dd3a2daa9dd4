//! A scripted signup session.
//!
//! Binds a form tree, wires a few middleware, replays user input with
//! realistic pauses and prints what the UI would show after each step.
//! Engine logs go to `signup.log`.

use std::fs::File;
use std::time::Duration;

use forge::middleware::{DependencyMode, FieldDependencyMiddleware, RateLimitMiddleware};
use forge::prelude::*;
use log::LevelFilter;
use serde_json::json;
use simplelog::{Config, WriteLogger};

// ============================================================================
// Form
// ============================================================================

fn tree() -> Node {
    Node::form(vec![
        Node::column(vec![
            Node::text("Create your account"),
            Node::input("email"),
            Node::input("password"),
            Node::input("confirm_password"),
            Node::input("display_name"),
            Node::input("bio"),
        ]),
        Node::submit("Sign up"),
    ])
}

fn rules(form: &FormState) {
    form.rules(
        "email",
        FieldRules::new()
            .required("Email is required")
            .email("Please enter a valid email"),
    );
    form.rules(
        "password",
        FieldRules::new()
            .required("Password is required")
            .min_length(8, "Use at least 8 characters"),
    );
    form.rules(
        "confirm_password",
        FieldRules::new()
            .required("Please confirm your password")
            .min_length(8, "Use at least 8 characters"),
    );
    form.rules(
        "bio",
        FieldRules::new().max_length(40, "Keep it under 40 characters"),
    );
}

fn validator() -> FormValidator {
    let clock = forge::clock::system_clock();
    FormValidator::builder()
        .field(FieldConfig::new("email").critical().required())
        .field(FieldConfig::new("password").critical().required())
        .field(
            FieldConfig::new("confirm_password")
                .important()
                .required()
                .depends_on("password"),
        )
        .field(FieldConfig::new("display_name"))
        .field(FieldConfig::new("bio"))
        .middleware(ValidationMiddleware::new(
            MiddlewareConfig::new("rate-limit").priority(100),
            RateLimitMiddleware::new(RateLimitMiddleware::DEFAULT_MAX_PER_SECOND, clock.clone()),
        ))
        .middleware(ValidationMiddleware::new(
            MiddlewareConfig::new("dependencies").priority(50),
            FieldDependencyMiddleware::new(DependencyMode::Block),
        ))
        .middleware(ValidationMiddleware::from_fn(
            MiddlewareConfig::new("no-admin").fields(["display_name"]),
            |cx| {
                let reserved = cx.value.as_str().is_some_and(|v| v.eq_ignore_ascii_case("admin"));
                Ok(if reserved {
                    MiddlewareResult::proceed().error("That name is reserved")
                } else {
                    MiddlewareResult::proceed()
                })
            },
        ))
        .clock(clock)
        .build()
}

// ============================================================================
// Session
// ============================================================================

async fn type_into(validator: &FormValidator, form: &FormState, field: &str, text: &str) {
    validator.handle_event(form, field, InteractionKind::Focus);
    form.touch(field);
    let mut typed = String::new();
    for ch in text.chars() {
        typed.push(ch);
        form.set_value(field, json!(typed));
        form.run_rules();
        validator.handle_event(form, field, InteractionKind::Change);
        tokio::time::sleep(Duration::from_millis(60)).await;
    }
    validator.handle_event(form, field, InteractionKind::Blur);
    tokio::time::sleep(Duration::from_millis(400)).await;
}

fn report(step: &str, validator: &FormValidator) {
    let state = validator.validation_state();
    let button = validator.button_state();
    println!("\n== {step}");
    for (name, field) in &state.field_states {
        let shown = field.visible_error().unwrap_or("");
        println!(
            "  {:<17} {:<9} {:?}/{:?} {}",
            name,
            field.priority.as_str(),
            field.validation_state,
            field.error_severity,
            shown
        );
    }
    println!(
        "  progress {:.0}%  button: {}{:?}{}",
        state.validation_progress,
        if button.disabled { "disabled " } else { "" },
        button.variant,
        button
            .message
            .map(|m| format!(" ({m})"))
            .unwrap_or_default()
    );
}

#[tokio::main]
async fn main() {
    if let Ok(log_file) = File::create("signup.log") {
        let _ = WriteLogger::init(LevelFilter::Debug, Config::default(), log_file);
    }

    let form = FormState::new();
    let view = bind_tree(tree(), &form);
    rules(&form);
    println!("Bound fields: {}", view.field_names().join(", "));

    let validator = validator();
    validator.validate(&form);
    report("Opened", &validator);

    type_into(&validator, &form, "email", "ada@").await;
    report("Half an email", &validator);

    type_into(&validator, &form, "email", "ada@example.com").await;
    type_into(&validator, &form, "password", "hunter2").await;
    type_into(&validator, &form, "confirm_password", "hunter2").await;
    report("Short password", &validator);

    type_into(&validator, &form, "display_name", "admin").await;
    type_into(&validator, &form, "bio", "Mathematician, writer of the first program").await;
    report("Reserved name, long bio", &validator);

    let outcome = validator.submit(&form);
    report("First submit", &validator);
    if let Some(field) = &outcome.focus {
        println!("  -> focus {field}");
    }

    type_into(&validator, &form, "password", "correct horse").await;
    type_into(&validator, &form, "confirm_password", "correct horse").await;
    type_into(&validator, &form, "display_name", "Ada").await;
    let outcome = validator.submit(&form);
    report("Second submit", &validator);
    println!("  accepted: {}", outcome.accepted);

    if let Some(pattern) = validator.user_pattern() {
        println!(
            "\nLearned: {:?} pace, {:?} fill, error-prone: {:?}",
            pattern.completion_speed, pattern.fill_pattern, pattern.error_prone
        );
    }
}

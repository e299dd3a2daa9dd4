//! Form validation orchestration.
//!
//! `forge` sits between a form container (values, touched flags, raw rule
//! errors) and the UI. It decides which errors to show and when, how long to
//! wait before validating, and what the submit button should look like:
//!
//! - [`empty`] tells an untouched field from one being cleared or abandoned
//! - [`progressive`] discloses errors by field priority and caps how many
//!   show at once
//! - [`adaptive`] learns the user's pace and trouble spots
//! - [`debounce`] delays validation per field, trailing edge only
//! - [`middleware`] lets hosts veto, rewrite or annotate field results
//! - [`validator`] ties it together behind [`FormValidator`]
//!
//! [`node`] binds a declarative form tree to a container implementing
//! [`FormControl`](form::FormControl), and [`form::FormState`] is a ready-made
//! in-memory container.

pub mod adaptive;
pub mod clock;
pub mod config;
pub mod context;
pub mod debounce;
pub mod empty;
pub mod error;
pub mod form;
pub mod history;
pub mod middleware;
pub mod node;
pub mod options;
pub mod prelude;
pub mod priority;
pub mod progressive;
pub mod state;
pub mod validator;

pub use validator::FormValidator;

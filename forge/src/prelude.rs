//! Prelude module for convenient imports.
//!
//! ```ignore
//! use forge::prelude::*;
//! ```

// Orchestrator
pub use crate::validator::{
    ButtonValidationState, ButtonVariant, FormValidator, SubmitOutcome, ValidationTicket,
};

// Configuration
pub use crate::config::FieldConfig;
pub use crate::options::{ButtonStrategy, ValidatorOptions};
pub use crate::priority::{ErrorSeverity, FieldPriority, ValidationMode, ValidationPhase};

// State
pub use crate::context::{ContextUpdate, ValidationContext};
pub use crate::history::InteractionKind;
pub use crate::state::{EnhancedValidationState, FieldValidationState};

// Middleware
pub use crate::middleware::{
    MiddlewareConfig, MiddlewareContext, MiddlewareResult, ValidationMiddleware,
};

// Container and tree
pub use crate::form::{FieldRules, FormControl, FormSnapshot, FormState, FormStore};
pub use crate::node::{Node, bind_tree};

// Time
pub use crate::clock::{Clock, ManualClock, SharedClock};

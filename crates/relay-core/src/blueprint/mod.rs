//! Blueprint model - the workflow DSL interpreted by the engine.
//!
//! A blueprint is a JSON document produced upstream:
//!
//! ```json
//! {
//!   "version": "1.0",
//!   "description": "Post a greeting when the score is high",
//!   "trigger": { "type": "manual" },
//!   "variables": { "score": 12 },
//!   "steps": [
//!     {
//!       "id": "check", "name": "Check score", "type": "condition",
//!       "condition": {
//!         "expression": "score > 10",
//!         "if_true": [
//!           {
//!             "id": "post", "name": "Post", "type": "action", "on_error": "retry",
//!             "action": {
//!               "integration": "slack", "method": "post_message",
//!               "parameters": { "channel": "#general", "text": "score is {{score}}" },
//!               "output_variable": "sent"
//!             }
//!           }
//!         ]
//!       }
//!     }
//!   ]
//! }
//! ```

pub mod expression;
pub mod schema;
pub mod template;

pub use schema::{
    ActionSpec, AgentCallSpec, Blueprint, ConditionSpec, DelaySpec, LoopSpec, OnError, Step,
    StepKind, TriggerConfig,
};

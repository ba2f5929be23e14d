//! Rule-matching pipeline, fingerprinting and sliding-window counter
//! primitives for the edge rate-limiting gateway. Pure and I/O-free so it
//! can be exercised without a Fastly runtime.

pub mod counter_key;
pub mod error;
pub mod evaluator;
pub mod facts;
pub mod fingerprint;
pub mod matcher;
pub mod model;
pub mod window;

pub use error::{RuleValidationError, Warning};
pub use facts::RequestFacts;
pub use matcher::{match_rules, RuleMatch};
pub use model::{Action, Rule, Ruleset};

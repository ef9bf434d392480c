//! # stackwright_policy
//!
//! Audit rules evaluated over a composed [`DesiredState`](stackwright_topology::DesiredState).
//!
//! Rules never modify the topology. They report violations with a severity;
//! callers decide whether an error-level violation blocks a deployment.
//!
//! ## Example
//!
//! ```rust,ignore
//! use stackwright_policy::RuleSet;
//!
//! let violations = RuleSet::standard().evaluate(&state);
//! for v in &violations {
//!     println!("{:?} {}: {}", v.severity, v.rule_id, v.message);
//! }
//! ```

pub mod error;
pub mod rules;

pub use error::{PolicyError, PolicyResult};
pub use rules::{AuditSummary, PolicyRule, RuleSet, RuleSeverity, RuleType, RuleViolation};
